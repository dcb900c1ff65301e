// Copyright (c) 2025 - Cowboy AI, Inc.
//! Object storage bucket builder
//!
//! ```rust,ignore
//! let assets = ObjectBucket::new(&deployment, "assets")
//!     .with_access_logs(30, true)?
//!     .with_sse(Some(key.key_id()), SseAlgorithm::Kms)?
//!     .with_bucket(BucketOptions::default())?
//!     .with_public_access_block()?;
//! ```
//!
//! The log bucket and SSE settings must be in place before the main bucket
//! is created; policies and access grants need the main bucket.

use serde_json::{json, Value};

use crate::deferred::{all2, Deferred, Properties};
use crate::deployment::{Component, Deployment, Registrar, ResourceHandle, ResourceKind, ResourceRequest};
use crate::errors::{StackError, StackResult};
use crate::identity;
use crate::policy::{PolicyDocument, PolicyFactory, Principal};
use crate::state_machine::{StageTracker, StateMachine, Step, TransitionError, TransitionResult};

pub const DEFAULT_CNAME_TTL: u32 = 600;

/// Server-side encryption algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SseAlgorithm {
    #[default]
    Kms,
    Aes256,
}

impl SseAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SseAlgorithm::Kms => "aws:kms",
            SseAlgorithm::Aes256 => "AES256",
        }
    }
}

/// Options for the main bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketOptions {
    /// Use the logical name as the physical bucket name
    pub override_name: bool,
    pub force_destroy: bool,
    /// Adopt an existing bucket with the logical name
    pub import: bool,
}

impl Default for BucketOptions {
    fn default() -> Self {
        Self {
            override_name: false,
            force_destroy: true,
            import: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketStage {
    Empty,
    /// Log bucket known, main bucket not created
    Logged,
    Created { logged: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketStep {
    AccessLogs,
    ExistingLogBucket,
    Sse,
    Bucket,
    Cname,
    PublicAccessBlock,
    ReadAccess,
    ReadPolicy,
    SyncPolicy,
    WritePolicy,
}

impl Step for BucketStep {
    fn name(&self) -> &'static str {
        match self {
            BucketStep::AccessLogs => "with_access_logs",
            BucketStep::ExistingLogBucket => "with_existing_log_bucket",
            BucketStep::Sse => "with_sse",
            BucketStep::Bucket => "with_bucket",
            BucketStep::Cname => "with_cname",
            BucketStep::PublicAccessBlock => "with_public_access_block",
            BucketStep::ReadAccess => "with_read_access",
            BucketStep::ReadPolicy => "create_read_policy",
            BucketStep::SyncPolicy => "create_sync_policy",
            BucketStep::WritePolicy => "create_write_policy",
        }
    }
}

impl StateMachine for BucketStage {
    type Input = BucketStep;
    type Output = ();

    fn transition(&self, step: &BucketStep) -> TransitionResult<(Self, ())> {
        use BucketStage::*;
        use BucketStep::*;

        match (*self, *step) {
            (Empty, AccessLogs | ExistingLogBucket) => Ok((Logged, ())),
            (Logged | Created { logged: true }, AccessLogs | ExistingLogBucket) => Err(
                TransitionError::already_configured(step, "log bucket"),
            ),
            (Created { logged: false }, AccessLogs | ExistingLogBucket) => Err(
                TransitionError::out_of_order(step, "access logs bucket must be defined before main bucket"),
            ),

            (Empty | Logged, Sse) => Ok((*self, ())),
            (Created { .. }, Sse) => Err(TransitionError::out_of_order(
                step,
                "server-side encryption must be configured before main bucket",
            )),

            (Empty, Bucket) => Ok((Created { logged: false }, ())),
            (Logged, Bucket) => Ok((Created { logged: true }, ())),
            (Created { .. }, Bucket) => Err(TransitionError::already_configured(step, "bucket")),

            (_, Cname) => Ok((*self, ())),

            (Created { .. }, PublicAccessBlock | ReadAccess | ReadPolicy | SyncPolicy | WritePolicy) => {
                Ok((*self, ()))
            }
            (Empty | Logged, _) => Err(TransitionError::out_of_order(step, "bucket not defined yet")),
        }
    }
}

/// Bucket with optional access logs, encryption and grants
#[derive(Debug)]
pub struct ObjectBucket {
    component: Component,
    bucket_name: String,
    stage: StageTracker<BucketStage>,
    log_bucket: Option<ResourceHandle>,
    bucket: Option<ResourceHandle>,
    sse: Option<Deferred<Value>>,
}

impl ObjectBucket {
    pub fn new(deployment: &Deployment, bucket_name: impl Into<String>) -> Self {
        let bucket_name = bucket_name.into();
        let component = Component::new(deployment, "ObjectBucket", bucket_name.clone());
        Self {
            stage: StageTracker::new(component.label(), BucketStage::Empty),
            component,
            bucket_name,
            log_bucket: None,
            bucket: None,
            sse: None,
        }
    }

    /// Create a dedicated access-log bucket
    pub fn with_access_logs(mut self, expiration_days: u32, force_destroy: bool) -> StackResult<Self> {
        self.stage.advance(BucketStep::AccessLogs)?;

        let log_bucket = self.component.register(ResourceRequest::new(
            ResourceKind::Bucket,
            format!("access-logs-{}", self.bucket_name),
            Properties::new()
                .set("forceDestroy", force_destroy)
                .set("acl", "log-delivery-write")
                .set(
                    "lifecycleRules",
                    json!([{
                        "enabled": true,
                        "id": "log",
                        "prefix": "",
                        "tags": { "autoclean": "true", "rule": "log" },
                        "expiration": { "days": expiration_days },
                    }]),
                )
                .set("tags", json!({ "logs": "true" })),
        ))?;
        self.public_access_block(&log_bucket)?;
        self.log_bucket = Some(log_bucket);
        Ok(self)
    }

    /// Log to a bucket created elsewhere
    pub fn with_existing_log_bucket(mut self, log_bucket: &ResourceHandle) -> StackResult<Self> {
        self.stage.advance(BucketStep::ExistingLogBucket)?;
        self.log_bucket = Some(log_bucket.clone());
        Ok(self)
    }

    /// Default encryption for the main bucket
    ///
    /// KMS encryption without a key id leaves the bucket unencrypted.
    pub fn with_sse(mut self, kms_master_key_id: Option<Deferred<String>>, algorithm: SseAlgorithm) -> StackResult<Self> {
        self.stage.advance(BucketStep::Sse)?;
        self.sse = match (kms_master_key_id, algorithm) {
            (Some(key), algorithm) => Some(key.map(move |key| {
                json!({ "rule": { "applyServerSideEncryptionByDefault": {
                    "kmsMasterKeyId": key,
                    "sseAlgorithm": algorithm.as_str(),
                } } })
            })),
            (None, SseAlgorithm::Aes256) => Some(Deferred::ready(json!({
                "rule": { "applyServerSideEncryptionByDefault": { "sseAlgorithm": "AES256" } }
            }))),
            (None, SseAlgorithm::Kms) => None,
        };
        Ok(self)
    }

    /// Create the main bucket
    pub fn with_bucket(mut self, options: BucketOptions) -> StackResult<Self> {
        self.stage.advance(BucketStep::Bucket)?;

        let name = self.bucket_name.clone();
        let loggings = self.log_bucket.as_ref().map(|log| {
            let prefix = name.clone();
            log.id()
                .map(move |target| json!([{ "targetBucket": target, "targetPrefix": prefix }]))
        });

        let request = ResourceRequest::new(
            ResourceKind::Bucket,
            name.clone(),
            Properties::new()
                .set_opt("bucket", options.override_name.then(|| name.clone()))
                .set("forceDestroy", options.force_destroy)
                .set_deferred_opt("serverSideEncryptionConfiguration", self.sse.as_ref())
                .set_deferred_opt("loggings", loggings.as_ref()),
        )
        .import(options.import.then(|| name.clone()));

        let bucket = self.component.register(request)?;
        self.component.add_output(&name, bucket.output("bucket"));
        self.bucket = Some(bucket);
        Ok(self)
    }

    /// DNS CNAME pointing at the bucket endpoint
    pub fn with_cname(mut self, zone_id: impl Into<Deferred<String>>, ttl: u32) -> StackResult<Self> {
        self.stage.advance(BucketStep::Cname)?;
        let region = self.component.deployment().context().region.clone();
        self.component.register(ResourceRequest::new(
            ResourceKind::DnsRecord,
            format!("cname-{}", self.bucket_name),
            Properties::new()
                .set("name", self.bucket_name.clone())
                .set(
                    "records",
                    json!([format!("{}.s3.{region}.amazonaws.com", self.bucket_name)]),
                )
                .set("ttl", ttl)
                .set("type", "CNAME")
                .set_deferred("zoneId", &zone_id.into()),
        ))?;
        Ok(self)
    }

    pub fn with_public_access_block(mut self) -> StackResult<Self> {
        self.stage.advance(BucketStep::PublicAccessBlock)?;
        let bucket = self.require_bucket(BucketStep::PublicAccessBlock)?;
        self.public_access_block(&bucket)?;
        Ok(self)
    }

    /// Bucket policy allowing `s3:GetObject` to `principal`
    pub fn with_read_access(mut self, principal: impl Into<Deferred<Principal>>) -> StackResult<Self> {
        self.stage.advance(BucketStep::ReadAccess)?;
        let bucket = self.require_bucket(BucketStep::ReadAccess)?;

        let policy = all2(&principal.into(), &bucket.arn())
            .and_then(|(principal, arn)| PolicyFactory::bucket_principal_read(&arn, principal).to_json_string());

        self.component.register(ResourceRequest::new(
            ResourceKind::BucketPolicy,
            format!("{}-policy", self.bucket_name),
            Properties::new()
                .set_deferred("bucket", &bucket.id())
                .set_deferred("policy", &policy),
        ))?;
        Ok(self)
    }

    pub fn with_anonymous_read_access(self) -> StackResult<Self> {
        self.with_read_access(Principal::Anyone)
    }

    /// IAM policy for object reads; returns the policy ARN
    pub fn create_read_policy(&mut self) -> StackResult<Deferred<String>> {
        self.bucket_policy(BucketStep::ReadPolicy, "ReadPolicyForBucket", PolicyFactory::bucket_read)
    }

    /// IAM policy for read, write, delete and list; returns the policy ARN
    pub fn create_sync_policy(&mut self) -> StackResult<Deferred<String>> {
        self.bucket_policy(BucketStep::SyncPolicy, "SyncPolicyForBucket", PolicyFactory::bucket_sync)
    }

    /// IAM policy for object writes; returns the policy ARN
    pub fn create_write_policy(&mut self) -> StackResult<Deferred<String>> {
        self.bucket_policy(BucketStep::WritePolicy, "WritePolicyForBucket", PolicyFactory::bucket_write)
    }

    pub fn name(&self) -> &str {
        &self.bucket_name
    }

    pub fn bucket(&self) -> Option<&ResourceHandle> {
        self.bucket.as_ref()
    }

    pub fn log_bucket(&self) -> Option<&ResourceHandle> {
        self.log_bucket.as_ref()
    }

    pub fn stage(&self) -> &BucketStage {
        self.stage.current()
    }

    pub fn component(&self) -> &Component {
        &self.component
    }

    fn bucket_policy(
        &mut self,
        step: BucketStep,
        prefix: &str,
        document: fn(&str) -> PolicyDocument,
    ) -> StackResult<Deferred<String>> {
        self.stage.advance(step)?;
        let bucket = self.require_bucket(step)?;
        let policy = identity::create_policy(
            &self.component,
            &format!("{prefix}-{}", self.bucket_name),
            &bucket.arn().map(move |arn| document(&arn)),
        )?;
        Ok(policy.arn())
    }

    fn require_bucket(&self, step: BucketStep) -> StackResult<ResourceHandle> {
        self.bucket.clone().ok_or_else(|| StackError::ConfigurationOrder {
            builder: self.component.label(),
            step: step.name().to_string(),
            reason: "bucket not defined yet".to_string(),
        })
    }

    fn public_access_block(&self, bucket: &ResourceHandle) -> StackResult<ResourceHandle> {
        self.component.register(
            ResourceRequest::new(
                ResourceKind::BucketPublicAccessBlock,
                format!("{}-PAB", bucket.name()),
                Properties::new()
                    .set_deferred("bucket", &bucket.id())
                    .set("restrictPublicBuckets", true)
                    .set("blockPublicAcls", true)
                    .set("blockPublicPolicy", true)
                    .set("ignorePublicAcls", true),
            )
            .depends_on(bucket),
        )
    }
}
