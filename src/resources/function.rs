// Copyright (c) 2025 - Cowboy AI, Inc.
//! Serverless function builders
//!
//! Three shapes share one request layout:
//! - `BackendFunction`: a plain function, optionally invokable by a service
//! - `QueueSubscriberFunction`: triggered by a queue, always with its own DLQ
//! - `QueueToBucketSyncFunction`: a queue subscriber writing into a bucket
//!
//! A function without an explicit role gets `{name}-role`, assumable by the
//! function service, with the function's policies attached.

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::deferred::{Deferred, Properties};
use crate::deployment::{Component, Deployment, Registrar, ResourceHandle, ResourceKind, ResourceRequest};
use crate::errors::{StackError, StackResult};
use crate::identity;
use crate::policy::managed::{AWS_LAMBDA_BASIC_EXECUTION_ROLE, AWS_LAMBDA_SQS_QUEUE_EXECUTION_ROLE};
use crate::resources::bucket::ObjectBucket;
use crate::resources::queue::{create_send_message_policy, DEAD_LETTER_RETENTION_SECONDS};

pub const DEFAULT_RUNTIME: &str = "nodejs12.x";
pub const DEFAULT_TIMEOUT_SECONDS: u32 = 30;

/// Messages handed to a queue subscriber per invocation
pub const QUEUE_TRIGGER_BATCH_SIZE: u32 = 10;

/// Where the deployment package comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionCode {
    /// Local zip archive
    Archive(PathBuf),
    /// Object in a bucket
    Object { bucket: String, key: String },
}

impl FunctionCode {
    fn to_json(&self) -> Value {
        match self {
            FunctionCode::Archive(path) => json!({ "archive": path.display().to_string() }),
            FunctionCode::Object { bucket, key } => json!({ "s3Bucket": bucket, "s3Key": key }),
        }
    }
}

/// Function settings
#[derive(Debug, Clone)]
pub struct FunctionArgs {
    pub handler: String,
    pub code: FunctionCode,
    /// Defaults to `nodejs12.x`
    pub runtime: Option<String>,
    /// Seconds, defaults to 30
    pub timeout: Option<u32>,
    pub memory_size: Option<u32>,
    pub environment: BTreeMap<String, Deferred<String>>,
    pub dead_letter_target: Option<Deferred<String>>,
    pub role: Option<Deferred<String>>,
    /// Policy ARNs for the generated role
    pub policies: Vec<Deferred<String>>,
}

impl FunctionArgs {
    pub fn new(handler: impl Into<String>, code: FunctionCode) -> Self {
        Self {
            handler: handler.into(),
            code,
            runtime: None,
            timeout: None,
            memory_size: None,
            environment: BTreeMap::new(),
            dead_letter_target: None,
            role: None,
            policies: Vec::new(),
        }
    }

    pub fn runtime(mut self, runtime: impl Into<String>) -> Self {
        self.runtime = Some(runtime.into());
        self
    }

    pub fn timeout(mut self, seconds: u32) -> Self {
        self.timeout = Some(seconds);
        self
    }

    pub fn memory_size(mut self, megabytes: u32) -> Self {
        self.memory_size = Some(megabytes);
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<Deferred<String>>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn dead_letter_target(mut self, arn: impl Into<Deferred<String>>) -> Self {
        self.dead_letter_target = Some(arn.into());
        self
    }

    pub fn role(mut self, arn: impl Into<Deferred<String>>) -> Self {
        self.role = Some(arn.into());
        self
    }

    pub fn policy(mut self, arn: impl Into<Deferred<String>>) -> Self {
        self.policies.push(arn.into());
        self
    }
    /// Queue subscribers get a generated role and dead-letter queue
    pub fn check_queue_subscriber(&self, name: &str) -> StackResult<()> {
        if self.dead_letter_target.is_some() {
            return Err(StackError::InvalidConfiguration(format!(
                "queue subscriber {name}: a dead-letter queue is always created, remove the dead-letter target"
            )));
        }
        if self.role.is_some() {
            return Err(StackError::InvalidConfiguration(format!(
                "queue subscriber {name}: the execution role is generated, remove the role"
            )));
        }
        Ok(())
    }
}

/// Register the function and, when needed, its execution role
fn create_function(registrar: &impl Registrar, name: &str, args: FunctionArgs) -> StackResult<ResourceHandle> {
    let role = match (args.role, args.policies.is_empty()) {
        (Some(_), false) => {
            return Err(StackError::InvalidConfiguration(format!(
                "function {name}: policies cannot be attached to an explicit role"
            )))
        }
        (Some(role), true) => role,
        (None, no_policies) => {
            let policies = if no_policies {
                vec![Deferred::<String>::from(AWS_LAMBDA_BASIC_EXECUTION_ROLE)]
            } else {
                args.policies
            };
            identity::create_service_role_with_policy(registrar, &format!("{name}-role"), &["lambda"], &policies)?
                .arn()
        }
    };

    let environment = (!args.environment.is_empty()).then(|| {
        args.environment
            .iter()
            .fold(Properties::new(), |vars, (key, value)| vars.set_deferred(key.clone(), value))
            .build()
            .map(|variables| json!({ "variables": variables }))
    });
    let dead_letter = args
        .dead_letter_target
        .as_ref()
        .map(|target| target.map(|arn| json!({ "targetArn": arn })));

    registrar.register(ResourceRequest::new(
        ResourceKind::Function,
        name,
        Properties::new()
            .set("handler", args.handler)
            .set("code", args.code.to_json())
            .set("runtime", args.runtime.unwrap_or_else(|| DEFAULT_RUNTIME.to_string()))
            .set("timeout", args.timeout.unwrap_or(DEFAULT_TIMEOUT_SECONDS))
            .set_opt("memorySize", args.memory_size)
            .set_deferred("role", &role)
            .set_deferred_opt("environment", environment.as_ref())
            .set_deferred_opt("deadLetterConfig", dead_letter.as_ref()),
    ))
}

/// Plain function
#[derive(Debug)]
pub struct BackendFunction {
    component: Component,
    function: ResourceHandle,
}

impl BackendFunction {
    pub fn new(deployment: &Deployment, name: impl Into<String>, args: FunctionArgs) -> StackResult<Self> {
        let component = Component::new(deployment, "BackendFunction", name);
        let function = create_function(&component, component.name(), args)?;
        component.add_dependencies([&function]);
        Ok(Self { component, function })
    }

    /// Let `service` invoke the function from `source_arn`
    pub fn with_execute_permission(self, service: &str, source_arn: impl Into<Deferred<String>>) -> StackResult<Self> {
        self.component.register(ResourceRequest::new(
            ResourceKind::FunctionPermission,
            format!("{}-invoke", self.component.name()),
            Properties::new()
                .set_deferred("function", &self.function.arn())
                .set("action", "lambda:InvokeFunction")
                .set("principal", format!("{service}.amazonaws.com"))
                .set_deferred("sourceArn", &source_arn.into()),
        ))?;
        Ok(self)
    }

    pub fn function(&self) -> &ResourceHandle {
        &self.function
    }

    pub fn component(&self) -> &Component {
        &self.component
    }
}

/// Function consuming a queue
#[derive(Debug)]
pub struct QueueSubscriberFunction {
    component: Component,
    function: ResourceHandle,
    dead_letter_queue: ResourceHandle,
    trigger: ResourceHandle,
}

impl QueueSubscriberFunction {
    /// Fails with `InvalidConfiguration` when `args` carry a dead-letter
    /// target; the function always gets its own `{name}-function-dlq`.
    pub fn new(
        deployment: &Deployment,
        name: impl Into<String>,
        queue: &ResourceHandle,
        args: FunctionArgs,
    ) -> StackResult<Self> {
        let name = name.into();
        args.check_queue_subscriber(&name)?;

        let component = Component::new(deployment, "QueueSubscriberFunction", name.clone());
        // Encrypted like the source queue; an unencrypted queue reports no key
        let dead_letter_queue = component.register(ResourceRequest::new(
            ResourceKind::Queue,
            format!("{name}-function-dlq"),
            Properties::new()
                .set("messageRetentionSeconds", DEAD_LETTER_RETENTION_SECONDS)
                .set_deferred("kmsMasterKeyId", &queue.output("kmsMasterKeyId")),
        ))?;
        let send_policy = create_send_message_policy(&component, &name, &[queue.arn(), dead_letter_queue.arn()])?;

        let mut policies = vec![send_policy.arn(), Deferred::<String>::from(AWS_LAMBDA_SQS_QUEUE_EXECUTION_ROLE)];
        policies.extend(args.policies.iter().cloned());
        let args = FunctionArgs {
            dead_letter_target: Some(dead_letter_queue.arn()),
            policies,
            ..args
        };
        let function = create_function(&component, &name, args)?;

        let trigger = component.register(ResourceRequest::new(
            ResourceKind::EventSourceMapping,
            format!("{name}-trigger"),
            Properties::new()
                .set_deferred("eventSourceArn", &queue.arn())
                .set_deferred("functionName", &function.arn())
                .set("batchSize", QUEUE_TRIGGER_BATCH_SIZE),
        ))?;
        component.add_dependencies([&function]);

        Ok(Self {
            component,
            function,
            dead_letter_queue,
            trigger,
        })
    }

    pub fn function(&self) -> &ResourceHandle {
        &self.function
    }

    pub fn dead_letter_queue(&self) -> &ResourceHandle {
        &self.dead_letter_queue
    }

    pub fn trigger(&self) -> &ResourceHandle {
        &self.trigger
    }

    pub fn component(&self) -> &Component {
        &self.component
    }
}

/// Queue subscriber writing message batches into a bucket
#[derive(Debug)]
pub struct QueueToBucketSyncFunction {
    component: Component,
    subscriber: QueueSubscriberFunction,
}

/// Handler of the bundled sync function
pub const BUCKET_SYNC_HANDLER: &str = "index.sync";

impl QueueToBucketSyncFunction {
    /// `bucket` must already have its main bucket
    pub fn new(
        deployment: &Deployment,
        name: impl Into<String>,
        queue: &ResourceHandle,
        bucket: &mut ObjectBucket,
        code: FunctionCode,
    ) -> StackResult<Self> {
        let name = name.into();
        let component = Component::new(deployment, "QueueToBucketSyncFunction", name.clone());
        let bucket_name = bucket
            .bucket()
            .map(|b| b.output_str("bucket"))
            .ok_or_else(|| StackError::ConfigurationOrder {
                builder: component.label(),
                step: "new".to_string(),
                reason: format!("bucket {} not defined yet", bucket.name()),
            })?;
        let write_policy = bucket.create_write_policy()?;

        let subscriber = QueueSubscriberFunction::new(
            deployment,
            name,
            queue,
            FunctionArgs::new(BUCKET_SYNC_HANDLER, code)
                .env("bucketName", bucket_name)
                .policy(write_policy),
        )?;
        component.add_dependencies([subscriber.function()]);
        Ok(Self { component, subscriber })
    }

    pub fn subscriber(&self) -> &QueueSubscriberFunction {
        &self.subscriber
    }

    pub fn function(&self) -> &ResourceHandle {
        self.subscriber.function()
    }

    pub fn component(&self) -> &Component {
        &self.component
    }
}
