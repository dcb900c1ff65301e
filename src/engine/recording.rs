// Copyright (c) 2025 - Cowboy AI, Inc.
//! Recording engine - provisions nothing, remembers everything
//!
//! Useful for tests and plan output. Physical ids, ARNs and the outputs a
//! real engine would report are synthesised deterministically from the
//! logical name, so repeated runs produce the same plan.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

use super::{EngineError, ProvisionedResource, ProvisioningEngine, SubmittedRequest};
use crate::deployment::{ResourceId, ResourceKind};

#[derive(Debug, Default)]
struct Recorded {
    submissions: Vec<SubmittedRequest>,
}

/// In-memory engine that records submissions in order
#[derive(Debug, Clone)]
pub struct RecordingEngine {
    region: String,
    account: String,
    failing: Arc<BTreeSet<ResourceId>>,
    stack_outputs: Arc<BTreeMap<String, Value>>,
    recorded: Arc<Mutex<Recorded>>,
}

impl RecordingEngine {
    pub fn new(region: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            account: account.into(),
            failing: Arc::new(BTreeSet::new()),
            stack_outputs: Arc::new(BTreeMap::new()),
            recorded: Arc::new(Mutex::new(Recorded::default())),
        }
    }

    /// Reject the named resource when it is submitted
    pub fn fail_on(mut self, kind: ResourceKind, name: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.failing).insert(ResourceId::new(kind, name));
        self
    }

    /// Outputs reported for a stack reference to `stack_name`
    pub fn with_stack_outputs(mut self, stack_name: impl Into<String>, outputs: Value) -> Self {
        Arc::make_mut(&mut self.stack_outputs).insert(stack_name.into(), outputs);
        self
    }

    /// Every submission so far, in submission order
    pub fn submissions(&self) -> Vec<SubmittedRequest> {
        self.recorded.lock().submissions.clone()
    }

    /// Submission for one resource
    pub fn submission(&self, kind: ResourceKind, name: &str) -> Option<SubmittedRequest> {
        self.recorded
            .lock()
            .submissions
            .iter()
            .find(|s| s.id.kind == kind && s.id.name == name)
            .cloned()
    }

    /// Submission index of one resource
    pub fn position(&self, kind: ResourceKind, name: &str) -> Option<usize> {
        self.recorded
            .lock()
            .submissions
            .iter()
            .position(|s| s.id.kind == kind && s.id.name == name)
    }

    /// Submissions of one kind
    pub fn submissions_of(&self, kind: ResourceKind) -> Vec<SubmittedRequest> {
        self.recorded
            .lock()
            .submissions
            .iter()
            .filter(|s| s.id.kind == kind)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.recorded.lock().submissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recorded.lock().submissions.is_empty()
    }

    /// Clear recorded submissions
    pub fn clear(&self) {
        self.recorded.lock().submissions.clear();
    }

    fn physical_id(&self, request: &SubmittedRequest) -> String {
        let explicit = match request.id.kind {
            ResourceKind::Bucket => request.property_str("bucket"),
            ResourceKind::StackReference => request.property_str("name"),
            ResourceKind::Queue | ResourceKind::Topic => None,
            _ => request.property_str("name"),
        };
        match explicit {
            Some(name) => name.to_string(),
            None => {
                let base = match request.id.kind {
                    ResourceKind::Queue => request
                        .property_str("namePrefix")
                        .unwrap_or(request.id.name.as_str()),
                    _ => request.id.name.as_str(),
                };
                format!("{}-{}", base.trim_end_matches('-'), short_hash(&request.id))
            }
        }
    }

    fn arn(&self, kind: ResourceKind, physical: &str) -> String {
        let (region, account) = (&self.region, &self.account);
        match kind {
            ResourceKind::Bucket => format!("arn:aws:s3:::{physical}"),
            ResourceKind::Queue => format!("arn:aws:sqs:{region}:{account}:{physical}"),
            ResourceKind::Topic => format!("arn:aws:sns:{region}:{account}:{physical}"),
            ResourceKind::Function => {
                format!("arn:aws:lambda:{region}:{account}:function:{physical}")
            }
            ResourceKind::IamPolicy => format!("arn:aws:iam::{account}:policy/{physical}"),
            ResourceKind::IamRole => format!("arn:aws:iam::{account}:role/{physical}"),
            ResourceKind::IamGroup => format!("arn:aws:iam::{account}:group/{physical}"),
            ResourceKind::IamUser => format!("arn:aws:iam::{account}:user/{physical}"),
            ResourceKind::KmsKey => format!("arn:aws:kms:{region}:{account}:key/{physical}"),
            ResourceKind::Secret => {
                format!("arn:aws:secretsmanager:{region}:{account}:secret:{physical}")
            }
            ResourceKind::RestApi => format!("arn:aws:apigateway:{region}::/restapis/{physical}"),
            ResourceKind::LogGroup => {
                format!("arn:aws:logs:{region}:{account}:log-group:{physical}")
            }
            ResourceKind::Table => format!("arn:aws:dynamodb:{region}:{account}:table/{physical}"),
            ResourceKind::Certificate => {
                format!("arn:aws:acm:{region}:{account}:certificate/{physical}")
            }
            other => format!(
                "arn:aws:{}:{region}:{account}:{}/{physical}",
                other.service(),
                other.as_str()
            ),
        }
    }

    fn outputs(&self, request: &SubmittedRequest, physical: &str, arn: &str) -> Value {
        let mut outputs = match &request.properties {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        outputs.insert("id".to_string(), json!(physical));
        outputs.insert("arn".to_string(), json!(arn));
        outputs
            .entry("name".to_string())
            .or_insert_with(|| json!(physical));

        let hash = short_hash(&request.id);
        let region = &self.region;
        match request.id.kind {
            ResourceKind::Bucket => {
                outputs.insert("bucket".to_string(), json!(physical));
            }
            ResourceKind::Queue => {
                outputs.insert(
                    "url".to_string(),
                    json!(format!(
                        "https://sqs.{region}.amazonaws.com/{}/{physical}",
                        self.account
                    )),
                );
            }
            ResourceKind::KmsKey => {
                outputs.insert("keyId".to_string(), json!(physical));
            }
            ResourceKind::RestApi => {
                outputs.insert("rootResourceId".to_string(), json!(format!("{hash}root")));
            }
            ResourceKind::ApiDomainName => {
                outputs.insert(
                    "regionalDomainName".to_string(),
                    json!(format!("d-{hash}.execute-api.{region}.amazonaws.com")),
                );
                outputs.insert("regionalZoneId".to_string(), json!("ZRECORDED0000"));
            }
            ResourceKind::DnsRecord => {
                let fqdn = request.property_str("name").unwrap_or(physical).to_string();
                outputs.insert("fqdn".to_string(), json!(fqdn));
            }
            ResourceKind::Certificate => {
                let domain = request
                    .property_str("domainName")
                    .unwrap_or(physical)
                    .trim_start_matches("*.")
                    .to_string();
                outputs.insert(
                    "domainValidationOptions".to_string(),
                    json!([{
                        "domainName": domain,
                        "resourceRecordName": format!("_{hash}.{domain}."),
                        "resourceRecordType": "CNAME",
                        "resourceRecordValue": format!("_{hash}.acm-validations.aws."),
                    }]),
                );
            }
            ResourceKind::StackReference => {
                let stack = request.property_str("name").unwrap_or(physical);
                outputs.insert(
                    "outputs".to_string(),
                    self.stack_outputs
                        .get(stack)
                        .cloned()
                        .unwrap_or_else(|| json!({})),
                );
            }
            _ => {}
        }
        Value::Object(outputs)
    }
}

#[async_trait]
impl ProvisioningEngine for RecordingEngine {
    async fn provision(&self, request: &SubmittedRequest) -> Result<ProvisionedResource, EngineError> {
        if self.failing.contains(&request.id) {
            debug!(resource = %request.id, "Recording engine rejecting resource");
            return Err(EngineError::Rejected {
                resource: request.id.to_string(),
                reason: "configured to fail".to_string(),
            });
        }

        let physical = self.physical_id(request);
        let arn = self.arn(request.id.kind, &physical);
        let outputs = self.outputs(request, &physical, &arn);

        self.recorded.lock().submissions.push(request.clone());
        debug!(resource = %request.id, physical = %physical, "Recorded submission");

        Ok(ProvisionedResource {
            id: physical,
            arn,
            outputs,
        })
    }
}

fn short_hash(id: &ResourceId) -> String {
    let digest = Sha256::digest(id.to_string().as_bytes());
    hex::encode(&digest[..4])
}
