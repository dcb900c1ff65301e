// Copyright (c) 2025 - Cowboy AI, Inc.
//! Message queues, dead-letter queues and queue policies

use serde::{Deserialize, Serialize};

use crate::deferred::{all, Deferred, Properties};
use crate::deployment::{Registrar, ResourceHandle, ResourceKind, ResourceRequest};
use crate::errors::StackResult;
use crate::identity;
use crate::policy::PolicyFactory;

/// Retention of dead-letter queues, 14 days
pub const DEAD_LETTER_RETENTION_SECONDS: u32 = 1_209_600;

/// Deliveries before a message moves to the dead-letter queue
pub const DEFAULT_MAX_RECEIVE_COUNT: u32 = 10;

/// Redrive settings of a queue, serialized into its `redrivePolicy`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedrivePolicy {
    pub dead_letter_target_arn: String,
    pub max_receive_count: u32,
}

impl RedrivePolicy {
    pub fn new(dead_letter_target_arn: impl Into<String>) -> Self {
        Self {
            dead_letter_target_arn: dead_letter_target_arn.into(),
            max_receive_count: DEFAULT_MAX_RECEIVE_COUNT,
        }
    }
}

/// Queue settings; unset fields are left to the provider defaults
#[derive(Debug, Clone, Default)]
pub struct QueueSpec {
    pub name_prefix: Option<String>,
    pub message_retention_seconds: Option<u32>,
    pub visibility_timeout_seconds: Option<u32>,
    pub max_message_size: Option<u32>,
    pub kms_master_key_id: Option<Deferred<String>>,
    pub redrive_policy: Option<Deferred<RedrivePolicy>>,
    /// Queue access policy, JSON text
    pub policy: Option<Deferred<String>>,
}

impl QueueSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = Some(prefix.into());
        self
    }

    pub fn retention(mut self, seconds: u32) -> Self {
        self.message_retention_seconds = Some(seconds);
        self
    }

    pub fn visibility_timeout(mut self, seconds: u32) -> Self {
        self.visibility_timeout_seconds = Some(seconds);
        self
    }

    pub fn max_message_size(mut self, bytes: u32) -> Self {
        self.max_message_size = Some(bytes);
        self
    }

    pub fn kms_key(mut self, key_id: Option<Deferred<String>>) -> Self {
        self.kms_master_key_id = key_id;
        self
    }

    pub fn redrive(mut self, policy: Deferred<RedrivePolicy>) -> Self {
        self.redrive_policy = Some(policy);
        self
    }

    pub fn policy(mut self, policy: Deferred<String>) -> Self {
        self.policy = Some(policy);
        self
    }
}

pub fn create_queue(registrar: &impl Registrar, name: &str, spec: QueueSpec) -> StackResult<ResourceHandle> {
    let redrive = spec
        .redrive_policy
        .as_ref()
        .map(|policy| policy.and_then(|policy| serde_json::to_string(&policy)));

    registrar.register(ResourceRequest::new(
        ResourceKind::Queue,
        name,
        Properties::new()
            .set_opt("namePrefix", spec.name_prefix)
            .set_opt("messageRetentionSeconds", spec.message_retention_seconds)
            .set_opt("visibilityTimeoutSeconds", spec.visibility_timeout_seconds)
            .set_opt("maxMessageSize", spec.max_message_size)
            .set_deferred_opt("kmsMasterKeyId", spec.kms_master_key_id.as_ref())
            .set_deferred_opt("redrivePolicy", redrive.as_ref())
            .set_deferred_opt("policy", spec.policy.as_ref()),
    ))
}

/// Dead-letter queue with 14 days retention
pub fn create_dead_letter_queue(
    registrar: &impl Registrar,
    name: &str,
    kms_master_key_id: Option<Deferred<String>>,
) -> StackResult<ResourceHandle> {
    create_queue(
        registrar,
        name,
        QueueSpec::new()
            .retention(DEAD_LETTER_RETENTION_SECONDS)
            .kms_key(kms_master_key_id),
    )
}

/// Redrive policy targeting `dead_letter_queue`
pub fn redrive_policy(dead_letter_queue: &ResourceHandle) -> Deferred<RedrivePolicy> {
    dead_letter_queue.arn().map(RedrivePolicy::new)
}

/// Queue policy letting `service` deliver from `source_arn` only
pub fn publish_policy(source_arn: &Deferred<String>, service: &str) -> Deferred<String> {
    let service = service.to_string();
    source_arn.and_then(move |arn| PolicyFactory::queue_publish_from_source(&arn, &service).to_json_string())
}

/// IAM policy `{name}-policy` allowing `sqs:SendMessage` on the queues
pub fn create_send_message_policy(
    registrar: &impl Registrar,
    name: &str,
    queue_arns: &[Deferred<String>],
) -> StackResult<ResourceHandle> {
    let document = all(queue_arns).map(|arns| PolicyFactory::queue_send_message(&arns));
    identity::create_policy(registrar, &format!("{name}-policy"), &document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StackConfig;
    use crate::context::StackContext;
    use crate::deployment::Deployment;
    use crate::engine::RecordingEngine;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn deployment() -> Deployment {
        Deployment::new(StackContext::new(
            "ingest",
            "dev",
            "eu-west-1",
            StackConfig::new("cowboy"),
            "123456789012",
        ))
    }

    #[test]
    fn test_redrive_policy_wire_format() {
        let policy = RedrivePolicy::new("arn:aws:sqs:eu-west-1:123456789012:orders-dlq");
        assert_eq!(
            serde_json::to_value(&policy).unwrap(),
            json!({
                "deadLetterTargetArn": "arn:aws:sqs:eu-west-1:123456789012:orders-dlq",
                "maxReceiveCount": 10
            })
        );
    }

    #[tokio::test]
    async fn test_queue_with_redrive() {
        let deployment = deployment();
        let dlq = create_dead_letter_queue(&deployment, "orders-dlq", None).unwrap();
        let queue = create_queue(
            &deployment,
            "orders",
            QueueSpec::new().visibility_timeout(30).redrive(redrive_policy(&dlq)),
        )
        .unwrap();

        assert!(deployment
            .request(ResourceKind::Queue, "orders")
            .unwrap()
            .dependencies()
            .contains(dlq.resource_id()));

        let engine = RecordingEngine::new("eu-west-1", "123456789012");
        deployment.apply(&engine).await.unwrap();

        let submitted = engine.submission(ResourceKind::Queue, "orders").unwrap();
        let redrive: RedrivePolicy =
            serde_json::from_str(submitted.property_str("redrivePolicy").unwrap()).unwrap();
        assert_eq!(redrive.dead_letter_target_arn, dlq.arn().peek().unwrap().unwrap());
        assert_eq!(redrive.max_receive_count, DEFAULT_MAX_RECEIVE_COUNT);

        let dlq = engine.submission(ResourceKind::Queue, "orders-dlq").unwrap();
        assert_eq!(dlq.property("messageRetentionSeconds"), Some(&json!(1_209_600)));
        assert!(dlq.property("kmsMasterKeyId").is_none());
        assert!(queue.arn().is_resolved());
    }
}
