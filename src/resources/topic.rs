// Copyright (c) 2025 - Cowboy AI, Inc.
//! Notification topics, topic policies and queue subscriptions

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::deferred::{all, all2, Deferred, Properties};
use crate::deployment::{Registrar, ResourceHandle, ResourceKind, ResourceRequest};
use crate::errors::StackResult;
use crate::identity;
use crate::policy::{PolicyDocument, PolicyFactory};

/// Protocols that report delivery feedback
pub const FEEDBACK_PROTOCOLS: [&str; 4] = ["http", "lambda", "sqs", "application"];

/// Actions grantable through a topic policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TopicAction {
    #[serde(rename = "sns:Publish")]
    Publish,
    #[serde(rename = "sns:Subscribe")]
    Subscribe,
}

impl TopicAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicAction::Publish => "sns:Publish",
            TopicAction::Subscribe => "sns:Subscribe",
        }
    }
}

impl fmt::Display for TopicAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct TopicSpec {
    /// Role receiving success and failure feedback for every protocol
    pub feedback_role_arn: Option<Deferred<String>>,
    pub success_feedback_sample_rate: u32,
    pub kms_master_key_id: Option<Deferred<String>>,
}

impl Default for TopicSpec {
    fn default() -> Self {
        Self {
            feedback_role_arn: None,
            success_feedback_sample_rate: 100,
            kms_master_key_id: None,
        }
    }
}

pub fn create_topic(registrar: &impl Registrar, name: &str, spec: TopicSpec) -> StackResult<ResourceHandle> {
    let mut properties = Properties::new();
    if let Some(role) = &spec.feedback_role_arn {
        for protocol in FEEDBACK_PROTOCOLS {
            properties = properties
                .set_deferred(format!("{protocol}FailureFeedbackRoleArn"), role)
                .set_deferred(format!("{protocol}SuccessFeedbackRoleArn"), role)
                .set(
                    format!("{protocol}SuccessFeedbackSampleRate"),
                    spec.success_feedback_sample_rate,
                );
        }
    }
    properties = properties.set_deferred_opt("kmsMasterKeyId", spec.kms_master_key_id.as_ref());

    registrar.register(ResourceRequest::new(ResourceKind::Topic, name, properties))
}

/// Attach a resource policy to `topic`
pub fn create_topic_policy(
    registrar: &impl Registrar,
    name: &str,
    topic: &ResourceHandle,
    document: &Deferred<PolicyDocument>,
) -> StackResult<ResourceHandle> {
    let policy = document.and_then(|doc| doc.to_json_string());
    registrar.register(ResourceRequest::new(
        ResourceKind::TopicPolicy,
        name,
        Properties::new()
            .set_deferred("arn", &topic.arn())
            .set_deferred("policy", &policy),
    ))
}

/// Topic policy `{name}-policy` letting the topic deliver to the queues
pub fn create_queue_delivery_policy(
    registrar: &impl Registrar,
    name: &str,
    topic: &ResourceHandle,
    queue_arns: &[Deferred<String>],
) -> StackResult<ResourceHandle> {
    let document = all2(&topic.arn(), &all(queue_arns))
        .map(|(topic_arn, queue_arns)| PolicyFactory::topic_queue_publish(&topic_arn, &queue_arns));
    create_topic_policy(registrar, &format!("{name}-policy"), topic, &document)
}

/// Deliver `topic` messages to `queue`
pub fn create_subscription(
    registrar: &impl Registrar,
    name: &str,
    topic: &ResourceHandle,
    queue: &ResourceHandle,
) -> StackResult<ResourceHandle> {
    registrar.register(ResourceRequest::new(
        ResourceKind::TopicSubscription,
        name,
        Properties::new()
            .set("protocol", "sqs")
            .set_deferred("topic", &topic.arn())
            .set_deferred("endpoint", &queue.arn()),
    ))
}

/// IAM policy allowing publish to every topic, returns its ARN
pub fn create_publisher_policy_for_all_topics(registrar: &impl Registrar) -> StackResult<Deferred<String>> {
    let policy = identity::create_policy(
        registrar,
        "PublisherPolicyForAllTopics",
        &Deferred::ready(PolicyFactory::topic_publish_all()),
    )?;
    Ok(policy.arn())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StackConfig;
    use crate::context::StackContext;
    use crate::deployment::Deployment;
    use crate::resources::queue::{create_queue, QueueSpec};
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
    fn test_feedback_roles_for_every_protocol() {
        let deployment = deployment();
        create_topic(
            &deployment,
            "orders",
            TopicSpec {
                feedback_role_arn: Some("arn:aws:iam::123456789012:role/sns-feedback".into()),
                ..TopicSpec::default()
            },
        )
        .unwrap();

        let request = deployment.request(ResourceKind::Topic, "orders").unwrap();
        for protocol in FEEDBACK_PROTOCOLS {
            assert_eq!(
                request.property(&format!("{protocol}SuccessFeedbackRoleArn")),
                Some(json!("arn:aws:iam::123456789012:role/sns-feedback"))
            );
            assert_eq!(
                request.property(&format!("{protocol}SuccessFeedbackSampleRate")),
                Some(json!(100))
            );
        }
        assert_eq!(request.property("kmsMasterKeyId"), None);
    }

    #[test]
    fn test_subscription_depends_on_topic_and_queue() {
        let deployment = deployment();
        let topic = create_topic(&deployment, "orders", TopicSpec::default()).unwrap();
        let queue = create_queue(&deployment, "orders-audit", QueueSpec::new()).unwrap();
        create_subscription(&deployment, "orders-audit-subscription", &topic, &queue).unwrap();

        let subscription = deployment
            .request(ResourceKind::TopicSubscription, "orders-audit-subscription")
            .unwrap();
        let dependencies = subscription.dependencies();
        assert!(dependencies.contains(topic.resource_id()));
        assert!(dependencies.contains(queue.resource_id()));
    }

    #[test]
    fn test_action_wire_names() {
        assert_eq!(serde_json::to_value(TopicAction::Subscribe).unwrap(), json!("sns:Subscribe"));
        assert_eq!(TopicAction::Publish.to_string(), "sns:Publish");
    }
}
