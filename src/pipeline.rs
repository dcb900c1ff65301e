// Copyright (c) 2025 - Cowboy AI, Inc.
//! Topic pipelines
//!
//! A pipeline is one topic fanned out to subscriber queues. Each subscriber
//! is built in a fixed chain where every step reads the previous step's
//! ARN, so the dependency edges alone order the requests:
//!
//! ```text
//! {topic}-{sub}-dlq ──arn──> redrive policy ──> {topic}-{sub} ──arn──> {topic}-{sub}-subscription
//!                                                     │
//!                                                     └──> function trigger (function subscribers)
//! ```
//!
//! Function and bucket-sync subscribers always get a dead-letter queue.

use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::deferred::{all, all2, Deferred};
use crate::deployment::{Component, Deployment, Registrar, ResourceHandle, ResourceId, ResourceKind};
use crate::errors::{StackError, StackResult};
use crate::policy::PolicyFactory;
use crate::resources::bucket::{BucketOptions, ObjectBucket, SseAlgorithm};
use crate::resources::function::{FunctionArgs, FunctionCode, QueueSubscriberFunction, QueueToBucketSyncFunction};
use crate::resources::queue::{create_dead_letter_queue, create_queue, publish_policy, redrive_policy, QueueSpec};
use crate::resources::topic::{create_subscription, create_topic, create_topic_policy, TopicAction, TopicSpec};

/// Fixed names a function subscriber registers besides its queues
fn function_subscriber_resources(name: &str) -> Vec<(ResourceKind, String)> {
    vec![
        (ResourceKind::Queue, format!("{name}-function-dlq")),
        (ResourceKind::IamPolicy, format!("{name}-policy")),
        (ResourceKind::IamRole, format!("{name}-role")),
        (ResourceKind::Function, name.to_string()),
        (ResourceKind::EventSourceMapping, format!("{name}-trigger")),
    ]
}

/// Access-log retention of bucket-sync subscriber buckets
pub const SYNC_BUCKET_LOG_RETENTION_DAYS: u32 = 30;

/// Handles created for one subscriber queue
#[derive(Debug, Clone)]
pub struct SubscriberQueue {
    pub name: String,
    pub dead_letter_queue: Option<ResourceHandle>,
    pub queue: ResourceHandle,
    pub subscription: ResourceHandle,
}

/// Topic with queue, function and bucket-sync subscribers
#[derive(Debug)]
pub struct TopicPipeline {
    component: Component,
    topic_name: String,
    topic: ResourceHandle,
    kms_master_key_id: Option<Deferred<String>>,
    config: PipelineConfig,
    subscribers: BTreeMap<String, SubscriberQueue>,
    functions: Vec<QueueSubscriberFunction>,
    sync_functions: Vec<QueueToBucketSyncFunction>,
    buckets: Vec<ObjectBucket>,
    policy: Option<ResourceHandle>,
}

impl TopicPipeline {
    /// Create the topic; `service_role_arn` receives delivery feedback
    pub fn new(
        deployment: &Deployment,
        topic_name: impl Into<String>,
        service_role_arn: impl Into<Deferred<String>>,
        kms_master_key_id: Option<Deferred<String>>,
        config: PipelineConfig,
    ) -> StackResult<Self> {
        let topic_name = topic_name.into();
        let component = Component::new(deployment, "TopicPipeline", topic_name.clone());
        let topic = create_topic(
            &component,
            &topic_name,
            TopicSpec {
                feedback_role_arn: Some(service_role_arn.into()),
                success_feedback_sample_rate: config.success_feedback_sample_rate,
                kms_master_key_id: kms_master_key_id.clone(),
            },
        )?;
        info!(topic = %topic_name, "Created topic pipeline");

        Ok(Self {
            component,
            topic_name,
            topic,
            kms_master_key_id,
            config,
            subscribers: BTreeMap::new(),
            functions: Vec::new(),
            sync_functions: Vec::new(),
            buckets: Vec::new(),
            policy: None,
        })
    }

    pub fn with_queue_subscriber(mut self, subscriber_name: &str, with_dead_letter_queue: bool) -> StackResult<Self> {
        self.create_queue_subscriber(subscriber_name, with_dead_letter_queue)?;
        Ok(self)
    }

    /// Queue subscriber consumed by a function named `{topic}-{sub}`
    pub fn with_function_subscriber(mut self, subscriber_name: &str, args: FunctionArgs) -> StackResult<Self> {
        let name = self.qualified(subscriber_name);
        args.check_queue_subscriber(&name)?;
        self.check_unclaimed(subscriber_name, &function_subscriber_resources(&name))?;

        let queue = self.create_queue_subscriber(subscriber_name, true)?;
        let function = QueueSubscriberFunction::new(self.component.deployment(), name, &queue, args)?;
        self.component.add_dependencies([function.function()]);
        self.functions.push(function);
        Ok(self)
    }

    /// Queue subscriber synced into its own encrypted, private bucket
    pub fn with_bucket_sync_subscriber(mut self, subscriber_name: &str, code: FunctionCode) -> StackResult<Self> {
        let name = self.qualified(subscriber_name);
        let mut resources = function_subscriber_resources(&name);
        resources.extend([
            (ResourceKind::Bucket, name.clone()),
            (ResourceKind::Bucket, format!("access-logs-{name}")),
            (ResourceKind::BucketPublicAccessBlock, format!("access-logs-{name}-PAB")),
            (ResourceKind::BucketPublicAccessBlock, format!("{name}-PAB")),
            (ResourceKind::IamPolicy, format!("WritePolicyForBucket-{name}")),
        ]);
        self.check_unclaimed(subscriber_name, &resources)?;

        let queue = self.create_queue_subscriber(subscriber_name, true)?;
        let deployment = self.component.deployment().clone();

        let mut bucket = ObjectBucket::new(&deployment, name.clone())
            .with_access_logs(SYNC_BUCKET_LOG_RETENTION_DAYS, true)?
            .with_sse(self.kms_master_key_id.clone(), SseAlgorithm::Kms)?
            .with_bucket(BucketOptions::default())?
            .with_public_access_block()?;
        let sync = QueueToBucketSyncFunction::new(&deployment, name, &queue, &mut bucket, code)?;

        self.component.add_dependencies([sync.function()]);
        self.sync_functions.push(sync);
        self.buckets.push(bucket);
        Ok(self)
    }

    /// Topic policy `{topic}-policy` granting `actions` to the principals
    pub fn with_policy(mut self, principal_arns: &[Deferred<String>], actions: &[TopicAction]) -> StackResult<Self> {
        if self.policy.is_some() {
            return Err(StackError::DuplicateConfiguration {
                builder: self.component.label(),
                step: "with_policy".to_string(),
                key: format!("{}-policy", self.topic_name),
            });
        }
        let actions: Vec<&'static str> = actions.iter().map(TopicAction::as_str).collect();
        let document = all2(&all(principal_arns), &self.topic.arn())
            .map(move |(principals, topic_arn)| PolicyFactory::topic_access(&topic_arn, &principals, &actions));
        let policy = create_topic_policy(
            &self.component,
            &format!("{}-policy", self.topic_name),
            &self.topic,
            &document,
        )?;
        self.policy = Some(policy);
        Ok(self)
    }

    pub fn topic_name(&self) -> &str {
        &self.topic_name
    }

    pub fn topic(&self) -> &ResourceHandle {
        &self.topic
    }

    pub fn topic_arn(&self) -> Deferred<String> {
        self.topic.arn()
    }

    pub fn subscriber(&self, subscriber_name: &str) -> Option<&SubscriberQueue> {
        self.subscribers.get(subscriber_name)
    }

    pub fn subscribers(&self) -> impl Iterator<Item = &SubscriberQueue> {
        self.subscribers.values()
    }

    pub fn functions(&self) -> &[QueueSubscriberFunction] {
        &self.functions
    }

    pub fn sync_functions(&self) -> &[QueueToBucketSyncFunction] {
        &self.sync_functions
    }

    pub fn buckets(&self) -> &[ObjectBucket] {
        &self.buckets
    }

    pub fn component(&self) -> &Component {
        &self.component
    }

    fn qualified(&self, subscriber_name: &str) -> String {
        format!("{}-{subscriber_name}", self.topic_name)
    }

    /// Fail before enqueuing when a subscriber's resources cannot all be
    /// registered
    fn check_unclaimed(&self, subscriber_name: &str, extra: &[(ResourceKind, String)]) -> StackResult<()> {
        let deployment = self.component.deployment();
        if deployment.is_applied() {
            return Err(StackError::InvalidConfiguration(format!(
                "cannot add subscriber {subscriber_name} after the deployment was applied"
            )));
        }
        if self.subscribers.contains_key(subscriber_name) {
            return Err(StackError::DuplicateConfiguration {
                builder: self.component.label(),
                step: "subscriber".to_string(),
                key: subscriber_name.to_string(),
            });
        }
        let name = self.qualified(subscriber_name);
        let queue_side = [
            (ResourceKind::Queue, format!("{name}-dlq")),
            (ResourceKind::Queue, name.clone()),
            (ResourceKind::TopicSubscription, format!("{name}-subscription")),
        ];
        match queue_side
            .iter()
            .chain(extra)
            .find(|(kind, name)| deployment.request(*kind, name).is_some())
        {
            Some((kind, name)) => Err(StackError::DuplicateConfiguration {
                builder: self.component.label(),
                step: "subscriber".to_string(),
                key: ResourceId::new(*kind, name.clone()).to_string(),
            }),
            None => Ok(()),
        }
    }

    /// DLQ, redrive, queue and subscription for one subscriber
    fn create_queue_subscriber(
        &mut self,
        subscriber_name: &str,
        with_dead_letter_queue: bool,
    ) -> StackResult<ResourceHandle> {
        if self.subscribers.contains_key(subscriber_name) {
            return Err(StackError::DuplicateConfiguration {
                builder: self.component.label(),
                step: "subscriber".to_string(),
                key: subscriber_name.to_string(),
            });
        }
        let name = self.qualified(subscriber_name);

        let dead_letter_queue = if with_dead_letter_queue {
            Some(create_dead_letter_queue(
                &self.component,
                &format!("{name}-dlq"),
                self.kms_master_key_id.clone(),
            )?)
        } else {
            None
        };

        let mut spec = QueueSpec::new()
            .name_prefix(name.clone())
            .visibility_timeout(self.config.visibility_timeout_seconds)
            .retention(self.config.message_retention_seconds)
            .max_message_size(self.config.max_message_size)
            .kms_key(self.kms_master_key_id.clone())
            .policy(publish_policy(&self.topic.arn(), "sns"));
        if let Some(dlq) = &dead_letter_queue {
            spec = spec.redrive(redrive_policy(dlq));
        }
        let queue = create_queue(&self.component, &name, spec)?;

        let subscription = create_subscription(
            &self.component,
            &format!("{name}-subscription"),
            &self.topic,
            &queue,
        )?;
        debug!(
            topic = %self.topic_name,
            subscriber = %subscriber_name,
            dead_letter_queue = with_dead_letter_queue,
            "Added subscriber queue"
        );

        self.subscribers.insert(
            subscriber_name.to_string(),
            SubscriberQueue {
                name: name.clone(),
                dead_letter_queue,
                queue: queue.clone(),
                subscription,
            },
        );
        Ok(queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StackConfig;
    use crate::context::StackContext;
    use crate::engine::RecordingEngine;
    use crate::deferred::Properties;
    use crate::deployment::ResourceRequest;
    use test_case::test_case;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn deployment() -> Deployment {
        Deployment::new(StackContext::new(
            "ingest",
            "dev",
            "eu-west-1",
            StackConfig::new("cowboy"),
            "123456789012",
        ))
    }

    fn pipeline(deployment: &Deployment) -> TopicPipeline {
        TopicPipeline::new(
            deployment,
            "orders",
            "arn:aws:iam::123456789012:role/sns-feedback",
            None,
            PipelineConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_duplicate_subscriber_enqueues_nothing() {
        let deployment = deployment();
        let pipeline = pipeline(&deployment).with_queue_subscriber("audit", true).unwrap();
        let before = deployment.len();
        let err = pipeline.with_queue_subscriber("audit", false).unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(deployment.len(), before);
    }

    fn worker_args() -> FunctionArgs {
        FunctionArgs::new("index.handler", FunctionCode::Archive("dist/worker.zip".into()))
    }

    #[test_case(worker_args().role("arn:aws:iam::123456789012:role/custom") ; "explicit role")]
    #[test_case(worker_args().dead_letter_target("arn:aws:sqs:eu-west-1:123456789012:dlq") ; "dead letter target")]
    fn test_invalid_function_args_enqueue_nothing(args: FunctionArgs) {
        let deployment = deployment();
        let pipeline = pipeline(&deployment);
        let before = deployment.len();

        let err = pipeline.with_function_subscriber("worker", args).unwrap_err();
        assert!(matches!(err, StackError::InvalidConfiguration(_)));
        assert_eq!(deployment.len(), before);
        assert!(deployment.request(ResourceKind::Queue, "orders-worker").is_none());
    }

    #[test]
    fn test_taken_function_name_enqueues_nothing() {
        let deployment = deployment();
        deployment
            .register(ResourceRequest::new(
                ResourceKind::Function,
                "orders-worker",
                Properties::new(),
            ))
            .unwrap();
        let pipeline = pipeline(&deployment);
        let before = deployment.len();

        let err = pipeline.with_function_subscriber("worker", worker_args()).unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(deployment.len(), before);
    }

    #[test]
    fn test_taken_sync_bucket_enqueues_nothing() {
        let deployment = deployment();
        ObjectBucket::new(&deployment, "orders-archive")
            .with_bucket(BucketOptions::default())
            .unwrap();
        let pipeline = pipeline(&deployment);
        let before = deployment.len();

        let err = pipeline
            .with_bucket_sync_subscriber("archive", FunctionCode::Archive("dist/sync.zip".into()))
            .unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(deployment.len(), before);
    }

    #[test]
    fn test_queue_without_dead_letter_queue() {
        let deployment = deployment();
        let pipeline = pipeline(&deployment).with_queue_subscriber("audit", false).unwrap();
        let subscriber = pipeline.subscriber("audit").unwrap();
        assert!(subscriber.dead_letter_queue.is_none());

        let queue = deployment.request(ResourceKind::Queue, "orders-audit").unwrap();
        assert!(queue.property("redrivePolicy").is_none());
        assert!(queue.property("kmsMasterKeyId").is_none());
    }

    #[tokio::test]
    async fn test_subscriber_chain_order() {
        let deployment = deployment();
        let pipeline = pipeline(&deployment).with_queue_subscriber("audit", true).unwrap();

        let engine = RecordingEngine::new("eu-west-1", "123456789012");
        deployment.apply(&engine).await.unwrap();

        let order: Vec<usize> = [
            (ResourceKind::Topic, "orders"),
            (ResourceKind::Queue, "orders-audit-dlq"),
            (ResourceKind::Queue, "orders-audit"),
            (ResourceKind::TopicSubscription, "orders-audit-subscription"),
        ]
        .iter()
        .map(|(kind, name)| engine.position(*kind, name).unwrap())
        .collect();
        assert!(order.windows(2).all(|pair| pair[0] < pair[1]));

        let queue = engine.submission(ResourceKind::Queue, "orders-audit").unwrap();
        assert_eq!(queue.property_str("namePrefix"), Some("orders-audit"));
        assert_eq!(queue.property("visibilityTimeoutSeconds"), Some(&json!(30)));
        let policy: Value = serde_json::from_str(queue.property_str("policy").unwrap()).unwrap();
        let topic_arn = pipeline.topic_arn().peek().unwrap().unwrap();
        assert_eq!(
            policy["Statement"][0]["Condition"]["ArnEquals"]["aws:SourceArn"],
            json!(topic_arn)
        );
    }

    #[tokio::test]
    async fn test_policy_grants_actions_to_principals() {
        let deployment = deployment();
        pipeline(&deployment)
            .with_policy(
                &["arn:aws:iam::123456789012:role/publisher".into()],
                &[TopicAction::Publish, TopicAction::Subscribe],
            )
            .unwrap();

        let engine = RecordingEngine::new("eu-west-1", "123456789012");
        deployment.apply(&engine).await.unwrap();

        let submitted = engine.submission(ResourceKind::TopicPolicy, "orders-policy").unwrap();
        let policy: Value = serde_json::from_str(submitted.property_str("policy").unwrap()).unwrap();
        assert_eq!(
            policy["Statement"][0]["Action"],
            json!(["sns:Publish", "sns:Subscribe"])
        );
        assert_eq!(
            policy["Statement"][0]["Principal"]["AWS"],
            json!(["arn:aws:iam::123456789012:role/publisher"])
        );
    }
}
