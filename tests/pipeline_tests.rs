// Copyright (c) 2025 - Cowboy AI, Inc.
//! Topic Pipeline Tests
//!
//! Applies pipelines to the recording engine and checks the submitted
//! resources and the wiring between them.

mod fixtures;

use cim_stack::config::PipelineConfig;
use cim_stack::policy::managed::AWS_LAMBDA_SQS_QUEUE_EXECUTION_ROLE;
use cim_stack::policy::validate_json;
use cim_stack::resources::{FunctionArgs, FunctionCode};
use cim_stack::{Deferred, ResourceKind, StackError, TopicPipeline};
use pretty_assertions::assert_eq;
use serde_json::json;

fn resolved(value: &Deferred<String>) -> String {
    value.peek().unwrap().unwrap()
}

fn pipeline(deployment: &cim_stack::Deployment, kms_key: Option<&str>) -> TopicPipeline {
    TopicPipeline::new(
        deployment,
        "orders",
        fixtures::FEEDBACK_ROLE_ARN,
        kms_key.map(Deferred::<String>::from),
        PipelineConfig::default(),
    )
    .unwrap()
}

fn worker_args() -> FunctionArgs {
    FunctionArgs::new("index.handler", FunctionCode::Archive("dist/worker.zip".into()))
}

#[tokio::test]
async fn test_dead_letter_queue_redrive_settings() {
    let deployment = fixtures::deployment();
    let pipeline = pipeline(&deployment, None).with_queue_subscriber("audit", true).unwrap();

    let engine = fixtures::engine();
    deployment.apply(&engine).await.unwrap();

    let dead_letter = engine.submission(ResourceKind::Queue, "orders-audit-dlq").unwrap();
    assert_eq!(dead_letter.property("messageRetentionSeconds"), Some(&json!(1209600)));

    let queue = engine.submission(ResourceKind::Queue, "orders-audit").unwrap();
    let redrive = fixtures::json_property(&queue, "redrivePolicy");
    let subscriber = pipeline.subscriber("audit").unwrap();
    let dead_letter_arn = resolved(&subscriber.dead_letter_queue.as_ref().unwrap().arn());
    assert_eq!(
        redrive,
        json!({ "deadLetterTargetArn": dead_letter_arn, "maxReceiveCount": 10 })
    );
}

#[tokio::test]
async fn test_topic_to_queue_with_dead_letter_queue() {
    let deployment = fixtures::deployment();
    let pipeline = pipeline(&deployment, None).with_queue_subscriber("audit", true).unwrap();

    let engine = fixtures::engine();
    deployment.apply(&engine).await.unwrap();
    let topic_arn = resolved(&pipeline.topic_arn());

    let queues = engine.submissions_of(ResourceKind::Queue);
    let dead_letter_queues: Vec<_> = queues.iter().filter(|q| q.id.name.ends_with("-dlq")).collect();
    assert_eq!(queues.len(), 2);
    assert_eq!(dead_letter_queues.len(), 1);

    let subscriptions = engine.submissions_of(ResourceKind::TopicSubscription);
    assert_eq!(subscriptions.len(), 1);
    assert_eq!(subscriptions[0].property_str("protocol"), Some("sqs"));
    assert_eq!(subscriptions[0].property_str("topic"), Some(topic_arn.as_str()));

    let queue = engine.submission(ResourceKind::Queue, "orders-audit").unwrap();
    let queue_arn = resolved(&pipeline.subscriber("audit").unwrap().queue.arn());
    assert_eq!(subscriptions[0].property_str("endpoint"), Some(queue_arn.as_str()));

    let policy = fixtures::json_property(&queue, "policy");
    assert!(validate_json(&policy).is_ok());
    assert_eq!(policy["Statement"][0]["Action"], json!(["sqs:SendMessage"]));
    assert_eq!(policy["Statement"][0]["Principal"]["Service"], json!("sns.amazonaws.com"));
    assert_eq!(
        policy["Statement"][0]["Condition"]["ArnEquals"]["aws:SourceArn"],
        json!(topic_arn)
    );
}

#[tokio::test]
async fn test_topic_feedback_role_for_every_protocol() {
    let deployment = fixtures::deployment();
    pipeline(&deployment, None);

    let engine = fixtures::engine();
    deployment.apply(&engine).await.unwrap();

    let topic = engine.submission(ResourceKind::Topic, "orders").unwrap();
    for protocol in ["http", "lambda", "sqs", "application"] {
        assert_eq!(
            topic.property_str(&format!("{protocol}FailureFeedbackRoleArn")),
            Some(fixtures::FEEDBACK_ROLE_ARN)
        );
        assert_eq!(
            topic.property(&format!("{protocol}SuccessFeedbackSampleRate")),
            Some(&json!(100))
        );
    }
    assert!(topic.property("kmsMasterKeyId").is_none());
}

#[tokio::test]
async fn test_function_subscriber_wiring() {
    let deployment = fixtures::deployment();
    let pipeline = pipeline(&deployment, None)
        .with_function_subscriber("indexer", worker_args())
        .unwrap();

    let engine = fixtures::engine();
    deployment.apply(&engine).await.unwrap();

    let subscriber = pipeline.subscriber("indexer").unwrap();
    assert!(subscriber.dead_letter_queue.is_some());
    let queue_arn = resolved(&subscriber.queue.arn());

    let function = &pipeline.functions()[0];
    let trigger = engine
        .submission(ResourceKind::EventSourceMapping, "orders-indexer-trigger")
        .unwrap();
    assert_eq!(trigger.property_str("eventSourceArn"), Some(queue_arn.as_str()));
    assert_eq!(trigger.property("batchSize"), Some(&json!(10)));

    let function_dlq_arn = resolved(&function.dead_letter_queue().arn());
    let submitted = engine.submission(ResourceKind::Function, "orders-indexer").unwrap();
    assert_eq!(
        submitted.property("deadLetterConfig"),
        Some(&json!({ "targetArn": function_dlq_arn }))
    );

    let managed_attached = engine
        .submissions_of(ResourceKind::IamRolePolicyAttachment)
        .iter()
        .any(|a| a.property_str("policyArn") == Some(AWS_LAMBDA_SQS_QUEUE_EXECUTION_ROLE));
    assert!(managed_attached);

    let queue_position = engine.position(ResourceKind::Queue, "orders-indexer").unwrap();
    let trigger_position = engine
        .position(ResourceKind::EventSourceMapping, "orders-indexer-trigger")
        .unwrap();
    assert!(queue_position < trigger_position);
}

#[tokio::test]
async fn test_encryption_key_reaches_every_queue() {
    let deployment = fixtures::deployment();
    pipeline(&deployment, Some("key-1234"))
        .with_function_subscriber("indexer", worker_args())
        .unwrap();

    let engine = fixtures::engine();
    deployment.apply(&engine).await.unwrap();

    for name in ["orders-indexer-dlq", "orders-indexer", "orders-indexer-function-dlq"] {
        let queue = engine.submission(ResourceKind::Queue, name).unwrap();
        assert_eq!(queue.property_str("kmsMasterKeyId"), Some("key-1234"), "{name}");
    }
    let topic = engine.submission(ResourceKind::Topic, "orders").unwrap();
    assert_eq!(topic.property_str("kmsMasterKeyId"), Some("key-1234"));
}

#[tokio::test]
async fn test_bucket_sync_subscriber() {
    let deployment = fixtures::deployment();
    let pipeline = pipeline(&deployment, Some("key-1234"))
        .with_bucket_sync_subscriber("archive", FunctionCode::Archive("dist/sync.zip".into()))
        .unwrap();

    let engine = fixtures::engine();
    deployment.apply(&engine).await.unwrap();

    let log_bucket = engine
        .position(ResourceKind::Bucket, "access-logs-orders-archive")
        .unwrap();
    let bucket = engine.position(ResourceKind::Bucket, "orders-archive").unwrap();
    assert!(log_bucket < bucket);
    let public_access_block = engine
        .position(ResourceKind::BucketPublicAccessBlock, "orders-archive-PAB")
        .unwrap();
    assert!(bucket < public_access_block);

    let bucket_name = pipeline.buckets()[0]
        .bucket()
        .map(|b| resolved(&b.output_str("bucket")))
        .unwrap();
    let function = engine.submission(ResourceKind::Function, "orders-archive").unwrap();
    assert_eq!(
        function.property("environment"),
        Some(&json!({ "variables": { "bucketName": bucket_name } }))
    );
    assert_eq!(function.property_str("handler"), Some("index.sync"));

    let submitted_bucket = engine.submission(ResourceKind::Bucket, "orders-archive").unwrap();
    assert_eq!(
        submitted_bucket.property("serverSideEncryptionConfiguration"),
        Some(&json!({ "rule": { "applyServerSideEncryptionByDefault": {
            "kmsMasterKeyId": "key-1234",
            "sseAlgorithm": "aws:kms",
        } } }))
    );
    assert!(engine
        .submission(ResourceKind::IamPolicy, "WritePolicyForBucket-orders-archive")
        .is_some());
}

#[test]
fn test_function_subscriber_rejects_explicit_role() {
    let deployment = fixtures::deployment();
    let pipeline = pipeline(&deployment, None);
    let before = deployment.len();

    let err = pipeline
        .with_function_subscriber(
            "indexer",
            worker_args().role("arn:aws:iam::123456789012:role/custom"),
        )
        .unwrap_err();
    assert!(matches!(err, StackError::InvalidConfiguration(_)));
    assert_eq!(deployment.len(), before);
    assert!(deployment.requests_of(ResourceKind::Queue).is_empty());
    assert!(deployment.requests_of(ResourceKind::TopicSubscription).is_empty());
}
