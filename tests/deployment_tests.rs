// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deployment Tests
//!
//! Whole-stack behaviour through the recording engine: apply order, engine
//! failures, policy documents and stack outputs.

mod fixtures;

use cim_stack::config::{ApiGatewayConfig, PipelineConfig};
use cim_stack::deferred::ResolutionError;
use cim_stack::deployment::ResourceRequest;
use cim_stack::identity;
use cim_stack::policy::validate_json;
use cim_stack::resources::*;
use cim_stack::{Deferred, Deployment, Properties, ResourceKind, StackError, TopicPipeline};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

/// A stack touching every policy-producing builder
fn full_stack(deployment: &Deployment) {
    let feedback_role =
        identity::create_service_role_with_policy(deployment, "sns-feedback", &["sns"], &[]).unwrap();
    let key = SseCmk::new(deployment, "pipeline", &["sns", "sqs"], &[feedback_role.arn()]).unwrap();

    let mut assets = ObjectBucket::new(deployment, "assets")
        .with_access_logs(30, true)
        .unwrap()
        .with_sse(None, SseAlgorithm::Aes256)
        .unwrap()
        .with_bucket(BucketOptions::default())
        .unwrap()
        .with_public_access_block()
        .unwrap();
    let read_policy = assets.create_read_policy().unwrap();

    let secret = SecretString::new(deployment, "partner-token", "s3cr3t", None).unwrap();
    let secret_policy = secret.create_get_secret_policy().unwrap();

    TableBuilder::new("orders", "orderId", AttributeType::String)
        .create(deployment)
        .unwrap();
    let writer = table::create_writer_policy(deployment).unwrap();

    TopicPipeline::new(
        deployment,
        "orders",
        feedback_role.arn(),
        Some(key.key_id()),
        PipelineConfig::default(),
    )
    .unwrap()
    .with_function_subscriber(
        "indexer",
        FunctionArgs::new("index.handler", FunctionCode::Archive("dist/indexer.zip".into()))
            .policy(writer.arn()),
    )
    .unwrap()
    .with_policy(&[feedback_role.arn()], &[TopicAction::Publish])
    .unwrap();

    identity::create_user_and_group_with_policies(
        deployment,
        "ci",
        "deployers",
        &[read_policy, secret_policy, writer.arn()],
        true,
        true,
    )
    .unwrap();
    topic::create_publisher_policy_for_all_topics(deployment).unwrap();
    identity::create_autoscaling_full_access_policy(deployment).unwrap();

    let gateway = RestApiGateway::new(
        deployment,
        "orders-api",
        ApiGatewayConfig::default(),
        EndpointType::Regional,
    )
    .unwrap();
    gateway
        .create_invoke_policy(&[HttpMethod::Get, HttpMethod::Post], "v1")
        .unwrap();
}

#[tokio::test]
async fn test_access_log_bucket_precedes_bucket() {
    let deployment = fixtures::deployment();
    let bucket = ObjectBucket::new(&deployment, "assets")
        .with_access_logs(30, true)
        .unwrap()
        .with_bucket(BucketOptions::default())
        .unwrap();

    let engine = fixtures::engine();
    deployment.apply(&engine).await.unwrap();

    let log_position = engine.position(ResourceKind::Bucket, "access-logs-assets").unwrap();
    let bucket_position = engine.position(ResourceKind::Bucket, "assets").unwrap();
    assert!(log_position < bucket_position);

    let log_bucket = engine.submission(ResourceKind::Bucket, "access-logs-assets").unwrap();
    assert_eq!(
        log_bucket.property("lifecycleRules").unwrap()[0]["expiration"],
        json!({ "days": 30 })
    );
    assert_eq!(log_bucket.property_str("acl"), Some("log-delivery-write"));

    let log_bucket_id = bucket.log_bucket().unwrap().id().peek().unwrap().unwrap();
    let submitted = engine.submission(ResourceKind::Bucket, "assets").unwrap();
    assert_eq!(
        submitted.property("loggings"),
        Some(&json!([{ "targetBucket": log_bucket_id, "targetPrefix": "assets" }]))
    );
}

#[tokio::test]
async fn test_engine_failure_stops_dependents() {
    let deployment = fixtures::deployment();
    let pipeline = TopicPipeline::new(
        &deployment,
        "orders",
        fixtures::FEEDBACK_ROLE_ARN,
        None,
        PipelineConfig::default(),
    )
    .unwrap()
    .with_queue_subscriber("audit", true)
    .unwrap();

    let engine = fixtures::engine().fail_on(ResourceKind::Queue, "orders-audit");
    let err = deployment.apply(&engine).await.unwrap_err();
    assert!(matches!(err, StackError::Engine(_)), "got {err}");

    assert!(engine.submission(ResourceKind::Topic, "orders").is_some());
    assert!(engine.submission(ResourceKind::Queue, "orders-audit").is_none());
    assert!(engine
        .submission(ResourceKind::TopicSubscription, "orders-audit-subscription")
        .is_none());

    let subscriber = pipeline.subscriber("audit").unwrap();
    assert!(subscriber.queue.arn().resolved().await.is_err());
    assert!(subscriber.subscription.arn().resolved().await.is_err());
}

#[tokio::test]
async fn test_apply_runs_once() {
    let deployment = fixtures::deployment();
    TableBuilder::new("orders", "orderId", AttributeType::String)
        .create(&deployment)
        .unwrap();

    let engine = fixtures::engine();
    let summary = deployment.apply(&engine).await.unwrap();
    assert_eq!(summary.provisioned.len(), 1);
    assert_eq!(summary.deployment_id, deployment.id());

    let err = deployment.apply(&engine).await.unwrap_err();
    assert!(matches!(err, StackError::InvalidConfiguration(_)));
    assert_eq!(engine.len(), 1);

    let late = TableBuilder::new("audit", "eventId", AttributeType::String).create(&deployment);
    assert!(late.is_err());
}

#[tokio::test]
async fn test_failed_input_surfaces_as_resolution_error() {
    let deployment = fixtures::deployment();
    let secret = SecretString::new(
        &deployment,
        "partner-token",
        Deferred::<String>::failed(ResolutionError::failed("vault", "token expired")),
        None,
    )
    .unwrap();

    let engine = fixtures::engine();
    let err = deployment.apply(&engine).await.unwrap_err();
    assert!(matches!(err, StackError::ExternalResolution(_)), "got {err}");

    assert!(engine.submission(ResourceKind::Secret, "partner-token").is_some());
    assert!(engine
        .submission(ResourceKind::SecretVersion, "partner-token-version")
        .is_none());
    assert!(secret.version().id().resolved().await.is_err());
}

#[tokio::test]
async fn test_every_policy_document_is_valid() {
    let deployment = fixtures::deployment();
    full_stack(&deployment);

    let engine = fixtures::engine();
    deployment.apply(&engine).await.unwrap();

    let documents: Vec<(String, Value)> = [
        (ResourceKind::IamPolicy, "policy"),
        (ResourceKind::TopicPolicy, "policy"),
        (ResourceKind::KmsKey, "policy"),
        (ResourceKind::Queue, "policy"),
        (ResourceKind::IamRole, "assumeRolePolicy"),
    ]
    .into_iter()
    .flat_map(|(kind, key)| {
        engine
            .submissions_of(kind)
            .into_iter()
            .filter(move |submitted| submitted.property(key).is_some())
            .map(move |submitted| (submitted.id.to_string(), fixtures::json_property(&submitted, key)))
    })
    .collect();

    assert!(documents.len() >= 12, "only {} documents", documents.len());
    for (resource, document) in &documents {
        assert!(validate_json(document).is_ok(), "{resource}: {document}");
        assert_eq!(document["Version"], json!("2012-10-17"), "{resource}");
    }
}

#[tokio::test]
async fn test_full_stack_outputs() {
    let deployment = fixtures::deployment();
    full_stack(&deployment);

    let engine = fixtures::engine();
    deployment.apply(&engine).await.unwrap();
    let outputs = deployment.resolve_outputs().await.unwrap();

    let api = &outputs["RestApiGateway.api"];
    assert_eq!(api["name"], json!("orders-api"));
    assert!(api["rootResourceId"].as_str().is_some_and(|id| id.ends_with("root")));

    let bucket = outputs["ObjectBucket.assets"].as_str().unwrap();
    assert!(bucket.starts_with("assets-"));
}

#[tokio::test]
async fn test_registration_order_is_kept_within_a_wave() {
    let deployment = fixtures::deployment();
    for name in ["c", "a", "b"] {
        deployment
            .register(ResourceRequest::new(
                ResourceKind::Topic,
                name,
                Properties::new().set("displayName", name),
            ))
            .unwrap();
    }

    let engine = fixtures::engine();
    let summary = deployment.apply(&engine).await.unwrap();
    assert_eq!(summary.waves, 1);
    let names: Vec<String> = engine.submissions().into_iter().map(|s| s.id.name).collect();
    assert_eq!(names, vec!["c", "a", "b"]);
}

#[tokio::test]
async fn test_capacity_plan_applies_to_planned_tables() {
    let deployment = fixtures::deployment();
    let capacity = TableCapacity {
        read_capacity: CapacitySettings { min: 5, max: 40, target: 70.0 },
        write_capacity: CapacitySettings { min: 5, max: 10, target: 70.0 },
    };
    register_capacity_plan(&deployment, CapacityPlan::new().table("orders", capacity));
    TableBuilder::new("orders", "orderId", AttributeType::String)
        .pay_per_request()
        .create(&deployment)
        .unwrap();

    let engine = fixtures::engine();
    deployment.apply(&engine).await.unwrap();

    let table = engine.submission(ResourceKind::Table, "orders").unwrap();
    assert_eq!(table.property_str("billingMode"), Some("PROVISIONED"));
    assert_eq!(table.property_str("name"), Some("orders-dev"));

    let target = engine
        .submission(ResourceKind::AutoscalingTarget, "aas-orders-Read-target")
        .unwrap();
    assert_eq!(target.property_str("resourceId"), Some("table/orders-dev"));
    assert_eq!(target.property("maxCapacity"), Some(&json!(40)));

    let policy = engine
        .submission(ResourceKind::AutoscalingPolicy, "aas-orders-Write-policy")
        .unwrap();
    assert_eq!(policy.property_str("resourceId"), Some("table/orders-dev"));
    assert!(
        engine.position(ResourceKind::Table, "orders")
            < engine.position(ResourceKind::AutoscalingTarget, "aas-orders-Write-target")
    );
}
