// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stack Plan
//!
//! Builds a sample stack and applies it to the recording engine, then prints
//! the submitted requests and the stack outputs as JSON. Nothing is
//! provisioned.
//!
//! Run with: cargo run --bin cim-stack-plan
//!
//! Configuration comes from `CIM_STACK_*` environment variables on top of
//! built-in defaults, e.g. `CIM_STACK_stack=prod` or
//! `CIM_STACK_apiGateway__loggingLevel=INFO`.

use anyhow::{Context, Result};
use cim_stack::prelude::*;
use cim_stack::resources::{queue, table};
use serde_json::json;
use tracing::{debug, info};

const ENV_PREFIX: &str = "CIM_STACK_";

/// Defaults, overridden by the environment
fn config_source() -> ConfigSource {
    ConfigSource::from_pairs([
        ("org", "cowboyai"),
        ("project", "cim"),
        ("stack", "dev"),
        ("region", "eu-west-1"),
        ("account", "123456789012"),
        ("domain", "example.com"),
    ])
    .merge(ConfigSource::from_env(ENV_PREFIX))
}

fn build_stack(deployment: &Deployment, source: &ConfigSource) -> Result<()> {
    let pipeline_config = PipelineConfig::from_source(source)?;
    let gateway_config = ApiGatewayConfig::from_source(source)?;
    let domain = source.require("domain")?;

    let feedback_role = identity::create_service_role_with_policy(deployment, "sns-feedback", &["sns"], &[])?;
    let key = SseCmk::new(deployment, "pipeline", &["sns", "sqs"], &[feedback_role.arn()])?;

    let orders_table = TableBuilder::new("orders", "orderId", AttributeType::String)
        .pay_per_request()
        .create(deployment)?;
    let writer = table::create_writer_policy(deployment)?;
    debug!(table = %orders_table.name(), "Planned table");

    let pipeline = TopicPipeline::new(
        deployment,
        "orders",
        feedback_role.arn(),
        Some(key.key_id()),
        pipeline_config,
    )?
    .with_queue_subscriber("audit", true)?
    .with_function_subscriber(
        "indexer",
        FunctionArgs::new("index.handler", FunctionCode::Archive("dist/indexer.zip".into()))
            .env("tableName", orders_table.output_str("name"))
            .policy(writer.arn()),
    )?
    .with_bucket_sync_subscriber("archive", FunctionCode::Archive("dist/sync.zip".into()))?;

    let publisher = queue::create_send_message_policy(
        deployment,
        "audit-publisher",
        &pipeline
            .subscribers()
            .map(|subscriber| subscriber.queue.arn())
            .collect::<Vec<_>>(),
    )?;
    debug!(policy = %publisher.name(), "Planned publisher policy");

    let certificate = AcmCertificate::new(
        deployment,
        domain,
        "-api",
        HostedZone::new(domain, "Z0EXAMPLE"),
        Some("apiCertificateArn".to_string()),
    )
    .with_certificate(ValidationMethod::Dns, None, false)?
    .with_dns_validation(600)?;
    let certificate_arn = certificate
        .arn()
        .context("certificate was not requested")?;

    let gateway = RestApiGateway::new(deployment, "orders-api", gateway_config, EndpointType::Regional)?;
    let resource = gateway.create_root_api_resource("orders")?;
    RestApiMethod::new(deployment, "orders", gateway.handle(), &resource, HttpMethod::Post)
        .with_validator(ValidatorArgs::body_and_parameters())?
        .with_request_model(PredefinedModel::Empty, "application/json")?
        .with_method(AuthorizationMethod::AwsIam, false)?
        .with_topic_integration(pipeline.topic_arn(), None, None, IntegrationOptions::default())?;
    RestApiMethod::new(deployment, "health", gateway.handle(), &resource, HttpMethod::Get)
        .with_method(AuthorizationMethod::None, false)?
        .with_mock_integration(200)?;

    gateway
        .with_deployment("v1")?
        .with_custom_domain("v1", domain, "Z0EXAMPLE", certificate_arn)?
        .with_api_key("partner", "change-me")?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let source = config_source();
    let account = source.require("account")?.to_string();
    let context = StackContext::from_source(&source, account.clone()).context("Invalid stack configuration")?;
    info!(
        project = %context.project,
        stack = %context.stack,
        region = %context.region,
        "Planning stack"
    );

    let engine = RecordingEngine::new(context.region.clone(), account);
    let deployment = Deployment::new(context);
    build_stack(&deployment, &source).context("Failed to build stack")?;
    info!(requests = deployment.len(), "Stack described");

    let summary = deployment
        .apply(&engine)
        .await
        .context("Failed to apply stack")?;
    let outputs = deployment.resolve_outputs().await?;
    info!(
        waves = summary.waves,
        provisioned = summary.provisioned.len(),
        "Plan complete"
    );

    let plan = json!({
        "deployment": summary.deployment_id,
        "requests": engine.submissions(),
        "outputs": outputs,
    });
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}
