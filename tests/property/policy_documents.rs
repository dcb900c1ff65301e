// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Policy Documents and Templates
//!
//! Every factory must produce a document that passes wire validation for
//! any ARN it is given, and template rendering must leave no placeholder
//! behind.

use cim_stack::policy::{validate_json, PolicyDocument, PolicyFactory};
use cim_stack::template::{content_hash, Template, TABLE_NAME_PLACEHOLDER, TOPIC_PLACEHOLDER};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn resource_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,24}"
}

fn account_id() -> impl Strategy<Value = String> {
    "[0-9]{12}"
}

fn arn(service: &'static str) -> impl Strategy<Value = String> {
    (account_id(), resource_name())
        .prop_map(move |(account, name)| format!("arn:aws:{service}:eu-west-1:{account}:{name}"))
}

fn arns(service: &'static str) -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(arn(service), 1..5)
}

fn services() -> impl Strategy<Value = Vec<String>> {
    prop::sample::subsequence(vec!["sns", "sqs", "lambda", "apigateway", "s3"], 1..=5)
        .prop_map(|picked| picked.into_iter().map(str::to_string).collect())
}

fn assert_valid(document: &PolicyDocument) -> Result<(), TestCaseError> {
    prop_assert!(document.validate().is_ok());
    let json = document.to_json();
    prop_assert!(validate_json(&json).is_ok(), "invalid document: {}", json);
    Ok(())
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #[test]
    fn prop_bucket_policies_valid(name in resource_name()) {
        let bucket_arn = format!("arn:aws:s3:::{name}");
        assert_valid(&PolicyFactory::bucket_read(&bucket_arn))?;
        assert_valid(&PolicyFactory::bucket_sync(&bucket_arn))?;
        assert_valid(&PolicyFactory::bucket_write(&bucket_arn))?;
    }

    #[test]
    fn prop_messaging_policies_valid(
        topic in arn("sns"),
        queues in arns("sqs"),
        principals in arns("iam"),
    ) {
        assert_valid(&PolicyFactory::queue_publish_from_source(&topic, "sns"))?;
        assert_valid(&PolicyFactory::queue_send_message(&queues))?;
        assert_valid(&PolicyFactory::topic_queue_publish(&topic, &queues))?;
        assert_valid(&PolicyFactory::topic_access(&topic, &principals, &["sns:Publish"]))?;
    }

    #[test]
    fn prop_key_policy_valid(
        account in account_id(),
        services in services(),
        roles in prop::collection::vec(arn("iam"), 0..4),
    ) {
        let document = PolicyFactory::kms_key(&account, &services, &roles);
        assert_valid(&document)?;
        prop_assert_eq!(document.statements().len(), 2 + usize::from(!roles.is_empty()));
    }

    #[test]
    fn prop_role_and_api_policies_valid(
        services in services(),
        api_id in "[a-z0-9]{10}",
        stage in resource_name(),
    ) {
        let services: Vec<&str> = services.iter().map(String::as_str).collect();
        assert_valid(&PolicyFactory::assume_role(&services))?;
        assert_valid(&PolicyFactory::api_invoke(
            "eu-west-1",
            &api_id,
            &stage,
            &["GET".to_string(), "POST".to_string()],
        ))?;
    }

    /// Rendering replaces every occurrence of both placeholders
    #[test]
    fn prop_render_leaves_no_placeholder(
        chunks in prop::collection::vec("[a-zA-Z {}\":,]{0,12}", 1..8),
        table in resource_name(),
        topic in arn("sns"),
    ) {
        let text = chunks.join(TABLE_NAME_PLACEHOLDER) + TOPIC_PLACEHOLDER + &chunks.join(TOPIC_PLACEHOLDER);
        let template = Template::from_text("generated", text);

        let rendered = template.render(&[(TABLE_NAME_PLACEHOLDER, &table), (TOPIC_PLACEHOLDER, &topic)]);
        prop_assert!(!rendered.contains(TABLE_NAME_PLACEHOLDER));
        prop_assert!(!rendered.contains(TOPIC_PLACEHOLDER));
        prop_assert!(rendered.contains(topic.as_str()));
    }

    #[test]
    fn prop_content_hash_is_hex_sha256(text in ".{0,64}") {
        let hash = content_hash(&text);
        prop_assert_eq!(hash.len(), 64);
        prop_assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        prop_assert_eq!(Template::from_text("a", text.clone()).content_hash(), hash);
    }
}
