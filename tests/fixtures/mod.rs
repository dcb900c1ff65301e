// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for cim-stack
//!
//! Every suite builds its deployment and engine here so names, region and
//! account are the same fixed constants everywhere.

#![allow(dead_code)]

use cim_stack::engine::SubmittedRequest;
use cim_stack::{Deployment, RecordingEngine, StackConfig, StackContext, Template};
use serde_json::Value;

pub const ORG: &str = "cowboyai";
pub const PROJECT: &str = "ingest";
pub const STACK: &str = "dev";
pub const REGION: &str = "eu-west-1";
pub const ACCOUNT_ID: &str = "123456789012";

pub const FEEDBACK_ROLE_ARN: &str = "arn:aws:iam::123456789012:role/sns-feedback";
pub const CERTIFICATE_ARN: &str = "arn:aws:acm:eu-west-1:123456789012:certificate/fixture";

pub fn context() -> StackContext {
    StackContext::new(PROJECT, STACK, REGION, StackConfig::new(ORG), ACCOUNT_ID)
}

pub fn deployment() -> Deployment {
    Deployment::new(context())
}

pub fn engine() -> RecordingEngine {
    RecordingEngine::new(REGION, ACCOUNT_ID)
}

pub fn order_schema() -> Template {
    Template::from_text(
        "fixtures/order.schema.json",
        r#"{"$schema":"http://json-schema.org/draft-04/schema#","type":"object","required":["orderId"]}"#,
    )
}

/// Parse a JSON-text property (policies, redrive policies)
pub fn json_property(request: &SubmittedRequest, key: &str) -> Value {
    let text = request
        .property_str(key)
        .unwrap_or_else(|| panic!("{} has no string property {key}", request.id));
    serde_json::from_str(text).unwrap_or_else(|e| panic!("{}.{key} is not JSON: {e}", request.id))
}
