// Copyright (c) 2025 - Cowboy AI, Inc.
//! Policy documents and canned policies
//!
//! Documents are built synchronously from resolved values. To embed a
//! deferred ARN, build the document inside a `Deferred::map`:
//!
//! ```rust,ignore
//! let policy = bucket.arn().map(|arn| PolicyFactory::bucket_read(&arn));
//! ```

pub mod document;
pub mod factories;

pub use document::{
    service_principal, validate_json, Condition, Effect, OneOrMany, PolicyDocument, PolicyError,
    Principal, Statement, POLICY_VERSION,
};
pub use factories::PolicyFactory;

/// AWS managed policy ARNs
pub mod managed {
    pub const AWS_LAMBDA_BASIC_EXECUTION_ROLE: &str =
        "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";
    pub const AWS_LAMBDA_SQS_QUEUE_EXECUTION_ROLE: &str =
        "arn:aws:iam::aws:policy/service-role/AWSLambdaSQSQueueExecutionRole";
}
