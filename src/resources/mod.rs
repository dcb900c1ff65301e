// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource builders
//!
//! Each builder owns a component of the deployment and registers the
//! resources its steps describe. Builders with ordered steps track their
//! stage and reject out-of-order or repeated steps before registering
//! anything.

pub mod bucket;
pub mod certificate;
pub mod function;
pub mod gateway;
pub mod key;
pub mod queue;
pub mod secret;
pub mod table;
pub mod topic;

pub use bucket::{BucketOptions, BucketStage, ObjectBucket, SseAlgorithm};
pub use certificate::{AcmCertificate, CertificateStage, HostedZone, ValidationMethod};
pub use function::{
    BackendFunction, FunctionArgs, FunctionCode, QueueSubscriberFunction, QueueToBucketSyncFunction,
};
pub use gateway::{
    AuthorizationMethod, EndpointType, GatewayStage, HttpMethod, IntegrationOptions, IntegrationType,
    MethodStage, ModelSource, PassThroughBehavior, PredefinedModel, RequestParamType, RestApiGateway,
    RestApiHandle, RestApiMethod, ValidatorArgs,
};
pub use key::SseCmk;
pub use queue::{QueueSpec, RedrivePolicy};
pub use secret::SecretString;
pub use table::{
    register_capacity_plan, AttributeType, BillingMode, CapacityPlan, CapacitySettings, DynamoDbAction,
    TableBuilder, TableCapacity,
};
pub use topic::{TopicAction, TopicSpec};
