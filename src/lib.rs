// Copyright (c) 2025 - Cowboy AI, Inc.
//! Declarative cloud resource composition for the Composable Information Machine
//!
//! Builders describe resources against a `Deployment`; values that only the
//! provisioning engine knows (ids, ARNs, generated names) are `Deferred` and
//! wire the dependency graph. `Deployment::apply` hands the requests to a
//! `ProvisioningEngine` in dependency order.
//!
//! ```rust,ignore
//! use cim_stack::prelude::*;
//!
//! let deployment = Deployment::new(StackContext::new("ingest", "dev", "eu-west-1", config, account_id));
//! let pipeline = TopicPipeline::new(&deployment, "orders", feedback_role, None, PipelineConfig::default())?
//!     .with_queue_subscriber("audit", true)?;
//! deployment.apply(&RecordingEngine::new("eu-west-1", "123456789012")).await?;
//! ```

pub mod arn;
pub mod config;
pub mod context;
pub mod deferred;
pub mod deployment;
pub mod engine;
pub mod errors;
pub mod identity;
pub mod pipeline;
pub mod policy;
pub mod resources;
pub mod state_machine;
pub mod template;

// Re-export commonly used types
pub use config::{ApiGatewayConfig, ConfigSource, PipelineConfig, StackConfig};
pub use context::StackContext;
pub use deferred::{Deferred, Properties, ResolutionError};
pub use deployment::{Component, Deployment, Registrar, ResourceHandle, ResourceKind, ResourceRequest};
pub use engine::{ProvisioningEngine, RecordingEngine};
pub use errors::{StackError, StackResult};
pub use pipeline::{SubscriberQueue, TopicPipeline};
pub use template::Template;

/// Everything a deployment script needs
pub mod prelude {
    pub use crate::config::{ApiGatewayConfig, ConfigSource, PipelineConfig, StackConfig};
    pub use crate::context::StackContext;
    pub use crate::deferred::{all, all2, all3, Deferred, Properties};
    pub use crate::deployment::{Deployment, Registrar, ResourceHandle, ResourceKind};
    pub use crate::engine::{ProvisioningEngine, RecordingEngine};
    pub use crate::errors::{StackError, StackResult};
    pub use crate::identity;
    pub use crate::pipeline::TopicPipeline;
    pub use crate::policy::{PolicyDocument, PolicyFactory, Principal, Statement};
    pub use crate::resources::*;
    pub use crate::template::Template;
}
