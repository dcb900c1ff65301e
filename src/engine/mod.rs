// Copyright (c) 2025 - Cowboy AI, Inc.
//! Provisioning Engine
//!
//! The engine owns resource lifecycle: it receives fully resolved requests
//! and reports back the physical id, ARN and output attributes of each
//! resource. This crate never talks to a cloud API directly.
//!
//! # Architecture
//!
//! ```text
//! Builders                Deployment                 Engine
//! ────────               ────────────               ────────
//!
//! with_*()  ──requests──> graph + waves ──Submitted──> provision()
//!                              ▲                          │
//!                              └──── resolves handles <───┘
//!                                    (id, arn, outputs)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use cim_stack::engine::RecordingEngine;
//!
//! let engine = RecordingEngine::new("eu-west-1", "123456789012");
//! deployment.apply(&engine).await?;
//! for submitted in engine.submissions() {
//!     println!("{} {}", submitted.type_token, submitted.id);
//! }
//! ```

pub mod recording;

pub use recording::RecordingEngine;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::deployment::{ResourceId, ResourceOptions};

/// Request as seen by the engine, properties fully resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedRequest {
    pub id: ResourceId,
    pub type_token: String,
    pub properties: Value,
    pub depends_on: Vec<ResourceId>,
    pub options: ResourceOptions,
}

impl SubmittedRequest {
    /// One resolved property
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// One resolved string property
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.property(key).and_then(Value::as_str)
    }
}

/// Engine report for a provisioned resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionedResource {
    /// Physical id
    pub id: String,
    pub arn: String,
    /// Output attributes, a JSON object
    pub outputs: Value,
}

/// Trait for provisioning engines
///
/// `provision` may be called concurrently for requests of the same wave;
/// every request's dependencies have been provisioned before it is
/// submitted.
#[async_trait]
pub trait ProvisioningEngine: Send + Sync {
    async fn provision(&self, request: &SubmittedRequest) -> Result<ProvisionedResource, EngineError>;
}

/// Errors reported by a provisioning engine
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The engine refused to create the resource
    #[error("{resource} rejected: {reason}")]
    Rejected { resource: String, reason: String },

    /// Resource type is not supported by this engine
    #[error("Unsupported resource type: {0}")]
    Unsupported(String),

    /// Engine backend unreachable
    #[error("Engine unavailable: {0}")]
    Unavailable(String),
}
