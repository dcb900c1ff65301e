// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error types for stack composition

use std::path::PathBuf;
use thiserror::Error;

use crate::deferred::ResolutionError;
use crate::engine::EngineError;
use crate::state_machine::TransitionError;

/// Errors that can occur while composing or applying a stack
///
/// All of them are fatal to the configuration pass. Nothing in this crate
/// retries; recovery belongs to the provisioning engine.
#[derive(Debug, Error)]
pub enum StackError {
    /// A builder step was invoked before its required predecessor, or after
    /// a step it must precede
    #[error("{builder}: cannot apply `{step}`: {reason}")]
    ConfigurationOrder {
        builder: String,
        step: String,
        reason: String,
    },

    /// A step that must be unique within a builder was invoked twice
    #[error("{builder}: `{step}` already configured for {key}")]
    DuplicateConfiguration {
        builder: String,
        step: String,
        key: String,
    },

    /// The provisioning engine failed to resolve a deferred value
    #[error("External resolution failed: {0}")]
    ExternalResolution(#[from] ResolutionError),

    /// Builder arguments are inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A required configuration key is absent
    #[error("Missing required configuration key: {0}")]
    MissingConfiguration(String),

    /// A template file could not be read
    #[error("Failed to read template {path}: {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The provisioning engine rejected a request
    #[error("Provisioning engine error: {0}")]
    Engine(#[from] EngineError),

    /// The request graph contains a cycle
    #[error("Dependency cycle detected at {0}")]
    CyclicDependency(String),
}

impl StackError {
    /// Attach the builder label to a rejected stage transition
    pub fn from_transition(builder: impl Into<String>, err: TransitionError) -> Self {
        match err {
            TransitionError::OutOfOrder { step, reason } => StackError::ConfigurationOrder {
                builder: builder.into(),
                step,
                reason,
            },
            TransitionError::AlreadyConfigured { step, key } => {
                StackError::DuplicateConfiguration {
                    builder: builder.into(),
                    step,
                    key,
                }
            }
        }
    }

    /// Whether this is an ordering violation
    pub fn is_order_violation(&self) -> bool {
        matches!(self, StackError::ConfigurationOrder { .. })
    }

    /// Whether this is a duplicate step
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StackError::DuplicateConfiguration { .. })
    }
}

/// Result type for stack operations
pub type StackResult<T> = Result<T, StackError>;

impl From<serde_json::Error> for StackError {
    fn from(err: serde_json::Error) -> Self {
        StackError::Serialization(err.to_string())
    }
}
