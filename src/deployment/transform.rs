// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deployment-wide request transformations
//!
//! A transformation sees every request before it enters the graph and may
//! rewrite it. After the request is registered it may add companion
//! resources that depend on it.

use super::{Deployment, ResourceHandle, ResourceRequest};
use crate::errors::StackResult;

pub trait ResourceTransformation: Send + Sync {
    /// Rewrite a request before registration
    fn transform(&self, request: ResourceRequest) -> ResourceRequest {
        request
    }

    /// Register resources that accompany `handle`
    fn after_register(&self, _handle: &ResourceHandle, _deployment: &Deployment) -> StackResult<()> {
        Ok(())
    }
}
