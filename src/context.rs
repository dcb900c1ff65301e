// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stack context
//!
//! Project, stack and region names plus stack-wide configuration. Built once
//! at process start and shared read-only by every builder through the
//! `Deployment` handle. The account id is deferred: it comes from the
//! engine's caller-identity lookup.

use crate::config::{ConfigSource, StackConfig};
use crate::deferred::Deferred;
use crate::errors::StackResult;

#[derive(Debug, Clone)]
pub struct StackContext {
    pub project: String,
    pub stack: String,
    pub region: String,
    pub config: StackConfig,
    account_id: Deferred<String>,
}

impl StackContext {
    pub fn new(
        project: impl Into<String>,
        stack: impl Into<String>,
        region: impl Into<String>,
        config: StackConfig,
        account_id: impl Into<Deferred<String>>,
    ) -> Self {
        Self {
            project: project.into(),
            stack: stack.into(),
            region: region.into(),
            config,
            account_id: account_id.into(),
        }
    }

    /// Read `project`, `stack`, `region` and the stack config from a source
    pub fn from_source(
        source: &ConfigSource,
        account_id: impl Into<Deferred<String>>,
    ) -> StackResult<Self> {
        Ok(Self::new(
            source.require("project")?,
            source.require("stack")?,
            source.require("region")?,
            StackConfig::from_source(source)?,
            account_id,
        ))
    }

    pub fn org(&self) -> &str {
        &self.config.org
    }

    pub fn account_id(&self) -> Deferred<String> {
        self.account_id.clone()
    }

    /// Component type token, `{org}:{type}`
    pub fn qualified_type(&self, type_name: &str) -> String {
        format!("{}:{}", self.config.org, type_name)
    }

    /// Fully qualified name of another stack of this project
    pub fn stack_reference_name(&self, stack: &str) -> String {
        format!("{}/{}/{}", self.config.org, self.project, stack)
    }
}
