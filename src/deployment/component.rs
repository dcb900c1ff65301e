// Copyright (c) 2025 - Cowboy AI, Inc.
//! Custom deployment components
//!
//! A component groups the resources one builder creates under a type token
//! `{org}:{type}`. Outputs added through a component are keyed
//! `{type}.{key}` in the deployment's named outputs.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

use super::{Deployment, Registrar, ResourceHandle, ResourceId, ResourceRequest};
use crate::deferred::Deferred;
use crate::errors::StackResult;

/// What the deployment remembers about a component
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRecord {
    pub type_token: String,
    pub name: String,
    /// Resources registered through the component, in order
    pub resources: Vec<ResourceId>,
    /// Outgoing dependencies declared by the component
    pub dependencies: BTreeSet<ResourceId>,
}

/// Handle to one component of a deployment
#[derive(Debug, Clone)]
pub struct Component {
    deployment: Deployment,
    index: usize,
    type_name: String,
    name: String,
}

impl Component {
    pub fn new(deployment: &Deployment, type_name: &str, name: impl Into<String>) -> Self {
        let name = name.into();
        let type_token = deployment.context().qualified_type(type_name);
        debug!(component = %type_token, name = %name, "Creating component");
        let index = deployment.record_component(ComponentRecord {
            type_token,
            name: name.clone(),
            resources: Vec::new(),
            dependencies: BTreeSet::new(),
        });
        Self {
            deployment: deployment.clone(),
            index,
            type_name: type_name.to_string(),
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// `{type}-{name}`, used to label builder errors
    pub fn label(&self) -> String {
        format!("{}-{}", self.type_name, self.name)
    }

    /// Add a named output keyed `{type}.{key}`
    pub fn add_output(&self, key: &str, value: Deferred<Value>) {
        self.deployment
            .add_output(format!("{}.{}", self.type_name, key), value);
    }

    /// Declare outgoing dependencies of the component
    pub fn add_dependencies<'a>(&self, handles: impl IntoIterator<Item = &'a ResourceHandle>) {
        let ids: Vec<ResourceId> = handles
            .into_iter()
            .map(|h| h.resource_id().clone())
            .collect();
        self.deployment
            .update_component(self.index, |record| record.dependencies.extend(ids));
    }

    /// Add outputs under their raw keys
    pub fn with_outputs(self, outputs: impl IntoIterator<Item = (String, Deferred<Value>)>) -> Self {
        for (key, value) in outputs {
            self.deployment.add_output(key, value);
        }
        self
    }

    pub fn with_dependencies<'a>(self, handles: impl IntoIterator<Item = &'a ResourceHandle>) -> Self {
        self.add_dependencies(handles);
        self
    }

    pub fn record(&self) -> Option<ComponentRecord> {
        self.deployment.components().into_iter().nth(self.index)
    }

    pub fn dependencies(&self) -> BTreeSet<ResourceId> {
        self.record().map(|r| r.dependencies).unwrap_or_default()
    }

    pub fn resources(&self) -> Vec<ResourceId> {
        self.record().map(|r| r.resources).unwrap_or_default()
    }
}

impl Registrar for Component {
    fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    fn register(&self, mut request: ResourceRequest) -> StackResult<ResourceHandle> {
        request.options.component = Some(self.label());
        let handle = self.deployment.register(request)?;
        let id = handle.resource_id().clone();
        self.deployment
            .update_component(self.index, |record| record.resources.push(id));
        Ok(handle)
    }
}
