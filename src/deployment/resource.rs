// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource requests and handles
//!
//! A `ResourceRequest` is what a builder hands to the deployment: kind,
//! logical name, deferred properties and explicit ordering edges. The
//! deployment answers with a `ResourceHandle` whose id, ARN and outputs are
//! deferred until the engine provisions the resource. Every value read from
//! a handle carries the handle's `ResourceId` as a dependency.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

use super::ResourceKind;
use crate::deferred::{Deferred, Properties, ResolutionError, Resolver};
use crate::engine::ProvisionedResource;

/// Logical identity of a requested resource
///
/// Names are unique per kind within one deployment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    pub kind: ResourceKind,
    pub name: String,
}

impl ResourceId {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.kind, self.name)
    }
}

/// Engine-side operation timeouts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomTimeouts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<String>,
}

impl CustomTimeouts {
    /// Same timeout for create, update and delete (`"10m"`)
    pub fn uniform(timeout: impl Into<String>) -> Self {
        let timeout = timeout.into();
        Self {
            create: Some(timeout.clone()),
            update: Some(timeout.clone()),
            delete: Some(timeout),
        }
    }
}

/// Options forwarded to the engine alongside properties
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_timeouts: Option<CustomTimeouts>,
    /// Adopt an existing resource instead of creating one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_id: Option<String>,
    /// Owning component, when registered through one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
}

/// Request to create one resource
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    pub id: ResourceId,
    pub properties: Deferred<Value>,
    /// Fields as the builder set them; literal ones read before apply
    fields: Vec<(String, Deferred<Value>)>,
    /// Explicit ordering edges in addition to property dependencies
    pub depends_on: BTreeSet<ResourceId>,
    pub options: ResourceOptions,
}

impl ResourceRequest {
    pub fn new(kind: ResourceKind, name: impl Into<String>, properties: Properties) -> Self {
        let fields = properties.fields().to_vec();
        Self {
            fields,
            ..Self::from_deferred(kind, name, properties.build())
        }
    }

    pub fn from_deferred(
        kind: ResourceKind,
        name: impl Into<String>,
        properties: Deferred<Value>,
    ) -> Self {
        Self {
            id: ResourceId::new(kind, name),
            properties,
            fields: Vec::new(),
            depends_on: BTreeSet::new(),
            options: ResourceOptions::default(),
        }
    }

    /// Order this request after `handle`
    pub fn depends_on(mut self, handle: &ResourceHandle) -> Self {
        self.depends_on.insert(handle.resource_id().clone());
        self
    }

    /// Order this request after every handle
    pub fn depends_on_all<'a>(mut self, handles: impl IntoIterator<Item = &'a ResourceHandle>) -> Self {
        self.depends_on
            .extend(handles.into_iter().map(|h| h.resource_id().clone()));
        self
    }

    pub fn with_timeouts(mut self, timeouts: CustomTimeouts) -> Self {
        self.options.custom_timeouts = Some(timeouts);
        self
    }

    /// Adopt an existing resource by its engine id
    pub fn import(mut self, import_id: Option<String>) -> Self {
        self.options.import_id = import_id;
        self
    }

    /// Rewrite the property object; per-field reads then wait for it
    pub fn map_properties<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Value) -> Value + Send + 'static,
    {
        self.properties = self.properties.map(f);
        self.fields.clear();
        self
    }

    pub fn kind(&self) -> ResourceKind {
        self.id.kind
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    /// Explicit edges plus every resource the properties read from
    pub fn dependencies(&self) -> BTreeSet<ResourceId> {
        let mut deps = self.depends_on.clone();
        deps.extend(self.properties.dependencies().iter().cloned());
        deps.remove(&self.id);
        deps
    }

    /// A property, once it is resolved
    ///
    /// Reads the whole object when it is resolved, otherwise the field on its
    /// own, so literal fields are visible while others still wait on
    /// provisioning.
    pub fn property(&self, key: &str) -> Option<Value> {
        match self.properties.peek() {
            Some(Ok(Value::Object(map))) => map.get(key).cloned(),
            Some(_) => None,
            None => self
                .fields
                .iter()
                .rev()
                .find(|(field, _)| field == key)
                .and_then(|(_, value)| value.peek())
                .and_then(Result::ok)
                .filter(|value| !value.is_null()),
        }
    }
}

/// Deferred view of a requested resource
#[derive(Debug, Clone)]
pub struct ResourceHandle {
    id: ResourceId,
    physical_id: Deferred<String>,
    arn: Deferred<String>,
    outputs: Deferred<Value>,
}

/// Write side of a handle, held by the deployment until apply
pub(crate) struct HandleResolvers {
    physical_id: Resolver<String>,
    arn: Resolver<String>,
    outputs: Resolver<Value>,
}

impl HandleResolvers {
    pub(crate) fn resolve(self, provisioned: &ProvisionedResource) {
        self.physical_id.resolve(provisioned.id.clone());
        self.arn.resolve(provisioned.arn.clone());
        self.outputs.resolve(provisioned.outputs.clone());
    }

    pub(crate) fn fail(self, error: ResolutionError) {
        self.physical_id.fail(error.clone());
        self.arn.fail(error.clone());
        self.outputs.fail(error);
    }
}

impl ResourceHandle {
    pub(crate) fn pending(id: ResourceId) -> (Self, HandleResolvers) {
        let (physical_id, id_resolver) = Deferred::pending_labeled(format!("{id}.id"));
        let (arn, arn_resolver) = Deferred::pending_labeled(format!("{id}.arn"));
        let (outputs, outputs_resolver) = Deferred::pending_labeled(format!("{id}.outputs"));
        (
            Self {
                physical_id: physical_id.with_dependency(id.clone()),
                arn: arn.with_dependency(id.clone()),
                outputs: outputs.with_dependency(id.clone()),
                id,
            },
            HandleResolvers {
                physical_id: id_resolver,
                arn: arn_resolver,
                outputs: outputs_resolver,
            },
        )
    }

    pub fn resource_id(&self) -> &ResourceId {
        &self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.id.kind
    }

    /// Logical name
    pub fn name(&self) -> &str {
        &self.id.name
    }

    /// Engine-assigned physical id
    pub fn id(&self) -> Deferred<String> {
        self.physical_id.clone()
    }

    pub fn arn(&self) -> Deferred<String> {
        self.arn.clone()
    }

    pub fn outputs(&self) -> Deferred<Value> {
        self.outputs.clone()
    }

    /// One output field, `null` when the engine did not report it
    pub fn output(&self, key: &str) -> Deferred<Value> {
        let key = key.to_string();
        self.outputs
            .map(move |outputs| outputs.get(&key).cloned().unwrap_or(Value::Null))
    }

    /// One string output field; a missing or non-string field fails
    pub fn output_str(&self, key: &str) -> Deferred<String> {
        let key = key.to_string();
        let id = self.id.clone();
        self.outputs.and_then(move |outputs| {
            outputs
                .get(&key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| format!("{id} has no string output `{key}`"))
        })
    }
}
