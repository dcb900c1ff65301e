// Copyright (c) 2025 - Cowboy AI, Inc.
//! Policy documents
//!
//! Wire schema:
//!
//! ```json
//! {
//!   "Version": "2012-10-17",
//!   "Statement": [
//!     { "Sid": "...", "Effect": "Allow", "Principal": {...},
//!       "Action": "s3:GetObject" | ["..."], "Resource": "..." | ["..."],
//!       "Condition": { "ArnEquals": { "aws:SourceArn": "..." } } }
//!   ]
//! }
//! ```

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// The only policy language version in use
pub const POLICY_VERSION: &str = "2012-10-17";

/// Policy schema violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("policy document has no Version")]
    MissingVersion,

    #[error("unsupported policy Version `{0}`")]
    UnsupportedVersion(String),

    #[error("policy document has no statements")]
    EmptyDocument,

    #[error("statement {index} has no actions")]
    EmptyActions { index: usize },

    #[error("statement {index} has invalid Effect `{effect}`")]
    InvalidEffect { index: usize, effect: String },

    #[error("malformed policy document: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// A single string or a list, as the wire format allows both
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn len(&self) -> usize {
        match self {
            OneOrMany::One(_) => 1,
            OneOrMany::Many(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            OneOrMany::One(value) => value.is_empty(),
            OneOrMany::Many(values) => values.is_empty(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let values: Vec<&str> = match self {
            OneOrMany::One(value) => vec![value.as_str()],
            OneOrMany::Many(values) => values.iter().map(String::as_str).collect(),
        };
        values.into_iter()
    }

    /// Append, turning a single value into a list
    pub fn push(&mut self, value: impl Into<String>) {
        let value = value.into();
        match self {
            OneOrMany::Many(values) => values.push(value),
            OneOrMany::One(first) => {
                let first = std::mem::take(first);
                *self = OneOrMany::Many(vec![first, value]);
            }
        }
    }
}

impl From<&str> for OneOrMany {
    fn from(value: &str) -> Self {
        OneOrMany::One(value.to_string())
    }
}

impl From<String> for OneOrMany {
    fn from(value: String) -> Self {
        OneOrMany::One(value)
    }
}

impl From<Vec<String>> for OneOrMany {
    fn from(values: Vec<String>) -> Self {
        OneOrMany::Many(values)
    }
}

impl From<Vec<&str>> for OneOrMany {
    fn from(values: Vec<&str>) -> Self {
        OneOrMany::Many(values.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for OneOrMany {
    fn from(values: [&str; N]) -> Self {
        OneOrMany::Many(values.iter().map(|v| v.to_string()).collect())
    }
}

/// Who a statement applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// `"*"`
    Anyone,
    /// `{ "AWS": ... }`
    Aws(OneOrMany),
    /// `{ "Service": ... }`
    Service(OneOrMany),
    /// `{ "Federated": ... }`
    Federated(OneOrMany),
}

impl Principal {
    /// Service principal(s), `{service}.amazonaws.com`
    pub fn services<I, S>(services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Principal::Service(OneOrMany::Many(
            services
                .into_iter()
                .map(|s| service_principal(s.as_ref()))
                .collect(),
        ))
    }

    pub fn service(service: &str) -> Self {
        Principal::Service(OneOrMany::One(service_principal(service)))
    }

    pub fn aws(arns: impl Into<OneOrMany>) -> Self {
        Principal::Aws(arns.into())
    }
}

impl Serialize for Principal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (key, value) = match self {
            Principal::Anyone => return serializer.serialize_str("*"),
            Principal::Aws(v) => ("AWS", v),
            Principal::Service(v) => ("Service", v),
            Principal::Federated(v) => ("Federated", v),
        };
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(key, value)?;
        map.end()
    }
}

/// `{service}.amazonaws.com`
pub fn service_principal(service: &str) -> String {
    if service.ends_with(".amazonaws.com") {
        service.to_string()
    } else {
        format!("{service}.amazonaws.com")
    }
}

/// Condition operator → key → value(s)
pub type Condition = BTreeMap<String, BTreeMap<String, OneOrMany>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    pub effect: Effect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    pub action: OneOrMany,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<OneOrMany>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub condition: Condition,
}

impl Statement {
    pub fn allow() -> Self {
        Self::with_effect(Effect::Allow)
    }

    pub fn deny() -> Self {
        Self::with_effect(Effect::Deny)
    }

    fn with_effect(effect: Effect) -> Self {
        Self {
            sid: None,
            effect,
            principal: None,
            action: OneOrMany::Many(Vec::new()),
            resource: None,
            condition: Condition::new(),
        }
    }

    pub fn sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    /// Set the action(s), replacing previous ones
    pub fn action(mut self, action: impl Into<OneOrMany>) -> Self {
        self.action = action.into();
        self
    }

    /// Set the resource(s), replacing previous ones
    pub fn resource(mut self, resource: impl Into<OneOrMany>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Append one resource
    pub fn add_resource(mut self, resource: impl Into<String>) -> Self {
        match self.resource.as_mut() {
            Some(existing) => existing.push(resource),
            None => self.resource = Some(OneOrMany::Many(vec![resource.into()])),
        }
        self
    }

    pub fn principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    /// Add `{ operator: { key: value } }`
    pub fn condition(
        mut self,
        operator: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<OneOrMany>,
    ) -> Self {
        self.condition
            .entry(operator.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }
}

/// Policy document
///
/// Statements are append-only; the version is fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    version: String,
    statement: Vec<Statement>,
}

impl Default for PolicyDocument {
    fn default() -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statement: Vec::new(),
        }
    }
}

impl PolicyDocument {
    pub fn builder() -> Self {
        Self::default()
    }

    pub fn statement(mut self, statement: Statement) -> Self {
        self.statement.push(statement);
        self
    }

    pub fn push(&mut self, statement: Statement) {
        self.statement.push(statement);
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statement
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Check the document against the wire schema
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.statement.is_empty() {
            return Err(PolicyError::EmptyDocument);
        }
        for (index, statement) in self.statement.iter().enumerate() {
            if statement.action.is_empty() || statement.action.iter().any(str::is_empty) {
                return Err(PolicyError::EmptyActions { index });
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Validated JSON text, as policy properties expect it
    pub fn to_json_string(&self) -> Result<String, PolicyError> {
        self.validate()?;
        serde_json::to_string(self).map_err(|e| PolicyError::Malformed(e.to_string()))
    }
}

/// Validate an arbitrary JSON policy document
pub fn validate_json(document: &Value) -> Result<(), PolicyError> {
    let object = document
        .as_object()
        .ok_or_else(|| PolicyError::Malformed("document is not an object".to_string()))?;

    match object.get("Version").and_then(Value::as_str) {
        None => return Err(PolicyError::MissingVersion),
        Some(POLICY_VERSION) => {}
        Some(other) => return Err(PolicyError::UnsupportedVersion(other.to_string())),
    }

    let statements: Vec<&Value> = match object.get("Statement") {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single @ Value::Object(_)) => vec![single],
        _ => return Err(PolicyError::EmptyDocument),
    };
    if statements.is_empty() {
        return Err(PolicyError::EmptyDocument);
    }

    for (index, statement) in statements.into_iter().enumerate() {
        match statement.get("Effect").and_then(Value::as_str) {
            Some("Allow") | Some("Deny") => {}
            other => {
                return Err(PolicyError::InvalidEffect {
                    index,
                    effect: other.unwrap_or_default().to_string(),
                })
            }
        }
        let has_actions = match statement.get("Action") {
            Some(Value::String(action)) => !action.is_empty(),
            Some(Value::Array(actions)) => {
                !actions.is_empty() && actions.iter().all(|a| a.as_str().is_some_and(|s| !s.is_empty()))
            }
            _ => false,
        };
        if !has_actions {
            return Err(PolicyError::EmptyActions { index });
        }
    }
    Ok(())
}
