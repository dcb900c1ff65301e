// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource property maps assembled from ready and deferred inputs

use serde::Serialize;
use serde_json::{Map, Value};

use super::combinators::all;
use super::value::Deferred;

/// Builder for a request's property object
///
/// Literal fields are stored as-is; deferred fields contribute their
/// dependency sets, so a request built from `Properties` waits on every
/// resource whose output it embeds.
#[derive(Debug, Default, Clone)]
pub struct Properties {
    fields: Vec<(String, Deferred<Value>)>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a literal field
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((key.into(), Deferred::ready(value.into())));
        self
    }

    /// Set a literal field when present
    pub fn set_opt<V: Into<Value>>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.set(key, value),
            None => self,
        }
    }

    /// Set a field resolved later
    pub fn set_deferred<T>(mut self, key: impl Into<String>, value: &Deferred<T>) -> Self
    where
        T: Serialize + Clone + Send + 'static,
    {
        self.fields
            .push((key.into(), value.and_then(|v| serde_json::to_value(&v))));
        self
    }

    /// Set a deferred field when present
    pub fn set_deferred_opt<T>(self, key: impl Into<String>, value: Option<&Deferred<T>>) -> Self
    where
        T: Serialize + Clone + Send + 'static,
    {
        match value {
            Some(value) => self.set_deferred(key, value),
            None => self,
        }
    }

    /// Whether a field has been set
    pub fn contains(&self, key: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == key)
    }

    pub fn fields(&self) -> &[(String, Deferred<Value>)] {
        &self.fields
    }

    /// Assemble the deferred JSON object
    ///
    /// Fields that resolve to `null` are left out, so an optional output the
    /// engine did not report leaves the property unset.
    pub fn build(self) -> Deferred<Value> {
        let (keys, values): (Vec<String>, Vec<Deferred<Value>>) = self.fields.into_iter().unzip();
        all(&values).map(move |values| {
            let mut object = Map::new();
            for (key, value) in keys.into_iter().zip(values) {
                if !value.is_null() {
                    object.insert(key, value);
                }
            }
            Value::Object(object)
        })
    }
}
