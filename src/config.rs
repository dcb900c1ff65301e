// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stack configuration
//!
//! Configuration is a flat map of dotted keys (`apiGateway.loggingLevel`)
//! to string values. It can be assembled from literal pairs, from
//! environment variables, or from a JSON document. Typed views
//! (`StackConfig`, `ApiGatewayConfig`, `PipelineConfig`) read from it and
//! fall back to the defaults below.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::errors::{StackError, StackResult};

/// Flat key/value configuration source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSource {
    values: BTreeMap<String, String>,
}

impl ConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from literal key/value pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Read every `{prefix}{key}` environment variable
    ///
    /// `__` in the remainder separates key segments:
    /// `CIM_STACK_apiGateway__loggingLevel=INFO` becomes
    /// `apiGateway.loggingLevel`.
    pub fn from_env(prefix: &str) -> Self {
        Self::from_vars(prefix, std::env::vars())
    }

    fn from_vars(prefix: &str, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            values: vars
                .into_iter()
                .filter_map(|(key, value)| {
                    key.strip_prefix(prefix)
                        .filter(|rest| !rest.is_empty())
                        .map(|rest| (rest.replace("__", "."), value))
                })
                .collect(),
        }
    }

    /// Flatten a JSON object into dotted keys
    pub fn from_json(json: &str) -> StackResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        let Value::Object(root) = value else {
            return Err(StackError::InvalidConfiguration(
                "configuration document must be a JSON object".to_string(),
            ));
        };

        let mut values = BTreeMap::new();
        let mut stack: Vec<(String, Value)> = root.into_iter().collect();
        while let Some((key, value)) = stack.pop() {
            match value {
                Value::Object(nested) => {
                    stack.extend(nested.into_iter().map(|(k, v)| (format!("{key}.{k}"), v)));
                }
                Value::String(s) => {
                    values.insert(key, s);
                }
                Value::Null => {}
                other => {
                    values.insert(key, other.to_string());
                }
            }
        }
        Ok(Self { values })
    }

    /// Set or replace one key
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Overlay `other` on top of this source
    pub fn merge(mut self, other: ConfigSource) -> Self {
        self.values.extend(other.values);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn require(&self, key: &str) -> StackResult<&str> {
        self.get(key)
            .ok_or_else(|| StackError::MissingConfiguration(key.to_string()))
    }

    pub fn get_number<T: FromStr>(&self, key: &str) -> StackResult<Option<T>> {
        self.get(key)
            .map(|raw| {
                raw.trim().parse::<T>().map_err(|_| {
                    StackError::InvalidConfiguration(format!("{key}: `{raw}` is not a number"))
                })
            })
            .transpose()
    }

    pub fn get_bool(&self, key: &str) -> StackResult<Option<bool>> {
        self.get(key)
            .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                _ => Err(StackError::InvalidConfiguration(format!(
                    "{key}: `{raw}` is not a boolean"
                ))),
            })
            .transpose()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Stack-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackConfig {
    /// Organization, used for component type tokens and stack references
    pub org: String,

    /// Cost allocation tag
    pub cost_center: String,

    /// Retention of API access log groups
    pub access_logs_retention_days: u32,
}

impl StackConfig {
    pub fn new(org: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            cost_center: "aws".to_string(),
            access_logs_retention_days: 30,
        }
    }

    /// Read from a source; `org` is required
    pub fn from_source(source: &ConfigSource) -> StackResult<Self> {
        let defaults = Self::new(source.require("org")?);
        Ok(Self {
            cost_center: source
                .get("costCenter")
                .map(str::to_string)
                .unwrap_or(defaults.cost_center),
            access_logs_retention_days: source
                .get_number("accessLogsRetentionDays")?
                .unwrap_or(defaults.access_logs_retention_days),
            org: defaults.org,
        })
    }
}

/// REST gateway stage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGatewayConfig {
    pub logging_level: String,
    pub metrics_enabled: bool,
    pub throttling_burst_limit: u32,
    pub throttling_rate_limit: f64,
    pub minimum_compression_size: u32,
}

impl Default for ApiGatewayConfig {
    fn default() -> Self {
        Self {
            logging_level: "ERROR".to_string(),
            metrics_enabled: true,
            throttling_burst_limit: 1000,
            throttling_rate_limit: 500.0,
            minimum_compression_size: 20000,
        }
    }
}

impl ApiGatewayConfig {
    pub fn from_source(source: &ConfigSource) -> StackResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            logging_level: source
                .get("apiGateway.loggingLevel")
                .map(str::to_string)
                .unwrap_or(defaults.logging_level),
            metrics_enabled: source
                .get_bool("apiGateway.metricsEnabled")?
                .unwrap_or(defaults.metrics_enabled),
            throttling_burst_limit: source
                .get_number("apiGateway.throttlingBurstLimit")?
                .unwrap_or(defaults.throttling_burst_limit),
            throttling_rate_limit: source
                .get_number("apiGateway.throttlingRateLimit")?
                .unwrap_or(defaults.throttling_rate_limit),
            minimum_compression_size: source
                .get_number("apiGateway.minimumCompressionSize")?
                .unwrap_or(defaults.minimum_compression_size),
        })
    }
}

/// Topic and queue settings for pipelines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    pub success_feedback_sample_rate: u32,
    pub visibility_timeout_seconds: u32,
    pub max_message_size: u32,
    pub message_retention_seconds: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            success_feedback_sample_rate: 100,
            visibility_timeout_seconds: 30,
            max_message_size: 10240,
            message_retention_seconds: 604800,
        }
    }
}

impl PipelineConfig {
    pub fn from_source(source: &ConfigSource) -> StackResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            success_feedback_sample_rate: source
                .get_number("sns.successFeedbackSampleRate")?
                .unwrap_or(defaults.success_feedback_sample_rate),
            visibility_timeout_seconds: source
                .get_number("sqs.visibilityTimeoutSeconds")?
                .unwrap_or(defaults.visibility_timeout_seconds),
            max_message_size: source
                .get_number("sqs.maxMessageSize")?
                .unwrap_or(defaults.max_message_size),
            message_retention_seconds: source
                .get_number("sqs.messageRetentionSeconds")?
                .unwrap_or(defaults.message_retention_seconds),
        })
    }
}
