// Copyright (c) 2025 - Cowboy AI, Inc.
//! Integration and log-format templates
//!
//! Templates are plain text loaded from a path or embedded defaults.
//! Placeholders are literal markers replaced by `render`.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::{StackError, StackResult};

/// Replaced by the table name in service integration templates
pub const TABLE_NAME_PLACEHOLDER: &str = "@@TABLENAME@@";

/// Replaced by the topic ARN in topic-publish templates
pub const TOPIC_PLACEHOLDER: &str = "@@TOPIC@@";

const TOPIC_PUBLISH_REQUEST: &str =
    include_str!("../templates/apigw.sns.publish.default.request.vtl");
const TOPIC_PUBLISH_RESPONSE: &str =
    include_str!("../templates/apigw.sns.publish.default.response.vtl");
const ACCESS_LOG_FORMAT: &str = include_str!("../templates/apiGwAccessLog.txt");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    text: String,
}

impl Template {
    /// Read a template file
    pub fn load(path: impl AsRef<Path>) -> StackResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| StackError::Template {
            path: PathBuf::from(path),
            source,
        })?;
        debug!(template = %path.display(), bytes = text.len(), "Loaded template");
        Ok(Self {
            source: path.display().to_string(),
            text,
        })
    }

    pub fn from_text(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }

    /// Default request template for topic-publish integrations
    pub fn topic_publish_request() -> Self {
        Self::from_text("embedded:topic-publish-request", TOPIC_PUBLISH_REQUEST)
    }

    /// Default response template for topic-publish integrations
    pub fn topic_publish_response() -> Self {
        Self::from_text("embedded:topic-publish-response", TOPIC_PUBLISH_RESPONSE)
    }

    /// Default API access-log format
    pub fn access_log_format() -> Self {
        Self::from_text("embedded:access-log", ACCESS_LOG_FORMAT.trim_end())
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace every occurrence of each placeholder
    pub fn render(&self, replacements: &[(&str, &str)]) -> String {
        replacements
            .iter()
            .fold(self.text.clone(), |text, (placeholder, value)| {
                text.replace(placeholder, value)
            })
    }

    /// Apply a transform to the text, e.g. to adapt a shared schema
    pub fn map(self, f: impl FnOnce(String) -> String) -> Self {
        Self {
            source: self.source,
            text: f(self.text),
        }
    }

    pub fn content_hash(&self) -> String {
        content_hash(&self.text)
    }
}

/// Hex SHA-256 of `text`
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_render_replaces_every_occurrence() {
        let template = Template::from_text(
            "inline",
            r#"{"TableName": "@@TABLENAME@@", "Copy": "@@TABLENAME@@"}"#,
        );
        assert_eq!(
            template.render(&[(TABLE_NAME_PLACEHOLDER, "orders-dev")]),
            r#"{"TableName": "orders-dev", "Copy": "orders-dev"}"#
        );
    }

    #[test]
    fn test_embedded_defaults() {
        assert!(Template::topic_publish_request().text().contains(TOPIC_PLACEHOLDER));
        assert!(Template::access_log_format().text().contains("$context.requestId"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Template::load("/nonexistent/request.vtl").unwrap_err();
        assert!(matches!(err, StackError::Template { .. }));
    }

    #[test]
    fn test_load_from_disk() {
        let path = std::env::temp_dir().join(format!("cim-stack-{}.vtl", uuid::Uuid::now_v7()));
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{{\"TopicArn\": \"{TOPIC_PLACEHOLDER}\"}}").unwrap();

        let template = Template::load(&path).unwrap();
        assert_eq!(
            template.render(&[(TOPIC_PLACEHOLDER, "arn:aws:sns:eu-west-1:1:orders")]),
            "{\"TopicArn\": \"arn:aws:sns:eu-west-1:1:orders\"}"
        );
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(content_hash("a#b"), content_hash("a#b"));
        assert_ne!(content_hash("a#b"), content_hash("a#c"));
        assert_eq!(content_hash("").len(), 64);
    }
}
