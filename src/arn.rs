// Copyright (c) 2025 - Cowboy AI, Inc.
//! Amazon Resource Names
//!
//! `arn:partition:service:region:account-id:resource`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// ARN parsing error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArnError {
    #[error("ARN must start with `arn:`: {0}")]
    MissingPrefix(String),

    #[error("ARN has too few segments: {0}")]
    TooFewSegments(String),

    #[error("ARN has an empty {field}: {arn}")]
    EmptySegment { field: &'static str, arn: String },
}

/// Parsed Amazon Resource Name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Arn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account: String,
    pub resource: String,
}

impl Arn {
    pub fn new(
        service: impl Into<String>,
        region: impl Into<String>,
        account: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            partition: "aws".to_string(),
            service: service.into(),
            region: region.into(),
            account: account.into(),
            resource: resource.into(),
        }
    }

    /// Parse an ARN string
    pub fn parse(s: &str) -> Result<Self, ArnError> {
        let rest = s
            .strip_prefix("arn:")
            .ok_or_else(|| ArnError::MissingPrefix(s.to_string()))?;

        let mut parts = rest.splitn(5, ':');
        let mut next = || parts.next().ok_or_else(|| ArnError::TooFewSegments(s.to_string()));

        let partition = next()?.to_string();
        let service = next()?.to_string();
        let region = next()?.to_string();
        let account = next()?.to_string();
        let resource = next()?.to_string();

        if partition.is_empty() {
            return Err(ArnError::EmptySegment {
                field: "partition",
                arn: s.to_string(),
            });
        }
        if service.is_empty() {
            return Err(ArnError::EmptySegment {
                field: "service",
                arn: s.to_string(),
            });
        }
        if resource.is_empty() {
            return Err(ArnError::EmptySegment {
                field: "resource",
                arn: s.to_string(),
            });
        }

        Ok(Self {
            partition,
            service,
            region,
            account,
            resource,
        })
    }

    /// Final path segment of the resource part
    ///
    /// `arn:aws:iam::aws:policy/service-role/AWSLambdaSQSQueueExecutionRole`
    /// yields `AWSLambdaSQSQueueExecutionRole`.
    pub fn resource_name(&self) -> &str {
        self.resource
            .rsplit('/')
            .next()
            .unwrap_or(self.resource.as_str())
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition, self.service, self.region, self.account, self.resource
        )
    }
}

impl FromStr for Arn {
    type Err = ArnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Arn::parse(s)
    }
}
