// Copyright (c) 2025 - Cowboy AI, Inc.
//! Customer-managed encryption keys

use crate::deferred::{all, all2, Deferred, Properties};
use crate::deployment::{Component, Deployment, Registrar, ResourceHandle, ResourceKind, ResourceRequest};
use crate::errors::StackResult;
use crate::policy::PolicyFactory;

/// Rotating key usable by the given services and roles
///
/// The key policy needs the account id, which comes from the stack context
/// and may resolve late or fail; a failure fails the key request.
#[derive(Debug)]
pub struct SseCmk {
    component: Component,
    key: ResourceHandle,
}

impl SseCmk {
    pub fn new(
        deployment: &Deployment,
        name: impl Into<String>,
        services: &[&str],
        role_arns: &[Deferred<String>],
    ) -> StackResult<Self> {
        let name = name.into();
        let component = Component::new(deployment, "SseCmk", name.clone());

        let services: Vec<String> = services.iter().map(|s| s.to_string()).collect();
        let policy = all2(&deployment.context().account_id(), &all(role_arns)).and_then(
            move |(account_id, role_arns)| {
                PolicyFactory::kms_key(&account_id, &services, &role_arns).to_json_string()
            },
        );

        let key = component.register(ResourceRequest::new(
            ResourceKind::KmsKey,
            format!("{name}-sse-cmk"),
            Properties::new()
                .set("enableKeyRotation", true)
                .set_deferred("policy", &policy),
        ))?;
        Ok(Self { component, key })
    }

    pub fn key_id(&self) -> Deferred<String> {
        self.key.id()
    }

    pub fn arn(&self) -> Deferred<String> {
        self.key.arn()
    }

    pub fn key(&self) -> &ResourceHandle {
        &self.key
    }

    pub fn component(&self) -> &Component {
        &self.component
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StackConfig;
    use crate::context::StackContext;
    use crate::deferred::ResolutionError;
    use crate::engine::RecordingEngine;
    use crate::errors::StackError;
    use crate::policy::validate_json;
    use serde_json::Value;

    fn deployment(account_id: Deferred<String>) -> Deployment {
        Deployment::new(StackContext::new(
            "ingest",
            "dev",
            "eu-west-1",
            StackConfig::new("cowboy"),
            account_id,
        ))
    }

    #[tokio::test]
    async fn test_key_policy_names_account_root() {
        let deployment = deployment("123456789012".into());
        let key = SseCmk::new(
            &deployment,
            "pipeline",
            &["sns", "sqs"],
            &["arn:aws:iam::123456789012:role/ingest".into()],
        )
        .unwrap();

        let engine = RecordingEngine::new("eu-west-1", "123456789012");
        deployment.apply(&engine).await.unwrap();

        let submitted = engine.submission(ResourceKind::KmsKey, "pipeline-sse-cmk").unwrap();
        let policy: Value = serde_json::from_str(submitted.property_str("policy").unwrap()).unwrap();
        assert!(validate_json(&policy).is_ok());
        assert_eq!(
            policy["Statement"][0]["Principal"]["AWS"],
            "arn:aws:iam::123456789012:root"
        );
        assert_eq!(
            policy["Statement"][1]["Principal"]["Service"],
            serde_json::json!(["sns.amazonaws.com", "sqs.amazonaws.com"])
        );
        assert!(key.key_id().is_resolved());
    }

    #[tokio::test]
    async fn test_account_lookup_failure_propagates() {
        let deployment = deployment(Deferred::failed(ResolutionError::failed(
            "caller-identity",
            "credentials expired",
        )));
        SseCmk::new(&deployment, "pipeline", &["sns"], &[]).unwrap();

        let engine = RecordingEngine::new("eu-west-1", "123456789012");
        let err = deployment.apply(&engine).await.unwrap_err();
        assert!(matches!(err, StackError::ExternalResolution(_)));
        assert!(engine.is_empty());
    }
}
