// Copyright (c) 2025 - Cowboy AI, Inc.
//! Secret strings

use crate::deferred::{Deferred, Properties};
use crate::deployment::{Component, Deployment, Registrar, ResourceHandle, ResourceKind, ResourceRequest};
use crate::errors::StackResult;
use crate::identity;
use crate::policy::PolicyFactory;

/// Secret with one version, deleted without a recovery window
#[derive(Debug)]
pub struct SecretString {
    component: Component,
    secret: ResourceHandle,
    version: ResourceHandle,
}

impl SecretString {
    pub fn new(
        deployment: &Deployment,
        name: impl Into<String>,
        value: impl Into<Deferred<String>>,
        description: Option<&str>,
    ) -> StackResult<Self> {
        let name = name.into();
        let component = Component::new(deployment, "SecretString", name.clone());

        let secret = component.register(ResourceRequest::new(
            ResourceKind::Secret,
            name.clone(),
            Properties::new()
                .set("name", name.clone())
                .set("recoveryWindowInDays", 0)
                .set("description", description.unwrap_or(&name)),
        ))?;
        let version = component.register(ResourceRequest::new(
            ResourceKind::SecretVersion,
            format!("{name}-version"),
            Properties::new()
                .set_deferred("secretId", &secret.id())
                .set_deferred("secretString", &value.into()),
        ))?;

        Ok(Self {
            component,
            secret,
            version,
        })
    }

    /// IAM policy allowing reads of the secret value, returns its ARN
    pub fn create_get_secret_policy(&self) -> StackResult<Deferred<String>> {
        let policy = identity::create_policy(
            &self.component,
            &format!("{}-policy", self.component.label()),
            &self.secret.arn().map(|arn| PolicyFactory::secret_read(&arn)),
        )?;
        Ok(policy.arn())
    }

    pub fn secret(&self) -> &ResourceHandle {
        &self.secret
    }

    pub fn version(&self) -> &ResourceHandle {
        &self.version
    }

    pub fn arn(&self) -> Deferred<String> {
        self.secret.arn()
    }
}
