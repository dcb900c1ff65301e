// Copyright (c) 2025 - Cowboy AI, Inc.
//! REST API gateway
//!
//! The gateway owns the API, its deployment and stage. Methods created
//! against a `RestApiHandle` report their resources and template hashes
//! back to the gateway; `with_deployment` folds them into the deployment's
//! dependencies and its `templatesHash` variable, so a template change
//! forces a redeploy.
//!
//! ```text
//! RestApiGateway::new ──> RestApiMethod(s) ──> with_deployment ──> with_api_key
//!                         register variables    seals the list     needs the stage
//!                         and dependencies
//! ```
//!
//! Methods must be complete before `with_deployment`; registering against
//! a deployed gateway is a `ConfigurationOrder` error.

pub mod method;
pub mod types;

pub use method::{
    IntegrationOptions, MethodStage, ModelSource, PredefinedModel, RestApiMethod, ValidatorArgs,
};
pub use types::{
    AuthorizationMethod, EndpointType, HttpMethod, IntegrationType, PassThroughBehavior,
    RequestParamType,
};

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use crate::config::ApiGatewayConfig;
use crate::deferred::{all, all2, Deferred, Properties};
use crate::deployment::{
    Component, CustomTimeouts, Deployment, Registrar, ResourceHandle, ResourceKind, ResourceRequest,
};
use crate::errors::{StackError, StackResult};
use crate::identity;
use crate::policy::PolicyFactory;
use crate::state_machine::{StageTracker, StateMachine, Step, TransitionError, TransitionResult};
use crate::template::{content_hash, Template};

/// Create, update and delete timeout of the deployment and stage
pub const DEPLOYMENT_TIMEOUT: &str = "10m";

#[derive(Debug, Default)]
struct DeploymentTriggers {
    variables: Vec<Deferred<String>>,
    dependencies: Vec<ResourceHandle>,
    sealed: bool,
}

/// Cloneable view of a gateway, handed to methods
#[derive(Debug, Clone)]
pub struct RestApiHandle {
    name: String,
    api: ResourceHandle,
    triggers: Arc<Mutex<DeploymentTriggers>>,
}

impl RestApiHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> Deferred<String> {
        self.api.id()
    }

    pub fn arn(&self) -> Deferred<String> {
        self.api.arn()
    }

    pub fn root_resource_id(&self) -> Deferred<String> {
        self.api.output_str("rootResourceId")
    }

    pub fn resource(&self) -> &ResourceHandle {
        &self.api
    }

    /// Whether the gateway deployment has been created
    pub fn is_deployed(&self) -> bool {
        self.triggers.lock().sealed
    }

    /// Value folded into the deployment's `templatesHash`
    pub fn register_deployment_variable(&self, variable: impl Into<Deferred<String>>) -> StackResult<()> {
        let mut triggers = self.triggers.lock();
        self.ensure_open(&triggers, "register_deployment_variable")?;
        triggers.variables.push(variable.into());
        Ok(())
    }

    /// Resources the deployment must wait for
    pub fn register_deployment_dependencies<'a>(
        &self,
        dependencies: impl IntoIterator<Item = &'a ResourceHandle>,
    ) -> StackResult<()> {
        let mut triggers = self.triggers.lock();
        self.ensure_open(&triggers, "register_deployment_dependencies")?;
        triggers.dependencies.extend(dependencies.into_iter().cloned());
        Ok(())
    }

    /// Fail when the deployment was already created
    pub(crate) fn check_open(&self, step: &str) -> StackResult<()> {
        let triggers = self.triggers.lock();
        self.ensure_open(&triggers, step)
    }

    fn ensure_open(&self, triggers: &DeploymentTriggers, step: &str) -> StackResult<()> {
        if triggers.sealed {
            return Err(StackError::ConfigurationOrder {
                builder: format!("RestApiGateway-{}", self.name),
                step: step.to_string(),
                reason: "gateway deployment already created".to_string(),
            });
        }
        Ok(())
    }

    /// Create the deployment from the registered triggers
    ///
    /// The handle is sealed only when `create` succeeds.
    fn seal_with<T>(
        &self,
        create: impl FnOnce(&[Deferred<String>], &[ResourceHandle]) -> StackResult<T>,
    ) -> StackResult<T> {
        let mut triggers = self.triggers.lock();
        self.ensure_open(&triggers, "with_deployment")?;
        let created = create(&triggers.variables, &triggers.dependencies)?;
        triggers.sealed = true;
        Ok(created)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayStage {
    Defined,
    Deployed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayStep {
    Deployment,
    ApiKey,
}

impl Step for GatewayStep {
    fn name(&self) -> &'static str {
        match self {
            GatewayStep::Deployment => "with_deployment",
            GatewayStep::ApiKey => "with_api_key",
        }
    }
}

impl StateMachine for GatewayStage {
    type Input = GatewayStep;
    type Output = ();

    fn transition(&self, step: &GatewayStep) -> TransitionResult<(Self, ())> {
        match (self, step) {
            (GatewayStage::Defined, GatewayStep::Deployment) => Ok((GatewayStage::Deployed, ())),
            (GatewayStage::Deployed, GatewayStep::Deployment) => {
                Err(TransitionError::already_configured(step, "stage"))
            }
            (GatewayStage::Defined, GatewayStep::ApiKey) => {
                Err(TransitionError::out_of_order(step, "stage must be defined before api keys"))
            }
            (GatewayStage::Deployed, GatewayStep::ApiKey) => Ok((GatewayStage::Deployed, ())),
        }
    }
}

#[derive(Debug, Clone)]
struct DeployedStage {
    name: String,
    deployment: ResourceHandle,
    stage: ResourceHandle,
}

/// REST API with deployment, stage, custom domain and keys
#[derive(Debug)]
pub struct RestApiGateway {
    component: Component,
    handle: RestApiHandle,
    config: ApiGatewayConfig,
    stage: StageTracker<GatewayStage>,
    access_log_format: Template,
    deployed: Option<DeployedStage>,
}

impl RestApiGateway {
    pub fn new(
        deployment: &Deployment,
        api_name: impl Into<String>,
        config: ApiGatewayConfig,
        endpoint_type: EndpointType,
    ) -> StackResult<Self> {
        let api_name = api_name.into();
        let component = Component::new(deployment, "RestApiGateway", api_name.clone());

        let api = component.register(ResourceRequest::new(
            ResourceKind::RestApi,
            api_name.clone(),
            Properties::new()
                .set("name", api_name.clone())
                .set("endpointConfiguration", json!({ "types": [endpoint_type.as_str()] }))
                .set("minimumCompressionSize", config.minimum_compression_size),
        ))?;
        component.add_output(
            "api",
            api.outputs().map(|outputs| {
                json!({
                    "name": outputs.get("name").cloned().unwrap_or(Value::Null),
                    "id": outputs.get("id").cloned().unwrap_or(Value::Null),
                    "rootResourceId": outputs.get("rootResourceId").cloned().unwrap_or(Value::Null),
                    "arn": outputs.get("arn").cloned().unwrap_or(Value::Null),
                })
            }),
        );

        let handle = RestApiHandle {
            name: api_name,
            api: api.clone(),
            triggers: Arc::new(Mutex::new(DeploymentTriggers {
                dependencies: vec![api],
                ..DeploymentTriggers::default()
            })),
        };

        Ok(Self {
            stage: StageTracker::new(component.label(), GatewayStage::Defined),
            component,
            handle,
            config,
            access_log_format: Template::access_log_format(),
            deployed: None,
        })
    }

    /// Replace the embedded access-log format
    pub fn with_access_log_format(mut self, format: Template) -> Self {
        self.access_log_format = format;
        self
    }

    pub fn register_deployment_variable(&self, variable: impl Into<Deferred<String>>) -> StackResult<()> {
        self.handle.register_deployment_variable(variable)
    }

    pub fn register_deployment_dependencies<'a>(
        &self,
        dependencies: impl IntoIterator<Item = &'a ResourceHandle>,
    ) -> StackResult<()> {
        self.handle.register_deployment_dependencies(dependencies)
    }

    /// Invoke policy for GET and POST attached to `group`
    pub fn with_public_api_access_group(self, group: impl Into<Deferred<String>>) -> StackResult<Self> {
        let policy = self.create_invoke_policy(&[HttpMethod::Get, HttpMethod::Post], "*")?;
        identity::attach_group_policies(&self.component, &group.into(), &[policy.arn()])?;
        Ok(self)
    }

    /// Account-level role for gateway logging
    pub fn with_cloudwatch_role(self, cloudwatch_role_arn: impl Into<Deferred<String>>) -> StackResult<Self> {
        self.component.register(ResourceRequest::new(
            ResourceKind::ApiAccount,
            format!("{}-accountSettings", self.handle.name),
            Properties::new().set_deferred("cloudwatchRoleArn", &cloudwatch_role_arn.into()),
        ))?;
        Ok(self)
    }

    /// Deployment, access-log group, stage and method settings
    pub fn with_deployment(mut self, stage_name: &str) -> StackResult<Self> {
        self.stage.advance(GatewayStep::Deployment)?;
        let context = self.component.deployment().context().clone();
        let api_name = self.handle.name.clone();

        let deployment = self.handle.seal_with(|variables, dependencies| {
            debug!(
                api = %api_name,
                variables = variables.len(),
                dependencies = dependencies.len(),
                "Creating gateway deployment"
            );
            let templates_hash = all(variables).map(|variables| content_hash(&variables.join("#")));
            self.component.register(
                ResourceRequest::new(
                    ResourceKind::ApiDeployment,
                    format!("{api_name}-deployment-{stage_name}"),
                    Properties::new()
                        .set_deferred("restApi", &self.handle.id())
                        .set_deferred(
                            "variables",
                            &templates_hash.map(|hash| json!({ "templatesHash": hash })),
                        ),
                )
                .depends_on_all(dependencies)
                .with_timeouts(CustomTimeouts::uniform(DEPLOYMENT_TIMEOUT)),
            )
        })?;

        let access_logs = self.component.register(ResourceRequest::new(
            ResourceKind::LogGroup,
            format!("{api_name}-{}-access-logs", context.stack),
            Properties::new().set("retentionInDays", context.config.access_logs_retention_days),
        ))?;

        let format = self.access_log_format.text().to_string();
        let stage = self.component.register(
            ResourceRequest::new(
                ResourceKind::ApiStage,
                format!("{api_name}-{stage_name}"),
                Properties::new()
                    .set_deferred("restApi", &self.handle.id())
                    .set_deferred("deployment", &deployment.id())
                    .set("stageName", stage_name)
                    .set_deferred(
                        "accessLogSettings",
                        &access_logs
                            .arn()
                            .map(move |arn| json!({ "destinationArn": arn, "format": format })),
                    ),
            )
            .with_timeouts(CustomTimeouts::uniform(DEPLOYMENT_TIMEOUT)),
        )?;

        self.component.register(
            ResourceRequest::new(
                ResourceKind::ApiMethodSettings,
                format!("{api_name}-{stage_name}-method-settings"),
                Properties::new()
                    .set_deferred("restApi", &self.handle.id())
                    .set("stageName", stage_name)
                    .set("methodPath", "*/*")
                    .set(
                        "settings",
                        json!({
                            "metricsEnabled": self.config.metrics_enabled,
                            "throttlingRateLimit": self.config.throttling_rate_limit,
                            "throttlingBurstLimit": self.config.throttling_burst_limit,
                            "loggingLevel": self.config.logging_level,
                        }),
                    ),
            )
            .depends_on_all([&deployment, &stage]),
        )?;

        self.component.add_dependencies([&stage, &deployment]);
        self.deployed = Some(DeployedStage {
            name: stage_name.to_string(),
            deployment,
            stage,
        });
        Ok(self)
    }

    /// Regional domain `api-{stack}.{domain}` mapped to `stage_name`
    ///
    /// A trailing `.` on `domain_name` (as in hosted zone names) is dropped.
    pub fn with_custom_domain(
        self,
        stage_name: &str,
        domain_name: &str,
        zone_id: impl Into<Deferred<String>>,
        certificate_arn: impl Into<Deferred<String>>,
    ) -> StackResult<Self> {
        let stack = &self.component.deployment().context().stack;
        let name = format!("api-{stack}.{}", domain_name.trim_end_matches('.'));

        let domain = self.component.register(ResourceRequest::new(
            ResourceKind::ApiDomainName,
            format!("domain-{name}"),
            Properties::new()
                .set_deferred("regionalCertificateArn", &certificate_arn.into())
                .set("domainName", name.clone())
                .set("endpointConfiguration", json!({ "types": [EndpointType::Regional.as_str()] })),
        ))?;

        let mut mapping = ResourceRequest::new(
            ResourceKind::ApiBasePathMapping,
            format!("domain-mapping-{name}"),
            Properties::new()
                .set_deferred("restApi", &self.handle.id())
                .set("stageName", stage_name)
                .set_deferred("domainName", &domain.id()),
        )
        .depends_on(self.handle.resource());
        if let Some(deployed) = self.deployed.as_ref().filter(|d| d.name == stage_name) {
            mapping = mapping.depends_on(&deployed.stage);
        }
        self.component.register(mapping)?;

        let alias = all2(
            &domain.output_str("regionalDomainName"),
            &domain.output_str("regionalZoneId"),
        )
        .map(|(target, target_zone)| {
            json!([{ "evaluateTargetHealth": false, "name": target, "zoneId": target_zone }])
        });
        self.component.register(ResourceRequest::new(
            ResourceKind::DnsRecord,
            format!("alias-{name}"),
            Properties::new()
                .set_deferred("name", &domain.output_str("domainName"))
                .set("type", "A")
                .set_deferred("zoneId", &zone_id.into())
                .set_deferred("aliases", &alias),
        ))?;
        Ok(self)
    }

    /// API key bound to the stage through a usage plan
    pub fn with_api_key(mut self, key_name: &str, key_value: impl Into<Deferred<String>>) -> StackResult<Self> {
        self.stage.advance(GatewayStep::ApiKey)?;
        let deployed = self.deployed.clone().ok_or_else(|| StackError::ConfigurationOrder {
            builder: self.component.label(),
            step: GatewayStep::ApiKey.name().to_string(),
            reason: "stage must be defined before api keys".to_string(),
        })?;
        let stack = self.component.deployment().context().stack.clone();

        let key = self.component.register(ResourceRequest::new(
            ResourceKind::ApiKey,
            format!("{key_name}-{stack}"),
            Properties::new().set_deferred("value", &key_value.into()),
        ))?;
        let stage_name = deployed.name.clone();
        let plan = self.component.register(
            ResourceRequest::new(
                ResourceKind::ApiUsagePlan,
                format!("{key_name}-{stack}-up"),
                Properties::new().set_deferred(
                    "apiStages",
                    &self
                        .handle
                        .id()
                        .map(move |api_id| json!([{ "apiId": api_id, "stage": stage_name }])),
                ),
            )
            .depends_on(&deployed.stage),
        )?;
        self.component.register(ResourceRequest::new(
            ResourceKind::ApiUsagePlanKey,
            format!("{key_name}-{stack}-upk"),
            Properties::new()
                .set_deferred("keyId", &key.id())
                .set("keyType", "API_KEY")
                .set_deferred("usagePlanId", &plan.id()),
        ))?;
        Ok(self)
    }

    /// `execute-api:Invoke` on `methods` of `stage` (`*` for every stage)
    pub fn create_invoke_policy(&self, methods: &[HttpMethod], stage: &str) -> StackResult<ResourceHandle> {
        let region = self.component.deployment().context().region.clone();
        let stage = stage.to_string();
        let methods: Vec<String> = methods.iter().map(|m| m.as_str().to_string()).collect();
        let document = self
            .handle
            .id()
            .map(move |api_id| PolicyFactory::api_invoke(&region, &api_id, &stage, &methods));
        identity::create_policy(
            &self.component,
            &format!("InvokePolicyForPublicApi-{}", self.handle.name),
            &document,
        )
    }

    /// Top-level path segment under the API root
    pub fn create_root_api_resource(&self, path: &str) -> StackResult<ResourceHandle> {
        self.component.register(ResourceRequest::new(
            ResourceKind::ApiResource,
            format!("{}-{path}", self.handle.name),
            Properties::new()
                .set_deferred("restApi", &self.handle.id())
                .set_deferred("parentId", &self.handle.root_resource_id())
                .set("pathPart", path),
        ))
    }

    pub fn handle(&self) -> &RestApiHandle {
        &self.handle
    }

    pub fn id(&self) -> Deferred<String> {
        self.handle.id()
    }

    pub fn arn(&self) -> Deferred<String> {
        self.handle.arn()
    }

    pub fn stage_name(&self) -> Option<&str> {
        self.deployed.as_ref().map(|d| d.name.as_str())
    }

    pub fn stage(&self) -> Option<&ResourceHandle> {
        self.deployed.as_ref().map(|d| &d.stage)
    }

    pub fn api_deployment(&self) -> Option<&ResourceHandle> {
        self.deployed.as_ref().map(|d| &d.deployment)
    }

    pub fn component(&self) -> &Component {
        &self.component
    }
}
