// Copyright (c) 2025 - Cowboy AI, Inc.
//! Gateway methods and their integrations
//!
//! Request validators, parameters and models feed into the method resource,
//! so they must all be declared before `with_method`. An integration needs
//! the method and is declared once.

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use super::types::{AuthorizationMethod, HttpMethod, IntegrationType, PassThroughBehavior, RequestParamType};
use super::RestApiHandle;
use crate::deferred::{all, Deferred, Properties};
use crate::deployment::{Component, Deployment, Registrar, ResourceHandle, ResourceKind, ResourceRequest};
use crate::errors::{StackError, StackResult};
use crate::resources::table::DynamoDbAction;
use crate::state_machine::{StageTracker, StateMachine, Step, TransitionError, TransitionResult};
use crate::template::{content_hash, Template, TABLE_NAME_PLACEHOLDER, TOPIC_PLACEHOLDER};

const JSON_CONTENT_TYPE: &str = "application/json";

/// Integration timeout when none is given
pub const DEFAULT_INTEGRATION_TIMEOUT_MS: u32 = 10_000;

/// Models every gateway defines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredefinedModel {
    Error,
    Empty,
}

impl PredefinedModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredefinedModel::Error => "Error",
            PredefinedModel::Empty => "Empty",
        }
    }
}

/// Where a request model comes from
#[derive(Debug, Clone)]
pub enum ModelSource {
    Predefined(PredefinedModel),
    Schema(Template),
}

impl ModelSource {
    /// A predefined name wins over a schema path; one of them is required
    pub fn from_parts(schema_path: Option<&Path>, predefined: Option<PredefinedModel>) -> StackResult<Self> {
        match (predefined, schema_path) {
            (Some(model), _) => Ok(ModelSource::Predefined(model)),
            (None, Some(path)) => Ok(ModelSource::Schema(Template::load(path)?)),
            (None, None) => Err(StackError::InvalidConfiguration(
                "either a predefined model name or a schema path must be given".to_string(),
            )),
        }
    }
}

impl From<PredefinedModel> for ModelSource {
    fn from(model: PredefinedModel) -> Self {
        ModelSource::Predefined(model)
    }
}

impl From<Template> for ModelSource {
    fn from(schema: Template) -> Self {
        ModelSource::Schema(schema)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatorArgs {
    pub name: Option<String>,
    pub validate_request_body: bool,
    pub validate_request_parameters: bool,
}

impl ValidatorArgs {
    pub fn body_and_parameters() -> Self {
        Self {
            name: None,
            validate_request_body: true,
            validate_request_parameters: true,
        }
    }
}

/// Timeout and credentials of a service integration
#[derive(Debug, Clone)]
pub struct IntegrationOptions {
    pub timeout_ms: u32,
    pub credentials: Option<Deferred<String>>,
}

impl Default for IntegrationOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_INTEGRATION_TIMEOUT_MS,
            credentials: None,
        }
    }
}

impl IntegrationOptions {
    pub fn timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn credentials(mut self, role_arn: impl Into<Deferred<String>>) -> Self {
        self.credentials = Some(role_arn.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodStage {
    Defining,
    MethodDefined,
    Integrated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodStep {
    Validator,
    RequestParam,
    RequestModel,
    Method,
    Integration,
}

impl Step for MethodStep {
    fn name(&self) -> &'static str {
        match self {
            MethodStep::Validator => "with_validator",
            MethodStep::RequestParam => "with_request_param",
            MethodStep::RequestModel => "with_request_model",
            MethodStep::Method => "with_method",
            MethodStep::Integration => "integration",
        }
    }
}

impl StateMachine for MethodStage {
    type Input = MethodStep;
    type Output = ();

    fn transition(&self, step: &MethodStep) -> TransitionResult<(Self, ())> {
        use MethodStage::*;
        use MethodStep::*;
        match (self, step) {
            (Defining, Validator | RequestParam | RequestModel) => Ok((Defining, ())),
            (_, Validator) => Err(TransitionError::out_of_order(
                step,
                "request validator must be defined before the method",
            )),
            (_, RequestParam) => Err(TransitionError::out_of_order(
                step,
                "request params must be defined before the method",
            )),
            (_, RequestModel) => Err(TransitionError::out_of_order(
                step,
                "request model must be defined before the method",
            )),
            (Defining, Method) => Ok((MethodDefined, ())),
            (_, Method) => Err(TransitionError::already_configured(step, "method")),
            (Defining, Integration) => Err(TransitionError::out_of_order(
                step,
                "method must be defined before its integrations",
            )),
            (MethodDefined, Integration) => Ok((Integrated, ())),
            (Integrated, Integration) => Err(TransitionError::already_configured(step, "integration")),
        }
    }
}

/// One HTTP method on a gateway resource
#[derive(Debug)]
pub struct RestApiMethod {
    component: Component,
    stage: StageTracker<MethodStage>,
    method_name: String,
    api: RestApiHandle,
    resource: ResourceHandle,
    http_method: HttpMethod,
    validator: Option<ResourceHandle>,
    request_parameters: BTreeMap<String, bool>,
    request_models: BTreeMap<String, Deferred<String>>,
    method: Option<ResourceHandle>,
}

impl RestApiMethod {
    /// Resources are named after `{method_name}-{HTTP method}`
    pub fn new(
        deployment: &Deployment,
        method_name: &str,
        api: &RestApiHandle,
        resource: &ResourceHandle,
        http_method: HttpMethod,
    ) -> Self {
        let method_name = format!("{method_name}-{http_method}");
        let component = Component::new(deployment, "RestApiMethod", method_name.clone());
        Self {
            stage: StageTracker::new(component.label(), MethodStage::Defining),
            component,
            method_name,
            api: api.clone(),
            resource: resource.clone(),
            http_method,
            validator: None,
            request_parameters: BTreeMap::new(),
            request_models: BTreeMap::new(),
            method: None,
        }
    }

    pub fn with_validator(mut self, args: ValidatorArgs) -> StackResult<Self> {
        self.stage.advance(MethodStep::Validator)?;
        if self.validator.is_some() {
            return Err(self.duplicate(MethodStep::Validator, "request validator"));
        }
        let name = format!("{}-validator", self.method_name);
        let validator = self.component.register(
            ResourceRequest::new(
                ResourceKind::ApiRequestValidator,
                name.clone(),
                Properties::new()
                    .set_deferred("restApi", &self.api.id())
                    .set("name", args.name.unwrap_or(name))
                    .set("validateRequestBody", args.validate_request_body)
                    .set("validateRequestParameters", args.validate_request_parameters),
            )
            .depends_on(&self.resource),
        )?;
        self.validator = Some(validator);
        Ok(self)
    }

    /// Adds `method.request.{type}.{name}`
    pub fn with_request_param(mut self, name: &str, param_type: RequestParamType, required: bool) -> StackResult<Self> {
        self.stage.advance(MethodStep::RequestParam)?;
        self.request_parameters
            .insert(format!("method.request.{param_type}.{name}"), required);
        Ok(self)
    }

    /// Request model for one content type
    ///
    /// A schema model is created as its own resource and its hash becomes a
    /// deployment variable. The first model for a content type is kept.
    pub fn with_request_model(mut self, source: impl Into<ModelSource>, content_type: &str) -> StackResult<Self> {
        self.stage.advance(MethodStep::RequestModel)?;
        if self.request_models.contains_key(content_type) {
            return Err(self.duplicate(MethodStep::RequestModel, content_type));
        }

        let model_name = match source.into() {
            ModelSource::Predefined(model) => Deferred::<String>::from(model.as_str()),
            ModelSource::Schema(schema) => {
                self.api.check_open(MethodStep::RequestModel.name())?;
                let name = format!("{}-{}-model", self.method_name, content_type.replace('/', "-"));
                let model = self.component.register(ResourceRequest::new(
                    ResourceKind::ApiModel,
                    name.clone(),
                    Properties::new()
                        .set("contentType", content_type)
                        .set_deferred("restApi", &self.api.id())
                        .set("schema", schema.text())
                        .set("name", name.replace('-', "0")),
                ))?;
                self.api.register_deployment_variable(schema.content_hash())?;
                self.api.register_deployment_dependencies([&model])?;
                model.output_str("name")
            }
        };
        self.request_models.insert(content_type.to_string(), model_name);
        Ok(self)
    }

    pub fn with_method(mut self, authorization: AuthorizationMethod, api_key_required: bool) -> StackResult<Self> {
        self.stage.advance(MethodStep::Method)?;
        self.api.check_open(MethodStep::Method.name())?;

        let content_types: Vec<String> = self.request_models.keys().cloned().collect();
        let model_names: Vec<Deferred<String>> = self.request_models.values().cloned().collect();
        let request_models = all(&model_names).map(move |names| {
            content_types
                .into_iter()
                .zip(names)
                .map(|(content_type, name)| (content_type, Value::String(name)))
                .collect::<Map<String, Value>>()
        });

        let mut properties = Properties::new()
            .set_deferred("restApi", &self.api.id())
            .set_deferred("resourceId", &self.resource.id())
            .set("authorization", authorization.as_str())
            .set("apiKeyRequired", api_key_required)
            .set("httpMethod", self.http_method.as_str())
            .set_deferred_opt("requestValidatorId", self.validator.as_ref().map(|v| v.id()).as_ref());
        if !self.request_parameters.is_empty() {
            properties = properties.set("requestParameters", json!(self.request_parameters));
        }
        if !self.request_models.is_empty() {
            properties = properties.set_deferred("requestModels", &request_models);
        }

        let method = self.component.register(
            ResourceRequest::new(ResourceKind::ApiMethod, self.method_name.clone(), properties)
                .depends_on(&self.resource),
        )?;
        self.api.register_deployment_dependencies([&method])?;
        self.component.add_dependencies([&method]);
        debug!(method = %self.method_name, authorization = %authorization, "Defined gateway method");
        self.method = Some(method);
        Ok(self)
    }

    /// Mock backend answering `status_code`
    pub fn with_mock_integration(mut self, status_code: u16) -> StackResult<Self> {
        let method = self.begin_integration()?;

        let request = self.component.register(
            ResourceRequest::new(
                ResourceKind::ApiIntegration,
                format!("{}-integration-request", self.method_name),
                self.method_properties()
                    .set("type", IntegrationType::Mock.as_str())
                    .set("passthroughBehavior", PassThroughBehavior::WhenNoTemplates.as_str())
                    .set(
                        "requestTemplates",
                        json!({ JSON_CONTENT_TYPE: format!("{{\"statusCode\": {status_code}}}") }),
                    ),
            )
            .depends_on(&method),
        )?;
        let response = self.component.register(
            ResourceRequest::new(
                ResourceKind::ApiIntegrationResponse,
                format!("{}-integration-response", self.method_name),
                self.method_properties().set("statusCode", status_code.to_string()),
            )
            .depends_on(&request),
        )?;
        let method_response = self.component.register(
            ResourceRequest::new(
                ResourceKind::ApiMethodResponse,
                format!("{}-method-response", self.method_name),
                self.method_properties().set("statusCode", status_code.to_string()),
            )
            .depends_on(&response),
        )?;

        let created = [request, response, method_response];
        self.api.register_deployment_dependencies(&created)?;
        self.component.add_dependencies(&created);
        Ok(self)
    }

    /// Table action integration; both templates get the table name
    pub fn with_dynamodb_integration(
        mut self,
        table_name: &str,
        action: DynamoDbAction,
        request_template: &Template,
        response_template: &Template,
        options: IntegrationOptions,
    ) -> StackResult<Self> {
        let method = self.begin_integration()?;
        let region = self.region();
        let request = request_template.render(&[(TABLE_NAME_PLACEHOLDER, table_name)]);
        let response = response_template.render(&[(TABLE_NAME_PLACEHOLDER, table_name)]);
        let uri = format!("arn:aws:apigateway:{region}:dynamodb:action/{}", action.as_str());

        self.service_integration(
            &method,
            Deferred::from(uri),
            Deferred::from(request),
            response,
            options,
        )?;
        Ok(self)
    }

    /// Publish to a topic; defaults to the embedded publish templates
    pub fn with_topic_integration(
        mut self,
        topic_arn: impl Into<Deferred<String>>,
        request_template: Option<Template>,
        response_template: Option<Template>,
        options: IntegrationOptions,
    ) -> StackResult<Self> {
        let method = self.begin_integration()?;
        let region = self.region();
        let request_template = request_template.unwrap_or_else(Template::topic_publish_request);
        let response_template = response_template.unwrap_or_else(Template::topic_publish_response);

        let request = topic_arn
            .into()
            .map(move |topic| request_template.render(&[(TOPIC_PLACEHOLDER, topic.as_str())]));
        let uri = format!("arn:aws:apigateway:{region}:sns:action/Publish");

        self.service_integration(
            &method,
            Deferred::from(uri),
            request,
            response_template.text().to_string(),
            options,
        )?;
        Ok(self)
    }

    /// Function backend; both templates get the table name
    pub fn with_function_integration(
        mut self,
        table_name: &str,
        function_arn: impl Into<Deferred<String>>,
        request_template: &Template,
        response_template: &Template,
        options: IntegrationOptions,
    ) -> StackResult<Self> {
        let method = self.begin_integration()?;
        let region = self.region();
        let request = request_template.render(&[(TABLE_NAME_PLACEHOLDER, table_name)]);
        let response = response_template.render(&[(TABLE_NAME_PLACEHOLDER, table_name)]);
        let uri = function_arn.into().map(move |arn| {
            format!("arn:aws:apigateway:{region}:lambda:path/2015-03-31/functions/{arn}/invocations")
        });

        self.service_integration(&method, uri, Deferred::from(request), response, options)?;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.method_name
    }

    pub fn http_method(&self) -> HttpMethod {
        self.http_method
    }

    pub fn method(&self) -> Option<&ResourceHandle> {
        self.method.as_ref()
    }

    pub fn stage(&self) -> &MethodStage {
        self.stage.current()
    }

    pub fn component(&self) -> &Component {
        &self.component
    }

    fn begin_integration(&mut self) -> StackResult<ResourceHandle> {
        self.stage.advance(MethodStep::Integration)?;
        self.api.check_open(MethodStep::Integration.name())?;
        self.method.clone().ok_or_else(|| StackError::ConfigurationOrder {
            builder: self.component.label(),
            step: MethodStep::Integration.name().to_string(),
            reason: "method must be defined before its integrations".to_string(),
        })
    }

    fn region(&self) -> String {
        self.component.deployment().context().region.clone()
    }

    fn duplicate(&self, step: MethodStep, key: &str) -> StackError {
        StackError::DuplicateConfiguration {
            builder: self.component.label(),
            step: step.name().to_string(),
            key: key.to_string(),
        }
    }

    fn method_properties(&self) -> Properties {
        Properties::new()
            .set_deferred("restApi", &self.api.id())
            .set_deferred("resourceId", &self.resource.id())
            .set("httpMethod", self.http_method.as_str())
    }

    /// Integration request, 200 integration response, 200/500 method responses
    fn service_integration(
        &self,
        method: &ResourceHandle,
        uri: Deferred<String>,
        request: Deferred<String>,
        response: String,
        options: IntegrationOptions,
    ) -> StackResult<Vec<ResourceHandle>> {
        let request_templates = request.map(|text| json!({ JSON_CONTENT_TYPE: text }));
        let integration = self.component.register(
            ResourceRequest::new(
                ResourceKind::ApiIntegration,
                format!("{}-integration-request", self.method_name),
                self.method_properties()
                    .set("type", IntegrationType::Aws.as_str())
                    .set("integrationHttpMethod", HttpMethod::Post.as_str())
                    .set("passthroughBehavior", PassThroughBehavior::Never.as_str())
                    .set("timeoutMilliseconds", options.timeout_ms)
                    .set_deferred("uri", &uri)
                    .set_deferred_opt("credentials", options.credentials.as_ref())
                    .set_deferred("requestTemplates", &request_templates),
            )
            .depends_on(method)
            .depends_on(&self.resource),
        )?;

        let integration_response = self.component.register(
            ResourceRequest::new(
                ResourceKind::ApiIntegrationResponse,
                format!("{}-integration-response", self.method_name),
                self.method_properties()
                    .set("statusCode", "200")
                    .set("responseTemplates", json!({ JSON_CONTENT_TYPE: response.clone() })),
            )
            .depends_on(&integration),
        )?;

        let mut created = vec![integration, integration_response.clone()];
        for (status, model) in [("200", PredefinedModel::Empty), ("500", PredefinedModel::Error)] {
            created.push(self.component.register(
                ResourceRequest::new(
                    ResourceKind::ApiMethodResponse,
                    format!("{}-method-response-{status}", self.method_name),
                    self.method_properties()
                        .set("statusCode", status)
                        .set("responseModels", json!({ JSON_CONTENT_TYPE: model.as_str() })),
                )
                .depends_on(&integration_response),
            )?);
        }

        let templates_hash = request.map(move |request| content_hash(&format!("{request}#{response}")));
        self.api.register_deployment_variable(templates_hash)?;
        self.api.register_deployment_dependencies(&created)?;
        self.component.add_dependencies(&created);
        Ok(created)
    }
}
