// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deployment Root
//!
//! The deployment collects resource requests, named outputs, components and
//! transformations during one configuration pass, then submits the request
//! graph to a provisioning engine.
//!
//! # Ordering
//!
//! Dependency edges come from two places: explicit `depends_on` handles and
//! the dependency sets carried by deferred property values. Requests can
//! only reference handles that already exist, so registration order is a
//! valid topological order. `apply` still builds the graph explicitly and
//! groups requests into waves; requests of one wave are submitted
//! concurrently, waves run one after another.
//!
//! ```text
//! wave 0: access-logs bucket, topic, dlq
//! wave 1: log PAB, main bucket, queue (policy embeds topic arn)
//! wave 2: main PAB, subscription (embeds queue arn + topic arn)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use cim_stack::prelude::*;
//!
//! let deployment = Deployment::new(context);
//! let bucket = ObjectBucket::new(&deployment, "assets")
//!     .with_access_logs(30, true)?
//!     .with_bucket(BucketOptions::default())?;
//!
//! let engine = RecordingEngine::new("eu-west-1", "123456789012");
//! deployment.apply(&engine).await?;
//! let outputs = deployment.resolve_outputs().await?;
//! ```

pub mod component;
pub mod resource;
pub mod resource_kind;
pub mod transform;

pub use component::{Component, ComponentRecord};
pub use resource::{CustomTimeouts, ResourceHandle, ResourceId, ResourceOptions, ResourceRequest};
pub use resource_kind::{ResourceCategory, ResourceKind};
pub use transform::ResourceTransformation;

use futures::future::try_join_all;
use parking_lot::Mutex;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::StackContext;
use crate::deferred::{Deferred, Properties};
use crate::engine::{ProvisionedResource, ProvisioningEngine, SubmittedRequest};
use crate::errors::{StackError, StackResult};
use resource::HandleResolvers;

/// Anything resources can be registered through
pub trait Registrar {
    fn deployment(&self) -> &Deployment;

    fn register(&self, request: ResourceRequest) -> StackResult<ResourceHandle>;
}

struct Entry {
    request: ResourceRequest,
    resolvers: Option<HandleResolvers>,
    handle: ResourceHandle,
}

#[derive(Default)]
struct DeploymentState {
    entries: Vec<Entry>,
    index: HashMap<ResourceId, usize>,
    outputs: BTreeMap<String, Deferred<Value>>,
    components: Vec<ComponentRecord>,
    transformations: Vec<Arc<dyn ResourceTransformation>>,
    applied: bool,
}

/// Result of a successful apply
#[derive(Debug, Clone)]
pub struct ApplySummary {
    pub deployment_id: Uuid,
    pub waves: usize,
    pub provisioned: Vec<(ResourceId, ProvisionedResource)>,
}

/// Handle to the deployment being configured
///
/// Cloning is cheap; every clone shares the same request graph.
#[derive(Clone)]
pub struct Deployment {
    id: Uuid,
    context: Arc<StackContext>,
    state: Arc<Mutex<DeploymentState>>,
}

impl fmt::Debug for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deployment")
            .field("id", &self.id)
            .field("stack", &self.context.stack)
            .field("requests", &self.len())
            .finish()
    }
}

impl Deployment {
    pub fn new(context: StackContext) -> Self {
        let id = Uuid::now_v7();
        info!(deployment = %id, project = %context.project, stack = %context.stack, "Starting deployment");
        Self {
            id,
            context: Arc::new(context),
            state: Arc::new(Mutex::new(DeploymentState::default())),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn context(&self) -> &StackContext {
        &self.context
    }

    /// Register a transformation for every later request
    pub fn register_transformation(&self, transformation: Arc<dyn ResourceTransformation>) {
        self.state.lock().transformations.push(transformation);
    }

    /// Enqueue a resource request
    ///
    /// Fails when the logical name is taken for this kind, when the request
    /// references a resource this deployment does not know, or after apply.
    /// When a transformation fails to add companions, the request and the
    /// companions registered so far are removed again.
    pub fn register(&self, request: ResourceRequest) -> StackResult<ResourceHandle> {
        let transformations = self.state.lock().transformations.clone();
        let request = transformations
            .iter()
            .fold(request, |request, t| t.transform(request));

        let checkpoint = self.len();
        let handle = self.insert(request)?;
        for transformation in &transformations {
            if let Err(err) = transformation.after_register(&handle, self) {
                warn!(resource = %handle.resource_id(), error = %err, "Companion registration failed, rolling back");
                self.truncate(checkpoint);
                return Err(err);
            }
        }
        Ok(handle)
    }

    /// Drop every request registered at or after `len`
    ///
    /// Dropped handles fail as abandoned.
    fn truncate(&self, len: usize) {
        let removed = {
            let mut state = self.state.lock();
            state.index.retain(|_, position| *position < len);
            let at = len.min(state.entries.len());
            state.entries.split_off(at)
        };
        debug!(removed = removed.len(), "Rolled back resource requests");
    }

    pub fn is_applied(&self) -> bool {
        self.state.lock().applied
    }

    fn insert(&self, request: ResourceRequest) -> StackResult<ResourceHandle> {
        let mut state = self.state.lock();
        if state.applied {
            return Err(StackError::InvalidConfiguration(format!(
                "cannot register {} after the deployment was applied",
                request.id
            )));
        }
        if state.index.contains_key(&request.id) {
            return Err(StackError::DuplicateConfiguration {
                builder: "Deployment".to_string(),
                step: "register".to_string(),
                key: request.id.to_string(),
            });
        }
        let dependencies = request.dependencies();
        if let Some(unknown) = dependencies.iter().find(|d| !state.index.contains_key(d)) {
            return Err(StackError::InvalidConfiguration(format!(
                "{} depends on {}, which is not part of this deployment",
                request.id, unknown
            )));
        }

        let (handle, resolvers) = ResourceHandle::pending(request.id.clone());
        debug!(
            resource = %request.id,
            dependencies = dependencies.len(),
            component = request.options.component.as_deref().unwrap_or("-"),
            "Enqueued resource request"
        );
        let position = state.entries.len();
        state.index.insert(request.id.clone(), position);
        state.entries.push(Entry {
            request,
            resolvers: Some(resolvers),
            handle: handle.clone(),
        });
        Ok(handle)
    }

    /// Add a named stack output, replacing any previous value for `key`
    pub fn add_output(&self, key: impl Into<String>, value: Deferred<Value>) {
        let key = key.into();
        if self.state.lock().outputs.insert(key.clone(), value).is_some() {
            warn!(output = %key, "Replacing stack output");
        }
    }

    /// Names of the stack outputs
    pub fn output_keys(&self) -> Vec<String> {
        self.state.lock().outputs.keys().cloned().collect()
    }

    /// One stack output
    pub fn output(&self, key: &str) -> Option<Deferred<Value>> {
        self.state.lock().outputs.get(key).cloned()
    }

    /// Wait for every stack output
    pub async fn resolve_outputs(&self) -> StackResult<BTreeMap<String, Value>> {
        let outputs: Vec<(String, Deferred<Value>)> = self
            .state
            .lock()
            .outputs
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut resolved = BTreeMap::new();
        for (key, value) in outputs {
            resolved.insert(key, value.resolved().await?);
        }
        Ok(resolved)
    }

    /// Read outputs of another stack of this project
    pub fn stack_reference(&self, stack: &str) -> StackResult<StackReference> {
        let name = self.context.stack_reference_name(stack);
        let handle = self.register(ResourceRequest::new(
            ResourceKind::StackReference,
            name.clone(),
            Properties::new().set("name", name),
        ))?;
        Ok(StackReference { handle })
    }

    pub(crate) fn record_component(&self, record: ComponentRecord) -> usize {
        let mut state = self.state.lock();
        state.components.push(record);
        state.components.len() - 1
    }

    pub(crate) fn update_component(&self, index: usize, f: impl FnOnce(&mut ComponentRecord)) {
        if let Some(record) = self.state.lock().components.get_mut(index) {
            f(record);
        }
    }

    pub fn components(&self) -> Vec<ComponentRecord> {
        self.state.lock().components.clone()
    }

    /// Requests in registration order
    pub fn requests(&self) -> Vec<ResourceRequest> {
        self.state
            .lock()
            .entries
            .iter()
            .map(|e| e.request.clone())
            .collect()
    }

    pub fn request(&self, kind: ResourceKind, name: &str) -> Option<ResourceRequest> {
        let state = self.state.lock();
        state
            .index
            .get(&ResourceId::new(kind, name))
            .map(|&i| state.entries[i].request.clone())
    }

    pub fn requests_of(&self, kind: ResourceKind) -> Vec<ResourceRequest> {
        self.state
            .lock()
            .entries
            .iter()
            .filter(|e| e.request.id.kind == kind)
            .map(|e| e.request.clone())
            .collect()
    }

    pub fn handle(&self, kind: ResourceKind, name: &str) -> Option<ResourceHandle> {
        let state = self.state.lock();
        state
            .index
            .get(&ResourceId::new(kind, name))
            .map(|&i| state.entries[i].handle.clone())
    }

    /// Registration position of a request
    pub fn position(&self, kind: ResourceKind, name: &str) -> Option<usize> {
        self.state
            .lock()
            .index
            .get(&ResourceId::new(kind, name))
            .copied()
    }

    /// `(dependency, dependent)` pairs
    pub fn dependency_edges(&self) -> Vec<(ResourceId, ResourceId)> {
        self.state
            .lock()
            .entries
            .iter()
            .flat_map(|e| {
                e.request
                    .dependencies()
                    .into_iter()
                    .map(move |dep| (dep, e.request.id.clone()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Submit every request to the engine in dependency order
    ///
    /// A deployment can be applied once. The first failure stops the
    /// apply; handles of requests that were not provisioned fail with the
    /// engine error or as abandoned.
    pub async fn apply<E>(&self, engine: &E) -> StackResult<ApplySummary>
    where
        E: ProvisioningEngine + ?Sized,
    {
        let (mut work, waves) = {
            let mut state = self.state.lock();
            if state.applied {
                return Err(StackError::InvalidConfiguration(
                    "deployment has already been applied".to_string(),
                ));
            }
            state.applied = true;
            let waves = plan_waves(&state.entries, &state.index)?;
            let work: Vec<Option<(ResourceRequest, HandleResolvers)>> = state
                .entries
                .iter_mut()
                .map(|e| e.resolvers.take().map(|r| (e.request.clone(), r)))
                .collect();
            (work, waves)
        };

        info!(
            deployment = %self.id,
            requests = work.len(),
            waves = waves.len(),
            "Applying deployment"
        );

        let mut summary = ApplySummary {
            deployment_id: self.id,
            waves: waves.len(),
            provisioned: Vec::with_capacity(work.len()),
        };

        for (number, wave) in waves.into_iter().enumerate() {
            let batch: Vec<(ResourceRequest, HandleResolvers)> =
                wave.into_iter().filter_map(|i| work[i].take()).collect();
            info!(deployment = %self.id, wave = number, size = batch.len(), "Submitting wave");

            let results = try_join_all(
                batch
                    .into_iter()
                    .map(|(request, resolvers)| submit(engine, request, resolvers)),
            )
            .await?;
            summary.provisioned.extend(results);
        }

        info!(
            deployment = %self.id,
            provisioned = summary.provisioned.len(),
            "Deployment applied"
        );
        Ok(summary)
    }
}

impl Registrar for Deployment {
    fn deployment(&self) -> &Deployment {
        self
    }

    fn register(&self, request: ResourceRequest) -> StackResult<ResourceHandle> {
        Deployment::register(self, request)
    }
}

/// Outputs of another stack
#[derive(Debug, Clone)]
pub struct StackReference {
    handle: ResourceHandle,
}

impl StackReference {
    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }

    /// Fully qualified `{org}/{project}/{stack}` name
    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn get_output(&self, key: &str) -> Deferred<Value> {
        let key = key.to_string();
        self.handle
            .output("outputs")
            .map(move |outputs| outputs.get(&key).cloned().unwrap_or(Value::Null))
    }
}

async fn submit<E>(
    engine: &E,
    request: ResourceRequest,
    resolvers: HandleResolvers,
) -> StackResult<(ResourceId, ProvisionedResource)>
where
    E: ProvisioningEngine + ?Sized,
{
    let properties = match request.properties.resolved().await {
        Ok(properties) => properties,
        Err(err) => {
            warn!(resource = %request.id, error = %err, "Request properties failed to resolve");
            resolvers.fail(err.clone());
            return Err(StackError::ExternalResolution(err));
        }
    };

    let submitted = SubmittedRequest {
        id: request.id.clone(),
        type_token: request.id.kind.type_token().to_string(),
        properties,
        depends_on: request.dependencies().into_iter().collect(),
        options: request.options.clone(),
    };

    match engine.provision(&submitted).await {
        Ok(provisioned) => {
            debug!(resource = %request.id, arn = %provisioned.arn, "Resource provisioned");
            resolvers.resolve(&provisioned);
            Ok((request.id, provisioned))
        }
        Err(err) => {
            warn!(resource = %request.id, error = %err, "Engine rejected resource");
            resolvers.fail(crate::deferred::ResolutionError::failed(
                request.id.to_string(),
                err.to_string(),
            ));
            Err(err.into())
        }
    }
}

/// Group request positions into topological waves
fn plan_waves(entries: &[Entry], index: &HashMap<ResourceId, usize>) -> StackResult<Vec<Vec<usize>>> {
    let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
    for position in 0..entries.len() {
        graph.add_node(position);
    }
    for (position, entry) in entries.iter().enumerate() {
        for dependency in entry.request.dependencies() {
            if let Some(&from) = index.get(&dependency) {
                graph.add_edge(from, position, ());
            }
        }
    }

    let order = toposort(&graph, None).map_err(|cycle| {
        StackError::CyclicDependency(entries[cycle.node_id()].request.id.to_string())
    })?;

    let mut level = vec![0usize; entries.len()];
    for &node in &order {
        for next in graph.neighbors_directed(node, Direction::Outgoing) {
            level[next] = level[next].max(level[node] + 1);
        }
    }

    let depth = level.iter().max().map_or(0, |deepest| deepest + 1);
    let mut waves = vec![Vec::new(); depth];
    for position in 0..entries.len() {
        waves[level[position]].push(position);
    }
    Ok(waves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StackConfig;
    use crate::engine::RecordingEngine;
    use serde_json::json;

    fn deployment() -> Deployment {
        Deployment::new(StackContext::new(
            "ingest",
            "dev",
            "eu-west-1",
            StackConfig::new("cowboy"),
            "123456789012",
        ))
    }

    #[test]
    fn test_duplicate_names_rejected_per_kind() {
        let deployment = deployment();
        deployment
            .register(ResourceRequest::new(ResourceKind::Queue, "orders", Properties::new()))
            .unwrap();
        deployment
            .register(ResourceRequest::new(ResourceKind::Topic, "orders", Properties::new()))
            .unwrap();

        let err = deployment
            .register(ResourceRequest::new(ResourceKind::Queue, "orders", Properties::new()))
            .unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(deployment.len(), 2);
    }

    /// Adds an alarm topic per queue, then fails on the second companion
    struct HalfCompanions;

    impl ResourceTransformation for HalfCompanions {
        fn after_register(&self, handle: &ResourceHandle, deployment: &Deployment) -> StackResult<()> {
            if handle.kind() != ResourceKind::Queue {
                return Ok(());
            }
            deployment.register(
                ResourceRequest::new(ResourceKind::Topic, format!("{}-alarms", handle.name()), Properties::new())
                    .depends_on(handle),
            )?;
            Err(StackError::InvalidConfiguration("no alarm policy".to_string()))
        }
    }

    #[test]
    fn test_failed_companions_roll_back_request() {
        let deployment = deployment();
        deployment
            .register(ResourceRequest::new(ResourceKind::Topic, "orders", Properties::new()))
            .unwrap();
        deployment.register_transformation(Arc::new(HalfCompanions));

        let err = deployment
            .register(ResourceRequest::new(ResourceKind::Queue, "audit", Properties::new()))
            .unwrap_err();
        assert!(matches!(err, StackError::InvalidConfiguration(_)));
        assert_eq!(deployment.len(), 1);
        assert!(deployment.request(ResourceKind::Queue, "audit").is_none());
        assert!(deployment.request(ResourceKind::Topic, "audit-alarms").is_none());

        deployment
            .register(ResourceRequest::new(ResourceKind::Topic, "audit", Properties::new()))
            .unwrap();
        assert_eq!(deployment.position(ResourceKind::Topic, "audit"), Some(1));
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let other = deployment();
        let foreign = other
            .register(ResourceRequest::new(ResourceKind::Topic, "elsewhere", Properties::new()))
            .unwrap();

        let deployment = deployment();
        let err = deployment
            .register(
                ResourceRequest::new(ResourceKind::Queue, "q", Properties::new()).depends_on(&foreign),
            )
            .unwrap_err();
        assert!(matches!(err, StackError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_waves_follow_dependencies() {
        let deployment = deployment();
        let topic = deployment
            .register(ResourceRequest::new(ResourceKind::Topic, "t", Properties::new()))
            .unwrap();
        let queue = deployment
            .register(ResourceRequest::new(ResourceKind::Queue, "q", Properties::new()))
            .unwrap();
        deployment
            .register(ResourceRequest::new(
                ResourceKind::TopicSubscription,
                "s",
                Properties::new()
                    .set_deferred("topic", &topic.arn())
                    .set_deferred("endpoint", &queue.arn()),
            ))
            .unwrap();

        let state = deployment.state.lock();
        let waves = plan_waves(&state.entries, &state.index).unwrap();
        assert_eq!(waves, vec![vec![0, 1], vec![2]]);
    }

    #[tokio::test]
    async fn test_apply_resolves_handles_and_outputs() {
        let deployment = deployment();
        let topic = deployment
            .register(ResourceRequest::new(ResourceKind::Topic, "orders", Properties::new()))
            .unwrap();
        deployment.add_output("topicArn", topic.arn().map(Value::String));

        let engine = RecordingEngine::new("eu-west-1", "123456789012");
        let summary = deployment.apply(&engine).await.unwrap();
        assert_eq!(summary.provisioned.len(), 1);
        assert_eq!(summary.waves, 1);

        let outputs = deployment.resolve_outputs().await.unwrap();
        let arn = outputs["topicArn"].as_str().unwrap();
        assert!(arn.starts_with("arn:aws:sns:eu-west-1:123456789012:orders-"));
    }

    #[tokio::test]
    async fn test_apply_twice_rejected() {
        let deployment = deployment();
        let engine = RecordingEngine::new("eu-west-1", "123456789012");
        deployment.apply(&engine).await.unwrap();
        assert!(deployment.apply(&engine).await.is_err());
        assert!(deployment
            .register(ResourceRequest::new(ResourceKind::Topic, "late", Properties::new()))
            .is_err());
    }

    #[tokio::test]
    async fn test_stack_reference() {
        let deployment = deployment();
        let shared = deployment.stack_reference("shared").unwrap();
        assert_eq!(shared.name(), "cowboy/ingest/shared");

        let engine = RecordingEngine::new("eu-west-1", "123456789012")
            .with_stack_outputs("cowboy/ingest/shared", json!({ "zoneId": "Z123" }));
        deployment.apply(&engine).await.unwrap();
        assert_eq!(shared.get_output("zoneId").peek(), Some(Ok(json!("Z123"))));
    }
}
