// Copyright (c) 2025 - Cowboy AI, Inc.
//! Key-value tables, table access policies and capacity plans
//!
//! Table physical names end in `-{stack}`, which is what the stack-wide
//! access policies match on (`table/*-{stack}`).

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::deferred::{Deferred, Properties};
use crate::deployment::{
    Deployment, Registrar, ResourceHandle, ResourceKind, ResourceRequest, ResourceTransformation,
};
use crate::errors::StackResult;
use crate::identity;
use crate::policy::PolicyFactory;

/// Table actions grantable through access policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DynamoDbAction {
    DescribeTable,
    BatchWriteItem,
    TransactWriteItems,
    DeleteItem,
    UpdateItem,
    PutItem,
    BatchGetItem,
    GetItem,
    Query,
    Scan,
    TransactGetItems,
}

impl DynamoDbAction {
    /// Actions granted by the writer policy
    pub const WRITER: [DynamoDbAction; 8] = [
        DynamoDbAction::BatchGetItem,
        DynamoDbAction::BatchWriteItem,
        DynamoDbAction::DeleteItem,
        DynamoDbAction::GetItem,
        DynamoDbAction::PutItem,
        DynamoDbAction::UpdateItem,
        DynamoDbAction::Scan,
        DynamoDbAction::Query,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DynamoDbAction::DescribeTable => "DescribeTable",
            DynamoDbAction::BatchWriteItem => "BatchWriteItem",
            DynamoDbAction::TransactWriteItems => "TransactWriteItems",
            DynamoDbAction::DeleteItem => "DeleteItem",
            DynamoDbAction::UpdateItem => "UpdateItem",
            DynamoDbAction::PutItem => "PutItem",
            DynamoDbAction::BatchGetItem => "BatchGetItem",
            DynamoDbAction::GetItem => "GetItem",
            DynamoDbAction::Query => "Query",
            DynamoDbAction::Scan => "Scan",
            DynamoDbAction::TransactGetItems => "TransactGetItems",
        }
    }

    /// IAM action name, `dynamodb:{action}`
    pub fn iam_action(&self) -> String {
        format!("dynamodb:{}", self.as_str())
    }
}

impl fmt::Display for DynamoDbAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingMode {
    Provisioned,
    #[default]
    PayPerRequest,
}

impl BillingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingMode::Provisioned => "PROVISIONED",
            BillingMode::PayPerRequest => "PAY_PER_REQUEST",
        }
    }
}

/// Key attribute type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    String,
    Number,
    Binary,
}

impl AttributeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeType::String => "S",
            AttributeType::Number => "N",
            AttributeType::Binary => "B",
        }
    }
}

/// Table definition
#[derive(Debug, Clone)]
pub struct TableBuilder {
    name: String,
    hash_key: (String, AttributeType),
    range_key: Option<(String, AttributeType)>,
    billing_mode: BillingMode,
    capacity: Option<(u32, u32)>,
    tags: BTreeMap<String, String>,
}

impl TableBuilder {
    pub fn new(name: impl Into<String>, hash_key: impl Into<String>, key_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            hash_key: (hash_key.into(), key_type),
            range_key: None,
            billing_mode: BillingMode::default(),
            capacity: None,
            tags: BTreeMap::new(),
        }
    }

    pub fn range_key(mut self, name: impl Into<String>, key_type: AttributeType) -> Self {
        self.range_key = Some((name.into(), key_type));
        self
    }

    pub fn pay_per_request(mut self) -> Self {
        self.billing_mode = BillingMode::PayPerRequest;
        self.capacity = None;
        self
    }

    pub fn provisioned(mut self, read_capacity: u32, write_capacity: u32) -> Self {
        self.billing_mode = BillingMode::Provisioned;
        self.capacity = Some((read_capacity, write_capacity));
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn create(self, registrar: &impl Registrar) -> StackResult<ResourceHandle> {
        let stack = &registrar.deployment().context().stack;
        let mut attributes = vec![json!({ "name": self.hash_key.0, "type": self.hash_key.1.as_str() })];
        if let Some((name, key_type)) = &self.range_key {
            attributes.push(json!({ "name": name, "type": key_type.as_str() }));
        }

        registrar.register(ResourceRequest::new(
            ResourceKind::Table,
            self.name.clone(),
            Properties::new()
                .set("name", format!("{}-{stack}", self.name))
                .set("attributes", attributes)
                .set("hashKey", self.hash_key.0.clone())
                .set_opt("rangeKey", self.range_key.map(|(name, _)| name))
                .set("billingMode", self.billing_mode.as_str())
                .set_opt("readCapacity", self.capacity.map(|(read, _)| read))
                .set_opt("writeCapacity", self.capacity.map(|(_, write)| write))
                .set("tags", json!(self.tags)),
        ))
    }
}

/// IAM policy `{name}-dynamo-policy` granting `actions` on every table of the stack
pub fn create_table_access_policy(
    registrar: &impl Registrar,
    name: &str,
    actions: &[DynamoDbAction],
) -> StackResult<ResourceHandle> {
    let context = registrar.deployment().context();
    let actions: Vec<String> = actions.iter().map(DynamoDbAction::iam_action).collect();
    identity::create_policy(
        registrar,
        &format!("{name}-dynamo-policy"),
        &Deferred::ready(PolicyFactory::table_access(
            name,
            &actions,
            &context.region,
            &context.stack,
        )),
    )
}

/// `UpdateAllTables` policy with read and write actions
pub fn create_writer_policy(registrar: &impl Registrar) -> StackResult<ResourceHandle> {
    create_table_access_policy(registrar, "UpdateAllTables", &DynamoDbAction::WRITER)
}

/// `ScanAllTables` policy
pub fn create_scan_policy(registrar: &impl Registrar) -> StackResult<ResourceHandle> {
    create_table_access_policy(registrar, "ScanAllTables", &[DynamoDbAction::Scan])
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapacitySettings {
    pub min: u32,
    pub max: u32,
    /// Target utilization, percent
    pub target: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableCapacity {
    pub read_capacity: CapacitySettings,
    pub write_capacity: CapacitySettings,
}

/// Autoscaling settings per logical table name
///
/// Registered as a deployment transformation: planned tables are switched
/// to provisioned billing and get read and write scaling targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapacityPlan {
    tables: BTreeMap<String, TableCapacity>,
}

/// Initial capacity of tables switched to provisioned billing
const PLANNED_INITIAL_CAPACITY: u32 = 5;

impl CapacityPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, name: impl Into<String>, capacity: TableCapacity) -> Self {
        self.tables.insert(name.into(), capacity);
        self
    }

    pub fn get(&self, name: &str) -> Option<&TableCapacity> {
        self.tables.get(name)
    }

    fn scaling(
        &self,
        deployment: &Deployment,
        table: &ResourceHandle,
        settings: &CapacitySettings,
        operation: &str,
    ) -> StackResult<()> {
        let dimension = format!("dynamodb:table:{operation}CapacityUnits");
        let target = deployment.register(
            ResourceRequest::new(
                ResourceKind::AutoscalingTarget,
                format!("aas-{}-{operation}-target", table.name()),
                Properties::new()
                    .set("maxCapacity", settings.max)
                    .set("minCapacity", settings.min)
                    .set_deferred("resourceId", &table.id().map(|id| format!("table/{id}")))
                    .set("scalableDimension", dimension.clone())
                    .set("serviceNamespace", "dynamodb"),
            )
            .depends_on(table),
        )?;
        deployment.register(
            ResourceRequest::new(
                ResourceKind::AutoscalingPolicy,
                format!("aas-{}-{operation}-policy", table.name()),
                Properties::new()
                    .set("policyType", "TargetTrackingScaling")
                    .set_deferred("resourceId", &target.output_str("resourceId"))
                    .set("scalableDimension", dimension)
                    .set("serviceNamespace", "dynamodb")
                    .set(
                        "targetTrackingScalingPolicyConfiguration",
                        json!({
                            "predefinedMetricSpecification": {
                                "predefinedMetricType": format!("DynamoDB{operation}CapacityUtilization"),
                            },
                            "targetValue": settings.target,
                        }),
                    ),
            )
            .depends_on(table),
        )?;
        Ok(())
    }
}

fn provisioned_properties(properties: Value) -> Value {
    let Value::Object(mut map) = properties else {
        return properties;
    };
    let provisioned = BillingMode::Provisioned.as_str();
    if map.get("billingMode").and_then(Value::as_str) != Some(provisioned) {
        map.insert("readCapacity".to_string(), json!(PLANNED_INITIAL_CAPACITY));
        map.insert("writeCapacity".to_string(), json!(PLANNED_INITIAL_CAPACITY));
        map.insert("billingMode".to_string(), json!(provisioned));
    }
    let tags = map.entry("tags").or_insert_with(|| json!({}));
    if let Some(tags) = tags.as_object_mut() {
        tags.insert("billingMode".to_string(), json!(provisioned));
    }
    Value::Object(map)
}

impl ResourceTransformation for CapacityPlan {
    fn transform(&self, request: ResourceRequest) -> ResourceRequest {
        if request.kind() == ResourceKind::Table && self.tables.contains_key(request.name()) {
            debug!(table = %request.name(), "Applying capacity plan");
            return request.map_properties(provisioned_properties);
        }
        request
    }

    fn after_register(&self, handle: &ResourceHandle, deployment: &Deployment) -> StackResult<()> {
        if handle.kind() != ResourceKind::Table {
            return Ok(());
        }
        let Some(capacity) = self.tables.get(handle.name()) else {
            return Ok(());
        };
        self.scaling(deployment, handle, &capacity.read_capacity, "Read")?;
        self.scaling(deployment, handle, &capacity.write_capacity, "Write")
    }
}

/// Install `plan` for every table registered afterwards
pub fn register_capacity_plan(deployment: &Deployment, plan: CapacityPlan) {
    deployment.register_transformation(Arc::new(plan));
}
