// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cloud Resource Kind Taxonomy
//!
//! Defines the vocabulary of resource kinds that builders can request from
//! the provisioning engine. Each kind carries its engine type token and the
//! service namespace used in ARNs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource kind taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    // Object storage
    /// Object storage bucket
    Bucket,
    /// Resource policy attached to a bucket
    BucketPolicy,
    /// Public access block for a bucket
    BucketPublicAccessBlock,

    // DNS
    /// DNS record in a hosted zone
    DnsRecord,

    // Messaging
    /// Message queue
    Queue,
    /// Pub/sub topic
    Topic,
    /// Resource policy attached to a topic
    TopicPolicy,
    /// Topic to endpoint subscription
    TopicSubscription,

    // Compute
    /// Serverless function
    Function,
    /// Invoke permission granted to a service principal
    FunctionPermission,
    /// Queue trigger for a function
    EventSourceMapping,

    // Secrets and keys
    /// Secret container
    Secret,
    /// Secret value version
    SecretVersion,
    /// Customer-managed encryption key
    KmsKey,

    // Identity
    IamPolicy,
    IamRole,
    IamRolePolicyAttachment,
    IamGroup,
    IamGroupMembership,
    IamGroupPolicyAttachment,
    IamUser,

    // REST API gateway
    RestApi,
    ApiResource,
    ApiMethod,
    ApiRequestValidator,
    ApiModel,
    ApiIntegration,
    ApiIntegrationResponse,
    ApiMethodResponse,
    ApiDeployment,
    ApiStage,
    ApiMethodSettings,
    ApiAccount,
    ApiDomainName,
    ApiBasePathMapping,
    ApiKey,
    ApiUsagePlan,
    ApiUsagePlanKey,

    // Observability
    /// Log group (API access logs)
    LogGroup,

    // Data
    /// Key-value table
    Table,
    /// Autoscaling target for table capacity
    AutoscalingTarget,
    /// Target-tracking autoscaling policy
    AutoscalingPolicy,

    // Certificates
    Certificate,
    CertificateValidation,

    // Stack
    /// Read-only reference to another stack's outputs
    StackReference,
}

impl ResourceKind {
    /// Every kind, in declaration order
    pub const ALL: &'static [ResourceKind] = &[
        Self::Bucket,
        Self::BucketPolicy,
        Self::BucketPublicAccessBlock,
        Self::DnsRecord,
        Self::Queue,
        Self::Topic,
        Self::TopicPolicy,
        Self::TopicSubscription,
        Self::Function,
        Self::FunctionPermission,
        Self::EventSourceMapping,
        Self::Secret,
        Self::SecretVersion,
        Self::KmsKey,
        Self::IamPolicy,
        Self::IamRole,
        Self::IamRolePolicyAttachment,
        Self::IamGroup,
        Self::IamGroupMembership,
        Self::IamGroupPolicyAttachment,
        Self::IamUser,
        Self::RestApi,
        Self::ApiResource,
        Self::ApiMethod,
        Self::ApiRequestValidator,
        Self::ApiModel,
        Self::ApiIntegration,
        Self::ApiIntegrationResponse,
        Self::ApiMethodResponse,
        Self::ApiDeployment,
        Self::ApiStage,
        Self::ApiMethodSettings,
        Self::ApiAccount,
        Self::ApiDomainName,
        Self::ApiBasePathMapping,
        Self::ApiKey,
        Self::ApiUsagePlan,
        Self::ApiUsagePlanKey,
        Self::LogGroup,
        Self::Table,
        Self::AutoscalingTarget,
        Self::AutoscalingPolicy,
        Self::Certificate,
        Self::CertificateValidation,
        Self::StackReference,
    ];

    /// Get the canonical string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bucket => "bucket",
            Self::BucketPolicy => "bucket_policy",
            Self::BucketPublicAccessBlock => "bucket_public_access_block",
            Self::DnsRecord => "dns_record",
            Self::Queue => "queue",
            Self::Topic => "topic",
            Self::TopicPolicy => "topic_policy",
            Self::TopicSubscription => "topic_subscription",
            Self::Function => "function",
            Self::FunctionPermission => "function_permission",
            Self::EventSourceMapping => "event_source_mapping",
            Self::Secret => "secret",
            Self::SecretVersion => "secret_version",
            Self::KmsKey => "kms_key",
            Self::IamPolicy => "iam_policy",
            Self::IamRole => "iam_role",
            Self::IamRolePolicyAttachment => "iam_role_policy_attachment",
            Self::IamGroup => "iam_group",
            Self::IamGroupMembership => "iam_group_membership",
            Self::IamGroupPolicyAttachment => "iam_group_policy_attachment",
            Self::IamUser => "iam_user",
            Self::RestApi => "rest_api",
            Self::ApiResource => "api_resource",
            Self::ApiMethod => "api_method",
            Self::ApiRequestValidator => "api_request_validator",
            Self::ApiModel => "api_model",
            Self::ApiIntegration => "api_integration",
            Self::ApiIntegrationResponse => "api_integration_response",
            Self::ApiMethodResponse => "api_method_response",
            Self::ApiDeployment => "api_deployment",
            Self::ApiStage => "api_stage",
            Self::ApiMethodSettings => "api_method_settings",
            Self::ApiAccount => "api_account",
            Self::ApiDomainName => "api_domain_name",
            Self::ApiBasePathMapping => "api_base_path_mapping",
            Self::ApiKey => "api_key",
            Self::ApiUsagePlan => "api_usage_plan",
            Self::ApiUsagePlanKey => "api_usage_plan_key",
            Self::LogGroup => "log_group",
            Self::Table => "table",
            Self::AutoscalingTarget => "autoscaling_target",
            Self::AutoscalingPolicy => "autoscaling_policy",
            Self::Certificate => "certificate",
            Self::CertificateValidation => "certificate_validation",
            Self::StackReference => "stack_reference",
        }
    }

    /// Engine type token (`aws:s3/bucket:Bucket`)
    pub fn type_token(&self) -> &'static str {
        match self {
            Self::Bucket => "aws:s3/bucket:Bucket",
            Self::BucketPolicy => "aws:s3/bucketPolicy:BucketPolicy",
            Self::BucketPublicAccessBlock => {
                "aws:s3/bucketPublicAccessBlock:BucketPublicAccessBlock"
            }
            Self::DnsRecord => "aws:route53/record:Record",
            Self::Queue => "aws:sqs/queue:Queue",
            Self::Topic => "aws:sns/topic:Topic",
            Self::TopicPolicy => "aws:sns/topicPolicy:TopicPolicy",
            Self::TopicSubscription => "aws:sns/topicSubscription:TopicSubscription",
            Self::Function => "aws:lambda/function:Function",
            Self::FunctionPermission => "aws:lambda/permission:Permission",
            Self::EventSourceMapping => "aws:lambda/eventSourceMapping:EventSourceMapping",
            Self::Secret => "aws:secretsmanager/secret:Secret",
            Self::SecretVersion => "aws:secretsmanager/secretVersion:SecretVersion",
            Self::KmsKey => "aws:kms/key:Key",
            Self::IamPolicy => "aws:iam/policy:Policy",
            Self::IamRole => "aws:iam/role:Role",
            Self::IamRolePolicyAttachment => "aws:iam/rolePolicyAttachment:RolePolicyAttachment",
            Self::IamGroup => "aws:iam/group:Group",
            Self::IamGroupMembership => "aws:iam/groupMembership:GroupMembership",
            Self::IamGroupPolicyAttachment => {
                "aws:iam/groupPolicyAttachment:GroupPolicyAttachment"
            }
            Self::IamUser => "aws:iam/user:User",
            Self::RestApi => "aws:apigateway/restApi:RestApi",
            Self::ApiResource => "aws:apigateway/resource:Resource",
            Self::ApiMethod => "aws:apigateway/method:Method",
            Self::ApiRequestValidator => "aws:apigateway/requestValidator:RequestValidator",
            Self::ApiModel => "aws:apigateway/model:Model",
            Self::ApiIntegration => "aws:apigateway/integration:Integration",
            Self::ApiIntegrationResponse => {
                "aws:apigateway/integrationResponse:IntegrationResponse"
            }
            Self::ApiMethodResponse => "aws:apigateway/methodResponse:MethodResponse",
            Self::ApiDeployment => "aws:apigateway/deployment:Deployment",
            Self::ApiStage => "aws:apigateway/stage:Stage",
            Self::ApiMethodSettings => "aws:apigateway/methodSettings:MethodSettings",
            Self::ApiAccount => "aws:apigateway/account:Account",
            Self::ApiDomainName => "aws:apigateway/domainName:DomainName",
            Self::ApiBasePathMapping => "aws:apigateway/basePathMapping:BasePathMapping",
            Self::ApiKey => "aws:apigateway/apiKey:ApiKey",
            Self::ApiUsagePlan => "aws:apigateway/usagePlan:UsagePlan",
            Self::ApiUsagePlanKey => "aws:apigateway/usagePlanKey:UsagePlanKey",
            Self::LogGroup => "aws:cloudwatch/logGroup:LogGroup",
            Self::Table => "aws:dynamodb/table:Table",
            Self::AutoscalingTarget => "aws:appautoscaling/target:Target",
            Self::AutoscalingPolicy => "aws:appautoscaling/policy:Policy",
            Self::Certificate => "aws:acm/certificate:Certificate",
            Self::CertificateValidation => "aws:acm/certificateValidation:CertificateValidation",
            Self::StackReference => "pulumi:pulumi:StackReference",
        }
    }

    /// Service namespace used in ARNs
    pub fn service(&self) -> &'static str {
        match self.category() {
            ResourceCategory::Storage => "s3",
            ResourceCategory::Dns => "route53",
            ResourceCategory::Messaging => match self {
                Self::Queue => "sqs",
                _ => "sns",
            },
            ResourceCategory::Compute => "lambda",
            ResourceCategory::Secrets => match self {
                Self::KmsKey => "kms",
                _ => "secretsmanager",
            },
            ResourceCategory::Identity => "iam",
            ResourceCategory::Api => "apigateway",
            ResourceCategory::Observability => "logs",
            ResourceCategory::Data => match self {
                Self::Table => "dynamodb",
                _ => "application-autoscaling",
            },
            ResourceCategory::Certificates => "acm",
            ResourceCategory::Stack => "pulumi",
        }
    }

    /// Parse from the canonical name or the engine type token
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s || kind.type_token() == s)
    }

    /// Get the primary category for this resource kind
    pub fn category(&self) -> ResourceCategory {
        match self {
            Self::Bucket | Self::BucketPolicy | Self::BucketPublicAccessBlock => {
                ResourceCategory::Storage
            }

            Self::DnsRecord => ResourceCategory::Dns,

            Self::Queue | Self::Topic | Self::TopicPolicy | Self::TopicSubscription => {
                ResourceCategory::Messaging
            }

            Self::Function | Self::FunctionPermission | Self::EventSourceMapping => {
                ResourceCategory::Compute
            }

            Self::Secret | Self::SecretVersion | Self::KmsKey => ResourceCategory::Secrets,

            Self::IamPolicy
            | Self::IamRole
            | Self::IamRolePolicyAttachment
            | Self::IamGroup
            | Self::IamGroupMembership
            | Self::IamGroupPolicyAttachment
            | Self::IamUser => ResourceCategory::Identity,

            Self::RestApi
            | Self::ApiResource
            | Self::ApiMethod
            | Self::ApiRequestValidator
            | Self::ApiModel
            | Self::ApiIntegration
            | Self::ApiIntegrationResponse
            | Self::ApiMethodResponse
            | Self::ApiDeployment
            | Self::ApiStage
            | Self::ApiMethodSettings
            | Self::ApiAccount
            | Self::ApiDomainName
            | Self::ApiBasePathMapping
            | Self::ApiKey
            | Self::ApiUsagePlan
            | Self::ApiUsagePlanKey => ResourceCategory::Api,

            Self::LogGroup => ResourceCategory::Observability,

            Self::Table | Self::AutoscalingTarget | Self::AutoscalingPolicy => {
                ResourceCategory::Data
            }

            Self::Certificate | Self::CertificateValidation => ResourceCategory::Certificates,

            Self::StackReference => ResourceCategory::Stack,
        }
    }

    /// Check if this kind is an identity resource
    pub fn is_identity(&self) -> bool {
        self.category() == ResourceCategory::Identity
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource category (high-level grouping)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceCategory {
    Storage,
    Dns,
    Messaging,
    Compute,
    Secrets,
    Identity,
    Api,
    Observability,
    Data,
    Certificates,
    Stack,
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage => write!(f, "Storage"),
            Self::Dns => write!(f, "DNS"),
            Self::Messaging => write!(f, "Messaging"),
            Self::Compute => write!(f, "Compute"),
            Self::Secrets => write!(f, "Secrets/Keys"),
            Self::Identity => write!(f, "Identity"),
            Self::Api => write!(f, "API Gateway"),
            Self::Observability => write!(f, "Observability"),
            Self::Data => write!(f, "Data"),
            Self::Certificates => write!(f, "Certificates"),
            Self::Stack => write!(f, "Stack"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_kind_parsing() {
        assert_eq!(ResourceKind::parse("bucket"), Some(ResourceKind::Bucket));
        assert_eq!(ResourceKind::parse("aws:sqs/queue:Queue"), Some(ResourceKind::Queue));
        assert_eq!(ResourceKind::parse("api_stage"), Some(ResourceKind::ApiStage));
        assert_eq!(ResourceKind::parse("router"), None);
    }

    #[test]
    fn test_names_are_unique() {
        for (i, a) in ResourceKind::ALL.iter().enumerate() {
            for b in &ResourceKind::ALL[i + 1..] {
                assert_ne!(a.as_str(), b.as_str());
                assert_ne!(a.type_token(), b.type_token());
            }
        }
    }

    #[test]
    fn test_services() {
        assert_eq!(ResourceKind::Queue.service(), "sqs");
        assert_eq!(ResourceKind::TopicSubscription.service(), "sns");
        assert_eq!(ResourceKind::KmsKey.service(), "kms");
        assert_eq!(ResourceKind::AutoscalingPolicy.service(), "application-autoscaling");
        assert!(ResourceKind::IamGroupMembership.is_identity());
    }
}
