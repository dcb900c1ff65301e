// Copyright (c) 2025 - Cowboy AI, Inc.
//! Identity helpers
//!
//! Groups, users, memberships, service roles and policy attachments.
//! Attachment names are derived from the policy ARN's last `/` segment
//! (`GroupPolicyAttachment-ops-AWSLambdaSQSQueueExecutionRole`); for a
//! policy created in the same deployment the policy's logical name is used.

use crate::arn::Arn;
use crate::deferred::{all, Deferred, Properties};
use crate::deployment::{Registrar, ResourceHandle, ResourceKind, ResourceRequest};
use crate::errors::{StackError, StackResult};
use crate::policy::{PolicyDocument, PolicyFactory};

/// User and group created together
#[derive(Debug, Clone)]
pub struct UserAndGroup {
    pub user: ResourceHandle,
    pub group: ResourceHandle,
}

/// Create an IAM policy from a (possibly deferred) document
///
/// A document that is already known is validated immediately; a deferred
/// one is validated when it resolves and fails the request otherwise.
pub fn create_policy(
    registrar: &impl Registrar,
    name: &str,
    document: &Deferred<PolicyDocument>,
) -> StackResult<ResourceHandle> {
    if let Some(Ok(known)) = document.peek() {
        known
            .validate()
            .map_err(|e| StackError::InvalidConfiguration(format!("policy {name}: {e}")))?;
    }
    let policy = document.and_then(|doc| doc.to_json_string());
    registrar.register(ResourceRequest::new(
        ResourceKind::IamPolicy,
        name,
        Properties::new().set_deferred("policy", &policy),
    ))
}

pub fn create_group(
    registrar: &impl Registrar,
    group_name: &str,
    override_group_name: bool,
) -> StackResult<ResourceHandle> {
    registrar.register(ResourceRequest::new(
        ResourceKind::IamGroup,
        group_name,
        Properties::new().set_opt("name", override_group_name.then(|| group_name.to_string())),
    ))
}

pub fn create_group_membership(
    registrar: &impl Registrar,
    users: &[Deferred<String>],
    group: &ResourceHandle,
) -> StackResult<ResourceHandle> {
    registrar.register(ResourceRequest::new(
        ResourceKind::IamGroupMembership,
        format!("{}-Membership", group.name()),
        Properties::new()
            .set_deferred("group", &group.output_str("name"))
            .set_deferred("users", &all(users)),
    ))
}

pub fn create_group_with_membership(
    registrar: &impl Registrar,
    users: &[Deferred<String>],
    group_name: &str,
    override_group_name: bool,
) -> StackResult<ResourceHandle> {
    let group = create_group(registrar, group_name, override_group_name)?;
    create_group_membership(registrar, users, &group)?;
    Ok(group)
}

/// Attach each policy to the group
pub fn attach_group_policies(
    registrar: &impl Registrar,
    group: &Deferred<String>,
    policy_arns: &[Deferred<String>],
) -> StackResult<Vec<ResourceHandle>> {
    let group_label = logical_label(group, || "group".to_string());
    policy_arns
        .iter()
        .enumerate()
        .map(|(position, policy_arn)| {
            registrar.register(ResourceRequest::new(
                ResourceKind::IamGroupPolicyAttachment,
                format!(
                    "GroupPolicyAttachment-{group_label}-{}",
                    attachment_suffix(policy_arn, position)
                ),
                Properties::new()
                    .set_deferred("group", group)
                    .set_deferred("policyArn", policy_arn),
            ))
        })
        .collect()
}

pub fn create_group_membership_with_policies(
    registrar: &impl Registrar,
    users: &[Deferred<String>],
    group: &ResourceHandle,
    policy_arns: &[Deferred<String>],
) -> StackResult<ResourceHandle> {
    let membership = create_group_membership(registrar, users, group)?;
    attach_group_policies(registrar, &group.output_str("name"), policy_arns)?;
    Ok(membership)
}

pub fn create_user_and_group_with_policies(
    registrar: &impl Registrar,
    user_name: &str,
    group_name: &str,
    policy_arns: &[Deferred<String>],
    override_user_name: bool,
    override_group_name: bool,
) -> StackResult<UserAndGroup> {
    let user = registrar.register(ResourceRequest::new(
        ResourceKind::IamUser,
        user_name,
        Properties::new()
            .set_opt("name", override_user_name.then(|| user_name.to_string()))
            .set("forceDestroy", true),
    ))?;
    let group = create_group(registrar, group_name, override_group_name)?;
    create_group_membership_with_policies(
        registrar,
        &[user.output_str("name")],
        &group,
        policy_arns,
    )?;
    Ok(UserAndGroup { user, group })
}

/// Role assumable by the given services, with the policies attached
pub fn create_service_role_with_policy(
    registrar: &impl Registrar,
    role_name: &str,
    services: &[&str],
    policy_arns: &[Deferred<String>],
) -> StackResult<ResourceHandle> {
    let trust = PolicyFactory::assume_role(services)
        .to_json_string()
        .map_err(|e| StackError::InvalidConfiguration(format!("role {role_name}: {e}")))?;

    let role = registrar.register(ResourceRequest::new(
        ResourceKind::IamRole,
        role_name,
        Properties::new()
            .set("forceDetachPolicies", true)
            .set("assumeRolePolicy", trust),
    ))?;

    for (position, policy_arn) in policy_arns.iter().enumerate() {
        registrar.register(ResourceRequest::new(
            ResourceKind::IamRolePolicyAttachment,
            format!(
                "RoleAttachment-{role_name}-{}",
                attachment_suffix(policy_arn, position)
            ),
            Properties::new()
                .set_deferred("role", &role.output_str("name"))
                .set_deferred("policyArn", policy_arn),
        ))?;
    }
    Ok(role)
}

/// Custom autoscaling full-access policy, returns its ARN
pub fn create_autoscaling_full_access_policy(registrar: &impl Registrar) -> StackResult<Deferred<String>> {
    let policy = create_policy(
        registrar,
        "AutoScalingFullAccessCustom",
        &Deferred::ready(PolicyFactory::autoscaling_full_access()),
    )?;
    Ok(policy.arn())
}

/// Name segment identifying a policy in attachment names
fn attachment_suffix(policy_arn: &Deferred<String>, position: usize) -> String {
    match policy_arn.peek() {
        Some(Ok(arn)) => Arn::parse(&arn)
            .map(|parsed| parsed.resource_name().to_string())
            .unwrap_or(arn),
        _ => logical_label(policy_arn, || format!("policy{position}")),
    }
}

/// Resolved value, else the name of the resource it derives from
fn logical_label(value: &Deferred<String>, fallback: impl FnOnce() -> String) -> String {
    match value.peek() {
        Some(Ok(resolved)) => resolved,
        _ => value
            .dependencies()
            .iter()
            .next()
            .map(|id| id.name.clone())
            .unwrap_or_else(fallback),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StackConfig;
    use crate::context::StackContext;
    use crate::deployment::Deployment;
    use crate::policy::managed::AWS_LAMBDA_SQS_QUEUE_EXECUTION_ROLE;
    use crate::policy::Statement;

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
    fn test_service_role_attachments_named_by_policy() {
        let deployment = deployment();
        let custom = create_policy(
            &deployment,
            "orders-policy",
            &Deferred::ready(PolicyFactory::topic_publish_all()),
        )
        .unwrap();

        create_service_role_with_policy(
            &deployment,
            "ingest-role",
            &["lambda"],
            &[AWS_LAMBDA_SQS_QUEUE_EXECUTION_ROLE.into(), custom.arn()],
        )
        .unwrap();

        assert!(deployment
            .request(
                ResourceKind::IamRolePolicyAttachment,
                "RoleAttachment-ingest-role-AWSLambdaSQSQueueExecutionRole"
            )
            .is_some());
        assert!(deployment
            .request(
                ResourceKind::IamRolePolicyAttachment,
                "RoleAttachment-ingest-role-orders-policy"
            )
            .is_some());
    }

    #[test]
    fn test_invalid_known_document_is_rejected() {
        let deployment = deployment();
        let err = create_policy(
            &deployment,
            "empty",
            &Deferred::ready(PolicyDocument::builder().statement(Statement::allow().resource("*"))),
        )
        .unwrap_err();
        assert!(matches!(err, StackError::InvalidConfiguration(_)));
        assert!(deployment.is_empty());
    }

    #[test]
    fn test_user_and_group() {
        let deployment = deployment();
        let created = create_user_and_group_with_policies(
            &deployment,
            "deployer",
            "deployers",
            &[AWS_LAMBDA_SQS_QUEUE_EXECUTION_ROLE.into()],
            true,
            true,
        )
        .unwrap();

        assert_eq!(created.group.name(), "deployers");
        let membership = deployment
            .request(ResourceKind::IamGroupMembership, "deployers-Membership")
            .unwrap();
        assert!(membership.dependencies().contains(created.user.resource_id()));
        assert!(deployment
            .request(
                ResourceKind::IamGroupPolicyAttachment,
                "GroupPolicyAttachment-deployers-AWSLambdaSQSQueueExecutionRole"
            )
            .is_some());
    }
}
