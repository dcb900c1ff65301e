// Copyright (c) 2025 - Cowboy AI, Inc.
//! Canned policy documents
//!
//! Pure constructors over already-resolved ARNs. Builders call them inside
//! `Deferred::map`/`and_then` once the ARNs they embed are known.

use super::document::{PolicyDocument, Principal, Statement};

pub struct PolicyFactory;

impl PolicyFactory {
    /// `s3:GetObject` on every object of the bucket
    pub fn bucket_read(bucket_arn: &str) -> PolicyDocument {
        PolicyDocument::builder().statement(
            Statement::allow()
                .action(["s3:GetObject"])
                .resource(vec![format!("{bucket_arn}/*")]),
        )
    }

    /// Read, write, delete and list, as a sync job needs
    pub fn bucket_sync(bucket_arn: &str) -> PolicyDocument {
        PolicyDocument::builder().statement(
            Statement::allow()
                .action(["s3:GetObject", "s3:PutObject", "s3:DeleteObject", "s3:ListBucket"])
                .resource(vec![format!("{bucket_arn}/*"), bucket_arn.to_string()]),
        )
    }

    pub fn bucket_write(bucket_arn: &str) -> PolicyDocument {
        PolicyDocument::builder().statement(
            Statement::allow()
                .action(["s3:PutObject"])
                .resource(vec![format!("{bucket_arn}/*")]),
        )
    }

    /// Bucket resource policy granting object reads to `principal`
    pub fn bucket_principal_read(bucket_arn: &str, principal: Principal) -> PolicyDocument {
        PolicyDocument::builder().statement(
            Statement::allow()
                .action(["s3:GetObject"])
                .resource(format!("{bucket_arn}/*"))
                .principal(principal),
        )
    }

    /// Queue policy letting `service` send messages from `source_arn` only
    pub fn queue_publish_from_source(source_arn: &str, service: &str) -> PolicyDocument {
        PolicyDocument::builder().statement(
            Statement::allow()
                .principal(Principal::service(service))
                .action(["sqs:SendMessage"])
                .resource("*")
                .condition("ArnEquals", "aws:SourceArn", source_arn),
        )
    }

    /// `sqs:SendMessage` on the given queues
    pub fn queue_send_message(queue_arns: &[String]) -> PolicyDocument {
        PolicyDocument::builder().statement(
            Statement::allow()
                .action(["sqs:SendMessage"])
                .resource(queue_arns.to_vec()),
        )
    }

    /// Topic policy letting the topic deliver to the given queues
    pub fn topic_queue_publish(topic_arn: &str, queue_arns: &[String]) -> PolicyDocument {
        PolicyDocument::builder().statement(
            Statement::allow()
                .action(["sqs:SendMessage"])
                .resource(queue_arns.to_vec())
                .condition("ArnEquals", "aws:SourceArn", topic_arn),
        )
    }

    /// `sns:Publish` on every topic
    pub fn topic_publish_all() -> PolicyDocument {
        PolicyDocument::builder().statement(
            Statement::allow()
                .action("sns:Publish")
                .resource("arn:aws:sns:*:*:*"),
        )
    }

    /// Topic resource policy granting `actions` to AWS principals
    pub fn topic_access(topic_arn: &str, principal_arns: &[String], actions: &[&str]) -> PolicyDocument {
        PolicyDocument::builder().statement(
            Statement::allow()
                .principal(Principal::aws(principal_arns.to_vec()))
                .action(actions.to_vec())
                .resource(topic_arn),
        )
    }

    pub fn secret_read(secret_arn: &str) -> PolicyDocument {
        PolicyDocument::builder().statement(
            Statement::allow()
                .action("secretsmanager:GetSecretValue")
                .resource(secret_arn),
        )
    }

    /// Key policy: account root administers, services and roles use the key
    pub fn kms_key(account_id: &str, services: &[String], role_arns: &[String]) -> PolicyDocument {
        let key_usage = ["kms:GenerateDataKey*", "kms:Decrypt", "kms:Encrypt"];
        let mut document = PolicyDocument::builder().statement(
            Statement::allow()
                .sid("Enable IAM User Permissions")
                .principal(Principal::aws(format!("arn:aws:iam::{account_id}:root")))
                .action("kms:*")
                .resource("*"),
        );
        if !services.is_empty() {
            document.push(
                Statement::allow()
                    .principal(Principal::services(services))
                    .action(key_usage)
                    .resource("*"),
            );
        }
        if !role_arns.is_empty() {
            document.push(
                Statement::allow()
                    .sid("Allow access to service roles")
                    .principal(Principal::aws(role_arns.to_vec()))
                    .action(key_usage)
                    .resource("*"),
            );
        }
        document
    }

    /// Trust policy letting the services assume a role
    pub fn assume_role(services: &[&str]) -> PolicyDocument {
        PolicyDocument::builder().statement(
            Statement::allow()
                .principal(Principal::services(services))
                .action("sts:AssumeRole"),
        )
    }

    /// Table actions on every table of `stack` in `region`
    pub fn table_access(sid: &str, actions: &[String], region: &str, stack: &str) -> PolicyDocument {
        PolicyDocument::builder().statement(
            Statement::allow()
                .sid(sid)
                .action(actions.to_vec())
                .resource(format!("arn:aws:dynamodb:{region}:*:table/*-{stack}")),
        )
    }

    /// `execute-api:Invoke` on the given methods of one stage
    pub fn api_invoke(region: &str, api_id: &str, stage: &str, methods: &[String]) -> PolicyDocument {
        PolicyDocument::builder().statement(
            Statement::allow()
                .action("execute-api:Invoke")
                .resource(
                    methods
                        .iter()
                        .map(|m| format!("arn:aws:execute-api:{region}:*:{api_id}/{stage}/{m}/*"))
                        .collect::<Vec<_>>(),
                ),
        )
    }

    pub fn autoscaling_full_access() -> PolicyDocument {
        PolicyDocument::builder()
            .statement(Statement::allow().action("autoscaling:*").resource("*"))
            .statement(
                Statement::allow()
                    .action("cloudwatch:PutMetricAlarm")
                    .resource("*"),
            )
            .statement(
                Statement::allow()
                    .action([
                        "ec2:DescribeAccountAttributes",
                        "ec2:DescribeAvailabilityZones",
                        "ec2:DescribeImages",
                        "ec2:DescribeInstanceAttribute",
                        "ec2:DescribeInstances",
                        "ec2:DescribeKeyPairs",
                        "ec2:DescribeLaunchTemplateVersions",
                        "ec2:DescribePlacementGroups",
                        "ec2:DescribeSecurityGroups",
                        "ec2:DescribeSpotInstanceRequests",
                        "ec2:DescribeSubnets",
                        "ec2:DescribeVpcClassicLink",
                    ])
                    .resource("*"),
            )
            .statement(
                Statement::allow()
                    .action([
                        "elasticloadbalancing:DescribeLoadBalancers",
                        "elasticloadbalancing:DescribeTargetGroups",
                    ])
                    .resource("*"),
            )
            .statement(
                Statement::allow()
                    .action("iam:CreateServiceLinkedRole")
                    .resource("*")
                    .condition(
                        "StringEquals",
                        "iam:AWSServiceName",
                        "autoscaling.amazonaws.com",
                    ),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::validate_json;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const TOPIC: &str = "arn:aws:sns:eu-west-1:123456789012:orders";
    const BUCKET: &str = "arn:aws:s3:::assets";

    #[test]
    fn test_every_factory_validates() {
        let documents = vec![
            PolicyFactory::bucket_read(BUCKET),
            PolicyFactory::bucket_sync(BUCKET),
            PolicyFactory::bucket_write(BUCKET),
            PolicyFactory::bucket_principal_read(BUCKET, Principal::Anyone),
            PolicyFactory::queue_publish_from_source(TOPIC, "sns"),
            PolicyFactory::queue_send_message(&["arn:aws:sqs:eu-west-1:1:q".to_string()]),
            PolicyFactory::topic_queue_publish(TOPIC, &["arn:aws:sqs:eu-west-1:1:q".to_string()]),
            PolicyFactory::topic_publish_all(),
            PolicyFactory::topic_access(TOPIC, &["arn:aws:iam::1:role/r".to_string()], &["sns:Publish"]),
            PolicyFactory::secret_read("arn:aws:secretsmanager:eu-west-1:1:secret:db"),
            PolicyFactory::kms_key("123456789012", &["sns".to_string()], &[]),
            PolicyFactory::assume_role(&["lambda"]),
            PolicyFactory::table_access("ScanAllTables", &["dynamodb:Scan".to_string()], "eu-west-1", "dev"),
            PolicyFactory::api_invoke("eu-west-1", "a1b2", "v1", &["GET".to_string()]),
            PolicyFactory::autoscaling_full_access(),
        ];
        for document in documents {
            assert!(document.validate().is_ok());
            assert!(validate_json(&document.to_json()).is_ok());
        }
    }

    #[test]
    fn test_queue_publish_is_scoped_to_source() {
        let doc = PolicyFactory::queue_publish_from_source(TOPIC, "sns").to_json();
        assert_eq!(
            doc["Statement"][0]["Condition"],
            json!({ "ArnEquals": { "aws:SourceArn": TOPIC } })
        );
        assert_eq!(doc["Statement"][0]["Principal"], json!({ "Service": "sns.amazonaws.com" }));
    }

    #[test]
    fn test_assume_role_has_no_resource() {
        let doc = PolicyFactory::assume_role(&["lambda", "apigateway"]).to_json();
        assert_eq!(
            doc["Statement"][0],
            json!({
                "Effect": "Allow",
                "Principal": { "Service": ["lambda.amazonaws.com", "apigateway.amazonaws.com"] },
                "Action": "sts:AssumeRole"
            })
        );
    }

    #[test]
    fn test_kms_key_statements() {
        let doc = PolicyFactory::kms_key(
            "123456789012",
            &["sns".to_string(), "sqs".to_string()],
            &["arn:aws:iam::123456789012:role/ingest".to_string()],
        );
        assert_eq!(doc.statements().len(), 3);
        assert_eq!(
            doc.to_json()["Statement"][0]["Principal"],
            json!({ "AWS": "arn:aws:iam::123456789012:root" })
        );
    }

    #[test]
    fn test_api_invoke_resources() {
        let doc = PolicyFactory::api_invoke("eu-west-1", "a1b2", "v1", &["GET".to_string(), "POST".to_string()]);
        assert_eq!(
            doc.to_json()["Statement"][0]["Resource"],
            json!([
                "arn:aws:execute-api:eu-west-1:*:a1b2/v1/GET/*",
                "arn:aws:execute-api:eu-west-1:*:a1b2/v1/POST/*"
            ])
        );
    }
}
