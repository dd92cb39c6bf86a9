//! Statement templates
//!
//! A template turns a service grant into IAM statement text. The text may
//! be one JSON object, a JSON array, or several objects separated by
//! commas; `policy::detect_shape` sorts that out.

use serde_json::{json, Value};

use super::types::{PolicyError, TemplateVars};

/// Renders the statement text for one service
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, service: &str, vars: &TemplateVars) -> Result<String, PolicyError>;
}

/// Statement templates compiled into the binary
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinTemplates;

/// Resource names for a template, `true` standing for `default`
fn resource_names(vars: &TemplateVars, default: &str) -> Vec<String> {
    vars.items
        .iter()
        .map(|item| {
            if item == "true" {
                default.to_string()
            } else {
                item.clone()
            }
        })
        .collect()
}

fn to_text(service: &str, value: &Value) -> Result<String, PolicyError> {
    serde_json::to_string_pretty(value).map_err(|e| PolicyError::InvalidStatement {
        service: service.to_string(),
        reason: e.to_string(),
    })
}

impl TemplateRenderer for BuiltinTemplates {
    fn render(&self, service: &str, vars: &TemplateVars) -> Result<String, PolicyError> {
        let region = &vars.region;
        let account = &vars.account_number;

        match service {
            // Two statements, emitted as a comma separated sequence
            "s3" => {
                let buckets = resource_names(vars, &format!("{}-{}-{}", vars.group, vars.app, vars.env));
                let bucket_arns: Vec<String> =
                    buckets.iter().map(|b| format!("arn:aws:s3:::{}", b)).collect();
                let object_arns: Vec<String> =
                    buckets.iter().map(|b| format!("arn:aws:s3:::{}/*", b)).collect();

                let list = to_text(
                    service,
                    &json!({
                        "Sid": "S3ListBucket",
                        "Effect": "Allow",
                        "Action": ["s3:ListBucket", "s3:GetBucketLocation"],
                        "Resource": bucket_arns
                    }),
                )?;
                let objects = to_text(
                    service,
                    &json!({
                        "Sid": "S3ObjectAccess",
                        "Effect": "Allow",
                        "Action": ["s3:GetObject", "s3:PutObject", "s3:DeleteObject"],
                        "Resource": object_arns
                    }),
                )?;
                Ok(format!("{},\n{}", list, objects))
            }
            "dynamodb" => {
                let tables: Vec<String> = resource_names(vars, &vars.app)
                    .iter()
                    .map(|t| format!("arn:aws:dynamodb:{}:{}:table/{}", region, account, t))
                    .collect();
                to_text(
                    service,
                    &json!({
                        "Sid": "DynamoDBAccess",
                        "Effect": "Allow",
                        "Action": [
                            "dynamodb:GetItem",
                            "dynamodb:PutItem",
                            "dynamodb:UpdateItem",
                            "dynamodb:DeleteItem",
                            "dynamodb:Query",
                            "dynamodb:Scan"
                        ],
                        "Resource": tables
                    }),
                )
            }
            "lambda" => {
                let functions: Vec<String> = resource_names(vars, &vars.app)
                    .iter()
                    .map(|f| format!("arn:aws:lambda:{}:{}:function:{}", region, account, f))
                    .collect();
                to_text(
                    service,
                    &json!({
                        "Sid": "LambdaInvoke",
                        "Effect": "Allow",
                        "Action": ["lambda:InvokeFunction", "lambda:GetFunction"],
                        "Resource": functions
                    }),
                )
            }
            // Already an array
            "sns" => {
                let topics: Vec<String> = resource_names(vars, &format!("{}-{}", vars.app, vars.env))
                    .iter()
                    .map(|t| format!("arn:aws:sns:{}:{}:{}", region, account, t))
                    .collect();
                to_text(
                    service,
                    &json!([{
                        "Sid": "SNSPublish",
                        "Effect": "Allow",
                        "Action": ["sns:Publish"],
                        "Resource": topics
                    }]),
                )
            }
            "sqs" => {
                let queues: Vec<String> = resource_names(vars, &format!("{}-{}", vars.app, vars.env))
                    .iter()
                    .map(|q| format!("arn:aws:sqs:{}:{}:{}", region, account, q))
                    .collect();
                to_text(
                    service,
                    &json!({
                        "Sid": "SQSAccess",
                        "Effect": "Allow",
                        "Action": [
                            "sqs:SendMessage",
                            "sqs:ReceiveMessage",
                            "sqs:DeleteMessage",
                            "sqs:GetQueueAttributes"
                        ],
                        "Resource": queues
                    }),
                )
            }
            "cloudwatchlogs" => {
                let groups: Vec<String> = resource_names(vars, &format!("/{}/{}", vars.env, vars.app))
                    .iter()
                    .map(|g| format!("arn:aws:logs:{}:{}:log-group:{}:*", region, account, g))
                    .collect();
                to_text(
                    service,
                    &json!({
                        "Sid": "CloudWatchLogs",
                        "Effect": "Allow",
                        "Action": ["logs:CreateLogStream", "logs:PutLogEvents"],
                        "Resource": groups
                    }),
                )
            }
            other => Err(PolicyError::Template(other.to_string())),
        }
    }
}
