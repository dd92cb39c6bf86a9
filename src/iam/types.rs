//! Types for IAM policy construction

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// IAM policy language version
pub const POLICY_VERSION: &str = "2012-10-17";

/// A `services` entry from the property file
///
/// `"lambda": true`, `"sns": "alerts"` or `"dynamodb": ["a", "b"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceGrant {
    Enabled(bool),
    Name(String),
    Names(Vec<String>),
}

impl ServiceGrant {
    /// Normalize into the item list handed to templates.
    ///
    /// `true` becomes `["true"]` (the app's own resource); `false` yields
    /// no items, which disables the service. Earlier tooling rendered the
    /// template with a single `False` item instead; skipping is intentional.
    pub fn items(&self) -> Vec<String> {
        match self {
            ServiceGrant::Enabled(true) => vec!["true".to_string()],
            ServiceGrant::Enabled(false) => Vec::new(),
            ServiceGrant::Name(name) => vec![name.clone()],
            ServiceGrant::Names(names) => names.clone(),
        }
    }
}

/// Who the policy is for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyContext {
    pub app: String,
    pub env: String,
    pub group: String,
    pub region: String,
}

impl PolicyContext {
    pub fn new(
        app: impl Into<String>,
        env: impl Into<String>,
        group: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            app: app.into(),
            env: env.into(),
            group: group.into(),
            region: region.into(),
        }
    }
}

/// Values available to a statement template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateVars {
    pub account_number: String,
    pub app: String,
    pub env: String,
    pub group: String,
    pub region: String,
    pub items: Vec<String>,
}

/// An IAM policy document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Statement")]
    pub statement: Vec<serde_json::Value>,
}

impl Policy {
    pub fn new(statement: Vec<serde_json::Value>) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statement,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, PolicyError> {
        serde_json::to_string_pretty(self).map_err(|e| PolicyError::InvalidStatement {
            service: "wrapper".to_string(),
            reason: e.to_string(),
        })
    }
}

/// Errors that can occur while building a policy
#[derive(Debug, Error)]
pub enum PolicyError {
    /// No template for the requested service
    #[error("No policy template for service: {0}")]
    Template(String),

    /// Template output is not a JSON object, array or object sequence
    #[error("Invalid statement for {service}: {reason}")]
    InvalidStatement { service: String, reason: String },

    /// The account number could not be determined
    #[error("Account lookup failed: {0}")]
    Account(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_grant_from_json() {
        let grants: std::collections::BTreeMap<String, ServiceGrant> = serde_json::from_str(
            r#"{"lambda": true, "s3": false, "sns": "alerts", "dynamodb": ["a", "b"]}"#,
        )
        .unwrap();

        assert_eq!(grants["lambda"].items(), vec!["true"]);
        assert!(grants["s3"].items().is_empty());
        assert_eq!(grants["sns"].items(), vec!["alerts"]);
        assert_eq!(grants["dynamodb"].items(), vec!["a", "b"]);
    }

    #[test]
    fn test_policy_serialization() {
        let policy = Policy::new(vec![serde_json::json!({"Effect": "Allow"})]);
        let json = serde_json::to_string(&policy).unwrap();

        assert_eq!(json, r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow"}]}"#);
    }
}
