//! IAM policy assembly
//!
//! Renders one statement template per requested service and wraps the
//! results in a policy document.

use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::sts::AccountLookup;
use super::templates::TemplateRenderer;
use super::types::{Policy, PolicyContext, PolicyError, ServiceGrant, TemplateVars};

/// Structural shape of a template's output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateShape {
    /// `{...}`
    Object,
    /// `[{...}, ...]`
    Array,
    /// `{...}, {...}` with no enclosing brackets
    ObjectSequence,
}

/// Classify template output by its first character and top-level commas.
///
/// Returns `None` when the text is neither an object nor an array.
pub fn detect_shape(text: &str) -> Option<TemplateShape> {
    let trimmed = text.trim();

    match trimmed.chars().next() {
        Some('[') => Some(TemplateShape::Array),
        Some('{') => {
            let mut depth = 0usize;
            let mut in_string = false;
            let mut escaped = false;

            for c in trimmed.chars() {
                if in_string {
                    if escaped {
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if c == '"' {
                        in_string = false;
                    }
                    continue;
                }

                match c {
                    '"' => in_string = true,
                    '{' | '[' => depth += 1,
                    '}' | ']' => depth = depth.saturating_sub(1),
                    ',' if depth == 0 => return Some(TemplateShape::ObjectSequence),
                    _ => {}
                }
            }

            Some(TemplateShape::Object)
        }
        _ => None,
    }
}

/// Parse template output into individual statements
pub fn parse_statements(service: &str, text: &str) -> Result<Vec<Value>, PolicyError> {
    let invalid = |reason: String| PolicyError::InvalidStatement {
        service: service.to_string(),
        reason,
    };

    let trimmed = text.trim();
    let statements: Vec<Value> = match detect_shape(trimmed) {
        Some(TemplateShape::Object) => {
            vec![serde_json::from_str(trimmed).map_err(|e| invalid(e.to_string()))?]
        }
        Some(TemplateShape::Array) => {
            serde_json::from_str(trimmed).map_err(|e| invalid(e.to_string()))?
        }
        Some(TemplateShape::ObjectSequence) => {
            debug!("Wrapping {} template output into a list", service);
            serde_json::from_str(&format!("[{}]", trimmed)).map_err(|e| invalid(e.to_string()))?
        }
        None => return Err(invalid("expected a JSON object or array".to_string())),
    };

    if let Some(bad) = statements.iter().find(|s| !s.is_object()) {
        return Err(invalid(format!("statement is not an object: {}", bad)));
    }

    Ok(statements)
}

/// Assemble the IAM policy for an application
///
/// Returns `Ok(None)` when no service is requested. The account number
/// is only looked up when at least one service needs a template.
pub async fn construct_policy(
    ctx: &PolicyContext,
    services: &BTreeMap<String, ServiceGrant>,
    renderer: &dyn TemplateRenderer,
    accounts: &dyn AccountLookup,
) -> Result<Option<Policy>, PolicyError> {
    info!(app = %ctx.app, env = %ctx.env, "Create custom IAM Policy");
    debug!(services = ?services, "Found requested services");

    let requested: Vec<(&String, Vec<String>)> = services
        .iter()
        .map(|(service, grant)| (service, grant.items()))
        .filter(|(_, items)| !items.is_empty())
        .collect();

    if requested.is_empty() {
        info!("No services defined for {}", ctx.app);
        return Ok(None);
    }

    let account_number = accounts.account_id(&ctx.env).await?;

    let mut statements = Vec::new();
    for (service, items) in requested {
        let vars = TemplateVars {
            account_number: account_number.clone(),
            app: ctx.app.clone(),
            env: ctx.env.clone(),
            group: ctx.group.clone(),
            region: ctx.region.clone(),
            items,
        };

        let text = renderer.render(service, &vars)?;
        let parsed = parse_statements(service, &text)?;
        debug!(service = %service, statements = parsed.len(), "Rendered service template");
        statements.extend(parsed);
    }

    if statements.is_empty() {
        info!("No statements rendered for {}", ctx.app);
        return Ok(None);
    }

    Ok(Some(Policy::new(statements)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iam::sts::StaticAccount;
    use crate::iam::templates::BuiltinTemplates;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAccount(AtomicUsize);

    #[async_trait]
    impl AccountLookup for CountingAccount {
        async fn account_id(&self, _environment: &str) -> Result<String, PolicyError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok("123456789012".to_string())
        }
    }

    fn ctx() -> PolicyContext {
        PolicyContext::new("app1", "dev", "forrest", "us-east-1")
    }

    #[test]
    fn test_detect_shape() {
        assert_eq!(detect_shape(r#" {"a": 1} "#), Some(TemplateShape::Object));
        assert_eq!(detect_shape(r#"[{"a": 1}]"#), Some(TemplateShape::Array));
        assert_eq!(
            detect_shape(r#"{"a": [1, 2]}, {"b": "x,y"}"#),
            Some(TemplateShape::ObjectSequence)
        );
        assert_eq!(detect_shape(r#"{"a": "}, {"}"#), Some(TemplateShape::Object));
        assert_eq!(detect_shape("true"), None);
    }

    #[test]
    fn test_parse_sequence() {
        let statements = parse_statements("s3", r#"{"Sid": "a"},{"Sid": "b"}"#).unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[1]["Sid"], "b");
    }

    #[test]
    fn test_parse_rejects_non_objects() {
        let err = parse_statements("x", "[1, 2]").unwrap_err();
        assert!(matches!(err, PolicyError::InvalidStatement { .. }));

        let err = parse_statements("x", "not json").unwrap_err();
        assert!(matches!(err, PolicyError::InvalidStatement { .. }));
    }

    #[tokio::test]
    async fn test_construct_policy() {
        let services: BTreeMap<String, ServiceGrant> = serde_json::from_str(
            r#"{"dynamodb": ["another_app"], "lambda": true, "s3": true, "sns": "alerts"}"#,
        )
        .unwrap();

        let policy = construct_policy(
            &ctx(),
            &services,
            &BuiltinTemplates,
            &StaticAccount("123456789012".to_string()),
        )
        .await
        .unwrap()
        .unwrap();

        // dynamodb 1 + lambda 1 + s3 2 + sns 1
        assert_eq!(policy.statement.len(), 5);
        assert_eq!(policy.version, "2012-10-17");
        assert_eq!(policy.statement[0]["Sid"], "DynamoDBAccess");
        assert_eq!(
            policy.statement[4]["Resource"][0],
            "arn:aws:sns:us-east-1:123456789012:alerts"
        );
    }

    #[tokio::test]
    async fn test_no_services_skips_account_lookup() {
        let accounts = CountingAccount(AtomicUsize::new(0));
        let services: BTreeMap<String, ServiceGrant> =
            serde_json::from_str(r#"{"lambda": false}"#).unwrap();

        let policy = construct_policy(&ctx(), &services, &BuiltinTemplates, &accounts)
            .await
            .unwrap();

        assert!(policy.is_none());
        assert_eq!(accounts.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_service_fails() {
        let services: BTreeMap<String, ServiceGrant> =
            serde_json::from_str(r#"{"ec2": true}"#).unwrap();

        let err = construct_policy(
            &ctx(),
            &services,
            &BuiltinTemplates,
            &StaticAccount("1".to_string()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PolicyError::Template(_)));
    }
}
