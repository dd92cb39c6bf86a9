//! Account number lookup
//!
//! Policies embed the AWS account number in resource ARNs. The account is
//! whatever account the environment's credentials belong to.

use async_trait::async_trait;
use aws_sdk_sts::error::DisplayErrorContext;
use aws_sdk_sts::operation::get_caller_identity::GetCallerIdentityOutput;
use std::sync::Arc;
use tracing::info;

use super::types::PolicyError;
use crate::aws::AwsEnvironments;

/// Resolves the AWS account number behind an environment
#[async_trait]
pub trait AccountLookup: Send + Sync {
    async fn account_id(&self, environment: &str) -> Result<String, PolicyError>;
}

pub(crate) fn account_from(output: &GetCallerIdentityOutput) -> Result<String, PolicyError> {
    output
        .account()
        .map(str::to_string)
        .ok_or_else(|| PolicyError::Account("GetCallerIdentity returned no account".to_string()))
}

/// Asks STS `GetCallerIdentity` which account the credentials belong to
pub struct StsAccountLookup {
    environments: Arc<AwsEnvironments>,
}

impl StsAccountLookup {
    pub fn new(environments: Arc<AwsEnvironments>) -> Self {
        Self { environments }
    }
}

#[async_trait]
impl AccountLookup for StsAccountLookup {
    async fn account_id(&self, environment: &str) -> Result<String, PolicyError> {
        let client = aws_sdk_sts::Client::new(&self.environments.config_for(environment).await);

        let output = client.get_caller_identity().send().await.map_err(|e| {
            PolicyError::Account(format!("GetCallerIdentity failed: {}", DisplayErrorContext(e)))
        })?;
        let account = account_from(&output)?;

        info!(env = %environment, account = %account, "Resolved AWS account");
        Ok(account)
    }
}

/// A fixed account number, e.g. passed on the command line
#[derive(Debug, Clone)]
pub struct StaticAccount(pub String);

#[async_trait]
impl AccountLookup for StaticAccount {
    async fn account_id(&self, _environment: &str) -> Result<String, PolicyError> {
        Ok(self.0.clone())
    }
}
