//! AWS session handling
//!
//! Every environment may live in its own AWS account. By default the
//! environment name doubles as the shared-config profile name, so `dev` and
//! `prod` resolve credentials (static keys, SSO, assumed roles) through the
//! SDK's credential chain for their own profile. Configs are loaded once per
//! environment and shared by the Route 53, ELB and STS adapters.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Region used when a profile does not name one. Route 53 and STS are
/// global and sign against it.
pub const FALLBACK_REGION: &str = "us-east-1";

/// Produces the SDK config for one environment
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn load(&self, environment: &str) -> SdkConfig;
}

/// Loads configs through `aws-config`'s default chain
#[derive(Debug, Clone, Copy)]
pub struct ProfileConfig {
    per_environment: bool,
}

impl ProfileConfig {
    /// Use the profile named after the environment
    pub fn per_environment() -> Self {
        Self {
            per_environment: true,
        }
    }

    /// Use whatever the default chain resolves, for every environment
    pub fn shared() -> Self {
        Self {
            per_environment: false,
        }
    }
}

#[async_trait]
impl ConfigSource for ProfileConfig {
    async fn load(&self, environment: &str) -> SdkConfig {
        let loader = aws_config::defaults(BehaviorVersion::latest());
        let loader = if self.per_environment {
            info!(profile = %environment, "Loading AWS profile");
            loader.profile_name(environment)
        } else {
            info!(env = %environment, "Loading default AWS credentials");
            loader
        };

        with_fallback_region(loader.load().await)
    }
}

#[async_trait]
impl<S: ConfigSource + ?Sized> ConfigSource for Arc<S> {
    async fn load(&self, environment: &str) -> SdkConfig {
        (**self).load(environment).await
    }
}

fn with_fallback_region(config: SdkConfig) -> SdkConfig {
    if config.region().is_some() {
        return config;
    }
    debug!("No region configured, using {}", FALLBACK_REGION);
    config
        .into_builder()
        .region(Region::new(FALLBACK_REGION))
        .build()
}

/// Per-environment SDK configs, loaded on first use
pub struct AwsEnvironments {
    source: Box<dyn ConfigSource>,
    loaded: Mutex<HashMap<String, SdkConfig>>,
}

impl AwsEnvironments {
    pub fn new(source: impl ConfigSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// One AWS account per environment, selected by profile name
    pub fn from_profiles() -> Self {
        Self::new(ProfileConfig::per_environment())
    }

    /// Config for `environment`, loading it on first request
    pub async fn config_for(&self, environment: &str) -> SdkConfig {
        let mut loaded = self.loaded.lock().await;
        if let Some(config) = loaded.get(environment) {
            return config.clone();
        }

        let config = self.source.load(environment).await;
        loaded.insert(environment.to_string(), config.clone());
        config
    }
}
