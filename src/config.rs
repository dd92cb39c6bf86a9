//! Pipeline property file
//!
//! A JSON document generated per application. Only the keys the helpers
//! read are modelled:
//!
//! ```json
//! {
//!   "app": { "regions": ["us-east-1", "eu-west-1"], "network_facing": "external" },
//!   "dns": { "ttl": 60 },
//!   "services": { "s3": true, "dynamodb": ["another_app"] }
//! }
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::dns::{ApplicationContext, NetworkFacing};
use crate::iam::ServiceGrant;

/// Errors raised while loading or validating properties
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in properties: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("missing required property: {0}")]
    MissingProperty(String),

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

#[derive(Debug, Default, Deserialize)]
struct RawProperties {
    #[serde(default)]
    app: RawApp,
    #[serde(default)]
    dns: RawDns,
    #[serde(default)]
    services: BTreeMap<String, ServiceGrant>,
}

#[derive(Debug, Default, Deserialize)]
struct RawApp {
    regions: Option<Vec<String>>,
    #[serde(default)]
    network_facing: NetworkFacing,
}

#[derive(Debug, Default, Deserialize)]
struct RawDns {
    ttl: Option<u32>,
}

/// Pipeline properties, loaded once per invocation
///
/// `services` is always available. The DNS keys are only checked when a
/// DNS command asks for them through [`PipelineProperties::dns`], so a
/// file that only grants services still builds a policy.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineProperties {
    regions: Option<Vec<String>>,
    ttl: Option<u32>,
    pub network_facing: NetworkFacing,
    pub services: BTreeMap<String, ServiceGrant>,
}

/// The validated subset DNS reconciliation needs
#[derive(Debug, Clone, PartialEq)]
pub struct DnsProperties {
    pub regions: Vec<String>,
    pub ttl: u32,
    pub network_facing: NetworkFacing,
}

impl PipelineProperties {
    pub fn try_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let raw: RawProperties = serde_json::from_reader(BufReader::new(file))?;
        debug!("loaded properties from {}", path.display());
        Ok(raw.into())
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: RawProperties = serde_json::from_str(json)?;
        Ok(raw.into())
    }

    /// Validate and return the DNS settings (`dns.ttl`, `app.regions`)
    pub fn dns(&self) -> Result<DnsProperties, ConfigError> {
        let ttl = self
            .ttl
            .ok_or_else(|| ConfigError::MissingProperty("dns.ttl".to_string()))?;

        let regions = self
            .regions
            .clone()
            .ok_or_else(|| ConfigError::MissingProperty("app.regions".to_string()))?;

        if regions.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "app.regions".to_string(),
                reason: "at least one region is required".to_string(),
            });
        }
        if let Some(blank) = regions.iter().find(|r| r.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                key: "app.regions".to_string(),
                reason: format!("blank region name {:?}", blank),
            });
        }

        Ok(DnsProperties {
            regions,
            ttl,
            network_facing: self.network_facing,
        })
    }
}

impl From<RawProperties> for PipelineProperties {
    fn from(raw: RawProperties) -> Self {
        Self {
            regions: raw.app.regions,
            ttl: raw.dns.ttl,
            network_facing: raw.app.network_facing,
            services: raw.services,
        }
    }
}

impl DnsProperties {
    /// Reconciliation context for one app in one region
    pub fn application_context(&self, app: &str, environment: &str, region: &str) -> ApplicationContext {
        ApplicationContext::new(app, environment, region)
            .network_facing(self.network_facing)
            .ttl(self.ttl)
    }
}
