//! DNS Reconciler Types
//!
//! Request-scoped values passed between the reconciler and its
//! collaborators, plus the error taxonomy.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::config::ConfigError;

/// Whether an application's load balancer is reachable from outside
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NetworkFacing {
    #[default]
    Internal,
    External,
}

impl std::fmt::Display for NetworkFacing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkFacing::Internal => write!(f, "internal"),
            NetworkFacing::External => write!(f, "external"),
        }
    }
}

impl FromStr for NetworkFacing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "internal" => Ok(NetworkFacing::Internal),
            "external" => Ok(NetworkFacing::External),
            other => Err(format!(
                "unknown network facing \"{}\" (expected internal or external)",
                other
            )),
        }
    }
}

/// Identity of the application being reconciled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationContext {
    pub app_name: String,
    pub environment: String,
    pub region: String,
    pub network_facing: NetworkFacing,
    /// Record TTL in seconds
    pub ttl: u32,
}

impl ApplicationContext {
    pub const DEFAULT_TTL: u32 = 60;

    pub fn new(
        app_name: impl Into<String>,
        environment: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            environment: environment.into(),
            region: region.into(),
            network_facing: NetworkFacing::Internal,
            ttl: Self::DEFAULT_TTL,
        }
    }

    pub fn network_facing(mut self, facing: NetworkFacing) -> Self {
        self.network_facing = facing;
        self
    }

    pub fn ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn zone_selector(&self) -> ZoneSelector {
        ZoneSelector {
            environment: self.environment.clone(),
            network_facing: self.network_facing,
        }
    }
}

/// Criteria used to pick the hosted zones that receive a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneSelector {
    pub environment: String,
    pub network_facing: NetworkFacing,
}

impl ZoneSelector {
    /// Private zones always qualify. Public zones only for external apps.
    pub fn admits(&self, zone: &HostedZone) -> bool {
        zone.is_private || self.network_facing == NetworkFacing::External
    }
}

/// A hosted zone as reported by the DNS provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedZone {
    pub id: String,
    pub name: String,
    pub is_private: bool,
}

impl HostedZone {
    pub fn new(id: impl Into<String>, name: impl Into<String>, is_private: bool) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_private,
        }
    }
}

/// DNS record type carried in a change batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    A,
    #[allow(clippy::upper_case_acronyms)]
    AAAA,
    #[allow(clippy::upper_case_acronyms)]
    CNAME,
    #[allow(clippy::upper_case_acronyms)]
    TXT,
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordType::A => write!(f, "A"),
            RecordType::AAAA => write!(f, "AAAA"),
            RecordType::CNAME => write!(f, "CNAME"),
            RecordType::TXT => write!(f, "TXT"),
        }
    }
}

/// Weight carried by the first region of a failover record
pub const PRIMARY_WEIGHT: u8 = 255;

/// The desired record, in the shape handed to a provider's upsert call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBatch {
    pub record_name: String,
    pub record_type: RecordType,
    pub ttl: u32,
    /// One target for a plain alias, one per region for failover
    pub targets: Vec<String>,
    /// Region of each target for failover records; empty for a plain alias
    pub set_identifiers: Vec<String>,
}

impl ChangeBatch {
    /// Single-region alias pointing at a load balancer
    pub fn alias(record_name: &str, target: &str, ttl: u32) -> Self {
        Self {
            record_name: record_name.to_string(),
            record_type: RecordType::CNAME,
            ttl,
            targets: vec![target.to_string()],
            set_identifiers: Vec::new(),
        }
    }

    /// Multi-region failover alias from `(region, hostname)` pairs in priority order
    pub fn failover(record_name: &str, targets: Vec<(String, String)>, ttl: u32) -> Self {
        let (set_identifiers, targets): (Vec<String>, Vec<String>) = targets.into_iter().unzip();
        Self {
            record_name: record_name.to_string(),
            record_type: RecordType::CNAME,
            ttl,
            targets,
            set_identifiers,
        }
    }

    pub fn is_failover(&self) -> bool {
        !self.set_identifiers.is_empty()
    }

    /// The record sets this batch should leave at its name.
    ///
    /// A plain alias is one simple set. A failover record is always a
    /// weighted group keyed by region, whatever the number of regions, so a
    /// changed region list never switches routing policy at the name.
    pub fn record_sets(&self) -> Vec<RecordSet> {
        if !self.is_failover() {
            return vec![RecordSet {
                name: self.record_name.clone(),
                record_type: self.record_type,
                ttl: self.ttl,
                set_identifier: None,
                weight: None,
                values: self.targets.clone(),
            }];
        }

        self.set_identifiers
            .iter()
            .zip(&self.targets)
            .enumerate()
            .map(|(index, (region, target))| RecordSet {
                name: self.record_name.clone(),
                record_type: self.record_type,
                ttl: self.ttl,
                set_identifier: Some(region.clone()),
                weight: Some(if index == 0 { PRIMARY_WEIGHT } else { 0 }),
                values: vec![target.clone()],
            })
            .collect()
    }
}

/// One record set as stored by a DNS service
///
/// Sets without an identifier use simple routing; a name holds either one
/// simple set or any number of weighted sets, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSet {
    pub name: String,
    pub record_type: RecordType,
    pub ttl: u32,
    pub set_identifier: Option<String>,
    pub weight: Option<u8>,
    pub values: Vec<String>,
}

/// Provider acknowledgement of a submitted change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeInfo {
    pub id: String,
    pub status: String,
}

/// Errors surfaced by the reconciler
#[derive(Debug, Error)]
pub enum DnsError {
    /// No matching load balancer or zone
    #[error("Lookup failed: {0}")]
    Lookup(String),

    /// DNS or load balancer API failure (auth, throttling, missing zone)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Required configuration missing or invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_facing_parse() {
        assert_eq!("External".parse::<NetworkFacing>(), Ok(NetworkFacing::External));
        assert_eq!("internal".parse::<NetworkFacing>(), Ok(NetworkFacing::Internal));
        assert!("public".parse::<NetworkFacing>().is_err());
    }

    #[test]
    fn test_zone_selector_visibility() {
        let private = HostedZone::new("Z1", "dev.example.com", true);
        let public = HostedZone::new("Z2", "dev.example.com", false);

        let internal = ApplicationContext::new("app1", "dev", "us-east-1").zone_selector();
        assert!(internal.admits(&private));
        assert!(!internal.admits(&public));

        let external = ApplicationContext::new("app1", "dev", "us-east-1")
            .network_facing(NetworkFacing::External)
            .zone_selector();
        assert!(external.admits(&private));
        assert!(external.admits(&public));
    }

    #[test]
    fn test_change_batch_serialization() {
        let batch = ChangeBatch::alias("app1.dev.example.com", "elb.amazonaws.com", 60);
        let json = serde_json::to_string(&batch).unwrap();

        assert!(json.contains("\"record_type\":\"CNAME\""));
        assert!(json.contains("\"set_identifiers\":[]"));
    }

    #[test]
    fn test_failover_is_weighted_for_any_region_count() {
        for count in 1..=3 {
            let targets: Vec<(String, String)> = ["us-east-1", "eu-west-1", "ap-south-1"]
                .iter()
                .take(count)
                .map(|region| (region.to_string(), format!("app1.{}.dev.example.com", region)))
                .collect();
            let sets = ChangeBatch::failover("app1.dev.example.com", targets, 60).record_sets();

            assert_eq!(sets.len(), count);
            assert!(sets.iter().all(|set| set.set_identifier.is_some() && set.weight.is_some()));
            assert_eq!(sets[0].weight, Some(PRIMARY_WEIGHT));
            assert_eq!(sets[0].set_identifier.as_deref(), Some("us-east-1"));
            assert!(sets[1..].iter().all(|set| set.weight == Some(0)));
        }
    }

    #[test]
    fn test_alias_is_single_simple_set() {
        let sets = ChangeBatch::alias("app1.dev.example.com", "elb.amazonaws.com", 60).record_sets();

        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].set_identifier, None);
        assert_eq!(sets[0].weight, None);
        assert_eq!(sets[0].values, vec!["elb.amazonaws.com"]);
    }
}
