//! DNS Provider Adapters
//!
//! Trait seams for the DNS service and the load balancer lookup, plus the
//! in-process implementations used for dry runs and tests.
//!
//! Every call carries the environment so an adapter can reach the AWS
//! account that environment lives in.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

use super::changes::{check_routing, plan_changes, RecordChange};
use super::types::{ChangeBatch, ChangeInfo, DnsError, HostedZone, RecordSet, RecordType};

/// A DNS service holding hosted zones
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Hosted zones whose name is exactly `name`
    async fn list_zones(&self, environment: &str, name: &str)
        -> Result<Vec<HostedZone>, DnsError>;

    /// Leave exactly the batch's record sets at its name and type,
    /// creating, overwriting or deleting sets as needed
    async fn upsert_record(
        &self,
        environment: &str,
        zone_id: &str,
        batch: &ChangeBatch,
    ) -> Result<ChangeInfo, DnsError>;
}

#[async_trait]
impl<P: DnsProvider + ?Sized> DnsProvider for Arc<P> {
    async fn list_zones(
        &self,
        environment: &str,
        name: &str,
    ) -> Result<Vec<HostedZone>, DnsError> {
        (**self).list_zones(environment, name).await
    }

    async fn upsert_record(
        &self,
        environment: &str,
        zone_id: &str,
        batch: &ChangeBatch,
    ) -> Result<ChangeInfo, DnsError> {
        (**self).upsert_record(environment, zone_id, batch).await
    }
}

/// Resolves an application's load balancer to its canonical DNS name
#[async_trait]
pub trait LoadBalancerLookup: Send + Sync {
    /// Fails with `DnsError::Lookup` when no load balancer matches
    async fn canonical_dns_name(
        &self,
        app: &str,
        environment: &str,
        region: &str,
    ) -> Result<String, DnsError>;
}

/// DNS names compare case-insensitively and without the root dot
pub(crate) fn same_dns_name(a: &str, b: &str) -> bool {
    a.trim_end_matches('.')
        .eq_ignore_ascii_case(b.trim_end_matches('.'))
}

// ============================================================
// In-memory provider
// ============================================================

type NameKey = (String, String, RecordType);

/// In-process DNS provider
///
/// Record sets are grouped by (zone, name, type) and told apart by set
/// identifier, with the same routing rule Route 53 enforces: one simple set
/// or only weighted sets at a name.
#[derive(Debug, Default)]
pub struct InMemoryDns {
    zones: Vec<HostedZone>,
    records: Mutex<BTreeMap<NameKey, Vec<RecordSet>>>,
    list_calls: AtomicUsize,
    upsert_calls: AtomicUsize,
}

impl InMemoryDns {
    pub fn new(zones: Vec<HostedZone>) -> Self {
        Self {
            zones,
            ..Default::default()
        }
    }

    /// Record sets stored for a name and type in a zone
    pub fn record_sets(&self, zone_id: &str, name: &str, record_type: RecordType) -> Vec<RecordSet> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records
            .get(&(zone_id.to_string(), name.to_lowercase(), record_type))
            .cloned()
            .unwrap_or_default()
    }

    /// All record sets stored in a zone
    pub fn records_in(&self, zone_id: &str) -> Vec<RecordSet> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records
            .iter()
            .filter(|((zone, _, _), _)| zone == zone_id)
            .flat_map(|(_, sets)| sets.iter().cloned())
            .collect()
    }

    pub fn list_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn upsert_count(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    /// Apply a change list atomically
    ///
    /// Deleting a set that is not there, or ending up with mixed routing at
    /// a name, rejects the whole list and leaves the zone untouched.
    pub fn apply_changes(&self, zone_id: &str, changes: &[RecordChange]) -> Result<(), DnsError> {
        if !self.zones.iter().any(|zone| zone.id == zone_id) {
            return Err(DnsError::Provider(format!("No hosted zone found with ID: {}", zone_id)));
        }

        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let mut staged: BTreeMap<NameKey, Vec<RecordSet>> = BTreeMap::new();

        for change in changes {
            let set = match change {
                RecordChange::Delete(set) | RecordChange::Upsert(set) => set,
            };
            let key = (zone_id.to_string(), set.name.to_lowercase(), set.record_type);
            let sets = staged
                .entry(key.clone())
                .or_insert_with(|| records.get(&key).cloned().unwrap_or_default());
            let position = sets
                .iter()
                .position(|stored| stored.set_identifier == set.set_identifier);

            match (change, position) {
                (RecordChange::Delete(_), Some(index)) => {
                    sets.remove(index);
                }
                (RecordChange::Delete(_), None) => {
                    return Err(DnsError::Provider(format!(
                        "Record set {} ({:?}) not found for deletion",
                        set.name, set.set_identifier
                    )));
                }
                (RecordChange::Upsert(_), Some(index)) => sets[index] = set.clone(),
                (RecordChange::Upsert(_), None) => sets.push(set.clone()),
            }
        }

        for sets in staged.values() {
            check_routing(sets)?;
        }

        for (key, sets) in staged {
            if sets.is_empty() {
                records.remove(&key);
            } else {
                records.insert(key, sets);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DnsProvider for InMemoryDns {
    async fn list_zones(
        &self,
        _environment: &str,
        name: &str,
    ) -> Result<Vec<HostedZone>, DnsError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        Ok(self
            .zones
            .iter()
            .filter(|zone| same_dns_name(&zone.name, name))
            .cloned()
            .collect())
    }

    async fn upsert_record(
        &self,
        _environment: &str,
        zone_id: &str,
        batch: &ChangeBatch,
    ) -> Result<ChangeInfo, DnsError> {
        let calls = self.upsert_calls.fetch_add(1, Ordering::SeqCst) + 1;

        let existing = self.record_sets(zone_id, &batch.record_name, batch.record_type);
        let changes = plan_changes(&existing, &batch.record_sets());
        self.apply_changes(zone_id, &changes)?;

        Ok(ChangeInfo {
            id: format!("memory-{}", calls),
            status: "INSYNC".to_string(),
        })
    }
}

// ============================================================
// Dry-run wrapper
// ============================================================

/// Reads through to a real provider, logs writes instead of sending them
pub struct DryRunProvider<P> {
    inner: P,
}

impl<P: DnsProvider> DryRunProvider<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<P: DnsProvider> DnsProvider for DryRunProvider<P> {
    async fn list_zones(
        &self,
        environment: &str,
        name: &str,
    ) -> Result<Vec<HostedZone>, DnsError> {
        self.inner.list_zones(environment, name).await
    }

    async fn upsert_record(
        &self,
        environment: &str,
        zone_id: &str,
        batch: &ChangeBatch,
    ) -> Result<ChangeInfo, DnsError> {
        info!(
            env = %environment,
            zone_id = %zone_id,
            record = %batch.record_name,
            record_type = %batch.record_type,
            targets = ?batch.targets,
            regions = ?batch.set_identifiers,
            "DRY RUN - would upsert record"
        );

        Ok(ChangeInfo {
            id: "dry-run".to_string(),
            status: "SKIPPED".to_string(),
        })
    }
}

// ============================================================
// Static load balancer lookup
// ============================================================

/// Map-backed load balancer lookup keyed by (app, environment, region)
#[derive(Debug, Default, Clone)]
pub struct StaticLoadBalancers {
    entries: HashMap<(String, String, String), String>,
}

impl StaticLoadBalancers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, app: &str, environment: &str, region: &str, dns_name: &str) -> Self {
        self.entries.insert(
            (app.to_string(), environment.to_string(), region.to_string()),
            dns_name.to_string(),
        );
        self
    }
}

#[async_trait]
impl LoadBalancerLookup for StaticLoadBalancers {
    async fn canonical_dns_name(
        &self,
        app: &str,
        environment: &str,
        region: &str,
    ) -> Result<String, DnsError> {
        self.entries
            .get(&(app.to_string(), environment.to_string(), region.to_string()))
            .cloned()
            .ok_or_else(|| {
                DnsError::Lookup(format!(
                    "No load balancer found for {} in {} {}",
                    app, environment, region
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zones() -> Vec<HostedZone> {
        vec![
            HostedZone::new("ZPRIV", "dev.example.com.", true),
            HostedZone::new("ZPUB", "dev.example.com.", false),
            HostedZone::new("ZOTHER", "stage.example.com.", true),
        ]
    }

    fn failover(regions: &[&str]) -> ChangeBatch {
        let targets = regions
            .iter()
            .map(|region| (region.to_string(), format!("app1.{}.dev.example.com", region)))
            .collect();
        ChangeBatch::failover("app1.dev.example.com", targets, 60)
    }

    fn identifiers(sets: &[RecordSet]) -> Vec<Option<&str>> {
        sets.iter().map(|set| set.set_identifier.as_deref()).collect()
    }

    #[tokio::test]
    async fn test_in_memory_lists_exact_zone_name() {
        let dns = InMemoryDns::new(zones());
        let found = dns.list_zones("dev", "dev.example.com").await.unwrap();

        let ids: Vec<&str> = found.iter().map(|z| z.id.as_str()).collect();
        assert_eq!(ids, vec!["ZPRIV", "ZPUB"]);
        assert_eq!(dns.list_count(), 1);
    }

    #[tokio::test]
    async fn test_in_memory_upsert_overwrites() {
        let dns = InMemoryDns::new(zones());
        let first = ChangeBatch::alias("app1.dev.example.com", "old-elb", 60);
        let second = ChangeBatch::alias("APP1.dev.example.com", "new-elb", 300);

        dns.upsert_record("dev", "ZPRIV", &first).await.unwrap();
        dns.upsert_record("dev", "ZPRIV", &second).await.unwrap();

        let records = dns.records_in("ZPRIV");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].values, vec!["new-elb".to_string()]);
        assert_eq!(records[0].ttl, 300);
        assert_eq!(dns.upsert_count(), 2);
    }

    #[tokio::test]
    async fn test_in_memory_unknown_zone_is_provider_error() {
        let dns = InMemoryDns::new(zones());
        let batch = ChangeBatch::alias("app1.dev.example.com", "elb", 60);

        let err = dns.upsert_record("dev", "ZMISSING", &batch).await.unwrap_err();
        assert!(matches!(err, DnsError::Provider(_)));
    }

    #[tokio::test]
    async fn test_in_memory_rejects_mixed_routing() {
        let dns = InMemoryDns::new(zones());
        let alias = ChangeBatch::alias("app1.dev.example.com", "elb-1", 60);
        dns.upsert_record("dev", "ZPRIV", &alias).await.unwrap();

        // Plain upserts of weighted sets onto a simple alias
        let raw: Vec<RecordChange> = failover(&["us-east-1", "eu-west-1"])
            .record_sets()
            .into_iter()
            .map(RecordChange::Upsert)
            .collect();
        let err = dns.apply_changes("ZPRIV", &raw).unwrap_err();

        assert!(matches!(err, DnsError::Provider(_)));
        let sets = dns.record_sets("ZPRIV", "app1.dev.example.com", RecordType::CNAME);
        assert_eq!(identifiers(&sets), vec![None]);
    }

    #[tokio::test]
    async fn test_failover_replaces_simple_alias() {
        let dns = InMemoryDns::new(zones());
        let alias = ChangeBatch::alias("app1.dev.example.com", "elb-1", 60);

        dns.upsert_record("dev", "ZPRIV", &alias).await.unwrap();
        dns.upsert_record("dev", "ZPRIV", &failover(&["us-east-1", "eu-west-1"]))
            .await
            .unwrap();

        let sets = dns.record_sets("ZPRIV", "app1.dev.example.com", RecordType::CNAME);
        assert_eq!(identifiers(&sets), vec![Some("us-east-1"), Some("eu-west-1")]);

        // And back again
        dns.upsert_record("dev", "ZPRIV", &alias).await.unwrap();
        let sets = dns.record_sets("ZPRIV", "app1.dev.example.com", RecordType::CNAME);
        assert_eq!(identifiers(&sets), vec![None]);
    }

    #[tokio::test]
    async fn test_region_list_changes_between_runs() {
        let dns = InMemoryDns::new(zones());

        for regions in [
            vec!["us-east-1"],
            vec!["us-east-1", "eu-west-1", "ap-south-1"],
            vec!["us-east-1", "eu-west-1"],
        ] {
            dns.upsert_record("dev", "ZPRIV", &failover(&regions))
                .await
                .unwrap();

            let sets = dns.record_sets("ZPRIV", "app1.dev.example.com", RecordType::CNAME);
            let expected: Vec<Option<&str>> = regions.iter().map(|r| Some(*r)).collect();
            assert_eq!(identifiers(&sets), expected);
        }
    }

    #[tokio::test]
    async fn test_dry_run_does_not_write() {
        let dns = DryRunProvider::new(InMemoryDns::new(zones()));
        let batch = ChangeBatch::alias("app1.dev.example.com", "elb", 60);

        let info = dns.upsert_record("dev", "ZPRIV", &batch).await.unwrap();
        assert_eq!(info.status, "SKIPPED");
        assert_eq!(dns.inner.upsert_count(), 0);
        assert!(dns.inner.records_in("ZPRIV").is_empty());
    }

    #[tokio::test]
    async fn test_static_lookup_miss() {
        let lbs = StaticLoadBalancers::new().with("app1", "dev", "us-east-1", "elb-1");

        assert_eq!(
            lbs.canonical_dns_name("app1", "dev", "us-east-1").await.unwrap(),
            "elb-1"
        );
        let err = lbs
            .canonical_dns_name("app1", "dev", "eu-west-1")
            .await
            .unwrap_err();
        assert!(matches!(err, DnsError::Lookup(_)));
    }
}
