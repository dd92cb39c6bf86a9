//! Route 53 DNS Provider
//!
//! `DnsProvider` over `aws-sdk-route53`:
//! - `ListHostedZonesByName`, paged and cut down to exact name matches
//! - `ListResourceRecordSets` to find what already sits at a record name
//! - `ChangeResourceRecordSets` with the deletes and upserts that leave
//!   exactly the desired sets behind, in one atomic batch

use async_trait::async_trait;
use aws_sdk_route53::error::DisplayErrorContext;
use aws_sdk_route53::types::{
    Change, ChangeAction, ChangeBatch as Route53ChangeBatch, ResourceRecord, ResourceRecordSet,
    RrType,
};
use aws_sdk_route53::Client;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

use super::changes::{plan_changes, RecordChange};
use super::providers::{same_dns_name, DnsProvider};
use super::types::{ChangeBatch, ChangeInfo, DnsError, HostedZone, RecordSet, RecordType};
use crate::aws::AwsEnvironments;

const CHANGE_COMMENT: &str = "Managed by pipeline-tooling";

fn provider_error<E: std::error::Error>(operation: &str, err: E) -> DnsError {
    DnsError::Provider(format!("{} failed: {}", operation, DisplayErrorContext(err)))
}

// ============================================================
// Zone listing
// ============================================================

/// One `ListHostedZonesByName` page, as returned
#[derive(Debug, Clone, Default)]
pub(crate) struct ZoneListing {
    pub zones: Vec<HostedZone>,
    pub is_truncated: bool,
    pub next_dns_name: Option<String>,
    pub next_hosted_zone_id: Option<String>,
}

/// Page through a lexicographic zone listing, keeping zones named exactly `name`
///
/// `fetch` receives `None` for the first page, then the `(dnsname,
/// hostedzoneid)` to continue from. Listing stops at the first zone with
/// another name or when the listing moves past `name`.
pub(crate) async fn collect_zones<F, Fut>(name: &str, mut fetch: F) -> Result<Vec<HostedZone>, DnsError>
where
    F: FnMut(Option<(String, String)>) -> Fut,
    Fut: Future<Output = Result<ZoneListing, DnsError>>,
{
    let mut zones = Vec::new();
    let mut start = None;

    loop {
        let page = fetch(start.take()).await?;

        let mut past_name = false;
        for zone in page.zones {
            if !same_dns_name(&zone.name, name) {
                past_name = true;
                break;
            }
            zones.push(zone);
        }

        match (past_name, page.is_truncated, page.next_dns_name, page.next_hosted_zone_id) {
            (false, true, Some(next_name), Some(next_id)) if same_dns_name(&next_name, name) => {
                debug!(zone = %name, next = %next_id, "Fetching next hosted zone page");
                start = Some((next_name, next_id));
            }
            _ => break,
        }
    }

    Ok(zones)
}

// ============================================================
// Record set conversion
// ============================================================

fn rr_type(record_type: RecordType) -> RrType {
    match record_type {
        RecordType::A => RrType::A,
        RecordType::AAAA => RrType::Aaaa,
        RecordType::CNAME => RrType::Cname,
        RecordType::TXT => RrType::Txt,
    }
}

pub(crate) fn from_route53(set: &ResourceRecordSet, record_type: RecordType) -> RecordSet {
    RecordSet {
        name: set.name().trim_end_matches('.').to_string(),
        record_type,
        ttl: set
            .ttl()
            .and_then(|ttl| u32::try_from(ttl).ok())
            .unwrap_or_default(),
        set_identifier: set.set_identifier().map(str::to_string),
        weight: set.weight().and_then(|weight| u8::try_from(weight).ok()),
        values: set
            .resource_records()
            .iter()
            .map(|record| record.value().to_string())
            .collect(),
    }
}

pub(crate) fn to_route53(set: &RecordSet) -> Result<ResourceRecordSet, DnsError> {
    let records = set
        .values
        .iter()
        .map(|value| ResourceRecord::builder().value(value).build())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| provider_error("Building resource record", e))?;

    ResourceRecordSet::builder()
        .name(&set.name)
        .r#type(rr_type(set.record_type))
        .ttl(i64::from(set.ttl))
        .set_set_identifier(set.set_identifier.clone())
        .set_weight(set.weight.map(i64::from))
        .set_resource_records(Some(records))
        .build()
        .map_err(|e| provider_error("Building record set", e))
}

// ============================================================
// Client Implementation
// ============================================================

/// Route 53 backed `DnsProvider`, one client per environment's account
pub struct Route53Provider {
    environments: Arc<AwsEnvironments>,
}

impl Route53Provider {
    pub fn new(environments: Arc<AwsEnvironments>) -> Self {
        Self { environments }
    }

    async fn client(&self, environment: &str) -> Client {
        Client::new(&self.environments.config_for(environment).await)
    }

    /// Record sets currently at the batch's name and type
    async fn existing_sets(
        client: &Client,
        zone_id: &str,
        batch: &ChangeBatch,
    ) -> Result<Vec<ResourceRecordSet>, DnsError> {
        let wanted = rr_type(batch.record_type);
        let mut sets = Vec::new();
        let mut start_identifier: Option<String> = None;

        loop {
            let output = client
                .list_resource_record_sets()
                .hosted_zone_id(zone_id)
                .start_record_name(&batch.record_name)
                .start_record_type(wanted.clone())
                .set_start_record_identifier(start_identifier.take())
                .send()
                .await
                .map_err(|e| provider_error("ListResourceRecordSets", e))?;

            let mut past_name = false;
            for set in output.resource_record_sets() {
                if same_dns_name(set.name(), &batch.record_name) && set.r#type() == &wanted {
                    sets.push(set.clone());
                } else {
                    past_name = true;
                    break;
                }
            }

            let same_name = output
                .next_record_name()
                .is_some_and(|next| same_dns_name(next, &batch.record_name));
            match (past_name, output.is_truncated(), output.next_record_identifier()) {
                (false, true, Some(identifier)) if same_name => {
                    start_identifier = Some(identifier.to_string());
                }
                _ => break,
            }
        }

        Ok(sets)
    }
}

#[async_trait]
impl DnsProvider for Route53Provider {
    async fn list_zones(
        &self,
        environment: &str,
        name: &str,
    ) -> Result<Vec<HostedZone>, DnsError> {
        debug!("Looking up hosted zones for: {}", name);
        let client = self.client(environment).await;

        let zones = collect_zones(name, |start| {
            let client = client.clone();
            let (dns_name, zone_id) = match start {
                Some((next_name, next_id)) => (next_name, Some(next_id)),
                None => (name.to_string(), None),
            };

            async move {
                let output = client
                    .list_hosted_zones_by_name()
                    .dns_name(dns_name)
                    .set_hosted_zone_id(zone_id)
                    .send()
                    .await
                    .map_err(|e| provider_error("ListHostedZonesByName", e))?;

                Ok::<_, DnsError>(ZoneListing {
                    zones: output
                        .hosted_zones()
                        .iter()
                        .map(|zone| {
                            HostedZone::new(
                                zone.id().trim_start_matches("/hostedzone/"),
                                zone.name(),
                                zone.config().map(|c| c.private_zone()).unwrap_or(false),
                            )
                        })
                        .collect(),
                    is_truncated: output.is_truncated(),
                    next_dns_name: output.next_dns_name().map(str::to_string),
                    next_hosted_zone_id: output.next_hosted_zone_id().map(str::to_string),
                })
            }
        })
        .await?;

        debug!("Found {} hosted zones named {}", zones.len(), name);
        Ok(zones)
    }

    async fn upsert_record(
        &self,
        environment: &str,
        zone_id: &str,
        batch: &ChangeBatch,
    ) -> Result<ChangeInfo, DnsError> {
        let client = self.client(environment).await;

        let listed = Self::existing_sets(&client, zone_id, batch).await?;
        let existing: Vec<RecordSet> = listed
            .iter()
            .map(|set| from_route53(set, batch.record_type))
            .collect();

        let mut changes = Vec::new();
        for change in plan_changes(&existing, &batch.record_sets()) {
            let (action, record_set) = match change {
                // Route 53 only deletes an exact copy of what it holds
                RecordChange::Delete(stale) => {
                    let listed_set = listed
                        .iter()
                        .find(|set| set.set_identifier() == stale.set_identifier.as_deref())
                        .cloned()
                        .ok_or_else(|| {
                            DnsError::Provider(format!("Record set {} vanished", stale.name))
                        })?;
                    info!(
                        zone_id = %zone_id,
                        record = %stale.name,
                        set_identifier = ?stale.set_identifier,
                        "Removing stale record set"
                    );
                    (ChangeAction::Delete, listed_set)
                }
                RecordChange::Upsert(set) => (ChangeAction::Upsert, to_route53(&set)?),
            };

            changes.push(
                Change::builder()
                    .action(action)
                    .resource_record_set(record_set)
                    .build()
                    .map_err(|e| provider_error("Building change", e))?,
            );
        }

        let change_batch = Route53ChangeBatch::builder()
            .comment(CHANGE_COMMENT)
            .set_changes(Some(changes))
            .build()
            .map_err(|e| provider_error("Building change batch", e))?;

        let output = client
            .change_resource_record_sets()
            .hosted_zone_id(zone_id)
            .change_batch(change_batch)
            .send()
            .await
            .map_err(|e| provider_error("ChangeResourceRecordSets", e))?;

        let change_info = output
            .change_info()
            .ok_or_else(|| DnsError::Provider("Route 53 returned no change info".to_string()))?;

        info!(
            env = %environment,
            zone_id = %zone_id,
            record = %batch.record_name,
            change_id = %change_info.id(),
            "Route 53 change submitted"
        );

        Ok(ChangeInfo {
            id: change_info.id().trim_start_matches("/change/").to_string(),
            status: change_info.status().as_str().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn zone(id: &str, name: &str) -> HostedZone {
        HostedZone::new(id, name, true)
    }

    #[tokio::test]
    async fn test_collect_zones_follows_pages() {
        let mut pages = VecDeque::from(vec![
            ZoneListing {
                zones: vec![zone("Z1", "dev.example.com."), zone("Z2", "dev.example.com.")],
                is_truncated: true,
                next_dns_name: Some("dev.example.com.".to_string()),
                next_hosted_zone_id: Some("Z3".to_string()),
            },
            ZoneListing {
                zones: vec![zone("Z3", "dev.example.com."), zone("Z4", "devtools.example.com.")],
                is_truncated: true,
                next_dns_name: Some("docs.example.com.".to_string()),
                next_hosted_zone_id: Some("Z5".to_string()),
            },
        ]);
        let mut starts = Vec::new();

        let zones = collect_zones("dev.example.com", |start| {
            starts.push(start);
            let page = pages.pop_front();
            async move { page.ok_or_else(|| DnsError::Provider("no more pages".to_string())) }
        })
        .await
        .unwrap();

        let ids: Vec<&str> = zones.iter().map(|z| z.id.as_str()).collect();
        assert_eq!(ids, vec!["Z1", "Z2", "Z3"]);
        assert_eq!(
            starts,
            vec![None, Some(("dev.example.com.".to_string(), "Z3".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_collect_zones_stops_when_listing_moves_on() {
        let mut calls = 0;
        let zones = collect_zones("dev.example.com", |_| {
            calls += 1;
            async {
                Ok::<_, DnsError>(ZoneListing {
                    zones: vec![zone("Z1", "dev.example.com.")],
                    is_truncated: true,
                    next_dns_name: Some("devtools.example.com.".to_string()),
                    next_hosted_zone_id: Some("Z9".to_string()),
                })
            }
        })
        .await
        .unwrap();

        assert_eq!(zones.len(), 1);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_collect_zones_propagates_errors() {
        let err = collect_zones("dev.example.com", |_| async {
            Err::<ZoneListing, _>(DnsError::Provider("throttled".to_string()))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, DnsError::Provider(message) if message == "throttled"));
    }

    #[test]
    fn test_weighted_set_conversion() {
        let targets = vec![("eu-west-1".to_string(), "app1.eu-west-1.dev.example.com".to_string())];
        let set = &ChangeBatch::failover("app1.dev.example.com", targets, 60).record_sets()[0];

        let route53 = to_route53(set).unwrap();
        assert_eq!(route53.name(), "app1.dev.example.com");
        assert_eq!(route53.r#type(), &RrType::Cname);
        assert_eq!(route53.set_identifier(), Some("eu-west-1"));
        assert_eq!(route53.weight(), Some(255));
        assert_eq!(route53.ttl(), Some(60));

        let back = from_route53(&route53, RecordType::CNAME);
        assert_eq!(&back, set);
    }

    #[test]
    fn test_listed_set_trailing_dot_is_dropped() {
        let listed = ResourceRecordSet::builder()
            .name("app1.dev.example.com.")
            .r#type(RrType::Cname)
            .ttl(300)
            .resource_records(ResourceRecord::builder().value("elb-1").build().unwrap())
            .build()
            .unwrap();

        let set = from_route53(&listed, RecordType::CNAME);
        assert_eq!(set.name, "app1.dev.example.com");
        assert_eq!(set.set_identifier, None);
        assert_eq!(set.values, vec!["elb-1"]);
    }
}
