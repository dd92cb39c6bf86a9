//! DNS Record Reconciler
//!
//! Decides which hosted zones receive an application's load balancer
//! alias and submits an idempotent upsert to each of them.
//!
//! Zone writes are sequential and never retried. Retry and backoff, if
//! wanted, belong in the `DnsProvider` implementation.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::naming::NamingConvention;
use super::providers::{DnsProvider, LoadBalancerLookup};
use super::types::{ApplicationContext, ChangeBatch, DnsError, NetworkFacing, ZoneSelector};
use crate::config::ConfigError;

/// Reconciles load balancer alias records against the environment's zones
pub struct DnsReconciler {
    provider: Arc<dyn DnsProvider>,
    load_balancers: Arc<dyn LoadBalancerLookup>,
    naming: Arc<dyn NamingConvention>,
}

impl DnsReconciler {
    pub fn new(
        provider: Arc<dyn DnsProvider>,
        load_balancers: Arc<dyn LoadBalancerLookup>,
        naming: Arc<dyn NamingConvention>,
    ) -> Self {
        Self {
            provider,
            load_balancers,
            naming,
        }
    }

    /// IDs of the hosted zones that should carry a record, in provider order
    ///
    /// An empty result is not an error; the caller proceeds with zero writes.
    pub async fn resolve_target_zones(
        &self,
        environment: &str,
        network_facing: NetworkFacing,
    ) -> Result<Vec<String>, DnsError> {
        let zone_name = self.naming.zone_name(environment);
        let selector = ZoneSelector {
            environment: environment.to_string(),
            network_facing,
        };

        let zones = self.provider.list_zones(environment, &zone_name).await?;
        debug!(zone = %zone_name, candidates = zones.len(), "Listed hosted zones");

        let zone_ids: Vec<String> = zones
            .into_iter()
            .filter(|zone| {
                let admitted = selector.admits(zone);
                if admitted {
                    info!(zone_id = %zone.id, private = zone.is_private, "Adding DNS record to zone");
                } else {
                    debug!(zone_id = %zone.id, facing = %network_facing, "Skipping public zone");
                }
                admitted
            })
            .map(|zone| zone.id)
            .collect();

        if zone_ids.is_empty() {
            warn!(zone = %zone_name, facing = %network_facing, "No hosted zones qualify");
        }

        Ok(zone_ids)
    }

    /// Point the application's alias at its load balancer in one region
    ///
    /// Returns the alias hostname, even when no zone qualified.
    pub async fn create_single_region_record(
        &self,
        ctx: &ApplicationContext,
        has_region_suffix: bool,
    ) -> Result<String, DnsError> {
        let alias = self.naming.elb_alias(
            &ctx.app_name,
            &ctx.environment,
            &ctx.region,
            has_region_suffix,
        );

        let elb_dns = self
            .load_balancers
            .canonical_dns_name(&ctx.app_name, &ctx.environment, &ctx.region)
            .await?;

        info!(alias = %alias, target = %elb_dns, "Updating application URL");

        let batch = ChangeBatch::alias(&alias, &elb_dns, ctx.ttl);
        let zone_ids = self
            .resolve_target_zones(&ctx.environment, ctx.network_facing)
            .await?;
        self.upsert_all(&ctx.environment, &zone_ids, &batch).await?;

        Ok(alias)
    }

    /// Point the region-less alias at every region's alias, in `regions` order
    pub async fn create_failover_record(
        &self,
        ctx: &ApplicationContext,
        regions: &[String],
    ) -> Result<String, DnsError> {
        if regions.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "app.regions".to_string(),
                reason: "failover needs at least one region".to_string(),
            }
            .into());
        }

        let alias = self
            .naming
            .elb_alias(&ctx.app_name, &ctx.environment, &ctx.region, false);

        let targets: Vec<(String, String)> = regions
            .iter()
            .map(|region| {
                let hostname = self
                    .naming
                    .elb_alias(&ctx.app_name, &ctx.environment, region, true);
                (region.clone(), hostname)
            })
            .collect();

        info!(alias = %alias, targets = ?targets, "Updating failover URL");

        let batch = ChangeBatch::failover(&alias, targets, ctx.ttl);
        let zone_ids = self
            .resolve_target_zones(&ctx.environment, ctx.network_facing)
            .await?;
        self.upsert_all(&ctx.environment, &zone_ids, &batch).await?;

        Ok(alias)
    }

    async fn upsert_all(
        &self,
        environment: &str,
        zone_ids: &[String],
        batch: &ChangeBatch,
    ) -> Result<(), DnsError> {
        for zone_id in zone_ids {
            let change = self
                .provider
                .upsert_record(environment, zone_id, batch)
                .await?;
            debug!(
                zone_id = %zone_id,
                change_id = %change.id,
                status = %change.status,
                "DNS upsert response"
            );
        }

        info!(
            record = %batch.record_name,
            zones = zone_ids.len(),
            "DNS record reconciled"
        );
        Ok(())
    }
}
