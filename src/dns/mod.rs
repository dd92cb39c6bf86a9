//! Load Balancer DNS Records
//!
//! Reconciles an application's load balancer alias record(s) against the
//! hosted zones of its environment.
//!
//! ## Architecture
//!
//! - **Reconciler**: zone selection, record construction, idempotent upsert
//! - **Changes**: deletes and upserts that leave exactly the desired sets
//! - **DnsProvider**: Route 53 (`route53`), in-memory, dry-run wrapper
//! - **LoadBalancerLookup**: ELB API (`elb`) or a static map
//! - **NamingConvention**: hostnames derived from app/env/region
//!
//! ## Example Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use pipeline_tooling::aws::AwsEnvironments;
//! use pipeline_tooling::dns::{ApplicationContext, DnsReconciler, DottedNaming, ElbLookup, Route53Provider};
//!
//! let aws = Arc::new(AwsEnvironments::from_profiles());
//! let reconciler = DnsReconciler::new(
//!     Arc::new(Route53Provider::new(aws.clone())),
//!     Arc::new(ElbLookup::new(aws)),
//!     Arc::new(DottedNaming::new("example.com")),
//! );
//!
//! let ctx = ApplicationContext::new("app1", "dev", "us-east-1").ttl(60);
//! let name = reconciler.create_single_region_record(&ctx, true).await?;
//! ```

pub mod changes;
pub mod elb;
pub mod naming;
pub mod providers;
pub mod reconciler;
pub mod route53;
pub mod types;

pub use changes::{plan_changes, RecordChange};
pub use elb::ElbLookup;
pub use naming::{DottedNaming, NamingConvention};
pub use providers::{DnsProvider, DryRunProvider, InMemoryDns, LoadBalancerLookup, StaticLoadBalancers};
pub use reconciler::DnsReconciler;
pub use route53::Route53Provider;
pub use types::{
    ApplicationContext, ChangeBatch, ChangeInfo, DnsError, HostedZone, NetworkFacing, RecordSet,
    RecordType, ZoneSelector, PRIMARY_WEIGHT,
};
