//! Pipeline Tooling Library
//!
//! Deployment helpers for applications behind AWS load balancers:
//! Route 53 alias records (single region and failover), per-app IAM
//! policies, and recognition of pipelines this tooling manages.

pub mod aws;
pub mod config;
pub mod dns;
pub mod iam;
pub mod pipeline;

pub use config::{ConfigError, DnsProperties, PipelineProperties};
pub use dns::{DnsError, DnsReconciler};
pub use iam::{construct_policy, PolicyError};
pub use pipeline::{check_managed_pipeline, PipelineError};
