//! Elastic Load Balancing lookup
//!
//! Finds an application's load balancer by name with
//! `DescribeLoadBalancers` and returns its DNS name.

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_elasticloadbalancing::error::DisplayErrorContext;
use aws_sdk_elasticloadbalancing::types::LoadBalancerDescription;
use aws_sdk_elasticloadbalancing::{config, Client};
use std::sync::Arc;
use tracing::{debug, info};

use super::providers::LoadBalancerLookup;
use super::types::DnsError;
use crate::aws::AwsEnvironments;

/// DNS name of the load balancer called `name`, if it is in `page`
pub(crate) fn find_load_balancer(page: &[LoadBalancerDescription], name: &str) -> Option<String> {
    page.iter()
        .find(|lb| lb.load_balancer_name() == Some(name))
        .and_then(|lb| lb.dns_name())
        .map(str::to_string)
}

/// Load balancer lookup against the ELB API of the requested region
pub struct ElbLookup {
    environments: Arc<AwsEnvironments>,
}

impl ElbLookup {
    pub fn new(environments: Arc<AwsEnvironments>) -> Self {
        Self { environments }
    }

    async fn client(&self, environment: &str, region: &str) -> Client {
        let sdk_config = self.environments.config_for(environment).await;
        let config = config::Builder::from(&sdk_config)
            .region(Region::new(region.to_string()))
            .build();
        Client::from_conf(config)
    }
}

#[async_trait]
impl LoadBalancerLookup for ElbLookup {
    async fn canonical_dns_name(
        &self,
        app: &str,
        environment: &str,
        region: &str,
    ) -> Result<String, DnsError> {
        let client = self.client(environment, region).await;
        let mut marker: Option<String> = None;

        loop {
            let output = client
                .describe_load_balancers()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| {
                    DnsError::Provider(format!(
                        "DescribeLoadBalancers failed in {}: {}",
                        region,
                        DisplayErrorContext(e)
                    ))
                })?;

            if let Some(dns_name) = find_load_balancer(output.load_balancer_descriptions(), app) {
                info!(app = %app, env = %environment, region = %region, elb = %dns_name, "Found load balancer");
                return Ok(dns_name);
            }

            match output.next_marker().filter(|next| !next.is_empty()) {
                Some(next) => {
                    debug!("Load balancer {} not on this page, continuing", app);
                    marker = Some(next.to_string());
                }
                None => break,
            }
        }

        Err(DnsError::Lookup(format!(
            "No load balancer named {} in {} {}",
            app, environment, region
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn description(name: &str, dns_name: &str) -> LoadBalancerDescription {
        LoadBalancerDescription::builder()
            .load_balancer_name(name)
            .dns_name(dns_name)
            .scheme("internet-facing")
            .build()
    }

    #[test]
    fn test_find_load_balancer() {
        let page = vec![
            description("other", "other-1.us-east-1.elb.amazonaws.com"),
            description("app1", "my-elb-123.us-east-1.elb.amazonaws.com"),
        ];

        assert_eq!(
            find_load_balancer(&page, "app1").as_deref(),
            Some("my-elb-123.us-east-1.elb.amazonaws.com")
        );
    }

    #[test]
    fn test_name_must_match_exactly() {
        let page = vec![description("app10", "app10-1.us-east-1.elb.amazonaws.com")];

        assert!(find_load_balancer(&page, "app1").is_none());
        assert!(find_load_balancer(&[], "app1").is_none());
    }
}
