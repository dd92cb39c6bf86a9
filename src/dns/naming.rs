//! Hostname naming convention
//!
//! Maps an application's identity onto the hostnames the reconciler writes.

/// Pure mapping from {app, environment, region} to hostnames
pub trait NamingConvention: Send + Sync {
    /// Name of the hosted zone(s) holding an environment's records
    fn zone_name(&self, environment: &str) -> String;

    /// Load balancer alias, region-qualified when `region_suffix` is set
    fn elb_alias(&self, app: &str, environment: &str, region: &str, region_suffix: bool) -> String;
}

/// `<app>.<env>.<domain>` and `<app>.<region>.<env>.<domain>`
#[derive(Debug, Clone)]
pub struct DottedNaming {
    domain: String,
}

impl DottedNaming {
    pub fn new(domain: &str) -> Self {
        Self {
            domain: domain.trim_end_matches('.').to_lowercase(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }
}

impl NamingConvention for DottedNaming {
    fn zone_name(&self, environment: &str) -> String {
        format!("{}.{}", environment, self.domain).to_lowercase()
    }

    fn elb_alias(&self, app: &str, environment: &str, region: &str, region_suffix: bool) -> String {
        let zone = self.zone_name(environment);
        if region_suffix {
            format!("{}.{}.{}", app, region, zone).to_lowercase()
        } else {
            format!("{}.{}", app, zone).to_lowercase()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_qualified_alias() {
        let naming = DottedNaming::new("example.com");
        assert_eq!(
            naming.elb_alias("app1", "dev", "us-east-1", true),
            "app1.us-east-1.dev.example.com"
        );
    }

    #[test]
    fn test_region_less_alias() {
        let naming = DottedNaming::new("example.com.");
        assert_eq!(naming.elb_alias("App1", "dev", "us-east-1", false), "app1.dev.example.com");
        assert_eq!(naming.zone_name("prod"), "prod.example.com");
    }
}
