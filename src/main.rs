//! Pipeline Tool
//!
//! Command line front end for the deployment helpers.
//!
//! # Usage
//! ```bash
//! # Point app1.us-east-1.dev.example.com at the app's load balancer
//! pipeline-tool dns elb --app app1 --env dev --region us-east-1 --region-suffix
//!
//! # Point app1.dev.example.com at every regional alias
//! pipeline-tool dns failover --app app1 --env dev
//!
//! # Print the app's IAM policy
//! pipeline-tool iam policy --app app1 --env dev --group forrest --region us-east-1
//!
//! # Is this pipeline ours?
//! pipeline-tool pipeline check --name "app1 [us-east-1]" --app app1
//! ```
//!
//! AWS credentials come from the shared-config profile named after `--env`.
//! Pass `--shared-credentials` to use the default credential chain instead.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use pipeline_tooling::aws::{AwsEnvironments, ProfileConfig};
use pipeline_tooling::config::PipelineProperties;
use pipeline_tooling::dns::{
    DnsProvider, DnsReconciler, DottedNaming, DryRunProvider, ElbLookup, Route53Provider,
};
use pipeline_tooling::iam::{
    construct_policy, AccountLookup, BuiltinTemplates, PolicyContext, StaticAccount,
    StsAccountLookup,
};
use pipeline_tooling::pipeline::check_managed_pipeline;

// ============================================================
// CLI Definition
// ============================================================

#[derive(Parser)]
#[command(name = "pipeline-tool")]
#[command(about = "Deployment pipeline helpers", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Use the default AWS credentials for every environment instead of
    /// the profile named after it
    #[arg(long, global = true)]
    shared_credentials: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load balancer DNS records
    Dns {
        #[command(subcommand)]
        command: DnsCommands,
    },

    /// IAM policies
    Iam {
        #[command(subcommand)]
        command: IamCommands,
    },

    /// Pipeline naming
    Pipeline {
        #[command(subcommand)]
        command: PipelineCommands,
    },
}

/// Options shared by the DNS commands
#[derive(Args)]
struct DnsArgs {
    /// Application name
    #[arg(long)]
    app: String,

    /// Environment (e.g., dev, prod)
    #[arg(long)]
    env: String,

    /// Pipeline property file
    #[arg(long, env = "PIPELINE_PROPERTIES")]
    properties: PathBuf,

    /// Base domain, e.g. example.com
    #[arg(long, env = "BASE_DOMAIN")]
    domain: String,

    /// Log changes instead of applying them
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum DnsCommands {
    /// Alias record for the load balancer in one region
    Elb {
        #[command(flatten)]
        common: DnsArgs,

        /// Region of the load balancer
        #[arg(long)]
        region: String,

        /// Include the region in the hostname
        #[arg(long)]
        region_suffix: bool,
    },

    /// Region-less record routed across every configured region
    Failover {
        #[command(flatten)]
        common: DnsArgs,
    },
}

#[derive(Subcommand)]
enum IamCommands {
    /// Print the application's IAM policy document
    Policy {
        #[arg(long)]
        app: String,

        #[arg(long)]
        env: String,

        /// Application group, used in default bucket names
        #[arg(long)]
        group: String,

        #[arg(long)]
        region: String,

        /// Pipeline property file
        #[arg(long, env = "PIPELINE_PROPERTIES")]
        properties: PathBuf,

        /// Account number; looked up through STS when omitted
        #[arg(long)]
        account: Option<String>,
    },
}

#[derive(Subcommand)]
enum PipelineCommands {
    /// Print the region of a managed pipeline, fail otherwise
    Check {
        /// Pipeline name, e.g. "app1 [us-east-1]"
        #[arg(long)]
        name: String,

        #[arg(long)]
        app: String,
    },
}

// ============================================================
// Main Entry Point
// ============================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.json)?;

    let aws = Arc::new(if cli.shared_credentials {
        AwsEnvironments::new(ProfileConfig::shared())
    } else {
        AwsEnvironments::from_profiles()
    });

    match cli.command {
        Commands::Dns { command } => run_dns(command, aws).await,
        Commands::Iam { command } => run_iam(command, aws).await,
        Commands::Pipeline { command } => run_pipeline(command),
    }
}

fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

// ============================================================
// DNS
// ============================================================

fn build_reconciler(common: &DnsArgs, aws: Arc<AwsEnvironments>) -> DnsReconciler {
    let provider: Arc<dyn DnsProvider> = if common.dry_run {
        warn!("Dry run: record changes will be logged, not applied");
        Arc::new(DryRunProvider::new(Route53Provider::new(aws.clone())))
    } else {
        Arc::new(Route53Provider::new(aws.clone()))
    };

    DnsReconciler::new(
        provider,
        Arc::new(ElbLookup::new(aws)),
        Arc::new(DottedNaming::new(&common.domain)),
    )
}

fn load_properties(path: &Path) -> Result<PipelineProperties> {
    PipelineProperties::try_from_file(path)
        .with_context(|| format!("Failed to load properties from {}", path.display()))
}

async fn run_dns(command: DnsCommands, aws: Arc<AwsEnvironments>) -> Result<()> {
    match command {
        DnsCommands::Elb {
            common,
            region,
            region_suffix,
        } => {
            let props = load_properties(&common.properties)?
                .dns()
                .context("Invalid DNS settings in property file")?;
            let ctx = props.application_context(&common.app, &common.env, &region);
            let reconciler = build_reconciler(&common, aws);

            let name = reconciler
                .create_single_region_record(&ctx, region_suffix)
                .await
                .context("Failed to update load balancer record")?;

            info!(record = %name, "DNS record updated");
            println!("{}", name);
        }

        DnsCommands::Failover { common } => {
            let props = load_properties(&common.properties)?
                .dns()
                .context("Invalid DNS settings in property file")?;
            // Region-less name; the context region only seeds the naming call
            let first_region = props
                .regions
                .first()
                .context("Property file lists no regions")?;
            let ctx = props.application_context(&common.app, &common.env, first_region);
            let reconciler = build_reconciler(&common, aws);

            let name = reconciler
                .create_failover_record(&ctx, &props.regions)
                .await
                .context("Failed to update failover record")?;

            info!(record = %name, regions = props.regions.len(), "Failover record updated");
            println!("{}", name);
        }
    }

    Ok(())
}

// ============================================================
// IAM
// ============================================================

async fn run_iam(command: IamCommands, aws: Arc<AwsEnvironments>) -> Result<()> {
    match command {
        IamCommands::Policy {
            app,
            env,
            group,
            region,
            properties,
            account,
        } => {
            let props = load_properties(&properties)?;
            let ctx = PolicyContext::new(app, env, group, region);

            let accounts: Box<dyn AccountLookup> = match account {
                Some(number) => Box::new(StaticAccount(number)),
                None => Box::new(StsAccountLookup::new(aws)),
            };

            let policy = construct_policy(&ctx, &props.services, &BuiltinTemplates, accounts.as_ref())
                .await
                .context("Failed to construct IAM policy")?;

            match policy {
                Some(policy) => println!("{}", policy.to_json_pretty()?),
                None => info!(app = %ctx.app, "No IAM policy needed"),
            }
        }
    }

    Ok(())
}

// ============================================================
// Pipelines
// ============================================================

fn run_pipeline(command: PipelineCommands) -> Result<()> {
    match command {
        PipelineCommands::Check { name, app } => {
            let region = check_managed_pipeline(&name, &app)?;
            println!("{}", region);
        }
    }

    Ok(())
}
