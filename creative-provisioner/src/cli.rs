///
/// This module implements the CLI interface for creative-provisioner: command parsing,
/// argument validation and result output.
///
/// All business logic (folder resolution, numbering, the provisioning workflow and the
/// batch driver) lives in the [`creative-provisioner-core`] crate. This module only
/// loads settings, builds the HTTP-backed [`Provisioner`] and prints outcomes.
///
/// ## How To Use
/// - From the shell: `creative-provisioner --help`.
/// - Programmatically or from tests: call [`run`] with a constructed [`Cli`].
///
/// [`creative-provisioner-core`]: ../../creative-provisioner-core/
/// [`Cli`]: struct.Cli.html
/// [`run`]: fn.run.html
use crate::client::{HttpArchiveFetcher, HttpCatalogClient};
use crate::config::Config;
use crate::load_config::{load_config, load_credentials};
use crate::table::read_records;
use anyhow::Result;
use clap::{Parser, Subcommand};
use creative_provisioner_core::batch::run_batch;
use creative_provisioner_core::provision::{
    CreativeKind, ProvisioningRequest, ProvisioningResult, Provisioner,
};
use std::path::PathBuf;

/// CLI for creative-provisioner: numbered creative folders and creatives on the ad platform.
#[derive(Parser)]
#[clap(
    name = "creative-provisioner",
    version,
    about = "Create numbered creative folders with link or display creatives, one by one or from a spreadsheet"
)]
pub struct Cli {
    /// Path to an optional YAML settings file
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    /// API key; defaults to the CREATIVE_API_KEY environment variable
    #[clap(long, global = true)]
    pub api_key: Option<String>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create one folder holding a single text link creative
    Link {
        #[clap(long)]
        advertiser_id: String,
        #[clap(long)]
        name: String,
        /// Optional campaign period appended to the folder name
        #[clap(long)]
        period: Option<String>,
        #[clap(long)]
        target_url: String,
    },
    /// Create one folder holding an image creative per file of a ZIP archive
    Display {
        #[clap(long)]
        advertiser_id: String,
        #[clap(long)]
        name: String,
        #[clap(long)]
        period: Option<String>,
        #[clap(long)]
        target_url: String,
        /// http(s) URL of the ZIP archive
        #[clap(long)]
        archive_url: String,
    },
    /// Provision every row of an XLSX or CSV file, strictly in order
    Batch {
        #[clap(long)]
        input: PathBuf,
        /// `link` or `display`
        #[clap(long, default_value = "link")]
        kind: CreativeKind,
        /// Print the whole report as JSON
        #[clap(long)]
        json: bool,
    },
    /// Check that the API key is accepted by the platform
    VerifyKey,
}

type HttpProvisioner = Provisioner<HttpCatalogClient, HttpArchiveFetcher>;

fn build_provisioner(config: &Config) -> Result<HttpProvisioner> {
    let catalog = HttpCatalogClient::new(&config.api_base_url, config.timeout())?;
    let archives = HttpArchiveFetcher::new(config.timeout())?;
    Ok(Provisioner::new(catalog, archives)
        .with_decorations(config.decoration_registry())
        .with_settings(config.provision_settings()?))
}

fn print_result(result: &ProvisioningResult) {
    let marker = if result.success { "ok" } else { "FAILED" };
    println!("[{marker}] {}", result.message);
}

async fn provision_one(
    cli_config: Option<PathBuf>,
    api_key: Option<String>,
    request: ProvisioningRequest,
    kind: CreativeKind,
) -> Result<()> {
    let config = load_config(cli_config.as_deref())?;
    let credentials = load_credentials(api_key)?;
    let provisioner = build_provisioner(&config)?;

    let result = provisioner.provision(&request, kind, &credentials).await;
    print_result(&result);
    if result.success {
        Ok(())
    } else {
        Err(anyhow::anyhow!(result.message))
    }
}

/// Async CLI entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    let Cli {
        config,
        api_key,
        command,
    } = cli;

    match command {
        Commands::Link {
            advertiser_id,
            name,
            period,
            target_url,
        } => {
            tracing::info!(command = "link", "Provisioning link creative");
            let request = ProvisioningRequest {
                advertiser_id,
                creative_name: name,
                campaign_period: period,
                target_url,
                payload_source: None,
            };
            provision_one(config, api_key, request, CreativeKind::Link).await
        }
        Commands::Display {
            advertiser_id,
            name,
            period,
            target_url,
            archive_url,
        } => {
            tracing::info!(command = "display", "Provisioning display creatives");
            let request = ProvisioningRequest {
                advertiser_id,
                creative_name: name,
                campaign_period: period,
                target_url,
                payload_source: Some(archive_url),
            };
            provision_one(config, api_key, request, CreativeKind::Display).await
        }
        Commands::Batch { input, kind, json } => {
            let config = load_config(config.as_deref())?;
            let credentials = load_credentials(api_key)?;
            let records = read_records(&input)?;
            tracing::info!(command = "batch", %kind, records = records.len(), "Starting batch");
            let provisioner = build_provisioner(&config)?;
            let report = run_batch(&provisioner, records, kind, &credentials).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for result in &report.results {
                    print_result(result);
                }
                println!("{}", report.message);
            }
            Ok(())
        }
        Commands::VerifyKey => {
            let config = load_config(config.as_deref())?;
            let credentials = load_credentials(api_key)?;
            let client = HttpCatalogClient::new(&config.api_base_url, config.timeout())?;
            match client.verify_credentials(&credentials).await {
                Ok(()) => {
                    println!("API key is valid");
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "verify-key", error = %e, "API key rejected");
                    Err(anyhow::anyhow!("API key check failed: {e}"))
                }
            }
        }
    }
}
