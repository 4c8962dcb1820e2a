/// # alotofeffort CLI Interface (Module)
///
/// Command parsing and the async entrypoint shared by `main()` and the integration tests.
/// All deploy and change-detection logic lives in `alotofeffort-core`; this module only
/// resolves settings, connects to S3 and reports results to the operator.
///
/// ## Commands
/// - `deploy`: upload the site directory and publish the bucket as a website.
/// - `check <FILE>`: report whether one file differs from its deployed copy.
use crate::load_config::{load_config, resolve_settings, Overrides, Settings};
use crate::s3::S3Bucket;
use alotofeffort_core::change::has_changed_under;
use alotofeffort_core::deploy::deploy;
use alotofeffort_core::walk::SiteTree;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// CLI for alotofeffort: deploy a static site to an S3 bucket.
#[derive(Parser)]
#[clap(
    name = "alotofeffort",
    version,
    about = "Deploy a static website directory to an S3 bucket and serve it as a public website"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Default, Clone)]
pub struct SiteArgs {
    /// Path to the YAML config file
    #[clap(long)]
    pub config: Option<PathBuf>,
    /// Root directory of the static site
    #[clap(long)]
    pub www_dir: Option<PathBuf>,
    /// Target bucket name
    #[clap(long)]
    pub bucket: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload every file of the site and configure the bucket as a public website
    Deploy {
        #[clap(flatten)]
        site: SiteArgs,
        /// Maximum number of uploads in flight
        #[clap(long)]
        concurrency: Option<usize>,
        /// Skip files whose content matches the deployed object
        #[clap(long)]
        skip_unchanged: bool,
        /// Upload every file even if the config file enables `skip_unchanged`
        #[clap(long, conflicts_with = "skip_unchanged")]
        no_skip_unchanged: bool,
    },
    /// Check whether a file has changed since the last deploy
    Check {
        /// File path relative to the site root; also the bucket key
        file: PathBuf,
        #[clap(flatten)]
        site: SiteArgs,
    },
}

fn settings_for(
    site: SiteArgs,
    concurrency: Option<usize>,
    skip_unchanged: Option<bool>,
) -> Result<Settings> {
    let config = site.config.as_deref().map(load_config).transpose()?;
    resolve_settings(
        config,
        Overrides {
            www_dir: site.www_dir,
            bucket: site.bucket,
            concurrency,
            skip_unchanged,
        },
    )
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Deploy {
            site,
            concurrency,
            skip_unchanged,
            no_skip_unchanged,
        } => {
            let skip_unchanged = match (skip_unchanged, no_skip_unchanged) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            let settings = settings_for(site, concurrency, skip_unchanged)?;
            let site_root = settings.site_root();
            tracing::info!(command = "deploy", www_dir = %site_root.display(), "Starting deploy");
            let store = S3Bucket::connect(settings.s3.clone())
                .await
                .with_context(|| format!("Failed to open bucket {}", settings.s3.bucket))?;
            let tree = SiteTree::new(site_root);

            let report = match deploy(&store, &tree, &settings.deploy).await {
                Ok(report) => report,
                Err(e) => {
                    tracing::error!(command = "deploy", error = %e, "Deploy failed");
                    return Err(anyhow::Error::new(e).context("Deploy failed"));
                }
            };

            match serde_json::to_string_pretty(&report) {
                Ok(json) => tracing::debug!(json = %json, "Deploy report as JSON"),
                Err(e) => tracing::error!(error = ?e, "Failed to serialize deploy report as JSON"),
            }

            println!(
                "Deployed {} file(s), skipped {} unchanged, {} failed.",
                report.uploaded.len(),
                report.skipped.len(),
                report.failed.len()
            );
            for failure in &report.failed {
                println!("Caught transport error while trying to upload {}: {}", failure.key, failure.reason);
            }
            println!("Your website is now live at {}", report.website_endpoint);
            println!("If you haven't done so yet, point your domain name there!");
            Ok(())
        }
        Commands::Check { file, site } => {
            let settings = settings_for(site, None, None)?;
            let store = S3Bucket::connect(settings.s3.clone())
                .await
                .with_context(|| format!("Failed to open bucket {}", settings.s3.bucket))?;

            // Without a configured site root the path is read relative to the working directory.
            let root = settings.www_dir.clone().unwrap_or_default();
            let changed = has_changed_under(&store, &root, &file)
                .await
                .with_context(|| format!("Failed to check {}", file.display()))?;
            tracing::info!(command = "check", file = %file.display(), changed, "Check complete");
            println!(
                "{}: {}",
                file.display(),
                if changed { "changed" } else { "unchanged" }
            );
            Ok(())
        }
    }
}
