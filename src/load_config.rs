/// `load_config` module: loads the optional YAML config file and merges it with CLI flags and
/// the environment into the settings a deploy or check runs with.
///
/// # Precedence
/// CLI flag > YAML config file > environment (`BUCKET_NAME`) > built-in defaults.
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::{Context, Result};
use alotofeffort_core::contract::{WebsiteConfig, DEFAULT_ERROR_DOCUMENT, DEFAULT_INDEX_DOCUMENT};
use alotofeffort_core::deploy::DeployOptions;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::s3::S3Settings;

pub const BUCKET_ENV_VAR: &str = "BUCKET_NAME";
pub const DEFAULT_WWW_DIR: &str = "www";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    #[serde(default)]
    pub www_dir: Option<PathBuf>,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub s3: S3Section,
    #[serde(default)]
    pub website: WebsiteSection,
    #[serde(default)]
    pub upload: UploadSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct S3Section {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebsiteSection {
    #[serde(default = "default_index_document")]
    pub index_document: String,
    #[serde(default = "default_error_document")]
    pub error_document: String,
}

impl Default for WebsiteSection {
    fn default() -> Self {
        Self {
            index_document: default_index_document(),
            error_document: default_error_document(),
        }
    }
}

fn default_index_document() -> String {
    DEFAULT_INDEX_DOCUMENT.to_string()
}

fn default_error_document() -> String {
    DEFAULT_ERROR_DOCUMENT.to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadSection {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub skip_unchanged: bool,
}

impl Default for UploadSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            skip_unchanged: false,
        }
    }
}

fn default_concurrency() -> usize {
    1
}

/// Values given on the command line. `None` means "not given".
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub www_dir: Option<PathBuf>,
    pub bucket: Option<String>,
    pub concurrency: Option<usize>,
    /// `--skip-unchanged` is `Some(true)`, `--no-skip-unchanged` is `Some(false)`.
    pub skip_unchanged: Option<bool>,
}

/// Fully resolved settings for one run.
#[derive(Debug)]
pub struct Settings {
    /// Site root as configured; `None` when neither the CLI nor the config file named one.
    pub www_dir: Option<PathBuf>,
    pub s3: S3Settings,
    pub deploy: DeployOptions,
}

impl Settings {
    /// Directory to deploy from, falling back to [`DEFAULT_WWW_DIR`].
    pub fn site_root(&self) -> PathBuf {
        self.www_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WWW_DIR))
    }
}

/// Loads a static YAML config file (no secrets).
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SiteConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(e).with_context(|| format!("Failed to read config file {:?}", path_ref));
        }
    };

    let config: SiteConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    Ok(config)
}

/// Merges an optional config file with command-line overrides and the environment.
pub fn resolve_settings(config: Option<SiteConfig>, overrides: Overrides) -> Result<Settings> {
    let config = config.unwrap_or_default();

    let bucket = match overrides.bucket.or(config.bucket) {
        Some(bucket) => bucket,
        None => match std::env::var(BUCKET_ENV_VAR) {
            Ok(bucket) if !bucket.trim().is_empty() => {
                info!(env = BUCKET_ENV_VAR, "Bucket name taken from environment");
                bucket
            }
            _ => {
                error!("No bucket name given");
                anyhow::bail!(
                    "No bucket configured: pass --bucket, set `bucket` in the config file or set {BUCKET_ENV_VAR}"
                );
            }
        },
    };

    let www_dir = overrides.www_dir.or(config.www_dir);

    let deploy = DeployOptions {
        website: WebsiteConfig {
            index_document: config.website.index_document,
            error_document: config.website.error_document,
        },
        concurrency: overrides.concurrency.unwrap_or(config.upload.concurrency),
        skip_unchanged: overrides
            .skip_unchanged
            .unwrap_or(config.upload.skip_unchanged),
    };

    info!(
        bucket = %bucket,
        www_dir = ?www_dir,
        concurrency = deploy.concurrency,
        skip_unchanged = deploy.skip_unchanged,
        "Settings resolved"
    );

    Ok(Settings {
        www_dir,
        s3: S3Settings {
            bucket,
            region: config.s3.region,
            endpoint_url: config.s3.endpoint_url,
        },
        deploy,
    })
}
