//! High-level pipeline: publishes a site tree to a bucket and turns the bucket into a website.
//!
//! # Steps
//!   - Walk every regular file under the site root ([`SiteTree`])
//!   - Upload each one under its relative key as a public-read object
//!     (optionally skipping files whose content has not changed)
//!   - Make the bucket public and configure it as a website, exactly once
//!   - Return a [`DeployReport`] including the website endpoint
//!
//! # Error Handling
//! A transport failure while uploading one file is logged, recorded in the report and
//! the run continues. Every other failure returns immediately as a [`DeployError`];
//! files uploaded before it are not rolled back and the bucket settings are left untouched.
//!
//! # Concurrency
//! Uploads are independent and idempotent, so up to [`DeployOptions::concurrency`]
//! of them run at once. With the default of 1 files are uploaded one after another.

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::change::{has_changed, LocalDigest};
use crate::contract::{CannedAcl, NewObject, ObjectStore, StoreError, WebsiteConfig};
use crate::walk::{SiteFile, SiteTree};

#[derive(Debug, Clone)]
pub struct DeployOptions {
    pub website: WebsiteConfig,
    /// Maximum number of uploads in flight. Zero is treated as one.
    pub concurrency: usize,
    /// Consult the change detector and skip uploads of unchanged files.
    pub skip_unchanged: bool,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            website: WebsiteConfig::default(),
            concurrency: 1,
            skip_unchanged: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeployReport {
    pub uploaded: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<FailedUpload>,
    pub website_endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedUpload {
    pub key: String,
    pub reason: String,
}

/// What happened to a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Uploaded(String),
    Skipped(String),
    Failed(FailedUpload),
}

#[derive(Debug)]
pub enum DeployError {
    /// Walking the site tree failed.
    Walk(std::io::Error),
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A path could not be turned into a bucket key.
    InvalidKey(PathBuf),
    Store(StoreError),
}

impl fmt::Display for DeployError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployError::Walk(e) => write!(f, "failed to walk site directory: {e}"),
            DeployError::Read { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
            DeployError::InvalidKey(path) => {
                write!(f, "cannot derive a bucket key from path {}", path.display())
            }
            DeployError::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for DeployError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DeployError::Walk(e) => Some(e),
            DeployError::Read { source, .. } => Some(source),
            DeployError::InvalidKey(_) => None,
            DeployError::Store(e) => Some(e),
        }
    }
}

impl From<StoreError> for DeployError {
    fn from(e: StoreError) -> Self {
        DeployError::Store(e)
    }
}

/// Uploads one file as a public-read object.
///
/// Transport failures are returned as [`FileOutcome::Failed`]; all other errors propagate.
pub async fn deploy_file<S>(
    store: &S,
    file: SiteFile,
    options: &DeployOptions,
) -> Result<FileOutcome, DeployError>
where
    S: ObjectStore + ?Sized,
{
    info!(key = %file.key, path = %file.path.display(), "Deploying file");
    let digest = LocalDigest::of(&file.content);

    if options.skip_unchanged {
        let remote = match store.get_object(&file.key).await {
            Ok(remote) => remote,
            Err(e) if e.is_transport() => {
                warn!(key = %file.key, error = %e, "Caught transport error while looking up remote object, continuing with the remaining files");
                return Ok(transport_failure(file.key, e));
            }
            Err(e) => {
                error!(key = %file.key, error = %e, "Looking up remote object failed");
                return Err(e.into());
            }
        };
        if remote.is_none() {
            info!(key = %file.key, "File does not exist in bucket");
        }
        if !has_changed(&digest, remote.as_ref()) {
            info!(key = %file.key, "Unchanged since last deploy, skipping");
            return Ok(FileOutcome::Skipped(file.key));
        }
    }

    let content_type = mime_guess::from_path(&file.path)
        .first_or_octet_stream()
        .to_string();
    debug!(key = %file.key, content_type = %content_type, size = file.content.len(), md5 = %digest.md5, "Prepared upload");

    let req = NewObject {
        key: file.key.clone(),
        content: file.content,
        content_type,
        acl: CannedAcl::PublicRead,
        content_sha256: digest.sha256,
    };
    match store.put_object(req).await {
        Ok(()) => {
            debug!(key = %file.key, "Upload succeeded");
            Ok(FileOutcome::Uploaded(file.key))
        }
        Err(e) if e.is_transport() => {
            warn!(key = %file.key, error = %e, "Caught transport error while trying to upload file, continuing with the remaining files");
            Ok(transport_failure(file.key, e))
        }
        Err(e) => {
            error!(key = %file.key, error = %e, "Upload failed");
            Err(e.into())
        }
    }
}

fn transport_failure(key: String, e: StoreError) -> FileOutcome {
    FileOutcome::Failed(FailedUpload {
        key,
        reason: e.to_string(),
    })
}

/// Deploys every file under `tree` to `store`, then makes the bucket a public website.
pub async fn deploy<S>(
    store: &S,
    tree: &SiteTree,
    options: &DeployOptions,
) -> Result<DeployReport, DeployError>
where
    S: ObjectStore + ?Sized,
{
    info!(
        root = %tree.root().display(),
        concurrency = options.concurrency,
        skip_unchanged = options.skip_unchanged,
        "Starting deploy"
    );

    let outcomes: Vec<FileOutcome> = stream::iter(tree.files())
        .map(|entry| async move {
            let file = entry?;
            deploy_file(store, file, options).await
        })
        .buffer_unordered(options.concurrency.max(1))
        .try_collect()
        .await?;

    let mut uploaded = Vec::new();
    let mut skipped = Vec::new();
    let mut failed = Vec::new();
    for outcome in outcomes {
        match outcome {
            FileOutcome::Uploaded(key) => uploaded.push(key),
            FileOutcome::Skipped(key) => skipped.push(key),
            FileOutcome::Failed(failure) => failed.push(failure),
        }
    }
    uploaded.sort();
    skipped.sort();
    failed.sort_by(|a, b| a.key.cmp(&b.key));

    info!(
        uploaded = uploaded.len(),
        skipped = skipped.len(),
        failed = failed.len(),
        "All files processed"
    );

    store.set_bucket_acl(CannedAcl::PublicRead).await?;
    info!("Bucket is now public-read");

    store.configure_static_website(options.website.clone()).await?;
    info!(
        index_document = %options.website.index_document,
        error_document = %options.website.error_document,
        "Bucket configured as website"
    );

    let website_endpoint = store.website_endpoint().await?;
    info!(endpoint = %website_endpoint, "Your website is now live");

    Ok(DeployReport {
        uploaded,
        skipped,
        failed,
        website_endpoint,
    })
}
