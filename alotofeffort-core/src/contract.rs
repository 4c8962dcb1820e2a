//! # contract: storage capability interface for deploys
//!
//! This module defines the single trait ([`ObjectStore`]) through which the deploy
//! pipeline and the change detector talk to a bucket, plus the plain data types
//! flowing across it.
//!
//! ## Interface & Extensibility
//! - Implement [`ObjectStore`] for a backend (S3, an S3-compatible server, an in-memory fake).
//! - All methods are async and return [`StoreError`].
//! - Implementors classify failures: a request that never completed is
//!   [`StoreError::Transport`], an answer from the service is [`StoreError::Service`].
//!   The deploy loop only recovers from the former.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`; `MockObjectStore` is exported under the
//!   default `test-export-mocks` feature so integration tests can use it.

use async_trait::async_trait;
use std::fmt;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

/// User metadata attribute holding the SHA-256 hex digest of an uploaded object's bytes.
pub const CONTENT_SHA256_METADATA: &str = "content-sha256";

pub const DEFAULT_INDEX_DOCUMENT: &str = "index.html";
pub const DEFAULT_ERROR_DOCUMENT: &str = "error.html";

/// Metadata of an object already stored in the bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub key: String,
    /// Integrity tag as returned by the backend, possibly wrapped in double quotes.
    pub e_tag: Option<String>,
    /// Value of the [`CONTENT_SHA256_METADATA`] attribute, if the object carries one.
    pub content_sha256: Option<String>,
}

/// An object to be written to the bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewObject {
    pub key: String,
    pub content: Vec<u8>,
    pub content_type: String,
    pub acl: CannedAcl,
    /// Stored as the [`CONTENT_SHA256_METADATA`] attribute.
    pub content_sha256: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CannedAcl {
    Private,
    PublicRead,
}

/// Bucket-level website settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebsiteConfig {
    pub index_document: String,
    pub error_document: String,
}

impl Default for WebsiteConfig {
    fn default() -> Self {
        Self {
            index_document: DEFAULT_INDEX_DOCUMENT.to_string(),
            error_document: DEFAULT_ERROR_DOCUMENT.to_string(),
        }
    }
}

/// Failure reported by an [`ObjectStore`] implementation.
#[derive(Debug)]
pub enum StoreError {
    /// The request never completed: connection reset, DNS failure, timeout or an unreadable response.
    Transport(String),
    /// The service answered with an error (access denied, no such bucket, ...).
    Service(String),
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn is_transport(&self) -> bool {
        matches!(self, StoreError::Transport(_))
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Transport(msg) => write!(f, "transport error: {msg}"),
            StoreError::Service(msg) => write!(f, "service error: {msg}"),
            StoreError::Other(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Other(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// Trait for reading and writing objects and bucket settings.
/// The implementor holds an already authenticated handle to one named bucket.
///
/// The trait is `Send` + `Sync` and intended for async/await usage.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Look up an object's metadata without downloading its content.
    /// Returns `Ok(None)` when no object exists under `key`.
    async fn get_object(&self, key: &str) -> Result<Option<RemoteObject>, StoreError>;

    /// Write an object, replacing any existing object under the same key.
    async fn put_object(&self, req: NewObject) -> Result<(), StoreError>;

    /// Set the access policy of the bucket itself.
    async fn set_bucket_acl(&self, acl: CannedAcl) -> Result<(), StoreError>;

    /// Enable static website hosting with the given index and error documents.
    async fn configure_static_website(&self, website: WebsiteConfig) -> Result<(), StoreError>;

    /// Public URL under which the bucket is served as a website.
    async fn website_endpoint(&self) -> Result<String, StoreError>;
}
