//! # S3 storage client
//!
//! [`S3Bucket`] implements [`ObjectStore`] on top of `aws-sdk-s3` for one named bucket.
//!
//! - Credentials and region come from the AWS default provider chain (environment,
//!   profile files, instance metadata); the region and endpoint can be overridden.
//! - [`S3Bucket::connect`] checks the bucket exists before any upload starts.
//! - SDK failures are classified into [`StoreError::Transport`] (the request never
//!   completed) and [`StoreError::Service`] (S3 answered with an error).

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketCannedAcl, ErrorDocument, IndexDocument, ObjectCannedAcl, WebsiteConfiguration,
};
use aws_sdk_s3::Client;

use alotofeffort_core::contract::{
    CannedAcl, NewObject, ObjectStore, RemoteObject, StoreError, WebsiteConfig,
    CONTENT_SHA256_METADATA,
};

pub const DEFAULT_REGION: &str = "us-east-1";

/// Regions whose website endpoints use the `s3-website-<region>` form.
const DASH_WEBSITE_REGIONS: &[&str] = &[
    "us-east-1",
    "us-west-1",
    "us-west-2",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-northeast-1",
    "eu-west-1",
    "sa-east-1",
    "us-gov-west-1",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Settings {
    pub bucket: String,
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible servers. Enables path-style addressing.
    pub endpoint_url: Option<String>,
}

pub struct S3Bucket {
    client: Client,
    bucket: String,
    region: String,
}

impl S3Bucket {
    /// Builds a client from the AWS default configuration and verifies the bucket exists.
    pub async fn connect(settings: S3Settings) -> Result<Self, StoreError> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = settings.region.clone() {
            loader = loader.region(Region::new(region));
        }
        if let Some(endpoint_url) = settings.endpoint_url.as_deref() {
            loader = loader.endpoint_url(endpoint_url);
        }
        let sdk_config = loader.load().await;

        let region = sdk_config
            .region()
            .map(|r| r.to_string())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(settings.endpoint_url.is_some())
            .build();
        let client = Client::from_conf(s3_config);

        tracing::info!(bucket = %settings.bucket, region = %region, "Connecting to S3 bucket");
        client
            .head_bucket()
            .bucket(&settings.bucket)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(bucket = %settings.bucket, error = %DisplayErrorContext(&e), "Bucket is not accessible");
                classify(e)
            })?;

        Ok(Self {
            client,
            bucket: settings.bucket,
            region,
        })
    }
}

/// Website endpoint URL for a bucket in a region.
pub fn website_endpoint(bucket: &str, region: &str) -> String {
    if DASH_WEBSITE_REGIONS.contains(&region) {
        format!("http://{bucket}.s3-website-{region}.amazonaws.com")
    } else {
        format!("http://{bucket}.s3-website.{region}.amazonaws.com")
    }
}

fn classify<E, R>(err: SdkError<E, R>) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&err).to_string();
    match err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) | SdkError::ResponseError(_) => {
            StoreError::Transport(message)
        }
        _ => StoreError::Service(message),
    }
}

fn object_acl(acl: CannedAcl) -> ObjectCannedAcl {
    match acl {
        CannedAcl::Private => ObjectCannedAcl::Private,
        CannedAcl::PublicRead => ObjectCannedAcl::PublicRead,
    }
}

fn bucket_acl(acl: CannedAcl) -> BucketCannedAcl {
    match acl {
        CannedAcl::Private => BucketCannedAcl::Private,
        CannedAcl::PublicRead => BucketCannedAcl::PublicRead,
    }
}

#[async_trait]
impl ObjectStore for S3Bucket {
    async fn get_object(&self, key: &str) -> Result<Option<RemoteObject>, StoreError> {
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(head) => {
                let content_sha256 = head
                    .metadata()
                    .and_then(|m| m.get(CONTENT_SHA256_METADATA))
                    .cloned();
                Ok(Some(RemoteObject {
                    key: key.to_string(),
                    e_tag: head.e_tag().map(str::to_string),
                    content_sha256,
                }))
            }
            Err(e) if e.as_service_error().map(|se| se.is_not_found()).unwrap_or(false) => {
                tracing::debug!(key, "Object not found in bucket");
                Ok(None)
            }
            Err(e) => {
                tracing::error!(key, error = %DisplayErrorContext(&e), "HeadObject failed");
                Err(classify(e))
            }
        }
    }

    async fn put_object(&self, req: NewObject) -> Result<(), StoreError> {
        tracing::debug!(
            bucket = %self.bucket,
            key = %req.key,
            content_type = %req.content_type,
            size = req.content.len(),
            "PutObject"
        );
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&req.key)
            .body(ByteStream::from(req.content))
            .content_type(req.content_type)
            .acl(object_acl(req.acl))
            .metadata(CONTENT_SHA256_METADATA, req.content_sha256)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn set_bucket_acl(&self, acl: CannedAcl) -> Result<(), StoreError> {
        tracing::info!(bucket = %self.bucket, ?acl, "PutBucketAcl");
        self.client
            .put_bucket_acl()
            .bucket(&self.bucket)
            .acl(bucket_acl(acl))
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn configure_static_website(&self, website: WebsiteConfig) -> Result<(), StoreError> {
        let index_document = IndexDocument::builder()
            .suffix(website.index_document)
            .build()
            .map_err(|e| StoreError::Other(Box::new(e)))?;
        let error_document = ErrorDocument::builder()
            .key(website.error_document)
            .build()
            .map_err(|e| StoreError::Other(Box::new(e)))?;
        let configuration = WebsiteConfiguration::builder()
            .index_document(index_document)
            .error_document(error_document)
            .build();

        tracing::info!(bucket = %self.bucket, "PutBucketWebsite");
        self.client
            .put_bucket_website()
            .bucket(&self.bucket)
            .website_configuration(configuration)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn website_endpoint(&self) -> Result<String, StoreError> {
        Ok(website_endpoint(&self.bucket, &self.region))
    }
}
