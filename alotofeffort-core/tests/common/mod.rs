#![allow(dead_code)]

use alotofeffort_core::change::LocalDigest;
use alotofeffort_core::contract::{
    CannedAcl, NewObject, ObjectStore, RemoteObject, StoreError, WebsiteConfig,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub content: Vec<u8>,
    pub content_type: String,
    pub acl: CannedAcl,
    pub e_tag: String,
    pub content_sha256: Option<String>,
}

/// Bucket held in memory. ETags are the quoted content MD5, like a single-part S3 upload.
#[derive(Default)]
pub struct MemoryStore {
    pub objects: Mutex<HashMap<String, StoredObject>>,
    pub bucket_acls: Mutex<Vec<CannedAcl>>,
    pub websites: Mutex<Vec<WebsiteConfig>>,
    pub put_count: Mutex<usize>,
    /// Keys whose uploads fail with a transport error.
    pub flaky_keys: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flaky_keys(keys: &[&str]) -> Self {
        Self {
            flaky_keys: keys.iter().map(|k| k.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Stores an object the way a foreign tool would: ETag only, no sha256 attribute.
    pub fn seed(&self, key: &str, content: &[u8]) {
        let digest = LocalDigest::of(content);
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                content: content.to_vec(),
                content_type: "application/octet-stream".to_string(),
                acl: CannedAcl::Private,
                e_tag: format!("\"{}\"", digest.md5),
                content_sha256: None,
            },
        );
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn puts(&self) -> usize {
        *self.put_count.lock().unwrap()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_object(&self, key: &str) -> Result<Option<RemoteObject>, StoreError> {
        Ok(self.objects.lock().unwrap().get(key).map(|o| RemoteObject {
            key: key.to_string(),
            e_tag: Some(o.e_tag.clone()),
            content_sha256: o.content_sha256.clone(),
        }))
    }

    async fn put_object(&self, req: NewObject) -> Result<(), StoreError> {
        *self.put_count.lock().unwrap() += 1;
        if self.flaky_keys.contains(&req.key) {
            return Err(StoreError::Transport("connection reset by peer".to_string()));
        }
        let digest = LocalDigest::of(&req.content);
        self.objects.lock().unwrap().insert(
            req.key,
            StoredObject {
                content: req.content,
                content_type: req.content_type,
                acl: req.acl,
                e_tag: format!("\"{}\"", digest.md5),
                content_sha256: Some(req.content_sha256),
            },
        );
        Ok(())
    }

    async fn set_bucket_acl(&self, acl: CannedAcl) -> Result<(), StoreError> {
        self.bucket_acls.lock().unwrap().push(acl);
        Ok(())
    }

    async fn configure_static_website(&self, website: WebsiteConfig) -> Result<(), StoreError> {
        self.websites.lock().unwrap().push(website);
        Ok(())
    }

    async fn website_endpoint(&self) -> Result<String, StoreError> {
        Ok("http://test-bucket.s3-website-us-east-1.amazonaws.com".to_string())
    }
}

pub fn write_file(root: &Path, relative: &str, content: &[u8]) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}
