//! Change detection: does a local file differ from what was last deployed?
//!
//! The local bytes are hashed and compared against metadata of the remote object,
//! so nothing is downloaded. Objects written by [`crate::deploy`] carry a
//! `content-sha256` attribute, which is compared when present. Otherwise the
//! comparison falls back to the backend's ETag, which is the content MD5 only for
//! single-part uploads: multipart ETags (`<hex>-<parts>`) never match and such
//! objects are always reported as changed.

use md5::Md5;
use sha2::{Digest, Sha256};
use std::path::{Component, Path};
use tracing::{debug, info};

use crate::contract::{ObjectStore, RemoteObject};
use crate::deploy::DeployError;

/// Digests of a local byte sequence, lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDigest {
    pub md5: String,
    pub sha256: String,
}

impl LocalDigest {
    pub fn of(content: &[u8]) -> Self {
        let md5 = {
            let mut hasher = Md5::new();
            hasher.update(content);
            format!("{:x}", hasher.finalize())
        };
        let sha256 = {
            let mut hasher = Sha256::new();
            hasher.update(content);
            format!("{:x}", hasher.finalize())
        };
        Self { md5, sha256 }
    }
}

/// Strips surrounding double quotes and whitespace from an integrity tag.
pub fn normalize_etag(tag: &str) -> &str {
    tag.trim_matches(|c: char| c == '"' || c.is_whitespace())
}

/// Turns a path relative to the site root into a bucket key.
///
/// `./css/site.css` becomes `css/site.css`. Absolute paths, `..` components and
/// paths without any file component are rejected.
pub fn object_key(relative: &Path) -> Result<String, DeployError> {
    let mut segments: Vec<String> = Vec::new();
    for comp in relative.components() {
        match comp {
            Component::CurDir => continue,
            Component::Normal(segment) => {
                segments.push(segment.to_string_lossy().into_owned());
            }
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(DeployError::InvalidKey(relative.to_path_buf()));
            }
        }
    }
    if segments.is_empty() {
        return Err(DeployError::InvalidKey(relative.to_path_buf()));
    }
    Ok(segments.join("/"))
}

/// Decides whether local content differs from the remote object.
///
/// Absent remote objects count as changed. Comparisons are exact and case-sensitive.
pub fn has_changed(local: &LocalDigest, remote: Option<&RemoteObject>) -> bool {
    let Some(remote) = remote else {
        return true;
    };

    if let Some(remote_sha256) = remote.content_sha256.as_deref() {
        let remote_sha256 = remote_sha256.trim();
        debug!(key = %remote.key, remote_sha256, local_sha256 = %local.sha256, "Comparing content-sha256 attribute");
        return remote_sha256 != local.sha256;
    }

    match remote.e_tag.as_deref().map(normalize_etag) {
        Some(key_md5) => {
            info!(key = %remote.key, key_md5, "Remote integrity tag");
            if key_md5.contains('-') {
                debug!(key = %remote.key, key_md5, "Integrity tag looks like a multipart upload; it cannot match a content MD5");
            }
            key_md5 != local.md5
        }
        None => {
            debug!(key = %remote.key, "Remote object has no integrity tag");
            true
        }
    }
}

/// Looks up `key` and compares it against already-read local content.
pub async fn content_changed<S>(store: &S, key: &str, content: &[u8]) -> Result<bool, DeployError>
where
    S: ObjectStore + ?Sized,
{
    let local = LocalDigest::of(content);
    info!(key, file_md5 = %local.md5, "Computed local digest");
    let remote = store.get_object(key).await?;
    if remote.is_none() {
        info!(key, "File does not exist in bucket");
    }
    let changed = has_changed(&local, remote.as_ref());
    if changed {
        info!(key, "File has changed.");
    } else {
        info!(key, "File has not changed.");
    }
    Ok(changed)
}

/// Checks if a file has changed since the last time it was deployed.
///
/// `file_path` is read as-is and must be relative: it doubles as the bucket key.
pub async fn has_changed_since_last_deploy<S>(store: &S, file_path: &Path) -> Result<bool, DeployError>
where
    S: ObjectStore + ?Sized,
{
    has_changed_under(store, Path::new(""), file_path).await
}

/// Like [`has_changed_since_last_deploy`], but reads `root/relative` while keying by `relative`.
pub async fn has_changed_under<S>(store: &S, root: &Path, relative: &Path) -> Result<bool, DeployError>
where
    S: ObjectStore + ?Sized,
{
    let key = object_key(relative)?;
    let local_path = root.join(relative);
    info!(path = %local_path.display(), key = %key, "Checking if file has changed since last deploy");
    let content = std::fs::read(&local_path).map_err(|source| DeployError::Read {
        path: local_path.clone(),
        source,
    })?;
    content_changed(store, &key, &content).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn remote(e_tag: Option<&str>, sha: Option<&str>) -> RemoteObject {
        RemoteObject {
            key: "index.html".to_string(),
            e_tag: e_tag.map(str::to_string),
            content_sha256: sha.map(str::to_string),
        }
    }

    #[test]
    fn digest_of_empty_input_matches_known_values() {
        let digest = LocalDigest::of(b"");
        assert_eq!(digest.md5, "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            digest.sha256,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn normalize_etag_strips_quotes_and_whitespace() {
        assert_eq!(normalize_etag("\"abc123\""), "abc123");
        assert_eq!(normalize_etag("abc123"), "abc123");
        assert_eq!(normalize_etag("  \"abc123\"\n"), "abc123");
        assert_eq!(normalize_etag("\" abc123 \""), "abc123");
    }

    #[test]
    fn object_key_normalises_relative_paths() {
        assert_eq!(object_key(Path::new("index.html")).unwrap(), "index.html");
        assert_eq!(object_key(Path::new("./css/site.css")).unwrap(), "css/site.css");
        assert_eq!(object_key(Path::new("a/./b/c.txt")).unwrap(), "a/b/c.txt");
    }

    #[test]
    fn object_key_rejects_escaping_and_empty_paths() {
        for bad in ["../secret", "/etc/passwd", ".", ""] {
            match object_key(Path::new(bad)) {
                Err(DeployError::InvalidKey(p)) => assert_eq!(p, PathBuf::from(bad)),
                other => panic!("expected InvalidKey for {bad:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn absent_remote_is_changed() {
        assert!(has_changed(&LocalDigest::of(b"<html></html>"), None));
    }

    #[test]
    fn quoted_matching_etag_is_unchanged() {
        let local = LocalDigest::of(b"body{}");
        let tag = format!("\"{}\"", local.md5);
        assert!(!has_changed(&local, Some(&remote(Some(&tag), None))));
    }

    #[test]
    fn etag_comparison_is_case_sensitive() {
        let local = LocalDigest::of(b"body{}");
        let tag = local.md5.to_uppercase();
        assert!(has_changed(&local, Some(&remote(Some(&tag), None))));
    }

    #[test]
    fn missing_etag_is_changed() {
        let local = LocalDigest::of(b"body{}");
        assert!(has_changed(&local, Some(&remote(None, None))));
    }

    #[test]
    fn sha256_attribute_takes_precedence_over_multipart_etag() {
        let local = LocalDigest::of(b"large file");
        let multipart = "\"9b2cf535f27731c974343645a3985328-3\"";
        assert!(has_changed(&local, Some(&remote(Some(multipart), None))));
        assert!(!has_changed(
            &local,
            Some(&remote(Some(multipart), Some(&local.sha256)))
        ));
    }

    #[test]
    fn mismatching_sha256_attribute_is_changed_even_if_etag_matches() {
        let local = LocalDigest::of(b"body{}");
        let other = LocalDigest::of(b"body{color:red}");
        assert!(has_changed(
            &local,
            Some(&remote(Some(&local.md5), Some(&other.sha256)))
        ));
    }
}
