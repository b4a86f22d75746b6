//! Object storage abstraction for uploaded files.
//!
//! Objects are addressed by `(bucket, key)`. Access goes through signed,
//! time-limited URLs so that payment proofs and slips are never public.

use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

/// Metadata of an object that has been written to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Bucket the object lives in.
    pub bucket: String,
    /// Object key within the bucket.
    pub key: String,
    /// Size in bytes.
    pub size: u64,
    /// MIME content type.
    pub content_type: String,
}

/// Object storage collaborator.
#[async_trait::async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Write an object.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> AppResult<StoredObject>;

    /// Read an object back.
    async fn read(&self, bucket: &str, key: &str) -> AppResult<Vec<u8>>;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, bucket: &str, key: &str) -> AppResult<()>;

    /// Build a URL granting read access until `ttl_secs` from now.
    fn signed_url(&self, bucket: &str, key: &str, ttl_secs: u64) -> AppResult<String>;

    /// Check a signature produced by [`ObjectStorage::signed_url`].
    fn verify_signature(&self, bucket: &str, key: &str, expires: i64, signature: &str) -> bool;
}

/// Local filesystem storage backend.
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
    signing_secret: String,
}

impl LocalStorage {
    /// Create a new local storage backend.
    #[must_use]
    pub const fn new(base_path: PathBuf, base_url: String, signing_secret: String) -> Self {
        Self {
            base_path,
            base_url,
            signing_secret,
        }
    }

    /// Root directory of all buckets.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn object_path(&self, bucket: &str, key: &str) -> AppResult<PathBuf> {
        if !is_safe_segment(bucket) || !is_safe_relative(key) {
            return Err(AppError::BadRequest("Invalid object path".to_string()));
        }
        Ok(self.base_path.join(bucket).join(key))
    }

    fn sign(&self, bucket: &str, key: &str, expires: i64) -> AppResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.signing_secret.as_bytes())
            .map_err(|e| AppError::Config(format!("Invalid signing secret: {e}")))?;
        mac.update(format!("{bucket}/{key}/{expires}").as_bytes());
        Ok(mac)
    }
}

#[async_trait::async_trait]
impl ObjectStorage for LocalStorage {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> AppResult<StoredObject> {
        let path = self.object_path(bucket, key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to create directory: {e}")))?;
        }

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write object: {e}")))?;

        Ok(StoredObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size: data.len() as u64,
            content_type: content_type.to_string(),
        })
    }

    async fn read(&self, bucket: &str, key: &str) -> AppResult<Vec<u8>> {
        let path = self.object_path(bucket, key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::NotFound(format!("Object: {bucket}/{key}")))
            }
            Err(e) => Err(AppError::Storage(format!("Failed to read object: {e}"))),
        }
    }

    async fn delete(&self, bucket: &str, key: &str) -> AppResult<()> {
        let path = self.object_path(bucket, key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!("Failed to delete object: {e}"))),
        }
    }

    fn signed_url(&self, bucket: &str, key: &str, ttl_secs: u64) -> AppResult<String> {
        let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
        let expires = Utc::now().timestamp().saturating_add(ttl);
        let signature = hex::encode(self.sign(bucket, key, expires)?.finalize().into_bytes());
        Ok(format!(
            "{}/{bucket}/{key}?expires={expires}&signature={signature}",
            self.base_url.trim_end_matches('/')
        ))
    }

    fn verify_signature(&self, bucket: &str, key: &str, expires: i64, signature: &str) -> bool {
        if expires < Utc::now().timestamp() {
            return false;
        }
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        self.sign(bucket, key, expires)
            .is_ok_and(|mac| mac.verify_slice(&expected).is_ok())
    }
}

fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty() && !segment.contains(['/', '\\']) && segment != "." && segment != ".."
}

fn is_safe_relative(key: &str) -> bool {
    !key.is_empty()
        && Path::new(key)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

/// Extract a lowercase file extension from an original file name.
///
/// Falls back to `bin` when the name has no usable extension.
#[must_use]
pub fn file_extension(original_name: &str) -> String {
    original_name
        .rfind('.')
        .filter(|&pos| pos > 0 && pos < original_name.len() - 1)
        .map(|pos| &original_name[pos + 1..])
        .filter(|ext| ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map_or_else(|| "bin".to_string(), str::to_ascii_lowercase)
}

/// Generate a unique storage key for a file.
#[must_use]
pub fn generate_storage_key(original_name: &str) -> String {
    format!("{}.{}", uuid::Uuid::now_v7(), file_extension(original_name))
}
