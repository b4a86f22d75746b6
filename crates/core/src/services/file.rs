//! File service: uploaded artifacts backed by object storage.
//!
//! The object is always written before its `files` row, so a row never
//! points at a missing object.

use std::sync::Arc;

use enrollo_common::{AppError, AppResult, IdGenerator, ObjectStorage, StoredObject, generate_storage_key};
use enrollo_db::{entities::file, repositories::FileRepository};
use sea_orm::{ConnectionTrait, Set};

/// An uploaded file as received from a client.
#[derive(Debug, Clone)]
pub struct FileUpload {
    /// Original file name.
    pub filename: String,
    /// MIME content type.
    pub content_type: String,
    /// File contents.
    pub data: Vec<u8>,
}

impl FileUpload {
    /// Whether the upload declares an image content type.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// File service for storing uploads and issuing access URLs.
#[derive(Clone)]
pub struct FileService {
    file_repo: FileRepository,
    storage: Arc<dyn ObjectStorage>,
    bucket: String,
    signed_url_ttl_secs: u64,
    id_gen: IdGenerator,
}

impl FileService {
    /// Create a new file service.
    #[must_use]
    pub fn new(
        file_repo: FileRepository,
        storage: Arc<dyn ObjectStorage>,
        bucket: String,
        signed_url_ttl_secs: u64,
    ) -> Self {
        Self {
            file_repo,
            storage,
            bucket,
            signed_url_ttl_secs,
            id_gen: IdGenerator::new(),
        }
    }

    /// Store an upload and record it.
    pub async fn upload(&self, upload: FileUpload) -> AppResult<file::Model> {
        let stored = self.store_object(&upload).await?;
        let model = self.new_record(&upload, &stored);

        match self.file_repo.create(model).await {
            Ok(record) => Ok(record),
            Err(e) => {
                self.discard_object(&stored).await;
                Err(e)
            }
        }
    }

    /// Write the object only. Pair with [`FileService::record_in`] inside a
    /// transaction and [`FileService::discard_object`] on failure.
    pub async fn store_object(&self, upload: &FileUpload) -> AppResult<StoredObject> {
        if upload.data.is_empty() {
            return Err(AppError::BadRequest("Uploaded file is empty".to_string()));
        }
        let key = generate_storage_key(&upload.filename);
        self.storage
            .put(&self.bucket, &key, &upload.data, &upload.content_type)
            .await
    }

    /// Record a stored object on the caller's connection.
    pub async fn record_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        upload: &FileUpload,
        stored: &StoredObject,
    ) -> AppResult<file::Model> {
        FileRepository::create_in(conn, self.new_record(upload, stored)).await
    }

    /// Best-effort removal of an object whose row was never committed.
    pub async fn discard_object(&self, stored: &StoredObject) {
        if let Err(e) = self.storage.delete(&stored.bucket, &stored.key).await {
            tracing::warn!(
                bucket = %stored.bucket,
                key = %stored.key,
                error = %e,
                "Failed to remove orphaned object"
            );
        }
    }

    /// Find files by IDs.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<file::Model>> {
        self.file_repo.find_by_ids(ids).await
    }

    /// Time-limited URL for a stored file.
    pub fn signed_url(&self, file: &file::Model) -> AppResult<String> {
        self.storage
            .signed_url(&file.bucket, &file.key, self.signed_url_ttl_secs)
    }

    /// Check a signed URL and read the object it grants access to.
    pub async fn read_signed(
        &self,
        bucket: &str,
        key: &str,
        expires: i64,
        signature: &str,
    ) -> AppResult<Vec<u8>> {
        if !self.storage.verify_signature(bucket, key, expires, signature) {
            return Err(AppError::Forbidden("Invalid or expired link".to_string()));
        }
        self.storage.read(bucket, key).await
    }

    fn new_record(&self, upload: &FileUpload, stored: &StoredObject) -> file::ActiveModel {
        file::ActiveModel {
            id: Set(self.id_gen.generate()),
            bucket: Set(stored.bucket.clone()),
            key: Set(stored.key.clone()),
            filename: Set(upload.filename.clone()),
            mimetype: Set(stored.content_type.clone()),
            size: Set(i64::try_from(stored.size).unwrap_or(i64::MAX)),
            created_at: Set(chrono::Utc::now().into()),
        }
    }
}
