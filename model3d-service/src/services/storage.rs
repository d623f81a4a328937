use async_trait::async_trait;
use reqwest::Url;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use thiserror::Error;

/// Prefix under which generated models are stored when no user is given.
pub const ANONYMOUS_PREFIX: &str = "generated";

pub const STL_CONTENT_TYPE: &str = "model/stl";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Upload of {path} failed: {message}")]
    UploadFailed { path: String, message: String },

    #[error("Signing {path} failed: {message}")]
    SigningFailed { path: String, message: String },

    #[error("Download of {path} failed: {message}")]
    DownloadFailed { path: String, message: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid storage response: {0}")]
    InvalidResponse(String),
}

/// Bucket-scoped object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(
        &self,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Time-limited URL granting read access to `path`.
    async fn create_signed_url(&self, path: &str, ttl_secs: u64) -> Result<String, StorageError>;
}

/// Resolve a bucket-relative object path from either a bare path or a
/// storage URL (public, signed or authenticated form).
pub fn object_path_from_url(url_or_path: &str, bucket: &str) -> Option<String> {
    let trimmed = url_or_path.trim();
    if trimmed.is_empty() {
        return None;
    }

    if !trimmed.contains("://") {
        let path = trimmed.trim_start_matches('/');
        return (!path.is_empty()).then(|| path.to_string());
    }

    let url = Url::parse(trimmed).ok()?;
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let path = match segments.iter().position(|seg| *seg == bucket) {
        Some(index) if index + 1 < segments.len() => segments[index + 1..].join("/"),
        _ => segments.join("/"),
    };

    (!path.is_empty()).then_some(path)
}

/// `{user_id}/3d-models/{filename}`, or `generated/3d-models/{filename}`.
pub fn model_object_path(user_id: Option<&str>, filename: &str) -> String {
    format!(
        "{}/3d-models/{}",
        user_id.unwrap_or(ANONYMOUS_PREFIX),
        filename
    )
}

/// One recorded `upload` call.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub path: String,
    pub data: Vec<u8>,
    pub content_type: String,
}

/// Object store held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    uploads: Mutex<Vec<StoredUpload>>,
    fail_uploads: AtomicBool,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object, e.g. a source image.
    pub fn with_object(self, path: &str, data: Vec<u8>) -> Self {
        self.insert(path, data);
        self
    }

    pub fn insert(&self, path: &str, data: Vec<u8>) {
        if let Ok(mut objects) = self.objects.lock() {
            objects.insert(path.to_string(), data);
        }
    }

    /// Make every subsequent upload fail.
    pub fn fail_uploads(&self) {
        self.fail_uploads.store(true, Ordering::SeqCst);
    }

    pub fn uploads(&self) -> Vec<StoredUpload> {
        self.uploads
            .lock()
            .map(|u| u.clone())
            .unwrap_or_default()
    }

    /// Bytes stored at `path`.
    pub fn download(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .lock()
            .map_err(|_| Self::lock_error(path))?
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::DownloadFailed {
                path: path.to_string(),
                message: "Object not found".to_string(),
            })
    }

    fn lock_error(path: &str) -> StorageError {
        StorageError::InvalidResponse(format!("store lock poisoned while accessing {}", path))
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn upload(
        &self,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::UploadFailed {
                path: path.to_string(),
                message: "upload rejected".to_string(),
            });
        }

        self.uploads
            .lock()
            .map_err(|_| Self::lock_error(path))?
            .push(StoredUpload {
                path: path.to_string(),
                data: data.clone(),
                content_type: content_type.to_string(),
            });
        self.objects
            .lock()
            .map_err(|_| Self::lock_error(path))?
            .insert(path.to_string(), data);
        Ok(())
    }

    async fn create_signed_url(&self, path: &str, ttl_secs: u64) -> Result<String, StorageError> {
        let exists = self
            .objects
            .lock()
            .map_err(|_| Self::lock_error(path))?
            .contains_key(path);

        if !exists {
            return Err(StorageError::SigningFailed {
                path: path.to_string(),
                message: "Object not found".to_string(),
            });
        }

        Ok(format!(
            "memory://signed/{}?expires_in={}",
            path, ttl_secs
        ))
    }
}
