//! Supabase Storage and PostgREST client.

use super::memories::{MemoryRepository, RepositoryError};
use super::storage::{ObjectStore, StorageError};
use crate::config::SupabaseConfig;
use crate::models::{MemoryRecord, MemoryStatus};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::ExposeSecret;
use serde_json::{json, Value};

const MEMORIES_TABLE: &str = "memories";

/// Talks to one Supabase project with the service-role key.
pub struct SupabaseClient {
    client: Client,
    config: SupabaseConfig,
}

impl SupabaseClient {
    pub fn new(client: Client, config: SupabaseConfig) -> Self {
        Self { client, config }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let key = self.config.service_key.expose_secret();
        builder
            .bearer_auth(key)
            .header("apikey", key.as_str())
    }

    fn object_url(&self, kind: &str, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if kind.is_empty() {
            format!(
                "{}/storage/v1/object/{}/{}",
                self.config.url, self.config.bucket, path
            )
        } else {
            format!(
                "{}/storage/v1/object/{}/{}/{}",
                self.config.url, kind, self.config.bucket, path
            )
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.config.url, MEMORIES_TABLE)
    }

    /// Signed URLs come back relative to `/storage/v1`.
    fn absolute_signed_url(&self, signed: &str) -> String {
        if signed.starts_with("http://") || signed.starts_with("https://") {
            signed.to_string()
        } else {
            format!(
                "{}/storage/v1/{}",
                self.config.url,
                signed.trim_start_matches('/')
            )
        }
    }

    async fn patch_memory(&self, memory_id: &str, body: Value) -> Result<MemoryRecord, RepositoryError> {
        let response = self
            .authorized(self.client.patch(self.table_url()))
            .query(&[("id", format!("eq.{}", memory_id))])
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await
            .map_err(|e| RepositoryError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RepositoryError::RequestFailed(format!("HTTP {}: {}", status, text)));
        }

        let rows: Vec<MemoryRecord> = response
            .json()
            .await
            .map_err(|e| RepositoryError::InvalidResponse(e.to_string()))?;

        rows.into_iter()
            .next()
            .ok_or_else(|| RepositoryError::NotFound(memory_id.to_string()))
    }
}

#[async_trait]
impl ObjectStore for SupabaseClient {
    async fn upload(
        &self,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let response = self
            .authorized(self.client.post(self.object_url("", path)))
            .header("content-type", content_type)
            .header("cache-control", "3600")
            .header("x-upsert", "true")
            .body(data)
            .send()
            .await
            .map_err(|e| StorageError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(StorageError::UploadFailed {
                path: path.to_string(),
                message: format!("HTTP {}: {}", status, text),
            });
        }

        Ok(())
    }

    async fn create_signed_url(&self, path: &str, ttl_secs: u64) -> Result<String, StorageError> {
        let response = self
            .authorized(self.client.post(self.object_url("sign", path)))
            .json(&json!({ "expiresIn": ttl_secs }))
            .send()
            .await
            .map_err(|e| StorageError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(StorageError::SigningFailed {
                path: path.to_string(),
                message: format!("HTTP {}: {}", status, text),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;

        let signed = ["signedURL", "signedUrl", "signed_url", "url"]
            .iter()
            .find_map(|key| body.get(*key).and_then(Value::as_str))
            .filter(|s| !s.is_empty())
            .ok_or_else(|| StorageError::SigningFailed {
                path: path.to_string(),
                message: format!("no signed URL in response: {}", body),
            })?;

        Ok(self.absolute_signed_url(signed))
    }
}

#[async_trait]
impl MemoryRepository for SupabaseClient {
    async fn find(&self, memory_id: &str) -> Result<Option<MemoryRecord>, RepositoryError> {
        let response = self
            .authorized(self.client.get(self.table_url()))
            .query(&[
                ("id", format!("eq.{}", memory_id)),
                ("select", "*".to_string()),
            ])
            .send()
            .await
            .map_err(|e| RepositoryError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RepositoryError::RequestFailed(format!("HTTP {}: {}", status, text)));
        }

        let rows: Vec<MemoryRecord> = response
            .json()
            .await
            .map_err(|e| RepositoryError::InvalidResponse(e.to_string()))?;

        Ok(rows.into_iter().next())
    }

    async fn update_status(
        &self,
        memory_id: &str,
        status: MemoryStatus,
    ) -> Result<MemoryRecord, RepositoryError> {
        self.patch_memory(memory_id, json!({ "status": status.as_str() }))
            .await
    }

    async fn set_model_path(
        &self,
        memory_id: &str,
        storage_path: &str,
    ) -> Result<MemoryRecord, RepositoryError> {
        self.patch_memory(memory_id, json!({ "model_3d_url": storage_path }))
            .await
    }
}
