//! Image-to-STL generation pipeline.
//!
//! One request runs to completion inside the call: load the memory, fetch its
//! figurine image, generate the model, store it, and record the result on the
//! memory row.

use super::memories::{MemoryRepository, RepositoryError};
use super::providers::{GenerationParams, ModelProvider, ProviderError};
use super::source_image::ImageFetcher;
use super::storage::{model_object_path, object_path_from_url, ObjectStore, StorageError, STL_CONTENT_TYPE};
use crate::models::{GenerateRequest, GenerateResponse, MemoryRecord, MemoryStatus};
use base64::Engine;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use uuid::Uuid;
use validator::ValidationErrors;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Memory {0} not found")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Failed to create signed URL for image: {0}")]
    SourceSigning(String),

    #[error("Failed to download image from URL: {0}")]
    SourceImage(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl GenerationError {
    /// Label for the `outcome` metric dimension.
    fn outcome(&self) -> &'static str {
        match self {
            GenerationError::Validation(_) => "validation_error",
            GenerationError::NotFound(_) => "not_found",
            GenerationError::BadRequest(_) => "bad_request",
            GenerationError::SourceSigning(_) => "source_signing_error",
            GenerationError::SourceImage(_) => "source_image_error",
            GenerationError::Provider(ProviderError::Timeout { .. }) => "provider_timeout",
            GenerationError::Provider(_) => "provider_error",
            GenerationError::Storage(_) => "storage_error",
            GenerationError::Repository(_) => "repository_error",
        }
    }
}

impl From<GenerationError> for AppError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Validation(e) => AppError::ValidationError(e),
            GenerationError::NotFound(id) => {
                AppError::NotFound(anyhow::anyhow!("Memory {} not found", id))
            }
            GenerationError::BadRequest(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            GenerationError::SourceSigning(_) => {
                AppError::InternalError(anyhow::anyhow!("Failed to create signed URL for image"))
            }
            GenerationError::SourceImage(_) => {
                AppError::BadRequest(anyhow::anyhow!("Failed to download image from URL"))
            }
            GenerationError::Provider(e @ ProviderError::Timeout { .. }) => {
                AppError::GatewayTimeout(e.to_string())
            }
            GenerationError::Provider(e) => AppError::ProviderError(e.to_string()),
            GenerationError::Storage(e) => AppError::StorageError(e.to_string()),
            GenerationError::Repository(e) => AppError::InternalError(anyhow::Error::new(e)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub bucket: String,
    pub signed_url_ttl_secs: u64,
}

pub struct GenerationService {
    provider: Arc<dyn ModelProvider>,
    store: Arc<dyn ObjectStore>,
    memories: Arc<dyn MemoryRepository>,
    images: Arc<dyn ImageFetcher>,
    settings: GenerationSettings,
}

impl GenerationService {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        store: Arc<dyn ObjectStore>,
        memories: Arc<dyn MemoryRepository>,
        images: Arc<dyn ImageFetcher>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            provider,
            store,
            memories,
            images,
            settings,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Run the whole pipeline for one request.
    pub async fn generate(
        &self,
        request: GenerateRequest,
    ) -> Result<GenerateResponse, GenerationError> {
        let request = request.normalized();
        if let Err(errors) = request.validate_all() {
            metrics::counter!("generation_requests_total", "outcome" => "validation_error")
                .increment(1);
            return Err(errors.into());
        }

        let start = Instant::now();
        tracing::info!(
            memory_id = %request.memory_id,
            user_id = request.user_id.as_deref().unwrap_or("-"),
            enable_pbr = request.enable_pbr,
            provider = self.provider.name(),
            "Generation started"
        );

        let result = self.run(&request).await;

        metrics::histogram!("generation_duration_seconds")
            .record(start.elapsed().as_secs_f64());

        match &result {
            Ok(response) => {
                metrics::counter!("generation_requests_total", "outcome" => "success")
                    .increment(1);
                tracing::info!(
                    memory_id = %request.memory_id,
                    storage_path = %response.stl_storage_path,
                    duration_ms = start.elapsed().as_millis(),
                    "Generation succeeded"
                );
            }
            Err(e) => {
                metrics::counter!("generation_requests_total", "outcome" => e.outcome())
                    .increment(1);
                tracing::error!(
                    memory_id = %request.memory_id,
                    error = %e,
                    duration_ms = start.elapsed().as_millis(),
                    "Generation failed"
                );
                if !matches!(e, GenerationError::NotFound(_)) {
                    self.mark(&request.memory_id, MemoryStatus::Failed).await;
                }
            }
        }

        result
    }

    async fn run(&self, request: &GenerateRequest) -> Result<GenerateResponse, GenerationError> {
        let memory_id = request.memory_id.as_str();

        self.mark(memory_id, MemoryStatus::Processing3d).await;

        let memory = self
            .memories
            .find(memory_id)
            .await?
            .ok_or_else(|| GenerationError::NotFound(memory_id.to_string()))?;

        let image = self.load_source_image(&memory).await?;
        let image_base64 = base64::engine::general_purpose::STANDARD.encode(&image);

        let params = GenerationParams {
            enable_pbr: request.enable_pbr,
            ..Default::default()
        };
        let stl = self.provider.generate_stl(&image_base64, &params).await?;
        if stl.is_empty() {
            return Err(ProviderError::DownloadFailed("artifact is empty".to_string()).into());
        }

        let filename = stl_filename(memory_id, Utc::now());
        let storage_path = model_object_path(request.user_id.as_deref(), &filename);

        tracing::debug!(
            memory_id = %memory_id,
            storage_path = %storage_path,
            bytes = stl.len(),
            "Uploading STL"
        );

        self.store
            .upload(&storage_path, stl, STL_CONTENT_TYPE)
            .await?;

        let stl_url = self
            .store
            .create_signed_url(&storage_path, self.settings.signed_url_ttl_secs)
            .await?;

        let updated_memory = self.record_result(memory_id, &storage_path).await;

        Ok(GenerateResponse {
            status: "success".to_string(),
            message: "3D model generated successfully".to_string(),
            stl_url,
            stl_storage_path: storage_path,
            filename,
            updated_memory,
        })
    }

    async fn load_source_image(&self, memory: &MemoryRecord) -> Result<Vec<u8>, GenerationError> {
        let figurine_url = memory
            .figurine_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                GenerationError::BadRequest("Memory has no figurine image".to_string())
            })?;

        let object_path = object_path_from_url(figurine_url, &self.settings.bucket)
            .ok_or_else(|| GenerationError::BadRequest("Invalid figurine URL".to_string()))?;

        let signed_url = self
            .store
            .create_signed_url(&object_path, self.settings.signed_url_ttl_secs)
            .await
            .map_err(|e| GenerationError::SourceSigning(e.to_string()))?;

        self.images
            .fetch(&signed_url)
            .await
            .map_err(|e| GenerationError::SourceImage(e.to_string()))
    }

    /// Model path and final status are best effort once the STL is stored.
    async fn record_result(&self, memory_id: &str, storage_path: &str) -> Option<MemoryRecord> {
        let with_path = match self.memories.set_model_path(memory_id, storage_path).await {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(
                    memory_id = %memory_id,
                    error = %e,
                    "Failed to store model path on memory"
                );
                None
            }
        };

        match self
            .memories
            .update_status(memory_id, MemoryStatus::Completed)
            .await
        {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(memory_id = %memory_id, error = %e, "Failed to mark memory completed");
                with_path
            }
        }
    }

    async fn mark(&self, memory_id: &str, status: MemoryStatus) {
        if let Err(e) = self.memories.update_status(memory_id, status).await {
            tracing::warn!(
                memory_id = %memory_id,
                status = %status,
                error = %e,
                "Failed to update memory status"
            );
        }
    }
}

/// `{memory_id}_{YYYYmmdd_HHMMSS}_{8 hex}.stl`
pub fn stl_filename(memory_id: &str, now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}.stl",
        memory_id,
        now.format("%Y%m%d_%H%M%S"),
        &suffix[..8]
    )
}
