//! 3D generation provider abstractions and implementations.
//!
//! `ModelProvider` hides the submit/poll/download cycle of a provider behind a
//! single call so the orchestrator can swap Tencent AI3D for the development
//! fixture or a test mock.

pub mod fixture;
pub mod mock;
pub mod tc3;
pub mod tencent;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: String, message: String },

    #[error("Rate limited")]
    RateLimited,

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Generation job {job_id} failed ({code}): {message}")]
    JobFailed {
        job_id: String,
        code: String,
        message: String,
    },

    #[error("Timed out after {waited:?} waiting for job {job_id} to finish")]
    Timeout { job_id: String, waited: Duration },

    #[error("STL URL not found in result of job {job_id}")]
    NoArtifact { job_id: String },

    #[error("Failed to download artifact: {0}")]
    DownloadFailed(String),
}

/// Output format requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultFormat {
    #[default]
    Stl,
}

impl ResultFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultFormat::Stl => "STL",
        }
    }
}

/// Generation parameters for a provider job.
#[derive(Debug, Clone, Default)]
pub struct GenerationParams {
    /// Physically based rendering materials.
    pub enable_pbr: bool,

    pub result_format: ResultFormat,
}

/// Poll cadence and deadline for a provider job.
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Trait for image-to-3D generation providers (e.g., Tencent AI3D).
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Short name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Generate a model from a base64 image (no data-URL prefix) and return
    /// the artifact bytes.
    async fn generate_stl(
        &self,
        image_base64: &str,
        params: &GenerationParams,
    ) -> Result<Vec<u8>, ProviderError>;
}
