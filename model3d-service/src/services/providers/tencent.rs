//! Tencent Cloud AI3D (Hunyuan To3D) provider.
//!
//! Submits an image job, polls `QueryHunyuanTo3DJob` until the job reaches a
//! terminal state or the deadline passes, then downloads the STL file.

use super::tc3::{self, SigningRequest};
use super::{GenerationParams, ModelProvider, PollSettings, ProviderError};
use crate::models::{GenerationJob, JobStatus, ResultFile};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, Secret};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{sleep, Instant};

const API_VERSION: &str = "2025-05-13";
const SERVICE: &str = "ai3d";
const SUBMIT_ACTION: &str = "SubmitHunyuanTo3DJob";
const QUERY_ACTION: &str = "QueryHunyuanTo3DJob";

/// Tencent AI3D provider configuration.
#[derive(Debug, Clone)]
pub struct TencentAi3dConfig {
    pub secret_id: Secret<String>,
    pub secret_key: Secret<String>,
    pub region: String,
    /// Host name, or a full base URL when a scheme is included.
    pub endpoint: String,
    pub poll: PollSettings,
    pub download_timeout: Duration,
}

/// Tencent AI3D provider.
pub struct TencentAi3dProvider {
    config: TencentAi3dConfig,
    client: Client,
    base_url: Url,
    host: String,
}

impl TencentAi3dProvider {
    pub fn new(config: TencentAi3dConfig) -> Result<Self, ProviderError> {
        let base = if config.endpoint.contains("://") {
            config.endpoint.clone()
        } else {
            format!("https://{}", config.endpoint)
        };
        let base_url = Url::parse(&base).map_err(|e| {
            ProviderError::NotConfigured(format!("Invalid AI3D endpoint '{}': {}", base, e))
        })?;
        let host = match (base_url.host_str(), base_url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(ProviderError::NotConfigured(format!(
                    "AI3D endpoint '{}' has no host",
                    base
                )))
            }
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            base_url,
            host,
        })
    }

    /// Send a signed API action and unwrap the `Response` envelope.
    async fn call<Req, Resp>(&self, action: &str, body: &Req) -> Result<Resp, ProviderError>
    where
        Req: Serialize,
        Resp: DeserializeOwned + ApiResponse,
    {
        let payload = serde_json::to_string(body)
            .map_err(|e| ProviderError::InvalidResponse(format!("Encode {}: {}", action, e)))?;
        let timestamp = Utc::now().timestamp();

        let authorization = tc3::authorization(
            self.config.secret_id.expose_secret(),
            self.config.secret_key.expose_secret(),
            &SigningRequest {
                service: SERVICE,
                host: &self.host,
                action,
                payload: &payload,
                timestamp,
            },
        )
        .map_err(|e| ProviderError::NotConfigured(format!("Request signing failed: {}", e)))?;

        let response = self
            .client
            .post(self.base_url.clone())
            .header(AUTHORIZATION, authorization)
            .header(CONTENT_TYPE, tc3::CONTENT_TYPE)
            .header("X-TC-Action", action)
            .header("X-TC-Timestamp", timestamp.to_string())
            .header("X-TC-Version", API_VERSION)
            .header("X-TC-Region", &self.config.region)
            .body(payload)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited);
            }

            return Err(ProviderError::ApiError {
                code: status.as_u16().to_string(),
                message: error_text,
            });
        }

        let envelope: Envelope<Resp> = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse {} response: {}", action, e))
        })?;

        let mut inner = envelope.response;
        if let Some(error) = inner.take_error() {
            if error.code.starts_with("RequestLimitExceeded") {
                return Err(ProviderError::RateLimited);
            }
            return Err(ProviderError::ApiError {
                code: error.code,
                message: error.message,
            });
        }

        Ok(inner)
    }

    /// Submit an image-to-3D job and return its id.
    pub async fn submit_job(
        &self,
        image_base64: &str,
        params: &GenerationParams,
    ) -> Result<String, ProviderError> {
        let request = SubmitJobRequest {
            image_base64,
            result_format: params.result_format.as_str(),
            enable_pbr: params.enable_pbr,
        };

        let response: SubmitJobResponse = self.call(SUBMIT_ACTION, &request).await?;

        response.job_id.filter(|id| !id.is_empty()).ok_or_else(|| {
            ProviderError::InvalidResponse(format!(
                "{} returned no JobId (request {})",
                SUBMIT_ACTION,
                response.request_id.as_deref().unwrap_or("-")
            ))
        })
    }

    /// Fetch the current state of a job.
    pub async fn query_job(&self, job_id: &str) -> Result<GenerationJob, ProviderError> {
        let response: QueryJobResponse =
            self.call(QUERY_ACTION, &QueryJobRequest { job_id }).await?;

        let status = response
            .status
            .as_deref()
            .map(job_status)
            .unwrap_or(JobStatus::Pending);

        Ok(GenerationJob {
            job_id: job_id.to_string(),
            status,
            error_code: response.error_code,
            error_message: response.error_message,
            files: response
                .result_file_3ds
                .unwrap_or_default()
                .into_iter()
                .map(|f| ResultFile {
                    file_type: f.file_type,
                    url: f.url,
                })
                .collect(),
        })
    }

    /// Poll until the job succeeds, fails, or the deadline passes.
    pub async fn wait_for_completion(&self, job_id: &str) -> Result<GenerationJob, ProviderError> {
        let started = Instant::now();
        let deadline = started + self.config.poll.timeout;

        loop {
            if Instant::now() > deadline {
                return Err(ProviderError::Timeout {
                    job_id: job_id.to_string(),
                    waited: started.elapsed(),
                });
            }

            let job = self.query_job(job_id).await?;

            tracing::debug!(job_id = %job_id, status = ?job.status, "Polled AI3D job");

            match job.status {
                JobStatus::Succeeded => return Ok(job),
                JobStatus::Failed => {
                    return Err(ProviderError::JobFailed {
                        job_id: job_id.to_string(),
                        code: job.error_code.unwrap_or_else(|| "unknown".to_string()),
                        message: job.error_message.unwrap_or_default(),
                    })
                }
                JobStatus::Pending | JobStatus::Running => {}
            }

            sleep(self.config.poll.interval).await;
        }
    }

    /// Download a finished artifact.
    pub async fn download_artifact(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        let response = self
            .client
            .get(url)
            .timeout(self.config.download_timeout)
            .send()
            .await
            .map_err(|e| ProviderError::DownloadFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::DownloadFailed(format!(
                "HTTP {} from artifact URL",
                response.status()
            )));
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| ProviderError::DownloadFailed(e.to_string()))
    }
}

#[async_trait]
impl ModelProvider for TencentAi3dProvider {
    fn name(&self) -> &'static str {
        "tencent-ai3d"
    }

    async fn generate_stl(
        &self,
        image_base64: &str,
        params: &GenerationParams,
    ) -> Result<Vec<u8>, ProviderError> {
        let job_id = self.submit_job(image_base64, params).await?;

        tracing::info!(
            job_id = %job_id,
            region = %self.config.region,
            enable_pbr = params.enable_pbr,
            "Submitted AI3D job"
        );

        let job = self.wait_for_completion(&job_id).await?;

        let url = job
            .artifact_url()
            .ok_or_else(|| ProviderError::NoArtifact {
                job_id: job_id.clone(),
            })?
            .to_string();

        let data = self.download_artifact(&url).await?;

        tracing::info!(job_id = %job_id, bytes = data.len(), "Downloaded AI3D artifact");

        Ok(data)
    }
}

/// Map Tencent job states onto `JobStatus`.
fn job_status(status: &str) -> JobStatus {
    match status.to_ascii_uppercase().as_str() {
        "WAIT" => JobStatus::Pending,
        "RUN" => JobStatus::Running,
        "DONE" => JobStatus::Succeeded,
        "FAIL" => JobStatus::Failed,
        other => {
            tracing::warn!(status = %other, "Unknown AI3D job status, treating as running");
            JobStatus::Running
        }
    }
}

// ============================================================================
// Tencent Cloud API Request/Response Types
// ============================================================================

trait ApiResponse {
    fn take_error(&mut self) -> Option<ApiErrorBody>;
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(rename = "Response")]
    response: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiErrorBody {
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SubmitJobRequest<'a> {
    image_base64: &'a str,
    result_format: &'static str,
    #[serde(rename = "EnablePBR")]
    enable_pbr: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SubmitJobResponse {
    #[serde(default)]
    error: Option<ApiErrorBody>,
    #[serde(default)]
    job_id: Option<String>,
    #[serde(default)]
    request_id: Option<String>,
}

impl ApiResponse for SubmitJobResponse {
    fn take_error(&mut self) -> Option<ApiErrorBody> {
        self.error.take()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct QueryJobRequest<'a> {
    job_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueryJobResponse {
    #[serde(default)]
    error: Option<ApiErrorBody>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(rename = "ResultFile3Ds", default)]
    result_file_3ds: Option<Vec<File3d>>,
}

impl ApiResponse for QueryJobResponse {
    fn take_error(&mut self) -> Option<ApiErrorBody> {
        self.error.take()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct File3d {
    #[serde(rename = "Type", default)]
    file_type: Option<String>,
    #[serde(default)]
    url: Option<String>,
}
