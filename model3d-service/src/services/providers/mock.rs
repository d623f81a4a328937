//! In-process provider for tests.

use super::{GenerationParams, ModelProvider, ProviderError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Behavior {
    Succeed(Vec<u8>),
    /// Returns the submitted image bytes, so concurrent requests get distinct artifacts.
    Echo,
    Fail { code: String, message: String },
    Timeout,
}

/// Scripted `ModelProvider` that counts its calls.
#[derive(Debug)]
pub struct MockModelProvider {
    behavior: Behavior,
    delay: Duration,
    calls: AtomicUsize,
}

impl MockModelProvider {
    fn with(behavior: Behavior) -> Self {
        Self {
            behavior,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn succeeding(data: Vec<u8>) -> Self {
        Self::with(Behavior::Succeed(data))
    }

    pub fn echoing() -> Self {
        Self::with(Behavior::Echo)
    }

    pub fn failing(code: &str, message: &str) -> Self {
        Self::with(Behavior::Fail {
            code: code.to_string(),
            message: message.to_string(),
        })
    }

    pub fn timing_out() -> Self {
        Self::with(Behavior::Timeout)
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelProvider for MockModelProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn generate_stl(
        &self,
        image_base64: &str,
        _params: &GenerationParams,
    ) -> Result<Vec<u8>, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let job_id = format!("mock-job-{}", call);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.behavior {
            Behavior::Succeed(data) => Ok(data.clone()),
            Behavior::Echo => {
                use base64::Engine;
                base64::engine::general_purpose::STANDARD
                    .decode(image_base64)
                    .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
            }
            Behavior::Fail { code, message } => Err(ProviderError::JobFailed {
                job_id,
                code: code.clone(),
                message: message.clone(),
            }),
            Behavior::Timeout => Err(ProviderError::Timeout {
                job_id,
                waited: Duration::from_secs(300),
            }),
        }
    }
}
