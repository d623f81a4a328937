//! Development provider serving a local STL file.

use super::{GenerationParams, ModelProvider, ProviderError};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Returns the bytes of a fixture file without calling any provider.
/// When the file cannot be read the request goes to `fallback`.
pub struct FixtureModelProvider {
    path: PathBuf,
    fallback: Arc<dyn ModelProvider>,
}

impl FixtureModelProvider {
    pub fn new(path: impl Into<PathBuf>, fallback: Arc<dyn ModelProvider>) -> Self {
        Self {
            path: path.into(),
            fallback,
        }
    }
}

#[async_trait]
impl ModelProvider for FixtureModelProvider {
    fn name(&self) -> &'static str {
        "fixture"
    }

    async fn generate_stl(
        &self,
        image_base64: &str,
        params: &GenerationParams,
    ) -> Result<Vec<u8>, ProviderError> {
        match tokio::fs::read(&self.path).await {
            Ok(data) => {
                tracing::info!(
                    path = %self.path.display(),
                    bytes = data.len(),
                    "Development mode: serving fixture STL"
                );
                Ok(data)
            }
            Err(e) => {
                tracing::error!(
                    path = %self.path.display(),
                    error = %e,
                    fallback = self.fallback.name(),
                    "Fixture STL unavailable, falling back"
                );
                self.fallback.generate_stl(image_base64, params).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::mock::MockModelProvider;

    #[tokio::test]
    async fn serves_fixture_without_calling_fallback() {
        let path = std::env::temp_dir().join(format!("fixture-{}.stl", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, b"solid fixture").await.unwrap();

        let fallback = Arc::new(MockModelProvider::succeeding(b"solid remote".to_vec()));
        let provider = FixtureModelProvider::new(&path, fallback.clone());

        let data = provider
            .generate_stl("aGk=", &GenerationParams::default())
            .await
            .unwrap();

        assert_eq!(data, b"solid fixture");
        assert_eq!(fallback.calls(), 0);

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn missing_fixture_uses_fallback() {
        let fallback = Arc::new(MockModelProvider::succeeding(b"solid remote".to_vec()));
        let provider = FixtureModelProvider::new("/nonexistent/fixture.stl", fallback.clone());

        let data = provider
            .generate_stl("aGk=", &GenerationParams::default())
            .await
            .unwrap();

        assert_eq!(data, b"solid remote");
        assert_eq!(fallback.calls(), 1);
    }
}
