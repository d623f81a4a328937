use super::storage::InMemoryObjectStore;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("Failed to download image from {url}: {message}")]
pub struct FetchError {
    pub url: String,
    pub message: String,
}

/// Fetches the figurine image behind a (signed) URL.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

pub struct HttpImageFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpImageFetcher {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let error = |message: String| FetchError {
            url: redact_query(url),
            message,
        };

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(error(format!("HTTP {}", response.status())));
        }

        let bytes = response.bytes().await.map_err(|e| error(e.to_string()))?;
        if bytes.is_empty() {
            return Err(error("empty body".to_string()));
        }
        Ok(bytes.to_vec())
    }
}

/// Resolves signed URLs issued by `InMemoryObjectStore`.
pub struct InMemoryImageFetcher {
    store: Arc<InMemoryObjectStore>,
}

impl InMemoryImageFetcher {
    pub fn new(store: Arc<InMemoryObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ImageFetcher for InMemoryImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let path = url
            .strip_prefix("memory://signed/")
            .map(|rest| rest.split('?').next().unwrap_or(rest))
            .ok_or_else(|| FetchError {
                url: url.to_string(),
                message: "not an in-memory URL".to_string(),
            })?;

        self.store.download(path).map_err(|e| FetchError {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

/// Signed URLs carry their token in the query; keep it out of logs.
fn redact_query(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{}?<redacted>", base),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::ObjectStore;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn http_fetcher_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let fetcher = HttpImageFetcher::new(Client::new(), Duration::from_secs(5));
        let data = fetcher
            .fetch(&format!("{}/img.png?token=secret", server.uri()))
            .await
            .unwrap();
        assert_eq!(data, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn http_fetcher_rejects_error_status_and_redacts_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpImageFetcher::new(Client::new(), Duration::from_secs(5));
        let err = fetcher
            .fetch(&format!("{}/missing.png?token=secret", server.uri()))
            .await
            .unwrap_err();
        assert!(!err.to_string().contains("secret"));
        assert!(err.message.contains("404"));
    }

    #[tokio::test]
    async fn in_memory_fetcher_reads_signed_object() {
        let store = Arc::new(InMemoryObjectStore::new().with_object("u1/a.png", vec![9u8]));
        let url = store.create_signed_url("u1/a.png", 60).await.unwrap();
        let fetcher = InMemoryImageFetcher::new(store);
        assert_eq!(fetcher.fetch(&url).await.unwrap(), vec![9u8]);
    }
}
