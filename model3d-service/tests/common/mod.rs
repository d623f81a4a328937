#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use model3d_service::config::{
    allowed_origins, CorsConfig, GenerationConfig, Model3dConfig, SupabaseConfig, TencentConfig,
};
use model3d_service::models::MemoryRecord;
use model3d_service::services::providers::mock::MockModelProvider;
use model3d_service::services::{
    GenerationService, GenerationSettings, InMemoryImageFetcher, InMemoryMemoryRepository,
    InMemoryObjectStore,
};
use model3d_service::startup::{build_router, AppState};
use secrecy::Secret;
use serde_json::Value;
use service_core::config::{Config as CoreConfig, Environment};
use std::sync::Arc;
use tower::ServiceExt;

pub const TEST_BUCKET: &str = "memory-photos";
pub const TEST_USER_ID: &str = "user_123";
pub const TEST_MEMORY_ID: &str = "memory_abc";

const MULTIPART_BOUNDARY: &str = "model3d-test-boundary";

pub fn test_config() -> Model3dConfig {
    Model3dConfig {
        common: CoreConfig { port: 0 },
        environment: Environment::Test,
        supabase: SupabaseConfig {
            url: "http://127.0.0.1:54321".to_string(),
            anon_key: Secret::new("test-anon-key".to_string()),
            service_key: Secret::new("test-service-key".to_string()),
            bucket: TEST_BUCKET.to_string(),
        },
        tencent: TencentConfig {
            secret_id: Secret::new("AKIDTEST".to_string()),
            secret_key: Secret::new("test-secret".to_string()),
            region: "ap-singapore".to_string(),
            endpoint: "ai3d.tencentcloudapi.com".to_string(),
        },
        generation: GenerationConfig::default(),
        cors: CorsConfig {
            allowed_origins: allowed_origins("http://localhost:3000"),
        },
        otlp_endpoint: None,
    }
}

/// Figurine location in the same shape the frontend stores it.
pub fn figurine_url(user_id: &str, memory_id: &str) -> String {
    format!(
        "https://project.supabase.co/storage/v1/object/public/{}/{}/figurines/{}.png",
        TEST_BUCKET, user_id, memory_id
    )
}

pub struct TestApp {
    pub router: Router,
    pub provider: Arc<MockModelProvider>,
    pub store: Arc<InMemoryObjectStore>,
    pub memories: Arc<InMemoryMemoryRepository>,
}

impl TestApp {
    /// Router wired to in-memory storage and the given provider, with one
    /// seeded memory (`TEST_MEMORY_ID` owned by `TEST_USER_ID`).
    pub fn new(provider: MockModelProvider) -> Self {
        let provider = Arc::new(provider);
        let store = Arc::new(InMemoryObjectStore::new());
        let memories = Arc::new(InMemoryMemoryRepository::new());

        let generation = GenerationService::new(
            provider.clone(),
            store.clone(),
            memories.clone(),
            Arc::new(InMemoryImageFetcher::new(store.clone())),
            GenerationSettings {
                bucket: TEST_BUCKET.to_string(),
                signed_url_ttl_secs: 3600,
            },
        );

        let app = TestApp {
            router: build_router(AppState::new(test_config(), generation)),
            provider,
            store,
            memories,
        };
        app.seed_memory(TEST_MEMORY_ID, TEST_USER_ID, b"figurine-image".to_vec());
        app
    }

    /// Add a memory whose figurine image is stored in the bucket.
    pub fn seed_memory(&self, memory_id: &str, user_id: &str, image: Vec<u8>) {
        self.store.insert(
            &format!("{}/figurines/{}.png", user_id, memory_id),
            image,
        );
        self.memories.insert(MemoryRecord {
            id: memory_id.to_string(),
            user_id: Some(user_id.to_string()),
            figurine_url: Some(figurine_url(user_id, memory_id)),
            status: None,
            model_3d_url: None,
        });
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        send(self.router.clone(), request).await
    }

    pub async fn post_form(&self, body: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri("/generate-3d")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri("/generate-3d")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn post_multipart(&self, fields: &[(&str, &str)]) -> (StatusCode, Value) {
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                MULTIPART_BOUNDARY, name, value
            ));
        }
        body.push_str(&format!("--{}--\r\n", MULTIPART_BOUNDARY));

        self.send(
            Request::builder()
                .method("POST")
                .uri("/generate-3d")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }
}

pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}
