//! Application startup and lifecycle management.

use crate::config::Model3dConfig;
use crate::handlers::{generate_3d, health_check, metrics_endpoint, service_info};
use crate::services::providers::fixture::FixtureModelProvider;
use crate::services::providers::tencent::{TencentAi3dConfig, TencentAi3dProvider};
use crate::services::providers::{ModelProvider, PollSettings};
use crate::services::{GenerationService, GenerationSettings, HttpImageFetcher, SupabaseClient};
use axum::{
    http::{HeaderValue, Method},
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics_middleware, request_id_middleware, security_headers_middleware, REQUEST_ID_HEADER,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{AllowHeaders, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Model3dConfig>,
    pub generation: Arc<GenerationService>,
}

impl AppState {
    pub fn new(config: Model3dConfig, generation: GenerationService) -> Self {
        Self {
            config: Arc::new(config),
            generation: Arc::new(generation),
        }
    }

    /// Wire the production clients described by `config`.
    pub fn from_config(config: Model3dConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("HTTP client: {}", e)))?;

        let supabase = Arc::new(SupabaseClient::new(http.clone(), config.supabase.clone()));

        let tencent: Arc<dyn ModelProvider> = Arc::new(
            TencentAi3dProvider::new(TencentAi3dConfig {
                secret_id: config.tencent.secret_id.clone(),
                secret_key: config.tencent.secret_key.clone(),
                region: config.tencent.region.clone(),
                endpoint: config.tencent.endpoint.clone(),
                poll: PollSettings {
                    interval: config.generation.poll_interval,
                    timeout: config.generation.timeout,
                },
                download_timeout: config.generation.download_timeout,
            })
            .map_err(|e| AppError::ConfigError(anyhow::Error::new(e)))?,
        );

        let provider: Arc<dyn ModelProvider> = if config.environment.is_development() {
            tracing::info!(
                path = %config.generation.dev_stl_path.display(),
                "Development mode: serving fixture STL instead of calling AI3D"
            );
            Arc::new(FixtureModelProvider::new(
                config.generation.dev_stl_path.clone(),
                tencent,
            ))
        } else {
            tencent
        };

        tracing::info!(
            provider = provider.name(),
            region = %config.tencent.region,
            bucket = %config.supabase.bucket,
            "Initialized generation pipeline"
        );

        let generation = GenerationService::new(
            provider,
            supabase.clone(),
            supabase,
            Arc::new(HttpImageFetcher::new(http, config.generation.download_timeout)),
            GenerationSettings {
                bucket: config.supabase.bucket.clone(),
                signed_url_ttl_secs: config.generation.signed_url_ttl_secs,
            },
        );

        Ok(Self::new(config, generation))
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors.allowed_origins);

    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_endpoint))
        .route("/generate-3d", post(generate_3d))
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    pub async fn build(config: Model3dConfig) -> Result<Self, AppError> {
        let port = config.common.port;
        let state = AppState::from_config(config)?;

        // Port 0 picks a random port for tests
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port, "model3d-service listening");

        Ok(Self {
            port,
            listener,
            router: build_router(state),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Service shutdown complete");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
