use axum::{response::IntoResponse, Json};
use serde_json::json;

const SERVICE_NAME: &str = "model3d-service";

/// Liveness only; dependencies are not checked.
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

pub async fn service_info() -> impl IntoResponse {
    Json(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Generates STL models from memory figurine images",
        "endpoints": {
            "generate": "POST /generate-3d",
            "health": "GET /health",
            "metrics": "GET /metrics",
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
