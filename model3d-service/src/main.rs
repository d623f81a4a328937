use model3d_service::config::Model3dConfig;
use model3d_service::startup::Application;
use service_core::observability::{init_metrics, init_tracing};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Tracing needs the OTLP endpoint, so configuration errors go to stderr.
    let config = Model3dConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    init_tracing("model3d-service", "info", config.otlp_endpoint.as_deref());
    init_metrics()?;

    tracing::info!(
        environment = ?config.environment,
        port = config.common.port,
        otlp = config.otlp_endpoint.is_some(),
        "Starting model3d-service"
    );

    let application = Application::build(config).await?;
    application.run_until_stopped().await?;

    Ok(())
}
