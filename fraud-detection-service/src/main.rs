use fraud_detection_service::{AppConfig, create_app, telemetry::init_tracing};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env();
    let port = config.port;
    info!(
        environment = %config.environment,
        catalog = %config.catalog,
        schema = %config.schema,
        "Starting fraud detection service"
    );

    let app = create_app(config).await;
    let listener = TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    let addr = listener.local_addr()?;

    info!("Fraud detection service listening on {}", addr);
    info!("Health check endpoint: http://{}/health", addr);
    info!("Analysis endpoint: POST http://{}/claims/analyze", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
