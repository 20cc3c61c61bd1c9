//! HTTP service
//!
//! - `GET /health` liveness and model availability
//! - `GET /train` runs the training pipeline
//! - `POST /predict` labels a CSV body with the production model

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::PipelineSettings;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_upload_size: 100 * 1024 * 1024, // 100MB
        }
    }
}

async fn shutdown_signal(start_time: chrono::DateTime<chrono::Utc>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for ctrl+c, shutdown must be forced");
        std::future::pending::<()>().await;
    }
    let stop_time = chrono::Utc::now();
    info!(
        stopped_at = %stop_time.to_rfc3339(),
        uptime_secs = stop_time.signed_duration_since(start_time).num_seconds(),
        "Shutdown signal received, stopping server gracefully"
    );
}

/// Serve until ctrl+c
pub async fn run_server(config: ServerConfig, settings: PipelineSettings) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();
    if !settings.final_model_path().is_file() {
        warn!(
            model = %settings.final_model_path().display(),
            "No production model yet, /predict fails until /train has run"
        );
    }

    let state = Arc::new(AppState::new(settings));
    let app = create_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        address = %addr,
        max_upload_size_mb = config.max_upload_size / 1024 / 1024,
        started_at = %start_time.to_rfc3339(),
        pid = std::process::id(),
        "Server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(start_time))
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tempfile::tempdir;
    use tower::ServiceExt;

    fn test_router(root: &std::path::Path) -> axum::Router {
        let settings = PipelineSettings::default().rooted_at(root);
        create_router(Arc::new(AppState::new(settings)), &ServerConfig::default())
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_upload_size, 100 * 1024 * 1024);
    }

    #[tokio::test]
    async fn test_health_reports_missing_model() {
        let dir = tempdir().unwrap();
        let response = test_router(dir.path())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["model_available"], false);
    }

    #[tokio::test]
    async fn test_predict_without_model_is_unavailable() {
        let dir = tempdir().unwrap();
        let request = Request::builder()
            .method("POST")
            .uri("/predict")
            .body(Body::from("Type,Torque [Nm]\nL,40.0\n"))
            .unwrap();
        let response = test_router(dir.path()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_predict_rejects_empty_body() {
        let dir = tempdir().unwrap();
        let request = Request::builder().method("POST").uri("/predict").body(Body::empty()).unwrap();
        let response = test_router(dir.path()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_route_and_method() {
        let dir = tempdir().unwrap();
        let response = test_router(dir.path())
            .oneshot(Request::builder().uri("/models").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = test_router(dir.path())
            .oneshot(Request::builder().method("POST").uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
