//! HTTP request handlers

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::header,
    response::{IntoResponse, Redirect},
    Json,
};
use serde_json::json;
use tracing::info;

use super::error::{Result, ServerError};
use super::state::AppState;
use crate::inference::PredictionPipeline;
use crate::pipeline::TrainingPipeline;

pub async fn index() -> Redirect {
    Redirect::temporary("/health")
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let uptime = chrono::Utc::now().signed_duration_since(state.started_at);
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": uptime.num_seconds(),
        "model_available": state.settings.final_model_path().is_file(),
    }))
}

/// Run the whole training pipeline; one run at a time
pub async fn train(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>> {
    let guard = state
        .training
        .clone()
        .try_lock_owned()
        .map_err(|_| ServerError::Conflict("a training run is already in progress".to_string()))?;

    // The guard lives as long as the run, even if the client goes away
    let settings = state.settings.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let _guard = guard;
        TrainingPipeline::new(settings).run_pipeline()
    })
    .await
    .map_err(|e| ServerError::Internal(e.to_string()))??;

    info!(run = %outcome.run.timestamp, model = %outcome.training.best_model_name, "Training run finished");
    Ok(Json(json!({
        "message": "Training is successful",
        "run": outcome.run.timestamp,
        "best_model": outcome.training.best_model_name,
        "best_model_score": outcome.training.best_model_score,
        "validation_status": outcome.validation.validation_status,
        "train_metrics": outcome.training.train_metric_artifact,
        "test_metrics": outcome.training.test_metric_artifact,
    })))
}

/// Label a CSV of machine readings; responds with the CSV plus `predicted_column`
pub async fn predict(State(state): State<Arc<AppState>>, body: Bytes) -> Result<impl IntoResponse> {
    if body.is_empty() {
        return Err(ServerError::BadRequest("expected a CSV request body".to_string()));
    }
    let settings = state.settings.clone();
    let csv = tokio::task::spawn_blocking(move || {
        PredictionPipeline::from_settings(&settings)?.predict_csv_bytes(&body)
    })
    .await
    .map_err(|e| ServerError::Internal(e.to_string()))??;

    Ok(([(header::CONTENT_TYPE, "text/csv")], csv))
}
