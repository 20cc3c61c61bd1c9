mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use predictive_maintenance::config::constants::PREDICTION_COLUMN;
use predictive_maintenance::pipeline::TrainingPipeline;
use predictive_maintenance::server::{create_router, AppState, ServerConfig};
use predictive_maintenance::utils::{DataLoader, DataSaver};
use tempfile::TempDir;
use tower::ServiceExt;

use common::{machine_readings, quick_registry, seeded_settings};

#[tokio::test]
async fn test_predict_returns_labelled_csv() {
    let dir = TempDir::new().unwrap();
    let settings = seeded_settings(dir.path(), 400);
    TrainingPipeline::new(settings.clone())
        .with_registry(quick_registry())
        .run_pipeline()
        .unwrap();

    let mut batch = machine_readings(10, 3);
    let csv = DataSaver::to_csv_bytes(&mut batch).unwrap();

    let app = create_router(Arc::new(AppState::new(settings.clone())), &ServerConfig::default());
    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header(header::CONTENT_TYPE, "text/csv")
        .body(Body::from(csv))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let labelled = DataLoader::new().load_csv_bytes(&body).unwrap();
    assert_eq!(labelled.height(), 10);
    assert!(labelled.get_column_names_str().contains(&PREDICTION_COLUMN));

    // The service also keeps a copy of the last prediction
    assert!(settings.prediction_output_dir.join("output.csv").is_file());
}

#[tokio::test]
async fn test_health_sees_trained_model() {
    let dir = TempDir::new().unwrap();
    let settings = seeded_settings(dir.path(), 300);
    TrainingPipeline::new(settings.clone())
        .with_registry(quick_registry())
        .run_pipeline()
        .unwrap();

    let app = create_router(Arc::new(AppState::new(settings)), &ServerConfig::default());
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["model_available"], true);
}

#[tokio::test]
async fn test_train_rejected_while_running() {
    let dir = TempDir::new().unwrap();
    let settings = seeded_settings(dir.path(), 50);
    let state = Arc::new(AppState::new(settings));
    let _running = state.training.lock().await;

    let app = create_router(state.clone(), &ServerConfig::default());
    let response = app
        .oneshot(Request::builder().uri("/train").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_train_lock_outlives_dropped_request() {
    let dir = TempDir::new().unwrap();
    let settings = seeded_settings(dir.path(), 400);
    let state = Arc::new(AppState::new(settings));
    let app = create_router(state.clone(), &ServerConfig::default());

    // Drive the first request until its run holds the lock, then hang up
    {
        let first = app
            .clone()
            .oneshot(Request::builder().uri("/train").body(Body::empty()).unwrap());
        tokio::pin!(first);
        while state.training.try_lock().is_ok() {
            tokio::select! {
                biased;
                _ = &mut first => panic!("training finished before the client hung up"),
                _ = tokio::task::yield_now() => {}
            }
        }
    }

    let response = app
        .oneshot(Request::builder().uri("/train").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // The detached run still finishes and releases the lock
    drop(state.training.lock().await);
}

#[tokio::test]
async fn test_train_reports_stage_failure() {
    let dir = TempDir::new().unwrap();
    let settings = predictive_maintenance::config::PipelineSettings::default()
        .rooted_at(dir.path())
        .with_schema_path(common::schema_path())
        .with_document_store_root(dir.path().join("empty-store"));

    let app = create_router(Arc::new(AppState::new(settings)), &ServerConfig::default());
    let response = app
        .oneshot(Request::builder().uri("/train").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], true);
    assert!(json["message"].as_str().unwrap().contains("data_ingestion"));
}

#[tokio::test]
async fn test_index_redirects_to_health() {
    let dir = TempDir::new().unwrap();
    let settings = seeded_settings(dir.path(), 10);
    let app = create_router(Arc::new(AppState::new(settings)), &ServerConfig::default());
    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()[header::LOCATION], "/health");
}
