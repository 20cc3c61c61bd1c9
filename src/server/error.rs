//! Error types for the server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::MaintenanceError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Pipeline(#[from] MaintenanceError),
}

impl ServerError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ServerError::Internal(msg) => {
                tracing::error!(detail = %msg, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "An internal error occurred".to_string())
            }
            ServerError::Pipeline(err) => match err {
                MaintenanceError::DataError(_)
                | MaintenanceError::SchemaError(_)
                | MaintenanceError::TransformationError(_)
                | MaintenanceError::FeatureNotFound(_)
                | MaintenanceError::ShapeError { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
                MaintenanceError::ConfigError(_) => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
                _ => {
                    tracing::error!(detail = %err, "Pipeline error");
                    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
                }
            },
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        let body = Json(json!({
            "error": true,
            "message": message,
        }));
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
