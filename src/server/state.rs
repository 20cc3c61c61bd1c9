//! Application state management

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::PipelineSettings;

/// Application state shared across handlers
pub struct AppState {
    pub settings: PipelineSettings,
    /// Held while a training run is in progress, by the blocking task itself
    pub training: Arc<Mutex<()>>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(settings: PipelineSettings) -> Self {
        Self {
            settings,
            training: Arc::new(Mutex::new(())),
            started_at: chrono::Utc::now(),
        }
    }
}
