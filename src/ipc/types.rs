use crate::config::EngineConfig;
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Only the engine configuration lives here; course data arrives with every
/// request and is never kept.
pub struct AppState {
    pub config: EngineConfig,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            started_at: Utc::now(),
        }
    }
}
