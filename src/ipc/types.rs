use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::tabs::title::TitleTracker;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    /// Single-section title snapshots; reset whenever another workspace is selected.
    pub titles: TitleTracker,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            workspace: None,
            db: None,
            titles: TitleTracker::new(),
        }
    }
}
