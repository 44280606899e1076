use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::actor::ActorParams;
use crate::config::Config;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    /// Caller identity; absent for health checks, invites and public links.
    #[serde(default)]
    pub actor: Option<ActorParams>,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            workspace: None,
            db: None,
            config,
        }
    }
}
