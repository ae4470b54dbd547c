pub mod database;
pub mod error;
pub mod models;
pub mod services;
pub mod web;

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::SqlitePool;

use crate::services::fanout::ChatRegistry;

/// Shared handler state: the database pool plus the process-wide live-update
/// registry. The registry is constructed once at startup and torn down with
/// the process.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub registry: Arc<ChatRegistry>,
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> SqlitePool {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Arc<ChatRegistry> {
    fn from_ref(state: &AppState) -> Arc<ChatRegistry> {
        state.registry.clone()
    }
}
