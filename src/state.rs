use crate::{config::Config, services::file_storage::FileStorage, websocket::ConnectionRegistry};
use sqlx::{Pool, Postgres};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Postgres>,
    pub registry: ConnectionRegistry,
    pub redis: redis::Client,
    pub config: Arc<Config>,
    pub storage: Option<Arc<FileStorage>>,
}
