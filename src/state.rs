use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::services::gateway::PayuGateway;
use crate::services::notification::EmailProvider;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub gateway: PayuGateway,
    pub email: Box<dyn EmailProvider>,
}

impl AppState {
    pub fn new(conn: Connection, config: AppConfig, email: Box<dyn EmailProvider>) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            gateway: PayuGateway::new(config.gateway.clone()),
            config,
            email,
        }
    }

    /// Locks the store. Never hold the guard across an `.await`.
    pub fn db(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.db
            .lock()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("database lock poisoned")))
    }
}
