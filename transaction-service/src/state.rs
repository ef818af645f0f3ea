//! Application state for the transaction service.

use std::sync::Arc;

use common::config::AppConfig;

use crate::connection::Connector;
use crate::mssql::MssqlConnector;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub connector: Arc<dyn Connector>,
}

impl AppState {
    /// Creates state backed by SQL Server.
    pub fn new(config: AppConfig) -> Self {
        let connector = MssqlConnector::new(config.database.clone());
        Self::with_connector(config, Arc::new(connector))
    }

    /// Creates state with an arbitrary connector.
    pub fn with_connector(config: AppConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config: Arc::new(config),
            connector,
        }
    }
}
