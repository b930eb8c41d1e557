use std::time::Duration;

use pubscope_core::config::{AppConfig, ConfigError, LoadOptions};
use pubscope_core::pipeline::ComparisonEngine;
use pubscope_db::{connect_with_config, migrations, DbPool, SqlWarehouse};
use thiserror::Error;
use tracing::info;

use crate::api::{ApiState, WarehouseEngine};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub engine: WarehouseEngine,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

impl Application {
    pub fn api_state(self) -> (AppConfig, DbPool, ApiState) {
        let timeout = Duration::from_secs(self.config.server.request_timeout_secs);
        (self.config, self.db_pool, ApiState::new(self.engine, timeout))
    }
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let warehouse = SqlWarehouse::new(db_pool.clone());
    let engine = ComparisonEngine::new(
        warehouse.clone(),
        warehouse.clone(),
        warehouse,
        config.engine.settings(),
    );

    Ok(Application { config, db_pool, engine })
}
