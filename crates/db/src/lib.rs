pub mod connection;
pub mod facts;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_config, connect_with_settings, DbPool};
pub use facts::DailyStat;
pub use fixtures::{DemoDataset, SeedSummary, VerificationResult};
pub use repositories::{InMemoryWarehouse, RepositoryError, SqlWarehouse, StatsRepository};
