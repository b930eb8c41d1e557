use async_trait::async_trait;
use thiserror::Error;

use pubscope_core::domain::MembershipGroup;
use pubscope_core::ports::{AdapterError, Collaborator};

use crate::facts::DailyStat;

pub mod memory;
pub mod warehouse;

pub use memory::InMemoryWarehouse;
pub use warehouse::SqlWarehouse;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("encode error: {0}")]
    Encode(String),
    #[error("unsupported query: {0}")]
    Unsupported(String),
}

impl RepositoryError {
    pub fn into_adapter(self, collaborator: Collaborator) -> AdapterError {
        AdapterError::new(collaborator, self.to_string())
    }
}

/// Write side of the warehouse, used by seeding and tests.
#[async_trait]
pub trait StatsRepository: Send + Sync {
    /// Upserts facts keyed by date, zone, and product.
    async fn record(&self, stats: &[DailyStat]) -> Result<(), RepositoryError>;

    /// Replaces a group and its member list.
    async fn save_group(&self, group: &MembershipGroup) -> Result<(), RepositoryError>;
}
