//! Collaborator interfaces the engine consumes.
//!
//! The engine never talks to the warehouse directly. Implementations live in
//! the storage crate (SQLite) or in tests.

use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{AggregateRow, DateRange, Filters, MembershipGroup, MonthlyRevenue, Perspective};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Collaborator {
    Aggregation,
    Membership,
    History,
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Aggregation => "aggregation",
            Self::Membership => "membership",
            Self::History => "history",
        })
    }
}

/// A collaborator could not produce data (transport, query, or decode failure).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{collaborator} adapter failure: {message}")]
pub struct AdapterError {
    pub collaborator: Collaborator,
    pub message: String,
}

impl AdapterError {
    pub fn new(collaborator: Collaborator, message: impl Into<String>) -> Self {
        Self { collaborator, message: message.into() }
    }
}

/// Returns one row per distinct entity id with zero-filled counters for
/// entities that only appear in one of the two periods.
#[async_trait]
pub trait AggregationAdapter: Send + Sync {
    async fn fetch(
        &self,
        perspective: Perspective,
        filters: &Filters,
        period1: &DateRange,
        period2: &DateRange,
    ) -> Result<Vec<AggregateRow>, AdapterError>;
}

#[async_trait]
pub trait MembershipAdapter: Send + Sync {
    async fn list_groups(&self) -> Result<Vec<MembershipGroup>, AdapterError>;
}

/// Monthly revenue sums for one entity over the `months` calendar months
/// ending with the month of `ending_at`. Months without data are omitted.
#[async_trait]
pub trait MonthlyHistoryAdapter: Send + Sync {
    async fn monthly_revenue(
        &self,
        perspective: Perspective,
        entity_id: &str,
        filters: &Filters,
        ending_at: NaiveDate,
        months: u32,
    ) -> Result<Vec<MonthlyRevenue>, AdapterError>;
}
