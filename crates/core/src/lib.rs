pub mod config;
pub mod domain;
pub mod errors;
pub mod pipeline;
pub mod ports;

pub use config::{AppConfig, ConfigError, LoadOptions};
pub use domain::{
    ComparisonReport, DateRange, DisplayTier, EntityReport, FilterClause, Filters, Perspective,
    Summary,
};
pub use errors::{EngineError, InterfaceError};
pub use pipeline::{
    ComparisonEngine, ComparisonRequest, DrillDownRequest, EngineSettings, TierThresholds,
};
pub use ports::{
    AdapterError, AggregationAdapter, Collaborator, MembershipAdapter, MonthlyHistoryAdapter,
};
