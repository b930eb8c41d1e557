pub mod filters;
pub mod metrics;
pub mod period;
pub mod perspective;
pub mod report;

pub use filters::{FilterClause, Filters};
pub use metrics::{AggregateRow, MembershipGroup, MonthlyRevenue, PeriodMetrics};
pub use period::{DateRange, YearMonth};
pub use perspective::Perspective;
pub use report::{
    ComparisonReport, DerivedMetrics, DisplayTier, EntityReport, LifecycleStatus, LostImpact,
    Metric, ParentScope, Ranking, Severity, Summary, Tier, Warning,
};
