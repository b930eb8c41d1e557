use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Raw counters for one entity over one period.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodMetrics {
    pub requests: u64,
    pub revenue: Decimal,
    pub paid: u64,
    /// Average price per thousand as reported by the warehouse; `None` when
    /// the period has no priced rows.
    pub unit_price: Option<f64>,
}

/// One entity row as produced by the aggregation adapter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub child_count: Option<u64>,
    pub p1: PeriodMetrics,
    pub p2: PeriodMetrics,
}

/// A named group of account owners, used to synthesize the team perspective.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipGroup {
    pub group_id: String,
    pub group_name: String,
    pub member_ids: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyRevenue {
    pub year: i32,
    pub month: u32,
    pub revenue: Decimal,
}
