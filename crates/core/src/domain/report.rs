use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::metrics::PeriodMetrics;
use crate::domain::perspective::Perspective;
use crate::domain::period::DateRange;
use crate::errors::EngineError;

/// Pareto revenue tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    A,
    B,
    C,
}

impl Tier {
    pub fn label(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    New,
    Lost,
    Existing,
}

impl LifecycleStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Lost => "lost",
            Self::Existing => "existing",
        }
    }
}

/// Presentation tier: the plain tier for existing entities, NEW/LOST otherwise.
/// Also the domain of the post-hoc tier filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DisplayTier {
    A,
    B,
    C,
    #[serde(rename = "NEW")]
    New,
    #[serde(rename = "LOST")]
    Lost,
}

impl DisplayTier {
    pub const ALL: [DisplayTier; 5] = [Self::A, Self::B, Self::C, Self::New, Self::Lost];

    pub fn label(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::New => "NEW",
            Self::Lost => "LOST",
        }
    }

    /// Parses an optional tier filter; absent means every tier.
    pub fn parse_filter(raw: Option<&str>) -> Result<Option<Self>, EngineError> {
        raw.map(str::parse::<Self>).transpose()
    }
}

impl From<Tier> for DisplayTier {
    fn from(tier: Tier) -> Self {
        match tier {
            Tier::A => Self::A,
            Tier::B => Self::B,
            Tier::C => Self::C,
        }
    }
}

impl fmt::Display for DisplayTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DisplayTier {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "C" => Ok(Self::C),
            "NEW" => Ok(Self::New),
            "LOST" => Ok(Self::Lost),
            _ => Err(EngineError::InvalidTierFilter(value.trim().to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Healthy,
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [Self::Healthy, Self::Info, Self::Warning, Self::Critical];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Requests,
    Revenue,
    UnitPrice,
    FillRate,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub severity: Severity,
    pub message: Option<String>,
    pub metrics: BTreeSet<Metric>,
}

impl Warning {
    pub fn healthy() -> Self {
        Self { severity: Severity::Healthy, message: None, metrics: BTreeSet::new() }
    }
}

/// Fill rates, blended eCPM, and period-over-period deltas.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub fill_rate_p1: f64,
    pub fill_rate_p2: f64,
    pub ecpm_p1: f64,
    pub ecpm_p2: f64,
    pub requests_change_pct: f64,
    pub revenue_change_pct: f64,
    pub unit_price_change_pct: f64,
    pub ecpm_change_pct: f64,
    pub fill_rate_change_pct: f64,
    /// Fill rate difference in percentage points (p2 - p1).
    pub fill_rate_delta_pp: f64,
}

/// Position of an entity in the revenue-descending order of its population.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranking {
    pub rank: usize,
    pub total_revenue: Decimal,
    pub cumulative_revenue: Decimal,
    pub cumulative_revenue_pct: Decimal,
    pub tier: Tier,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LostImpact {
    pub avg_monthly_revenue: Decimal,
    pub months_with_data: u32,
}

/// Fully decorated output row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityReport {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub child_count: Option<u64>,
    pub p1: PeriodMetrics,
    pub p2: PeriodMetrics,
    pub derived: DerivedMetrics,
    pub ranking: Ranking,
    pub tier: Tier,
    pub status: LifecycleStatus,
    pub display_tier: DisplayTier,
    pub tier_group: String,
    pub warning: Warning,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lost_impact: Option<LostImpact>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_items: usize,
    pub total_revenue_p1: Decimal,
    pub total_revenue_p2: Decimal,
    pub revenue_change_pct: f64,
    pub total_requests_p1: u64,
    pub total_requests_p2: u64,
    pub requests_change_pct: f64,
    pub ecpm_p1: f64,
    pub ecpm_p2: f64,
    pub ecpm_change_pct: f64,
    pub tier_counts: BTreeMap<DisplayTier, usize>,
    pub tier_revenue: BTreeMap<DisplayTier, Decimal>,
    pub tier_revenue_share_pct: BTreeMap<DisplayTier, f64>,
    pub warning_counts: BTreeMap<Severity, usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParentScope {
    pub perspective: Perspective,
    pub id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub perspective: Perspective,
    pub period1: DateRange,
    pub period2: DateRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentScope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier_filter: Option<DisplayTier>,
    pub rows: Vec<EntityReport>,
    pub summary: Summary,
}

#[cfg(test)]
mod tests {
    use super::{DisplayTier, Tier};
    use crate::errors::EngineError;

    #[test]
    fn tier_filter_parses_case_insensitively() {
        assert_eq!("new".parse::<DisplayTier>(), Ok(DisplayTier::New));
        assert_eq!(" b ".parse::<DisplayTier>(), Ok(DisplayTier::B));
        assert_eq!(DisplayTier::from(Tier::C), DisplayTier::C);
    }

    #[test]
    fn unknown_tier_filter_is_rejected() {
        assert_eq!(
            "D".parse::<DisplayTier>(),
            Err(EngineError::InvalidTierFilter("D".to_string()))
        );
    }

    #[test]
    fn optional_tier_filter_passes_absence_through() {
        assert_eq!(DisplayTier::parse_filter(None), Ok(None));
        assert_eq!(DisplayTier::parse_filter(Some("lost")), Ok(Some(DisplayTier::Lost)));
        assert_eq!(
            DisplayTier::parse_filter(Some("Z")),
            Err(EngineError::InvalidTierFilter("Z".to_string()))
        );
    }

    #[test]
    fn display_tier_serializes_as_upper_case_label() {
        let json = serde_json::to_string(&DisplayTier::Lost).expect("serialize");
        assert_eq!(json, "\"LOST\"");
    }
}
