//! In-crate collaborator stubs for engine tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::domain::{
    AggregateRow, DateRange, Filters, MembershipGroup, MonthlyRevenue, PeriodMetrics, Perspective,
};
use crate::pipeline::{ComparisonEngine, EngineSettings};
use crate::ports::{
    AdapterError, AggregationAdapter, Collaborator, MembershipAdapter, MonthlyHistoryAdapter,
};

pub fn period(value: &str) -> DateRange {
    value.parse().expect("valid test period")
}

pub fn period_metrics(revenue: i64) -> PeriodMetrics {
    PeriodMetrics {
        requests: 1000,
        revenue: Decimal::from(revenue),
        paid: 900,
        unit_price: (revenue > 0).then_some(revenue as f64),
    }
}

pub fn aggregate_row(id: &str, revenue_p1: i64, revenue_p2: i64) -> AggregateRow {
    AggregateRow {
        id: id.to_string(),
        name: format!("{id} name"),
        parent_id: None,
        child_count: None,
        p1: period_metrics(revenue_p1),
        p2: period_metrics(revenue_p2),
    }
}

pub fn group(id: &str, members: &[&str]) -> MembershipGroup {
    MembershipGroup {
        group_id: id.to_string(),
        group_name: format!("{id} team"),
        member_ids: members.iter().map(|member| member.to_string()).collect(),
    }
}

pub fn history_entry(year: i32, month: u32, revenue: i64) -> MonthlyRevenue {
    MonthlyRevenue { year, month, revenue: Decimal::from(revenue) }
}

pub fn engine(
    aggregation: StubAggregation,
    membership: StubMembership,
    history: StubHistory,
) -> ComparisonEngine<StubAggregation, StubMembership, StubHistory> {
    ComparisonEngine::new(aggregation, membership, history, EngineSettings::default())
}

struct StubRow {
    perspective: Perspective,
    row: AggregateRow,
    attributes: Vec<(Perspective, String)>,
}

/// Serves pre-aggregated rows per perspective, honoring filters against
/// each row's own id and its declared ancestor attributes.
#[derive(Default)]
pub struct StubAggregation {
    rows: Vec<StubRow>,
    fail: bool,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl StubAggregation {
    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    /// Holds every fetch for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_row(
        mut self,
        perspective: Perspective,
        row: AggregateRow,
        attributes: &[(Perspective, &str)],
    ) -> Self {
        let attributes = attributes
            .iter()
            .map(|(dimension, value)| (*dimension, value.to_string()))
            .collect();
        self.rows.push(StubRow { perspective, row, attributes });
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl AggregationAdapter for StubAggregation {
    async fn fetch(
        &self,
        perspective: Perspective,
        filters: &Filters,
        _period1: &DateRange,
        _period2: &DateRange,
    ) -> Result<Vec<AggregateRow>, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(AdapterError::new(Collaborator::Aggregation, "warehouse unavailable"));
        }

        Ok(self
            .rows
            .iter()
            .filter(|stub| stub.perspective == perspective)
            .filter(|stub| {
                filters.accepts(|dimension| {
                    if dimension == stub.perspective {
                        return Some(stub.row.id.clone());
                    }
                    stub.attributes
                        .iter()
                        .find(|(candidate, _)| *candidate == dimension)
                        .map(|(_, value)| value.clone())
                })
            })
            .map(|stub| stub.row.clone())
            .collect())
    }
}

#[derive(Default)]
pub struct StubMembership {
    groups: Vec<MembershipGroup>,
    fail: bool,
}

impl StubMembership {
    pub fn with_groups(groups: Vec<MembershipGroup>) -> Self {
        Self { groups, fail: false }
    }

    pub fn failing() -> Self {
        Self { groups: Vec::new(), fail: true }
    }
}

#[async_trait]
impl MembershipAdapter for StubMembership {
    async fn list_groups(&self) -> Result<Vec<MembershipGroup>, AdapterError> {
        if self.fail {
            return Err(AdapterError::new(Collaborator::Membership, "membership service down"));
        }
        Ok(self.groups.clone())
    }
}

#[derive(Default)]
pub struct StubHistory {
    entries: HashMap<String, Vec<MonthlyRevenue>>,
    failing: HashSet<String>,
}

impl StubHistory {
    pub fn with_entries(mut self, entity_id: &str, entries: Vec<MonthlyRevenue>) -> Self {
        self.entries.insert(entity_id.to_string(), entries);
        self
    }

    pub fn failing_for(mut self, entity_id: &str) -> Self {
        self.failing.insert(entity_id.to_string());
        self
    }
}

#[async_trait]
impl MonthlyHistoryAdapter for StubHistory {
    async fn monthly_revenue(
        &self,
        _perspective: Perspective,
        entity_id: &str,
        _filters: &Filters,
        _ending_at: NaiveDate,
        _months: u32,
    ) -> Result<Vec<MonthlyRevenue>, AdapterError> {
        if self.failing.contains(entity_id) {
            return Err(AdapterError::new(Collaborator::History, "history query failed"));
        }
        Ok(self.entries.get(entity_id).cloned().unwrap_or_default())
    }
}
