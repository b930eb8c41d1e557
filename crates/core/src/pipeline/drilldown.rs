use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::domain::{ComparisonReport, DateRange, DisplayTier, Filters, ParentScope, Perspective};
use crate::errors::EngineError;
use crate::pipeline::{ComparisonEngine, ComparisonRequest};
use crate::ports::{AggregationAdapter, MembershipAdapter, MonthlyHistoryAdapter};

/// Re-scopes a comparison to the children of one parent entity.
#[derive(Clone, Debug, PartialEq)]
pub struct DrillDownRequest {
    pub parent: Perspective,
    pub parent_id: String,
    pub period1: DateRange,
    pub period2: DateRange,
    pub filters: Filters,
    pub tier_filter: Option<DisplayTier>,
}

impl DrillDownRequest {
    /// The child population request: the parent's child perspective with
    /// filters narrowed to the parent id.
    pub fn child_request(&self) -> Result<ComparisonRequest, EngineError> {
        let child = self.parent.child().ok_or_else(|| {
            EngineError::InvalidDrillDown(format!("`{}` is terminal and has no children", self.parent))
        })?;
        let parent_id = self.parent_id.trim();
        if parent_id.is_empty() {
            return Err(EngineError::InvalidDrillDown("parent id is required".to_string()));
        }

        Ok(ComparisonRequest {
            perspective: child,
            period1: self.period1,
            period2: self.period2,
            filters: self.filters.narrowed_to(self.parent, parent_id),
            tier_filter: self.tier_filter,
        })
    }
}

impl<A, M, H> ComparisonEngine<A, M, H>
where
    A: AggregationAdapter,
    M: MembershipAdapter,
    H: MonthlyHistoryAdapter,
{
    /// Runs the full pipeline over the narrowed child population, so the
    /// children are tiered among themselves before any tier filter applies.
    pub async fn drill_down(
        &self,
        request: &DrillDownRequest,
        cancel: &CancellationToken,
    ) -> Result<ComparisonReport, EngineError> {
        let child_request = request.child_request()?;
        info!(
            event_name = "engine.drill_down.start",
            parent = %request.parent,
            parent_id = %request.parent_id.trim(),
            child = %child_request.perspective,
            "drilling down"
        );

        let mut report = self.compare(&child_request, cancel).await?;
        report.parent =
            Some(ParentScope { perspective: request.parent, id: request.parent_id.trim().to_string() });
        Ok(report)
    }
}
