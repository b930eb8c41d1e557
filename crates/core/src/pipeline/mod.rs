//! Comparative tiering and drill-down engine.
//!
//! One invocation fetches one complete population, runs it through derived
//! metrics, ranking, lifecycle, and warnings in a single pass, and discards
//! it. Nothing is cached between invocations.

pub mod derived;
pub mod drilldown;
pub mod lifecycle;
pub mod ranking;
pub mod summary;
pub mod team;
pub mod warnings;

#[cfg(test)]
pub(crate) mod test_support;

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{
    AggregateRow, ComparisonReport, DateRange, DisplayTier, EntityReport, FilterClause, Filters,
    LifecycleStatus, MonthlyRevenue, Perspective, Tier,
};
use crate::errors::EngineError;
use crate::ports::{AdapterError, AggregationAdapter, MembershipAdapter, MonthlyHistoryAdapter};

pub use drilldown::DrillDownRequest;
pub use ranking::TierThresholds;

pub const DEFAULT_LOST_IMPACT_MONTHS: u32 = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    pub tiers: TierThresholds,
    /// Trailing months averaged into a lost entity's impact figure.
    pub lost_impact_months: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self { tiers: TierThresholds::default(), lost_impact_months: DEFAULT_LOST_IMPACT_MONTHS }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ComparisonRequest {
    pub perspective: Perspective,
    pub period1: DateRange,
    pub period2: DateRange,
    pub filters: Filters,
    /// Applied to the already-tiered rows, never before tiering.
    pub tier_filter: Option<DisplayTier>,
}

/// The fetched population plus the context needed to enrich it.
struct Population {
    rows: Vec<AggregateRow>,
    /// Filters as sent to the warehouse, with team clauses resolved.
    filters: Filters,
    /// Team perspective only: members of every emitted team.
    team_members: Option<HashMap<String, Vec<String>>>,
}

pub struct ComparisonEngine<A, M, H> {
    aggregation: A,
    membership: M,
    history: H,
    settings: EngineSettings,
}

impl<A, M, H> ComparisonEngine<A, M, H> {
    pub fn new(aggregation: A, membership: M, history: H, settings: EngineSettings) -> Self {
        Self { aggregation, membership, history, settings }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }
}

impl<A, M, H> ComparisonEngine<A, M, H>
where
    A: AggregationAdapter,
    M: MembershipAdapter,
    H: MonthlyHistoryAdapter,
{
    /// Runs one comparison. `cancel` is honored before the first adapter
    /// call, while the population is being fetched, and before ranking.
    pub async fn compare(
        &self,
        request: &ComparisonRequest,
        cancel: &CancellationToken,
    ) -> Result<ComparisonReport, EngineError> {
        request.period1.validate()?;
        request.period2.validate()?;
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        info!(
            event_name = "engine.compare.start",
            perspective = %request.perspective,
            period1 = %request.period1,
            period2 = %request.period2,
            filter_clauses = request.filters.clauses().len(),
            "starting comparison"
        );

        let population = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(
                    event_name = "engine.compare.cancelled",
                    perspective = %request.perspective,
                    stage = "fetch",
                    "comparison cancelled while fetching"
                );
                return Err(EngineError::Cancelled);
            }
            population = self.fetch_population(request) => population?,
        };
        let Population { rows: fetched, filters, team_members } = population;

        if cancel.is_cancelled() {
            warn!(
                event_name = "engine.compare.cancelled",
                perspective = %request.perspective,
                stage = "ranking",
                fetched_rows = fetched.len(),
                "comparison cancelled before ranking"
            );
            return Err(EngineError::Cancelled);
        }

        let mut rows = classify_population(fetched, &self.settings.tiers);
        self.attach_lost_impact(request, &filters, team_members.as_ref(), &mut rows).await;

        let summary = summary::summarize(&rows);
        if let Some(tier) = request.tier_filter {
            rows.retain(|row| row.display_tier == tier);
        }

        info!(
            event_name = "engine.compare.complete",
            perspective = %request.perspective,
            population = summary.total_items,
            returned_rows = rows.len(),
            "comparison complete"
        );

        Ok(ComparisonReport {
            perspective: request.perspective,
            period1: request.period1,
            period2: request.period2,
            parent: None,
            tier_filter: request.tier_filter,
            rows,
            summary,
        })
    }

    async fn fetch_population(&self, request: &ComparisonRequest) -> Result<Population, EngineError> {
        let (team_clauses, native) = request.filters.split_team();

        if request.perspective.is_virtual() {
            let (owner_rows, groups) = if team_clauses.is_empty() {
                // Independent reads; the fold waits for both.
                tokio::try_join!(
                    self.aggregation.fetch(
                        Perspective::AccountOwner,
                        &native,
                        &request.period1,
                        &request.period2,
                    ),
                    self.membership.list_groups(),
                )?
            } else {
                // Only the selected teams' owners are fetched.
                let groups = self.membership.list_groups().await?;
                let members = team::member_ids(&team::select_groups(&groups, &team_clauses));
                let owner_rows = if members.is_empty() {
                    Vec::new()
                } else {
                    let scoped =
                        native.clone().with(FilterClause::new(Perspective::AccountOwner, members));
                    self.aggregation
                        .fetch(Perspective::AccountOwner, &scoped, &request.period1, &request.period2)
                        .await?
                };
                (owner_rows, groups)
            };

            let selected = team::select_groups(&groups, &team_clauses);
            let fold = team::fold_into_teams(&owner_rows, &groups, &selected);
            if !fold.unmapped.is_empty() {
                warn!(
                    event_name = "engine.team.unmapped_members",
                    unmapped = fold.unmapped.len(),
                    members = %fold.unmapped.join(","),
                    "account owners without a team were excluded"
                );
            }

            let team_members = selected
                .iter()
                .map(|group| (group.group_id.clone(), group.member_ids.clone()))
                .collect();
            return Ok(Population {
                rows: fold.rows,
                filters: native,
                team_members: Some(team_members),
            });
        }

        if team_clauses.is_empty() {
            let rows = self
                .aggregation
                .fetch(request.perspective, &native, &request.period1, &request.period2)
                .await?;
            return Ok(Population { rows, filters: native, team_members: None });
        }

        let groups = self.membership.list_groups().await?;
        let members = team::member_ids(&team::select_groups(&groups, &team_clauses));
        if members.is_empty() {
            debug!(
                event_name = "engine.team.filter_empty",
                perspective = %request.perspective,
                "team filter matched no account owners"
            );
            return Ok(Population { rows: Vec::new(), filters: native, team_members: None });
        }

        let filters = native.with(FilterClause::new(Perspective::AccountOwner, members));
        let rows = self
            .aggregation
            .fetch(request.perspective, &filters, &request.period1, &request.period2)
            .await?;
        Ok(Population { rows, filters, team_members: None })
    }

    async fn attach_lost_impact(
        &self,
        request: &ComparisonRequest,
        filters: &Filters,
        team_members: Option<&HashMap<String, Vec<String>>>,
        rows: &mut [EntityReport],
    ) {
        let months = self.settings.lost_impact_months;
        let ending_at = request.period1.end;

        for row in rows.iter_mut().filter(|row| row.status == LifecycleStatus::Lost) {
            let history = match team_members {
                Some(teams) => {
                    let members = teams.get(&row.id).map(Vec::as_slice).unwrap_or_default();
                    self.team_history(members, filters, ending_at, months).await
                }
                None => {
                    self.history
                        .monthly_revenue(
                            request.perspective,
                            &row.id,
                            filters,
                            ending_at,
                            months,
                        )
                        .await
                }
            };

            match history {
                Ok(entries) => row.lost_impact = lifecycle::lost_impact(&entries),
                Err(error) => warn!(
                    event_name = "engine.lost_impact.unavailable",
                    perspective = %request.perspective,
                    entity_id = %row.id,
                    error = %error,
                    "monthly history unavailable; lost impact omitted"
                ),
            }
        }
    }

    /// A team's history is the per-month sum of its members' histories.
    async fn team_history(
        &self,
        members: &[String],
        filters: &Filters,
        ending_at: NaiveDate,
        months: u32,
    ) -> Result<Vec<MonthlyRevenue>, AdapterError> {
        let mut by_month: BTreeMap<(i32, u32), Decimal> = BTreeMap::new();
        for member in members {
            let entries = self
                .history
                .monthly_revenue(Perspective::AccountOwner, member, filters, ending_at, months)
                .await?;
            for entry in entries {
                *by_month.entry((entry.year, entry.month)).or_default() += entry.revenue;
            }
        }

        Ok(by_month
            .into_iter()
            .map(|((year, month), revenue)| MonthlyRevenue { year, month, revenue })
            .collect())
    }
}

/// Derives, ranks, and classifies a complete population. Output is in
/// period-2 revenue order.
///
/// Must be given the whole comparison set: tiers depend on every member.
pub fn classify_population(rows: Vec<AggregateRow>, thresholds: &TierThresholds) -> Vec<EntityReport> {
    let revenue_p1: Vec<Decimal> = rows.iter().map(|row| row.p1.revenue).collect();
    let revenue_p2: Vec<Decimal> = rows.iter().map(|row| row.p2.revenue).collect();

    let mut p1_tiers = vec![Tier::C; rows.len()];
    for (index, ranking) in ranking::rank_by_revenue(&revenue_p1, thresholds) {
        p1_tiers[index] = ranking.tier;
    }

    let mut slots: Vec<Option<AggregateRow>> = rows.into_iter().map(Some).collect();
    ranking::rank_by_revenue(&revenue_p2, thresholds)
        .into_iter()
        .filter_map(|(index, ranking)| {
            let row = slots[index].take()?;
            let derived = derived::derive(&row.p1, &row.p2);
            let status = lifecycle::classify(row.p1.revenue, row.p2.revenue);
            let tier = ranking.tier;
            let (display_tier, tier_group) = lifecycle::display_tier(status, tier, p1_tiers[index]);
            let warning = warnings::evaluate(status, &derived);

            Some(EntityReport {
                id: row.id,
                name: row.name,
                parent_id: row.parent_id,
                child_count: row.child_count,
                p1: row.p1,
                p2: row.p2,
                derived,
                ranking,
                tier,
                status,
                display_tier,
                tier_group,
                warning,
                lost_impact: None,
            })
        })
        .collect()
}
