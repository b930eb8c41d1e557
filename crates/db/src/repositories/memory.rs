use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use tokio::sync::RwLock;

use pubscope_core::domain::period::trailing_months;
use pubscope_core::domain::{
    AggregateRow, DateRange, Filters, MembershipGroup, MonthlyRevenue, PeriodMetrics, Perspective,
};
use pubscope_core::ports::{
    AdapterError, AggregationAdapter, Collaborator, MembershipAdapter, MonthlyHistoryAdapter,
};

use super::{RepositoryError, StatsRepository};
use crate::facts::{from_micros, id_column, parent_dimension, DailyStat};

type FactKey = (NaiveDate, String, String);

/// Warehouse over facts held in memory. Aggregates with the same rules as
/// [`super::SqlWarehouse`].
#[derive(Default)]
pub struct InMemoryWarehouse {
    facts: RwLock<BTreeMap<FactKey, (DailyStat, i64)>>,
    groups: RwLock<BTreeMap<String, MembershipGroup>>,
}

#[derive(Default)]
struct PeriodTotals {
    requests: u64,
    paid: u64,
    revenue_micros: i64,
    price_sum: f64,
    price_days: u32,
}

impl PeriodTotals {
    fn add(&mut self, stat: &DailyStat, revenue_micros: i64) {
        self.requests += stat.requests;
        self.paid += stat.paid;
        self.revenue_micros += revenue_micros;
        if let Some(price) = stat.unit_price {
            self.price_sum += price;
            self.price_days += 1;
        }
    }

    fn into_metrics(self) -> PeriodMetrics {
        PeriodMetrics {
            requests: self.requests,
            revenue: from_micros(self.revenue_micros),
            paid: self.paid,
            unit_price: (self.price_days > 0).then(|| self.price_sum / f64::from(self.price_days)),
        }
    }
}

#[derive(Default)]
struct EntityTotals {
    name: Option<String>,
    parent_id: Option<String>,
    children: BTreeSet<String>,
    p1: PeriodTotals,
    p2: PeriodTotals,
}

fn keep_max(slot: &mut Option<String>, candidate: Option<&str>) {
    if let Some(candidate) = candidate {
        if slot.as_deref().map_or(true, |current| candidate > current) {
            *slot = Some(candidate.to_string());
        }
    }
}

fn reject_team_filters(filters: &Filters) -> Result<(), RepositoryError> {
    filters.clauses().iter().try_for_each(|clause| id_column(clause.dimension).map(|_| ()))
}

impl InMemoryWarehouse {
    pub async fn aggregate(
        &self,
        perspective: Perspective,
        filters: &Filters,
        period1: &DateRange,
        period2: &DateRange,
    ) -> Result<Vec<AggregateRow>, RepositoryError> {
        id_column(perspective)?;
        reject_team_filters(filters)?;

        let facts = self.facts.read().await;
        let mut entities: BTreeMap<String, EntityTotals> = BTreeMap::new();
        for (stat, revenue_micros) in facts.values() {
            let in_p1 = period1.contains(stat.stat_date);
            let in_p2 = period2.contains(stat.stat_date);
            let accepted =
                filters.accepts(|dimension| stat.attribute(dimension).map(str::to_string));
            if !(in_p1 || in_p2) || !accepted {
                continue;
            }
            let Some(id) = stat.attribute(perspective) else {
                continue;
            };

            let entity = entities.entry(id.to_string()).or_default();
            keep_max(&mut entity.name, stat.display_name(perspective));
            if let Some(parent) = parent_dimension(perspective) {
                keep_max(&mut entity.parent_id, stat.attribute(parent));
            }
            if let Some(child) = perspective.child().and_then(|child| stat.attribute(child)) {
                entity.children.insert(child.to_string());
            }
            if in_p1 {
                entity.p1.add(stat, *revenue_micros);
            }
            if in_p2 {
                entity.p2.add(stat, *revenue_micros);
            }
        }

        Ok(entities
            .into_iter()
            .map(|(id, entity)| AggregateRow {
                name: entity.name.unwrap_or_else(|| id.clone()),
                id,
                parent_id: entity.parent_id,
                child_count: perspective.child().map(|_| entity.children.len() as u64),
                p1: entity.p1.into_metrics(),
                p2: entity.p2.into_metrics(),
            })
            .collect())
    }

    pub async fn history(
        &self,
        perspective: Perspective,
        entity_id: &str,
        filters: &Filters,
        ending_at: NaiveDate,
        months: u32,
    ) -> Result<Vec<MonthlyRevenue>, RepositoryError> {
        id_column(perspective)?;
        reject_team_filters(filters)?;
        let Some(window) = trailing_months(ending_at, months) else {
            return Ok(Vec::new());
        };

        let facts = self.facts.read().await;
        let mut by_month: BTreeMap<(i32, u32), i64> = BTreeMap::new();
        for (stat, revenue_micros) in facts.values() {
            let matches = window.contains(stat.stat_date)
                && stat.attribute(perspective) == Some(entity_id)
                && filters.accepts(|dimension| stat.attribute(dimension).map(str::to_string));
            if matches {
                *by_month.entry((stat.stat_date.year(), stat.stat_date.month())).or_default() +=
                    revenue_micros;
            }
        }

        Ok(by_month
            .into_iter()
            .filter(|(_, micros)| *micros > 0)
            .map(|((year, month), micros)| MonthlyRevenue { year, month, revenue: from_micros(micros) })
            .collect())
    }
}

#[async_trait]
impl AggregationAdapter for InMemoryWarehouse {
    async fn fetch(
        &self,
        perspective: Perspective,
        filters: &Filters,
        period1: &DateRange,
        period2: &DateRange,
    ) -> Result<Vec<AggregateRow>, AdapterError> {
        self.aggregate(perspective, filters, period1, period2)
            .await
            .map_err(|error| error.into_adapter(Collaborator::Aggregation))
    }
}

#[async_trait]
impl MembershipAdapter for InMemoryWarehouse {
    async fn list_groups(&self) -> Result<Vec<MembershipGroup>, AdapterError> {
        let groups = self.groups.read().await;
        Ok(groups.values().cloned().collect())
    }
}

#[async_trait]
impl MonthlyHistoryAdapter for InMemoryWarehouse {
    async fn monthly_revenue(
        &self,
        perspective: Perspective,
        entity_id: &str,
        filters: &Filters,
        ending_at: NaiveDate,
        months: u32,
    ) -> Result<Vec<MonthlyRevenue>, AdapterError> {
        self.history(perspective, entity_id, filters, ending_at, months)
            .await
            .map_err(|error| error.into_adapter(Collaborator::History))
    }
}

#[async_trait]
impl StatsRepository for InMemoryWarehouse {
    async fn record(&self, stats: &[DailyStat]) -> Result<(), RepositoryError> {
        let encoded = stats
            .iter()
            .map(|stat| Ok((stat.clone(), stat.revenue_micros()?)))
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        let mut facts = self.facts.write().await;
        for (stat, micros) in encoded {
            let key = (stat.stat_date, stat.zone_id.clone(), stat.product.clone());
            facts.insert(key, (stat, micros));
        }
        Ok(())
    }

    async fn save_group(&self, group: &MembershipGroup) -> Result<(), RepositoryError> {
        let mut deduplicated = group.clone();
        let mut seen = BTreeSet::new();
        deduplicated.member_ids.retain(|member| seen.insert(member.clone()));

        let mut groups = self.groups.write().await;
        groups.insert(group.group_id.clone(), deduplicated);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use pubscope_core::domain::{FilterClause, Filters, MembershipGroup, Perspective};
    use pubscope_core::ports::{AggregationAdapter, MembershipAdapter, MonthlyHistoryAdapter};

    use super::InMemoryWarehouse;
    use crate::facts::DailyStat;
    use crate::repositories::StatsRepository;

    fn stat(day: &str, product: &str, zone: &str, revenue: i64, price: Option<f64>) -> DailyStat {
        DailyStat {
            stat_date: day.parse().expect("date"),
            account_owner: "bob".to_string(),
            publisher_id: "p1".to_string(),
            publisher_name: "Pub One".to_string(),
            media_id: "m1".to_string(),
            media_name: "Media One".to_string(),
            product: product.to_string(),
            zone_id: zone.to_string(),
            zone_name: format!("{zone} name"),
            requests: 100,
            paid: 50,
            revenue: Decimal::from(revenue),
            unit_price: price,
        }
    }

    #[tokio::test]
    async fn upserts_by_date_zone_and_product() {
        let warehouse = InMemoryWarehouse::default();
        warehouse.record(&[stat("2026-01-02", "video", "z1", 10, None)]).await.expect("record");
        warehouse.record(&[stat("2026-01-02", "video", "z1", 25, None)]).await.expect("record");

        let period = "2026-01-01..2026-01-31".parse().expect("period");
        let rows = warehouse
            .fetch(Perspective::Zone, &Filters::default(), &period, &period)
            .await
            .expect("fetch");

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].p1.revenue, Decimal::from(25));
        assert_eq!(rows[0].child_count, None);
        assert_eq!(rows[0].parent_id.as_deref(), Some("m1"));
    }

    #[tokio::test]
    async fn unit_price_averages_only_priced_days() {
        let warehouse = InMemoryWarehouse::default();
        warehouse
            .record(&[
                stat("2026-01-02", "video", "z1", 10, Some(2.0)),
                stat("2026-01-03", "video", "z1", 10, Some(4.0)),
                stat("2026-01-04", "video", "z1", 10, None),
            ])
            .await
            .expect("record");

        let p1 = "2026-01-01..2026-01-31".parse().expect("p1");
        let p2 = "2026-02-01..2026-02-28".parse().expect("p2");
        let scoped = Filters::new(vec![FilterClause::new(Perspective::Product, ["video"])]);
        let rows = warehouse.fetch(Perspective::Product, &scoped, &p1, &p2).await.expect("fetch");

        assert_eq!(rows[0].p1.unit_price, Some(3.0));
        assert_eq!(rows[0].p2.unit_price, None);
        assert_eq!(rows[0].p2.revenue, Decimal::ZERO);
        assert_eq!(rows[0].child_count, Some(1));
    }

    #[tokio::test]
    async fn history_skips_months_without_revenue() {
        let warehouse = InMemoryWarehouse::default();
        warehouse
            .record(&[
                stat("2025-11-10", "video", "z1", 0, None),
                stat("2025-12-10", "video", "z1", 40, None),
                stat("2025-12-11", "video", "z1", 20, None),
            ])
            .await
            .expect("record");

        let months = warehouse
            .monthly_revenue(
                Perspective::Zone,
                "z1",
                &Filters::default(),
                "2025-12-31".parse().expect("date"),
                6,
            )
            .await
            .expect("history");

        assert_eq!(months.len(), 1);
        assert_eq!(months[0].revenue, Decimal::from(60));
    }

    #[tokio::test]
    async fn groups_are_listed_by_id_without_duplicate_members() {
        let warehouse = InMemoryWarehouse::default();
        warehouse
            .save_group(&MembershipGroup {
                group_id: "west".to_string(),
                group_name: "West".to_string(),
                member_ids: vec!["a".to_string(), "b".to_string(), "a".to_string()],
            })
            .await
            .expect("save");

        let groups = warehouse.list_groups().await.expect("groups");
        assert_eq!(groups[0].member_ids, vec!["a".to_string(), "b".to_string()]);
    }
}
