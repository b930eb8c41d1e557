use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::debug;

use pubscope_core::domain::period::trailing_months;
use pubscope_core::domain::{
    AggregateRow, DateRange, Filters, MembershipGroup, MonthlyRevenue, PeriodMetrics, Perspective,
};
use pubscope_core::ports::{
    AdapterError, AggregationAdapter, Collaborator, MembershipAdapter, MonthlyHistoryAdapter,
};

use super::{RepositoryError, StatsRepository};
use crate::facts::{from_micros, id_column, name_column, parent_dimension, DailyStat};
use crate::DbPool;

/// SQLite-backed warehouse serving all three engine collaborators.
#[derive(Clone)]
pub struct SqlWarehouse {
    pool: DbPool,
}

impl SqlWarehouse {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn aggregate(
        &self,
        perspective: Perspective,
        filters: &Filters,
        period1: &DateRange,
        period2: &DateRange,
    ) -> Result<Vec<AggregateRow>, RepositoryError> {
        let id = id_column(perspective)?;
        let name = name_column(perspective)?;
        if filters.clauses().iter().any(|clause| clause.values.is_empty()) {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new("SELECT ");
        builder.push(id).push(" AS entity_id, MAX(").push(name).push(") AS entity_name, ");
        match parent_dimension(perspective) {
            Some(parent) => {
                builder.push("MAX(").push(id_column(parent)?).push(") AS parent_id, ");
            }
            None => {
                builder.push("NULL AS parent_id, ");
            }
        }
        match perspective.child() {
            Some(child) => {
                builder.push("COUNT(DISTINCT ").push(id_column(child)?).push(") AS child_count");
            }
            None => {
                builder.push("NULL AS child_count");
            }
        }

        for (suffix, period) in [("p1", period1), ("p2", period2)] {
            push_period_aggregate(&mut builder, "SUM", "requests", period, "requests", suffix);
            push_period_aggregate(&mut builder, "SUM", "paid", period, "paid", suffix);
            push_period_aggregate(&mut builder, "SUM", "revenue_micros", period, "revenue", suffix);
            push_period_aggregate(&mut builder, "AVG", "unit_price", period, "unit_price", suffix);
        }

        builder.push(" FROM ad_daily_stats WHERE (stat_date BETWEEN ");
        builder.push_bind(period1.start).push(" AND ").push_bind(period1.end);
        builder.push(" OR stat_date BETWEEN ");
        builder.push_bind(period2.start).push(" AND ").push_bind(period2.end).push(")");
        push_filters(&mut builder, filters)?;
        builder.push(" GROUP BY ").push(id).push(" ORDER BY ").push(id);

        let rows = builder.build().fetch_all(&self.pool).await?;
        debug!(
            event_name = "db.aggregation.fetched",
            perspective = %perspective,
            rows = rows.len(),
            "aggregated warehouse rows"
        );
        rows.iter().map(row_to_aggregate).collect()
    }

    pub async fn groups(&self) -> Result<Vec<MembershipGroup>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT g.group_id, g.group_name, m.member_id
             FROM team_groups g
             LEFT JOIN team_members m ON m.group_id = g.group_id
             ORDER BY g.group_id, m.position",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut groups: Vec<MembershipGroup> = Vec::new();
        for row in &rows {
            let group_id: String = decode(row, "group_id")?;
            let member_id: Option<String> = decode(row, "member_id")?;
            let starts_group = groups.last().map_or(true, |current| current.group_id != group_id);
            if starts_group {
                groups.push(MembershipGroup {
                    group_id,
                    group_name: decode(row, "group_name")?,
                    member_ids: Vec::new(),
                });
            }
            if let (Some(member_id), Some(current)) = (member_id, groups.last_mut()) {
                current.member_ids.push(member_id);
            }
        }
        Ok(groups)
    }

    pub async fn history(
        &self,
        perspective: Perspective,
        entity_id: &str,
        filters: &Filters,
        ending_at: NaiveDate,
        months: u32,
    ) -> Result<Vec<MonthlyRevenue>, RepositoryError> {
        let column = id_column(perspective)?;
        let Some(window) = trailing_months(ending_at, months) else {
            return Ok(Vec::new());
        };

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT CAST(strftime('%Y', stat_date) AS INTEGER) AS year, \
             CAST(strftime('%m', stat_date) AS INTEGER) AS month, \
             SUM(revenue_micros) AS revenue_micros \
             FROM ad_daily_stats WHERE ",
        );
        builder.push(column).push(" = ").push_bind(entity_id.to_string());
        builder.push(" AND stat_date BETWEEN ").push_bind(window.start);
        builder.push(" AND ").push_bind(window.end);
        push_filters(&mut builder, filters)?;
        builder.push(" GROUP BY year, month HAVING SUM(revenue_micros) > 0 ORDER BY year, month");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                let year: i64 = decode(row, "year")?;
                let month: i64 = decode(row, "month")?;
                let micros: i64 = decode(row, "revenue_micros")?;
                Ok(MonthlyRevenue {
                    year: i32::try_from(year)
                        .map_err(|error| RepositoryError::Decode(error.to_string()))?,
                    month: u32::try_from(month)
                        .map_err(|error| RepositoryError::Decode(error.to_string()))?,
                    revenue: from_micros(micros),
                })
            })
            .collect()
    }
}

fn push_period_aggregate(
    builder: &mut QueryBuilder<'_, Sqlite>,
    function: &str,
    column: &str,
    period: &DateRange,
    alias: &str,
    suffix: &str,
) {
    builder.push(", ").push(function).push("(CASE WHEN stat_date BETWEEN ");
    builder.push_bind(period.start).push(" AND ").push_bind(period.end);
    builder.push(" THEN ").push(column).push(" END) AS ").push(alias).push("_").push(suffix);
}

fn push_filters(
    builder: &mut QueryBuilder<'_, Sqlite>,
    filters: &Filters,
) -> Result<(), RepositoryError> {
    for clause in filters.clauses() {
        let column = id_column(clause.dimension)?;
        builder.push(" AND ").push(column).push(" IN (");
        let mut values = builder.separated(", ");
        for value in &clause.values {
            values.push_bind(value.clone());
        }
        values.push_unseparated(")");
    }
    Ok(())
}

fn decode<'r, T>(row: &'r SqliteRow, column: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn counter(value: Option<i64>) -> u64 {
    value.unwrap_or(0).max(0) as u64
}

fn period_metrics(row: &SqliteRow, suffix: &str) -> Result<PeriodMetrics, RepositoryError> {
    let requests: Option<i64> = decode(row, &format!("requests_{suffix}"))?;
    let paid: Option<i64> = decode(row, &format!("paid_{suffix}"))?;
    let revenue: Option<i64> = decode(row, &format!("revenue_{suffix}"))?;
    let unit_price: Option<f64> = decode(row, &format!("unit_price_{suffix}"))?;

    Ok(PeriodMetrics {
        requests: counter(requests),
        revenue: from_micros(revenue.unwrap_or(0)),
        paid: counter(paid),
        unit_price,
    })
}

fn row_to_aggregate(row: &SqliteRow) -> Result<AggregateRow, RepositoryError> {
    let id: String = decode(row, "entity_id")?;
    let name: Option<String> = decode(row, "entity_name")?;
    let child_count: Option<i64> = decode(row, "child_count")?;

    Ok(AggregateRow {
        name: name.unwrap_or_else(|| id.clone()),
        id,
        parent_id: decode(row, "parent_id")?,
        child_count: child_count.map(|count| count.max(0) as u64),
        p1: period_metrics(row, "p1")?,
        p2: period_metrics(row, "p2")?,
    })
}

fn to_i64(value: u64, field: &str) -> Result<i64, RepositoryError> {
    i64::try_from(value).map_err(|_| RepositoryError::Encode(format!("{field} {value} overflows")))
}

#[async_trait]
impl AggregationAdapter for SqlWarehouse {
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
impl MembershipAdapter for SqlWarehouse {
    async fn list_groups(&self) -> Result<Vec<MembershipGroup>, AdapterError> {
        self.groups().await.map_err(|error| error.into_adapter(Collaborator::Membership))
    }
}

#[async_trait]
impl MonthlyHistoryAdapter for SqlWarehouse {
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
impl StatsRepository for SqlWarehouse {
    async fn record(&self, stats: &[DailyStat]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        for stat in stats {
            sqlx::query(
                "INSERT INTO ad_daily_stats (stat_date, account_owner, publisher_id, publisher_name,
                                             media_id, media_name, product, zone_id, zone_name,
                                             requests, paid, revenue_micros, unit_price)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(stat_date, zone_id, product) DO UPDATE SET
                     account_owner = excluded.account_owner,
                     publisher_id = excluded.publisher_id,
                     publisher_name = excluded.publisher_name,
                     media_id = excluded.media_id,
                     media_name = excluded.media_name,
                     zone_name = excluded.zone_name,
                     requests = excluded.requests,
                     paid = excluded.paid,
                     revenue_micros = excluded.revenue_micros,
                     unit_price = excluded.unit_price",
            )
            .bind(stat.stat_date)
            .bind(&stat.account_owner)
            .bind(&stat.publisher_id)
            .bind(&stat.publisher_name)
            .bind(&stat.media_id)
            .bind(&stat.media_name)
            .bind(&stat.product)
            .bind(&stat.zone_id)
            .bind(&stat.zone_name)
            .bind(to_i64(stat.requests, "requests")?)
            .bind(to_i64(stat.paid, "paid")?)
            .bind(stat.revenue_micros()?)
            .bind(stat.unit_price)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn save_group(&self, group: &MembershipGroup) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO team_groups (group_id, group_name) VALUES (?, ?)
             ON CONFLICT(group_id) DO UPDATE SET group_name = excluded.group_name",
        )
        .bind(&group.group_id)
        .bind(&group.group_name)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM team_members WHERE group_id = ?")
            .bind(&group.group_id)
            .execute(&mut *tx)
            .await?;

        for (position, member_id) in group.member_ids.iter().enumerate() {
            sqlx::query(
                "INSERT OR IGNORE INTO team_members (group_id, member_id, position) VALUES (?, ?, ?)",
            )
            .bind(&group.group_id)
            .bind(member_id)
            .bind(to_i64(position as u64, "position")?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
