use pubscope_core::domain::{DisplayTier, Filters, LifecycleStatus, Perspective, Tier};
use pubscope_core::pipeline::{ComparisonEngine, ComparisonRequest, EngineSettings};
use pubscope_core::DrillDownRequest;
use pubscope_db::{
    connect_with_settings, migrations, DemoDataset, InMemoryWarehouse, SqlWarehouse,
};
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

type WarehouseTestResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr) => {
        if !$cond {
            return Err(format!("assertion failed: `{}`", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return Err(format!(
                "assertion failed: `left == right` (`{:?}` != `{:?}`)",
                $left,
                $right
            ));
        }
    };
}

type SqlEngine = ComparisonEngine<SqlWarehouse, SqlWarehouse, SqlWarehouse>;

async fn seeded_warehouse() -> WarehouseTestResult<SqlWarehouse> {
    let pool = connect_with_settings("sqlite::memory:", 1, 30)
        .await
        .map_err(|error| format!("connect: {error}"))?;
    migrations::run_pending(&pool).await.map_err(|error| format!("migrate: {error}"))?;
    let warehouse = SqlWarehouse::new(pool);
    DemoDataset::load(&warehouse).await.map_err(|error| format!("seed: {error}"))?;
    Ok(warehouse)
}

fn engine(warehouse: &SqlWarehouse) -> SqlEngine {
    ComparisonEngine::new(
        warehouse.clone(),
        warehouse.clone(),
        warehouse.clone(),
        EngineSettings::default(),
    )
}

fn request(perspective: Perspective) -> WarehouseTestResult<ComparisonRequest> {
    let (period1, period2) = DemoDataset::periods().map_err(|error| error.to_string())?;
    Ok(ComparisonRequest { perspective, period1, period2, filters: Filters::default(), tier_filter: None })
}

#[tokio::test]
async fn seeded_population_satisfies_ranking_invariants() -> WarehouseTestResult {
    let warehouse = seeded_warehouse().await?;
    let report = engine(&warehouse)
        .compare(&request(Perspective::Zone)?, &CancellationToken::new())
        .await
        .map_err(|error| error.to_string())?;

    require!(!report.rows.is_empty());
    let mut previous_pct = Decimal::ZERO;
    let mut previous_tier = Tier::A;
    for row in &report.rows {
        require!(row.ranking.cumulative_revenue_pct >= previous_pct, "pct decreased at {}", row.id);
        require!(row.tier >= previous_tier, "tier went backwards at {}", row.id);
        previous_pct = row.ranking.cumulative_revenue_pct;
        previous_tier = row.tier;
    }
    require_eq!(previous_pct, Decimal::ONE_HUNDRED);

    let counted: usize = report.summary.tier_counts.values().sum();
    require_eq!(counted, report.summary.total_items);
    Ok(())
}

#[tokio::test]
async fn revenue_is_conserved_across_perspectives() -> WarehouseTestResult {
    let warehouse = seeded_warehouse().await?;
    let engine = engine(&warehouse);

    let mut totals = Vec::new();
    for perspective in [
        Perspective::AccountOwner,
        Perspective::Publisher,
        Perspective::MediaProperty,
        Perspective::Product,
        Perspective::Zone,
    ] {
        let report = engine
            .compare(&request(perspective)?, &CancellationToken::new())
            .await
            .map_err(|error| error.to_string())?;
        totals.push((report.summary.total_revenue_p1, report.summary.total_revenue_p2));
    }

    require!(totals.windows(2).all(|pair| pair[0] == pair[1]), "totals differ: {totals:?}");
    Ok(())
}

#[tokio::test]
async fn drill_down_equals_filtered_child_perspective() -> WarehouseTestResult {
    let warehouse = seeded_warehouse().await?;
    let engine = engine(&warehouse);
    let base = request(Perspective::MediaProperty)?;

    let drilled = engine
        .drill_down(
            &DrillDownRequest {
                parent: Perspective::Publisher,
                parent_id: "pub-news".to_string(),
                period1: base.period1,
                period2: base.period2,
                filters: Filters::default(),
                tier_filter: None,
            },
            &CancellationToken::new(),
        )
        .await
        .map_err(|error| error.to_string())?;
    let unscoped =
        engine.compare(&base, &CancellationToken::new()).await.map_err(|error| error.to_string())?;

    let drilled_rows: Vec<_> =
        drilled.rows.iter().map(|row| (row.id.clone(), row.p1.revenue, row.p2.revenue)).collect();
    let expected: Vec<_> = unscoped
        .rows
        .iter()
        .filter(|row| row.parent_id.as_deref() == Some("pub-news"))
        .map(|row| (row.id.clone(), row.p1.revenue, row.p2.revenue))
        .collect();

    require_eq!(drilled_rows, expected);
    require_eq!(drilled_rows.len(), 2);
    Ok(())
}

#[tokio::test]
async fn lifecycle_and_lost_impact_follow_the_seeded_shape() -> WarehouseTestResult {
    let warehouse = seeded_warehouse().await?;
    let report = engine(&warehouse)
        .compare(&request(Perspective::Zone)?, &CancellationToken::new())
        .await
        .map_err(|error| error.to_string())?;

    let find = |id: &str| {
        report.rows.iter().find(|row| row.id == id).ok_or_else(|| format!("missing zone {id}"))
    };

    let feed = find("games-feed")?;
    require_eq!(feed.status, LifecycleStatus::Lost);
    require_eq!(feed.display_tier, DisplayTier::Lost);
    let impact = feed.lost_impact.clone().ok_or("lost zone should carry history")?;
    require_eq!(impact.months_with_data, 6);

    let inline = find("recipes-inline")?;
    require_eq!(inline.status, LifecycleStatus::New);
    require_eq!(inline.display_tier, DisplayTier::New);

    require_eq!(report.summary.tier_counts[&DisplayTier::Lost], 2);
    require_eq!(report.summary.tier_counts[&DisplayTier::New], 1);
    Ok(())
}

#[tokio::test]
async fn team_perspective_uses_stored_membership() -> WarehouseTestResult {
    let warehouse = seeded_warehouse().await?;
    let report = engine(&warehouse)
        .compare(&request(Perspective::Team)?, &CancellationToken::new())
        .await
        .map_err(|error| error.to_string())?;

    let ids: Vec<&str> = report.rows.iter().map(|row| row.id.as_str()).collect();
    require_eq!(ids, vec!["north", "south"]);
    require_eq!(report.rows[0].child_count, Some(2));

    let owners = engine(&warehouse)
        .compare(&request(Perspective::AccountOwner)?, &CancellationToken::new())
        .await
        .map_err(|error| error.to_string())?;
    let dave_p2 = owners
        .rows
        .iter()
        .find(|row| row.id == "dave")
        .map(|row| row.p2.revenue)
        .ok_or("dave should be an account owner")?;
    require_eq!(dave_p2, Decimal::ZERO);
    require_eq!(
        report.summary.total_revenue_p2,
        owners.summary.total_revenue_p2 - dave_p2
    );
    Ok(())
}

#[tokio::test]
async fn sql_and_in_memory_warehouses_agree() -> WarehouseTestResult {
    let sql = seeded_warehouse().await?;
    let memory = InMemoryWarehouse::default();
    DemoDataset::load(&memory).await.map_err(|error| error.to_string())?;
    let (period1, period2) = DemoDataset::periods().map_err(|error| error.to_string())?;

    for perspective in [
        Perspective::AccountOwner,
        Perspective::Publisher,
        Perspective::MediaProperty,
        Perspective::Product,
        Perspective::Zone,
    ] {
        let filters = Filters::default();
        let sql_rows = sql
            .aggregate(perspective, &filters, &period1, &period2)
            .await
            .map_err(|error| error.to_string())?;
        let memory_rows = memory
            .aggregate(perspective, &filters, &period1, &period2)
            .await
            .map_err(|error| error.to_string())?;

        require_eq!(sql_rows.len(), memory_rows.len());
        for (from_sql, from_memory) in sql_rows.iter().zip(&memory_rows) {
            require_eq!(from_sql.id, from_memory.id);
            require_eq!(from_sql.name, from_memory.name);
            require_eq!(from_sql.parent_id, from_memory.parent_id);
            require_eq!(from_sql.child_count, from_memory.child_count);
            require_eq!(from_sql.p1.revenue, from_memory.p1.revenue);
            require_eq!(from_sql.p2.requests, from_memory.p2.requests);
            require_eq!(from_sql.p2.paid, from_memory.p2.paid);
            let price_gap = match (from_sql.p2.unit_price, from_memory.p2.unit_price) {
                (Some(left), Some(right)) => (left - right).abs(),
                (None, None) => 0.0,
                _ => f64::INFINITY,
            };
            require!(price_gap < 1e-9, "unit price differs for {}", from_sql.id);
        }
    }
    Ok(())
}
