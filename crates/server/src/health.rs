use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use pubscope_db::DbPool;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: HealthCheck,
    /// Freshness of the fact table. An empty warehouse is reported but does
    /// not make the service unready.
    pub warehouse: HealthCheck,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let ready = database.status == "ready";
    let warehouse = if ready {
        warehouse_check(&state.db_pool).await
    } else {
        HealthCheck { status: "unknown", detail: "database unreachable".to_string() }
    };

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        database,
        warehouse,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

async fn warehouse_check(pool: &DbPool) -> HealthCheck {
    let latest = sqlx::query_scalar::<_, Option<String>>("SELECT MAX(stat_date) FROM ad_daily_stats")
        .fetch_one(pool)
        .await;
    match latest {
        Ok(Some(day)) => HealthCheck { status: "ready", detail: format!("latest fact date {day}") },
        Ok(None) => HealthCheck { status: "empty", detail: "no daily facts loaded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("fact table unavailable: {error}") }
        }
    }
}
