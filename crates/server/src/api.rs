//! JSON endpoints for comparison and drill-down reports.
//!
//! Bodies carry the same textual inputs the CLI accepts; parsing happens
//! here so every failure maps onto a structured error payload.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use pubscope_core::pipeline::{ComparisonEngine, ComparisonRequest};
use pubscope_core::{
    ComparisonReport, DateRange, DisplayTier, DrillDownRequest, EngineError, Filters,
    InterfaceError, Perspective,
};
use pubscope_db::SqlWarehouse;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

pub type WarehouseEngine = ComparisonEngine<SqlWarehouse, SqlWarehouse, SqlWarehouse>;

const CORRELATION_HEADER: HeaderName = HeaderName::from_static("x-correlation-id");

#[derive(Clone)]
pub struct ApiState {
    engine: Arc<WarehouseEngine>,
    request_timeout: Duration,
}

impl ApiState {
    pub fn new(engine: WarehouseEngine, request_timeout: Duration) -> Self {
        Self { engine: Arc::new(engine), request_timeout }
    }
}

#[derive(Debug, Deserialize)]
pub struct CompareBody {
    pub perspective: String,
    pub period1: String,
    pub period2: String,
    /// Clauses written as `dimension=id1,id2`.
    #[serde(default)]
    pub filters: Vec<String>,
    #[serde(default)]
    pub tier: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DrillDownBody {
    pub parent: String,
    pub parent_id: String,
    pub period1: String,
    pub period2: String,
    #[serde(default)]
    pub filters: Vec<String>,
    #[serde(default)]
    pub tier: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: &'static str,
    pub detail: String,
    pub correlation_id: String,
}

pub struct ApiError(InterfaceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let correlation_id = self.0.correlation_id().to_string();
        let body = ApiErrorBody {
            error: self.0.user_message(),
            detail: self.0.to_string(),
            correlation_id: correlation_id.clone(),
        };
        with_correlation(status, &correlation_id, Json(body))
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/compare", post(compare))
        .route("/api/drilldown", post(drill_down))
        .with_state(state)
}

impl TryFrom<CompareBody> for ComparisonRequest {
    type Error = EngineError;

    fn try_from(body: CompareBody) -> Result<Self, Self::Error> {
        Ok(ComparisonRequest {
            perspective: body.perspective.parse::<Perspective>()?,
            period1: body.period1.parse::<DateRange>()?,
            period2: body.period2.parse::<DateRange>()?,
            filters: Filters::parse_all(&body.filters)?,
            tier_filter: DisplayTier::parse_filter(body.tier.as_deref())?,
        })
    }
}

impl TryFrom<DrillDownBody> for DrillDownRequest {
    type Error = EngineError;

    fn try_from(body: DrillDownBody) -> Result<Self, Self::Error> {
        Ok(DrillDownRequest {
            parent: body.parent.parse::<Perspective>()?,
            parent_id: body.parent_id,
            period1: body.period1.parse::<DateRange>()?,
            period2: body.period2.parse::<DateRange>()?,
            filters: Filters::parse_all(&body.filters)?,
            tier_filter: DisplayTier::parse_filter(body.tier.as_deref())?,
        })
    }
}

async fn compare(
    State(state): State<ApiState>,
    body: Result<Json<CompareBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let span = tracing::info_span!("api.compare", correlation_id = %correlation_id);

    async move {
        let Json(body) = body.map_err(|rejection| malformed(rejection, &correlation_id))?;
        let request = ComparisonRequest::try_from(body)
            .map_err(|error| ApiError(error.into_interface(correlation_id.as_str())))?;

        let cancel = CancellationToken::new();
        let report = with_deadline(
            state.request_timeout,
            &cancel,
            state.engine.compare(&request, &cancel),
        )
        .await
        .map_err(|error| ApiError(error.into_interface(correlation_id.as_str())))?;

        respond(&correlation_id, &report)
    }
    .instrument(span)
    .await
}

async fn drill_down(
    State(state): State<ApiState>,
    body: Result<Json<DrillDownBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let span = tracing::info_span!("api.drill_down", correlation_id = %correlation_id);

    async move {
        let Json(body) = body.map_err(|rejection| malformed(rejection, &correlation_id))?;
        let request = DrillDownRequest::try_from(body)
            .map_err(|error| ApiError(error.into_interface(correlation_id.as_str())))?;

        let cancel = CancellationToken::new();
        let report = with_deadline(
            state.request_timeout,
            &cancel,
            state.engine.drill_down(&request, &cancel),
        )
        .await
        .map_err(|error| ApiError(error.into_interface(correlation_id.as_str())))?;

        respond(&correlation_id, &report)
    }
    .instrument(span)
    .await
}

/// Drives `work` to completion. Once `timeout` elapses the token is
/// cancelled and `work` keeps running until the engine observes it, so the
/// result is whatever the engine itself returns.
async fn with_deadline<F>(
    timeout: Duration,
    cancel: &CancellationToken,
    work: F,
) -> Result<ComparisonReport, EngineError>
where
    F: Future<Output = Result<ComparisonReport, EngineError>>,
{
    let mut work = std::pin::pin!(work);
    tokio::select! {
        result = &mut work => result,
        _ = tokio::time::sleep(timeout) => {
            cancel.cancel();
            warn!(
                event_name = "api.request.timed_out",
                timeout_ms = timeout.as_millis() as u64,
                "request exceeded its deadline"
            );
            work.await
        }
    }
}

fn malformed(rejection: JsonRejection, correlation_id: &str) -> ApiError {
    ApiError(InterfaceError::BadRequest {
        message: rejection.body_text(),
        correlation_id: correlation_id.to_string(),
    })
}

fn respond(correlation_id: &str, report: &ComparisonReport) -> Result<Response, ApiError> {
    let body = serde_json::to_vec(report).map_err(|error| {
        ApiError(InterfaceError::Internal {
            message: format!("report serialization failed: {error}"),
            correlation_id: correlation_id.to_string(),
        })
    })?;

    info!(
        event_name = "api.request.completed",
        perspective = %report.perspective,
        rows = report.rows.len(),
        total_items = report.summary.total_items,
        "report served"
    );
    Ok(with_correlation(
        StatusCode::OK,
        correlation_id,
        ([(header::CONTENT_TYPE, "application/json")], body),
    ))
}

fn with_correlation(status: StatusCode, correlation_id: &str, body: impl IntoResponse) -> Response {
    let mut response = (status, body).into_response();
    if let Ok(value) = HeaderValue::from_str(correlation_id) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}
