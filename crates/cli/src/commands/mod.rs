pub mod compare;
pub mod config;
pub mod doctor;
pub mod drill;
pub mod migrate;
pub mod seed;

use std::future::Future;

use pubscope_core::config::{AppConfig, LoadOptions};
use pubscope_core::pipeline::ComparisonEngine;
use pubscope_core::{ComparisonReport, DisplayTier, EngineError};
use pubscope_db::{connect_with_config, migrations, SqlWarehouse};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, None)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

type CommandFailure = (&'static str, String, u8);

pub(crate) type SqlEngine = ComparisonEngine<SqlWarehouse, SqlWarehouse, SqlWarehouse>;

/// Loads config and a single-threaded runtime, or the structured failure for
/// whichever step broke.
pub(crate) fn prepare(command: &str) -> Result<(AppConfig, tokio::runtime::Runtime), CommandResult> {
    let config = AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })?;

    let runtime =
        tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
            CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            )
        })?;

    Ok((config, runtime))
}

fn engine_failure(error: EngineError) -> CommandFailure {
    if error.is_validation() {
        return ("invalid_request", error.to_string(), 7);
    }
    match error {
        EngineError::Cancelled => ("cancelled", error.to_string(), 9),
        other => ("engine_adapter", other.to_string(), 8),
    }
}

/// Runs one engine invocation against the configured warehouse and renders
/// the report as the command payload.
pub(crate) fn run_report<F, Fut>(command: &str, work: F) -> CommandResult
where
    F: FnOnce(SqlEngine, CancellationToken) -> Fut,
    Fut: Future<Output = Result<ComparisonReport, EngineError>>,
{
    let (config, runtime) = match prepare(command) {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let warehouse = SqlWarehouse::new(pool.clone());
        let engine = ComparisonEngine::new(
            warehouse.clone(),
            warehouse.clone(),
            warehouse,
            config.engine.settings(),
        );
        let report = work(engine, CancellationToken::new()).await.map_err(engine_failure);
        pool.close().await;
        report
    });

    match result {
        Ok(report) => match serde_json::to_value(&report) {
            Ok(data) => CommandResult::success_with_data(command, describe(&report), Some(data)),
            Err(error) => CommandResult::failure(command, "serialization", error.to_string(), 10),
        },
        Err((error_class, message, exit_code)) => {
            CommandResult::failure(command, error_class, message, exit_code)
        }
    }
}

fn describe(report: &ComparisonReport) -> String {
    let tiers = DisplayTier::ALL
        .iter()
        .map(|tier| {
            let count = report.summary.tier_counts.get(tier).copied().unwrap_or_default();
            format!("{tier}={count}")
        })
        .collect::<Vec<_>>()
        .join(" ");
    let scope = match &report.parent {
        Some(parent) => format!(" under {} `{}`", parent.perspective, parent.id),
        None => String::new(),
    };

    format!(
        "{} {} entities{scope} ({}), revenue {} -> {} ({:+.2}%), {} rows returned",
        report.summary.total_items,
        report.perspective,
        tiers,
        report.summary.total_revenue_p1,
        report.summary.total_revenue_p2,
        report.summary.revenue_change_pct,
        report.rows.len()
    )
}

#[cfg(test)]
mod tests {
    use pubscope_core::{AdapterError, Collaborator, EngineError};

    use super::engine_failure;

    #[test]
    fn engine_errors_map_to_distinct_exit_codes() {
        let (class, _, code) = engine_failure(EngineError::InvalidPeriod("reversed".to_string()));
        assert_eq!((class, code), ("invalid_request", 7));

        let (class, _, code) = engine_failure(EngineError::InvalidDrillDown("terminal".to_string()));
        assert_eq!((class, code), ("invalid_request", 7));

        let adapter = AdapterError::new(Collaborator::Aggregation, "warehouse unavailable");
        let (class, message, code) = engine_failure(EngineError::Adapter(adapter));
        assert_eq!((class, code), ("engine_adapter", 8));
        assert!(message.contains("warehouse unavailable"));

        let (class, _, code) = engine_failure(EngineError::Cancelled);
        assert_eq!((class, code), ("cancelled", 9));
    }
}
