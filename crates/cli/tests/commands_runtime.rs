use std::env;
use std::sync::{Mutex, OnceLock};

use pubscope_cli::commands::compare::CompareArgs;
use pubscope_cli::commands::drill::DrillArgs;
use pubscope_cli::commands::{compare, drill, migrate, seed};
use serde_json::Value;

const JANUARY: &str = "2026-01-01..2026-01-31";
const FEBRUARY: &str = "2026-02-01..2026-02-28";

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("PUBSCOPE_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_invalid_thresholds() {
    with_env(
        &[
            ("PUBSCOPE_DATABASE_URL", "sqlite::memory:"),
            ("PUBSCOPE_ENGINE_TIER_A_MAX_PCT", "99"),
        ],
        || {
            let result = migrate::run();
            assert_eq!(result.exit_code, 2, "expected config validation failure code");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["status"], "error");
            assert_eq!(payload["error_class"], "config_validation");
        },
    );
}

#[test]
fn seed_reports_loaded_demo_warehouse() {
    with_env(&[("PUBSCOPE_DATABASE_URL", "sqlite::memory:")], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected seed success: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");

        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("demo warehouse loaded"));
        assert!(message.contains("pubscope compare --perspective pid"));
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);
    with_env(&[("PUBSCOPE_DATABASE_URL", url.as_str())], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");

        assert_eq!(parse_payload(&first.output)["message"], parse_payload(&second.output)["message"]);
    });
}

#[test]
fn compare_over_seeded_warehouse_returns_tiered_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);
    with_env(&[("PUBSCOPE_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run().exit_code, 0, "expected seed success");

        let result = compare::run(CompareArgs {
            perspective: "zid".to_string(),
            period1: JANUARY.to_string(),
            period2: FEBRUARY.to_string(),
            ..CompareArgs::default()
        });
        assert_eq!(result.exit_code, 0, "expected compare success: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "compare");
        assert_eq!(payload["data"]["perspective"], "zone");
        assert_eq!(payload["data"]["summary"]["tier_counts"]["LOST"], 2);
        assert_eq!(payload["data"]["summary"]["tier_counts"]["NEW"], 1);

        let ranks = payload["data"]["rows"]
            .as_array()
            .map(|rows| rows.iter().map(|row| row["ranking"]["rank"].clone()).collect::<Vec<_>>())
            .unwrap_or_default();
        assert!(!ranks.is_empty());
        assert_eq!(ranks[0], 1);
    });
}

#[test]
fn compare_tier_filter_keeps_only_matching_rows() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);
    with_env(&[("PUBSCOPE_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run().exit_code, 0, "expected seed success");

        let result = compare::run(CompareArgs {
            perspective: "zid".to_string(),
            period1: JANUARY.to_string(),
            period2: FEBRUARY.to_string(),
            filters: Vec::new(),
            tier: Some("lost".to_string()),
        });
        assert_eq!(result.exit_code, 0, "expected compare success: {}", result.output);

        let payload = parse_payload(&result.output);
        let rows = payload["data"]["rows"].as_array().cloned().unwrap_or_default();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row["display_tier"] == "LOST"));
        assert_eq!(payload["data"]["tier_filter"], "LOST");
    });
}

#[test]
fn compare_rejects_unknown_perspective() {
    with_env(&[("PUBSCOPE_DATABASE_URL", "sqlite::memory:")], || {
        let result = compare::run(CompareArgs {
            perspective: "country".to_string(),
            period1: JANUARY.to_string(),
            period2: FEBRUARY.to_string(),
            ..CompareArgs::default()
        });
        assert_eq!(result.exit_code, 7, "expected invalid request code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "invalid_request");
    });
}

#[test]
fn drill_scopes_children_to_parent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);
    with_env(&[("PUBSCOPE_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run().exit_code, 0, "expected seed success");

        let result = drill::run(DrillArgs {
            parent: "pid".to_string(),
            parent_id: "pub-news".to_string(),
            period1: JANUARY.to_string(),
            period2: FEBRUARY.to_string(),
            ..DrillArgs::default()
        });
        assert_eq!(result.exit_code, 0, "expected drill success: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["perspective"], "media_property");
        assert_eq!(payload["data"]["parent"]["id"], "pub-news");
        let rows = payload["data"]["rows"].as_array().cloned().unwrap_or_default();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row["parent_id"] == "pub-news"));
    });
}

#[test]
fn drill_rejects_terminal_parent() {
    with_env(&[("PUBSCOPE_DATABASE_URL", "sqlite::memory:")], || {
        let result = drill::run(DrillArgs {
            parent: "product".to_string(),
            parent_id: "video".to_string(),
            period1: JANUARY.to_string(),
            period2: FEBRUARY.to_string(),
            ..DrillArgs::default()
        });
        assert_eq!(result.exit_code, 7);
        assert_eq!(parse_payload(&result.output)["error_class"], "invalid_request");
    });
}

fn database_url(dir: &tempfile::TempDir) -> String {
    format!("sqlite://{}", dir.path().join("pubscope.db").display())
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "PUBSCOPE_DATABASE_URL",
        "PUBSCOPE_DATABASE_MAX_CONNECTIONS",
        "PUBSCOPE_DATABASE_TIMEOUT_SECS",
        "PUBSCOPE_SERVER_BIND_ADDRESS",
        "PUBSCOPE_SERVER_PORT",
        "PUBSCOPE_SERVER_REQUEST_TIMEOUT_SECS",
        "PUBSCOPE_ENGINE_TIER_A_MAX_PCT",
        "PUBSCOPE_ENGINE_TIER_B_MAX_PCT",
        "PUBSCOPE_ENGINE_LOST_IMPACT_MONTHS",
        "PUBSCOPE_LOGGING_LEVEL",
        "PUBSCOPE_LOGGING_FORMAT",
        "PUBSCOPE_LOG_LEVEL",
        "PUBSCOPE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
