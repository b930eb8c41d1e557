use pubscope_core::config::{AppConfig, LoadOptions};
use pubscope_db::connect_with_config;
use pubscope_db::migrations::{self, MIGRATOR};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_tier_thresholds(&config));
            checks.extend(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["tier_thresholds", "database_connectivity", "schema_version"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_tier_thresholds(config: &AppConfig) -> DoctorCheck {
    let settings = config.engine.settings();
    DoctorCheck {
        name: "tier_thresholds",
        status: CheckStatus::Pass,
        details: format!(
            "A <= {}%, B <= {}%, C above; lost impact over {} months",
            settings.tiers.a_max_pct, settings.tiers.b_max_pct, settings.lost_impact_months
        ),
    }
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            }];
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| format!("failed to connect to database: {error}"))?;

        let applied = migrations::applied_count(&pool).await.ok();
        pool.close().await;
        Ok::<Option<i64>, String>(applied)
    });

    match result {
        Ok(applied) => {
            let expected = MIGRATOR.iter().count() as i64;
            let schema = match applied {
                Some(count) if count >= expected => DoctorCheck {
                    name: "schema_version",
                    status: CheckStatus::Pass,
                    details: format!("{count} of {expected} migrations applied"),
                },
                Some(count) => DoctorCheck {
                    name: "schema_version",
                    status: CheckStatus::Fail,
                    details: format!(
                        "{count} of {expected} migrations applied; run `pubscope migrate`"
                    ),
                },
                None => DoctorCheck {
                    name: "schema_version",
                    status: CheckStatus::Fail,
                    details: "schema is not initialized; run `pubscope migrate`".to_string(),
                },
            };
            vec![
                DoctorCheck {
                    name: "database_connectivity",
                    status: CheckStatus::Pass,
                    details: format!("connected using `{}`", config.database.url),
                },
                schema,
            ]
        }
        Err(error) => vec![
            DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details: error },
            DoctorCheck {
                name: "schema_version",
                status: CheckStatus::Skipped,
                details: "skipped because the database is unreachable".to_string(),
            },
        ],
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
