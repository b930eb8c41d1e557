use crate::commands::{prepare, CommandResult};
use pubscope_db::{connect_with_config, migrations, DemoDataset, SeedSummary, SqlWarehouse};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
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

        let summary = DemoDataset::load(&SqlWarehouse::new(pool.clone()))
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = DemoDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let run_result = if verification.all_present {
            Ok(summary)
        } else {
            let failed_checks = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(*check))
                .collect::<Vec<_>>();
            Err(("seed_verification", verification_failure_message(&failed_checks), 6u8))
        };

        pool.close().await;
        run_result
    });

    match result {
        Ok(summary) => CommandResult::success("seed", seeded_message(&summary)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn seeded_message(summary: &SeedSummary) -> String {
    let periods = DemoDataset::periods()
        .map(|(period1, period2)| format!("--period1 {period1} --period2 {period2}"))
        .unwrap_or_default();
    format!(
        "demo warehouse loaded: {} daily facts from {} to {}, {} teams\ntry: pubscope compare --perspective pid {periods}",
        summary.facts, summary.first_day, summary.last_day, summary.groups
    )
}

fn verification_failure_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "some seed data failed to load".to_string()
    } else {
        format!("seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::verification_failure_message;

    #[test]
    fn verification_error_message_targets_failed_checks() {
        let checks = [("daily-facts", true), ("games-feed", false), ("north", false)];

        let failed_checks = checks
            .iter()
            .filter_map(|(check, passed)| (!passed).then_some(*check))
            .collect::<Vec<_>>();

        assert_eq!(
            verification_failure_message(&failed_checks),
            "seed verification failed for checks: games-feed, north"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        assert_eq!(verification_failure_message(&[]), "some seed data failed to load");
    }
}
