pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::process::ExitCode;

use commands::compare::CompareArgs;
use commands::drill::DrillArgs;

#[derive(Debug, Parser)]
#[command(
    name = "pubscope",
    about = "Pubscope operator CLI",
    long_about = "Compare publisher revenue across two periods, tier entities by contribution, and drill down the publisher hierarchy.",
    after_help = "Examples:\n  pubscope seed\n  pubscope compare --perspective pid --period1 2026-01-01..2026-01-31 --period2 2026-02-01..2026-02-28\n  pubscope drill --parent pid --parent-id pub-news --period1 2026-01-01..2026-01-31 --period2 2026-02-01..2026-02-28 --tier lost\n  pubscope doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct PeriodArgs {
    #[arg(long, help = "Baseline period as YYYY-MM-DD..YYYY-MM-DD (inclusive)")]
    period1: String,
    #[arg(long, help = "Comparison period as YYYY-MM-DD..YYYY-MM-DD (inclusive)")]
    period2: String,
    #[arg(
        long = "filter",
        help = "Restrict facts with `dimension=id1,id2`; repeat to intersect"
    )]
    filters: Vec<String>,
    #[arg(long, help = "Only return rows of this tier (A, B, C, NEW, LOST)")]
    tier: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo warehouse (daily facts and teams)")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, tier thresholds, DB connectivity, and schema version")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Rank and tier every entity of a perspective across two periods")]
    Compare {
        #[arg(long, help = "pic, pid, mid, product, zid, or team")]
        perspective: String,
        #[command(flatten)]
        periods: PeriodArgs,
    },
    #[command(about = "Compare the children of one entity, scoped to that entity")]
    Drill {
        #[arg(long, help = "Perspective of the entity being expanded")]
        parent: String,
        #[arg(long = "parent-id", help = "Identifier of the entity being expanded")]
        parent_id: String,
        #[command(flatten)]
        periods: PeriodArgs,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Compare { perspective, periods } => commands::compare::run(CompareArgs {
            perspective,
            period1: periods.period1,
            period2: periods.period2,
            filters: periods.filters,
            tier: periods.tier,
        }),
        Command::Drill { parent, parent_id, periods } => commands::drill::run(DrillArgs {
            parent,
            parent_id,
            period1: periods.period1,
            period2: periods.period2,
            filters: periods.filters,
            tier: periods.tier,
        }),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
