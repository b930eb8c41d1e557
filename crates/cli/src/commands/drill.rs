use pubscope_core::{DateRange, DisplayTier, DrillDownRequest, EngineError, Filters, Perspective};

use crate::commands::{run_report, CommandResult};

#[derive(Debug, Clone, Default)]
pub struct DrillArgs {
    pub parent: String,
    pub parent_id: String,
    pub period1: String,
    pub period2: String,
    pub filters: Vec<String>,
    pub tier: Option<String>,
}

impl DrillArgs {
    pub fn into_request(self) -> Result<DrillDownRequest, EngineError> {
        let request = DrillDownRequest {
            parent: self.parent.parse::<Perspective>()?,
            parent_id: self.parent_id,
            period1: self.period1.parse::<DateRange>()?,
            period2: self.period2.parse::<DateRange>()?,
            filters: Filters::parse_all(&self.filters)?,
            tier_filter: DisplayTier::parse_filter(self.tier.as_deref())?,
        };
        // Rejects terminal parents before touching the warehouse.
        request.child_request()?;
        Ok(request)
    }
}

pub fn run(args: DrillArgs) -> CommandResult {
    let request = match args.into_request() {
        Ok(request) => request,
        Err(error) => return CommandResult::failure("drill", "invalid_request", error.to_string(), 7),
    };

    run_report("drill", |engine, cancel| async move { engine.drill_down(&request, &cancel).await })
}
