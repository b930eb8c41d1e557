use pubscope_core::pipeline::ComparisonRequest;
use pubscope_core::{DateRange, DisplayTier, EngineError, Filters, Perspective};

use crate::commands::{run_report, CommandResult};

/// Raw command-line inputs. Parsed here rather than by clap so that bad
/// values surface as structured `invalid_request` payloads.
#[derive(Debug, Clone, Default)]
pub struct CompareArgs {
    pub perspective: String,
    pub period1: String,
    pub period2: String,
    pub filters: Vec<String>,
    pub tier: Option<String>,
}

impl CompareArgs {
    pub fn into_request(self) -> Result<ComparisonRequest, EngineError> {
        Ok(ComparisonRequest {
            perspective: self.perspective.parse::<Perspective>()?,
            period1: self.period1.parse::<DateRange>()?,
            period2: self.period2.parse::<DateRange>()?,
            filters: Filters::parse_all(&self.filters)?,
            tier_filter: DisplayTier::parse_filter(self.tier.as_deref())?,
        })
    }
}

pub fn run(args: CompareArgs) -> CommandResult {
    let request = match args.into_request() {
        Ok(request) => request,
        Err(error) => return CommandResult::failure("compare", "invalid_request", error.to_string(), 7),
    };

    run_report("compare", |engine, cancel| async move { engine.compare(&request, &cancel).await })
}

#[cfg(test)]
mod tests {
    use pubscope_core::{DisplayTier, EngineError, Perspective};

    use super::CompareArgs;

    fn args() -> CompareArgs {
        CompareArgs {
            perspective: "pid".to_string(),
            period1: "2026-01-01..2026-01-31".to_string(),
            period2: "2026-02-01..2026-02-28".to_string(),
            filters: vec!["product=video,display".to_string()],
            tier: Some("lost".to_string()),
        }
    }

    #[test]
    fn parses_codes_filters_and_tier() {
        let request = args().into_request().expect("request");
        assert_eq!(request.perspective, Perspective::Publisher);
        assert_eq!(request.filters.clauses().len(), 1);
        assert_eq!(request.tier_filter, Some(DisplayTier::Lost));
    }

    #[test]
    fn unknown_values_fail_with_typed_errors() {
        let mut bad = args();
        bad.perspective = "country".to_string();
        assert!(matches!(bad.into_request(), Err(EngineError::InvalidPerspective(_))));

        let mut bad = args();
        bad.tier = Some("D".to_string());
        assert!(matches!(bad.into_request(), Err(EngineError::InvalidTierFilter(_))));

        let mut bad = args();
        bad.period2 = "2026-02-28..2026-02-01".to_string();
        assert!(matches!(bad.into_request(), Err(EngineError::InvalidPeriod(_))));
    }
}
