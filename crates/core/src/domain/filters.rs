use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::perspective::Perspective;
use crate::errors::EngineError;

/// Restricts one dimension to a set of ids. Values within a clause are alternatives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterClause {
    pub dimension: Perspective,
    pub values: Vec<String>,
}

impl FilterClause {
    pub fn new(dimension: Perspective, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { dimension, values: values.into_iter().map(Into::into).collect() }
    }

    pub fn matches(&self, value: &str) -> bool {
        self.values.iter().any(|candidate| candidate == value)
    }
}

impl FromStr for FilterClause {
    type Err = EngineError;

    /// Parses `key=v1,v2`, where `key` is a perspective code.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (key, raw_values) = value
            .split_once('=')
            .ok_or_else(|| EngineError::InvalidFilter(format!("expected key=value, got `{value}`")))?;
        let dimension = key.parse::<Perspective>()?;
        let values: Vec<String> = raw_values
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect();
        if values.is_empty() {
            return Err(EngineError::InvalidFilter(format!("filter `{key}` has no values")));
        }
        Ok(Self { dimension, values })
    }
}

/// Conjunction of filter clauses passed through to the aggregation adapter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filters {
    clauses: Vec<FilterClause>,
}

impl Filters {
    pub fn new(clauses: Vec<FilterClause>) -> Self {
        Self { clauses }
    }

    /// Parses every `key=v1,v2` clause, failing on the first bad one.
    pub fn parse_all<S: AsRef<str>>(raw: &[S]) -> Result<Self, EngineError> {
        raw.iter().map(|clause| clause.as_ref().parse::<FilterClause>()).collect()
    }

    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }

    pub fn with(mut self, clause: FilterClause) -> Self {
        self.clauses.push(clause);
        self
    }

    /// Scope to the children of one parent entity.
    pub fn narrowed_to(&self, dimension: Perspective, id: impl Into<String>) -> Self {
        self.clone().with(FilterClause::new(dimension, [id.into()]))
    }

    /// Separates team clauses, which only the engine can resolve, from the
    /// clauses the warehouse understands natively.
    pub fn split_team(&self) -> (Vec<FilterClause>, Filters) {
        let (team, native): (Vec<_>, Vec<_>) =
            self.clauses.iter().cloned().partition(|clause| clause.dimension == Perspective::Team);
        (team, Filters::new(native))
    }

    /// A row passes when every clause on a dimension the row exposes matches.
    pub fn accepts(&self, lookup: impl Fn(Perspective) -> Option<String>) -> bool {
        self.clauses.iter().all(|clause| match lookup(clause.dimension) {
            Some(value) => clause.matches(&value),
            None => false,
        })
    }
}

impl FromIterator<FilterClause> for Filters {
    fn from_iter<T: IntoIterator<Item = FilterClause>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{FilterClause, Filters};
    use crate::domain::perspective::Perspective;

    #[test]
    fn parses_multi_value_clause() {
        let clause: FilterClause = "pid=101, 102".parse().expect("clause");
        assert_eq!(clause.dimension, Perspective::Publisher);
        assert_eq!(clause.values, vec!["101".to_string(), "102".to_string()]);
    }

    #[test]
    fn rejects_unknown_key_and_empty_values() {
        assert!("country=id".parse::<FilterClause>().is_err());
        assert!("pid=".parse::<FilterClause>().is_err());
        assert!("pid".parse::<FilterClause>().is_err());
    }

    #[test]
    fn parse_all_stops_at_first_invalid_clause() {
        let parsed = Filters::parse_all(&["product=video", "pic=alice"]).expect("filters");
        assert_eq!(parsed.clauses().len(), 2);
        assert!(Filters::parse_all(&["product=video", "pic"]).is_err());
    }

    #[test]
    fn split_team_keeps_native_clauses_in_order() {
        let filters: Filters = [
            FilterClause::new(Perspective::Product, ["video"]),
            FilterClause::new(Perspective::Team, ["t1"]),
            FilterClause::new(Perspective::Publisher, ["p1"]),
        ]
        .into_iter()
        .collect();

        let (team, native) = filters.split_team();
        assert_eq!(team.len(), 1);
        assert_eq!(native.clauses().len(), 2);
        assert_eq!(native.clauses()[0].dimension, Perspective::Product);
    }

    #[test]
    fn accepts_requires_every_clause() {
        let filters = Filters::default()
            .narrowed_to(Perspective::Publisher, "p1")
            .narrowed_to(Perspective::Product, "video");

        assert!(filters.accepts(|dimension| match dimension {
            Perspective::Publisher => Some("p1".to_string()),
            Perspective::Product => Some("video".to_string()),
            _ => None,
        }));
        assert!(!filters.accepts(|dimension| match dimension {
            Perspective::Publisher => Some("p1".to_string()),
            _ => None,
        }));
    }
}
