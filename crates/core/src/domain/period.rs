use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::EngineError;

/// Closed calendar-date interval; both endpoints are inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, EngineError> {
        if end < start {
            return Err(EngineError::InvalidPeriod(format!(
                "end {end} is before start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        Self::new(self.start, self.end).map(|_| ())
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

impl FromStr for DateRange {
    type Err = EngineError;

    /// Parses `YYYY-MM-DD..YYYY-MM-DD`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (start, end) = value
            .trim()
            .split_once("..")
            .ok_or_else(|| EngineError::InvalidPeriod(format!("expected start..end, got `{value}`")))?;
        Self::new(parse_date(start)?, parse_date(end)?)
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, EngineError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|error| EngineError::InvalidPeriod(format!("`{value}`: {error}")))
}

/// A calendar month, used for trailing revenue history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(date: NaiveDate) -> Self {
        Self { year: date.year(), month: date.month() }
    }

    pub fn months_back(&self, count: u32) -> Self {
        let index = self.year * 12 + self.month as i32 - 1 - count as i32;
        Self { year: index.div_euclid(12), month: index.rem_euclid(12) as u32 + 1 }
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }
}

/// Date span covering `months` whole calendar months ending with the month of `ending_at`,
/// clipped at `ending_at` itself.
pub fn trailing_months(ending_at: NaiveDate, months: u32) -> Option<DateRange> {
    let first = YearMonth::of(ending_at).months_back(months.saturating_sub(1)).first_day()?;
    Some(DateRange { start: first, end: ending_at })
}
