//! Reporting period identifiers returned by the `GetPeriods` endpoint.

use super::provider::FetchError;
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::fmt;

/// An API period identifier together with the calendar date it denotes.
///
/// The raw string is kept untouched because it is the lookup key for the
/// institution-data endpoint. Ordering is by date, then by raw string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReportingPeriod {
    raw: String,
    date: NaiveDate,
}

impl ReportingPeriod {
    /// Parse an identifier such as `2021-03-31` or `2021-03-31T00:00:00`.
    pub fn parse(raw: &str) -> Result<Self, FetchError> {
        let invalid = || FetchError::InvalidPeriod(raw.to_string());
        let (date_part, rest) = match raw.get(..10) {
            Some(head) => (head, &raw[10..]),
            None => return Err(invalid()),
        };
        if !(rest.is_empty() || rest.starts_with('T') || rest.starts_with(' ')) {
            return Err(invalid());
        }
        let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| invalid())?;
        Ok(Self {
            raw: raw.to_string(),
            date,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Inclusive range check on the calendar date.
    pub fn within(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start <= self.date && self.date <= end
    }
}

impl Ord for ReportingPeriod {
    fn cmp(&self, other: &Self) -> Ordering {
        self.date
            .cmp(&other.date)
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for ReportingPeriod {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ReportingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Keep the periods inside `[start, end]` and sort them ascending.
pub fn select_range(
    periods: Vec<ReportingPeriod>,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<ReportingPeriod> {
    let mut selected: Vec<ReportingPeriod> =
        periods.into_iter().filter(|p| p.within(start, end)).collect();
    selected.sort();
    selected
}
