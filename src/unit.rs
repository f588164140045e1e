use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Calendar month, ordered January → December.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Month {
    January,
    February,
    March,
    April,
    May,
    June,
    July,
    August,
    September,
    October,
    November,
    December,
}

impl Month {
    pub const ALL: [Month; 12] = [
        Month::January,
        Month::February,
        Month::March,
        Month::April,
        Month::May,
        Month::June,
        Month::July,
        Month::August,
        Month::September,
        Month::October,
        Month::November,
        Month::December,
    ];

    /// Lowercase English name, as used in directory names and progress files.
    pub fn name(self) -> &'static str {
        match self {
            Month::January => "january",
            Month::February => "february",
            Month::March => "march",
            Month::April => "april",
            Month::May => "may",
            Month::June => "june",
            Month::July => "july",
            Month::August => "august",
            Month::September => "september",
            Month::October => "october",
            Month::November => "november",
            Month::December => "december",
        }
    }

    /// Three-letter form used in lawphil URLs ("aug").
    pub fn abbrev(self) -> &'static str {
        &self.name()[..3]
    }

    pub fn number(self) -> u32 {
        self as u32 + 1
    }

    /// Accepts full names, 3-letter abbreviations, "sept" and 1–12.
    pub fn parse(s: &str) -> Option<Month> {
        let s = s.trim().to_ascii_lowercase();
        if let Ok(n) = s.parse::<usize>() {
            return (1..=12).contains(&n).then(|| Month::ALL[n - 1]);
        }
        if s == "sept" {
            return Some(Month::September);
        }
        Month::ALL
            .into_iter()
            .find(|m| m.name() == s || (s.len() == 3 && m.abbrev() == s))
    }

    /// "August"
    pub fn title(self) -> String {
        let name = self.name();
        let mut chars = name.chars();
        match chars.next() {
            Some(c) => c.to_ascii_uppercase().to_string() + chars.as_str(),
            None => String::new(),
        }
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One (year, month) granule of extraction work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkUnit {
    pub year: i32,
    pub month: Month,
}

/// The published archive starts with the August 1901 decisions.
pub const ARCHIVE_START: WorkUnit = WorkUnit {
    year: 1901,
    month: Month::August,
};

impl WorkUnit {
    pub fn new(year: i32, month: Month) -> Self {
        Self { year, month }
    }
}

impl fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.year, self.month)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid work unit '{0}', expected <year>-<month>")]
pub struct ParseUnitError(String);

impl FromStr for WorkUnit {
    type Err = ParseUnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| ParseUnitError(s.to_string()))?;
        let year = year
            .parse::<i32>()
            .map_err(|_| ParseUnitError(s.to_string()))?;
        let month = Month::parse(month).ok_or_else(|| ParseUnitError(s.to_string()))?;
        Ok(WorkUnit { year, month })
    }
}

impl Serialize for WorkUnit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WorkUnit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Ordered work list for `[start_year, end_year]`, clipped to the archive start.
pub fn work_units(start_year: i32, end_year: i32) -> Vec<WorkUnit> {
    (start_year..=end_year)
        .flat_map(|year| Month::ALL.into_iter().map(move |m| WorkUnit::new(year, m)))
        .filter(|u| *u >= ARCHIVE_START)
        .collect()
}
