// 📅 Year-month keys used to bucket expenses
//
// Ordering is chronological, Display is `YYYY-MM`.

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Returns `None` unless `month` is 1..=12
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Month of the local wall clock
    pub fn current() -> Self {
        Self::from_date(Local::now().date_naive())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// One month earlier; January wraps to December of the prior year
    pub fn prev(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// One month later; December wraps to January of the next year
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn step_back(&self, months: u32) -> Self {
        let index = self.year as i64 * 12 + (self.month as i64 - 1) - months as i64;
        Self {
            year: index.div_euclid(12) as i32,
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    /// `count` keys starting at `self` and walking backwards (newest first)
    pub fn trailing(&self, count: usize) -> Vec<YearMonth> {
        let mut out = Vec::with_capacity(count);
        let mut cursor = *self;
        for _ in 0..count {
            out.push(cursor);
            cursor = cursor.prev();
        }
        out
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidMonth(s.to_string());

        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;

        YearMonth::new(year, month).ok_or_else(invalid)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ym(s: &str) -> YearMonth {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        let key = ym("2024-03");
        assert_eq!(key.year(), 2024);
        assert_eq!(key.month(), 3);
        assert_eq!(key.to_string(), "2024-03");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for input in ["2024", "2024-13", "2024-00", "24-01", "2024-1", "abcd-ef", ""] {
            assert!(input.parse::<YearMonth>().is_err(), "{:?}", input);
        }
    }

    #[test]
    fn test_prev_wraps_year() {
        assert_eq!(ym("2024-01").prev(), ym("2023-12"));
        assert_eq!(ym("2024-05").prev(), ym("2024-04"));
        assert_eq!(ym("2023-12").next(), ym("2024-01"));
    }

    #[test]
    fn test_step_back_across_years() {
        assert_eq!(ym("2024-01").step_back(1), ym("2023-12"));
        assert_eq!(ym("2024-01").step_back(13), ym("2022-12"));
        assert_eq!(ym("2024-06").step_back(0), ym("2024-06"));
        assert_eq!(ym("2024-06").step_back(30), ym("2021-12"));
    }

    #[test]
    fn test_step_back_matches_repeated_prev() {
        let start = ym("2025-02");
        let mut cursor = start;
        for n in 0..40 {
            assert_eq!(start.step_back(n), cursor);
            cursor = cursor.prev();
        }
    }

    #[test]
    fn test_trailing_is_newest_first() {
        let keys: Vec<String> = ym("2024-02").trailing(4).iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["2024-02", "2024-01", "2023-12", "2023-11"]);
    }

    #[test]
    fn test_ordering_is_chronological() {
        assert!(ym("2023-12") < ym("2024-01"));
        assert!(ym("2024-10") > ym("2024-09"));
    }

    #[test]
    fn test_contains_date() {
        let key = ym("2024-02");
        assert!(key.contains(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()));
        assert!(!key.contains(NaiveDate::from_ymd_opt(2023, 2, 1).unwrap()));
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&ym("2024-07")).unwrap();
        assert_eq!(json, "\"2024-07\"");
        let back: YearMonth = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ym("2024-07"));
    }
}
