//! Free-text exhibition date parsing.
//!
//! Venues write dates every way imaginable: "january 5 – march 10 2024",
//! "april 18–22 2022", "opens may 3", "fall 2025 – spring 2026", "ongoing".
//! [`DateNormalizer`] turns those into calendar dates plus an ongoing flag.
//! Callers catch [`DateParseError`] per event; nothing here aborts a run.

use crate::constants::{DEFAULT_MONTHS, DEFAULT_SEASONS, RANGE_SEPARATOR, STORE_DATE_FORMAT};
use crate::error::{ConfigError, DateParseError};
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static ORDINAL_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})(?:st|nd|rd|th)\b").expect("valid ordinal regex"));

static DASHES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[-–—‒]+\s*").expect("valid dash regex"));

const ONGOING_SENTINELS: &[&str] = &["now on view", "on view now", "on view through", "ongoing", "permanent"];
const OPENING_PREFIXES: &[&str] = &["opens on ", "opens ", "opening on ", "opening "];
const CLOSING_PREFIXES: &[&str] = &["closing on ", "closing ", "closes ", "through ", "until "];

/// Month name/abbreviation → month number.
#[derive(Debug, Clone)]
pub struct MonthTable {
    months: HashMap<String, u32>,
}

impl MonthTable {
    /// Default table extended (or overridden) by configured entries.
    pub fn with_overrides(overrides: &HashMap<String, u32>) -> Result<Self, ConfigError> {
        let mut table = Self::default();
        for (name, &value) in overrides {
            if !(1..=12).contains(&value) {
                return Err(ConfigError::InvalidMonth {
                    name: name.clone(),
                    value,
                });
            }
            table.months.insert(name.to_lowercase(), value);
        }
        Ok(table)
    }

    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.months.get(name).copied()
    }
}

impl Default for MonthTable {
    fn default() -> Self {
        Self {
            months: DEFAULT_MONTHS
                .iter()
                .map(|(name, num)| (name.to_string(), *num))
                .collect(),
        }
    }
}

/// Season word → estimated "month day" anchor. Deliberately approximate.
#[derive(Debug, Clone)]
pub struct SeasonTable {
    anchors: HashMap<String, String>,
}

impl SeasonTable {
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Self {
        let mut table = Self::default();
        for (season, anchor) in overrides {
            table
                .anchors
                .insert(season.to_lowercase(), anchor.to_lowercase());
        }
        table
    }

    fn anchor(&self, word: &str) -> Option<&str> {
        self.anchors.get(word).map(String::as_str)
    }
}

impl Default for SeasonTable {
    fn default() -> Self {
        Self {
            anchors: DEFAULT_SEASONS
                .iter()
                .map(|(season, anchor)| (season.to_string(), anchor.to_string()))
                .collect(),
        }
    }
}

/// Outcome of reading a whole date expression.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParsedDates {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub ongoing: bool,
}

impl ParsedDates {
    fn ongoing() -> Self {
        Self {
            start: None,
            end: None,
            ongoing: true,
        }
    }
}

/// One side of a range before years are resolved.
#[derive(Debug, Clone, Copy)]
struct PartialDate {
    month: Option<u32>,
    day: u32,
    year: Option<i32>,
}

/// Which side(s) of a range borrowed a year from elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InferredYear {
    Neither,
    Start,
    End,
    Both,
}

/// Lower-cases and tidies raw date text: ordinal suffixes, commas, periods
/// and non-breaking spaces are removed, whitespace is collapsed.
pub fn clean_date_text(text: &str) -> String {
    let lowered = text
        .to_lowercase()
        .replace('\u{a0}', " ")
        .replace([',', '.'], "");
    let stripped = ORDINAL_SUFFIX.replace_all(&lowered, "$1");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Rewrites every hyphen/dash variant (with any surrounding spaces) to a
/// spaced en-dash.
fn normalize_dashes(text: &str) -> String {
    DASHES
        .replace_all(text, format!(" {} ", RANGE_SEPARATOR).as_str())
        .trim()
        .to_string()
}

fn parse_number<T: std::str::FromStr>(token: &str) -> Result<T, DateParseError> {
    token
        .parse::<T>()
        .map_err(|_| DateParseError::InvalidNumber(token.to_string()))
}

fn is_year_token(token: &str) -> bool {
    token.len() == 4 && token.chars().all(|c| c.is_ascii_digit())
}

fn make_date(year: i32, month: u32, day: u32) -> Result<NaiveDate, DateParseError> {
    NaiveDate::from_ymd_opt(year, month, day).ok_or(DateParseError::InvalidDate { year, month, day })
}

fn strip_any_prefix<'a>(text: &'a str, prefixes: &[&str]) -> Option<&'a str> {
    prefixes.iter().find_map(|p| text.strip_prefix(p))
}

/// Parses venue date text against an explicit "today".
#[derive(Debug, Clone)]
pub struct DateNormalizer {
    months: MonthTable,
    seasons: SeasonTable,
    today: NaiveDate,
}

impl DateNormalizer {
    pub fn new(months: MonthTable, seasons: SeasonTable, today: NaiveDate) -> Self {
        Self {
            months,
            seasons,
            today,
        }
    }

    /// Default tables, anchored at `today`.
    pub fn for_today(today: NaiveDate) -> Self {
        Self::new(MonthTable::default(), SeasonTable::default(), today)
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    fn month(&self, token: &str) -> Result<u32, DateParseError> {
        self.months
            .lookup(token)
            .ok_or_else(|| DateParseError::UnknownMonth(token.to_string()))
    }

    /// Year for a month/day given without one: this year unless that day has
    /// already gone by, in which case next year.
    fn next_occurrence_year(&self, month: u32, day: u32) -> i32 {
        if (month, day) < (self.today.month(), self.today.day()) {
            self.today.year() + 1
        } else {
            self.today.year()
        }
    }

    /// Next occurrence of a yearless month/day. February 29 rolls forward to
    /// the next leap year.
    fn next_occurrence(&self, month: u32, day: u32) -> Result<NaiveDate, DateParseError> {
        let year = self.next_occurrence_year(month, day);
        (year..year + 8)
            .find_map(|y| NaiveDate::from_ymd_opt(y, month, day))
            .ok_or(DateParseError::InvalidDate { year, month, day })
    }

    /// `"<month> <day> [<year>]"` → date. A missing year resolves to the next
    /// occurrence of that month/day. `"<month> <year>"` reads as the 1st.
    pub fn parse_single_date(&self, text: &str) -> Result<NaiveDate, DateParseError> {
        let cleaned = clean_date_text(text);
        let tokens: Vec<&str> = cleaned.split_whitespace().collect();
        match tokens.as_slice() {
            [] => Err(DateParseError::Empty),
            [month, year] if is_year_token(year) => make_date(parse_number(year)?, self.month(month)?, 1),
            [month, day] => {
                let month = self.month(month)?;
                let day: u32 = parse_number(day)?;
                self.next_occurrence(month, day)
            }
            [month, day, year] => make_date(parse_number(year)?, self.month(month)?, parse_number(day)?),
            _ => Err(DateParseError::malformed(
                &cleaned,
                format!("expected 2 or 3 tokens, found {}", tokens.len()),
            )),
        }
    }

    /// Reads one side of a range. Only the right side may omit its month.
    fn parse_side(&self, side: &str, is_start: bool) -> Result<PartialDate, DateParseError> {
        let tokens: Vec<&str> = side.split_whitespace().collect();
        let starts_with_day = tokens
            .first()
            .map(|t| t.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false);

        if starts_with_day && is_start {
            return Err(DateParseError::malformed(side, "range start has no month"));
        }

        match tokens.as_slice() {
            [] => Err(DateParseError::malformed(side, "empty side of range")),
            [day] if starts_with_day => Ok(PartialDate {
                month: None,
                day: parse_number(day)?,
                year: None,
            }),
            [day, year] if starts_with_day => Ok(PartialDate {
                month: None,
                day: parse_number(day)?,
                year: Some(parse_number(year)?),
            }),
            [month] => Ok(PartialDate {
                month: Some(self.month(month)?),
                day: 1,
                year: None,
            }),
            [month, year] if is_year_token(year) => Ok(PartialDate {
                month: Some(self.month(month)?),
                day: 1,
                year: Some(parse_number(year)?),
            }),
            [month, day] => Ok(PartialDate {
                month: Some(self.month(month)?),
                day: parse_number(day)?,
                year: None,
            }),
            [month, day, year] => Ok(PartialDate {
                month: Some(self.month(month)?),
                day: parse_number(day)?,
                year: Some(parse_number(year)?),
            }),
            _ => Err(DateParseError::malformed(
                side,
                format!("expected at most 3 tokens, found {}", tokens.len()),
            )),
        }
    }

    /// Splits `text` on `separator` and resolves both ends.
    ///
    /// Years are filled in the order: both given; start borrows the end's
    /// year; end borrows the start's year (and month when only a day is
    /// given); neither given means the current year. If a borrowed year puts
    /// the start after the end, the borrowing side moves by one year.
    pub fn parse_range(&self, text: &str, separator: &str) -> Result<(NaiveDate, NaiveDate), DateParseError> {
        let cleaned = clean_date_text(text);
        let parts: Vec<&str> = cleaned.split(separator).map(str::trim).collect();
        let (left, right) = match parts.as_slice() {
            [left, right] if !left.is_empty() && !right.is_empty() => (*left, *right),
            _ => {
                return Err(DateParseError::malformed(
                    &cleaned,
                    format!("expected two sides around '{}'", separator),
                ))
            }
        };

        let start = self.parse_side(left, true)?;
        let end = self.parse_side(right, false)?;

        let current_year = self.today.year();
        let (start_year, end_year, inferred) = match (start.year, end.year) {
            (Some(a), Some(b)) => (a, b, InferredYear::Neither),
            (None, Some(b)) => (b, b, InferredYear::Start),
            (Some(a), None) => (a, a, InferredYear::End),
            (None, None) => (current_year, current_year, InferredYear::Both),
        };

        // start.month is always set: parse_side rejects a month-less start
        let start_month = start
            .month
            .ok_or_else(|| DateParseError::malformed(left, "range start has no month"))?;
        let end_month = end.month.unwrap_or(start_month);

        let mut start_date = make_date(start_year, start_month, start.day)?;
        let mut end_date = make_date(end_year, end_month, end.day)?;

        if start_date > end_date {
            match inferred {
                InferredYear::Start => start_date = make_date(start_year - 1, start_month, start.day)?,
                InferredYear::End | InferredYear::Both => {
                    end_date = make_date(end_year + 1, end_month, end.day)?
                }
                InferredYear::Neither => return Err(DateParseError::InvertedRange(cleaned)),
            }
        }

        Ok((start_date, end_date))
    }

    fn substitute_seasons(&self, text: &str) -> String {
        text.split_whitespace()
            .map(|token| self.seasons.anchor(token).unwrap_or(token))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Reads a complete venue date expression.
    ///
    /// Order: empty → unknown; `<date> – ongoing`; ongoing sentinels;
    /// `opens <date>`; `closing <date>`; season words; range; single day.
    pub fn parse_expression(&self, text: &str) -> Result<ParsedDates, DateParseError> {
        let cleaned = clean_date_text(text);
        if cleaned.is_empty() {
            return Ok(ParsedDates::default());
        }
        if let Ok(day) = NaiveDate::parse_from_str(&cleaned, STORE_DATE_FORMAT) {
            return Ok(ParsedDates {
                start: Some(day),
                end: Some(day),
                ongoing: false,
            });
        }
        let dashed = normalize_dashes(&cleaned);

        if let Some((left, right)) = dashed.split_once(RANGE_SEPARATOR) {
            if right.trim() == "ongoing" {
                let left = left.trim();
                let left = strip_any_prefix(left, OPENING_PREFIXES).unwrap_or(left);
                // an unreadable opening date still leaves an ongoing exhibition
                let start = self.parse_single_date(&self.substitute_seasons(left)).ok();
                return Ok(ParsedDates {
                    start,
                    end: None,
                    ongoing: true,
                });
            }
        }

        if ONGOING_SENTINELS.iter().any(|s| cleaned.contains(s)) {
            return Ok(ParsedDates::ongoing());
        }

        if let Some(rest) = strip_any_prefix(&cleaned, OPENING_PREFIXES) {
            let date_part = rest.split('|').next().unwrap_or_default();
            let start = self.parse_single_date(&self.substitute_seasons(date_part))?;
            return Ok(ParsedDates {
                start: Some(start),
                end: None,
                ongoing: false,
            });
        }

        if let Some(rest) = strip_any_prefix(&cleaned, CLOSING_PREFIXES) {
            let date_part = rest.split('|').next().unwrap_or_default();
            let end = self.parse_single_date(&self.substitute_seasons(date_part))?;
            return Ok(ParsedDates {
                start: None,
                end: Some(end),
                ongoing: false,
            });
        }

        let substituted = self.substitute_seasons(&dashed);
        if substituted.contains(RANGE_SEPARATOR) {
            let (start, end) = self.parse_range(&substituted, RANGE_SEPARATOR)?;
            return Ok(ParsedDates {
                start: Some(start),
                end: Some(end),
                ongoing: false,
            });
        }

        let day = self.parse_single_date(&substituted)?;
        Ok(ParsedDates {
            start: Some(day),
            end: Some(day),
            ongoing: false,
        })
    }
}
