//! Recurrence rules: parsing the persisted `<frequency>[-<param>]` form,
//! occurrence tests, next-occurrence queries and human labels.
//!
//! All functions here are pure. Time of day never matters, only calendar dates.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::RuleParseError;

/// A parsed recurrence rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recurrence {
    /// Fires every day.
    Daily,
    /// Fires once per calendar week on the given weekday.
    WeeklyOn(Weekday),
    /// Fires on the given day of month (1-31).
    MonthlyOn(u8),
    /// Fires on the last calendar day of every month.
    MonthlyOnLast,
}

/// How `MonthlyOn(n)` behaves in months that have fewer than `n` days.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MonthlyFallback {
    /// Fire on the last day of the short month.
    #[default]
    Clamp,
    /// Do not fire at all in the short month.
    Skip,
}

impl FromStr for MonthlyFallback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "clamp" => Ok(MonthlyFallback::Clamp),
            "skip" => Ok(MonthlyFallback::Skip),
            other => Err(format!("unknown monthly fallback '{}' (expected clamp or skip)", other)),
        }
    }
}

const WEEKDAYS: [(Weekday, &str, &str); 7] = [
    (Weekday::Mon, "monday", "Monday"),
    (Weekday::Tue, "tuesday", "Tuesday"),
    (Weekday::Wed, "wednesday", "Wednesday"),
    (Weekday::Thu, "thursday", "Thursday"),
    (Weekday::Fri, "friday", "Friday"),
    (Weekday::Sat, "saturday", "Saturday"),
    (Weekday::Sun, "sunday", "Sunday"),
];

fn weekday_from_name(name: &str) -> Option<Weekday> {
    let lower = name.to_lowercase();
    WEEKDAYS.iter().find(|(_, key, _)| *key == lower).map(|(day, _, _)| *day)
}

fn weekday_key(day: Weekday) -> &'static str {
    WEEKDAYS.iter().find(|(d, _, _)| *d == day).map(|(_, key, _)| *key).unwrap_or("monday")
}

fn weekday_display(day: Weekday) -> &'static str {
    WEEKDAYS.iter().find(|(d, _, _)| *d == day).map(|(_, _, name)| *name).unwrap_or("Monday")
}

/// Number of days in the given month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

fn ordinal(n: u8) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

impl Recurrence {
    /// Parses the persisted rule form (`daily`, `weekly-friday`, `monthly-15`, `monthly-last`).
    pub fn parse(rule: &str) -> Result<Self, RuleParseError> {
        let rule = rule.trim();
        if rule.is_empty() {
            return Err(RuleParseError::Empty);
        }
        let (frequency, param) = match rule.split_once('-') {
            Some((f, p)) => (f, Some(p)),
            None => (rule, None),
        };
        match frequency.to_lowercase().as_str() {
            "daily" => match param {
                None => Ok(Recurrence::Daily),
                Some(p) => Err(RuleParseError::UnexpectedParameter {
                    frequency: "daily",
                    param: p.to_string(),
                }),
            },
            "weekly" => {
                let p = param.ok_or(RuleParseError::MissingParameter { frequency: "weekly" })?;
                weekday_from_name(p)
                    .map(Recurrence::WeeklyOn)
                    .ok_or_else(|| RuleParseError::InvalidWeekday(p.to_string()))
            }
            "monthly" => {
                let p = param.ok_or(RuleParseError::MissingParameter { frequency: "monthly" })?;
                if p.eq_ignore_ascii_case("last") {
                    return Ok(Recurrence::MonthlyOnLast);
                }
                if p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(RuleParseError::InvalidDayOfMonth(p.to_string()));
                }
                match p.parse::<u8>() {
                    Ok(day) if (1..=31).contains(&day) => Ok(Recurrence::MonthlyOn(day)),
                    _ => Err(RuleParseError::InvalidDayOfMonth(p.to_string())),
                }
            }
            other => Err(RuleParseError::UnknownFrequency(other.to_string())),
        }
    }

    /// The date this rule fires on within a given month, if it fires there at all.
    fn fire_date_in_month(&self, year: i32, month: u32, fallback: MonthlyFallback) -> Option<NaiveDate> {
        let last = days_in_month(year, month);
        let day = match *self {
            Recurrence::MonthlyOnLast => last,
            Recurrence::MonthlyOn(n) if u32::from(n) <= last => u32::from(n),
            Recurrence::MonthlyOn(_) => match fallback {
                MonthlyFallback::Clamp => last,
                MonthlyFallback::Skip => return None,
            },
            Recurrence::Daily | Recurrence::WeeklyOn(_) => return None,
        };
        NaiveDate::from_ymd_opt(year, month, day)
    }

    /// True iff the rule fires on `date`.
    pub fn occurs_on(&self, date: NaiveDate, fallback: MonthlyFallback) -> bool {
        match *self {
            Recurrence::Daily => true,
            Recurrence::WeeklyOn(day) => date.weekday() == day,
            Recurrence::MonthlyOn(_) | Recurrence::MonthlyOnLast => {
                self.fire_date_in_month(date.year(), date.month(), fallback) == Some(date)
            }
        }
    }

    /// Earliest date on or after `from` on which the rule fires.
    ///
    /// Only returns `None` if the calendar runs out (dates beyond chrono's range).
    pub fn next_on_or_after(&self, from: NaiveDate, fallback: MonthlyFallback) -> Option<NaiveDate> {
        match *self {
            Recurrence::Daily => Some(from),
            Recurrence::WeeklyOn(day) => {
                let ahead = (7 + day.num_days_from_monday() as i64
                    - from.weekday().num_days_from_monday() as i64)
                    % 7;
                from.checked_add_signed(Duration::days(ahead))
            }
            Recurrence::MonthlyOn(_) | Recurrence::MonthlyOnLast => {
                let (mut year, mut month) = (from.year(), from.month());
                // Skip can pass over at most two consecutive short months; a year bounds it.
                for _ in 0..=12 {
                    if let Some(date) = self.fire_date_in_month(year, month, fallback) {
                        if date >= from {
                            return Some(date);
                        }
                    }
                    (year, month) = next_month(year, month);
                }
                None
            }
        }
    }

    /// The next `count` firing dates starting at `from` (inclusive).
    pub fn upcoming(&self, from: NaiveDate, count: usize, fallback: MonthlyFallback) -> Vec<NaiveDate> {
        let mut dates = Vec::with_capacity(count);
        let mut cursor = Some(from);
        while dates.len() < count {
            let Some(next) = cursor.and_then(|d| self.next_on_or_after(d, fallback)) else {
                break;
            };
            dates.push(next);
            cursor = next.succ_opt();
        }
        dates
    }

    /// Human readable description, e.g. "every Monday" or "15th of each month".
    pub fn label(&self) -> String {
        match *self {
            Recurrence::Daily => "every day".to_string(),
            Recurrence::WeeklyOn(day) => format!("every {}", weekday_display(day)),
            Recurrence::MonthlyOn(n) => format!("{} of each month", ordinal(n)),
            Recurrence::MonthlyOnLast => "last day of each month".to_string(),
        }
    }
}

impl FromStr for Recurrence {
    type Err = RuleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Recurrence::parse(s)
    }
}

/// Canonical persisted form of the rule.
impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Recurrence::Daily => f.write_str("daily"),
            Recurrence::WeeklyOn(day) => write!(f, "weekly-{}", weekday_key(day)),
            Recurrence::MonthlyOn(n) => write!(f, "monthly-{}", n),
            Recurrence::MonthlyOnLast => f.write_str("monthly-last"),
        }
    }
}

/// Evaluates rule strings under one monthly fallback policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleEvaluator {
    pub fallback: MonthlyFallback,
}

impl RuleEvaluator {
    pub fn new(fallback: MonthlyFallback) -> Self {
        RuleEvaluator { fallback }
    }

    /// False for malformed rules.
    pub fn occurs_on(&self, rule: &str, date: NaiveDate) -> bool {
        Recurrence::parse(rule)
            .map(|r| r.occurs_on(date, self.fallback))
            .unwrap_or(false)
    }

    /// `None` for malformed rules.
    pub fn next_due_date_on_or_after(&self, rule: &str, from: NaiveDate) -> Option<NaiveDate> {
        Recurrence::parse(rule).ok()?.next_on_or_after(from, self.fallback)
    }
}

/// Occurrence test using the default (clamping) monthly fallback.
pub fn occurs_on(rule: &str, date: NaiveDate) -> bool {
    RuleEvaluator::default().occurs_on(rule, date)
}

/// Next-occurrence query using the default (clamping) monthly fallback.
pub fn next_due_date_on_or_after(rule: &str, from: NaiveDate) -> Option<NaiveDate> {
    RuleEvaluator::default().next_due_date_on_or_after(rule, from)
}

/// Renders a rule for display. Malformed rules come back verbatim.
pub fn render_label(rule: &str) -> String {
    match Recurrence::parse(rule) {
        Ok(r) => r.label(),
        Err(_) => rule.to_string(),
    }
}
