// File: ./src/model/recurrence.rs
use chrono::{Days, Months, NaiveDate, Weekday};
use rrule::RRuleSet;
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumString};

/// Upper bound on how many times the engine steps past a candidate that
/// falls inside the rule's first period.
pub const DEFAULT_MAX_RETRIES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Frequency {
    Secondly,
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn is_sub_daily(self) -> bool {
        matches!(self, Self::Secondly | Self::Minutely | Self::Hourly)
    }

    fn unit_name(self) -> &'static str {
        match self {
            Self::Secondly => "second",
            Self::Minutely => "minute",
            Self::Hourly => "hour",
            Self::Daily => "day",
            Self::Weekly => "week",
            Self::Monthly => "month",
            Self::Yearly => "year",
        }
    }
}

pub const ALL_WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

pub fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

pub fn weekday_from_code(code: &str) -> Option<Weekday> {
    ALL_WEEKDAYS
        .into_iter()
        .find(|d| weekday_code(*d).eq_ignore_ascii_case(code))
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// A BY-part of a rule: restricts which dates inside each period occur.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ByFilter {
    Weekday(Vec<Weekday>),
    MonthDay(Vec<i8>),
    Month(Vec<u32>),
    /// Any other BY-part (BYSETPOS, BYYEARDAY, ordinal BYDAY, ...), passed
    /// through to the rule text untouched.
    Other { key: String, value: String },
}

impl ByFilter {
    fn to_rrule_part(&self) -> String {
        let join = |parts: Vec<String>| parts.join(",");
        match self {
            Self::Weekday(days) => format!(
                "BYDAY={}",
                join(days.iter().map(|d| weekday_code(*d).to_string()).collect())
            ),
            Self::MonthDay(days) => {
                format!("BYMONTHDAY={}", join(days.iter().map(i8::to_string).collect()))
            }
            Self::Month(months) => {
                format!("BYMONTH={}", join(months.iter().map(u32::to_string).collect()))
            }
            Self::Other { key, value } => format!("{}={}", key, value),
        }
    }
}

/// A parsed recurrence expression, not yet bound to a start date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrencePattern {
    pub frequency: Frequency,
    pub interval: u32,
    pub filters: Vec<ByFilter>,
    pub until: Option<NaiveDate>,
    pub count: Option<u32>,
    pub week_start: Option<Weekday>,
}

impl RecurrencePattern {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            filters: Vec::new(),
            until: None,
            count: None,
            week_start: None,
        }
    }

    pub fn with_interval(mut self, interval: u32) -> Self {
        self.interval = interval.max(1);
        self
    }

    pub fn with_filter(mut self, filter: ByFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn has_filters(&self) -> bool {
        !self.filters.is_empty()
    }

    pub fn weekdays(&self) -> Option<&[Weekday]> {
        self.filters.iter().find_map(|f| match f {
            ByFilter::Weekday(days) => Some(days.as_slice()),
            _ => None,
        })
    }

    /// Replaces any existing filter of the same variant.
    pub fn set_filter(&mut self, filter: ByFilter) {
        self.filters
            .retain(|f| std::mem::discriminant(f) != std::mem::discriminant(&filter));
        self.filters.push(filter);
    }

    /// RFC 5545 RRULE value (without the `RRULE:` prefix).
    ///
    /// UNTIL is written as an end-of-day UTC timestamp because the rule is
    /// always evaluated against a UTC DATE-TIME DTSTART, and RFC 5545 requires
    /// both to have the same value type.
    pub fn to_rrule_string(&self) -> String {
        let mut parts = vec![format!("FREQ={}", self.frequency)];
        if self.interval > 1 {
            parts.push(format!("INTERVAL={}", self.interval));
        }
        for filter in &self.filters {
            parts.push(filter.to_rrule_part());
        }
        if let Some(until) = self.until {
            parts.push(format!("UNTIL={}T235959Z", until.format("%Y%m%d")));
        }
        if let Some(count) = self.count {
            parts.push(format!("COUNT={}", count));
        }
        if let Some(wkst) = self.week_start {
            parts.push(format!("WKST={}", weekday_code(wkst)));
        }
        parts.join(";")
    }

    /// Parses raw RRULE text such as `FREQ=WEEKLY;INTERVAL=4;BYDAY=SA`.
    /// A leading `RRULE:` is accepted. Returns `None` for anything the rule
    /// grammar does not allow.
    pub fn from_rrule_str(text: &str) -> Option<Self> {
        let upper = text.trim().to_uppercase();
        let body = upper.strip_prefix("RRULE:").unwrap_or(&upper);

        let mut frequency = None;
        let mut pattern = RecurrencePattern::new(Frequency::Daily);

        for part in body.split(';').filter(|p| !p.trim().is_empty()) {
            let (key, value) = part.split_once('=')?;
            let key = key.trim().to_string();
            let value = value.trim();
            match key.as_str() {
                "FREQ" => frequency = Some(Frequency::from_str(value).ok()?),
                "INTERVAL" => {
                    let n = value.parse::<u32>().ok()?;
                    if n == 0 {
                        return None;
                    }
                    pattern.interval = n;
                }
                "COUNT" => pattern.count = Some(value.parse().ok()?),
                "UNTIL" => pattern.until = Some(parse_until(value)?),
                "WKST" => pattern.week_start = Some(weekday_from_code(value)?),
                "BYDAY" => {
                    let plain: Option<Vec<Weekday>> =
                        value.split(',').map(|c| weekday_from_code(c.trim())).collect();
                    match plain {
                        Some(days) => pattern.filters.push(ByFilter::Weekday(days)),
                        None => pattern.filters.push(ByFilter::Other {
                            key,
                            value: value.to_string(),
                        }),
                    }
                }
                "BYMONTHDAY" => {
                    let days: Option<Vec<i8>> =
                        value.split(',').map(|d| d.trim().parse().ok()).collect();
                    pattern.filters.push(ByFilter::MonthDay(days?));
                }
                "BYMONTH" => {
                    let months: Option<Vec<u32>> =
                        value.split(',').map(|m| m.trim().parse().ok()).collect();
                    pattern.filters.push(ByFilter::Month(months?));
                }
                k if k.starts_with("BY") => pattern.filters.push(ByFilter::Other {
                    key,
                    value: value.to_string(),
                }),
                _ => return None,
            }
        }

        pattern.frequency = frequency?;

        // Check the rule as it will be evaluated; we only keep what rrule can build.
        if let Err(e) = validate_rule_text(&pattern.to_rrule_string()) {
            log::debug!("Rejected rule '{}': {}", body, e);
            return None;
        }
        Some(pattern)
    }

    /// Binds the pattern to the date its periods are counted from.
    pub fn starting(self, start: NaiveDate) -> RecurrenceRule {
        RecurrenceRule {
            pattern: self,
            start,
        }
    }
}

/// Builds `body` against a fixed DTSTART so rules rrule refuses at build
/// time (e.g. BYMONTHDAY on a weekly rule) fail while parsing.
fn validate_rule_text(body: &str) -> Result<(), rrule::RRuleError> {
    RRuleSet::from_str(&format!("DTSTART:19700101T000000Z\nRRULE:{}\n", body)).map(|_| ())
}

fn parse_until(value: &str) -> Option<NaiveDate> {
    let date_part = value.get(..8)?;
    NaiveDate::parse_from_str(date_part, "%Y%m%d").ok()
}

impl fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |days: &[Weekday]| {
            days.iter()
                .map(|d| weekday_name(*d))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let unit = self.frequency.unit_name();

        let leading_days = match (self.frequency, self.interval, self.filters.as_slice()) {
            (Frequency::Weekly, 1, [ByFilter::Weekday(days)]) => Some(days),
            _ => None,
        };

        if let Some(days) = leading_days {
            write!(f, "every {}", names(days))?;
        } else {
            if self.interval == 1 {
                write!(f, "every {}", unit)?;
            } else {
                write!(f, "every {} {}s", self.interval, unit)?;
            }
            for filter in &self.filters {
                match filter {
                    ByFilter::Weekday(days) => write!(f, " on {}", names(days))?,
                    ByFilter::MonthDay(days) => {
                        let labels: Vec<String> = days
                            .iter()
                            .map(|d| match d {
                                -1 => "the last day".to_string(),
                                d => format!("day {}", d),
                            })
                            .collect();
                        write!(f, " on {}", labels.join(", "))?;
                    }
                    ByFilter::Month(months) => {
                        let labels: Vec<&str> = months
                            .iter()
                            .filter_map(|m| MONTH_NAMES.get((*m as usize).wrapping_sub(1)).copied())
                            .collect();
                        write!(f, " in {}", labels.join(", "))?;
                    }
                    ByFilter::Other { key, value } => write!(f, " ({}={})", key, value)?,
                }
            }
        }

        if let Some(until) = self.until {
            write!(f, " until {}", until.format("%Y-%m-%d"))?;
        }
        if let Some(count) = self.count {
            write!(f, " ({} times)", count)?;
        }
        Ok(())
    }
}

/// A pattern evaluated relative to a start date.
///
/// Periods of `interval` units are counted from `start`; period 0 is the one
/// containing `start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub pattern: RecurrencePattern,
    pub start: NaiveDate,
}

impl RecurrenceRule {
    fn to_rrule_set(&self) -> Result<RRuleSet, rrule::RRuleError> {
        // Midnight UTC keeps every occurrence on its calendar date.
        let rrule_string = format!(
            "DTSTART:{}T000000Z\nRRULE:{}\n",
            self.start.format("%Y%m%d"),
            self.pattern.to_rrule_string()
        );
        RRuleSet::from_str(&rrule_string)
    }

    /// Up to `limit` occurrences strictly after `after`, in order.
    ///
    /// `after` may be any date, not only the start. A rule the rrule crate
    /// refuses to build (for instance UNTIL before the start) yields none.
    pub fn occurrences_after(&self, after: NaiveDate, limit: usize) -> Vec<NaiveDate> {
        let rrule_set = match self.to_rrule_set() {
            Ok(set) => set,
            Err(e) => {
                log::debug!(
                    "Rule '{}' from {} cannot be evaluated: {}",
                    self.pattern.to_rrule_string(),
                    self.start,
                    e
                );
                return Vec::new();
            }
        };

        rrule_set
            .into_iter()
            .map(|d| d.date_naive())
            .filter(|d| *d > after)
            .take(limit)
            .collect()
    }

    /// The earliest occurrence strictly after `after`.
    pub fn next_after(&self, after: NaiveDate) -> Option<NaiveDate> {
        self.occurrences_after(after, 1).into_iter().next()
    }

    /// `start` plus one full interval, or `None` for sub-daily frequencies.
    /// Month arithmetic clamps to the last day of the target month.
    pub fn initial_period_end(&self) -> Option<NaiveDate> {
        let n = self.pattern.interval;
        match self.pattern.frequency {
            Frequency::Daily => self.start.checked_add_days(Days::new(u64::from(n))),
            Frequency::Weekly => self.start.checked_add_days(Days::new(7 * u64::from(n))),
            Frequency::Monthly => self.start.checked_add_months(Months::new(n)),
            Frequency::Yearly => self.start.checked_add_months(Months::new(n.checked_mul(12)?)),
            Frequency::Hourly | Frequency::Minutely | Frequency::Secondly => None,
        }
    }

    /// True when `candidate` is sooner than one full interval after `start`.
    ///
    /// Filtered rules include period 0, so "every 4 weeks on Saturday"
    /// started on a Tuesday would otherwise fire four days later. With an
    /// interval of 1 every period is a valid one, so nothing is too soon.
    pub fn is_within_initial_period(&self, candidate: NaiveDate) -> bool {
        if self.pattern.interval <= 1 {
            return false;
        }
        self.initial_period_end()
            .is_some_and(|expected_minimum| candidate < expected_minimum)
    }
}

pub struct RecurrenceEngine;

impl RecurrenceEngine {
    /// Finds the next accepted occurrence after the rule's start.
    ///
    /// Candidates inside the initial period are skipped, at most
    /// `max_retries` times. Returns `None` when the rule runs out of
    /// occurrences or the last candidate examined is still too soon.
    pub fn next_occurrence(rule: &RecurrenceRule, max_retries: usize) -> Option<NaiveDate> {
        let candidates = rule.occurrences_after(rule.start, max_retries.saturating_add(1));
        let mut iter = candidates.into_iter();

        let mut candidate = iter.next()?;
        let mut advances = 0;
        while rule.is_within_initial_period(candidate) && advances < max_retries {
            log::debug!(
                "Skipping {} for '{}': inside the period starting {}",
                candidate,
                rule.pattern,
                rule.start
            );
            candidate = iter.next()?;
            advances += 1;
        }

        if rule.is_within_initial_period(candidate) {
            log::debug!(
                "Gave up on '{}' after {} advances; {} is still too soon",
                rule.pattern,
                advances,
                candidate
            );
            return None;
        }
        Some(candidate)
    }

    /// Computes the next date for `pattern` evaluated at `anchor`.
    pub fn next_from(
        pattern: &RecurrencePattern,
        anchor: NaiveDate,
        max_retries: usize,
    ) -> Option<NaiveDate> {
        let rule = pattern.clone().starting(anchor);
        Self::next_occurrence(&rule, max_retries)
    }
}

/// Weekdays of a week, minus `excluded`, in Monday-first order.
pub fn weekdays_except(excluded: &[Weekday]) -> Vec<Weekday> {
    ALL_WEEKDAYS
        .into_iter()
        .filter(|d| !excluded.contains(d))
        .collect()
}

/// Month numbers 1..=12, minus `excluded`.
pub fn months_except(excluded: &[u32]) -> Vec<u32> {
    (1..=12).filter(|m| !excluded.contains(m)).collect()
}

pub fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    let lower = lower.trim_end_matches('.');
    if lower.len() < 3 {
        return None;
    }
    MONTH_NAMES
        .iter()
        .position(|m| lower.starts_with(m))
        .map(|i| i as u32 + 1)
        .filter(|m| {
            // "sep", "sept" and "september" all match; "mayday" does not.
            let full = chrono::Month::try_from(*m as u8)
                .map(|month| month.name().to_lowercase())
                .unwrap_or_default();
            full.starts_with(lower)
        })
}
