// File: src/model/parser.rs
//! Recurrence expression grammar.
//!
//! Accepts presets (`daily`), `every ...` phrases with optional `on`,
//! `until` and `except` clauses, and raw RRULE text (`FREQ=...`).
//!
//! Dates follow RFC 5545: a monthly or yearly rule keeps the day of month
//! it is evaluated from, and months without that day are skipped. `every
//! month` from January 31 lands on March 31; use `every month on the last
//! day` to get the end of every month.
use crate::error::RescheduleError;
use crate::model::recurrence::{
    ByFilter, Frequency, RecurrencePattern, month_from_name, months_except, weekdays_except,
};
use chrono::{NaiveDate, Weekday};

pub fn parse_recurrence(input: &str) -> Result<RecurrencePattern, RescheduleError> {
    let expr = input.trim();
    let unsupported = || RescheduleError::UnsupportedExpression(expr.to_string());

    let pattern = if is_raw_rule(expr) {
        RecurrencePattern::from_rrule_str(expr)
    } else {
        parse_phrase(expr)
    }
    .ok_or_else(unsupported)?;

    // Scheduled dates carry no time of day.
    if pattern.frequency.is_sub_daily() {
        return Err(unsupported());
    }
    Ok(pattern)
}

fn is_raw_rule(expr: &str) -> bool {
    let upper = expr.to_uppercase();
    upper.starts_with("FREQ=") || upper.starts_with("RRULE:")
}

fn parse_phrase(expr: &str) -> Option<RecurrencePattern> {
    let lower = expr.trim_start_matches('@').to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|w| !w.is_empty())
        .collect();

    // The main clause ends at the first suffix keyword.
    let split_at = words
        .iter()
        .position(|w| matches!(*w, "until" | "except"))
        .unwrap_or(words.len());
    let (main, suffixes) = words.split_at(split_at);

    let mut pattern = parse_main_clause(main)?;
    apply_suffixes(&mut pattern, suffixes)?;
    Some(pattern)
}

fn parse_main_clause(words: &[&str]) -> Option<RecurrencePattern> {
    match words {
        [preset] => parse_preset(preset),
        ["every", rest @ ..] => parse_every(rest),
        _ => None,
    }
}

fn parse_preset(word: &str) -> Option<RecurrencePattern> {
    let freq = match word {
        "daily" => Frequency::Daily,
        "weekly" => Frequency::Weekly,
        "monthly" => Frequency::Monthly,
        "yearly" | "annually" => Frequency::Yearly,
        _ => return None,
    };
    Some(RecurrencePattern::new(freq))
}

fn parse_every(words: &[&str]) -> Option<RecurrencePattern> {
    // "every saturday", "every mon wed fri", "every weekday"
    if let Some(days) = parse_weekday_list(words) {
        return Some(
            RecurrencePattern::new(Frequency::Weekly).with_filter(ByFilter::Weekday(days)),
        );
    }

    // "every week", "every 4 weeks", "every other month", "every 3d"
    let (interval, freq, consumed) = match words {
        [unit, ..] if parse_freq_from_unit(unit, true).is_some() => {
            (1, parse_freq_from_unit(unit, true)?, 1)
        }
        [first, rest @ ..] => parse_amount_and_unit(first, rest.first().copied())?,
        [] => return None,
    };
    if interval == 0 {
        return None;
    }
    let mut pattern = RecurrencePattern::new(freq).with_interval(interval);

    match &words[consumed..] {
        [] => Some(pattern),
        ["on", target @ ..] => {
            pattern.filters.push(parse_on_clause(freq, target)?);
            Some(pattern)
        }
        _ => None,
    }
}

fn parse_on_clause(freq: Frequency, words: &[&str]) -> Option<ByFilter> {
    if let Some(days) = parse_weekday_list(words) {
        return Some(ByFilter::Weekday(days));
    }
    if freq != Frequency::Monthly {
        return None;
    }

    let words = match words {
        ["the", rest @ ..] => rest,
        other => other,
    };
    let day = match words {
        ["last"] | ["last", "day"] => -1,
        ["day", n] => parse_day_of_month(n)?,
        [n] | [n, "day"] => parse_day_of_month(n)?,
        _ => return None,
    };
    Some(ByFilter::MonthDay(vec![day]))
}

fn apply_suffixes(pattern: &mut RecurrencePattern, mut words: &[&str]) -> Option<()> {
    while let [keyword, rest @ ..] = words {
        let end = rest
            .iter()
            .position(|w| matches!(*w, "until" | "except"))
            .unwrap_or(rest.len());
        let (args, next) = rest.split_at(end);

        match *keyword {
            "until" => match args {
                [date] => pattern.until = Some(NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?),
                _ => return None,
            },
            "except" => apply_except(pattern, args)?,
            _ => return None,
        }
        words = next;
    }
    Some(())
}

/// `except` takes either weekdays or months, never a mix.
fn apply_except(pattern: &mut RecurrencePattern, args: &[&str]) -> Option<()> {
    if args.is_empty() {
        return None;
    }

    if let Some(excluded) = parse_weekday_list(args) {
        // Dropping weekdays only keeps its meaning when days are the unit of choice.
        if !matches!(pattern.frequency, Frequency::Daily | Frequency::Weekly) {
            return None;
        }
        let base = pattern
            .weekdays()
            .map(<[Weekday]>::to_vec)
            .unwrap_or_else(|| weekdays_except(&[]));
        let kept: Vec<Weekday> = base.into_iter().filter(|d| !excluded.contains(d)).collect();
        if kept.is_empty() {
            return None;
        }
        pattern.set_filter(ByFilter::Weekday(kept));
        return Some(());
    }

    let excluded: Option<Vec<u32>> = args.iter().map(|m| month_from_name(m)).collect();
    let kept = months_except(&excluded?);
    if kept.is_empty() {
        return None;
    }
    pattern.set_filter(ByFilter::Month(kept));
    Some(())
}

// --- WORD HELPERS ---

fn parse_weekday_list(words: &[&str]) -> Option<Vec<Weekday>> {
    if words.is_empty() {
        return None;
    }
    let mut days: Vec<Weekday> = Vec::new();
    for word in words.iter().filter(|w| **w != "and") {
        for day in parse_weekday_group(word)? {
            if !days.contains(&day) {
                days.push(day);
            }
        }
    }
    if days.is_empty() {
        return None;
    }
    days.sort_by_key(|d| d.num_days_from_monday());
    Some(days)
}

fn parse_weekday_group(word: &str) -> Option<Vec<Weekday>> {
    match word {
        "weekday" | "weekdays" => Some(weekdays_except(&[Weekday::Sat, Weekday::Sun])),
        "weekend" | "weekends" => Some(vec![Weekday::Sat, Weekday::Sun]),
        _ => parse_weekday(word)
            .or_else(|| word.strip_suffix('s').and_then(parse_weekday))
            .map(|d| vec![d]),
    }
}

fn parse_weekday(s: &str) -> Option<Weekday> {
    match s {
        "mo" | "mon" | "monday" => Some(Weekday::Mon),
        "tu" | "tue" | "tues" | "tuesday" => Some(Weekday::Tue),
        "we" | "wed" | "wednesday" => Some(Weekday::Wed),
        "th" | "thu" | "thur" | "thurs" | "thursday" => Some(Weekday::Thu),
        "fr" | "fri" | "friday" => Some(Weekday::Fri),
        "sa" | "sat" | "saturday" => Some(Weekday::Sat),
        "su" | "sun" | "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

fn parse_day_of_month(s: &str) -> Option<i8> {
    let digits = s.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    let suffix = &s[digits.len()..];
    if !matches!(suffix, "" | "st" | "nd" | "rd" | "th") {
        return None;
    }
    let n = digits.parse::<i8>().ok()?;
    (1..=31).contains(&n).then_some(n)
}

fn parse_english_number(s: &str) -> Option<u32> {
    match s {
        "one" => Some(1),
        "two" | "other" => Some(2),
        "three" => Some(3),
        "four" => Some(4),
        "five" => Some(5),
        "six" => Some(6),
        "seven" => Some(7),
        "eight" => Some(8),
        "nine" => Some(9),
        "ten" => Some(10),
        "eleven" => Some(11),
        "twelve" => Some(12),
        _ => s.parse::<u32>().ok(),
    }
}

/// Maps a unit word to a frequency. With `singular_only`, only the bare
/// singular words of `every week` are accepted.
fn parse_freq_from_unit(unit: &str, singular_only: bool) -> Option<Frequency> {
    let freq = match unit {
        "day" => Frequency::Daily,
        "week" => Frequency::Weekly,
        "month" => Frequency::Monthly,
        "year" => Frequency::Yearly,
        _ if singular_only => return None,
        "days" | "d" => Frequency::Daily,
        "weeks" | "w" => Frequency::Weekly,
        "months" | "mo" => Frequency::Monthly,
        "years" | "y" => Frequency::Yearly,
        _ => return None,
    };
    Some(freq)
}

/// Reads "4 weeks", "other week" or the glued short form "4w".
/// Returns the amount, the frequency and how many words were used.
fn parse_amount_and_unit(first: &str, second: Option<&str>) -> Option<(u32, Frequency, usize)> {
    if let Some(next_token) = second
        && let Some(amount) = parse_english_number(first)
        && let Some(freq) = parse_freq_from_unit(next_token, false)
    {
        return Some((amount, freq, 2));
    }

    let idx = first.find(|c: char| !c.is_ascii_digit())?;
    let (amount_str, unit_str) = first.split_at(idx);
    let amount = amount_str.parse::<u32>().ok()?;
    let freq = parse_freq_from_unit(unit_str, false)?;
    Some((amount, freq, 1))
}
