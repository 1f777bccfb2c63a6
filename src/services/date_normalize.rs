//! Normalization of listing date text into calendar dates.
//!
//! Listing sites print dates without a year and with weekday or range
//! decorations ("TUE 18 FEB", "FEB 2 - 6", "Today"). The normalizer applies
//! a fixed rule cascade:
//! 1. blank text is today
//! 2. text containing "today" is today
//! 3. ranges keep their start date, parsed month-first
//! 4. anything else drops its leading token ("Sat", "Doors") when the rest
//!    still names a month and a day, and is parsed with the source's day order
//!
//! A missing year is filled with the reference year. Anything the tokenizer
//! does not understand is an error; callers substitute the sentinel.

use chrono::{Datelike, Local, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;

/// Errors from date normalization.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DateError {
    #[error("unrecognized token '{0}'")]
    UnknownToken(String),
    #[error("no day found in '{0}'")]
    MissingDay(String),
    #[error("no month found in '{0}'")]
    MissingMonth(String),
    #[error("ambiguous numbers in '{0}'")]
    Ambiguous(String),
    #[error("date out of range: {year}-{month}-{day}")]
    OutOfRange { year: i32, month: u32, day: u32 },
}

/// Ordering of day and month in all-numeric dates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayOrder {
    /// `18/02` is 18 February.
    #[default]
    DayFirst,
    /// `02/18` is 18 February.
    MonthFirst,
}

/// ISO dates at the start of the text ("2024-02-18").
static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})\b").unwrap());

/// Four-digit year anywhere in the text.
static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{4}\b").unwrap());

/// Clock times: "7:30", "7:30pm", "8pm", "10.30am".
static TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2}([:.]\d{2})?\s*(am|pm)|\d{1,2}:\d{2})$").unwrap());

/// Hour with a detached meridiem: the "7" or "7:30" of "7 PM".
static HOUR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{1,2}([:.]\d{2})?$").unwrap());

/// Ordinal day numbers: "2nd", "21st".
static ORDINAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{1,2})(st|nd|rd|th)$").unwrap());

const WEEKDAYS: &[&str] = &[
    "mon", "monday", "tue", "tues", "tuesday", "wed", "weds", "wednesday", "thu", "thur",
    "thurs", "thursday", "fri", "friday", "sat", "saturday", "sun", "sunday",
];

const FILLER: &[&str] = &["at", "from", "on", "of", "the", "and"];

fn month_number(token: &str) -> Option<u32> {
    let month = match token {
        "jan" | "january" => 1,
        "feb" | "february" => 2,
        "mar" | "march" => 3,
        "apr" | "april" => 4,
        "may" => 5,
        "jun" | "june" => 6,
        "jul" | "july" => 7,
        "aug" | "august" => 8,
        "sep" | "sept" | "september" => 9,
        "oct" | "october" => 10,
        "nov" | "november" => 11,
        "dec" | "december" => 12,
        _ => return None,
    };
    Some(month)
}

fn is_weekday(token: &str) -> bool {
    WEEKDAYS.contains(&token)
}

/// A classified piece of date text.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Month(u32),
    Number { value: u32, digits: usize },
}

/// Split date text into meaningful tokens, dropping weekdays, times and filler.
fn tokenize(text: &str) -> Result<Vec<Token>, DateError> {
    let lowered = text.to_lowercase();
    let mut tokens = Vec::new();

    let words: Vec<&str> = lowered
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | '/'))
        .map(|raw| raw.trim_matches(|c: char| matches!(c, '.' | '(' | ')')))
        .filter(|word| !word.is_empty())
        .collect();

    let mut iter = words.iter().copied().peekable();
    while let Some(word) = iter.next() {
        if FILLER.contains(&word) || is_weekday(word) {
            continue;
        }
        if HOUR.is_match(word) && matches!(iter.peek(), Some(&"am") | Some(&"pm")) {
            iter.next();
            continue;
        }
        if TIME.is_match(word) || word == "am" || word == "pm" {
            continue;
        }
        if let Some(month) = month_number(word) {
            tokens.push(Token::Month(month));
            continue;
        }
        let digits = ORDINAL
            .captures(word)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .unwrap_or(word);
        if digits.chars().all(|c| c.is_ascii_digit()) {
            let value = digits
                .parse()
                .map_err(|_| DateError::UnknownToken(word.to_string()))?;
            tokens.push(Token::Number {
                value,
                digits: digits.len(),
            });
            continue;
        }
        // "18.02.2024" survives the split as one word
        if word.contains('.') && word.split('.').all(|p| p.chars().all(|c| c.is_ascii_digit())) {
            for part in word.split('.').filter(|p| !p.is_empty()) {
                let value = part
                    .parse()
                    .map_err(|_| DateError::UnknownToken(word.to_string()))?;
                tokens.push(Token::Number {
                    value,
                    digits: part.len(),
                });
            }
            continue;
        }
        return Err(DateError::UnknownToken(word.to_string()));
    }

    Ok(tokens)
}

fn build_date(year: i32, month: u32, day: u32) -> Result<NaiveDate, DateError> {
    NaiveDate::from_ymd_opt(year, month, day).ok_or(DateError::OutOfRange { year, month, day })
}

/// Parse tokenized text into a date using the given day order.
fn parse_tokens(text: &str, order: DayOrder) -> Result<NaiveDate, DateError> {
    let tokens = tokenize(text)?;

    let months: Vec<u32> = tokens
        .iter()
        .filter_map(|t| match t {
            Token::Month(m) => Some(*m),
            _ => None,
        })
        .collect();
    let numbers: Vec<(u32, usize)> = tokens
        .iter()
        .filter_map(|t| match t {
            Token::Number { value, digits } => Some((*value, *digits)),
            _ => None,
        })
        .collect();

    let year_pos = numbers.iter().position(|(_, digits)| *digits == 4);
    let year = year_pos.map(|i| numbers[i].0 as i32);
    let rest: Vec<u32> = numbers
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != year_pos)
        .map(|(_, (value, _))| *value)
        .collect();

    match months.as_slice() {
        [month] => {
            let year = year.ok_or_else(|| DateError::Ambiguous(text.to_string()))?;
            match rest.as_slice() {
                [day] => build_date(year, *month, *day),
                [] => Err(DateError::MissingDay(text.to_string())),
                _ => Err(DateError::Ambiguous(text.to_string())),
            }
        }
        [] => {
            // All-numeric: "18/02/2024", "2/18/2024", "2024/02/18"
            if year_pos == Some(0) && rest.len() == 2 {
                let year = year.unwrap_or_default();
                return build_date(year, rest[0], rest[1]);
            }
            let year = year.ok_or_else(|| DateError::Ambiguous(text.to_string()))?;
            match (rest.as_slice(), order) {
                ([day, month], DayOrder::DayFirst) | ([month, day], DayOrder::MonthFirst) => {
                    build_date(year, *month, *day)
                }
                ([], _) | ([_], _) => Err(DateError::MissingMonth(text.to_string())),
                _ => Err(DateError::Ambiguous(text.to_string())),
            }
        }
        _ => Err(DateError::Ambiguous(text.to_string())),
    }
}

fn has_year(text: &str) -> bool {
    YEAR.is_match(text)
}

/// Whether `text` still names a month and a day number.
fn has_month_and_day(text: &str) -> bool {
    match tokenize(text) {
        Ok(tokens) => {
            let month = tokens.iter().any(|t| matches!(t, Token::Month(_)));
            let day = tokens
                .iter()
                .any(|t| matches!(t, Token::Number { value, digits } if *digits <= 2 && (1..=31).contains(value)));
            month && day
        }
        Err(_) => false,
    }
}

/// Converts raw listing date text into calendar dates.
#[derive(Debug, Clone, Copy)]
pub struct DateNormalizer {
    reference_year: i32,
    today: NaiveDate,
    day_order: DayOrder,
}

impl DateNormalizer {
    pub fn new(reference_year: i32, today: NaiveDate, day_order: DayOrder) -> Self {
        Self {
            reference_year,
            today,
            day_order,
        }
    }

    /// Normalizer anchored on the local calendar date.
    pub fn for_today(day_order: DayOrder) -> Self {
        let today = Local::now().date_naive();
        Self::new(today.year(), today, day_order)
    }

    fn with_year(&self, text: &str) -> String {
        if has_year(text) {
            text.to_string()
        } else {
            format!("{} {}", text, self.reference_year)
        }
    }

    /// Normalize raw date text.
    pub fn normalize(&self, raw: &str) -> Result<NaiveDate, DateError> {
        let text = raw.trim();

        if text.is_empty() {
            return Ok(self.today);
        }

        if text.to_lowercase().contains("today") {
            return Ok(self.today);
        }

        if let Some(caps) = ISO_DATE.captures(text) {
            let year = caps[1].parse().unwrap_or_default();
            let month = caps[2].parse().unwrap_or_default();
            let day = caps[3].parse().unwrap_or_default();
            return build_date(year, month, day);
        }

        if let Some(idx) = text.find(['-', '–']) {
            let start = text[..idx].trim();
            return parse_tokens(&self.with_year(start), DayOrder::MonthFirst);
        }

        let remainder = text
            .split_once(char::is_whitespace)
            .map(|(_, rest)| rest.trim())
            .filter(|rest| has_month_and_day(rest));
        let body = remainder.unwrap_or(text);

        parse_tokens(&self.with_year(body), self.day_order)
    }
}
