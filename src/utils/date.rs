//! Lenient publication date parsing.
//!
//! Sources encode dates as ISO strings, free text ("12 Jan 2014"), or split
//! year/month/day elements that may be partial. Everything resolves to a
//! [`NaiveDate`]; a missing month or day becomes the first of the period.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

static ISO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})(?:[-/.](\d{1,2})(?:[-/.](\d{1,2}))?)?(?:[T ]\d{1,2}:\d{2}.*)?$").unwrap()
});
static COMPACT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})$").unwrap());

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Parse a date written in any of the encodings seen across sources.
///
/// Accepts year-only (`2020`), year-month (`2020-05`, `May 2020`), full ISO
/// dates, compact `20200517`, and free text in year-first or day-first order
/// (`2014 Jan 12`, `12 January 2014`, `12 01 2014`). Returns `None` when no
/// year can be found or the parts do not form a valid calendar date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Some(caps) = ISO_RE.captures(raw).or_else(|| COMPACT_RE.captures(raw)) {
        return date_from_parts(
            &caps[1],
            caps.get(2).map(|m| m.as_str()),
            caps.get(3).map(|m| m.as_str()),
        );
    }

    parse_free_text(raw)
}

/// Build a date from separately encoded parts.
///
/// The month may be numeric or a (possibly abbreviated) English name.
pub fn date_from_parts(year: &str, month: Option<&str>, day: Option<&str>) -> Option<NaiveDate> {
    let year: i32 = year.trim().parse().ok()?;
    let month = match month.map(str::trim).filter(|m| !m.is_empty()) {
        Some(m) => parse_month(m)?,
        None => 1,
    };
    let day = match day.map(str::trim).filter(|d| !d.is_empty()) {
        Some(d) => d.parse().ok()?,
        None => 1,
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parse a month given as a number (`1`..`12`) or an English name or abbreviation
pub fn parse_month(token: &str) -> Option<u32> {
    let token = token.trim().trim_end_matches('.');
    if let Ok(n) = token.parse::<u32>() {
        return (1..=12).contains(&n).then_some(n);
    }

    let lower = token.to_lowercase();
    if lower.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|name| name.starts_with(&lower))
        .map(|i| i as u32 + 1)
}

#[derive(Debug)]
enum Token {
    Year(i32),
    Number(u32),
    Month(u32),
}

fn parse_free_text(raw: &str) -> Option<NaiveDate> {
    let tokens: Vec<Token> = raw
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .filter_map(classify)
        .collect();

    let year_pos = tokens.iter().position(|t| matches!(t, Token::Year(_)))?;
    let Token::Year(year) = tokens[year_pos] else {
        return None;
    };

    let named_month = tokens.iter().find_map(|t| match t {
        Token::Month(m) => Some(*m),
        _ => None,
    });
    let numbers: Vec<u32> = tokens
        .iter()
        .filter_map(|t| match t {
            Token::Number(n) => Some(*n),
            _ => None,
        })
        .collect();

    let (month, day) = match (named_month, numbers.as_slice()) {
        (Some(m), [d, ..]) => (m, *d),
        (Some(m), []) => (m, 1),
        (None, []) => (1, 1),
        (None, [m]) => (*m, 1),
        // Year first reads as Y-M-D, year last as D-M-Y
        (None, [a, b, ..]) if year_pos == 0 => (*a, *b),
        (None, [a, b, ..]) => (*b, *a),
    };

    NaiveDate::from_ymd_opt(year, month, day)
        .or_else(|| NaiveDate::from_ymd_opt(year, day, month).filter(|_| named_month.is_none()))
}

fn classify(token: &str) -> Option<Token> {
    let digits = token.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    let is_ordinal = !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit())
        && matches!(
            token[digits.len()..].to_lowercase().as_str(),
            "" | "st" | "nd" | "rd" | "th"
        );

    if is_ordinal {
        let value: u32 = digits.parse().ok()?;
        return match digits.len() {
            4 => Some(Token::Year(value as i32)),
            1 | 2 => Some(Token::Number(value)),
            _ => None,
        };
    }

    if token.chars().all(|c| c.is_alphabetic()) {
        return parse_month(token).map(Token::Month);
    }
    None
}
