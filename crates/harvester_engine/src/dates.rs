use chrono::{Datelike, Days, Months, NaiveDate};

const NUMERIC_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y", "%d.%m.%Y"];

/// Best-effort date parser for listing timestamps.
///
/// Understands ISO dates (also as a datetime prefix), numeric dates, month
/// names with optional day and year, and relative phrases such as
/// `3 days ago`, `yesterday` or `an hour ago`, which resolve against `today`.
pub fn parse_fuzzy_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let lowered = text.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }
    let tokens: Vec<&str> = lowered
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .collect();

    parse_relative(&tokens, today)
        .or_else(|| parse_numeric(&tokens))
        .or_else(|| parse_named_month(&tokens, today))
}

/// Renders a parsed date the way records persist it.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_relative(tokens: &[&str], today: NaiveDate) -> Option<NaiveDate> {
    if tokens.iter().any(|t| matches!(*t, "today" | "now" | "just")) {
        return Some(today);
    }
    if tokens.contains(&"yesterday") {
        return today.checked_sub_days(Days::new(1));
    }
    if !tokens.contains(&"ago") {
        return None;
    }
    tokens.windows(2).find_map(|pair| {
        let amount = match pair[0] {
            "a" | "an" | "one" => 1,
            n => n.trim_end_matches('+').parse::<u32>().ok()?,
        };
        shift_back(today, amount, pair[1])
    })
}

fn shift_back(today: NaiveDate, amount: u32, unit: &str) -> Option<NaiveDate> {
    let unit = unit.trim_end_matches('s');
    match unit {
        "second" | "sec" | "minute" | "min" | "hour" | "hr" => Some(today),
        "day" => today.checked_sub_days(Days::new(u64::from(amount))),
        "week" | "wk" => today.checked_sub_days(Days::new(u64::from(amount) * 7)),
        "month" | "mo" => today.checked_sub_months(Months::new(amount)),
        "year" | "yr" => today.checked_sub_months(Months::new(amount.checked_mul(12)?)),
        _ => None,
    }
}

fn parse_numeric(tokens: &[&str]) -> Option<NaiveDate> {
    tokens.iter().find_map(|token| {
        let token = token.trim_matches(|c: char| !c.is_ascii_alphanumeric());
        // ISO datetimes: keep the date part.
        let candidate = match token.get(..10) {
            Some(prefix) if token.len() > 10 && token.as_bytes()[10] == b't' => prefix,
            _ => token,
        };
        NUMERIC_FORMATS
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(candidate, format).ok())
    })
}

fn parse_named_month(tokens: &[&str], today: NaiveDate) -> Option<NaiveDate> {
    let month = tokens
        .iter()
        .find_map(|t| month_number(t.trim_matches('.')))?;
    let mut day = None;
    let mut year = None;
    for token in tokens {
        let digits = strip_ordinal(token);
        let Ok(value) = digits.parse::<u32>() else {
            continue;
        };
        if digits.len() == 4 && year.is_none() {
            year = i32::try_from(value).ok();
        } else if (1..=31).contains(&value) && day.is_none() {
            day = Some(value);
        }
    }
    NaiveDate::from_ymd_opt(year.unwrap_or(today.year()), month, day.unwrap_or(1))
}

fn strip_ordinal(token: &str) -> &str {
    ["st", "nd", "rd", "th"]
        .iter()
        .find_map(|suffix| token.strip_suffix(suffix))
        .filter(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(token)
}

fn month_number(token: &str) -> Option<u32> {
    match token {
        "jan" | "january" => Some(1),
        "feb" | "february" => Some(2),
        "mar" | "march" => Some(3),
        "apr" | "april" => Some(4),
        "may" => Some(5),
        "jun" | "june" => Some(6),
        "jul" | "july" => Some(7),
        "aug" | "august" => Some(8),
        "sep" | "sept" | "september" => Some(9),
        "oct" | "october" => Some(10),
        "nov" | "november" => Some(11),
        "dec" | "december" => Some(12),
        _ => None,
    }
}
