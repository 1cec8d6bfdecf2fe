//! Posted-date normalization.
//!
//! Marketplaces print dates in many shapes: relative Swedish or English
//! phrases ("Igår", "3 days ago"), ISO dates, "22 sep." and "17/10/2025".
//! Everything is normalized to UTC; date-only values land on midnight.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static JUST_NOW: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(?:just now|nu)\b").unwrap());
static TODAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(?:idag|today)\b").unwrap());
static YESTERDAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:igår|igar|yesterday)\b").unwrap());
static HOURS_AGO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d+)\s+(?:hours?|timmar|timme|tim)\s+(?:ago|sedan)").unwrap()
});
static DAYS_AGO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d+)\s+(?:days?|dagar|dag)\s+(?:ago|sedan)").unwrap());
static WEEKS_AGO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d+)\s+(?:weeks?|veckor|vecka)\s+(?:ago|sedan)").unwrap());
static ISO_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").unwrap());
static DAY_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\s+(\p{L}{3})\p{L}*\.?(?:,?\s*(\d{4}))?").unwrap()
});
static MONTH_DAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\p{L}{3})\p{L}*\.?\s+(\d{1,2}),?\s+(\d{4})").unwrap());
static NUMERIC_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{2,4})\b").unwrap());

/// Parse a marketplace date string relative to `now`.
///
/// Returns `None` when the text is not recognized; callers treat that as
/// an unknown date, never as "now".
pub fn parse_posted(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if JUST_NOW.is_match(text) {
        return Some(now);
    }
    if TODAY.is_match(text) {
        return midnight(now.date_naive());
    }
    if YESTERDAY.is_match(text) {
        return midnight(now.date_naive().pred_opt()?);
    }

    if let Some(n) = capture_number(&DAYS_AGO, text) {
        let day = now.checked_sub_signed(Duration::try_days(n)?)?;
        return midnight(day.date_naive());
    }
    if let Some(n) = capture_number(&HOURS_AGO, text) {
        return now.checked_sub_signed(Duration::try_hours(n)?);
    }
    if let Some(n) = capture_number(&WEEKS_AGO, text) {
        let day = now.checked_sub_signed(Duration::try_weeks(n)?)?;
        return midnight(day.date_naive());
    }

    if let Some(caps) = ISO_DATE.captures(text) {
        let parsed = ymd(&caps[1], &caps[2], &caps[3]);
        if parsed.is_some() {
            return parsed;
        }
    }

    if let Some(caps) = DAY_MONTH.captures(text) {
        if let Some(month) = month_number(&caps[2]) {
            let day: u32 = caps[1].parse().ok()?;
            return match caps.get(3) {
                Some(year) => midnight(NaiveDate::from_ymd_opt(
                    year.as_str().parse().ok()?,
                    month,
                    day,
                )?),
                None => without_year(month, day, now),
            };
        }
    }

    if let Some(caps) = MONTH_DAY.captures(text) {
        if let Some(month) = month_number(&caps[1]) {
            let day: u32 = caps[2].parse().ok()?;
            let year: i32 = caps[3].parse().ok()?;
            return midnight(NaiveDate::from_ymd_opt(year, month, day)?);
        }
    }

    if let Some(caps) = NUMERIC_DATE.captures(text) {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let mut year: i32 = caps[3].parse().ok()?;
        if year < 100 {
            year += 2000;
        }
        return midnight(NaiveDate::from_ymd_opt(year, month, day)?);
    }

    None
}

/// Month number for a Swedish or English month name or abbreviation.
pub fn month_number(name: &str) -> Option<u32> {
    let prefix: String = name.chars().take(3).collect::<String>().to_lowercase();
    let month = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "maj" | "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "okt" | "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn capture_number(re: &Regex, text: &str) -> Option<i64> {
    re.captures(text).and_then(|caps| caps[1].parse().ok())
}

fn ymd(year: &str, month: &str, day: &str) -> Option<DateTime<Utc>> {
    midnight(NaiveDate::from_ymd_opt(
        year.parse().ok()?,
        month.parse().ok()?,
        day.parse().ok()?,
    )?)
}

fn midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

/// A day and month without a year belongs to the most recent such date
/// that is not in the future.
fn without_year(month: u32, day: u32, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let this_year = midnight(NaiveDate::from_ymd_opt(now.year(), month, day)?)?;
    if this_year > now {
        midnight(NaiveDate::from_ymd_opt(now.year() - 1, month, day)?)
    } else {
        Some(this_year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 17, 15, 30, 0).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_relative_words() {
        assert_eq!(parse_posted("just now", now()), Some(now()));
        assert_eq!(parse_posted("Idag 14:02", now()), Some(day(2025, 10, 17)));
        assert_eq!(parse_posted("Igår 09:15", now()), Some(day(2025, 10, 16)));
        assert_eq!(parse_posted("yesterday", now()), Some(day(2025, 10, 16)));
    }

    #[test]
    fn test_relative_counts() {
        assert_eq!(parse_posted("3 days ago", now()), Some(day(2025, 10, 14)));
        assert_eq!(parse_posted("2 dagar sedan", now()), Some(day(2025, 10, 15)));
        assert_eq!(parse_posted("1 week ago", now()), Some(day(2025, 10, 10)));
        assert_eq!(
            parse_posted("5 hours ago", now()),
            Some(Utc.with_ymd_and_hms(2025, 10, 17, 10, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_absolute_formats() {
        assert_eq!(parse_posted("2024-10-15", now()), Some(day(2024, 10, 15)));
        assert_eq!(parse_posted("Upplagd 17 okt", now()), Some(day(2025, 10, 17)));
        assert_eq!(parse_posted("3 maj 2023", now()), Some(day(2023, 5, 3)));
        assert_eq!(parse_posted("Oct 17, 2025", now()), Some(day(2025, 10, 17)));
        assert_eq!(parse_posted("17/10/2025", now()), Some(day(2025, 10, 17)));
        assert_eq!(parse_posted("01-02-24", now()), Some(day(2024, 2, 1)));
    }

    #[test]
    fn test_future_day_month_rolls_back_a_year() {
        assert_eq!(parse_posted("22 dec.", now()), Some(day(2024, 12, 22)));
    }

    #[test]
    fn test_unrecognized_is_none() {
        assert_eq!(parse_posted("", now()), None);
        assert_eq!(parse_posted("nyligen", now()), None);
        assert_eq!(parse_posted("31 feb 2025", now()), None);
        // "januari" must not be mistaken for "nu"
        assert_eq!(parse_posted("januari", now()), None);
    }

    #[test]
    fn test_month_number() {
        assert_eq!(month_number("Okt"), Some(10));
        assert_eq!(month_number("maj"), Some(5));
        assert_eq!(month_number("September"), Some(9));
        assert_eq!(month_number("xyz"), None);
    }
}
