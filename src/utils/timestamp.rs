//! Publish-time parsing for listing rows.
//!
//! Listings render dates in several shapes depending on age: `14:05` for
//! today, `03.01.` for this year, `2025.12.24.` for older posts, or relative
//! forms like `5분 전`. Parsing is total: anything unrecognised resolves to
//! `now`. That only affects display, never dedup, which is keyed on ids.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use regex::Regex;

static FULL_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d{4})\s*[.\-/년]\s*(\d{1,2})\s*[.\-/월]\s*(\d{1,2})\s*[.일]?(?:\s+(\d{1,2}):(\d{2})(?::(\d{2}))?)?$",
    )
    .expect("valid full date pattern")
});

static SHORT_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})\s*[.\-/]\s*(\d{1,2})\s*\.?(?:\s+(\d{1,2}):(\d{2}))?$")
        .expect("valid short date pattern")
});

static TIME_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2}):(\d{2})(?::(\d{2}))?$").expect("valid time pattern")
});

static RELATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(\d+)\s*(초|분|시간|일|주|seconds?|secs?|minutes?|mins?|hours?|hrs?|days?|weeks?)\s*(?:전|ago)$",
    )
    .expect("valid relative pattern")
});

/// Parse a listing timestamp relative to the local clock, defaulting to now.
pub fn parse_published_at(raw: &str) -> DateTime<Utc> {
    let now = chrono::Local::now();
    parse_in(raw, &now).unwrap_or_else(|| {
        log::debug!("Unrecognised timestamp {raw:?}, using current time");
        now.with_timezone(&Utc)
    })
}

/// Parse `raw` in the timezone of `now`. Returns `None` when no pattern fits.
pub fn parse_in<Tz: TimeZone>(raw: &str, now: &DateTime<Tz>) -> Option<DateTime<Utc>> {
    let text = crate::utils::normalize_whitespace(raw);
    let text = text.trim_end_matches('.').trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }

    if matches!(text, "방금" | "방금 전" | "just now") {
        return Some(now.with_timezone(&Utc));
    }

    if let Some(caps) = RELATIVE.captures(text) {
        let amount: i64 = caps[1].parse().ok()?;
        let unit = caps[2].to_lowercase();
        let delta = match unit.as_str() {
            "초" => Duration::try_seconds(amount)?,
            u if u.starts_with("sec") => Duration::try_seconds(amount)?,
            "분" => Duration::try_minutes(amount)?,
            u if u.starts_with("min") => Duration::try_minutes(amount)?,
            "시간" => Duration::try_hours(amount)?,
            u if u.starts_with("h") => Duration::try_hours(amount)?,
            "일" => Duration::try_days(amount)?,
            u if u.starts_with("day") => Duration::try_days(amount)?,
            _ => Duration::try_weeks(amount)?,
        };
        // Out-of-range offsets fall through to "now" instead of overflowing
        return now
            .clone()
            .checked_sub_signed(delta)
            .map(|dt| dt.with_timezone(&Utc));
    }

    let today = now.date_naive();

    if let Some(caps) = FULL_DATE.captures(text) {
        let date = NaiveDate::from_ymd_opt(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        )?;
        let time = time_from(caps.get(4), caps.get(5), caps.get(6))?;
        return localize(now, date.and_time(time));
    }

    if let Some(caps) = SHORT_DATE.captures(text) {
        let month: u32 = caps[1].parse().ok()?;
        let day: u32 = caps[2].parse().ok()?;
        let time = time_from(caps.get(3), caps.get(4), None)?;
        // Year-less dates in the future belong to last year (January listing December posts).
        let mut date = NaiveDate::from_ymd_opt(today.year(), month, day)?;
        if date > today {
            date = NaiveDate::from_ymd_opt(today.year() - 1, month, day)?;
        }
        return localize(now, date.and_time(time));
    }

    if let Some(caps) = TIME_ONLY.captures(text) {
        let time = time_from(caps.get(1), caps.get(2), caps.get(3))?;
        let mut stamp = today.and_time(time);
        if stamp > now.naive_local() {
            stamp -= Duration::days(1);
        }
        return localize(now, stamp);
    }

    None
}

fn time_from(
    hour: Option<regex::Match<'_>>,
    minute: Option<regex::Match<'_>>,
    second: Option<regex::Match<'_>>,
) -> Option<NaiveTime> {
    let field = |m: Option<regex::Match<'_>>| -> Option<u32> {
        match m {
            Some(m) => m.as_str().parse().ok(),
            None => Some(0),
        }
    };
    NaiveTime::from_hms_opt(field(hour)?, field(minute)?, field(second)?)
}

fn localize<Tz: TimeZone>(now: &DateTime<Tz>, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    now.timezone()
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
