//! Shared utility functions: ids, time formatting, greetings and text helpers.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Local, TimeZone, Timelike, Utc};
use uuid::Uuid;

use crate::models::DiaryEntry;

/// Generate a new entry id.
///
/// UUID v7 strings carry a millisecond timestamp prefix followed by random
/// bits, so ids sort roughly by creation time when eyeballing logs. Nothing
/// relies on that ordering.
pub fn generate_id() -> String {
    Uuid::now_v7().to_string()
}

/// Current Unix timestamp in milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Format a Unix ms timestamp as `MM.DD` in local time.
pub fn format_date(timestamp_ms: i64) -> String {
    format_date_in(timestamp_ms, &Local)
}

/// Format a Unix ms timestamp as `HH:mm` in local time.
pub fn format_time(timestamp_ms: i64) -> String {
    format_time_in(timestamp_ms, &Local)
}

/// Format a Unix ms timestamp as `MM.DD` in the given timezone.
pub fn format_date_in<Tz: TimeZone>(timestamp_ms: i64, tz: &Tz) -> String {
    tz.timestamp_millis_opt(timestamp_ms)
        .single()
        .map_or_else(
            || "--.--".to_string(),
            |at| format!("{:02}.{:02}", at.month(), at.day()),
        )
}

/// Format a Unix ms timestamp as `HH:mm` in the given timezone.
pub fn format_time_in<Tz: TimeZone>(timestamp_ms: i64, tz: &Tz) -> String {
    tz.timestamp_millis_opt(timestamp_ms)
        .single()
        .map_or_else(
            || "--:--".to_string(),
            |at| format!("{:02}:{:02}", at.hour(), at.minute()),
        )
}

/// Render a Unix ms timestamp as an RFC 3339 UTC string.
pub fn iso_date(timestamp_ms: i64) -> String {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .unwrap_or_default()
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Parse an RFC 3339 date into Unix ms.
pub fn parse_iso_date(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|at| at.timestamp_millis())
}

/// Two-line greeting shown on the home screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Greeting {
    pub line1: &'static str,
    pub line2: &'static str,
}

pub const MORNING_GREETING: Greeting = Greeting {
    line1: "Good morning,",
    line2: "Ready for a drink?",
};
pub const MIDDAY_GREETING: Greeting = Greeting {
    line1: "Lunchtime,",
    line2: "Fancy a little sip?",
};
pub const AFTERNOON_GREETING: Greeting = Greeting {
    line1: "Good afternoon,",
    line2: "Something to drink?",
};
pub const EVENING_GREETING: Greeting = Greeting {
    line1: "Evening is here,",
    line2: "Time for a glass.",
};
pub const LATE_NIGHT_GREETING: Greeting = Greeting {
    line1: "It's late,",
    line2: "One more round?",
};

/// Pick the greeting for a local hour.
///
/// Ranges are `[6, 11)`, `[11, 14)`, `[14, 18)`, `[18, 22)`; every other
/// value, including out-of-range input, is late night.
pub const fn greeting_for_hour(hour: u32) -> Greeting {
    match hour {
        6..=10 => MORNING_GREETING,
        11..=13 => MIDDAY_GREETING,
        14..=17 => AFTERNOON_GREETING,
        18..=21 => EVENING_GREETING,
        _ => LATE_NIGHT_GREETING,
    }
}

/// Greeting for the wall-clock hour of `now`.
pub fn greeting<Tz: TimeZone>(now: &DateTime<Tz>) -> Greeting {
    greeting_for_hour(now.hour())
}

/// Count distinct calendar days in `now`'s month that have at least one entry.
///
/// Days are calendar dates in `now`'s timezone, not 24h buckets.
pub fn calculate_month_days<Tz: TimeZone>(entries: &[DiaryEntry], now: &DateTime<Tz>) -> usize {
    let tz = now.timezone();
    entries
        .iter()
        .filter_map(|entry| tz.timestamp_millis_opt(entry.create_time).single())
        .filter(|at| at.year() == now.year() && at.month() == now.month())
        .map(|at| at.day())
        .collect::<HashSet<_>>()
        .len()
}

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Truncate text to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Reduce free text to a lowercase `[a-z0-9-]` token usable in object keys.
pub fn sanitize_token(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_dash = false;

    for ch in input.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }

    out.trim_matches('-').to_string()
}
