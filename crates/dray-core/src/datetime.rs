use anyhow::Context;
use chrono::{DateTime, NaiveDate};
use tracing::trace;

/// Parses a record timestamp into a calendar date.
///
/// The backend emits either a plain ISO-8601 date (`2024-01-05`) or an
/// RFC 3339 date-time (`2024-01-05T09:30:00+01:00`). A date-time is
/// truncated to the date in its encoded offset. Anything else, including
/// a date-time without an offset, yields `None`; callers decide whether
/// that means exclusion or sort-last.
#[must_use]
pub fn parse_record_date(raw: &str) -> Option<NaiveDate> {
    let token = raw.trim();
    if token.is_empty() {
        return None;
    }

    let parsed = if token.contains('T') {
        DateTime::parse_from_rfc3339(token)
            .ok()
            .map(|dt| dt.date_naive())
    } else {
        NaiveDate::parse_from_str(token, "%Y-%m-%d").ok()
    };

    trace!(raw = token, ok = parsed.is_some(), "parsed record date");
    parsed
}

/// Parses a user-supplied range bound for the history flags.
pub fn parse_cli_date(raw: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid date (expected YYYY-MM-DD): {raw}"))
}
