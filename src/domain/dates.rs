use crate::domain::error::Error;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

/// A normalized date/timestamp condition target.
///
/// `relative` is set when the target was written as an elapsed-time
/// expression ("3 days ago"). The evaluator uses it to compute when a
/// currently-true comparison will flip, which feeds result expiration.
#[derive(Debug, Clone, PartialEq)]
pub struct DateTarget {
    pub at: DateTime<Utc>,
    pub relative: Option<Duration>,
}

impl DateTarget {
    pub fn absolute(at: DateTime<Utc>) -> Self {
        Self { at, relative: None }
    }
}

/// Parses a date condition target: "now", a relative expression of the form
/// "N <unit>[s] ago", or an absolute date/datetime.
pub fn parse_date_target(expr: &str, now: DateTime<Utc>) -> Result<DateTarget, Error> {
    let trimmed = expr.trim();
    if trimmed.eq_ignore_ascii_case("now") {
        return Ok(DateTarget::absolute(now));
    }
    if let Some(offset) = parse_relative_offset(trimmed) {
        // An offset can be representable yet push the instant outside the
        // datetime range; treat that like any other bad expression.
        let at = now
            .checked_sub_signed(offset)
            .ok_or_else(|| Error::BadDateExpression(expr.to_string()))?;
        return Ok(DateTarget {
            at,
            relative: Some(offset),
        });
    }
    parse_absolute(trimmed)
        .map(DateTarget::absolute)
        .ok_or_else(|| Error::BadDateExpression(expr.to_string()))
}

fn parse_relative_offset(expr: &str) -> Option<Duration> {
    let lower = expr.to_ascii_lowercase();
    let body = lower.strip_suffix(" ago")?;
    let mut parts = body.split_whitespace();
    let count: i64 = parts.next()?.parse().ok()?;
    let unit = parts.next()?;
    if parts.next().is_some() || count < 0 {
        return None;
    }
    let seconds = match unit.trim_end_matches('s') {
        "second" => 1,
        "minute" => 60,
        "hour" => 3600,
        "day" => 86_400,
        "week" => 7 * 86_400,
        "month" => 30 * 86_400,
        "year" => 365 * 86_400,
        _ => return None,
    };
    Duration::try_seconds(count.checked_mul(seconds)?)
}

fn parse_absolute(expr: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(expr, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(expr, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(d) = NaiveDate::parse_from_str(expr, "%Y-%m-%d") {
        return Some(d.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}
