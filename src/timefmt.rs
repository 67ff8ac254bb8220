use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use tracing::warn;

/// Target zone for all human-readable timestamps (UTC+8).
pub fn target_offset() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).expect("valid fixed offset")
}

const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a raw export timestamp into an instant.
///
/// Accepts RFC 3339 with an offset or `Z` suffix, and zone-naive ISO strings
/// which are treated as UTC. Empty input is absence, not an error.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // No zone information: assume UTC
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

/// Render an instant in the fixed UTC+8 display format, zone-naive in output.
pub fn format_display(instant: DateTime<Utc>) -> String {
    instant
        .with_timezone(&target_offset())
        .format(DISPLAY_FORMAT)
        .to_string()
}

/// Normalize a raw timestamp to the UTC+8 display form.
///
/// Contract: empty input yields an empty string; unparsable input logs a
/// warning tagged with the conversation id and returns the original string
/// unchanged. This lossy fallback never surfaces as an error to the caller.
pub fn normalize_display(raw: &str, conversation_id: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }
    match parse_instant(raw) {
        Some(instant) => format_display(instant),
        None => {
            warn!(
                conversation_id = %conversation_id,
                raw = %raw,
                "Could not parse timestamp, keeping original string"
            );
            raw.to_string()
        }
    }
}

/// Render an instant as an ISO-8601 UTC string with millisecond precision.
/// Used as the deterministic `created_at` sort key of the enriched dataset.
pub fn to_iso_utc(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
