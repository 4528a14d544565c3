use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Returns `true` when the expiry is unknown or not in the future.
///
/// Fails closed: a missing expiry counts as expired.
#[must_use]
pub fn is_expired(expires_at: Option<OffsetDateTime>) -> bool {
    is_expired_at(expires_at, OffsetDateTime::now_utc())
}

/// Same as [`is_expired`] against an explicit `now`.
#[must_use]
pub fn is_expired_at(expires_at: Option<OffsetDateTime>, now: OffsetDateTime) -> bool {
    match expires_at {
        Some(at) => at <= now,
        None => true,
    }
}

/// Parses a backend timestamp: RFC 3339, or integer Unix seconds.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(at) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(at);
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
}

/// Formats a timestamp the way the token store persists it.
pub(crate) fn format_timestamp(at: OffsetDateTime) -> String {
    // Rfc3339 only fails for years outside 0..=9999
    at.format(&Rfc3339)
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}
