use jiff::Timestamp;

use crate::err::{DeserializationError, DeserializationResult};

/// Converts seconds since the Unix epoch into a `Timestamp`.
///
/// `offset` is where the value was read from, used for error reporting only.
pub(crate) fn timestamp_from_unix_seconds(
    seconds: i64,
    offset: u64,
) -> DeserializationResult<Timestamp> {
    Timestamp::from_second(seconds)
        .map_err(|_| DeserializationError::InvalidTimestamp { seconds, offset })
}

/// Renders a timestamp as `YYYY-MM-DD HH:MM:SSZ` in UTC.
pub(crate) fn format_utc_seconds(ts: Timestamp) -> String {
    ts.strftime("%Y-%m-%d %H:%M:%SZ").to_string()
}
