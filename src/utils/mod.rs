mod byte_cursor;
pub(crate) mod bytes;
mod time;

pub(crate) use self::byte_cursor::ByteCursor;
pub(crate) use self::time::{format_utc_seconds, timestamp_from_unix_seconds};
