use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use log::trace;
use serde::Serialize;
use uuid::Uuid;

use crate::err::{DeserializationError, DeserializationResult};
use crate::field_reader::read_uuid;
use crate::utils::{ByteCursor, format_utc_seconds, timestamp_from_unix_seconds};

/// Size of a version 1 context: timestamp (8) + user id (16) + address (16).
pub const CONTEXT_V1_SIZE: usize = 8 + 16 + 16;

/// The preamble common to every event: when, by whom and from where it was performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedContext {
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    /// `timestamp` rendered as `YYYY-MM-DD HH:MM:SSZ` (UTC).
    pub timestamp_str: String,
    pub user_id: Uuid,
    pub ip_address: IpAddr,
    #[serde(skip)]
    pub version: u16,
    /// Number of bytes the context occupied in the record.
    #[serde(skip)]
    pub size: usize,
}

/// Decodes the context of the given `version` starting at `offset` within `data`.
///
/// `base` is the absolute position of `data` in the log and is only used for error reporting.
pub fn read_context(
    version: u16,
    data: &[u8],
    offset: usize,
    base: u64,
) -> DeserializationResult<DecodedContext> {
    let mut cursor = ByteCursor::with_pos(data, offset, base)?;

    match version {
        1 => read_context_v1(&mut cursor),
        _ => Err(DeserializationError::UnsupportedContextVersion {
            version,
            offset: cursor.position(),
        }),
    }
}

fn read_context_v1(cursor: &mut ByteCursor<'_>) -> DeserializationResult<DecodedContext> {
    trace!(
        "Offset `0x{offset:08x} ({offset})` reading context v1",
        offset = cursor.position()
    );
    let start = cursor.pos();

    let timestamp_offset = cursor.position();
    let timestamp = cursor.i64_named("context timestamp")?;
    let utc = timestamp_from_unix_seconds(timestamp, timestamp_offset)?;
    let user_id = read_uuid(cursor)?;
    let ip_address = ip_address_from_words(cursor.u32_words_be("context ip address")?);

    Ok(DecodedContext {
        timestamp,
        timestamp_str: format_utc_seconds(utc),
        user_id,
        ip_address,
        version: 1,
        size: cursor.pos() - start,
    })
}

/// A 16 byte address is IPv4 when only its first big-endian word is populated.
pub fn ip_address_from_words(words: [u32; 4]) -> IpAddr {
    if (words[1] | words[2] | words[3]) == 0 {
        IpAddr::V4(Ipv4Addr::from(words[0]))
    } else {
        let mut octets = [0_u8; 16];
        for (chunk, word) in octets.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        IpAddr::V6(Ipv6Addr::from(octets))
    }
}
