use log::{debug, info};

use crate::err::{DeserializationError, DeserializationResult};
use crate::utils::bytes;

pub const MAGIC_PREFIX: [u8; 8] = [0xff; 8];
pub const RECORD_LENGTH_SIZE: usize = 4;
pub const RECORD_CHECKSUM_SIZE: usize = 4;
pub const MIN_RECORD_SIZE: usize = MAGIC_PREFIX.len() + RECORD_LENGTH_SIZE + RECORD_CHECKSUM_SIZE;
pub const RECORD_ALIGNMENT: usize = 8;

/// Number of filler bytes written after a payload of `size` bytes.
pub fn padding_required(size: usize) -> usize {
    match size % RECORD_ALIGNMENT {
        0 => 0,
        rest => RECORD_ALIGNMENT - rest,
    }
}

/// CRC-32 (IEEE) of a record payload, as stored in the record prefix.
pub fn checksum(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}

/// One framed record, with its payload already length- and checksum-validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord<'a> {
    /// Offset of the record's magic prefix.
    pub offset: u64,
    /// Offset of the first payload byte.
    pub payload_offset: u64,
    /// Checksum as stored; `0` means it was not recorded.
    pub checksum: u32,
    pub data: &'a [u8],
}

/// Walks a log buffer, yielding one `RawRecord` per framed record.
///
/// The scan is forward-only. Any framing problem is fatal: the error is yielded once and the
/// iterator is exhausted afterwards.
#[derive(Debug)]
pub struct RecordScanner<'a> {
    data: &'a [u8],
    position: usize,
    validate_checksums: bool,
    records_read: u64,
    exhausted: bool,
}

impl<'a> RecordScanner<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        RecordScanner {
            data,
            position: 0,
            validate_checksums: true,
            records_read: 0,
            exhausted: false,
        }
    }

    /// When `false`, stored checksums are not verified.
    pub fn validate_checksums(mut self, validate: bool) -> Self {
        self.validate_checksums = validate;
        self
    }

    /// Offset of the next byte to be read.
    pub fn position(&self) -> u64 {
        self.position as u64
    }

    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    fn read_record(&mut self) -> DeserializationResult<RawRecord<'a>> {
        let record_start = self.position;
        let remaining = self.data.len() - record_start;

        if remaining < MIN_RECORD_SIZE {
            return Err(DeserializationError::ShortRead {
                remaining,
                minimum: MIN_RECORD_SIZE,
                offset: record_start as u64,
            });
        }

        let magic = bytes::read_array::<8>(self.data, record_start).ok_or(
            DeserializationError::ShortRead {
                remaining,
                minimum: MIN_RECORD_SIZE,
                offset: record_start as u64,
            },
        )?;
        if magic != MAGIC_PREFIX {
            return Err(DeserializationError::Framing {
                magic,
                offset: record_start as u64,
            });
        }

        let length_offset = record_start + MAGIC_PREFIX.len();
        let (length, expected_checksum) = match (
            bytes::read_u32_le(self.data, length_offset),
            bytes::read_u32_le(self.data, length_offset + RECORD_LENGTH_SIZE),
        ) {
            (Some(length), Some(checksum)) => (length, checksum),
            _ => {
                return Err(DeserializationError::ShortRead {
                    remaining,
                    minimum: MIN_RECORD_SIZE,
                    offset: record_start as u64,
                });
            }
        };

        let payload_start = record_start + MIN_RECORD_SIZE;
        let available = self.data.len() - payload_start;
        let payload = usize::try_from(length)
            .ok()
            .and_then(|len| self.data.get(payload_start..payload_start.checked_add(len)?))
            .ok_or(DeserializationError::TruncatedRecord {
                length,
                remaining: available,
                offset: payload_start as u64,
            })?;

        debug!(
            "Offset `0x{offset:08x} ({offset})` record #{index}: length {length}, checksum {expected_checksum:#010x}",
            offset = record_start,
            index = self.records_read,
        );

        if expected_checksum != 0 && self.validate_checksums {
            let actual = checksum(payload);
            if actual != expected_checksum {
                return Err(DeserializationError::Checksum {
                    expected: expected_checksum,
                    actual,
                    offset: payload_start as u64,
                });
            }
        }

        let payload_end = payload_start + payload.len();
        let padding = padding_required(payload.len());
        let next = payload_end + padding;
        if next > self.data.len() {
            return Err(DeserializationError::Truncated {
                what: "record padding",
                offset: payload_end as u64,
                need: padding,
                have: self.data.len() - payload_end,
            });
        }

        self.position = next;
        self.records_read += 1;

        Ok(RawRecord {
            offset: record_start as u64,
            payload_offset: payload_start as u64,
            checksum: expected_checksum,
            data: payload,
        })
    }
}

impl<'a> Iterator for RecordScanner<'a> {
    type Item = DeserializationResult<RawRecord<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        if self.position == self.data.len() {
            info!(
                "Reached end of log after {} records ({} bytes)",
                self.records_read,
                self.data.len()
            );
            self.exhausted = true;
            return None;
        }

        let record = self.read_record();
        if record.is_err() {
            self.exhausted = true;
        }
        Some(record)
    }
}

impl std::iter::FusedIterator for RecordScanner<'_> {}
