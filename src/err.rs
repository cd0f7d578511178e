use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::schema::SchemaKey;

pub type Result<T> = std::result::Result<T, EventLogError>;
pub type DeserializationResult<T> = std::result::Result<T, DeserializationError>;
pub type SchemaResult<T> = std::result::Result<T, SchemaError>;

/// Errors raised while scanning or decoding the log.
///
/// Every variant carries the absolute byte offset (from the start of the log) where the
/// problem was detected.
#[derive(Debug, Error)]
pub enum DeserializationError {
    #[error("Offset {offset}: invalid record magic, expected `FFFFFFFFFFFFFFFF`, found `{magic:02X?}`")]
    Framing { magic: [u8; 8], offset: u64 },

    #[error(
        "Offset {offset}: {remaining} bytes remaining is less than the minimum record size of {minimum} bytes"
    )]
    ShortRead {
        remaining: usize,
        minimum: usize,
        offset: u64,
    },

    #[error(
        "Offset {offset}: not enough bytes remaining for a record of size {length} (have {remaining})"
    )]
    TruncatedRecord {
        length: u32,
        remaining: usize,
        offset: u64,
    },

    #[error("Offset {offset}: checksum mismatch, expected {expected:#010x}, found {actual:#010x}")]
    Checksum {
        expected: u32,
        actual: u32,
        offset: u64,
    },

    #[error("Offset {offset}: unsupported context version {version}")]
    UnsupportedContextVersion { version: u16, offset: u64 },

    #[error("Offset {offset}: no schema registered for event type {} version {}", key.event_type, key.event_version)]
    UnknownSchema { key: SchemaKey, offset: u64 },

    #[error("Offset {offset}: failed to decode UTF-8 string, caused by: {source}")]
    Encoding {
        source: std::str::Utf8Error,
        offset: u64,
    },

    #[error("Offset {offset}: truncated {what} (need {need} bytes, have {have})")]
    Truncated {
        what: &'static str,
        offset: u64,
        need: usize,
        have: usize,
    },

    #[error("Offset {offset}: timestamp {seconds} is out of the supported range")]
    InvalidTimestamp { seconds: i64, offset: u64 },

    #[error("Offset {offset}: {remaining} trailing bytes after the event payload")]
    TrailingBytes { remaining: usize, offset: u64 },
}

impl DeserializationError {
    /// Absolute offset at which the error was detected.
    pub fn offset(&self) -> u64 {
        match self {
            DeserializationError::Framing { offset, .. }
            | DeserializationError::ShortRead { offset, .. }
            | DeserializationError::TruncatedRecord { offset, .. }
            | DeserializationError::Checksum { offset, .. }
            | DeserializationError::UnsupportedContextVersion { offset, .. }
            | DeserializationError::UnknownSchema { offset, .. }
            | DeserializationError::Encoding { offset, .. }
            | DeserializationError::Truncated { offset, .. }
            | DeserializationError::InvalidTimestamp { offset, .. }
            | DeserializationError::TrailingBytes { offset, .. } => *offset,
        }
    }
}

/// Errors raised while building a schema table.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Failed to parse schema table: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to read schema table from {path}: {source}")]
    Io { source: io::Error, path: PathBuf },

    #[error("Unknown event type name `{name}`")]
    UnknownEventTypeName { name: String },

    #[error("Schema for event type {} version {} is defined more than once", key.event_type, key.event_version)]
    DuplicateSchema { key: SchemaKey },

    #[error(
        "Unsupported field reader `{reader}` (field #{position} of event type {} version {})",
        key.event_type,
        key.event_version
    )]
    UnsupportedFieldType {
        reader: String,
        position: usize,
        key: SchemaKey,
    },

    #[error(
        "Unsupported wire primitive `{primitive}` (field #{position} of event type {} version {})",
        key.event_type,
        key.event_version
    )]
    UnsupportedPrimitive {
        primitive: String,
        position: usize,
        key: SchemaKey,
    },

    #[error(
        "`READ_TYPE` field #{position} of event type {} version {} does not name a wire primitive",
        key.event_type,
        key.event_version
    )]
    MissingPrimitive { position: usize, key: SchemaKey },
}

#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("An I/O error has occurred: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to open file {}: {source}", path.display())]
    FailedToOpenFile { source: io::Error, path: PathBuf },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Failed to decode event #{index} (record at offset {offset}), caused by:\n\t{source}")]
    FailedToDecodeEvent {
        index: u64,
        offset: u64,
        #[source]
        source: DeserializationError,
    },

    #[error(transparent)]
    Deserialization(#[from] DeserializationError),

    #[error("`serde_json` failed with error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Rendered document is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl EventLogError {
    /// Offset of the underlying decoding failure, if any.
    pub fn offset(&self) -> Option<u64> {
        match self {
            EventLogError::FailedToDecodeEvent { source, .. } => Some(source.offset()),
            EventLogError::Deserialization(e) => Some(e.offset()),
            _ => None,
        }
    }
}
