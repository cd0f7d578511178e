use log::debug;
use serde::Serialize;

use crate::context::{DecodedContext, read_context};
use crate::err::{DeserializationError, DeserializationResult};
use crate::payload::{EventData, read_payload};
use crate::record_scanner::RawRecord;
use crate::schema::{SchemaKey, SchemaTable};
use crate::utils::ByteCursor;

pub const EVENT_HEADER_SIZE: usize = 8;

/// The fixed 8 byte header at the start of every record payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub event_type: u32,
    pub event_version: u16,
    pub context_version: u16,
}

impl RecordHeader {
    /// `base` is the absolute offset of `data[0]`.
    pub fn from_bytes(data: &[u8], base: u64) -> DeserializationResult<RecordHeader> {
        let mut cursor = ByteCursor::with_pos(data, 0, base)?;

        Ok(RecordHeader {
            event_type: cursor.u32_named("event type")?,
            event_version: cursor.u16_named("event version")?,
            context_version: cursor.u16_named("context version")?,
        })
    }

    /// Type `0` terminates a write batch and carries no event.
    pub fn is_sentinel(&self) -> bool {
        self.event_type == 0
    }

    pub fn schema_key(&self) -> SchemaKey {
        SchemaKey::new(self.event_type, self.event_version)
    }
}

/// One fully decoded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedEvent {
    #[serde(rename = "type")]
    pub event_type: u32,
    pub type_name: String,
    pub version: u16,
    pub context_version: u16,
    pub context: DecodedContext,
    pub data: EventData,
    /// Offset of the record this event was decoded from.
    #[serde(skip)]
    pub offset: u64,
}

/// Turns raw records into events using a schema table.
#[derive(Debug, Clone, Copy)]
pub struct EventAssembler<'s> {
    schema: &'s SchemaTable,
    strict_record_length: bool,
}

impl<'s> EventAssembler<'s> {
    pub fn new(schema: &'s SchemaTable) -> Self {
        EventAssembler {
            schema,
            strict_record_length: false,
        }
    }

    /// When set, bytes left over after the payload are an error.
    pub fn strict_record_length(mut self, strict: bool) -> Self {
        self.strict_record_length = strict;
        self
    }

    /// Decodes a record, returning `None` for sentinel records.
    pub fn decode(&self, record: &RawRecord<'_>) -> DeserializationResult<Option<DecodedEvent>> {
        let base = record.payload_offset;
        let header = RecordHeader::from_bytes(record.data, base)?;

        if header.is_sentinel() {
            debug!(
                "Offset `0x{offset:08x} ({offset})` skipping sentinel record",
                offset = record.offset
            );
            return Ok(None);
        }

        let context = read_context(
            header.context_version,
            record.data,
            EVENT_HEADER_SIZE,
            base,
        )?;

        let payload_start = EVENT_HEADER_SIZE + context.size;
        let (data, consumed) = read_payload(
            self.schema,
            header.event_type,
            header.event_version,
            record.data,
            payload_start,
            base,
        )?;

        let end = payload_start + consumed;
        if self.strict_record_length && end != record.data.len() {
            return Err(DeserializationError::TrailingBytes {
                remaining: record.data.len() - end,
                offset: base + end as u64,
            });
        }

        Ok(Some(DecodedEvent {
            event_type: header.event_type,
            type_name: self.schema.type_name(header.event_type).to_owned(),
            version: header.event_version,
            context_version: header.context_version,
            context,
            data,
            offset: record.offset,
        }))
    }
}
