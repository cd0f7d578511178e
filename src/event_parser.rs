use std::fmt;
use std::fs::File;
use std::io::Read;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info};
use memmap2::Mmap;

use crate::err::{EventLogError, Result};
use crate::event_filter::EventFilter;
use crate::event_record::{DecodedEvent, EventAssembler};
use crate::json_output;
use crate::record_scanner::RecordScanner;
use crate::schema::SchemaTable;

#[derive(Debug, Clone)]
pub struct ParserSettings {
    /// Verify nonzero record checksums.
    validate_checksums: bool,
    /// Reject records with bytes left over after the payload.
    strict_record_length: bool,
    /// Indent JSON output.
    indent: bool,
    schema: Arc<SchemaTable>,
    filter: EventFilter,
}

impl Default for ParserSettings {
    fn default() -> Self {
        ParserSettings {
            validate_checksums: true,
            strict_record_length: false,
            indent: true,
            schema: SchemaTable::forum_default(),
            filter: EventFilter::empty(),
        }
    }
}

impl ParserSettings {
    pub fn new() -> Self {
        ParserSettings::default()
    }

    pub fn validate_checksums(mut self, validate_checksums: bool) -> Self {
        self.validate_checksums = validate_checksums;
        self
    }

    pub fn strict_record_length(mut self, strict: bool) -> Self {
        self.strict_record_length = strict;
        self
    }

    pub fn indent(mut self, pretty: bool) -> Self {
        self.indent = pretty;
        self
    }

    pub fn schema(mut self, schema: Arc<SchemaTable>) -> Self {
        self.schema = schema;
        self
    }

    /// Only events matching `filter` are yielded. Filtered out records are still decoded.
    pub fn filter(mut self, filter: EventFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn should_validate_checksums(&self) -> bool {
        self.validate_checksums
    }

    pub fn should_check_record_length(&self) -> bool {
        self.strict_record_length
    }

    pub fn should_indent(&self) -> bool {
        self.indent
    }

    pub fn get_schema(&self) -> &SchemaTable {
        &self.schema
    }

    pub fn get_filter(&self) -> &EventFilter {
        &self.filter
    }
}

enum LogBuffer {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Deref for LogBuffer {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        match self {
            LogBuffer::Mapped(mmap) => &mmap[..],
            LogBuffer::Owned(buf) => buf.as_slice(),
        }
    }
}

impl fmt::Debug for LogBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            LogBuffer::Mapped(_) => "Mapped",
            LogBuffer::Owned(_) => "Owned",
        };
        write!(f, "{kind}({} bytes)", self.len())
    }
}

/// An event rendered to `T`, with enough context to locate it in the log.
#[derive(Debug, Clone, PartialEq)]
pub struct SerializedEvent<T> {
    /// Position among the events yielded by the parser.
    pub index: u64,
    /// Offset of the record the event was decoded from.
    pub offset: u64,
    pub event_type: u32,
    pub timestamp: i64,
    pub data: T,
}

impl<T> SerializedEvent<T> {
    fn from_event(index: u64, event: &DecodedEvent, data: T) -> Self {
        SerializedEvent {
            index,
            offset: event.offset,
            event_type: event.event_type,
            timestamp: event.context.timestamp,
            data,
        }
    }
}

#[derive(Debug)]
pub struct EventLogParser {
    data: LogBuffer,
    config: Arc<ParserSettings>,
}

impl EventLogParser {
    /// Memory maps the log at `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path
            .as_ref()
            .canonicalize()
            .map_err(|e| EventLogError::FailedToOpenFile {
                source: e,
                path: path.as_ref().to_path_buf(),
            })?;

        let f = File::open(&path).map_err(|e| EventLogError::FailedToOpenFile {
            source: e,
            path: path.clone(),
        })?;

        // Zero length mappings are rejected on some platforms.
        let data = if f.metadata()?.len() == 0 {
            LogBuffer::Owned(Vec::new())
        } else {
            // SAFETY: the log is treated as read-only for the lifetime of the mapping.
            LogBuffer::Mapped(unsafe { Mmap::map(&f)? })
        };

        info!("Opened {} ({} bytes)", path.display(), data.len());
        Ok(EventLogParser {
            data,
            config: Arc::new(ParserSettings::default()),
        })
    }

    pub fn from_buffer(buffer: Vec<u8>) -> Self {
        debug!("Using in-memory log of {} bytes", buffer.len());
        EventLogParser {
            data: LogBuffer::Owned(buffer),
            config: Arc::new(ParserSettings::default()),
        }
    }

    /// Reads `reader` to its end and parses the collected bytes.
    pub fn from_read(mut reader: impl Read) -> Result<Self> {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        info!("Read {} bytes from stream", buffer.len());
        Ok(Self::from_buffer(buffer))
    }

    pub fn with_configuration(mut self, configuration: ParserSettings) -> Self {
        self.config = Arc::new(configuration);
        self
    }

    pub fn settings(&self) -> &ParserSettings {
        &self.config
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Scans framed records from the start of the log.
    pub fn raw_records(&self) -> RecordScanner<'_> {
        RecordScanner::new(&self.data).validate_checksums(self.config.should_validate_checksums())
    }

    /// Decodes events from the start of the log, skipping sentinel records.
    pub fn events(&self) -> IterEvents<'_> {
        IterEvents {
            scanner: self.raw_records(),
            assembler: EventAssembler::new(self.config.get_schema())
                .strict_record_length(self.config.should_check_record_length()),
            filter: self.config.get_filter(),
            records: 0,
            emitted: 0,
            finished: false,
        }
    }

    /// Events rendered as JSON documents.
    pub fn events_json(&self) -> impl Iterator<Item = Result<SerializedEvent<String>>> + '_ {
        let indent = self.config.should_indent();
        self.events().serialized(move |event| json_output::to_json_string(event, indent))
    }

    pub fn events_json_value(
        &self,
    ) -> impl Iterator<Item = Result<SerializedEvent<serde_json::Value>>> + '_ {
        self.events().serialized(json_output::to_json_value)
    }
}

/// Iterator over the decoded events of a log. Fused after the first error.
#[derive(Debug)]
pub struct IterEvents<'a> {
    scanner: RecordScanner<'a>,
    assembler: EventAssembler<'a>,
    filter: &'a EventFilter,
    records: u64,
    emitted: u64,
    finished: bool,
}

impl<'a> IterEvents<'a> {
    /// Number of events yielded so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    fn serialized<T, F>(mut self, mut render: F) -> impl Iterator<Item = Result<SerializedEvent<T>>> + 'a
    where
        F: FnMut(&DecodedEvent) -> Result<T> + 'a,
        T: 'a,
    {
        std::iter::from_fn(move || {
            let event = match self.next()? {
                Ok(event) => event,
                Err(e) => return Some(Err(e)),
            };
            let index = self.emitted - 1;
            Some(render(&event).map(|data| SerializedEvent::from_event(index, &event, data)))
        })
        .fuse()
    }

    fn fail(&mut self, error: EventLogError) -> Option<Result<DecodedEvent>> {
        self.finished = true;
        Some(Err(error))
    }
}

impl Iterator for IterEvents<'_> {
    type Item = Result<DecodedEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let record = match self.scanner.next() {
                Some(Ok(record)) => record,
                Some(Err(e)) => return self.fail(EventLogError::Deserialization(e)),
                None => {
                    info!(
                        "Decoded {} events from {} records",
                        self.emitted, self.records
                    );
                    self.finished = true;
                    return None;
                }
            };

            let index = self.records;
            self.records += 1;

            match self.assembler.decode(&record) {
                Ok(Some(event)) if self.filter.matches(&event) => {
                    self.emitted += 1;
                    return Some(Ok(event));
                }
                Ok(_) => continue,
                Err(source) => {
                    return self.fail(EventLogError::FailedToDecodeEvent {
                        index,
                        offset: record.offset,
                        source,
                    });
                }
            }
        }
    }
}

impl std::iter::FusedIterator for IterEvents<'_> {}
