#![deny(unused_must_use)]

pub use event_filter::EventFilter;
pub use event_parser::{EventLogParser, IterEvents, ParserSettings, SerializedEvent};
pub use event_record::{DecodedEvent, EventAssembler, RecordHeader};
pub use field_reader::FieldValue;
pub use record_scanner::{RawRecord, RecordScanner};
pub use schema::{FieldReader, FieldSpec, Primitive, SchemaKey, SchemaTable};

pub mod archive_output;
pub mod context;
pub mod err;
pub mod event_filter;
pub mod event_parser;
pub mod event_record;
pub mod field_reader;
pub mod json_output;
pub mod payload;
pub mod record_scanner;
pub mod schema;

mod utils;

#[cfg(test)]
use std::sync::Once;

#[cfg(test)]
static LOGGER_INIT: Once = Once::new();

// Rust runs the tests concurrently, so unless we synchronize logging access
// it will crash when attempting to run `cargo test` with some logging facilities.
#[cfg(test)]
pub fn ensure_env_logger_initialized() {
    use std::io::Write;

    LOGGER_INIT.call_once(|| {
        let mut builder = env_logger::Builder::from_default_env();
        builder
            .format(|buf, record| writeln!(buf, "[{}] - {}", record.level(), record.args()))
            .init();
    });
}
