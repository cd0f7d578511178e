
use fixtures::*;

use forum_events::err::{DeserializationError, EventLogError};
use forum_events::{
    EventFilter, EventLogParser, FieldValue, ParserSettings, SchemaKey, SchemaTable,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn test_parses_regular_log() {
    ensure_env_logger_initialized();
    let parser = EventLogParser::from_buffer(regular_log());

    let events = parser
        .events()
        .collect::<Result<Vec<_>, _>>()
        .expect("log is well formed");

    // 7 records, 2 of them sentinels.
    assert_eq!(parser.raw_records().count(), 7);
    assert_eq!(events.len(), 5);

    let names: Vec<&str> = events.iter().map(|e| e.type_name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "ADD_NEW_USER",
            "ADD_NEW_USER",
            "ADD_NEW_DISCUSSION_THREAD_MESSAGE",
            "CHANGE_DISCUSSION_CATEGORY_DISPLAY_ORDER",
            "DELETE_USER"
        ]
    );

    let message = &events[2];
    assert_eq!(message.data["content"].as_str(), Some("hello, żółw"));
    assert_eq!(
        message.data["parent_id"].to_string(),
        "00000000-0000-0000-0000-000000000014"
    );
    assert_eq!(message.context.timestamp_str, "2017-07-14 02:40:00Z");
    assert_eq!(message.context.ip_address.to_string(), "192.168.0.10");

    let order = &events[3];
    assert_eq!(order.data["display_order"], FieldValue::I16(-5));
    assert_eq!(order.context.timestamp, 1_500_000_060);
}

#[test]
fn test_renders_documents_in_stable_key_order() {
    let parser = EventLogParser::from_buffer(LogBuilder::new().add_user(1, "alice").build());

    let event = parser.events_json_value().next().unwrap().unwrap();
    assert_eq!(event.index, 0);
    assert_eq!(event.event_type, ADD_NEW_USER);
    assert_eq!(
        event.data,
        json!({
            "type": 1,
            "type_name": "ADD_NEW_USER",
            "version": 1,
            "context_version": 1,
            "context": {
                "timestamp": 1_500_000_000,
                "timestamp_str": "2017-07-14 02:40:00Z",
                "user_id": "00000000-0000-0000-0000-000000abcdef",
                "ip_address": "192.168.0.10"
            },
            "data": {
                "id": "00000000-0000-0000-0000-000000000001",
                "name": "alice"
            }
        })
    );

    let keys: Vec<&String> = event.data.as_object().unwrap().keys().collect();
    assert_eq!(
        keys,
        vec!["type", "type_name", "version", "context_version", "context", "data"]
    );
}

#[test]
fn test_ipv6_context_address() {
    let mut address = [0_u8; 16];
    address[..2].copy_from_slice(&[0xfe, 0x80]);
    address[15] = 1;

    let log = LogBuilder::new().address(address).delete_user(9).build();
    let parser = EventLogParser::from_buffer(log);
    let event = parser.events().next().unwrap().unwrap();
    assert_eq!(event.context.ip_address.to_string(), "fe80::1");
}

#[test]
fn test_empty_payload_record_fails_to_decode() {
    let log = LogBuilder::new().add_user(1, "a").raw(&[]).build();
    let parser = EventLogParser::from_buffer(log);

    // The scanner accepts a zero length record, the header cannot be read from it.
    assert_eq!(parser.raw_records().filter(|r| r.is_ok()).count(), 2);

    let results: Vec<_> = parser.events().collect();
    assert_eq!(results.len(), 2);
    assert!(matches!(
        results[1],
        Err(EventLogError::FailedToDecodeEvent {
            index: 1,
            source: DeserializationError::Truncated { .. },
            ..
        })
    ));
}

#[test]
fn test_unknown_schema_halts_the_scan() {
    let log = LogBuilder::new()
        .add_user(1, "a")
        .event(ADD_NEW_USER, 2, &Fields::new().uuid(1).build())
        .add_user(2, "b")
        .build();

    let parser = EventLogParser::from_buffer(log);
    let results: Vec<_> = parser.events().collect();

    assert_eq!(results.len(), 2);
    match &results[1] {
        Err(EventLogError::FailedToDecodeEvent {
            source: DeserializationError::UnknownSchema { key, .. },
            ..
        }) => assert_eq!(*key, SchemaKey::new(ADD_NEW_USER, 2)),
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn test_truncated_log_reports_offset() {
    let full = LogBuilder::new().add_user(1, "alice").add_user(2, "bob");
    let second_record = LogBuilder::new().add_user(1, "alice").len() as u64;
    let mut log = full.build();
    log.truncate(log.len() - 20);

    let parser = EventLogParser::from_buffer(log);
    let err = parser
        .events()
        .find_map(|e| e.err())
        .expect("log is truncated");

    assert_eq!(err.offset(), Some(second_record + 16));
    assert!(matches!(
        err,
        EventLogError::Deserialization(DeserializationError::TruncatedRecord {
            length: 71,
            remaining: 52,
            ..
        })
    ));
}

#[test]
fn test_logs_without_checksums_are_accepted() {
    let log = LogBuilder::new()
        .without_checksums()
        .add_user(1, "alice")
        .delete_user(1)
        .build();

    let parser = EventLogParser::from_buffer(log);
    assert_eq!(parser.events().filter(|e| e.is_ok()).count(), 2);
}

#[test]
fn test_event_type_filter() {
    let settings = ParserSettings::new().filter(EventFilter::new([ADD_NEW_USER, DELETE_USER]));
    let parser = EventLogParser::from_buffer(regular_log()).with_configuration(settings);

    let events = parser
        .events_json()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(
        events.iter().map(|e| e.event_type).collect::<Vec<_>>(),
        vec![ADD_NEW_USER, ADD_NEW_USER, DELETE_USER]
    );
    assert_eq!(
        events.iter().map(|e| e.index).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
}

#[test]
fn test_custom_schema_table() {
    let json = r#"{
        "event_types": ["UNKNOWN", "PING"],
        "events": [
            {"type": "PING", "version": 3, "fields": [
                {"reader": "READ_TYPE", "name": "sequenceNumber", "type": "uint64_t"},
                {"reader": "READ_TYPE", "name": "grantDuration", "type": "PersistentPrivilegeDurationType"}
            ]}
        ]
    }"#;
    let schema = Arc::new(SchemaTable::from_json_str(json).unwrap());

    let fields = Fields::new()
        .bytes(&u64::MAX.to_le_bytes())
        .bytes(&(-60_i64).to_le_bytes())
        .build();
    let log = LogBuilder::new().event(1, 3, &fields).build();

    let parser =
        EventLogParser::from_buffer(log).with_configuration(ParserSettings::new().schema(schema));
    let event = parser.events().next().unwrap().unwrap();

    assert_eq!(event.type_name, "PING");
    assert_eq!(event.data["sequence_number"], FieldValue::U64(u64::MAX));
    assert_eq!(event.data["grant_duration"].as_integer(), Some(-60));
}

#[test]
fn test_bundled_schema_file_matches_builtin_table() {
    let from_file = SchemaTable::from_path(schemas_dir().join("forum_events.json")).unwrap();
    let builtin = SchemaTable::forum_default();

    let mut file_keys: Vec<SchemaKey> = from_file.keys().collect();
    let mut builtin_keys: Vec<SchemaKey> = builtin.keys().collect();
    file_keys.sort();
    builtin_keys.sort();
    assert_eq!(file_keys, builtin_keys);
}

#[test]
fn test_parses_from_file_and_reader() {
    let dir = tempdir().unwrap();
    let path = write_regular_log(dir.path());

    let from_path = EventLogParser::from_path(&path).unwrap();
    let from_read = EventLogParser::from_read(std::fs::File::open(&path).unwrap()).unwrap();

    let a: Vec<_> = from_path.events().map(|e| e.unwrap()).collect();
    let b: Vec<_> = from_read.events().map(|e| e.unwrap()).collect();
    assert_eq!(a, b);
}

#[test]
fn test_writes_archive_tree() {
    let dir = tempdir().unwrap();
    let parser = EventLogParser::from_buffer(regular_log());

    let written = forum_events::archive_output::write_event_tree(dir.path(), parser.events())
        .unwrap();
    assert_eq!(written, 5);

    let entry = dir.path().join("0000").join("00000003.e35");
    let document: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(entry).unwrap()).unwrap();
    assert_eq!(document["data"]["display_order"], -5);
}
