use indexmap::IndexMap;
use log::trace;

use crate::err::{DeserializationError, DeserializationResult};
use crate::field_reader::FieldValue;
use crate::schema::{SchemaKey, SchemaTable};
use crate::utils::ByteCursor;

/// Decoded payload fields, keyed by normalized field name, in schema order.
pub type EventData = IndexMap<String, FieldValue>;

/// Decodes the payload of a `(event_type, event_version)` event starting at `offset` in `data`.
///
/// Returns the decoded fields and the number of bytes they occupied. Nothing is returned unless
/// every field decodes. `base` is the absolute position of `data` in the log.
pub fn read_payload(
    schema: &SchemaTable,
    event_type: u32,
    event_version: u16,
    data: &[u8],
    offset: usize,
    base: u64,
) -> DeserializationResult<(EventData, usize)> {
    let mut cursor = ByteCursor::with_pos(data, offset, base)?;
    let key = SchemaKey::new(event_type, event_version);

    let fields = schema
        .get(key)
        .ok_or_else(|| DeserializationError::UnknownSchema {
            key,
            offset: cursor.position(),
        })?;

    trace!(
        "Offset `0x{offset:08x} ({offset})` reading {count} fields of {key}",
        offset = cursor.position(),
        count = fields.len()
    );

    let mut out = EventData::with_capacity(fields.len());
    for field in fields {
        let value = field.reader.read(&mut cursor)?;
        out.insert(field.key.clone(), value);
    }

    Ok((out, cursor.pos() - offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldReader, FieldSpec, Primitive};
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn table() -> SchemaTable {
        let mut table = SchemaTable::new(vec!["UNKNOWN".into(), "ADD_THING".into()]);
        table
            .insert(
                SchemaKey::new(1, 1),
                vec![
                    FieldSpec::new(FieldReader::Uuid, "thingId"),
                    FieldSpec::new(FieldReader::String, "displayName"),
                    FieldSpec::new(FieldReader::Type(Primitive::UInt32), "count"),
                ],
            )
            .unwrap();
        table.insert(SchemaKey::new(1, 2), vec![]).unwrap();
        table
    }

    fn payload() -> Vec<u8> {
        let mut buf = Uuid::from_u128(7).as_bytes().to_vec();
        buf.extend_from_slice(&6_u32.to_le_bytes());
        buf.extend_from_slice("żół".as_bytes());
        buf.extend_from_slice(&9_u32.to_le_bytes());
        buf
    }

    #[test]
    fn test_decodes_fields_in_schema_order() {
        let table = table();
        let mut data = vec![0xee; 3];
        data.extend(payload());

        let (fields, consumed) = read_payload(&table, 1, 1, &data, 3, 0).unwrap();
        assert_eq!(consumed, 16 + 4 + 6 + 4);
        assert_eq!(
            fields.keys().collect::<Vec<_>>(),
            vec!["thing_id", "display_name", "count"]
        );
        assert_eq!(fields["thing_id"], FieldValue::Uuid(Uuid::from_u128(7)));
        assert_eq!(fields["display_name"].as_str(), Some("żół"));
        assert_eq!(fields["count"], FieldValue::U32(9));
    }

    #[test]
    fn test_empty_schema_consumes_nothing() {
        let table = table();
        let (fields, consumed) = read_payload(&table, 1, 2, &[], 0, 0).unwrap();
        assert!(fields.is_empty());
        assert_eq!(consumed, 0);
    }

    #[test]
    fn test_unknown_schema_is_an_error() {
        let table = table();
        let err = read_payload(&table, 1, 3, &payload(), 0, 48).unwrap_err();
        match err {
            DeserializationError::UnknownSchema { key, offset } => {
                assert_eq!(key, SchemaKey::new(1, 3));
                assert_eq!(offset, 48);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_failure_in_last_field_fails_the_payload() {
        let table = table();
        let data = payload();
        let err = read_payload(&table, 1, 1, &data[..data.len() - 1], 0, 100).unwrap_err();
        assert!(matches!(
            err,
            DeserializationError::Truncated { offset: 126, .. }
        ));
    }
}
