use std::fmt;

use log::trace;
use serde::Serialize;
use uuid::Uuid;

use crate::err::DeserializationResult;
use crate::schema::{FieldReader, Primitive};
use crate::utils::ByteCursor;

pub const UUID_SIZE: usize = 16;

/// A single decoded payload field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Uuid(Uuid),
    String(String),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            FieldValue::Uuid(u) => Some(*u),
            _ => None,
        }
    }

    /// Integer fields widened to `i128`, so every primitive fits without loss.
    pub fn as_integer(&self) -> Option<i128> {
        match *self {
            FieldValue::I16(v) => Some(i128::from(v)),
            FieldValue::U16(v) => Some(i128::from(v)),
            FieldValue::I32(v) => Some(i128::from(v)),
            FieldValue::U32(v) => Some(i128::from(v)),
            FieldValue::I64(v) => Some(i128::from(v)),
            FieldValue::U64(v) => Some(i128::from(v)),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Uuid(v) => write!(f, "{}", v.hyphenated()),
            FieldValue::String(v) => f.write_str(v),
            FieldValue::I16(v) => write!(f, "{v}"),
            FieldValue::U16(v) => write!(f, "{v}"),
            FieldValue::I32(v) => write!(f, "{v}"),
            FieldValue::U32(v) => write!(f, "{v}"),
            FieldValue::I64(v) => write!(f, "{v}"),
            FieldValue::U64(v) => write!(f, "{v}"),
        }
    }
}

pub(crate) fn read_uuid(cursor: &mut ByteCursor<'_>) -> DeserializationResult<Uuid> {
    Ok(Uuid::from_bytes(cursor.array::<UUID_SIZE>("uuid")?))
}

impl Primitive {
    pub(crate) fn read(self, cursor: &mut ByteCursor<'_>) -> DeserializationResult<FieldValue> {
        let what = self.wire_name();
        let value = match self {
            Primitive::Int16 | Primitive::PrivilegeValue => FieldValue::I16(cursor.i16_named(what)?),
            Primitive::UInt16 | Primitive::PrivilegeEnum => FieldValue::U16(cursor.u16_named(what)?),
            Primitive::Int32 => FieldValue::I32(cursor.i32_named(what)?),
            Primitive::UInt32 => FieldValue::U32(cursor.u32_named(what)?),
            Primitive::Int64 | Primitive::PrivilegeDuration => {
                FieldValue::I64(cursor.i64_named(what)?)
            }
            Primitive::UInt64 => FieldValue::U64(cursor.u64_named(what)?),
        };
        Ok(value)
    }
}

impl FieldReader {
    /// Reads one field at the cursor, advancing it past the bytes consumed.
    pub(crate) fn read(&self, cursor: &mut ByteCursor<'_>) -> DeserializationResult<FieldValue> {
        trace!(
            "Offset `0x{offset:08x} ({offset})` reading {kind}",
            offset = cursor.position(),
            kind = self.kind_name()
        );

        match self {
            FieldReader::Uuid => Ok(FieldValue::Uuid(read_uuid(cursor)?)),
            FieldReader::String | FieldReader::NonEmptyString => Ok(FieldValue::String(
                cursor.len_prefixed_utf8_string("string")?.to_owned(),
            )),
            FieldReader::Type(primitive) => primitive.read(cursor),
        }
    }

    /// Reads one field from `buf` at `offset`, returning the value and the number of bytes
    /// consumed. Error offsets are relative to `buf`.
    pub fn read_at(&self, buf: &[u8], offset: usize) -> DeserializationResult<(FieldValue, usize)> {
        let mut cursor = ByteCursor::with_pos(buf, offset, 0)?;
        let value = self.read(&mut cursor)?;
        Ok((value, cursor.pos() - offset))
    }
}
