//! Schema table: maps `(event type, event version)` to the ordered list of field readers used to
//! decode an event payload, plus the display names of event type codes.
//!
//! A table is built once (from JSON, or the bundled forum table) and shared read-only for the
//! rest of the process.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use hashbrown::HashMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::err::{SchemaError, SchemaResult};

const FORUM_SCHEMA_JSON: &str = include_str!("../schemas/forum_events.json");

/// Display name used for event type codes that are missing from the table.
pub const UNKNOWN_EVENT_TYPE_NAME: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SchemaKey {
    pub event_type: u32,
    pub event_version: u16,
}

impl SchemaKey {
    pub fn new(event_type: u32, event_version: u16) -> Self {
        SchemaKey {
            event_type,
            event_version,
        }
    }
}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, v{})", self.event_type, self.event_version)
    }
}

/// Fixed-width wire primitives, named as the persistence engine names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    /// Alias of `uint16_t`.
    PrivilegeEnum,
    /// Alias of `int16_t`.
    PrivilegeValue,
    /// Alias of `int64_t`.
    PrivilegeDuration,
}

impl Primitive {
    pub fn from_wire_name(name: &str) -> Option<Self> {
        let primitive = match name {
            "int16_t" => Primitive::Int16,
            "uint16_t" => Primitive::UInt16,
            "int32_t" => Primitive::Int32,
            "uint32_t" => Primitive::UInt32,
            "int64_t" => Primitive::Int64,
            "uint64_t" => Primitive::UInt64,
            "PersistentPrivilegeEnumType" => Primitive::PrivilegeEnum,
            "PersistentPrivilegeValueType" => Primitive::PrivilegeValue,
            "PersistentPrivilegeDurationType" => Primitive::PrivilegeDuration,
            _ => return None,
        };
        Some(primitive)
    }

    pub fn wire_name(self) -> &'static str {
        match self {
            Primitive::Int16 => "int16_t",
            Primitive::UInt16 => "uint16_t",
            Primitive::Int32 => "int32_t",
            Primitive::UInt32 => "uint32_t",
            Primitive::Int64 => "int64_t",
            Primitive::UInt64 => "uint64_t",
            Primitive::PrivilegeEnum => "PersistentPrivilegeEnumType",
            Primitive::PrivilegeValue => "PersistentPrivilegeValueType",
            Primitive::PrivilegeDuration => "PersistentPrivilegeDurationType",
        }
    }

    /// Width in bytes on the wire.
    pub fn size(self) -> usize {
        match self {
            Primitive::Int16
            | Primitive::UInt16
            | Primitive::PrivilegeEnum
            | Primitive::PrivilegeValue => 2,
            Primitive::Int32 | Primitive::UInt32 => 4,
            Primitive::Int64 | Primitive::UInt64 | Primitive::PrivilegeDuration => 8,
        }
    }
}

/// How a single payload field is laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldReader {
    /// 16 raw bytes.
    Uuid,
    /// `u32` length prefix + UTF-8 bytes.
    String,
    /// Same wire format as `String`; emptiness is not checked while decoding.
    NonEmptyString,
    /// A fixed-width integer.
    Type(Primitive),
}

impl FieldReader {
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldReader::Uuid => "READ_UUID",
            FieldReader::String => "READ_STRING",
            FieldReader::NonEmptyString => "READ_NONEMPTY_STRING",
            FieldReader::Type(_) => "READ_TYPE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub reader: FieldReader,
    /// Name as declared in the schema.
    pub name: String,
    /// Name used as the key of the decoded field.
    pub key: String,
}

impl FieldSpec {
    pub fn new(reader: FieldReader, name: impl Into<String>) -> Self {
        let name = name.into();
        let key = normalize_field_name(&name);
        FieldSpec { reader, name, key }
    }
}

/// `parentThreadId` -> `parent_thread_id`.
///
/// Every ASCII upper-case letter becomes `_` + its lower-case form, then leading and trailing
/// underscores are stripped.
pub fn normalize_field_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out.trim_matches('_').to_owned()
}

#[derive(Debug, Default)]
pub struct SchemaTable {
    type_names: Vec<String>,
    schemas: HashMap<SchemaKey, Vec<FieldSpec>, ahash::RandomState>,
}

impl SchemaTable {
    /// `type_names[i]` is the display name of event type code `i`.
    pub fn new(type_names: Vec<String>) -> Self {
        SchemaTable {
            type_names,
            schemas: HashMap::default(),
        }
    }

    /// The bundled table describing the forum's persisted events.
    pub fn forum_default() -> Arc<SchemaTable> {
        static FORUM: OnceLock<Arc<SchemaTable>> = OnceLock::new();
        FORUM
            .get_or_init(|| {
                Arc::new(
                    SchemaTable::from_json_str(FORUM_SCHEMA_JSON)
                        .expect("bundled schema table is valid"),
                )
            })
            .clone()
    }

    pub fn from_json_str(json: &str) -> SchemaResult<SchemaTable> {
        let raw: RawSchemaTable = serde_json::from_str(json)?;
        SchemaTable::try_from(raw)
    }

    pub fn from_json_slice(json: &[u8]) -> SchemaResult<SchemaTable> {
        let raw: RawSchemaTable = serde_json::from_slice(json)?;
        SchemaTable::try_from(raw)
    }

    pub fn from_path(path: impl AsRef<Path>) -> SchemaResult<SchemaTable> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| SchemaError::Io {
            source,
            path: path.to_path_buf(),
        })?;
        let table = SchemaTable::from_json_slice(&bytes)?;
        debug!(
            "Loaded {} event schemas from {}",
            table.len(),
            path.display()
        );
        Ok(table)
    }

    /// Registers the field list for `key`. A key may only be registered once.
    pub fn insert(&mut self, key: SchemaKey, fields: Vec<FieldSpec>) -> SchemaResult<()> {
        if self.schemas.contains_key(&key) {
            return Err(SchemaError::DuplicateSchema { key });
        }
        self.schemas.insert(key, fields);
        Ok(())
    }

    pub fn get(&self, key: SchemaKey) -> Option<&[FieldSpec]> {
        self.schemas.get(&key).map(Vec::as_slice)
    }

    pub fn type_name(&self, event_type: u32) -> &str {
        self.type_names
            .get(event_type as usize)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_EVENT_TYPE_NAME)
    }

    pub fn type_code(&self, name: &str) -> Option<u32> {
        self.type_names
            .iter()
            .position(|n| n == name)
            .and_then(|i| u32::try_from(i).ok())
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = SchemaKey> + '_ {
        self.schemas.keys().copied()
    }
}

#[derive(Debug, Deserialize)]
struct RawSchemaTable {
    #[serde(default)]
    event_types: Vec<String>,
    #[serde(default)]
    events: Vec<RawEventSchema>,
}

#[derive(Debug, Deserialize)]
struct RawEventSchema {
    #[serde(rename = "type")]
    event_type: RawEventType,
    version: u16,
    #[serde(default)]
    fields: Vec<RawFieldSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEventType {
    Code(u32),
    Name(String),
}

#[derive(Debug, Deserialize)]
struct RawFieldSpec {
    reader: String,
    name: String,
    #[serde(rename = "type", default)]
    primitive: Option<String>,
}

impl RawFieldSpec {
    fn into_field_spec(self, key: SchemaKey, position: usize) -> SchemaResult<FieldSpec> {
        let reader = match self.reader.as_str() {
            "READ_UUID" => FieldReader::Uuid,
            "READ_STRING" => FieldReader::String,
            "READ_NONEMPTY_STRING" => FieldReader::NonEmptyString,
            "READ_TYPE" => {
                let name = self
                    .primitive
                    .ok_or(SchemaError::MissingPrimitive { position, key })?;
                let primitive = Primitive::from_wire_name(&name).ok_or(
                    SchemaError::UnsupportedPrimitive {
                        primitive: name,
                        position,
                        key,
                    },
                )?;
                FieldReader::Type(primitive)
            }
            _ => {
                return Err(SchemaError::UnsupportedFieldType {
                    reader: self.reader,
                    position,
                    key,
                });
            }
        };

        Ok(FieldSpec::new(reader, self.name))
    }
}

impl TryFrom<RawSchemaTable> for SchemaTable {
    type Error = SchemaError;

    fn try_from(raw: RawSchemaTable) -> SchemaResult<SchemaTable> {
        let mut table = SchemaTable::new(raw.event_types);

        for event in raw.events {
            let event_type = match event.event_type {
                RawEventType::Code(code) => code,
                RawEventType::Name(name) => table
                    .type_code(&name)
                    .ok_or(SchemaError::UnknownEventTypeName { name })?,
            };
            let key = SchemaKey::new(event_type, event.version);

            let fields = event
                .fields
                .into_iter()
                .enumerate()
                .map(|(position, field)| field.into_field_spec(key, position))
                .collect::<SchemaResult<Vec<_>>>()?;

            table.insert(key, fields)?;
        }

        Ok(table)
    }
}
