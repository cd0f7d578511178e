use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::err::Result;
use crate::event_record::DecodedEvent;

const INDENT: &[u8] = b"    ";

pub fn to_json_value(event: &DecodedEvent) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(event)?)
}

/// Renders one event as a JSON document, indented by four spaces when `indent` is set.
pub fn to_json_string(event: &DecodedEvent, indent: bool) -> Result<String> {
    if !indent {
        return Ok(serde_json::to_string(event)?);
    }

    Ok(String::from_utf8(to_json_vec(event, true)?)?)
}

pub fn to_json_vec(event: &DecodedEvent, indent: bool) -> Result<Vec<u8>> {
    if !indent {
        return Ok(serde_json::to_vec(event)?);
    }

    let mut out = Vec::with_capacity(512);
    let mut serializer = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(INDENT));
    event.serialize(&mut serializer)?;
    Ok(out)
}
