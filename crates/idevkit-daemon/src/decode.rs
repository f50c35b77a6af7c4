//! Property-list decoding of tool output
//!
//! `ideviceinfo -x`, `idevicediagnostics` and `ideviceinstaller -o xml` print
//! property lists. The gateway never interprets them beyond handing the
//! decoded tree back to the caller.

use std::io::Cursor;

use plist::{Dictionary, Value};

use idevkit_core::prelude::*;

/// Decode property-list text (XML or binary) into a value tree.
pub fn decode_plist(text: &str) -> Result<Value> {
    decode_plist_bytes(text.as_bytes())
}

pub fn decode_plist_bytes(bytes: &[u8]) -> Result<Value> {
    Value::from_reader(Cursor::new(bytes)).map_err(|e| Error::decode("property list", e.to_string()))
}

/// Decode and require a top-level dictionary
pub fn decode_dictionary(text: &str) -> Result<Dictionary> {
    match decode_plist(text)? {
        Value::Dictionary(dict) => Ok(dict),
        other => Err(Error::decode(
            "property list",
            format!("expected a dictionary, got {}", kind(&other)),
        )),
    }
}

/// Convert a plist tree to JSON for presentation.
///
/// Dates become RFC 3339 strings and data blobs become arrays of bytes.
pub fn plist_to_json(value: &Value) -> serde_json::Value {
    use serde_json::Value as Json;

    match value {
        Value::Array(items) => Json::Array(items.iter().map(plist_to_json).collect()),
        Value::Dictionary(dict) => Json::Object(
            dict.iter()
                .map(|(k, v)| (k.clone(), plist_to_json(v)))
                .collect(),
        ),
        Value::Boolean(b) => Json::Bool(*b),
        Value::Data(bytes) => Json::Array(bytes.iter().map(|b| Json::from(*b)).collect()),
        Value::Date(date) => Json::String(date.to_xml_format()),
        Value::Real(f) => serde_json::Number::from_f64(*f)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Value::Integer(i) => i
            .as_signed()
            .map(Json::from)
            .or_else(|| i.as_unsigned().map(Json::from))
            .unwrap_or(Json::Null),
        Value::String(s) => Json::String(s.clone()),
        Value::Uid(uid) => Json::from(uid.get()),
        _ => Json::Null,
    }
}

/// Read an integer field that may be stored as an integer, real or string.
pub fn integer_field(dict: &Dictionary, key: &str) -> Option<i64> {
    match dict.get(key)? {
        Value::Integer(i) => i.as_signed().or_else(|| i.as_unsigned().map(|u| u as i64)),
        Value::Real(f) => Some(*f as i64),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Like [`integer_field`] but missing keys are a decode error.
pub fn require_integer(dict: &Dictionary, key: &str) -> Result<i64> {
    integer_field(dict, key).ok_or_else(|| Error::decode(key, "missing or not an integer"))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Array(_) => "an array",
        Value::Dictionary(_) => "a dictionary",
        Value::Boolean(_) => "a boolean",
        Value::Data(_) => "data",
        Value::Date(_) => "a date",
        Value::Real(_) => "a real",
        Value::Integer(_) => "an integer",
        Value::String(_) => "a string",
        _ => "an unsupported value",
    }
}
