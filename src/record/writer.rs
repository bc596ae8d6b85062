//! JSON → record.
//!
//! The interpreter's `echojson` output has a single root key naming the
//! record, nested objects for records, arrays for lists, and timestamps in
//! the `/Date(<ISO-8601>)/` convention.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime};
use serde_json::Value as Json;

use super::{DataType, Record, RecordError, Value};
use crate::error::Result;

/// Populate `target` from a JSON document produced by the interpreter.
///
/// The document's only top-level key must be the record's name. Every scalar
/// field must be present; complex fields that are absent keep their current
/// value. Dynamic lists grow to the length of the JSON array and reuse
/// existing elements positionally; elements beyond the array are kept.
pub fn put_from_json(json: &str, target: &mut Record) -> Result<()> {
    let document: Json = serde_json::from_str(json)?;
    let mismatch = |found: String| RecordError::SchemaMismatch {
        expected: target.name().to_string(),
        found,
    };
    let root = document
        .as_object()
        .ok_or_else(|| mismatch(kind_of(&document).to_string()))?;
    let mut entries = root.iter();
    let (key, body) = match (entries.next(), entries.next()) {
        (Some(entry), None) => entry,
        _ => {
            let keys: Vec<&str> = root.keys().map(String::as_str).collect();
            return Err(mismatch(format!("keys [{}]", keys.join(", "))).into());
        }
    };
    if key.to_ascii_uppercase() != target.name() {
        return Err(mismatch(key.clone()).into());
    }
    put_record(body, target)?;
    Ok(())
}

fn put_record(json: &Json, record: &mut Record) -> std::result::Result<(), RecordError> {
    let record_name = record.name().to_string();
    let object = json.as_object().ok_or_else(|| RecordError::InvalidValue {
        field: record_name.clone(),
        reason: format!("expected an object, found {}", kind_of(json)),
    })?;
    let lookup: HashMap<String, &Json> = object
        .iter()
        .map(|(k, v)| (k.to_ascii_uppercase(), v))
        .collect();

    let structure = record.structure().clone();
    for (i, field) in structure.fields().iter().enumerate() {
        let path = format!("{record_name}->{}", field.name());
        let value = lookup.get(field.name()).copied();
        let slot = record.value_mut(i);

        if field.data_type().is_complex() {
            let Some(value) = value else { continue };
            let child = field.structure().cloned().unwrap_or_default();
            match slot {
                Value::Record(nested) => put_record(value, nested)?,
                Value::DynamicList(items) => {
                    let array = value.as_array().ok_or_else(|| RecordError::InvalidValue {
                        field: path.clone(),
                        reason: format!("expected an array, found {}", kind_of(value)),
                    })?;
                    for (j, element) in array.iter().enumerate() {
                        if j >= items.len() {
                            items.push(Record::new(field.name(), child.clone()));
                        }
                        put_record(element, &mut items[j])?;
                    }
                }
                Value::List(items) => match value {
                    Json::Array(array) if array.len() == items.len() => {
                        for (element, item) in array.iter().zip(items.iter_mut()) {
                            put_record(element, item)?;
                        }
                    }
                    Json::Array(array) => {
                        return Err(RecordError::ListSize {
                            field: path,
                            expected: items.len(),
                            actual: array.len(),
                        });
                    }
                    Json::Object(_) if items.len() == 1 => put_record(value, &mut items[0])?,
                    _ => {
                        return Err(RecordError::ListSize {
                            field: path,
                            expected: items.len(),
                            actual: 1,
                        });
                    }
                },
                _ => {}
            }
            continue;
        }

        let value = value.ok_or_else(|| RecordError::MissingField {
            record: record_name.clone(),
            field: field.name().to_string(),
        })?;
        *slot = scalar(&path, field.data_type(), slot, value)?;
    }
    Ok(())
}

fn scalar(
    path: &str,
    data_type: DataType,
    current: &Value,
    json: &Json,
) -> std::result::Result<Value, RecordError> {
    let invalid = |reason: String| RecordError::InvalidValue {
        field: path.to_string(),
        reason,
    };
    let expected = |what: &str| invalid(format!("expected {what}, found {}", kind_of(json)));
    Ok(match current {
        Value::String(_) => {
            let text = json.as_str().ok_or_else(|| expected("a string"))?;
            if let DataType::Character(limit) = data_type {
                let actual = text.chars().count();
                if actual > limit {
                    return Err(RecordError::ValueTooLong {
                        field: path.to_string(),
                        limit,
                        actual,
                    });
                }
            }
            Value::String(text.to_string())
        }
        Value::I2(_) => {
            let n = integer(json).ok_or_else(|| expected("an integer"))?;
            Value::I2(i16::try_from(n).map_err(|_| invalid(format!("{n} is out of range for i2")))?)
        }
        Value::I4(_) => {
            let n = integer(json).ok_or_else(|| expected("an integer"))?;
            Value::I4(i32::try_from(n).map_err(|_| invalid(format!("{n} is out of range for i4")))?)
        }
        Value::F8(_) => Value::F8(json.as_f64().ok_or_else(|| expected("a number"))?),
        Value::DQ8(_) => {
            let text = json.as_str().ok_or_else(|| expected("a /Date(...)/ string"))?;
            Value::DQ8(parse_date(text).map_err(invalid)?)
        }
        Value::Record(_) | Value::List(_) | Value::DynamicList(_) => {
            return Err(invalid("complex value in scalar position".to_string()));
        }
    })
}

/// Integers may arrive as whole-valued floats.
fn integer(json: &Json) -> Option<i64> {
    json.as_i64().or_else(|| {
        json.as_f64()
            .filter(|f| f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

/// Decode `/Date(2024-03-15T13:45:12.000+00:00)/`. An all-zero date is `None`.
fn parse_date(text: &str) -> std::result::Result<Option<NaiveDateTime>, String> {
    let inner = text
        .trim()
        .strip_prefix("/Date(")
        .and_then(|t| t.strip_suffix(")/"))
        .ok_or_else(|| format!("{text:?} is not in /Date(...)/ form"))?;
    if inner.chars().filter(char::is_ascii_digit).all(|c| c == '0') {
        return Ok(None);
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(inner) {
        return Ok(Some(date.naive_local()));
    }
    NaiveDateTime::parse_from_str(inner, "%Y-%m-%dT%H:%M:%S%.f")
        .map(Some)
        .map_err(|e| format!("{inner:?} is not a timestamp: {e}"))
}

fn kind_of(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}
