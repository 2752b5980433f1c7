//! Record decoding: CSV rows and JSON objects into flat field bags.
//!
//! Decoding never drops a record. Anything that cannot be turned into a
//! field bag comes back as a [`MetaPropError::MalformedRecord`] tied to its
//! position in the input, so the batch can report it.

use crate::error::MetaPropError;
use crate::fields::{self, Fields, POSITIONAL, REQUIRED_LEN};
use serde_json::{Map, Value};
use std::path::Path;

const LOG_TARGET: &str = "metaprop::record";

/// Input encodings the decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// Header-less CSV, 8 to 10 columns per row.
    Csv,
    /// A JSON object or an array of objects.
    Json,
    /// One JSON object per line.
    JsonLines,
}

impl InputFormat {
    /// Detect the format from a file path extension.
    pub fn detect(path: &str) -> Option<Self> {
        let ext = Path::new(path).extension()?.to_str()?;
        Self::from_name(ext)
    }

    /// Parse a format name or file extension.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "csv" | "txt" => Some(InputFormat::Csv),
            "json" => Some(InputFormat::Json),
            "jsonl" | "ndjson" => Some(InputFormat::JsonLines),
            _ => None,
        }
    }
}

/// One decoded record together with its 1-based position in the input.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    /// CSV line number, JSON array position or JSON Lines line number.
    pub index: usize,
    pub decoded: Result<Fields, MetaPropError>,
}

/// Decode one positional row.
///
/// Rows must carry between 8 and 10 fields: the eight required attributes,
/// then optionally `filename` and `link`.
pub fn decode_row<S: AsRef<str>>(row: &[S]) -> Result<Fields, MetaPropError> {
    if row.len() < REQUIRED_LEN || row.len() > POSITIONAL.len() {
        return Err(MetaPropError::MalformedRecord {
            len: row.len(),
            content: row.iter().map(|s| s.as_ref().to_string()).collect(),
            reason: format!("expected {} to {}", REQUIRED_LEN, POSITIONAL.len()),
        });
    }

    Ok(POSITIONAL
        .iter()
        .zip(row)
        .map(|(name, value)| (name.to_string(), value.as_ref().to_string()))
        .collect())
}

/// Decode one JSON object.
///
/// Known attributes are copied over; missing ones, and ones set to `null`,
/// are left out and read back as their zero value. Numbers and booleans are
/// kept as their JSON text so that e.g. `"displayValue": 42` behaves like
/// `"42"`. A known attribute holding an array or an object makes the whole
/// record malformed.
pub fn decode_object(object: &Map<String, Value>) -> Result<Fields, MetaPropError> {
    let mut decoded = Fields::new();
    for name in POSITIONAL.iter().chain([&fields::CAN_SET]) {
        let text = match object.get(*name) {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(other) => {
                return Err(MetaPropError::MalformedRecord {
                    len: object.len(),
                    content: positional_content(object),
                    reason: format!(
                        "'{}' must be a string, number or boolean, found {}",
                        name,
                        json_type_name(other)
                    ),
                });
            }
        };
        decoded.insert(name.to_string(), text);
    }
    Ok(decoded)
}

/// Render an object's known attributes in positional order for reporting.
fn positional_content(object: &Map<String, Value>) -> Vec<String> {
    POSITIONAL
        .iter()
        .map(|name| match object.get(*name) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        })
        .collect()
}

/// Decode a single JSON value that should be an object.
pub fn decode_value(value: &Value) -> Result<Fields, MetaPropError> {
    match value {
        Value::Object(object) => decode_object(object),
        other => Err(MetaPropError::MalformedRecord {
            len: 0,
            content: vec![other.to_string()],
            reason: format!("expected an object, found {}", json_type_name(other)),
        }),
    }
}

/// Decode header-less CSV data.
///
/// Each row is validated on its own: a row with a field that is not valid
/// UTF-8 is reported as malformed, with the field content shown lossily.
pub fn decode_csv(data: &[u8]) -> Vec<SourceRecord> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data);

    let mut records = Vec::new();
    for (i, result) in reader.byte_records().enumerate() {
        let index = match &result {
            Ok(record) => record.position().map_or(i + 1, |p| p.line() as usize),
            Err(e) => e.position().map_or(i + 1, |p| p.line() as usize),
        };
        let decoded = match result {
            Ok(record) => decode_byte_row(&record),
            Err(e) => Err(MetaPropError::MalformedRecord {
                len: 0,
                content: Vec::new(),
                reason: format!("unreadable CSV row: {e}"),
            }),
        };
        if let Err(e) = &decoded {
            log::debug!(target: LOG_TARGET, "CSV row at line {index}: {e}");
        }
        records.push(SourceRecord { index, decoded });
    }

    log::debug!(target: LOG_TARGET, "Decoded {} CSV rows", records.len());
    records
}

fn decode_byte_row(record: &csv::ByteRecord) -> Result<Fields, MetaPropError> {
    let mut row = Vec::with_capacity(record.len());
    let mut invalid = None;
    for (column, field) in record.iter().enumerate() {
        match std::str::from_utf8(field) {
            Ok(text) => row.push(text.to_string()),
            Err(_) => {
                if invalid.is_none() {
                    invalid = Some(column + 1);
                }
                row.push(String::from_utf8_lossy(field).into_owned());
            }
        }
    }

    match invalid {
        Some(column) => Err(MetaPropError::MalformedRecord {
            len: row.len(),
            content: row,
            reason: format!("field {column} is not valid UTF-8"),
        }),
        None => decode_row(&row),
    }
}

/// Decode a JSON document: a single object or an array of objects.
pub fn decode_json(data: &[u8]) -> Result<Vec<SourceRecord>, MetaPropError> {
    let document: Value =
        serde_json::from_slice(data).map_err(|e| MetaPropError::Parse(e.to_string()))?;

    let records = match document {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| SourceRecord {
                index: i + 1,
                decoded: decode_value(item),
            })
            .collect(),
        Value::Object(object) => vec![SourceRecord {
            index: 1,
            decoded: decode_object(&object),
        }],
        other => {
            return Err(MetaPropError::Parse(format!(
                "expected an object or an array of objects, found {}",
                json_type_name(&other)
            )));
        }
    };

    log::debug!(target: LOG_TARGET, "Decoded {} JSON records", records.len());
    Ok(records)
}

/// Decode JSON Lines data. Blank lines are ignored.
pub fn decode_json_lines(data: &[u8]) -> Vec<SourceRecord> {
    data.split(|b| *b == b'\n')
        .enumerate()
        .filter(|(_, line)| !line.iter().all(u8::is_ascii_whitespace))
        .map(|(i, line)| {
            let decoded = match serde_json::from_slice::<Value>(line) {
                Ok(value) => decode_value(&value),
                Err(e) => {
                    log::debug!(target: LOG_TARGET, "Unreadable JSON line {}: {e}", i + 1);
                    let text = String::from_utf8_lossy(line);
                    Err(MetaPropError::MalformedRecord {
                        len: 0,
                        content: vec![text.trim_end().to_string()],
                        reason: format!("invalid JSON: {e}"),
                    })
                }
            };
            SourceRecord {
                index: i + 1,
                decoded,
            }
        })
        .collect()
}

/// Decode input data in the given format.
pub fn decode(data: &[u8], format: InputFormat) -> Result<Vec<SourceRecord>, MetaPropError> {
    match format {
        InputFormat::Csv => Ok(decode_csv(data)),
        InputFormat::Json => decode_json(data),
        InputFormat::JsonLines => Ok(decode_json_lines(data)),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
