//! Structural validation of upstream payloads.
//!
//! Everything coming off the network passes through here before it is
//! handed to the pipeline as a typed value. Unknown keys are ignored;
//! missing keys, wrong types, a gender outside `L`/`P` or an unparseable
//! enrollment date are rejected.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{RecordKind, SchemaError};
use crate::models::{DetailRecord, FilteredRecord, SearchSummary};

pub fn parse_search_results(value: Value) -> Result<Vec<SearchSummary>, SchemaError> {
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(SchemaError::new(
                RecordKind::SearchSummary,
                format!("expected array, received {}", json_type(&other)),
            ))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            decode::<SearchSummary>(RecordKind::SearchSummary, item).map_err(|mut err| {
                err.message = format!("[{index}]: {}", err.message);
                err
            })
        })
        .collect()
}

pub fn parse_detail(value: Value) -> Result<DetailRecord, SchemaError> {
    decode(RecordKind::Detail, value)
}

pub fn parse_filtered(value: Value) -> Result<FilteredRecord, SchemaError> {
    decode(RecordKind::Filtered, value)
}

fn decode<T: DeserializeOwned>(record: RecordKind, value: Value) -> Result<T, SchemaError> {
    if !value.is_object() {
        return Err(SchemaError::new(
            record,
            format!("expected object, received {}", json_type(&value)),
        ));
    }
    serde_json::from_value(value).map_err(|err| SchemaError::new(record, err.to_string()))
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Parse an enrollment date. Accepts a plain `YYYY-MM-DD`, an RFC 3339
/// timestamp (normalized to its UTC date) or a zone-less date-time.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(stamp) = DateTime::parse_from_rfc3339(text) {
        return Some(stamp.with_timezone(&Utc).date_naive());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|stamp| stamp.date())
}

/// Dates are written as the UTC-midnight instant, `1980-09-01T00:00:00.000Z`.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%dT00:00:00.000Z").to_string()
}

/// Serde adapter for enrollment dates: any form `parse_date` accepts on
/// the way in, `format_date` on the way out.
pub mod date_text {
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_date(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parse_date(&text)
            .ok_or_else(|| de::Error::custom(format!("invalid date `{text}`")))
    }
}
