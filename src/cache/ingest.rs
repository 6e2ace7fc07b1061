//! Input shapes accepted by the cache.
//!
//! Readings reach the cache as typed [`Reading`]s from the topic, as
//! loosely-typed JSON records (published by other processes or loaded from
//! files), or as ordered collections of either. [`Ingest`] names exactly those
//! three shapes; anything else is rejected when it is classified.

use crate::error::{Result, SensorlineError};
use crate::types::{Reading, Value};
use serde_json::{Map, Value as Json};

/// A loosely-typed record with `name`, `time` and `value` fields
#[derive(Debug, Clone, PartialEq)]
pub struct Record(Map<String, Json>);

impl Record {
    /// Wrap a JSON object
    pub fn new(fields: Map<String, Json>) -> Self {
        Self(fields)
    }

    /// Build a record from its three fields
    pub fn from_parts(name: &str, time: f64, value: impl Into<Value>) -> Self {
        let mut fields = Map::new();
        fields.insert("name".into(), Json::from(name));
        fields.insert("time".into(), Json::from(time));
        // Value serializes untagged, so this cannot fail for finite numbers
        let value = serde_json::to_value(value.into()).unwrap_or(Json::Null);
        fields.insert("value".into(), value);
        Self(fields)
    }

    /// Raw field access
    pub fn get(&self, key: &str) -> Option<&Json> {
        self.0.get(key)
    }

    /// Normalize into `(name, time, value)`
    pub fn normalize(&self) -> Result<(&str, f64, Value)> {
        let name = self
            .0
            .get("name")
            .and_then(Json::as_str)
            .ok_or_else(|| unsupported("record without a string `name`"))?;
        let time = self
            .0
            .get("time")
            .and_then(Json::as_f64)
            .ok_or_else(|| unsupported("record without a numeric `time`"))?;
        let value = match self.0.get("value") {
            Some(Json::Number(n)) => n
                .as_f64()
                .map(Value::Scalar)
                .ok_or_else(|| unsupported("record `value` out of range"))?,
            Some(Json::Array(items)) => {
                let axes: Option<Vec<f64>> = items.iter().map(Json::as_f64).collect();
                Value::Vector(axes.ok_or_else(|| unsupported("record `value` has non-numeric axes"))?)
            }
            Some(other) => return Err(unsupported(&format!("record `value` of kind {}", kind_of(other)))),
            None => return Err(unsupported("record without `value`")),
        };
        Ok((name, time, value))
    }
}

impl From<&Reading> for Record {
    fn from(r: &Reading) -> Self {
        Record::from_parts(&r.sensor, r.time, r.value.clone())
    }
}

/// Everything the cache knows how to ingest
#[derive(Debug, Clone, PartialEq)]
pub enum Ingest {
    /// A typed reading
    Reading(Reading),
    /// A loosely-typed record
    Record(Record),
    /// An ordered collection, ingested element by element
    Batch(Vec<Ingest>),
}

impl Ingest {
    /// Classify an arbitrary JSON document
    ///
    /// Objects become records, arrays become batches (recursively). Scalars,
    /// strings and nulls are not an ingestible shape.
    pub fn from_json(json: Json) -> Result<Self> {
        match json {
            Json::Object(fields) => Ok(Ingest::Record(Record(fields))),
            Json::Array(items) => items
                .into_iter()
                .map(Ingest::from_json)
                .collect::<Result<Vec<_>>>()
                .map(Ingest::Batch),
            other => Err(unsupported(kind_of(&other))),
        }
    }

    /// Number of leaf items (readings and records)
    pub fn len(&self) -> usize {
        match self {
            Ingest::Reading(_) | Ingest::Record(_) => 1,
            Ingest::Batch(items) => items.iter().map(Ingest::len).sum(),
        }
    }

    /// Whether there is nothing to ingest
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Reading> for Ingest {
    fn from(r: Reading) -> Self {
        Ingest::Reading(r)
    }
}

impl From<Record> for Ingest {
    fn from(r: Record) -> Self {
        Ingest::Record(r)
    }
}

impl From<Vec<Reading>> for Ingest {
    fn from(readings: Vec<Reading>) -> Self {
        Ingest::Batch(readings.into_iter().map(Ingest::Reading).collect())
    }
}

fn unsupported(what: &str) -> SensorlineError {
    SensorlineError::UnsupportedIngestKind(what.to_string())
}

fn kind_of(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
