//! JSON <-> BSON translation for request payloads and driver results.
//!
//! Request JSON is taken literally: there is no extended-JSON decoding, so
//! `{"$oid": "..."}` stays a sub-document exactly as a JavaScript client
//! would send it. Results are rendered the way a JavaScript JSON response
//! renders driver values (ObjectIds as hex strings, dates as ISO strings).

use bson::{Bson, Document};
use serde_json::{Map, Number, Value};

use crate::core::errors::GatewayError;

pub fn json_to_document(value: &Value) -> Result<Document, GatewayError> {
    match value {
        Value::Object(map) => Ok(map_to_document(map)),
        other => Err(GatewayError::InvalidCommand(format!(
            "expected an object, found {}",
            json_kind(other)
        ))),
    }
}

pub fn json_to_documents(value: &Value) -> Result<Vec<Document>, GatewayError> {
    match value {
        Value::Array(items) => items.iter().map(json_to_document).collect(),
        other => Err(GatewayError::InvalidCommand(format!(
            "expected an array of objects, found {}",
            json_kind(other)
        ))),
    }
}

fn map_to_document(map: &Map<String, Value>) -> Document {
    let mut doc = Document::new();
    for (k, v) in map {
        doc.insert(k.clone(), json_to_bson(v));
    }
    doc
}

pub fn json_to_bson(value: &Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => number_to_bson(n),
        Value::String(s) => Bson::String(s.clone()),
        Value::Array(a) => Bson::Array(a.iter().map(json_to_bson).collect()),
        Value::Object(map) => Bson::Document(map_to_document(map)),
    }
}

fn number_to_bson(n: &Number) -> Bson {
    if let Some(i) = n.as_i64() {
        match i32::try_from(i) {
            Ok(small) => Bson::Int32(small),
            Err(_) => Bson::Int64(i),
        }
    } else if let Some(f) = n.as_f64() {
        Bson::Double(f)
    } else {
        Bson::Null
    }
}

pub fn document_to_json(doc: &Document) -> Value {
    let mut map = Map::new();
    for (k, v) in doc {
        map.insert(k.clone(), bson_to_json(v));
    }
    Value::Object(map)
}

pub fn bson_to_json(bson: &Bson) -> Value {
    match bson {
        // NaN and infinities have no JSON form.
        Bson::Double(d) => Number::from_f64(*d).map(Value::Number).unwrap_or(Value::Null),
        Bson::String(s) => Value::String(s.clone()),
        Bson::Document(d) => document_to_json(d),
        Bson::Array(a) => Value::Array(a.iter().map(bson_to_json).collect()),
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Int32(i) => Value::Number((*i).into()),
        Bson::Int64(i) => Value::Number((*i).into()),
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => match dt.try_to_rfc3339_string() {
            Ok(s) => Value::String(s),
            Err(_) => Value::Number(dt.timestamp_millis().into()),
        },
        other => other.clone().into_relaxed_extjson(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
