//! Conversion between plain JSON and Firestore's typed REST value encoding.
//!
//! Firestore documents travel as `{"fields": {name: {"stringValue": ..}}}`;
//! integers are carried as decimal strings.

use serde_json::{json, Map, Number, Value};

pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => encode_number(n),
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

fn encode_number(n: &Number) -> Value {
    if let Some(i) = n.as_i64() {
        json!({ "integerValue": i.to_string() })
    } else {
        // u64 beyond i64::MAX has no integer representation in Firestore
        json!({ "doubleValue": n.as_f64() })
    }
}

pub fn encode_fields(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(key, value)| (key.clone(), encode_value(value)))
        .collect()
}

/// Decode one typed value. Unsupported or unparseable values become `null`.
pub fn decode_value(value: &Value) -> Value {
    let Some((kind, inner)) = value.as_object().and_then(|obj| obj.iter().next()) else {
        return Value::Null;
    };

    match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => inner.as_bool().map(Value::Bool).unwrap_or(Value::Null),
        "integerValue" => inner
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Value::from)
            .or_else(|| inner.as_i64().map(Value::from))
            .unwrap_or(Value::Null),
        "doubleValue" => inner
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "stringValue" | "timestampValue" | "referenceValue" => inner.clone(),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => Value::Object(
            inner
                .get("fields")
                .and_then(Value::as_object)
                .map(decode_fields)
                .unwrap_or_default(),
        ),
        _ => Value::Null,
    }
}

pub fn decode_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), decode_value(value)))
        .collect()
}
