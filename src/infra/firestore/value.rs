//! Conversion between Firestore's typed REST values and plain JSON.
//!
//! Firestore wraps every value in a one-key object (`{"stringValue": "x"}`,
//! `{"integerValue": "3"}`, `{"mapValue": {"fields": {...}}}`). Models work on
//! plain JSON, so documents are unwrapped on read and wrapped on write.

use serde_json::{Map, Number, Value, json};

/// Unwraps a single typed value. Unknown wrappers decode to `Null`.
pub fn decode_value(value: &Value) -> Value {
    let Some((kind, inner)) = value.as_object().and_then(|o| o.iter().next()) else {
        return Value::Null;
    };

    match kind.as_str() {
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner.clone(),
        "booleanValue" => inner.clone(),
        "integerValue" => match inner {
            Value::String(s) => s.parse::<i64>().map(Value::from).unwrap_or(Value::Null),
            Value::Number(_) => inner.clone(),
            _ => Value::Null,
        },
        "doubleValue" => match inner {
            Value::Number(_) => inner.clone(),
            // NaN and infinities arrive as strings and have no JSON form
            _ => Value::Null,
        },
        "geoPointValue" => json!({
            "latitude": inner.get("latitude").cloned().unwrap_or(json!(0.0)),
            "longitude": inner.get("longitude").cloned().unwrap_or(json!(0.0)),
        }),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => decode_fields(inner.get("fields").unwrap_or(&Value::Null)),
        _ => Value::Null,
    }
}

/// Unwraps a document's `fields` object into a plain JSON object.
pub fn decode_fields(fields: &Value) -> Value {
    let map: Map<String, Value> = fields
        .as_object()
        .map(|o| o.iter().map(|(k, v)| (k.clone(), decode_value(v))).collect())
        .unwrap_or_default();
    Value::Object(map)
}

/// Wraps a plain JSON value in Firestore's typed form.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => encode_number(n),
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(_) => json!({ "mapValue": { "fields": encode_fields(value) } }),
    }
}

/// Wraps every member of a plain JSON object, producing a `fields` object.
pub fn encode_fields(doc: &Value) -> Value {
    let map: Map<String, Value> = doc
        .as_object()
        .map(|o| o.iter().map(|(k, v)| (k.clone(), encode_value(v))).collect())
        .unwrap_or_default();
    Value::Object(map)
}

fn encode_number(n: &Number) -> Value {
    match n.as_i64() {
        Some(i) => json!({ "integerValue": i.to_string() }),
        None => json!({ "doubleValue": n.as_f64().unwrap_or(0.0) }),
    }
}
