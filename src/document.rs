//! Lenient accessors for plain-JSON documents.
//!
//! Documents written by different app versions disagree on field names and
//! value shapes, so models read them through these helpers instead of a
//! strict `Deserialize` derive.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;

/// First non-empty string among `keys`. Numbers are stringified.
pub fn str_field(doc: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match doc.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// First boolean-ish value among `keys` (`true`, `"active"`, `"yes"`, `1`).
pub fn bool_field(doc: &Value, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|key| match doc.get(*key)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "active" | "1" => Some(true),
            "false" | "no" | "inactive" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

/// First numeric value among `keys`, accepting numeric strings.
pub fn f64_field(doc: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| match doc.get(*key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// First timestamp among `keys`; see [`parse_timestamp`].
pub fn timestamp_field(doc: &Value, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter().find_map(|key| doc.get(*key).and_then(parse_timestamp))
}

/// Parses a timestamp stored as an RFC 3339 string, epoch milliseconds, or a
/// `{seconds, nanoseconds}` object. Anything else yields `None`.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::Object(map) => {
            let seconds = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))
                .and_then(|v| v.as_i64().or_else(|| v.as_str()?.parse().ok()))?;
            let nanos = map
                .get("nanoseconds")
                .or_else(|| map.get("_nanoseconds"))
                .or_else(|| map.get("nanos"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            Utc.timestamp_opt(seconds, nanos as u32).single()
        }
        _ => None,
    }
}

/// Parses a calendar date stored as `YYYY-MM-DD` or as a full timestamp.
pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    if let Value::String(s) = value {
        let s = s.trim();
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Some(date);
        }
    }
    parse_timestamp(value).map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_str_field_falls_through_keys() {
        let doc = json!({"regNo": "", "registerNumber": "711521", "year": 3});
        assert_eq!(str_field(&doc, &["regNo", "registerNumber"]), Some("711521".into()));
        assert_eq!(str_field(&doc, &["year"]), Some("3".into()));
        assert_eq!(str_field(&doc, &["missing"]), None);
    }

    #[test]
    fn test_bool_field_variants() {
        assert_eq!(bool_field(&json!({"isActive": false}), &["isActive"]), Some(false));
        assert_eq!(bool_field(&json!({"status": "Active"}), &["status"]), Some(true));
        assert_eq!(bool_field(&json!({"status": "graduated"}), &["status"]), None);
    }

    #[test]
    fn test_parse_timestamp_shapes() {
        let expected = Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap();
        assert_eq!(parse_timestamp(&json!("2026-10-19T08:30:00Z")), Some(expected));
        assert_eq!(parse_timestamp(&json!(expected.timestamp_millis())), Some(expected));
        assert_eq!(
            parse_timestamp(&json!({"seconds": expected.timestamp(), "nanoseconds": 0})),
            Some(expected)
        );
        assert_eq!(parse_timestamp(&json!("yesterday")), None);
        assert_eq!(parse_timestamp(&json!(null)), None);
    }

    #[test]
    fn test_parse_date() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(parse_date(&json!("2026-10-19")), Some(date));
        assert_eq!(parse_date(&json!("2026-10-19T23:00:00Z")), Some(date));
        assert_eq!(parse_date(&json!("19/10/2026")), None);
    }
}
