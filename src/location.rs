//! Latest known bus position, one document per bus in `locations`.

use crate::bus_id::BusId;
use crate::document::{f64_field, str_field, timestamp_field};
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{Value, json};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusLocation {
    pub bus_id: BusId,
    pub latitude: f64,
    pub longitude: f64,
    /// Metres per second.
    pub speed: Option<f64>,
    /// Degrees clockwise from north.
    pub heading: Option<f64>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<String>,
}

/// Maximum position age from a number of seconds; fails when the value does
/// not fit a [`Duration`].
pub fn max_age_from_secs(secs: i64) -> Result<Duration> {
    Duration::try_seconds(secs).with_context(|| format!("max age of {secs} seconds is out of range"))
}

impl BusLocation {
    pub fn new(bus_id: BusId, latitude: f64, longitude: f64, updated_at: DateTime<Utc>) -> Result<Self> {
        if !(-90.0..=90.0).contains(&latitude) {
            bail!("latitude {latitude} out of range");
        }
        if !(-180.0..=180.0).contains(&longitude) {
            bail!("longitude {longitude} out of range");
        }
        Ok(Self {
            bus_id,
            latitude,
            longitude,
            speed: None,
            heading: None,
            updated_at,
            updated_by: None,
        })
    }

    /// True when the last update is older than `max_age` at `now`.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now - self.updated_at > max_age
    }

    /// A missing update time reads as now. Out-of-range coordinates yield
    /// `None`.
    pub fn from_document(bus_raw: &str, doc: &Value, prefix: &str) -> Option<Self> {
        let bus = str_field(doc, &["busId"]).unwrap_or_else(|| bus_raw.to_string());
        let latitude = f64_field(doc, &["latitude", "lat"])?;
        let longitude = f64_field(doc, &["longitude", "lng", "lon"])?;
        let updated_at = timestamp_field(doc, &["updatedAt", "timestamp"]).unwrap_or_else(Utc::now);

        let mut location = Self::new(BusId::parse(&bus, prefix), latitude, longitude, updated_at).ok()?;
        location.speed = f64_field(doc, &["speed"]).filter(|s| *s >= 0.0);
        location.heading = f64_field(doc, &["heading", "bearing"]);
        location.updated_by = str_field(doc, &["updatedBy", "driverId"]);
        Some(location)
    }

    pub fn to_document(&self) -> Value {
        let mut doc = json!({
            "busId": self.bus_id.as_str(),
            "latitude": self.latitude,
            "longitude": self.longitude,
            "updatedAt": self.updated_at.to_rfc3339(),
        });
        if let Some(speed) = self.speed {
            doc["speed"] = json!(speed);
        }
        if let Some(heading) = self.heading {
            doc["heading"] = json!(heading);
        }
        if let Some(by) = &self.updated_by {
            doc["updatedBy"] = json!(by);
        }
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_max_age_from_secs() {
        assert_eq!(max_age_from_secs(300).unwrap(), Duration::minutes(5));
        assert!(max_age_from_secs(i64::MAX).is_err());
        assert!(max_age_from_secs(i64::MAX / 1000 + 1).is_err());
    }

    #[test]
    fn test_new_rejects_bad_coordinates() {
        let now = Utc::now();
        assert!(BusLocation::new(BusId::new("5"), 91.0, 0.0, now).is_err());
        assert!(BusLocation::new(BusId::new("5"), 0.0, -180.5, now).is_err());
        assert!(BusLocation::new(BusId::new("5"), 11.0168, 76.9558, now).is_ok());
    }

    #[test]
    fn test_is_stale() {
        let updated = Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap();
        let loc = BusLocation::new(BusId::new("5"), 11.0, 76.9, updated).unwrap();

        assert!(!loc.is_stale(updated + Duration::minutes(4), Duration::minutes(5)));
        assert!(loc.is_stale(updated + Duration::minutes(6), Duration::minutes(5)));
    }

    #[test]
    fn test_from_document() {
        let doc = json!({"lat": "11.02", "lng": 76.95, "speed": -1, "driverId": "d1",
                         "updatedAt": "2026-10-19T08:00:00Z"});
        let loc = BusLocation::from_document("siet-5", &doc, "SIET").unwrap();
        assert_eq!(loc.bus_id.as_str(), "SIET-005");
        assert_eq!(loc.latitude, 11.02);
        assert_eq!(loc.speed, None);
        assert_eq!(loc.updated_by.as_deref(), Some("d1"));

        assert!(BusLocation::from_document("5", &json!({"lat": 200, "lng": 0}), "SIET").is_none());
    }
}
