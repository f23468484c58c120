//! Attendance and roster records as stored in the `attendance` and `users`
//! collections.

use crate::bus_id::BusId;
use crate::document::{bool_field, parse_date, str_field, timestamp_field};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use tracing::debug;

/// Boarding status of one student on one day.
///
/// Anything other than present/absent is kept verbatim as `Unmarked`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Unmarked(String),
}

impl AttendanceStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "present" => Self::Present,
            "absent" => Self::Absent,
            _ => Self::Unmarked(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Unmarked(raw) if raw.is_empty() => "unmarked",
            Self::Unmarked(raw) => raw,
        }
    }

    pub fn is_marked(&self) -> bool {
        !matches!(self, Self::Unmarked(_))
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AttendanceStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AttendanceStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// One entry of an attendance document's student mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentMark {
    pub status: AttendanceStatus,
    pub marked_at: Option<DateTime<Utc>>,
    pub marked_by: Option<String>,
}

impl StudentMark {
    pub fn new(status: AttendanceStatus, marked_at: DateTime<Utc>, marked_by: &str) -> Self {
        Self {
            status,
            marked_at: Some(marked_at),
            marked_by: Some(marked_by.to_string()),
        }
    }

    /// Older documents store the bare status string instead of an object.
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(status) => Some(Self {
                status: AttendanceStatus::parse(status),
                marked_at: None,
                marked_by: None,
            }),
            Value::Object(_) => Some(Self {
                status: AttendanceStatus::parse(&str_field(value, &["status"]).unwrap_or_default()),
                marked_at: timestamp_field(value, &["markedAt", "timestamp"]),
                marked_by: str_field(value, &["markedBy", "markedByName"]),
            }),
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("status".into(), json!(self.status.as_str()));
        if let Some(at) = self.marked_at {
            map.insert("markedAt".into(), json!(at.to_rfc3339()));
        }
        if let Some(by) = &self.marked_by {
            map.insert("markedBy".into(), json!(by));
        }
        Value::Object(map)
    }
}

/// One daily attendance document for one bus.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    pub bus_id: BusId,
    pub date: NaiveDate,
    pub submitted_by: String,
    pub submitted_by_name: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub students: BTreeMap<String, StudentMark>,
}

impl AttendanceRecord {
    /// Deterministic id so a resubmission for the same bus and day replaces
    /// the earlier document.
    pub fn document_id(&self) -> String {
        record_id(&self.bus_id, self.date)
    }

    /// Builds a record from a stored document, falling back to the
    /// `<bus>_<date>` document id for missing fields.
    ///
    /// Returns `None` when no bus or date can be recovered.
    pub fn from_document(id: &str, doc: &Value, prefix: &str) -> Option<Self> {
        let (id_bus, id_date) = match id.rsplit_once('_') {
            Some((bus, date)) => (Some(bus), NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()),
            None => (None, None),
        };

        let bus_raw = str_field(doc, &["busId", "busNumber", "bus"]).or(id_bus.map(str::to_string));
        let Some(bus_raw) = bus_raw else {
            debug!(document = id, "Attendance document without bus id");
            return None;
        };
        let Some(date) = doc.get("date").and_then(parse_date).or(id_date) else {
            debug!(document = id, "Attendance document without usable date");
            return None;
        };

        let students = doc
            .get("students")
            .or_else(|| doc.get("attendance"))
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(student_id, mark)| {
                        Some((student_id.clone(), StudentMark::from_value(mark)?))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            bus_id: BusId::parse(&bus_raw, prefix),
            date,
            submitted_by: str_field(doc, &["submittedBy", "coAdminId"])
                .unwrap_or_else(|| "Unknown".to_string()),
            submitted_by_name: str_field(doc, &["submittedByName", "coAdminName"]),
            submitted_at: timestamp_field(doc, &["submittedAt", "updatedAt"]),
            students,
        })
    }

    /// Plain-JSON document body in the app's field naming.
    pub fn to_document(&self) -> Value {
        let students: Map<String, Value> = self
            .students
            .iter()
            .map(|(id, mark)| (id.clone(), mark.to_value()))
            .collect();

        let mut doc = json!({
            "busId": self.bus_id.as_str(),
            "date": self.date.format("%Y-%m-%d").to_string(),
            "submittedBy": self.submitted_by,
            "students": students,
        });
        if let Some(name) = &self.submitted_by_name {
            doc["submittedByName"] = json!(name);
        }
        if let Some(at) = self.submitted_at {
            doc["submittedAt"] = json!(at.to_rfc3339());
        }
        doc
    }
}

/// Keeps one record per bus and day, the most recently submitted.
///
/// Documents written under legacy bus-id spellings can sit next to the
/// canonical one for the same day. Ties keep the first record seen.
pub fn latest_per_day(records: impl IntoIterator<Item = AttendanceRecord>) -> Vec<AttendanceRecord> {
    let mut latest: BTreeMap<(BusId, NaiveDate), AttendanceRecord> = BTreeMap::new();
    for record in records {
        match latest.entry((record.bus_id.clone(), record.date)) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(mut slot) => {
                if record.submitted_at > slot.get().submitted_at {
                    slot.insert(record);
                }
            }
        }
    }
    latest.into_values().collect()
}

/// `<bus>_<YYYY-MM-DD>`, the id of the attendance document for that day.
pub fn record_id(bus: &BusId, date: NaiveDate) -> String {
    format!("{}_{}", bus, date.format("%Y-%m-%d"))
}

/// Dashboard role of a user profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Coadmin,
    Driver,
    Management,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "student" => Some(Self::Student),
            "coadmin" | "incharge" | "busincharge" => Some(Self::Coadmin),
            "driver" => Some(Self::Driver),
            "management" | "admin" => Some(Self::Management),
            _ => None,
        }
    }
}

/// A student's profile from the `users` collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentProfile {
    pub id: String,
    pub name: String,
    pub register_number: Option<String>,
    pub department: Option<String>,
    pub year: Option<String>,
    pub bus_id: Option<BusId>,
    pub active: bool,
}

impl StudentProfile {
    /// Reads a `users` document. Returns `None` for non-student roles.
    pub fn from_document(id: &str, doc: &Value, prefix: &str) -> Option<Self> {
        if let Some(role) = str_field(doc, &["role"]) {
            if Role::parse(&role) != Some(Role::Student) {
                return None;
            }
        }

        Some(Self {
            id: id.to_string(),
            name: str_field(doc, &["name", "fullName", "displayName"]).unwrap_or_else(|| id.to_string()),
            register_number: str_field(doc, &["registerNumber", "regNo", "rollNumber"]),
            department: str_field(doc, &["department", "dept"]),
            year: str_field(doc, &["year"]),
            bus_id: str_field(doc, &["busId", "busNumber", "bus"]).map(|b| BusId::parse(&b, prefix)),
            active: bool_field(doc, &["isActive", "active", "status"]).unwrap_or(true),
        })
    }
}
