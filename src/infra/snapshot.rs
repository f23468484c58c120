//! [`AttendanceStore`] over a JSON snapshot of the app's collections.
//!
//! The file holds one object per collection, each mapping document id to a
//! plain-JSON document:
//! ```json
//! {
//!   "users":      { "s1": { "role": "student", "name": "Anitha", "busId": "SIET-005" } },
//!   "attendance": { "SIET-005_2026-10-19": { "busId": "SIET-005", "date": "2026-10-19", "students": {} } },
//!   "feedbacks":  {},
//!   "locations":  {}
//! }
//! ```
//! Mutations are written back to the file immediately.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::bus_id::BusId;
use crate::document::str_field;
use crate::feedback::Feedback;
use crate::location::BusLocation;
use crate::model::{AttendanceRecord, StudentProfile, latest_per_day};
use crate::notify::{TokenRegistry, tokens_from_document};
use crate::roster::Roster;
use crate::services::store::AttendanceStore;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    users: BTreeMap<String, Value>,
    #[serde(default)]
    attendance: BTreeMap<String, Value>,
    #[serde(default)]
    feedbacks: BTreeMap<String, Value>,
    #[serde(default)]
    locations: BTreeMap<String, Value>,
}

pub struct SnapshotStore {
    path: PathBuf,
    prefix: String,
    data: Mutex<Snapshot>,
}

impl SnapshotStore {
    /// Loads `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl AsRef<Path>, prefix: &str) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read snapshot {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("failed to parse snapshot {}", path.display()))?
        } else {
            debug!(path = %path.display(), "Snapshot missing, starting empty");
            Snapshot::default()
        };

        Ok(Self {
            path,
            prefix: prefix.to_string(),
            data: Mutex::new(data),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        // A panic while holding the lock leaves plain data behind; keep using it
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, data: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(data)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("failed to write snapshot {}", self.path.display()))
    }

    fn on_bus(&self, doc: &Value, bus: &BusId) -> bool {
        str_field(doc, &["busId", "busNumber", "bus"])
            .is_some_and(|raw| BusId::parse(&raw, &self.prefix) == *bus)
    }

    fn records_for(&self, data: &Snapshot, bus: &BusId) -> Vec<AttendanceRecord> {
        data.attendance
            .iter()
            .filter_map(|(id, doc)| {
                let record = AttendanceRecord::from_document(id, doc, &self.prefix);
                if record.is_none() {
                    warn!(document = %id, "Skipping unreadable attendance document");
                }
                record
            })
            .filter(|r| r.bus_id == *bus)
            .collect()
    }
}

#[async_trait]
impl AttendanceStore for SnapshotStore {
    async fn attendance_for_bus(&self, bus: &BusId, since: NaiveDate) -> Result<Vec<AttendanceRecord>> {
        let data = self.lock();
        let mut records = latest_per_day(self.records_for(&data, bus));
        records.retain(|r| r.date >= since);
        Ok(records)
    }

    async fn attendance_for_day(&self, bus: &BusId, date: NaiveDate) -> Result<Option<AttendanceRecord>> {
        let data = self.lock();
        let mut records = self.records_for(&data, bus);
        records.retain(|r| r.date == date);
        records.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(records.into_iter().next())
    }

    async fn roster_for_bus(&self, bus: &BusId) -> Result<Roster> {
        let data = self.lock();
        let profiles = data
            .users
            .iter()
            .filter(|(_, doc)| self.on_bus(doc, bus))
            .filter_map(|(id, doc)| StudentProfile::from_document(id, doc, &self.prefix));
        Ok(Roster::new(profiles))
    }

    async fn save_attendance(&self, record: &AttendanceRecord) -> Result<()> {
        let mut data = self.lock();
        data.attendance.insert(record.document_id(), record.to_document());
        self.persist(&data)
    }

    async fn submit_feedback(&self, feedback: &Feedback) -> Result<String> {
        let mut data = self.lock();
        let id = format!(
            "fb-{}-{}",
            feedback.created_at.timestamp_millis(),
            data.feedbacks.len() + 1
        );
        data.feedbacks.insert(id.clone(), feedback.to_document());
        self.persist(&data)?;
        Ok(id)
    }

    async fn feedback_for_bus(&self, bus: &BusId) -> Result<Vec<Feedback>> {
        let data = self.lock();
        let feedback = data
            .feedbacks
            .iter()
            .filter_map(|(id, doc)| Feedback::from_document(id, doc, &self.prefix))
            .filter(|f| f.bus_id == *bus)
            .collect();
        Ok(feedback)
    }

    async fn register_push_token(&self, user_id: &str, token: &str) -> Result<()> {
        let mut data = self.lock();
        let user = data
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| json!({}));
        if !user.is_object() {
            *user = json!({});
        }

        let mut tokens = tokens_from_document(user);
        if !tokens.iter().any(|t| t == token) {
            tokens.push(token.to_string());
        }
        user["pushTokens"] = json!(tokens);
        user["fcmToken"] = json!(token);

        self.persist(&data)
    }

    async fn push_tokens_for_bus(&self, bus: &BusId) -> Result<TokenRegistry> {
        let data = self.lock();
        let mut registry = TokenRegistry::new();
        for (id, doc) in data.users.iter().filter(|(_, doc)| self.on_bus(doc, bus)) {
            for token in tokens_from_document(doc) {
                registry.register(id, &token);
            }
        }
        Ok(registry)
    }

    async fn publish_location(&self, location: &BusLocation) -> Result<()> {
        let mut data = self.lock();
        data.locations
            .insert(location.bus_id.to_string(), location.to_document());
        self.persist(&data)
    }

    async fn latest_location(&self, bus: &BusId) -> Result<Option<BusLocation>> {
        let data = self.lock();
        let latest = data
            .locations
            .iter()
            .filter_map(|(id, doc)| BusLocation::from_document(id, doc, &self.prefix))
            .filter(|loc| loc.bus_id == *bus)
            .max_by_key(|loc| loc.updated_at);
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(name)
    }

    #[tokio::test]
    async fn test_open_missing_file_is_empty() {
        let path = temp_path("bus_attendance_snapshot_missing.json");
        let _ = fs::remove_file(&path);

        let store = SnapshotStore::open(&path, "SIET").unwrap();
        let roster = store.roster_for_bus(&BusId::new("5")).await.unwrap();

        assert!(roster.is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_register_push_token_persists_and_dedupes() {
        let path = temp_path("bus_attendance_snapshot_tokens.json");
        fs::write(&path, r#"{"users": {"u1": {"busId": "5", "fcmToken": "old"}}}"#).unwrap();

        let store = SnapshotStore::open(&path, "SIET").unwrap();
        store.register_push_token("u1", "new").await.unwrap();
        store.register_push_token("u1", "new").await.unwrap();

        let reopened = SnapshotStore::open(&path, "SIET").unwrap();
        let registry = reopened.push_tokens_for_bus(&BusId::new("SIET-005")).await.unwrap();
        assert_eq!(registry.tokens_of("u1"), ["old", "new"]);

        fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_location_round_trip() {
        let path = temp_path("bus_attendance_snapshot_location.json");
        let _ = fs::remove_file(&path);
        let store = SnapshotStore::open(&path, "SIET").unwrap();

        let at = Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap();
        let location = BusLocation::new(BusId::new("5"), 11.0, 76.9, at).unwrap();
        store.publish_location(&location).await.unwrap();

        let latest = store.latest_location(&BusId::new("siet 5")).await.unwrap();
        assert_eq!(latest, Some(location));
        assert_eq!(store.latest_location(&BusId::new("6")).await.unwrap(), None);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_open_rejects_corrupt_file() {
        let path = temp_path("bus_attendance_snapshot_corrupt.json");
        fs::write(&path, "{not json").unwrap();

        assert!(SnapshotStore::open(&path, "SIET").is_err());

        fs::remove_file(&path).unwrap();
    }
}
