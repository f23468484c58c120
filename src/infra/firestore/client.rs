use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::Method;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::value::{decode_fields, encode_fields, encode_value};
use crate::bus_id::BusId;
use crate::document::str_field;
use crate::feedback::Feedback;
use crate::fetch::{HttpClient, send_json};
use crate::location::BusLocation;
use crate::model::{AttendanceRecord, StudentProfile, latest_per_day};
use crate::notify::{TokenRegistry, tokens_from_document};
use crate::roster::Roster;
use crate::services::store::AttendanceStore;

pub const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";

const USERS: &str = "users";
const ATTENDANCE: &str = "attendance";
const FEEDBACKS: &str = "feedbacks";
const LOCATIONS: &str = "locations";

const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// [`AttendanceStore`] backed by the Firestore REST API.
///
/// Credentials are applied by the wrapped [`HttpClient`]
/// (see [`crate::fetch::auth`]).
pub struct FirestoreClient<C> {
    http: C,
    documents_url: String,
    prefix: String,
}

impl<C: HttpClient> FirestoreClient<C> {
    pub fn new(http: C, project_id: &str, prefix: &str) -> Self {
        Self::with_base_url(http, DEFAULT_BASE_URL, project_id, prefix)
    }

    /// Points at another host, e.g. the local emulator.
    pub fn with_base_url(http: C, base_url: &str, project_id: &str, prefix: &str) -> Self {
        Self {
            http,
            documents_url: format!(
                "{}/projects/{}/databases/(default)/documents",
                base_url.trim_end_matches('/'),
                project_id
            ),
            prefix: prefix.to_string(),
        }
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.documents_url,
            collection,
            utf8_percent_encode(id, PATH_SEGMENT)
        )
    }

    /// Documents of `collection` whose `field` equals one of `values`, as
    /// `(id, plain fields)` pairs.
    #[tracing::instrument(skip(self, values), fields(values = values.len()))]
    async fn query_in(&self, collection: &str, field: &str, values: &[String]) -> Result<Vec<(String, Value)>> {
        let filter = if values.len() == 1 {
            json!({ "fieldFilter": {
                "field": { "fieldPath": field },
                "op": "EQUAL",
                "value": encode_value(&json!(values[0])),
            }})
        } else {
            json!({ "fieldFilter": {
                "field": { "fieldPath": field },
                "op": "IN",
                "value": encode_value(&json!(values)),
            }})
        };
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": collection }],
                "where": filter,
            }
        });

        let url = format!("{}:runQuery", self.documents_url);
        let response = send_json(&self.http, Method::POST, &url, Some(&body))
            .await
            .with_context(|| format!("query on '{collection}' failed"))?;

        let rows = response
            .as_array()
            .ok_or_else(|| anyhow!("runQuery returned a non-array response"))?;

        let documents: Vec<_> = rows
            .iter()
            .filter_map(|row| {
                let doc = row.get("document")?;
                let id = doc["name"].as_str()?.rsplit('/').next()?.to_string();
                Some((id, decode_fields(&doc["fields"])))
            })
            .collect();

        debug!(count = documents.len(), "Query returned documents");
        Ok(documents)
    }

    /// Documents of `collection` whose `busId` normalizes to `bus`.
    async fn query_bus(&self, collection: &str, bus: &BusId) -> Result<Vec<(String, Value)>> {
        let mut documents = self
            .query_in(collection, "busId", &bus.query_variants(&self.prefix))
            .await?;
        documents.retain(|(_, doc)| {
            str_field(doc, &["busId"]).is_some_and(|raw| BusId::parse(&raw, &self.prefix) == *bus)
        });
        Ok(documents)
    }

    /// `PATCH` without an update mask, which replaces the whole document and
    /// creates it when missing.
    async fn replace_document(&self, collection: &str, id: &str, doc: &Value) -> Result<()> {
        let url = self.document_url(collection, id);
        let body = json!({ "fields": encode_fields(doc) });
        send_json(&self.http, Method::PATCH, &url, Some(&body))
            .await
            .with_context(|| format!("write to '{collection}/{id}' failed"))?;
        Ok(())
    }

    /// Creates a document with a generated id and returns that id.
    async fn create_document(&self, collection: &str, doc: &Value) -> Result<String> {
        let url = format!("{}/{}", self.documents_url, collection);
        let body = json!({ "fields": encode_fields(doc) });
        let created = send_json(&self.http, Method::POST, &url, Some(&body))
            .await
            .with_context(|| format!("create in '{collection}' failed"))?;

        created["name"]
            .as_str()
            .and_then(|name| name.rsplit('/').next())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("create in '{collection}' returned no document name"))
    }

    fn document_name(&self, collection: &str, id: &str) -> String {
        let path = self.document_url(collection, id);
        // `projects/...` without the API host and version
        match path.find("projects/") {
            Some(start) => path[start..].to_string(),
            None => path,
        }
    }
}

#[async_trait]
impl<C: HttpClient> AttendanceStore for FirestoreClient<C> {
    #[tracing::instrument(skip(self, bus), fields(bus = %bus))]
    async fn attendance_for_bus(&self, bus: &BusId, since: NaiveDate) -> Result<Vec<AttendanceRecord>> {
        let records = self
            .query_bus(ATTENDANCE, bus)
            .await?
            .into_iter()
            .filter_map(|(id, doc)| {
                let record = AttendanceRecord::from_document(&id, &doc, &self.prefix);
                if record.is_none() {
                    warn!(document = %id, "Skipping unreadable attendance document");
                }
                record
            })
            .filter(|r| r.date >= since);
        Ok(latest_per_day(records))
    }

    async fn attendance_for_day(&self, bus: &BusId, date: NaiveDate) -> Result<Option<AttendanceRecord>> {
        let records = self.attendance_for_bus(bus, date).await?;
        Ok(records.into_iter().find(|r| r.date == date))
    }

    #[tracing::instrument(skip(self, bus), fields(bus = %bus))]
    async fn roster_for_bus(&self, bus: &BusId) -> Result<Roster> {
        let profiles = self
            .query_bus(USERS, bus)
            .await?
            .into_iter()
            .filter_map(|(id, doc)| StudentProfile::from_document(&id, &doc, &self.prefix));
        Ok(Roster::new(profiles))
    }

    #[tracing::instrument(skip(self, record), fields(bus = %record.bus_id, date = %record.date))]
    async fn save_attendance(&self, record: &AttendanceRecord) -> Result<()> {
        self.replace_document(ATTENDANCE, &record.document_id(), &record.to_document())
            .await
    }

    async fn submit_feedback(&self, feedback: &Feedback) -> Result<String> {
        self.create_document(FEEDBACKS, &feedback.to_document()).await
    }

    async fn feedback_for_bus(&self, bus: &BusId) -> Result<Vec<Feedback>> {
        let feedback = self
            .query_bus(FEEDBACKS, bus)
            .await?
            .into_iter()
            .filter_map(|(id, doc)| Feedback::from_document(&id, &doc, &self.prefix))
            .collect();
        Ok(feedback)
    }

    /// Sets `fcmToken` and appends to `pushTokens` in one commit, so earlier
    /// devices keep receiving notifications.
    #[tracing::instrument(skip(self, token))]
    async fn register_push_token(&self, user_id: &str, token: &str) -> Result<()> {
        let body = json!({
            "writes": [{
                "update": {
                    "name": self.document_name(USERS, user_id),
                    "fields": encode_fields(&json!({ "fcmToken": token })),
                },
                "updateMask": { "fieldPaths": ["fcmToken"] },
                "updateTransforms": [{
                    "fieldPath": "pushTokens",
                    "appendMissingElements": { "values": [encode_value(&json!(token))] },
                }],
            }]
        });

        let url = format!("{}:commit", self.documents_url);
        send_json(&self.http, Method::POST, &url, Some(&body))
            .await
            .with_context(|| format!("token registration for '{user_id}' failed"))?;
        Ok(())
    }

    async fn push_tokens_for_bus(&self, bus: &BusId) -> Result<TokenRegistry> {
        let mut registry = TokenRegistry::new();
        for (id, doc) in self.query_bus(USERS, bus).await? {
            for token in tokens_from_document(&doc) {
                registry.register(&id, &token);
            }
        }
        Ok(registry)
    }

    async fn publish_location(&self, location: &BusLocation) -> Result<()> {
        self.replace_document(LOCATIONS, location.bus_id.as_str(), &location.to_document())
            .await
    }

    async fn latest_location(&self, bus: &BusId) -> Result<Option<BusLocation>> {
        let latest = self
            .query_bus(LOCATIONS, bus)
            .await?
            .into_iter()
            .filter_map(|(id, doc)| BusLocation::from_document(&id, &doc, &self.prefix))
            .max_by_key(|loc| loc.updated_at);
        Ok(latest)
    }
}
