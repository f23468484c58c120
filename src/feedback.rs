//! Student feedback about a bus, stored in the `feedbacks` collection.

use crate::bus_id::BusId;
use crate::document::{f64_field, str_field, timestamp_field};
use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};

pub const DEFAULT_CATEGORY: &str = "general";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feedback {
    /// Store-assigned id; `None` until saved.
    pub id: Option<String>,
    pub bus_id: BusId,
    pub author_id: String,
    pub author_name: Option<String>,
    pub category: String,
    pub message: String,
    pub rating: Option<u8>,
    pub created_at: DateTime<Utc>,
}

impl Feedback {
    /// Validates and builds a new, unsaved feedback entry.
    pub fn new(
        bus_id: BusId,
        author_id: &str,
        author_name: Option<&str>,
        category: Option<&str>,
        message: &str,
        rating: Option<u8>,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        let message = message.trim();
        if message.is_empty() {
            bail!("feedback message must not be empty");
        }
        if author_id.trim().is_empty() {
            bail!("feedback needs an author id");
        }
        if let Some(r) = rating {
            if !(1..=5).contains(&r) {
                bail!("rating must be between 1 and 5, got {r}");
            }
        }

        Ok(Self {
            id: None,
            bus_id,
            author_id: author_id.trim().to_string(),
            author_name: author_name.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string),
            category: category
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or(DEFAULT_CATEGORY)
                .to_lowercase(),
            message: message.to_string(),
            rating,
            created_at,
        })
    }

    /// Reads a stored document. Entries without bus or message are skipped;
    /// a missing timestamp reads as the epoch so they sort last.
    pub fn from_document(id: &str, doc: &Value, prefix: &str) -> Option<Self> {
        let bus_id = BusId::parse(&str_field(doc, &["busId", "busNumber"])?, prefix);
        let message = str_field(doc, &["message", "feedback", "text"])?;

        Some(Self {
            id: Some(id.to_string()),
            bus_id,
            author_id: str_field(doc, &["userId", "studentId", "authorId"]).unwrap_or_else(|| "Unknown".into()),
            author_name: str_field(doc, &["userName", "studentName", "authorName"]),
            category: str_field(doc, &["category", "type"]).unwrap_or_else(|| DEFAULT_CATEGORY.into()),
            message,
            rating: f64_field(doc, &["rating"])
                .filter(|r| (1.0..=5.0).contains(r))
                .map(|r| r.round() as u8),
            created_at: timestamp_field(doc, &["createdAt", "timestamp"]).unwrap_or_default(),
        })
    }

    pub fn to_document(&self) -> Value {
        let mut doc = json!({
            "busId": self.bus_id.as_str(),
            "userId": self.author_id,
            "category": self.category,
            "message": self.message,
            "createdAt": self.created_at.to_rfc3339(),
        });
        if let Some(name) = &self.author_name {
            doc["userName"] = json!(name);
        }
        if let Some(rating) = self.rating {
            doc["rating"] = json!(rating);
        }
        doc
    }
}

/// Newest first, at most `limit` entries.
pub fn newest_first(mut feedback: Vec<Feedback>, limit: usize) -> Vec<Feedback> {
    feedback.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    feedback.truncate(limit);
    feedback
}
