//! Runtime settings read from the environment (and `.env` via `dotenvy`).

use anyhow::{Context, Result, anyhow};
use chrono::FixedOffset;
use std::str::FromStr;

use crate::bus_id::DEFAULT_PREFIX;

pub const DEFAULT_WINDOW_DAYS: u32 = 30;
pub const DEFAULT_SUMMARY_LIMIT: usize = 60;
/// India Standard Time.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 330;

#[derive(Debug, Clone)]
pub struct Settings {
    pub project_id: Option<String>,
    pub api_key: Option<String>,
    pub id_token: Option<String>,
    pub notify_endpoint: Option<String>,
    pub notify_api_key: Option<String>,
    pub bus_prefix: String,
    pub window_days: u32,
    pub summary_limit: usize,
    pub utc_offset_minutes: i32,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Ok(Self {
            project_id: get("FIRESTORE_PROJECT_ID"),
            api_key: get("FIREBASE_API_KEY"),
            id_token: get("FIREBASE_ID_TOKEN"),
            notify_endpoint: get("NOTIFY_ENDPOINT"),
            notify_api_key: get("NOTIFY_API_KEY"),
            bus_prefix: get("BUS_ID_PREFIX").unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
            window_days: parse_or("ATTENDANCE_WINDOW_DAYS", get("ATTENDANCE_WINDOW_DAYS"), DEFAULT_WINDOW_DAYS)?,
            summary_limit: parse_or("SUMMARY_LIMIT", get("SUMMARY_LIMIT"), DEFAULT_SUMMARY_LIMIT)?,
            utc_offset_minutes: parse_or("UTC_OFFSET_MINUTES", get("UTC_OFFSET_MINUTES"), DEFAULT_UTC_OFFSET_MINUTES)?,
        })
    }

    /// Offset used when printing marking times.
    pub fn offset(&self) -> Result<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| anyhow!("UTC_OFFSET_MINUTES {} is out of range", self.utc_offset_minutes))
    }

    pub fn require_project(&self) -> Result<&str> {
        self.project_id
            .as_deref()
            .ok_or_else(|| anyhow!("FIRESTORE_PROJECT_ID must be set (or pass --snapshot)"))
    }

    pub fn require_notify_endpoint(&self) -> Result<&str> {
        self.notify_endpoint
            .as_deref()
            .ok_or_else(|| anyhow!("NOTIFY_ENDPOINT must be set"))
    }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) => raw.parse().with_context(|| format!("{key} has invalid value '{raw}'")),
        None => Ok(default),
    }
}
