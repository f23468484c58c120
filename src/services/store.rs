//! Trait for the document store behind every screen of the app.

use crate::bus_id::BusId;
use crate::feedback::Feedback;
use crate::location::BusLocation;
use crate::model::AttendanceRecord;
use crate::notify::TokenRegistry;
use crate::roster::Roster;
use anyhow::Result;
use chrono::NaiveDate;

/// Abstraction over the backing document database (Firestore in production,
/// a JSON snapshot offline).
///
/// Queries filter on the bus id only; date filtering and ordering happen on
/// the client so the store never needs composite indexes.
#[async_trait::async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Attendance records for `bus` dated on or after `since`, one per day
    /// (the latest submission), in no particular order.
    async fn attendance_for_bus(&self, bus: &BusId, since: NaiveDate) -> Result<Vec<AttendanceRecord>>;

    /// The attendance document for `bus` on `date`, if one was submitted.
    async fn attendance_for_day(&self, bus: &BusId, date: NaiveDate) -> Result<Option<AttendanceRecord>>;

    /// All student profiles assigned to `bus`, active or not.
    async fn roster_for_bus(&self, bus: &BusId) -> Result<Roster>;

    /// Writes `record` under its deterministic id, replacing any earlier
    /// submission for the same bus and day.
    async fn save_attendance(&self, record: &AttendanceRecord) -> Result<()>;

    /// Stores new feedback and returns its id.
    async fn submit_feedback(&self, feedback: &Feedback) -> Result<String>;

    async fn feedback_for_bus(&self, bus: &BusId) -> Result<Vec<Feedback>>;

    /// Adds `token` to the user's profile without dropping earlier tokens.
    async fn register_push_token(&self, user_id: &str, token: &str) -> Result<()>;

    /// Tokens of every user assigned to `bus`.
    async fn push_tokens_for_bus(&self, bus: &BusId) -> Result<TokenRegistry>;

    /// Replaces the stored position of the location's bus.
    async fn publish_location(&self, location: &BusLocation) -> Result<()>;

    async fn latest_location(&self, bus: &BusId) -> Result<Option<BusLocation>>;
}
