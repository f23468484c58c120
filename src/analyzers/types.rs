//! Data types produced by the aggregation pipeline.

use crate::bus_id::BusId;
use crate::model::AttendanceStatus;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// One student's line in a daily summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentBreakdown {
    pub student_id: String,
    pub name: String,
    pub status: AttendanceStatus,
    pub marked_at: Option<DateTime<Utc>>,
    pub marked_by: Option<String>,
}

/// Counts for one attendance document. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedDaySummary {
    pub date: NaiveDate,
    pub bus_id: BusId,
    pub submitted_by: String,
    pub present_count: usize,
    pub absent_count: usize,
    pub unmarked_count: usize,
    pub total_count: usize,
    pub percentage: f64,
    pub students: Vec<StudentBreakdown>,
}

/// Totals for one bus over a window of days.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusTotals {
    pub bus_id: BusId,
    pub days_recorded: usize,
    pub present: usize,
    pub absent: usize,
    pub unmarked: usize,
    pub total: usize,
    pub percentage: f64,
}

/// One student's record across a window of days.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentAttendance {
    pub student_id: String,
    pub name: String,
    pub days_present: usize,
    pub days_absent: usize,
    pub days_unmarked: usize,
    pub percentage: f64,
}

/// Management view: every requested bus over the same window.
#[derive(Debug, Serialize)]
pub struct FleetOverview {
    pub generated_at: DateTime<Utc>,
    pub window_days: u32,
    pub buses: Vec<BusTotals>,
}

/// Flat CSV row for a daily summary.
#[derive(Debug, Serialize)]
pub struct SummaryRow {
    pub date: NaiveDate,
    pub bus_id: String,
    pub submitted_by: String,
    pub present: usize,
    pub absent: usize,
    pub unmarked: usize,
    pub total: usize,
    pub percentage: f64,
}

impl From<&AggregatedDaySummary> for SummaryRow {
    fn from(summary: &AggregatedDaySummary) -> Self {
        Self {
            date: summary.date,
            bus_id: summary.bus_id.to_string(),
            submitted_by: summary.submitted_by.clone(),
            present: summary.present_count,
            absent: summary.absent_count,
            unmarked: summary.unmarked_count,
            total: summary.total_count,
            percentage: summary.percentage,
        }
    }
}
