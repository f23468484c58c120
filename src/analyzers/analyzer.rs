use crate::analyzers::aggregate::{aggregate_records, bus_totals, sort_recent, student_history};
use crate::analyzers::types::{AggregatedDaySummary, FleetOverview, StudentAttendance};
use crate::bus_id::BusId;
use crate::model::AttendanceRecord;
use crate::report::{compose_report, entries_for_record, report_subject};
use crate::services::store::AttendanceStore;
use anyhow::Result;
use chrono::{Days, FixedOffset, NaiveDate};
use tracing::{error, info};

/// A composed report ready to hand to the mail composer.
#[derive(Debug, Clone)]
pub struct DayReport {
    pub subject: String,
    pub body: String,
    pub students: usize,
}

/// First day of a `days`-long window ending on `today`.
pub fn window_start(today: NaiveDate, days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(days.max(1)) - 1))
        .unwrap_or(NaiveDate::MIN)
}

/// Attendance records of `bus` dated within the trailing `days` ending on
/// `today`.
pub async fn fetch_recent<S: AttendanceStore + ?Sized>(
    store: &S,
    bus: &BusId,
    days: u32,
    today: NaiveDate,
) -> Result<Vec<AttendanceRecord>> {
    let mut records = store.attendance_for_bus(bus, window_start(today, days)).await?;
    records.retain(|r| r.date <= today);
    Ok(records)
}

/// Daily summaries for `bus`, newest first, at most `limit`.
#[tracing::instrument(skip(store, bus), fields(bus = %bus))]
pub async fn bus_summaries<S: AttendanceStore + ?Sized>(
    store: &S,
    bus: &BusId,
    days: u32,
    limit: usize,
    today: NaiveDate,
) -> Result<Vec<AggregatedDaySummary>> {
    let records = fetch_recent(store, bus, days, today).await?;
    if records.is_empty() {
        info!("No attendance submitted in window");
        return Ok(Vec::new());
    }

    let roster = store.roster_for_bus(bus).await?;
    let summaries = sort_recent(aggregate_records(&records, &roster), limit);

    info!(records = records.len(), summaries = summaries.len(), "Summaries built");
    Ok(summaries)
}

/// Totals for every bus in `buses` over the same window. A bus whose query
/// fails is logged and left out.
#[tracing::instrument(skip(store, buses), fields(buses = buses.len()))]
pub async fn fleet_overview<S: AttendanceStore + ?Sized>(
    store: &S,
    buses: &[BusId],
    days: u32,
    today: NaiveDate,
) -> Result<FleetOverview> {
    let mut totals = Vec::with_capacity(buses.len());

    for bus in buses {
        match bus_summaries(store, bus, days, usize::MAX, today).await {
            Ok(summaries) => totals.push(bus_totals(bus, &summaries)),
            Err(e) => error!(bus = %bus, error = %e, "Failed to load attendance for bus"),
        }
    }

    Ok(FleetOverview {
        generated_at: chrono::Utc::now(),
        window_days: days,
        buses: totals,
    })
}

/// One student's attendance on `bus` over the window.
pub async fn student_report<S: AttendanceStore + ?Sized>(
    store: &S,
    bus: &BusId,
    student_id: &str,
    days: u32,
    today: NaiveDate,
) -> Result<StudentAttendance> {
    let summaries = bus_summaries(store, bus, days, usize::MAX, today).await?;
    Ok(student_history(student_id, &summaries))
}

/// Composes the emailable report for `bus` on `date`, or `None` when nothing
/// was submitted that day.
#[tracing::instrument(skip(store, bus, offset), fields(bus = %bus))]
pub async fn day_report<S: AttendanceStore + ?Sized>(
    store: &S,
    bus: &BusId,
    date: NaiveDate,
    offset: FixedOffset,
) -> Result<Option<DayReport>> {
    let Some(record) = store.attendance_for_day(bus, date).await? else {
        info!("No attendance submitted for day");
        return Ok(None);
    };

    let roster = store.roster_for_bus(bus).await?;
    let entries = entries_for_record(&record, &roster, offset);
    let submitter = record
        .submitted_by_name
        .as_deref()
        .unwrap_or(&record.submitted_by);
    let date_str = date.format("%Y-%m-%d").to_string();

    Ok(Some(DayReport {
        subject: report_subject(bus, &date_str),
        body: compose_report(bus, &entries, submitter, &date_str),
        students: entries.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_start() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(window_start(today, 1), today);
        assert_eq!(window_start(today, 0), today);
        assert_eq!(window_start(today, 7), NaiveDate::from_ymd_opt(2026, 10, 13).unwrap());
        assert_eq!(window_start(today, 30), NaiveDate::from_ymd_opt(2026, 9, 20).unwrap());
    }
}
