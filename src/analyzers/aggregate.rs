use crate::analyzers::types::{AggregatedDaySummary, BusTotals, StudentAttendance, StudentBreakdown};
use crate::analyzers::utility::percentage;
use crate::bus_id::BusId;
use crate::model::{AttendanceRecord, AttendanceStatus};
use crate::roster::{Roster, name_order};

/// Summarizes one attendance document against `roster`.
///
/// Every entry of the student mapping appears in the breakdown, sorted by
/// display name. Students missing from the roster are listed under their raw
/// id. Statuses other than present/absent count as unmarked and are left out
/// of the present and absent counts.
pub fn aggregate_record(record: &AttendanceRecord, roster: &Roster) -> AggregatedDaySummary {
    let mut present_count = 0;
    let mut absent_count = 0;
    let mut unmarked_count = 0;

    let mut students: Vec<StudentBreakdown> = record
        .students
        .iter()
        .map(|(student_id, mark)| {
            match mark.status {
                AttendanceStatus::Present => present_count += 1,
                AttendanceStatus::Absent => absent_count += 1,
                AttendanceStatus::Unmarked(_) => unmarked_count += 1,
            }

            StudentBreakdown {
                student_id: student_id.clone(),
                name: roster.display_name(student_id).to_string(),
                status: mark.status.clone(),
                marked_at: mark.marked_at,
                marked_by: mark.marked_by.clone(),
            }
        })
        .collect();

    students.sort_by(|a, b| name_order(&a.name, &a.student_id, &b.name, &b.student_id));

    let total_count = students.len();

    AggregatedDaySummary {
        date: record.date,
        bus_id: record.bus_id.clone(),
        submitted_by: record
            .submitted_by_name
            .clone()
            .unwrap_or_else(|| record.submitted_by.clone()),
        present_count,
        absent_count,
        unmarked_count,
        total_count,
        percentage: percentage(present_count, total_count),
        students,
    }
}

/// One summary per record, in input order.
pub fn aggregate_records(records: &[AttendanceRecord], roster: &Roster) -> Vec<AggregatedDaySummary> {
    records.iter().map(|r| aggregate_record(r, roster)).collect()
}

/// Newest first, ties broken by bus id, keeping at most `limit` summaries.
pub fn sort_recent(mut summaries: Vec<AggregatedDaySummary>, limit: usize) -> Vec<AggregatedDaySummary> {
    summaries.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.bus_id.cmp(&b.bus_id)));
    summaries.truncate(limit);
    summaries
}

/// Rolls daily summaries up into one [`BusTotals`].
pub fn bus_totals(bus_id: &BusId, summaries: &[AggregatedDaySummary]) -> BusTotals {
    let present = summaries.iter().map(|s| s.present_count).sum();
    let absent = summaries.iter().map(|s| s.absent_count).sum();
    let unmarked = summaries.iter().map(|s| s.unmarked_count).sum();
    let total = summaries.iter().map(|s| s.total_count).sum();

    BusTotals {
        bus_id: bus_id.clone(),
        days_recorded: summaries.len(),
        present,
        absent,
        unmarked,
        total,
        percentage: percentage(present, total),
    }
}

/// One student's days across `summaries`. Days the student does not appear
/// in are not counted.
pub fn student_history(student_id: &str, summaries: &[AggregatedDaySummary]) -> StudentAttendance {
    let mut history = StudentAttendance {
        student_id: student_id.to_string(),
        name: student_id.to_string(),
        days_present: 0,
        days_absent: 0,
        days_unmarked: 0,
        percentage: 0.0,
    };

    for entry in summaries
        .iter()
        .flat_map(|s| s.students.iter())
        .filter(|e| e.student_id == student_id)
    {
        history.name = entry.name.clone();
        match entry.status {
            AttendanceStatus::Present => history.days_present += 1,
            AttendanceStatus::Absent => history.days_absent += 1,
            AttendanceStatus::Unmarked(_) => history.days_unmarked += 1,
        }
    }

    let days = history.days_present + history.days_absent + history.days_unmarked;
    history.percentage = percentage(history.days_present, days);
    history
}
