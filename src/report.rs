//! Plain-text attendance reports and the `mailto:` link that hands them to
//! the device mail composer.

use crate::analyzers::utility::percentage;
use crate::bus_id::BusId;
use crate::model::{AttendanceRecord, AttendanceStatus};
use crate::roster::{Roster, name_order};
use chrono::{DateTime, FixedOffset};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;

/// Lines before the first student line.
pub const HEADER_LINES: usize = 10;
/// Lines after the last student line.
pub const FOOTER_LINES: usize = 2;

const FOOTER: &str = "Generated by the college bus attendance tracker.";

/// RFC 3986 unreserved characters stay literal.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');
const RECIPIENT: &AsciiSet = &COMPONENT.remove(b'@');

/// One student's row in a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    pub name: String,
    pub register_number: Option<String>,
    pub department: Option<String>,
    pub year: Option<String>,
    pub status: AttendanceStatus,
    pub marked_at: Option<DateTime<FixedOffset>>,
    pub marked_by: Option<String>,
}

/// Joins a record with the roster for reporting.
///
/// Students missing from the roster are dropped. Entries come back sorted by
/// name and timestamps are shifted to `offset` for display.
pub fn entries_for_record(record: &AttendanceRecord, roster: &Roster, offset: FixedOffset) -> Vec<ReportEntry> {
    let mut joined: Vec<_> = record
        .students
        .iter()
        .filter_map(|(id, mark)| Some((id, mark, roster.get(id)?)))
        .collect();
    joined.sort_by(|(a_id, _, a), (b_id, _, b)| name_order(&a.name, a_id, &b.name, b_id));

    joined
        .into_iter()
        .map(|(_, mark, profile)| ReportEntry {
            name: profile.name.clone(),
            register_number: profile.register_number.clone(),
            department: profile.department.clone(),
            year: profile.year.clone(),
            status: mark.status.clone(),
            marked_at: mark.marked_at.map(|at| at.with_timezone(&offset)),
            marked_by: mark.marked_by.clone(),
        })
        .collect()
}

pub fn report_subject(bus_id: &BusId, date: &str) -> String {
    format!("Bus Attendance Report - {} - {}", single_line(bus_id.as_str()), single_line(date))
}

/// Renders the report body.
///
/// The output always has [`HEADER_LINES`] + `entries.len()` +
/// [`FOOTER_LINES`] lines.
pub fn compose_report(bus_id: &BusId, entries: &[ReportEntry], submitter: &str, date: &str) -> String {
    let present = entries.iter().filter(|e| e.status == AttendanceStatus::Present).count();
    let absent = entries.iter().filter(|e| e.status == AttendanceStatus::Absent).count();
    let unmarked = entries.len() - present - absent;
    let submitter = match single_line(submitter) {
        s if s.is_empty() => "Unknown".to_string(),
        s => s,
    };

    let mut lines = Vec::with_capacity(HEADER_LINES + entries.len() + FOOTER_LINES);
    lines.push("BUS ATTENDANCE REPORT".to_string());
    lines.push(format!("Date: {}", single_line(date)));
    lines.push(format!("Bus: {}", single_line(bus_id.as_str())));
    lines.push(format!("Submitted by: {submitter}"));
    lines.push(format!("Total students: {}", entries.len()));
    lines.push(format!("Present: {present}"));
    lines.push(format!("Absent: {absent} (unmarked: {unmarked})"));
    lines.push(format!("Attendance: {:.1}%", percentage(present, entries.len())));
    lines.push(String::new());
    lines.push("Students:".to_string());

    for (index, entry) in entries.iter().enumerate() {
        lines.push(student_line(index + 1, entry));
    }

    lines.push(String::new());
    lines.push(FOOTER.to_string());

    lines.join("\n")
}

fn student_line(number: usize, entry: &ReportEntry) -> String {
    let mut line = format!("{number}. {}", single_line(&entry.name));

    let metadata: Vec<String> = [
        entry.register_number.as_deref().map(single_line),
        entry.department.as_deref().map(single_line),
        entry.year.as_deref().map(|y| format!("Year {}", single_line(y))),
    ]
    .into_iter()
    .flatten()
    .filter(|part| !part.is_empty())
    .collect();
    if !metadata.is_empty() {
        line.push_str(&format!(" [{}]", metadata.join(" | ")));
    }

    line.push_str(&format!(" - {}", single_line(entry.status.as_str()).to_uppercase()));

    let mut details = Vec::new();
    if let Some(at) = entry.marked_at {
        details.push(format!("at {}", at.format("%H:%M")));
    }
    if let Some(by) = entry.marked_by.as_deref().map(single_line).filter(|b| !b.is_empty()) {
        details.push(format!("by {by}"));
    }
    if !details.is_empty() {
        line.push_str(&format!(" (marked {})", details.join(" ")));
    }

    line
}

/// Builds `mailto:<recipient>?subject=..&body=..` with CRLF line breaks in
/// the body.
pub fn mailto_url(recipient: &str, subject: &str, body: &str) -> String {
    let body = body.replace("\r\n", "\n").replace('\n', "\r\n");
    format!(
        "mailto:{}?subject={}&body={}",
        utf8_percent_encode(recipient.trim(), RECIPIENT),
        utf8_percent_encode(subject, COMPONENT),
        utf8_percent_encode(&body, COMPONENT),
    )
}

fn single_line(text: &str) -> String {
    text.split(['\r', '\n'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
