//! Output formatting and persistence for attendance summaries.
//!
//! Command results go to stdout (JSON or one line per day); logs stay on
//! stderr. Summaries can also be appended to a CSV file.

use anyhow::Result;
use serde::Serialize;
use tracing::debug;

use crate::analyzers::types::{AggregatedDaySummary, SummaryRow};
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

/// Writes a value as pretty-printed JSON followed by a newline.
pub fn write_json(mut writer: impl Write, value: &impl Serialize) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    Ok(())
}

/// Prints a value as pretty-printed JSON on stdout.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    write_json(io::stdout().lock(), value)
}

/// One human-readable line for a day's summary.
pub fn summary_line(summary: &AggregatedDaySummary) -> String {
    format!(
        "{} {} present {} absent {} unmarked {} total {} ({:.1}%) by {}",
        summary.date,
        summary.bus_id,
        summary.present_count,
        summary.absent_count,
        summary.unmarked_count,
        summary.total_count,
        summary.percentage,
        summary.submitted_by
    )
}

/// Appends one CSV row per summary to `path`.
///
/// Creates the file with headers if it does not already exist.
pub fn append_summaries(path: &str, summaries: &[AggregatedDaySummary]) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, rows = summaries.len(), "Appending CSV rows");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for summary in summaries {
        writer.serialize(SummaryRow::from(summary))?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus_id::BusId;
    use chrono::NaiveDate;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    fn summary(day: u32) -> AggregatedDaySummary {
        AggregatedDaySummary {
            date: NaiveDate::from_ymd_opt(2026, 10, day).unwrap(),
            bus_id: BusId::new("5"),
            submitted_by: "Ravi".into(),
            present_count: 2,
            absent_count: 1,
            unmarked_count: 0,
            total_count: 3,
            percentage: 66.7,
            students: vec![],
        }
    }

    #[test]
    fn test_write_json_is_pretty_and_terminated() {
        let mut out = Vec::new();
        write_json(&mut out, &summary(19)).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with("}\n"));
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["bus_id"], "SIET-005");
        assert_eq!(parsed["percentage"], 66.7);
    }

    #[test]
    fn test_summary_line() {
        assert_eq!(
            summary_line(&summary(19)),
            "2026-10-19 SIET-005 present 2 absent 1 unmarked 0 total 3 (66.7%) by Ravi"
        );
    }

    #[test]
    fn test_append_summaries_creates_file() {
        let path = temp_path("bus_attendance_test_create.csv");
        let _ = fs::remove_file(&path);

        append_summaries(&path, &[summary(19)]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("date,bus_id,submitted_by,present,absent,unmarked,total,percentage"));
        assert!(content.contains("2026-10-19,SIET-005,Ravi,2,1,0,3,66.7"));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append_summaries_writes_header_once() {
        let path = temp_path("bus_attendance_test_header.csv");
        let _ = fs::remove_file(&path);

        append_summaries(&path, &[summary(18)]).unwrap();
        append_summaries(&path, &[summary(19), summary(20)]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let header_count = content.lines().filter(|l| l.starts_with("date,")).count();
        assert_eq!(header_count, 1);
        // 1 header + 3 data rows
        assert_eq!(content.lines().count(), 4);

        fs::remove_file(&path).unwrap();
    }
}
