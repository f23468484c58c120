use bus_attendance::analyzers::analyzer::{bus_summaries, day_report, fleet_overview, student_report};
use bus_attendance::bus_id::BusId;
use bus_attendance::feedback::{Feedback, newest_first};
use bus_attendance::infra::snapshot::SnapshotStore;
use bus_attendance::model::AttendanceStatus;
use bus_attendance::report::{FOOTER_LINES, HEADER_LINES};
use bus_attendance::services::store::AttendanceStore;
use bus_attendance::submission::{AttendanceSheet, Submitter, submit};
use chrono::{FixedOffset, NaiveDate, TimeZone, Utc};
use std::env;
use std::fs;
use std::path::PathBuf;

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/snapshot.json");

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

fn ist() -> FixedOffset {
    FixedOffset::east_opt(330 * 60).unwrap()
}

fn fixture_store() -> SnapshotStore {
    SnapshotStore::open(FIXTURE, "SIET").expect("Failed to open fixture")
}

/// Copy of the fixture for tests that write to the store.
fn scratch_store(name: &str) -> (SnapshotStore, PathBuf) {
    let path = env::temp_dir().join(name);
    fs::copy(FIXTURE, &path).expect("Failed to copy fixture");
    let store = SnapshotStore::open(&path, "SIET").expect("Failed to open scratch snapshot");
    (store, path)
}

#[tokio::test]
async fn test_summaries_for_bus() {
    let store = fixture_store();
    let summaries = bus_summaries(&store, &BusId::new("5"), 30, 60, today()).await.unwrap();

    // the August record is outside the window and the undated document is skipped
    let dates: Vec<_> = summaries.iter().map(|s| s.date.to_string()).collect();
    assert_eq!(dates, vec!["2026-10-19", "2026-10-18", "2026-10-17"]);

    let latest = &summaries[0];
    assert_eq!(latest.present_count, 2);
    assert_eq!(latest.absent_count, 1);
    assert_eq!(latest.total_count, 3);
    assert_eq!(latest.percentage, 66.7);
    assert_eq!(latest.submitted_by, "Ravi Kumar");

    let mixed = &summaries[1];
    assert_eq!(mixed.present_count, 3);
    assert_eq!(mixed.absent_count, 1);
    assert_eq!(mixed.unmarked_count, 1);
    assert_eq!(mixed.total_count, 5);
    assert_eq!(mixed.percentage, 60.0);
    assert!(mixed.students.iter().any(|s| s.name == "ghost"));

    assert_eq!(summaries[2].percentage, 0.0);
}

#[tokio::test]
async fn test_summary_limit() {
    let store = fixture_store();
    let summaries = bus_summaries(&store, &BusId::new("SIET-005"), 30, 1, today()).await.unwrap();

    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].date, today());
}

#[tokio::test]
async fn test_bus_without_records() {
    let store = fixture_store();
    let summaries = bus_summaries(&store, &BusId::new("9"), 30, 60, today()).await.unwrap();
    assert!(summaries.is_empty());

    let overview = fleet_overview(&store, &[BusId::new("9")], 30, today()).await.unwrap();
    assert_eq!(overview.buses.len(), 1);
    assert_eq!(overview.buses[0].total, 0);
    assert_eq!(overview.buses[0].percentage, 0.0);
}

#[tokio::test]
async fn test_fleet_overview() {
    let store = fixture_store();
    let buses = [BusId::new("5"), BusId::new("6")];
    let overview = fleet_overview(&store, &buses, 30, today()).await.unwrap();

    assert_eq!(overview.window_days, 30);
    let five = &overview.buses[0];
    assert_eq!(five.days_recorded, 3);
    assert_eq!(five.present, 5);
    assert_eq!(five.total, 10);
    assert_eq!(five.percentage, 50.0);

    let six = &overview.buses[1];
    assert_eq!(six.days_recorded, 1);
    assert_eq!(six.percentage, 100.0);
}

#[tokio::test]
async fn test_student_report() {
    let store = fixture_store();
    let history = student_report(&store, &BusId::new("5"), "s2", 30, today()).await.unwrap();

    assert_eq!(history.name, "bala K");
    assert_eq!(history.days_present, 1);
    assert_eq!(history.days_absent, 2);
    assert_eq!(history.percentage, 33.3);
}

#[tokio::test]
async fn test_day_report_line_count() {
    let store = fixture_store();
    let report = day_report(&store, &BusId::new("5"), today(), ist())
        .await
        .unwrap()
        .expect("report for submitted day");

    assert_eq!(report.subject, "Bus Attendance Report - SIET-005 - 2026-10-19");
    assert_eq!(report.students, 3);
    assert_eq!(report.body.lines().count(), HEADER_LINES + 3 + FOOTER_LINES);
    assert!(report.body.contains("Submitted by: Ravi Kumar"));
    assert!(report.body.contains("1. Anitha R [711521104001 | CSE | Year 3] - PRESENT (marked at 08:05 by Ravi Kumar)"));
}

#[tokio::test]
async fn test_day_report_drops_students_off_roster() {
    let store = fixture_store();
    let date = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
    let report = day_report(&store, &BusId::new("5"), date, ist()).await.unwrap().unwrap();

    assert_eq!(report.students, 4);
    assert!(!report.body.contains("ghost"));
    assert!(report.body.contains("Submitted by: c1"));
}

#[tokio::test]
async fn test_day_report_missing_day() {
    let store = fixture_store();
    let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
    assert!(day_report(&store, &BusId::new("5"), date, ist()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_resubmission_replaces_day() {
    let (store, path) = scratch_store("bus_attendance_it_resubmit.json");
    let bus = BusId::new("5");
    let roster = store.roster_for_bus(&bus).await.unwrap();
    let submitter = Submitter {
        id: "c1".into(),
        name: "Ravi Kumar".into(),
    };
    let at = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap();

    let mut sheet = AttendanceSheet::new(bus.clone(), today(), submitter, &roster);
    // s4 is inactive and never on the sheet
    assert!(sheet.mark("s4", AttendanceStatus::Present, at).is_err());
    sheet.mark("s3", AttendanceStatus::Present, at).unwrap();
    sheet.mark_remaining(AttendanceStatus::Absent, at);
    submit(&store, &sheet.into_record(at).unwrap()).await.unwrap();

    let reopened = SnapshotStore::open(&path, "SIET").unwrap();
    let records = reopened.attendance_for_bus(&bus, today()).await.unwrap();
    assert_eq!(records.len(), 1);

    let summaries = bus_summaries(&reopened, &bus, 1, 60, today()).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].present_count, 1);
    assert_eq!(summaries[0].absent_count, 2);
    assert_eq!(summaries[0].percentage, 33.3);

    fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_legacy_and_canonical_documents_count_once() {
    let path = env::temp_dir().join("bus_attendance_it_same_day.json");
    fs::write(
        &path,
        r#"{
            "users": { "s1": { "role": "student", "name": "Anitha R", "busId": "SIET-005" } },
            "attendance": {
                "legacy-xyz": {
                    "busId": "5", "date": "2026-10-19", "submittedAt": "2026-10-19T02:00:00Z",
                    "students": { "s1": { "status": "absent" } }
                },
                "SIET-005_2026-10-19": {
                    "busId": "SIET-005", "date": "2026-10-19", "submittedAt": "2026-10-19T03:00:00Z",
                    "students": { "s1": { "status": "present" } }
                }
            }
        }"#,
    )
    .unwrap();
    let store = SnapshotStore::open(&path, "SIET").unwrap();
    let bus = BusId::new("5");

    let summaries = bus_summaries(&store, &bus, 7, 60, today()).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].present_count, 1);
    assert_eq!(summaries[0].absent_count, 0);

    let overview = fleet_overview(&store, &[bus.clone()], 7, today()).await.unwrap();
    assert_eq!(overview.buses[0].days_recorded, 1);
    assert_eq!(overview.buses[0].present, 1);

    let report = day_report(&store, &bus, today(), ist()).await.unwrap().unwrap();
    assert!(report.body.contains("- PRESENT"));

    fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_feedback_flow() {
    let (store, path) = scratch_store("bus_attendance_it_feedback.json");
    let bus = BusId::new("5");

    let existing = newest_first(store.feedback_for_bus(&bus).await.unwrap(), 10);
    let messages: Vec<_> = existing.iter().map(|f| f.message.as_str()).collect();
    assert_eq!(messages, vec!["Driver was courteous", "Bus arrived late"]);

    let created_at = Utc.with_ymd_and_hms(2026, 10, 19, 10, 0, 0).unwrap();
    let feedback = Feedback::new(bus.clone(), "s3", None, Some("Cleanliness"), "Seats were dusty", Some(3), created_at).unwrap();
    let id = store.submit_feedback(&feedback).await.unwrap();
    assert!(id.starts_with("fb-"));

    let all = newest_first(store.feedback_for_bus(&bus).await.unwrap(), 1);
    assert_eq!(all[0].message, "Seats were dusty");
    assert_eq!(all[0].category, "cleanliness");

    fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_push_tokens_for_bus() {
    let store = fixture_store();
    let registry = store.push_tokens_for_bus(&BusId::new("5")).await.unwrap();

    assert_eq!(registry.all_tokens(), vec!["tok-s1", "tok-s2a", "tok-s2b"]);
    assert_eq!(registry.tokens_of("s2"), ["tok-s2a", "tok-s2b"]);
}

#[tokio::test]
async fn test_latest_location() {
    let store = fixture_store();
    let location = store.latest_location(&BusId::new("5")).await.unwrap().unwrap();

    assert_eq!(location.updated_by.as_deref(), Some("d1"));
    let now = Utc.with_ymd_and_hms(2026, 10, 19, 3, 0, 0).unwrap();
    assert!(!location.is_stale(now, chrono::Duration::minutes(15)));
    assert!(location.is_stale(now, chrono::Duration::minutes(5)));
    assert!(store.latest_location(&BusId::new("6")).await.unwrap().is_none());
}
