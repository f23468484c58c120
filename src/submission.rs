//! Marking a day's attendance on the active roster and submitting it.

use crate::bus_id::BusId;
use crate::model::{AttendanceRecord, AttendanceStatus, StudentMark};
use crate::roster::Roster;
use crate::services::store::AttendanceStore;
use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use tracing::info;

/// Who is submitting: the co-admin's user id and display name.
#[derive(Debug, Clone)]
pub struct Submitter {
    pub id: String,
    pub name: String,
}

/// One day's attendance for one bus, being filled in by a co-admin.
#[derive(Debug)]
pub struct AttendanceSheet {
    bus_id: BusId,
    date: NaiveDate,
    submitter: Submitter,
    marks: BTreeMap<String, Option<StudentMark>>,
}

impl AttendanceSheet {
    /// Starts a sheet listing every active student on `roster`, none marked.
    pub fn new(bus_id: BusId, date: NaiveDate, submitter: Submitter, roster: &Roster) -> Self {
        let marks = roster.active().into_iter().map(|p| (p.id.clone(), None)).collect();
        Self {
            bus_id,
            date,
            submitter,
            marks,
        }
    }

    /// Marks one student. Fails for students not on the sheet.
    pub fn mark(&mut self, student_id: &str, status: AttendanceStatus, at: DateTime<Utc>) -> Result<()> {
        let Some(slot) = self.marks.get_mut(student_id) else {
            bail!("student '{student_id}' is not on the active roster of {}", self.bus_id);
        };
        *slot = Some(StudentMark::new(status, at, &self.submitter.name));
        Ok(())
    }

    /// Marks every student not yet marked.
    pub fn mark_remaining(&mut self, status: AttendanceStatus, at: DateTime<Utc>) {
        for slot in self.marks.values_mut().filter(|slot| slot.is_none()) {
            *slot = Some(StudentMark::new(status.clone(), at, &self.submitter.name));
        }
    }

    /// Ids of students still unmarked.
    pub fn unmarked(&self) -> Vec<&str> {
        self.marks
            .iter()
            .filter(|(_, mark)| mark.is_none())
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Finalizes the sheet. Unmarked students are left out of the record.
    pub fn into_record(self, submitted_at: DateTime<Utc>) -> Result<AttendanceRecord> {
        let students: BTreeMap<_, _> = self
            .marks
            .into_iter()
            .filter_map(|(id, mark)| Some((id, mark?)))
            .collect();
        if students.is_empty() {
            bail!("no students marked for {} on {}", self.bus_id, self.date);
        }

        Ok(AttendanceRecord {
            bus_id: self.bus_id,
            date: self.date,
            submitted_by: self.submitter.id,
            submitted_by_name: Some(self.submitter.name),
            submitted_at: Some(submitted_at),
            students,
        })
    }
}

/// Saves `record`, replacing any earlier submission for its bus and day.
#[tracing::instrument(skip(store, record), fields(bus = %record.bus_id, date = %record.date))]
pub async fn submit<S: AttendanceStore + ?Sized>(store: &S, record: &AttendanceRecord) -> Result<()> {
    store.save_attendance(record).await?;
    info!(
        students = record.students.len(),
        document = %record.document_id(),
        "Attendance submitted"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::tests::student;
    use chrono::TimeZone;

    fn sheet() -> AttendanceSheet {
        let mut inactive = student("s9", "Old");
        inactive.active = false;
        let roster = Roster::new(vec![student("s1", "Anitha"), student("s2", "Bala"), inactive]);
        AttendanceSheet::new(
            BusId::new("5"),
            NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            Submitter {
                id: "c1".into(),
                name: "Ravi".into(),
            },
            &roster,
        )
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 2, 30, 0).unwrap()
    }

    #[test]
    fn test_sheet_lists_active_students_only() {
        let sheet = sheet();
        assert_eq!(sheet.unmarked(), vec!["s1", "s2"]);
    }

    #[test]
    fn test_mark_unknown_student_fails() {
        let mut sheet = sheet();
        assert!(sheet.mark("s9", AttendanceStatus::Present, at()).is_err());
        assert!(sheet.mark("nobody", AttendanceStatus::Present, at()).is_err());
    }

    #[test]
    fn test_into_record_keeps_marked_only() {
        let mut sheet = sheet();
        sheet.mark("s1", AttendanceStatus::Present, at()).unwrap();

        let record = sheet.into_record(at()).unwrap();
        assert_eq!(record.students.len(), 1);
        assert_eq!(record.students["s1"].marked_by.as_deref(), Some("Ravi"));
        assert_eq!(record.submitted_by, "c1");
        assert_eq!(record.document_id(), "SIET-005_2026-10-19");
    }

    #[test]
    fn test_mark_remaining() {
        let mut sheet = sheet();
        sheet.mark("s1", AttendanceStatus::Absent, at()).unwrap();
        sheet.mark_remaining(AttendanceStatus::Present, at());

        assert!(sheet.unmarked().is_empty());
        let record = sheet.into_record(at()).unwrap();
        assert_eq!(record.students["s1"].status, AttendanceStatus::Absent);
        assert_eq!(record.students["s2"].status, AttendanceStatus::Present);
    }

    #[test]
    fn test_empty_sheet_is_rejected() {
        assert!(sheet().into_record(at()).is_err());
    }
}
