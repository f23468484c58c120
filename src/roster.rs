//! Student roster lookup for one bus.

use crate::model::StudentProfile;
use std::collections::HashMap;

/// Student profiles keyed by id.
///
/// Holds inactive students too so that historical attendance still resolves
/// their names; [`Roster::active`] is what a co-admin marks against.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    students: HashMap<String, StudentProfile>,
}

impl Roster {
    pub fn new(profiles: impl IntoIterator<Item = StudentProfile>) -> Self {
        Self {
            students: profiles.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    pub fn get(&self, student_id: &str) -> Option<&StudentProfile> {
        self.students.get(student_id)
    }

    /// Display name for `student_id`, or the raw id when unknown.
    pub fn display_name<'a>(&'a self, student_id: &'a str) -> &'a str {
        self.get(student_id)
            .map(|p| p.name.as_str())
            .unwrap_or(student_id)
    }

    /// Active students sorted by name.
    pub fn active(&self) -> Vec<&StudentProfile> {
        let mut active: Vec<_> = self.students.values().filter(|p| p.active).collect();
        active.sort_by(|a, b| name_order(&a.name, &a.id, &b.name, &b.id));
        active
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }
}

/// Case-insensitive name ordering with the id as tie-breaker.
pub fn name_order(a_name: &str, a_id: &str, b_name: &str, b_id: &str) -> std::cmp::Ordering {
    a_name
        .to_lowercase()
        .cmp(&b_name.to_lowercase())
        .then_with(|| a_id.cmp(b_id))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bus_id::BusId;

    pub(crate) fn student(id: &str, name: &str) -> StudentProfile {
        StudentProfile {
            id: id.to_string(),
            name: name.to_string(),
            register_number: Some(format!("REG-{id}")),
            department: Some("CSE".to_string()),
            year: Some("2".to_string()),
            bus_id: Some(BusId::new("5")),
            active: true,
        }
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let roster = Roster::new(vec![student("s1", "Anitha")]);
        assert_eq!(roster.display_name("s1"), "Anitha");
        assert_eq!(roster.display_name("ghost"), "ghost");
    }

    #[test]
    fn test_active_excludes_inactive_and_sorts() {
        let mut gone = student("s3", "Aaron");
        gone.active = false;
        let roster = Roster::new(vec![student("s1", "bala"), student("s2", "Anitha"), gone]);

        let names: Vec<_> = roster.active().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Anitha", "bala"]);
        assert_eq!(roster.len(), 3);
        assert!(roster.get("s3").is_some());
    }
}
