//! Check-in reconciliation.
//!
//! Maps a raw identifier (badge scan or typed entry) plus the selected
//! date/assignment onto at most one roster mutation. The roster is an
//! immutable snapshot here; applying the returned [`Mutation`] is the
//! caller's job.

use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "present" => Some(Self::Present),
            "absent" => Some(Self::Absent),
            "late" => Some(Self::Late),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Late => "late",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Student {
    pub id: String,
    pub display_name: String,
    pub avatar: Option<String>,
    pub attendance: BTreeMap<String, AttendanceStatus>,
    pub completed: BTreeSet<String>,
}

impl Student {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            ..Self::default()
        }
    }

    #[cfg(test)]
    pub fn status_on(&self, date: &str) -> Option<AttendanceStatus> {
        self.attendance.get(date).copied()
    }

    pub fn has_completed(&self, assignment_id: &str) -> bool {
        self.completed.contains(assignment_id)
    }
}

/// Ordered class roster.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    students: Vec<Student>,
}

impl Roster {
    pub fn new(students: Vec<Student>) -> Self {
        Self { students }
    }

    /// Exact, case-sensitive match on the student id. First match wins.
    pub fn lookup(&self, identifier: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == identifier)
    }

    #[cfg(test)]
    pub fn students(&self) -> &[Student] {
        &self.students
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.students.len()
    }

    /// Applies a mutation to the in-memory snapshot. Returns false when the
    /// target student is not on the roster.
    #[cfg(test)]
    pub fn apply(&mut self, mutation: &Mutation) -> bool {
        let Some(student) = self
            .students
            .iter_mut()
            .find(|s| s.id == mutation.student_id())
        else {
            return false;
        };
        match mutation {
            Mutation::Attendance { date, status, .. } => {
                student.attendance.insert(date.clone(), *status);
            }
            Mutation::Assignment {
                assignment_id,
                complete,
                ..
            } => {
                if *complete {
                    student.completed.insert(assignment_id.clone());
                } else {
                    student.completed.remove(assignment_id);
                }
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Attendance,
    Homework,
}

impl Mode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "attendance" => Some(Self::Attendance),
            "homework" => Some(Self::Homework),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Attendance => "attendance",
            Self::Homework => "homework",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckinContext {
    pub selected_date: String,
    pub selected_assignment_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Attendance {
        student_id: String,
        date: String,
        status: AttendanceStatus,
    },
    Assignment {
        student_id: String,
        assignment_id: String,
        complete: bool,
    },
}

impl Mutation {
    #[cfg(test)]
    pub fn student_id(&self) -> &str {
        match self {
            Self::Attendance { student_id, .. } | Self::Assignment { student_id, .. } => {
                student_id
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Attendance { .. } => "attendance",
            Self::Assignment { .. } => "assignment",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Unknown {
        identifier: String,
    },
    AlreadyDone {
        student_id: String,
        display_name: String,
        avatar: Option<String>,
    },
    Recorded {
        student_id: String,
        display_name: String,
        avatar: Option<String>,
        mutation: Mutation,
    },
}

impl Outcome {
    pub fn mutation(&self) -> Option<&Mutation> {
        match self {
            Self::Recorded { mutation, .. } => Some(mutation),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unknown { .. } => "unknown",
            Self::AlreadyDone { .. } => "already_done",
            Self::Recorded { .. } => "recorded",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckinError {
    #[error("no assignment selected for homework check-in")]
    NoTargetSelected,
    #[error("identifier must not be empty")]
    EmptyIdentifier,
}

/// Decides what a single scan means against `roster`.
///
/// Attendance scans always request PRESENT for the selected date, whatever
/// the prior status. Homework scans request completion only when the student
/// has not completed the selected assignment yet; a repeat scan is
/// `AlreadyDone` and never un-marks.
pub fn reconcile(
    identifier: &str,
    context: &CheckinContext,
    roster: &Roster,
    mode: Mode,
) -> Result<Outcome, CheckinError> {
    if identifier.is_empty() {
        return Err(CheckinError::EmptyIdentifier);
    }
    let assignment_id = match mode {
        Mode::Homework => Some(
            context
                .selected_assignment_id
                .as_deref()
                .filter(|a| !a.is_empty())
                .ok_or(CheckinError::NoTargetSelected)?,
        ),
        Mode::Attendance => None,
    };

    let Some(student) = roster.lookup(identifier) else {
        return Ok(Outcome::Unknown {
            identifier: identifier.to_string(),
        });
    };

    let mutation = match assignment_id {
        None => Mutation::Attendance {
            student_id: student.id.clone(),
            date: context.selected_date.clone(),
            status: AttendanceStatus::Present,
        },
        Some(assignment_id) => {
            if student.has_completed(assignment_id) {
                return Ok(Outcome::AlreadyDone {
                    student_id: student.id.clone(),
                    display_name: student.display_name.clone(),
                    avatar: student.avatar.clone(),
                });
            }
            Mutation::Assignment {
                student_id: student.id.clone(),
                assignment_id: assignment_id.to_string(),
                complete: true,
            }
        }
    };

    Ok(Outcome::Recorded {
        student_id: student.id.clone(),
        display_name: student.display_name.clone(),
        avatar: student.avatar.clone(),
        mutation,
    })
}

/// Manual list toggle: flips completion with no duplicate guard.
pub fn manual_toggle(student: &Student, assignment_id: &str) -> Mutation {
    Mutation::Assignment {
        student_id: student.id.clone(),
        assignment_id: assignment_id.to_string(),
        complete: !student.has_completed(assignment_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ana_roster() -> Roster {
        Roster::new(vec![Student::new("A1", "Ana"), Student::new("B2", "Bruno")])
    }

    fn homework(assignment: &str) -> CheckinContext {
        CheckinContext {
            selected_date: "2024-01-10".to_string(),
            selected_assignment_id: Some(assignment.to_string()),
        }
    }

    fn attendance(date: &str) -> CheckinContext {
        CheckinContext {
            selected_date: date.to_string(),
            selected_assignment_id: None,
        }
    }

    #[test]
    fn unknown_identifier_never_mutates() {
        let roster = ana_roster();
        for mode in [Mode::Attendance, Mode::Homework] {
            let out = reconcile("Z9", &homework("HW1"), &roster, mode).expect("reconcile");
            assert_eq!(
                out,
                Outcome::Unknown {
                    identifier: "Z9".to_string()
                }
            );
            assert!(out.mutation().is_none());
        }
    }

    #[test]
    fn lookup_is_exact_and_case_sensitive() {
        let roster = ana_roster();
        assert!(roster.lookup("A1").is_some());
        assert!(roster.lookup("a1").is_none());
        assert!(roster.lookup(" A1").is_none());
    }

    #[test]
    fn homework_scan_records_then_reports_duplicate() {
        let mut roster = ana_roster();
        let first = reconcile("A1", &homework("HW1"), &roster, Mode::Homework).expect("first");
        let mutation = first.mutation().cloned().expect("mutation");
        assert_eq!(
            mutation,
            Mutation::Assignment {
                student_id: "A1".to_string(),
                assignment_id: "HW1".to_string(),
                complete: true,
            }
        );
        assert!(roster.apply(&mutation));

        let second = reconcile("A1", &homework("HW1"), &roster, Mode::Homework).expect("second");
        assert_eq!(second.kind(), "already_done");
        assert!(second.mutation().is_none());
    }

    #[test]
    fn attendance_scan_overwrites_any_prior_status() {
        for prior in [
            None,
            Some(AttendanceStatus::Absent),
            Some(AttendanceStatus::Late),
            Some(AttendanceStatus::Present),
        ] {
            let mut student = Student::new("A1", "Ana");
            if let Some(p) = prior {
                student.attendance.insert("2024-01-10".to_string(), p);
            }
            let mut roster = Roster::new(vec![student]);
            for _ in 0..3 {
                let out = reconcile("A1", &attendance("2024-01-10"), &roster, Mode::Attendance)
                    .expect("reconcile");
                assert_eq!(out.kind(), "recorded");
                roster.apply(out.mutation().expect("mutation"));
            }
            assert_eq!(
                roster.lookup("A1").and_then(|s| s.status_on("2024-01-10")),
                Some(AttendanceStatus::Present)
            );
        }
    }

    #[test]
    fn homework_without_selection_is_rejected_before_lookup() {
        let roster = ana_roster();
        let err = reconcile("Z9", &attendance("2024-01-10"), &roster, Mode::Homework)
            .expect_err("no target");
        assert_eq!(err, CheckinError::NoTargetSelected);
    }

    #[test]
    fn empty_identifier_is_rejected() {
        let roster = ana_roster();
        let err = reconcile("", &attendance("2024-01-10"), &roster, Mode::Attendance)
            .expect_err("empty");
        assert_eq!(err, CheckinError::EmptyIdentifier);
    }

    #[test]
    fn outcomes_carry_the_student_avatar() {
        let mut ana = Student::new("A1", "Ana");
        ana.avatar = Some("avatars/ana.png".to_string());
        ana.completed.insert("HW1".to_string());
        let roster = Roster::new(vec![ana]);

        let recorded = reconcile("A1", &attendance("2024-01-10"), &roster, Mode::Attendance)
            .expect("attendance");
        let done = reconcile("A1", &homework("HW1"), &roster, Mode::Homework).expect("homework");
        for out in [recorded, done] {
            match out {
                Outcome::Recorded { avatar, .. } | Outcome::AlreadyDone { avatar, .. } => {
                    assert_eq!(avatar.as_deref(), Some("avatars/ana.png"))
                }
                other => panic!("unexpected outcome {:?}", other),
            }
        }
    }

    #[test]
    fn manual_toggle_is_an_involution() {
        let mut roster = ana_roster();
        let before = roster.lookup("B2").expect("B2").has_completed("HW1");
        for _ in 0..2 {
            let student = roster.lookup("B2").expect("B2").clone();
            roster.apply(&manual_toggle(&student, "HW1"));
        }
        assert_eq!(roster.lookup("B2").expect("B2").has_completed("HW1"), before);
    }
}
