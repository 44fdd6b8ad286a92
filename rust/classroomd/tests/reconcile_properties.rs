#[path = "../src/checkin.rs"]
mod checkin;

use checkin::{
    manual_toggle, reconcile, AttendanceStatus, CheckinContext, Mode, Mutation, Outcome, Roster,
    Student,
};

fn classroom() -> Roster {
    let mut late = Student::new("C3", "Chidi");
    late.attendance
        .insert("2024-01-10".to_string(), AttendanceStatus::Late);
    let mut done = Student::new("D4", "Dana");
    done.completed.insert("HW1".to_string());
    Roster::new(vec![
        Student::new("A1", "Ana"),
        Student::new("B2", "Bruno"),
        late,
        done,
    ])
}

fn ctx(date: &str, assignment: Option<&str>) -> CheckinContext {
    CheckinContext {
        selected_date: date.to_string(),
        selected_assignment_id: assignment.map(|a| a.to_string()),
    }
}

#[test]
fn identifiers_not_on_roster_are_unknown_in_every_mode() {
    let roster = classroom();
    for id in ["Z9", "a1", "A1 ", " A1", "A", "A10", "d4", "🎒"] {
        for mode in [Mode::Attendance, Mode::Homework] {
            let out = reconcile(id, &ctx("2024-01-10", Some("HW1")), &roster, mode)
                .expect("reconcile");
            assert_eq!(
                out,
                Outcome::Unknown {
                    identifier: id.to_string()
                },
                "{} in {:?}",
                id,
                mode
            );
        }
    }
}

#[test]
fn completed_students_are_already_done_for_that_assignment_only() {
    let roster = classroom();
    let out = reconcile("D4", &ctx("2024-01-10", Some("HW1")), &roster, Mode::Homework)
        .expect("reconcile");
    assert_eq!(out.kind(), "already_done");
    assert!(out.mutation().is_none());

    let other = reconcile("D4", &ctx("2024-01-10", Some("HW2")), &roster, Mode::Homework)
        .expect("reconcile");
    assert_eq!(
        other.mutation(),
        Some(&Mutation::Assignment {
            student_id: "D4".to_string(),
            assignment_id: "HW2".to_string(),
            complete: true,
        })
    );
}

#[test]
fn attendance_scans_converge_on_present_for_every_student() {
    let mut roster = classroom();
    let ids: Vec<String> = roster.students().iter().map(|s| s.id.clone()).collect();
    for round in 0..3 {
        for id in &ids {
            let out = reconcile(id, &ctx("2024-01-10", None), &roster, Mode::Attendance)
                .expect("reconcile");
            let mutation = out.mutation().cloned().expect("attendance always records");
            assert!(roster.apply(&mutation), "round {} {}", round, id);
        }
    }
    for s in roster.students() {
        assert_eq!(s.status_on("2024-01-10"), Some(AttendanceStatus::Present));
    }
}

#[test]
fn attendance_scan_ignores_assignment_selection() {
    let roster = classroom();
    let out = reconcile("D4", &ctx("2024-01-10", Some("HW1")), &roster, Mode::Attendance)
        .expect("reconcile");
    assert_eq!(out.mutation().map(|m| m.kind()), Some("attendance"));
}

#[test]
fn manual_toggle_twice_restores_every_pair() {
    let mut roster = classroom();
    let ids: Vec<String> = roster.students().iter().map(|s| s.id.clone()).collect();
    for id in &ids {
        for assignment in ["HW1", "HW2"] {
            let before = roster.lookup(id).expect("student").has_completed(assignment);
            for _ in 0..2 {
                let student = roster.lookup(id).expect("student").clone();
                roster.apply(&manual_toggle(&student, assignment));
            }
            assert_eq!(
                roster.lookup(id).expect("student").has_completed(assignment),
                before
            );
        }
    }
}

#[test]
fn duplicate_ids_resolve_to_first_roster_entry() {
    let roster = Roster::new(vec![Student::new("A1", "Ana"), Student::new("A1", "Other")]);
    let out = reconcile("A1", &ctx("2024-01-10", None), &roster, Mode::Attendance)
        .expect("reconcile");
    match out {
        Outcome::Recorded { display_name, .. } => assert_eq!(display_name, "Ana"),
        other => panic!("unexpected outcome {:?}", other),
    }
}
