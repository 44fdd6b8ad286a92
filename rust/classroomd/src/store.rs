//! Roster reads and mutation writes against the workspace database.

use crate::checkin::{AttendanceStatus, Mutation, Roster, Student};
use rusqlite::{Connection, OptionalExtension};

#[derive(Debug, Clone)]
pub struct AssignmentRow {
    pub id: String,
    pub title: String,
    pub due_date: Option<String>,
    pub sort_order: i64,
}

#[derive(Debug, Clone)]
pub struct StudentRow {
    pub id: String,
    pub display_name: String,
    pub avatar: Option<String>,
    pub active: bool,
    pub sort_order: i64,
}

pub fn now_stamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub fn class_exists(conn: &Connection, class_id: &str) -> rusqlite::Result<bool> {
    conn.query_row("SELECT 1 FROM classes WHERE id = ?", [class_id], |r| {
        r.get::<_, i64>(0)
    })
    .optional()
    .map(|v| v.is_some())
}

pub fn student_in_class(
    conn: &Connection,
    class_id: &str,
    student_id: &str,
) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM students WHERE class_id = ? AND id = ?",
        (class_id, student_id),
        |r| r.get::<_, i64>(0),
    )
    .optional()
    .map(|v| v.is_some())
}

pub fn assignment_in_class(
    conn: &Connection,
    class_id: &str,
    assignment_id: &str,
) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM assignments WHERE class_id = ? AND id = ?",
        (class_id, assignment_id),
        |r| r.get::<_, i64>(0),
    )
    .optional()
    .map(|v| v.is_some())
}

pub fn list_students(
    conn: &Connection,
    class_id: &str,
    include_inactive: bool,
) -> rusqlite::Result<Vec<StudentRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, display_name, avatar, active, sort_order
         FROM students
         WHERE class_id = ? AND (active = 1 OR ?)
         ORDER BY sort_order",
    )?;
    stmt.query_map((class_id, include_inactive), |r| {
        Ok(StudentRow {
            id: r.get(0)?,
            display_name: r.get(1)?,
            avatar: r.get(2)?,
            active: r.get::<_, i64>(3)? != 0,
            sort_order: r.get(4)?,
        })
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
}

pub fn list_assignments(conn: &Connection, class_id: &str) -> rusqlite::Result<Vec<AssignmentRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, due_date, sort_order
         FROM assignments
         WHERE class_id = ?
         ORDER BY sort_order",
    )?;
    stmt.query_map([class_id], |r| {
        Ok(AssignmentRow {
            id: r.get(0)?,
            title: r.get(1)?,
            due_date: r.get(2)?,
            sort_order: r.get(3)?,
        })
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
}

pub fn first_assignment_id(conn: &Connection, class_id: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT id FROM assignments WHERE class_id = ? ORDER BY sort_order LIMIT 1",
        [class_id],
        |r| r.get(0),
    )
    .optional()
}

pub fn attendance_on(
    conn: &Connection,
    class_id: &str,
    date: &str,
) -> rusqlite::Result<Vec<(String, AttendanceStatus)>> {
    let mut stmt = conn.prepare(
        "SELECT student_id, status FROM attendance_records WHERE class_id = ? AND date = ?",
    )?;
    let rows = stmt
        .query_map((class_id, date), |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    // Unrecognized codes are treated as unset.
    Ok(rows
        .into_iter()
        .filter_map(|(sid, code)| AttendanceStatus::parse(&code).map(|s| (sid, s)))
        .collect())
}

pub fn completed_students(conn: &Connection, assignment_id: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT student_id FROM assignment_completions WHERE assignment_id = ?")?;
    stmt.query_map([assignment_id], |r| r.get(0))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
}

/// Builds the snapshot a scan is reconciled against: active students in
/// roster order, with the selected date's attendance and the selected
/// assignment's completions filled in.
pub fn load_roster(
    conn: &Connection,
    class_id: &str,
    date: &str,
    assignment_id: Option<&str>,
) -> rusqlite::Result<Roster> {
    let mut students: Vec<Student> = list_students(conn, class_id, false)?
        .into_iter()
        .map(|row| Student {
            id: row.id,
            display_name: row.display_name,
            avatar: row.avatar,
            ..Student::default()
        })
        .collect();

    for (sid, status) in attendance_on(conn, class_id, date)? {
        if let Some(s) = students.iter_mut().find(|s| s.id == sid) {
            s.attendance.insert(date.to_string(), status);
        }
    }
    if let Some(aid) = assignment_id {
        for sid in completed_students(conn, aid)? {
            if let Some(s) = students.iter_mut().find(|s| s.id == sid) {
                s.completed.insert(aid.to_string());
            }
        }
    }
    Ok(Roster::new(students))
}

pub fn set_attendance(
    conn: &Connection,
    class_id: &str,
    student_id: &str,
    date: &str,
    status: Option<AttendanceStatus>,
) -> rusqlite::Result<()> {
    match status {
        Some(status) => {
            conn.execute(
                "INSERT INTO attendance_records(class_id, student_id, date, status, updated_at)
                 VALUES(?, ?, ?, ?, ?)
                 ON CONFLICT(class_id, student_id, date) DO UPDATE SET
                   status = excluded.status,
                   updated_at = excluded.updated_at",
                (class_id, student_id, date, status.as_str(), now_stamp()),
            )?;
        }
        None => {
            conn.execute(
                "DELETE FROM attendance_records WHERE class_id = ? AND student_id = ? AND date = ?",
                (class_id, student_id, date),
            )?;
        }
    }
    Ok(())
}

pub fn set_completion(
    conn: &Connection,
    assignment_id: &str,
    student_id: &str,
    complete: bool,
) -> rusqlite::Result<()> {
    if complete {
        conn.execute(
            "INSERT INTO assignment_completions(assignment_id, student_id, completed_at)
             VALUES(?, ?, ?)
             ON CONFLICT(assignment_id, student_id) DO NOTHING",
            (assignment_id, student_id, now_stamp()),
        )?;
    } else {
        conn.execute(
            "DELETE FROM assignment_completions WHERE assignment_id = ? AND student_id = ?",
            (assignment_id, student_id),
        )?;
    }
    Ok(())
}

pub fn is_completed(
    conn: &Connection,
    assignment_id: &str,
    student_id: &str,
) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM assignment_completions WHERE assignment_id = ? AND student_id = ?",
        (assignment_id, student_id),
        |r| r.get::<_, i64>(0),
    )
    .optional()
    .map(|v| v.is_some())
}

/// Persists a reconciler mutation.
pub fn apply_mutation(
    conn: &Connection,
    class_id: &str,
    mutation: &Mutation,
) -> rusqlite::Result<()> {
    match mutation {
        Mutation::Attendance {
            student_id,
            date,
            status,
        } => set_attendance(conn, class_id, student_id, date, Some(*status)),
        Mutation::Assignment {
            student_id,
            assignment_id,
            complete,
        } => set_completion(conn, assignment_id, student_id, *complete),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkin::{reconcile, CheckinContext, Mode};

    fn seeded() -> Connection {
        let conn = Connection::open_in_memory().expect("open");
        conn.execute_batch(
            "CREATE TABLE classes(id TEXT PRIMARY KEY, name TEXT NOT NULL);
             CREATE TABLE students(id TEXT PRIMARY KEY, class_id TEXT NOT NULL,
               display_name TEXT NOT NULL, avatar TEXT, active INTEGER NOT NULL,
               sort_order INTEGER NOT NULL, updated_at TEXT);
             CREATE TABLE assignments(id TEXT PRIMARY KEY, class_id TEXT NOT NULL,
               title TEXT NOT NULL, due_date TEXT, sort_order INTEGER NOT NULL);
             CREATE TABLE attendance_records(class_id TEXT NOT NULL, student_id TEXT NOT NULL,
               date TEXT NOT NULL, status TEXT NOT NULL, updated_at TEXT,
               PRIMARY KEY(class_id, student_id, date));
             CREATE TABLE assignment_completions(assignment_id TEXT NOT NULL,
               student_id TEXT NOT NULL, completed_at TEXT,
               PRIMARY KEY(assignment_id, student_id));
             INSERT INTO classes VALUES('c1', '7B');
             INSERT INTO students VALUES('A1', 'c1', 'Ana', NULL, 1, 0, NULL);
             INSERT INTO students VALUES('B2', 'c1', 'Bruno', NULL, 0, 1, NULL);
             INSERT INTO assignments VALUES('HW1', 'c1', 'Fractions', '2024-01-12', 0);",
        )
        .expect("seed");
        conn
    }

    #[test]
    fn roster_snapshot_skips_inactive_students() {
        let conn = seeded();
        let roster = load_roster(&conn, "c1", "2024-01-10", None).expect("roster");
        assert_eq!(roster.len(), 1);
        assert!(roster.lookup("B2").is_none());
    }

    #[test]
    fn attendance_mutation_overwrites_absent() {
        let conn = seeded();
        set_attendance(&conn, "c1", "A1", "2024-01-10", Some(AttendanceStatus::Absent))
            .expect("absent");
        let ctx = CheckinContext {
            selected_date: "2024-01-10".to_string(),
            selected_assignment_id: None,
        };
        let roster = load_roster(&conn, "c1", "2024-01-10", None).expect("roster");
        let out = reconcile("A1", &ctx, &roster, Mode::Attendance).expect("reconcile");
        apply_mutation(&conn, "c1", out.mutation().expect("mutation")).expect("apply");

        let after = attendance_on(&conn, "c1", "2024-01-10").expect("read");
        assert_eq!(after, vec![("A1".to_string(), AttendanceStatus::Present)]);
    }

    #[test]
    fn completion_write_is_idempotent() {
        let conn = seeded();
        set_completion(&conn, "HW1", "A1", true).expect("first");
        set_completion(&conn, "HW1", "A1", true).expect("second");
        assert_eq!(completed_students(&conn, "HW1").expect("read"), vec!["A1"]);
        set_completion(&conn, "HW1", "A1", false).expect("undo");
        assert!(!is_completed(&conn, "HW1", "A1").expect("read"));
    }
}
