use crate::checkin::{manual_toggle, Mutation, Student};
use crate::ipc::error::{HandlerErr, HandlerResult};
use crate::ipc::helpers::{
    get_optional_str, get_required_str, require_assignment, require_class, require_student,
    with_conn,
};
use crate::ipc::types::{AppState, Request};
use crate::store;
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashSet;

fn homework_open(
    conn: &Connection,
    params: &serde_json::Value,
) -> HandlerResult<serde_json::Value> {
    let class_id = get_required_str(params, "classId")?;
    require_class(conn, &class_id)?;

    let assignment_id = match get_optional_str(params, "assignmentId")? {
        Some(id) => {
            require_assignment(conn, &class_id, &id)?;
            Some(id)
        }
        None => store::first_assignment_id(conn, &class_id)
            .map_err(|e| HandlerErr::db("db_query_failed", e))?,
    };
    let Some(assignment_id) = assignment_id else {
        return Ok(json!({ "assignmentId": null, "rows": [], "completedCount": 0 }));
    };

    let students = store::list_students(conn, &class_id, false)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let done: HashSet<String> = store::completed_students(conn, &assignment_id)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?
        .into_iter()
        .collect();

    let rows: Vec<serde_json::Value> = students
        .iter()
        .map(|s| {
            json!({
                "studentId": s.id,
                "displayName": s.display_name,
                "avatar": s.avatar,
                "completed": done.contains(&s.id)
            })
        })
        .collect();
    let completed_count = students.iter().filter(|s| done.contains(&s.id)).count();
    Ok(json!({
        "assignmentId": assignment_id,
        "rows": rows,
        "completedCount": completed_count,
        "studentCount": students.len()
    }))
}

fn homework_toggle(
    conn: &Connection,
    params: &serde_json::Value,
) -> HandlerResult<serde_json::Value> {
    let class_id = get_required_str(params, "classId")?;
    let assignment_id = get_required_str(params, "assignmentId")?;
    let student_id = get_required_str(params, "studentId")?;
    require_assignment(conn, &class_id, &assignment_id)?;
    require_student(conn, &class_id, &student_id)?;

    let mut student = Student::new(student_id.as_str(), "");
    if store::is_completed(conn, &assignment_id, &student_id)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?
    {
        student.completed.insert(assignment_id.clone());
    }
    let mutation = manual_toggle(&student, &assignment_id);
    store::apply_mutation(conn, &class_id, &mutation)
        .map_err(|e| HandlerErr::db("db_update_failed", e).with_table("assignment_completions"))?;

    let completed = matches!(mutation, Mutation::Assignment { complete: true, .. });
    Ok(json!({ "studentId": student_id, "completed": completed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "homework.open" => Some(with_conn(state, req, homework_open)),
        "homework.toggle" => Some(with_conn(state, req, homework_toggle)),
        _ => None,
    }
}
