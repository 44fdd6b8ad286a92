use crate::ipc::error::{HandlerErr, HandlerResult};
use crate::ipc::helpers::{
    get_optional_str, get_required_name, get_required_str, require_class, require_student,
    with_conn,
};
use crate::ipc::types::{AppState, Request};
use crate::store;
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn student_json(s: &store::StudentRow) -> serde_json::Value {
    json!({
        "id": s.id,
        "displayName": s.display_name,
        "avatar": s.avatar,
        "active": s.active,
        "sortOrder": s.sort_order
    })
}

fn students_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> HandlerResult<serde_json::Value> {
    let class_id = get_required_str(params, "classId")?;
    require_class(conn, &class_id)?;
    let include_inactive = params
        .get("includeInactive")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);
    let students = store::list_students(conn, &class_id, include_inactive)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    Ok(json!({
        "students": students.iter().map(student_json).collect::<Vec<_>>()
    }))
}

fn students_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> HandlerResult<serde_json::Value> {
    let class_id = get_required_str(params, "classId")?;
    let display_name = get_required_name(params, "displayName")?;
    let avatar = get_optional_str(params, "avatar")?;
    let active = params.get("active").and_then(|v| v.as_bool()).unwrap_or(true);
    require_class(conn, &class_id)?;

    // Badge codes are printed on cards, so callers may pin the id.
    let student_id = match get_optional_str(params, "studentId")? {
        Some(id) if id.is_empty() => {
            return Err(HandlerErr::bad_params("studentId must not be empty"));
        }
        Some(id) => id,
        None => Uuid::new_v4().to_string(),
    };

    let next_sort: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM students WHERE class_id = ?",
            [&class_id],
            |r| r.get(0),
        )
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;

    conn.execute(
        "INSERT INTO students(id, class_id, display_name, avatar, active, sort_order, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &student_id,
            &class_id,
            &display_name,
            &avatar,
            active as i64,
            next_sort,
            store::now_stamp(),
        ),
    )
    .map_err(|e| match e.sqlite_error_code() {
        Some(rusqlite::ErrorCode::ConstraintViolation) => {
            HandlerErr::new("conflict", "studentId already in use")
        }
        _ => HandlerErr::db("db_insert_failed", e).with_table("students"),
    })?;

    Ok(json!({ "studentId": student_id, "sortOrder": next_sort }))
}

fn students_update(
    conn: &Connection,
    params: &serde_json::Value,
) -> HandlerResult<serde_json::Value> {
    let class_id = get_required_str(params, "classId")?;
    let student_id = get_required_str(params, "studentId")?;
    let Some(patch) = params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("patch must be an object"));
    };
    require_student(conn, &class_id, &student_id)?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e))?;
    for (k, v) in patch {
        let res = match k.as_str() {
            "displayName" => {
                let name = v
                    .as_str()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        HandlerErr::bad_params("displayName must be a non-empty string")
                    })?;
                tx.execute(
                    "UPDATE students SET display_name = ? WHERE id = ?",
                    (&name, &student_id),
                )
            }
            "avatar" => {
                if !v.is_null() && !v.is_string() {
                    return Err(HandlerErr::bad_params("avatar must be string or null"));
                }
                tx.execute(
                    "UPDATE students SET avatar = ? WHERE id = ?",
                    (v.as_str(), &student_id),
                )
            }
            "active" => {
                let active = v
                    .as_bool()
                    .ok_or_else(|| HandlerErr::bad_params("active must be boolean"))?;
                tx.execute(
                    "UPDATE students SET active = ? WHERE id = ?",
                    (active as i64, &student_id),
                )
            }
            other => {
                return Err(HandlerErr::bad_params(format!(
                    "unknown student field: {}",
                    other
                )))
            }
        };
        res.map_err(|e| HandlerErr::db("db_update_failed", e).with_table("students"))?;
    }
    tx.execute(
        "UPDATE students SET updated_at = ? WHERE id = ?",
        (store::now_stamp(), &student_id),
    )
    .map_err(|e| HandlerErr::db("db_update_failed", e).with_table("students"))?;
    tx.commit()
        .map_err(|e| HandlerErr::db("db_commit_failed", e))?;
    Ok(json!({ "ok": true }))
}

fn students_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> HandlerResult<serde_json::Value> {
    let class_id = get_required_str(params, "classId")?;
    let student_id = get_required_str(params, "studentId")?;
    require_student(conn, &class_id, &student_id)?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e))?;
    for (table, sql) in [
        (
            "assignment_completions",
            "DELETE FROM assignment_completions WHERE student_id = ?",
        ),
        (
            "attendance_records",
            "DELETE FROM attendance_records WHERE student_id = ?",
        ),
        ("students", "DELETE FROM students WHERE id = ?"),
    ] {
        tx.execute(sql, [&student_id])
            .map_err(|e| HandlerErr::db("db_delete_failed", e).with_table(table))?;
    }
    tx.commit()
        .map_err(|e| HandlerErr::db("db_commit_failed", e))?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(with_conn(state, req, students_list)),
        "students.create" => Some(with_conn(state, req, students_create)),
        "students.update" => Some(with_conn(state, req, students_update)),
        "students.delete" => Some(with_conn(state, req, students_delete)),
        _ => None,
    }
}
