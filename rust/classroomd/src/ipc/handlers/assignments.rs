use crate::ipc::error::{HandlerErr, HandlerResult};
use crate::ipc::helpers::{
    get_optional_str, get_required_name, get_required_str, parse_date, require_assignment,
    require_class, with_conn,
};
use crate::ipc::types::{AppState, Request};
use crate::store;
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn assignments_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> HandlerResult<serde_json::Value> {
    let class_id = get_required_str(params, "classId")?;
    require_class(conn, &class_id)?;
    let rows = store::list_assignments(conn, &class_id)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let assignments: Vec<serde_json::Value> = rows
        .iter()
        .map(|a| {
            json!({
                "id": a.id,
                "title": a.title,
                "dueDate": a.due_date,
                "sortOrder": a.sort_order
            })
        })
        .collect();
    Ok(json!({ "assignments": assignments }))
}

fn assignments_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> HandlerResult<serde_json::Value> {
    let class_id = get_required_str(params, "classId")?;
    let title = get_required_name(params, "title")?;
    let due_date = get_optional_str(params, "dueDate")?
        .map(|d| parse_date(&d, "dueDate"))
        .transpose()?;
    require_class(conn, &class_id)?;

    let next_sort: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM assignments WHERE class_id = ?",
            [&class_id],
            |r| r.get(0),
        )
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let assignment_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO assignments(id, class_id, title, due_date, sort_order) VALUES(?, ?, ?, ?, ?)",
        (&assignment_id, &class_id, &title, &due_date, next_sort),
    )
    .map_err(|e| HandlerErr::db("db_insert_failed", e).with_table("assignments"))?;

    Ok(json!({ "assignmentId": assignment_id, "sortOrder": next_sort }))
}

fn assignments_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> HandlerResult<serde_json::Value> {
    let class_id = get_required_str(params, "classId")?;
    let assignment_id = get_required_str(params, "assignmentId")?;
    require_assignment(conn, &class_id, &assignment_id)?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e))?;
    tx.execute(
        "DELETE FROM assignment_completions WHERE assignment_id = ?",
        [&assignment_id],
    )
    .map_err(|e| HandlerErr::db("db_delete_failed", e).with_table("assignment_completions"))?;
    tx.execute("DELETE FROM assignments WHERE id = ?", [&assignment_id])
        .map_err(|e| HandlerErr::db("db_delete_failed", e).with_table("assignments"))?;
    tx.commit()
        .map_err(|e| HandlerErr::db("db_commit_failed", e))?;
    Ok(json!({ "ok": true }))
}

fn handle_assignments_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let resp = with_conn(state, req, assignments_delete);
    // A homework session targeting the deleted assignment has nothing left to record.
    let deleted = req.params.get("assignmentId").and_then(|v| v.as_str());
    if resp.get("ok").and_then(|v| v.as_bool()) == Some(true)
        && state.session.as_ref().is_some_and(|s| {
            s.context.selected_assignment_id.as_deref() == deleted
        })
    {
        state.session = None;
    }
    resp
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assignments.list" => Some(with_conn(state, req, assignments_list)),
        "assignments.create" => Some(with_conn(state, req, assignments_create)),
        "assignments.delete" => Some(handle_assignments_delete(state, req)),
        _ => None,
    }
}
