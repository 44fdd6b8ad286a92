use crate::checkin::AttendanceStatus;
use crate::ipc::error::{HandlerErr, HandlerResult};
use crate::ipc::helpers::{
    get_optional_str, get_required_date, get_required_str, parse_date, require_class,
    require_student, with_conn,
};
use crate::ipc::types::{AppState, Request};
use crate::store;
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashMap;

/// `null` or an empty string clears the day.
fn parse_optional_status(v: Option<&serde_json::Value>) -> HandlerResult<Option<AttendanceStatus>> {
    let Some(v) = v else { return Ok(None) };
    if v.is_null() {
        return Ok(None);
    }
    let Some(s) = v.as_str() else {
        return Err(HandlerErr::bad_params("status must be string or null"));
    };
    let t = s.trim();
    if t.is_empty() {
        return Ok(None);
    }
    AttendanceStatus::parse(t)
        .map(Some)
        .ok_or_else(|| HandlerErr::bad_params("status must be one of: present, absent, late"))
}

fn attendance_day_open(
    conn: &Connection,
    params: &serde_json::Value,
) -> HandlerResult<serde_json::Value> {
    let class_id = get_required_str(params, "classId")?;
    let date = get_required_date(params, "date")?;
    require_class(conn, &class_id)?;

    let students = store::list_students(conn, &class_id, false)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let by_student: HashMap<String, AttendanceStatus> = store::attendance_on(conn, &class_id, &date)
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
                "status": by_student.get(&s.id).map(|st| st.as_str())
            })
        })
        .collect();
    Ok(json!({ "date": date, "rows": rows }))
}

fn attendance_set_status(
    conn: &Connection,
    params: &serde_json::Value,
) -> HandlerResult<serde_json::Value> {
    let class_id = get_required_str(params, "classId")?;
    let student_id = get_required_str(params, "studentId")?;
    let date = get_required_date(params, "date")?;
    let status = parse_optional_status(params.get("status"))?;
    require_student(conn, &class_id, &student_id)?;

    store::set_attendance(conn, &class_id, &student_id, &date, status)
        .map_err(|e| HandlerErr::db("db_update_failed", e).with_table("attendance_records"))?;
    Ok(json!({ "ok": true }))
}

fn attendance_bulk_stamp(
    conn: &Connection,
    params: &serde_json::Value,
) -> HandlerResult<serde_json::Value> {
    let class_id = get_required_str(params, "classId")?;
    let date = get_required_date(params, "date")?;
    let status = parse_optional_status(params.get("status"))?;
    let Some(student_ids_json) = params.get("studentIds").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing studentIds"));
    };
    let student_ids: Vec<String> = student_ids_json
        .iter()
        .filter_map(|v| v.as_str().map(|s| s.to_string()))
        .collect();
    require_class(conn, &class_id)?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e))?;
    let mut stamped = 0usize;
    for student_id in student_ids {
        let exists = store::student_in_class(&tx, &class_id, &student_id)
            .map_err(|e| HandlerErr::db("db_query_failed", e))?;
        if !exists {
            continue;
        }
        store::set_attendance(&tx, &class_id, &student_id, &date, status)
            .map_err(|e| HandlerErr::db("db_update_failed", e).with_table("attendance_records"))?;
        stamped += 1;
    }
    tx.commit()
        .map_err(|e| HandlerErr::db("db_commit_failed", e))?;
    Ok(json!({ "stamped": stamped }))
}

fn attendance_summary(
    conn: &Connection,
    params: &serde_json::Value,
) -> HandlerResult<serde_json::Value> {
    let class_id = get_required_str(params, "classId")?;
    let from = get_optional_str(params, "from")?
        .map(|d| parse_date(&d, "from"))
        .transpose()?;
    let to = get_optional_str(params, "to")?
        .map(|d| parse_date(&d, "to"))
        .transpose()?;
    require_class(conn, &class_id)?;

    let students = store::list_students(conn, &class_id, false)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;

    // ISO dates compare correctly as text.
    let mut stmt = conn
        .prepare(
            "SELECT student_id, status, COUNT(*)
             FROM attendance_records
             WHERE class_id = ?
               AND (? IS NULL OR date >= ?)
               AND (? IS NULL OR date <= ?)
             GROUP BY student_id, status",
        )
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let counts = stmt
        .query_map((&class_id, &from, &from, &to, &to), |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, i64>(2)?,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;

    let mut by_student: HashMap<String, [i64; 3]> = HashMap::new();
    for (sid, code, n) in counts {
        let slot = match AttendanceStatus::parse(&code) {
            Some(AttendanceStatus::Present) => 0,
            Some(AttendanceStatus::Absent) => 1,
            Some(AttendanceStatus::Late) => 2,
            None => continue,
        };
        by_student.entry(sid).or_default()[slot] += n;
    }

    let rows: Vec<serde_json::Value> = students
        .iter()
        .map(|s| {
            let [present, absent, late] = by_student.get(&s.id).copied().unwrap_or_default();
            json!({
                "studentId": s.id,
                "displayName": s.display_name,
                "present": present,
                "absent": absent,
                "late": late
            })
        })
        .collect();
    Ok(json!({ "from": from, "to": to, "rows": rows }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.dayOpen" => Some(with_conn(state, req, attendance_day_open)),
        "attendance.setStatus" => Some(with_conn(state, req, attendance_set_status)),
        "attendance.bulkStamp" => Some(with_conn(state, req, attendance_bulk_stamp)),
        "attendance.summary" => Some(with_conn(state, req, attendance_summary)),
        _ => None,
    }
}
