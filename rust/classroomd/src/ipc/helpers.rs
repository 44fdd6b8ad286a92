use crate::ipc::error::{err, ok, HandlerErr, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::store;
use chrono::NaiveDate;
use rusqlite::Connection;

pub fn get_required_str(params: &serde_json::Value, key: &str) -> HandlerResult<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> HandlerResult<Option<String>> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be string or null", key))),
    }
}

pub fn get_required_name(params: &serde_json::Value, key: &str) -> HandlerResult<String> {
    let name = get_required_str(params, key)?.trim().to_string();
    if name.is_empty() {
        return Err(HandlerErr::bad_params(format!("{} must not be empty", key)));
    }
    Ok(name)
}

/// Dates travel as `YYYY-MM-DD`; reject anything else so records key consistently.
pub fn parse_date(raw: &str, key: &str) -> HandlerResult<String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| HandlerErr::bad_params(format!("{} must be YYYY-MM-DD", key)))
}

pub fn get_required_date(params: &serde_json::Value, key: &str) -> HandlerResult<String> {
    parse_date(&get_required_str(params, key)?, key)
}

pub fn require_class(conn: &Connection, class_id: &str) -> HandlerResult<()> {
    if !store::class_exists(conn, class_id).map_err(|e| HandlerErr::db("db_query_failed", e))? {
        return Err(HandlerErr::not_found("class not found"));
    }
    Ok(())
}

pub fn require_student(conn: &Connection, class_id: &str, student_id: &str) -> HandlerResult<()> {
    if !store::student_in_class(conn, class_id, student_id)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?
    {
        return Err(HandlerErr::not_found("student not found"));
    }
    Ok(())
}

pub fn require_assignment(
    conn: &Connection,
    class_id: &str,
    assignment_id: &str,
) -> HandlerResult<()> {
    if !store::assignment_in_class(conn, class_id, assignment_id)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?
    {
        return Err(HandlerErr::not_found("assignment not found"));
    }
    Ok(())
}

/// Runs a handler body that only needs the workspace connection.
pub fn with_conn(
    state: &mut AppState,
    req: &Request,
    f: fn(&Connection, &serde_json::Value) -> HandlerResult<serde_json::Value>,
) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_date;

    #[test]
    fn parse_date_normalizes_and_rejects() {
        assert_eq!(parse_date(" 2024-01-10 ", "date").expect("valid"), "2024-01-10");
        assert!(parse_date("2024-02-30", "date").is_err());
        assert!(parse_date("10/01/2024", "date").is_err());
    }
}
