use super::setup::load_checkin_settings;
use crate::checkin::{CheckinContext, CheckinError, Mode, Mutation, Outcome};
use crate::cue::{CuePlayer, TerminalBell};
use crate::ipc::error::{err, ok, HandlerErr, HandlerResult};
use crate::ipc::helpers::{
    get_optional_str, get_required_str, parse_date, require_assignment, require_class,
};
use crate::ipc::types::{AppState, Request};
use crate::session::ScanSession;
use crate::store;
use log::{info, warn};
use rusqlite::Connection;
use serde_json::json;
use std::time::Instant;

fn checkin_err(e: CheckinError) -> HandlerErr {
    match e {
        CheckinError::NoTargetSelected => HandlerErr::new("no_target_selected", e.to_string()),
        CheckinError::EmptyIdentifier => HandlerErr::bad_params(e.to_string()),
    }
}

fn mutation_json(m: &Mutation) -> serde_json::Value {
    match m {
        Mutation::Attendance {
            student_id,
            date,
            status,
        } => json!({
            "kind": m.kind(),
            "studentId": student_id,
            "date": date,
            "status": status.as_str()
        }),
        Mutation::Assignment {
            student_id,
            assignment_id,
            complete,
        } => json!({
            "kind": m.kind(),
            "studentId": student_id,
            "assignmentId": assignment_id,
            "complete": complete
        }),
    }
}

fn outcome_json(outcome: &Outcome) -> serde_json::Value {
    match outcome {
        Outcome::Unknown { identifier } => json!({
            "outcome": outcome.kind(),
            "identifier": identifier,
            "mutation": null
        }),
        Outcome::AlreadyDone {
            student_id,
            display_name,
            avatar,
        } => json!({
            "outcome": outcome.kind(),
            "studentId": student_id,
            "displayName": display_name,
            "avatar": avatar,
            "mutation": null
        }),
        Outcome::Recorded {
            student_id,
            display_name,
            avatar,
            mutation,
        } => json!({
            "outcome": outcome.kind(),
            "studentId": student_id,
            "displayName": display_name,
            "avatar": avatar,
            "mutation": mutation_json(mutation)
        }),
    }
}

fn open_session(conn: &Connection, params: &serde_json::Value) -> HandlerResult<ScanSession> {
    let class_id = get_required_str(params, "classId")?;
    let mode_raw = get_required_str(params, "mode")?;
    let Some(mode) = Mode::parse(&mode_raw) else {
        return Err(HandlerErr::bad_params("mode must be attendance or homework"));
    };
    require_class(conn, &class_id)?;

    let selected_date = match get_optional_str(params, "date")? {
        Some(d) => parse_date(&d, "date")?,
        None => chrono::Local::now().date_naive().format("%Y-%m-%d").to_string(),
    };
    let selected_assignment_id = match mode {
        Mode::Attendance => None,
        Mode::Homework => match get_optional_str(params, "assignmentId")? {
            Some(id) => {
                require_assignment(conn, &class_id, &id)?;
                Some(id)
            }
            None => store::first_assignment_id(conn, &class_id)
                .map_err(|e| HandlerErr::db("db_query_failed", e))?,
        },
    };

    let settings =
        load_checkin_settings(conn).map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let cue: Option<Box<dyn CuePlayer>> = if settings.cue_enabled {
        Some(Box::new(TerminalBell))
    } else {
        None
    };

    ScanSession::open(
        class_id,
        mode,
        CheckinContext {
            selected_date,
            selected_assignment_id,
        },
        settings.windows,
        cue,
    )
    .map_err(checkin_err)
}

fn handle_checkin_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    // Re-entering scan mode releases the previous sensor subscription first.
    state.session = None;
    match open_session(conn, &req.params) {
        Ok(session) => {
            let result = json!({ "session": session.to_json() });
            state.session = Some(session);
            ok(&req.id, result)
        }
        Err(error) => error.response(&req.id),
    }
}

fn handle_checkin_scan(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(session) = state.session.as_mut() else {
        return err(&req.id, "no_session", "open a check-in session first", None);
    };
    let identifier = match get_required_str(&req.params, "identifier") {
        Ok(v) => v,
        Err(error) => return error.response(&req.id),
    };

    let roster = match store::load_roster(
        conn,
        &session.class_id,
        &session.context.selected_date,
        session.context.selected_assignment_id.as_deref(),
    ) {
        Ok(r) => r,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let now = Instant::now();
    let outcome = match session.scan(&identifier, &roster, now) {
        Ok(o) => o,
        Err(e) => return checkin_err(e).response(&req.id),
    };

    if let Some(mutation) = outcome.mutation() {
        // Optimistic: the banner already says success; a failed write is logged
        // and reported but does not retract the outcome.
        if let Err(e) = store::apply_mutation(conn, &session.class_id, mutation) {
            warn!(
                "event=checkin_apply module=checkin status=error kind={} error={}",
                mutation.kind(),
                e
            );
            return err(
                &req.id,
                "db_update_failed",
                e.to_string(),
                Some(json!({ "outcome": outcome_json(&outcome) })),
            );
        }
        info!(
            "event=checkin_apply module=checkin status=ok kind={}",
            mutation.kind()
        );
    }

    let mut result = outcome_json(&outcome);
    result["feedback"] = session
        .feedback(now)
        .map(|f| f.to_json(now))
        .unwrap_or(serde_json::Value::Null);
    ok(&req.id, result)
}

fn handle_checkin_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(session) = state.session.as_mut() else {
        return ok(&req.id, json!({ "session": null, "feedback": null }));
    };
    let now = Instant::now();
    let feedback = session
        .feedback(now)
        .map(|f| f.to_json(now))
        .unwrap_or(serde_json::Value::Null);
    ok(
        &req.id,
        json!({ "session": session.to_json(), "feedback": feedback }),
    )
}

fn handle_checkin_close(state: &mut AppState, req: &Request) -> serde_json::Value {
    match state.session.take() {
        Some(session) => {
            let scans = session.scans();
            drop(session);
            ok(&req.id, json!({ "closed": true, "scans": scans }))
        }
        None => ok(&req.id, json!({ "closed": false, "scans": 0 })),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "checkin.open" => Some(handle_checkin_open(state, req)),
        "checkin.scan" => Some(handle_checkin_scan(state, req)),
        "checkin.status" => Some(handle_checkin_status(state, req)),
        "checkin.close" => Some(handle_checkin_close(state, req)),
        _ => None,
    }
}
