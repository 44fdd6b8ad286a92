use crate::db;
use crate::feedback::FeedbackWindows;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use log::warn;
use serde_json::{json, Map, Value};
use std::time::Duration;

#[derive(Clone, Copy)]
enum SetupSection {
    Checkin,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "checkin" => Some(Self::Checkin),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Checkin => "setup.checkin",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Checkin => {
            let w = FeedbackWindows::default();
            json!({
                "attendanceUnknownMs": w.attendance_unknown.as_millis() as u64,
                "homeworkUnknownMs": w.homework_unknown.as_millis() as u64,
                "homeworkAckMs": w.homework_ack.as_millis() as u64,
                "attendanceAckMs": w.attendance_ack.as_millis() as u64,
                "cueEnabled": true
            })
        }
    }
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool()
        .ok_or_else(|| format!("{} must be a boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let Some(n) = v.as_i64() else {
        return Err(format!("{} must be an integer", key));
    };
    if n < min || n > max {
        return Err(format!("{} must be between {} and {}", key, min, max));
    }
    Ok(n)
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let Some(obj) = current.as_object_mut() else {
        return Err("section is not an object".into());
    };
    for (k, v) in patch {
        match section {
            SetupSection::Checkin => match k.as_str() {
                "attendanceUnknownMs" | "homeworkUnknownMs" | "homeworkAckMs"
                | "attendanceAckMs" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 0, 60_000)?));
                }
                "cueEnabled" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown checkin field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    let saved = match db::settings_get_json(conn, section.key()) {
        Ok(saved) => saved,
        // Unparseable stored text counts as unset; storage errors still propagate.
        Err(e) if e.downcast_ref::<serde_json::Error>().is_some() => {
            warn!(
                "event=settings_load module=setup status=fallback key={} error={:#}",
                section.key(),
                e
            );
            None
        }
        Err(e) => return Err(e),
    };
    if let Some(saved_obj) = saved.as_ref().and_then(|v| v.as_object()) {
        // Malformed historical values fall back to defaults.
        let _ = merge_section_patch(section, &mut current, saved_obj);
    }
    Ok(current)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckinSettings {
    pub windows: FeedbackWindows,
    pub cue_enabled: bool,
}

pub fn load_checkin_settings(conn: &rusqlite::Connection) -> anyhow::Result<CheckinSettings> {
    let section = load_section(conn, SetupSection::Checkin)?;
    let defaults = FeedbackWindows::default();
    let ms = |key: &str, fallback: Duration| {
        section
            .get(key)
            .and_then(|v| v.as_u64())
            .map(Duration::from_millis)
            .unwrap_or(fallback)
    };
    Ok(CheckinSettings {
        windows: FeedbackWindows {
            attendance_unknown: ms("attendanceUnknownMs", defaults.attendance_unknown),
            homework_unknown: ms("homeworkUnknownMs", defaults.homework_unknown),
            homework_ack: ms("homeworkAckMs", defaults.homework_ack),
            attendance_ack: ms("attendanceAckMs", defaults.attendance_ack),
        },
        cue_enabled: section
            .get("cueEnabled")
            .and_then(|v| v.as_bool())
            .unwrap_or(true),
    })
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let checkin = match load_section(conn, SetupSection::Checkin) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "checkin": checkin }))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
