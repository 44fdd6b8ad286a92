use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_classroomd");
    let mut child = Command::new(exe)
        .env("CLASSROOMD_LOG_LEVEL", "off")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn classroomd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert!(
            code != "not_implemented" || method == "grades.open",
            "unexpected unknown method for {}",
            method
        );
    }
    value
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("classroomd-router-smoke");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    // Requests before a workspace is selected fail cleanly.
    let early = request(
        &mut stdin,
        &mut reader,
        "0",
        "students.list",
        json!({ "classId": "x" }),
    );
    assert_eq!(
        early
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("no_workspace")
    );

    let _ = request(&mut stdin, &mut reader, "1", "health", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let created = request(
        &mut stdin,
        &mut reader,
        "3",
        "classes.create",
        json!({ "name": "Smoke Class" }),
    );
    let class_id = created
        .get("result")
        .and_then(|v| v.get("classId"))
        .and_then(|v| v.as_str())
        .expect("classId")
        .to_string();

    let _ = request(&mut stdin, &mut reader, "4", "classes.list", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "5",
        "students.create",
        json!({ "classId": class_id, "displayName": "Smoke Student" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "6",
        "students.list",
        json!({ "classId": class_id }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "7",
        "assignments.create",
        json!({ "classId": class_id, "title": "Smoke HW" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "8",
        "assignments.list",
        json!({ "classId": class_id }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "9",
        "attendance.dayOpen",
        json!({ "classId": class_id, "date": "2024-09-03" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "10",
        "attendance.summary",
        json!({ "classId": class_id }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "11",
        "homework.open",
        json!({ "classId": class_id }),
    );
    let _ = request(&mut stdin, &mut reader, "12", "setup.get", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "13",
        "checkin.open",
        json!({ "classId": class_id, "mode": "homework" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "14",
        "checkin.scan",
        json!({ "identifier": "nobody" }),
    );
    let _ = request(&mut stdin, &mut reader, "15", "checkin.status", json!({}));
    let _ = request(&mut stdin, &mut reader, "16", "checkin.close", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "17",
        "classes.delete",
        json!({ "classId": class_id }),
    );

    let unknown = request(&mut stdin, &mut reader, "18", "grades.open", json!({}));
    assert_eq!(
        unknown
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("not_implemented")
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
