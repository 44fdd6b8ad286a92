mod checkin;
mod cue;
mod db;
mod feedback;
mod ipc;
mod logging;
mod session;
mod store;

use log::{info, warn};
use std::io::{self, BufRead, Write};

fn main() {
    if let Err(e) = logging::init_from_env() {
        // Logging is optional; the protocol channel must still come up.
        eprintln!("classroomd: logging disabled: {}", e);
    }

    let mut state = ipc::AppState::default();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                warn!("event=stdin_read module=main status=error error={}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to echo back.
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    // Release the scan session before the process exits.
    state.session = None;
    info!("event=app_stop module=main status=ok");
}
