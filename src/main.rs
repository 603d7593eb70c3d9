mod catalog;
mod config;
mod db;
mod error;
mod gradebook;
mod ipc;
mod logging;
mod model;
mod scheme;
mod scores;
mod session;
mod stats;

use std::io::{self, BufRead, Write};
use tracing::{error, info, warn};

fn main() {
    let config = config::Config::from_env();
    if let Err(e) = logging::init_tracing(&config) {
        eprintln!("gradebookd: logging disabled: {e}");
    }

    let mut state = ipc::AppState::default();
    if let Some(path) = &config.workspace {
        if let Err(e) = ipc::open_workspace(&mut state, path) {
            error!(workspace = %path.to_string_lossy(), "startup workspace failed to open: {e:#}");
        }
    }
    info!(version = env!("CARGO_PKG_VERSION"), "gradebookd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                warn!("stdin closed: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            Err(e) => {
                warn!("unparseable request line: {e}");
                ipc::bad_json(e.to_string())
            }
        };

        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
