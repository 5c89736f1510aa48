mod calc;
mod config;
mod ipc;
mod letters;
mod model;

use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    // stdout carries the protocol; logs go to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_ansi(false)
        .with_writer(io::stderr)
        .init();
}

fn load_config() -> config::EngineConfig {
    match config::EngineConfig::from_env() {
        Ok(Some(cfg)) => {
            tracing::info!(
                path = ?std::env::var_os(config::CONFIG_ENV),
                cutoffs = cfg.default_cutoffs.len(),
                "loaded config"
            );
            cfg
        }
        Ok(None) => config::EngineConfig::default(),
        Err(e) => {
            tracing::error!("config load failed, using defaults: {e:#}");
            config::EngineConfig::default()
        }
    }
}

fn main() {
    init_logging();
    let mut state = ipc::AppState::new(load_config());
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "gradebookd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("stdin read failed: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            Err(e) => {
                tracing::warn!("bad request line: {e}");
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
    tracing::info!("stdin closed, exiting");
}
