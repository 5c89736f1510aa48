use crate::ipc::error::{bad_params, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_config_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!(state.config))
}

fn handle_config_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = state.config.apply_update(&req.params) {
        return bad_params(&req.id, format!("{e:#}"));
    }
    tracing::info!(
        undetermined = %state.config.undetermined_letter,
        fallback = %state.config.fallback_letter,
        cutoffs = state.config.default_cutoffs.len(),
        "config updated"
    );
    ok(&req.id, json!(state.config))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "config.get" => Some(handle_config_get(state, req)),
        "config.update" => Some(handle_config_update(state, req)),
        _ => None,
    }
}
