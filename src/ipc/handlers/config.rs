use crate::config;
use crate::ipc::error::{HandlerErr, HandlerResult};
use crate::ipc::helpers::{load_config, require_db, respond};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn config_get(state: &mut AppState) -> HandlerResult {
    let conn = require_db(&state.db)?;
    let cfg = load_config(conn)?;
    Ok(json!({ "config": cfg }))
}

fn config_update(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(&state.db)?;
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("patch must be an object"));
    };
    let updated = config::update_config(conn, patch)
        .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?
        .map_err(HandlerErr::bad_params)?;
    Ok(json!({ "ok": true, "config": updated }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "config.get" => Some(respond(req, config_get(state))),
        "config.update" => Some(respond(req, config_update(state, req))),
        _ => None,
    }
}
