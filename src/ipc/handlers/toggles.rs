use crate::access::{gated, Session};
use crate::ipc::error::{HandlerErr, HandlerResult};
use crate::ipc::helpers::{param_i64, require_db, respond};
use crate::ipc::types::{AppState, Request};
use crate::sections::{self, LiveSections};
use crate::store::SqliteStore;
use crate::toggle;
use serde_json::{json, Value};

fn session_user(session: &Session) -> Result<i64, HandlerErr> {
    session
        .user_id
        .ok_or_else(|| HandlerErr::bad_params("toggle state needs session.userId"))
}

fn toggles_get(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(&state.db)?;
    let course_id = param_i64(req, "courseId")?;
    let user_id = session_user(&Session::from_params(&req.params))?;
    sections::require_course(conn, course_id)?;
    let live = LiveSections::from_sections(&sections::list_sections(conn, course_id)?);
    let store = SqliteStore::new(conn);
    let toggles = toggle::load_toggles(&store, user_id, course_id, &live)?;
    Ok(json!({
        "collapsed": toggles.collapsed(&live),
        "toggleState": toggles.encode(),
    }))
}

fn toggles_set(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(&state.db)?;
    let session = Session::from_params(&req.params);
    let outcome = gated(&session, || {
        let course_id = param_i64(req, "courseId")?;
        // Accepted either as the JSON text the browser posts or as an inline object.
        let raw = match req.params.get("toggleState") {
            Some(Value::String(s)) => s.clone(),
            Some(v @ Value::Object(_)) => v.to_string(),
            _ => return Err(HandlerErr::bad_params("missing toggleState")),
        };
        let user_id = session_user(&session)?;
        sections::require_course(conn, course_id)?;
        let store = SqliteStore::new(conn);
        Ok::<_, HandlerErr>(toggle::save_toggles(&store, user_id, course_id, &raw)?)
    })?;
    Ok(outcome.to_json())
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "toggles.get" => Some(respond(req, toggles_get(state, req))),
        "toggles.set" => Some(respond(req, toggles_set(state, req))),
        _ => None,
    }
}
