use rusqlite::Connection;
use serde_json::Value;

use crate::access::Outcome;
use crate::config::{self, FormatConfig};
use crate::ipc::error::{ok, HandlerErr, HandlerResult};
use crate::ipc::types::Request;
use crate::sections;
use crate::store::SqliteStore;
use crate::tabs::codec::parse_tab_token;
use crate::tabs::registry::TabRegistry;
use crate::tabs::CourseContext;

/// Turns a handler result into the response envelope.
pub fn respond(req: &Request, result: HandlerResult) -> Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => {
            if e.code == "bad_params" {
                tracing::warn!(method = %req.method, message = %e.message, "rejected request");
            } else {
                tracing::error!(
                    method = %req.method,
                    code = e.code,
                    message = %e.message,
                    "request failed"
                );
            }
            e.response(&req.id)
        }
    }
}

pub fn require_db(db: &Option<Connection>) -> Result<&Connection, HandlerErr> {
    db.as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn param_i64(req: &Request, key: &str) -> Result<i64, HandlerErr> {
    req.params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing or non-integer {}", key)))
}

pub fn param_u32(req: &Request, key: &str) -> Result<u32, HandlerErr> {
    let n = param_i64(req, key)?;
    u32::try_from(n).map_err(|_| HandlerErr::bad_params(format!("{} out of range", key)))
}

pub fn param_str<'r>(req: &'r Request, key: &str) -> Result<&'r str, HandlerErr> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn param_opt_str<'r>(req: &'r Request, key: &str) -> Option<&'r str> {
    req.params.get(key).and_then(|v| v.as_str())
}

pub fn param_bool(req: &Request, key: &str) -> Result<bool, HandlerErr> {
    req.params
        .get(key)
        .and_then(|v| v.as_bool())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing or non-boolean {}", key)))
}

/// A tab reference: `tabIndex` as a number, or `tabId` as `"tab3"`.
pub fn param_tab(req: &Request) -> Result<usize, HandlerErr> {
    if let Some(v) = req.params.get("tabIndex") {
        return v
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| HandlerErr::bad_params("tabIndex must be a non-negative integer"));
    }
    let raw = param_str(req, "tabId")?;
    parse_tab_token(raw).ok_or_else(|| HandlerErr::bad_params(format!("invalid tabId {:?}", raw)))
}

pub fn load_config(conn: &Connection) -> Result<FormatConfig, HandlerErr> {
    config::load_config(conn).map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))
}

/// Runs the render pipeline for one course: its sections plus the prepared tab set.
pub fn course_context(
    conn: &Connection,
    config: &FormatConfig,
    course_id: i64,
) -> Result<CourseContext, HandlerErr> {
    sections::require_course(conn, course_id)?;
    let all = sections::list_sections(conn, course_id)?;
    let store = SqliteStore::new(conn);
    Ok(TabRegistry::new(&store, config).load_context(course_id, all)?)
}

pub fn outcome_with<T: ToString>(outcome: &Outcome<T>, extra: Value) -> Value {
    let mut v = outcome.to_json();
    if let (Some(obj), Value::Object(more)) = (v.as_object_mut(), extra) {
        obj.extend(more);
    }
    v
}
