use crate::access::{gated, Outcome, Session};
use crate::backup;
use crate::ipc::error::{HandlerErr, HandlerResult};
use crate::ipc::helpers::{param_i64, param_opt_str, param_str, require_db, respond};
use crate::ipc::types::{AppState, Request};
use crate::sections;
use serde_json::json;
use std::path::PathBuf;

fn io_failed(e: anyhow::Error, path: &str) -> HandlerErr {
    HandlerErr::new("io_failed", e.to_string()).with_details(json!({ "path": path }))
}

fn courses_backup(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(&state.db)?;
    let course_id = param_i64(req, "courseId")?;
    let out_path = param_str(req, "outPath")?.trim();
    if out_path.is_empty() {
        return Err(HandlerErr::bad_params("missing outPath"));
    }
    sections::require_course(conn, course_id)?;

    let export = backup::export_course_bundle(conn, course_id, &PathBuf::from(out_path))
        .map_err(|e| io_failed(e, out_path))?;
    Ok(json!({
        "ok": true,
        "path": out_path,
        "bundleFormat": export.bundle_format,
        "backupId": export.backup_id,
        "sha256": export.sha256,
        "sectionCount": export.section_count,
        "optionCount": export.option_count,
    }))
}

fn courses_restore(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(&state.db)?;
    let session = Session::from_params(&req.params);
    let outcome = gated(&session, || {
        let in_path = param_str(req, "inPath")?.trim();
        let src = PathBuf::from(in_path);
        if !src.is_file() {
            return Err(HandlerErr::new("not_found", "bundle file not found")
                .with_details(json!({ "path": in_path })));
        }
        let name = param_opt_str(req, "name").map(str::trim).filter(|s| !s.is_empty());
        let import =
            backup::import_course_bundle(conn, &src, name).map_err(|e| io_failed(e, in_path))?;
        Ok::<_, HandlerErr>(Outcome::Applied(import))
    })?;
    Ok(match outcome {
        Outcome::Applied(import) => json!({
            "status": "applied",
            "value": import.course_id.to_string(),
            "courseId": import.course_id,
            "backupId": import.backup_id,
            "sectionCount": import.section_count,
            "optionCount": import.option_count,
        }),
        other => json!({ "status": other.status(), "value": "" }),
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.backup" => Some(respond(req, courses_backup(state, req))),
        "courses.restore" => Some(respond(req, courses_restore(state, req))),
        _ => None,
    }
}
