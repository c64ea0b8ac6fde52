use crate::access::{gated, Outcome, Session};
use crate::ipc::error::{HandlerErr, HandlerResult};
use crate::ipc::helpers::{load_config, param_i64, param_opt_str, param_u32, require_db, respond};
use crate::ipc::types::{AppState, Request};
use crate::sections;
use crate::store::{OptionStore, SqliteStore};
use crate::tabs::reconcile::remove_section_from_all_tabs;
use crate::tabs::FormatOptions;
use serde_json::json;

fn courses_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(&state.db)?;
    let name = param_opt_str(req, "name").map(str::trim).unwrap_or("");
    if name.is_empty() {
        return Err(HandlerErr::bad_params("name must not be empty"));
    }
    let num_sections = match req.params.get("sections") {
        None => 0,
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n <= 500)
            .ok_or_else(|| HandlerErr::bad_params("sections must be an integer in 0..=500"))?,
    };
    let course_id = sections::create_course(conn, name, num_sections)?;
    Ok(json!({ "courseId": course_id, "name": name, "sectionCount": num_sections + 1 }))
}

fn sections_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(&state.db)?;
    let course_id = param_i64(req, "courseId")?;
    sections::require_course(conn, course_id)?;
    let list = sections::list_sections(conn, course_id)?;
    Ok(json!({ "sections": list }))
}

fn sections_add(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(&state.db)?;
    let session = Session::from_params(&req.params);
    let outcome = gated(&session, || {
        let course_id = param_i64(req, "courseId")?;
        let name = param_opt_str(req, "name").map(str::trim).filter(|s| !s.is_empty());
        let section = sections::add_section(conn, course_id, name)?;
        tracing::info!(course_id, number = section.number, "section added");
        Ok::<_, HandlerErr>(Outcome::Applied(section))
    })?;
    Ok(match outcome {
        Outcome::Applied(section) => json!({ "status": "applied", "section": section }),
        other => json!({ "status": other.status(), "value": "" }),
    })
}

fn sections_update(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(&state.db)?;
    let session = Session::from_params(&req.params);
    let outcome = gated(&session, || {
        let course_id = param_i64(req, "courseId")?;
        let number = param_u32(req, "number")?;
        // `name: null` clears the override; an absent key leaves it alone.
        let name = match req.params.get("name") {
            None => None,
            Some(serde_json::Value::Null) => Some(None),
            Some(v) => Some(Some(
                v.as_str()
                    .ok_or_else(|| HandlerErr::bad_params("name must be a string or null"))?,
            )),
        };
        let visible = match req.params.get("visible") {
            None => None,
            Some(v) => Some(
                v.as_bool()
                    .ok_or_else(|| HandlerErr::bad_params("visible must be boolean"))?,
            ),
        };
        let section = sections::update_section(conn, course_id, number, name, visible)?;
        Ok::<_, HandlerErr>(Outcome::Applied(section))
    })?;
    Ok(match outcome {
        Outcome::Applied(section) => json!({ "status": "applied", "section": section }),
        other => json!({ "status": other.status(), "value": "" }),
    })
}

/// Deletes a section, closes the numbering gap, then strips it from every tab.
fn sections_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(&state.db)?;
    let session = Session::from_params(&req.params);
    let outcome = gated(&session, || {
        let course_id = param_i64(req, "courseId")?;
        let number = param_u32(req, "number")?;
        let config = load_config(conn)?;
        sections::require_course(conn, course_id)?;
        let deleted = sections::delete_section_record(conn, course_id, number)?;
        let store = SqliteStore::new(conn);
        let options = FormatOptions::from_map(&store.load_all(course_id)?, &config);
        let modified = remove_section_from_all_tabs(
            &store,
            course_id,
            options.max_tabs,
            deleted.number,
            deleted.id,
        )?;
        tracing::info!(course_id, section_id = deleted.id, number, "section deleted");
        Ok::<_, HandlerErr>(Outcome::Applied((deleted, modified)))
    })?;
    Ok(match outcome {
        Outcome::Applied((deleted, modified)) => json!({
            "status": "applied",
            "value": deleted.id.to_string(),
            "deleted": deleted,
            "modifiedTabs": modified,
        }),
        other => json!({ "status": other.status(), "value": "" }),
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.create" => Some(respond(req, courses_create(state, req))),
        "sections.list" => Some(respond(req, sections_list(state, req))),
        "sections.add" => Some(respond(req, sections_add(state, req))),
        "sections.update" => Some(respond(req, sections_update(state, req))),
        "sections.delete" => Some(respond(req, sections_delete(state, req))),
        _ => None,
    }
}
