use crate::access::{gated, Outcome, Session};
use crate::error::EngineError;
use crate::ipc::error::{HandlerErr, HandlerResult};
use crate::ipc::helpers::{
    course_context, load_config, outcome_with, param_bool, param_i64, param_str, param_tab,
    param_u32, require_db, respond,
};
use crate::ipc::types::{AppState, Request};
use crate::sections::Section;
use crate::store::SqliteStore;
use crate::tabs::codec::parse_tab_token;
use crate::tabs::registry::TabRegistry;
use crate::tabs::{assign, ordering, view, CourseContext};
use serde_json::{json, Value};

fn tab_param(req: &Request, key: &str) -> Result<usize, HandlerErr> {
    let v = req
        .params
        .get(key)
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))?;
    let parsed = match v {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => parse_tab_token(s),
        _ => None,
    };
    parsed.ok_or_else(|| HandlerErr::bad_params(format!("invalid tab reference in {}", key)))
}

fn section_param(ctx: &CourseContext, req: &Request) -> Result<Section, HandlerErr> {
    if req.params.get("sectionId").is_some() {
        let id = param_i64(req, "sectionId")?;
        return ctx.section_by_id(id).cloned().ok_or_else(|| {
            HandlerErr::new("not_found", format!("section id {} not in course", id))
        });
    }
    let number = param_u32(req, "sectionNumber")?;
    ctx.section_by_number(number)
        .cloned()
        .ok_or_else(|| {
            EngineError::SectionNotFound {
                course_id: ctx.course_id,
                number,
            }
            .into()
        })
}

fn tabs_view(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(&state.db)?;
    let course_id = param_i64(req, "courseId")?;
    let config = load_config(conn)?;
    let ctx = course_context(conn, &config, course_id)?;
    let view = view::build_view(&ctx, &config, &mut state.titles);
    Ok(json!({ "view": view }))
}

// Mutations evaluate the gate before reading their parameters.

fn tabs_rename(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(&state.db)?;
    let session = Session::from_params(&req.params);
    let titles = &mut state.titles;
    let outcome = gated(&session, || {
        let course_id = param_i64(req, "courseId")?;
        let tab_index = param_tab(req)?;
        let title = param_str(req, "title")?;
        let config = load_config(conn)?;
        let mut ctx = course_context(conn, &config, course_id)?;
        let store = SqliteStore::new(conn);
        let registry = TabRegistry::new(&store, &config);
        let out = assign::rename_tab(&registry, &mut ctx.tabs, tab_index, title)?;
        if let (Outcome::Applied(_), Some(tab)) = (&out, ctx.tabs.get(tab_index)) {
            titles.on_rename(course_id, tab_index, tab.effective_title());
        }
        Ok::<_, HandlerErr>(out)
    })?;
    Ok(outcome.to_json())
}

fn tabs_reorder(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(&state.db)?;
    let session = Session::from_params(&req.params);
    let outcome = gated(&session, || {
        let course_id = param_i64(req, "courseId")?;
        let sequence = param_str(req, "sequence")?;
        let config = load_config(conn)?;
        let ctx = course_context(conn, &config, course_id)?;
        let store = SqliteStore::new(conn);
        Ok::<_, HandlerErr>(ordering::set_sequence(
            &store,
            course_id,
            sequence,
            ctx.options.max_tabs,
        )?)
    })?;
    Ok(outcome.to_json())
}

fn tabs_swap(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(&state.db)?;
    let session = Session::from_params(&req.params);
    let outcome = gated(&session, || {
        let course_id = param_i64(req, "courseId")?;
        let moved = tab_param(req, "moved")?;
        let target = tab_param(req, "target")?;
        let config = load_config(conn)?;
        let ctx = course_context(conn, &config, course_id)?;
        let store = SqliteStore::new(conn);
        Ok::<_, HandlerErr>(ordering::swap(
            &store,
            course_id,
            &ctx.tabs.indices(),
            &ctx.tabs.sequence,
            moved,
            target,
        )?)
    })?;
    Ok(outcome.to_json())
}

fn tabs_assign(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(&state.db)?;
    let session = Session::from_params(&req.params);
    let outcome = gated(&session, || {
        let course_id = param_i64(req, "courseId")?;
        let tab_index = param_tab(req)?;
        let ids = param_str(req, "sections")?;
        let numbers = param_str(req, "sectionNums")?;
        let config = load_config(conn)?;
        let mut ctx = course_context(conn, &config, course_id)?;
        let store = SqliteStore::new(conn);
        let registry = TabRegistry::new(&store, &config);
        Ok::<_, HandlerErr>(assign::assign_tab_sections(
            &registry,
            &mut ctx.tabs,
            &ctx.live,
            tab_index,
            ids,
            numbers,
        )?)
    })?;
    Ok(outcome.to_json())
}

fn tabs_move_section(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(&state.db)?;
    let session = Session::from_params(&req.params);
    let outcome = gated(&session, || {
        let course_id = param_i64(req, "courseId")?;
        let tab_index = param_tab(req)?;
        let config = load_config(conn)?;
        let mut ctx = course_context(conn, &config, course_id)?;
        let section = section_param(&ctx, req)?;
        let store = SqliteStore::new(conn);
        let registry = TabRegistry::new(&store, &config);
        let out = assign::move_section_to_tab(&registry, &mut ctx.tabs, tab_index, &section)?;
        Ok::<_, HandlerErr>(match out {
            Outcome::Applied(modified) => Outcome::Applied((section.id, tab_index, modified)),
            Outcome::Unchanged => Outcome::Unchanged,
            Outcome::Denied => Outcome::Denied,
        })
    })?;
    Ok(match outcome {
        Outcome::Applied((section_id, tab_index, modified)) => outcome_with(
            &Outcome::Applied(section_id),
            json!({ "tabIndex": tab_index, "modifiedTabs": modified }),
        ),
        other => json!({ "status": other.status(), "value": "" }),
    })
}

fn tabs_remove_section(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(&state.db)?;
    let session = Session::from_params(&req.params);
    let outcome = gated(&session, || {
        let course_id = param_i64(req, "courseId")?;
        let config = load_config(conn)?;
        let mut ctx = course_context(conn, &config, course_id)?;
        let section = section_param(&ctx, req)?;
        let store = SqliteStore::new(conn);
        let registry = TabRegistry::new(&store, &config);
        let modified = assign::remove_section_from_tabs(&registry, &mut ctx.tabs, &section)?;
        if modified.is_empty() {
            return Ok::<_, HandlerErr>(Outcome::Unchanged);
        }
        Ok(Outcome::Applied(modified))
    })?;
    Ok(match outcome {
        Outcome::Applied(modified) => {
            json!({ "status": "applied", "value": "ok", "modifiedTabs": modified })
        }
        other => json!({ "status": other.status(), "value": "" }),
    })
}

fn tabs_section0(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(&state.db)?;
    let session = Session::from_params(&req.params);
    let outcome = gated(&session, || {
        let course_id = param_i64(req, "courseId")?;
        let on_top = param_bool(req, "onTop")?;
        let config = load_config(conn)?;
        let mut ctx = course_context(conn, &config, course_id)?;
        let store = SqliteStore::new(conn);
        let registry = TabRegistry::new(&store, &config);
        Ok::<_, HandlerErr>(assign::set_section0_on_top(&registry, &mut ctx, on_top)?)
    })?;
    Ok(outcome.to_json())
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "tabs.view" => Some(respond(req, tabs_view(state, req))),
        "tabs.rename" => Some(respond(req, tabs_rename(state, req))),
        "tabs.reorder" => Some(respond(req, tabs_reorder(state, req))),
        "tabs.swap" => Some(respond(req, tabs_swap(state, req))),
        "tabs.assign" => Some(respond(req, tabs_assign(state, req))),
        "tabs.moveSection" => Some(respond(req, tabs_move_section(state, req))),
        "tabs.removeSection" => Some(respond(req, tabs_remove_section(state, req))),
        "tabs.section0" => Some(respond(req, tabs_section0(state, req))),
        _ => None,
    }
}
