use serde_json::json;

use crate::db;
use crate::error::SessionError;
use crate::ipc::helpers::{
    f64_param, respond, session_mut, session_ref, session_summary, str_param, workspace_mut,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::scheme::LetterGrade;
use crate::session::SessionState;

fn letter_param(req: &Request) -> Result<LetterGrade, HandlerErr> {
    let raw = str_param(req, "letter")?;
    LetterGrade::parse(raw).ok_or_else(|| HandlerErr::bad_params(format!("unknown letter grade: {}", raw)))
}

fn scheme_json(session: &SessionState) -> serde_json::Value {
    json!({
        "sectionId": session.scope().section,
        "gradeScheme": session.grade_scheme(),
        "changed": session.grade_scheme_changed(),
    })
}

fn scheme_get(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    Ok(scheme_json(session_ref(state)?))
}

fn scheme_classify(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let percentage = f64_param(req, "percentage")?;
    let session = session_ref(state)?;
    let scheme = session
        .grade_scheme()
        .ok_or_else(|| SessionError::precondition("no section selected"))?;
    let range = scheme.classify(percentage);
    Ok(json!({
        "letter": range.map(|r| r.letter),
        "color": range.map(|r| r.color.clone()),
    }))
}

fn scheme_update_bound(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let letter = letter_param(req)?;
    let lower_bound = f64_param(req, "lowerBound")?;
    let session = session_mut(state)?;
    session.update_bound(letter, lower_bound)?;
    Ok(scheme_json(session))
}

fn scheme_update_color(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let letter = letter_param(req)?;
    let color = str_param(req, "color")?;
    let session = session_mut(state)?;
    session.update_color(letter, color)?;
    Ok(scheme_json(session))
}

fn scheme_apply(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (conn, session) = workspace_mut(state)?;
    if session.grade_scheme_changed() {
        if let (Some(section), Some(scheme)) = (session.scope().section.clone(), session.grade_scheme()) {
            db::save_grade_scheme(conn, &section, scheme)
                .map_err(|e| HandlerErr::db("db_update_failed", e))?;
        }
    }
    let applied = session.apply_grade_scheme()?;
    let mut out = scheme_json(session);
    out["applied"] = json!(applied);
    out["session"] = session_summary(session);
    Ok(out)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "scheme.get" => scheme_get(state, req),
        "scheme.classify" => scheme_classify(state, req),
        "scheme.updateBound" => scheme_update_bound(state, req),
        "scheme.updateColor" => scheme_update_color(state, req),
        "scheme.apply" => scheme_apply(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
