use serde_json::json;

use crate::db;
use crate::ipc::helpers::{
    f64_param, respond, session_mut, session_summary, str_param, workspace_mut, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{AssignmentId, StudentId};

fn cell_params(req: &Request) -> Result<(StudentId, AssignmentId), HandlerErr> {
    Ok((
        StudentId::new(str_param(req, "studentId")?),
        AssignmentId::new(str_param(req, "assignmentId")?),
    ))
}

fn grades_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (student, assignment) = cell_params(req)?;
    let score = f64_param(req, "score")?;
    let session = session_mut(state)?;
    session.update_grade(&student, &assignment, score)?;
    Ok(json!({ "session": session_summary(session) }))
}

fn grades_undo(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let session = session_mut(state)?;
    session.undo()?;
    Ok(json!({ "session": session_summary(session) }))
}

fn grades_redo(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let session = session_mut(state)?;
    session.redo()?;
    Ok(json!({ "session": session_summary(session) }))
}

fn grades_revert(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let session = session_mut(state)?;
    session.revert_grades();
    Ok(json!({ "session": session_summary(session) }))
}

fn grades_save(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (conn, session) = workspace_mut(state)?;
    let pending = session.deltas().to_vec();
    // Disk first: a failed write leaves the session untouched.
    let written = db::commit_scores(conn, &pending)
        .map_err(|e| HandlerErr::db("db_update_failed", e))?;
    let committed = session.save_grades()?;
    Ok(json!({
        "committed": committed.len(),
        "written": written,
        "session": session_summary(session),
    }))
}

fn clipboard_select(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (student, assignment) = cell_params(req)?;
    let session = session_mut(state)?;
    session.select_cell(&student, &assignment)?;
    Ok(json!({
        "clipboard": session.clipboard(),
        "session": session_summary(session),
    }))
}

fn clipboard_clear(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let session = session_mut(state)?;
    session.clear_selection();
    Ok(json!({
        "clipboard": session.clipboard(),
        "session": session_summary(session),
    }))
}

fn clipboard_copy(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let session = session_mut(state)?;
    let value = session.copy()?;
    Ok(json!({ "value": value, "session": session_summary(session) }))
}

fn clipboard_cut(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let session = session_mut(state)?;
    let value = session.cut()?;
    Ok(json!({ "value": value, "session": session_summary(session) }))
}

fn clipboard_paste(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let session = session_mut(state)?;
    session.paste()?;
    Ok(json!({ "session": session_summary(session) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "grades.update" => grades_update(state, req),
        "grades.undo" => grades_undo(state, req),
        "grades.redo" => grades_redo(state, req),
        "grades.revert" => grades_revert(state, req),
        "grades.save" => grades_save(state, req),
        "clipboard.select" => clipboard_select(state, req),
        "clipboard.clear" => clipboard_clear(state, req),
        "clipboard.copy" => clipboard_copy(state, req),
        "clipboard.cut" => clipboard_cut(state, req),
        "clipboard.paste" => clipboard_paste(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
