use rusqlite::Connection;
use serde_json::json;

use crate::catalog::Student;
use crate::error::SessionError;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::session::SessionState;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn db(code: &'static str, e: anyhow::Error) -> Self {
        Self::new(code, format!("{e:#}"))
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<SessionError> for HandlerErr {
    fn from(e: SessionError) -> Self {
        Self {
            code: e.code(),
            message: e.to_string(),
            details: e.details(),
        }
    }
}

pub fn respond(req: &Request, result: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

pub fn str_param<'a>(req: &'a Request, key: &str) -> Result<&'a str, HandlerErr> {
    opt_str_param(req, key).ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Absent, null and blank strings all read as `None`.
pub fn opt_str_param<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

pub fn f64_param(req: &Request, key: &str) -> Result<f64, HandlerErr> {
    req.params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a number", key)))
}

pub fn session_ref(state: &AppState) -> Result<&SessionState, HandlerErr> {
    state
        .session
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn session_mut(state: &mut AppState) -> Result<&mut SessionState, HandlerErr> {
    state
        .session
        .as_mut()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn workspace_mut(state: &mut AppState) -> Result<(&mut Connection, &mut SessionState), HandlerErr> {
    match (state.db.as_mut(), state.session.as_mut()) {
        (Some(conn), Some(session)) => Ok((conn, session)),
        _ => Err(HandlerErr::new("no_workspace", "select a workspace first")),
    }
}

pub fn student_json(s: &Student) -> serde_json::Value {
    json!({
        "id": s.id,
        "firstName": s.first_name,
        "lastName": s.last_name,
        "displayName": s.display_name(),
    })
}

/// Guards and log sizes, returned after every session mutation.
pub fn session_summary(session: &SessionState) -> serde_json::Value {
    json!({
        "deltaCount": session.deltas().len(),
        "redoCount": session.redo_log().len(),
        "canUndo": session.can_undo(),
        "canRedo": session.can_redo(),
        "canCopy": session.can_copy(),
        "canPaste": session.can_paste(),
        "latestChange": session.latest_change(),
        "latestUndo": session.latest_undo(),
        "gradeSchemeChanged": session.grade_scheme_changed(),
    })
}
