use serde_json::json;

use crate::ipc::helpers::{
    opt_str_param, respond, session_mut, session_ref, session_summary, student_json, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{CourseId, GroupId, SectionId};
use crate::session::SessionState;

/// Scope, roster, score grid and guards for whatever is currently selected.
pub fn scope_view(session: &SessionState) -> serde_json::Value {
    let assignments = session.assignments();
    let scores = session.scores();
    let rows: Vec<serde_json::Value> = session
        .students()
        .iter()
        .map(|s| {
            let cells: Vec<f64> = assignments
                .iter()
                .map(|a| scores.get_score(&s.id, &a.id))
                .collect();
            json!({
                "student": student_json(s),
                "scores": cells,
                "percentage": session.weighted_percentage(&s.id),
            })
        })
        .collect();

    json!({
        "scope": session.scope(),
        "assignments": assignments,
        "rows": rows,
        "gradeScheme": session.grade_scheme(),
        "clipboard": session.clipboard(),
        "session": session_summary(session),
    })
}

fn scope_select(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let course = opt_str_param(req, "courseId").map(CourseId::new);
    let section = opt_str_param(req, "sectionId").map(SectionId::new);
    let group = opt_str_param(req, "groupId").map(GroupId::new);

    let session = session_mut(state)?;
    let discarded = session.select_scope(course, section, group)?;
    let mut view = scope_view(session);
    view["discardedDeltas"] = json!(discarded);
    Ok(view)
}

fn scope_get(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    Ok(scope_view(session_ref(state)?))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "scope.select" => scope_select(state, req),
        "scope.get" => scope_get(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
