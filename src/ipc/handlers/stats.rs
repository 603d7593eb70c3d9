use serde_json::json;

use crate::ipc::helpers::{respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::stats::Statistics;

fn stats_get(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let engine = state
        .stats
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))?
        .borrow();

    let per_assignment: Vec<serde_json::Value> = engine
        .per_assignment()
        .iter()
        .map(|a| {
            json!({
                "assignmentId": a.assignment_id,
                "name": a.name,
                "stats": a.stats,
                "rounded": a.stats.as_ref().map(Statistics::rounded),
            })
        })
        .collect();

    Ok(json!({
        "revision": engine.revision(),
        "perAssignment": per_assignment,
        "aggregate": engine.aggregate(),
        "aggregateRounded": engine.aggregate().map(Statistics::rounded),
        "distribution": engine.distribution(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "stats.get" => stats_get(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
