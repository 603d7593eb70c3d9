use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use rusqlite::Connection;
use serde::Deserialize;

use crate::session::SessionState;
use crate::stats::StatisticsEngine;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub session: Option<SessionState>,
    pub stats: Option<Rc<RefCell<StatisticsEngine>>>,
}
