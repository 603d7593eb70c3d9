use std::path::PathBuf;

pub const LOG_ENV: &str = "GRADEBOOKD_LOG";
pub const LOG_JSON_ENV: &str = "GRADEBOOKD_LOG_JSON";
pub const WORKSPACE_ENV: &str = "GRADEBOOKD_WORKSPACE";

const DEFAULT_LOG_FILTER: &str = "gradebookd=warn";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub log_filter: String,
    pub log_json: bool,
    /// Workspace opened at startup, as if selected over IPC.
    pub workspace: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_filter = lookup(LOG_ENV)
            .or_else(|| lookup("RUST_LOG"))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        let log_json = lookup(LOG_JSON_ENV)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let workspace = lookup(WORKSPACE_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self {
            log_filter,
            log_json,
            workspace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let c = config(&[]);
        assert_eq!(c.log_filter, "gradebookd=warn");
        assert!(!c.log_json);
        assert!(c.workspace.is_none());
    }

    #[test]
    fn own_variable_wins_over_rust_log() {
        let c = config(&[("RUST_LOG", "info"), (LOG_ENV, "gradebookd=debug")]);
        assert_eq!(c.log_filter, "gradebookd=debug");
        let c = config(&[("RUST_LOG", "info")]);
        assert_eq!(c.log_filter, "info");
    }

    #[test]
    fn json_flag_and_workspace() {
        let c = config(&[(LOG_JSON_ENV, "TRUE"), (WORKSPACE_ENV, " /tmp/book ")]);
        assert!(c.log_json);
        assert_eq!(c.workspace, Some(PathBuf::from("/tmp/book")));
        assert!(config(&[(WORKSPACE_ENV, "  ")]).workspace.is_none());
    }
}
