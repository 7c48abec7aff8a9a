//! Tunables shared by the commands. Every field has a CLI flag with an
//! environment-variable fallback (see `main.rs`); the defaults live here.

use crate::baseline::{DEFAULT_MAX_LOOKBACK, DEFAULT_PRECISION};
use crate::retry::DEFAULT_MAX_RETRIES;

pub const DEFAULT_NAMESPACE: &str = "coverage";
pub const DEFAULT_TARGET_BRANCH: &str = "main";
pub const DEFAULT_REMOTE: &str = "origin";
pub const DEFAULT_HISTORY_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Tracking stream; selects `refs/notes/<namespace>`.
    pub namespace: String,
    /// Branch the pull request merges into.
    pub target_branch: String,
    pub remote: String,
    /// Ancestors of the merge-base to search for a baseline (0 disables).
    pub max_lookback: usize,
    /// Push attempts before giving up on a conflicting remote.
    pub max_retries: u32,
    /// Decimals in the rendered delta.
    pub precision: usize,
    /// Snapshots shown in the trend line.
    pub history_len: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            target_branch: DEFAULT_TARGET_BRANCH.to_string(),
            remote: DEFAULT_REMOTE.to_string(),
            max_lookback: DEFAULT_MAX_LOOKBACK,
            max_retries: DEFAULT_MAX_RETRIES,
            precision: DEFAULT_PRECISION,
            history_len: DEFAULT_HISTORY_LEN,
        }
    }
}

/// Check that a namespace can be used as a notes ref suffix.
pub fn validate_namespace(namespace: &str) -> Result<String, String> {
    if namespace.is_empty() {
        return Err("namespace must not be empty".to_string());
    }
    if namespace.starts_with('/') || namespace.ends_with('/') {
        return Err(format!("namespace '{namespace}' must not start or end with '/'"));
    }
    if namespace.contains("..")
        || namespace.contains("//")
        || namespace
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || "~^:?*[\\".contains(c))
    {
        return Err(format!("namespace '{namespace}' is not a valid ref name"));
    }
    Ok(namespace.to_string())
}
