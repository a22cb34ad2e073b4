//! Per-session on-disk state shared between hooks.
//!
//! Hooks are separate short-lived processes, so every piece of cross-hook
//! state lives in a file keyed by the host's session ID. The session ID is
//! only ever taken from a host event; nothing here generates one. The
//! pieces:
//!
//! - the patterns-used handoff (pre-task hook writes, stop hook consumes
//!   once),
//! - the compaction handoff (pre-compact writes via staging rename,
//!   session-start consumes),
//! - the session pointer, mapping project to most-recent session for the
//!   pre-compact hook,
//! - the disable flag, agent-type hint, and async learning status.

use crate::models::is_valid_pattern_id;
use crate::{Error, Result, paths};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Writes the per-session pattern-ID handoff file.
///
/// IDs failing shape validation are dropped before writing, so the stop
/// hook can trust what it reads. Overwrites any previous handoff for the
/// same session.
pub fn write_patterns_used(project_dir: &Path, session_id: &str, ids: &[String]) -> Result<()> {
    let valid: Vec<&String> = ids.iter().filter(|id| is_valid_pattern_id(id)).collect();
    let path = paths::patterns_used_file(project_dir, session_id);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
            operation: "create_logs_dir".to_string(),
            cause: e.to_string(),
        })?;
    }
    let body = serde_json::to_string(&valid).map_err(|e| Error::OperationFailed {
        operation: "serialize_patterns_used".to_string(),
        cause: e.to_string(),
    })?;
    std::fs::write(&path, body).map_err(|e| Error::OperationFailed {
        operation: "write_patterns_used".to_string(),
        cause: e.to_string(),
    })?;
    Ok(())
}

/// Reads and deletes the pattern-ID handoff for `session_id`.
///
/// One-time use: the first successful read unlinks the file, so a second
/// call returns empty. A missing or unparseable file is an empty set, never
/// an error. IDs are shape-revalidated on the way out.
#[must_use]
pub fn consume_patterns_used(project_dir: &Path, session_id: &str) -> Vec<String> {
    let path = paths::patterns_used_file(project_dir, session_id);
    let Ok(contents) = std::fs::read_to_string(&path) else {
        return Vec::new();
    };
    let ids: Vec<String> = serde_json::from_str(&contents).unwrap_or_default();
    let _ = std::fs::remove_file(&path);
    ids.into_iter()
        .filter(|id| is_valid_pattern_id(id))
        .collect()
}

/// Compaction handoff document written by the pre-compact hook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecompactHandoff {
    /// Formatted pattern bullet list.
    pub patterns: String,
    /// Session the patterns belong to.
    pub session_id: String,
    /// Number of patterns in the list.
    pub count: usize,
}

/// Writes the compaction handoff via staging file plus atomic rename.
///
/// The staging file is created owner-only before any content lands in it.
pub fn write_precompact_handoff(handoff: &PrecompactHandoff) -> Result<()> {
    let final_path = paths::precompact_handoff_file(&handoff.session_id);
    let staging = final_path.with_extension("json.tmp");

    let body = serde_json::to_string(handoff).map_err(|e| Error::OperationFailed {
        operation: "serialize_precompact_handoff".to_string(),
        cause: e.to_string(),
    })?;

    write_owner_only(&staging, &body)?;
    std::fs::rename(&staging, &final_path).map_err(|e| {
        let _ = std::fs::remove_file(&staging);
        Error::OperationFailed {
            operation: "rename_precompact_handoff".to_string(),
            cause: e.to_string(),
        }
    })?;
    Ok(())
}

/// Reads and deletes the compaction handoff for `session_id`.
#[must_use]
pub fn consume_precompact_handoff(session_id: &str) -> Option<PrecompactHandoff> {
    let path = paths::precompact_handoff_file(session_id);
    let contents = std::fs::read_to_string(&path).ok()?;
    let _ = std::fs::remove_file(&path);
    serde_json::from_str(&contents).ok()
}

#[cfg(unix)]
fn write_owner_only(path: &Path, body: &str) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;
    let mut f = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .map_err(|e| Error::OperationFailed {
            operation: "write_precompact_handoff".to_string(),
            cause: e.to_string(),
        })?;
    f.write_all(body.as_bytes())
        .map_err(|e| Error::OperationFailed {
            operation: "write_precompact_handoff".to_string(),
            cause: e.to_string(),
        })?;
    Ok(())
}

#[cfg(not(unix))]
fn write_owner_only(path: &Path, body: &str) -> Result<()> {
    std::fs::write(path, body).map_err(|e| Error::OperationFailed {
        operation: "write_precompact_handoff".to_string(),
        cause: e.to_string(),
    })
}

/// Records `session_id` as the project's most recent session.
///
/// The pre-compact event carries no usable session ID of its own; it reads
/// this pointer instead.
pub fn write_session_pointer(project_id: &str, session_id: &str) -> Result<()> {
    std::fs::write(paths::session_pointer_file(project_id), session_id).map_err(|e| {
        Error::OperationFailed {
            operation: "write_session_pointer".to_string(),
            cause: e.to_string(),
        }
    })
}

/// Reads the project's most recent session ID, if any.
#[must_use]
pub fn read_session_pointer(project_id: &str) -> Option<String> {
    std::fs::read_to_string(paths::session_pointer_file(project_id))
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// True when the wrapper preflight disabled this session.
#[must_use]
pub fn is_disabled(session_id: &str) -> bool {
    paths::disabled_flag(session_id).exists()
}

/// Reads the agent-type hint for this session, defaulting to `main`.
#[must_use]
pub fn read_agent_type(session_id: &str) -> String {
    std::fs::read_to_string(paths::agent_type_file(session_id))
        .map(|s| s.trim().to_string())
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "main".to_string())
}

/// Persists the agent-type hint for this session. Best effort.
pub fn write_agent_type(session_id: &str, agent_type: &str) {
    let _ = std::fs::write(paths::agent_type_file(session_id), agent_type);
}

/// State of a detached learning worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LearningState {
    /// Worker spawned, learn call in flight.
    Running,
    /// Learn call finished.
    Completed,
    /// Learn call failed or timed out.
    Failed,
}

/// Async learning status document, the sole channel from a detached worker
/// back to later sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningStatus {
    /// Worker state.
    pub state: LearningState,
    /// When the worker started, ISO-8601.
    pub started_at: String,
    /// When the worker finished, ISO-8601.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    /// Learning statistics on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<serde_json::Value>,
    /// Failure reason on error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Writes the learning status for `session_id`. Best effort.
pub fn write_learning_status(session_id: &str, status: &LearningStatus) {
    if let Ok(body) = serde_json::to_string(status) {
        let _ = std::fs::write(paths::learning_status_file(session_id), body);
    }
}

/// Reads the learning status for `session_id`, if present and parseable.
#[must_use]
pub fn read_learning_status(session_id: &str) -> Option<LearningStatus> {
    let contents = std::fs::read_to_string(paths::learning_status_file(session_id)).ok()?;
    serde_json::from_str(&contents).ok()
}
