//! On-disk layout.
//!
//! Every file the hooks share is named here, in one place. Two roots exist:
//!
//! - the project logs directory `<project>/.claude/data/logs/` for durable
//!   per-project state (accumulator db, relevance log, patterns-used files),
//! - the host temp directory for session-scoped scratch state (session
//!   pointer, compaction handoff, disable flag, agent type, learning status).

use std::path::{Path, PathBuf};

/// Project-relative logs directory.
pub const LOGS_DIR: &str = ".claude/data/logs";

/// Returns the logs directory under `project_dir`.
#[must_use]
pub fn logs_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(LOGS_DIR)
}

/// Tool accumulator database path.
#[must_use]
pub fn accumulator_db(project_dir: &Path) -> PathBuf {
    logs_dir(project_dir).join("ace-tools.db")
}

/// Relevance log path (current generation).
#[must_use]
pub fn relevance_log(project_dir: &Path) -> PathBuf {
    logs_dir(project_dir).join("ace-relevance.jsonl")
}

/// Per-session pattern-ID handoff file (written by the pre-task hook,
/// consumed once by the stop hook).
#[must_use]
pub fn patterns_used_file(project_dir: &Path, session_id: &str) -> PathBuf {
    logs_dir(project_dir).join(format!("ace-patterns-used-{session_id}.json"))
}

/// Session pointer for the pre-compact hook, keyed by project.
#[must_use]
pub fn session_pointer_file(project_id: &str) -> PathBuf {
    std::env::temp_dir().join(format!("ace-session-{project_id}.txt"))
}

/// Domain summary scratch file for downstream domain-shift detection.
#[must_use]
pub fn domains_file(project_id: &str) -> PathBuf {
    std::env::temp_dir().join(format!("ace-domains-{project_id}.json"))
}

/// Compaction handoff file, keyed by session.
#[must_use]
pub fn precompact_handoff_file(session_id: &str) -> PathBuf {
    std::env::temp_dir().join(format!("ace-patterns-precompact-{session_id}.json"))
}

/// Session-scoped kill switch written by the wrapper preflight.
#[must_use]
pub fn disabled_flag(session_id: &str) -> PathBuf {
    std::env::temp_dir().join(format!("ace-disabled-{session_id}.flag"))
}

/// Agent-type hint file populated by the session-start hook.
#[must_use]
pub fn agent_type_file(session_id: &str) -> PathBuf {
    std::env::temp_dir().join(format!("ace-agent-type-{session_id}.txt"))
}

/// Async learning status file, the sole channel between the detached
/// learning worker and later sessions.
#[must_use]
pub fn learning_status_file(session_id: &str) -> PathBuf {
    std::env::temp_dir().join(format!("ace-learning-status-{session_id}.json"))
}

/// Debug log sink, active when `ACE_DEBUG_HOOKS=1`.
#[must_use]
pub fn debug_log_path() -> PathBuf {
    std::env::temp_dir().join("ace_hook_debug.log")
}
