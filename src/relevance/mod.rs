//! Relevance log: append-only JSONL stream of retrieval and execution events.
//!
//! Three record shapes share the stream, discriminated by `event`: `search`
//! (what was retrieved for a prompt), `domain_shift` (a mid-session topic
//! change), and `execution` (what the session actually did). The insights
//! analyzer consumes all three.
//!
//! Writes are single lines appended without buffering, so a killed hook
//! loses at most the record it was writing. Any write failure is swallowed:
//! logging must never block the hook's real work.

use crate::models::Pattern;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Rotate once the current log reaches this size.
const ROTATE_BYTES: u64 = 10 * 1024 * 1024;

/// Rotated generations kept alongside the current file.
const ROTATE_KEEP: u32 = 3;

const MAX_PROMPT_LEN: usize = 200;
const MAX_QUERY_LEN: usize = 100;
const MAX_FILE_PATH_LEN: usize = 200;
const MAX_DOMAINS: usize = 10;
const MAX_TOP_PATTERNS: usize = 5;
const MAX_PATTERN_IDS: usize = 20;

/// Truncates `s` to at most `max` characters, on a char boundary.
#[must_use]
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Condensed view of one retrieved pattern, kept in `search` records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopPattern {
    /// Store-issued pattern ID.
    pub id: String,
    /// Retrieval confidence.
    pub confidence: f64,
    /// Helpful counter at retrieval time.
    pub helpful: i64,
    /// Harmful counter at retrieval time.
    pub harmful: i64,
    /// Abstract domain label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Playbook section label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl From<&Pattern> for TopPattern {
    fn from(p: &Pattern) -> Self {
        Self {
            id: p.id.clone().unwrap_or_default(),
            confidence: p.confidence,
            helpful: p.helpful,
            harmful: p.harmful,
            domain: p.domain.clone(),
            section: p.section.clone(),
        }
    }
}

/// A pattern-retrieval event, one per pre-task search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchEvent {
    /// Wall time, ISO-8601.
    pub timestamp: String,
    /// Record discriminator, always `search`.
    pub event: String,
    /// Emitting hook name.
    pub hook: String,
    /// Host session ID.
    pub session_id: String,
    /// Project ID from the resolved context.
    pub project_id: String,
    /// Org ID, absent in single-org mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    /// User prompt, truncated.
    pub user_prompt: String,
    /// Expanded search query, truncated.
    pub search_query: String,
    /// Patterns the store returned.
    pub patterns_returned: usize,
    /// Patterns injected after the client-side quality filter.
    pub patterns_injected: usize,
    /// Patterns dropped by the filter.
    pub patterns_filtered: usize,
    /// Mean confidence over the injected set.
    pub avg_confidence: f64,
    /// Domains seen in the injected set, truncated.
    pub domains: Vec<String>,
    /// Condensed top patterns, truncated.
    pub top_patterns: Vec<TopPattern>,
}

/// A mid-session domain-shift event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainShiftEvent {
    /// Wall time, ISO-8601.
    pub timestamp: String,
    /// Record discriminator, always `domain_shift`.
    pub event: String,
    /// Host session ID.
    pub session_id: String,
    /// Domain before the shift.
    pub from_domain: String,
    /// Domain after the shift.
    pub to_domain: String,
    /// File path that triggered the detection, truncated.
    pub file_path: String,
    /// Patterns found by the follow-up search.
    pub patterns_found: usize,
    /// Whether the follow-up search succeeded.
    pub search_succeeded: bool,
}

/// An end-of-task execution event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionEvent {
    /// Wall time, ISO-8601.
    pub timestamp: String,
    /// Record discriminator, always `execution`.
    pub event: String,
    /// Host session ID.
    pub session_id: String,
    /// Full count of pattern IDs offered, before truncation.
    #[serde(default)]
    pub patterns_used_count: usize,
    /// Pattern IDs offered to the session, truncated.
    pub pattern_ids: Vec<String>,
    /// Tool calls in the trajectory.
    pub tools_executed: usize,
    /// State-changing tool calls in the trajectory.
    pub state_changing_tools: usize,
    /// Derived task success.
    pub success: bool,
    /// Wall time from first to last tool, seconds.
    pub execution_time_seconds: f64,
    /// Whether a learn request was submitted.
    pub learning_sent: bool,
    /// `main` or a subagent label.
    pub agent_type: String,
}

/// Appender over `<project>/.claude/data/logs/ace-relevance.jsonl`.
pub struct RelevanceLogger {
    log_path: PathBuf,
}

impl RelevanceLogger {
    /// Creates a logger rooted at `project_dir`.
    #[must_use]
    pub fn new(project_dir: &Path) -> Self {
        Self {
            log_path: crate::paths::relevance_log(project_dir),
        }
    }

    /// Creates a logger over an explicit log path (tests).
    #[must_use]
    pub fn with_log_path(log_path: PathBuf) -> Self {
        Self { log_path }
    }

    /// Logs a `search` event. Truncates oversized fields first.
    pub fn log_search(&self, mut event: SearchEvent) {
        event.event = "search".to_string();
        event.user_prompt = truncate_chars(&event.user_prompt, MAX_PROMPT_LEN);
        event.search_query = truncate_chars(&event.search_query, MAX_QUERY_LEN);
        event.domains.truncate(MAX_DOMAINS);
        event.top_patterns.truncate(MAX_TOP_PATTERNS);
        self.append(&event);
    }

    /// Logs a `domain_shift` event.
    pub fn log_domain_shift(&self, mut event: DomainShiftEvent) {
        event.event = "domain_shift".to_string();
        event.file_path = truncate_chars(&event.file_path, MAX_FILE_PATH_LEN);
        self.append(&event);
    }

    /// Logs an `execution` event. The full ID count is recorded before the
    /// ID list itself is truncated.
    pub fn log_execution(&self, mut event: ExecutionEvent) {
        event.event = "execution".to_string();
        event.patterns_used_count = event.pattern_ids.len();
        event.pattern_ids.truncate(MAX_PATTERN_IDS);
        self.append(&event);
    }

    /// Serializes and appends one record, rotating first if needed.
    /// Failures are swallowed.
    fn append<T: Serialize>(&self, record: &T) {
        let Ok(line) = serde_json::to_string(record) else {
            return;
        };
        self.rotate_if_needed();

        if let Some(parent) = self.log_path.parent() {
            if std::fs::create_dir_all(parent).is_err() {
                return;
            }
        }
        if let Ok(mut f) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
        {
            let _ = writeln!(f, "{line}");
        }
    }

    /// Shifts the rotation chain when the current file is at or past the
    /// size threshold: `.2` becomes `.3` (overwriting it), `.1` becomes
    /// `.2`, current becomes `.1`. A would-be `.4` therefore never exists.
    fn rotate_if_needed(&self) {
        let size = match std::fs::metadata(&self.log_path) {
            Ok(m) => m.len(),
            Err(_) => return,
        };
        if size < ROTATE_BYTES {
            return;
        }

        for generation in (1..ROTATE_KEEP).rev() {
            let from = self.rotated_path(generation);
            if from.exists() {
                let _ = std::fs::rename(&from, self.rotated_path(generation + 1));
            }
        }
        let _ = std::fs::rename(&self.log_path, self.rotated_path(1));
    }

    fn rotated_path(&self, generation: u32) -> PathBuf {
        let stem = self
            .log_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("ace-relevance");
        self.log_path
            .with_file_name(format!("{stem}.{generation}.jsonl"))
    }
}

/// Reads every record from the rotated generations (oldest first) and the
/// current file, as loosely-typed JSON. Unparseable lines are skipped.
#[must_use]
pub fn read_all_entries(project_dir: &Path) -> Vec<serde_json::Value> {
    read_entries_from_log(&crate::paths::relevance_log(project_dir))
}

/// Same as [`read_all_entries`], rooted at an explicit log file. Used by the
/// insights command's `--log-dir` override.
#[must_use]
pub fn read_entries_from_log(current: &Path) -> Vec<serde_json::Value> {
    let current = current.to_path_buf();
    let logger = RelevanceLogger::with_log_path(current.clone());

    let mut paths: Vec<PathBuf> = (1..=ROTATE_KEEP).rev().map(|g| logger.rotated_path(g)).collect();
    paths.push(current);

    let mut entries = Vec::new();
    for path in paths {
        let Ok(contents) = std::fs::read_to_string(&path) else {
            continue;
        };
        for line in contents.lines() {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(line) {
                entries.push(value);
            }
        }
    }
    entries
}
