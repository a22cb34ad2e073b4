//! Data model for the hook pipeline.
//!
//! These types mirror the wire shapes exchanged with the external pattern
//! store and the host assistant. Deserialization is lenient throughout:
//! unknown fields are ignored and optional fields default, because the store
//! CLI and the host both evolve independently of this plugin.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A learned pattern returned by the store.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Pattern {
    /// Store-issued pattern ID (`ctx-*`).
    #[serde(default)]
    pub id: Option<String>,
    /// The pattern's advice text.
    #[serde(default)]
    pub content: String,
    /// Retrieval confidence in `[0, 1]`.
    #[serde(default)]
    pub confidence: f64,
    /// Times this pattern was marked helpful.
    #[serde(default)]
    pub helpful: i64,
    /// Times this pattern was marked harmful.
    #[serde(default)]
    pub harmful: i64,
    /// Abstract domain label.
    #[serde(default)]
    pub domain: Option<String>,
    /// Playbook section label.
    #[serde(default)]
    pub section: Option<String>,
}

/// Response shape shared by `search` and `cache recall`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchResponse {
    /// Matching patterns.
    #[serde(default)]
    pub similar_patterns: Vec<Pattern>,
    /// Number of patterns returned.
    #[serde(default)]
    pub count: usize,
    /// Domain summary, when the server provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domains_summary: Option<serde_json::Value>,
    /// Similarity threshold used by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    /// Structured error marker (e.g. `not_authenticated`, `timeout`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Human-readable error message accompanying `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One step of an execution trajectory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrajectoryStep {
    /// 1-based step index.
    pub step: usize,
    /// Tool name as reported by the host.
    pub tool: String,
    /// Short human-readable action summary.
    pub action: String,
    /// Short human-readable result summary.
    pub result: String,
}

/// Task outcome attached to an execution trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceResult {
    /// True iff no tool response carried an error indication.
    pub success: bool,
    /// Short summary of tool volume.
    pub output: String,
    /// Last assistant message, when the host supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Git context captured at trace time.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GitContext {
    /// HEAD commit SHA.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    /// HEAD commit subject line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<String>,
    /// Author name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Author email.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_email: Option<String>,
    /// Author timestamp, ISO-8601.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Current branch name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Files changed in `HEAD~1..HEAD`.
    pub files_changed: usize,
    /// Insertions in `HEAD~1..HEAD`.
    pub insertions: usize,
    /// Deletions in `HEAD~1..HEAD`.
    pub deletions: usize,
    /// Commit SHAs observed in shell tool output during the session.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub session_commits: Vec<String>,
}

/// The payload emitted to the store's `learn` operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionTrace {
    /// User request, truncated and prefixed `User request: `.
    pub task: String,
    /// Ordered tool-call trajectory.
    pub trajectory: Vec<TrajectoryStep>,
    /// Task outcome.
    pub result: TraceResult,
    /// Pattern IDs that were offered to this session.
    pub playbook_used: Vec<String>,
    /// Emission wall time, ISO-8601.
    pub timestamp: String,
    /// `main` or a subagent label.
    pub agent_type: String,
    /// Git context, when the working directory is a git work tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitContext>,
}

/// Learning statistics returned by the store after a `learn` call.
///
/// Newer servers nest the statistics one level deeper
/// (`learning_statistics.learning_statistics`); [`LearnResponse::statistics`]
/// flattens both shapes.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LearningStats {
    /// New patterns created.
    #[serde(default)]
    pub patterns_created: i64,
    /// Existing patterns updated.
    #[serde(default)]
    pub patterns_updated: i64,
    /// Patterns merged into existing ones.
    #[serde(default)]
    pub patterns_merged: i64,
    /// Patterns pruned.
    #[serde(default)]
    pub patterns_pruned: i64,
    /// Average confidence over affected patterns.
    #[serde(default)]
    pub average_confidence: f64,
    /// Net helpful-counter change.
    #[serde(default)]
    pub helpful_delta: i64,
    /// Per-section counts.
    #[serde(default)]
    pub by_section: std::collections::BTreeMap<String, i64>,
    /// Server-side analysis time in seconds.
    #[serde(default)]
    pub analysis_time_seconds: f64,
    /// Nested statistics from CLI v3+ servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_statistics: Option<Box<LearningStats>>,
}

/// Full `learn` response envelope.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LearnResponse {
    /// Statistics, absent on legacy servers.
    #[serde(default)]
    pub learning_statistics: Option<LearningStats>,
}

impl LearnResponse {
    /// Returns the effective statistics, unwrapping the nested v3 shape.
    #[must_use]
    pub fn statistics(&self) -> Option<&LearningStats> {
        let stats = self.learning_statistics.as_ref()?;
        Some(stats.learning_statistics.as_deref().unwrap_or(stats))
    }
}

/// Shape of a valid store-issued pattern ID.
static PATTERN_ID_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^ctx-[a-z0-9-]+$").ok());

/// Returns true when `id` matches the `ctx-<lowercase-alphanumeric>` shape.
///
/// IDs of the deprecated `pattern_*` form (or anything else) are rejected so
/// they never propagate into `playbook_used`.
#[must_use]
pub fn is_valid_pattern_id(id: &str) -> bool {
    PATTERN_ID_RE
        .as_ref()
        .is_some_and(|re| re.is_match(id))
}

/// Removes lone UTF-16 surrogate artifacts that break downstream JSON
/// consumers. Rust strings cannot hold surrogates, but `serde_json` escapes
/// like `\ud83d` can survive a lossy decode as replacement characters; this
/// normalizes any `\u{FFFD}` runs produced along the way.
#[must_use]
pub fn sanitize_unicode(text: &str) -> String {
    text.chars()
        .map(|c| if c == '\u{FFFD}' { ' ' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("ctx-a1b2c3", true; "simple id")]
    #[test_case("ctx-a1-b2-c3", true; "hyphenated id")]
    #[test_case("ctx-", false; "empty suffix")]
    #[test_case("pattern_abc123", false; "deprecated prefix")]
    #[test_case("ctx-ABC", false; "uppercase rejected")]
    #[test_case("ctx-a b", false; "whitespace rejected")]
    #[test_case("", false; "empty string")]
    fn test_pattern_id_shape(id: &str, expected: bool) {
        assert_eq!(is_valid_pattern_id(id), expected);
    }

    #[test]
    fn test_search_response_lenient_parse() {
        let json = r#"{
            "similar_patterns": [{"id": "ctx-x1", "content": "Use WAL mode", "confidence": 0.8}],
            "count": 1,
            "threshold": 0.75,
            "unknown_field": true
        }"#;
        let resp: SearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.count, 1);
        assert_eq!(resp.similar_patterns[0].id.as_deref(), Some("ctx-x1"));
        assert_eq!(resp.similar_patterns[0].helpful, 0);
    }

    #[test]
    fn test_learn_response_flat_stats() {
        let json = r#"{"learning_statistics": {"patterns_created": 2, "average_confidence": 0.85}}"#;
        let resp: LearnResponse = serde_json::from_str(json).unwrap();
        let stats = resp.statistics().unwrap();
        assert_eq!(stats.patterns_created, 2);
    }

    #[test]
    fn test_learn_response_nested_stats() {
        let json = r#"{"learning_statistics": {"learning_statistics": {"patterns_created": 3}}}"#;
        let resp: LearnResponse = serde_json::from_str(json).unwrap();
        let stats = resp.statistics().unwrap();
        assert_eq!(stats.patterns_created, 3);
    }

    #[test]
    fn test_learn_response_missing_stats() {
        let resp: LearnResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.statistics().is_none());
    }

    #[test]
    fn test_execution_trace_serializes_without_git() {
        let trace = ExecutionTrace {
            task: "User request: fix bug".to_string(),
            trajectory: vec![],
            result: TraceResult {
                success: true,
                output: "Executed 0 tool calls".to_string(),
                summary: None,
            },
            playbook_used: vec![],
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            agent_type: "main".to_string(),
            git: None,
        };
        let json = serde_json::to_value(&trace).unwrap();
        assert!(json.get("git").is_none());
        assert!(json["result"].get("summary").is_none());
    }

    #[test]
    fn test_sanitize_unicode_replaces_replacement_chars() {
        assert_eq!(sanitize_unicode("ok\u{FFFD}done"), "ok done");
        assert_eq!(sanitize_unicode("clean"), "clean");
    }
}
