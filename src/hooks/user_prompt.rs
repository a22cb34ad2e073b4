//! User prompt submit hook handler.
//!
//! Retrieval side of the learning loop: searches the pattern store for the
//! user's prompt, injects the results into the assistant's context, and
//! writes the pattern-ID handoff file the stop hook later correlates
//! against.

use super::{HookHandler, HookResponse};
use crate::config::ProjectContext;
use crate::models::{Pattern, SearchResponse, sanitize_unicode};
use crate::relevance::{RelevanceLogger, SearchEvent, TopPattern};
use crate::store::StoreCli;
use crate::{Result, session};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Keep at least this many patterns when quality-filtering.
const FILTER_FLOOR: usize = 3;
/// Apply the quality filter only above this result count.
const FILTER_THRESHOLD: usize = 5;

/// Abbreviations expanded before the query hits the embedding search.
///
/// Deliberately minimal: generic keyword stuffing dilutes the semantic
/// signal, so only unambiguous shorthand is expanded.
const ABBREVIATIONS: [(&str, &str); 8] = [
    (" JWT ", " JSON Web Token "),
    (" API ", " REST API "),
    (" DB ", " database "),
    (" env ", " environment "),
    (" auth ", " authentication "),
    (" config ", " configuration "),
    (" deps ", " dependencies "),
    (" repo ", " repository "),
];

/// Expands known abbreviations using space-bounded matching.
#[must_use]
pub fn expand_abbreviations(prompt: &str) -> String {
    let mut result = format!(" {prompt} ");
    for (abbrev, full) in ABBREVIATIONS {
        result = result.replace(abbrev, full);
    }
    result.trim().to_string()
}

/// Handles `UserPromptSubmit` hook events.
pub struct UserPromptHandler {
    project_dir: PathBuf,
    cli_override: Option<String>,
}

impl UserPromptHandler {
    /// Creates a handler rooted at the process working directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            project_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            cli_override: None,
        }
    }

    /// Roots the handler at an explicit project directory.
    #[must_use]
    pub fn with_project_dir(mut self, dir: PathBuf) -> Self {
        self.project_dir = dir;
        self
    }

    /// Overrides store CLI detection with an explicit binary (tests).
    #[must_use]
    pub fn with_cli_binary(mut self, binary: impl Into<String>) -> Self {
        self.cli_override = Some(binary.into());
        self
    }

    fn cli(&self, ctx: &ProjectContext) -> Result<StoreCli> {
        match &self.cli_override {
            Some(binary) => Ok(StoreCli::with_binary(binary.clone(), Some(ctx))),
            None => StoreCli::detect(Some(ctx)),
        }
    }

    fn run(&self, event: &serde_json::Value) -> Result<HookResponse> {
        let prompt = event["prompt"].as_str().unwrap_or_default().trim();
        if prompt.is_empty() {
            return Ok(HookResponse::empty());
        }
        // Slash prompts are command invocations, not tasks.
        if prompt.starts_with('/') {
            return Ok(HookResponse::empty());
        }

        let Some(ctx) = ProjectContext::resolve(&self.project_dir) else {
            return Ok(HookResponse::message(
                "⚠️ [ACE] No project context found - skipping search",
            ));
        };

        // The host's session ID is the correlation key between retrieval
        // and completion. Never generate one here: the stop hook reads its
        // session ID from its own event, and an invented ID on this side
        // would never match.
        let Some(session_id) = event["session_id"].as_str().filter(|s| !s.is_empty()) else {
            debug!("user prompt event carried no session_id; skipping");
            return Ok(HookResponse::empty());
        };

        let agent_type = session::read_agent_type(session_id);

        let cli = self.cli(&ctx)?;
        let use_pinning = cli.check_session_pinning_available();
        if use_pinning {
            if let Err(e) = session::write_session_pointer(&ctx.project, session_id) {
                debug!("session pointer write failed: {e}");
            }
        }

        let auth_warning = cli.check_auth_status();

        let search_query = expand_abbreviations(prompt);
        let response = match cli.search(&search_query, use_pinning.then_some(session_id)) {
            Ok(response) => response,
            Err(e) => {
                warn!("pattern search failed: {e}");
                let message = auth_warning.unwrap_or_else(|| {
                    "❌ [ACE] Search failed or returned no results".to_string()
                });
                return Ok(HookResponse::message(message));
            }
        };

        // The CLI reports some failures as a structured body, not an exit
        // code.
        if let Some(error_type) = response.error.as_deref() {
            let detail = response
                .message
                .clone()
                .unwrap_or_else(|| "Unknown error".to_string());
            let message = match error_type {
                "not_authenticated" => format!("⚠️ [ACE] {detail}"),
                "timeout" => format!("⏱️ [ACE] {detail}"),
                _ => format!("❌ [ACE] {detail}"),
            };
            return Ok(HookResponse::message(message));
        }

        let mut response = sanitize_response(response);
        let returned = response.similar_patterns.len();
        response.similar_patterns = quality_filter(response.similar_patterns);
        response.count = response.similar_patterns.len();
        let injected = response.count;

        self.write_handoff(session_id, &response.similar_patterns);
        self.write_domains(&ctx, &response);
        self.log_search(
            &ctx,
            session_id,
            prompt,
            &search_query,
            returned,
            &response,
        );

        let context_block = build_context_block(&response, &agent_type)?;
        let mut message = build_summary(&response);
        if let Some(warning) = auth_warning {
            if injected > 0 {
                message = format!("{warning}\n\n{message}");
            } else {
                message = warning;
            }
        }

        Ok(HookResponse::with_context(
            message,
            "UserPromptSubmit",
            context_block,
        ))
    }

    /// Persists the retrieved pattern IDs for end-of-task correlation.
    fn write_handoff(&self, session_id: &str, patterns: &[Pattern]) {
        let ids: Vec<String> = patterns.iter().filter_map(|p| p.id.clone()).collect();
        if ids.is_empty() {
            return;
        }
        if let Err(e) = session::write_patterns_used(&self.project_dir, session_id, &ids) {
            debug!("patterns-used write failed: {e}");
        }
    }

    /// Records the retrieval's domain summary for domain-shift detection.
    fn write_domains(&self, ctx: &ProjectContext, response: &SearchResponse) {
        let summary = response.domains_summary.clone().unwrap_or_else(|| {
            let mut counts = serde_json::Map::new();
            for p in &response.similar_patterns {
                if let Some(domain) = p.domain.as_deref().filter(|d| !d.is_empty()) {
                    let entry = counts.entry(domain).or_insert(serde_json::json!(0));
                    if let Some(n) = entry.as_i64() {
                        *entry = serde_json::json!(n + 1);
                    }
                }
            }
            serde_json::Value::Object(counts)
        });

        if summary.as_object().is_some_and(serde_json::Map::is_empty) {
            return;
        }
        if let Ok(body) = serde_json::to_string(&summary) {
            let _ = std::fs::write(crate::paths::domains_file(&ctx.project), body);
        }
    }

    fn log_search(
        &self,
        ctx: &ProjectContext,
        session_id: &str,
        prompt: &str,
        query: &str,
        returned: usize,
        response: &SearchResponse,
    ) {
        let patterns = &response.similar_patterns;
        let injected = patterns.len();
        let avg_confidence = if injected == 0 {
            0.0
        } else {
            patterns.iter().map(|p| p.confidence).sum::<f64>() / injected as f64
        };
        let mut domains: Vec<String> = patterns
            .iter()
            .filter_map(|p| p.domain.clone())
            .filter(|d| !d.is_empty())
            .collect();
        domains.sort();
        domains.dedup();

        RelevanceLogger::new(&self.project_dir).log_search(SearchEvent {
            timestamp: chrono::Utc::now().to_rfc3339(),
            event: String::new(),
            hook: "UserPromptSubmit".to_string(),
            session_id: session_id.to_string(),
            project_id: ctx.project.clone(),
            org_id: ctx.org.clone(),
            user_prompt: prompt.to_string(),
            search_query: query.to_string(),
            patterns_returned: returned,
            patterns_injected: injected,
            patterns_filtered: returned.saturating_sub(injected),
            avg_confidence,
            domains,
            top_patterns: patterns.iter().map(TopPattern::from).collect(),
        });
    }
}

impl Default for UserPromptHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl HookHandler for UserPromptHandler {
    fn event_type(&self) -> &'static str {
        "UserPromptSubmit"
    }

    fn handle(&self, input: &str) -> Result<String> {
        let event = super::parse_event(input)?;
        self.run(&event)?.to_json()
    }
}

/// Drops low-quality results when the set is large enough to afford it.
///
/// Applied only above [`FILTER_THRESHOLD`] results; keeps the original set
/// whenever filtering would leave fewer than [`FILTER_FLOOR`].
fn quality_filter(patterns: Vec<Pattern>) -> Vec<Pattern> {
    if patterns.len() <= FILTER_THRESHOLD {
        return patterns;
    }
    let high_quality: Vec<Pattern> = patterns
        .iter()
        .filter(|p| p.confidence >= 0.5 || p.helpful >= 2)
        .cloned()
        .collect();
    if high_quality.len() >= FILTER_FLOOR {
        high_quality
    } else {
        patterns
    }
}

/// Scrubs replacement-character artifacts from every text field.
fn sanitize_response(mut response: SearchResponse) -> SearchResponse {
    for p in &mut response.similar_patterns {
        p.content = sanitize_unicode(&p.content);
        if let Some(domain) = &p.domain {
            p.domain = Some(sanitize_unicode(domain));
        }
        if let Some(section) = &p.section {
            p.section = Some(sanitize_unicode(section));
        }
    }
    response
}

/// Builds the `<ace-patterns>` block injected into the assistant's context.
///
/// The agent-type attribute lets the server weight patterns per subagent.
fn build_context_block(response: &SearchResponse, agent_type: &str) -> Result<String> {
    let body = serde_json::to_string_pretty(response).map_err(|e| {
        crate::Error::OperationFailed {
            operation: "serialize_search_response".to_string(),
            cause: e.to_string(),
        }
    })?;
    Ok(format!(
        "<ace-patterns agent-type=\"{agent_type}\">\n{body}\n</ace-patterns>"
    ))
}

/// Builds the user-visible retrieval summary: count, domains, top three.
fn build_summary(response: &SearchResponse) -> String {
    let patterns = &response.similar_patterns;
    if patterns.is_empty() {
        return "ℹ️  [ACE] No patterns found for this query".to_string();
    }

    let mut lines = vec![format!(
        "✅ [ACE] Found {} relevant patterns",
        patterns.len()
    )];

    if let Some(abstract_domains) = response
        .domains_summary
        .as_ref()
        .and_then(|s| s["abstract"].as_array())
    {
        let names: Vec<&str> = abstract_domains.iter().filter_map(|d| d.as_str()).collect();
        if !names.is_empty() {
            let mut shown = names[..names.len().min(3)].join(", ");
            if names.len() > 3 {
                shown.push_str(&format!(" (+{} more)", names.len() - 3));
            }
            lines.push(format!("   Domains: {shown}"));
        }
    }

    for p in patterns.iter().take(3) {
        let content: String = if p.content.chars().count() > 80 {
            let head: String = p.content.chars().take(77).collect();
            format!("{head}...")
        } else {
            p.content.clone()
        };
        let domain = p.domain.as_deref().unwrap_or("general");
        lines.push(format!(
            "   • [{domain}] {content} (+{})",
            p.helpful
        ));
    }

    if patterns.len() > 3 {
        lines.push(format!("   ... and {} more patterns", patterns.len() - 3));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(id: &str, confidence: f64, helpful: i64) -> Pattern {
        Pattern {
            id: Some(id.to_string()),
            content: format!("advice from {id}"),
            confidence,
            helpful,
            ..Pattern::default()
        }
    }

    #[test]
    fn test_expand_abbreviations() {
        assert_eq!(
            expand_abbreviations("implement JWT refresh"),
            "implement JSON Web Token refresh"
        );
        assert_eq!(
            expand_abbreviations("update the DB config now"),
            "update the database configuration now"
        );
        // Substrings inside words stay untouched.
        assert_eq!(expand_abbreviations("DBus daemon"), "DBus daemon");
    }

    #[test]
    fn test_quality_filter_small_set_untouched() {
        let patterns: Vec<Pattern> = (0..4).map(|i| pattern(&format!("ctx-p{i}"), 0.1, 0)).collect();
        assert_eq!(quality_filter(patterns).len(), 4);
    }

    #[test]
    fn test_quality_filter_drops_weak_patterns() {
        let mut patterns: Vec<Pattern> =
            (0..4).map(|i| pattern(&format!("ctx-s{i}"), 0.9, 0)).collect();
        patterns.push(pattern("ctx-w1", 0.1, 0));
        patterns.push(pattern("ctx-w2", 0.2, 1));
        patterns.push(pattern("ctx-h1", 0.1, 5));

        let filtered = quality_filter(patterns);
        let ids: Vec<&str> = filtered.iter().filter_map(|p| p.id.as_deref()).collect();
        assert_eq!(filtered.len(), 5);
        assert!(ids.contains(&"ctx-h1"));
        assert!(!ids.contains(&"ctx-w1"));
    }

    #[test]
    fn test_quality_filter_keeps_original_below_floor() {
        let mut patterns: Vec<Pattern> =
            (0..6).map(|i| pattern(&format!("ctx-w{i}"), 0.1, 0)).collect();
        patterns.push(pattern("ctx-s1", 0.9, 0));
        // Only one survivor, below the floor of three: keep all.
        assert_eq!(quality_filter(patterns).len(), 7);
    }

    #[test]
    fn test_empty_prompt_is_noop() {
        let handler = UserPromptHandler::new();
        let out = handler.handle(r#"{"prompt": "", "session_id": "S1"}"#).unwrap();
        assert_eq!(out, "{}");
    }

    #[test]
    fn test_slash_command_is_noop() {
        let handler = UserPromptHandler::new();
        let out = handler
            .handle(r#"{"prompt": "/ace-status", "session_id": "S1"}"#)
            .unwrap();
        assert_eq!(out, "{}");
        let out = handler
            .handle(r#"{"prompt": "/other-plugin-cmd", "session_id": "S1"}"#)
            .unwrap();
        assert_eq!(out, "{}");
    }

    #[test]
    fn test_missing_context_reports_skip() {
        let tmp = tempfile::tempdir().unwrap();
        let handler = UserPromptHandler::new().with_project_dir(tmp.path().to_path_buf());
        let out = handler
            .handle(r#"{"prompt": "do something real", "session_id": "S1"}"#)
            .unwrap();
        assert!(out.contains("No project context"));
        assert!(!out.contains("hookSpecificOutput"));
    }

    #[test]
    fn test_build_summary_truncates_and_counts() {
        let mut response = SearchResponse::default();
        response.similar_patterns = vec![
            Pattern {
                id: Some("ctx-a".to_string()),
                content: "x".repeat(120),
                confidence: 0.9,
                helpful: 4,
                domain: Some("testing".to_string()),
                ..Pattern::default()
            },
            pattern("ctx-b", 0.8, 0),
            pattern("ctx-c", 0.7, 0),
            pattern("ctx-d", 0.6, 0),
        ];
        let summary = build_summary(&response);
        assert!(summary.contains("Found 4 relevant patterns"));
        assert!(summary.contains("[testing]"));
        assert!(summary.contains("..."));
        assert!(summary.contains("and 1 more patterns"));
    }

    #[test]
    fn test_context_block_carries_agent_type() {
        let response = SearchResponse::default();
        let block = build_context_block(&response, "refactorer").unwrap();
        assert!(block.starts_with("<ace-patterns agent-type=\"refactorer\">"));
        assert!(block.ends_with("</ace-patterns>"));
    }
}
