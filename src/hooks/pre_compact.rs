//! Pre-compact hook handler.
//!
//! Runs before the host compacts the transcript. Recalls the patterns
//! pinned to the current session and parks them in a handoff file for the
//! session-start hook to re-inject afterwards.
//!
//! The host's schema forbids `hookSpecificOutput` on PreCompact; emitting
//! one rejects the whole payload. This handler therefore returns
//! [`PreCompactResponse`], which cannot carry context, and the actual
//! injection happens in [`super::SessionStartHandler`].

use super::{HookHandler, PreCompactResponse};
use crate::config::ProjectContext;
use crate::models::SearchResponse;
use crate::session::{self, PrecompactHandoff};
use crate::store::StoreCli;
use crate::{Result, paths};
use std::path::PathBuf;
use tracing::debug;

/// Handles `PreCompact` hook events.
pub struct PreCompactHandler {
    project_dir: PathBuf,
    cli_override: Option<String>,
}

impl PreCompactHandler {
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

    fn run(&self, event: &serde_json::Value) -> Result<PreCompactResponse> {
        let flag_session = event["session_id"].as_str().unwrap_or("default");
        if session::is_disabled(flag_session) {
            return Ok(PreCompactResponse::default());
        }

        let Some(ctx) = ProjectContext::resolve(&self.project_dir) else {
            return Ok(PreCompactResponse::default());
        };

        // The PreCompact event's own session field is unreliable across
        // host versions; the pointer the pre-task hook wrote is the source
        // of truth for which session holds pinned patterns.
        let Some(session_id) = session::read_session_pointer(&ctx.project) else {
            return Ok(PreCompactResponse::default());
        };

        let cli = match &self.cli_override {
            Some(binary) => StoreCli::with_binary(binary.clone(), Some(&ctx)),
            None => match StoreCli::detect(Some(&ctx)) {
                Ok(cli) => cli,
                Err(e) => {
                    debug!("pre-compact recall unavailable: {e}");
                    return Ok(PreCompactResponse::default());
                }
            },
        };

        let Ok(recalled) = cli.recall(&session_id) else {
            return Ok(PreCompactResponse::default());
        };
        if recalled.count == 0 || recalled.similar_patterns.is_empty() {
            return Ok(PreCompactResponse::default());
        }

        let formatted = format_patterns(&recalled);
        let count = recalled.similar_patterns.len();
        session::write_precompact_handoff(&PrecompactHandoff {
            patterns: formatted,
            session_id: session_id.clone(),
            count,
        })?;

        Ok(PreCompactResponse::message(format!(
            "saved {count} patterns for post-compaction injection"
        )))
    }
}

impl Default for PreCompactHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl HookHandler for PreCompactHandler {
    fn event_type(&self) -> &'static str {
        "PreCompact"
    }

    fn handle(&self, input: &str) -> Result<String> {
        let event = super::parse_event(input)?;
        self.run(&event)?.to_json()
    }
}

/// Formats recalled patterns as a compact bullet list for re-injection.
fn format_patterns(recalled: &SearchResponse) -> String {
    recalled
        .similar_patterns
        .iter()
        .map(|p| {
            let section = p.section.as_deref().unwrap_or("general");
            format!("- [{section}] {}", p.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
