//! Session start hook handler.
//!
//! Two duties when a session starts after compaction: persist the event's
//! agent type for later hooks, and re-inject any patterns the pre-compact
//! hook parked in the handoff file. Unlike PreCompact, SessionStart admits
//! `hookSpecificOutput`, so this is where the patterns actually reach the
//! assistant again.

use super::{HookHandler, HookResponse};
use crate::config::ProjectContext;
use crate::{Result, session};
use std::path::PathBuf;

/// Handles `SessionStart` hook events.
pub struct SessionStartHandler {
    project_dir: PathBuf,
}

impl SessionStartHandler {
    /// Creates a handler rooted at the process working directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            project_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Roots the handler at an explicit project directory.
    #[must_use]
    pub fn with_project_dir(mut self, dir: PathBuf) -> Self {
        self.project_dir = dir;
        self
    }

    fn run(&self, event: &serde_json::Value) -> HookResponse {
        let event_session = event["session_id"].as_str().unwrap_or("default");
        if session::is_disabled(event_session) {
            return HookResponse::empty();
        }

        // Later hooks attribute learning per agent type; the event is the
        // only place the host reports it.
        if let Some(agent_type) = event["agent_type"].as_str().filter(|s| !s.is_empty()) {
            session::write_agent_type(event_session, agent_type);
        }

        // The handoff is keyed by the pre-compaction session ID; prefer the
        // pointer the pre-task hook wrote, since the post-compaction event
        // may already carry a fresh ID.
        let session_id = ProjectContext::resolve(&self.project_dir)
            .and_then(|ctx| session::read_session_pointer(&ctx.project))
            .unwrap_or_else(|| event_session.to_string());

        let Some(handoff) = session::consume_precompact_handoff(&session_id) else {
            return HookResponse::empty();
        };
        if handoff.count == 0 || handoff.patterns.is_empty() {
            return HookResponse::empty();
        }

        let context = format!(
            "<!-- ACE Patterns (preserved from session {}) -->\n<ace-patterns-recalled>\n{}\n</ace-patterns-recalled>",
            handoff.session_id, handoff.patterns
        );
        HookResponse::with_context(
            format!("Restored {} patterns after compaction", handoff.count),
            "SessionStart",
            context,
        )
    }
}

impl Default for SessionStartHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl HookHandler for SessionStartHandler {
    fn event_type(&self) -> &'static str {
        "SessionStart"
    }

    fn handle(&self, input: &str) -> Result<String> {
        let event = super::parse_event(input)?;
        self.run(&event).to_json()
    }
}
