//! Post tool use hook handler.
//!
//! Fires after every tool call and appends it to the accumulator. This is
//! the ground-truth feed for end-of-task trajectories; the transcript is
//! deliberately not used for this. Silent: no output, and any failure is
//! swallowed after a debug log line.

use super::{HookHandler, HookResponse};
use crate::Result;
use crate::accumulator::ToolAccumulator;
use std::path::PathBuf;
use tracing::debug;

/// Handles `PostToolUse` hook events.
pub struct PostToolUseHandler {
    project_dir: PathBuf,
}

impl PostToolUseHandler {
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
        let (Some(session_id), Some(tool_name)) = (
            event["session_id"].as_str().filter(|s| !s.is_empty()),
            event["tool_name"].as_str().filter(|s| !s.is_empty()),
        ) else {
            debug!("post-tool-use event missing session_id or tool_name");
            return HookResponse::empty();
        };

        let tool_use_id = event["tool_use_id"].as_str().unwrap_or_default();
        let tool_input = event
            .get("tool_input")
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        let tool_response = event
            .get("tool_response")
            .cloned()
            .unwrap_or(serde_json::Value::Null);

        let accumulator = ToolAccumulator::new(&self.project_dir);
        if let Err(e) =
            accumulator.append(session_id, tool_name, &tool_input, &tool_response, tool_use_id)
        {
            debug!("tool accumulation failed: {e}");
        }

        HookResponse::empty()
    }
}

impl Default for PostToolUseHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl HookHandler for PostToolUseHandler {
    fn event_type(&self) -> &'static str {
        "PostToolUse"
    }

    fn handle(&self, input: &str) -> Result<String> {
        let event = super::parse_event(input)?;
        self.run(&event).to_json()
    }
}
