//! Hook event handlers.
//!
//! One handler per host event, all implementing [`HookHandler`]: a hook
//! reads a single JSON event from stdin, performs its side effects, and
//! prints a single JSON response to stdout. Handlers never fail the host:
//! the binary catches every error and exits 0 with at most an informational
//! system message.
//!
//! # Hook Response JSON Format
//!
//! The host honors different response fields per event type.
//!
//! | Event | `systemMessage` | `hookSpecificOutput` |
//! |-------|-----------------|----------------------|
//! | UserPromptSubmit | yes | yes, `hookEventName: "UserPromptSubmit"` |
//! | PostToolUse | ignored | none emitted |
//! | Stop / SubagentStop | yes | yes |
//! | PreCompact | yes | **forbidden by the host schema** |
//! | SessionStart | yes | yes, `hookEventName: "SessionStart"` |
//! | PermissionRequest | n/a | `decision {behavior, message}` |
//!
//! The PreCompact restriction is structural: [`PreCompactResponse`] has no
//! `hookSpecificOutput` field at all, so a context-injecting PreCompact
//! response cannot be expressed. Pattern re-injection after compaction goes
//! through the SessionStart handler instead, via an on-disk handoff.

mod permission;
mod post_tool_use;
mod pre_compact;
mod session_start;
mod stop;
mod user_prompt;

pub use permission::PermissionHandler;
pub use post_tool_use::PostToolUseHandler;
pub use pre_compact::PreCompactHandler;
pub use session_start::SessionStartHandler;
pub use stop::{StopHandler, run_learn_worker};
pub use user_prompt::UserPromptHandler;

use crate::{Error, Result};
use serde::Serialize;

/// Trait for hook handlers.
pub trait HookHandler: Send + Sync {
    /// The hook event type this handler processes.
    fn event_type(&self) -> &'static str;

    /// Handles the hook event.
    ///
    /// Returns the JSON response body to print on stdout.
    ///
    /// # Errors
    ///
    /// Returns an error if handling fails. The binary converts any error
    /// into an empty response and still exits 0.
    fn handle(&self, input: &str) -> Result<String>;
}

/// Standard hook response for events that admit context injection.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HookResponse {
    /// Whether the host should continue. Emitted only on skip paths that
    /// want to be explicit about it.
    #[serde(rename = "continue", skip_serializing_if = "Option::is_none")]
    pub continue_: Option<bool>,
    /// User-visible message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
    /// Context injection block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook_specific_output: Option<HookSpecificOutput>,
}

/// The `hookSpecificOutput` block of a [`HookResponse`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookSpecificOutput {
    /// Must equal the event name the host used for this hook type.
    pub hook_event_name: String,
    /// Opaque string injected into the assistant's context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
}

impl HookResponse {
    /// An empty `{}` response.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A response carrying only a user-visible message.
    #[must_use]
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            system_message: Some(text.into()),
            ..Self::default()
        }
    }

    /// A response carrying a message and injected context.
    #[must_use]
    pub fn with_context(
        text: impl Into<String>,
        event_name: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            system_message: Some(text.into()),
            hook_specific_output: Some(HookSpecificOutput {
                hook_event_name: event_name.into(),
                additional_context: Some(context.into()),
            }),
            ..Self::default()
        }
    }

    /// Serializes to the JSON body the binary prints.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::OperationFailed {
            operation: "serialize_hook_response".to_string(),
            cause: e.to_string(),
        })
    }
}

/// Response type for the PreCompact hook.
///
/// The host rejects any PreCompact payload containing `hookSpecificOutput`,
/// so this type cannot carry one.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PreCompactResponse {
    /// User-visible message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
}

impl PreCompactResponse {
    /// A response carrying only a user-visible message.
    #[must_use]
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            system_message: Some(text.into()),
        }
    }

    /// Serializes to the JSON body the binary prints.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::OperationFailed {
            operation: "serialize_hook_response".to_string(),
            cause: e.to_string(),
        })
    }
}

/// Parses a hook event body, mapping JSON errors to [`Error::InvalidInput`].
pub(crate) fn parse_event(input: &str) -> Result<serde_json::Value> {
    serde_json::from_str(input).map_err(|e| Error::InvalidInput(format!("bad hook event: {e}")))
}
