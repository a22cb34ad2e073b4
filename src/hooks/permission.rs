//! Permission request hook handler.
//!
//! Gates Bash permission requests that invoke the store CLI. Read-only
//! subcommands are auto-allowed, the one destructive subcommand is
//! auto-denied (users go through an explicit confirmation command instead),
//! and everything else passes through for the user to decide. The narrow
//! allow list is a security invariant, not a convenience.

use super::HookHandler;
use crate::{Error, Result};
use serde::Serialize;

/// Read-only store subcommands safe to auto-approve.
const SAFE_SUBCOMMANDS: [&str; 7] = [
    "search",
    "status",
    "patterns",
    "top",
    "get-playbook",
    "doctor",
    "tune",
];

/// Destructive store subcommands that are auto-denied.
const DANGEROUS_SUBCOMMANDS: [&str; 1] = ["clear"];

const CLI_NAMES: [&str; 2] = [crate::store::CLI_NAME, crate::store::CLI_NAME_DEPRECATED];

/// Auto-decision response for a permission request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct PermissionResponse {
    hook_event_name: &'static str,
    decision: PermissionDecision,
}

#[derive(Debug, Clone, Serialize)]
struct PermissionDecision {
    behavior: &'static str,
    message: String,
}

/// Handles `PermissionRequest` hook events.
pub struct PermissionHandler;

impl PermissionHandler {
    /// Creates the handler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn run(event: &serde_json::Value) -> Result<String> {
        let tool_name = event["tool_name"].as_str().unwrap_or_default();
        let command = event["command"].as_str().unwrap_or_default();

        // Only Bash invocations of the store CLI are gated.
        if tool_name != "Bash" || !CLI_NAMES.iter().any(|cli| command.contains(cli)) {
            return Ok("{}".to_string());
        }

        for cli in CLI_NAMES {
            for sub in SAFE_SUBCOMMANDS {
                let candidate = format!("{cli} {sub}");
                if command.contains(&candidate) {
                    return serialize(PermissionResponse {
                        hook_event_name: "PermissionRequest",
                        decision: PermissionDecision {
                            behavior: "allow",
                            message: format!("✅ [ACE] Auto-approved: {candidate}"),
                        },
                    });
                }
            }
            for sub in DANGEROUS_SUBCOMMANDS {
                let candidate = format!("{cli} {sub}");
                if command.contains(&candidate) {
                    return serialize(PermissionResponse {
                        hook_event_name: "PermissionRequest",
                        decision: PermissionDecision {
                            behavior: "deny",
                            message: format!(
                                "⛔ [ACE] Blocked destructive command: {candidate}\nUse `/ace-clear` command for confirmation prompts."
                            ),
                        },
                    });
                }
            }
        }

        // Subcommands like learn or bootstrap modify data but are not
        // destructive; the user decides.
        Ok("{}".to_string())
    }
}

fn serialize(response: PermissionResponse) -> Result<String> {
    serde_json::to_string(&response).map_err(|e| Error::OperationFailed {
        operation: "serialize_permission_response".to_string(),
        cause: e.to_string(),
    })
}

impl Default for PermissionHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl HookHandler for PermissionHandler {
    fn event_type(&self) -> &'static str {
        "PermissionRequest"
    }

    fn handle(&self, input: &str) -> Result<String> {
        let event = super::parse_event(input)?;
        Self::run(&event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn decide(tool: &str, command: &str) -> serde_json::Value {
        let event = serde_json::json!({"tool_name": tool, "command": command});
        let out = PermissionHandler::new().handle(&event.to_string()).unwrap();
        serde_json::from_str(&out).unwrap()
    }

    #[test_case("ace-cli search --stdin --json"; "preferred search")]
    #[test_case("ce-ace status"; "deprecated status")]
    #[test_case("ace-cli doctor"; "doctor")]
    #[test_case("ace-cli tune"; "tune")]
    fn test_auto_allows_read_only(command: &str) {
        let decision = decide("Bash", command);
        assert_eq!(decision["decision"]["behavior"], "allow");
        assert_eq!(decision["hookEventName"], "PermissionRequest");
    }

    #[test_case("ace-cli clear"; "preferred clear")]
    #[test_case("ce-ace clear --all"; "deprecated clear")]
    fn test_auto_denies_destructive(command: &str) {
        let decision = decide("Bash", command);
        assert_eq!(decision["decision"]["behavior"], "deny");
        assert!(
            decision["decision"]["message"]
                .as_str()
                .unwrap()
                .contains("/ace-clear")
        );
    }

    #[test_case("ace-cli learn --stdin"; "learn passes through")]
    #[test_case("ace-cli bootstrap"; "bootstrap passes through")]
    #[test_case("cargo build"; "non cli command")]
    fn test_pass_through(command: &str) {
        assert_eq!(decide("Bash", command), serde_json::json!({}));
    }

    #[test]
    fn test_non_bash_tool_passes_through() {
        assert_eq!(decide("Edit", "ace-cli clear"), serde_json::json!({}));
    }
}
