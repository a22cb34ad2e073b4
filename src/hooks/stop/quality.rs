//! Quality gates for learning emission.
//!
//! Learning only pays off with meaningful execution feedback. Two gates
//! enforce that: a trivial-task filter on the prompt (plugin commands,
//! read-only queries, greetings) and a substantial-work check on the
//! accumulated tools (at least one state-changing operation).

use crate::accumulator::{ToolRow, is_state_changing};
use once_cell::sync::Lazy;
use regex::Regex;

/// Case-insensitive prompt patterns that mark a task as trivial.
static TRIVIAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // Plugin command invocations. These were being learned as garbage.
        r"<command-message>ace[:\-]",
        r"ace:ace-",
        r"/ace-",
        r"ace-status",
        r"ace-patterns",
        r"ace-search",
        r"ace-learn",
        r"ace-configure",
        r"ace-bootstrap",
        r"ace-clear",
        r"ace-doctor",
        r"ace-export",
        r"ace-import",
        r"ace-top",
        // Simple queries, not implementation work.
        r"^(what|how|why|where|when|can you|could you|would you)\s.*\?$",
        r"^(list|show|display|print|view|see)\s",
        r"^(check|status|version|help|info)\s*$",
        // Read-only git checks.
        r"git\s+(status|log|diff|branch|show)\s*$",
        // File listing.
        r"^ls\s",
        r"^cat\s",
        r"^head\s",
        r"^tail\s",
        // Greetings.
        r"^(hi|hello|hey|thanks|thank you|ok|okay|yes|no|sure)\s*$",
        // Host-generated preambles.
        r"caveat:.*messages below were generated",
        r"^plugin\s*$",
        r"/plugin",
    ]
    .iter()
    .filter_map(|p| Regex::new(&format!("(?i){p}")).ok())
    .collect()
});

/// Returns true when the task description is too trivial to learn from.
#[must_use]
pub fn is_trivial_task(task_description: &str) -> bool {
    let task = task_description.to_lowercase();
    TRIVIAL_PATTERNS.iter().any(|re| re.is_match(&task))
}

/// Returns true when the accumulated tools contain at least one
/// state-changing operation.
#[must_use]
pub fn has_substantial_work(tools: &[ToolRow]) -> bool {
    tools.iter().any(|t| is_state_changing(&t.tool_name))
}
