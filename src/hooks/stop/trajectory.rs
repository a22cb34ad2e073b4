//! Trajectory construction from accumulated tool rows.
//!
//! One step per tool call, in insertion order, with per-tool summarizers
//! for the common host tools. Unknown tools fall through to their name and
//! a truncated stringification.

use crate::accumulator::ToolRow;
use crate::models::TrajectoryStep;
use std::path::Path;

fn file_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown file")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max).collect();
        format!("{head}...")
    } else {
        s.to_string()
    }
}

/// Summarizes what a tool call did, from its input.
#[must_use]
pub fn summarize_action(tool_name: &str, input: &serde_json::Value) -> String {
    let str_field = |field: &str| input[field].as_str().unwrap_or_default();

    match tool_name {
        "Edit" => format!(
            "Edited {}",
            file_name(input["file_path"].as_str().unwrap_or("unknown file"))
        ),
        "Write" => format!(
            "Wrote {}",
            file_name(input["file_path"].as_str().unwrap_or("unknown file"))
        ),
        "Read" => format!(
            "Read {}",
            file_name(input["file_path"].as_str().unwrap_or("unknown file"))
        ),
        "Bash" => {
            let command = input["command"]
                .as_str()
                .unwrap_or_else(|| str_field("description"));
            format!("Ran: {}", truncate(command, 60))
        }
        "Grep" => format!("Searched for: {}", str_field("pattern")),
        "Glob" => format!("Found files matching: {}", str_field("pattern")),
        "Task" => {
            let description = input["description"]
                .as_str()
                .unwrap_or_else(|| str_field("prompt"));
            format!("Spawned task: {}", truncate(description, 60))
        }
        "TodoWrite" => "Updated todo list".to_string(),
        "NotebookEdit" => format!(
            "Edited notebook {}",
            file_name(input["notebook_path"].as_str().unwrap_or("unknown file"))
        ),
        name if name.starts_with("mcp__") => format!("Called MCP: {name}"),
        name => name.to_string(),
    }
}

/// Summarizes a tool call's outcome, from its response.
#[must_use]
pub fn summarize_response(tool_name: &str, response: &serde_json::Value) -> String {
    if let Some(text) = response.as_str() {
        return truncate_plain(text, 100);
    }

    if let Some(error) = response["error"].as_str() {
        return format!("Error: {}", truncate_plain(error, 100));
    }
    if let Some(stderr) = response["stderr"].as_str().filter(|s| !s.is_empty()) {
        return format!("Stderr: {}", truncate_plain(stderr, 100));
    }

    match tool_name {
        "Edit" | "Write" => {
            if response["success"].as_bool().unwrap_or(false) {
                "Success".to_string()
            } else {
                "Failed".to_string()
            }
        }
        "Read" => {
            let content = response["content"].as_str().unwrap_or_default();
            let lines = if content.is_empty() {
                0
            } else {
                content.matches('\n').count() + 1
            };
            format!("Read {lines} lines")
        }
        "Bash" => {
            let exit_code = response["exit_code"]
                .as_i64()
                .or_else(|| response["exitCode"].as_i64())
                .unwrap_or(0);
            if exit_code != 0 {
                return format!("Exit code {exit_code}");
            }
            let stdout = response["stdout"].as_str().unwrap_or_default();
            let first_line = stdout.lines().next().unwrap_or_default();
            if first_line.is_empty() {
                "Success".to_string()
            } else {
                truncate(first_line, 60)
            }
        }
        "Grep" | "Glob" => response["files"].as_array().map_or_else(
            || truncate_plain(&response.to_string(), 100),
            |files| format!("Found {} files", files.len()),
        ),
        "Task" => "Task completed".to_string(),
        _ => truncate_plain(&response.to_string(), 100),
    }
}

fn truncate_plain(s: &str, max: usize) -> String {
    truncate(s, max)
}

/// Builds the ordered trajectory from the session's accumulated rows.
#[must_use]
pub fn build_trajectory(tools: &[ToolRow]) -> Vec<TrajectoryStep> {
    tools
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let input: serde_json::Value =
                serde_json::from_str(&row.tool_input).unwrap_or(serde_json::Value::Null);
            let response: serde_json::Value =
                serde_json::from_str(&row.tool_response).unwrap_or(serde_json::Value::Null);
            TrajectoryStep {
                step: i + 1,
                tool: row.tool_name.clone(),
                action: summarize_action(&row.tool_name, &input),
                result: summarize_response(&row.tool_name, &response),
            }
        })
        .collect()
}

/// Derives task success: true unless any response carried an error
/// indication (`error`, nonempty `stderr`, or a nonzero exit code).
#[must_use]
pub fn derive_success(tools: &[ToolRow]) -> bool {
    !tools.iter().any(|row| {
        let Ok(resp) = serde_json::from_str::<serde_json::Value>(&row.tool_response) else {
            return false;
        };
        let has_error = resp["error"].as_str().is_some_and(|e| !e.is_empty());
        let has_stderr = resp["stderr"].as_str().is_some_and(|s| !s.is_empty());
        let bad_exit = resp["exit_code"]
            .as_i64()
            .or_else(|| resp["exitCode"].as_i64())
            .is_some_and(|c| c != 0);
        has_error || has_stderr || bad_exit
    })
}
