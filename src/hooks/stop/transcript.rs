//! Minimal transcript parsing.
//!
//! The transcript is lossy and may be rewritten under the hook, so exactly
//! one thing is harvested from it: the user's latest prompt, for the task
//! description. Tool-result entries also carry `role: user` and must be
//! skipped. All trajectory data comes from the accumulator instead.

use std::path::Path;

/// Longest task description carried into a trace.
const MAX_PROMPT_LEN: usize = 2000;

/// Fallback when no usable prompt is found.
pub const NO_PROMPT: &str = "No user prompt found";

/// Extracts the user's latest prompt from a JSONL transcript.
///
/// Scans backwards for the last `role: user` entry that is not a synthetic
/// tool-result message and returns its text, truncated. Unreadable files
/// and unparseable lines degrade to [`NO_PROMPT`].
#[must_use]
pub fn latest_user_prompt(transcript_path: &Path) -> String {
    let Ok(contents) = std::fs::read_to_string(transcript_path) else {
        return NO_PROMPT.to_string();
    };

    let entries: Vec<serde_json::Value> = contents
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect();

    for entry in entries.iter().rev() {
        let message = &entry["message"];
        if message["role"].as_str() != Some("user") {
            continue;
        }

        match &message["content"] {
            serde_json::Value::Array(blocks) => {
                let has_tool_result = blocks
                    .iter()
                    .any(|b| b["type"].as_str() == Some("tool_result"));
                if has_tool_result {
                    continue;
                }
                let text: Vec<&str> = blocks
                    .iter()
                    .filter(|b| b["type"].as_str() == Some("text"))
                    .filter_map(|b| b["text"].as_str())
                    .collect();
                let prompt = text.join("\n");
                if !prompt.trim().is_empty() {
                    return truncate(&prompt);
                }
            }
            serde_json::Value::String(content) => {
                if content.trim().len() > 10 {
                    return truncate(content);
                }
            }
            _ => {}
        }
    }

    NO_PROMPT.to_string()
}

fn truncate(s: &str) -> String {
    s.chars().take(MAX_PROMPT_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_transcript(lines: &[serde_json::Value]) -> (tempfile::TempDir, std::path::PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("transcript.jsonl");
        let body: String = lines.iter().map(|l| format!("{l}\n")).collect();
        std::fs::write(&path, body).unwrap();
        (tmp, path)
    }

    #[test]
    fn test_finds_last_real_user_prompt() {
        let (_tmp, path) = write_transcript(&[
            serde_json::json!({"message": {"role": "user", "content": "first task please"}}),
            serde_json::json!({"message": {"role": "assistant", "content": "done"}}),
            serde_json::json!({"message": {"role": "user", "content": [
                {"type": "text", "text": "implement JWT refresh"}
            ]}}),
            serde_json::json!({"message": {"role": "user", "content": [
                {"type": "tool_result", "tool_use_id": "tu_1", "content": "ok"}
            ]}}),
        ]);
        assert_eq!(latest_user_prompt(&path), "implement JWT refresh");
    }

    #[test]
    fn test_short_string_content_is_skipped() {
        let (_tmp, path) = write_transcript(&[
            serde_json::json!({"message": {"role": "user", "content": "fix the flaky test in ci"}}),
            serde_json::json!({"message": {"role": "user", "content": "ok"}}),
        ]);
        assert_eq!(latest_user_prompt(&path), "fix the flaky test in ci");
    }

    #[test]
    fn test_missing_file_degrades() {
        assert_eq!(
            latest_user_prompt(Path::new("/no/such/transcript.jsonl")),
            NO_PROMPT
        );
    }

    #[test]
    fn test_garbage_lines_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("t.jsonl");
        std::fs::write(
            &path,
            "garbage line\n{\"message\": {\"role\": \"user\", \"content\": \"add retry logic\"}}\n",
        )
        .unwrap();
        assert_eq!(latest_user_prompt(&path), "add retry logic");
    }

    #[test]
    fn test_long_prompt_is_truncated() {
        let long = "x".repeat(5000);
        let (_tmp, path) = write_transcript(&[
            serde_json::json!({"message": {"role": "user", "content": long}}),
        ]);
        assert_eq!(latest_user_prompt(&path).chars().count(), 2000);
    }
}
