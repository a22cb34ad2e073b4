//! Property checks for the never-block contract: no hook handler may
//! panic, whatever the host feeds it. Malformed JSON surfaces as an error
//! the binary maps to `{}`; well-formed events always produce a response.

use ace_hooks::hooks::{
    HookHandler, PermissionHandler, PostToolUseHandler, PreCompactHandler, SessionStartHandler,
    StopHandler, UserPromptHandler,
};
use proptest::prelude::*;
use std::path::Path;

fn run_all_handlers(project_dir: &Path, input: &str) {
    let dir = project_dir.to_path_buf();
    let _ = UserPromptHandler::new()
        .with_project_dir(dir.clone())
        .handle(input);
    let _ = PostToolUseHandler::new()
        .with_project_dir(dir.clone())
        .handle(input);
    let _ = StopHandler::new().with_project_dir(dir.clone()).handle(input);
    let _ = PreCompactHandler::new()
        .with_project_dir(dir.clone())
        .handle(input);
    let _ = SessionStartHandler::new().with_project_dir(dir).handle(input);
    let _ = PermissionHandler::new().handle(input);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Raw garbage: anything the host could conceivably write to stdin.
    #[test]
    fn handlers_survive_arbitrary_bytes(input in ".{0,200}") {
        let tmp = tempfile::tempdir().unwrap();
        run_all_handlers(tmp.path(), &input);
    }

    // Structurally valid events with arbitrary field content must always
    // produce a response, not an error.
    #[test]
    fn handlers_answer_wellformed_events(
        session in "[a-zA-Z0-9_-]{0,16}",
        prompt in "[^/\\{\\}]{0,60}",
        tool in "[A-Za-z_]{0,12}",
        command in "[a-zA-Z0-9 ./_-]{0,40}",
    ) {
        let tmp = tempfile::tempdir().unwrap();
        let event = serde_json::json!({
            "session_id": session,
            "prompt": prompt,
            "tool_name": tool,
            "command": command,
            "tool_input": {"arbitrary": prompt},
            "tool_response": {"arbitrary": command},
        });
        let input = event.to_string();
        let dir = tmp.path().to_path_buf();

        prop_assert!(UserPromptHandler::new().with_project_dir(dir.clone()).handle(&input).is_ok());
        prop_assert!(PostToolUseHandler::new().with_project_dir(dir.clone()).handle(&input).is_ok());
        prop_assert!(StopHandler::new().with_project_dir(dir.clone()).handle(&input).is_ok());
        prop_assert!(PreCompactHandler::new().with_project_dir(dir.clone()).handle(&input).is_ok());
        prop_assert!(SessionStartHandler::new().with_project_dir(dir).handle(&input).is_ok());
        prop_assert!(PermissionHandler::new().handle(&input).is_ok());
    }
}

#[test]
fn handlers_survive_canonical_edge_events() {
    let tmp = tempfile::tempdir().unwrap();
    for input in [
        "",
        "{}",
        "null",
        "[]",
        "42",
        r#"{"session_id": null}"#,
        r#"{"session_id": ""}"#,
        r#"{"prompt": 17}"#,
        r#"{"tool_name": {"nested": true}}"#,
        "{\"prompt\": \"\\u0000\"}",
    ] {
        run_all_handlers(tmp.path(), input);
    }
}
