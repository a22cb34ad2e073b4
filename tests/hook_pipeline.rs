//! End-to-end runs of the learning loop against a stub store CLI:
//! prompt submission, tool accumulation, and the stop-hook learn, wired
//! through the same handlers the binary dispatches to.

use ace_hooks::accumulator::ToolAccumulator;
use ace_hooks::hooks::{HookHandler, PostToolUseHandler, StopHandler, UserPromptHandler};
use ace_hooks::{paths, relevance};
use std::path::{Path, PathBuf};

/// Project fixture with a resolvable settings document.
fn project(project_id: &str) -> tempfile::TempDir {
    let tmp = tempfile::tempdir().unwrap();
    let claude = tmp.path().join(".claude");
    std::fs::create_dir_all(&claude).unwrap();
    std::fs::write(
        claude.join("settings.json"),
        format!(r#"{{"projectId": "{project_id}"}}"#),
    )
    .unwrap();
    tmp
}

/// Stub CLI answering every subcommand the pipeline touches. The learn
/// payload is captured to a file so assertions can inspect the trace.
fn stub_cli(dir: &Path, search_body: &str) -> (String, PathBuf) {
    let capture = dir.join("learn-payload.json");
    let path = dir.join("stub-cli");
    let script = format!(
        concat!(
            "#!/bin/sh\n",
            "case \"$1\" in\n",
            "  --version) printf '1.2.0' ;;\n",
            "  whoami) printf '{{\"authenticated\":true,\"token_expires_in\":100000.0}}' ;;\n",
            "  search) cat >/dev/null; printf '%s' '{search}' ;;\n",
            "  learn) cat > '{capture}'; printf '{{\"learning_statistics\":{{\"patterns_created\":1,\"average_confidence\":0.9}}}}' ;;\n",
            "  cache) printf '{{\"similar_patterns\":[],\"count\":0}}' ;;\n",
            "  *) printf '{{}}' ;;\n",
            "esac\n",
        ),
        search = search_body,
        capture = capture.display(),
    );
    std::fs::write(&path, script).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    (path.to_string_lossy().into_owned(), capture)
}

fn write_transcript(dir: &Path, prompt: &str) -> PathBuf {
    let path = dir.join("transcript.jsonl");
    let entry = serde_json::json!({"message": {"role": "user", "content": prompt}});
    std::fs::write(&path, format!("{entry}\n")).unwrap();
    path
}

fn run_tool(project_dir: &Path, session: &str, tool: &str, id: &str) {
    let handler = PostToolUseHandler::new().with_project_dir(project_dir.to_path_buf());
    let event = serde_json::json!({
        "session_id": session,
        "tool_name": tool,
        "tool_input": {"file_path": "src/lib.rs"},
        "tool_response": {"success": true},
        "tool_use_id": id,
    });
    handler.handle(&event.to_string()).unwrap();
}

#[test]
fn test_prompt_to_stop_roundtrip() {
    let project_id = format!("prj_e2e_{}", std::process::id());
    let tmp = project(&project_id);
    let session = format!("e2e-{}", std::process::id());
    let search_body = r#"{"similar_patterns":[{"id":"ctx-jwt","content":"Rotate refresh tokens server-side","confidence":0.9,"helpful":3,"domain":"auth","section":"strategies"}],"count":1}"#;
    let (cli, capture) = stub_cli(tmp.path(), search_body);

    // Retrieval: patterns injected, handoff and session pointer written.
    let prompt_handler = UserPromptHandler::new()
        .with_project_dir(tmp.path().to_path_buf())
        .with_cli_binary(cli.clone());
    let event = serde_json::json!({
        "session_id": session,
        "prompt": "implement JWT refresh for the API",
    });
    let out = prompt_handler.handle(&event.to_string()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert!(
        parsed["systemMessage"]
            .as_str()
            .unwrap()
            .contains("Found 1 relevant patterns")
    );
    let context = parsed["hookSpecificOutput"]["additionalContext"]
        .as_str()
        .unwrap();
    assert!(context.starts_with("<ace-patterns agent-type=\"main\">"));
    assert!(context.contains("Rotate refresh tokens"));
    assert!(paths::patterns_used_file(tmp.path(), &session).exists());
    assert_eq!(
        std::fs::read_to_string(paths::session_pointer_file(&project_id))
            .unwrap()
            .trim(),
        session
    );

    // Execution: two substantial tool calls accumulate.
    run_tool(tmp.path(), &session, "Edit", "tu_1");
    run_tool(tmp.path(), &session, "Bash", "tu_2");

    // Completion: trace submitted, correlation consumed, accumulator
    // cleared.
    let transcript = write_transcript(tmp.path(), "implement JWT refresh for the API");
    let stop_handler = StopHandler::new()
        .with_project_dir(tmp.path().to_path_buf())
        .with_cli_binary(cli);
    let event = serde_json::json!({
        "session_id": session,
        "transcript_path": transcript.to_string_lossy(),
        "last_assistant_message": "Added token rotation",
    });
    let out = stop_handler.handle(&event.to_string()).unwrap();
    assert!(out.contains("Learning captured!"));

    let trace: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&capture).unwrap()).unwrap();
    assert_eq!(trace["playbook_used"][0], "ctx-jwt");
    assert_eq!(trace["trajectory"].as_array().unwrap().len(), 2);
    assert!(trace["task"].as_str().unwrap().contains("implement JWT refresh"));
    assert_eq!(trace["result"]["success"], true);
    assert_eq!(trace["result"]["summary"], "Added token rotation");

    assert!(!paths::patterns_used_file(tmp.path(), &session).exists());
    assert!(
        ToolAccumulator::new(tmp.path())
            .get(&session)
            .unwrap()
            .is_empty()
    );

    // Both ends of the loop landed in the relevance log.
    let entries = relevance::read_all_entries(tmp.path());
    let search = entries.iter().find(|e| e["event"] == "search").unwrap();
    assert_eq!(search["session_id"], session.as_str());
    assert_eq!(search["patterns_injected"], 1);
    // Abbreviation expansion reached the logged query.
    assert!(
        search["search_query"]
            .as_str()
            .unwrap()
            .contains("JSON Web Token")
    );
    let exec = entries.iter().find(|e| e["event"] == "execution").unwrap();
    assert_eq!(exec["pattern_ids"][0], "ctx-jwt");
    assert_eq!(exec["learning_sent"], true);

    let _ = std::fs::remove_file(paths::session_pointer_file(&project_id));
    let _ = std::fs::remove_file(paths::domains_file(&project_id));
}

#[test]
fn test_deprecated_pattern_ids_never_reach_the_trace() {
    let project_id = format!("prj_dep_{}", std::process::id());
    let tmp = project(&project_id);
    let session = format!("dep-{}", std::process::id());
    // One store-issued ID, one deprecated-prefix ID that must be dropped.
    let search_body = r#"{"similar_patterns":[{"id":"ctx-ok","content":"Use prepared statements","confidence":0.9,"helpful":2,"domain":"database"},{"id":"pattern_123","content":"Old format","confidence":0.8,"helpful":1,"domain":"database"}],"count":2}"#;
    let (cli, capture) = stub_cli(tmp.path(), search_body);

    let prompt_handler = UserPromptHandler::new()
        .with_project_dir(tmp.path().to_path_buf())
        .with_cli_binary(cli.clone());
    let event = serde_json::json!({
        "session_id": session,
        "prompt": "harden the database layer",
    });
    prompt_handler.handle(&event.to_string()).unwrap();

    run_tool(tmp.path(), &session, "Edit", "tu_d1");

    let transcript = write_transcript(tmp.path(), "harden the database layer");
    let stop_handler = StopHandler::new()
        .with_project_dir(tmp.path().to_path_buf())
        .with_cli_binary(cli);
    let event = serde_json::json!({
        "session_id": session,
        "transcript_path": transcript.to_string_lossy(),
    });
    stop_handler.handle(&event.to_string()).unwrap();

    let trace: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&capture).unwrap()).unwrap();
    let used: Vec<&str> = trace["playbook_used"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert_eq!(used, vec!["ctx-ok"]);

    let _ = std::fs::remove_file(paths::session_pointer_file(&project_id));
    let _ = std::fs::remove_file(paths::domains_file(&project_id));
}

#[test]
fn test_stop_without_prior_prompt_submits_empty_playbook() {
    let project_id = format!("prj_nop_{}", std::process::id());
    let tmp = project(&project_id);
    let session = format!("nop-{}", std::process::id());
    let (cli, capture) = stub_cli(tmp.path(), r#"{"similar_patterns":[],"count":0}"#);

    run_tool(tmp.path(), &session, "Write", "tu_w1");

    let transcript = write_transcript(tmp.path(), "write the migration script");
    let stop_handler = StopHandler::new()
        .with_project_dir(tmp.path().to_path_buf())
        .with_cli_binary(cli);
    let event = serde_json::json!({
        "session_id": session,
        "transcript_path": transcript.to_string_lossy(),
    });
    let out = stop_handler.handle(&event.to_string()).unwrap();
    assert!(out.contains("Learning captured!"));

    let trace: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&capture).unwrap()).unwrap();
    assert!(trace["playbook_used"].as_array().unwrap().is_empty());
}
