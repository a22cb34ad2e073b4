//! Text-level lint over the hook wrapper scripts.
//!
//! The never-block contract is enforced where it lives: in the script
//! source. A wrapper that can exit nonzero blocks the user's session, so
//! every wrapper must trap errors to exit 0 and must never spell out a
//! blocking exit.

use regex::Regex;
use std::path::PathBuf;

const WRAPPERS: [&str; 7] = [
    "ace_before_task_wrapper.sh",
    "ace_posttooluse_wrapper.sh",
    "ace_stop_wrapper.sh",
    "ace_subagent_stop_wrapper.sh",
    "ace_precompact_wrapper.sh",
    "ace_sessionstart_compact.sh",
    "ace_permission_wrapper.sh",
];

fn scripts_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scripts")
}

fn read_script(name: &str) -> String {
    let path = scripts_dir().join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}

#[test]
fn test_all_wrappers_exist() {
    for name in WRAPPERS {
        assert!(
            scripts_dir().join(name).exists(),
            "missing wrapper script: {name}"
        );
    }
}

#[test]
fn test_every_wrapper_traps_err_to_exit_zero() {
    for name in WRAPPERS {
        let content = read_script(name);
        assert!(
            content.contains("trap 'exit 0' ERR") || content.contains("trap \"exit 0\" ERR"),
            "{name} is missing the ERR trap"
        );
    }
}

#[test]
fn test_every_wrapper_uses_plain_euo_pipefail() {
    for name in WRAPPERS {
        let content = read_script(name);
        assert!(
            content.contains("set -euo pipefail"),
            "{name} is missing 'set -euo pipefail'"
        );
        // -E propagates the ERR trap into functions and subshells, where a
        // deliberate nonzero (e.g. a failed `command -v` probe) would turn
        // into an early exit.
        assert!(
            !content.contains("set -Eeuo pipefail"),
            "{name} uses 'set -Eeuo pipefail'"
        );
    }
}

#[test]
fn test_no_blocking_exit_anywhere() {
    let exit_one = Regex::new(r"\bexit\s+1\b").unwrap();
    let mut all: Vec<&str> = WRAPPERS.to_vec();
    all.push("ace_common.sh");

    for name in all {
        let content = read_script(name);
        for (lineno, line) in content.lines().enumerate() {
            let stripped = line.trim_start();
            if stripped.starts_with('#') {
                continue;
            }
            assert!(
                !exit_one.is_match(stripped),
                "{name}:{}: blocking exit found: {stripped}",
                lineno + 1
            );
        }
    }
}

#[test]
fn test_wrappers_source_common_helpers() {
    for name in WRAPPERS {
        let content = read_script(name);
        assert!(
            content.contains("ace_common.sh"),
            "{name} does not source ace_common.sh"
        );
        assert!(
            content.contains("ace_run_hook"),
            "{name} does not dispatch through ace_run_hook"
        );
    }
}
