//! Pattern-store CLI adapter.
//!
//! All store access goes through a single external binary, preferred name
//! `ace-cli`, with the deprecated `ce-ace` tolerated as a fallback. Protocol
//! rules:
//!
//! - Org and project identifiers travel via `ACE_ORG_ID`/`ACE_PROJECT_ID`
//!   environment variables, never flags.
//! - Payloads go to the child on stdin as JSON; responses come back on
//!   stdout as JSON, after filtering update-notification lines (prefixed
//!   with a lightbulb emoji).
//! - A nonzero exit that still produced parseable JSON is parsed anyway.
//!   Some auth-status responses exit 1 with a valid `{authenticated: false}`
//!   body.
//! - Every call carries an explicit timeout; a hung CLI must never hang the
//!   hook.

mod process;

pub use process::{CommandOutput, run_with_timeout};

use crate::config::{ProjectContext, Verbosity};
use crate::models::{ExecutionTrace, LearnResponse, SearchResponse};
use crate::{Error, Result};
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;
use tracing::debug;

/// Preferred store CLI binary name.
pub const CLI_NAME: &str = "ace-cli";
/// Deprecated fallback binary name.
pub const CLI_NAME_DEPRECATED: &str = "ce-ace";

/// Minimum CLI version with session pinning (`--pin-session`, `cache recall`).
const PINNING_MIN_VERSION: (u64, u64, u64) = (1, 0, 11);

const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);
const LEARN_TIMEOUT: Duration = Duration::from_secs(300);
const STATUS_TIMEOUT: Duration = Duration::from_secs(5);
const RECALL_TIMEOUT: Duration = Duration::from_secs(5);
const DOMAINS_TIMEOUT: Duration = Duration::from_secs(30);
const WHOAMI_TIMEOUT: Duration = Duration::from_secs(5);

/// Warn about token expiry only below this remaining lifetime, and only for
/// idle users (the server's sliding window extends active users' tokens).
const EXPIRY_WARN_HOURS: f64 = 2.0;
/// Hours without store use after which a user counts as idle.
const IDLE_HOURS: f64 = 46.0;

/// Locates `name` on `PATH`, returning its full path if executable.
#[must_use]
pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(name);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &std::path::Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &std::path::Path) -> bool {
    path.is_file()
}

/// Drops update-notification lines from CLI stdout before JSON parsing.
#[must_use]
pub fn strip_notification_lines(stdout: &str) -> String {
    stdout
        .lines()
        .filter(|line| !line.starts_with('\u{1F4A1}'))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Handle on the external store CLI, bound to a resolved project context.
pub struct StoreCli {
    binary: String,
    org: Option<String>,
    project: Option<String>,
}

impl StoreCli {
    /// Detects the CLI on `PATH` and binds it to `ctx`.
    ///
    /// Prefers [`CLI_NAME`]; falls back to the deprecated alias. Errors when
    /// neither is installed.
    pub fn detect(ctx: Option<&ProjectContext>) -> Result<Self> {
        let binary = if find_in_path(CLI_NAME).is_some() {
            CLI_NAME.to_string()
        } else if find_in_path(CLI_NAME_DEPRECATED).is_some() {
            debug!("falling back to deprecated CLI binary {CLI_NAME_DEPRECATED}");
            CLI_NAME_DEPRECATED.to_string()
        } else {
            return Err(Error::CliUnavailable(format!(
                "neither {CLI_NAME} nor {CLI_NAME_DEPRECATED} found on PATH"
            )));
        };
        Ok(Self::with_binary(binary, ctx))
    }

    /// Binds an explicit binary name or path (tests and wrappers).
    #[must_use]
    pub fn with_binary(binary: impl Into<String>, ctx: Option<&ProjectContext>) -> Self {
        Self {
            binary: binary.into(),
            org: ctx.and_then(|c| c.org.clone()),
            project: ctx.map(|c| c.project.clone()),
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args);
        if let Some(org) = &self.org {
            cmd.env("ACE_ORG_ID", org);
        }
        if let Some(project) = &self.project {
            cmd.env("ACE_PROJECT_ID", project);
        }
        cmd
    }

    /// Runs a CLI call and parses its stdout as `T`.
    ///
    /// Stdout is parsed regardless of exit status; only an unparseable body
    /// from a failed call becomes an error.
    fn call<T: serde::de::DeserializeOwned>(
        &self,
        args: &[&str],
        stdin_payload: Option<&[u8]>,
        timeout: Duration,
        operation: &str,
    ) -> Result<T> {
        let out = run_with_timeout(&mut self.command(args), stdin_payload, timeout, operation)?;
        let body = strip_notification_lines(&out.stdout);

        match serde_json::from_str(&body) {
            Ok(parsed) => Ok(parsed),
            Err(parse_err) => Err(Error::OperationFailed {
                operation: operation.to_string(),
                cause: if out.success() {
                    format!("unparseable response: {parse_err}")
                } else {
                    format!(
                        "exit status {:?}: {}",
                        out.status_code,
                        out.stderr.trim()
                    )
                },
            }),
        }
    }

    /// Searches the store for patterns matching `query`.
    ///
    /// When `session_id` is given the result set is also pinned server-side
    /// to that session (callers should gate on
    /// [`Self::check_session_pinning_available`]).
    pub fn search(&self, query: &str, session_id: Option<&str>) -> Result<SearchResponse> {
        let mut args = vec!["search", "--stdin", "--json"];
        if let Some(sid) = session_id {
            args.push("--pin-session");
            args.push(sid);
        }
        self.call(&args, Some(query.as_bytes()), SEARCH_TIMEOUT, "search")
    }

    /// Submits an execution trace for learning.
    pub fn learn(&self, trace: &ExecutionTrace, verbosity: Verbosity) -> Result<LearnResponse> {
        let payload = serde_json::to_vec(trace).map_err(|e| Error::OperationFailed {
            operation: "learn".to_string(),
            cause: e.to_string(),
        })?;
        self.call(
            &["learn", "--stdin", "--json", "--verbosity", verbosity.as_str()],
            Some(&payload),
            LEARN_TIMEOUT,
            "learn",
        )
    }

    /// Fetches the store status snapshot.
    pub fn status(&self) -> Result<serde_json::Value> {
        self.call(&["status", "--json"], None, STATUS_TIMEOUT, "status")
    }

    /// Recalls patterns pinned to `session_id` from session storage.
    ///
    /// Recall is local and fast; an expired or unknown session is an error
    /// the caller treats as "nothing pinned".
    pub fn recall(&self, session_id: &str) -> Result<SearchResponse> {
        self.call(
            &["cache", "recall", "--session", session_id, "--json"],
            None,
            RECALL_TIMEOUT,
            "recall",
        )
    }

    /// Lists available pattern domains, optionally filtered by a minimum
    /// pattern count.
    pub fn domains(&self, min_patterns: Option<u32>) -> Result<serde_json::Value> {
        let min_str;
        let mut args = vec!["domains", "--json"];
        if let Some(min) = min_patterns.filter(|&m| m > 1) {
            min_str = min.to_string();
            args.push("--min-patterns");
            args.push(&min_str);
        }
        self.call(&args, None, DOMAINS_TIMEOUT, "domains")
    }

    /// Checks authentication and returns a user-facing warning, or `None`
    /// when everything is fine.
    ///
    /// Active users are never warned: the server extends the token on every
    /// call, so a soon-to-expire token with recent use will refresh itself.
    /// Warnings fire only for: not authenticated, the fixed hard cap
    /// approaching, an already-expired token, or an idle user whose token is
    /// about to lapse.
    #[must_use]
    pub fn check_auth_status(&self) -> Option<String> {
        let out = run_with_timeout(
            &mut self.command(&["whoami", "--json"]),
            None,
            WHOAMI_TIMEOUT,
            "whoami",
        )
        .ok()?;

        let body = strip_notification_lines(&out.stdout);
        if let Ok(data) = serde_json::from_str::<serde_json::Value>(&body) {
            return auth_warning_from(&data, chrono::Utc::now());
        }

        // No parseable body at all; a failed call may still carry an auth
        // error on stderr.
        if !out.success() {
            let stderr = out.stderr.to_lowercase();
            if stderr.contains("401") || stderr.contains("unauthorized") || stderr.contains("expired")
            {
                return Some(
                    "[ACE] Session expired. Run /ace-login to re-authenticate.".to_string(),
                );
            }
        }
        None
    }

    /// Verifies the store is reachable and authenticated.
    ///
    /// Returns `(true, None)` on success, `(false, reason)` otherwise.
    #[must_use]
    pub fn ensure_authenticated(&self) -> (bool, Option<String>) {
        let result = run_with_timeout(
            &mut self.command(&["whoami", "--json"]),
            None,
            WHOAMI_TIMEOUT,
            "whoami",
        );
        let out = match result {
            Ok(out) => out,
            Err(e) => return (false, Some(e.to_string())),
        };

        let body = strip_notification_lines(&out.stdout);
        match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(data) if data["authenticated"].as_bool() == Some(true) => (true, None),
            Ok(_) => (
                false,
                Some("not authenticated; run /ace-login".to_string()),
            ),
            Err(_) => (
                false,
                Some(format!("whoami returned no JSON: {}", out.stderr.trim())),
            ),
        }
    }

    /// True when the installed CLI supports session pinning.
    #[must_use]
    pub fn check_session_pinning_available(&self) -> bool {
        let Ok(out) = run_with_timeout(
            &mut self.command(&["--version"]),
            None,
            WHOAMI_TIMEOUT,
            "version",
        ) else {
            return false;
        };
        if !out.success() {
            return false;
        }
        parse_semver(out.stdout.trim())
            .map(|v| v >= PINNING_MIN_VERSION)
            .unwrap_or(false)
    }
}

/// Parses a `major.minor.patch` version string, ignoring any suffix parts.
fn parse_semver(s: &str) -> Option<(u64, u64, u64)> {
    let mut parts = s.split('.');
    let major = parts.next()?.trim().parse().ok()?;
    let minor = parts.next()?.trim().parse().ok()?;
    let patch: u64 = parts
        .next()?
        .trim()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .ok()?;
    Some((major, minor, patch))
}

/// Derives the auth warning from a parsed `whoami` body.
///
/// `now` is injected for testability.
fn auth_warning_from(
    data: &serde_json::Value,
    now: chrono::DateTime<chrono::Utc>,
) -> Option<String> {
    if data["authenticated"].as_bool() != Some(true) {
        return Some("[ACE] Not authenticated. Run /ace-login to setup.".to_string());
    }

    // Hard cap on continuous sessions: warn within the last day even if the
    // current token has plenty of time left.
    if data["is_hard_cap_approaching"].as_bool() == Some(true) {
        let hours = data["hard_cap_hours_remaining"].as_f64().unwrap_or(0.0);
        if hours < 24.0 {
            return Some(format!(
                "[ACE] Session hard limit in {}h. Must re-login after 7 days of continuous use.",
                hours as i64
            ));
        }
    }

    let Some(expires_in) = data["token_expires_in"].as_f64() else {
        // Legacy servers expose only a status string.
        let status = data["token_status"].as_str().unwrap_or_default();
        if status.to_lowercase().contains("expired") {
            return Some("[ACE] Session expired. Run /ace-login to re-authenticate.".to_string());
        }
        return None;
    };

    if expires_in <= 0.0 {
        return Some("[ACE] Session expired. Run /ace-login to re-authenticate.".to_string());
    }

    let expires_in_hours = expires_in / 3600.0;
    if let Some(last_used) = data["last_used_at"]
        .as_str()
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
    {
        let idle_hours = (now - last_used.with_timezone(&chrono::Utc)).num_seconds() as f64 / 3600.0;
        if idle_hours >= IDLE_HOURS && expires_in_hours < EXPIRY_WARN_HOURS {
            return Some(format!(
                "[ACE] Been idle for {}h, token expires in {} min. Your next action will auto-refresh.",
                idle_hours as i64,
                (expires_in / 60.0) as i64
            ));
        }
    } else if expires_in_hours < EXPIRY_WARN_HOURS {
        let mins = (expires_in / 60.0) as i64;
        if mins < 60 {
            return Some(format!(
                "[ACE] Token expires in {mins} minutes. Consider running /ace-login."
            ));
        }
    }

    None
}
