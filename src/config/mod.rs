//! Configuration and project context resolution.
//!
//! The hooks read their identity from a project-local settings document at
//! `.claude/settings.json`. Two layouts are recognized:
//!
//! ```json
//! {"orgId": "org_123", "projectId": "prj_456"}
//! ```
//!
//! or the env-wrapper form:
//!
//! ```json
//! {"env": {"ACE_ORG_ID": "org_123", "ACE_PROJECT_ID": "prj_456"}}
//! ```
//!
//! `projectId` is required for any hook to act; `orgId` is optional
//! (single-org deployments omit it). A missing or unparseable settings file
//! resolves to `None` rather than an error, and hooks degrade to a no-op.

use serde::Deserialize;
use std::path::Path;

/// Resolved `(org, project)` identity for the current working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectContext {
    /// Organization ID. Absent in single-org mode.
    pub org: Option<String>,
    /// Project ID. Always present when the context resolved.
    pub project: String,
}

/// Settings file structure (for JSON parsing).
#[derive(Debug, Deserialize, Default)]
struct SettingsFile {
    #[serde(rename = "orgId")]
    org_id: Option<String>,
    #[serde(rename = "projectId")]
    project_id: Option<String>,
    env: Option<SettingsEnv>,
}

#[derive(Debug, Deserialize, Default)]
struct SettingsEnv {
    #[serde(rename = "ACE_ORG_ID")]
    ace_org_id: Option<String>,
    #[serde(rename = "ACE_PROJECT_ID")]
    ace_project_id: Option<String>,
}

impl ProjectContext {
    /// Resolves the project context from `.claude/settings.json` under `dir`.
    ///
    /// Returns `None` when the file is missing, unparseable, or has no
    /// project ID. Read or parse failures are never surfaced as errors.
    #[must_use]
    pub fn resolve(dir: &Path) -> Option<Self> {
        let settings_path = dir.join(".claude").join("settings.json");
        let contents = std::fs::read_to_string(settings_path).ok()?;
        let file: SettingsFile = serde_json::from_str(&contents).ok()?;

        let env = file.env.unwrap_or_default();
        let org = non_empty(file.org_id).or_else(|| non_empty(env.ace_org_id));
        let project = non_empty(file.project_id).or_else(|| non_empty(env.ace_project_id))?;

        Some(Self { org, project })
    }

    /// Resolves from the process working directory.
    #[must_use]
    pub fn resolve_cwd() -> Option<Self> {
        std::env::current_dir()
            .ok()
            .and_then(|dir| Self::resolve(&dir))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Output verbosity for learning feedback, from `ACE_VERBOSITY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Single-line counters.
    Compact,
    /// Multiline breakdown of learning statistics.
    #[default]
    Detailed,
}

impl Verbosity {
    /// Parses a verbosity string. Anything unrecognized is `Detailed`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "compact" => Self::Compact,
            _ => Self::Detailed,
        }
    }

    /// Reads verbosity from the `ACE_VERBOSITY` environment variable.
    #[must_use]
    pub fn from_env() -> Self {
        std::env::var("ACE_VERBOSITY")
            .map(|v| Self::parse(&v))
            .unwrap_or_default()
    }

    /// The `--verbosity` flag value for the store CLI.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Detailed => "detailed",
        }
    }
}

/// Whether hook-level debug logging is enabled (`ACE_DEBUG_HOOKS=1`).
#[must_use]
pub fn debug_hooks_enabled() -> bool {
    std::env::var("ACE_DEBUG_HOOKS").as_deref() == Ok("1")
}

/// Appends a line to the debug log sink when `ACE_DEBUG_HOOKS=1`.
///
/// Silent on any failure; the debug log must never affect hook behavior.
pub fn debug_log(message: &str) {
    if !debug_hooks_enabled() {
        return;
    }
    use std::io::Write;
    if let Ok(mut f) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(crate::paths::debug_log_path())
    {
        let _ = writeln!(f, "{message}");
    }
}
