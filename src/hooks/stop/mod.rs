//! Stop / end-of-task hook handler.
//!
//! Completion side of the learning loop. Builds an execution trace from the
//! accumulated tools, quality-gates it, correlates it with the pattern IDs
//! the pre-task hook wrote, submits it to the store for learning, and
//! clears the session's accumulator rows. Also fires for `SubagentStop`,
//! where the subagent's transcript supplies the task description.

mod quality;
mod report;
mod trajectory;
mod transcript;

pub use quality::{has_substantial_work, is_trivial_task};
pub use report::{format_learn_failure, format_learning_message};
pub use trajectory::{build_trajectory, derive_success, summarize_action, summarize_response};
pub use transcript::latest_user_prompt;

use super::{HookHandler, HookResponse, HookSpecificOutput};
use crate::accumulator::{ToolAccumulator, is_state_changing};
use crate::config::{ProjectContext, Verbosity};
use crate::models::{ExecutionTrace, TraceResult};
use crate::relevance::{ExecutionEvent, RelevanceLogger};
use crate::session::{LearningState, LearningStatus};
use crate::store::StoreCli;
use crate::{Error, Result, session};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, warn};

/// Longest assistant summary carried into a trace.
const MAX_SUMMARY_LEN: usize = 2000;

/// Handles `Stop` and `SubagentStop` hook events.
pub struct StopHandler {
    project_dir: PathBuf,
    cli_override: Option<String>,
}

impl StopHandler {
    /// Creates a handler rooted at the process working directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            project_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            cli_override: None,
        }
    }

    /// Roots the handler at an explicit project directory.
    #[must_use]
    pub fn with_project_dir(mut self, dir: PathBuf) -> Self {
        self.project_dir = dir;
        self
    }

    /// Overrides store CLI detection with an explicit binary (tests).
    #[must_use]
    pub fn with_cli_binary(mut self, binary: impl Into<String>) -> Self {
        self.cli_override = Some(binary.into());
        self
    }

    fn cli(&self, ctx: &ProjectContext) -> Result<StoreCli> {
        match &self.cli_override {
            Some(binary) => Ok(StoreCli::with_binary(binary.clone(), Some(ctx))),
            None => StoreCli::detect(Some(ctx)),
        }
    }

    fn run(&self, event: &serde_json::Value) -> Result<HookResponse> {
        let started = Instant::now();

        let hook_event_name = event["hook_event_name"].as_str().unwrap_or("Stop");
        let Some(session_id) = event["session_id"].as_str().filter(|s| !s.is_empty()) else {
            return Ok(skip_learning("No session ID in event"));
        };

        // SubagentStop carries the subagent's own transcript.
        let transcript_path = if hook_event_name == "SubagentStop" {
            event["agent_transcript_path"]
                .as_str()
                .or_else(|| event["transcript_path"].as_str())
        } else {
            event["transcript_path"].as_str()
        };

        let Some(ctx) = ProjectContext::resolve(&self.project_dir) else {
            return Ok(skip_learning("No project context found"));
        };

        let accumulator = ToolAccumulator::new(&self.project_dir);
        let tools = accumulator.get(session_id)?;

        let user_prompt = transcript_path
            .map(|p| latest_user_prompt(Path::new(p)))
            .unwrap_or_else(|| transcript::NO_PROMPT.to_string());

        if is_trivial_task(&user_prompt) {
            return Ok(skip_learning("Trivial task (ACE command or simple query)"));
        }
        if !has_substantial_work(&tools) {
            return Ok(skip_learning(
                "No substantial work (no Edit/Write/Bash tools)",
            ));
        }

        let steps = build_trajectory(&tools);
        let success = derive_success(&tools);
        let playbook_used = session::consume_patterns_used(&self.project_dir, session_id);
        let agent_type = session::read_agent_type(session_id);

        let git = self.capture_git(&tools);
        let summary = event["last_assistant_message"]
            .as_str()
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.chars().take(MAX_SUMMARY_LEN).collect());

        let trace = ExecutionTrace {
            task: format!("User request: {user_prompt}"),
            trajectory: steps,
            result: TraceResult {
                success,
                output: format!("Executed {} tool calls", tools.len()),
                summary,
            },
            playbook_used: playbook_used.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            agent_type: agent_type.clone(),
            git,
        };

        let cli = self.cli(&ctx)?;

        // Patterns still pinned to this session feed the on-screen recap.
        let recalled = session::read_session_pointer(&ctx.project)
            .and_then(|sid| cli.recall(&sid).ok())
            .filter(|r| r.count > 0);

        let verbosity = Verbosity::from_env();
        let (mut message_lines, learning_sent) = if async_learning_enabled() {
            let sent = self.spawn_learn_worker(&ctx, session_id, &trace, verbosity);
            let lines = if sent {
                vec!["🔄 [ACE] Learning started in background".to_string()]
            } else {
                format_learn_failure("could not start background worker")
            };
            (lines, sent)
        } else {
            match cli.learn(&trace, verbosity) {
                Ok(response) => (
                    format_learning_message(response.statistics(), verbosity),
                    true,
                ),
                Err(Error::Timeout { .. }) => (
                    vec![
                        "⚠️ [ACE] Learning capture timed out".to_string(),
                        report::MANUAL_CAPTURE_HINT.to_string(),
                    ],
                    false,
                ),
                Err(e) => (format_learn_failure(&e.to_string()), false),
            }
        };
        message_lines.push(String::new());

        self.log_execution(
            session_id,
            &playbook_used,
            &tools,
            success,
            started.elapsed().as_secs_f64(),
            learning_sent,
            &agent_type,
        );

        if let Err(e) = accumulator.clear(session_id) {
            debug!("accumulator clear failed: {e}");
        }

        let mut response = HookResponse::empty();
        if let Some(recalled) = recalled {
            message_lines.insert(
                1,
                format!("🔄 [ACE] Recalled {} patterns from session", recalled.count),
            );
            let body = serde_json::to_string_pretty(&recalled).unwrap_or_default();
            response.hook_specific_output = Some(HookSpecificOutput {
                hook_event_name: hook_event_name.to_string(),
                additional_context: Some(format!("<ace-patterns>\n{body}\n</ace-patterns>")),
            });
        }
        response.system_message = Some(message_lines.join("\n"));
        Ok(response)
    }

    fn capture_git(&self, tools: &[crate::accumulator::ToolRow]) -> Option<crate::models::GitContext> {
        let mut git = crate::git::capture_context(&self.project_dir)?;
        let bash_outputs: Vec<&str> = tools
            .iter()
            .filter(|t| t.tool_name == "Bash")
            .map(|t| t.tool_response.as_str())
            .collect();
        git.session_commits = crate::git::detect_session_commits(bash_outputs);
        Some(git)
    }

    #[allow(clippy::too_many_arguments)]
    fn log_execution(
        &self,
        session_id: &str,
        playbook_used: &[String],
        tools: &[crate::accumulator::ToolRow],
        success: bool,
        execution_time_seconds: f64,
        learning_sent: bool,
        agent_type: &str,
    ) {
        let state_changing = tools
            .iter()
            .filter(|t| is_state_changing(&t.tool_name))
            .count();
        RelevanceLogger::new(&self.project_dir).log_execution(ExecutionEvent {
            timestamp: chrono::Utc::now().to_rfc3339(),
            event: String::new(),
            session_id: session_id.to_string(),
            patterns_used_count: 0,
            pattern_ids: playbook_used.to_vec(),
            tools_executed: tools.len(),
            state_changing_tools: state_changing,
            success,
            execution_time_seconds,
            learning_sent,
            agent_type: agent_type.to_string(),
        });
    }

    /// Detaches a background learning worker and returns within spawn time.
    ///
    /// The worker owns the learn timeout; the status file is the only
    /// channel back. No signals, no pipes held open, no PIDs recorded.
    fn spawn_learn_worker(
        &self,
        ctx: &ProjectContext,
        session_id: &str,
        trace: &ExecutionTrace,
        verbosity: Verbosity,
    ) -> bool {
        let payload = WorkerPayload {
            trace: trace.clone(),
            org: ctx.org.clone(),
            project: ctx.project.clone(),
            session_id: session_id.to_string(),
            verbosity: verbosity.as_str().to_string(),
            started_at: chrono::Utc::now().to_rfc3339(),
        };
        let Ok(body) = serde_json::to_vec(&payload) else {
            return false;
        };
        let Ok(exe) = std::env::current_exe() else {
            return false;
        };

        let spawned = std::process::Command::new(exe)
            .arg("learn-worker")
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn();
        match spawned {
            Ok(mut child) => {
                use std::io::Write;
                if let Some(mut stdin) = child.stdin.take() {
                    if stdin.write_all(&body).is_err() {
                        return false;
                    }
                }
                session::write_learning_status(
                    session_id,
                    &LearningStatus {
                        state: LearningState::Running,
                        started_at: payload.started_at,
                        completed_at: None,
                        statistics: None,
                        error: None,
                    },
                );
                true
            }
            Err(e) => {
                warn!("learn worker spawn failed: {e}");
                false
            }
        }
    }
}

impl Default for StopHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl HookHandler for StopHandler {
    fn event_type(&self) -> &'static str {
        "Stop"
    }

    fn handle(&self, input: &str) -> Result<String> {
        let event = super::parse_event(input)?;
        self.run(&event)?.to_json()
    }
}

/// True when `ACE_LEARN_ASYNC=1`.
fn async_learning_enabled() -> bool {
    std::env::var("ACE_LEARN_ASYNC").as_deref() == Ok("1")
}

fn skip_learning(reason: &str) -> HookResponse {
    crate::config::debug_log(&format!("ACE: Skipping learning - {reason}"));
    HookResponse {
        continue_: Some(true),
        system_message: Some(format!("[ACE] Learning skipped: {reason}")),
        hook_specific_output: None,
    }
}

/// Stdin payload for the detached learning worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPayload {
    /// The trace to submit.
    pub trace: ExecutionTrace,
    /// Org ID, absent in single-org mode.
    pub org: Option<String>,
    /// Project ID.
    pub project: String,
    /// Session the status file is keyed by.
    pub session_id: String,
    /// Verbosity flag value.
    pub verbosity: String,
    /// When the spawning hook handed off, ISO-8601.
    pub started_at: String,
}

/// Entry point for the `learn-worker` subcommand.
///
/// Reads a [`WorkerPayload`] from `input`, submits the trace, and records
/// the outcome in the session's status file. The worker owns the learn
/// timeout.
pub fn run_learn_worker(input: &str) -> Result<()> {
    let payload: WorkerPayload =
        serde_json::from_str(input).map_err(|e| Error::InvalidInput(e.to_string()))?;

    session::write_learning_status(
        &payload.session_id,
        &LearningStatus {
            state: LearningState::Running,
            started_at: payload.started_at.clone(),
            completed_at: None,
            statistics: None,
            error: None,
        },
    );

    let ctx = ProjectContext {
        org: payload.org.clone(),
        project: payload.project.clone(),
    };
    let cli = StoreCli::detect(Some(&ctx))?;
    let verbosity = Verbosity::parse(&payload.verbosity);

    let status = match cli.learn(&payload.trace, verbosity) {
        Ok(response) => LearningStatus {
            state: LearningState::Completed,
            started_at: payload.started_at,
            completed_at: Some(chrono::Utc::now().to_rfc3339()),
            statistics: response
                .statistics()
                .and_then(|s| serde_json::to_value(s).ok()),
            error: None,
        },
        Err(e) => LearningStatus {
            state: LearningState::Failed,
            started_at: payload.started_at,
            completed_at: Some(chrono::Utc::now().to_rfc3339()),
            statistics: None,
            error: Some(e.to_string()),
        },
    };
    session::write_learning_status(&payload.session_id, &status);
    Ok(())
}
