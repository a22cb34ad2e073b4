//! Binary entry point for ace-hooks.
//!
//! Dispatches Claude Code hook events to their handlers and exposes the
//! offline insights report. Hook subcommands are contractually silent on
//! failure: they print `{}` and exit zero no matter what went wrong, so a
//! broken hook can never block the user's session.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
// Allow print_stderr/print_stdout in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow unnecessary_wraps for consistent command function signatures
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::multiple_crate_versions)]

use ace_hooks::hooks::{
    HookHandler, PermissionHandler, PostToolUseHandler, PreCompactHandler, SessionStartHandler,
    StopHandler, UserPromptHandler, run_learn_worker,
};
use ace_hooks::{ToolAccumulator, config, insights, relevance};
use clap::{Parser, Subcommand};
use std::process::ExitCode;

/// ace-hooks: closed-loop context engineering for Claude Code.
#[derive(Parser)]
#[command(name = "ace-hooks")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Handle a Claude Code hook event read from stdin.
    Hook {
        /// Hook event type.
        #[command(subcommand)]
        event: HookEvent,
    },

    /// Background learning worker. Reads a work order from stdin; spawned
    /// by the stop hook, never invoked by hand.
    #[command(hide = true)]
    LearnWorker,

    /// Analyze the relevance log and print a usage report.
    Insights {
        /// Analysis window in hours.
        #[arg(long, default_value = "24")]
        hours: i64,

        /// Comparison window in hours, immediately before the current one.
        #[arg(long, default_value = "24")]
        previous_hours: i64,

        /// Render a standalone HTML page instead of text.
        #[arg(long)]
        html: bool,

        /// Maximum rows in the top-patterns ranking.
        #[arg(long, default_value = "10")]
        limit: usize,

        /// Write the report to a file instead of stdout.
        #[arg(long)]
        output: Option<std::path::PathBuf>,

        /// Read logs from this directory instead of the project layout.
        #[arg(long)]
        log_dir: Option<std::path::PathBuf>,
    },

    /// Inspect or maintain the tool accumulator.
    Tools {
        /// Accumulator action.
        #[command(subcommand)]
        action: ToolsAction,
    },
}

/// Accumulator maintenance actions.
#[derive(Subcommand)]
enum ToolsAction {
    /// Append one tool call read as JSON from stdin.
    Append {
        /// Session to record under.
        #[arg(long)]
        session: String,
    },
    /// Print a session's accumulated tool calls as JSON.
    Get {
        /// Session to read.
        #[arg(long)]
        session: String,
    },
    /// Delete a session's accumulated tool calls.
    Clear {
        /// Session to clear.
        #[arg(long)]
        session: String,
    },
    /// Print per-session counters as JSON.
    Stats {
        /// Session to summarize.
        #[arg(long)]
        session: String,
    },
}

/// Hook events.
#[derive(Subcommand)]
enum HookEvent {
    /// User prompt submit hook: search the store and inject patterns.
    UserPromptSubmit,
    /// Post tool use hook: accumulate the tool call.
    PostToolUse,
    /// Stop hook: build the trace and submit learning.
    Stop,
    /// Subagent stop hook: same as Stop for a subagent transcript.
    SubagentStop,
    /// Pre-compact hook: park pinned patterns for re-injection.
    PreCompact,
    /// Session start hook: re-inject patterns parked before compaction.
    SessionStart,
    /// Permission request hook: gate store CLI invocations.
    PermissionRequest,
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Hook { event } => cmd_hook(event),
        Commands::LearnWorker => cmd_learn_worker(),
        Commands::Insights {
            hours,
            previous_hours,
            html,
            limit,
            output,
            log_dir,
        } => cmd_insights(hours, previous_hours, html, limit, output, log_dir),
        Commands::Tools { action } => cmd_tools(action),
    }
}

/// Tracing goes to stderr. The host only surfaces hook stderr on nonzero
/// exits, which never happen, so this is developer-facing only.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn read_hook_input() -> String {
    use std::io::Read;

    let mut input = String::new();
    if std::io::stdin().read_to_string(&mut input).is_err() || input.trim().is_empty() {
        return "{}".to_string();
    }
    input
}

/// Runs one hook handler over the stdin event.
///
/// Every failure path degrades to `{}` on stdout and exit zero; the host
/// treats both as "nothing to add".
fn cmd_hook(event: HookEvent) -> ExitCode {
    let input = read_hook_input();

    let result = match event {
        HookEvent::UserPromptSubmit => UserPromptHandler::new().handle(&input),
        HookEvent::PostToolUse => PostToolUseHandler::new().handle(&input),
        HookEvent::Stop | HookEvent::SubagentStop => StopHandler::new().handle(&input),
        HookEvent::PreCompact => PreCompactHandler::new().handle(&input),
        HookEvent::SessionStart => SessionStartHandler::new().handle(&input),
        HookEvent::PermissionRequest => PermissionHandler::new().handle(&input),
    };

    match result {
        Ok(response) => println!("{response}"),
        Err(e) => {
            config::debug_log(&format!("hook error: {e}"));
            println!("{{}}");
        }
    }
    ExitCode::SUCCESS
}

/// Runs the detached learning worker. Failures land in the status file,
/// which the next pre-task hook reads back; the exit code is cosmetic.
fn cmd_learn_worker() -> ExitCode {
    let input = read_hook_input();
    if let Err(e) = run_learn_worker(&input) {
        config::debug_log(&format!("learn worker error: {e}"));
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn cmd_insights(
    hours: i64,
    previous_hours: i64,
    html: bool,
    limit: usize,
    output: Option<std::path::PathBuf>,
    log_dir: Option<std::path::PathBuf>,
) -> ExitCode {
    let all_entries = if let Some(dir) = log_dir {
        relevance::read_entries_from_log(&dir.join("ace-relevance.jsonl"))
    } else {
        let Ok(project_dir) = std::env::current_dir() else {
            eprintln!("cannot determine working directory");
            return ExitCode::FAILURE;
        };
        relevance::read_all_entries(&project_dir)
    };

    let now = chrono::Utc::now();
    let windowed = insights::filter_window(all_entries.clone(), hours, now);

    let sessions = insights::analyze_sessions(&windowed);
    let helpfulness = insights::calculate_helpfulness(&windowed);
    let top_patterns = insights::get_top_patterns(&windowed, limit);
    let trends = insights::calculate_trends(&all_entries, hours, previous_hours, now);

    let report = if html {
        insights::format_insights_html(&sessions, &helpfulness, &top_patterns, &trends, hours)
    } else {
        insights::format_insights_report(&sessions, &helpfulness, &top_patterns, &trends)
    };

    if let Some(path) = output {
        if let Err(e) = std::fs::write(&path, report) {
            eprintln!("cannot write {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
        println!("Report written to {}", path.display());
    } else {
        print!("{report}");
    }
    ExitCode::SUCCESS
}

fn cmd_tools(action: ToolsAction) -> ExitCode {
    let Ok(project_dir) = std::env::current_dir() else {
        eprintln!("cannot determine working directory");
        return ExitCode::FAILURE;
    };
    let accumulator = ToolAccumulator::new(&project_dir);

    let result = match action {
        ToolsAction::Append { session } => {
            let input = read_hook_input();
            let Ok(call) = serde_json::from_str::<serde_json::Value>(&input) else {
                eprintln!("stdin is not valid JSON");
                return ExitCode::FAILURE;
            };
            accumulator.append(
                &session,
                call["tool_name"].as_str().unwrap_or_default(),
                &call["tool_input"],
                &call["tool_response"],
                call["tool_use_id"].as_str().unwrap_or_default(),
            )
        }
        ToolsAction::Get { session } => accumulator.get(&session).map(|tools| {
            let rows: Vec<serde_json::Value> = tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "tool_name": t.tool_name,
                        "tool_input": t.tool_input,
                        "tool_response": t.tool_response,
                        "tool_use_id": t.tool_use_id,
                    })
                })
                .collect();
            println!("{}", serde_json::Value::Array(rows));
        }),
        ToolsAction::Clear { session } => accumulator.clear(&session),
        ToolsAction::Stats { session } => accumulator.stats(&session).map(|stats| {
            println!(
                "{}",
                serde_json::json!({
                    "total_tools": stats.total_tools,
                    "state_changing_tools": stats.state_changing_tools,
                    "tool_names": stats.tool_names,
                })
            );
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
