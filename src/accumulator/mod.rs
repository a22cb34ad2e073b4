//! Tool accumulator: append-only ground-truth store of tool calls.
//!
//! The host transcript is lossy (tool results arrive with `role: user`,
//! rewrites happen on compaction), so trajectory data comes from here
//! instead: the post-tool-use hook appends every tool call, the stop hook
//! reads the session's rows back in insertion order, and clears them after
//! emission. No history is retained.
//!
//! Concurrency: multiple post-tool-use processes may append at nearly the
//! same time. Idempotency comes from the UNIQUE constraint on `tool_use_id`
//! (`INSERT OR IGNORE`); contention is absorbed by WAL mode and a busy
//! timeout. Only one stop hook fires per task, so reads are single-consumer.

use crate::{Error, Result};
use rusqlite::{Connection, params};
use std::path::{Path, PathBuf};

/// A single accumulated tool call, read back in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRow {
    /// Tool name as reported by the host.
    pub tool_name: String,
    /// Tool input, JSON text.
    pub tool_input: String,
    /// Tool response, JSON text.
    pub tool_response: String,
    /// Host-unique tool use ID.
    pub tool_use_id: String,
}

/// Per-session accumulator statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    /// Total accumulated tool calls.
    pub total_tools: usize,
    /// Calls to state-changing tools.
    pub state_changing_tools: usize,
    /// Tool names in insertion order.
    pub tool_names: Vec<String>,
}

/// Tool-name fragments that count as state-changing work.
pub const STATE_CHANGING_TOOLS: [&str; 5] = ["Edit", "Write", "Bash", "mcp__", "NotebookEdit"];

/// Returns true when `tool_name` indicates a state-changing operation.
#[must_use]
pub fn is_state_changing(tool_name: &str) -> bool {
    STATE_CHANGING_TOOLS.iter().any(|t| tool_name.contains(t))
}

/// Embedded relational store at `.claude/data/logs/ace-tools.db`.
pub struct ToolAccumulator {
    db_path: PathBuf,
}

impl ToolAccumulator {
    /// Creates an accumulator rooted at `project_dir`.
    #[must_use]
    pub fn new(project_dir: &Path) -> Self {
        Self {
            db_path: crate::paths::accumulator_db(project_dir),
        }
    }

    /// Creates an accumulator over an explicit database path (tests).
    #[must_use]
    pub fn with_db_path(db_path: PathBuf) -> Self {
        Self { db_path }
    }

    /// Opens the database, creating directories and schema as needed.
    ///
    /// Init is idempotent: `CREATE TABLE IF NOT EXISTS` plus
    /// `CREATE INDEX IF NOT EXISTS`.
    fn open(&self) -> Result<Connection> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
                operation: "create_logs_dir".to_string(),
                cause: e.to_string(),
            })?;
        }

        let conn = Connection::open(&self.db_path).map_err(|e| Error::OperationFailed {
            operation: "open_accumulator".to_string(),
            cause: e.to_string(),
        })?;

        // WAL mode allows concurrent readers with a single writer; the busy
        // timeout absorbs contention between near-simultaneous appenders.
        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        let _ = conn.pragma_update(None, "synchronous", "NORMAL");
        let _ = conn.pragma_update(None, "busy_timeout", "5000");

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS tool_uses (
                id INTEGER PRIMARY KEY,
                session_id TEXT NOT NULL,
                tool_name TEXT NOT NULL,
                tool_input TEXT,
                tool_response TEXT,
                tool_use_id TEXT,
                timestamp TEXT,
                UNIQUE(tool_use_id)
            );
            CREATE INDEX IF NOT EXISTS idx_session ON tool_uses(session_id);",
        )
        .map_err(|e| Error::OperationFailed {
            operation: "init_accumulator".to_string(),
            cause: e.to_string(),
        })?;

        Ok(conn)
    }

    /// Appends one tool call. Duplicate `tool_use_id`s are silently ignored.
    pub fn append(
        &self,
        session_id: &str,
        tool_name: &str,
        tool_input: &serde_json::Value,
        tool_response: &serde_json::Value,
        tool_use_id: &str,
    ) -> Result<()> {
        let conn = self.open()?;
        conn.execute(
            "INSERT OR IGNORE INTO tool_uses
                (session_id, tool_name, tool_input, tool_response, tool_use_id, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))",
            params![
                session_id,
                tool_name,
                tool_input.to_string(),
                tool_response.to_string(),
                tool_use_id,
            ],
        )
        .map_err(|e| Error::OperationFailed {
            operation: "append_tool".to_string(),
            cause: e.to_string(),
        })?;
        Ok(())
    }

    /// Returns all tool calls for `session_id` in insertion order.
    ///
    /// A missing database is an empty session, not an error.
    pub fn get(&self, session_id: &str) -> Result<Vec<ToolRow>> {
        if !self.db_path.exists() {
            return Ok(Vec::new());
        }

        let conn = self.open()?;
        let mut stmt = conn
            .prepare(
                "SELECT tool_name, tool_input, tool_response, tool_use_id
                 FROM tool_uses WHERE session_id = ?1 ORDER BY id",
            )
            .map_err(|e| Error::OperationFailed {
                operation: "get_session_tools".to_string(),
                cause: e.to_string(),
            })?;

        let rows = stmt
            .query_map(params![session_id], |row| {
                Ok(ToolRow {
                    tool_name: row.get(0)?,
                    tool_input: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    tool_response: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    tool_use_id: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                })
            })
            .and_then(Iterator::collect::<rusqlite::Result<Vec<_>>>)
            .map_err(|e| Error::OperationFailed {
                operation: "get_session_tools".to_string(),
                cause: e.to_string(),
            })?;

        Ok(rows)
    }

    /// Deletes all rows for `session_id`.
    pub fn clear(&self, session_id: &str) -> Result<()> {
        if !self.db_path.exists() {
            return Ok(());
        }
        let conn = self.open()?;
        conn.execute(
            "DELETE FROM tool_uses WHERE session_id = ?1",
            params![session_id],
        )
        .map_err(|e| Error::OperationFailed {
            operation: "clear_session".to_string(),
            cause: e.to_string(),
        })?;
        Ok(())
    }

    /// Returns counts and tool names for a session.
    pub fn stats(&self, session_id: &str) -> Result<SessionStats> {
        let tools = self.get(session_id)?;
        let tool_names: Vec<String> = tools.iter().map(|t| t.tool_name.clone()).collect();
        let state_changing_tools = tool_names
            .iter()
            .filter(|name| is_state_changing(name))
            .count();

        Ok(SessionStats {
            total_tools: tools.len(),
            state_changing_tools,
            tool_names,
        })
    }
}
