//! Deadline-bound subprocess execution.
//!
//! Every store CLI call carries an explicit timeout. `std::process` has no
//! built-in deadline, so this runs the child with piped stdio, drains stdout
//! and stderr on background threads (avoiding pipe-buffer deadlock on large
//! outputs), and polls `try_wait` until the deadline. A child still running
//! at the deadline is killed and reported as [`Error::Timeout`].

use crate::{Error, Result};
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Poll interval while waiting for the child.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Collected output of a finished child process.
#[derive(Debug)]
pub struct CommandOutput {
    /// Exit code, `None` if terminated by signal.
    pub status_code: Option<i32>,
    /// Captured stdout, lossily decoded.
    pub stdout: String,
    /// Captured stderr, lossily decoded.
    pub stderr: String,
}

impl CommandOutput {
    /// True when the child exited with status 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.status_code == Some(0)
    }
}

fn spawn_reader<R: Read + Send + 'static>(
    reader: Option<R>,
) -> std::thread::JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut r) = reader {
            let _ = r.read_to_end(&mut buf);
        }
        buf
    })
}

/// Runs `cmd` with an optional stdin payload and a hard deadline.
///
/// The command's stdio configuration is overridden to pipes. `operation`
/// names the call in error values.
pub fn run_with_timeout(
    cmd: &mut Command,
    stdin_payload: Option<&[u8]>,
    timeout: Duration,
    operation: &str,
) -> Result<CommandOutput> {
    cmd.stdin(if stdin_payload.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|e| Error::CliUnavailable(e.to_string()))?;

    if let Some(payload) = stdin_payload {
        if let Some(mut stdin) = child.stdin.take() {
            // A child that exits before reading produces EPIPE here; its
            // exit status is the interesting signal, not the write error.
            let _ = stdin.write_all(payload);
        }
    }

    let stdout_handle = spawn_reader(child.stdout.take());
    let stderr_handle = spawn_reader(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(Error::Timeout {
                        operation: operation.to_string(),
                        secs: timeout.as_secs(),
                    });
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                return Err(Error::OperationFailed {
                    operation: operation.to_string(),
                    cause: e.to_string(),
                });
            }
        }
    };

    let stdout = stdout_handle.join().unwrap_or_default();
    let stderr = stderr_handle.join().unwrap_or_default();

    Ok(CommandOutput {
        status_code: status.code(),
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    })
}
