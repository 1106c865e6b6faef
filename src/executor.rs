//! Allowlisted command execution.
//!
//! A task's command string is split on ASCII whitespace and the first token
//! must be one of [`ALLOWED_COMMANDS`]. The tokens are handed to the OS as the
//! argv directly, so quotes, pipes, globs and `$VARS` reach the program as
//! literal text and never hit a shell:
//! - `echo a|b` → `["echo", "a|b"]` → prints `a|b`
//! - `rm -rf /` → rejected before anything is spawned
//!
//! stdout and stderr share one pipe, so output is captured as a single
//! stream in the order the child wrote it, then assembled into lines.
//! The child gets [`DEFAULT_TIMEOUT`] from spawn to finish; after that it is
//! killed and [`TIMEOUT_SENTINEL`] is appended to whatever was captured.

use std::io;
use std::os::fd::OwnedFd;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::net::unix::pipe;
use tokio::process::Command;
use tokio::time::Sleep;

use crate::task::TaskExecution;

/// Programs a task may run. Compared verbatim against the first token.
pub const ALLOWED_COMMANDS: &[&str] = &["ls", "ping", "echo", "pwd", "date", "whoami"];

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Captured output beyond this is dropped.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Recorded as the output when the command string has no tokens.
pub const EMPTY_COMMAND_OUTPUT: &str = "Error: Command string is empty.";

/// Appended to the output when the child is killed at the deadline.
pub const TIMEOUT_SENTINEL: &str = "\n--- COMMAND TIMEOUT (Process forcefully terminated) ---";

const TRUNCATED_MARKER: &str = "... [output truncated]\n";

/// How long to keep reading after a timed-out child is killed.
const KILL_DRAIN_GRACE: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("'{0}' is not on the secure allowlist. Access denied.")]
    Disallowed(String),

    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to read command output: {0}")]
    Read(#[source] io::Error),

    #[error("failed to wait for command: {0}")]
    Wait(#[source] io::Error),
}

/// Split on runs of ASCII whitespace. No quoting or escaping is honored.
pub fn tokenize(command: &str) -> Vec<&str> {
    command.split_ascii_whitespace().collect()
}

pub fn is_allowed(program: &str) -> bool {
    ALLOWED_COMMANDS.contains(&program)
}

/// Runs task commands under the allowlist, a deadline and an output cap.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    timeout: Duration,
    max_output_bytes: usize,
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutor {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_output_bytes(mut self, max: usize) -> Self {
        self.max_output_bytes = max;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Validate and run `command`, producing a finished execution record.
    ///
    /// Only an allowlist rejection or a failure to start/read/reap the child
    /// is an error. A non-zero exit, an empty command or a timeout all yield a
    /// record; the output text is the only way to tell them apart.
    pub async fn execute(&self, command: &str) -> Result<TaskExecution, ExecError> {
        let start_time = Utc::now();
        let tokens = tokenize(command);

        let Some((program, args)) = tokens.split_first() else {
            return Ok(TaskExecution {
                start_time,
                end_time: start_time,
                output: EMPTY_COMMAND_OUTPUT.to_string(),
            });
        };

        if !is_allowed(program) {
            tracing::warn!("Blocked command outside allowlist: {}", program);
            return Err(ExecError::Disallowed(program.to_string()));
        }

        tracing::info!("Executing command: {}", command.trim());
        let output = self.run(program, args).await?;
        let end_time = Utc::now();

        tracing::debug!(
            "Command finished in {} ms, output_len={}",
            (end_time - start_time).num_milliseconds(),
            output.len()
        );

        Ok(TaskExecution {
            start_time,
            end_time,
            output,
        })
    }

    /// Spawn `program` with `args` and capture its output. Does not consult
    /// the allowlist.
    async fn run(&self, program: &str, args: &[&str]) -> Result<String, ExecError> {
        let spawn_error = |source: io::Error| ExecError::Spawn {
            program: program.to_string(),
            source,
        };

        // One pipe for both streams, so the reader sees writes in the order
        // the child made them.
        let (reader, writer) = io::pipe().map_err(spawn_error)?;
        let stderr = writer.try_clone().map_err(spawn_error)?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(writer)
            .stderr(stderr)
            .kill_on_drop(true);
        let spawned = command.spawn();
        // The parent's copies of the write end live in `command`. They must be
        // closed or the reader never sees EOF.
        drop(command);
        let mut child = spawned.map_err(spawn_error)?;

        let mut output = pipe::Receiver::from_owned_fd(OwnedFd::from(reader))
            .map_err(ExecError::Read)?;
        let mut capture = OutputBuffer::new(self.max_output_bytes);

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        let mut timed_out = read_until(&mut output, &mut capture, deadline.as_mut()).await?;

        if !timed_out {
            // Output is closed but the child may still be running.
            tokio::select! {
                status = child.wait() => {
                    status.map_err(ExecError::Wait)?;
                }
                _ = &mut deadline => timed_out = true,
            }
        }

        if timed_out {
            tracing::warn!(
                "Command '{}' exceeded {} s, killing",
                program,
                self.timeout.as_secs_f64()
            );
            // Already-exited children make start_kill fail; wait() still reaps.
            let _ = child.start_kill();
            child.wait().await.map_err(ExecError::Wait)?;

            // Pick up whatever the child wrote before it died. A grandchild
            // can keep the pipe open, so this is bounded too.
            let grace = tokio::time::sleep(KILL_DRAIN_GRACE);
            tokio::pin!(grace);
            read_until(&mut output, &mut capture, grace).await?;
        }

        capture.finish();
        if timed_out {
            capture.push_str(TIMEOUT_SENTINEL);
        }
        Ok(capture.into_string())
    }
}

/// Feed the merged stream into `capture` until EOF or `deadline`. Returns
/// `true` on deadline.
async fn read_until(
    output: &mut pipe::Receiver,
    capture: &mut OutputBuffer,
    mut deadline: Pin<&mut Sleep>,
) -> Result<bool, ExecError> {
    let mut chunk = [0u8; 8192];
    loop {
        tokio::select! {
            read = output.read(&mut chunk) => {
                let n = read.map_err(ExecError::Read)?;
                if n == 0 {
                    return Ok(false);
                }
                capture.feed(&chunk[..n]);
            }
            _ = deadline.as_mut() => return Ok(true),
        }
    }
}

/// Line-assembled output with a size cap.
#[derive(Debug)]
struct OutputBuffer {
    text: String,
    /// Bytes of a line whose terminator has not arrived yet.
    pending: Vec<u8>,
    limit: usize,
    truncated: bool,
}

impl OutputBuffer {
    fn new(limit: usize) -> Self {
        Self {
            text: String::new(),
            pending: Vec::new(),
            limit,
            truncated: false,
        }
    }

    /// Append raw bytes from the stream. Complete lines are pushed; the tail
    /// waits in `pending` until its newline or [`OutputBuffer::finish`].
    fn feed(&mut self, bytes: &[u8]) {
        for segment in bytes.split_inclusive(|&b| b == b'\n') {
            if self.truncated {
                return;
            }
            self.pending.extend_from_slice(segment);
            if segment.ends_with(b"\n") {
                let line = std::mem::take(&mut self.pending);
                self.push_line(&line);
            } else if self.text.len() + self.pending.len() > self.limit {
                // Newline-free output cannot fit anymore.
                self.pending.clear();
                self.mark_truncated();
            }
        }
    }

    /// Flush an unterminated last line.
    fn finish(&mut self) {
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.push_line(&line);
        }
    }

    fn push_line(&mut self, raw: &[u8]) {
        if self.truncated {
            return;
        }
        let line = raw.strip_suffix(b"\n").unwrap_or(raw);
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let line = String::from_utf8_lossy(line);

        if self.text.len() + line.len() + 1 > self.limit {
            self.mark_truncated();
            return;
        }
        self.text.push_str(&line);
        self.text.push('\n');
    }

    fn mark_truncated(&mut self) {
        self.truncated = true;
        self.text.push_str(TRUNCATED_MARKER);
    }

    fn push_str(&mut self, s: &str) {
        self.text.push_str(s);
    }

    fn into_string(self) -> String {
        self.text
    }
}
