//! Watchdog-guarded command execution.
//!
//! [`CommandExecutor`] runs one stage command through the shell, streams the
//! monitored stream line-by-line to a caller-supplied sink, and captures the
//! full text of both streams. A stalled process is killed together with its
//! whole process group and the call fails with
//! [`Error::ProcessHung`](crate::Error::ProcessHung). Lines already handed
//! to the sink before the hang are not retracted.

use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::config::{ExecutorConfig, MonitoredStream};
use crate::error::Result;
use crate::exec::runner::ProcessHandle;
use crate::exec::watchdog::{LineEvent, WatchdogReader};

/// Full captured output of one execution.
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    /// Everything the process wrote to stderr.
    pub stderr: String,
    /// Everything the process wrote to stdout.
    pub stdout: String,
}

/// Runs stage commands under watchdog supervision.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    config: ExecutorConfig,
}

impl CommandExecutor {
    /// Create an executor with the given configuration.
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// The configuration this executor was built with.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run `command`, monitoring the configured stream with the platform
    /// line terminator and no per-line sink.
    pub async fn execute(&self, command: &str) -> Result<ExecOutput> {
        self.execute_streaming(command, b'\n', self.config.monitored, |_| {})
            .await
    }

    /// Run `command`, reading `monitored` in `separator`-terminated chunks.
    ///
    /// Every chunk is passed to `on_line` (separator included) before the
    /// inactivity timer is re-armed, then appended to that stream's captured
    /// buffer. The unmonitored stream is drained concurrently without
    /// timeout enforcement. On every exit path the process group is killed
    /// (idempotent if already exited), the child reaped, and the pipes
    /// closed.
    ///
    /// # Errors
    ///
    /// [`Error::ProcessHung`](crate::Error::ProcessHung) if the monitored
    /// stream stays silent past the configured timeout. Spawn failures
    /// surface as [`Error::Io`](crate::Error::Io).
    pub async fn execute_streaming(
        &self,
        command: &str,
        separator: u8,
        monitored: MonitoredStream,
        mut on_line: impl FnMut(&str),
    ) -> Result<ExecOutput> {
        tracing::info!(command, "executing command");

        let mut handle = ProcessHandle::spawn(&self.config.shell, command)?;
        let stdout = handle
            .take_stdout()
            .ok_or_else(|| crate::Error::unknown("child stdout pipe missing"))?;
        let stderr = handle
            .take_stderr()
            .ok_or_else(|| crate::Error::unknown("child stderr pipe missing"))?;

        let (monitored_text, drained_text) = match monitored {
            MonitoredStream::Stderr => {
                self.supervise(&mut handle, stderr, stdout, separator, &mut on_line)
                    .await?
            }
            MonitoredStream::Stdout => {
                self.supervise(&mut handle, stdout, stderr, separator, &mut on_line)
                    .await?
            }
        };

        Ok(match monitored {
            MonitoredStream::Stderr => ExecOutput {
                stderr: monitored_text,
                stdout: drained_text,
            },
            MonitoredStream::Stdout => ExecOutput {
                stderr: drained_text,
                stdout: monitored_text,
            },
        })
    }

    /// Read the monitored stream under the watchdog while draining the other
    /// stream in a background task. Returns `(monitored, drained)` text.
    async fn supervise<M, D>(
        &self,
        handle: &mut ProcessHandle,
        monitored: M,
        drained: D,
        separator: u8,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<(String, String)>
    where
        M: AsyncRead + Unpin,
        D: AsyncRead + Unpin + Send + 'static,
    {
        // Drain the unmonitored pipe concurrently so a chatty tool cannot
        // deadlock on a full pipe buffer while we block on the other stream.
        let drain_task = tokio::spawn(async move {
            let mut drained = drained;
            let mut buf = Vec::new();
            let _ = drained.read_to_end(&mut buf).await;
            buf
        });

        let mut watchdog = WatchdogReader::new(monitored, self.config.line_timeout(), separator);
        let mut captured = String::new();

        loop {
            match watchdog.next_line().await {
                Ok(LineEvent::Line(line)) => {
                    on_line(&line);
                    captured.push_str(&line);
                }
                Ok(LineEvent::Eof) => break,
                Err(e) => {
                    tracing::warn!(pid = ?handle.id(), "watchdog fired; killing process group");
                    handle.kill_group_and_reap().await;
                    drain_task.abort();
                    return Err(e);
                }
            }
        }

        handle.kill_group_and_reap().await;
        let drained_buf = drain_task.await.unwrap_or_default();

        Ok((captured, String::from_utf8_lossy(&drained_buf).into_owned()))
    }

    /// Run `command` to completion without watchdog supervision and return
    /// only the last `tail_lines` (from config) of its stderr.
    ///
    /// Used for tools whose full log would be excessive to retain and whose
    /// output cadence does not suit a per-line timeout. The exit status is
    /// not inspected here; classifying success from the captured text is the
    /// tool's result parser's job.
    pub async fn execute_tailing_stderr(&self, command: &str) -> Result<String> {
        tracing::info!(command, "executing command (tailing stderr)");

        let output = Command::new(&self.config.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .output()
            .await?;

        tracing::debug!(status = %output.status, "command finished");

        let stderr = String::from_utf8_lossy(&output.stderr);
        Ok(tail_lines(&stderr, self.config.tail_lines))
    }
}

/// Keep the last `n` lines of `text`, newline-terminated.
fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    let mut out = lines[start..].join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}
