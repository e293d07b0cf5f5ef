//! Subprocess spawning and teardown.
//!
//! [`ProcessHandle`] owns one child process and its pipes. The child is
//! placed in its own process group at spawn time so the kill path can signal
//! the whole group: encoders that fork helpers are taken down with their
//! parent, without walking the OS process table.

use std::path::Path;
use std::process::Stdio;

use tokio::process::{Child, ChildStderr, ChildStdout, Command};

use crate::error::Result;

/// One running subprocess, exclusively owned by the executor call that
/// created it. Destroyed (streams closed, process reaped) before that call
/// returns, on every exit path.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    pid: Option<u32>,
}

impl ProcessHandle {
    /// Spawn `shell -c command` with stdin closed and stdout/stderr piped.
    ///
    /// On Unix the child becomes the leader of a fresh process group.
    pub fn spawn(shell: &Path, command: &str) -> Result<Self> {
        let mut cmd = Command::new(shell);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn()?;
        let pid = child.id();

        Ok(Self { child, pid })
    }

    /// OS process id of the child, if it has not been reaped yet.
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    /// Take the child's stdout pipe. Returns `None` once taken.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take the child's stderr pipe.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Forcefully terminate the process group and wait for the child to be
    /// reaped so no zombie remains. Idempotent: signalling an already-exited
    /// group is a no-op.
    pub async fn kill_group_and_reap(&mut self) {
        #[cfg(unix)]
        if let Some(pid) = self.pid {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            // The child is its own group leader, so its pid is the pgid.
            let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
        }

        // Direct kill as a fallback (and the only path on non-Unix).
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
    }

    /// Wait for the child to exit without signalling it.
    pub async fn wait(&mut self) -> Result<std::process::ExitStatus> {
        Ok(self.child.wait().await?)
    }
}
