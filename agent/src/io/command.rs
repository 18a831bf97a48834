//! Command dispatch through the system shell with timeout and bounded
//! output capture.

use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::types::CommandResult;

/// Abstraction over command execution backends.
///
/// A non-zero exit code is a normal result, not an error. Implementations
/// report spawn failures and timeouts as `exit_code = -1` with the reason
/// in the output, so the planner sees them as ordinary command outcomes.
pub trait Dispatcher {
    fn run(&self, command: &str) -> Result<CommandResult>;
}

/// Dispatcher that runs the command line through `sh -c`.
pub struct ShellDispatcher {
    timeout: Duration,
    output_limit_bytes: usize,
}

impl ShellDispatcher {
    pub fn new(timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            timeout,
            output_limit_bytes,
        }
    }
}

impl Dispatcher for ShellDispatcher {
    #[instrument(skip_all, fields(timeout_secs = self.timeout.as_secs()))]
    fn run(&self, command: &str) -> Result<CommandResult> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!("spawning shell command");
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(err = %err, "failed to spawn command");
                return Ok(CommandResult {
                    stdout: String::new(),
                    stderr: format!("failed to spawn command: {err}"),
                    exit_code: -1,
                });
            }
        };

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("stdout was not piped"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("stderr was not piped"))?;

        // Read both pipes concurrently while the child runs to avoid pipe
        // deadlocks on chatty commands.
        let limit = self.output_limit_bytes;
        let stdout_handle = thread::spawn(move || read_limited(stdout, limit));
        let stderr_handle = thread::spawn(move || read_limited(stderr, limit));

        let mut timed_out = false;
        let status = match child.wait_timeout(self.timeout).context("wait for command")? {
            Some(status) => status,
            None => {
                warn!(timeout_secs = self.timeout.as_secs(), "command timed out, killing");
                timed_out = true;
                child.kill().context("kill command")?;
                child.wait().context("wait command after kill")?
            }
        };

        let (stdout, stdout_truncated) = join_reader(stdout_handle).context("join stdout")?;
        let (stderr, stderr_truncated) = join_reader(stderr_handle).context("join stderr")?;

        let mut stdout = String::from_utf8_lossy(&stdout).into_owned();
        let mut stderr = String::from_utf8_lossy(&stderr).into_owned();
        if stdout_truncated > 0 {
            stdout.push_str(&format!("\n[stdout truncated {stdout_truncated} bytes]\n"));
        }
        if stderr_truncated > 0 {
            stderr.push_str(&format!("\n[stderr truncated {stderr_truncated} bytes]\n"));
        }

        let exit_code = if timed_out {
            stderr.push_str(&format!(
                "\n[command timed out after {}s]\n",
                self.timeout.as_secs()
            ));
            -1
        } else {
            status.code().unwrap_or(-1)
        };

        debug!(exit_code, timed_out, "command finished");
        Ok(CommandResult {
            stdout,
            stderr,
            exit_code,
        })
    }
}

fn join_reader(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}
