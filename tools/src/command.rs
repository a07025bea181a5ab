//! `CommandCapability`: allowlist-checked subprocess execution.
//!
//! Commands run without a shell; arguments are passed as an array to the
//! process spawn. On Unix the child gets its own session so the whole
//! process group can be killed on timeout or cancellation.

use std::path::Path;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;

use steward_types::CommandRule;

use super::ToolError;

/// Captured subprocess output. `truncated` is set when either stream hit
/// the byte cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit: i32,
    pub truncated: bool,
}

/// Subprocess capability bound to the command allowlist.
#[derive(Debug, Clone)]
pub struct CommandCapability {
    rules: Vec<CommandRule>,
    max_output_bytes: usize,
}

impl CommandCapability {
    #[must_use]
    pub fn new(rules: Vec<CommandRule>, max_output_bytes: usize) -> Self {
        Self {
            rules,
            max_output_bytes,
        }
    }

    /// Check `argv` against the allowlist without running anything.
    pub fn check_allowed(&self, argv: &[String]) -> Result<&CommandRule, ToolError> {
        let program = argv
            .first()
            .ok_or_else(|| ToolError::bad_args("argv must not be empty"))?;
        let rule = self
            .rules
            .iter()
            .find(|rule| rule.name == *program)
            .ok_or_else(|| {
                ToolError::CmdAllowlist(format!("command '{program}' is not allowlisted"))
            })?;

        for arg in &argv[1..] {
            if arg.starts_with('-') && !rule.flag_allowed(arg) {
                return Err(ToolError::CmdAllowlist(format!(
                    "flag '{arg}' is not allowed for '{program}'"
                )));
            }
        }
        Ok(rule)
    }

    /// Run an allowlisted command and capture its output.
    pub async fn run_allowed(
        &self,
        argv: &[String],
        cwd: &Path,
        timeout: Duration,
    ) -> Result<CommandOutput, ToolError> {
        self.check_allowed(argv)?;

        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..])
            .current_dir(cwd)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());
        set_new_session(&mut cmd);

        let mut child = cmd
            .spawn()
            .map_err(|e| ToolError::failed(format!("failed to spawn '{}': {e}", argv[0])))?;
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let mut guard = ChildGuard::new(child);

        let cap = self.max_output_bytes;
        let run = async {
            // Drain both pipes concurrently; a child blocked on a full
            // stderr pipe would otherwise never finish writing stdout.
            let ((stdout, stdout_truncated), (stderr, stderr_truncated)) = tokio::join!(
                read_capped(stdout_pipe, cap),
                read_capped(stderr_pipe, cap)
            );
            let status = guard
                .child_mut()
                .wait()
                .await
                .map_err(|e| ToolError::failed(format!("wait failed: {e}")))?;
            Ok::<CommandOutput, ToolError>(CommandOutput {
                stdout,
                stderr,
                exit: status.code().unwrap_or(-1),
                truncated: stdout_truncated || stderr_truncated,
            })
        };

        let outcome = tokio::time::timeout(timeout, run).await;
        match outcome {
            Ok(result) => {
                guard.disarm();
                result
            }
            // The guard's drop kills the process group.
            Err(_) => Err(ToolError::Timeout {
                elapsed_ms: timeout.as_millis() as u64,
            }),
        }
    }
}

/// Read a pipe up to `cap` bytes; the remainder is drained and discarded
/// so the child never blocks on a full pipe.
async fn read_capped(
    pipe: Option<impl tokio::io::AsyncRead + Unpin>,
    cap: usize,
) -> (String, bool) {
    let Some(mut pipe) = pipe else {
        return (String::new(), false);
    };
    let mut collected: Vec<u8> = Vec::new();
    let mut truncated = false;
    let mut buf = [0u8; 8192];
    loop {
        match pipe.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if collected.len() < cap {
                    let take = n.min(cap - collected.len());
                    collected.extend_from_slice(&buf[..take]);
                    if take < n {
                        truncated = true;
                    }
                } else {
                    truncated = true;
                }
            }
        }
    }
    (String::from_utf8_lossy(&collected).into_owned(), truncated)
}

/// RAII guard that kills a child process (and its process group on Unix)
/// on drop. Call `disarm()` after the process exits normally.
struct ChildGuard {
    child: Option<tokio::process::Child>,
}

impl ChildGuard {
    fn new(child: tokio::process::Child) -> Self {
        Self { child: Some(child) }
    }

    fn child_mut(&mut self) -> &mut tokio::process::Child {
        self.child.as_mut().expect("child present")
    }

    fn disarm(&mut self) {
        self.child = None;
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };
        #[cfg(unix)]
        {
            if let Some(pid) = child.id() {
                unsafe {
                    if libc::killpg(pid as i32, libc::SIGKILL) == -1 {
                        let _ = child.start_kill();
                    }
                }
            }
            let _ = child.try_wait();
        }
        #[cfg(not(unix))]
        {
            let _ = child.start_kill();
            let _ = child.try_wait();
        }
    }
}

/// Put the child in its own session (Unix only) so the entire process
/// group can be killed via `killpg` in `ChildGuard::drop`.
#[cfg(unix)]
fn set_new_session(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    unsafe {
        cmd.as_std_mut().pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(not(unix))]
fn set_new_session(_cmd: &mut Command) {}
