use crate::error::{Result, SandboxError};
use crate::policy::{allowed_commands, is_allowed_command, validate_command};
use crate::rewrite::{rewrite_command, RewriteContext};
use crate::segment::{split_pipeline, tokenize};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

const STDERR_CAP_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Reading stops at this many stdout bytes: the process is killed and the
    /// output ends with a truncation marker.
    pub max_output_bytes: usize,
    /// Backstop for commands that block without producing output.
    pub timeout_ms: u64,
    /// Inject workspace exclusions into recursive commands.
    pub rewrite: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_output_bytes: 2 * 1024 * 1024,
            timeout_ms: 30_000,
            rewrite: true,
        }
    }
}

/// Runs allow-listed, read-only shell pipelines inside a workspace.
#[derive(Debug, Clone, Default)]
pub struct CommandSandbox {
    config: SandboxConfig,
}

impl CommandSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn allowed_commands(&self) -> &'static [&'static str] {
        allowed_commands()
    }

    /// Policy check only; nothing runs.
    pub fn validate(&self, command: &str) -> Result<()> {
        validate_command(command).map(|_| ())
    }

    /// Validated and rewritten form of `command` as it would be executed.
    pub fn prepare(&self, command: &str, working_dir: &Path) -> Result<String> {
        validate_command(command)?;
        let command = command.trim();
        if !self.config.rewrite {
            return Ok(command.to_string());
        }
        let ctx = RewriteContext::detect(working_dir);
        let rewritten = rewrite_command(command, &ctx);
        if rewritten != command {
            log::debug!("Rewrote sandbox command: {command} -> {rewritten}");
        }
        Ok(rewritten)
    }

    pub async fn execute(&self, command: &str, working_dir: &Path) -> Result<String> {
        self.execute_with_cancel(command, working_dir, &CancellationToken::new())
            .await
    }

    /// Like [`execute`](Self::execute); a fired `cancel` kills the process
    /// and discards its output.
    pub async fn execute_with_cancel(
        &self,
        command: &str,
        working_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let prepared = match self.prepare(command, working_dir) {
            Ok(prepared) => prepared,
            Err(err) => {
                log::warn!("Sandbox rejected `{command}`: {err}");
                return Err(err);
            }
        };
        if cancel.is_cancelled() {
            return Err(SandboxError::Cancelled);
        }
        log::debug!("Sandbox exec in {}: {prepared}", working_dir.display());

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&prepared)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| SandboxError::ExecutionFailed {
                command: command.to_string(),
                status: None,
                stderr: format!("failed to spawn shell: {err}"),
            })?;

        let stdout = child.stdout.take();
        let stderr = tokio::spawn(read_capped(
            child.stderr.take(),
            STDERR_CAP_BYTES,
            Overflow::Drain,
        ));
        let max_output = self.config.max_output_bytes;
        let run = async {
            let stdout = read_capped(stdout, max_output, Overflow::Stop).await;
            if stdout.as_ref().is_ok_and(|captured| captured.overflowed) {
                log::debug!("Sandbox output cap of {max_output} bytes reached: {command}");
                if let Err(err) = child.start_kill() {
                    log::debug!("Failed to kill capped command: {err}");
                }
            }
            let status = child.wait().await;
            let stderr = stderr.await.ok().and_then(|captured| captured.ok());
            (stdout, stderr, status)
        };

        let timeout = Duration::from_millis(self.config.timeout_ms);
        let (stdout, stderr, status) = tokio::select! {
            _ = cancel.cancelled() => {
                log::debug!("Sandbox command cancelled: {command}");
                return Err(SandboxError::Cancelled);
            }
            _ = tokio::time::sleep(timeout) => {
                return Err(SandboxError::ExecutionFailed {
                    command: command.to_string(),
                    status: None,
                    stderr: format!("timed out after {} ms", self.config.timeout_ms),
                });
            }
            outcome = run => outcome,
        };

        let status = status.map_err(|err| SandboxError::ExecutionFailed {
            command: command.to_string(),
            status: None,
            stderr: format!("wait failed: {err}"),
        })?;
        let stdout = stdout.unwrap_or_default();
        let stderr = stderr.unwrap_or_default();

        // Capped commands were killed; their exit status is ignored.
        let code = status.code();
        let no_matches = code == Some(1) && ends_with_search_tool(&prepared);
        if !status.success() && !no_matches && !stdout.overflowed {
            return Err(SandboxError::ExecutionFailed {
                command: command.to_string(),
                status: code,
                stderr: String::from_utf8_lossy(&stderr.bytes).trim().to_string(),
            });
        }
        Ok(format_output(&stdout, max_output))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Overflow {
    /// Return as soon as the cap is exceeded, closing the pipe.
    Stop,
    /// Keep reading and discard the excess.
    Drain,
}

#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    overflowed: bool,
}

async fn read_capped<R>(
    reader: Option<R>,
    cap: usize,
    overflow: Overflow,
) -> std::io::Result<Captured>
where
    R: AsyncRead + Unpin,
{
    let mut captured = Captured::default();
    let Some(mut reader) = reader else {
        return Ok(captured);
    };
    let mut buf = [0u8; 8192];
    loop {
        let read = reader.read(&mut buf).await?;
        if read == 0 {
            return Ok(captured);
        }
        let room = cap.saturating_sub(captured.bytes.len());
        if read > room {
            captured.bytes.extend_from_slice(&buf[..room]);
            captured.overflowed = true;
            if overflow == Overflow::Stop {
                return Ok(captured);
            }
        } else {
            captured.bytes.extend_from_slice(&buf[..read]);
        }
    }
}

fn format_output(captured: &Captured, cap: usize) -> String {
    let kept = &captured.bytes;
    if !captured.overflowed {
        return String::from_utf8_lossy(kept).into_owned();
    }
    let cut = kept
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(kept.len(), |idx| idx + 1);
    let text = String::from_utf8_lossy(&kept[..cut]);
    format!(
        "{}\n[output truncated: showing {} of more than {} bytes]",
        text.trim_end_matches('\n'),
        cut,
        cap
    )
}

/// Exit status 1 means "no matches" when the pipeline ends in a search tool.
fn ends_with_search_tool(command: &str) -> bool {
    let Some(last) = split_pipeline(command)
        .ok()
        .and_then(|segments| segments.last().cloned())
    else {
        return false;
    };
    let Ok(tokens) = tokenize(&last) else {
        return false;
    };
    let words: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
    match words.as_slice() {
        ["grep", ..] | ["rg", ..] => true,
        ["git", rest @ ..] => rest.iter().find(|w| !w.starts_with('-')) == Some(&"grep"),
        _ => false,
    }
}

/// `true` when `name` is allow-listed and an executable named `name` is on
/// `PATH`. Probes the filesystem only.
pub fn is_tool_available(name: &str) -> bool {
    if !is_allowed_command(name) {
        return false;
    }
    let Some(path) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&path).any(|dir| is_executable(&dir.join(name)))
}

#[cfg(unix)]
fn is_executable(candidate: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(candidate)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(candidate: &Path) -> bool {
    candidate.is_file() || candidate.with_extension("exe").is_file()
}
