//! External tool invocation with captured output and an optional timeout.
//!
//! The heavy lifting of the pipeline (catalog download, transcoding) happens
//! in external binaries; this module is the single place that launches them.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

/// Error from resolving or running an external tool.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{tool} not found in PATH; please ensure it is installed")]
    NotFound { tool: String },
    #[error("failed to launch {tool}: {source}")]
    Launch {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} timed out after {}s", .timeout.as_secs())]
    TimedOut { tool: String, timeout: Duration },
    #[error("{tool} failed ({status}): {output}")]
    Failed {
        tool: String,
        status: std::process::ExitStatus,
        output: String,
    },
}

/// Captured output of a successful invocation.
#[derive(Debug)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Resolves `program` through PATH; absolute paths are checked directly.
pub fn resolve(program: &str) -> Result<PathBuf, ToolError> {
    which::which(program).map_err(|_| ToolError::NotFound {
        tool: program.to_string(),
    })
}

/// Runs `program` with `args`, capturing stdout and stderr.
///
/// Non-zero exit becomes `ToolError::Failed` carrying the tool's stderr
/// (stdout when stderr is empty). With a timeout, the child is killed once
/// the limit passes so a hung tool cannot hold its worker slot forever.
pub async fn run_tool<I, S>(
    program: &Path,
    args: I,
    timeout: Option<Duration>,
) -> Result<ToolOutput, ToolError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let tool = tool_name(program);
    let mut cmd = Command::new(program);
    cmd.args(args).stdin(Stdio::null()).kill_on_drop(true);

    let run = cmd.output();
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, run).await {
            Ok(done) => done,
            Err(_) => {
                return Err(ToolError::TimedOut {
                    tool,
                    timeout: limit,
                })
            }
        },
        None => run.await,
    };

    let output = result.map_err(|source| ToolError::Launch {
        tool: tool.clone(),
        source,
    })?;

    if output.status.success() {
        Ok(ToolOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let detail = if stderr.is_empty() {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        } else {
            stderr
        };
        Err(ToolError::Failed {
            tool,
            status: output.status,
            output: detail,
        })
    }
}

fn tool_name(program: &Path) -> String {
    program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_finds_sh_and_rejects_nonsense() {
        assert!(resolve("sh").is_ok());
        assert!(matches!(
            resolve("definitely-not-a-real-tool-xyz"),
            Err(ToolError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn captures_stdout_on_success() {
        let sh = resolve("sh").unwrap();
        let out = run_tool(&sh, ["-c", "echo hello"], None).await.unwrap();
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn nonzero_exit_carries_stderr() {
        let sh = resolve("sh").unwrap();
        let err = run_tool(&sh, ["-c", "echo broken >&2; exit 3"], None)
            .await
            .unwrap_err();
        match err {
            ToolError::Failed { tool, output, .. } => {
                assert_eq!(tool, "sh");
                assert_eq!(output, "broken");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn nonzero_exit_falls_back_to_stdout() {
        let sh = resolve("sh").unwrap();
        let err = run_tool(&sh, ["-c", "echo only-stdout; exit 1"], None)
            .await
            .unwrap_err();
        match err {
            ToolError::Failed { output, .. } => assert_eq!(output, "only-stdout"),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_kills_hung_tool() {
        let sh = resolve("sh").unwrap();
        let err = run_tool(&sh, ["-c", "sleep 30"], Some(Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::TimedOut { .. }));
    }
}
