//! Child-process plumbing shared by the command-line delegates.

use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

use super::error::ToolkitError;

/// Runs `program` with `args` to completion and returns its stdout.
///
/// A non-zero exit status becomes [`ToolkitError::CommandFailed`] carrying
/// the captured stderr.
pub(crate) async fn run_command(
    tool: &str,
    program: &Path,
    args: &[String],
    envs: &[(&str, &str)],
    timeout_secs: Option<u64>,
) -> Result<String, ToolkitError> {
    debug!(tool, ?args, "running delegate");

    let mut cmd = Command::new(program);
    cmd.args(args)
        .envs(envs.iter().copied())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match timeout_secs {
        Some(secs) => timeout(Duration::from_secs(secs), cmd.output())
            .await
            .map_err(|_| ToolkitError::Timeout {
                tool: tool.to_string(),
                timeout_secs: secs,
            })?,
        None => cmd.output().await,
    }
    .map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ToolkitError::ToolNotFound {
                tool: tool.to_string(),
                path: program.to_path_buf(),
            }
        } else {
            ToolkitError::Io(e)
        }
    })?;

    if !output.status.success() {
        return Err(ToolkitError::command_failed(
            tool,
            output.status.code(),
            &String::from_utf8_lossy(&output.stderr),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Lossy string form of a path for argument lists.
pub(crate) fn arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_missing_program_maps_to_tool_not_found() {
        let program = PathBuf::from("/nonexistent/bin/fslmaths");
        let err = run_command("fslmaths", &program, &[], &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolkitError::ToolNotFound { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdout_is_returned() {
        let out = run_command(
            "echo",
            Path::new("echo"),
            &["12.5".to_string()],
            &[],
            Some(10),
        )
        .await
        .unwrap();
        assert_eq!(out.trim(), "12.5");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_command_failed() {
        let err = run_command("false", Path::new("false"), &[], &[], None)
            .await
            .unwrap_err();
        match err {
            ToolkitError::CommandFailed { tool, code, .. } => {
                assert_eq!(tool, "false");
                assert_eq!(code, Some(1));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
