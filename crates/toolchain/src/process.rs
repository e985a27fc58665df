//! Subprocess execution.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

/// Failure to run an external program.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {}: {stderr}", exit_label(.code))]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "a signal".to_string(), |c| format!("status {c}"))
}

/// Renders a program and its arguments for logs and error messages.
pub fn display_command(program: &str, args: &[OsString]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}

/// Runs `program` with `args` in `cwd` and returns its trimmed stdout.
///
/// # Errors
///
/// [`ProcessError::Spawn`] if the program cannot be started and
/// [`ProcessError::Failed`] if it exits unsuccessfully.
pub async fn run(program: &str, args: &[OsString], cwd: &Path) -> Result<String, ProcessError> {
    let command = display_command(program, args);
    debug!(%command, cwd = %cwd.display(), "running");

    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| ProcessError::Spawn {
            command: command.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(ProcessError::Failed {
            command,
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !stdout.is_empty() {
        debug!(%command, %stdout, "finished");
    }
    Ok(stdout)
}

/// Builds an owned argument list from anything string-like.
pub(crate) fn args<I, S>(items: I) -> Vec<OsString>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    items.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_command_joins_program_and_args() {
        assert_eq!(
            display_command("git", &args(["commit", "-m", "add plotly.js version v2.5.0"])),
            "git commit -m add plotly.js version v2.5.0"
        );
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run("plotly-mirror-no-such-program", &[], dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_carries_code_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let err = run("sh", &args(["-c", "echo boom >&2; exit 3"]), dir.path())
            .await
            .unwrap_err();

        let ProcessError::Failed { code, stderr, .. } = &err else {
            panic!("expected a failure, got {err:?}");
        };
        assert_eq!(*code, Some(3));
        assert_eq!(stderr, "boom");
        assert!(err.to_string().contains("exited with status 3"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stdout_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let out = run("sh", &args(["-c", "echo '  hello  '"]), dir.path())
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }
}
