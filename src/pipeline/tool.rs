//! Bounded external subprocess execution.
//!
//! Every external converter runs through [`run_tool`]: stdin is closed,
//! stdout/stderr are captured, and the whole invocation is wrapped in a
//! wall-clock timeout. `kill_on_drop` guarantees the child is killed when
//! the timeout drops the pending future, so a hung converter cannot outlive
//! its request.
//!
//! A non-zero exit is *not* an error at this level: the document renderer
//! tolerates it as long as its output file appears. Callers use
//! [`ensure_success`] and [`ensure_output`] to apply their own policy.

use crate::error::ToolError;
use std::ffi::OsStr;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Longest stderr excerpt kept in an error message.
const STDERR_EXCERPT: usize = 2000;

/// Run `program` with `args`, killing it after `timeout`.
pub async fn run_tool<I, S>(
    program: &Path,
    args: I,
    timeout: Duration,
) -> Result<Output, ToolError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let name = program.display().to_string();
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    debug!("Running {:?}", cmd.as_std());

    match tokio::time::timeout(timeout, cmd.output()).await {
        Err(_) => Err(ToolError::Timeout {
            program: name,
            secs: timeout.as_secs(),
        }),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ToolError::NotFound { program: name })
        }
        Ok(Err(e)) => Err(ToolError::Spawn {
            program: name,
            source: e,
        }),
        Ok(Ok(output)) => {
            debug!("'{}' exited with {}", name, output.status);
            Ok(output)
        }
    }
}

/// Turn a non-zero exit into [`ToolError::Failed`].
pub fn ensure_success(program: &Path, output: &Output) -> Result<(), ToolError> {
    if output.status.success() {
        return Ok(());
    }
    Err(ToolError::Failed {
        program: program.display().to_string(),
        status: output.status.to_string(),
        stderr: stderr_excerpt(&output.stderr),
    })
}

/// Check that the tool left a non-empty file at `expected`.
pub async fn ensure_output(program: &Path, expected: &Path) -> Result<(), ToolError> {
    match tokio::fs::metadata(expected).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
        _ => Err(ToolError::NoOutput {
            program: program.display().to_string(),
            path: expected.to_path_buf(),
        }),
    }
}

fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_EXCERPT {
        return text.to_string();
    }
    let mut cut = text.len() - STDERR_EXCERPT;
    while !text.is_char_boundary(cut) {
        cut += 1;
    }
    format!("\u{2026}{}", &text[cut..])
}
