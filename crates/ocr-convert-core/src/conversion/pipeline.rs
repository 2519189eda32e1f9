//! Shared subprocess utilities for the converter and optimizer.
//!
//! Provides a helper that runs an external tool to completion while
//! logging its stdout line by line and capturing its stderr for error
//! reports.

use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

/// Collected output of a finished subprocess.
#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout_lines: Vec<String>,
    pub stderr: String,
}

impl ToolOutput {
    /// Describe a non-zero exit, including the tool's diagnostic output.
    pub fn failure_message(&self, process_name: &str) -> Option<String> {
        if self.status.success() {
            return None;
        }

        let code = self
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        let stderr = self.stderr.trim();
        Some(if stderr.is_empty() {
            format!("{process_name} exited with status {code}")
        } else {
            format!("{process_name} exited with status {code}: {stderr}")
        })
    }
}

/// Run `cmd` to completion, streaming stdout to the debug log.
///
/// Stdout and stderr are drained concurrently so a chatty tool cannot
/// block on a full pipe.
pub async fn run_captured(cmd: &mut Command, process_name: &str) -> std::io::Result<ToolOutput> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let read_stdout = async {
        let mut lines = Vec::new();
        if let Some(stdout) = stdout {
            let mut reader = BufReader::new(stdout).lines();
            while let Some(line) = reader.next_line().await? {
                debug!("[{}] {}", process_name, line);
                lines.push(line);
            }
        }
        Ok::<_, std::io::Error>(lines)
    };

    let read_stderr = async {
        let mut buf = Vec::new();
        if let Some(mut stderr) = stderr {
            stderr.read_to_end(&mut buf).await?;
        }
        Ok::<_, std::io::Error>(String::from_utf8_lossy(&buf).to_string())
    };

    let (stdout_lines, stderr) = tokio::try_join!(read_stdout, read_stderr)?;
    let status = child.wait().await?;

    Ok(ToolOutput {
        status,
        stdout_lines,
        stderr,
    })
}
