//! Shared subprocess streaming for tools that run a shell command against a
//! deadline: stdout/stderr are read line by line via `tokio::select!` so a
//! timeout can kill the child and still return whatever was captured so far.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use super::ToolContext;
use crate::orchestrator::AgentEvent;

const MAX_OUTPUT_BYTES: usize = 100 * 1024;

pub struct StreamedOutput {
    pub combined: String,
    pub exit_code: i32,
    pub timed_out: bool,
}

pub async fn run(command: &str, cwd: &Path, timeout_secs: u64, ctx: &ToolContext, tool_name: &str) -> Result<StreamedOutput> {
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| anyhow::anyhow!("Failed to spawn command: {e}"))?;

    let stdout_pipe = child.stdout.take().unwrap();
    let stderr_pipe = child.stderr.take().unwrap();
    let mut stdout_lines = BufReader::new(stdout_pipe).lines();
    let mut stderr_lines = BufReader::new(stderr_pipe).lines();

    let mut combined = String::new();
    let mut stdout_done = false;
    let mut stderr_done = false;
    let mut timed_out = false;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout_secs);

    while !stdout_done || !stderr_done {
        tokio::select! {
            biased;
            result = stdout_lines.next_line(), if !stdout_done => {
                match result {
                    Ok(Some(line)) => {
                        emit_delta(ctx, tool_name, &line);
                        append(&mut combined, &line);
                    }
                    Ok(None) | Err(_) => stdout_done = true,
                }
            }
            result = stderr_lines.next_line(), if !stderr_done => {
                match result {
                    Ok(Some(line)) => {
                        emit_delta(ctx, tool_name, &line);
                        append(&mut combined, &line);
                    }
                    Ok(None) | Err(_) => stderr_done = true,
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                timed_out = true;
                let _ = child.kill().await;
                break;
            }
        }
    }

    if timed_out {
        truncate(&mut combined);
        return Ok(StreamedOutput { combined, exit_code: -1, timed_out: true });
    }

    let status = child.wait().await;
    let exit_code = status.ok().and_then(|s| s.code()).unwrap_or(-1);
    truncate(&mut combined);
    Ok(StreamedOutput { combined, exit_code, timed_out: false })
}

fn append(combined: &mut String, line: &str) {
    if combined.len() < MAX_OUTPUT_BYTES {
        if !combined.is_empty() {
            combined.push('\n');
        }
        combined.push_str(line);
    }
}

fn truncate(s: &mut String) {
    if s.len() > MAX_OUTPUT_BYTES {
        s.truncate(MAX_OUTPUT_BYTES);
        s.push_str("\n... (output truncated)");
    }
}

fn emit_delta(ctx: &ToolContext, tool_name: &str, line: &str) {
    let _ = ctx.event_tx.send(AgentEvent::ToolOutputDelta {
        tool_name: tool_name.to_string(),
        delta: line.to_string(),
    });
}
