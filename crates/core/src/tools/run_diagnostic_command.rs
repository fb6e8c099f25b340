use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::permission::{find_denied_token, ToolPermission};
use super::{subprocess, Tool, ToolContext, ToolResult};

pub struct RunDiagnosticCommandTool;

#[async_trait]
impl Tool for RunDiagnosticCommandTool {
    fn name(&self) -> &str {
        "run_diagnostic_command"
    }

    fn description(&self) -> &str {
        "Run a read-only diagnostic shell command (e.g. a test runner, linter, or the \
         failing command itself) and return stdout, stderr, and exit code. Commands that \
         would mutate the filesystem are rejected - use propose_fix_by_command for those."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "Shell command to execute" },
                "timeout_secs": { "type": "integer", "description": "Timeout in seconds (default and cap from configuration)" }
            },
            "required": ["command"]
        })
    }

    fn permission(&self) -> ToolPermission {
        ToolPermission::ReadOnly
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let command = args
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("Missing required parameter: command"))?;

        if let Some(token) = find_denied_token(command, &ctx.config.diagnostic_denylist) {
            return Ok(ToolResult {
                output: format!("Refused: `{token}` is not allowed in a diagnostic command."),
                metadata: json!({ "denied": true, "token": token }),
            });
        }

        let timeout_secs = args
            .get("timeout_secs")
            .and_then(|v| v.as_u64())
            .unwrap_or(ctx.config.diagnostic_timeout_secs)
            .min(ctx.config.max_diagnostic_timeout_secs);

        let result = subprocess::run(command, &ctx.cwd, timeout_secs, ctx, "run_diagnostic_command").await?;

        if result.timed_out {
            tracing::warn!(command, timeout_secs, "diagnostic command timed out");
            return Ok(ToolResult {
                output: if result.combined.is_empty() {
                    format!("Command timed out after {timeout_secs}s")
                } else {
                    format!("{}\n\n(command timed out after {timeout_secs}s)", result.combined)
                },
                metadata: json!({ "exit_code": -1, "timeout": true }),
            });
        }

        Ok(ToolResult {
            output: if result.combined.is_empty() { "(no output)".to_string() } else { result.combined },
            metadata: json!({ "exit_code": result.exit_code }),
        })
    }
}
