use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::permission::ToolPermission;
use super::{subprocess, Tool, ToolContext, ToolResult};

/// Fixes expressed as a command rather than a diff - e.g. `npm install requests`,
/// `pip install -r requirements.txt`. Unlike `run_diagnostic_command`, this tool
/// is expected to mutate project state and is gated by confirmation.
pub struct ProposeFixByCommandTool;

#[async_trait]
impl Tool for ProposeFixByCommandTool {
    fn name(&self) -> &str {
        "propose_fix_by_command"
    }

    fn description(&self) -> &str {
        "Run a shell command that fixes the issue by mutating project state (installing a \
         dependency, regenerating a lockfile, running a migration). Requires user \
         confirmation before it runs."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command_to_propose": { "type": "string", "description": "Shell command that performs the fix" },
                "command_description": { "type": "string", "description": "Why this command resolves the blocking error" }
            },
            "required": ["command_to_propose", "command_description"]
        })
    }

    fn permission(&self) -> ToolPermission {
        ToolPermission::NeedsApproval
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let command = args
            .get("command_to_propose")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("Missing required parameter: command_to_propose"))?;

        let timeout_secs = ctx.config.max_diagnostic_timeout_secs.max(30);
        let result = subprocess::run(command, &ctx.cwd, timeout_secs, ctx, "propose_fix_by_command").await?;

        if result.timed_out {
            tracing::warn!(command, timeout_secs, "fix command timed out");
            return Ok(ToolResult {
                output: "Fix command timed out".to_string(),
                metadata: json!({ "exit_code": -1, "timeout": true, "user_confirmation": true }),
            });
        }

        Ok(ToolResult {
            output: if result.combined.is_empty() { "(no output)".to_string() } else { result.combined },
            metadata: json!({ "exit_code": result.exit_code, "command": command, "user_confirmation": true }),
        })
    }
}
