use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::permission::ToolPermission;
use super::{Tool, ToolContext, ToolResult};

/// Terminal tool: the planner calls this to end the session with a final status
/// and summary rather than leaving the orchestrator to infer completion.
pub struct FinishDebuggingTool;

#[async_trait]
impl Tool for FinishDebuggingTool {
    fn name(&self) -> &str {
        "finish_debugging"
    }

    fn description(&self) -> &str {
        "End the debugging session. `status` must be one of `resolved`, \
         `guidance_provided`, or `cannot_resolve`. Always include a `summary` explaining \
         what was found or done."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "string",
                    "enum": ["resolved", "guidance_provided", "cannot_resolve"]
                },
                "summary": { "type": "string", "description": "What was found, fixed, or why no further progress is possible" }
            },
            "required": ["status", "summary"]
        })
    }

    fn permission(&self) -> ToolPermission {
        ToolPermission::ReadOnly
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolResult> {
        let status = args
            .get("status")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("Missing required parameter: status"))?;
        let summary = args
            .get("summary")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("Missing required parameter: summary"))?;

        if !["resolved", "guidance_provided", "cannot_resolve"].contains(&status) {
            anyhow::bail!("Unknown status: {status}");
        }

        Ok(ToolResult {
            output: summary.to_string(),
            metadata: json!({ "status": status, "summary": summary }),
        })
    }
}
