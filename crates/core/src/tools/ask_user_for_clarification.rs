use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::permission::ToolPermission;
use super::{Tool, ToolContext, ToolResult};
use crate::orchestrator::AgentEvent;

pub struct AskUserForClarificationTool;

#[async_trait]
impl Tool for AskUserForClarificationTool {
    fn name(&self) -> &str {
        "ask_user_for_clarification"
    }

    fn description(&self) -> &str {
        "Ask the user a free-text question and wait for their reply. Use when a decision, \
         preference, or missing piece of context cannot be resolved by reading the codebase."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "question": { "type": "string", "description": "The question to present to the user" }
            },
            "required": ["question"]
        })
    }

    fn permission(&self) -> ToolPermission {
        ToolPermission::ReadOnly
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let question = args
            .get("question")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("Missing required parameter: question"))?
            .to_string();

        let (tx, rx) = tokio::sync::oneshot::channel::<String>();
        let respond = std::sync::Arc::new(tokio::sync::Mutex::new(Some(tx)));

        let _ = ctx.event_tx.send(AgentEvent::Clarification { question: question.clone(), respond });

        let answer = rx.await.unwrap_or_else(|_| "(no response)".to_string());

        Ok(ToolResult {
            output: format!("User replied: {answer}"),
            metadata: json!({ "question": question, "answer": answer }),
        })
    }
}
