//! The Agent Orchestrator: the bounded planner-tool loop that
//! drives a debugging session from the initial failing command to a terminal
//! status. Owns nothing about *how* to fix an error - that lives in the
//! planner and the tools - only the loop's termination policy, deduplication
//! gate, and confirmation gate for destructive tools.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use serde_json::{json, Value};
use tokio::sync::{broadcast, oneshot, Mutex};
use wrench_config::RuntimeConfig;
use wrench_planner::{GenerationParams, Planner, PlannerError};

use crate::context::optimizer;
use crate::context::{ActionTaken, AgentContext, ErrorAnalysisNote, Step, StepResult};
use crate::planner_response;
use crate::prompt;
use crate::seeding;
use crate::signature;
use crate::tools::permission::ToolPermission;
use crate::tools::{change_tracker::ChangeTracker, ToolContext, ToolRegistry};
use crate::{error_evolution, tools};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalStatus {
    Resolved,
    GuidanceProvided,
    CannotResolve,
    AbortedByUser,
    StepsExhausted,
}

impl FinalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalStatus::Resolved => "resolved",
            FinalStatus::GuidanceProvided => "guidance_provided",
            FinalStatus::CannotResolve => "cannot_resolve",
            FinalStatus::AbortedByUser => "aborted_by_user",
            FinalStatus::StepsExhausted => "steps_exhausted",
        }
    }
}

/// Events a running session broadcasts out to whatever is driving the UI
/// (the CLI's terminal renderer in the reference frontend).
#[derive(Clone)]
pub enum AgentEvent {
    StepStarted { step_no: u32 },
    StepCompleted { step_no: u32, tool: String, status: String },
    ToolOutputDelta { tool_name: String, delta: String },
    ApprovalRequest {
        tool: String,
        summary: String,
        respond: Arc<Mutex<Option<oneshot::Sender<bool>>>>,
    },
    Clarification {
        question: String,
        respond: Arc<Mutex<Option<oneshot::Sender<String>>>>,
    },
    Finished { status: String, summary: String },
}

pub struct Orchestrator {
    planner: Arc<dyn Planner>,
    config: RuntimeConfig,
    registry: ToolRegistry,
    event_tx: broadcast::Sender<AgentEvent>,
}

impl Orchestrator {
    pub fn new(planner: Arc<dyn Planner>, config: RuntimeConfig, registry: ToolRegistry) -> Self {
        let (event_tx, _rx) = broadcast::channel(64);
        Self { planner, config, registry, event_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.event_tx.subscribe()
    }

    /// Runs the session to completion. `ctx` is seeded in place; the caller
    /// supplies it already populated with the initial command and request.
    pub async fn run(&self, mut ctx: AgentContext) -> Result<(AgentContext, FinalStatus)> {
        seeding::seed(&mut ctx, self.config.tools.structure_max_depth);

        let mut tool_ctx = ToolContext {
            cwd: PathBuf::from(&ctx.current_working_directory),
            config: self.config.tools.clone(),
            event_tx: self.event_tx.clone(),
            change_tracker: Arc::new(Mutex::new(ChangeTracker::new())),
            knowledge_base: Arc::new(Mutex::new(ctx.knowledge_base.clone())),
            file_state: Arc::new(Mutex::new(ctx.file_state.clone())),
            current_step_no: 0,
        };

        let mut planner_failures = 0u32;

        loop {
            let step_no = ctx.next_step_no();
            if step_no > ctx.constraints.max_session_steps {
                return Ok((ctx, FinalStatus::StepsExhausted));
            }
            tool_ctx.current_step_no = step_no;
            let _ = self.event_tx.send(AgentEvent::StepStarted { step_no });

            let optimized = optimizer::optimize(&ctx, &self.config.context);
            let rendered = prompt::assemble(&optimized, step_no == 1);

            let raw = match self.call_planner_with_retry(&rendered).await {
                Ok(r) => r,
                Err(e) => {
                    match self
                        .recover_from_failure(&mut ctx, step_no, &format!("the planner call failed: {e}"), &mut planner_failures, &tool_ctx)
                        .await?
                    {
                        Some(status) => return Ok((ctx, status)),
                        None => continue,
                    }
                }
            };

            let decision = match planner_response::parse(&raw) {
                Ok(d) => d,
                Err(e) => {
                    match self
                        .recover_from_failure(&mut ctx, step_no, &format!("the planner's response was invalid: {e}"), &mut planner_failures, &tool_ctx)
                        .await?
                    {
                        Some(status) => return Ok((ctx, status)),
                        None => continue,
                    }
                }
            };
            planner_failures = 0;

            let sig = signature::compute(&decision.tool_to_use, &decision.tool_parameters, &ctx.current_working_directory);

            if let Some(dup) = ctx.find_duplicate(&sig, step_no, self.config.orchestrator.dedup_window_steps) {
                tracing::debug!(step_no, tool = %decision.tool_to_use, duplicate_of = dup.step_no, "deduplicated repeated action");
                let note = format!(
                    "Duplicate of step {}: that action was already taken and its result is above; \
                     choose a different tool or parameters.",
                    dup.step_no
                );
                self.record_step(
                    &mut ctx,
                    step_no,
                    &decision.thought,
                    &decision.tool_to_use,
                    decision.tool_parameters.clone(),
                    "duplicate",
                    json!({ "note": note }),
                    sig,
                );
                self.pace().await;
                continue;
            }

            if decision.tool_to_use == "finish_debugging" {
                let result = self.registry.execute("finish_debugging", decision.tool_parameters.clone(), &tool_ctx).await?;
                let status_str = result.metadata.get("status").and_then(|v| v.as_str()).unwrap_or("cannot_resolve").to_string();
                let summary = result.metadata.get("summary").and_then(|v| v.as_str()).unwrap_or_default().to_string();

                self.record_step(
                    &mut ctx,
                    step_no,
                    &decision.thought,
                    &decision.tool_to_use,
                    decision.tool_parameters.clone(),
                    "success",
                    json!(result.output),
                    sig,
                );

                let final_status = match status_str.as_str() {
                    "resolved" => FinalStatus::Resolved,
                    "guidance_provided" => FinalStatus::GuidanceProvided,
                    _ => FinalStatus::CannotResolve,
                };
                let _ = self.event_tx.send(AgentEvent::Finished { status: final_status.as_str().to_string(), summary });
                return Ok((ctx, final_status));
            }

            let tool = match self.registry.get(&decision.tool_to_use) {
                Some(t) => t,
                None => {
                    self.record_step(
                        &mut ctx,
                        step_no,
                        &decision.thought,
                        &decision.tool_to_use,
                        decision.tool_parameters.clone(),
                        "error",
                        json!(format!("Unknown tool: {}", decision.tool_to_use)),
                        sig,
                    );
                    self.pace().await;
                    continue;
                }
            };

            if tool.permission() == ToolPermission::NeedsApproval {
                let approved = self.request_approval(&decision.tool_to_use, &decision.tool_parameters).await;
                if !approved {
                    self.record_step(
                        &mut ctx,
                        step_no,
                        &decision.thought,
                        &decision.tool_to_use,
                        decision.tool_parameters.clone(),
                        "denied",
                        json!("The user declined this action."),
                        sig,
                    );
                    self.pace().await;
                    continue;
                }
            }

            tracing::info!(step_no, tool = %decision.tool_to_use, "dispatching tool");
            let exec_result = self.registry.execute(&decision.tool_to_use, decision.tool_parameters.clone(), &tool_ctx).await;
            let (status, output_value, error_feed) = match &exec_result {
                Ok(result) => ("success".to_string(), json!(result.output), Some(result.output.clone())),
                Err(e) => ("error".to_string(), json!(e.to_string()), Some(e.to_string())),
            };

            self.sync_caches(&mut ctx, &tool_ctx).await;

            self.record_step(
                &mut ctx,
                step_no,
                &decision.thought,
                &decision.tool_to_use,
                decision.tool_parameters.clone(),
                &status,
                output_value,
                sig,
            );

            if matches!(decision.tool_to_use.as_str(), "run_diagnostic_command" | "propose_fix_by_command") {
                if let Some(output) = error_feed {
                    error_evolution::update_error_state(&mut ctx, &output, step_no);
                }
            }

            let _ = self.event_tx.send(AgentEvent::StepCompleted { step_no, tool: decision.tool_to_use.clone(), status });
            self.pace().await;
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn record_step(
        &self,
        ctx: &mut AgentContext,
        step_no: u32,
        thought: &str,
        tool: &str,
        parameters: Value,
        status: &str,
        output: Value,
        signature: String,
    ) {
        let step = Step {
            step_no,
            thought: thought.to_string(),
            action_taken: ActionTaken { tool: tool.to_string(), parameters },
            result: StepResult { status: status.to_string(), output },
        };
        ctx.append_step(step, signature, self.config.context.recent_actions_cap);
    }

    async fn pace(&self) {
        tokio::time::sleep(Duration::from_millis(self.config.orchestrator.step_pacing_ms)).await;
    }

    /// A planner call or its response failed validation. Offers the user one
    /// chance to weigh in via `ask_user_for_clarification` before giving up;
    /// a second consecutive failure ends the session.
    async fn recover_from_failure(
        &self,
        ctx: &mut AgentContext,
        step_no: u32,
        reason: &str,
        failures: &mut u32,
        tool_ctx: &ToolContext,
    ) -> Result<Option<FinalStatus>> {
        *failures += 1;
        tracing::warn!(step_no, failures = *failures, reason, "recovering from planner failure");
        if *failures > self.config.orchestrator.consecutive_failure_limit {
            return Ok(Some(FinalStatus::CannotResolve));
        }

        let question = format!("{reason} Would you like me to keep trying, or should I stop here?");
        let args = json!({ "question": question });
        match self.registry.execute("ask_user_for_clarification", args, tool_ctx).await {
            Ok(result) => {
                if result.output.to_lowercase().contains("stop") {
                    return Ok(Some(FinalStatus::AbortedByUser));
                }
                ctx.knowledge_base.error_analysis_notes.push(ErrorAnalysisNote {
                    kind: "planner_failure".to_string(),
                    text: result.output,
                    step: step_no,
                });
                Ok(None)
            }
            Err(_) => Ok(Some(FinalStatus::CannotResolve)),
        }
    }

    async fn request_approval(&self, tool: &str, parameters: &Value) -> bool {
        let (tx, rx) = oneshot::channel();
        let respond = Arc::new(Mutex::new(Some(tx)));
        let summary = summarize_for_approval(tool, parameters);
        if self
            .event_tx
            .send(AgentEvent::ApprovalRequest { tool: tool.to_string(), summary, respond })
            .is_err()
        {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Tools read and write `tool_ctx.knowledge_base`/`tool_ctx.file_state`
    /// directly during `execute()`; this copies the shared state back onto the
    /// session's own `AgentContext` so later steps' prompts see it.
    async fn sync_caches(&self, ctx: &mut AgentContext, tool_ctx: &ToolContext) {
        ctx.knowledge_base = tool_ctx.knowledge_base.lock().await.clone();
        ctx.file_state = tool_ctx.file_state.lock().await.clone();
    }

    /// Calls the planner, retrying transient failures with exponential
    /// backoff before giving up to `recover_from_failure`.
    async fn call_planner_with_retry(&self, prompt: &str) -> Result<String> {
        let retry = &self.config.retry;
        let mut attempt = 0u32;
        loop {
            match self.planner.complete(prompt, &self.config.planner.model, &GenerationParams::default()).await {
                Ok(r) => return Ok(r),
                Err(e) => {
                    let retryable = e.downcast_ref::<PlannerError>().map(|pe| pe.is_retryable()).unwrap_or(false);
                    if !retryable || attempt >= retry.max_retries {
                        return Err(e);
                    }
                    let base_backoff_ms = retry.initial_backoff_ms.saturating_mul(1u64 << attempt).min(retry.max_backoff_ms);
                    let jitter_ms = rand::rng().random_range(0..=base_backoff_ms / 4 + 1);
                    let backoff_ms = base_backoff_ms + jitter_ms;
                    tracing::warn!(attempt, backoff_ms, error = %e, "retrying planner call after transient failure");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn summarize_for_approval(tool: &str, parameters: &Value) -> String {
    match tool {
        "propose_code_patch" => {
            let file_path = parameters.get("file_path").and_then(|v| v.as_str()).unwrap_or("(unknown file)");
            let description = parameters.get("patch_description").and_then(|v| v.as_str()).unwrap_or("");
            let change_count = parameters.get("patch_content").and_then(|v| v.as_array()).map(|a| a.len()).unwrap_or(0);
            format!("Apply {change_count} change(s) to {file_path}: {description}")
        }
        "propose_fix_by_command" => {
            let command = parameters.get("command_to_propose").and_then(|v| v.as_str()).unwrap_or("");
            format!("Run: {command}")
        }
        other => format!("Run {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Constraints, InitialCommandRun};
    use wrench_planner::ScriptedPlanner;

    fn base_ctx(cwd: &str) -> AgentContext {
        AgentContext::new(
            "fix it".to_string(),
            InitialCommandRun {
                command_string: "python app.py".to_string(),
                stdout: String::new(),
                stderr: "ModuleNotFoundError: No module named 'requests'".to_string(),
                exit_code: 1,
            },
            cwd.to_string(),
            Vec::new(),
            Constraints::default(),
        )
    }

    #[tokio::test]
    async fn resolves_when_finish_debugging_reports_resolved() {
        let dir = tempfile::tempdir().unwrap();
        let response = r#"{"thought": "done", "tool_to_use": "finish_debugging", "tool_parameters": {"status": "resolved", "summary": "installed requests"}}"#;
        let planner = Arc::new(ScriptedPlanner::new(vec![response.to_string()]));
        let config = RuntimeConfig::default();
        let registry = tools::default_registry();
        let orchestrator = Orchestrator::new(planner, config, registry);

        let ctx = base_ctx(dir.path().to_str().unwrap());
        let (final_ctx, status) = orchestrator.run(ctx).await.unwrap();

        assert_eq!(status, FinalStatus::Resolved);
        assert_eq!(final_ctx.session_history.len(), 1);
    }

    #[tokio::test]
    async fn exhausts_steps_when_planner_keeps_looking_without_finishing() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RuntimeConfig::default();
        config.orchestrator.max_session_steps = 2;
        config.orchestrator.step_pacing_ms = 0;

        let response = r#"{"thought": "look around", "tool_to_use": "list_directory_contents", "tool_parameters": {"path": "."}}"#;
        let planner = Arc::new(ScriptedPlanner::new(vec![response.to_string(), response.to_string()]));
        let registry = tools::default_registry();
        let orchestrator = Orchestrator::new(planner, config, registry);

        let ctx = base_ctx(dir.path().to_str().unwrap());
        let (_ctx, status) = orchestrator.run(ctx).await.unwrap();
        assert_eq!(status, FinalStatus::StepsExhausted);
    }

    #[tokio::test]
    async fn repeating_the_same_call_is_marked_duplicate_not_reexecuted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.py"), "import requests").unwrap();
        let mut config = RuntimeConfig::default();
        config.orchestrator.max_session_steps = 3;
        config.orchestrator.step_pacing_ms = 0;

        let same_read = r#"{"thought": "check app.py", "tool_to_use": "read_file_content", "tool_parameters": {"file_path": "app.py"}}"#;
        let finish = r#"{"thought": "done", "tool_to_use": "finish_debugging", "tool_parameters": {"status": "resolved", "summary": "ok"}}"#;
        let planner = Arc::new(ScriptedPlanner::new(vec![
            same_read.to_string(),
            same_read.to_string(),
            finish.to_string(),
        ]));
        let registry = tools::default_registry();
        let orchestrator = Orchestrator::new(planner, config, registry);

        let ctx = base_ctx(dir.path().to_str().unwrap());
        let (final_ctx, status) = orchestrator.run(ctx).await.unwrap();

        assert_eq!(status, FinalStatus::Resolved);
        assert_eq!(final_ctx.session_history[1].result.status, "duplicate");
    }
}
