//! The Tool Layer: a closed catalog of exactly nine tools the
//! planner may invoke. No tool outside this set is ever registered.

pub mod ask_user_for_clarification;
pub mod change_tracker;
pub mod diff;
pub mod finish_debugging;
pub mod get_file_structure;
pub mod list_directory_contents;
pub mod permission;
pub mod propose_code_patch;
pub mod propose_fix_by_command;
pub mod read_file_content;
pub mod run_diagnostic_command;
pub mod search_file_content;
mod subprocess;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, Mutex};
use wrench_config::ToolsConfig;

use crate::context::{FileState, KnowledgeBase, ToolDescriptor};
use crate::orchestrator::AgentEvent;
use permission::ToolPermission;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    fn permission(&self) -> ToolPermission {
        ToolPermission::ReadOnly
    }
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult>;
}

#[derive(Clone)]
pub struct ToolContext {
    pub cwd: PathBuf,
    pub config: ToolsConfig,
    pub event_tx: broadcast::Sender<AgentEvent>,
    pub change_tracker: Arc<Mutex<change_tracker::ChangeTracker>>,
    /// Shared with the orchestrator's `AgentContext` for the session: tools
    /// consult and update these directly instead of the orchestrator patching
    /// them in after the fact.
    pub knowledge_base: Arc<Mutex<KnowledgeBase>>,
    pub file_state: Arc<Mutex<FileState>>,
    /// The step number of the call currently in flight. Used to bound
    /// cache-reuse windows expressed in steps (e.g. "read within the last 3 steps").
    pub current_step_no: u32,
}

#[derive(Debug, Clone)]
pub struct ToolResult {
    pub output: String,
    pub metadata: Value,
}

pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut descs: Vec<ToolDescriptor> = self
            .tools
            .values()
            .map(|t| ToolDescriptor {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters_schema: t.parameters_schema(),
            })
            .collect();
        descs.sort_by(|a, b| a.name.cmp(&b.name));
        descs
    }

    pub async fn execute(&self, name: &str, args: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let tool = self
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown tool: {name}"))?;
        tool.execute(args, ctx).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the registry with exactly the nine catalog tools, in the order the
/// system preamble lists them.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(list_directory_contents::ListDirectoryContentsTool));
    registry.register(Box::new(read_file_content::ReadFileContentTool));
    registry.register(Box::new(run_diagnostic_command::RunDiagnosticCommandTool));
    registry.register(Box::new(search_file_content::SearchFileContentTool));
    registry.register(Box::new(get_file_structure::GetFileStructureTool));
    registry.register(Box::new(propose_code_patch::ProposeCodePatchTool));
    registry.register(Box::new(propose_fix_by_command::ProposeFixByCommandTool));
    registry.register(Box::new(ask_user_for_clarification::AskUserForClarificationTool));
    registry.register(Box::new(finish_debugging::FinishDebuggingTool));
    registry
}

pub const CATALOG: &[&str] = &[
    "list_directory_contents",
    "read_file_content",
    "run_diagnostic_command",
    "search_file_content",
    "get_file_structure",
    "propose_code_patch",
    "propose_fix_by_command",
    "ask_user_for_clarification",
    "finish_debugging",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_exactly_the_closed_catalog() {
        let registry = default_registry();
        let mut names = registry.names();
        names.sort();
        let mut expected: Vec<String> = CATALOG.iter().map(|s| s.to_string()).collect();
        expected.sort();
        assert_eq!(names, expected);
    }
}
