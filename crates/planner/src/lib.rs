pub mod anthropic;
pub mod types;

mod error;

pub use error::PlannerError;
pub use types::GenerationParams;

use anyhow::Result;
use async_trait::async_trait;

/// Abstract "chat" capability the orchestrator consumes.
///
/// Input is an already-assembled prompt string; output is expected to contain
/// a single JSON object (`{thought, tool_to_use, tool_parameters}`). Extracting
/// that JSON from surrounding prose is the orchestrator's job, not the
/// planner's - this trait only speaks in raw strings.
#[async_trait]
pub trait Planner: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str, model: &str, params: &GenerationParams) -> Result<String>;
}

/// A planner that returns a fixed, scripted sequence of responses. Used by
/// orchestrator tests so loop behavior can be exercised without a network call.
pub struct ScriptedPlanner {
    responses: std::sync::Mutex<std::collections::VecDeque<String>>,
}

impl ScriptedPlanner {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into_iter().collect()),
        }
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _prompt: &str, _model: &str, _params: &GenerationParams) -> Result<String> {
        let mut queue = self.responses.lock().unwrap();
        queue
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("scripted planner exhausted"))
    }
}
