//! Persisted session log: one JSON document per session id, saved
//! under the data directory at termination.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::{AgentContext, InitialCommandRun};
use crate::orchestrator::FinalStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_type: String,
    pub timestamp: DateTime<Utc>,
    pub initial_command: InitialCommandRun,
    pub user_context: String,
    pub final_context: AgentContext,
    pub steps_taken: u32,
    pub final_status: String,
}

impl SessionRecord {
    pub fn new(ctx: &AgentContext, final_status: FinalStatus) -> Self {
        Self {
            session_type: "agentic".to_string(),
            timestamp: Utc::now(),
            initial_command: ctx.initial_command_run.clone(),
            user_context: ctx.initial_user_request.clone(),
            final_context: ctx.clone(),
            steps_taken: ctx.session_history.len() as u32,
            final_status: final_status.as_str().to_string(),
        }
    }
}

fn sessions_dir() -> Result<PathBuf> {
    let dir = wrench_config::RuntimeConfig::data_dir().join("sessions");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn session_path(dir: &std::path::Path, id: &str) -> PathBuf {
    dir.join(format!("{id}.json"))
}

pub fn save_session(id: &str, record: &SessionRecord) -> Result<PathBuf> {
    let dir = sessions_dir()?;
    let path = session_path(&dir, id);
    let json = serde_json::to_string_pretty(record)?;
    std::fs::write(&path, json)?;
    Ok(path)
}

pub fn load_session(id: &str) -> Result<SessionRecord> {
    let dir = sessions_dir()?;
    let path = session_path(&dir, id);
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Constraints;

    #[test]
    fn round_trips_session_record_to_json() {
        let ctx = AgentContext::new(
            "fix it".to_string(),
            InitialCommandRun {
                command_string: "python app.py".to_string(),
                stdout: String::new(),
                stderr: String::new(),
                exit_code: 1,
            },
            "/tmp/project".to_string(),
            Vec::new(),
            Constraints::default(),
        );
        let record = SessionRecord::new(&ctx, FinalStatus::Resolved);
        let json = serde_json::to_string(&record).unwrap();
        let parsed: SessionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.session_type, "agentic");
        assert_eq!(parsed.final_status, "resolved");
    }
}
