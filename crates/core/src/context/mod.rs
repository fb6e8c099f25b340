//! The agent context: the single authoritative session value.
//!
//! Modeled as an immutable-in-spirit value updated only through the small set
//! of named transitions below - `append_step`, `record_recent_action`,
//! `install_current_error`, `archive_solved`, `evict_old_progression` - each
//! preserving the invariants this module documents alongside the field it
//! guards. The knowledge-base caches (`files_read`, `search_results`,
//! `file_structure`) are instead written directly by the tool layer through
//! `ToolContext`'s shared `Arc<Mutex<KnowledgeBase>>` and synced back here by
//! the orchestrator after each step.

pub mod optimizer;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CHARS_PER_TOKEN: usize = 4;

pub fn estimate_tokens(text: &str) -> usize {
    text.len() / CHARS_PER_TOKEN + 1
}

/// `{command_string, stdout, stderr, exit_code}` captured once at session start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitialCommandRun {
    pub command_string: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionTaken {
    pub tool: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub status: String,
    pub output: Value,
}

/// One entry of `session_history`. Append-only; `step_no` is strictly monotonic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub step_no: u32,
    pub thought: String,
    pub action_taken: ActionTaken,
    pub result: StepResult,
}

/// A bounded-window entry used for the deduplication gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentAction {
    pub signature: String,
    pub step_no: u32,
    pub tool: String,
    pub parameters: Value,
    pub result: StepResult,
}

/// A previously blocking error that has since disappeared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolvedIssue {
    pub error: BlockingError,
    pub resolution_step: u32,
    pub resolved_at: DateTime<Utc>,
}

/// At most one instance is live at a time (`current_blocking_error`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockingError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    pub file_refs: Vec<String>,
    pub line_refs: Vec<u32>,
    pub raw_output: String,
    pub first_seen_step: u32,
    pub last_seen_step: u32,
    pub status: String,
}

impl BlockingError {
    /// Same file set, ignoring order.
    pub fn same_file_set(&self, other: &BlockingError) -> bool {
        let mut a = self.file_refs.clone();
        let mut b = other.file_refs.clone();
        a.sort();
        b.sort();
        a == b
    }
}

/// One entry of the chronological `error_progression` ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorProgressionEntry {
    pub step: u32,
    pub error_detected: Option<BlockingError>,
    pub previous_error: Option<BlockingError>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileStructureMetadata {
    pub total_files: usize,
    pub relevant_files: usize,
    pub code_files: usize,
    pub relevant_extensions: Vec<String>,
    pub project_root: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileStructure {
    pub tree_structure: String,
    pub flat_files: Vec<String>,
    pub metadata: FileStructureMetadata,
    pub max_depth: usize,
    pub included_hidden: bool,
    pub cached_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchedFileMeta {
    pub path: String,
    pub mtime: i64,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCacheEntry {
    pub results: Vec<String>,
    pub files_searched: usize,
    pub searched_files_metadata: Vec<SearchedFileMeta>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMeta {
    pub mtime: i64,
    pub size: u64,
    pub last_checked: DateTime<Utc>,
}

/// A cached whole-file read, tagged with the step it was read on so callers
/// can bound reuse to "read within the last N steps" per the resolution rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedFileRead {
    pub content: String,
    pub step_no: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorAnalysisNote {
    pub kind: String,
    pub text: String,
    pub step: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KnowledgeBase {
    pub files_read: HashMap<String, CachedFileRead>,
    pub file_structure: Option<FileStructure>,
    pub search_results: HashMap<String, SearchCacheEntry>,
    pub file_metadata: HashMap<String, FileMeta>,
    pub error_analysis_notes: Vec<ErrorAnalysisNote>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileState {
    pub discovered_files: Vec<String>,
    pub primary_error_file: Option<String>,
    pub file_mappings: HashMap<String, String>,
    pub working_directory: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters_schema: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraints {
    pub max_session_steps: u32,
    pub allowed_file_modifications: bool,
    pub allowed_command_execution: bool,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            max_session_steps: 20,
            allowed_file_modifications: true,
            allowed_command_execution: true,
        }
    }
}

/// The single authoritative session value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentContext {
    pub initial_user_request: String,
    pub initial_command_run: InitialCommandRun,
    pub current_working_directory: String,
    pub session_history: Vec<Step>,
    pub recent_actions: Vec<RecentAction>,
    pub solved_issues: Vec<SolvedIssue>,
    pub current_blocking_error: Option<BlockingError>,
    pub error_progression: Vec<ErrorProgressionEntry>,
    pub knowledge_base: KnowledgeBase,
    pub file_state: FileState,
    pub available_tools: Vec<ToolDescriptor>,
    pub constraints: Constraints,
}

impl AgentContext {
    pub fn new(
        user_request: String,
        command_run: InitialCommandRun,
        cwd: String,
        available_tools: Vec<ToolDescriptor>,
        constraints: Constraints,
    ) -> Self {
        Self {
            initial_user_request: user_request,
            initial_command_run: command_run,
            current_working_directory: cwd.clone(),
            session_history: Vec::new(),
            recent_actions: Vec::new(),
            solved_issues: Vec::new(),
            current_blocking_error: None,
            error_progression: Vec::new(),
            knowledge_base: KnowledgeBase::default(),
            file_state: FileState {
                working_directory: cwd,
                ..Default::default()
            },
            available_tools,
            constraints,
        }
    }

    pub fn next_step_no(&self) -> u32 {
        self.session_history.last().map(|s| s.step_no + 1).unwrap_or(1)
    }

    /// Appends a step to `session_history` and exactly one entry to
    /// `recent_actions`, evicting the oldest entry once the cap is exceeded.
    pub fn append_step(&mut self, step: Step, signature: String, recent_actions_cap: usize) {
        let recent = RecentAction {
            signature,
            step_no: step.step_no,
            tool: step.action_taken.tool.clone(),
            parameters: step.action_taken.parameters.clone(),
            result: step.result.clone(),
        };
        self.session_history.push(step);
        self.record_recent_action(recent, recent_actions_cap);
    }

    pub fn record_recent_action(&mut self, action: RecentAction, cap: usize) {
        self.recent_actions.push(action);
        while self.recent_actions.len() > cap {
            self.recent_actions.remove(0);
        }
    }

    /// Finds a recent action within the dedup window whose signature matches.
    /// Invariant: `signature(a) = signature(b) ∧ step_no(current) < step_no(a) + window`.
    pub fn find_duplicate(&self, signature: &str, current_step_no: u32, window: u32) -> Option<&RecentAction> {
        self.recent_actions.iter().find(|a| {
            a.signature == signature && current_step_no < a.step_no.saturating_add(window)
        })
    }

    /// Installs `error` as the current blocking error, archiving whatever was
    /// previously current into `solved_issues` first if requested by the caller.
    pub fn install_current_error(&mut self, error: BlockingError) {
        self.current_blocking_error = Some(error);
    }

    pub fn archive_solved(&mut self, error: BlockingError, resolution_step: u32) {
        self.solved_issues.push(SolvedIssue {
            error,
            resolution_step,
            resolved_at: Utc::now(),
        });
    }

    pub fn push_progression(&mut self, entry: ErrorProgressionEntry) {
        self.error_progression.push(entry);
    }

    pub fn evict_old_progression(&mut self, cap: usize) {
        let len = self.error_progression.len();
        if len > cap {
            self.error_progression.drain(0..len - cap);
        }
    }
}
