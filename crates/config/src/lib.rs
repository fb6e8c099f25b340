use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level runtime configuration, loaded from an optional global TOML file
/// merged with an optional project-local override.
///
/// Every numeric threshold worth tuning or overriding in tests lives here,
/// with a sensible `Default`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub retry: RetrySettings,
}

fn default_max_session_steps() -> u32 {
    20
}

fn default_dedup_window() -> u32 {
    3
}

fn default_consecutive_failure_limit() -> u32 {
    3
}

fn default_step_pacing_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_max_session_steps")]
    pub max_session_steps: u32,
    #[serde(default = "default_dedup_window")]
    pub dedup_window_steps: u32,
    #[serde(default = "default_consecutive_failure_limit")]
    pub consecutive_failure_limit: u32,
    #[serde(default = "default_step_pacing_ms")]
    pub step_pacing_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_session_steps: default_max_session_steps(),
            dedup_window_steps: default_dedup_window(),
            consecutive_failure_limit: default_consecutive_failure_limit(),
            step_pacing_ms: default_step_pacing_ms(),
        }
    }
}

fn default_recent_actions_cap() -> usize {
    10
}

fn default_recent_actions_focus_cap() -> usize {
    5
}

fn default_error_progression_cap() -> usize {
    10
}

fn default_focus_recent_steps() -> usize {
    5
}

fn default_focus_min_steps() -> usize {
    3
}

fn default_drift_recent_steps() -> usize {
    3
}

fn default_truncate_chars() -> usize {
    2000
}

fn default_truncate_keep_chars() -> usize {
    1000
}

fn default_notes_trigger_count() -> usize {
    3
}

fn default_notes_max_chars() -> usize {
    1500
}

fn default_chars_per_token() -> usize {
    4
}

fn default_context_token_budget() -> usize {
    8000
}

/// Thresholds for the context optimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_recent_actions_cap")]
    pub recent_actions_cap: usize,
    #[serde(default = "default_recent_actions_focus_cap")]
    pub recent_actions_focus_cap: usize,
    #[serde(default = "default_error_progression_cap")]
    pub error_progression_cap: usize,
    #[serde(default = "default_focus_recent_steps")]
    pub focus_recent_steps: usize,
    #[serde(default = "default_focus_min_steps")]
    pub focus_min_steps: usize,
    #[serde(default = "default_drift_recent_steps")]
    pub drift_recent_steps: usize,
    #[serde(default = "default_truncate_chars")]
    pub truncate_chars: usize,
    #[serde(default = "default_truncate_keep_chars")]
    pub truncate_keep_chars: usize,
    #[serde(default = "default_notes_trigger_count")]
    pub notes_trigger_count: usize,
    #[serde(default = "default_notes_max_chars")]
    pub notes_max_chars: usize,
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: usize,
    #[serde(default = "default_context_token_budget")]
    pub context_token_budget: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            recent_actions_cap: default_recent_actions_cap(),
            recent_actions_focus_cap: default_recent_actions_focus_cap(),
            error_progression_cap: default_error_progression_cap(),
            focus_recent_steps: default_focus_recent_steps(),
            focus_min_steps: default_focus_min_steps(),
            drift_recent_steps: default_drift_recent_steps(),
            truncate_chars: default_truncate_chars(),
            truncate_keep_chars: default_truncate_keep_chars(),
            notes_trigger_count: default_notes_trigger_count(),
            notes_max_chars: default_notes_max_chars(),
            chars_per_token: default_chars_per_token(),
            context_token_budget: default_context_token_budget(),
        }
    }
}

fn default_diagnostic_timeout_secs() -> u64 {
    8
}

fn default_max_diagnostic_timeout_secs() -> u64 {
    10
}

fn default_search_max_results() -> usize {
    10
}

fn default_search_max_depth() -> usize {
    3
}

fn default_search_cache_ttl_secs() -> u64 {
    300
}

fn default_search_cache_sample_files() -> usize {
    5
}

fn default_structure_max_depth() -> usize {
    3
}

fn default_denylist() -> Vec<String> {
    ["rm", "del", "format", "mkfs", "dd", "mv", "cp", ">", ">>", "sudo"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Thresholds and safety rules for the tool layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_diagnostic_timeout_secs")]
    pub diagnostic_timeout_secs: u64,
    #[serde(default = "default_max_diagnostic_timeout_secs")]
    pub max_diagnostic_timeout_secs: u64,
    #[serde(default = "default_search_max_results")]
    pub search_max_results: usize,
    #[serde(default = "default_search_max_depth")]
    pub search_max_depth: usize,
    #[serde(default = "default_search_cache_ttl_secs")]
    pub search_cache_ttl_secs: u64,
    #[serde(default = "default_search_cache_sample_files")]
    pub search_cache_sample_files: usize,
    #[serde(default = "default_structure_max_depth")]
    pub structure_max_depth: usize,
    #[serde(default = "default_denylist")]
    pub diagnostic_denylist: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            diagnostic_timeout_secs: default_diagnostic_timeout_secs(),
            max_diagnostic_timeout_secs: default_max_diagnostic_timeout_secs(),
            search_max_results: default_search_max_results(),
            search_max_depth: default_search_max_depth(),
            search_cache_ttl_secs: default_search_cache_ttl_secs(),
            search_cache_sample_files: default_search_cache_sample_files(),
            structure_max_depth: default_structure_max_depth(),
            diagnostic_denylist: default_denylist(),
        }
    }
}

fn default_bm25_weight() -> f32 {
    0.3
}

fn default_vector_weight() -> f32 {
    0.7
}

fn default_expansion_factor() -> usize {
    3
}

fn default_root_cause_filename_multiplier() -> f32 {
    2.0
}

fn default_root_cause_token_weight() -> f32 {
    0.1
}

fn default_stoplist() -> Vec<String> {
    [
        "the", "and", "for", "that", "this", "with", "from", "have", "has",
        "was", "were", "are", "not", "but", "you", "your", "can", "will",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Fusion weights and heuristics for the hybrid retrieval core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_bm25_weight")]
    pub bm25_weight: f32,
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f32,
    #[serde(default = "default_expansion_factor")]
    pub expansion_factor: usize,
    #[serde(default = "default_root_cause_filename_multiplier")]
    pub root_cause_filename_multiplier: f32,
    #[serde(default = "default_root_cause_token_weight")]
    pub root_cause_token_weight: f32,
    #[serde(default = "default_stoplist")]
    pub common_words_stoplist: Vec<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            bm25_weight: default_bm25_weight(),
            vector_weight: default_vector_weight(),
            expansion_factor: default_expansion_factor(),
            root_cause_filename_multiplier: default_root_cause_filename_multiplier(),
            root_cause_token_weight: default_root_cause_token_weight(),
            common_words_stoplist: default_stoplist(),
        }
    }
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: None,
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RuntimeConfig {
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            let content = std::fs::read_to_string(&path).context("failed to read config file")?;
            toml::from_str(&content).context("failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wrench")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wrench")
    }

    pub fn ensure_dirs() -> Result<()> {
        std::fs::create_dir_all(Self::config_dir())?;
        std::fs::create_dir_all(Self::data_dir())?;
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();
        Self::ensure_dirs()?;
        let content = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(&path, content).context("failed to write config file")?;
        Ok(())
    }

    /// Loads `<project_root>/.wrench/config.toml`, if present.
    pub fn load_project(project_root: &std::path::Path) -> Result<Option<Self>> {
        let path = project_root.join(".wrench").join("config.toml");
        if path.exists() {
            let content = std::fs::read_to_string(&path).context("failed to read project config")?;
            let config: RuntimeConfig =
                toml::from_str(&content).context("failed to parse project config")?;
            Ok(Some(config))
        } else {
            Ok(None)
        }
    }

    /// Project config wins field-by-field over global config wherever the
    /// project value differs from that field's compiled-in default.
    pub fn merge(global: &RuntimeConfig, project: &RuntimeConfig) -> RuntimeConfig {
        RuntimeConfig {
            orchestrator: if project.orchestrator.max_session_steps != default_max_session_steps() {
                project.orchestrator.clone()
            } else {
                global.orchestrator.clone()
            },
            context: global.context.clone(),
            tools: {
                let mut denylist = global.tools.diagnostic_denylist.clone();
                denylist.extend(project.tools.diagnostic_denylist.clone());
                denylist.sort();
                denylist.dedup();
                ToolsConfig {
                    diagnostic_denylist: denylist,
                    ..project.tools.clone()
                }
            },
            retrieval: global.retrieval.clone(),
            planner: if project.planner.model != default_model() {
                project.planner.clone()
            } else {
                global.planner.clone()
            },
            retry: global.retry.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_specification_values() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.orchestrator.max_session_steps, 20);
        assert_eq!(cfg.context.recent_actions_cap, 10);
        assert_eq!(cfg.context.error_progression_cap, 10);
        assert_eq!(cfg.context.truncate_chars, 2000);
        assert_eq!(cfg.context.truncate_keep_chars, 1000);
        assert!((cfg.retrieval.bm25_weight + cfg.retrieval.vector_weight - 1.0).abs() < 1e-6);
        assert!(cfg.tools.diagnostic_denylist.contains(&"sudo".to_string()));
    }

    #[test]
    fn round_trips_through_toml() {
        let cfg = RuntimeConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: RuntimeConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.orchestrator.max_session_steps, cfg.orchestrator.max_session_steps);
    }

    #[test]
    fn loads_defaults_when_no_file_present() {
        let dir = tempfile::tempdir().unwrap();
        let result = RuntimeConfig::load_project(dir.path()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn loads_project_override_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".wrench")).unwrap();
        std::fs::write(
            dir.path().join(".wrench").join("config.toml"),
            "[orchestrator]\nmax_session_steps = 5\n",
        )
        .unwrap();
        let result = RuntimeConfig::load_project(dir.path()).unwrap().unwrap();
        assert_eq!(result.orchestrator.max_session_steps, 5);
    }
}
