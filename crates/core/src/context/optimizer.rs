//! Context Optimizer. Always operates on a clone; never mutates
//! the authoritative `AgentContext`.

use wrench_config::ContextConfig;

use super::{AgentContext, Step, StepResult};

pub fn optimize(ctx: &AgentContext, cfg: &ContextConfig) -> AgentContext {
    let mut optimized = ctx.clone();

    if optimized.current_blocking_error.is_some() {
        focus_mode(&mut optimized, cfg);
    } else {
        drift_mode(&mut optimized, cfg);
    }

    truncate_file_contents(&mut optimized, cfg);
    consolidate_notes(&mut optimized, cfg);
    optimized.evict_old_progression(cfg.error_progression_cap);

    optimized
}

fn focus_mode(ctx: &mut AgentContext, cfg: &ContextConfig) {
    let total = ctx.session_history.len();
    let cutoff = total.saturating_sub(cfg.focus_recent_steps);

    let mut kept: Vec<Step> = ctx
        .session_history
        .iter()
        .enumerate()
        .filter(|(i, s)| {
            *i >= cutoff
                || s.action_taken.tool == "propose_code_patch"
                || s.action_taken.tool == "propose_fix_by_command"
        })
        .map(|(_, s)| s.clone())
        .collect();

    if kept.len() < cfg.focus_min_steps.min(total) {
        let start = total.saturating_sub(cfg.focus_min_steps);
        kept = ctx.session_history[start..].to_vec();
    }
    ctx.session_history = kept;

    if let Some(err) = ctx.current_blocking_error.clone() {
        ctx.knowledge_base.files_read.retain(|path, _| {
            err.file_refs
                .iter()
                .any(|f| path.contains(f.as_str()) || f.contains(path.as_str()))
        });
    }

    while ctx.recent_actions.len() > cfg.recent_actions_focus_cap {
        ctx.recent_actions.remove(0);
    }
}

fn drift_mode(ctx: &mut AgentContext, cfg: &ContextConfig) {
    let total = ctx.session_history.len();
    if total <= cfg.drift_recent_steps {
        return;
    }

    let keep_from = total - cfg.drift_recent_steps;
    let dropped = &ctx.session_history[..keep_from];

    let mut summary_lines = Vec::new();
    for step in dropped {
        summary_lines.push(format!("{}: {}", step.action_taken.tool, step.result.status));
    }
    let summary_step = Step {
        step_no: dropped.first().map(|s| s.step_no).unwrap_or(0),
        thought: "summary of earlier steps".to_string(),
        action_taken: super::ActionTaken {
            tool: "_summary".to_string(),
            parameters: serde_json::json!({}),
        },
        result: StepResult {
            status: "summary".to_string(),
            output: serde_json::json!(summary_lines.join("; ")),
        },
    };

    let mut new_history = vec![summary_step];
    new_history.extend_from_slice(&ctx.session_history[keep_from..]);
    ctx.session_history = new_history;
}

fn truncate_file_contents(ctx: &mut AgentContext, cfg: &ContextConfig) {
    for cached in ctx.knowledge_base.files_read.values_mut() {
        cached.content = truncate_content(&cached.content, cfg.truncate_chars, cfg.truncate_keep_chars);
    }
}

pub fn truncate_content(content: &str, cap: usize, keep: usize) -> String {
    if content.len() <= cap {
        return content.to_string();
    }
    let head: String = content.chars().take(keep).collect();
    let tail: String = content
        .chars()
        .rev()
        .take(keep)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("{head}\n... (truncated) ...\n{tail}")
}

fn consolidate_notes(ctx: &mut AgentContext, cfg: &ContextConfig) {
    let notes = &mut ctx.knowledge_base.error_analysis_notes;
    if notes.len() <= cfg.notes_trigger_count {
        return;
    }
    let combined = notes.iter().map(|n| n.text.clone()).collect::<Vec<_>>().join(" ");
    let compressed = truncate_content(&combined, cfg.notes_max_chars, cfg.notes_max_chars / 2);
    let step = notes.last().map(|n| n.step).unwrap_or(0);
    *notes = vec![super::ErrorAnalysisNote {
        kind: "consolidated".to_string(),
        text: compressed,
        step,
    }];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ActionTaken, BlockingError, Constraints, InitialCommandRun, Step, StepResult};

    fn base_ctx() -> AgentContext {
        AgentContext::new(
            "fix the bug".to_string(),
            InitialCommandRun {
                command_string: "python app.py".to_string(),
                stdout: String::new(),
                stderr: "ModuleNotFoundError: No module named 'requests'".to_string(),
                exit_code: 1,
            },
            "/tmp/project".to_string(),
            Vec::new(),
            Constraints::default(),
        )
    }

    fn dummy_step(n: u32, tool: &str) -> Step {
        Step {
            step_no: n,
            thought: "t".to_string(),
            action_taken: ActionTaken {
                tool: tool.to_string(),
                parameters: serde_json::json!({}),
            },
            result: StepResult {
                status: "success".to_string(),
                output: serde_json::json!("ok"),
            },
        }
    }

    #[test]
    fn focus_mode_keeps_patch_steps_outside_window() {
        let mut ctx = base_ctx();
        ctx.current_blocking_error = Some(BlockingError {
            error_type: "ModuleNotFoundError".to_string(),
            message: "No module named 'requests'".to_string(),
            file_refs: vec!["app.py".to_string()],
            line_refs: vec![],
            raw_output: String::new(),
            first_seen_step: 1,
            last_seen_step: 1,
            status: "active".to_string(),
        });
        for n in 1..=8 {
            let tool = if n == 2 { "propose_code_patch" } else { "read_file_content" };
            ctx.session_history.push(dummy_step(n, tool));
        }
        let cfg = ContextConfig::default();
        let optimized = optimize(&ctx, &cfg);
        assert!(optimized.session_history.iter().any(|s| s.step_no == 2));
        assert!(optimized.session_history.len() >= cfg.focus_min_steps);
    }

    #[test]
    fn drift_mode_summarizes_older_steps() {
        let mut ctx = base_ctx();
        for n in 1..=8 {
            ctx.session_history.push(dummy_step(n, "read_file_content"));
        }
        let cfg = ContextConfig::default();
        let optimized = optimize(&ctx, &cfg);
        assert_eq!(optimized.session_history[0].action_taken.tool, "_summary");
        assert_eq!(optimized.session_history.len(), cfg.drift_recent_steps + 1);
    }

    #[test]
    fn truncation_preserves_head_and_tail() {
        let content = "a".repeat(3000);
        let truncated = truncate_content(&content, 2000, 1000);
        assert!(truncated.len() < content.len());
        assert!(truncated.starts_with('a'));
        assert!(truncated.ends_with('a'));
    }

    #[test]
    fn optimization_never_mutates_original() {
        let mut ctx = base_ctx();
        for n in 1..=8 {
            ctx.session_history.push(dummy_step(n, "read_file_content"));
        }
        let before = ctx.session_history.len();
        let cfg = ContextConfig::default();
        let _ = optimize(&ctx, &cfg);
        assert_eq!(ctx.session_history.len(), before);
    }
}
