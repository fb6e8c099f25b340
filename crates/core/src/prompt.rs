//! Prompt Assembly: a deterministic function of the optimized
//! context. Never embeds file content beyond the truncation cap already
//! applied by the context optimizer.

use crate::context::AgentContext;

const SYSTEM_PREAMBLE: &str = "\
# Role
You are a local, interactive debugging assistant. A user ran a shell command \
that failed; your job is to drive an iterative diagnose-and-fix loop until the \
error is resolved, reasonable guidance has been given, or you cannot proceed \
further.

# Response contract
Respond with a single JSON object and nothing else:
{\"thought\": string, \"tool_to_use\": string, \"tool_parameters\": object}

# Closed tool set
list_directory_contents, read_file_content, run_diagnostic_command, \
search_file_content, get_file_structure, propose_code_patch, \
propose_fix_by_command, ask_user_for_clarification, finish_debugging

# Safety rules
- Never take a destructive action (write a file, run a mutating command) \
without the tool's own confirmation step.
- Never guess a file path; resolve it from the project structure you were given.
- `current_blocking_error`, when present, is your single focus - do not wander \
into unrelated files.
";

pub fn assemble(ctx: &AgentContext, is_first_step: bool) -> String {
    let mut out = String::new();
    out.push_str(SYSTEM_PREAMBLE);
    out.push_str("\n# Status summary\n");
    out.push_str(&status_summary(ctx));

    out.push_str("\n# Context\n");
    out.push_str(&serde_json::to_string_pretty(ctx).unwrap_or_default());

    if is_first_step {
        out.push_str(
            "\n# Step directive\nThis is the first step. Analyze the initial command's output \
             above before taking any action.\n",
        );
    }

    out
}

fn status_summary(ctx: &AgentContext) -> String {
    let mut lines = Vec::new();

    if ctx.solved_issues.is_empty() {
        lines.push("Solved issues: none".to_string());
    } else {
        let solved: Vec<String> = ctx
            .solved_issues
            .iter()
            .map(|s| format!("- {} (resolved at step {})", s.error.error_type, s.resolution_step))
            .collect();
        lines.push(format!("Solved issues:\n{}", solved.join("\n")));
    }

    match &ctx.current_blocking_error {
        Some(err) => lines.push(format!(
            "Current blocking error: {} - {} (files: {})",
            err.error_type,
            err.message,
            err.file_refs.join(", ")
        )),
        None => lines.push("Current blocking error: none".to_string()),
    }

    lines.push(format!(
        "Available files: {}",
        ctx.file_state.discovered_files.join(", ")
    ));

    if let Some(primary) = &ctx.file_state.primary_error_file {
        lines.push(format!("Primary error file: {primary}"));
    }

    if !ctx.file_state.file_mappings.is_empty() {
        let mappings: Vec<String> = ctx
            .file_state
            .file_mappings
            .iter()
            .map(|(k, v)| format!("{k} -> {v}"))
            .collect();
        lines.push(format!("Name mappings: {}", mappings.join(", ")));
    }

    if let Some(structure) = &ctx.knowledge_base.file_structure {
        lines.push(format!(
            "Project structure: {} total files, {} relevant, extensions: {}",
            structure.metadata.total_files,
            structure.metadata.relevant_files,
            structure.metadata.relevant_extensions.join(", ")
        ));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AgentContext, Constraints, InitialCommandRun};

    #[test]
    fn assembly_includes_preamble_summary_and_json_context() {
        let ctx = AgentContext::new(
            "fix it".to_string(),
            InitialCommandRun {
                command_string: "python app.py".to_string(),
                stdout: String::new(),
                stderr: "ModuleNotFoundError: No module named 'requests'".to_string(),
                exit_code: 1,
            },
            "/tmp/project".to_string(),
            Vec::new(),
            Constraints::default(),
        );
        let prompt = assemble(&ctx, true);
        assert!(prompt.contains("tool_to_use"));
        assert!(prompt.contains("Status summary"));
        assert!(prompt.contains("first step"));
        assert!(prompt.contains("\"initial_user_request\""));
    }
}
