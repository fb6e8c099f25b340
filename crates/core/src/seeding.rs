//! Knowledge-Base Seeding: populates the context eagerly from the
//! initial command's output, before the first planner call.

use std::path::Path;

use chrono::Utc;

use crate::context::{AgentContext, ErrorAnalysisNote, FileStructure, FileStructureMetadata};
use crate::error_evolution::parse_error;
use crate::file_state::build_mappings;
use crate::fs_scan;
use crate::relevance::is_relevant;

pub fn seed(ctx: &mut AgentContext, structure_max_depth: usize) {
    let combined = format!(
        "{}\n{}",
        ctx.initial_command_run.stdout, ctx.initial_command_run.stderr
    );

    if let Some(err) = parse_error(&combined, 0) {
        ctx.knowledge_base.error_analysis_notes.push(ErrorAnalysisNote {
            kind: err.error_type.clone(),
            text: err.message.clone(),
            step: 0,
        });
        ctx.current_blocking_error = Some(err);
    }

    let root = Path::new(&ctx.current_working_directory);
    if let Ok((tree, flat)) = fs_scan::scan(root, structure_max_depth, false) {
        let files: Vec<_> = flat.iter().filter(|f| !f.is_dir).collect();
        let relevant: Vec<String> = files
            .iter()
            .filter(|f| is_relevant(&f.relative_path, f.depth, f.size_bytes))
            .map(|f| f.relative_path.clone())
            .collect();

        let code_files = files.iter().filter(|f| crate::relevance::is_code_file(&f.relative_path)).count();

        let mut relevant_extensions: Vec<String> = relevant
            .iter()
            .filter_map(|p| Path::new(p).extension().map(|e| e.to_string_lossy().to_string()))
            .collect();
        relevant_extensions.sort();
        relevant_extensions.dedup();

        ctx.knowledge_base.file_structure = Some(FileStructure {
            tree_structure: tree,
            flat_files: relevant.clone(),
            metadata: FileStructureMetadata {
                total_files: files.len(),
                relevant_files: relevant.len(),
                code_files,
                relevant_extensions,
                project_root: ctx.current_working_directory.clone(),
            },
            max_depth: structure_max_depth,
            included_hidden: false,
            cached_at: Some(Utc::now()),
        });

        ctx.file_state.discovered_files = relevant.clone();

        if let Some(err) = &ctx.current_blocking_error {
            ctx.file_state.file_mappings = build_mappings(&err.file_refs, &relevant);
            ctx.file_state.primary_error_file = err
                .file_refs
                .first()
                .and_then(|f| ctx.file_state.file_mappings.get(f))
                .cloned()
                .or_else(|| err.file_refs.first().cloned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AgentContext, Constraints, InitialCommandRun};

    #[test]
    fn seeding_populates_error_and_file_structure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("etl.py"), "x = data['customer_id']").unwrap();
        std::fs::write(dir.path().join("data.csv"), "a,b\n1,2").unwrap();

        let mut ctx = AgentContext::new(
            "fix the key error".to_string(),
            InitialCommandRun {
                command_string: "python etl.py".to_string(),
                stdout: String::new(),
                stderr: "File \"etl.py\", line 1\nKeyError: 'customer_id'".to_string(),
                exit_code: 1,
            },
            dir.path().to_string_lossy().to_string(),
            Vec::new(),
            Constraints::default(),
        );

        seed(&mut ctx, 3);

        assert!(ctx.current_blocking_error.is_some());
        assert_eq!(ctx.current_blocking_error.as_ref().unwrap().error_type, "KeyError");
        let structure = ctx.knowledge_base.file_structure.unwrap();
        assert!(structure.flat_files.iter().any(|f| f == "etl.py"));
        assert!(structure.flat_files.iter().any(|f| f == "data.csv"));
        assert_eq!(ctx.file_state.primary_error_file, Some("etl.py".to_string()));
    }

    #[test]
    fn seeding_without_error_leaves_current_blocking_error_none() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = AgentContext::new(
            "explore".to_string(),
            InitialCommandRun {
                command_string: "ls".to_string(),
                stdout: "ok".to_string(),
                stderr: String::new(),
                exit_code: 0,
            },
            dir.path().to_string_lossy().to_string(),
            Vec::new(),
            Constraints::default(),
        );
        seed(&mut ctx, 3);
        assert!(ctx.current_blocking_error.is_none());
    }
}
