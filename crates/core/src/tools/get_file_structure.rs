use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use super::{Tool, ToolContext, ToolResult};
use crate::context::{FileStructure, FileStructureMetadata};
use crate::fs_scan;

pub struct GetFileStructureTool;

#[async_trait]
impl Tool for GetFileStructureTool {
    fn name(&self) -> &str {
        "get_file_structure"
    }

    fn description(&self) -> &str {
        "Return a tree view of the project and a flat file list, filtered to files likely \
         relevant to debugging. Prefer this over repeated list_directory_contents calls \
         when you need the overall project shape."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "max_depth": { "type": "integer", "description": "Maximum recursion depth (default from configuration)" },
                "include_hidden": { "type": "boolean", "description": "Include dotfiles and dotdirs. Default false." }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let max_depth = args
            .get("max_depth")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(ctx.config.structure_max_depth);
        let include_hidden = args.get("include_hidden").and_then(|v| v.as_bool()).unwrap_or(false);

        {
            let kb = ctx.knowledge_base.lock().await;
            if let Some(cached) = &kb.file_structure {
                if cached.max_depth >= max_depth && cached.included_hidden == include_hidden {
                    let output = format!(
                        "{}\n\nRelevant files:\n{}",
                        cached.tree_structure,
                        cached.flat_files.join("\n")
                    );
                    return Ok(ToolResult {
                        output,
                        metadata: json!({
                            "total_files": cached.metadata.total_files,
                            "relevant_files": cached.flat_files,
                            "max_depth": max_depth,
                            "cached": true,
                        }),
                    });
                }
            }
        }

        let (tree, flat) = fs_scan::scan(&ctx.cwd, max_depth, include_hidden)?;
        let relevant: Vec<String> = flat
            .iter()
            .filter(|f| !f.is_dir && crate::relevance::is_relevant(&f.relative_path, f.depth, f.size_bytes))
            .map(|f| f.relative_path.clone())
            .collect();
        let total_files = flat.iter().filter(|f| !f.is_dir).count();
        let code_files = flat.iter().filter(|f| !f.is_dir && crate::relevance::is_code_file(&f.relative_path)).count();

        let output = format!("{tree}\n\nRelevant files:\n{}", relevant.join("\n"));

        let mut kb = ctx.knowledge_base.lock().await;
        kb.file_structure = Some(FileStructure {
            tree_structure: tree,
            flat_files: relevant.clone(),
            metadata: FileStructureMetadata {
                total_files,
                relevant_files: relevant.len(),
                code_files,
                relevant_extensions: Vec::new(),
                project_root: ctx.cwd.to_string_lossy().into_owned(),
            },
            max_depth,
            included_hidden: include_hidden,
            cached_at: Some(Utc::now()),
        });

        Ok(ToolResult {
            output,
            metadata: json!({
                "total_files": total_files,
                "relevant_files": relevant,
                "max_depth": max_depth,
            }),
        })
    }
}
