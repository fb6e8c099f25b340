use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::change_tracker::FileChange;
use super::permission::ToolPermission;
use super::{Tool, ToolContext, ToolResult};
use crate::diff;
use crate::file_state;

pub struct ProposeCodePatchTool;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PatchAction {
    Replace,
    Delete,
    Insert,
}

#[derive(Debug, Deserialize)]
struct PatchChange {
    line_number: usize,
    action: PatchAction,
    #[serde(default)]
    old_content: String,
    #[serde(default)]
    new_content: String,
}

#[async_trait]
impl Tool for ProposeCodePatchTool {
    fn name(&self) -> &str {
        "propose_code_patch"
    }

    fn description(&self) -> &str {
        "Propose a structured set of line-level changes to a single file - replace, delete, \
         or insert a line at a time - and apply them as a unified diff. All changes must \
         succeed or the whole patch is rolled back. Requires user confirmation before it runs."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to the file to patch, relative to the working directory"
                },
                "patch_content": {
                    "type": "array",
                    "description": "Ordered list of line-level changes to apply",
                    "items": {
                        "type": "object",
                        "properties": {
                            "line_number": { "type": "integer", "description": "1-based line number the change applies to" },
                            "action": { "type": "string", "enum": ["replace", "delete", "insert"] },
                            "old_content": { "type": "string", "description": "Expected current content of the line, for replace/delete" },
                            "new_content": { "type": "string", "description": "New line content, for replace/insert" }
                        },
                        "required": ["line_number", "action"]
                    }
                },
                "patch_description": { "type": "string", "description": "Human-readable summary of what this patch fixes" }
            },
            "required": ["file_path", "patch_content", "patch_description"]
        })
    }

    fn permission(&self) -> ToolPermission {
        ToolPermission::NeedsApproval
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let file_path = args
            .get("file_path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("Missing required parameter: file_path"))?;
        let patch_content = args
            .get("patch_content")
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Missing required parameter: patch_content"))?;
        let changes: Vec<PatchChange> = serde_json::from_value(patch_content)
            .map_err(|e| anyhow::anyhow!("Invalid patch_content: {e}"))?;
        let description = args.get("patch_description").and_then(|v| v.as_str()).unwrap_or("");

        let relative_path = {
            let file_state = ctx.file_state.lock().await;
            file_state::resolve(&file_state, &ctx.cwd, file_path)
        };
        let path = resolve_path(&relative_path, &ctx.cwd);

        let existed = path.exists();
        let original = if existed { std::fs::read_to_string(&path)? } else { String::new() };

        let new_content = match apply_changes(&original, &changes) {
            Ok(content) => content,
            Err(e) => {
                return Ok(ToolResult {
                    output: format!("Patch rejected: {e}"),
                    metadata: json!({ "user_confirmation": true, "patch_applied": false }),
                });
            }
        };

        let unified = diff::unified_diff(&relative_path, &original, &new_content, 3);
        if unified.is_empty() {
            return Ok(ToolResult {
                output: "Patch produced no change.".to_string(),
                metadata: json!({ "user_confirmation": true, "patch_applied": false }),
            });
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &new_content)?;

        let mut tracker = ctx.change_tracker.lock().await;
        tracker.record(FileChange {
            path: path.clone(),
            original: if existed { Some(original) } else { None },
            new_content,
            tool_name: "propose_code_patch".to_string(),
            timestamp: chrono::Utc::now(),
        });

        Ok(ToolResult {
            output: format!("Applied patch to {relative_path}: {description}\n{unified}"),
            metadata: json!({ "user_confirmation": true, "patch_applied": true, "file_path": relative_path }),
        })
    }
}

/// Applies changes in ascending line-number order, tracking the running
/// offset inserts/deletes introduce so later line numbers still land right.
fn apply_changes(content: &str, changes: &[PatchChange]) -> Result<String> {
    let mut lines: Vec<String> = content.lines().map(|l| l.to_string()).collect();
    let mut ordered: Vec<&PatchChange> = changes.iter().collect();
    ordered.sort_by_key(|c| c.line_number);

    let mut offset: isize = 0;
    for change in ordered {
        let index = (change.line_number as isize - 1 + offset) as usize;
        match change.action {
            PatchAction::Replace => {
                if index >= lines.len() {
                    anyhow::bail!("line {} is out of range", change.line_number);
                }
                if !change.old_content.is_empty() && lines[index] != change.old_content {
                    anyhow::bail!("line {} does not match expected old_content", change.line_number);
                }
                lines[index] = change.new_content.clone();
            }
            PatchAction::Delete => {
                if index >= lines.len() {
                    anyhow::bail!("line {} is out of range", change.line_number);
                }
                if !change.old_content.is_empty() && lines[index] != change.old_content {
                    anyhow::bail!("line {} does not match expected old_content", change.line_number);
                }
                lines.remove(index);
                offset -= 1;
            }
            PatchAction::Insert => {
                let insert_at = index.min(lines.len());
                lines.insert(insert_at, change.new_content.clone());
                offset += 1;
            }
        }
    }
    Ok(lines.join("\n"))
}

fn resolve_path(file_path: &str, cwd: &Path) -> PathBuf {
    let p = Path::new(file_path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        cwd.join(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_a_line_in_place() {
        let old = "a\nb\nc";
        let changes = vec![PatchChange {
            line_number: 2,
            action: PatchAction::Replace,
            old_content: "b".to_string(),
            new_content: "B".to_string(),
        }];
        assert_eq!(apply_changes(old, &changes).unwrap(), "a\nB\nc");
    }

    #[test]
    fn rejects_replace_when_old_content_does_not_match() {
        let old = "a\nb\nc";
        let changes = vec![PatchChange {
            line_number: 2,
            action: PatchAction::Replace,
            old_content: "z".to_string(),
            new_content: "B".to_string(),
        }];
        assert!(apply_changes(old, &changes).is_err());
    }

    #[test]
    fn inserts_and_deletes_keep_offsets_consistent() {
        let old = "a\nb\nc";
        let changes = vec![
            PatchChange { line_number: 1, action: PatchAction::Insert, old_content: String::new(), new_content: "zero".to_string() },
            PatchChange { line_number: 3, action: PatchAction::Delete, old_content: "b".to_string(), new_content: String::new() },
        ];
        assert_eq!(apply_changes(old, &changes).unwrap(), "zero\na\nc");
    }
}
