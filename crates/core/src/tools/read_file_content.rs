use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use super::{Tool, ToolContext, ToolResult};
use crate::context::{CachedFileRead, FileMeta};
use crate::file_state;

const MAX_LINE_LEN: usize = 2000;
const CACHE_REUSE_WINDOW_STEPS: u32 = 3;

pub struct ReadFileContentTool;

#[async_trait]
impl Tool for ReadFileContentTool {
    fn name(&self) -> &str {
        "read_file_content"
    }

    fn description(&self) -> &str {
        "Read a file's contents, line-numbered. Resolve the path against the known file \
         mappings before guessing - never invent a path. Optionally restrict to a line range."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": { "type": "string", "description": "Path to the file, relative to the working directory" },
                "start_line": { "type": "integer", "description": "First line to show, 1-based (default: start of file)" },
                "end_line": { "type": "integer", "description": "Last line to show, 1-based (default: end of file)" }
            },
            "required": ["file_path"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let requested = args
            .get("file_path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("Missing required parameter: file_path"))?;
        let start_line = args.get("start_line").and_then(|v| v.as_u64()).map(|v| v as usize);
        let end_line = args.get("end_line").and_then(|v| v.as_u64()).map(|v| v as usize);

        let relative_path = {
            let file_state = ctx.file_state.lock().await;
            file_state::resolve(&file_state, &ctx.cwd, requested)
        };
        let path = resolve_path(&relative_path, &ctx.cwd);
        if !path.exists() {
            return Ok(ToolResult {
                output: format!("File not found: {relative_path}"),
                metadata: json!({ "error": "not_found" }),
            });
        }

        let disk_meta = tokio::fs::metadata(&path).await?;
        let disk_size = disk_meta.len();
        let disk_mtime = disk_meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let cached_content = {
            let kb = ctx.knowledge_base.lock().await;
            kb.files_read.get(&relative_path).and_then(|cached| {
                let fresh_enough = ctx.current_step_no < cached.step_no.saturating_add(CACHE_REUSE_WINDOW_STEPS);
                let unchanged = kb
                    .file_metadata
                    .get(&relative_path)
                    .map(|m| m.mtime == disk_mtime && m.size == disk_size)
                    .unwrap_or(false);
                if fresh_enough && unchanged {
                    Some(cached.content.clone())
                } else {
                    None
                }
            })
        };

        let content = if let Some(content) = cached_content {
            content
        } else {
            let raw = tokio::fs::read(&path).await?;
            if raw.len() >= 512 && raw[..512].contains(&0) {
                return Ok(ToolResult {
                    output: format!("Binary file, not shown: {relative_path}"),
                    metadata: json!({ "binary": true, "size": raw.len() }),
                });
            }
            let content = String::from_utf8_lossy(&raw).into_owned();

            let mut kb = ctx.knowledge_base.lock().await;
            kb.files_read.insert(
                relative_path.clone(),
                CachedFileRead { content: content.clone(), step_no: ctx.current_step_no },
            );
            kb.file_metadata.insert(
                relative_path.clone(),
                FileMeta { mtime: disk_mtime, size: disk_size, last_checked: Utc::now() },
            );
            content
        };

        let mut output = String::new();
        for (i, line) in content.lines().enumerate() {
            let line_no = i + 1;
            if start_line.is_some_and(|s| line_no < s) || end_line.is_some_and(|e| line_no > e) {
                continue;
            }
            let line = if line.len() > MAX_LINE_LEN {
                format!("{}... (line truncated)", &line[..MAX_LINE_LEN])
            } else {
                line.to_string()
            };
            output.push_str(&format!("{line_no:6}|{line}\n"));
        }

        Ok(ToolResult {
            output,
            metadata: json!({ "relative_path": relative_path, "bytes": content.len() }),
        })
    }
}

fn resolve_path(file_path: &str, cwd: &Path) -> std::path::PathBuf {
    let p = Path::new(file_path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        cwd.join(p)
    }
}
