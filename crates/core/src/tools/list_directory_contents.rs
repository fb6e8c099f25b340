use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Tool, ToolContext, ToolResult};
use crate::file_state;
use crate::fs_scan::format_size;

pub struct ListDirectoryContentsTool;

#[async_trait]
impl Tool for ListDirectoryContentsTool {
    fn name(&self) -> &str {
        "list_directory_contents"
    }

    fn description(&self) -> &str {
        "List the immediate contents of a directory with a [FILE]/[DIR] prefix and file sizes. \
         Sorted alphabetically, hidden entries omitted. Defaults to the working directory."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Directory path, relative to the working directory (default: working directory)" }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let requested = args.get("path").and_then(|v| v.as_str());

        let path = match requested {
            Some(requested) => {
                let relative_path = {
                    let file_state = ctx.file_state.lock().await;
                    file_state::resolve(&file_state, &ctx.cwd, requested)
                };
                resolve_path(&relative_path, &ctx.cwd)
            }
            None => ctx.cwd.clone(),
        };
        if !path.is_dir() {
            anyhow::bail!("Not a directory: {}", path.display());
        }

        let base_depth = path.strip_prefix(&ctx.cwd).map(|p| p.components().count()).unwrap_or(0);

        let mut lines = Vec::new();
        let mut structured = Vec::new();
        let mut rd = tokio::fs::read_dir(&path).await?;
        while let Some(entry) = rd.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            let is_hidden = name.starts_with('.');
            if is_hidden {
                continue;
            }
            let ft = entry.file_type().await?;
            let is_dir = ft.is_dir();
            let size = if is_dir { 0 } else { entry.metadata().await.map(|m| m.len()).unwrap_or(0) };
            let extension = Path::new(&name).extension().map(|e| e.to_string_lossy().into_owned()).unwrap_or_default();
            let relative_path = path.join(&name).strip_prefix(&ctx.cwd).unwrap_or(Path::new(&name)).to_string_lossy().replace('\\', "/");
            let is_code_file = !is_dir && crate::relevance::is_code_file(&relative_path);

            if is_dir {
                lines.push((name.clone(), format!("[DIR]  {name}/")));
            } else {
                lines.push((name.clone(), format!("[FILE] {name} ({})", format_size(size))));
            }

            structured.push(json!({
                "name": name,
                "isDir": is_dir,
                "isHidden": is_hidden,
                "extension": extension,
                "is_code_file": is_code_file,
                "size_bytes": size,
                "depth": base_depth,
            }));
        }
        lines.sort_by(|a, b| a.0.cmp(&b.0));
        structured.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));

        let count = lines.len();
        let output = if lines.is_empty() {
            format!("{} is empty", path.display())
        } else {
            lines.into_iter().map(|(_, rendered)| rendered).collect::<Vec<_>>().join("\n")
        };

        Ok(ToolResult {
            output,
            metadata: json!({ "count": count, "entries": structured }),
        })
    }
}

fn resolve_path(path: &str, cwd: &Path) -> std::path::PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        cwd.join(p)
    }
}
