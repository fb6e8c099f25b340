use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use regex::RegexBuilder;
use serde_json::{json, Value};

use super::{Tool, ToolContext, ToolResult};
use crate::context::{SearchCacheEntry, SearchedFileMeta};

const MAX_LINE_LEN: usize = 500;

pub struct SearchFileContentTool;

#[async_trait]
impl Tool for SearchFileContentTool {
    fn name(&self) -> &str {
        "search_file_content"
    }

    fn description(&self) -> &str {
        "Search file contents for a literal substring or regex pattern under a directory, \
         case-insensitively. Returns matching lines with file path and line number."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": { "type": "string", "description": "Literal substring or regex pattern to search for" },
                "path": { "type": "string", "description": "Directory to search under (default: working directory)" },
                "regex": { "type": "boolean", "description": "Treat `pattern` as a regex instead of a literal substring. Default false." },
                "file_extensions": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Restrict the search to files with these extensions (no leading dot)"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let pattern = args
            .get("pattern")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("Missing required parameter: pattern"))?;
        let is_regex = args.get("regex").and_then(|v| v.as_bool()).unwrap_or(false);
        let extensions: Vec<String> = args
            .get("file_extensions")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(|s| s.to_lowercase())).collect())
            .unwrap_or_default();

        let path_arg = args.get("path").and_then(|v| v.as_str()).unwrap_or("");
        let base = if path_arg.is_empty() { ctx.cwd.clone() } else { resolve_path(path_arg, &ctx.cwd) };

        let cache_key = format!("{pattern}|{path_arg}|{is_regex}|{}", extensions.join(","));

        if let Some(cached) = self.try_cached(ctx, &cache_key).await {
            return Ok(ToolResult {
                output: if cached.results.is_empty() { "No matches found".to_string() } else { cached.results.join("\n") },
                metadata: json!({ "match_count": cached.results.len(), "files_searched": cached.files_searched, "cached": true }),
            });
        }

        let matcher: Box<dyn Fn(&str) -> bool> = if is_regex {
            let re = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| anyhow::anyhow!("Invalid regex: {e}"))?;
            Box::new(move |line: &str| re.is_match(line))
        } else {
            let needle = pattern.to_lowercase();
            Box::new(move |line: &str| line.to_lowercase().contains(&needle))
        };

        let max_results = ctx.config.search_max_results;
        let max_depth = ctx.config.search_max_depth;
        let mut results = Vec::new();
        let mut files_searched = 0usize;
        let mut sampled_meta = Vec::new();
        search_dir(
            &base,
            &base,
            matcher.as_ref(),
            &extensions,
            0,
            max_depth,
            &mut results,
            &mut files_searched,
            max_results,
            ctx.config.search_cache_sample_files,
            &mut sampled_meta,
        );

        let count = results.len();
        let output = if results.is_empty() { "No matches found".to_string() } else { results.join("\n") };

        let mut kb = ctx.knowledge_base.lock().await;
        kb.search_results.insert(
            cache_key,
            SearchCacheEntry {
                results: results.clone(),
                files_searched,
                searched_files_metadata: sampled_meta,
                timestamp: Utc::now(),
            },
        );

        Ok(ToolResult {
            output,
            metadata: json!({ "match_count": count, "files_searched": files_searched }),
        })
    }
}

impl SearchFileContentTool {
    /// Returns the cached entry if it is within the TTL and a sample of the
    /// files it searched still matches their recorded mtime/size.
    async fn try_cached(&self, ctx: &ToolContext, cache_key: &str) -> Option<SearchCacheEntry> {
        let kb = ctx.knowledge_base.lock().await;
        let entry = kb.search_results.get(cache_key)?;
        let ttl = chrono::Duration::seconds(ctx.config.search_cache_ttl_secs as i64);
        if Utc::now() - entry.timestamp > ttl {
            return None;
        }
        for sampled in &entry.searched_files_metadata {
            let path = ctx.cwd.join(&sampled.path);
            let Ok(meta) = std::fs::metadata(&path) else { return None };
            let mtime = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);
            if mtime != sampled.mtime || meta.len() != sampled.size {
                return None;
            }
        }
        Some(entry.clone())
    }
}

#[allow(clippy::too_many_arguments)]
fn search_dir(
    root: &Path,
    dir: &Path,
    matcher: &dyn Fn(&str) -> bool,
    extensions: &[String],
    depth: usize,
    max_depth: usize,
    results: &mut Vec<String>,
    files_searched: &mut usize,
    max_results: usize,
    sample_cap: usize,
    sampled_meta: &mut Vec<SearchedFileMeta>,
) {
    if results.len() >= max_results || depth > max_depth || !dir.exists() {
        return;
    }

    if dir.is_file() {
        search_file(root, dir, matcher, extensions, results, files_searched, max_results, sample_cap, sampled_meta);
        return;
    }

    let Ok(entries) = std::fs::read_dir(dir) else { return };
    let mut entries: Vec<_> = entries.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        if results.len() >= max_results {
            break;
        }
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || name == "node_modules" || name == "target" || name == "__pycache__" {
            continue;
        }
        if path.is_dir() {
            search_dir(root, &path, matcher, extensions, depth + 1, max_depth, results, files_searched, max_results, sample_cap, sampled_meta);
        } else if path.is_file() {
            search_file(root, &path, matcher, extensions, results, files_searched, max_results, sample_cap, sampled_meta);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn search_file(
    root: &Path,
    path: &Path,
    matcher: &dyn Fn(&str) -> bool,
    extensions: &[String],
    results: &mut Vec<String>,
    files_searched: &mut usize,
    max_results: usize,
    sample_cap: usize,
    sampled_meta: &mut Vec<SearchedFileMeta>,
) {
    if !extensions.is_empty() {
        let ext = path.extension().map(|e| e.to_string_lossy().to_lowercase()).unwrap_or_default();
        if !extensions.contains(&ext) {
            return;
        }
    }

    let Ok(data) = std::fs::read(path) else { return };
    if data.len() > 512 && data[..512].contains(&0) {
        return;
    }
    *files_searched += 1;

    let relative = path.strip_prefix(root).unwrap_or(path);
    if sampled_meta.len() < sample_cap {
        if let Ok(meta) = std::fs::metadata(path) {
            let mtime = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);
            sampled_meta.push(SearchedFileMeta {
                path: relative.to_string_lossy().replace('\\', "/"),
                mtime,
                size: meta.len(),
            });
        }
    }

    let text = String::from_utf8_lossy(&data);
    for (line_num, line) in text.lines().enumerate() {
        if results.len() >= max_results {
            break;
        }
        if matcher(line) {
            let display = if line.len() > MAX_LINE_LEN {
                format!("{}...", &line[..MAX_LINE_LEN])
            } else {
                line.to_string()
            };
            results.push(format!("{}:{}:{}", relative.display(), line_num + 1, display));
        }
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
