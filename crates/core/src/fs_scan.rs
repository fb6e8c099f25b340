//! Shared project-tree walking used by knowledge-base seeding and by the
//! `list_directory_contents` / `get_file_structure` tools.

use std::path::Path;

use anyhow::Result;

const DEFAULT_EXCLUDES: &[&str] = &["node_modules", ".git", "target", "__pycache__", ".venv"];

#[derive(Debug, Clone)]
pub struct FlatEntry {
    pub relative_path: String,
    pub depth: usize,
    pub size_bytes: u64,
    pub is_dir: bool,
}

/// Walks `root` up to `max_depth`, skipping noisy build directories and,
/// unless `include_hidden`, dotfiles/dotdirs. Returns both a rendered tree and
/// the flat entry list (files and directories).
pub fn scan(root: &Path, max_depth: usize, include_hidden: bool) -> Result<(String, Vec<FlatEntry>)> {
    let mut lines = Vec::new();
    let mut flat = Vec::new();
    let root_name = root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| root.to_string_lossy().to_string());
    lines.push(format!("{root_name}/"));

    walk(root, root, "", max_depth, 0, include_hidden, &mut lines, &mut flat)?;
    Ok((lines.join("\n"), flat))
}

fn walk(
    root: &Path,
    dir: &Path,
    prefix: &str,
    max_depth: usize,
    current_depth: usize,
    include_hidden: bool,
    lines: &mut Vec<String>,
    flat: &mut Vec<FlatEntry>,
) -> Result<()> {
    if current_depth >= max_depth || !dir.is_dir() {
        return Ok(());
    }

    let mut entries: Vec<_> = std::fs::read_dir(dir)?.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());

    let visible: Vec<_> = entries
        .into_iter()
        .filter(|e| {
            let name = e.file_name().to_string_lossy().to_string();
            if DEFAULT_EXCLUDES.contains(&name.as_str()) {
                return false;
            }
            include_hidden || !name.starts_with('.')
        })
        .collect();

    let total = visible.len();
    for (i, entry) in visible.into_iter().enumerate() {
        let name = entry.file_name().to_string_lossy().to_string();
        let path = entry.path();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
        let relative_path = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");

        let is_last = i == total - 1;
        let connector = if is_last { "└── " } else { "├── " };
        let child_prefix = if is_last { "    " } else { "│   " };
        lines.push(format!("{prefix}{connector}{name}{}", if is_dir { "/" } else { "" }));

        flat.push(FlatEntry {
            relative_path,
            depth: current_depth,
            size_bytes,
            is_dir,
        });

        if is_dir {
            let new_prefix = format!("{prefix}{child_prefix}");
            walk(root, &path, &new_prefix, max_depth, current_depth + 1, include_hidden, lines, flat)?;
        }
    }
    Ok(())
}

pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1}GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1}MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1}KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes}B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_nested_directories_and_excludes_noise() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        std::fs::write(dir.path().join("node_modules/pkg/index.js"), "x").unwrap();

        let (tree, flat) = scan(dir.path(), 3, false).unwrap();
        assert!(tree.contains("src/"));
        assert!(!tree.contains("node_modules"));
        assert!(flat.iter().any(|f| f.relative_path == "src/main.rs"));
        assert!(!flat.iter().any(|f| f.relative_path.contains("node_modules")));
    }

    #[test]
    fn respects_max_depth() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b/c")).unwrap();
        std::fs::write(dir.path().join("a/b/c/deep.txt"), "x").unwrap();
        let (_, flat) = scan(dir.path(), 2, false).unwrap();
        assert!(!flat.iter().any(|f| f.relative_path.contains("deep.txt")));
    }

    #[test]
    fn excludes_hidden_unless_requested() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "x").unwrap();
        let (_, flat) = scan(dir.path(), 2, false).unwrap();
        assert!(!flat.iter().any(|f| f.relative_path == ".env"));
        let (_, flat_hidden) = scan(dir.path(), 2, true).unwrap();
        assert!(flat_hidden.iter().any(|f| f.relative_path == ".env"));
    }
}
