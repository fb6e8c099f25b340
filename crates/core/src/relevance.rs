//! Relevance Filter for `flat_files`.

use std::path::Path;

const CODE_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "jsx", "tsx", "java", "cpp", "c", "rb", "go", "rs", "php", "swift", "kt", "cs",
];

const CONFIG_EXTENSIONS: &[&str] = &["yaml", "yml", "env", "toml", "ini", "cfg", "conf"];

/// Whether `relative_path`'s extension is one of the recognized source-code extensions.
pub fn is_code_file(relative_path: &str) -> bool {
    Path::new(relative_path)
        .extension()
        .map(|e| CODE_EXTENSIONS.contains(&e.to_string_lossy().to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Decides whether a discovered file belongs in the knowledge base's flat file list.
///
/// `relative_path` is relative to the project root; `depth` is its path depth
/// (root-level files are depth 0); `size_bytes` is its on-disk size.
pub fn is_relevant(relative_path: &str, depth: usize, size_bytes: u64) -> bool {
    let path = Path::new(relative_path);
    let file_name = path.file_name().map(|n| n.to_string_lossy().to_lowercase()).unwrap_or_default();
    let extension = path.extension().map(|e| e.to_string_lossy().to_lowercase());

    if let Some(ext) = &extension {
        if CODE_EXTENSIONS.contains(&ext.as_str()) {
            return true;
        }
        if CONFIG_EXTENSIONS.contains(&ext.as_str()) {
            return true;
        }
        if ext == "md" && depth <= 1 {
            return true;
        }
    }

    if file_name == "package.json" && !relative_path.contains("node_modules") {
        return true;
    }
    if file_name == "package-lock.json" {
        return true;
    }

    if file_name.contains("requirements") || file_name.contains("dockerfile") || file_name.contains("makefile") {
        return true;
    }

    if file_name.starts_with('.') && size_bytes < 5_000 {
        return true;
    }

    if depth <= 1 && size_bytes < 1_000 {
        return true;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_recognized_code_extensions() {
        assert!(is_relevant("src/main.rs", 2, 10_000));
        assert!(is_relevant("app.py", 0, 10_000));
    }

    #[test]
    fn accepts_root_package_json_but_not_nested_node_modules() {
        assert!(is_relevant("package.json", 0, 500));
        assert!(!is_relevant("node_modules/foo/package.json", 3, 500));
    }

    #[test]
    fn accepts_markdown_only_near_root() {
        assert!(is_relevant("README.md", 0, 10_000));
        assert!(!is_relevant("docs/guide/setup.md", 3, 10_000));
    }

    #[test]
    fn accepts_small_dotfiles_and_small_root_files() {
        assert!(is_relevant(".env", 0, 100));
        assert!(!is_relevant(".env", 0, 10_000));
        assert!(is_relevant("notes.txt", 0, 500));
        assert!(!is_relevant("notes.txt", 0, 5_000));
    }

    #[test]
    fn rejects_unrelated_deep_large_file() {
        assert!(!is_relevant("build/output/bundle.min.js.map", 3, 900));
    }
}
