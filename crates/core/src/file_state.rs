//! File-State Resolution.

use std::path::Path;

use crate::context::FileState;

/// Resolves a requested file path against the ordered fallback rules.
pub fn resolve(file_state: &FileState, cwd: &Path, requested: &str) -> String {
    if let Some(mapped) = file_state.file_mappings.get(requested) {
        return mapped.clone();
    }
    if cwd.join(requested).exists() {
        return requested.to_string();
    }
    if let Some(primary) = &file_state.primary_error_file {
        if cwd.join(primary).exists() {
            return primary.clone();
        }
    }
    if let Some(first) = file_state.discovered_files.first() {
        return first.clone();
    }
    requested.to_string()
}

/// Builds `file_mappings` by matching each traceback-mentioned file's
/// basename against the discovered file list.
pub fn build_mappings(file_refs: &[String], discovered_files: &[String]) -> std::collections::HashMap<String, String> {
    let mut mappings = std::collections::HashMap::new();
    for file_ref in file_refs {
        let basename = Path::new(file_ref)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file_ref.clone());
        let stem = Path::new(&basename)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| basename.clone());

        if let Some(found) = discovered_files.iter().find(|d| {
            let d_name = Path::new(d).file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            d_name == basename || d_name.contains(&stem)
        }) {
            mappings.insert(file_ref.clone(), found.clone());
        }
    }
    mappings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn resolves_via_mapping_first() {
        let mut fs = FileState::default();
        fs.file_mappings.insert("etl.py".to_string(), "src/etl.py".to_string());
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve(&fs, dir.path(), "etl.py"), "src/etl.py");
    }

    #[test]
    fn resolves_via_existence_when_no_mapping() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.py"), "x").unwrap();
        let fs = FileState::default();
        assert_eq!(resolve(&fs, dir.path(), "app.py"), "app.py");
    }

    #[test]
    fn falls_back_to_primary_error_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.py"), "x").unwrap();
        let fs = FileState {
            primary_error_file: Some("main.py".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve(&fs, dir.path(), "missing.py"), "main.py");
    }

    #[test]
    fn falls_back_to_first_discovered() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FileState {
            discovered_files: vec!["lib/util.py".to_string()],
            ..Default::default()
        };
        assert_eq!(resolve(&fs, dir.path(), "missing.py"), "lib/util.py");
    }

    #[test]
    fn unchanged_when_nothing_matches() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FileState::default();
        assert_eq!(resolve(&fs, dir.path(), "missing.py"), "missing.py");
    }

    #[test]
    fn builds_mapping_from_basename() {
        let refs = vec!["/abs/path/etl.py".to_string()];
        let discovered = vec!["src/etl.py".to_string(), "src/other.py".to_string()];
        let mappings: HashMap<String, String> = build_mappings(&refs, &discovered);
        assert_eq!(mappings.get("/abs/path/etl.py"), Some(&"src/etl.py".to_string()));
    }
}
