//! Query preparation: before a query reaches BM25 and vector scoring, any
//! error- or code-shaped text already present in it is captured and appended,
//! so a pasted stack trace pulls in the files and symbols it names even when
//! the surrounding prose doesn't repeat them.

use std::sync::OnceLock;

use regex::Regex;

struct Patterns {
    error_prefix: Regex,
    stack_frame: Regex,
    filename: Regex,
    function_call: Regex,
    import_target: Regex,
}

static PATTERNS: OnceLock<Patterns> = OnceLock::new();

fn patterns() -> &'static Patterns {
    PATTERNS.get_or_init(|| Patterns {
        error_prefix: Regex::new(r"(?i)\b(?:error|exception|failed|cannot|undefined|null)\s*:?\s*([^\n]{1,80})").unwrap(),
        stack_frame: Regex::new(r"(?m)^\s*at\s+(\S+)").unwrap(),
        filename: Regex::new(r"[\w./-]+\.(?:rs|py|js|ts|jsx|tsx|go|java|c|cpp|h|hpp|rb)\b").unwrap(),
        function_call: Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap(),
        import_target: Regex::new(r#"(?:import|require)\s*\(?\s*['"]?([\w./-]+)"#).unwrap(),
    })
}

/// Returns the raw query with extracted captures appended. If nothing
/// error- or code-shaped is found, the query is returned unchanged.
pub fn prepare(raw_query: &str) -> String {
    let p = patterns();
    let mut captures: Vec<String> = Vec::new();

    for cap in p.error_prefix.captures_iter(raw_query) {
        captures.push(cap[1].trim().to_string());
    }
    for cap in p.stack_frame.captures_iter(raw_query) {
        captures.push(cap[1].to_string());
    }
    for m in p.filename.find_iter(raw_query) {
        captures.push(m.as_str().to_string());
    }
    for cap in p.function_call.captures_iter(raw_query) {
        captures.push(cap[1].to_string());
    }
    for cap in p.import_target.captures_iter(raw_query) {
        captures.push(cap[1].to_string());
    }

    if captures.is_empty() {
        return raw_query.to_string();
    }
    format!("{raw_query} {}", captures.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_error_prefix() {
        let prepared = prepare("TypeError: cannot read property 'foo' of undefined");
        assert!(prepared.contains("read property"));
    }

    #[test]
    fn captures_stack_frame_targets() {
        let prepared = prepare("Error: boom\n    at parseConfig (src/config.rs:42:5)");
        assert!(prepared.contains("parseConfig"));
    }

    #[test]
    fn captures_filenames() {
        let prepared = prepare("failed to load handlers/auth.py during startup");
        assert!(prepared.contains("handlers/auth.py"));
    }

    #[test]
    fn captures_import_targets() {
        let prepared = prepare("Cannot find module: import('./widgets/button')");
        assert!(prepared.contains("./widgets/button"));
    }

    #[test]
    fn leaves_plain_queries_unchanged() {
        let prepared = prepare("how does retry backoff work");
        assert_eq!(prepared, "how does retry backoff work");
    }
}
