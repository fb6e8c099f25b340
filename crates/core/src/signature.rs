//! Deduplication signatures: a stable string identifying a
//! tool call, used to detect the planner repeating itself within the dedup
//! window. Path-shaped parameter values are normalized relative to the
//! session's own working directory, not the process cwd, so the same action
//! looks the same regardless of where the orchestrator itself runs.

use serde_json::Value;

pub fn compute(tool: &str, parameters: &Value, cwd: &str) -> String {
    let normalized = normalize(parameters, cwd);
    format!("{tool}:{normalized}")
}

fn normalize(value: &Value, cwd: &str) -> Value {
    match value {
        Value::String(s) => Value::String(relativize(s, cwd)),
        Value::Array(items) => Value::Array(items.iter().map(|v| normalize(v, cwd)).collect()),
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                out.insert(k.clone(), normalize(v, cwd));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn relativize(s: &str, cwd: &str) -> String {
    if !cwd.is_empty() && s.starts_with(cwd) {
        s[cwd.len()..].trim_start_matches('/').to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn same_path_absolute_or_relative_yields_same_signature() {
        let cwd = "/home/user/project";
        let a = compute("read_file_content", &json!({"file_path": "/home/user/project/app.py"}), cwd);
        let b = compute("read_file_content", &json!({"file_path": "app.py"}), cwd);
        assert_eq!(a, b);
    }

    #[test]
    fn different_tools_never_collide() {
        let cwd = "/home/user/project";
        let params = json!({"file_path": "app.py"});
        let a = compute("read_file_content", &params, cwd);
        let b = compute("search_file_content", &params, cwd);
        assert_ne!(a, b);
    }

    #[test]
    fn key_order_does_not_affect_signature() {
        let cwd = "";
        let a = compute("run_diagnostic_command", &json!({"command": "pytest", "timeout_secs": 5}), cwd);
        let b = compute("run_diagnostic_command", &json!({"timeout_secs": 5, "command": "pytest"}), cwd);
        assert_eq!(a, b);
    }
}
