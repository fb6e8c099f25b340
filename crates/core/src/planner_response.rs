//! Parses and validates the planner's per-step JSON decision.
//! The planner is a language model; its output has to be treated as untrusted
//! text that merely tends to contain a JSON object, not as structured data.

use serde_json::Value;
use thiserror::Error;

use crate::tools;

#[derive(Debug, Clone)]
pub struct PlannerDecision {
    pub thought: String,
    pub tool_to_use: String,
    pub tool_parameters: Value,
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("no JSON object found in planner response")]
    NoJsonFound,
    #[error("planner response was not valid JSON: {0}")]
    MalformedJson(String),
    #[error("planner response missing required field: {0}")]
    MissingField(&'static str),
    #[error("planner chose a tool outside the catalog: {0}")]
    UnknownTool(String),
    #[error("planner used a placeholder path `{0}` instead of a real one")]
    PlaceholderPath(String),
}

pub fn parse(raw: &str) -> Result<PlannerDecision, ValidationError> {
    let json_str = extract_json(raw).ok_or(ValidationError::NoJsonFound)?;
    let value: Value =
        serde_json::from_str(&json_str).map_err(|e| ValidationError::MalformedJson(e.to_string()))?;

    let thought = value
        .get("thought")
        .and_then(|v| v.as_str())
        .ok_or(ValidationError::MissingField("thought"))?
        .to_string();
    let tool_to_use = value
        .get("tool_to_use")
        .and_then(|v| v.as_str())
        .ok_or(ValidationError::MissingField("tool_to_use"))?
        .to_string();
    let tool_parameters = value
        .get("tool_parameters")
        .cloned()
        .unwrap_or_else(|| Value::Object(serde_json::Map::new()));

    if !tools::CATALOG.contains(&tool_to_use.as_str()) {
        return Err(ValidationError::UnknownTool(tool_to_use));
    }

    if let Some(placeholder) = placeholder_path(&tool_to_use, &tool_parameters) {
        return Err(ValidationError::PlaceholderPath(placeholder));
    }

    Ok(PlannerDecision { thought, tool_to_use, tool_parameters })
}

/// Finds the first JSON object in `raw`: inside a fenced code block if one is
/// present, otherwise the first balanced `{...}` span in the text.
fn extract_json(raw: &str) -> Option<String> {
    if let Some(fenced) = extract_fenced(raw) {
        return Some(fenced);
    }
    extract_braced(raw)
}

fn extract_fenced(raw: &str) -> Option<String> {
    let start = raw.find("```")?;
    let after_marker = &raw[start + 3..];
    let body_start = after_marker.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_marker[body_start..];
    let end = body.find("```")?;
    let candidate = body[..end].trim();
    if candidate.starts_with('{') {
        Some(candidate.to_string())
    } else {
        extract_braced(candidate)
    }
}

fn extract_braced(raw: &str) -> Option<String> {
    let start = raw.find('{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in raw[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(raw[start..start + i + 1].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

const READ_FILE_PLACEHOLDERS: &[&str] = &["path/to/data", "path/to/file", "file.csv", "data.csv"];
const LIST_DIR_PLACEHOLDERS: &[&str] = &["path/to/data", "path/to/file"];

fn placeholder_path(tool: &str, params: &Value) -> Option<String> {
    let (key, placeholders): (&str, &[&str]) = match tool {
        "read_file_content" => ("file_path", READ_FILE_PLACEHOLDERS),
        "list_directory_contents" => ("path", LIST_DIR_PLACEHOLDERS),
        _ => return None,
    };
    let value = params.get(key)?.as_str()?;
    if placeholders.iter().any(|p| value.contains(p)) {
        Some(value.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_json_object() {
        let raw = r#"{"thought": "check logs", "tool_to_use": "read_file_content", "tool_parameters": {"file_path": "app.py"}}"#;
        let decision = parse(raw).unwrap();
        assert_eq!(decision.tool_to_use, "read_file_content");
        assert_eq!(decision.tool_parameters["file_path"], "app.py");
    }

    #[test]
    fn parses_json_fenced_in_prose() {
        let raw = "Here's my plan:\n```json\n{\"thought\": \"t\", \"tool_to_use\": \"list_directory_contents\", \"tool_parameters\": {\"path\": \".\"}}\n```\nLet's go.";
        let decision = parse(raw).unwrap();
        assert_eq!(decision.tool_to_use, "list_directory_contents");
    }

    #[test]
    fn rejects_tool_outside_catalog() {
        let raw = r#"{"thought": "t", "tool_to_use": "rm_rf", "tool_parameters": {}}"#;
        assert!(matches!(parse(raw), Err(ValidationError::UnknownTool(_))));
    }

    #[test]
    fn rejects_placeholder_file_path() {
        let raw = r#"{"thought": "t", "tool_to_use": "read_file_content", "tool_parameters": {"file_path": "path/to/file"}}"#;
        assert!(matches!(parse(raw), Err(ValidationError::PlaceholderPath(_))));
    }

    #[test]
    fn rejects_placeholder_path_embedded_in_a_longer_path() {
        let raw = r#"{"thought": "t", "tool_to_use": "read_file_content", "tool_parameters": {"file_path": "./src/path/to/file/app.py"}}"#;
        assert!(matches!(parse(raw), Err(ValidationError::PlaceholderPath(_))));
    }

    #[test]
    fn rejects_missing_thought() {
        let raw = r#"{"tool_to_use": "read_file_content", "tool_parameters": {"file_path": "app.py"}}"#;
        assert!(matches!(parse(raw), Err(ValidationError::MissingField("thought"))));
    }

    #[test]
    fn no_json_found_in_plain_prose() {
        let raw = "I think we should look at the logs.";
        assert!(matches!(parse(raw), Err(ValidationError::NoJsonFound)));
    }
}
