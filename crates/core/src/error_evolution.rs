//! Error Evolution Engine: parses command output into a
//! structured error record, compares it against whatever was previously
//! blocking, and drives the `current_blocking_error` / `solved_issues` /
//! `error_progression` state transitions.

use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;

use crate::context::{AgentContext, BlockingError, ErrorProgressionEntry};

struct ErrorPattern {
    error_type: &'static str,
    pattern: &'static str,
}

const PATTERNS: &[ErrorPattern] = &[
    ErrorPattern { error_type: "ModuleNotFoundError", pattern: r"ModuleNotFoundError:\s*(.+)" },
    ErrorPattern { error_type: "ImportError", pattern: r"ImportError:\s*(.+)" },
    ErrorPattern { error_type: "KeyError", pattern: r"KeyError:\s*(.+)" },
    ErrorPattern { error_type: "FileNotFoundError", pattern: r"FileNotFoundError:\s*(.+)" },
    ErrorPattern { error_type: "SyntaxError", pattern: r"SyntaxError:\s*(.+)" },
    ErrorPattern { error_type: "IndentationError", pattern: r"IndentationError:\s*(.+)" },
    ErrorPattern { error_type: "AttributeError", pattern: r"AttributeError:\s*(.+)" },
    ErrorPattern { error_type: "ValueError", pattern: r"ValueError:\s*(.+)" },
    ErrorPattern { error_type: "TypeError", pattern: r"TypeError:\s*(.+)" },
    ErrorPattern { error_type: "NameError", pattern: r"NameError:\s*(.+)" },
    ErrorPattern { error_type: "IndexError", pattern: r"IndexError:\s*(.+)" },
    ErrorPattern { error_type: "CommandNotFound", pattern: r"(?:command not found|is not recognized)[:\s]*(.*)" },
    ErrorPattern { error_type: "Exception", pattern: r"Exception:\s*(.+)" },
    ErrorPattern { error_type: "Error", pattern: r"Error:\s*(.+)" },
];

fn compiled_patterns() -> &'static Vec<(&'static str, Regex)> {
    static CELL: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    CELL.get_or_init(|| {
        PATTERNS
            .iter()
            .map(|p| (p.error_type, Regex::new(p.pattern).expect("valid pattern")))
            .collect()
    })
}

fn file_ref_regex() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    CELL.get_or_init(|| Regex::new(r#"File "([^"]+)""#).expect("valid pattern"))
}

fn line_ref_regex() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    CELL.get_or_init(|| Regex::new(r"line (\d+)").expect("valid pattern"))
}

/// Parses the combined stderr/stdout of the most recent execution. Returns
/// `None` when no known error pattern matches.
pub fn parse_error(combined_output: &str, step: u32) -> Option<BlockingError> {
    let (error_type, message) = compiled_patterns().iter().find_map(|(kind, re)| {
        re.captures(combined_output)
            .map(|c| (*kind, c.get(1).map(|m| m.as_str().trim().to_string()).unwrap_or_default()))
    })?;

    let mut file_refs: Vec<String> = file_ref_regex()
        .captures_iter(combined_output)
        .map(|c| c[1].to_string())
        .collect();
    file_refs.sort();
    file_refs.dedup();

    let mut line_refs: Vec<u32> = line_ref_regex()
        .captures_iter(combined_output)
        .filter_map(|c| c[1].parse::<u32>().ok())
        .collect();
    line_refs.sort();
    line_refs.dedup();

    Some(BlockingError {
        error_type: error_type.to_string(),
        message,
        file_refs,
        line_refs,
        raw_output: combined_output.to_string(),
        first_seen_step: step,
        last_seen_step: step,
        status: "active".to_string(),
    })
}

#[derive(Debug, PartialEq, Eq)]
pub enum Comparison {
    SameError,
    Progression,
    NewError,
    Resolved,
}

/// Compares a freshly parsed error (if any) against whatever was previously blocking.
pub fn compare(previous: Option<&BlockingError>, current: Option<&BlockingError>) -> Comparison {
    match (previous, current) {
        (Some(_), None) => Comparison::Resolved,
        (None, Some(_)) => Comparison::NewError,
        (Some(p), Some(c)) => {
            if p.error_type == c.error_type && p.message == c.message && p.same_file_set(c) {
                Comparison::SameError
            } else if p.same_file_set(c) && p.error_type != c.error_type {
                Comparison::Progression
            } else {
                Comparison::NewError
            }
        }
        (None, None) => Comparison::Resolved,
    }
}

/// Applies the error-progression state transition to `ctx`, given the
/// combined output of the most recently executed command.
pub fn update_error_state(ctx: &mut AgentContext, combined_output: &str, current_step: u32) {
    let previous = ctx.current_blocking_error.clone();
    let mut parsed = parse_error(combined_output, current_step);

    match compare(previous.as_ref(), parsed.as_ref()) {
        Comparison::Resolved => {
            if let Some(prev) = previous.clone() {
                ctx.archive_solved(prev, current_step);
            }
            ctx.current_blocking_error = None;
        }
        Comparison::NewError | Comparison::Progression => {
            if let Some(prev) = previous.clone() {
                ctx.archive_solved(prev, current_step.saturating_sub(1));
            }
            if let Some(err) = parsed.as_mut() {
                err.first_seen_step = current_step;
                err.last_seen_step = current_step;
                ctx.install_current_error(err.clone());
            }
        }
        Comparison::SameError => {
            if let (Some(mut curr), Some(prev)) = (parsed.clone(), previous.clone()) {
                curr.first_seen_step = prev.first_seen_step;
                curr.last_seen_step = current_step;
                ctx.install_current_error(curr);
            }
        }
    }

    ctx.push_progression(ErrorProgressionEntry {
        step: current_step,
        error_detected: parsed,
        previous_error: previous,
        timestamp: Utc::now(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_module_not_found_with_file_and_line() {
        let output = "Traceback (most recent call last):\n  File \"app.py\", line 3, in <module>\nModuleNotFoundError: No module named 'requests'";
        let err = parse_error(output, 1).unwrap();
        assert_eq!(err.error_type, "ModuleNotFoundError");
        assert_eq!(err.message, "No module named 'requests'");
        assert_eq!(err.file_refs, vec!["app.py".to_string()]);
        assert_eq!(err.line_refs, vec![3]);
    }

    #[test]
    fn no_match_returns_none() {
        assert!(parse_error("all good, nothing to see", 1).is_none());
    }

    #[test]
    fn comparison_classifies_same_error() {
        let a = parse_error("File \"x.py\", line 1\nKeyError: 'id'", 1).unwrap();
        let b = parse_error("File \"x.py\", line 1\nKeyError: 'id'", 2).unwrap();
        assert_eq!(compare(Some(&a), Some(&b)), Comparison::SameError);
    }

    #[test]
    fn comparison_classifies_progression_same_files_different_type() {
        let a = parse_error("File \"x.py\", line 1\nKeyError: 'id'", 1).unwrap();
        let b = parse_error("File \"x.py\", line 1\nTypeError: bad arg", 2).unwrap();
        assert_eq!(compare(Some(&a), Some(&b)), Comparison::Progression);
    }

    #[test]
    fn comparison_classifies_resolved() {
        let a = parse_error("File \"x.py\", line 1\nKeyError: 'id'", 1).unwrap();
        assert_eq!(compare(Some(&a), None), Comparison::Resolved);
    }

    #[test]
    fn update_moves_previous_to_solved_when_resolved() {
        use crate::context::{AgentContext, Constraints, InitialCommandRun};
        let mut ctx = AgentContext::new(
            "fix it".to_string(),
            InitialCommandRun {
                command_string: "python app.py".to_string(),
                stdout: String::new(),
                stderr: String::new(),
                exit_code: 1,
            },
            "/tmp".to_string(),
            Vec::new(),
            Constraints::default(),
        );
        update_error_state(&mut ctx, "ModuleNotFoundError: No module named 'requests'", 1);
        assert!(ctx.current_blocking_error.is_some());

        update_error_state(&mut ctx, "all tests passed", 2);
        assert!(ctx.current_blocking_error.is_none());
        assert_eq!(ctx.solved_issues.len(), 1);
        assert_eq!(ctx.solved_issues[0].resolution_step, 2);
    }

    #[test]
    fn update_preserves_first_seen_step_across_same_error() {
        use crate::context::{AgentContext, Constraints, InitialCommandRun};
        let mut ctx = AgentContext::new(
            "fix it".to_string(),
            InitialCommandRun {
                command_string: "python etl.py".to_string(),
                stdout: String::new(),
                stderr: String::new(),
                exit_code: 1,
            },
            "/tmp".to_string(),
            Vec::new(),
            Constraints::default(),
        );
        update_error_state(&mut ctx, "File \"etl.py\", line 42\nKeyError: 'customer_id'", 1);
        update_error_state(&mut ctx, "File \"etl.py\", line 42\nKeyError: 'customer_id'", 2);
        let err = ctx.current_blocking_error.unwrap();
        assert_eq!(err.first_seen_step, 1);
        assert_eq!(err.last_seen_step, 2);
    }
}
