//! Tool permission tiers and the diagnostic-command denylist.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolPermission {
    ReadOnly,
    NeedsApproval,
}

/// Returns the first denylisted token found in `command`, if any. Matching is
/// substring-based and deliberately conservative: `cp` blocks `scp` too.
pub fn find_denied_token<'a>(command: &str, denylist: &'a [String]) -> Option<&'a str> {
    denylist.iter().find_map(|token| {
        if command.contains(token.as_str()) {
            Some(token.as_str())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_denylisted_word_token() {
        let denylist = vec!["rm".to_string(), "sudo".to_string()];
        assert_eq!(find_denied_token("rm -rf build/", &denylist), Some("rm"));
    }

    #[test]
    fn flags_denylisted_punctuation_token() {
        let denylist = vec![">".to_string()];
        assert_eq!(find_denied_token("echo hi > out.txt", &denylist), Some(">"));
    }

    #[test]
    fn allows_commands_without_denied_tokens() {
        let denylist = vec!["rm".to_string(), "sudo".to_string()];
        assert_eq!(find_denied_token("pytest tests/", &denylist), None);
    }

    #[test]
    fn matches_denied_token_as_a_substring_of_a_longer_command_name() {
        let denylist = vec!["cp".to_string()];
        assert_eq!(find_denied_token("scp file1 user@host:", &denylist), Some("cp"));
    }
}
