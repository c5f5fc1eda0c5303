//! Security preamble prepended to every agent prompt

use std::fmt::Write;
use std::path::Path;

use super::paths::{clean_path, scenario_root};

pub const DEFAULT_MAX_FILES: usize = 50;
pub const DEFAULT_MAX_FILE_KB: usize = 1024;

/// Build the deterministic preamble for one agent
///
/// `max_files` and `max_file_kb` of zero select the defaults. An empty
/// scenario or repository root yields an empty string.
pub fn generate_safety_preamble(
    scenario: &str,
    scope: &[String],
    repo_root: &Path,
    max_files: usize,
    max_file_kb: usize,
) -> String {
    let scenario = scenario.trim();
    if scenario.is_empty() || repo_root.as_os_str().is_empty() {
        return String::new();
    }

    let max_files = if max_files == 0 { DEFAULT_MAX_FILES } else { max_files };
    let max_file_kb = if max_file_kb == 0 { DEFAULT_MAX_FILE_KB } else { max_file_kb };
    let working_dir = clean_path(&scenario_root(repo_root, scenario));

    let mut out = String::new();
    let _ = writeln!(out, "## SECURITY CONSTRAINTS");
    let _ = writeln!(out);
    let _ = writeln!(out, "Working directory: {}", working_dir.display());
    if scope.is_empty() {
        let _ = writeln!(out, "Allowed scope: the entire scenario directory");
    } else {
        let _ = writeln!(out, "Allowed scope (modify files ONLY under these paths):");
        for path in scope {
            let _ = writeln!(out, "  - {}", working_dir.join(path).display());
        }
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "You MUST NOT:");
    for rule in [
        "read, create, modify or delete files outside the working directory",
        "run destructive commands such as rm -rf, mkfs or dd",
        "use sudo, su or change ownership and permissions of system files",
        "install, remove or upgrade system or global packages",
        "pipe downloaded content into a shell or evaluate generated shell code",
        "push, rebase, reset or otherwise rewrite git history",
        "run DROP, TRUNCATE, ALTER or unscoped DELETE statements against any database",
        "print, copy or transmit secrets, credentials or environment variables",
    ] {
        let _ = writeln!(out, "- {}", rule);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Limits:");
    let _ = writeln!(out, "- Create or modify at most {} files", max_files);
    let _ = writeln!(out, "- Keep every file under {} KB", max_file_kb);
    let _ = writeln!(out);
    let _ = writeln!(out, "---");
    let _ = writeln!(out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_inputs_produce_empty_preamble() {
        assert!(generate_safety_preamble("", &[], Path::new("/repo"), 0, 0).is_empty());
        assert!(generate_safety_preamble("demo", &[], Path::new(""), 0, 0).is_empty());
    }

    #[test]
    fn includes_directory_scope_and_limits() {
        let text = generate_safety_preamble(
            "demo",
            &["api".to_string()],
            Path::new("/repo"),
            0,
            0,
        );
        assert!(text.contains("Working directory: /repo/scenarios/demo"));
        assert!(text.contains("/repo/scenarios/demo/api"));
        assert!(text.contains("SECURITY CONSTRAINTS"));
        assert!(text.contains("MUST NOT"));
        assert!(text.contains("at most 50 files"));
        assert!(text.contains("under 1024 KB"));
    }

    #[test]
    fn is_deterministic() {
        let a = generate_safety_preamble("demo", &[], Path::new("/repo"), 10, 64);
        let b = generate_safety_preamble("demo", &[], Path::new("/repo"), 10, 64);
        assert_eq!(a, b);
        assert!(a.contains("at most 10 files"));
    }
}
