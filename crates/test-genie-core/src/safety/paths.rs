//! Scope path containment
//!
//! Scope entries are resolved lexically against `<repo_root>/scenarios/<scenario>`;
//! nothing touches the filesystem, so symlinks are not followed.

use std::path::{Component, Path, PathBuf};

use crate::error::{GenieError, GenieResult};

fn traversal(path: &str) -> GenieError {
    GenieError::PathTraversal {
        path: path.to_string(),
    }
}

/// Scenario names are single directory names
pub fn validate_scenario_name(scenario: &str) -> GenieResult<()> {
    let scenario = scenario.trim();
    if scenario.is_empty() {
        return Err(GenieError::validation("scenario name is required"));
    }
    if scenario == "." || scenario == ".." || scenario.starts_with('~') {
        return Err(traversal(scenario));
    }
    if !scenario
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(traversal(scenario));
    }
    Ok(())
}

/// `<repo_root>/scenarios/<scenario>`
pub fn scenario_root(repo_root: &Path, scenario: &str) -> PathBuf {
    repo_root.join("scenarios").join(scenario)
}

/// Resolve `.` and `..` without consulting the filesystem
pub(crate) fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                let last_is_normal = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if last_is_normal {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

fn absolute_root(repo_root: &Path, scenario: &str) -> GenieResult<PathBuf> {
    let base = if repo_root.is_absolute() {
        repo_root.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| GenieError::internal(format!("cannot resolve working directory: {}", e)))?
            .join(repo_root)
    };
    Ok(clean_path(&scenario_root(&base, scenario)))
}

/// Validate scope entries and return them as cleaned, scenario-relative paths
pub fn validate_scope_paths(
    scenario: &str,
    scope: &[String],
    repo_root: &Path,
) -> GenieResult<Vec<String>> {
    validate_scenario_name(scenario)?;
    if repo_root.as_os_str().is_empty() {
        return Err(GenieError::validation("repository root is not configured"));
    }
    let root = absolute_root(repo_root, scenario.trim())?;

    let mut resolved = Vec::with_capacity(scope.len());
    for entry in scope {
        let trimmed = entry.trim();
        if trimmed.is_empty() {
            return Err(GenieError::validation("scope entries must not be empty"));
        }
        if trimmed.starts_with('~') || trimmed.contains('\0') {
            return Err(traversal(trimmed));
        }

        let candidate = Path::new(trimmed);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            root.join(candidate)
        };
        let cleaned = clean_path(&joined);

        let relative = cleaned.strip_prefix(&root).map_err(|_| traversal(trimmed))?;
        if relative.as_os_str().is_empty() {
            return Err(GenieError::validation(format!(
                "scope entry '{}' resolves to the whole scenario; use an empty scope instead",
                trimmed
            )));
        }

        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        resolved.push(relative);
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn scope(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn cleans_relative_entries() {
        let out = validate_scope_paths(
            "demo",
            &scope(&["api/./handlers/", "ui//src"]),
            Path::new("/repo"),
        )
        .unwrap();
        assert_eq!(out, vec!["api/handlers", "ui/src"]);
    }

    #[test]
    fn rejects_traversal() {
        for bad in ["../../etc/passwd", "api/../../other", "~/.ssh", "/etc/passwd"] {
            let err = validate_scope_paths("demo", &scope(&[bad]), Path::new("/repo")).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::PathTraversal, "{bad}");
        }
    }

    #[test]
    fn absolute_paths_inside_scenario_are_accepted() {
        let out = validate_scope_paths(
            "demo",
            &scope(&["/repo/scenarios/demo/api"]),
            Path::new("/repo"),
        )
        .unwrap();
        assert_eq!(out, vec!["api"]);
    }

    #[test]
    fn inner_parent_segments_stay_contained() {
        let out =
            validate_scope_paths("demo", &scope(&["api/../cli"]), Path::new("/repo")).unwrap();
        assert_eq!(out, vec!["cli"]);
    }

    #[test]
    fn rejects_bad_scenario_names() {
        assert_eq!(
            validate_scope_paths("", &[], Path::new("/repo")).unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            validate_scope_paths("../x", &[], Path::new("/repo")).unwrap_err().kind(),
            ErrorKind::PathTraversal
        );
    }

    #[test]
    fn scenario_root_entry_is_rejected() {
        assert!(validate_scope_paths("demo", &scope(&["."]), Path::new("/repo")).is_err());
    }
}
