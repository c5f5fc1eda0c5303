//! Scope-overlap rule

/// Two path sets in the same scenario overlap when either is empty (the
/// whole scenario), or some pair is equal or nested after trailing-slash
/// normalization.
pub fn scopes_overlap(a: &[String], b: &[String]) -> bool {
    if a.is_empty() || b.is_empty() {
        return true;
    }
    a.iter()
        .any(|left| b.iter().any(|right| paths_overlap(left, right)))
}

fn paths_overlap(a: &str, b: &str) -> bool {
    let a = a.trim_end_matches('/');
    let b = b.trim_end_matches('/');
    a == b || is_path_prefix(a, b) || is_path_prefix(b, a)
}

/// `prefix` names an ancestor directory of `path`
fn is_path_prefix(prefix: &str, path: &str) -> bool {
    path.len() > prefix.len()
        && path.starts_with(prefix)
        && path.as_bytes()[prefix.len()] == b'/'
}
