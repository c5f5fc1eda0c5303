//! Runtime configuration
//!
//! Resolved once from the environment at startup and passed down through
//! constructors. CLI flags override individual fields afterwards.

use std::path::PathBuf;
use std::time::Duration;

use crate::paths;

pub const DEFAULT_PORT: u16 = 8200;
pub const DEFAULT_AGENT_BINARY: &str = "claude";
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_AGENT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct GenieConfig {
    /// Repository root (`VROOLI_ROOT`)
    pub repo_root: PathBuf,
    /// Directory holding one subdirectory per scenario (`SCENARIOS_ROOT`)
    pub scenarios_root: PathBuf,
    pub port: u16,
    /// SQLite database path (`TEST_GENIE_DB`)
    pub db_path: PathBuf,
    /// External agent executable (`TEST_GENIE_AGENT_BIN`)
    pub agent_binary: String,
    pub lock_timeout: Duration,
    pub agent_retention: Duration,
}

impl Default for GenieConfig {
    fn default() -> Self {
        let repo_root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            scenarios_root: repo_root.join("scenarios"),
            repo_root,
            port: DEFAULT_PORT,
            db_path: paths::default_db_path(),
            agent_binary: DEFAULT_AGENT_BINARY.to_string(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            agent_retention: DEFAULT_AGENT_RETENTION,
        }
    }
}

impl GenieConfig {
    /// Build configuration from process environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(root) = get("VROOLI_ROOT") {
            config.repo_root = PathBuf::from(root);
            config.scenarios_root = config.repo_root.join("scenarios");
        }
        if let Some(scenarios) = get("SCENARIOS_ROOT") {
            config.scenarios_root = PathBuf::from(scenarios);
        }
        if let Some(port) = get("TEST_GENIE_PORT").or_else(|| get("API_PORT")) {
            config.port = parse_or_default("TEST_GENIE_PORT", &port, DEFAULT_PORT);
        }
        if let Some(db) = get("TEST_GENIE_DB") {
            config.db_path = PathBuf::from(db);
        }
        if let Some(bin) = get("TEST_GENIE_AGENT_BIN") {
            config.agent_binary = bin;
        }
        if let Some(secs) = get("TEST_GENIE_LOCK_TIMEOUT_SECS") {
            config.lock_timeout = Duration::from_secs(parse_or_default(
                "TEST_GENIE_LOCK_TIMEOUT_SECS",
                &secs,
                DEFAULT_LOCK_TIMEOUT.as_secs(),
            ));
        }
        if let Some(hours) = get("TEST_GENIE_AGENT_RETENTION_HOURS") {
            let hours = parse_or_default("TEST_GENIE_AGENT_RETENTION_HOURS", &hours, 24u64);
            config.agent_retention = Duration::from_secs(hours * 60 * 60);
        }

        config
    }
}

fn parse_or_default<T>(key: &str, raw: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    match raw.trim().parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(key = %key, value = %raw, default = %default, "Invalid config value, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn scenarios_root_follows_repo_root() {
        let config = GenieConfig::from_lookup(lookup(&[("VROOLI_ROOT", "/srv/vrooli")]));
        assert_eq!(config.repo_root, PathBuf::from("/srv/vrooli"));
        assert_eq!(config.scenarios_root, PathBuf::from("/srv/vrooli/scenarios"));
    }

    #[test]
    fn explicit_scenarios_root_wins() {
        let config = GenieConfig::from_lookup(lookup(&[
            ("VROOLI_ROOT", "/srv/vrooli"),
            ("SCENARIOS_ROOT", "/data/scenarios"),
        ]));
        assert_eq!(config.scenarios_root, PathBuf::from("/data/scenarios"));
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let config = GenieConfig::from_lookup(lookup(&[
            ("TEST_GENIE_PORT", "not-a-port"),
            ("TEST_GENIE_LOCK_TIMEOUT_SECS", "60"),
        ]));
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.lock_timeout, Duration::from_secs(60));
    }
}
