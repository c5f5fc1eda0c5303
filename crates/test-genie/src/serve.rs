//! `test-genie serve`

use std::path::PathBuf;

use anyhow::Result;

use test_genie_core::GenieConfig;

/// Apply command-line overrides on top of the environment configuration
fn apply_overrides(
    mut config: GenieConfig,
    port: Option<u16>,
    db: Option<PathBuf>,
    root: Option<PathBuf>,
) -> GenieConfig {
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(db) = db {
        config.db_path = db;
    }
    if let Some(root) = root {
        config.scenarios_root = root.join("scenarios");
        config.repo_root = root;
    }
    config
}

pub async fn run(port: Option<u16>, db: Option<PathBuf>, root: Option<PathBuf>) -> Result<()> {
    let config = apply_overrides(GenieConfig::from_env(), port, db, root);
    tracing::info!(
        root = %config.repo_root.display(),
        db = %config.db_path.display(),
        "Starting test-genie"
    );
    test_genie_server::start_server(config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_environment_values() {
        let config = apply_overrides(
            GenieConfig::default(),
            Some(9100),
            Some(PathBuf::from("/tmp/genie.db")),
            Some(PathBuf::from("/srv/vrooli")),
        );
        assert_eq!(config.port, 9100);
        assert_eq!(config.db_path, PathBuf::from("/tmp/genie.db"));
        assert_eq!(config.repo_root, PathBuf::from("/srv/vrooli"));
        assert_eq!(config.scenarios_root, PathBuf::from("/srv/vrooli/scenarios"));
    }

    #[test]
    fn missing_overrides_keep_config() {
        let base = GenieConfig::default();
        let config = apply_overrides(base.clone(), None, None, None);
        assert_eq!(config.port, base.port);
        assert_eq!(config.repo_root, base.repo_root);
    }
}
