//! Filesystem locations used by the control plane

use std::path::{Path, PathBuf};

const CONFIG_DIR_NAME: &str = ".test-genie";

/// Get the test-genie state directory (~/.test-genie)
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Default SQLite history database (~/.test-genie/test-genie.db)
pub fn default_db_path() -> PathBuf {
    config_dir().join("test-genie.db")
}

/// Directory of one scenario under the scenarios root
pub fn scenario_dir(scenarios_root: &Path, scenario: &str) -> PathBuf {
    scenarios_root.join(scenario)
}

/// Location of a phase script: `<scenario>/test/phases/test-<phase>.sh`
pub fn phase_script(scenarios_root: &Path, scenario: &str, phase: &str) -> PathBuf {
    scenario_dir(scenarios_root, scenario)
        .join("test")
        .join("phases")
        .join(format!("test-{}.sh", phase))
}
