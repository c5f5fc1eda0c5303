//! Safety gate
//!
//! Stateless validation applied before any agent is spawned:
//! - tool allowlist (capabilities plus `bash(...)` command patterns)
//! - prompt blocklist
//! - scope path containment
//! - the security preamble prepended to every prompt
//!
//! Rule tables are built once and shared; every check is a pure function.

mod paths;
mod preamble;
mod prompt;
mod tools;

pub use paths::{scenario_root, validate_scenario_name, validate_scope_paths};
pub use preamble::{generate_safety_preamble, DEFAULT_MAX_FILES, DEFAULT_MAX_FILE_KB};
pub use prompt::{prompt_rule_names, validate_prompt};
pub use tools::{
    validate_bash_pattern, validate_tools, ALLOWED_BASH_PREFIXES, SAFE_CAPABILITIES,
    SAFE_GLOB_PREFIXES,
};
