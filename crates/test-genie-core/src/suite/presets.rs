//! Phase catalogue and presets

/// Every phase kind, in canonical execution order
pub const KNOWN_PHASES: &[&str] = &[
    "structure",
    "dependencies",
    "unit",
    "integration",
    "business",
    "performance",
];

pub const DEFAULT_PRESET: &str = "comprehensive";

const PRESETS: &[(&str, &[&str])] = &[
    ("quick", &["structure", "unit"]),
    ("smoke", &["structure", "integration"]),
    (
        "comprehensive",
        &[
            "structure",
            "dependencies",
            "unit",
            "integration",
            "business",
            "performance",
        ],
    ),
];

pub fn is_known_phase(name: &str) -> bool {
    KNOWN_PHASES.contains(&name)
}

/// Ordered phases of a named preset
pub fn preset_phases(name: &str) -> Option<&'static [&'static str]> {
    PRESETS
        .iter()
        .find(|(preset, _)| *preset == name)
        .map(|(_, phases)| *phases)
}

pub fn preset_names() -> Vec<&'static str> {
    PRESETS.iter().map(|(name, _)| *name).collect()
}
