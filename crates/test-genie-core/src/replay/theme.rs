//! Visual defaults keyed by workflow name

use sha2::{Digest, Sha256};

use super::geometry::DEFAULT_CURSOR_SCALE;
use super::movie::{ExportCursor, ExportCursorMotion, ExportDecor, ExportTheme};

pub const DEFAULT_ACCENT_COLOR: &str = "#38BDF8";
pub const DEFAULT_CURSOR_POSITION: &str = "center";
pub const DEFAULT_CLICK_ANIMATION: &str = "pulse";
const FONT_FAMILY: &str = "Inter, system-ui, sans-serif";

struct ThemePreset {
    name: &'static str,
    gradient: [&'static str; 2],
    surface: &'static str,
    text_primary: &'static str,
    text_secondary: &'static str,
    chrome: &'static str,
    background: &'static str,
    cursor: &'static str,
}

const PRESETS: &[ThemePreset] = &[
    ThemePreset {
        name: "aurora",
        gradient: ["#0F172A", "#1E3A8A"],
        surface: "#111827",
        text_primary: "#F8FAFC",
        text_secondary: "#CBD5F5",
        chrome: "aurora",
        background: "aurora",
        cursor: "white",
    },
    ThemePreset {
        name: "midnight",
        gradient: ["#020617", "#312E81"],
        surface: "#0B1120",
        text_primary: "#E2E8F0",
        text_secondary: "#94A3B8",
        chrome: "midnight",
        background: "nebula",
        cursor: "aura",
    },
    ThemePreset {
        name: "sunset",
        gradient: ["#7C2D12", "#DB2777"],
        surface: "#1F1115",
        text_primary: "#FFF7ED",
        text_secondary: "#FED7AA",
        chrome: "chromium",
        background: "sunset",
        cursor: "white",
    },
    ThemePreset {
        name: "ocean",
        gradient: ["#083344", "#0E7490"],
        surface: "#0C1F29",
        text_primary: "#ECFEFF",
        text_secondary: "#A5F3FC",
        chrome: "chromium",
        background: "ocean",
        cursor: "aura",
    },
    ThemePreset {
        name: "forest",
        gradient: ["#052E16", "#15803D"],
        surface: "#0A1F12",
        text_primary: "#F0FDF4",
        text_secondary: "#BBF7D0",
        chrome: "midnight",
        background: "grid",
        cursor: "white",
    },
    ThemePreset {
        name: "slate",
        gradient: ["#1E293B", "#475569"],
        surface: "#0F172A",
        text_primary: "#F1F5F9",
        text_secondary: "#CBD5E1",
        chrome: "chromium",
        background: "plain",
        cursor: "black",
    },
];

fn preset_for(workflow_name: &str) -> &'static ThemePreset {
    let digest = Sha256::digest(workflow_name.as_bytes());
    &PRESETS[digest[0] as usize % PRESETS.len()]
}

/// Full set of visual defaults for one workflow
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayDefaults {
    pub theme: ExportTheme,
    pub decor: ExportDecor,
    pub cursor: ExportCursor,
    pub cursor_motion: ExportCursorMotion,
}

impl ReplayDefaults {
    /// Same name and accent always yield the same defaults
    pub fn for_workflow(workflow_name: &str, accent_color: Option<&str>) -> Self {
        let preset = preset_for(workflow_name.trim());
        let accent = accent_color
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(DEFAULT_ACCENT_COLOR);

        Self {
            theme: ExportTheme {
                preset: preset.name.to_string(),
                background_gradient: preset.gradient.iter().map(|c| c.to_string()).collect(),
                surface_color: preset.surface.to_string(),
                accent_color: accent.to_string(),
                text_primary: preset.text_primary.to_string(),
                text_secondary: preset.text_secondary.to_string(),
                font_family: FONT_FAMILY.to_string(),
            },
            decor: ExportDecor {
                chrome_theme: preset.chrome.to_string(),
                background_theme: preset.background.to_string(),
                cursor_theme: preset.cursor.to_string(),
            },
            cursor: ExportCursor {
                style: "arrow".to_string(),
                scale: DEFAULT_CURSOR_SCALE,
                initial_position: DEFAULT_CURSOR_POSITION.to_string(),
                click_animation: DEFAULT_CLICK_ANIMATION.to_string(),
            },
            cursor_motion: ExportCursorMotion {
                initial_position: DEFAULT_CURSOR_POSITION.to_string(),
                click_animation: DEFAULT_CLICK_ANIMATION.to_string(),
                cursor_scale: DEFAULT_CURSOR_SCALE,
                speed_profile: "easeInOut".to_string(),
                path_style: "linear".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_is_stable_per_name() {
        let a = ReplayDefaults::for_workflow("checkout flow", None);
        let b = ReplayDefaults::for_workflow("checkout flow", None);
        assert_eq!(a, b);
        assert_eq!(a.theme.accent_color, DEFAULT_ACCENT_COLOR);
        assert!(PRESETS.iter().any(|p| p.name == a.theme.preset));
    }

    #[test]
    fn accent_override_applies() {
        let d = ReplayDefaults::for_workflow("login", Some("#FF00AA"));
        assert_eq!(d.theme.accent_color, "#FF00AA");

        let blank = ReplayDefaults::for_workflow("login", Some("  "));
        assert_eq!(blank.theme.accent_color, DEFAULT_ACCENT_COLOR);
    }

    #[test]
    fn motion_defaults_match_cursor() {
        let d = ReplayDefaults::for_workflow("", None);
        assert_eq!(d.cursor_motion.initial_position, "center");
        assert_eq!(d.cursor_motion.click_animation, "pulse");
        assert_eq!(d.cursor_motion.cursor_scale, d.cursor.scale);
    }
}
