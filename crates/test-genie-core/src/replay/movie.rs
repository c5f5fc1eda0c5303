//! `ReplayMovieSpec` and its parts
//!
//! Every struct deserializes from partial JSON so client-supplied specs can be
//! harmonized against a server baseline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timeline::{AssertionOutcome, RetryMetadata};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayMovieSpec {
    pub version: String,
    pub generated_at: Option<DateTime<Utc>>,
    pub execution: ExportExecutionMetadata,
    pub theme: ExportTheme,
    pub decor: ExportDecor,
    pub cursor: ExportCursor,
    pub cursor_motion: ExportCursorMotion,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark: Option<ExportWatermark>,
    pub playback: ExportPlayback,
    pub presentation: ExportPresentation,
    pub frames: Vec<ExportFrame>,
    pub assets: Vec<ExportAsset>,
    pub summary: ExportSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportExecutionMetadata {
    pub execution_id: String,
    pub workflow_id: String,
    pub workflow_name: String,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_duration: u64,
    pub progress: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportTheme {
    pub preset: String,
    pub background_gradient: Vec<String>,
    pub surface_color: String,
    pub accent_color: String,
    pub text_primary: String,
    pub text_secondary: String,
    pub font_family: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDecor {
    pub chrome_theme: String,
    pub background_theme: String,
    pub cursor_theme: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportCursor {
    pub style: String,
    pub scale: f64,
    pub initial_position: String,
    pub click_animation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportCursorMotion {
    pub initial_position: String,
    pub click_animation: String,
    pub cursor_scale: f64,
    pub speed_profile: String,
    pub path_style: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportWatermark {
    pub enabled: bool,
    pub asset_id: String,
    pub position: String,
    pub size: u32,
    pub opacity: u32,
    pub margin: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportPlayback {
    pub fps: u32,
    pub duration_ms: u64,
    pub frame_interval_ms: u64,
    pub total_frames: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserFrame {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub radius: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportPresentation {
    pub canvas: Dimensions,
    pub viewport: Dimensions,
    pub browser_frame: BrowserFrame,
    pub device_scale_factor: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    #[default]
    Fade,
    ZoomIn,
    ZoomOut,
    Spotlight,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Easing {
    #[default]
    #[serde(rename = "easeOutCubic")]
    EaseOutCubic,
    #[serde(rename = "easeInCubic")]
    EaseInCubic,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transition {
    pub kind: TransitionKind,
    pub duration_ms: u64,
    pub easing: Easing,
}

/// Coordinates relative to the frame viewport, each in `[0, 1]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizedBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportRegion {
    pub selector: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<NormalizedBox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportElementFocus {
    pub selector: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<NormalizedBox>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportFrame {
    pub index: usize,
    pub step_index: u32,
    pub node_id: String,
    pub step_type: String,
    pub status: String,
    pub start_offset_ms: u64,
    pub duration_ms: u64,
    pub hold_ms: u64,
    pub enter: Transition,
    pub exit: Transition,
    pub viewport: Dimensions,
    pub zoom_factor: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_asset_id: Option<String>,
    pub cursor_trail: Vec<NormalizedPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click_position: Option<NormalizedPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focused_element: Option<ExportElementFocus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_bounding_box: Option<NormalizedBox>,
    pub highlight_regions: Vec<ExportRegion>,
    pub mask_regions: Vec<ExportRegion>,
    pub console_log_count: u32,
    pub network_event_count: u32,
    pub final_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion: Option<AssertionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dom_snapshot_preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dom_snapshot_artifact_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportAsset {
    pub id: String,
    pub kind: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSummary {
    pub frame_count: usize,
    pub screenshot_count: usize,
    pub total_duration_ms: u64,
    pub max_frame_duration_ms: u64,
}
