//! Replay export
//!
//! Compiles a finished browser-automation execution timeline into a
//! deterministic [`ReplayMovieSpec`], harmonizes client-edited specs against a
//! server baseline, and enforces watermark requirements.

mod builder;
mod error;
mod geometry;
mod harmonize;
mod movie;
mod theme;
mod timeline;
mod watermark;

pub use builder::{
    build_replay_movie_spec, frame_timing, playback_for, summarize, FrameTiming,
    ReplayBuildRequest, DEFAULT_FRAME_DURATION_MS, DEFAULT_FRAME_INTERVAL_MS, DEFAULT_VIEWPORT,
    SCHEMA_VERSION,
};
pub use error::{ReplayError, ReplayResult};
pub use geometry::{clamp01, clamp_cursor_scale};
pub use harmonize::harmonize_spec;
pub use movie::*;
pub use theme::{ReplayDefaults, DEFAULT_ACCENT_COLOR};
pub use timeline::*;
pub use watermark::{
    enforce_watermark_requirements, WatermarkAudit, BUILTIN_ASSET_PREFIX, DEFAULT_WATERMARK_ASSET,
};
