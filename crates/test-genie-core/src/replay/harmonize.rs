//! Merge a client-supplied spec with a server baseline
//!
//! Each field prefers the incoming value, falls back to the baseline, then to
//! the workflow defaults. Empty strings, zeros, `None` and empty lists count as
//! missing.

use chrono::{DateTime, Utc};

use super::builder::{
    playback_for, presentation_for, summarize, DEFAULT_FRAME_INTERVAL_MS, DEFAULT_VIEWPORT,
    SCHEMA_VERSION,
};
use super::error::{ReplayError, ReplayResult};
use super::geometry::clamp_cursor_scale;
use super::movie::{
    BrowserFrame, Dimensions, ExportCursor, ExportCursorMotion, ExportDecor,
    ExportExecutionMetadata, ExportPlayback, ExportPresentation, ExportSummary, ExportTheme,
    ExportWatermark, ReplayMovieSpec,
};
use super::theme::ReplayDefaults;

trait FillMissing {
    fn fill_missing(&mut self, fallback: &Self);
}

impl FillMissing for String {
    fn fill_missing(&mut self, fallback: &Self) {
        if self.trim().is_empty() {
            self.clone_from(fallback);
        }
    }
}

impl<T: Clone> FillMissing for Option<T> {
    fn fill_missing(&mut self, fallback: &Self) {
        if self.is_none() {
            self.clone_from(fallback);
        }
    }
}

impl<T: Clone> FillMissing for Vec<T> {
    fn fill_missing(&mut self, fallback: &Self) {
        if self.is_empty() {
            self.clone_from(fallback);
        }
    }
}

macro_rules! fill_numbers {
    ($($ty:ty),+) => {
        $(impl FillMissing for $ty {
            fn fill_missing(&mut self, fallback: &Self) {
                if *self == 0 as $ty {
                    *self = *fallback;
                }
            }
        })+
    };
}

fill_numbers!(u32, u64, usize);

impl FillMissing for f64 {
    fn fill_missing(&mut self, fallback: &Self) {
        if !self.is_finite() || *self == 0.0 {
            *self = *fallback;
        }
    }
}

macro_rules! fill_fields {
    ($ty:ty { $($field:ident),+ $(,)? }) => {
        impl FillMissing for $ty {
            fn fill_missing(&mut self, fallback: &Self) {
                $(self.$field.fill_missing(&fallback.$field);)+
            }
        }
    };
}

fill_fields!(ExportExecutionMetadata {
    execution_id,
    workflow_id,
    workflow_name,
    status,
    started_at,
    completed_at,
    total_duration,
    progress,
});
fill_fields!(ExportTheme {
    preset,
    background_gradient,
    surface_color,
    accent_color,
    text_primary,
    text_secondary,
    font_family,
});
fill_fields!(ExportDecor {
    chrome_theme,
    background_theme,
    cursor_theme,
});
fill_fields!(ExportCursor {
    style,
    scale,
    initial_position,
    click_animation,
});
fill_fields!(ExportCursorMotion {
    initial_position,
    click_animation,
    cursor_scale,
    speed_profile,
    path_style,
});
fill_fields!(ExportWatermark {
    asset_id,
    position,
    size,
    opacity,
    margin,
});
fill_fields!(ExportPlayback {
    fps,
    duration_ms,
    frame_interval_ms,
    total_frames,
});
fill_fields!(Dimensions { width, height });
fill_fields!(BrowserFrame {
    width,
    height,
    radius,
});
fill_fields!(ExportPresentation {
    canvas,
    viewport,
    browser_frame,
    device_scale_factor,
});

/// Harmonize `incoming` against `baseline` for `execution_id`
pub fn harmonize_spec(
    baseline: Option<&ReplayMovieSpec>,
    incoming: Option<&ReplayMovieSpec>,
    execution_id: &str,
    accent_color: Option<&str>,
    now: DateTime<Utc>,
) -> ReplayResult<ReplayMovieSpec> {
    let execution_id = execution_id.trim();
    if execution_id.is_empty() {
        return Err(ReplayError::MissingExecutionId);
    }

    let empty = ReplayMovieSpec::default();
    let baseline = baseline.unwrap_or(&empty);
    let mut spec = incoming.cloned().unwrap_or_default();

    let claimed = spec.execution.execution_id.trim();
    if !claimed.is_empty() && claimed != execution_id {
        return Err(ReplayError::ExecutionIdMismatch {
            expected: execution_id.to_string(),
            actual: claimed.to_string(),
        });
    }
    let incoming_workflow = spec.execution.workflow_id.trim();
    let baseline_workflow = baseline.execution.workflow_id.trim();
    if !incoming_workflow.is_empty()
        && !baseline_workflow.is_empty()
        && incoming_workflow != baseline_workflow
    {
        return Err(ReplayError::WorkflowIdMismatch {
            expected: baseline_workflow.to_string(),
            actual: incoming_workflow.to_string(),
        });
    }

    spec.version.fill_missing(&baseline.version);
    spec.version.fill_missing(&SCHEMA_VERSION.to_string());
    spec.generated_at.fill_missing(&baseline.generated_at);
    spec.generated_at.fill_missing(&Some(now));

    spec.execution.fill_missing(&baseline.execution);
    spec.execution.execution_id = execution_id.to_string();

    spec.frames.fill_missing(&baseline.frames);
    spec.assets.fill_missing(&baseline.assets);
    spec.assets.sort_by(|a, b| a.id.cmp(&b.id));
    spec.assets.dedup_by(|a, b| a.id == b.id);

    if spec.summary == ExportSummary::default() {
        spec.summary = if spec.frames.is_empty() {
            baseline.summary
        } else {
            summarize(&spec.frames)
        };
    }
    spec.execution
        .total_duration
        .fill_missing(&spec.summary.total_duration_ms);

    let computed = playback_for(spec.summary.total_duration_ms, spec.playback.frame_interval_ms);
    spec.playback.fill_missing(&baseline.playback);
    spec.playback.frame_interval_ms.fill_missing(&DEFAULT_FRAME_INTERVAL_MS);
    spec.playback.fill_missing(&computed);

    let defaults = ReplayDefaults::for_workflow(&spec.execution.workflow_name, accent_color);
    spec.theme.fill_missing(&baseline.theme);
    spec.theme.fill_missing(&defaults.theme);
    spec.decor.fill_missing(&baseline.decor);
    spec.decor.fill_missing(&defaults.decor);

    spec.cursor.fill_missing(&baseline.cursor);
    spec.cursor.fill_missing(&defaults.cursor);
    spec.cursor.scale = clamp_cursor_scale(spec.cursor.scale);

    spec.cursor_motion.fill_missing(&baseline.cursor_motion);
    let from_cursor = ExportCursorMotion {
        initial_position: spec.cursor.initial_position.clone(),
        click_animation: spec.cursor.click_animation.clone(),
        cursor_scale: spec.cursor.scale,
        ..Default::default()
    };
    spec.cursor_motion.fill_missing(&from_cursor);
    spec.cursor_motion.fill_missing(&defaults.cursor_motion);
    spec.cursor_motion.cursor_scale = clamp_cursor_scale(spec.cursor_motion.cursor_scale);

    let first_viewport = spec
        .frames
        .first()
        .map(|f| f.viewport)
        .filter(|v| v.width > 0 && v.height > 0)
        .unwrap_or(DEFAULT_VIEWPORT);
    spec.presentation.fill_missing(&baseline.presentation);
    spec.presentation.fill_missing(&presentation_for(first_viewport));

    if let Some(watermark) = spec.watermark.as_mut() {
        if let Some(fallback) = &baseline.watermark {
            watermark.fill_missing(fallback);
        }
    } else {
        spec.watermark.clone_from(&baseline.watermark);
    }

    Ok(spec)
}
