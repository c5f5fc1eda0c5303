//! Timeline to `ReplayMovieSpec` compilation

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{ReplayError, ReplayResult};
use super::geometry::{normalize_box, normalize_point};
use super::movie::{
    BrowserFrame, Dimensions, Easing, ExportAsset, ExportElementFocus, ExportExecutionMetadata,
    ExportFrame, ExportPlayback, ExportPresentation, ExportRegion, ExportSummary,
    ReplayMovieSpec, Transition, TransitionKind,
};
use super::theme::ReplayDefaults;
use super::timeline::{ReplayExecution, ReplayWorkflow, Timeline, TimelineFrame};

pub const SCHEMA_VERSION: &str = "2025-11-07";
pub const DEFAULT_VIEWPORT: Dimensions = Dimensions {
    width: 1920,
    height: 1080,
};
pub const DEFAULT_FRAME_DURATION_MS: u64 = 1600;
pub const MIN_FRAME_DURATION_MS: u64 = 900;
pub const MIN_HOLD_MS: u64 = 600;
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 40;
pub const MIN_FPS: u32 = 25;
pub const BROWSER_FRAME_RADIUS: u32 = 24;
const TRANSITION_RATIO: f64 = 0.22;
const MIN_TRANSITION_MS: u64 = 180;
const MAX_TRANSITION_MS: u64 = 600;
const ZOOM_THRESHOLD: f64 = 1.05;

/// Inputs for a fresh export
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayBuildRequest {
    pub execution: Option<ReplayExecution>,
    pub workflow: Option<ReplayWorkflow>,
    pub timeline: Option<Timeline>,
    pub accent_color: Option<String>,
}

/// Enter/hold/exit split of one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTiming {
    pub duration_ms: u64,
    pub transition_ms: u64,
    pub hold_ms: u64,
}

/// Split a frame into enter transition, hold and exit transition
///
/// The base duration is the first positive of `total_duration_ms` and
/// `duration_ms`, else 1600 ms, floored at 900 ms. The transition is 22% of
/// the base clamped to 180..=600 ms and halved when it would exceed half the
/// base. The hold is whatever remains; `MIN_HOLD_MS` is only a floor that
/// grows the base when the remainder is shorter. A default 1600 ms frame
/// therefore holds for 896 ms, not 600 ms.
pub fn frame_timing(total_duration_ms: u64, duration_ms: u64) -> FrameTiming {
    let requested = [total_duration_ms, duration_ms]
        .into_iter()
        .find(|d| *d > 0)
        .unwrap_or(DEFAULT_FRAME_DURATION_MS);
    let mut base = requested.max(MIN_FRAME_DURATION_MS);

    let mut transition =
        ((base as f64 * TRANSITION_RATIO).round() as u64).clamp(MIN_TRANSITION_MS, MAX_TRANSITION_MS);
    if transition > base / 2 {
        transition /= 2;
    }

    let mut hold = base.saturating_sub(2 * transition);
    if hold < MIN_HOLD_MS {
        base += MIN_HOLD_MS - hold;
        hold = MIN_HOLD_MS;
    }

    FrameTiming {
        duration_ms: base,
        transition_ms: transition,
        hold_ms: hold,
    }
}

fn transitions(frame: &TimelineFrame, transition_ms: u64) -> (Transition, Transition) {
    let zoomed = frame.zoom_factor > ZOOM_THRESHOLD;
    let enter = if zoomed {
        TransitionKind::ZoomIn
    } else if !frame.highlight_regions.is_empty() {
        TransitionKind::Spotlight
    } else {
        TransitionKind::Fade
    };
    let exit = if zoomed {
        TransitionKind::ZoomOut
    } else {
        TransitionKind::Fade
    };
    (
        Transition {
            kind: enter,
            duration_ms: transition_ms,
            easing: Easing::EaseOutCubic,
        },
        Transition {
            kind: exit,
            duration_ms: transition_ms,
            easing: Easing::EaseInCubic,
        },
    )
}

fn viewport_of(frame: &TimelineFrame) -> Dimensions {
    match &frame.screenshot {
        Some(shot) if shot.width > 0 && shot.height > 0 => Dimensions {
            width: shot.width,
            height: shot.height,
        },
        _ => DEFAULT_VIEWPORT,
    }
}

/// Aggregate counters; screenshots are counted by distinct asset id
pub fn summarize(frames: &[ExportFrame]) -> ExportSummary {
    let screenshots: BTreeSet<&str> = frames
        .iter()
        .filter_map(|f| f.screenshot_asset_id.as_deref())
        .collect();
    ExportSummary {
        frame_count: frames.len(),
        screenshot_count: screenshots.len(),
        total_duration_ms: frames.iter().map(|f| f.duration_ms).sum(),
        max_frame_duration_ms: frames.iter().map(|f| f.duration_ms).max().unwrap_or(0),
    }
}

pub fn playback_for(total_duration_ms: u64, frame_interval_ms: u64) -> ExportPlayback {
    let interval = if frame_interval_ms == 0 {
        DEFAULT_FRAME_INTERVAL_MS
    } else {
        frame_interval_ms
    };
    let fps = ((1000.0 / interval as f64).round() as u32).max(MIN_FPS);
    ExportPlayback {
        fps,
        duration_ms: total_duration_ms,
        frame_interval_ms: interval,
        total_frames: total_duration_ms.div_ceil(interval),
    }
}

pub fn presentation_for(viewport: Dimensions) -> ExportPresentation {
    ExportPresentation {
        canvas: viewport,
        viewport,
        browser_frame: BrowserFrame {
            x: 0,
            y: 0,
            width: viewport.width,
            height: viewport.height,
            radius: BROWSER_FRAME_RADIUS,
        },
        device_scale_factor: 1.0,
    }
}

/// Compile a completed execution's timeline into a movie spec
pub fn build_replay_movie_spec(
    request: &ReplayBuildRequest,
    generated_at: DateTime<Utc>,
) -> ReplayResult<ReplayMovieSpec> {
    let execution = request
        .execution
        .as_ref()
        .ok_or(ReplayError::MissingExecution)?;
    let workflow = request.workflow.as_ref().ok_or(ReplayError::MissingWorkflow)?;
    let timeline = request.timeline.as_ref().ok_or(ReplayError::MissingTimeline)?;

    if let Some(id) = timeline.execution_id.as_deref().filter(|id| !id.is_empty()) {
        if id != execution.id {
            return Err(ReplayError::ExecutionIdMismatch {
                expected: execution.id.clone(),
                actual: id.to_string(),
            });
        }
    }
    if let Some(id) = timeline.workflow_id.as_deref().filter(|id| !id.is_empty()) {
        if id != workflow.id {
            return Err(ReplayError::WorkflowIdMismatch {
                expected: workflow.id.clone(),
                actual: id.to_string(),
            });
        }
    }
    if timeline.frames.is_empty() {
        return Err(ReplayError::EmptyTimeline);
    }

    let mut assets: BTreeMap<String, ExportAsset> = BTreeMap::new();
    let mut frames = Vec::with_capacity(timeline.frames.len());
    let mut offset = 0u64;

    for (index, frame) in timeline.frames.iter().enumerate() {
        let viewport = viewport_of(frame);
        let timing = frame_timing(frame.total_duration_ms, frame.duration_ms);
        let (enter, exit) = transitions(frame, timing.transition_ms);

        let screenshot_asset_id = frame.screenshot.as_ref().and_then(|shot| {
            let id = if !shot.artifact_id.trim().is_empty() {
                shot.artifact_id.trim().to_string()
            } else if !shot.url.trim().is_empty() {
                format!("{}-frame-{}", execution.id, index)
            } else {
                return None;
            };
            assets.entry(id.clone()).or_insert_with(|| ExportAsset {
                id: id.clone(),
                kind: "screenshot".to_string(),
                source: shot.url.clone(),
                thumbnail: shot.thumbnail_url.clone(),
                width: shot.width,
                height: shot.height,
                size_bytes: shot.size_bytes,
            });
            Some(id)
        });

        frames.push(ExportFrame {
            index,
            step_index: frame.step_index,
            node_id: frame.node_id.clone(),
            step_type: frame.step_type.clone(),
            status: frame.status.clone(),
            start_offset_ms: offset,
            duration_ms: timing.duration_ms,
            hold_ms: timing.hold_ms,
            enter,
            exit,
            viewport,
            zoom_factor: frame.zoom_factor,
            screenshot_asset_id,
            cursor_trail: frame
                .cursor_trail
                .iter()
                .flatten()
                .map(|p| normalize_point(p, viewport))
                .collect(),
            click_position: frame.click_position.map(|p| normalize_point(&p, viewport)),
            focused_element: frame.focused_element.as_ref().map(|focus| ExportElementFocus {
                selector: focus.selector.clone(),
                bounding_box: focus.bounding_box.map(|b| normalize_box(&b, viewport)),
            }),
            element_bounding_box: frame.element_bounding_box.map(|b| normalize_box(&b, viewport)),
            highlight_regions: frame
                .highlight_regions
                .iter()
                .map(|r| ExportRegion {
                    selector: r.selector.clone(),
                    bounding_box: r.bounding_box.map(|b| normalize_box(&b, viewport)),
                    padding: r.padding,
                    color: r.color.clone(),
                    opacity: None,
                })
                .collect(),
            mask_regions: frame
                .mask_regions
                .iter()
                .map(|r| ExportRegion {
                    selector: r.selector.clone(),
                    bounding_box: r.bounding_box.map(|b| normalize_box(&b, viewport)),
                    padding: None,
                    color: None,
                    opacity: r.opacity,
                })
                .collect(),
            console_log_count: frame.console_log_count,
            network_event_count: frame.network_event_count,
            final_url: frame.final_url.clone(),
            error: frame.error.clone(),
            assertion: frame.assertion.clone(),
            retry: frame.retry.clone(),
            dom_snapshot_preview: frame.dom_snapshot_preview.clone(),
            dom_snapshot_artifact_id: frame
                .dom_snapshot
                .as_ref()
                .map(|d| d.artifact_id.clone())
                .filter(|id| !id.is_empty()),
        });
        offset += timing.duration_ms;
    }

    let summary = summarize(&frames);
    let viewport = frames.first().map(|f| f.viewport).unwrap_or(DEFAULT_VIEWPORT);
    let defaults = ReplayDefaults::for_workflow(&workflow.name, request.accent_color.as_deref());

    tracing::debug!(
        execution_id = %execution.id,
        frames = summary.frame_count,
        assets = assets.len(),
        total_ms = summary.total_duration_ms,
        "Built replay movie spec"
    );

    Ok(ReplayMovieSpec {
        version: SCHEMA_VERSION.to_string(),
        generated_at: Some(generated_at),
        execution: ExportExecutionMetadata {
            execution_id: execution.id.clone(),
            workflow_id: workflow.id.clone(),
            workflow_name: workflow.name.clone(),
            status: execution.status.clone(),
            started_at: execution.started_at,
            completed_at: execution.completed_at,
            total_duration: summary.total_duration_ms,
            progress: if execution.is_completed() { 100 } else { 0 },
        },
        theme: defaults.theme,
        decor: defaults.decor,
        cursor: defaults.cursor,
        cursor_motion: defaults.cursor_motion,
        watermark: None,
        playback: playback_for(summary.total_duration_ms, DEFAULT_FRAME_INTERVAL_MS),
        presentation: presentation_for(viewport),
        frames,
        assets: assets.into_values().collect(),
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::timeline::{ElementFocus, HighlightRegion, Point, TimelineScreenshot};

    fn screenshot(artifact_id: &str, url: &str) -> TimelineScreenshot {
        TimelineScreenshot {
            artifact_id: artifact_id.into(),
            url: url.into(),
            width: 1280,
            height: 720,
            ..Default::default()
        }
    }

    fn request(frames: Vec<TimelineFrame>) -> ReplayBuildRequest {
        ReplayBuildRequest {
            execution: Some(ReplayExecution {
                id: "exec-1".into(),
                workflow_id: "wf-1".into(),
                status: "completed".into(),
                ..Default::default()
            }),
            workflow: Some(ReplayWorkflow {
                id: "wf-1".into(),
                name: "Checkout".into(),
                description: None,
            }),
            timeline: Some(Timeline {
                execution_id: Some("exec-1".into()),
                workflow_id: None,
                frames,
            }),
            accent_color: None,
        }
    }

    fn build(frames: Vec<TimelineFrame>) -> ReplayMovieSpec {
        build_replay_movie_spec(&request(frames), Utc::now()).unwrap()
    }

    #[test]
    fn default_frame_timing() {
        let t = frame_timing(0, 0);
        assert_eq!(t.duration_ms, 1600);
        assert_eq!(t.transition_ms, 352);
        assert_eq!(t.hold_ms, 896);
    }

    #[test]
    fn short_frames_grow_to_minimum_hold() {
        let t = frame_timing(0, 200);
        assert_eq!(t.transition_ms, 198);
        assert_eq!(t.hold_ms, MIN_HOLD_MS);
        assert_eq!(t.duration_ms, 996);
        assert_eq!(t.duration_ms, t.hold_ms + 2 * t.transition_ms);
    }

    #[test]
    fn long_frames_cap_transition() {
        let t = frame_timing(10_000, 500);
        assert_eq!(t.transition_ms, 600);
        assert_eq!(t.hold_ms, 8_800);
        assert_eq!(t.duration_ms, 10_000);
    }

    #[test]
    fn shared_artifact_is_deduplicated() {
        let spec = build(vec![
            TimelineFrame {
                screenshot: Some(screenshot("shot-shared", "http://cdn/a.png")),
                ..Default::default()
            },
            TimelineFrame {
                screenshot: Some(screenshot("shot-shared", "http://cdn/a.png")),
                ..Default::default()
            },
        ]);

        assert_eq!(spec.summary.frame_count, 2);
        assert_eq!(spec.summary.screenshot_count, 1);
        assert_eq!(spec.assets.len(), 1);
        assert_eq!(spec.assets[0].id, "shot-shared");
    }

    #[test]
    fn missing_artifact_id_is_synthesized() {
        let spec = build(vec![TimelineFrame {
            screenshot: Some(screenshot("", "http://cdn/frame0.png")),
            ..Default::default()
        }]);

        assert_eq!(spec.assets.len(), 1);
        assert_eq!(spec.assets[0].id, "exec-1-frame-0");
        assert_eq!(spec.assets[0].source, "http://cdn/frame0.png");
        assert_eq!(
            spec.frames[0].screenshot_asset_id.as_deref(),
            Some("exec-1-frame-0")
        );
    }

    #[test]
    fn durations_and_assets_are_consistent() {
        let spec = build(vec![
            TimelineFrame {
                duration_ms: 2500,
                screenshot: Some(screenshot("zeta", "z")),
                ..Default::default()
            },
            TimelineFrame {
                total_duration_ms: 400,
                screenshot: Some(screenshot("alpha", "a")),
                ..Default::default()
            },
            TimelineFrame {
                screenshot: Some(screenshot("mid", "m")),
                ..Default::default()
            },
        ]);

        let total: u64 = spec.frames.iter().map(|f| f.duration_ms).sum();
        let max = spec.frames.iter().map(|f| f.duration_ms).max().unwrap();
        assert_eq!(total, spec.summary.total_duration_ms);
        assert_eq!(max, spec.summary.max_frame_duration_ms);
        assert_eq!(spec.execution.total_duration, total);

        let ids: Vec<&str> = spec.assets.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "mid", "zeta"]);

        let offsets: Vec<u64> = spec.frames.iter().map(|f| f.start_offset_ms).collect();
        assert_eq!(offsets[0], 0);
        assert_eq!(offsets[1], spec.frames[0].duration_ms);
        assert_eq!(offsets[2], spec.frames[0].duration_ms + spec.frames[1].duration_ms);
    }

    #[test]
    fn transition_selection() {
        let spec = build(vec![
            TimelineFrame {
                zoom_factor: 1.05,
                ..Default::default()
            },
            TimelineFrame {
                zoom_factor: 1.5,
                highlight_regions: vec![HighlightRegion::default()],
                ..Default::default()
            },
            TimelineFrame {
                highlight_regions: vec![HighlightRegion::default()],
                ..Default::default()
            },
        ]);

        assert_eq!(spec.frames[0].enter.kind, TransitionKind::Fade);
        assert_eq!(spec.frames[1].enter.kind, TransitionKind::ZoomIn);
        assert_eq!(spec.frames[1].exit.kind, TransitionKind::ZoomOut);
        assert_eq!(spec.frames[2].enter.kind, TransitionKind::Spotlight);
        assert_eq!(spec.frames[2].exit.kind, TransitionKind::Fade);
        assert_eq!(spec.frames[0].enter.easing, Easing::EaseOutCubic);
        assert_eq!(spec.frames[0].exit.easing, Easing::EaseInCubic);
    }

    #[test]
    fn coordinates_are_normalized_against_frame_viewport() {
        let spec = build(vec![TimelineFrame {
            screenshot: Some(screenshot("s", "u")),
            cursor_trail: vec![Some(Point { x: 640.0, y: 360.0 }), None, Some(Point { x: 5000.0, y: -4.0 })],
            click_position: Some(Point { x: f64::NAN, y: 720.0 }),
            focused_element: Some(ElementFocus {
                selector: "#buy".into(),
                bounding_box: Some(crate::replay::timeline::BoundingBox {
                    x: 128.0,
                    y: 72.0,
                    width: 256.0,
                    height: 144.0,
                }),
            }),
            ..Default::default()
        }]);

        let frame = &spec.frames[0];
        assert_eq!(frame.cursor_trail.len(), 2);
        assert_eq!(frame.cursor_trail[0].x, 0.5);
        assert_eq!(frame.cursor_trail[1].x, 1.0);
        assert_eq!(frame.cursor_trail[1].y, 0.0);
        let click = frame.click_position.unwrap();
        assert_eq!(click.x, 0.0);
        assert_eq!(click.y, 1.0);
        let bbox = frame.focused_element.as_ref().unwrap().bounding_box.unwrap();
        assert_eq!(bbox.x, 0.1);
        assert_eq!(bbox.width, 0.2);
    }

    #[test]
    fn first_frame_sets_presentation() {
        let spec = build(vec![
            TimelineFrame::default(),
            TimelineFrame {
                screenshot: Some(screenshot("s", "u")),
                ..Default::default()
            },
        ]);
        assert_eq!(spec.presentation.canvas, DEFAULT_VIEWPORT);
        assert_eq!(spec.presentation.viewport, DEFAULT_VIEWPORT);
        assert_eq!(spec.presentation.browser_frame.radius, 24);
        assert_eq!(spec.presentation.device_scale_factor, 1.0);
        assert_eq!(spec.frames[1].viewport.width, 1280);
    }

    #[test]
    fn playback_and_metadata() {
        let spec = build(vec![TimelineFrame::default()]);
        assert_eq!(spec.version, SCHEMA_VERSION);
        assert_eq!(spec.playback.frame_interval_ms, 40);
        assert_eq!(spec.playback.fps, 25);
        assert_eq!(spec.playback.total_frames, 40);
        assert_eq!(spec.execution.progress, 100);
        assert_eq!(spec.theme.accent_color, "#38BDF8");
    }

    #[test]
    fn incomplete_execution_has_zero_progress() {
        let mut req = request(vec![TimelineFrame::default()]);
        if let Some(execution) = req.execution.as_mut() {
            execution.status = "failed".into();
        }
        let spec = build_replay_movie_spec(&req, Utc::now()).unwrap();
        assert_eq!(spec.execution.progress, 0);
    }

    #[test]
    fn validation_errors() {
        let mut req = request(vec![TimelineFrame::default()]);
        req.execution = None;
        assert_eq!(
            build_replay_movie_spec(&req, Utc::now()).unwrap_err(),
            ReplayError::MissingExecution
        );

        let empty = request(vec![]);
        assert_eq!(
            build_replay_movie_spec(&empty, Utc::now()).unwrap_err(),
            ReplayError::EmptyTimeline
        );

        let mut mismatched = request(vec![TimelineFrame::default()]);
        if let Some(timeline) = mismatched.timeline.as_mut() {
            timeline.execution_id = Some("other".into());
        }
        assert!(matches!(
            build_replay_movie_spec(&mismatched, Utc::now()),
            Err(ReplayError::ExecutionIdMismatch { .. })
        ));

        let mut wrong_workflow = request(vec![TimelineFrame::default()]);
        if let Some(timeline) = wrong_workflow.timeline.as_mut() {
            timeline.workflow_id = Some("wf-2".into());
        }
        assert!(matches!(
            build_replay_movie_spec(&wrong_workflow, Utc::now()),
            Err(ReplayError::WorkflowIdMismatch { .. })
        ));
    }
}
