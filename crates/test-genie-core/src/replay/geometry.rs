//! Coordinate normalization

use super::movie::{Dimensions, NormalizedBox, NormalizedPoint};
use super::timeline::{BoundingBox, Point};

pub const MIN_CURSOR_SCALE: f64 = 0.5;
pub const MAX_CURSOR_SCALE: f64 = 3.0;
pub const DEFAULT_CURSOR_SCALE: f64 = 1.0;

/// Clamp into `[0, 1]`; NaN and infinities become 0
pub fn clamp01(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Clamp a cursor scale into `[0.5, 3.0]`; unset or non-finite scales become 1.0
pub fn clamp_cursor_scale(scale: f64) -> f64 {
    if !scale.is_finite() || scale <= 0.0 {
        DEFAULT_CURSOR_SCALE
    } else {
        scale.clamp(MIN_CURSOR_SCALE, MAX_CURSOR_SCALE)
    }
}

fn ratio(value: f64, extent: u32) -> f64 {
    if extent == 0 {
        return 0.0;
    }
    clamp01(value / extent as f64)
}

pub fn normalize_point(point: &Point, viewport: Dimensions) -> NormalizedPoint {
    NormalizedPoint {
        x: ratio(point.x, viewport.width),
        y: ratio(point.y, viewport.height),
    }
}

pub fn normalize_box(bbox: &BoundingBox, viewport: Dimensions) -> NormalizedBox {
    NormalizedBox {
        x: ratio(bbox.x, viewport.width),
        y: ratio(bbox.y, viewport.height),
        width: ratio(bbox.width, viewport.width),
        height: ratio(bbox.height, viewport.height),
    }
}
