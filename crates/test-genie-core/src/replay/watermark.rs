//! Watermark enforcement for plans that require branding

use serde::Serialize;

use super::movie::{ExportWatermark, ReplayMovieSpec};

pub const BUILTIN_ASSET_PREFIX: &str = "builtin:";
pub const DEFAULT_WATERMARK_ASSET: &str = "builtin:vrooli-ascension";
const DEFAULT_POSITION: &str = "bottom-right";
const DEFAULT_SIZE: u32 = 15;
const DEFAULT_OPACITY: u32 = 80;
const DEFAULT_MARGIN: u32 = 16;

/// What the watermark looked like before enforcement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WatermarkAudit {
    pub was_enforced: bool,
    pub original_enabled: bool,
    pub original_asset_id: String,
}

pub fn enforce_watermark_requirements(spec: &mut ReplayMovieSpec, required: bool) -> WatermarkAudit {
    let original = spec.watermark.clone().unwrap_or_default();
    let audit = WatermarkAudit {
        was_enforced: required,
        original_enabled: original.enabled,
        original_asset_id: original.asset_id,
    };
    if !required {
        return audit;
    }

    let watermark = spec.watermark.get_or_insert_with(ExportWatermark::default);
    watermark.enabled = true;
    if !watermark.asset_id.starts_with(BUILTIN_ASSET_PREFIX) {
        watermark.asset_id = DEFAULT_WATERMARK_ASSET.to_string();
    }
    if watermark.position.trim().is_empty() {
        watermark.position = DEFAULT_POSITION.to_string();
    }
    if watermark.size == 0 {
        watermark.size = DEFAULT_SIZE;
    }
    if watermark.opacity == 0 {
        watermark.opacity = DEFAULT_OPACITY;
    }
    if watermark.margin == 0 {
        watermark.margin = DEFAULT_MARGIN;
    }

    tracing::debug!(
        execution_id = %spec.execution.execution_id,
        original_asset = %audit.original_asset_id,
        "Enforced replay watermark"
    );
    audit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_required_leaves_spec_alone() {
        let mut spec = ReplayMovieSpec::default();
        let audit = enforce_watermark_requirements(&mut spec, false);
        assert!(!audit.was_enforced);
        assert!(spec.watermark.is_none());
    }

    #[test]
    fn required_replaces_custom_asset() {
        let mut spec = ReplayMovieSpec {
            watermark: Some(ExportWatermark {
                enabled: false,
                asset_id: "uploads/logo.png".into(),
                opacity: 40,
                ..Default::default()
            }),
            ..Default::default()
        };

        let audit = enforce_watermark_requirements(&mut spec, true);
        assert!(audit.was_enforced);
        assert!(!audit.original_enabled);
        assert_eq!(audit.original_asset_id, "uploads/logo.png");

        let watermark = spec.watermark.unwrap();
        assert!(watermark.enabled);
        assert_eq!(watermark.asset_id, DEFAULT_WATERMARK_ASSET);
        assert_eq!(watermark.position, "bottom-right");
        assert_eq!(watermark.size, 15);
        assert_eq!(watermark.opacity, 40);
        assert_eq!(watermark.margin, 16);
    }

    #[test]
    fn builtin_assets_are_kept() {
        let mut spec = ReplayMovieSpec {
            watermark: Some(ExportWatermark {
                asset_id: "builtin:partner".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        enforce_watermark_requirements(&mut spec, true);
        assert_eq!(spec.watermark.unwrap().asset_id, "builtin:partner");
    }

    #[test]
    fn second_enforcement_is_a_no_op() {
        let mut spec = ReplayMovieSpec::default();
        enforce_watermark_requirements(&mut spec, true);
        let after_first = spec.clone();
        let audit = enforce_watermark_requirements(&mut spec, true);
        assert_eq!(spec, after_first);
        assert!(audit.original_enabled);
        assert_eq!(audit.original_asset_id, DEFAULT_WATERMARK_ASSET);
    }
}
