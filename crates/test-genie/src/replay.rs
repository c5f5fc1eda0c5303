//! `test-genie replay`

use std::path::Path;

use anyhow::{Context, Result};

use test_genie_core::replay::{
    build_replay_movie_spec, enforce_watermark_requirements, ReplayBuildRequest, ReplayMovieSpec,
};

fn build_from_file(input: &Path, watermark: bool) -> Result<ReplayMovieSpec> {
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let request: ReplayBuildRequest = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid replay request in {}", input.display()))?;

    let mut spec = build_replay_movie_spec(&request, chrono::Utc::now())?;
    let audit = enforce_watermark_requirements(&mut spec, watermark);
    tracing::debug!(enforced = audit.was_enforced, "Watermark applied");
    Ok(spec)
}

pub fn run(input: &Path, output: Option<&Path>, watermark: bool) -> Result<()> {
    let spec = build_from_file(input, watermark)?;
    let json = serde_json::to_string_pretty(&spec)?;

    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(
                frames = spec.summary.frame_count,
                path = %path.display(),
                "Replay movie spec written"
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}
