//! Media probing with ffprobe
//!
//! Used to load metadata for local files before playback.

use super::types::PlaybackError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;

/// Metadata read from a media file
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Duration in seconds
    pub duration: f64,
}

/// Probe a media file
pub fn probe_media(path: &Path) -> Result<MediaMetadata, PlaybackError> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate:format=duration",
            "-of",
            "csv=p=0",
        ])
        .arg(path)
        .output()
        .map_err(|e| PlaybackError::Probe(format!("Failed to run ffprobe: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PlaybackError::Probe(format!("ffprobe failed: {}", stderr)));
    }

    let metadata = parse_probe_output(&String::from_utf8_lossy(&output.stdout))?;
    tracing::debug!(
        "Probed {:?}: {}x{} @ {:.2}fps, {:.2}s",
        path,
        metadata.width,
        metadata.height,
        metadata.fps,
        metadata.duration
    );
    Ok(metadata)
}

/// Parse `csv=p=0` output: a `width,height,rate` stream line and a
/// `duration` format line
pub fn parse_probe_output(stdout: &str) -> Result<MediaMetadata, PlaybackError> {
    let mut stream: Option<(u32, u32, f64)> = None;
    let mut duration: Option<f64> = None;

    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let parts: Vec<&str> = line.split(',').collect();
        match parts.as_slice() {
            [width, height, rate, ..] => {
                let width = width
                    .parse()
                    .map_err(|_| PlaybackError::Probe("Invalid width".to_string()))?;
                let height = height
                    .parse()
                    .map_err(|_| PlaybackError::Probe("Invalid height".to_string()))?;
                stream = Some((width, height, parse_frame_rate(rate)));
            }
            [value] => {
                duration = value.parse().ok();
            }
            _ => {}
        }
    }

    let (width, height, fps) = stream.ok_or_else(|| {
        PlaybackError::Probe(format!("Unexpected ffprobe output: {}", stdout))
    })?;
    let duration = duration
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| PlaybackError::Probe("Missing duration".to_string()))?;

    Ok(MediaMetadata {
        width,
        height,
        fps,
        duration,
    })
}

/// Parse a frame rate such as "30/1" or "30000/1001"
pub fn parse_frame_rate(rate: &str) -> f64 {
    let fallback = 30.0;
    match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().unwrap_or(fallback);
            let den: f64 = den.parse().unwrap_or(1.0);
            if den == 0.0 {
                fallback
            } else {
                num / den
            }
        }
        None => rate.parse().unwrap_or(fallback),
    }
}
