//! FFprobe-based [`MediaInspector`] implementation.
//!
//! Shells out to `ffprobe -v quiet -print_format json -show_format
//! -show_streams` and maps the JSON output into [`MediaInfo`].

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::error::Result;
use crate::probe::{MediaInfo, MediaInspector};
use crate::Error;

/// An inspector backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeInspector {
    ffprobe_path: PathBuf,
}

impl FfprobeInspector {
    /// Create an inspector using the given ffprobe binary.
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self { ffprobe_path }
    }

    /// Create an inspector that finds ffprobe on `PATH`.
    pub fn from_path() -> Option<Self> {
        which::which("ffprobe")
            .ok()
            .map(|p| Self { ffprobe_path: p })
    }
}

#[async_trait]
impl MediaInspector for FfprobeInspector {
    async fn inspect(&self, path: &Path) -> Result<MediaInfo> {
        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Err(Error::InvalidMedia(format!(
                "ffprobe could not read {}",
                path.display()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_ffprobe_json(&stdout)
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
}

/// Map raw ffprobe JSON into [`MediaInfo`].
///
/// A file with no parseable format section or no video stream dimensions is
/// treated as unreadable.
pub(crate) fn parse_ffprobe_json(json: &str) -> Result<MediaInfo> {
    let ff: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| Error::InvalidMedia(format!("ffprobe JSON parse error: {e}")))?;

    let format = ff
        .format
        .ok_or_else(|| Error::InvalidMedia("ffprobe output has no format section".into()))?;

    let duration_ms = format
        .duration
        .as_deref()
        .and_then(|s| s.parse::<f64>().ok())
        .map(|secs| (secs * 1000.0).round() as u64)
        .ok_or_else(|| Error::InvalidMedia("ffprobe reported no duration".into()))?;

    let video = ff
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));

    let (width, height, fps) = match video {
        Some(v) => (
            v.width.unwrap_or(0),
            v.height.unwrap_or(0),
            v.r_frame_rate.as_deref().and_then(parse_frame_rate),
        ),
        None => (0, 0, None),
    };

    Ok(MediaInfo {
        duration_ms,
        width,
        height,
        fps,
    })
}

/// Parse ffprobe's `num/den` frame-rate notation (or a bare float).
fn parse_frame_rate(rate_str: &str) -> Option<f64> {
    let parts: Vec<&str> = rate_str.split('/').collect();
    if parts.len() == 2 {
        let num: f64 = parts[0].parse().ok()?;
        let den: f64 = parts[1].parse().ok()?;
        if den != 0.0 {
            return Some(num / den);
        }
        return None;
    }
    rate_str.parse().ok()
}
