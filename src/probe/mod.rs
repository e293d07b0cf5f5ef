//! Media inspection collaborator.
//!
//! The engine consumes probing through the [`MediaInspector`] capability:
//! original-file metadata is obtained lazily (and cached per run) and the
//! processed file is inspected once after all stages complete, for the
//! integrity check. [`FfprobeInspector`] is the stock implementation.

mod ffprobe;

pub use ffprobe::FfprobeInspector;

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

/// Metadata for a single media file.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    /// Container duration in milliseconds.
    pub duration_ms: u64,
    /// Video frame width in pixels.
    pub width: u32,
    /// Video frame height in pixels.
    pub height: u32,
    /// Frame rate, when the container reports one.
    pub fps: Option<f64>,
}

impl MediaInfo {
    /// Display aspect ratio (`width / height`), or `None` for degenerate
    /// dimensions.
    pub fn ratio(&self) -> Option<f64> {
        if self.width == 0 || self.height == 0 {
            None
        } else {
            Some(f64::from(self.width) / f64::from(self.height))
        }
    }
}

/// Probes a media file for basic stream metadata.
///
/// # Errors
///
/// Implementations fail with [`Error::InvalidMedia`](crate::Error::InvalidMedia)
/// for unreadable or corrupt input.
#[async_trait]
pub trait MediaInspector: Send + Sync {
    async fn inspect(&self, path: &Path) -> Result<MediaInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_widescreen() {
        let info = MediaInfo {
            duration_ms: 19600,
            width: 1280,
            height: 720,
            fps: Some(23.98),
        };
        let r = info.ratio().unwrap();
        assert!(r > 4.0 / 3.0);
    }

    #[test]
    fn ratio_degenerate_is_none() {
        let info = MediaInfo {
            duration_ms: 0,
            width: 0,
            height: 480,
            fps: None,
        };
        assert!(info.ratio().is_none());
    }
}
