//! ffmpeg2theora adapter.
//!
//! Progress lines carry a position timecode plus audio/video bitrates:
//!
//! ```text
//!   0:00:09.80 audio: 58kbps video: 382kbps
//! ```
//!
//! The duration comes from the `Duration:` input banner.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::Result;
use crate::tools::{
    percentage, timecode_to_ms, MagicValue, ProgressContext, Tool, ToolReport,
};
use crate::Error;

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Duration:\s*(\d{2}):(\d{2}):(\d{2})\.(\d+)").unwrap()
});
static POSITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2}):(\d{2}):(\d{2})\.(\d+)\s+audio:\s*\S+\s+video:\s*\S+").unwrap()
});

/// Adapter for the `ffmpeg2theora` Ogg Theora encoder.
#[derive(Debug, Default)]
pub struct Ffmpeg2Theora;

impl Ffmpeg2Theora {
    pub fn new() -> Self {
        Self
    }
}

impl Tool for Ffmpeg2Theora {
    fn token(&self) -> &'static str {
        "ffmpeg2theora"
    }

    fn supports_progress(&self) -> bool {
        true
    }

    fn parse_progress(&self, line: &str, ctx: &mut ProgressContext) -> Option<u32> {
        if let Some(caps) = DURATION_RE.captures(line) {
            if let Some(ms) = timecode_to_ms(
                caps.get(1).map_or("", |m| m.as_str()),
                caps.get(2).map_or("", |m| m.as_str()),
                caps.get(3).map_or("", |m| m.as_str()),
                caps.get(4).map_or("0", |m| m.as_str()),
            ) {
                ctx.duration_ms = ms;
            }
            return None;
        }

        let caps = POSITION_RE.captures(line)?;
        let position_ms = timecode_to_ms(
            caps.get(1).map_or("", |m| m.as_str()),
            caps.get(2).map_or("", |m| m.as_str()),
            caps.get(3).map_or("", |m| m.as_str()),
            caps.get(4).map_or("0", |m| m.as_str()),
        )?;
        percentage(position_ms, ctx.duration_ms)
    }

    fn parse_result(&self, raw: &str) -> Result<ToolReport> {
        if raw.contains("does not exist or has an unknown data format") {
            return Err(Error::invalid_file("ffmpeg2theora", "I/O error"));
        }
        if raw.contains("General output options") {
            return Err(Error::invalid_command(
                "ffmpeg2theora",
                "no command passed to ffmpeg2theora, or no output file specified",
            ));
        }
        Ok(ToolReport::default())
    }

    fn format_magic(&self, value: &MagicValue<'_>) -> Option<String> {
        match value {
            MagicValue::VideoQuality(p) => Some(match p.quality.as_str() {
                "low" => "-v 1".to_string(),
                "high" => "-v 10".to_string(),
                _ => "-v 5".to_string(),
            }),
            MagicValue::Fps(fps) => Some(format!("-F {fps}")),
            MagicValue::AudioBitRate(v) => Some(format!("-A {v}")),
            MagicValue::AudioSampleRate(v) => Some(format!("-H {v}")),
            MagicValue::VideoBitRate(v) => Some(format!("-V {v}")),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_from_position_line() {
        let tool = Ffmpeg2Theora::new();
        let mut ctx = ProgressContext { duration_ms: 0 };

        tool.parse_progress("  Duration: 00:00:19.60, start: 0.000000", &mut ctx);
        assert_eq!(ctx.duration_ms, 19600);

        let p = tool.parse_progress("  0:00:09.80 audio: 58kbps video: 382kbps", &mut ctx);
        assert_eq!(p, Some(50));
    }

    #[test]
    fn non_progress_lines_ignored() {
        let tool = Ffmpeg2Theora::new();
        let mut ctx = ProgressContext { duration_ms: 19600 };
        assert_eq!(tool.parse_progress("Resize: 320x240", &mut ctx), None);
    }

    #[test]
    fn unknown_format_is_invalid_file() {
        let raw = "foo.mp4 does not exist or has an unknown data format.\n";
        assert!(matches!(
            Ffmpeg2Theora::new().parse_result(raw),
            Err(Error::InvalidFile { .. })
        ));
    }

    #[test]
    fn help_banner_is_invalid_command() {
        let raw = "ffmpeg2theora 0.19\n\nGeneral output options:\n  -o, --output\n";
        assert!(matches!(
            Ffmpeg2Theora::new().parse_result(raw),
            Err(Error::InvalidCommand { .. })
        ));
    }

    #[test]
    fn clean_run_is_empty_report() {
        let report = Ffmpeg2Theora::new().parse_result("    0:00:19.60 audio: 58kbps video: 382kbps\ndone.\n");
        assert_eq!(report.unwrap(), ToolReport::default());
    }

    #[test]
    fn quality_levels() {
        let tool = Ffmpeg2Theora::new();
        let params = crate::tools::VideoQualityParams {
            quality: "high".into(),
            fps: None,
            resolution: crate::resolve::resolution::Resolution::scale(320, 240),
            video_bit_rate: None,
        };
        assert_eq!(
            tool.format_magic(&MagicValue::VideoQuality(&params)),
            Some("-v 10".to_string())
        );
    }
}
