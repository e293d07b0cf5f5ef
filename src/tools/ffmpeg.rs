//! ffmpeg adapter.
//!
//! ffmpeg redraws a status line on stderr (`frame= ... time= ... bitrate=`)
//! separated by carriage returns, and prints a final summary pair:
//!
//! ```text
//! frame= 4126 q=31.0 Lsize=    5917kB time=69.1 bitrate= 702.0kbits/s
//! video:2417kB audio:540kB header:0kB muxing overhead 100.140277%
//! ```
//!
//! Progress is derived from the `time=` field against the duration printed
//! in the input banner; the summary is mined for the report fields.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::Result;
use crate::resolve::resolution::Resolution;
use crate::tools::{
    percentage, timecode_to_ms, MagicValue, ProgressContext, Tool, ToolReport, VideoQualityParams,
};
use crate::Error;

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Duration:\s*(\d{2}):(\d{2}):(\d{2})\.(\d+)").unwrap()
});
static TIME_HMS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"time=\s*(\d+):(\d{2}):(\d{2})\.(\d+)").unwrap()
});
static TIME_SECS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"time=\s*(\d+(?:\.\d+)?)").unwrap());

static UNKNOWN_CODEC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Unknown codec '([^']+)'").unwrap());
static OUTPUT_FORMAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Unable for find a suitable output format for '[^']*'").unwrap()
});
static IO_ERROR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\S+): I/O error").unwrap());
static USAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^usage: ffmpeg|At least one output file must be specified").unwrap()
});

static FRAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"frame=\s*(\d+)").unwrap());
static OUTPUT_FPS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"fps=\s*(\d+)").unwrap());
static Q_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"q=(\d+\.\d+)").unwrap());
static SIZE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"L?size=\s*(\S+kB)").unwrap());
static TIME_FIELD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"time=\s*(\S+)").unwrap());
static BITRATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"bitrate=\s*(\S+)").unwrap());
static VIDEO_SIZE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"video:(\S+kB)").unwrap());
static AUDIO_SIZE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"audio:(\S+kB)").unwrap());
static HEADER_SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"header:(\S+kB)").unwrap());
static OVERHEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"muxing overhead:?\s*(\S+%)").unwrap());
static PSNR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"PSNR=((?:[YUV*]:[\d.]+\s*)+)").unwrap()
});

/// Adapter for the `ffmpeg` transcoder.
#[derive(Debug, Default)]
pub struct Ffmpeg;

impl Ffmpeg {
    pub fn new() -> Self {
        Self
    }
}

impl Tool for Ffmpeg {
    fn token(&self) -> &'static str {
        "ffmpeg"
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

        let position_ms = if let Some(caps) = TIME_HMS_RE.captures(line) {
            timecode_to_ms(
                caps.get(1).map_or("", |m| m.as_str()),
                caps.get(2).map_or("", |m| m.as_str()),
                caps.get(3).map_or("", |m| m.as_str()),
                caps.get(4).map_or("0", |m| m.as_str()),
            )?
        } else if let Some(caps) = TIME_SECS_RE.captures(line) {
            let secs: f64 = caps.get(1)?.as_str().parse().ok()?;
            (secs * 1000.0) as u64
        } else {
            return None;
        };

        percentage(position_ms, ctx.duration_ms)
    }

    fn parse_result(&self, raw: &str) -> Result<ToolReport> {
        if let Some(caps) = UNKNOWN_CODEC_RE.captures(raw) {
            let codec = caps.get(1).map_or("", |m| m.as_str());
            return Err(Error::invalid_file(
                "ffmpeg",
                format!("codec '{codec}' not supported by this build of ffmpeg"),
            ));
        }
        if USAGE_RE.is_match(raw) {
            return Err(Error::invalid_command(
                "ffmpeg",
                "must pass a command to ffmpeg",
            ));
        }
        if let Some(m) = OUTPUT_FORMAT_RE.find(raw) {
            return Err(Error::invalid_command("ffmpeg", m.as_str()));
        }
        if let Some(caps) = IO_ERROR_RE.captures(raw) {
            let path = caps.get(1).map_or("", |m| m.as_str());
            return Err(Error::invalid_file("ffmpeg", format!("I/O error: {path}")));
        }
        if raw.contains("Output file does not contain any stream") {
            return Err(Error::invalid_command(
                "ffmpeg",
                "output file does not contain any stream",
            ));
        }
        if raw.contains("Unsupported codec") {
            return Err(Error::invalid_file(
                "ffmpeg",
                "unsupported codec for input stream",
            ));
        }
        if raw.contains("Could not write header for output file") {
            return Err(Error::unexpected_result(
                "ffmpeg",
                "format does not support this codec, or incorrect codec parameters",
            ));
        }

        let mut report = ToolReport::default();
        let field = |re: &Regex| {
            re.captures(raw)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
        };

        let size = field(&SIZE_RE);
        let time = field(&TIME_FIELD_RE);
        if size.is_none() || time.is_none() {
            let last_line = raw
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("no output")
                .trim();
            return Err(Error::unexpected_result("ffmpeg", last_line));
        }

        if let Some(v) = field(&FRAME_RE) {
            report.insert("frame", v);
        }
        if let Some(v) = field(&OUTPUT_FPS_RE) {
            report.insert("output_fps", v);
        }
        if let Some(v) = field(&Q_RE) {
            report.insert("q", v);
        }
        if let Some(v) = size {
            report.insert("size", v);
        }
        if let Some(v) = time {
            report.insert("time", v);
        }
        if let Some(v) = field(&BITRATE_RE) {
            report.insert("bitrate", v);
        }
        if let Some(v) = field(&VIDEO_SIZE_RE) {
            report.insert("video_size", v);
        }
        if let Some(v) = field(&AUDIO_SIZE_RE) {
            report.insert("audio_size", v);
        }
        if let Some(v) = field(&HEADER_SIZE_RE) {
            report.insert("header_size", v);
        }
        if let Some(v) = field(&OVERHEAD_RE) {
            report.insert("overhead", v);
        }
        if let Some(v) = field(&PSNR_RE) {
            report.insert("psnr", v);
        }

        Ok(report)
    }

    fn format_magic(&self, value: &MagicValue<'_>) -> Option<String> {
        Some(match value {
            MagicValue::Resolution(r) => format_resolution(r),
            MagicValue::Fps(fps) => format!("-r {fps}"),
            MagicValue::Deinterlace(true) => "-deinterlace".to_string(),
            MagicValue::Deinterlace(false) => String::new(),
            MagicValue::AudioChannels(n) => format!("-ac {n}"),
            MagicValue::AudioBitRate(v) => format!("-ab {v}"),
            MagicValue::AudioSampleRate(v) => format!("-ar {v}"),
            MagicValue::VideoBitRate(v) => format!("-b {v}"),
            MagicValue::VideoBitRateTolerance(v) => format!("-bt {v}"),
            MagicValue::VideoBitRateMin(v) => format!("-minrate {v}"),
            MagicValue::VideoBitRateMax(v) => format!("-maxrate {v}"),
            MagicValue::VideoQuality(p) => format_video_quality(p),
        })
    }
}

fn format_resolution(r: &Resolution) -> String {
    let mut out = format!("-s {}x{}", r.scale.width, r.scale.height);
    if let Some(lb) = r.letterbox {
        let pad_total = lb.height.saturating_sub(r.scale.height);
        let top = pad_total / 2;
        let bottom = pad_total - top;
        if pad_total > 0 {
            out.push_str(&format!(" -padtop {top} -padbottom {bottom}"));
        }
        let side_total = lb.width.saturating_sub(r.scale.width);
        let left = side_total / 2;
        let right = side_total - left;
        if side_total > 0 {
            out.push_str(&format!(" -padleft {left} -padright {right}"));
        }
    }
    out
}

fn format_video_quality(p: &VideoQualityParams) -> String {
    let mut parts: Vec<String> = Vec::new();
    match p.quality.as_str() {
        "low" => parts.push("-crf 30".to_string()),
        "high" => parts.push("-crf 18".to_string()),
        _ => parts.push("-crf 23".to_string()),
    }
    if let Some(fps) = &p.fps {
        parts.push(format!("-r {fps}"));
    }
    parts.push(format_resolution(&p.resolution));
    if let Some(b) = &p.video_bit_rate {
        parts.push(format!("-b {b}"));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::resolution::Dimensions;

    const SUMMARY: &str = "\
Press [q] to stop encoding
frame= 4126 q=31.0 Lsize=    5917kB time=69.1 bitrate= 702.0kbits/s
video:2417kB audio:540kB header:0kB muxing overhead 100.140277%
";

    #[test]
    fn progress_tracks_time_against_duration() {
        let tool = Ffmpeg::new();
        let mut ctx = ProgressContext { duration_ms: 0 };

        assert_eq!(
            tool.parse_progress("  Duration: 00:00:19.6, start: 0.0", &mut ctx),
            None
        );
        assert_eq!(ctx.duration_ms, 19600);

        let p = tool.parse_progress(
            "frame=  124 q=10.0 size=     644kB time=9.8 bitrate= 538.1kbits/s",
            &mut ctx,
        );
        assert_eq!(p, Some(50));
    }

    #[test]
    fn progress_accepts_hms_timecodes() {
        let tool = Ffmpeg::new();
        let mut ctx = ProgressContext { duration_ms: 138_200 };
        let p = tool.parse_progress("time=00:01:09.10 bitrate= 702.0kbits/s", &mut ctx);
        assert_eq!(p, Some(50));
    }

    #[test]
    fn progress_clamps_past_end() {
        let tool = Ffmpeg::new();
        let mut ctx = ProgressContext { duration_ms: 10_000 };
        assert_eq!(tool.parse_progress("time=99.0", &mut ctx), Some(100));
    }

    #[test]
    fn summary_fields_extracted() {
        let report = Ffmpeg::new().parse_result(SUMMARY).unwrap();
        assert_eq!(report.get("frame"), Some("4126"));
        assert_eq!(report.get("q"), Some("31.0"));
        assert_eq!(report.get("size"), Some("5917kB"));
        assert_eq!(report.get("time"), Some("69.1"));
        assert_eq!(report.get("bitrate"), Some("702.0kbits/s"));
        assert_eq!(report.get("video_size"), Some("2417kB"));
        assert_eq!(report.get("audio_size"), Some("540kB"));
        assert_eq!(report.get("header_size"), Some("0kB"));
        assert_eq!(report.get("overhead"), Some("100.140277%"));
    }

    #[test]
    fn psnr_captured_when_present() {
        let raw = "frame= 273 fps= 31 q=10.0 PSNR=Y:33.85 U:37.61 V:37.46 *:34.77 size= 144kB time=9.1 bitrate= 129.4kbits/s\n";
        let report = Ffmpeg::new().parse_result(raw).unwrap();
        assert_eq!(report.get("output_fps"), Some("31"));
        assert!(report.get("psnr").unwrap().starts_with("Y:33.85"));
    }

    #[test]
    fn usage_banner_is_invalid_command() {
        let raw = "usage: ffmpeg [[infile options] -i infile]...\n";
        match Ffmpeg::new().parse_result(raw) {
            Err(Error::InvalidCommand { message, .. }) => {
                assert_eq!(message, "must pass a command to ffmpeg");
            }
            other => panic!("expected InvalidCommand, got {other:?}"),
        }
    }

    #[test]
    fn unsuitable_output_format_is_invalid_command() {
        let raw = "Unable for find a suitable output format for 'foo.xyz'\n";
        assert!(matches!(
            Ffmpeg::new().parse_result(raw),
            Err(Error::InvalidCommand { .. })
        ));
    }

    #[test]
    fn io_error_is_invalid_file() {
        let raw = "missing.mp4: I/O error occurred\n";
        match Ffmpeg::new().parse_result(raw) {
            Err(Error::InvalidFile { message, .. }) => {
                assert!(message.contains("missing.mp4"));
            }
            other => panic!("expected InvalidFile, got {other:?}"),
        }
    }

    #[test]
    fn unknown_codec_is_invalid_file() {
        let raw = "Unknown codec 'xvid'\n";
        match Ffmpeg::new().parse_result(raw) {
            Err(Error::InvalidFile { message, .. }) => assert!(message.contains("xvid")),
            other => panic!("expected InvalidFile, got {other:?}"),
        }
    }

    #[test]
    fn missing_summary_is_unexpected_result() {
        let raw = "Press [q] to stop encoding\nsomething went sideways\n";
        match Ffmpeg::new().parse_result(raw) {
            Err(Error::UnexpectedResult { message, .. }) => {
                assert_eq!(message, "something went sideways");
            }
            other => panic!("expected UnexpectedResult, got {other:?}"),
        }
    }

    #[test]
    fn resolution_renders_scale_and_pads() {
        let plain = Resolution::scale(640, 360);
        assert_eq!(format_resolution(&plain), "-s 640x360");

        let boxed = Resolution {
            scale: Dimensions::new(640, 360),
            letterbox: Some(Dimensions::new(640, 480)),
        };
        assert_eq!(
            format_resolution(&boxed),
            "-s 640x360 -padtop 60 -padbottom 60"
        );
    }
}
