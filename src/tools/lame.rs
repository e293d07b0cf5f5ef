//! lame MP3 encoder adapter.
//!
//! Progress appears as a parenthesized percentage in the frame counter:
//!
//! ```text
//!   3750/6774  ( 55%)|    0:02/    0:04|    0:02/    0:04|   18.639x|    0:01
//! ```

use std::sync::LazyLock;

use regex::Regex;

use crate::error::Result;
use crate::tools::{MagicValue, ProgressContext, Tool, ToolReport};
use crate::Error;

static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\s*(\d{1,3})%\)").unwrap());

/// Adapter for the `lame` MP3 encoder.
#[derive(Debug, Default)]
pub struct Lame;

impl Lame {
    pub fn new() -> Self {
        Self
    }
}

impl Tool for Lame {
    fn token(&self) -> &'static str {
        "lame"
    }

    fn supports_progress(&self) -> bool {
        true
    }

    fn parse_progress(&self, line: &str, _ctx: &mut ProgressContext) -> Option<u32> {
        let caps = PERCENT_RE.captures(line)?;
        let pct: u32 = caps.get(1)?.as_str().parse().ok()?;
        Some(pct.min(100))
    }

    fn parse_result(&self, raw: &str) -> Result<ToolReport> {
        if raw.contains("usage: lame") {
            return Err(Error::invalid_command(
                "lame",
                "usage: lame [options] <infile> [outfile]",
            ));
        }
        if raw.contains("Warning: unsupported audio format") {
            return Err(Error::invalid_file("lame", "unsupported audio format"));
        }
        if raw.contains("Could not find") {
            return Err(Error::invalid_file("lame", "no such file or directory"));
        }
        Ok(ToolReport::default())
    }

    fn format_magic(&self, value: &MagicValue<'_>) -> Option<String> {
        match value {
            MagicValue::AudioBitRate(v) => Some(format!("-b {v}")),
            MagicValue::AudioSampleRate(v) => Some(format!("--resample {v}")),
            MagicValue::AudioChannels(n) => Some(match *n {
                "1" => "-m m".to_string(),
                _ => "-m j".to_string(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_extracted() {
        let tool = Lame::new();
        let mut ctx = ProgressContext::default();
        let p = tool.parse_progress(
            "  3750/6774  ( 55%)|    0:02/    0:04|    0:02/    0:04|   18.639x|    0:01",
            &mut ctx,
        );
        assert_eq!(p, Some(55));
    }

    #[test]
    fn overshoot_clamped() {
        let tool = Lame::new();
        let mut ctx = ProgressContext::default();
        assert_eq!(tool.parse_progress("(101%)", &mut ctx), Some(100));
    }

    #[test]
    fn usage_is_invalid_command() {
        assert!(matches!(
            Lame::new().parse_result("usage: lame [options] <infile> [outfile]\n"),
            Err(Error::InvalidCommand { .. })
        ));
    }

    #[test]
    fn unsupported_format_is_invalid_file() {
        assert!(matches!(
            Lame::new().parse_result("Warning: unsupported audio format\n"),
            Err(Error::InvalidFile { .. })
        ));
    }

    #[test]
    fn missing_file_is_invalid_file() {
        assert!(matches!(
            Lame::new().parse_result("Could not find \"missing.wav\"\n"),
            Err(Error::InvalidFile { .. })
        ));
    }

    #[test]
    fn clean_run_is_ok() {
        assert!(Lame::new()
            .parse_result("Writing LAME Tag...done\n")
            .is_ok());
    }
}
