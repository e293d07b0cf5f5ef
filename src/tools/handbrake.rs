//! HandBrakeCLI adapter.
//!
//! HandBrake prints self-contained percentages, so no duration tracking is
//! needed:
//!
//! ```text
//! Encoding: task 1 of 1, 32.33 % (31.92 fps, avg 27.25 fps, ETA 00h00m53s)
//! ```

use std::sync::LazyLock;

use regex::Regex;

use crate::error::Result;
use crate::tools::{MagicValue, ProgressContext, Tool, ToolReport};
use crate::Error;

static ENCODING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Encoding: task \d+ of \d+, (\d{1,3})\.\d{1,2} ?%").unwrap()
});

/// Adapter for the `HandBrakeCLI` transcoder.
#[derive(Debug, Default)]
pub struct HandBrakeCli;

impl HandBrakeCli {
    pub fn new() -> Self {
        Self
    }
}

impl Tool for HandBrakeCli {
    fn token(&self) -> &'static str {
        "handbrakecli"
    }

    fn supports_progress(&self) -> bool {
        true
    }

    fn parse_progress(&self, line: &str, _ctx: &mut ProgressContext) -> Option<u32> {
        let caps = ENCODING_RE.captures(line)?;
        let pct: u32 = caps.get(1)?.as_str().parse().ok()?;
        Some(pct.min(100))
    }

    fn parse_result(&self, raw: &str) -> Result<ToolReport> {
        if raw.contains("Syntax: HandBrakeCLI") {
            return Err(Error::invalid_command(
                "handbrakecli",
                "must pass a command to HandBrakeCLI",
            ));
        }
        if raw.contains("No such file or directory") {
            return Err(Error::invalid_file(
                "handbrakecli",
                "no such file or directory",
            ));
        }
        if raw.contains("Undefined error:") {
            return Err(Error::unexpected_result("handbrakecli", "undefined error"));
        }
        Ok(ToolReport::default())
    }

    fn format_magic(&self, value: &MagicValue<'_>) -> Option<String> {
        match value {
            MagicValue::Resolution(r) => Some(format!(
                "-w {} -l {}",
                r.scale.width, r.scale.height
            )),
            MagicValue::Fps(fps) => Some(format!("-r {fps}")),
            MagicValue::AudioBitRate(v) => Some(format!("-B {v}")),
            MagicValue::AudioSampleRate(v) => Some(format!("-R {v}")),
            MagicValue::VideoBitRate(v) => Some(format!("-b {v}")),
            MagicValue::Deinterlace(true) => Some("-d".to_string()),
            MagicValue::Deinterlace(false) => Some(String::new()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_is_integer_part() {
        let tool = HandBrakeCli::new();
        let mut ctx = ProgressContext::default();
        let p = tool.parse_progress(
            "Encoding: task 1 of 1, 32.33 % (31.92 fps, avg 27.25 fps, ETA 00h00m53s)",
            &mut ctx,
        );
        assert_eq!(p, Some(32));
    }

    #[test]
    fn tight_format_without_space_accepted() {
        let tool = HandBrakeCli::new();
        let mut ctx = ProgressContext::default();
        assert_eq!(
            tool.parse_progress("Encoding: task 2 of 2, 99.50%", &mut ctx),
            Some(99)
        );
    }

    #[test]
    fn unrelated_lines_ignored() {
        let tool = HandBrakeCli::new();
        let mut ctx = ProgressContext::default();
        assert_eq!(tool.parse_progress("Scanning title 1 of 1", &mut ctx), None);
    }

    #[test]
    fn syntax_banner_is_invalid_command() {
        assert!(matches!(
            HandBrakeCli::new().parse_result("Syntax: HandBrakeCLI [options] -i <device> -o <file>\n"),
            Err(Error::InvalidCommand { .. })
        ));
    }

    #[test]
    fn missing_input_is_invalid_file() {
        assert!(matches!(
            HandBrakeCli::new().parse_result("fopen: No such file or directory\n"),
            Err(Error::InvalidFile { .. })
        ));
    }

    #[test]
    fn undefined_error_is_unexpected() {
        assert!(matches!(
            HandBrakeCli::new().parse_result("hb_init: Undefined error: 0\n"),
            Err(Error::UnexpectedResult { .. })
        ));
    }

    #[test]
    fn clean_run_is_ok() {
        assert!(HandBrakeCli::new().parse_result("Rip done!\n").is_ok());
    }
}
