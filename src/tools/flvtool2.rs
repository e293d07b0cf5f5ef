//! flvtool2 adapter.
//!
//! Injects cue-point metadata into FLV files. Quick metadata pass, no
//! progress stream.

use crate::error::Result;
use crate::tools::{Tool, ToolReport};
use crate::Error;

/// Adapter for the `flvtool2` FLV metadata writer.
#[derive(Debug, Default)]
pub struct FlvTool2;

impl FlvTool2 {
    pub fn new() -> Self {
        Self
    }
}

impl Tool for FlvTool2 {
    fn token(&self) -> &'static str {
        "flvtool2"
    }

    fn parse_result(&self, raw: &str) -> Result<ToolReport> {
        if raw.contains("Usage: flvtool2") {
            return Err(Error::invalid_command(
                "flvtool2",
                "must pass a command to flvtool2",
            ));
        }
        if raw.contains("No such file or directory") {
            return Err(Error::invalid_file("flvtool2", "no such file or directory"));
        }
        if let Some(line) = raw.lines().find(|l| l.starts_with("ERROR:")) {
            return Err(Error::unexpected_result("flvtool2", line.trim()));
        }
        Ok(ToolReport::default())
    }
}
