//! qt-faststart adapter.
//!
//! Rewrites an MP4 so the moov atom leads the file. The tool emits no
//! progress; classification is all this adapter does.

use crate::error::Result;
use crate::tools::{Tool, ToolReport};
use crate::Error;

/// Adapter for `qt-faststart` (streaming-friendly MP4 rewriter).
#[derive(Debug, Default)]
pub struct QtFaststart;

impl QtFaststart {
    pub fn new() -> Self {
        Self
    }
}

impl Tool for QtFaststart {
    fn token(&self) -> &'static str {
        "qtfaststart"
    }

    fn parse_result(&self, raw: &str) -> Result<ToolReport> {
        if raw.contains("Usage: qt-faststart") {
            return Err(Error::invalid_command(
                "qtfaststart",
                "must pass an input and output file to qt-faststart",
            ));
        }
        if raw.contains("last atom in file was not a moov atom") {
            return Err(Error::invalid_file("qtfaststart", "could not find moov atom"));
        }
        if raw.contains("No such file or directory") {
            return Err(Error::invalid_file(
                "qtfaststart",
                "no such file or directory",
            ));
        }
        if raw.contains("Undefined error:") {
            return Err(Error::unexpected_result("qtfaststart", "undefined error"));
        }
        Ok(ToolReport::default())
    }
}
