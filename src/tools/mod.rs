//! External-tool adapters.
//!
//! Each supported CLI tool gets an adapter implementing [`Tool`]: it knows
//! the tool's progress-line grammar, how to classify the tool's diagnostic
//! output after a run, and how to render magic attributes (resolution, fps,
//! bit rates) into the tool's flag syntax.
//!
//! Adapters are looked up through a closed [`ToolRegistry`] keyed by the
//! lowercased leading token of a recipe stage. Unregistered tokens are
//! rejected before anything is spawned.

mod ffmpeg;
mod ffmpeg2theora;
mod flvtool2;
mod handbrake;
mod lame;
mod qtfaststart;
mod segmenter;

pub use ffmpeg::Ffmpeg;
pub use ffmpeg2theora::Ffmpeg2Theora;
pub use flvtool2::FlvTool2;
pub use handbrake::HandBrakeCli;
pub use lame::Lame;
pub use qtfaststart::QtFaststart;
pub use segmenter::Segmenter;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::Result;
use crate::resolve::resolution::Resolution;
use crate::Error;

/// Structured fields a tool reports on success (frame counts, sizes,
/// bitrates). Keys are adapter-defined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolReport {
    pub fields: BTreeMap<String, String>,
}

impl ToolReport {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(|s| s.as_str())
    }

    fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.fields.insert(key.to_string(), value.into());
    }
}

/// Mutable state threaded through progress parsing for one stage.
///
/// Seeded with the original file's duration; tools that print their own
/// duration header overwrite it.
#[derive(Debug, Clone, Default)]
pub struct ProgressContext {
    pub duration_ms: u64,
}

/// Parameters for the composite `$video_quality$` attribute.
#[derive(Debug, Clone)]
pub struct VideoQualityParams {
    /// `low`, `medium` or `high`.
    pub quality: String,
    /// Formatted frame rate, when one was requested or copied.
    pub fps: Option<String>,
    pub resolution: Resolution,
    pub video_bit_rate: Option<String>,
}

/// A magic-attribute value handed to a tool for rendering into its own
/// flag syntax.
#[derive(Debug)]
pub enum MagicValue<'a> {
    Resolution(&'a Resolution),
    Fps(&'a str),
    Deinterlace(bool),
    AudioChannels(&'a str),
    AudioBitRate(&'a str),
    AudioSampleRate(&'a str),
    VideoBitRate(&'a str),
    VideoBitRateTolerance(&'a str),
    VideoBitRateMin(&'a str),
    VideoBitRateMax(&'a str),
    VideoQuality(&'a VideoQualityParams),
}

/// Adapter for one external CLI tool.
pub trait Tool: Send + Sync + std::fmt::Debug {
    /// Registry token, matched case-insensitively against the leading word
    /// of a recipe stage.
    fn token(&self) -> &'static str;

    /// Whether the tool emits parseable progress lines while running.
    fn supports_progress(&self) -> bool {
        false
    }

    /// Line separator for the tool's progress stream. Most tools redraw a
    /// status line with carriage returns.
    fn progress_separator(&self) -> u8 {
        b'\r'
    }

    /// Extract a percentage from one output line, if the line carries one.
    fn parse_progress(&self, line: &str, ctx: &mut ProgressContext) -> Option<u32> {
        let _ = (line, ctx);
        None
    }

    /// Classify the tool's full diagnostic output after the process exits.
    ///
    /// # Errors
    ///
    /// Returns the matching classified error when the output carries a known
    /// failure signature.
    fn parse_result(&self, raw: &str) -> Result<ToolReport>;

    /// Render a magic attribute into the tool's flag syntax, or `None` when
    /// the tool has no rendering for it.
    fn format_magic(&self, value: &MagicValue<'_>) -> Option<String> {
        let _ = value;
        None
    }
}

/// Closed mapping from recipe tokens to tool adapters.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// A registry with no tools.
    pub fn empty() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// A registry with every built-in adapter.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(Ffmpeg::new()));
        registry.register(Arc::new(Ffmpeg2Theora::new()));
        registry.register(Arc::new(FlvTool2::new()));
        registry.register(Arc::new(HandBrakeCli::new()));
        registry.register(Arc::new(Lame::new()));
        registry.register(Arc::new(QtFaststart::new()));
        registry.register(Arc::new(Segmenter::new()));
        registry
    }

    /// Add or replace an adapter under its lowercased token.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.token().to_lowercase(), tool);
    }

    /// Look up an adapter case-insensitively.
    pub fn get(&self, token: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(&token.to_lowercase()).cloned()
    }

    /// Look up an adapter, failing with [`Error::UnknownTool`] when the
    /// token is not registered.
    pub fn require(&self, token: &str) -> Result<Arc<dyn Tool>> {
        self.get(token)
            .ok_or_else(|| Error::unknown_tool(token))
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Parse a `HH:MM:SS.f` timecode into milliseconds. Fractional digits
/// beyond the first are ignored.
pub(crate) fn timecode_to_ms(h: &str, m: &str, s: &str, tenths: &str) -> Option<u64> {
    let h: u64 = h.parse().ok()?;
    let m: u64 = m.parse().ok()?;
    let s: u64 = s.parse().ok()?;
    let tenths: u64 = tenths.get(..1).unwrap_or("0").parse().ok()?;
    Some(((h * 3600 + m * 60 + s) * 10 + tenths) * 100)
}

/// Percentage of `position` within `duration`, clamped to 100.
pub(crate) fn percentage(position_ms: u64, duration_ms: u64) -> Option<u32> {
    if duration_ms == 0 {
        return None;
    }
    Some(((position_ms * 100 / duration_ms) as u32).min(100))
}
