//! Command-template resolution.
//!
//! Recipe stages contain `$name$` placeholders. Three families are resolved,
//! in order:
//!
//! 1. adaptive scale, `$scale_W1xH1_or_W2xH2$`, which picks a target by the
//!    original's aspect ratio, then scales and pads;
//! 2. fixed scale, `$scale_WxH$`, which scales and pads to the named target;
//! 3. named placeholders: magic attributes computed from the original file
//!    and the option set, falling back to literal option values.
//!
//! `\$` escapes a literal dollar sign and is unescaped after substitution.
//! The `input_file` and `output_file` values are single-quoted for the
//! shell; everything else is substituted verbatim.

pub mod resolution;

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tokio::sync::OnceCell;

use crate::error::Result;
use crate::options::Options;
use crate::probe::{MediaInfo, MediaInspector};
use crate::tools::{MagicValue, Tool, VideoQualityParams};
use crate::Error;

use resolution::{scale_and_pad, Dimensions, Resolution};

static ADAPTIVE_SCALE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$scale_(\d+)x(\d+)_or_(\d+)x(\d+)\$").unwrap()
});
static FIXED_SCALE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$scale_(\d+)x(\d+)\$").unwrap());
static NAMED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([-_A-Za-z]+)\$").unwrap());

/// Aspect-ratio threshold for adaptive scale placeholders. Sources wider
/// than 4:3 take the first target pair, everything else the second.
const WIDE_RATIO: f64 = 4.0 / 3.0;

/// Handle to the original file's metadata, probed at most once per run and
/// only when a placeholder actually needs it.
pub enum OriginalMedia<'a> {
    Probed {
        inspector: &'a dyn MediaInspector,
        path: &'a Path,
        cell: &'a OnceCell<MediaInfo>,
    },
    Fixed(&'a MediaInfo),
}

impl<'a> OriginalMedia<'a> {
    pub fn probed(
        inspector: &'a dyn MediaInspector,
        path: &'a Path,
        cell: &'a OnceCell<MediaInfo>,
    ) -> Self {
        Self::Probed {
            inspector,
            path,
            cell,
        }
    }

    /// A handle with pre-known metadata.
    pub fn fixed(info: &'a MediaInfo) -> Self {
        Self::Fixed(info)
    }

    /// The original's metadata, probing on first use.
    pub async fn get(&self) -> Result<&MediaInfo> {
        match self {
            Self::Fixed(info) => Ok(info),
            Self::Probed {
                inspector,
                path,
                cell,
            } => {
                cell.get_or_try_init(|| async { inspector.inspect(path).await })
                    .await
            }
        }
    }
}

/// Resolves one stage template against a tool, an option set and the
/// original file.
pub struct VariableResolver<'a> {
    tool: &'a dyn Tool,
    options: &'a Options,
    original: &'a OriginalMedia<'a>,
}

impl<'a> VariableResolver<'a> {
    pub fn new(tool: &'a dyn Tool, options: &'a Options, original: &'a OriginalMedia<'a>) -> Self {
        Self {
            tool,
            options,
            original,
        }
    }

    /// Resolve every placeholder in `template` into a runnable command line.
    ///
    /// # Errors
    ///
    /// [`Error::Parameter`] for placeholders naming an option that was not
    /// provided, malformed dimensions, or magic attributes the tool does not
    /// render.
    pub async fn resolve(&self, template: &str) -> Result<String> {
        let out = self.apply_adaptive_scale(template).await?;
        let out = self.apply_fixed_scale(&out).await?;
        let out = self.apply_named(&out).await?;
        Ok(out.replace("\\$", "$"))
    }

    async fn apply_adaptive_scale(&self, input: &str) -> Result<String> {
        let mut values = HashMap::new();
        for caps in ADAPTIVE_SCALE_RE.captures_iter(input) {
            let Some(m) = caps.get(0) else { continue };
            if is_escaped(input, m.start()) || values.contains_key(m.as_str()) {
                continue;
            }
            let first = Dimensions::new(
                parse_dim(&caps, 1)?,
                parse_dim(&caps, 2)?,
            );
            let second = Dimensions::new(
                parse_dim(&caps, 3)?,
                parse_dim(&caps, 4)?,
            );
            let original = self.original.get().await?;
            let target = match original.ratio() {
                Some(r) if r > WIDE_RATIO => first,
                _ => second,
            };
            let scaled = scale_and_pad(
                Dimensions::new(original.width, original.height),
                target,
            );
            values.insert(m.as_str().to_string(), self.render_resolution(&scaled)?);
        }
        Ok(substitute(input, &ADAPTIVE_SCALE_RE, &values))
    }

    async fn apply_fixed_scale(&self, input: &str) -> Result<String> {
        let mut values = HashMap::new();
        for caps in FIXED_SCALE_RE.captures_iter(input) {
            let Some(m) = caps.get(0) else { continue };
            if is_escaped(input, m.start()) || values.contains_key(m.as_str()) {
                continue;
            }
            let target = Dimensions::new(parse_dim(&caps, 1)?, parse_dim(&caps, 2)?);
            let original = self.original.get().await?;
            let scaled = scale_and_pad(
                Dimensions::new(original.width, original.height),
                target,
            );
            values.insert(m.as_str().to_string(), self.render_resolution(&scaled)?);
        }
        Ok(substitute(input, &FIXED_SCALE_RE, &values))
    }

    async fn apply_named(&self, input: &str) -> Result<String> {
        let mut values = HashMap::new();
        for caps in NAMED_RE.captures_iter(input) {
            let Some(m) = caps.get(0) else { continue };
            if is_escaped(input, m.start()) || values.contains_key(m.as_str()) {
                continue;
            }
            let name = caps.get(1).map_or("", |c| c.as_str());
            values.insert(m.as_str().to_string(), self.resolve_name(name).await?);
        }
        Ok(substitute(input, &NAMED_RE, &values))
    }

    async fn resolve_name(&self, name: &str) -> Result<String> {
        match name.to_lowercase().as_str() {
            "input_file" | "output_file" => {
                let value = self.required_option(name)?;
                Ok(shell_quote(value))
            }
            "resolution" => {
                let original = self.original.get().await?;
                let r = resolution::resolve_from_options(self.options, original)?;
                self.render_resolution(&r)
            }
            "resolution_and_padding" => {
                let r = self.scale_and_pad_from_options().await?;
                self.render_resolution(&r)
            }
            "resolution_keep_aspect_ratio" => {
                let mut r = self.scale_and_pad_from_options().await?;
                r.letterbox = None;
                self.render_resolution(&r)
            }
            "fps" => match self.options.get_non_empty("fps") {
                None => Ok(String::new()),
                Some("copy") => self.original_fps_flag().await,
                Some(fps) => self.render(&MagicValue::Fps(fps), "fps"),
            },
            "original_fps" => self.original_fps_flag().await,
            "deinterlace" => {
                let on = self
                    .options
                    .get_non_empty("deinterlace")
                    .is_some_and(|v| !matches!(v, "false" | "0" | "no"));
                self.render(&MagicValue::Deinterlace(on), "deinterlace")
            }
            "audio_channels" => {
                let channels = match self.options.get_non_empty("audio_channels") {
                    None => return Ok(String::new()),
                    Some("stereo") => "2",
                    Some("mono") => "1",
                    Some(other) => other,
                };
                self.render(&MagicValue::AudioChannels(channels), "audio_channels")
            }
            "audio_bit_rate" => self.literal_flag("audio_bit_rate", MagicValue::AudioBitRate),
            "audio_sample_rate" => {
                self.literal_flag("audio_sample_rate", MagicValue::AudioSampleRate)
            }
            "video_bit_rate" => self.literal_flag("video_bit_rate", MagicValue::VideoBitRate),
            "video_bit_rate_tolerance" => self.literal_flag(
                "video_bit_rate_tolerance",
                MagicValue::VideoBitRateTolerance,
            ),
            "video_bit_rate_min" => {
                self.literal_flag("video_bit_rate_min", MagicValue::VideoBitRateMin)
            }
            "video_bit_rate_max" => {
                self.literal_flag("video_bit_rate_max", MagicValue::VideoBitRateMax)
            }
            "video_quality" => {
                let original = self.original.get().await?;
                let params = VideoQualityParams {
                    quality: self
                        .options
                        .get_non_empty("video_quality")
                        .unwrap_or("medium")
                        .to_string(),
                    fps: self.requested_fps(original),
                    resolution: resolution::resolve_from_options(self.options, original)?,
                    video_bit_rate: self
                        .options
                        .get_non_empty("video_bit_rate")
                        .map(str::to_string),
                };
                self.render(&MagicValue::VideoQuality(&params), "video_quality")
            }
            "temp_dir" => Ok(self.temp_dir()),
            _ => {
                let value = self.options.get(name).ok_or_else(|| {
                    Error::parameter(format!(
                        "command is looking for the {name} parameter, but it was not provided"
                    ))
                })?;
                Ok(value.to_string())
            }
        }
    }

    /// Scale-and-pad target taken from the `width`/`height` options.
    async fn scale_and_pad_from_options(&self) -> Result<Resolution> {
        let target = Dimensions::new(
            required_dim(self.options, "width")?,
            required_dim(self.options, "height")?,
        );
        let original = self.original.get().await?;
        Ok(scale_and_pad(
            Dimensions::new(original.width, original.height),
            target,
        ))
    }

    async fn original_fps_flag(&self) -> Result<String> {
        let original = self.original.get().await?;
        match original.fps {
            Some(fps) => {
                let formatted = format!("{fps:.2}");
                self.render(&MagicValue::Fps(&formatted), "fps")
            }
            None => Ok(String::new()),
        }
    }

    /// Frame rate requested for this run, as a formatted number.
    fn requested_fps(&self, original: &MediaInfo) -> Option<String> {
        match self.options.get_non_empty("fps") {
            Some("copy") => original.fps.map(|f| format!("{f:.2}")),
            Some(fps) => Some(fps.to_string()),
            None => None,
        }
    }

    /// Substitute an optional literal option through the tool's formatter;
    /// absent options resolve to nothing.
    fn literal_flag<'s>(
        &'s self,
        key: &str,
        make: impl Fn(&'s str) -> MagicValue<'s>,
    ) -> Result<String> {
        match self.options.get_non_empty(key) {
            None => Ok(String::new()),
            Some(value) => self.render(&make(value), key),
        }
    }

    fn render_resolution(&self, r: &Resolution) -> Result<String> {
        self.render(&MagicValue::Resolution(r), "resolution")
    }

    fn render(&self, value: &MagicValue<'_>, name: &str) -> Result<String> {
        self.tool.format_magic(value).ok_or_else(|| {
            Error::parameter(format!(
                "the {} tool does not implement the {} attribute",
                self.tool.token(),
                name
            ))
        })
    }

    fn required_option(&self, name: &str) -> Result<&str> {
        self.options.get(name).ok_or_else(|| {
            Error::parameter(format!(
                "command is looking for the {name} parameter, but it was not provided"
            ))
        })
    }

    /// Directory of the output file, with a trailing slash, for tools that
    /// write scratch files next to their output.
    fn temp_dir(&self) -> String {
        match self.options.get_non_empty("output_file") {
            Some(out) => {
                let dir = Path::new(out)
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_else(|| ".".to_string());
                format!("{dir}/")
            }
            None => String::new(),
        }
    }
}

/// Whether the match starting at `pos` is escaped by a preceding backslash.
fn is_escaped(input: &str, pos: usize) -> bool {
    pos > 0 && input.as_bytes()[pos - 1] == b'\\'
}

/// Replace every unescaped match of `re` with its precomputed value.
fn substitute(input: &str, re: &Regex, values: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last = 0;
    for m in re.find_iter(input) {
        if is_escaped(input, m.start()) {
            continue;
        }
        let Some(value) = values.get(m.as_str()) else {
            continue;
        };
        out.push_str(&input[last..m.start()]);
        out.push_str(value);
        last = m.end();
    }
    out.push_str(&input[last..]);
    out
}

fn parse_dim(caps: &regex::Captures<'_>, index: usize) -> Result<u32> {
    let raw = caps.get(index).map_or("", |m| m.as_str());
    raw.parse::<u32>()
        .map_err(|_| Error::parameter(format!("invalid dimension '{raw}' in scale placeholder")))
}

fn required_dim(options: &Options, key: &str) -> Result<u32> {
    let raw = options.get_non_empty(key).ok_or_else(|| {
        Error::parameter(format!(
            "command is looking for the {key} parameter, but it was not provided"
        ))
    })?;
    match raw.parse::<u32>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(Error::parameter(format!("invalid {key} of '{raw}'"))),
    }
}

/// Single-quote a value for `/bin/sh`, escaping embedded single quotes.
pub(crate) fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
