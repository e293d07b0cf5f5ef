//! Resolution fitting and letterbox math.
//!
//! Two distinct rounding rules coexist here on purpose:
//!
//! * the fit-to-width / fit-to-height / letterbox policies round the
//!   computed dimension to the nearest multiple of 16 (macroblock size);
//! * the scale-and-pad routine used by `$scale_WxH$` placeholders rounds
//!   down to the nearest even number.
//!
//! They produce different results for the same nominal inputs and are kept
//! as separate algorithms deliberately.

use crate::error::Result;
use crate::options::Options;
use crate::probe::MediaInfo;
use crate::Error;

/// A width/height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A resolved target resolution: the content's rendered size plus an
/// optional letterbox canvas the content is padded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Rendered content size.
    pub scale: Dimensions,
    /// Canvas size when padding is required.
    pub letterbox: Option<Dimensions>,
}

impl Resolution {
    /// A plain scale with no letterbox.
    pub fn scale(width: u32, height: u32) -> Self {
        Self {
            scale: Dimensions::new(width, height),
            letterbox: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Fit policies (multiple-of-16 rounding)
// ---------------------------------------------------------------------------

/// Round to the nearest multiple of 16, half away from zero.
fn nearest_16(v: i64) -> u32 {
    let rounded = ((v as f64) / 16.0).round() as i64 * 16;
    rounded.max(0) as u32
}

/// Height complementary to `width` under the source aspect, truncated then
/// rounded to the nearest multiple of 16.
pub fn calculate_height(src_w: u32, src_h: u32, width: u32) -> u32 {
    let aspect = f64::from(src_w) / f64::from(src_h);
    let h = (f64::from(width) / aspect) as i64;
    nearest_16(h)
}

/// Width complementary to `height` under the source aspect, truncated then
/// rounded to the nearest multiple of 16.
pub fn calculate_width(src_w: u32, src_h: u32, height: u32) -> u32 {
    let aspect = f64::from(src_w) / f64::from(src_h);
    let w = (aspect * f64::from(height)) as i64;
    nearest_16(w)
}

/// Fit to a requested width; height follows the source aspect.
pub fn fit_to_width(src: Dimensions, width: u32) -> Resolution {
    Resolution::scale(width, calculate_height(src.width, src.height, width))
}

/// Fit to a requested height; width follows the source aspect.
pub fn fit_to_height(src: Dimensions, height: u32) -> Resolution {
    Resolution::scale(calculate_width(src.width, src.height, height), height)
}

/// Fit inside a fixed canvas, clamping whichever axis overflows, and report
/// the canvas as the letterbox.
pub fn letterbox(src: Dimensions, canvas: Dimensions) -> Resolution {
    let w = calculate_width(src.width, src.height, canvas.height);
    let h;
    let scale_w;

    if w > canvas.width {
        scale_w = canvas.width;
        h = calculate_height(src.width, src.height, canvas.width);
    } else {
        scale_w = calculate_width(src.width, src.height, canvas.height);
        h = canvas.height;
    }

    Resolution {
        scale: Dimensions::new(scale_w, h),
        letterbox: Some(canvas),
    }
}

// ---------------------------------------------------------------------------
// Scale-and-pad (nearest-even rounding)
// ---------------------------------------------------------------------------

/// Compute the scaled content size for a requested canvas, rounding to even
/// numbers, and decide letterbox vs. stretch by comparing the aspect-derived
/// height against the requested height:
///
/// * equal height: plain scale, no letterbox;
/// * taller than requested: re-derive the width from the inverse aspect so
///   the content fits the (evened) requested height;
/// * shorter than requested: keep the width-driven fit and pad up to the
///   requested canvas.
pub fn scale_and_pad(src: Dimensions, target: Dimensions) -> Resolution {
    if src.width == 0 || src.height == 0 {
        // Degenerate source; just use the requested size.
        return Resolution::scale(target.width, target.height);
    }

    let aspect = f64::from(src.width) / f64::from(src.height);
    let aspect_inv = f64::from(src.height) / f64::from(src.width);

    let width = target.width - target.width % 2;
    let mut height = (f64::from(width) / aspect) as u32;
    height -= height % 2;

    if height > target.height {
        let even_h = target.height - target.height % 2;
        let mut w = (f64::from(even_h) / aspect_inv) as u32;
        w -= w % 2;
        Resolution::scale(w, even_h)
    } else if height < target.height {
        Resolution {
            scale: Dimensions::new(width, height),
            letterbox: Some(Dimensions::new(
                target.width - target.width % 2,
                target.height - target.height % 2,
            )),
        }
    } else {
        Resolution::scale(width, height)
    }
}

// ---------------------------------------------------------------------------
// Option-driven policy selection
// ---------------------------------------------------------------------------

/// Parse a dimension option as a positive integer.
fn dimension(options: &Options, key: &str, context: &str) -> Result<u32> {
    let raw = options.get(key).unwrap_or("");
    match raw.parse::<u32>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(Error::parameter(format!(
            "invalid {key} of '{raw}' for {context}"
        ))),
    }
}

/// Resolve the `$resolution$` magic attribute from the option set.
///
/// Policy selection mirrors the `resolution` option (`copy`, `width`,
/// `height`, `letterbox`) and falls back on which of `width`/`height` are
/// present: one of them selects the corresponding fit policy, both select
/// the literal size, neither copies the source.
pub fn resolve_from_options(options: &Options, original: &MediaInfo) -> Result<Resolution> {
    let src = Dimensions::new(original.width, original.height);

    match options.get("resolution") {
        Some("copy") => Ok(Resolution::scale(src.width, src.height)),
        Some("width") => {
            let w = dimension(options, "width", "fit to width")?;
            Ok(fit_to_width(src, w))
        }
        Some("height") => {
            let h = dimension(options, "height", "fit to height")?;
            Ok(fit_to_height(src, h))
        }
        Some("letterbox") => {
            let w = dimension(options, "width", "letterbox")?;
            let h = dimension(options, "height", "letterbox")?;
            Ok(letterbox(src, Dimensions::new(w, h)))
        }
        _ => {
            let has_w = options.get_non_empty("width").is_some();
            let has_h = options.get_non_empty("height").is_some();
            match (has_w, has_h) {
                (true, false) => {
                    let w = dimension(options, "width", "fit to width")?;
                    Ok(fit_to_width(src, w))
                }
                (false, true) => {
                    let h = dimension(options, "height", "fit to height")?;
                    Ok(fit_to_height(src, h))
                }
                (true, true) => {
                    let w = dimension(options, "width", "specific resolution")?;
                    let h = dimension(options, "height", "specific resolution")?;
                    Ok(Resolution::scale(w, h))
                }
                (false, false) => Ok(Resolution::scale(src.width, src.height)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src_16_9() -> Dimensions {
        Dimensions::new(1280, 720)
    }

    #[test]
    fn fit_to_width_is_multiple_of_16() {
        for w in [320, 400, 640, 1000, 1920] {
            let r = fit_to_width(src_16_9(), w);
            assert_eq!(r.scale.width, w);
            assert_eq!(r.scale.height % 16, 0, "width {w}");
            assert!(r.scale.height > 0);
            assert!(r.letterbox.is_none());
        }
    }

    #[test]
    fn fit_to_height_is_multiple_of_16() {
        for h in [240, 360, 480, 720] {
            let r = fit_to_height(src_16_9(), h);
            assert_eq!(r.scale.height, h);
            assert_eq!(r.scale.width % 16, 0, "height {h}");
            assert!(r.scale.width > 0);
        }
    }

    #[test]
    fn fit_to_width_exact_values() {
        // 1280x720, width 640: 640 / (1280/720) = 360; 360/16 = 22.5 rounds
        // half away from zero to 23, so 368.
        let r = fit_to_width(src_16_9(), 640);
        assert_eq!(r.scale, Dimensions::new(640, 368));

        // 4:3 source, width 640: height 480 is already a multiple of 16.
        let r = fit_to_width(Dimensions::new(640, 480), 640);
        assert_eq!(r.scale, Dimensions::new(640, 480));
    }

    #[test]
    fn letterbox_clamps_overflowing_axis() {
        // Wide source into a 4:3 canvas: width-fit wins, height clamped.
        let r = letterbox(src_16_9(), Dimensions::new(640, 480));
        assert_eq!(r.letterbox, Some(Dimensions::new(640, 480)));
        assert_eq!(r.scale.width, 640);
        assert!(r.scale.height <= 480);

        // Tall source into a wide canvas: height-fit wins.
        let r = letterbox(Dimensions::new(480, 640), Dimensions::new(640, 360));
        assert_eq!(r.letterbox, Some(Dimensions::new(640, 360)));
        assert_eq!(r.scale.height, 360);
        assert!(r.scale.width <= 640);
    }

    #[test]
    fn scale_and_pad_yields_even_dimensions() {
        for (tw, th) in [(641, 481), (640, 360), (333, 257)] {
            let r = scale_and_pad(src_16_9(), Dimensions::new(tw, th));
            assert_eq!(r.scale.width % 2, 0);
            assert_eq!(r.scale.height % 2, 0);
            if let Some(lb) = r.letterbox {
                assert_eq!(lb.width % 2, 0);
                assert_eq!(lb.height % 2, 0);
            }
        }
    }

    #[test]
    fn scale_and_pad_exact_fit_has_no_letterbox() {
        // 16:9 source into a 16:9 target: 640 / (16/9) = 360 exactly.
        let r = scale_and_pad(src_16_9(), Dimensions::new(640, 360));
        assert_eq!(r.scale, Dimensions::new(640, 360));
        assert!(r.letterbox.is_none());
    }

    #[test]
    fn scale_and_pad_short_content_gets_letterbox() {
        // Wide source into a 4:3 canvas: content is shorter than the canvas.
        let r = scale_and_pad(src_16_9(), Dimensions::new(640, 480));
        assert_eq!(r.scale, Dimensions::new(640, 360));
        assert_eq!(r.letterbox, Some(Dimensions::new(640, 480)));
    }

    #[test]
    fn scale_and_pad_tall_content_refits_by_height() {
        // 4:3 source into a 16:9 target: width-fit would overflow the height,
        // so the width is re-derived from the inverse aspect.
        let r = scale_and_pad(Dimensions::new(640, 480), Dimensions::new(640, 360));
        assert_eq!(r.scale, Dimensions::new(480, 360));
        assert!(r.letterbox.is_none());
    }

    #[test]
    fn rounding_rules_diverge() {
        // The same nominal fit computed by both algorithms disagrees: the
        // fit policies snap to multiples of 16, scale-and-pad to even.
        let src = src_16_9();
        let fit = fit_to_width(src, 650);
        let pad = scale_and_pad(src, Dimensions::new(650, 10_000));
        // fit: 650/(16/9)=365 -> 368; pad: width evened to 650-0=650? 650 is
        // even, height 365 -> 364.
        assert_eq!(fit.scale.height, 368);
        assert_eq!(pad.scale.height, 364);
        assert_ne!(fit.scale.height, pad.scale.height);
    }

    #[test]
    fn degenerate_source_passthrough() {
        let r = scale_and_pad(Dimensions::new(0, 0), Dimensions::new(320, 240));
        assert_eq!(r.scale, Dimensions::new(320, 240));
        assert!(r.letterbox.is_none());
    }

    // -- option-driven selection ---------------------------------------------

    fn info(w: u32, h: u32) -> MediaInfo {
        MediaInfo {
            duration_ms: 19600,
            width: w,
            height: h,
            fps: Some(29.97),
        }
    }

    #[test]
    fn copy_mode_passes_source_through() {
        let opts = Options::new().with("resolution", "copy");
        let r = resolve_from_options(&opts, &info(1280, 720)).unwrap();
        assert_eq!(r.scale, Dimensions::new(1280, 720));
    }

    #[test]
    fn width_only_fits_to_width() {
        let opts = Options::new().with("width", "640");
        let r = resolve_from_options(&opts, &info(1280, 720)).unwrap();
        assert_eq!(r.scale.width, 640);
        assert_eq!(r.scale.height % 16, 0);
    }

    #[test]
    fn both_dimensions_are_literal() {
        let opts = Options::new().with("width", "640").with("height", "360");
        let r = resolve_from_options(&opts, &info(1280, 720)).unwrap();
        assert_eq!(r.scale, Dimensions::new(640, 360));
        assert!(r.letterbox.is_none());
    }

    #[test]
    fn letterbox_mode_reports_canvas() {
        let opts = Options::new()
            .with("resolution", "letterbox")
            .with("width", "640")
            .with("height", "480");
        let r = resolve_from_options(&opts, &info(1280, 720)).unwrap();
        assert_eq!(r.letterbox, Some(Dimensions::new(640, 480)));
    }

    #[test]
    fn invalid_width_is_parameter_error() {
        let opts = Options::new().with("resolution", "width").with("width", "abc");
        match resolve_from_options(&opts, &info(1280, 720)) {
            Err(Error::Parameter(msg)) => assert!(msg.contains("'abc'")),
            other => panic!("expected Parameter error, got {other:?}"),
        }
    }

    #[test]
    fn missing_width_is_parameter_error() {
        let opts = Options::new().with("resolution", "width");
        assert!(resolve_from_options(&opts, &info(1280, 720)).is_err());
    }

    #[test]
    fn no_options_copies_source() {
        let opts = Options::new();
        let r = resolve_from_options(&opts, &info(320, 240)).unwrap();
        assert_eq!(r.scale, Dimensions::new(320, 240));
    }
}
