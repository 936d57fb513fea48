// src/options.rs
//
// Option enums, crop rectangle, and call-argument parsing/validation.
//
// Validation is deliberately strict: values outside their enumeration or
// range fail loudly instead of being silently coerced to defaults.

use crate::capabilities::Capabilities;
use crate::error::{BitmapError, Result};
use std::str::FromStr;

/// Resize quality hint applied by the compositing draw step.
///
/// `Pixelated` disables smoothing entirely; the other three select a
/// smoothing-quality level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeQuality {
    Pixelated,
    Low,
    Medium,
    High,
}

impl ResizeQuality {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pixelated => "pixelated",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl FromStr for ResizeQuality {
    type Err = BitmapError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "pixelated" => Ok(Self::Pixelated),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(BitmapError::invalid_enum_value(
                other.to_string(),
                "ResizeQuality",
            )),
        }
    }
}

/// Orientation hint: keep rows as-is or mirror them about the vertical midline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageOrientation {
    None,
    FlipY,
}

impl ImageOrientation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::FlipY => "flipY",
        }
    }
}

impl FromStr for ImageOrientation {
    type Err = BitmapError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "none" => Ok(Self::None),
            "flipY" => Ok(Self::FlipY),
            other => Err(BitmapError::invalid_enum_value(
                other.to_string(),
                "ImageOrientation",
            )),
        }
    }
}

/// Pass-through only: probed and forwarded to the native primitive, never
/// polyfilled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PremultiplyAlpha {
    None,
    Premultiply,
    Default,
}

impl FromStr for PremultiplyAlpha {
    type Err = BitmapError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "none" => Ok(Self::None),
            "premultiply" => Ok(Self::Premultiply),
            "default" => Ok(Self::Default),
            other => Err(BitmapError::invalid_enum_value(
                other.to_string(),
                "PremultiplyAlpha",
            )),
        }
    }
}

/// Pass-through only, like [`PremultiplyAlpha`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorSpaceConversion {
    None,
    Default,
}

impl FromStr for ColorSpaceConversion {
    type Err = BitmapError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "none" => Ok(Self::None),
            "default" => Ok(Self::Default),
            other => Err(BitmapError::invalid_enum_value(
                other.to_string(),
                "ColorSpaceConversion",
            )),
        }
    }
}

/// Requested source rectangle. Negative `sw`/`sh` mean the rectangle extends
/// backward from its origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRect {
    pub sx: i32,
    pub sy: i32,
    pub sw: i32,
    pub sh: i32,
}

impl CropRect {
    pub fn new(sx: i32, sy: i32, sw: i32, sh: i32) -> Self {
        Self { sx, sy, sw, sh }
    }
}

/// The raw options record accepted by `create_image_bitmap`.
///
/// Resize dimensions stay `f64` here so that non-finite and negative inputs
/// can be rejected explicitly during parsing rather than being silently
/// unrepresentable.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BitmapOptions {
    pub resize_width: Option<f64>,
    pub resize_height: Option<f64>,
    pub resize_quality: Option<ResizeQuality>,
    pub image_orientation: Option<ImageOrientation>,
    pub premultiply_alpha: Option<PremultiplyAlpha>,
    pub color_space_conversion: Option<ColorSpaceConversion>,
}

impl BitmapOptions {
    /// Capability tags for every option key present in this record.
    /// Used by the dispatch policy to match keys against the missing set.
    pub fn present_keys(&self) -> Capabilities {
        let mut keys = Capabilities::empty();
        if self.resize_width.is_some() {
            keys |= Capabilities::RESIZE_WIDTH;
        }
        if self.resize_height.is_some() {
            keys |= Capabilities::RESIZE_HEIGHT;
        }
        if self.resize_quality.is_some() {
            keys |= Capabilities::RESIZE_QUALITY;
        }
        if self.image_orientation.is_some() {
            keys |= Capabilities::IMAGE_ORIENTATION;
        }
        if self.premultiply_alpha.is_some() {
            keys |= Capabilities::PREMULTIPLY_ALPHA;
        }
        if self.color_space_conversion.is_some() {
            keys |= Capabilities::COLOR_SPACE_CONVERSION;
        }
        keys
    }
}

/// Options after range validation, ready for the geometry engine.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ResolvedOptions {
    pub resize_width: Option<u32>,
    pub resize_height: Option<u32>,
    pub quality: Option<ResizeQuality>,
    pub flip_y: bool,
}

/// One raw call argument following the source. Models the wire-level
/// argument vector whose arity the contract constrains to 1, 2, 5 or 6
/// total arguments (source included).
#[derive(Clone, Debug)]
pub enum CallArg {
    Num(f64),
    Options(BitmapOptions),
}

/// A fully parsed and validated invocation.
#[derive(Clone, Debug)]
pub struct ParsedCall {
    pub crop: Option<CropRect>,
    pub options: BitmapOptions,
    pub resolved: ResolvedOptions,
    /// Total argument count including the source. Drives the
    /// adjusted-passthrough argument stripping (counts 2 and 6 end in an
    /// options record).
    pub arity: usize,
}

/// IDL-style long conversion: non-finite values are unrepresentable,
/// everything else truncates and wraps modulo 2^32 into the signed range.
fn convert_to_long(value: f64) -> Option<i32> {
    if !value.is_finite() {
        return None;
    }
    let wrapped = value.trunc().rem_euclid(4_294_967_296.0);
    Some(wrapped as u32 as i32)
}

/// EnforceRange validation for resize dimensions: finite, positive, within
/// the unsigned 32-bit range. Zero is rejected because an explicit zero
/// destination extent is never satisfiable.
fn enforce_dimension(name: &'static str, value: f64) -> Result<u32> {
    if !value.is_finite() {
        return Err(BitmapError::invalid_range(
            name,
            value.to_string(),
            "must be a finite number",
        ));
    }
    let truncated = value.trunc();
    if truncated <= 0.0 {
        return Err(BitmapError::invalid_range(
            name,
            value.to_string(),
            "must be a positive nonzero integer",
        ));
    }
    if truncated > u32::MAX as f64 {
        return Err(BitmapError::invalid_range(
            name,
            value.to_string(),
            "exceeds the unsigned 32-bit range",
        ));
    }
    Ok(truncated as u32)
}

fn resolve_options(options: &BitmapOptions) -> Result<ResolvedOptions> {
    let resize_width = options
        .resize_width
        .map(|v| enforce_dimension("resizeWidth", v))
        .transpose()?;
    let resize_height = options
        .resize_height
        .map(|v| enforce_dimension("resizeHeight", v))
        .transpose()?;

    Ok(ResolvedOptions {
        resize_width,
        resize_height,
        quality: options.resize_quality,
        flip_y: options.image_orientation == Some(ImageOrientation::FlipY),
    })
}

/// Parse the argument vector following the source.
///
/// Valid shapes (total arity, source included):
/// - 1: source alone
/// - 2: source + options record
/// - 5: source + 4-number crop rectangle
/// - 6: source + 4-number crop rectangle + options record
///
/// Invalid crop `sx`/`sy` values are treated as 0; an absent, zero or
/// non-finite crop extent is an error.
pub fn parse_call(args: &[CallArg]) -> Result<ParsedCall> {
    let arity = args.len() + 1;
    if !matches!(arity, 1 | 2 | 5 | 6) {
        return Err(BitmapError::invalid_argument_count(arity));
    }

    let mut crop = None;
    if arity >= 5 {
        let mut nums = [0.0f64; 4];
        for (slot, arg) in nums.iter_mut().zip(&args[..4]) {
            match arg {
                CallArg::Num(n) => *slot = *n,
                CallArg::Options(_) => {
                    return Err(BitmapError::invalid_argument_count(arity));
                }
            }
        }
        let sw = convert_to_long(nums[2]).filter(|&v| v != 0).ok_or_else(|| {
            BitmapError::invalid_range(
                "sw",
                nums[2].to_string(),
                "the crop rect width must be a nonzero finite value",
            )
        })?;
        let sh = convert_to_long(nums[3]).filter(|&v| v != 0).ok_or_else(|| {
            BitmapError::invalid_range(
                "sh",
                nums[3].to_string(),
                "the crop rect height must be a nonzero finite value",
            )
        })?;
        let sx = convert_to_long(nums[0]).unwrap_or(0);
        let sy = convert_to_long(nums[1]).unwrap_or(0);
        crop = Some(CropRect::new(sx, sy, sw, sh));
    }

    let mut options = BitmapOptions::default();
    if arity == 2 || arity == 6 {
        match args.last() {
            Some(CallArg::Options(record)) => options = record.clone(),
            _ => return Err(BitmapError::invalid_argument_count(arity)),
        }
    }

    let resolved = resolve_options(&options)?;

    Ok(ParsedCall {
        crop,
        options,
        resolved,
        arity,
    })
}
