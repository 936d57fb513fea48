// src/error.rs
//
// Unified error handling for bitmap-shim
// Uses thiserror for simple, type-safe error handling
//
// Error taxonomy follows the bitmap-creation contract:
// - Argument errors (count, enum, range) surface synchronously from parsing
// - Source-state errors may also surface through the pending async result
// - Allocation/decode/native failures come from collaborators

use std::borrow::Cow;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = BitmapError> = std::result::Result<T, E>;

/// bitmap-shim error types
///
/// All errors are type-safe and provide clear, actionable messages.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BitmapError {
    #[error("{count} is not a valid argument count for any overload")]
    InvalidArgumentCount { count: usize },

    #[error("'{value}' is not a valid value for enumeration {enumeration}")]
    InvalidEnumValue {
        value: Cow<'static, str>,
        enumeration: &'static str,
    },

    #[error("Invalid value for {name}: {value}. {reason}")]
    InvalidRange {
        name: &'static str,
        value: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    #[error("Provided image source was in an invalid state: {message}")]
    InvalidSourceState { message: Cow<'static, str> },

    #[error(
        "Source could not be converted to any of: drawable element, encoded blob, raw pixel buffer"
    )]
    UnsupportedSource,

    #[error("The bitmap could not be allocated ({width}x{height})")]
    AllocationFailure { width: u32, height: u32 },

    #[error("Failed to decode image data: {message}")]
    DecodeFailed { message: Cow<'static, str> },

    #[error("Native bitmap creation failed: {message}")]
    NativeFailed { message: Cow<'static, str> },

    #[error("Internal error: {message}")]
    Internal { message: Cow<'static, str> },
}

// Constructor Helpers
impl BitmapError {
    pub fn invalid_argument_count(count: usize) -> Self {
        Self::InvalidArgumentCount { count }
    }

    pub fn invalid_enum_value(
        value: impl Into<Cow<'static, str>>,
        enumeration: &'static str,
    ) -> Self {
        Self::InvalidEnumValue {
            value: value.into(),
            enumeration,
        }
    }

    pub fn invalid_range(
        name: &'static str,
        value: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidRange {
            name,
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_source_state(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidSourceState {
            message: message.into(),
        }
    }

    /// The generic "image was in an invalid state" condition raised for
    /// zero-sized or otherwise unusable sources.
    pub fn invalid_image_state() -> Self {
        Self::invalid_source_state("provided image reports no usable pixels")
    }

    pub fn unsupported_source() -> Self {
        Self::UnsupportedSource
    }

    pub fn allocation_failure(width: u32, height: u32) -> Self {
        Self::AllocationFailure { width, height }
    }

    pub fn decode_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn native_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::NativeFailed {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
