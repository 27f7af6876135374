//! # icy_hdr
//!
//! A 100% Rust library for encoding and decoding Radiance RGBE (`.hdr`) images.
//!
//! ## Features
//!
//! - **Decoder**: reads run-length encoded and flat scanlines, including files
//!   that switch to flat pixels part way through
//! - **Encoder**: per-channel run-length encoding for widths in `8..=32767`,
//!   flat pixels otherwise
//!
//! ## Quick Start
//!
//! ### Encoding floats to RGBE
//!
//! ```ignore
//! use icy_hdr::hdr_encode_default;
//!
//! let pixels = vec![[1.0f32, 0.5, 0.25]; 16 * 4];
//! let mut out = Vec::new();
//! hdr_encode_default(&mut out, 16, 4, &pixels)?;
//! ```
//!
//! ### Decoding RGBE to floats
//!
//! ```ignore
//! use icy_hdr::hdr_decode;
//! use std::{fs::File, io::BufReader};
//!
//! let image = hdr_decode(BufReader::new(File::open("studio.hdr")?))?;
//! println!("{}x{}", image.width, image.height);
//! ```

use thiserror::Error;

pub mod color;
pub mod decoder;
pub mod encoder;
pub mod flat;
pub mod header;
pub mod rle;

pub use color::{float_to_rgbe, rgbe_to_float, Rgbe};
pub use decoder::{hdr_decode, hdr_decode_bytes, HdrImage};
pub use encoder::{hdr_encode, hdr_encode_default, hdr_encode_to_vec, EncodeOptions};
pub use rle::rle_allowed;

/// Errors that can occur during RGBE encoding or decoding.
#[derive(Debug, Error)]
pub enum HdrError {
    /// The underlying stream failed or ended before the image was complete
    #[error("RGBE read error: {0}")]
    Read(#[source] std::io::Error),

    /// The underlying stream rejected a write or flush
    #[error("RGBE write error: {0}")]
    Write(#[source] std::io::Error),

    /// The bytes do not follow the RGBE grammar
    #[error("RGBE bad file format: {0}")]
    Format(String),

    /// Invalid image dimensions (width or height is zero or too large)
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    /// Pixel buffer length doesn't match width * height
    #[error("buffer size mismatch: expected {expected} pixels, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// A header field can't be written without corrupting the header
    #[error("invalid header field: {0}")]
    InvalidMetadata(String),
}

impl HdrError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        HdrError::Format(msg.into())
    }
}

/// Result type for RGBE operations.
pub type Result<T> = core::result::Result<T, HdrError>;

/// Largest width or height accepted by the decoder and the encoder.
pub const HDR_DIMENSION_LIMIT: usize = 1 << 24;

/// Validates image dimensions and returns the pixel count.
pub(crate) fn pixel_count(width: usize, height: usize) -> Option<usize> {
    if width == 0 || height == 0 || width > HDR_DIMENSION_LIMIT || height > HDR_DIMENSION_LIMIT {
        return None;
    }
    width.checked_mul(height)
}
