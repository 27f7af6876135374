//! RGBE encoder.
//!
//! Scanlines between 8 and 32767 pixels wide are written with per-channel
//! run-length encoding; all other widths are written as flat RGBE quads.

use std::io::{BufWriter, Write};

use tracing::debug;

use crate::flat::write_flat_pixels;
use crate::header::{validate_fields, write_header, DEFAULT_PROGRAM_TYPE};
use crate::rle::{rle_allowed, write_rle_scanline, ScanlineBuffer};
use crate::{pixel_count, HdrError, Result};

/// Options for the RGBE encoder.
#[derive(Clone, Debug)]
pub struct EncodeOptions {
    /// Run-length encode scanlines when the width allows it.
    ///
    /// With `false` every scanline is written flat, which is larger but
    /// readable by decoders that only understand flat pixels.
    pub use_rle: bool,

    /// Written after `#?` on the first header line.
    pub program_type: String,

    /// Extra header lines such as `EXPOSURE=1.0` or `# comment`, without
    /// newlines. `FORMAT=` is always written by the encoder.
    pub metadata: Vec<String>,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            use_rle: true,
            program_type: DEFAULT_PROGRAM_TYPE.to_string(),
            metadata: Vec::new(),
        }
    }
}

/// Encode linear RGB pixels as an RGBE image.
///
/// # Arguments
/// * `writer` - Destination stream; it is buffered internally and flushed
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
/// * `pixels` - `width * height` linear RGB triples, top scanline first
/// * `opts` - Encoding options
///
/// # Example
/// ```ignore
/// use icy_hdr::{hdr_encode, EncodeOptions};
///
/// let pixels = vec![[0.25f32, 0.5, 1.0]; 32 * 2];
/// let mut out = Vec::new();
/// hdr_encode(&mut out, 32, 2, &pixels, &EncodeOptions::default())?;
/// ```
pub fn hdr_encode<W: Write>(
    writer: W,
    width: usize,
    height: usize,
    pixels: &[[f32; 3]],
    opts: &EncodeOptions,
) -> Result<()> {
    let expected =
        pixel_count(width, height).ok_or(HdrError::InvalidDimensions { width, height })?;
    if pixels.len() != expected {
        return Err(HdrError::BufferSizeMismatch {
            expected,
            actual: pixels.len(),
        });
    }
    validate_fields(&opts.program_type, &opts.metadata)?;

    let mut writer = BufWriter::new(writer);
    write_header(
        &mut writer,
        width,
        height,
        &opts.program_type,
        &opts.metadata,
    )?;

    if opts.use_rle && rle_allowed(width) {
        debug!(width, height, "writing run-length encoded scanlines");
        let mut buffer = ScanlineBuffer::new(width);
        for scanline in pixels.chunks_exact(width) {
            write_rle_scanline(&mut writer, scanline, &mut buffer)?;
        }
    } else {
        debug!(width, height, "writing flat pixels");
        write_flat_pixels(&mut writer, pixels)?;
    }

    writer.flush().map_err(HdrError::Write)
}

/// Encode with default options.
pub fn hdr_encode_default<W: Write>(
    writer: W,
    width: usize,
    height: usize,
    pixels: &[[f32; 3]],
) -> Result<()> {
    hdr_encode(writer, width, height, pixels, &EncodeOptions::default())
}

/// Encode into a new byte vector.
pub fn hdr_encode_to_vec(
    width: usize,
    height: usize,
    pixels: &[[f32; 3]],
    opts: &EncodeOptions,
) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    hdr_encode(&mut out, width, height, pixels, opts)?;
    Ok(out)
}
