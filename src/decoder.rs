use std::io::{BufRead, Cursor};

use tracing::{debug, warn};

use crate::color::rgbe_to_float;
use crate::flat::read_flat_pixels;
use crate::header::read_header;
use crate::rle::{read_rle_scanline, read_scanline_start, rle_allowed, ScanlineBuffer, ScanlineStart};
use crate::{pixel_count, HdrError, Result};

/// A decoded RGBE image.
///
/// Pixels are linear RGB triples in row-major order, top scanline first.
#[derive(Debug, Clone, PartialEq)]
pub struct HdrImage {
    /// Linear RGB pixels, `width * height` of them
    pub pixels: Vec<[f32; 3]>,
    /// Image width in pixels
    pub width: usize,
    /// Image height in pixels
    pub height: usize,
    /// Text after `#?` on the first header line, usually `RGBE` or `RADIANCE`
    pub program_type: String,
    /// Header lines other than `FORMAT=`, in file order
    pub metadata: Vec<String>,
}

impl HdrImage {
    /// Combined exposure from all `EXPOSURE=` header lines.
    ///
    /// Radiance multiplies successive exposures; lines that don't parse are
    /// skipped. Returns `1.0` when there are none.
    pub fn exposure(&self) -> f32 {
        self.metadata
            .iter()
            .filter_map(|line| line.strip_prefix("EXPOSURE="))
            .filter_map(|value| value.trim().parse::<f32>().ok())
            .product()
    }

    /// The pixels as one interleaved `r, g, b, r, g, b, ...` buffer.
    pub fn to_flat(&self) -> Vec<f32> {
        self.pixels.iter().flatten().copied().collect()
    }
}

/// How the remaining scanlines are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanlineMode {
    Rle,
    /// Flat pixels until the end of the image.
    Flat,
}

/// Decode an RGBE image from a buffered reader.
///
/// Scanlines are run-length decoded when the width allows it. If a scanline
/// does not start with an RLE marker, its first four bytes are taken as a
/// pixel and everything after it is read as flat pixels.
pub fn hdr_decode<R: BufRead>(mut reader: R) -> Result<HdrImage> {
    let header = read_header(&mut reader)?;
    let (width, height) = (header.width, header.height);
    let total = pixel_count(width, height)
        .ok_or_else(|| HdrError::format(format!("invalid dimensions {width}x{height}")))?;

    let mut mode = if rle_allowed(width) {
        ScanlineMode::Rle
    } else {
        ScanlineMode::Flat
    };
    debug!(width, height, ?mode, "decoding scanlines");

    // grows per scanline so a lying header can't force a huge allocation
    let mut pixels: Vec<[f32; 3]> = Vec::new();
    let mut buffer = ScanlineBuffer::new(if mode == ScanlineMode::Rle { width } else { 0 });

    while pixels.len() < total {
        match mode {
            ScanlineMode::Rle => match read_scanline_start(&mut reader, width)? {
                ScanlineStart::Rle => {
                    pixels.reserve(width);
                    read_rle_scanline(&mut reader, &mut buffer, &mut pixels)?;
                }
                ScanlineStart::Literal(quad) => {
                    warn!(
                        scanline = pixels.len() / width,
                        "scanline is not run-length encoded, reading the rest flat"
                    );
                    pixels.push(rgbe_to_float(quad));
                    mode = ScanlineMode::Flat;
                }
            },
            ScanlineMode::Flat => {
                read_flat_pixels(&mut reader, total - pixels.len(), &mut pixels)?;
            }
        }
    }

    Ok(HdrImage {
        pixels,
        width,
        height,
        program_type: header.program_type,
        metadata: header.metadata,
    })
}

/// Decode an RGBE image held in memory.
pub fn hdr_decode_bytes(data: &[u8]) -> Result<HdrImage> {
    hdr_decode(Cursor::new(data))
}
