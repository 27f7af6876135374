//! Run-length encoded scanlines.
//!
//! An RLE scanline starts with the marker `2 2 hi lo` (`hi << 8 | lo` is the
//! width), followed by the R, G, B and E channels of the whole scanline, each
//! compressed on its own. A channel is a sequence of tokens:
//!
//! - `128 + n, value`: `value` repeated `n` times (`1..=127`)
//! - `n, bytes...`: `n` literal bytes (`1..=128`)

use std::io::{Read, Write};

use tracing::trace;

use crate::color::{float_to_rgbe, rgbe_to_float, Rgbe};
use crate::flat::read_quad;
use crate::{HdrError, Result};

/// Narrowest scanline that is run-length encoded.
pub const RLE_MIN_WIDTH: usize = 8;
/// Widest scanline the 15-bit width of the marker can describe.
pub const RLE_MAX_WIDTH: usize = 0x7fff;

/// Runs shorter than this are cheaper as literals.
const MIN_RUN_LENGTH: usize = 4;
const MAX_RUN_LENGTH: usize = 127;
const MAX_LITERAL_LENGTH: usize = 128;
const RUN_FLAG: u8 = 128;
const CHANNELS: usize = 4;

/// Returns true if scanlines of this width are run-length encoded.
#[inline]
pub fn rle_allowed(width: usize) -> bool {
    (RLE_MIN_WIDTH..=RLE_MAX_WIDTH).contains(&width)
}

/// What the first four bytes of a scanline turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanlineStart {
    /// A valid RLE marker; the channel tokens follow.
    Rle,
    /// Not a marker. The quad is the first pixel of flat data.
    Literal(Rgbe),
}

/// Planar byte buffer for one scanline: R, G, B and E planes of `width` bytes.
pub struct ScanlineBuffer {
    width: usize,
    bytes: Vec<u8>,
}

impl ScanlineBuffer {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            bytes: vec![0; CHANNELS * width],
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    fn plane_mut(&mut self, channel: usize) -> &mut [u8] {
        let start = channel * self.width;
        &mut self.bytes[start..start + self.width]
    }

    fn planes(&self) -> impl Iterator<Item = &[u8]> {
        self.bytes.chunks_exact(self.width)
    }

    /// Convert pixels to RGBE and split them into the four planes.
    fn deinterleave(&mut self, pixels: &[[f32; 3]]) {
        let (r, rest) = self.bytes.split_at_mut(self.width);
        let (g, rest) = rest.split_at_mut(self.width);
        let (b, e) = rest.split_at_mut(self.width);
        for (i, &pixel) in pixels.iter().enumerate() {
            let rgbe = float_to_rgbe(pixel);
            r[i] = rgbe.r;
            g[i] = rgbe.g;
            b[i] = rgbe.b;
            e[i] = rgbe.e;
        }
    }

    /// Zip the four planes back into pixels and append them to `out`.
    fn interleave_into(&self, out: &mut Vec<[f32; 3]>) {
        let w = self.width;
        out.extend((0..w).map(|i| {
            rgbe_to_float(Rgbe::new(
                self.bytes[i],
                self.bytes[i + w],
                self.bytes[i + 2 * w],
                self.bytes[i + 3 * w],
            ))
        }));
    }
}

/// Read the four bytes that open a scanline and classify them.
///
/// A marker whose width differs from `width` is a format error.
pub fn read_scanline_start<R: Read>(reader: &mut R, width: usize) -> Result<ScanlineStart> {
    let quad = read_quad(reader)?;
    if quad.r != 2 || quad.g != 2 || quad.b & 0x80 != 0 {
        return Ok(ScanlineStart::Literal(quad));
    }
    let declared = usize::from(quad.b) << 8 | usize::from(quad.e);
    if declared != width {
        return Err(HdrError::format(format!(
            "wrong scanline width: expected {width}, found {declared}"
        )));
    }
    Ok(ScanlineStart::Rle)
}

/// Decode the channel tokens of one scanline (the marker is already consumed)
/// and append its pixels to `out`.
pub fn read_rle_scanline<R: Read>(
    reader: &mut R,
    buffer: &mut ScanlineBuffer,
    out: &mut Vec<[f32; 3]>,
) -> Result<()> {
    for channel in 0..CHANNELS {
        read_rle_plane(reader, buffer.plane_mut(channel))?;
    }
    buffer.interleave_into(out);
    Ok(())
}

/// Fill `plane` exactly from run and literal tokens.
pub fn read_rle_plane<R: Read>(reader: &mut R, plane: &mut [u8]) -> Result<()> {
    let mut index = 0;
    while index < plane.len() {
        let mut token = [0u8; 2];
        reader.read_exact(&mut token).map_err(HdrError::Read)?;
        let [count, value] = token;
        let remaining = plane.len() - index;

        if count > RUN_FLAG {
            let len = usize::from(count - RUN_FLAG);
            if len > remaining {
                return Err(HdrError::format(format!(
                    "bad scanline data: run of {len} with {remaining} bytes left"
                )));
            }
            plane[index..index + len].fill(value);
            index += len;
        } else {
            let len = usize::from(count);
            if len == 0 || len > remaining {
                return Err(HdrError::format(format!(
                    "bad scanline data: literal of {len} with {remaining} bytes left"
                )));
            }
            plane[index] = value;
            reader
                .read_exact(&mut plane[index + 1..index + len])
                .map_err(HdrError::Read)?;
            index += len;
        }
    }
    Ok(())
}

/// Encode one scanline: marker, then each channel plane.
///
/// `pixels` must hold exactly `buffer.width()` pixels and the width must
/// pass [`rle_allowed`].
pub fn write_rle_scanline<W: Write>(
    writer: &mut W,
    pixels: &[[f32; 3]],
    buffer: &mut ScanlineBuffer,
) -> Result<()> {
    let width = buffer.width();
    if !rle_allowed(width) {
        return Err(HdrError::InvalidDimensions { width, height: 1 });
    }
    if pixels.len() != width {
        return Err(HdrError::BufferSizeMismatch {
            expected: width,
            actual: pixels.len(),
        });
    }
    let marker = [2, 2, (width >> 8) as u8, (width & 0xff) as u8];
    writer.write_all(&marker).map_err(HdrError::Write)?;

    buffer.deinterleave(pixels);
    for plane in buffer.planes() {
        write_rle_plane(writer, plane)?;
    }
    trace!(width, "encoded RLE scanline");
    Ok(())
}

/// Result of scanning forward for the next run worth a run token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RunSearch {
    /// Where the last measured run starts. Equals the data length if no
    /// qualifying run was found.
    start: usize,
    /// Length of the last measured run.
    len: usize,
    /// Length of the short run measured just before `start`.
    dangling: usize,
}

/// Number of bytes equal to `data[start]` from `start` on, capped at 127.
#[inline]
fn run_length_at(data: &[u8], start: usize) -> usize {
    match data.get(start) {
        Some(&first) => data[start..]
            .iter()
            .take(MAX_RUN_LENGTH)
            .take_while(|&&b| b == first)
            .count(),
        None => 0,
    }
}

/// Skip short runs from `cur` until a run of at least `MIN_RUN_LENGTH` starts
/// or the data ends.
fn find_next_run(data: &[u8], cur: usize) -> RunSearch {
    let mut start = cur;
    let mut len = 0;
    let mut dangling = 0;
    while len < MIN_RUN_LENGTH && start < data.len() {
        start += len;
        dangling = len;
        len = run_length_at(data, start);
    }
    RunSearch {
        start,
        len,
        dangling,
    }
}

/// Greedy run/literal encoding of one channel plane.
pub fn write_rle_plane<W: Write>(writer: &mut W, data: &[u8]) -> Result<()> {
    let mut cur = 0;
    while cur < data.len() {
        let run = find_next_run(data, cur);

        // the skipped bytes are a single short run: keep it as a run token
        if run.dangling > 1 && run.dangling == run.start - cur {
            write_token(writer, RUN_FLAG + run.dangling as u8, data[cur])?;
            cur = run.start;
        }

        for literal in data[cur..run.start].chunks(MAX_LITERAL_LENGTH) {
            writer
                .write_all(&[literal.len() as u8])
                .and_then(|_| writer.write_all(literal))
                .map_err(HdrError::Write)?;
        }
        cur = run.start;

        if run.len >= MIN_RUN_LENGTH {
            write_token(writer, RUN_FLAG + run.len as u8, data[run.start])?;
            cur += run.len;
        }
    }
    Ok(())
}

#[inline]
fn write_token<W: Write>(writer: &mut W, count: u8, value: u8) -> Result<()> {
    writer.write_all(&[count, value]).map_err(HdrError::Write)
}
