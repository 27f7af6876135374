//! Uncompressed RGBE pixels, four bytes each.

use std::io::{Read, Write};

use crate::color::{float_to_rgbe, rgbe_to_float, Rgbe};
use crate::{HdrError, Result};

/// Read one raw RGBE quad.
#[inline]
pub(crate) fn read_quad<R: Read>(reader: &mut R) -> Result<Rgbe> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).map_err(HdrError::Read)?;
    Ok(buf.into())
}

/// Read `count` flat pixels and append them to `out`.
pub fn read_flat_pixels<R: Read>(
    reader: &mut R,
    count: usize,
    out: &mut Vec<[f32; 3]>,
) -> Result<()> {
    for _ in 0..count {
        out.push(rgbe_to_float(read_quad(reader)?));
    }
    Ok(())
}

/// Write every pixel as a raw RGBE quad.
pub fn write_flat_pixels<W: Write>(writer: &mut W, pixels: &[[f32; 3]]) -> Result<()> {
    for &pixel in pixels {
        let quad: [u8; 4] = float_to_rgbe(pixel).into();
        writer.write_all(&quad).map_err(HdrError::Write)?;
    }
    Ok(())
}
