//! The text header in front of the pixel data.
//!
//! ```text
//! #?RGBE
//! FORMAT=32-bit_rle_rgbe
//! EXPOSURE=1.0
//!
//! -Y 480 +X 640
//! ```

use std::io::{BufRead, Read, Write};

use tracing::debug;

use crate::{pixel_count, HdrError, Result};

pub const MAGIC_PREFIX: &str = "#?";
pub const DEFAULT_PROGRAM_TYPE: &str = "RGBE";
pub const FORMAT_LINE: &str = "FORMAT=32-bit_rle_rgbe";
/// Longest header line accepted, newline included.
pub const MAX_HEADER_LINE: usize = 4096;

/// Everything the header says about the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HdrHeader {
    pub width: usize,
    pub height: usize,
    /// Text after `#?` on the first line.
    pub program_type: String,
    /// Header lines other than `FORMAT=`, in file order.
    pub metadata: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderState {
    ExpectMagic,
    ExpectMetadataLine,
    ExpectResolutionLine,
}

/// Read one `\n` terminated line without the terminator (and without a `\r`
/// in front of it).
fn read_header_line<R: BufRead>(reader: &mut R) -> Result<String> {
    let mut line = Vec::new();
    Read::take(&mut *reader, MAX_HEADER_LINE as u64)
        .read_until(b'\n', &mut line)
        .map_err(HdrError::Read)?;

    if line.last() != Some(&b'\n') {
        if line.len() >= MAX_HEADER_LINE {
            return Err(HdrError::format("header line too long"));
        }
        return Err(HdrError::Read(std::io::ErrorKind::UnexpectedEof.into()));
    }
    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Ok(String::from_utf8_lossy(&line).into_owned())
}

/// Parse the header and leave `reader` at the first scanline byte.
pub fn read_header<R: BufRead>(reader: &mut R) -> Result<HdrHeader> {
    let mut state = HeaderState::ExpectMagic;
    let mut program_type = String::new();
    let mut metadata = Vec::new();
    let mut has_format = false;

    loop {
        let line = read_header_line(reader)?;
        match state {
            HeaderState::ExpectMagic => {
                let Some(rest) = line.strip_prefix(MAGIC_PREFIX) else {
                    return Err(HdrError::format("bad initial token"));
                };
                program_type = rest.trim().to_string();
                state = HeaderState::ExpectMetadataLine;
            }
            HeaderState::ExpectMetadataLine => {
                if line.is_empty() || line.starts_with('\0') {
                    if !has_format {
                        return Err(HdrError::format("no FORMAT specifier found"));
                    }
                    state = HeaderState::ExpectResolutionLine;
                } else if line == FORMAT_LINE {
                    has_format = true;
                } else {
                    metadata.push(line);
                }
            }
            HeaderState::ExpectResolutionLine => {
                let Some((width, height)) = parse_resolution(&line) else {
                    return Err(HdrError::format(format!(
                        "missing image size specifier: {line:?}"
                    )));
                };
                debug!(width, height, program_type = %program_type, "parsed RGBE header");
                return Ok(HdrHeader {
                    width,
                    height,
                    program_type,
                    metadata,
                });
            }
        }
    }
}

/// Parse `-Y <height> +X <width>`; dimensions must be positive and inside the
/// decoder limits.
fn parse_resolution(line: &str) -> Option<(usize, usize)> {
    let mut parts = line.split_ascii_whitespace();
    if parts.next()? != "-Y" {
        return None;
    }
    let height: usize = parts.next()?.parse().ok()?;
    if parts.next()? != "+X" {
        return None;
    }
    let width: usize = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    pixel_count(width, height)?;
    Some((width, height))
}

/// Reject header fields that would break the line structure.
pub(crate) fn validate_fields(program_type: &str, metadata: &[String]) -> Result<()> {
    if program_type.chars().any(char::is_whitespace) {
        return Err(HdrError::InvalidMetadata(format!(
            "program type {program_type:?} contains whitespace"
        )));
    }
    for line in metadata {
        if line.is_empty() || line.starts_with('\0') || line.contains(['\n', '\r']) {
            return Err(HdrError::InvalidMetadata(format!(
                "metadata line {line:?} is empty or contains a line break"
            )));
        }
        if line == FORMAT_LINE {
            return Err(HdrError::InvalidMetadata(
                "FORMAT is written by the encoder".to_string(),
            ));
        }
    }
    Ok(())
}

/// Write the header for a `width` x `height` image.
pub fn write_header<W: Write>(
    writer: &mut W,
    width: usize,
    height: usize,
    program_type: &str,
    metadata: &[String],
) -> Result<()> {
    validate_fields(program_type, metadata)?;

    let mut text = format!("{MAGIC_PREFIX}{program_type}\n");
    for line in metadata {
        text.push_str(line);
        text.push('\n');
    }
    text.push_str(FORMAT_LINE);
    text.push_str("\n\n");
    text.push_str(&format!("-Y {height} +X {width}\n"));

    writer.write_all(text.as_bytes()).map_err(HdrError::Write)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(text: &[u8]) -> Result<HdrHeader> {
        read_header(&mut Cursor::new(text))
    }

    #[test]
    fn test_parse_minimal() {
        let header = parse(b"#?RGBE\nFORMAT=32-bit_rle_rgbe\n\n-Y 3 +X 5\n").unwrap();
        assert_eq!(
            header,
            HdrHeader {
                width: 5,
                height: 3,
                program_type: "RGBE".to_string(),
                metadata: Vec::new(),
            }
        );
    }

    #[test]
    fn test_parse_radiance_with_metadata() {
        let text = b"#?RADIANCE\n# made with rpict\nEXPOSURE=2.0\nFORMAT=32-bit_rle_rgbe\n\n-Y 1 +X 1\nrest";
        let mut reader = Cursor::new(&text[..]);
        let header = read_header(&mut reader).unwrap();
        assert_eq!(header.program_type, "RADIANCE");
        assert_eq!(header.metadata, vec!["# made with rpict", "EXPOSURE=2.0"]);

        let mut rest = String::new();
        reader.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "rest");
    }

    #[test]
    fn test_parse_crlf() {
        let header = parse(b"#?RGBE\r\nFORMAT=32-bit_rle_rgbe\r\n\r\n-Y 2 +X 4\r\n").unwrap();
        assert_eq!((header.width, header.height), (4, 2));
    }

    #[test]
    fn test_program_type_trailing_whitespace() {
        let header = parse(b"#?RADIANCE \t\nFORMAT=32-bit_rle_rgbe\n\n-Y 2 +X 4\n").unwrap();
        assert_eq!(header.program_type, "RADIANCE");
        validate_fields(&header.program_type, &header.metadata).unwrap();
    }

    #[test]
    fn test_line_after_header_left_unread() {
        let mut reader = Cursor::new(&b"#?RGBE\nFORMAT=32-bit_rle_rgbe\n\n-Y 1 +X 1\n\x80\x80\x80\x81"[..]);
        read_header(&mut reader).unwrap();
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, vec![0x80, 0x80, 0x80, 0x81]);
    }

    #[test]
    fn test_bad_magic() {
        let err = parse(b"P6\nFORMAT=32-bit_rle_rgbe\n\n-Y 2 +X 4\n").unwrap_err();
        assert!(matches!(err, HdrError::Format(_)), "{err}");
    }

    #[test]
    fn test_missing_format() {
        let err = parse(b"#?RGBE\nGAMMA=1.0\n\n-Y 2 +X 4\n").unwrap_err();
        assert!(matches!(err, HdrError::Format(_)), "{err}");

        let err = parse(b"#?RGBE\nFORMAT=32-bit_rle_xyze\n\n-Y 2 +X 4\n").unwrap_err();
        assert!(matches!(err, HdrError::Format(_)), "{err}");
    }

    #[test]
    fn test_bad_resolution() {
        for line in [
            "+Y 2 +X 4",
            "-Y 2 -X 4",
            "-Y two +X 4",
            "-Y 2 +X",
            "-Y -2 +X 4",
            "-Y 0 +X 4",
            "-Y 2 +X 0",
            "-Y 2 +X 4 5",
            "",
        ] {
            let text = format!("#?RGBE\nFORMAT=32-bit_rle_rgbe\n\n{line}\n");
            let err = parse(text.as_bytes()).unwrap_err();
            assert!(matches!(err, HdrError::Format(_)), "{line:?}: {err}");
        }
    }

    #[test]
    fn test_oversized_dimensions() {
        let text = format!(
            "#?RGBE\nFORMAT=32-bit_rle_rgbe\n\n-Y 1 +X {}\n",
            crate::HDR_DIMENSION_LIMIT + 1
        );
        let err = parse(text.as_bytes()).unwrap_err();
        assert!(matches!(err, HdrError::Format(_)), "{err}");
    }

    #[test]
    fn test_truncated_header() {
        for text in [
            &b""[..],
            b"#?RG",
            b"#?RGBE\nFORMAT=32-bit_rle_rgbe\n",
            b"#?RGBE\nFORMAT=32-bit_rle_rgbe\n\n-Y 2 +X 4",
        ] {
            let err = parse(text).unwrap_err();
            assert!(matches!(err, HdrError::Read(_)), "{text:?}: {err}");
        }
    }

    #[test]
    fn test_line_too_long() {
        let mut text = b"#?RGBE\n".to_vec();
        text.extend(std::iter::repeat(b'#').take(MAX_HEADER_LINE + 10));
        text.push(b'\n');
        let err = parse(&text).unwrap_err();
        assert!(matches!(err, HdrError::Format(_)), "{err}");
    }

    #[test]
    fn test_write_header() {
        let mut out = Vec::new();
        write_header(&mut out, 640, 480, "RADIANCE", &["EXPOSURE=1.5".to_string()]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "#?RADIANCE\nEXPOSURE=1.5\nFORMAT=32-bit_rle_rgbe\n\n-Y 480 +X 640\n"
        );
    }

    #[test]
    fn test_write_rejects_broken_fields() {
        let mut out = Vec::new();
        for (program, metadata) in [
            ("RGBE", vec!["A=1\nB=2".to_string()]),
            ("RGBE", vec![String::new()]),
            ("RGBE", vec![FORMAT_LINE.to_string()]),
            ("MY TOOL", vec![]),
        ] {
            let err = write_header(&mut out, 1, 1, program, &metadata).unwrap_err();
            assert!(matches!(err, HdrError::InvalidMetadata(_)), "{err}");
        }
        assert!(out.is_empty());
    }
}
