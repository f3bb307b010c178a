//! Fixed-width header fields and little-endian sample slots.
//!
//! Every byte the writer emits goes through this module. The reader decodes
//! with the matching functions, so the layout contract lives in one place.

use std::io::{self, Write};

use byteorder::{ByteOrder, LittleEndian};

use crate::types::FileFormat;

/// Writes `text` left-justified in a field of exactly `width` bytes
///
/// Longer text is truncated, shorter text is padded with spaces.
pub fn write_text<W: Write + ?Sized>(w: &mut W, text: &str, width: usize) -> io::Result<()> {
    let bytes = text.as_bytes();
    let len = bytes.len().min(width);
    w.write_all(&bytes[..len])?;
    write_blank(w, width - len)
}

/// Writes a left-justified decimal in a field of exactly `width` bytes
pub fn write_number<W, T>(w: &mut W, value: T, width: usize) -> io::Result<()>
where
    W: Write + ?Sized,
    T: std::fmt::Display,
{
    write_text(w, &format!("{:<width$}", value, width = width), width)
}

pub fn write_blank<W: Write + ?Sized>(w: &mut W, width: usize) -> io::Result<()> {
    const SPACES: [u8; 80] = [b' '; 80];

    let mut remaining = width;
    while remaining > 0 {
        let n = remaining.min(SPACES.len());
        w.write_all(&SPACES[..n])?;
        remaining -= n;
    }
    Ok(())
}

/// Formats a physical extreme for an 8-byte header field
///
/// Eight fraction digits are rendered and the text is cut to the field
/// width, so `-3.0` becomes `-3.00000` and `9999999.0` becomes `9999999.`.
pub fn physical_text(value: f64) -> String {
    let mut text = format!("{:.8}", value);
    text.truncate(8);
    text
}

/// Stores `value` into sample slot `slot` of a record buffer
///
/// EDF slots are 2-byte little-endian, BDF slots 3-byte little-endian
/// (low, mid, high byte). The value must already be clamped to the
/// format's digital range.
pub fn put_sample(buf: &mut [u8], slot: usize, value: i32, format: FileFormat) {
    let width = format.bytes_per_sample();
    let start = slot * width;
    let dst = &mut buf[start..start + width];
    match format {
        FileFormat::Edf => LittleEndian::write_i16(dst, value as i16),
        FileFormat::Bdf => LittleEndian::write_i24(dst, value),
    }
}

/// Reads the sample stored in slot `slot`, sign-extended to `i32`
pub fn get_sample(buf: &[u8], slot: usize, format: FileFormat) -> i32 {
    let width = format.bytes_per_sample();
    let start = slot * width;
    let src = &buf[start..start + width];
    match format {
        FileFormat::Edf => LittleEndian::read_i16(src) as i32,
        FileFormat::Bdf => LittleEndian::read_i24(src),
    }
}
