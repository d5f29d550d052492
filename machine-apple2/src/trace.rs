//! COUT trace formatting.
//!
//! When a program transfers through the COUT vector the accumulator
//! carries the character being printed, usually with the high bit set
//! (Apple text convention). The trace strips the high bit and renders:
//!
//! - `$0D` (carriage return) as a newline,
//! - printable ASCII as itself,
//! - known control characters as C-style escapes
//!   (`\0 \a \b \t \n \v \f \e \x7f`),
//! - anything else as `\xHH`.

use std::io::{self, Write};

/// Render one COUT byte into the trace sink.
pub fn write_cout_byte(w: &mut dyn Write, a: u8) -> io::Result<()> {
    let ch = a & 0x7F;
    match ch {
        0x0D => w.write_all(b"\n")?,
        0x20..=0x7E => w.write_all(&[ch])?,
        0x00 => w.write_all(b"\\0")?,
        0x07 => w.write_all(b"\\a")?,
        0x08 => w.write_all(b"\\b")?,
        0x09 => w.write_all(b"\\t")?,
        0x0A => w.write_all(b"\\n")?,
        0x0B => w.write_all(b"\\v")?,
        0x0C => w.write_all(b"\\f")?,
        0x1B => w.write_all(b"\\e")?,
        0x7F => w.write_all(b"\\x7f")?,
        _ => write!(w, "\\x{ch:02X}")?,
    }
    w.flush()
}
