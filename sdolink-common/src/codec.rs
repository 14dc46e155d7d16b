//! Value codec
//!
//! Converts between integer values and the little-endian byte buffers moved by SDO transfers.
//!
//! - Writes start from a text literal, parsed by [`parse_int_literal`], and are encoded into
//!   exactly `bit_width / 8` bytes by [`encode`]. Negative values are stored in two's complement.
//! - Reads are always decoded as unsigned little-endian integers, and rendered for display by
//!   [`render`]. Rendering works on the raw buffer, so it is not limited to 128-bit values.
use core::str::FromStr;

use snafu::Snafu;

/// Errors produced while parsing or encoding a value
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum CodecError {
    /// The text could not be parsed as an integer literal
    #[snafu(display("'{text}' is not a valid integer literal"))]
    InvalidLiteral {
        /// The rejected text
        text: String,
    },
    /// The bit width cannot be converted to a whole number of bytes
    #[snafu(display("Bit width {bit_width} is not a positive multiple of 8"))]
    InvalidWidth {
        /// The rejected width
        bit_width: usize,
    },
    /// The value needs more bits than are available
    #[snafu(display("Value {value} does not fit in {bit_width} bits"))]
    ValueOutOfRange {
        /// The value
        value: i128,
        /// The available width
        bit_width: usize,
    },
}

/// Parse a signed integer literal
///
/// Accepts an optional leading sign followed by decimal digits, `0x` prefixed hexadecimal, or `0b`
/// prefixed binary. Surrounding whitespace is ignored.
pub fn parse_int_literal(text: &str) -> Result<i128, CodecError> {
    let invalid = || CodecError::InvalidLiteral {
        text: text.to_string(),
    };

    let trimmed = text.trim();
    let (negative, unsigned) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let (radix, digits) = if let Some(hex) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        (16, hex)
    } else if let Some(bin) = unsigned
        .strip_prefix("0b")
        .or_else(|| unsigned.strip_prefix("0B"))
    {
        (2, bin)
    } else {
        (10, unsigned)
    };

    // from_str_radix tolerates a leading '+', which would let "+-5" or "0x+5" through
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(invalid());
    }
    let magnitude = u128::from_str_radix(digits, radix).map_err(|_| invalid())?;

    if negative {
        if magnitude > i128::MIN.unsigned_abs() {
            return Err(invalid());
        }
        Ok((magnitude as i128).wrapping_neg())
    } else {
        i128::try_from(magnitude).map_err(|_| invalid())
    }
}

/// Get the number of bytes needed for a value of `bit_width` bits
///
/// Fails unless the width is a positive multiple of 8
pub fn byte_len(bit_width: usize) -> Result<usize, CodecError> {
    if bit_width == 0 || bit_width % 8 != 0 {
        InvalidWidthSnafu { bit_width }.fail()
    } else {
        Ok(bit_width / 8)
    }
}

fn fits(value: i128, len: usize) -> bool {
    if len >= 16 {
        return true;
    }
    let bits = 8 * len as u32;
    if value < 0 {
        value >= -(1i128 << (bits - 1))
    } else {
        value < (1i128 << bits)
    }
}

/// Encode a value into `bit_width / 8` little-endian bytes
///
/// Negative values are encoded as two's complement and must fit the signed range of the width.
/// Non-negative values are encoded unsigned, and may use the full unsigned range.
pub fn encode(value: i128, bit_width: usize) -> Result<Vec<u8>, CodecError> {
    let len = byte_len(bit_width)?;
    if !fits(value, len) {
        return ValueOutOfRangeSnafu { value, bit_width }.fail();
    }

    let fill = if value < 0 { 0xFF } else { 0x00 };
    let raw = value.to_le_bytes();
    let mut bytes = Vec::with_capacity(len);
    bytes.extend_from_slice(&raw[..len.min(raw.len())]);
    bytes.resize(len, fill);
    Ok(bytes)
}

/// Decode little-endian bytes as an unsigned integer
///
/// Returns None if the value does not fit in a u128
pub fn decode_unsigned(bytes: &[u8]) -> Option<u128> {
    let significant = significant_len(bytes);
    if significant > 16 {
        return None;
    }
    let mut buf = [0u8; 16];
    buf[..significant].copy_from_slice(&bytes[..significant]);
    Some(u128::from_le_bytes(buf))
}

/// Decode little-endian bytes as a two's complement signed integer
///
/// Returns None if the value does not fit in an i128
pub fn decode_signed(bytes: &[u8]) -> Option<i128> {
    let Some(last) = bytes.last() else {
        return Some(0);
    };
    let fill = if last & 0x80 != 0 { 0xFF } else { 0x00 };
    let mut buf = [fill; 16];
    if bytes.len() <= 16 {
        buf[..bytes.len()].copy_from_slice(bytes);
    } else {
        // Everything past the low 16 bytes must be sign extension
        let consistent = bytes[16..].iter().all(|b| *b == fill)
            && (bytes[15] & 0x80 != 0) == (fill == 0xFF);
        if !consistent {
            return None;
        }
        buf.copy_from_slice(&bytes[..16]);
    }
    Some(i128::from_le_bytes(buf))
}

/// Number of bytes left once zero high bytes are dropped
fn significant_len(bytes: &[u8]) -> usize {
    bytes.iter().rposition(|b| *b != 0).map_or(0, |pos| pos + 1)
}

/// The ways in which read-back data can be presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Representation {
    /// Base 10 integer
    #[default]
    Decimal,
    /// `0x` prefixed hexadecimal integer
    Hexadecimal,
    /// `0b` prefixed binary integer
    Binary,
    /// Escaped byte string
    Text,
}

impl FromStr for Representation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "decimal" | "dec" => Ok(Self::Decimal),
            "hexadecimal" | "hex" => Ok(Self::Hexadecimal),
            "binary" | "bin" => Ok(Self::Binary),
            "text" | "ascii" => Ok(Self::Text),
            _ => Err(format!(
                "Unknown representation '{s}', expected decimal, hexadecimal, binary or text"
            )),
        }
    }
}

impl core::fmt::Display for Representation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            Representation::Decimal => "Decimal",
            Representation::Hexadecimal => "Hexadecimal",
            Representation::Binary => "Binary",
            Representation::Text => "Text",
        };
        f.write_str(s)
    }
}

/// Render read-back bytes, treated as an unsigned little-endian integer
pub fn render(bytes: &[u8], repr: Representation) -> String {
    match repr {
        Representation::Decimal => render_decimal(bytes),
        Representation::Hexadecimal => render_hex(bytes),
        Representation::Binary => render_binary(bytes),
        Representation::Text => render_text(bytes),
    }
}

fn render_decimal(bytes: &[u8]) -> String {
    if let Some(value) = decode_unsigned(bytes) {
        return value.to_string();
    }

    // Too wide for a native integer: long division by 10 on the big-endian byte string
    let mut number: Vec<u8> = bytes[..significant_len(bytes)].iter().rev().copied().collect();
    let mut digits = Vec::new();
    while !number.is_empty() {
        let mut remainder = 0u32;
        for byte in number.iter_mut() {
            let acc = (remainder << 8) | *byte as u32;
            *byte = (acc / 10) as u8;
            remainder = acc % 10;
        }
        digits.push(b'0' + remainder as u8);
        let leading_zeros = number.iter().take_while(|b| **b == 0).count();
        number.drain(..leading_zeros);
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

fn render_hex(bytes: &[u8]) -> String {
    let len = significant_len(bytes);
    if len == 0 {
        return "0x0".into();
    }
    let mut s = format!("0x{:x}", bytes[len - 1]);
    for b in bytes[..len - 1].iter().rev() {
        s.push_str(&format!("{b:02x}"));
    }
    s
}

fn render_binary(bytes: &[u8]) -> String {
    let len = significant_len(bytes);
    if len == 0 {
        return "0b0".into();
    }
    let mut s = format!("0b{:b}", bytes[len - 1]);
    for b in bytes[..len - 1].iter().rev() {
        s.push_str(&format!("{b:08b}"));
    }
    s
}

/// Render a buffer as a byte string literal, e.g. `b'd\x00'`
fn render_text(bytes: &[u8]) -> String {
    let quote = if bytes.contains(&b'\'') && !bytes.contains(&b'"') {
        '"'
    } else {
        '\''
    };
    let mut s = String::with_capacity(bytes.len() + 3);
    s.push('b');
    s.push(quote);
    for &b in bytes {
        match b {
            b'\\' => s.push_str("\\\\"),
            b'\t' => s.push_str("\\t"),
            b'\n' => s.push_str("\\n"),
            b'\r' => s.push_str("\\r"),
            _ if b as char == quote => {
                s.push('\\');
                s.push(quote);
            }
            0x20..=0x7e => s.push(b as char),
            _ => s.push_str(&format!("\\x{b:02x}")),
        }
    }
    s.push(quote);
    s
}

/// Format a signed value as `0x` prefixed hex, e.g. `0x64` or `-0x1`
pub fn format_signed_hex(value: i128) -> String {
    let sign = if value < 0 { "-" } else { "" };
    format!("{sign}0x{:x}", value.unsigned_abs())
}

/// Format a signed value as `0b` prefixed binary, e.g. `0b1100100` or `-0b1`
pub fn format_signed_binary(value: i128) -> String {
    let sign = if value < 0 { "-" } else { "" };
    format!("{sign}0b{:b}", value.unsigned_abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assertables::assert_contains;

    #[test]
    fn test_parse_literals() {
        assert_eq!(Ok(100), parse_int_literal("100"));
        assert_eq!(Ok(100), parse_int_literal(" 0x64 "));
        assert_eq!(Ok(100), parse_int_literal("0X64"));
        assert_eq!(Ok(100), parse_int_literal("0b1100100"));
        assert_eq!(Ok(-1), parse_int_literal("-1"));
        assert_eq!(Ok(-255), parse_int_literal("-0xff"));
        assert_eq!(Ok(7), parse_int_literal("+7"));
        assert_eq!(Ok(i128::MIN), parse_int_literal(&i128::MIN.to_string()));
    }

    #[test]
    fn test_parse_rejects_expressions() {
        for text in ["", "-", "0x", "0b2", "1+1", "+-5", "0x+5", "abc", "__import__('os')", "1.5"] {
            assert!(matches!(parse_int_literal(text), Err(CodecError::InvalidLiteral { .. })));
        }
        // One past i128::MAX
        assert!(matches!(
            parse_int_literal("170141183460469231731687303715884105728"),
            Err(CodecError::InvalidLiteral { .. })
        ));
    }

    #[test]
    fn test_byte_len() {
        assert_eq!(Ok(2), byte_len(16));
        assert_eq!(Err(CodecError::InvalidWidth { bit_width: 0 }), byte_len(0));
        assert_eq!(Err(CodecError::InvalidWidth { bit_width: 12 }), byte_len(12));
    }

    #[test]
    fn test_encode_negative_one() {
        assert_eq!(Ok(vec![0xFF]), encode(-1, 8));
        assert_eq!(Ok(vec![0xFF, 0xFF]), encode(-1, 16));
        assert_eq!(Ok(vec![0xFF; 20]), encode(-1, 160));
    }

    #[test]
    fn test_encode_little_endian() {
        assert_eq!(Ok(vec![0x64, 0x00]), encode(100, 16));
        assert_eq!(Ok(vec![0x78, 0x56, 0x34, 0x12]), encode(0x12345678, 32));
        assert_eq!(Ok(vec![0xF4, 0x01]), encode(500, 16));
    }

    #[test]
    fn test_encode_range_limits() {
        // Non-negative values may use the full unsigned range
        assert_eq!(Ok(vec![0xFF]), encode(255, 8));
        assert!(matches!(encode(256, 8), Err(CodecError::ValueOutOfRange { .. })));
        // Negative values must fit the signed range
        assert_eq!(Ok(vec![0x80]), encode(-128, 8));
        assert!(matches!(encode(-129, 8), Err(CodecError::ValueOutOfRange { .. })));
        assert_eq!(Ok(vec![0x00, 0x80]), encode(-32768, 16));
        assert_eq!(Ok(vec![0xFF; 15]), encode((1i128 << 120) - 1, 120));
        assert_eq!(
            Err(CodecError::InvalidWidth { bit_width: 12 }),
            encode(1, 12)
        );
    }

    #[test]
    fn test_round_trip() {
        for width in [8usize, 16, 24, 32, 64, 128] {
            let bits = width as u32;
            let max_unsigned: i128 = if bits == 128 { i128::MAX } else { (1i128 << bits) - 1 };
            let min_signed: i128 = if bits == 128 { i128::MIN } else { -(1i128 << (bits - 1)) };
            for v in [0, 1, 100, max_unsigned] {
                let bytes = encode(v, width).unwrap();
                assert_eq!(width / 8, bytes.len());
                assert_eq!(Some(v as u128), decode_unsigned(&bytes));
            }
            for v in [-1, -100, min_signed] {
                let bytes = encode(v, width).unwrap();
                assert_eq!(Some(v), decode_signed(&bytes));
            }
        }
    }

    #[test]
    fn test_decode_wide_buffers() {
        let mut wide = vec![0u8; 20];
        wide[0] = 5;
        assert_eq!(Some(5), decode_unsigned(&wide));
        assert_eq!(Some(5), decode_signed(&wide));
        wide[19] = 1;
        assert_eq!(None, decode_unsigned(&wide));
        assert_eq!(None, decode_signed(&wide));
        assert_eq!(Some(-1), decode_signed(&[0xFF; 20]));
    }

    #[test]
    fn test_render() {
        let bytes = [0x64, 0x00];
        assert_eq!("100", render(&bytes, Representation::Decimal));
        assert_eq!("0x64", render(&bytes, Representation::Hexadecimal));
        assert_eq!("0b1100100", render(&bytes, Representation::Binary));
        assert_eq!("b'd\\x00'", render(&bytes, Representation::Text));

        assert_eq!("0x1234", render(&[0x34, 0x12], Representation::Hexadecimal));
        assert_eq!("0b100000001", render(&[0x01, 0x01], Representation::Binary));
        assert_eq!("0", render(&[], Representation::Decimal));
        assert_eq!("0x0", render(&[0, 0], Representation::Hexadecimal));
        assert_eq!("0b0", render(&[0], Representation::Binary));
    }

    #[test]
    fn test_render_decimal_beyond_u128() {
        // 2^128 = 340282366920938463463374607431768211456
        let mut bytes = vec![0u8; 17];
        bytes[16] = 1;
        assert_eq!(
            "340282366920938463463374607431768211456",
            render(&bytes, Representation::Decimal)
        );
        assert_eq!(
            "0x100000000000000000000000000000000",
            render(&bytes, Representation::Hexadecimal)
        );
    }

    #[test]
    fn test_render_text_escapes() {
        assert_eq!("b'abc'", render(b"abc", Representation::Text));
        assert_eq!("b\"it's\"", render(b"it's", Representation::Text));
        assert_eq!("b'\\'\"'", render(b"'\"", Representation::Text));
        assert_eq!("b'a\\tb\\n\\\\\\xff'", render(b"a\tb\n\\\xff", Representation::Text));
    }

    #[test]
    fn test_signed_formatting() {
        assert_eq!("0x64", format_signed_hex(100));
        assert_eq!("-0x1", format_signed_hex(-1));
        assert_eq!("0b1100100", format_signed_binary(100));
        assert_eq!("-0b1", format_signed_binary(-1));
    }

    #[test]
    fn test_representation_from_str() {
        assert_eq!(Ok(Representation::Hexadecimal), "Hexadecimal".parse());
        assert_eq!(Ok(Representation::Text), "ascii".parse());
        assert_contains!(
            "octal".parse::<Representation>().unwrap_err(),
            "Unknown representation"
        );
    }
}
