//! Decoder for seven-segment display readouts sent as character pairs.
//!
//! Each display digit travels as two characters. Subtracting `'0'` from each gives a nibble,
//! the first character is the high nibble. The resulting byte holds the lit segments in its low
//! seven bits (`gfedcba`) and the decimal point after the digit in bit 7.
//!
//! ```text
//!  "=;"  ->  0xD = high, 0xB = low  ->  0xDB  ->  segments 0x5B ('2'), decimal point set
//! ```

use heapless::String;
use modular_bitfield::prelude::*;

use super::DecodeError;

/// Longest segment field we decode, in characters. Two characters per digit.
pub const MAX_SEGMENT_CHARS: usize = 32;

/// Lit segment patterns of the digits `0` to `9`, bit 0 is segment `a`.
const DIGIT_PATTERNS: [u8; 10] = [0x3F, 0x06, 0x5B, 0x4F, 0x66, 0x6D, 0x7D, 0x07, 0x7F, 0x6F];

/// One display position.
#[bitfield(bits = 8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentByte {
    /// `gfedcba`, a set bit is a lit segment.
    pub segments: B7,
    /// Decimal point following this digit.
    pub decimal_point: bool,
}

impl SegmentByte {
    /// The digit shown, if the pattern is one we know.
    pub fn digit(&self) -> Option<u8> {
        let segments = self.segments();
        DIGIT_PATTERNS
            .iter()
            .position(|&pattern| pattern == segments)
            .map(|digit| digit as u8)
    }
}

/// A numeric display reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    /// No decimal point was lit.
    Integer(i32),
    /// At least one decimal point was lit.
    Float(f32),
}

impl Number {
    pub fn as_f32(&self) -> f32 {
        match *self {
            Number::Integer(value) => value as f32,
            Number::Float(value) => value,
        }
    }
}

fn nibble(c: u8) -> Result<u8, DecodeError> {
    c.checked_sub(b'0')
        .filter(|n| *n <= 0x0F)
        .ok_or(DecodeError::InvalidNibble)
}

fn nibble_char(n: u8) -> char {
    (b'0' + (n & 0x0F)) as char
}

/// Decode a segment field into a number.
///
/// Positions whose pattern is not a known digit contribute nothing, decimal point included.
/// This covers blanked leading positions as well as glyphs we can't read. A field with no
/// recognised digit at all decodes to `Ok(None)`.
pub fn decode_segments(field: &str) -> Result<Option<Number>, DecodeError> {
    let bytes = field.as_bytes();
    if bytes.len() % 2 != 0 {
        return Err(DecodeError::OddSegmentWidth);
    }
    if bytes.len() > MAX_SEGMENT_CHARS {
        return Err(DecodeError::FieldTooLong);
    }

    let mut text: String<MAX_SEGMENT_CHARS> = String::new();
    let mut seen_point = false;

    for pair in bytes.chunks_exact(2) {
        let raw = (nibble(pair[0])? << 4) | nibble(pair[1])?;
        let position = SegmentByte::from_bytes([raw]);

        let Some(digit) = position.digit() else {
            continue;
        };
        // At most one digit and one point per pair, so this can't outgrow the field.
        text.push((b'0' + digit) as char)
            .map_err(|_| DecodeError::FieldTooLong)?;
        if position.decimal_point() {
            text.push('.').map_err(|_| DecodeError::FieldTooLong)?;
            seen_point = true;
        }
    }

    if text.is_empty() {
        return Ok(None);
    }

    let number = if seen_point {
        Number::Float(text.parse().map_err(|_| DecodeError::InvalidNumber)?)
    } else {
        Number::Integer(text.parse().map_err(|_| DecodeError::InvalidNumber)?)
    };
    Ok(Some(number))
}

/// Encode a display string such as `"12.34"` the way the device sends it.
///
/// Only digits and decimal points are accepted, each point attaches to the digit before it.
pub fn encode_segments(display: &str) -> Result<String<MAX_SEGMENT_CHARS>, DecodeError> {
    let mut out = String::new();
    let mut chars = display.bytes().peekable();

    while let Some(c) = chars.next() {
        let digit = match c {
            b'0'..=b'9' => c - b'0',
            _ => return Err(DecodeError::InvalidNumber),
        };
        let point = chars.next_if_eq(&b'.').is_some();
        let [raw] = SegmentByte::new()
            .with_segments(DIGIT_PATTERNS[digit as usize])
            .with_decimal_point(point)
            .into_bytes();

        out.push(nibble_char(raw >> 4))
            .map_err(|_| DecodeError::FieldTooLong)?;
        out.push(nibble_char(raw))
            .map_err(|_| DecodeError::FieldTooLong)?;
    }
    Ok(out)
}
