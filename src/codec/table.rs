//! Declarative field tables for fixed-width replies.
//!
//! A table is a list of [`FieldSpec`]s, each naming a character range, how to decode it and which
//! telemetry value (if any) it feeds. Decoding is all-or-nothing: a reply either decodes every
//! field or is rejected as a whole.

use heapless::Vec;

use super::{
    DecodeError,
    segment::{MAX_SEGMENT_CHARS, Number, decode_segments},
};
use crate::telemetry::{Telemetry, TelemetryField};

/// Most fields a single table may hold.
pub const MAX_FIELDS: usize = 16;

/// A character range within a reply, zero based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRange {
    offset: usize,
    len: usize,
}

impl FieldRange {
    pub const fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    /// Build a range from 1-based inclusive positions as they are usually written in protocol
    /// documentation. An `end` of `0` selects the single character at `start`.
    pub const fn inclusive(start: usize, end: usize) -> Self {
        let offset = start.saturating_sub(1);
        if end == 0 || end < start {
            Self { offset, len: 1 }
        } else {
            Self {
                offset,
                len: end - offset,
            }
        }
    }

    pub const fn offset(&self) -> usize {
        self.offset
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Offset of the first character after this range.
    pub const fn end(&self) -> usize {
        self.offset + self.len
    }

    fn slice<'a>(&self, reply: &'a str) -> Result<&'a str, DecodeError> {
        reply
            .get(self.offset..self.end())
            .ok_or(DecodeError::Truncated)
    }
}

/// How the characters of a field turn into a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDecoder {
    /// The substring as is.
    Raw,
    /// Seven-segment display pairs, see [`super::segment`].
    Segment,
    /// Active low flag: `"0"` is `true`, anything else is `false`.
    InvertedBool,
    /// Present on the wire but not interpreted.
    Reserved,
}

/// One entry of a field table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub range: FieldRange,
    pub decoder: FieldDecoder,
    pub target: Option<TelemetryField>,
}

impl FieldSpec {
    pub const fn new(
        range: FieldRange,
        decoder: FieldDecoder,
        target: Option<TelemetryField>,
    ) -> Self {
        Self {
            range,
            decoder,
            target,
        }
    }
}

/// A decoded field, index aligned with the table it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Raw(&'a str),
    Number(Number),
    /// A segment field without any recognised digit.
    Blank,
    Bool(bool),
    Reserved,
}

/// A validated field table.
#[derive(Debug, Clone, Copy)]
pub struct FrameTable<'t> {
    fields: &'t [FieldSpec],
    width: usize,
}

impl<'t> FrameTable<'t> {
    /// Check a table for fields we could never decode.
    pub fn new(fields: &'t [FieldSpec]) -> Result<Self, DecodeError> {
        if fields.len() > MAX_FIELDS {
            return Err(DecodeError::TooManyFields);
        }

        let mut width = 0;
        for field in fields {
            if field.range.is_empty() {
                return Err(DecodeError::EmptyField);
            }
            if field.decoder == FieldDecoder::Segment {
                if field.range.len() % 2 != 0 {
                    return Err(DecodeError::OddSegmentWidth);
                }
                if field.range.len() > MAX_SEGMENT_CHARS {
                    return Err(DecodeError::FieldTooLong);
                }
            }
            width = width.max(field.range.end());
        }

        Ok(Self { fields, width })
    }

    pub fn fields(&self) -> &'t [FieldSpec] {
        self.fields
    }

    /// Shortest reply that covers every field.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Decode every field of `reply`.
    ///
    /// Replies longer than the table are accepted, the excess is ignored.
    pub fn decode<'a>(&self, reply: &'a str) -> Result<Vec<FieldValue<'a>, MAX_FIELDS>, DecodeError> {
        if reply.len() < self.width {
            return Err(DecodeError::Truncated);
        }

        let mut values = Vec::new();
        for field in self.fields {
            let text = field.range.slice(reply)?;
            let value = match field.decoder {
                FieldDecoder::Raw => FieldValue::Raw(text),
                FieldDecoder::Segment => match decode_segments(text)? {
                    Some(number) => FieldValue::Number(number),
                    None => FieldValue::Blank,
                },
                FieldDecoder::InvertedBool => FieldValue::Bool(text == "0"),
                FieldDecoder::Reserved => FieldValue::Reserved,
            };
            // Table length was checked against MAX_FIELDS in new().
            values
                .push(value)
                .map_err(|_| DecodeError::TooManyFields)?;
        }
        Ok(values)
    }

    /// Decode `reply` and turn every targeted field into a telemetry update.
    ///
    /// Blank and reserved fields produce no update. Nothing is returned unless the whole reply
    /// decoded.
    pub fn telemetry(&self, reply: &str) -> Result<Vec<Telemetry, MAX_FIELDS>, DecodeError> {
        let values = self.decode(reply)?;
        let mut updates = Vec::new();

        for (field, value) in self.fields.iter().zip(values.iter()) {
            let Some(target) = field.target else {
                continue;
            };
            let update = match *value {
                FieldValue::Number(number) => Telemetry::reading(target, number.as_f32()),
                FieldValue::Raw(text) if target.is_numeric() => {
                    let reading = text
                        .trim()
                        .parse()
                        .map_err(|_| DecodeError::InvalidNumber)?;
                    Telemetry::reading(target, reading)
                }
                FieldValue::Raw(text) => Telemetry::switch(target, text.trim() != "0"),
                FieldValue::Bool(flag) => Telemetry::switch(target, flag),
                FieldValue::Blank | FieldValue::Reserved => None,
            };
            match update {
                Some(update) => updates
                    .push(update)
                    .map_err(|_| DecodeError::TooManyFields)?,
                None if matches!(value, FieldValue::Blank | FieldValue::Reserved) => {}
                None => return Err(DecodeError::TargetMismatch),
            }
        }
        Ok(updates)
    }
}
