//! Device family codecs.
//!
//! Every device family frames, serializes and decodes differently. A [`Codec`] captures those
//! differences so one [`ProtocolSession`](crate::session::ProtocolSession) can drive any of them.
//!
//! * [`LineTaggedCodec`] - `\n` terminated `<tag>,<field>,...` lines, unsolicited telemetry.
//! * [`AddressedCodec`] - `\r` terminated `<CMD><ADDR><ARGS>` commands answered with `OK`/`ERR`.

mod addressed;
pub mod segment;
pub mod table;
mod tagged;

pub use addressed::{AddressedCodec, GPAL_FIELDS};
pub use tagged::LineTaggedCodec;

use heapless::{String, Vec};
use thiserror::Error;

use crate::{command::Command, telemetry::Telemetry};

/// Most events a single line can produce.
pub const MAX_EVENTS: usize = 16;
/// Capacity of each identity string.
pub const IDENTITY_LEN: usize = 32;

pub type Events = Vec<Event, MAX_EVENTS>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Reply shorter than its field table")]
    Truncated,
    #[error("Character is not a segment nibble")]
    InvalidNibble,
    #[error("Segment field has an odd width")]
    OddSegmentWidth,
    #[error("Field is empty")]
    EmptyField,
    #[error("Field too long")]
    FieldTooLong,
    #[error("Field is not a valid number")]
    InvalidNumber,
    #[error("Field value does not suit its telemetry target")]
    TargetMismatch,
    #[error("Too many fields")]
    TooManyFields,
    #[error("Required field missing")]
    MissingField,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Encoded command does not fit the line buffer")]
    TooLong,
    #[error("Device address does not fit two digits")]
    InvalidAddress,
}

/// Whether a family answers every command, or just talks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discipline {
    /// Commands are written as soon as they are submitted, lines are decoded as they arrive.
    Direct,
    /// One command in flight at a time, completed by a terminal line.
    Queued,
}

/// How an in-flight command finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// `OK`
    Accepted,
    /// `ERR`
    Rejected,
    /// No terminal line arrived within the response timeout.
    TimedOut,
}

/// Who the device says it is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Identity {
    pub model: String<IDENTITY_LEN>,
    pub name: String<IDENTITY_LEN>,
    pub serial_number: String<IDENTITY_LEN>,
}

impl Identity {
    pub fn new(model: &str, name: &str, serial_number: &str) -> Result<Self, DecodeError> {
        fn copy(text: &str) -> Result<String<IDENTITY_LEN>, DecodeError> {
            let mut out = String::new();
            out.push_str(text.trim())
                .map_err(|_| DecodeError::FieldTooLong)?;
            Ok(out)
        }

        Ok(Self {
            model: copy(model)?,
            name: copy(name)?,
            serial_number: copy(serial_number)?,
        })
    }
}

/// Something a decoded line tells us.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Identified(Identity),
    Telemetry(Telemetry),
}

/// The per-family part of a session.
pub trait Codec {
    /// Line terminator, both directions.
    fn delimiter(&self) -> u8;

    fn discipline(&self) -> Discipline;

    /// Name of the command sent when the session starts, answered by an identification line.
    fn identify(&self) -> &'static str;

    /// Name of the command the polling loop issues. `None` if the device reports on its own.
    fn telemetry_request(&self) -> Option<&'static str> {
        None
    }

    /// Serialize `command`, terminator included.
    fn encode<const N: usize>(&self, command: &Command, out: &mut String<N>)
    -> Result<(), EncodeError>;

    /// Recognise a terminal line. Only meaningful for [`Discipline::Queued`] codecs.
    fn completion(&self, _line: &str) -> Option<Completion> {
        None
    }

    /// Decode one line. `in_flight` names the command awaiting a response, always `None` for
    /// [`Discipline::Direct`] codecs.
    ///
    /// Lines that carry nothing of interest decode to no events. An error means the line was
    /// malformed and must be dropped as a whole.
    fn decode(&self, in_flight: Option<&str>, line: &str) -> Result<Events, DecodeError>;
}

fn push_event(events: &mut Events, event: Event) -> Result<(), DecodeError> {
    events.push(event).map_err(|_| DecodeError::TooManyFields)
}
