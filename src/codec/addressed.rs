//! Addressed command/response devices.
//!
//! Commands go out as `<CMD><ADDR><ARGS>\r`, the address being two decimal digits. The device
//! answers with zero or more data lines and finishes every command with `OK` or `ERR`.
//!
//! ```text
//! -> GMOD00\r          <- HCS-3302\r  OK\r
//! -> SOUT000\r         <- OK\r
//! -> GPAL00\r          <- <48 character display frame>\r  OK\r
//! ```

use core::fmt::Write;

use heapless::String;
use tracing::debug;

use super::{
    Codec, Completion, DecodeError, Discipline, EncodeError, Event, Events, Identity,
    push_event,
    table::{FieldDecoder, FieldRange, FieldSpec, FrameTable},
};
use crate::{command::Command, framer::CR, telemetry::TelemetryField};

const IDENTIFY: &str = "GMOD";
const READ_PANEL: &str = "GPAL";

/// Layout of the `GPAL` reply, a snapshot of the front panel display.
///
/// Readouts are five 4-digit segment fields. The indicator flags are active low, a `0` means
/// the LED is lit.
pub const GPAL_FIELDS: [FieldSpec; 9] = [
    FieldSpec::new(
        FieldRange::inclusive(1, 8),
        FieldDecoder::Segment,
        Some(TelemetryField::VoltageOut),
    ),
    FieldSpec::new(
        FieldRange::inclusive(9, 16),
        FieldDecoder::Segment,
        Some(TelemetryField::CurrentOut),
    ),
    FieldSpec::new(
        FieldRange::inclusive(17, 24),
        FieldDecoder::Segment,
        Some(TelemetryField::Power),
    ),
    FieldSpec::new(
        FieldRange::inclusive(25, 32),
        FieldDecoder::Segment,
        Some(TelemetryField::VoltageSet),
    ),
    FieldSpec::new(
        FieldRange::inclusive(33, 40),
        FieldDecoder::Segment,
        Some(TelemetryField::CurrentSet),
    ),
    // Output enabled LED.
    FieldSpec::new(
        FieldRange::inclusive(41, 0),
        FieldDecoder::InvertedBool,
        Some(TelemetryField::Output),
    ),
    // CC LED, CV otherwise.
    FieldSpec::new(
        FieldRange::inclusive(42, 0),
        FieldDecoder::InvertedBool,
        Some(TelemetryField::Mode),
    ),
    // Key lock LED.
    FieldSpec::new(
        FieldRange::inclusive(43, 0),
        FieldDecoder::InvertedBool,
        Some(TelemetryField::Lock),
    ),
    FieldSpec::new(FieldRange::inclusive(44, 48), FieldDecoder::Reserved, None),
];

/// Codec for `\r` terminated, addressed command/response devices.
#[derive(Debug, Clone, Copy)]
pub struct AddressedCodec {
    /// Default for these devices is `00`.
    address: u8,
}

impl Default for AddressedCodec {
    fn default() -> Self {
        Self { address: 0 }
    }
}

impl AddressedCodec {
    /// Highest address the two digit field can carry.
    pub const MAX_ADDRESS: u8 = 99;

    /// Create a codec for the device at `address`, at most [`Self::MAX_ADDRESS`].
    pub fn new(address: u8) -> Result<Self, EncodeError> {
        if address > Self::MAX_ADDRESS {
            return Err(EncodeError::InvalidAddress);
        }
        Ok(Self { address })
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    fn panel_frame(&self, line: &str) -> Result<Events, DecodeError> {
        let table = FrameTable::new(&GPAL_FIELDS)?;
        let mut events = Events::new();
        for update in table.telemetry(line)? {
            push_event(&mut events, Event::Telemetry(update))?;
        }
        Ok(events)
    }
}

impl Codec for AddressedCodec {
    fn delimiter(&self) -> u8 {
        CR
    }

    fn discipline(&self) -> Discipline {
        Discipline::Queued
    }

    fn identify(&self) -> &'static str {
        IDENTIFY
    }

    fn telemetry_request(&self) -> Option<&'static str> {
        Some(READ_PANEL)
    }

    fn encode<const N: usize>(
        &self,
        command: &Command,
        out: &mut String<N>,
    ) -> Result<(), EncodeError> {
        for c in command.name().chars() {
            out.push(c.to_ascii_uppercase())
                .map_err(|_| EncodeError::TooLong)?;
        }
        write!(out, "{:02}{}\r", self.address, command.args()).map_err(|_| EncodeError::TooLong)
    }

    fn completion(&self, line: &str) -> Option<Completion> {
        match line.trim() {
            "OK" => Some(Completion::Accepted),
            "ERR" => Some(Completion::Rejected),
            _ => None,
        }
    }

    fn decode(&self, in_flight: Option<&str>, line: &str) -> Result<Events, DecodeError> {
        let line = line.trim_matches('\n');
        match in_flight {
            Some(command) if command.eq_ignore_ascii_case(IDENTIFY) => {
                let model = line.trim();
                if model.is_empty() {
                    return Err(DecodeError::MissingField);
                }
                let mut events = Events::new();
                push_event(
                    &mut events,
                    Event::Identified(Identity::new(model, model, "")?),
                )?;
                Ok(events)
            }
            Some(command) if command.eq_ignore_ascii_case(READ_PANEL) => self.panel_frame(line),
            _ => {
                debug!(line, "no decoder for response");
                Ok(Events::new())
            }
        }
    }
}
