//! Line-tagged CSV devices.
//!
//! Every line starts with a tag and carries comma separated fields:
//!
//! ```text
//! id,bk1696,bk1696,SN42
//! vset,12.500
//! status,ina228,vout,12.497
//! output,1
//! ```
//!
//! The device pushes telemetry by itself, commands are not acknowledged.

use core::{fmt::Write, str::FromStr};

use heapless::String;
use strum_macros::EnumString;
use tracing::trace;

use super::{Codec, DecodeError, Discipline, EncodeError, Event, Events, Identity, push_event};
use crate::{
    command::Command,
    framer::LF,
    telemetry::{Telemetry, TelemetryField},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "lowercase")]
enum Tag {
    Id,
    Vset,
    Iset,
    Status,
    Relay,
    Output,
    Lock,
    Temp,
}

/// Parameters reported through `status,<scope>,<param>,<value>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "lowercase")]
enum StatusParam {
    Vout,
    Iout,
    Power,
    Temp,
}

impl From<StatusParam> for TelemetryField {
    fn from(value: StatusParam) -> Self {
        match value {
            StatusParam::Vout => TelemetryField::VoltageOut,
            StatusParam::Iout => TelemetryField::CurrentOut,
            StatusParam::Power => TelemetryField::Power,
            StatusParam::Temp => TelemetryField::Temperature,
        }
    }
}

/// Codec for `\n` terminated, comma separated devices.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineTaggedCodec;

impl LineTaggedCodec {
    pub const fn new() -> Self {
        Self
    }
}

fn number(field: Option<&str>) -> Result<f32, DecodeError> {
    field
        .ok_or(DecodeError::MissingField)?
        .trim()
        .parse()
        .map_err(|_| DecodeError::InvalidNumber)
}

fn switch(field: Option<&str>) -> Result<bool, DecodeError> {
    let value: i32 = field
        .ok_or(DecodeError::MissingField)?
        .trim()
        .parse()
        .map_err(|_| DecodeError::InvalidNumber)?;
    Ok(value != 0)
}

/// Measured values can dip just below zero around the sensor offset; a supply never outputs a
/// negative voltage, current or power.
fn clamp_reading(field: TelemetryField, value: f32) -> f32 {
    match field {
        TelemetryField::Temperature => value,
        _ => value.max(0.0),
    }
}

impl Codec for LineTaggedCodec {
    fn delimiter(&self) -> u8 {
        LF
    }

    fn discipline(&self) -> Discipline {
        Discipline::Direct
    }

    fn identify(&self) -> &'static str {
        "id"
    }

    fn encode<const N: usize>(
        &self,
        command: &Command,
        out: &mut String<N>,
    ) -> Result<(), EncodeError> {
        let result = if command.args().is_empty() {
            writeln!(out, "{}", command.name())
        } else {
            writeln!(out, "{},{}", command.name(), command.args())
        };
        result.map_err(|_| EncodeError::TooLong)
    }

    fn decode(&self, _in_flight: Option<&str>, line: &str) -> Result<Events, DecodeError> {
        let mut events = Events::new();
        let mut fields = line.trim_end_matches('\r').split(',');

        let Some(tag) = fields.next().and_then(|tag| Tag::from_str(tag).ok()) else {
            trace!(line, "ignoring untagged line");
            return Ok(events);
        };

        let event = match tag {
            Tag::Id => {
                let model = fields.next().ok_or(DecodeError::MissingField)?;
                let name = fields.next().ok_or(DecodeError::MissingField)?;
                let serial_number = fields.next().ok_or(DecodeError::MissingField)?;
                Event::Identified(Identity::new(model, name, serial_number)?)
            }
            Tag::Vset => Event::Telemetry(Telemetry::VoltageSet(number(fields.next())?)),
            Tag::Iset => Event::Telemetry(Telemetry::CurrentSet(number(fields.next())?)),
            Tag::Temp => Event::Telemetry(Telemetry::Temperature(number(fields.next())?)),
            Tag::Relay => Event::Telemetry(Telemetry::Relay(switch(fields.next())?.into())),
            Tag::Output => Event::Telemetry(Telemetry::Output(switch(fields.next())?.into())),
            Tag::Lock => Event::Telemetry(Telemetry::Lock(switch(fields.next())?.into())),
            Tag::Status => {
                let _scope = fields.next().ok_or(DecodeError::MissingField)?;
                let param = fields.next().ok_or(DecodeError::MissingField)?;
                let Ok(param) = StatusParam::from_str(param) else {
                    trace!(param, "ignoring unknown status parameter");
                    return Ok(events);
                };
                let field = TelemetryField::from(param);
                let value = clamp_reading(field, number(fields.next())?);
                let update = Telemetry::reading(field, value).ok_or(DecodeError::TargetMismatch)?;
                Event::Telemetry(update)
            }
        };

        push_event(&mut events, event)?;
        Ok(events)
    }
}
