//! Decoded telemetry, both as individual updates and as the last known snapshot.

use strum_macros::{EnumIter, IntoStaticStr};

use crate::types::{ControlMode, State};

/// Names the scalar values a device can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum TelemetryField {
    VoltageSet,
    VoltageOut,
    CurrentSet,
    CurrentOut,
    Power,
    Temperature,
    Relay,
    Output,
    Lock,
    Mode,
}

impl TelemetryField {
    /// Whether this field carries a numeric reading (as opposed to a switch or mode).
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::VoltageSet
                | Self::VoltageOut
                | Self::CurrentSet
                | Self::CurrentOut
                | Self::Power
                | Self::Temperature
        )
    }
}

/// A single field level update, as decoded from the wire.
///
/// Electrical values are in volts, amps and watts. Temperature is in degrees as reported by the
/// device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Telemetry {
    VoltageSet(f32),
    VoltageOut(f32),
    CurrentSet(f32),
    CurrentOut(f32),
    Power(f32),
    Temperature(f32),
    Relay(State),
    Output(State),
    Lock(State),
    Mode(ControlMode),
}

impl Telemetry {
    pub fn field(&self) -> TelemetryField {
        use TelemetryField as TF;
        match self {
            Self::VoltageSet(_) => TF::VoltageSet,
            Self::VoltageOut(_) => TF::VoltageOut,
            Self::CurrentSet(_) => TF::CurrentSet,
            Self::CurrentOut(_) => TF::CurrentOut,
            Self::Power(_) => TF::Power,
            Self::Temperature(_) => TF::Temperature,
            Self::Relay(_) => TF::Relay,
            Self::Output(_) => TF::Output,
            Self::Lock(_) => TF::Lock,
            Self::Mode(_) => TF::Mode,
        }
    }

    /// Build a numeric update for `field`. Returns `None` if the field is not numeric.
    pub fn reading(field: TelemetryField, value: f32) -> Option<Self> {
        use TelemetryField as TF;
        match field {
            TF::VoltageSet => Some(Self::VoltageSet(value)),
            TF::VoltageOut => Some(Self::VoltageOut(value)),
            TF::CurrentSet => Some(Self::CurrentSet(value)),
            TF::CurrentOut => Some(Self::CurrentOut(value)),
            TF::Power => Some(Self::Power(value)),
            TF::Temperature => Some(Self::Temperature(value)),
            _ => None,
        }
    }

    /// Build a switch update for `field`. For [`TelemetryField::Mode`], `true` means constant
    /// current. Returns `None` for numeric fields.
    pub fn switch(field: TelemetryField, value: bool) -> Option<Self> {
        use TelemetryField as TF;
        match field {
            TF::Relay => Some(Self::Relay(value.into())),
            TF::Output => Some(Self::Output(value.into())),
            TF::Lock => Some(Self::Lock(value.into())),
            TF::Mode => Some(Self::Mode(if value {
                ControlMode::Cc
            } else {
                ControlMode::Cv
            })),
            _ => None,
        }
    }
}

/// The last successfully decoded value of every field. `None` until first reported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub voltage_set: Option<f32>,
    pub voltage_out: Option<f32>,
    pub current_set: Option<f32>,
    pub current_out: Option<f32>,
    pub power: Option<f32>,
    pub temperature: Option<f32>,
    pub relay: Option<State>,
    pub output: Option<State>,
    pub lock: Option<State>,
    pub mode: Option<ControlMode>,
}

impl TelemetrySnapshot {
    /// Overwrite the field named by `update`, leaving every other field alone.
    pub fn apply(&mut self, update: &Telemetry) {
        match *update {
            Telemetry::VoltageSet(v) => self.voltage_set = Some(v),
            Telemetry::VoltageOut(v) => self.voltage_out = Some(v),
            Telemetry::CurrentSet(v) => self.current_set = Some(v),
            Telemetry::CurrentOut(v) => self.current_out = Some(v),
            Telemetry::Power(v) => self.power = Some(v),
            Telemetry::Temperature(v) => self.temperature = Some(v),
            Telemetry::Relay(s) => self.relay = Some(s),
            Telemetry::Output(s) => self.output = Some(s),
            Telemetry::Lock(s) => self.lock = Some(s),
            Telemetry::Mode(m) => self.mode = Some(m),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn field_names() {
        let name: &'static str = TelemetryField::VoltageOut.into();
        assert_eq!(name, "voltage_out");
    }

    #[test]
    fn every_field_has_exactly_one_constructor() {
        for field in TelemetryField::iter() {
            let reading = Telemetry::reading(field, 1.0);
            let switch = Telemetry::switch(field, true);
            assert_ne!(reading.is_some(), switch.is_some(), "{field:?}");
            assert_eq!(reading.is_some(), field.is_numeric());

            let update = reading.or(switch).unwrap();
            assert_eq!(update.field(), field);
        }
    }

    #[test]
    fn apply_only_touches_its_field() {
        let mut snapshot = TelemetrySnapshot::default();
        snapshot.apply(&Telemetry::VoltageOut(12.5));
        snapshot.apply(&Telemetry::Lock(State::On));
        snapshot.apply(&Telemetry::VoltageOut(12.0));

        assert_eq!(snapshot.voltage_out, Some(12.0));
        assert_eq!(snapshot.lock, Some(State::On));
        assert_eq!(snapshot.current_out, None);
        assert_eq!(snapshot.mode, None);
    }
}
