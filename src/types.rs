//! Shared value types used by the telemetry model and the session.

use strum_macros::EnumIter;

/// Session time. One tick is one millisecond.
pub type Instant = fugit::TimerInstantU64<1000>;

/// Session durations, in milliseconds.
pub type Duration = fugit::MillisDurationU64;

/// Represents the two possible power supply control modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    /// Constant voltage regulation mode.
    Cv,
    /// Constant current regulation mode.
    Cc,
}

/// Used to be less ambiguous about whether something is on or off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumIter)]
pub enum State {
    /// Disabled.
    #[default]
    Off,
    /// Enabled.
    On,
}

impl From<State> for bool {
    fn from(value: State) -> Self {
        match value {
            State::Off => false,
            State::On => true,
        }
    }
}

impl From<bool> for State {
    fn from(value: bool) -> Self {
        match value {
            true => State::On,
            false => State::Off,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn state_bool_conversions() {
        // Converting to bool and back should give us what we started with.
        for state in State::iter() {
            let converted = State::from(bool::from(state));
            assert_eq!(converted, state);
        }
    }
}
