//! The byte channel a session owns, and the transport that opens it.

use embedded_io::{ErrorType, Read, ReadReady, Write, WriteReady};
use strum_macros::IntoStaticStr;

/// A duplex byte stream that can report readiness without blocking.
///
/// Blanket implemented for anything implementing the `embedded-io` traits involved.
pub trait Channel: Read + Write + ReadReady + WriteReady {}

impl<T: Read + Write + ReadReady + WriteReady> Channel for T {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, IntoStaticStr)]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

/// Serial line settings handed to [`Transport::open`].
///
/// The defaults are what the supported supplies use: 115200 baud, 8 data bits, 1 stop bit and no
/// parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: Parity,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
        }
    }
}

impl SerialConfig {
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_data_bits(mut self, data_bits: u8) -> Self {
        self.data_bits = data_bits;
        self
    }

    pub fn with_stop_bits(mut self, stop_bits: u8) -> Self {
        self.stop_bits = stop_bits;
        self
    }

    pub fn with_parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }
}

/// Opens and releases channels. Implemented by whatever owns the physical ports.
pub trait Transport {
    type Channel: Channel;

    fn open(
        &mut self,
        config: &SerialConfig,
    ) -> Result<Self::Channel, <Self::Channel as ErrorType>::Error>;

    /// Give a channel back. Dropping it is enough for most transports.
    fn close(&mut self, channel: Self::Channel) {
        drop(channel);
    }
}
