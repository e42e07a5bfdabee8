//! This crate drives laboratory power supplies over a serial link.
//!
//! It supports `no-std` environments by use of the `no_std` feature flag.
//!
//! A [`session::ProtocolSession`] owns one channel and turns the byte stream into typed
//! telemetry, while accepting commands that it serializes back onto the wire. The per-family
//! wire format lives in a [`codec::Codec`]:
//!
//! * [`codec::LineTaggedCodec`] for devices talking `\n` terminated `tag,field,...` lines.
//! * [`codec::AddressedCodec`] for `\r` terminated `<CMD><ADDR><ARGS>` devices that answer every
//!   command with `OK` or `ERR`, including the front panel readout (`GPAL`) encoded as
//!   seven-segment patterns.
//!
//! The session never blocks. Call [`session::ProtocolSession::poll`] regularly with the current
//! time and it reads what is available, handles timeouts and issues telemetry polls.
//!
//! The serial port used for PSU comms should be configured like so:
//! * Default baud rate: 115200
//! * Data bits: 8
//! * Stop bits: 1
//! * Parity: None

#![cfg_attr(feature = "no_std", no_std)]

pub mod channel;
pub mod codec;
pub mod command;
pub mod error;
pub mod framer;
pub mod poll;
pub mod scheduler;
pub mod session;
pub mod telemetry;
pub mod types;

pub use channel::{Channel, SerialConfig, Transport};
pub use codec::{AddressedCodec, Codec, LineTaggedCodec};
pub use error::{Error, Result};
pub use session::{ProtocolSession, SessionConfig, SessionObserver, SessionState};

#[cfg(test)]
mod mock_serial;
