//! Our error types for the serial engine.

use thiserror::Error;

use crate::{codec::EncodeError, command::CommandError, scheduler::SchedulerError};

pub type Result<T, I> = core::result::Result<T, Error<I>>;

/// Custom error type for power supply sessions.
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    #[error("Serial communication error")]
    SerialError(I),
    #[error("Failed to open channel")]
    ConnectionFailed(I),
    #[error("Session is closed")]
    SessionClosed,
    #[error("Command encode error: {0}")]
    Encode(EncodeError),
    #[error("Invalid command: {0}")]
    Command(CommandError),
    #[error("Scheduler error: {0}")]
    Scheduler(SchedulerError),
}

impl<I: embedded_io::Error> From<EncodeError> for Error<I> {
    fn from(err: EncodeError) -> Self {
        Error::Encode(err)
    }
}

impl<I: embedded_io::Error> From<CommandError> for Error<I> {
    fn from(err: CommandError) -> Self {
        Error::Command(err)
    }
}

impl<I: embedded_io::Error> From<SchedulerError> for Error<I> {
    fn from(err: SchedulerError) -> Self {
        Error::Scheduler(err)
    }
}
