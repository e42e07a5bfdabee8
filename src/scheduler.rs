//! Single in-flight command discipline for command/response devices.
//!
//! The scheduler never touches the channel itself. [`CommandScheduler::submit`] and
//! [`CommandScheduler::complete`] hand back the command that must be written *now*, if any, and
//! the session writes it.
//!
//! While a command is in flight, further submissions wait in a small queue. A submission whose
//! name matches a queued command replaces that command's arguments instead of queueing a second
//! copy. Queued commands are released oldest first.

use heapless::Vec;
use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    command::Command,
    types::{Duration, Instant},
};

/// Default number of distinct commands that may wait behind the in-flight one.
pub const QUEUE_LEN: usize = 8;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Command queue is full")]
    QueueFull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Nothing in flight, the next submission is written straight away.
    Idle,
    /// One command in flight, submissions are queued.
    AwaitingResponse,
}

/// A command waiting for the in-flight one to finish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    pub command: Command,
    pub enqueued_at: Instant,
    /// Breaks ties between entries enqueued at the same instant.
    sequence: u32,
}

/// The command written to the channel and awaiting its terminal line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlightCommand {
    pub command: Command,
    pub sent_at: Instant,
}

#[derive(Debug)]
pub struct CommandScheduler<const Q: usize = QUEUE_LEN> {
    in_flight: Option<InFlightCommand>,
    queue: Vec<PendingCommand, Q>,
    sequence: u32,
}

impl<const Q: usize> Default for CommandScheduler<Q> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const Q: usize> CommandScheduler<Q> {
    pub const fn new() -> Self {
        Self {
            in_flight: None,
            queue: Vec::new(),
            sequence: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        match self.in_flight {
            Some(_) => SchedulerState::AwaitingResponse,
            None => SchedulerState::Idle,
        }
    }

    pub fn in_flight(&self) -> Option<&InFlightCommand> {
        self.in_flight.as_ref()
    }

    /// Queued commands, in no particular order.
    pub fn queued(&self) -> &[PendingCommand] {
        &self.queue
    }

    /// Submit a command.
    ///
    /// Returns the command if it has to be written immediately. It is already recorded as in
    /// flight at that point, a failed write does not undo that.
    pub fn submit(
        &mut self,
        command: Command,
        now: Instant,
    ) -> Result<Option<Command>, SchedulerError> {
        if self.in_flight.is_none() {
            return Ok(Some(self.dispatch(command, now)));
        }

        let sequence = self.next_sequence();
        if let Some(pending) = self
            .queue
            .iter_mut()
            .find(|pending| pending.command.same_name(command.name()))
        {
            trace!(command = command.name(), "coalescing queued command");
            pending.command.replace_args(command.into_args());
            pending.enqueued_at = now;
            pending.sequence = sequence;
            return Ok(None);
        }

        trace!(command = command.name(), "queueing command");
        self.queue
            .push(PendingCommand {
                command,
                enqueued_at: now,
                sequence,
            })
            .map_err(|_| SchedulerError::QueueFull)?;
        Ok(None)
    }

    /// The in-flight command has finished, by terminal line or by timeout.
    ///
    /// Returns the finished command, and the next command to write if one was queued. The next
    /// command is in flight once this returns.
    pub fn complete(&mut self, now: Instant) -> (Option<Command>, Option<Command>) {
        let finished = self.in_flight.take().map(|in_flight| in_flight.command);

        let oldest = self
            .queue
            .iter()
            .enumerate()
            .min_by_key(|(_, pending)| (pending.enqueued_at, pending.sequence))
            .map(|(index, _)| index);

        let next = oldest.map(|index| {
            let pending = self.queue.swap_remove(index);
            self.dispatch(pending.command, now)
        });
        (finished, next)
    }

    /// Whether the in-flight command has waited longer than `timeout`.
    pub fn is_overdue(&self, now: Instant, timeout: Duration) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|in_flight| now >= in_flight.sent_at + timeout)
    }

    /// Forget everything, in flight and queued.
    pub fn reset(&mut self) {
        self.in_flight = None;
        self.queue.clear();
    }

    fn dispatch(&mut self, command: Command, now: Instant) -> Command {
        debug!(command = command.name(), "command in flight");
        self.in_flight = Some(InFlightCommand {
            command: command.clone(),
            sent_at: now,
        });
        command
    }

    fn next_sequence(&mut self) -> u32 {
        self.sequence = self.sequence.wrapping_add(1);
        self.sequence
    }
}
