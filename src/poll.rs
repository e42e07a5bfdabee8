//! Timers driven by the session's event loop.

use tracing::{debug, warn};

use crate::types::{Duration, Instant};

/// Default polling period.
pub const POLL_PERIOD: Duration = Duration::millis(100);

/// Whether the channel can take a write right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Writability {
    Ready,
    /// Writable, just not this instant.
    Busy,
    /// The channel is gone for good.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Stopped,
    Running,
    /// Terminal, a cancelled loop never runs again.
    Cancelled,
}

/// What a tick asks of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    NotDue,
    /// Due, but gated. The next attempt is one period later.
    Skipped,
    /// Submit the telemetry request.
    Poll,
    /// The loop cancelled itself on this tick.
    Cancelled,
}

/// Fixed period telemetry poller.
#[derive(Debug, Clone)]
pub struct PollingLoop {
    period: Duration,
    next_due: Option<Instant>,
    state: PollState,
}

impl Default for PollingLoop {
    fn default() -> Self {
        Self::new(POLL_PERIOD)
    }
}

impl PollingLoop {
    pub const fn new(period: Duration) -> Self {
        Self {
            period,
            next_due: None,
            state: PollState::Stopped,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Start ticking, first poll one period from `now`. Does nothing once cancelled.
    pub fn start(&mut self, now: Instant) {
        if self.state == PollState::Cancelled {
            return;
        }
        self.state = PollState::Running;
        self.next_due = Some(now + self.period);
    }

    pub fn cancel(&mut self) {
        if self.state != PollState::Cancelled {
            debug!("polling cancelled");
        }
        self.state = PollState::Cancelled;
        self.next_due = None;
    }

    /// Advance the timer.
    ///
    /// `busy` covers every other reason not to poll on this tick: a command in flight, or the
    /// exclusive mode being active.
    pub fn tick(&mut self, now: Instant, writability: Writability, busy: bool) -> Tick {
        let Some(due) = self.next_due else {
            return Tick::NotDue;
        };
        if self.state != PollState::Running || now < due {
            return Tick::NotDue;
        }

        if writability == Writability::Closed {
            warn!("channel no longer writable");
            self.cancel();
            return Tick::Cancelled;
        }

        // Missed periods are not made up for.
        let mut next = due + self.period;
        if next <= now {
            next = now + self.period;
        }
        self.next_due = Some(next);

        if busy || writability == Writability::Busy {
            Tick::Skipped
        } else {
            Tick::Poll
        }
    }
}

/// A timer that fires once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OneShot {
    deadline: Option<Instant>,
}

impl OneShot {
    pub const fn new() -> Self {
        Self { deadline: None }
    }

    pub fn arm(&mut self, now: Instant, delay: Duration) {
        self.deadline = Some(now + delay);
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// True exactly once, on the first call at or after the deadline.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
