//! One device on one channel.
//!
//! A [`ProtocolSession`] owns its channel for its whole life and is driven by calling
//! [`ProtocolSession::poll`] from the owner's event loop. Each call:
//!
//! 1. fires the handshake and release timers,
//! 2. reads everything the channel has ready, frames it into lines and dispatches them,
//! 3. expires a command that has waited too long for its terminal line,
//! 4. ticks the polling loop.
//!
//! Nothing here blocks. Reads only happen after `read_ready` said so, and a read returning zero
//! bytes is end of stream.

use embedded_io::{Error as _, ErrorKind, Read, ReadReady, Write, WriteReady};
use heapless::String;
use tracing::{debug, info, trace, warn};

use crate::{
    channel::{Channel, SerialConfig, Transport},
    codec::{Codec, Completion, Discipline, Event, Identity},
    command::Command,
    error::{Error, Result},
    framer::{FramerError, LineFramer},
    poll::{OneShot, POLL_PERIOD, PollingLoop, Tick, Writability},
    scheduler::{CommandScheduler, InFlightCommand, PendingCommand},
    telemetry::{Telemetry, TelemetrySnapshot},
    types::{Duration, Instant},
};

/// Bytes read from the channel per call.
const CHUNK_LEN: usize = 32;

/// Callbacks from a session to whoever presents the device.
///
/// Every method defaults to doing nothing.
pub trait SessionObserver {
    /// The device identified itself. Reported once per session.
    fn on_identified(&mut self, _identity: &Identity) {}

    /// A single field changed. Updates from one frame are reported back to back, after the
    /// whole frame decoded.
    fn on_telemetry(&mut self, _update: &Telemetry) {}

    /// No identification arrived in time. The session releases its channel after the grace
    /// period.
    fn on_unrecognized(&mut self) {}

    fn on_connect_failed(&mut self, _kind: ErrorKind) {}

    fn on_command_complete(&mut self, _command: &Command, _completion: Completion) {}

    /// The session is finished and can be discarded.
    fn on_closed(&mut self) {}
}

impl<T: SessionObserver + ?Sized> SessionObserver for &mut T {
    fn on_identified(&mut self, identity: &Identity) {
        (**self).on_identified(identity)
    }

    fn on_telemetry(&mut self, update: &Telemetry) {
        (**self).on_telemetry(update)
    }

    fn on_unrecognized(&mut self) {
        (**self).on_unrecognized()
    }

    fn on_connect_failed(&mut self, kind: ErrorKind) {
        (**self).on_connect_failed(kind)
    }

    fn on_command_complete(&mut self, command: &Command, completion: Completion) {
        (**self).on_command_complete(command, completion)
    }

    fn on_closed(&mut self) {
        (**self).on_closed()
    }
}

/// Timing of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub poll_period: Duration,
    /// How long the device has to identify itself.
    pub handshake_timeout: Duration,
    /// How long an unrecognized device keeps its channel before it is released.
    pub release_grace: Duration,
    /// How long a command may wait for its terminal line. `None` waits forever.
    pub response_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_period: POLL_PERIOD,
            handshake_timeout: Duration::millis(4000),
            release_grace: Duration::millis(4000),
            response_timeout: Some(Duration::millis(1000)),
        }
    }
}

impl SessionConfig {
    pub fn with_poll_period(mut self, period: Duration) -> Self {
        self.poll_period = period;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_release_grace(mut self, grace: Duration) -> Self {
        self.release_grace = grace;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.response_timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the device to identify itself.
    Discovering,
    Ready,
    /// Identification timed out, the channel is about to be released.
    Unrecognized,
    /// Terminal. The channel is gone.
    Closed,
}

pub struct ProtocolSession<S: Channel, C: Codec, O: SessionObserver, const L: usize = 128> {
    channel: Option<S>,
    codec: C,
    observer: O,
    config: SessionConfig,
    state: SessionState,
    framer: LineFramer<L>,
    scheduler: CommandScheduler,
    poller: PollingLoop,
    handshake: OneShot,
    release: OneShot,
    identity: Option<Identity>,
    snapshot: TelemetrySnapshot,
    /// Set while a mutually exclusive mode (audio playback) owns the device.
    exclusive: bool,
}

impl<S: Channel, C: Codec, O: SessionObserver, const L: usize> ProtocolSession<S, C, O, L> {
    /// Wrap an already open channel. Nothing is written until [`Self::start`].
    pub fn new(channel: S, codec: C, observer: O, config: SessionConfig) -> Self {
        Self {
            framer: LineFramer::new(codec.delimiter()),
            channel: Some(channel),
            codec,
            observer,
            poller: PollingLoop::new(config.poll_period),
            config,
            state: SessionState::Discovering,
            scheduler: CommandScheduler::new(),
            handshake: OneShot::new(),
            release: OneShot::new(),
            identity: None,
            snapshot: TelemetrySnapshot::default(),
            exclusive: false,
        }
    }

    /// Open a channel through `transport` and start a session on it.
    ///
    /// Failures are reported to the observer as well as returned. A channel whose identify
    /// command cannot be written is handed back to the transport.
    pub fn connect<T: Transport<Channel = S>>(
        transport: &mut T,
        serial_config: &SerialConfig,
        codec: C,
        mut observer: O,
        config: SessionConfig,
        now: Instant,
    ) -> Result<Self, S::Error> {
        let channel = match transport.open(serial_config) {
            Ok(channel) => channel,
            Err(err) => {
                warn!(kind = ?err.kind(), baud_rate = serial_config.baud_rate, "failed to open channel");
                observer.on_connect_failed(err.kind());
                return Err(Error::ConnectionFailed(err));
            }
        };

        let mut session = Self::new(channel, codec, observer, config);
        if let Err(err) = session.start(now) {
            if let Error::SerialError(ref io) = err {
                session.observer.on_connect_failed(io.kind());
            }
            if let Some(channel) = session.channel.take() {
                transport.close(channel);
            }
            return Err(err);
        }
        Ok(session)
    }

    /// Send the identify command and arm the handshake timer.
    pub fn start(&mut self, now: Instant) -> Result<(), S::Error> {
        if self.state != SessionState::Discovering {
            return Err(Error::SessionClosed);
        }
        info!(identify = self.codec.identify(), "starting session");
        self.handshake.arm(now, self.config.handshake_timeout);
        let identify = Command::new(self.codec.identify(), "")?;
        self.submit(identify, now)
    }

    /// Run one turn of the event loop.
    ///
    /// Returns [`Error::SessionClosed`] once the session has been torn down. Read errors tear the
    /// session down and are returned. Write errors are returned but leave the session running.
    pub fn poll(&mut self, now: Instant) -> Result<(), S::Error> {
        if self.state == SessionState::Closed {
            return Err(Error::SessionClosed);
        }

        if self.release.fire(now) {
            info!("releasing unrecognized device");
            self.teardown();
            return Ok(());
        }

        if self.handshake.fire(now) && self.state == SessionState::Discovering {
            warn!("device did not identify itself");
            self.state = SessionState::Unrecognized;
            self.poller.cancel();
            self.scheduler.reset();
            self.release.arm(now, self.config.release_grace);
            self.observer.on_unrecognized();
        }

        if !self.read_available(now)? {
            return Ok(());
        }

        if let Some(timeout) = self.config.response_timeout
            && self.scheduler.is_overdue(now, timeout)
        {
            warn!(
                command = self.scheduler.in_flight().map(|f| f.command.name()),
                "no response, giving up on command"
            );
            self.finish(Completion::TimedOut, now)?;
        }

        self.tick_poller(now)
    }

    /// Queue a command for the device.
    ///
    /// The command is written straight away if the channel is free. A write failure is returned
    /// here, the command still counts as in flight.
    pub fn submit_command(&mut self, name: &str, args: &str, now: Instant) -> Result<(), S::Error> {
        if matches!(self.state, SessionState::Unrecognized | SessionState::Closed) {
            return Err(Error::SessionClosed);
        }
        let command = Command::new(name, args)?;
        self.submit(command, now)
    }

    /// Enter or leave the mode that suspends polling.
    pub fn set_exclusive(&mut self, exclusive: bool) {
        if exclusive != self.exclusive {
            debug!(exclusive, "exclusive mode changed");
        }
        self.exclusive = exclusive;
    }

    /// Tear the session down and hand the channel back.
    ///
    /// Returns `None` if the session had already released it.
    pub fn close(&mut self) -> Option<S> {
        let channel = self.channel.take();
        if self.state != SessionState::Closed {
            self.shutdown();
        }
        channel
    }

    /// Inspection and raw access, for interactive debugging.
    pub fn debug(&mut self) -> DebugPort<'_, S, C, O, L> {
        DebugPort { session: self }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn snapshot(&self) -> &TelemetrySnapshot {
        &self.snapshot
    }

    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    pub fn channel_mut(&mut self) -> Option<&mut S> {
        self.channel.as_mut()
    }

    /// Drain the channel. Returns `false` if the session was torn down.
    ///
    /// Every line a chunk completes is dispatched, even after one of them failed. The first
    /// failure is returned once the chunk is done.
    fn read_available(&mut self, now: Instant) -> Result<bool, S::Error> {
        let mut chunk = [0u8; CHUNK_LEN];
        loop {
            let Some(channel) = self.channel.as_mut() else {
                return Ok(false);
            };
            let read = match channel.read_ready() {
                Ok(false) => return Ok(true),
                Ok(true) => channel.read(&mut chunk),
                Err(err) => Err(err),
            };

            match read {
                Ok(0) => {
                    info!("end of stream");
                    self.teardown();
                    return Ok(false);
                }
                Ok(n) => {
                    trace!(bytes = n, "read");
                    let mut first_error = None;
                    let mut rest = &chunk[..n];
                    while !rest.is_empty() {
                        let (consumed, line) = self.framer.feed(rest);
                        rest = &rest[consumed..];
                        match line {
                            Some(Ok(line)) => {
                                if let Err(err) = self.handle_line(&line, now) {
                                    first_error.get_or_insert(err);
                                }
                            }
                            Some(Err(FramerError::Overflow)) => {
                                warn!(capacity = L, "line buffer overflow, clearing");
                            }
                            Some(Err(FramerError::InvalidUtf8)) => {
                                debug!("dropping line that is not utf-8");
                            }
                            None => {}
                        }
                    }
                    if let Some(err) = first_error {
                        return Err(err);
                    }
                }
                Err(err) => {
                    warn!(?err, "read failed, closing session");
                    self.teardown();
                    return Err(Error::SerialError(err));
                }
            }
        }
    }

    fn handle_line(&mut self, line: &str, now: Instant) -> Result<(), S::Error> {
        let line = line.trim_matches(['\r', '\n']);
        if line.is_empty() {
            return Ok(());
        }
        trace!(line, "received");

        if self.state == SessionState::Unrecognized {
            trace!(line, "ignoring line from unrecognized device");
            return Ok(());
        }

        let in_flight: Option<Command> = match self.codec.discipline() {
            Discipline::Direct => None,
            Discipline::Queued => {
                let Some(InFlightCommand { command, .. }) = self.scheduler.in_flight() else {
                    trace!(line, "discarding unsolicited line");
                    return Ok(());
                };
                if let Some(completion) = self.codec.completion(line) {
                    return self.finish(completion, now);
                }
                Some(command.clone())
            }
        };

        let name = in_flight.as_ref().map(Command::name);
        let events = match self.codec.decode(name, line) {
            Ok(events) => events,
            Err(err) => {
                debug!(%err, line, "discarding malformed line");
                return Ok(());
            }
        };

        for event in events {
            match event {
                Event::Identified(identity) => self.identified(identity, now),
                Event::Telemetry(update) => {
                    self.snapshot.apply(&update);
                    self.observer.on_telemetry(&update);
                }
            }
        }
        Ok(())
    }

    fn identified(&mut self, identity: Identity, now: Instant) {
        if self.state != SessionState::Discovering {
            trace!(model = identity.model.as_str(), "already identified");
            return;
        }
        info!(
            model = identity.model.as_str(),
            name = identity.name.as_str(),
            serial_number = identity.serial_number.as_str(),
            "device identified"
        );
        self.state = SessionState::Ready;
        self.handshake.disarm();
        if self.codec.telemetry_request().is_some() {
            self.poller.start(now);
        }
        self.observer.on_identified(&identity);
        self.identity = Some(identity);
    }

    /// Complete the in-flight command and write whatever the scheduler releases next.
    fn finish(&mut self, completion: Completion, now: Instant) -> Result<(), S::Error> {
        let (finished, next) = self.scheduler.complete(now);
        if let Some(command) = finished {
            debug!(command = command.name(), ?completion, "command complete");
            self.observer.on_command_complete(&command, completion);
        }
        match next {
            Some(command) => self.write_command(&command),
            None => Ok(()),
        }
    }

    fn submit(&mut self, command: Command, now: Instant) -> Result<(), S::Error> {
        match self.codec.discipline() {
            Discipline::Direct => self.write_command(&command),
            Discipline::Queued => match self.scheduler.submit(command, now)? {
                Some(command) => self.write_command(&command),
                None => Ok(()),
            },
        }
    }

    fn tick_poller(&mut self, now: Instant) -> Result<(), S::Error> {
        let Some(request) = self.codec.telemetry_request() else {
            return Ok(());
        };
        let Some(channel) = self.channel.as_mut() else {
            return Ok(());
        };
        let writability = match channel.write_ready() {
            Ok(true) => Writability::Ready,
            Ok(false) => Writability::Busy,
            Err(err) => {
                debug!(?err, "write readiness failed");
                Writability::Closed
            }
        };
        let busy = self.exclusive || self.scheduler.in_flight().is_some();

        match self.poller.tick(now, writability, busy) {
            Tick::Poll => self.submit(Command::new(request, "")?, now),
            Tick::NotDue | Tick::Skipped | Tick::Cancelled => Ok(()),
        }
    }

    fn write_command(&mut self, command: &Command) -> Result<(), S::Error> {
        let mut line: String<L> = String::new();
        self.codec.encode(command, &mut line)?;
        self.write_raw(line.as_bytes())
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<(), S::Error> {
        let channel = self.channel.as_mut().ok_or(Error::SessionClosed)?;
        trace!(bytes = bytes.len(), "write");
        channel.write_all(bytes).map_err(Error::SerialError)?;
        channel.flush().map_err(Error::SerialError)
    }

    /// Drop the channel and tell the observer.
    fn teardown(&mut self) {
        drop(self.channel.take());
        self.shutdown();
    }

    fn shutdown(&mut self) {
        info!("session closed");
        self.state = SessionState::Closed;
        self.poller.cancel();
        self.handshake.disarm();
        self.release.disarm();
        self.scheduler.reset();
        self.framer.clear();
        self.observer.on_closed();
    }
}

/// Per-session debugging access, see [`ProtocolSession::debug`].
pub struct DebugPort<'a, S: Channel, C: Codec, O: SessionObserver, const L: usize> {
    session: &'a mut ProtocolSession<S, C, O, L>,
}

impl<S: Channel, C: Codec, O: SessionObserver, const L: usize> DebugPort<'_, S, C, O, L> {
    /// Write bytes as they are, bypassing the scheduler.
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<(), S::Error> {
        debug!(bytes = bytes.len(), "raw debug write");
        self.session.write_raw(bytes)
    }

    pub fn snapshot(&self) -> &TelemetrySnapshot {
        &self.session.snapshot
    }

    pub fn in_flight(&self) -> Option<&InFlightCommand> {
        self.session.scheduler.in_flight()
    }

    pub fn queued(&self) -> &[PendingCommand] {
        self.session.scheduler.queued()
    }

    /// Bytes buffered towards the next line.
    pub fn buffered(&self) -> usize {
        self.session.framer.buffered()
    }
}
