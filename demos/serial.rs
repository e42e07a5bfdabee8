use std::env;

use inquire::Select;
use psu_serial_engine::{
    AddressedCodec, Codec, LineTaggedCodec, ProtocolSession, SerialConfig, SessionConfig,
    SessionObserver, SessionState, Transport,
    codec::{Completion, Identity},
    command::Command,
    telemetry::Telemetry,
    types::Instant,
};
use serialport::{DataBits, SerialPort, StopBits};

// Configuration constants - adjust these for your setup
const SERIAL_TIMEOUT_MS: u64 = 50;
const RUN_TIME_MS: u64 = 10_000;
const LOOP_DELAY_MS: u64 = 5;
// Sent once the device has identified itself, in the addressed family's units (centivolts).
const ADDRESSED_SETUP: [(&str, &str); 2] = [("VOLT", "050"), ("SOUT", "0")];
const TAGGED_SETUP: [(&str, &str); 2] = [("vset", "5.000"), ("output", "1")];

pub struct PortWrapper(Box<dyn SerialPort>);

#[derive(Debug)]
pub struct IoError(std::io::Error);

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl embedded_io::Error for IoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self.0.kind() {
            std::io::ErrorKind::NotFound => embedded_io::ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => embedded_io::ErrorKind::PermissionDenied,
            std::io::ErrorKind::NotConnected => embedded_io::ErrorKind::NotConnected,
            std::io::ErrorKind::BrokenPipe => embedded_io::ErrorKind::BrokenPipe,
            std::io::ErrorKind::InvalidInput => embedded_io::ErrorKind::InvalidInput,
            std::io::ErrorKind::InvalidData => embedded_io::ErrorKind::InvalidData,
            std::io::ErrorKind::TimedOut => embedded_io::ErrorKind::TimedOut,
            std::io::ErrorKind::Interrupted => embedded_io::ErrorKind::Interrupted,
            std::io::ErrorKind::Unsupported => embedded_io::ErrorKind::Unsupported,
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for PortWrapper {
    type Error = IoError;
}

impl embedded_io::Read for PortWrapper {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        std::io::Read::read(&mut self.0, buf).map_err(IoError)
    }
}

impl embedded_io::ReadReady for PortWrapper {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        let pending = self
            .0
            .bytes_to_read()
            .map_err(|err| IoError(err.into()))?;
        Ok(pending > 0)
    }
}

impl embedded_io::Write for PortWrapper {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        std::io::Write::write(&mut self.0, buf).map_err(IoError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        std::io::Write::flush(&mut self.0).map_err(IoError)
    }
}

impl embedded_io::WriteReady for PortWrapper {
    fn write_ready(&mut self) -> Result<bool, Self::Error> {
        let queued = self
            .0
            .bytes_to_write()
            .map_err(|err| IoError(err.into()))?;
        Ok(queued == 0)
    }
}

struct PortTransport {
    port_name: String,
}

impl Transport for PortTransport {
    type Channel = PortWrapper;

    fn open(&mut self, config: &SerialConfig) -> Result<PortWrapper, IoError> {
        let data_bits = match config.data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            _ => DataBits::Eight,
        };
        let stop_bits = match config.stop_bits {
            2 => StopBits::Two,
            _ => StopBits::One,
        };
        let parity = match config.parity {
            psu_serial_engine::channel::Parity::None => serialport::Parity::None,
            psu_serial_engine::channel::Parity::Odd => serialport::Parity::Odd,
            psu_serial_engine::channel::Parity::Even => serialport::Parity::Even,
        };
        serialport::new(&self.port_name, config.baud_rate)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(parity)
            .timeout(std::time::Duration::from_millis(SERIAL_TIMEOUT_MS))
            .open()
            .map(PortWrapper)
            .map_err(|err| IoError(err.into()))
    }
}

/// Prints everything the session reports.
#[derive(Default)]
struct Printer {
    identified: bool,
}

impl SessionObserver for Printer {
    fn on_identified(&mut self, identity: &Identity) {
        println!(
            "Identified: model {} name {} serial {:?}",
            identity.model, identity.name, identity.serial_number
        );
        self.identified = true;
    }

    fn on_telemetry(&mut self, update: &Telemetry) {
        println!("{:?}", update);
    }

    fn on_unrecognized(&mut self) {
        eprintln!("Device did not identify itself");
    }

    fn on_connect_failed(&mut self, kind: embedded_io::ErrorKind) {
        eprintln!("Failed to connect: {:?}", kind);
    }

    fn on_command_complete(&mut self, command: &Command, completion: Completion) {
        println!("{} {} -> {:?}", command.name(), command.args(), completion);
    }

    fn on_closed(&mut self) {
        println!("Session closed");
    }
}

fn run<C: Codec>(port_name: String, codec: C, setup: &[(&str, &str)]) {
    let started = std::time::Instant::now();
    let now = || Instant::from_ticks(started.elapsed().as_millis() as u64);

    let mut transport = PortTransport { port_name };
    let mut session: ProtocolSession<PortWrapper, C, Printer> = match ProtocolSession::connect(
        &mut transport,
        &SerialConfig::default(),
        codec,
        Printer::default(),
        SessionConfig::default(),
        now(),
    ) {
        Ok(session) => session,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    };

    let mut setup_sent = false;
    while started.elapsed().as_millis() < RUN_TIME_MS as u128 {
        if let Err(err) = session.poll(now()) {
            eprintln!("{}", err);
        }
        if session.state() == SessionState::Closed {
            break;
        }

        if session.observer().identified && !setup_sent {
            for (name, args) in setup {
                if let Err(err) = session.submit_command(name, args, now()) {
                    eprintln!("{} failed: {}", name, err);
                }
            }
            setup_sent = true;
        }

        std::thread::sleep(std::time::Duration::from_millis(LOOP_DELAY_MS));
    }

    println!("\n--- Last known state ---");
    println!("{:#?}", session.snapshot());
    if let Some(port) = session.close() {
        transport.close(port);
    }
}

fn main() {
    // Get serial port from command line arg or interactive selection
    let port_name = env::args().nth(1).unwrap_or_else(|| {
        let ports = serialport::available_ports().expect("Failed to enumerate serial ports");

        if ports.is_empty() {
            eprintln!("No serial ports found!");
            std::process::exit(1);
        }

        let port_names: Vec<String> = ports.iter().map(|p| p.port_name.clone()).collect();

        Select::new("Select a serial port:", port_names)
            .prompt()
            .expect("Failed to select port")
    });

    let family = env::args().nth(2).unwrap_or_else(|| {
        Select::new(
            "Select the device family:",
            vec!["addressed".to_owned(), "tagged".to_owned()],
        )
        .prompt()
        .expect("Failed to select device family")
    });

    println!("Using port: {} ({})", port_name, family);

    match family.as_str() {
        "tagged" => run(port_name, LineTaggedCodec::new(), &TAGGED_SETUP),
        _ => run(port_name, AddressedCodec::default(), &ADDRESSED_SETUP),
    }
}
