//! We use this mocking module in unit tests to emulate a serial port.

use heapless::Vec;

const CAPACITY: usize = 512;

/// Our mock type used to emulate a serial port.
pub struct MockSerial {
    /// Data written by the code under test
    write_buffer: Vec<u8, CAPACITY>,
    /// Data waiting to be read by the code under test
    read_buffer: Vec<u8, CAPACITY>,
    /// Current position in the read buffer
    read_position: usize,
    /// Once the read buffer drains, reads report end of stream
    closed: bool,
    /// Flag to simulate write errors
    should_error_on_write: bool,
    /// Flag to simulate read errors
    should_error_on_read: bool,
    /// Result reported by `write_ready`
    writability: MockWritability,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockWritability {
    Ready,
    Busy,
    Gone,
}

#[derive(Debug, PartialEq, Eq)]
pub enum MockSerialError {
    /// Simulated buffer overflow
    BufferOverflow,
    /// Generic simulated error for testing
    SimulatedError,
    /// Would block - no data available
    WouldBlock,
    /// The port has been unplugged
    Disconnected,
}

impl core::fmt::Display for MockSerialError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl core::error::Error for MockSerialError {}

impl embedded_io::Error for MockSerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockSerialError::BufferOverflow => embedded_io::ErrorKind::OutOfMemory,
            MockSerialError::SimulatedError => embedded_io::ErrorKind::Other,
            MockSerialError::WouldBlock => embedded_io::ErrorKind::Other,
            MockSerialError::Disconnected => embedded_io::ErrorKind::NotConnected,
        }
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = MockSerialError;
}

impl embedded_io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        self.write_buffer
            .extend_from_slice(buf)
            .map_err(|_| MockSerialError::BufferOverflow)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        Ok(())
    }
}

impl embedded_io::WriteReady for MockSerial {
    fn write_ready(&mut self) -> Result<bool, Self::Error> {
        match self.writability {
            MockWritability::Ready => Ok(true),
            MockWritability::Busy => Ok(false),
            MockWritability::Gone => Err(MockSerialError::Disconnected),
        }
    }
}

impl embedded_io::Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_read {
            return Err(MockSerialError::SimulatedError);
        }

        let available = &self.read_buffer[self.read_position..];
        if available.is_empty() {
            return if self.closed {
                Ok(0)
            } else {
                Err(MockSerialError::WouldBlock)
            };
        }

        let bytes_to_read = core::cmp::min(buf.len(), available.len());
        buf[..bytes_to_read].copy_from_slice(&available[..bytes_to_read]);
        self.read_position += bytes_to_read;
        Ok(bytes_to_read)
    }
}

impl embedded_io::ReadReady for MockSerial {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        if self.should_error_on_read {
            return Err(MockSerialError::SimulatedError);
        }
        Ok(self.closed || self.read_position < self.read_buffer.len())
    }
}

impl MockSerial {
    /// Create a new MockSerial instance with empty buffers
    pub fn new() -> Self {
        Self {
            write_buffer: Vec::new(),
            read_buffer: Vec::new(),
            read_position: 0,
            closed: false,
            should_error_on_write: false,
            should_error_on_read: false,
            writability: MockWritability::Ready,
        }
    }

    /// Queue data to be returned by later reads, after anything still unread
    pub fn push_read_data(&mut self, data: &[u8]) -> Result<(), MockSerialError> {
        // Drop what has been consumed to make room.
        let unread = self.read_buffer.len() - self.read_position;
        self.read_buffer.copy_within(self.read_position.., 0);
        self.read_buffer.truncate(unread);
        self.read_position = 0;

        self.read_buffer
            .extend_from_slice(data)
            .map_err(|_| MockSerialError::BufferOverflow)
    }

    /// Get a reference to the data that was written to this mock serial port
    pub fn written_data(&self) -> &[u8] {
        &self.write_buffer
    }

    /// Written data as text, for protocol assertions
    pub fn written_str(&self) -> &str {
        core::str::from_utf8(&self.write_buffer).unwrap_or("<invalid utf-8>")
    }

    /// Clear the write buffer
    pub fn clear_written_data(&mut self) {
        self.write_buffer.clear();
    }

    /// Report end of stream once the pending read data is consumed
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Configure whether write operations should fail with an error
    pub fn set_write_error(&mut self, should_error: bool) {
        self.should_error_on_write = should_error;
    }

    /// Configure whether read operations should fail with an error
    pub fn set_read_error(&mut self, should_error: bool) {
        self.should_error_on_read = should_error;
    }

    /// Configure what `write_ready` reports
    pub fn set_writability(&mut self, writability: MockWritability) {
        self.writability = writability;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::{Error, Read, ReadReady, Write, WriteReady};

    #[test]
    fn test_write_data() {
        let mut mock = MockSerial::new();
        mock.write(b"Hello, ").unwrap();
        mock.write(b"World!").unwrap();
        assert_eq!(mock.written_data(), b"Hello, World!");

        mock.clear_written_data();
        assert!(mock.written_data().is_empty());
    }

    #[test]
    fn test_write_buffer_overflow() {
        let mut mock = MockSerial::new();
        let large_data = [0u8; CAPACITY + 1];
        assert_eq!(mock.write(&large_data), Err(MockSerialError::BufferOverflow));
    }

    #[test]
    fn test_read_in_pieces() {
        let mut mock = MockSerial::new();
        mock.push_read_data(b"Hello World").unwrap();

        let mut buffer1 = [0u8; 5];
        let mut buffer2 = [0u8; 6];
        assert_eq!(mock.read(&mut buffer1), Ok(5));
        assert_eq!(mock.read(&mut buffer2), Ok(6));
        assert_eq!(&buffer1, b"Hello");
        assert_eq!(&buffer2, b" World");
    }

    #[test]
    fn test_push_appends_to_unread_data() {
        let mut mock = MockSerial::new();
        mock.push_read_data(b"first").unwrap();

        let mut buffer = [0u8; 3];
        mock.read(&mut buffer).unwrap();
        mock.push_read_data(b"second").unwrap();

        let mut buffer = [0u8; 16];
        assert_eq!(mock.read(&mut buffer), Ok(8));
        assert_eq!(&buffer[..8], b"stsecond");
    }

    #[test]
    fn test_readiness_and_end_of_stream() {
        let mut mock = MockSerial::new();
        let mut buffer = [0u8; 10];
        assert_eq!(mock.read_ready(), Ok(false));
        assert_eq!(mock.read(&mut buffer), Err(MockSerialError::WouldBlock));

        mock.push_read_data(b"Hi").unwrap();
        mock.close();
        assert_eq!(mock.read_ready(), Ok(true));
        assert_eq!(mock.read(&mut buffer), Ok(2));

        // Closed and drained.
        assert_eq!(mock.read_ready(), Ok(true));
        assert_eq!(mock.read(&mut buffer), Ok(0));
    }

    #[test]
    fn test_error_simulation() {
        let mut mock = MockSerial::new();
        mock.set_write_error(true);
        assert_eq!(mock.write(b"test"), Err(MockSerialError::SimulatedError));
        assert_eq!(mock.flush(), Err(MockSerialError::SimulatedError));
        assert!(mock.written_data().is_empty());

        mock.set_write_error(false);
        assert!(mock.write(b"test").is_ok());

        mock.push_read_data(b"data").unwrap();
        mock.set_read_error(true);
        let mut buffer = [0u8; 10];
        assert_eq!(mock.read(&mut buffer), Err(MockSerialError::SimulatedError));
    }

    #[test]
    fn test_writability() {
        let mut mock = MockSerial::new();
        assert_eq!(mock.write_ready(), Ok(true));
        mock.set_writability(MockWritability::Busy);
        assert_eq!(mock.write_ready(), Ok(false));
        mock.set_writability(MockWritability::Gone);
        assert_eq!(mock.write_ready(), Err(MockSerialError::Disconnected));
    }

    #[test]
    fn test_error_kinds() {
        assert!(matches!(
            MockSerialError::BufferOverflow.kind(),
            embedded_io::ErrorKind::OutOfMemory
        ));
        assert!(matches!(
            MockSerialError::Disconnected.kind(),
            embedded_io::ErrorKind::NotConnected
        ));
    }
}
