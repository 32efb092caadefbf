//! Port lifecycle and blocking I/O.
//!
//! `SerialPort` owns the validated configuration and the open/closed state
//! machine. The real work of turning overlapped OS primitives into blocking
//! calls lives in the backend behind [`CommBackend`]; this module contributes
//! the state checks, device-path qualification, and the per-direction locks
//! that serialize reads against reads and writes against writes.

pub mod line;
pub mod mock;
pub mod timeout;
pub mod traits;

#[cfg(windows)]
pub mod windows;

pub use line::LineControl;
pub use mock::MockBackend;
pub use timeout::CommTimeouts;
pub use traits::{CommBackend, CommDevice};

use crate::config::SerialConfig;
use crate::error::PortError;
use parking_lot::Mutex;
use tracing::debug;

/// Qualify a bare device name into the extended-length device-path form.
///
/// `COM10` becomes `\\.\COM10`; anything already starting with a backslash
/// is passed through unchanged, so qualification is idempotent.
pub(crate) fn qualify_address(address: &str) -> String {
    if !address.trim().is_empty() && !address.starts_with('\\') {
        format!(r"\\.\{address}")
    } else {
        address.to_string()
    }
}

/// The live resource behind an open port: the device plus one lock per
/// direction. The locks are independent so a blocked read never delays a
/// write on the same port, which request/response protocols rely on.
struct OpenPort {
    device: Box<dyn CommDevice>,
    read_lock: Mutex<()>,
    write_lock: Mutex<()>,
}

enum PortState {
    Closed,
    Open(OpenPort),
}

/// A serial port with blocking read/write semantics.
///
/// Created closed from a validated [`SerialConfig`]; `open` acquires the OS
/// resources and `close` releases them. Reads and writes take `&self` and
/// may run concurrently from different threads, while `open`/`close` take
/// `&mut self`, so the borrow checker rules out closing a port that another
/// thread is still using.
///
/// # Example
///
/// ```
/// use comport::{MockBackend, SerialConfig, SerialPort};
///
/// let backend = MockBackend::loopback();
/// let mut port = SerialPort::new(SerialConfig::new("COM3"))?;
/// port.open_with(&backend)?;
///
/// port.write(b"ping")?;
/// let mut buf = [0u8; 16];
/// let n = port.read(&mut buf)?;
/// assert_eq!(&buf[..n], b"ping");
///
/// port.close()?;
/// # Ok::<(), comport::PortError>(())
/// ```
pub struct SerialPort {
    config: SerialConfig,
    state: PortState,
}

impl SerialPort {
    /// Validate `config` (after zero-to-default normalization) and build a
    /// closed port. No OS resource is touched here.
    pub fn new(config: SerialConfig) -> Result<Self, PortError> {
        let config = config.normalized();
        config.validate()?;
        Ok(Self {
            config,
            state: PortState::Closed,
        })
    }

    /// The validated configuration this port was built from.
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    /// Whether the port currently holds an open device.
    pub fn is_open(&self) -> bool {
        matches!(self.state, PortState::Open(_))
    }

    /// Open the port with the default OS backend.
    #[cfg(windows)]
    pub fn open(&mut self) -> Result<(), PortError> {
        self.open_with(&windows::WindowsBackend)
    }

    /// Open the port with an explicit backend.
    ///
    /// The line-control codes and the native timeout record are recomputed
    /// from the configuration on every call, and the backend allocates fresh
    /// completion objects, so a reopened port never reuses resources from a
    /// previous open. On failure the port stays closed and is usable for a
    /// retry; the backend contract guarantees no partial allocation
    /// survives.
    pub fn open_with(&mut self, backend: &dyn CommBackend) -> Result<(), PortError> {
        if self.is_open() {
            return Err(PortError::AlreadyOpen);
        }

        let line = LineControl::from_config(&self.config)?;
        let timeouts = CommTimeouts::for_read_timeout(self.config.read_timeout);
        let path = qualify_address(&self.config.address);

        debug!(address = %path, baud = line.baud_rate, "opening serial port");
        let device = backend.open(&path, &line, &timeouts)?;

        self.state = PortState::Open(OpenPort {
            device,
            read_lock: Mutex::new(()),
            write_lock: Mutex::new(()),
        });
        Ok(())
    }

    /// Close the port, releasing the device handle and both completion
    /// objects together. Idempotent: closing a closed or never-opened port
    /// is a no-op.
    pub fn close(&mut self) -> Result<(), PortError> {
        if self.is_open() {
            debug!(address = %self.config.address, "closing serial port");
        }
        self.state = PortState::Closed;
        Ok(())
    }

    /// Read into `buf`, blocking until at least one byte arrives or the
    /// configured read timeout elapses.
    ///
    /// Returns the number of bytes read. Zero with `Ok` means the timeout
    /// expired with no data — that is not an error, and only the caller's
    /// protocol can distinguish it from a quiet device. Concurrent reads on
    /// the same port are serialized; a concurrent write is not delayed.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, PortError> {
        let port = self.open_port()?;
        if buf.is_empty() {
            return Ok(0);
        }
        let _direction = port.read_lock.lock();
        port.device.read_bytes(buf)
    }

    /// Write `buf`, blocking until the OS accepts it or the device fails.
    ///
    /// Returns the number of bytes written, which on failure may be less
    /// than `buf.len()`; the error carries the same partial count. Writes
    /// are not bounded by the read timeout.
    pub fn write(&self, buf: &[u8]) -> Result<usize, PortError> {
        let port = self.open_port()?;
        let _direction = port.write_lock.lock();
        port.device.write_bytes(buf)
    }

    /// Discard data written to the port but not yet transmitted and data
    /// received but not yet read, in both directions at once.
    pub fn flush(&self) -> Result<(), PortError> {
        self.open_port()?.device.purge()
    }

    fn open_port(&self) -> Result<&OpenPort, PortError> {
        match &self.state {
            PortState::Open(port) => Ok(port),
            PortState::Closed => Err(PortError::NotOpen),
        }
    }
}

impl std::fmt::Debug for SerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPort")
            .field("address", &self.config.address)
            .field("baud_rate", &self.config.baud_rate)
            .field("open", &self.is_open())
            .finish()
    }
}
