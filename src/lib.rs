//! Blocking serial port I/O over Windows overlapped primitives.
//!
//! The serial device class on Windows only exposes asynchronous I/O; this
//! crate hides that behind an ordinary synchronous API. Callers validate a
//! [`SerialConfig`], open a [`SerialPort`], and then read, write and flush
//! with blocking semantics: reads wait for the first byte up to the
//! configured timeout (a timeout is a successful zero-byte read, not an
//! error), writes block until the OS accepts the buffer.
//!
//! # Modules
//!
//! - [`config`]: the validated line configuration record and its enums
//! - [`error`]: the `PortError` taxonomy
//! - [`port`]: port lifecycle, direction locks, and the comm backends
//!   (Windows overlapped I/O plus an in-memory mock for tests)
//!
//! # Example
//!
//! ```no_run
//! use comport::{SerialConfig, SerialPort};
//! use std::time::Duration;
//!
//! let mut config = SerialConfig::new("COM3");
//! config.baud_rate = 115_200;
//! config.read_timeout = Duration::from_millis(100);
//!
//! let mut port = SerialPort::new(config)?;
//! # #[cfg(windows)]
//! port.open()?;
//!
//! port.write(&[0x01, 0x03, 0x00, 0x01, 0x00, 0x01, 0xD5, 0xCA])?;
//! let mut buf = [0u8; 128];
//! let n = port.read(&mut buf)?; // 0 on timeout
//! port.close()?;
//! # Ok::<(), comport::PortError>(())
//! ```

pub mod config;
pub mod error;
pub mod port;

pub use config::{Parity, SerialConfig, StopBits, DEFAULT_BAUD_RATE, DEFAULT_DATA_BITS};
pub use error::PortError;
pub use port::{CommBackend, CommDevice, CommTimeouts, LineControl, MockBackend, SerialPort};

#[cfg(windows)]
pub use port::windows::WindowsBackend;
