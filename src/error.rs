//! Error types for serial port operations.
//!
//! Configuration and state problems are detected before any native call is
//! made; native failures carry the OS error and the number of bytes already
//! transferred. A read timeout is deliberately *not* represented here — it
//! surfaces as a successful zero-byte read.

use thiserror::Error;

/// Errors that can occur while configuring or operating a serial port.
#[derive(Debug, Error)]
pub enum PortError {
    /// A configuration field failed validation before any OS resource was
    /// touched.
    #[error("configuration error: {0}")]
    Config(String),

    /// The data-bits value is not one of 5, 6, 7 or 8.
    #[error("unsupported serial data bits: {0}")]
    BadDataBits(u8),

    /// The stop-bits value is not a supported setting.
    #[error("unsupported stop bit setting")]
    BadStopBits,

    /// The parity value is not a supported setting.
    #[error("unsupported parity setting")]
    BadParity,

    /// An operation was attempted on a port that is not open.
    #[error("serial port is not open")]
    NotOpen,

    /// Attempted to open a port that is already open.
    #[error("serial port is already open")]
    AlreadyOpen,

    /// An OS resource could not be acquired while opening the port. All
    /// resources acquired earlier in the same open have been released.
    #[error("failed to acquire {what}: {source}")]
    Resource {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// A native read, write or purge call failed. `bytes` is the number of
    /// bytes transferred before the failure, which may be non-zero.
    #[error("I/O error after {bytes} bytes: {source}")]
    Io {
        bytes: usize,
        #[source]
        source: std::io::Error,
    },
}

impl PortError {
    /// Create a `Config` error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a `Resource` error for a named allocation step.
    pub fn resource(what: &'static str, source: std::io::Error) -> Self {
        Self::Resource { what, source }
    }

    /// Create an `Io` error carrying the partial transfer count.
    pub fn io(source: std::io::Error, bytes: usize) -> Self {
        Self::Io { bytes, source }
    }
}
