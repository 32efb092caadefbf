//! Serial line configuration.
//!
//! `SerialConfig` is the caller-owned record describing which device to open
//! and how to frame bytes on the wire. Zero-valued fields are replaced by the
//! documented defaults before validation, so a record built with only an
//! address behaves like 9600-8-N-1.

use crate::error::PortError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default baud rate (9600 bps).
pub const DEFAULT_BAUD_RATE: u32 = 9600;
/// Default number of data bits (8).
pub const DEFAULT_DATA_BITS: u8 = 8;

fn default_baud() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_data_bits() -> u8 {
    DEFAULT_DATA_BITS
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    /// No parity bit.
    #[default]
    None,
    /// Parity bit keeps the count of ones odd.
    Odd,
    /// Parity bit keeps the count of ones even.
    Even,
    /// Parity bit is always 1.
    Mark,
    /// Parity bit is always 0.
    Space,
}

impl Parity {
    /// Parse the conventional one-letter parity symbol (`N`, `O`, `E`, `M`,
    /// `S`, case-insensitive). Anything else is rejected before a native
    /// call could see it.
    pub fn from_symbol(symbol: u8) -> Result<Self, PortError> {
        match symbol.to_ascii_uppercase() {
            b'N' => Ok(Self::None),
            b'O' => Ok(Self::Odd),
            b'E' => Ok(Self::Even),
            b'M' => Ok(Self::Mark),
            b'S' => Ok(Self::Space),
            _ => Err(PortError::BadParity),
        }
    }

    /// The one-letter symbol for this parity mode.
    pub fn symbol(self) -> u8 {
        match self {
            Self::None => b'N',
            Self::Odd => b'O',
            Self::Even => b'E',
            Self::Mark => b'M',
            Self::Space => b'S',
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    /// One stop bit.
    #[default]
    One,
    /// One and a half stop bits.
    OneAndHalf,
    /// Two stop bits.
    Two,
}

impl StopBits {
    /// Parse the raw stop-bit encoding used by wire-level configuration
    /// records: `1`, `15` (one and a half) or `2`.
    pub fn from_raw(raw: u8) -> Result<Self, PortError> {
        match raw {
            1 => Ok(Self::One),
            15 => Ok(Self::OneAndHalf),
            2 => Ok(Self::Two),
            _ => Err(PortError::BadStopBits),
        }
    }
}

/// Configuration for a serial port.
///
/// Immutable once handed to [`SerialPort::new`](crate::SerialPort::new); the
/// port keeps its own copy, so the record may be freely cloned and shared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Device path, e.g. `COM3`. Bare names are qualified into the extended
    /// device-path form (`\\.\COM3`) when the port is opened.
    pub address: String,

    /// Baud rate in bits per second. Zero selects the default (9600).
    #[serde(default = "default_baud")]
    pub baud_rate: u32,

    /// Data bits per character: 5, 6, 7 or 8. Zero selects the default (8).
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,

    /// Number of stop bits.
    #[serde(default)]
    pub stop_bits: StopBits,

    /// Parity checking mode.
    #[serde(default)]
    pub parity: Parity,

    /// Read timeout. `Duration::ZERO` means "block until at least one byte
    /// arrives"; any positive value bounds the wait for the first byte.
    /// Writes are never bounded by this value.
    #[serde(default)]
    pub read_timeout: Duration,
}

impl SerialConfig {
    /// Build a configuration for `address` with all other fields at their
    /// defaults (9600 baud, 8 data bits, one stop bit, no parity, blocking
    /// reads).
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DEFAULT_DATA_BITS,
            stop_bits: StopBits::default(),
            parity: Parity::default(),
            read_timeout: Duration::ZERO,
        }
    }

    /// Replace zero-valued numeric fields with their defaults.
    pub(crate) fn normalized(mut self) -> Self {
        if self.baud_rate == 0 {
            self.baud_rate = DEFAULT_BAUD_RATE;
        }
        if self.data_bits == 0 {
            self.data_bits = DEFAULT_DATA_BITS;
        }
        self
    }

    /// Validate the (already normalized) configuration. Runs entirely at the
    /// semantic layer: no OS resource is touched on failure.
    pub(crate) fn validate(&self) -> Result<(), PortError> {
        if self.address.trim().is_empty() {
            return Err(PortError::config("address is required"));
        }
        if !matches!(self.data_bits, 5..=8) {
            return Err(PortError::BadDataBits(self.data_bits));
        }
        Ok(())
    }
}
