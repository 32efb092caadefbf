//! Translation of the semantic configuration into native line-control codes.
//!
//! The native device-control block encodes parity and stop bits as small
//! integers. The mapping lives here so an unsupported value fails at the
//! semantic layer instead of being rejected opaquely by the OS.

use crate::config::{Parity, SerialConfig, StopBits};
use crate::error::PortError;

/// Native parity code: no parity.
pub(crate) const NO_PARITY: u8 = 0;
/// Native parity code: odd parity.
pub(crate) const ODD_PARITY: u8 = 1;
/// Native parity code: even parity.
pub(crate) const EVEN_PARITY: u8 = 2;
/// Native parity code: mark parity.
pub(crate) const MARK_PARITY: u8 = 3;
/// Native parity code: space parity.
pub(crate) const SPACE_PARITY: u8 = 4;

/// Native stop-bit code: one stop bit.
pub(crate) const ONE_STOP_BIT: u8 = 0;
/// Native stop-bit code: one and a half stop bits.
pub(crate) const ONE5_STOP_BITS: u8 = 1;
/// Native stop-bit code: two stop bits.
pub(crate) const TWO_STOP_BITS: u8 = 2;

/// Line-control parameters in native encoding, ready to be written into a
/// device-control block. Binary mode and DTR assertion are applied
/// unconditionally by the backend; they are not configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineControl {
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: u8,
    pub stop_bits: u8,
}

impl LineControl {
    /// Map the semantic configuration into native codes, rejecting any value
    /// outside the supported enumerations before a native call is attempted.
    pub fn from_config(config: &SerialConfig) -> Result<Self, PortError> {
        if !matches!(config.data_bits, 5..=8) {
            return Err(PortError::BadDataBits(config.data_bits));
        }

        let parity = match config.parity {
            Parity::None => NO_PARITY,
            Parity::Odd => ODD_PARITY,
            Parity::Even => EVEN_PARITY,
            Parity::Mark => MARK_PARITY,
            Parity::Space => SPACE_PARITY,
        };

        let stop_bits = match config.stop_bits {
            StopBits::One => ONE_STOP_BIT,
            StopBits::OneAndHalf => ONE5_STOP_BITS,
            StopBits::Two => TWO_STOP_BITS,
        };

        Ok(Self {
            baud_rate: config.baud_rate,
            data_bits: config.data_bits,
            parity,
            stop_bits,
        })
    }
}
