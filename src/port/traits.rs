//! Traits abstracting the native comm layer.
//!
//! `CommBackend` and `CommDevice` form the seam between the portable port
//! logic and the OS: the Windows backend implements them over overlapped
//! I/O, and [`MockBackend`](crate::MockBackend) implements them in memory so
//! lifecycle, timeout and concurrency behavior can be tested without
//! hardware.

use crate::error::PortError;
use crate::port::line::LineControl;
use crate::port::timeout::CommTimeouts;
use std::fmt;

/// Factory for open devices.
///
/// `open` receives the fully qualified device path plus the derived
/// line-control and timeout records, and either returns a ready device or an
/// error after releasing every resource it acquired along the way.
pub trait CommBackend: Send + Sync {
    /// Open `path` and apply `line` and `timeouts` to the fresh handle.
    fn open(
        &self,
        path: &str,
        line: &LineControl,
        timeouts: &CommTimeouts,
    ) -> Result<Box<dyn CommDevice>, PortError>;
}

/// An open comm device.
///
/// Methods take `&self` so one read and one write may proceed concurrently;
/// the owning port serializes calls per direction, so an implementation only
/// has to tolerate one in-flight operation per direction at a time. Dropping
/// the device releases the handle and both completion objects together.
pub trait CommDevice: Send + Sync + fmt::Debug {
    /// Read into `buf`, blocking until at least one byte is available, the
    /// configured timeout elapses (`Ok(0)`), or the device fails.
    fn read_bytes(&self, buf: &mut [u8]) -> Result<usize, PortError>;

    /// Write `buf`, blocking until the OS accepts it or the device fails.
    fn write_bytes(&self, buf: &[u8]) -> Result<usize, PortError>;

    /// Discard unsent transmit data and unread receive data in one call.
    fn purge(&self) -> Result<(), PortError>;
}
