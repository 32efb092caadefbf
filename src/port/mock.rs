//! Mock comm backend for testing.
//!
//! `MockBackend` implements [`CommBackend`] entirely in memory: reads drain a
//! queue of enqueued bytes honoring the native timeout record the way the OS
//! would, writes are logged (and optionally looped back into the read
//! queue), and every handle/event acquisition and release is counted so
//! tests can prove that opens and closes balance.
//!
//! The backend is cheap to clone; clones share the same simulated wire, so a
//! test can keep one handle for inspection while the port owns the device.
//!
//! # Example
//! ```
//! use comport::{MockBackend, SerialConfig, SerialPort};
//!
//! let backend = MockBackend::new();
//! backend.enqueue_read(b"ready\r\n");
//!
//! let mut port = SerialPort::new(SerialConfig::new("COM9"))?;
//! port.open_with(&backend)?;
//!
//! let mut buf = [0u8; 32];
//! let n = port.read(&mut buf)?;
//! assert_eq!(&buf[..n], b"ready\r\n");
//!
//! port.write(b"go")?;
//! assert_eq!(backend.write_log(), vec![b"go".to_vec()]);
//! # Ok::<(), comport::PortError>(())
//! ```

use crate::error::PortError;
use crate::port::line::LineControl;
use crate::port::timeout::CommTimeouts;
use crate::port::traits::{CommBackend, CommDevice};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Resources a real open acquires: the device handle plus one completion
/// event per direction.
const RESOURCES_PER_OPEN: usize = 3;

#[derive(Default)]
struct Wire {
    rx: Mutex<VecDeque<u8>>,
    rx_ready: Condvar,
    writes: Mutex<Vec<Vec<u8>>>,
    loopback: bool,

    acquired: AtomicUsize,
    released: AtomicUsize,
    devices_created: AtomicUsize,
    purges: AtomicUsize,
    opened_paths: Mutex<Vec<String>>,
    last_line: Mutex<Option<LineControl>>,
    last_timeouts: Mutex<Option<CommTimeouts>>,

    fail_next_open: AtomicBool,
    fail_next_read: AtomicBool,
    fail_write_after: Mutex<Option<usize>>,
    write_delay: Mutex<Duration>,

    read_in_flight: AtomicBool,
    write_in_flight: AtomicBool,
}

/// In-memory [`CommBackend`] for tests and examples.
#[derive(Clone, Default)]
pub struct MockBackend {
    wire: Arc<Wire>,
}

impl MockBackend {
    /// A backend whose reads only see explicitly enqueued bytes.
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend that echoes every written byte back into the read queue,
    /// simulating a loopback-wired device.
    pub fn loopback() -> Self {
        let mut wire = Wire::default();
        wire.loopback = true;
        Self {
            wire: Arc::new(wire),
        }
    }

    /// Queue bytes for subsequent reads and wake a blocked reader.
    pub fn enqueue_read(&self, data: &[u8]) {
        let mut rx = self.wire.rx.lock();
        rx.extend(data);
        self.wire.rx_ready.notify_all();
    }

    /// Every write issued against any device from this backend, in order.
    pub fn write_log(&self) -> Vec<Vec<u8>> {
        self.wire.writes.lock().clone()
    }

    /// Bytes currently queued for reading.
    pub fn pending_read_bytes(&self) -> usize {
        self.wire.rx.lock().len()
    }

    /// Total OS resources acquired across all opens.
    pub fn acquired(&self) -> usize {
        self.wire.acquired.load(Ordering::SeqCst)
    }

    /// Total OS resources released across all closes and failed opens.
    pub fn released(&self) -> usize {
        self.wire.released.load(Ordering::SeqCst)
    }

    /// Number of devices successfully opened, each with its own fresh pair
    /// of completion objects.
    pub fn devices_created(&self) -> usize {
        self.wire.devices_created.load(Ordering::SeqCst)
    }

    /// Number of purge calls across all devices.
    pub fn purge_count(&self) -> usize {
        self.wire.purges.load(Ordering::SeqCst)
    }

    /// The qualified device paths passed to `open`, in order.
    pub fn opened_paths(&self) -> Vec<String> {
        self.wire.opened_paths.lock().clone()
    }

    /// The line-control record applied by the most recent open.
    pub fn last_line_control(&self) -> Option<LineControl> {
        *self.wire.last_line.lock()
    }

    /// The timeout record applied by the most recent open.
    pub fn last_timeouts(&self) -> Option<CommTimeouts> {
        *self.wire.last_timeouts.lock()
    }

    /// Make the next open fail after the device handle has been acquired,
    /// simulating a completion-event allocation failure. The handle is
    /// released before the error is returned, matching the rollback contract
    /// of the real backend.
    pub fn fail_next_open(&self) {
        self.wire.fail_next_open.store(true, Ordering::SeqCst);
    }

    /// Make the next read fail with an I/O error instead of returning data.
    pub fn fail_next_read(&self) {
        self.wire.fail_next_read.store(true, Ordering::SeqCst);
    }

    /// Make the next write fail after accepting `bytes` bytes, so the error
    /// carries a partial transfer count.
    pub fn fail_next_write_after(&self, bytes: usize) {
        *self.wire.fail_write_after.lock() = Some(bytes);
    }

    /// Hold each write inside the device for `delay`, widening the window in
    /// which an overlapping write would be detected.
    pub fn set_write_delay(&self, delay: Duration) {
        *self.wire.write_delay.lock() = delay;
    }
}

impl CommBackend for MockBackend {
    fn open(
        &self,
        path: &str,
        line: &LineControl,
        timeouts: &CommTimeouts,
    ) -> Result<Box<dyn CommDevice>, PortError> {
        self.wire.opened_paths.lock().push(path.to_string());

        if self.wire.fail_next_open.swap(false, Ordering::SeqCst) {
            // Handle acquired, event allocation fails, handle rolled back.
            self.wire.acquired.fetch_add(1, Ordering::SeqCst);
            self.wire.released.fetch_add(1, Ordering::SeqCst);
            return Err(PortError::resource(
                "completion event",
                io::Error::other("simulated event allocation failure"),
            ));
        }

        *self.wire.last_line.lock() = Some(*line);
        *self.wire.last_timeouts.lock() = Some(*timeouts);
        self.wire.acquired.fetch_add(RESOURCES_PER_OPEN, Ordering::SeqCst);
        self.wire.devices_created.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MockDevice {
            wire: Arc::clone(&self.wire),
            first_byte_wait: timeouts.first_byte_wait(),
        }))
    }
}

struct MockDevice {
    wire: Arc<Wire>,
    first_byte_wait: Option<Duration>,
}

impl MockDevice {
    fn read_inner(&self, buf: &mut [u8]) -> Result<usize, PortError> {
        if self.wire.fail_next_read.swap(false, Ordering::SeqCst) {
            return Err(PortError::io(io::Error::other("simulated read failure"), 0));
        }

        let mut rx = self.wire.rx.lock();
        if rx.is_empty() {
            match self.first_byte_wait {
                Some(wait) => {
                    let deadline = Instant::now() + wait;
                    while rx.is_empty() {
                        if self.wire.rx_ready.wait_until(&mut rx, deadline).timed_out() {
                            // Timeout is a successful zero-byte read.
                            return Ok(0);
                        }
                    }
                }
                None => {
                    while rx.is_empty() {
                        self.wire.rx_ready.wait(&mut rx);
                    }
                }
            }
        }

        let n = buf.len().min(rx.len());
        for slot in buf.iter_mut().take(n) {
            *slot = rx.pop_front().unwrap_or_default();
        }
        Ok(n)
    }

    fn write_inner(&self, buf: &[u8]) -> Result<usize, PortError> {
        let delay = *self.wire.write_delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        if let Some(accepted) = self.wire.fail_write_after.lock().take() {
            let accepted = accepted.min(buf.len());
            self.wire.writes.lock().push(buf[..accepted].to_vec());
            return Err(PortError::io(
                io::Error::other("simulated write failure"),
                accepted,
            ));
        }

        self.wire.writes.lock().push(buf.to_vec());
        if self.wire.loopback {
            let mut rx = self.wire.rx.lock();
            rx.extend(buf);
            self.wire.rx_ready.notify_all();
        }
        Ok(buf.len())
    }
}

impl CommDevice for MockDevice {
    fn read_bytes(&self, buf: &mut [u8]) -> Result<usize, PortError> {
        if self.wire.read_in_flight.swap(true, Ordering::SeqCst) {
            return Err(PortError::io(
                io::Error::other("overlapping read issued against mock device"),
                0,
            ));
        }
        let result = self.read_inner(buf);
        self.wire.read_in_flight.store(false, Ordering::SeqCst);
        result
    }

    fn write_bytes(&self, buf: &[u8]) -> Result<usize, PortError> {
        if self.wire.write_in_flight.swap(true, Ordering::SeqCst) {
            return Err(PortError::io(
                io::Error::other("overlapping write issued against mock device"),
                0,
            ));
        }
        let result = self.write_inner(buf);
        self.wire.write_in_flight.store(false, Ordering::SeqCst);
        result
    }

    fn purge(&self) -> Result<(), PortError> {
        self.wire.rx.lock().clear();
        self.wire.purges.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.wire.released.fetch_add(RESOURCES_PER_OPEN, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for MockDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDevice")
            .field("pending_read_bytes", &self.wire.rx.lock().len())
            .field("first_byte_wait", &self.first_byte_wait)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_device(backend: &MockBackend, timeout: Duration) -> Box<dyn CommDevice> {
        let line = LineControl {
            baud_rate: 9600,
            data_bits: 8,
            parity: 0,
            stop_bits: 0,
        };
        backend
            .open(r"\\.\COM9", &line, &CommTimeouts::for_read_timeout(timeout))
            .unwrap()
    }

    #[test]
    fn enqueue_and_read() {
        let backend = MockBackend::new();
        backend.enqueue_read(b"hello");
        let device = open_device(&backend, Duration::from_millis(10));

        let mut buf = [0u8; 16];
        let n = device.read_bytes(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[test]
    fn partial_read_leaves_remainder_queued() {
        let backend = MockBackend::new();
        backend.enqueue_read(b"hello, world");
        let device = open_device(&backend, Duration::from_millis(10));

        let mut buf = [0u8; 5];
        let n = device.read_bytes(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
        assert_eq!(backend.pending_read_bytes(), 7);
    }

    #[test]
    fn empty_queue_times_out_with_zero_bytes() {
        let backend = MockBackend::new();
        let device = open_device(&backend, Duration::from_millis(20));

        let mut buf = [0u8; 8];
        assert_eq!(device.read_bytes(&mut buf).unwrap(), 0);
    }

    #[test]
    fn writes_are_logged_and_looped_back() {
        let backend = MockBackend::loopback();
        let device = open_device(&backend, Duration::from_millis(10));

        device.write_bytes(b"echo").unwrap();
        assert_eq!(backend.write_log(), vec![b"echo".to_vec()]);

        let mut buf = [0u8; 8];
        let n = device.read_bytes(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"echo");
    }

    #[test]
    fn purge_discards_queued_bytes() {
        let backend = MockBackend::new();
        backend.enqueue_read(b"stale");
        let device = open_device(&backend, Duration::from_millis(10));

        device.purge().unwrap();
        assert_eq!(backend.pending_read_bytes(), 0);
        assert_eq!(backend.purge_count(), 1);
    }

    #[test]
    fn failed_open_balances_resource_counters() {
        let backend = MockBackend::new();
        backend.fail_next_open();
        let line = LineControl {
            baud_rate: 9600,
            data_bits: 8,
            parity: 0,
            stop_bits: 0,
        };
        let result = backend.open(
            r"\\.\COM9",
            &line,
            &CommTimeouts::for_read_timeout(Duration::ZERO),
        );
        assert!(matches!(result, Err(PortError::Resource { .. })));
        assert_eq!(backend.acquired(), backend.released());
    }

    #[test]
    fn dropping_device_releases_all_resources() {
        let backend = MockBackend::new();
        let device = open_device(&backend, Duration::ZERO);
        assert_eq!(backend.acquired(), RESOURCES_PER_OPEN);
        drop(device);
        assert_eq!(backend.released(), RESOURCES_PER_OPEN);
    }

    #[test]
    fn write_failure_carries_partial_count() {
        let backend = MockBackend::new();
        backend.fail_next_write_after(3);
        let device = open_device(&backend, Duration::ZERO);

        match device.write_bytes(b"abcdef") {
            Err(PortError::Io { bytes, .. }) => assert_eq!(bytes, 3),
            other => panic!("expected partial Io error, got: {other:?}"),
        }
    }
}
