//! Integration tests for the port lifecycle and blocking I/O semantics,
//! exercised through the in-memory mock backend.

use comport::{MockBackend, Parity, PortError, SerialConfig, SerialPort, StopBits};
use pretty_assertions::assert_eq;
use std::time::{Duration, Instant};

fn open_port(backend: &MockBackend, timeout: Duration) -> SerialPort {
    let mut config = SerialConfig::new("COM3");
    config.read_timeout = timeout;
    let mut port = SerialPort::new(config).expect("valid config");
    port.open_with(backend).expect("open");
    port
}

#[test]
fn zeroed_fields_default_to_9600_8n1() {
    let backend = MockBackend::new();
    let config = SerialConfig {
        address: "COM3".into(),
        baud_rate: 0,
        data_bits: 0,
        stop_bits: StopBits::default(),
        parity: Parity::default(),
        read_timeout: Duration::from_millis(10),
    };
    let mut port = SerialPort::new(config).expect("defaults applied");
    assert_eq!(port.config().baud_rate, 9600);
    assert_eq!(port.config().data_bits, 8);

    port.open_with(&backend).expect("open");
    let line = backend.last_line_control().expect("line applied");
    assert_eq!(line.baud_rate, 9600);
    assert_eq!(line.data_bits, 8);
    assert_eq!(line.parity, 0);
    assert_eq!(line.stop_bits, 0);
}

#[test]
fn invalid_data_bits_acquire_no_resources() {
    let backend = MockBackend::new();
    let mut config = SerialConfig::new("COM3");
    config.data_bits = 9;
    assert!(matches!(
        SerialPort::new(config),
        Err(PortError::BadDataBits(9))
    ));
    assert_eq!(backend.acquired(), 0);
    assert!(backend.opened_paths().is_empty());
}

#[test]
fn open_close_cycles_leak_nothing() {
    let backend = MockBackend::new();
    let mut port = SerialPort::new(SerialConfig::new("COM3")).unwrap();

    for _ in 0..50 {
        port.open_with(&backend).expect("open");
        port.close().expect("close");
    }

    assert_eq!(backend.devices_created(), 50);
    assert_eq!(backend.acquired(), backend.released());
}

#[test]
fn each_open_allocates_fresh_completion_objects() {
    let backend = MockBackend::new();
    let mut port = SerialPort::new(SerialConfig::new("COM3")).unwrap();

    port.open_with(&backend).unwrap();
    port.close().unwrap();
    port.open_with(&backend).unwrap();

    assert_eq!(backend.devices_created(), 2);
    // 3 resources per open: the handle and one event per direction.
    assert_eq!(backend.acquired(), 6);
    assert_eq!(backend.released(), 3);
}

#[test]
fn failed_open_rolls_back_and_stays_retryable() {
    let backend = MockBackend::new();
    let mut port = SerialPort::new(SerialConfig::new("COM3")).unwrap();

    backend.fail_next_open();
    assert!(matches!(
        port.open_with(&backend),
        Err(PortError::Resource { .. })
    ));
    assert!(!port.is_open());
    assert_eq!(backend.acquired(), backend.released());

    port.open_with(&backend).expect("retry succeeds");
    assert!(port.is_open());
}

#[test]
fn double_open_is_rejected() {
    let backend = MockBackend::new();
    let mut port = open_port(&backend, Duration::from_millis(10));
    assert!(matches!(
        port.open_with(&backend),
        Err(PortError::AlreadyOpen)
    ));
    // The rejected open never reached the backend.
    assert_eq!(backend.devices_created(), 1);
}

#[test]
fn closed_port_rejects_io_without_native_calls() {
    let backend = MockBackend::new();
    let mut port = open_port(&backend, Duration::from_millis(10));
    port.close().unwrap();

    let mut buf = [0u8; 8];
    assert!(matches!(port.read(&mut buf), Err(PortError::NotOpen)));
    assert!(matches!(port.write(b"x"), Err(PortError::NotOpen)));
    assert!(matches!(port.flush(), Err(PortError::NotOpen)));
    assert!(backend.write_log().is_empty());
    assert_eq!(backend.purge_count(), 0);
}

#[test]
fn bare_address_is_qualified_before_open() {
    let backend = MockBackend::new();
    let _port = open_port(&backend, Duration::ZERO);
    assert_eq!(backend.opened_paths(), vec![r"\\.\COM3".to_string()]);
}

#[test]
fn buffered_data_is_returned_immediately_with_blocking_timeout() {
    let backend = MockBackend::new();
    backend.enqueue_read(b"already here");
    let port = open_port(&backend, Duration::ZERO);

    let started = Instant::now();
    let mut buf = [0u8; 32];
    let n = port.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"already here");
    assert!(started.elapsed() < Duration::from_millis(50));
}

#[test]
fn silent_device_times_out_with_zero_bytes() {
    let backend = MockBackend::new();
    let port = open_port(&backend, Duration::from_millis(100));

    let started = Instant::now();
    let mut buf = [0u8; 32];
    let n = port.read(&mut buf).unwrap();
    let elapsed = started.elapsed();

    assert_eq!(n, 0);
    assert!(elapsed >= Duration::from_millis(95), "returned after {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1000), "returned after {elapsed:?}");
}

#[test]
fn loopback_round_trip_preserves_the_frame() {
    let backend = MockBackend::loopback();
    let port = open_port(&backend, Duration::from_millis(500));

    let frame = [0x01, 0x03, 0x00, 0x01, 0x00, 0x01, 0xD5, 0xCA];
    assert_eq!(port.write(&frame).unwrap(), frame.len());

    let mut buf = [0u8; 128];
    let n = port.read(&mut buf).unwrap();
    assert_eq!(n, frame.len());
    assert_eq!(&buf[..n], &frame);
}

#[test]
fn concurrent_writers_are_serialized() {
    let backend = MockBackend::new();
    backend.set_write_delay(Duration::from_millis(30));
    let port = open_port(&backend, Duration::from_millis(10));

    std::thread::scope(|scope| {
        let first = scope.spawn(|| port.write(b"first"));
        let second = scope.spawn(|| port.write(b"second"));
        // The mock fails a write that overlaps another in-flight write, so
        // both succeeding proves the port serialized them.
        assert!(first.join().unwrap().is_ok());
        assert!(second.join().unwrap().is_ok());
    });

    let mut log = backend.write_log();
    log.sort();
    assert_eq!(log, vec![b"first".to_vec(), b"second".to_vec()]);
}

#[test]
fn reader_and_writer_proceed_concurrently() {
    let backend = MockBackend::loopback();
    let port = open_port(&backend, Duration::from_secs(5));

    std::thread::scope(|scope| {
        let reader = scope.spawn(|| {
            let mut buf = [0u8; 16];
            port.read(&mut buf).map(|n| buf[..n].to_vec())
        });

        // Let the reader block on an empty wire first, then write from this
        // thread. If read and write shared one lock this would deadlock
        // until the read timeout.
        std::thread::sleep(Duration::from_millis(100));
        let started = Instant::now();
        port.write(b"response").expect("write while read is blocked");
        assert!(started.elapsed() < Duration::from_millis(500));

        let data = reader.join().unwrap().expect("read completes");
        assert_eq!(data, b"response");
    });
}

#[test]
fn flush_purges_pending_data() {
    let backend = MockBackend::new();
    backend.enqueue_read(b"stale response");
    let port = open_port(&backend, Duration::from_millis(10));

    port.flush().unwrap();
    assert_eq!(backend.purge_count(), 1);

    let mut buf = [0u8; 32];
    assert_eq!(port.read(&mut buf).unwrap(), 0);
}

#[test]
fn read_failure_surfaces_os_error() {
    let backend = MockBackend::new();
    backend.fail_next_read();
    let port = open_port(&backend, Duration::from_millis(10));

    let mut buf = [0u8; 8];
    assert!(matches!(port.read(&mut buf), Err(PortError::Io { .. })));
}

#[test]
fn write_failure_reports_partial_transfer() {
    let backend = MockBackend::new();
    backend.fail_next_write_after(4);
    let port = open_port(&backend, Duration::from_millis(10));

    match port.write(b"abcdefgh") {
        Err(PortError::Io { bytes, .. }) => assert_eq!(bytes, 4),
        other => panic!("expected partial Io error, got: {other:?}"),
    }
}
