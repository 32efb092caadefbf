//! Windows overlapped-I/O backend.
//!
//! The serial device class on Windows only supports asynchronous
//! ("overlapped") I/O, so every blocking read or write here is a two-phase
//! protocol: reset the direction's completion event, issue the overlapped
//! call, and either take the immediate byte count or wait on
//! `GetOverlappedResult` for the pending operation to finish. Read waits are
//! bounded by the comm-timeout record applied at open; writes block until
//! the OS accepts the buffer or fails.

mod ffi;

use self::ffi::KERNEL32;
use crate::error::PortError;
use crate::port::line::LineControl;
use crate::port::timeout::CommTimeouts;
use crate::port::traits::{CommBackend, CommDevice};
use parking_lot::Mutex;
use std::io;
use std::mem;
use std::os::windows::ffi::OsStrExt;
use std::ptr;
use tracing::trace;
use winapi::shared::minwindef::{DWORD, FALSE, TRUE};
use winapi::shared::winerror::ERROR_IO_PENDING;
use winapi::um::fileapi::{CreateFileW, ReadFile, WriteFile, OPEN_EXISTING};
use winapi::um::handleapi::{CloseHandle, INVALID_HANDLE_VALUE};
use winapi::um::minwinbase::OVERLAPPED;
use winapi::um::winbase::{
    COMMTIMEOUTS, DCB, DTR_CONTROL_ENABLE, EV_RXCHAR, FILE_FLAG_OVERLAPPED, PURGE_RXABORT,
    PURGE_RXCLEAR, PURGE_TXABORT, PURGE_TXCLEAR,
};
use winapi::um::winnt::{FILE_ATTRIBUTE_NORMAL, GENERIC_READ, GENERIC_WRITE, HANDLE};

/// Size of the OS receive and transmit buffers requested at open. Small, but
/// sufficient for typical device turnaround.
const COMM_BUFFER_BYTES: DWORD = 64;

/// Exclusive owner of a raw handle; closes it on drop, so every early return
/// during open unwinds whatever was acquired before it.
struct OwnedHandle(HANDLE);

unsafe impl Send for OwnedHandle {}
unsafe impl Sync for OwnedHandle {}

impl OwnedHandle {
    fn raw(&self) -> HANDLE {
        self.0
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        if !self.0.is_null() && self.0 != INVALID_HANDLE_VALUE {
            unsafe { CloseHandle(self.0) };
        }
    }
}

/// One direction's completion machinery: a manual-reset event and the
/// overlapped record pointing at it. Owned exclusively by one device and
/// accessed under that direction's lock.
struct IoChannel {
    event: OwnedHandle,
    overlapped: Box<OVERLAPPED>,
}

// OVERLAPPED carries raw pointers; the channel is only touched under its
// direction's mutex.
unsafe impl Send for IoChannel {}

impl IoChannel {
    fn new() -> Result<Self, PortError> {
        let raw = unsafe { (KERNEL32.create_event)(ptr::null_mut(), TRUE, FALSE, ptr::null()) };
        if raw.is_null() {
            return Err(PortError::resource(
                "completion event",
                io::Error::last_os_error(),
            ));
        }
        let event = OwnedHandle(raw);
        let mut overlapped: Box<OVERLAPPED> = Box::new(unsafe { mem::zeroed() });
        overlapped.hEvent = event.raw();
        Ok(Self { event, overlapped })
    }

    /// Return the event to the non-signaled state before issuing a new
    /// overlapped operation.
    fn rearm(&mut self) -> Result<(), PortError> {
        let ok = unsafe { (KERNEL32.reset_event)(self.event.raw()) };
        if ok == FALSE {
            return Err(PortError::io(io::Error::last_os_error(), 0));
        }
        Ok(())
    }

    fn overlapped_ptr(&mut self) -> *mut OVERLAPPED {
        self.overlapped.as_mut()
    }

    /// Block until the pending operation on this channel finishes and return
    /// its byte count. Failures carry the bytes transferred so far.
    fn finish(&mut self, handle: HANDLE) -> Result<usize, PortError> {
        let mut transferred: DWORD = 0;
        let ok = unsafe {
            (KERNEL32.get_overlapped_result)(
                handle,
                self.overlapped.as_mut(),
                &mut transferred,
                TRUE,
            )
        };
        if ok == FALSE {
            return Err(PortError::io(
                io::Error::last_os_error(),
                transferred as usize,
            ));
        }
        Ok(transferred as usize)
    }
}

/// The default backend: opens real comm devices through the Win32 API.
pub struct WindowsBackend;

impl CommBackend for WindowsBackend {
    fn open(
        &self,
        path: &str,
        line: &LineControl,
        timeouts: &CommTimeouts,
    ) -> Result<Box<dyn CommDevice>, PortError> {
        let wide = wide_path(path);
        let raw = unsafe {
            CreateFileW(
                wide.as_ptr(),
                GENERIC_READ | GENERIC_WRITE,
                0,
                ptr::null_mut(),
                OPEN_EXISTING,
                FILE_ATTRIBUTE_NORMAL | FILE_FLAG_OVERLAPPED,
                ptr::null_mut(),
            )
        };
        if raw == INVALID_HANDLE_VALUE {
            return Err(PortError::resource(
                "device handle",
                io::Error::last_os_error(),
            ));
        }
        let handle = OwnedHandle(raw);

        apply_line_control(&handle, line)?;
        size_comm_buffers(&handle)?;
        apply_timeouts(&handle, timeouts)?;
        arm_rx_event(&handle)?;

        let read_io = IoChannel::new()?;
        let write_io = IoChannel::new()?;

        trace!(path, "serial device opened");
        Ok(Box::new(WindowsDevice {
            handle,
            read_io: Mutex::new(read_io),
            write_io: Mutex::new(write_io),
        }))
    }
}

struct WindowsDevice {
    handle: OwnedHandle,
    read_io: Mutex<IoChannel>,
    write_io: Mutex<IoChannel>,
}

impl CommDevice for WindowsDevice {
    fn read_bytes(&self, buf: &mut [u8]) -> Result<usize, PortError> {
        let mut channel = self.read_io.lock();
        channel.rearm()?;

        let len = buf.len().min(DWORD::MAX as usize) as DWORD;
        let mut transferred: DWORD = 0;
        let ok = unsafe {
            ReadFile(
                self.handle.raw(),
                buf.as_mut_ptr().cast(),
                len,
                &mut transferred,
                channel.overlapped_ptr(),
            )
        };
        if ok != FALSE {
            // Completed synchronously, typically because bytes were already
            // buffered.
            return Ok(transferred as usize);
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(ERROR_IO_PENDING as i32) {
            return Err(PortError::io(err, transferred as usize));
        }
        let n = channel.finish(self.handle.raw())?;
        trace!(bytes = n, "overlapped read completed");
        Ok(n)
    }

    fn write_bytes(&self, buf: &[u8]) -> Result<usize, PortError> {
        let mut channel = self.write_io.lock();
        channel.rearm()?;

        let len = buf.len().min(DWORD::MAX as usize) as DWORD;
        let mut transferred: DWORD = 0;
        let ok = unsafe {
            WriteFile(
                self.handle.raw(),
                buf.as_ptr().cast(),
                len,
                &mut transferred,
                channel.overlapped_ptr(),
            )
        };
        if ok != FALSE {
            return Ok(transferred as usize);
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(ERROR_IO_PENDING as i32) {
            return Err(PortError::io(err, transferred as usize));
        }
        let n = channel.finish(self.handle.raw())?;
        trace!(bytes = n, "overlapped write completed");
        Ok(n)
    }

    fn purge(&self) -> Result<(), PortError> {
        let flags = PURGE_TXABORT | PURGE_RXABORT | PURGE_TXCLEAR | PURGE_RXCLEAR;
        let ok = unsafe { (KERNEL32.purge_comm)(self.handle.raw(), flags) };
        if ok == FALSE {
            return Err(PortError::io(io::Error::last_os_error(), 0));
        }
        Ok(())
    }
}

impl std::fmt::Debug for WindowsDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowsDevice")
            .field("handle", &self.handle.raw())
            .finish()
    }
}

fn wide_path(path: &str) -> Vec<u16> {
    std::ffi::OsStr::new(path)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

fn apply_line_control(handle: &OwnedHandle, line: &LineControl) -> Result<(), PortError> {
    let mut dcb: DCB = unsafe { mem::zeroed() };
    dcb.DCBlength = mem::size_of::<DCB>() as DWORD;
    dcb.BaudRate = line.baud_rate;
    dcb.ByteSize = line.data_bits;
    dcb.Parity = line.parity;
    dcb.StopBits = line.stop_bits;
    // Binary mode and DTR assertion are mandatory for reliable operation on
    // this device class.
    dcb.set_fBinary(1);
    dcb.set_fDtrControl(DTR_CONTROL_ENABLE);

    let ok = unsafe { (KERNEL32.set_comm_state)(handle.raw(), &mut dcb) };
    if ok == FALSE {
        return Err(PortError::resource(
            "line control state",
            io::Error::last_os_error(),
        ));
    }
    Ok(())
}

fn size_comm_buffers(handle: &OwnedHandle) -> Result<(), PortError> {
    let ok = unsafe { (KERNEL32.setup_comm)(handle.raw(), COMM_BUFFER_BYTES, COMM_BUFFER_BYTES) };
    if ok == FALSE {
        return Err(PortError::resource(
            "comm buffers",
            io::Error::last_os_error(),
        ));
    }
    Ok(())
}

fn apply_timeouts(handle: &OwnedHandle, timeouts: &CommTimeouts) -> Result<(), PortError> {
    let mut native = COMMTIMEOUTS {
        ReadIntervalTimeout: timeouts.read_interval,
        ReadTotalTimeoutMultiplier: timeouts.read_total_multiplier,
        ReadTotalTimeoutConstant: timeouts.read_total_constant,
        WriteTotalTimeoutMultiplier: timeouts.write_total_multiplier,
        WriteTotalTimeoutConstant: timeouts.write_total_constant,
    };
    let ok = unsafe { (KERNEL32.set_comm_timeouts)(handle.raw(), &mut native) };
    if ok == FALSE {
        return Err(PortError::resource(
            "comm timeouts",
            io::Error::last_os_error(),
        ));
    }
    Ok(())
}

fn arm_rx_event(handle: &OwnedHandle) -> Result<(), PortError> {
    let ok = unsafe { (KERNEL32.set_comm_mask)(handle.raw(), EV_RXCHAR) };
    if ok == FALSE {
        return Err(PortError::resource(
            "comm event mask",
            io::Error::last_os_error(),
        ));
    }
    Ok(())
}
