//! Lazily-resolved `kernel32` comm entry points.
//!
//! The comm routines are resolved once into an immutable table on first use.
//! A missing entry point means the process cannot do serial I/O at all, so
//! resolution failure is fatal rather than a per-call error.

use once_cell::sync::Lazy;
use winapi::shared::minwindef::{BOOL, DWORD, FARPROC};
use winapi::um::libloaderapi::{GetModuleHandleW, GetProcAddress};
use winapi::um::minwinbase::{OVERLAPPED, SECURITY_ATTRIBUTES};
use winapi::um::winbase::{COMMTIMEOUTS, DCB};
use winapi::um::winnt::HANDLE;

pub(crate) type SetCommStateFn = unsafe extern "system" fn(HANDLE, *mut DCB) -> BOOL;
pub(crate) type SetCommTimeoutsFn = unsafe extern "system" fn(HANDLE, *mut COMMTIMEOUTS) -> BOOL;
pub(crate) type SetCommMaskFn = unsafe extern "system" fn(HANDLE, DWORD) -> BOOL;
pub(crate) type SetupCommFn = unsafe extern "system" fn(HANDLE, DWORD, DWORD) -> BOOL;
pub(crate) type GetOverlappedResultFn =
    unsafe extern "system" fn(HANDLE, *mut OVERLAPPED, *mut DWORD, BOOL) -> BOOL;
pub(crate) type CreateEventWFn =
    unsafe extern "system" fn(*mut SECURITY_ATTRIBUTES, BOOL, BOOL, *const u16) -> HANDLE;
pub(crate) type ResetEventFn = unsafe extern "system" fn(HANDLE) -> BOOL;
pub(crate) type PurgeCommFn = unsafe extern "system" fn(HANDLE, DWORD) -> BOOL;

/// Immutable table of resolved comm entry points.
pub(crate) struct Kernel32 {
    pub set_comm_state: SetCommStateFn,
    pub set_comm_timeouts: SetCommTimeoutsFn,
    pub set_comm_mask: SetCommMaskFn,
    pub setup_comm: SetupCommFn,
    pub get_overlapped_result: GetOverlappedResultFn,
    pub create_event: CreateEventWFn,
    pub reset_event: ResetEventFn,
    pub purge_comm: PurgeCommFn,
}

macro_rules! resolve {
    ($module:expr, $name:literal, $ty:ty) => {{
        let addr: FARPROC = GetProcAddress($module, concat!($name, "\0").as_ptr().cast());
        if addr.is_null() {
            return Err($name);
        }
        std::mem::transmute::<FARPROC, $ty>(addr)
    }};
}

impl Kernel32 {
    fn load() -> Result<Self, &'static str> {
        // kernel32 is mapped into every process; no LoadLibrary needed.
        let module_name: Vec<u16> = "kernel32.dll\0".encode_utf16().collect();
        unsafe {
            let module = GetModuleHandleW(module_name.as_ptr());
            if module.is_null() {
                return Err("kernel32.dll");
            }
            Ok(Self {
                set_comm_state: resolve!(module, "SetCommState", SetCommStateFn),
                set_comm_timeouts: resolve!(module, "SetCommTimeouts", SetCommTimeoutsFn),
                set_comm_mask: resolve!(module, "SetCommMask", SetCommMaskFn),
                setup_comm: resolve!(module, "SetupComm", SetupCommFn),
                get_overlapped_result: resolve!(
                    module,
                    "GetOverlappedResult",
                    GetOverlappedResultFn
                ),
                create_event: resolve!(module, "CreateEventW", CreateEventWFn),
                reset_event: resolve!(module, "ResetEvent", ResetEventFn),
                purge_comm: resolve!(module, "PurgeComm", PurgeCommFn),
            })
        }
    }
}

pub(crate) static KERNEL32: Lazy<Kernel32> = Lazy::new(|| {
    Kernel32::load()
        .unwrap_or_else(|name| panic!("failed to resolve kernel32 entry point: {name}"))
});
