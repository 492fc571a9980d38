//! C ABI shared by the host and add-ins.
//!
//! Every add-in exports:
//! - `_addin_init(args: *const AddinInitArgs) -> i32` returning its build flavor
//! - `start(args: u32) -> i32`
//! - `stop() -> i32`
//! - optionally `_addin_api_version() -> u32`
//! - any number of event handlers `fn(args: *const c_void) -> i32`
//!
//! The argument pointed to by an event handler's `args` depends on the event
//! kind; see [`EventKind`](crate::EventKind) and the `*Args` structs below.

use std::ffi::{c_char, c_void};

/// Symbol name of the init entry point
pub const INIT_SYMBOL: &str = "_addin_init";
/// Symbol name of the start entry point
pub const START_SYMBOL: &str = "start";
/// Symbol name of the stop entry point
pub const STOP_SYMBOL: &str = "stop";
/// Symbol name of the optional API version query
pub const API_VERSION_SYMBOL: &str = "_addin_api_version";

/// `_addin_init` entry point
pub type InitFn = unsafe extern "C" fn(args: *const AddinInitArgs) -> i32;
/// `start` entry point
pub type StartFn = unsafe extern "C" fn(args: u32) -> i32;
/// `stop` entry point
pub type StopFn = unsafe extern "C" fn() -> i32;
/// `_addin_api_version` entry point
pub type ApiVersionFn = unsafe extern "C" fn() -> u32;
/// Event handler entry point
pub type HandlerFn = unsafe extern "C" fn(args: *const c_void) -> i32;

/// Status codes returned by host API functions.
///
/// Zero is success, matching the add-in entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum AddinStatus {
    Ok = 0,
    CapacityExceeded = 1,
    AlreadyImported = 2,
    BinaryNotFound = 3,
    ManifestNotFound = 4,
    ManifestParseFailed = 5,
    LoadFailed = 6,
    AbiMismatch = 7,
    AllocationFailed = 8,
    SymbolResolutionFailed = 9,
    UnknownAddin = 10,
    InvalidArgument = 11,
    Internal = 12,
}

impl AddinStatus {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::CapacityExceeded,
            2 => Self::AlreadyImported,
            3 => Self::BinaryNotFound,
            4 => Self::ManifestNotFound,
            5 => Self::ManifestParseFailed,
            6 => Self::LoadFailed,
            7 => Self::AbiMismatch,
            8 => Self::AllocationFailed,
            9 => Self::SymbolResolutionFailed,
            10 => Self::UnknownAddin,
            11 => Self::InvalidArgument,
            _ => Self::Internal,
        }
    }
}

/// Log levels accepted by [`HostApi::log`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Error,
            1 => Self::Warn,
            2 => Self::Info,
            3 => Self::Debug,
            _ => Self::Trace,
        }
    }
}

/// Arguments passed to `_addin_init`
#[repr(C)]
pub struct AddinInitArgs {
    /// Identity assigned by the host
    pub id: u32,
    /// Host function table, valid while the add-in stays imported
    pub host: *const HostApi,
}

/// Borrowed view of an add-in's manifest.
///
/// The strings are owned by the host and stay valid while the add-in stays
/// imported.
#[repr(C)]
pub struct ManifestView {
    pub display_name: *const c_char,
    pub author: *const c_char,
    pub version: *const c_char,
    pub auto_start: bool,
}

impl Default for ManifestView {
    fn default() -> Self {
        Self {
            display_name: std::ptr::null(),
            author: std::ptr::null(),
            version: std::ptr::null(),
            auto_start: false,
        }
    }
}

/// Functions the host exposes to add-ins.
///
/// `host_data` must be passed back unchanged as the first argument of every
/// call. The emulator handle returned by `get_emulator` is shared by every
/// add-in without arbitration.
#[repr(C)]
pub struct HostApi {
    pub api_version: u32,
    pub host_data: *const c_void,
    /// NUL-terminated host version string with static lifetime
    pub get_version: unsafe extern "C" fn(host_data: *const c_void) -> *const c_char,
    /// Opaque emulator handle, null when the host has none
    pub get_emulator: unsafe extern "C" fn(host_data: *const c_void) -> *mut c_void,
    pub get_manifest:
        unsafe extern "C" fn(host_data: *const c_void, id: u32, out: *mut ManifestView) -> i32,
    /// Subscribe (`subscribe = true`) or unsubscribe the `_<kind>_handler` symbol
    pub event_subscribe:
        unsafe extern "C" fn(host_data: *const c_void, id: u32, kind: u32, subscribe: bool) -> i32,
    pub log: unsafe extern "C" fn(host_data: *const c_void, id: u32, level: u32, message: *const c_char),
}

// SAFETY: `host_data` is an opaque token only dereferenced by the host's own
// functions, which synchronize internally.
unsafe impl Send for HostApi {}
unsafe impl Sync for HostApi {}

/// Argument of `log` event handlers
#[repr(C)]
pub struct LogEventArgs {
    pub text: *const c_char,
    pub attributes: u32,
}

/// Argument of `rgb_encode` event handlers
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbEncodeArgs {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}
