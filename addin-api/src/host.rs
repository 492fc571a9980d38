//! Add-in side view of the host.
//!
//! The host hands every add-in a [`HostApi`] table through `_addin_init`.
//! [`export_addin!`](crate::export_addin) stores it here so add-in code can
//! reach the host through [`host()`] without carrying raw pointers around.

use std::ffi::{CStr, CString, c_char, c_void};
use std::fmt::Display;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr::NonNull;
use std::sync::RwLock;

use crate::error::HostCallError;
use crate::ffi::{AddinInitArgs, AddinStatus, HostApi, LogLevel, ManifestView};
use crate::types::{AddinId, AddinManifest, EventKind};

static HOST: RwLock<Option<Host>> = RwLock::new(None);

/// Handle to the host that imported this add-in
#[derive(Debug, Clone, Copy)]
pub struct Host {
    id: AddinId,
    api: NonNull<HostApi>,
}

// SAFETY: the table is immutable and owned by the host for as long as the
// add-in stays imported.
unsafe impl Send for Host {}
unsafe impl Sync for Host {}

/// The host this add-in was imported into, if `_addin_init` has run
pub fn host() -> Option<Host> {
    HOST.read().ok().and_then(|guard| *guard)
}

/// Record the init arguments. Called by the code `export_addin!` generates.
///
/// # Safety
///
/// `args` must be null or point to a valid [`AddinInitArgs`] whose `host`
/// table outlives the add-in.
#[doc(hidden)]
pub unsafe fn install(args: *const AddinInitArgs) -> bool {
    let Some(args) = (unsafe { args.as_ref() }) else {
        return false;
    };
    let (Some(id), Some(api)) = (AddinId::new(args.id), NonNull::new(args.host.cast_mut())) else {
        return false;
    };
    match HOST.write() {
        Ok(mut guard) => {
            *guard = Some(Host { id, api });
            true
        }
        Err(_) => false,
    }
}

impl Host {
    fn api(&self) -> &HostApi {
        // SAFETY: see the Send/Sync impls above
        unsafe { self.api.as_ref() }
    }

    /// Identity the host assigned to this add-in
    pub fn id(&self) -> AddinId {
        self.id
    }

    /// API version implemented by the host
    pub fn api_version(&self) -> u32 {
        self.api().api_version
    }

    /// Host version string
    pub fn version(&self) -> String {
        let api = self.api();
        let ptr = unsafe { (api.get_version)(api.host_data) };
        unsafe { string_from(ptr) }
    }

    /// Opaque emulator handle. Shared with every other add-in; callers
    /// coordinate access themselves.
    pub fn emulator(&self) -> *mut c_void {
        let api = self.api();
        unsafe { (api.get_emulator)(api.host_data) }
    }

    /// This add-in's manifest
    pub fn manifest(&self) -> Result<AddinManifest, HostCallError> {
        let api = self.api();
        let mut view = ManifestView::default();
        HostCallError::check(unsafe { (api.get_manifest)(api.host_data, self.id.get(), &mut view) })?;
        Ok(AddinManifest {
            display_name: unsafe { string_from(view.display_name) },
            author: unsafe { string_from(view.author) },
            version: unsafe { string_from(view.version) },
            auto_start: view.auto_start,
        })
    }

    /// Route `kind` to this add-in's `_<kind>_handler` export
    pub fn subscribe(&self, kind: EventKind) -> Result<(), HostCallError> {
        self.event_subscribe(kind, true)
    }

    pub fn unsubscribe(&self, kind: EventKind) -> Result<(), HostCallError> {
        self.event_subscribe(kind, false)
    }

    fn event_subscribe(&self, kind: EventKind, subscribe: bool) -> Result<(), HostCallError> {
        let api = self.api();
        HostCallError::check(unsafe {
            (api.event_subscribe)(api.host_data, self.id.get(), kind as u32, subscribe)
        })
    }

    /// Write to the host's log
    pub fn log(&self, level: LogLevel, message: &str) {
        let Ok(message) = CString::new(message.replace('\0', " ")) else {
            return;
        };
        let api = self.api();
        unsafe { (api.log)(api.host_data, self.id.get(), level as u32, message.as_ptr()) };
    }
}

unsafe fn string_from(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

/// Conversion of add-in callback results into ABI status codes
pub trait IntoStatus {
    fn into_status(self) -> i32;
}

impl IntoStatus for () {
    fn into_status(self) -> i32 {
        AddinStatus::Ok.code()
    }
}

impl IntoStatus for i32 {
    fn into_status(self) -> i32 {
        self
    }
}

impl<E: Display> IntoStatus for Result<(), E> {
    fn into_status(self) -> i32 {
        match self {
            Ok(()) => AddinStatus::Ok.code(),
            Err(e) => {
                if let Some(host) = host() {
                    host.log(LogLevel::Error, &e.to_string());
                }
                -1
            }
        }
    }
}

/// Run add-in code without letting a panic unwind into the host
#[doc(hidden)]
pub fn guard(f: impl FnOnce() -> i32) -> i32 {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or(AddinStatus::Internal.code())
}

/// Read a log event argument. Used by `addin_handler!`.
///
/// # Safety
///
/// `args` must be null or point to a valid [`LogEventArgs`](crate::ffi::LogEventArgs).
#[doc(hidden)]
pub unsafe fn log_event_from(args: *const c_void) -> Option<(String, u32)> {
    let args = unsafe { args.cast::<crate::ffi::LogEventArgs>().as_ref() }?;
    Some((unsafe { string_from(args.text) }, args.attributes))
}
