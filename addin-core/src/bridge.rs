//! Host functions exposed to add-ins through [`HostApi`]
//!
//! `host_data` is the address of the registry's shared state. Every
//! function here catches unwinds so a host-side panic never crosses into
//! add-in code.

use std::ffi::{CStr, c_char, c_void};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::Ordering;

use addin_api::ffi::{HostApi, LogLevel, ManifestView};
use addin_api::{API_VERSION, AddinId, AddinStatus, EventKind};

use crate::registry::RegistryInner;

/// Host version reported to add-ins
pub const HOST_VERSION: &CStr = match CStr::from_bytes_with_nul(
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes(),
) {
    Ok(version) => version,
    Err(_) => c"unknown",
};

/// Build the function table handed to add-ins
pub(crate) fn host_api(host_data: *const RegistryInner) -> HostApi {
    HostApi {
        api_version: API_VERSION,
        host_data: host_data.cast(),
        get_version: host_get_version,
        get_emulator: host_get_emulator,
        get_manifest: host_get_manifest,
        event_subscribe: host_event_subscribe,
        log: host_log,
    }
}

/// # Safety
///
/// `host_data` must be null or come from [`host_api`] with the registry
/// state still alive.
unsafe fn shared<'a>(host_data: *const c_void) -> Option<&'a RegistryInner> {
    unsafe { host_data.cast::<RegistryInner>().as_ref() }
}

fn contain(call: &'static str, f: impl FnOnce() -> AddinStatus) -> i32 {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(status) => status.code(),
        Err(_) => {
            tracing::error!(call, "Host API call panicked");
            AddinStatus::Internal.code()
        }
    }
}

unsafe extern "C" fn host_get_version(_host_data: *const c_void) -> *const c_char {
    HOST_VERSION.as_ptr()
}

unsafe extern "C" fn host_get_emulator(host_data: *const c_void) -> *mut c_void {
    unsafe { shared(host_data) }
        .map(|inner| inner.emulator.load(Ordering::Acquire))
        .unwrap_or(std::ptr::null_mut())
}

unsafe extern "C" fn host_get_manifest(host_data: *const c_void, id: u32, out: *mut ManifestView) -> i32 {
    contain("get_manifest", || {
        let (Some(inner), Some(out)) = (unsafe { shared(host_data) }, unsafe { out.as_mut() }) else {
            return AddinStatus::InvalidArgument;
        };
        let Some(id) = AddinId::new(id) else {
            return AddinStatus::UnknownAddin;
        };
        match inner.manifest_view(id) {
            Some(view) => {
                *out = view;
                AddinStatus::Ok
            }
            None => AddinStatus::UnknownAddin,
        }
    })
}

unsafe extern "C" fn host_event_subscribe(
    host_data: *const c_void,
    id: u32,
    kind: u32,
    subscribe: bool,
) -> i32 {
    contain("event_subscribe", || {
        let Some(inner) = (unsafe { shared(host_data) }) else {
            return AddinStatus::InvalidArgument;
        };
        let Some(kind) = EventKind::from_raw(kind) else {
            return AddinStatus::InvalidArgument;
        };
        let Some(id) = AddinId::new(id) else {
            return AddinStatus::UnknownAddin;
        };

        let result = if subscribe {
            inner.subscribe(id, kind, &kind.handler_symbol())
        } else {
            inner.unsubscribe(id, kind)
        };
        match result {
            Ok(()) => AddinStatus::Ok,
            Err(e) => {
                tracing::warn!(addin = %id, event = %kind, error = %e, "Add-in subscription request failed");
                e.status()
            }
        }
    })
}

unsafe extern "C" fn host_log(_host_data: *const c_void, id: u32, level: u32, message: *const c_char) {
    if message.is_null() {
        return;
    }
    let result = catch_unwind(AssertUnwindSafe(|| {
        let message = unsafe { CStr::from_ptr(message) }.to_string_lossy();
        let addin = format!("{id:08x}");
        match LogLevel::from_raw(level) {
            LogLevel::Error => tracing::error!(addin = %addin, "{}", message),
            LogLevel::Warn => tracing::warn!(addin = %addin, "{}", message),
            LogLevel::Info => tracing::info!(addin = %addin, "{}", message),
            LogLevel::Debug => tracing::debug!(addin = %addin, "{}", message),
            LogLevel::Trace => tracing::trace!(addin = %addin, "{}", message),
        }
    }));
    if result.is_err() {
        tracing::error!(call = "log", "Host API call panicked");
    }
}
