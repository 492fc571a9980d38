//! addin-api - shared ABI between the emulator host and its add-ins
//!
//! Add-ins are native dynamic libraries the host imports at runtime. This
//! crate holds everything both sides have to agree on: identities, start
//! reasons, the event kinds, the `#[repr(C)]` host function table, and the
//! macros an add-in uses to export its entry points.
//!
//! # Example
//!
//! ```ignore
//! use addin_api::{EventKind, LogLevel, StartArgs, addin_handler, export_addin, host};
//!
//! fn on_start(args: StartArgs) -> Result<(), addin_api::HostCallError> {
//!     let host = host().ok_or(addin_api::HostCallError::NotInitialized)?;
//!     host.log(LogLevel::Info, &format!("started with {args:?}"));
//!     host.subscribe(EventKind::Fullscreen)
//! }
//!
//! fn on_stop() {}
//!
//! fn on_fullscreen(is_fullscreen: bool) {
//!     if let Some(host) = host() {
//!         host.log(LogLevel::Info, &format!("fullscreen: {is_fullscreen}"));
//!     }
//! }
//!
//! export_addin!(start = on_start, stop = on_stop);
//! addin_handler!(fullscreen => on_fullscreen);
//! ```

pub mod error;
pub mod ffi;
pub mod host;
pub mod types;

pub use error::HostCallError;
pub use ffi::{AddinStatus, HostApi, LogLevel};
pub use host::{Host, IntoStatus, host};
pub use types::*;

/// Current add-in API version. Add-ins exporting `_addin_api_version` must
/// match this exactly.
pub const API_VERSION: u32 = 1;

/// Flavor of host this add-in build targets (the `console` feature).
pub const BUILD_FLAVOR: HostFlavor = if cfg!(feature = "console") {
    HostFlavor::Console
} else {
    HostFlavor::Windowed
};

/// Export the entry points every add-in needs.
///
/// `start` receives [`StartArgs`] and `stop` nothing; both may return `()`,
/// an `i32` status or a `Result<(), E: Display>`.
///
/// # Generated Functions
///
/// - `_addin_init()`: stores the host table and reports [`BUILD_FLAVOR`]
/// - `_addin_api_version()`: returns [`API_VERSION`]
/// - `start()` / `stop()`: call the given functions, catching panics
#[macro_export]
macro_rules! export_addin {
    (start = $start:path, stop = $stop:path $(,)?) => {
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn _addin_init(args: *const $crate::ffi::AddinInitArgs) -> i32 {
            unsafe { $crate::host::install(args) };
            $crate::BUILD_FLAVOR.as_init_flag()
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn _addin_api_version() -> u32 {
            $crate::API_VERSION
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn start(args: u32) -> i32 {
            $crate::host::guard(|| {
                $crate::IntoStatus::into_status($start($crate::StartArgs::from_bits_retain(args)))
            })
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn stop() -> i32 {
            $crate::host::guard(|| $crate::IntoStatus::into_status($stop()))
        }
    };
}

/// Export an event handler under the symbol the host resolves for
/// [`Host::subscribe`], e.g. `addin_handler!(pause => on_pause)` exports
/// `_pause_handler`.
///
/// Handler signatures by kind:
/// - `vblank`, `input`, `async_input`, `update_input_hint`, `serial_bit_end`,
///   `icd_hreset`, `icd_vreset`, `step`: `fn()`
/// - `infrared`, `serial_bit_start`, `fullscreen`, `menu`, `pause`,
///   `rom_run_state`: `fn(bool)`
/// - `log`: `fn(String, u32)`
/// - `rgb_encode`: `fn(ffi::RgbEncodeArgs)`
/// - `rumble`: `fn(f64)`
/// - `boot_rom_load`: `fn(u32)`
/// - `joyp_write`, `icd_pixel`: `fn(u8)`
#[macro_export]
macro_rules! addin_handler {
    (vblank => $h:path) => { $crate::addin_handler!(@unit "_vblank_handler", __addin_vblank_handler, $h); };
    (log => $h:path) => { $crate::addin_handler!(@log "_log_handler", __addin_log_handler, $h); };
    (input => $h:path) => { $crate::addin_handler!(@unit "_input_handler", __addin_input_handler, $h); };
    (async_input => $h:path) => { $crate::addin_handler!(@unit "_async_input_handler", __addin_async_input_handler, $h); };
    (rgb_encode => $h:path) => { $crate::addin_handler!(@value $crate::ffi::RgbEncodeArgs, "_rgb_encode_handler", __addin_rgb_encode_handler, $h); };
    (infrared => $h:path) => { $crate::addin_handler!(@value bool, "_infrared_handler", __addin_infrared_handler, $h); };
    (rumble => $h:path) => { $crate::addin_handler!(@value f64, "_rumble_handler", __addin_rumble_handler, $h); };
    (update_input_hint => $h:path) => { $crate::addin_handler!(@unit "_update_input_hint_handler", __addin_update_input_hint_handler, $h); };
    (boot_rom_load => $h:path) => { $crate::addin_handler!(@value u32, "_boot_rom_load_handler", __addin_boot_rom_load_handler, $h); };
    (serial_bit_start => $h:path) => { $crate::addin_handler!(@value bool, "_serial_bit_start_handler", __addin_serial_bit_start_handler, $h); };
    (serial_bit_end => $h:path) => { $crate::addin_handler!(@unit "_serial_bit_end_handler", __addin_serial_bit_end_handler, $h); };
    (joyp_write => $h:path) => { $crate::addin_handler!(@value u8, "_joyp_write_handler", __addin_joyp_write_handler, $h); };
    (icd_pixel => $h:path) => { $crate::addin_handler!(@value u8, "_icd_pixel_handler", __addin_icd_pixel_handler, $h); };
    (icd_hreset => $h:path) => { $crate::addin_handler!(@unit "_icd_hreset_handler", __addin_icd_hreset_handler, $h); };
    (icd_vreset => $h:path) => { $crate::addin_handler!(@unit "_icd_vreset_handler", __addin_icd_vreset_handler, $h); };
    (step => $h:path) => { $crate::addin_handler!(@unit "_step_handler", __addin_step_handler, $h); };
    (fullscreen => $h:path) => { $crate::addin_handler!(@value bool, "_fullscreen_handler", __addin_fullscreen_handler, $h); };
    (menu => $h:path) => { $crate::addin_handler!(@value bool, "_menu_handler", __addin_menu_handler, $h); };
    (pause => $h:path) => { $crate::addin_handler!(@value bool, "_pause_handler", __addin_pause_handler, $h); };
    (rom_run_state => $h:path) => { $crate::addin_handler!(@value bool, "_rom_run_state_handler", __addin_rom_run_state_handler, $h); };

    (@unit $sym:literal, $name:ident, $h:path) => {
        #[unsafe(export_name = $sym)]
        pub unsafe extern "C" fn $name(_args: *const ::std::ffi::c_void) -> i32 {
            $crate::host::guard(|| $crate::IntoStatus::into_status($h()))
        }
    };
    (@value $ty:ty, $sym:literal, $name:ident, $h:path) => {
        #[unsafe(export_name = $sym)]
        pub unsafe extern "C" fn $name(args: *const ::std::ffi::c_void) -> i32 {
            if args.is_null() {
                return $crate::AddinStatus::InvalidArgument.code();
            }
            let value: $ty = unsafe { *args.cast::<$ty>() };
            $crate::host::guard(|| $crate::IntoStatus::into_status($h(value)))
        }
    };
    (@log $sym:literal, $name:ident, $h:path) => {
        #[unsafe(export_name = $sym)]
        pub unsafe extern "C" fn $name(args: *const ::std::ffi::c_void) -> i32 {
            match unsafe { $crate::host::log_event_from(args) } {
                Some((text, attributes)) => {
                    $crate::host::guard(|| $crate::IntoStatus::into_status($h(text, attributes)))
                }
                None => $crate::AddinStatus::InvalidArgument.code(),
            }
        }
    };
}
