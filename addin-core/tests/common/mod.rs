//! Shared fixtures for addin-core integration tests
//!
//! Add-ins are plain `extern "C"` functions in the test binary served through
//! a `StaticLoader`. The binary and manifest files only exist so import finds
//! them on disk.

#![allow(dead_code)]

use std::ffi::c_void;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};

use addin_api::ffi::{
    API_VERSION_SYMBOL, AddinInitArgs, ApiVersionFn, HandlerFn, INIT_SYMBOL, InitFn,
    START_SYMBOL, STOP_SYMBOL, StartFn, StopFn,
};
use addin_core::{AddinHostConfig, AddinRegistry, DispatchMode, StaticLibrary, StaticLoader};
use tempfile::TempDir;

pub static START_CALLS: AtomicU32 = AtomicU32::new(0);
pub static LAST_START_ARGS: AtomicU32 = AtomicU32::new(0);
pub static STOP_CALLS: AtomicU32 = AtomicU32::new(0);
pub static PAUSE_CALLS: AtomicU32 = AtomicU32::new(0);
pub static LAST_PAUSED: AtomicBool = AtomicBool::new(false);
pub static STEP_CALLS: AtomicU32 = AtomicU32::new(0);
pub static MENU_CALLS: AtomicU32 = AtomicU32::new(0);

/// Reset every counter. Tests using the counters run `#[serial]`.
pub fn reset() {
    for counter in [
        &START_CALLS,
        &LAST_START_ARGS,
        &STOP_CALLS,
        &PAUSE_CALLS,
        &STEP_CALLS,
        &MENU_CALLS,
    ] {
        counter.store(0, Ordering::SeqCst);
    }
    LAST_PAUSED.store(false, Ordering::SeqCst);
}

pub unsafe extern "C" fn windowed_init(_args: *const AddinInitArgs) -> i32 {
    0
}

pub unsafe extern "C" fn console_init(_args: *const AddinInitArgs) -> i32 {
    1
}

pub unsafe extern "C" fn start(args: u32) -> i32 {
    START_CALLS.fetch_add(1, Ordering::SeqCst);
    LAST_START_ARGS.store(args, Ordering::SeqCst);
    0
}

pub unsafe extern "C" fn stop() -> i32 {
    STOP_CALLS.fetch_add(1, Ordering::SeqCst);
    0
}

pub unsafe extern "C" fn old_api_version() -> u32 {
    addin_api::API_VERSION + 1
}

pub unsafe extern "C" fn current_api_version() -> u32 {
    addin_api::API_VERSION
}

pub unsafe extern "C" fn pause_handler(args: *const c_void) -> i32 {
    let paused = unsafe { *args.cast::<bool>() };
    LAST_PAUSED.store(paused, Ordering::SeqCst);
    PAUSE_CALLS.fetch_add(1, Ordering::SeqCst);
    0
}

pub unsafe extern "C" fn step_handler(_args: *const c_void) -> i32 {
    STEP_CALLS.fetch_add(1, Ordering::SeqCst);
    0
}

/// Reports failure on every call
pub unsafe extern "C" fn menu_handler(_args: *const c_void) -> i32 {
    MENU_CALLS.fetch_add(1, Ordering::SeqCst);
    3
}

/// A complete windowed add-in
pub fn library() -> StaticLibrary {
    library_with(windowed_init, &[])
}

/// An add-in using `init`, without the symbols listed in `skip`
pub fn library_with(init: InitFn, skip: &[&str]) -> StaticLibrary {
    let symbols: [(&str, *const c_void); 7] = [
        (INIT_SYMBOL, init as *const c_void),
        (START_SYMBOL, start as StartFn as *const c_void),
        (STOP_SYMBOL, stop as StopFn as *const c_void),
        (API_VERSION_SYMBOL, current_api_version as ApiVersionFn as *const c_void),
        ("_pause_handler", pause_handler as HandlerFn as *const c_void),
        ("_step_handler", step_handler as HandlerFn as *const c_void),
        ("_menu_handler", menu_handler as HandlerFn as *const c_void),
    ];

    symbols
        .into_iter()
        .filter(|(name, _)| !skip.contains(name))
        .fold(StaticLibrary::new(), |library, (name, address)| {
            library.with_symbol(name, address)
        })
}

/// Host config for tests: inline dispatch, no flavor check
pub fn config() -> AddinHostConfig {
    AddinHostConfig {
        dispatch: DispatchMode::Inline,
        enforce_flavor: false,
        ..Default::default()
    }
}

/// Temporary add-in directory with an in-process loader
pub struct Fixture {
    pub dir: TempDir,
    pub loader: Arc<StaticLoader>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            loader: Arc::new(StaticLoader::new()),
        }
    }

    /// Create `<name>.so` and `<name>.ini` and serve `library` for it
    pub fn addin(&self, name: &str, manifest: &str, library: StaticLibrary) -> PathBuf {
        let path = self.dir.path().join(format!("{name}.so"));
        std::fs::write(&path, b"").unwrap();
        std::fs::write(self.dir.path().join(format!("{name}.ini")), manifest).unwrap();
        self.loader.register(&path, library);
        path
    }

    pub fn registry(&self) -> AddinRegistry {
        self.registry_with(&config())
    }

    pub fn registry_with(&self, config: &AddinHostConfig) -> AddinRegistry {
        AddinRegistry::with_loader(config, self.loader.clone())
    }
}

/// Poll `condition` until it holds or five seconds pass
pub fn wait_for(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
