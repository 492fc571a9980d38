//! Dynamic loader adapter
//!
//! [`DynamicLoader`] hides how add-in code gets into the process.
//! [`LibLoader`] uses the platform dynamic linker through `libloading`;
//! [`StaticLoader`] serves symbol tables registered in-process, for add-ins
//! linked into the host binary and for tests.

use std::collections::HashMap;
use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::{Arc, PoisonError, RwLock};

use addin_api::ffi::{ApiVersionFn, HandlerFn, InitFn, StartFn, StopFn};
use libloading::Library;

/// Address of a symbol resolved from a loaded library.
///
/// Only meaningful while the library it came from stays loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSymbol(NonNull<c_void>);

// SAFETY: a code address can be shared freely; calling through it is what
// requires care, and that is always `unsafe`.
unsafe impl Send for RawSymbol {}
unsafe impl Sync for RawSymbol {}

impl RawSymbol {
    pub fn from_ptr(ptr: *const c_void) -> Option<Self> {
        NonNull::new(ptr.cast_mut()).map(Self)
    }

    pub fn as_ptr(self) -> *const c_void {
        self.0.as_ptr()
    }

    /// # Safety
    ///
    /// The symbol must be a function with the `_addin_init` signature.
    pub unsafe fn into_init(self) -> InitFn {
        unsafe { std::mem::transmute::<*mut c_void, InitFn>(self.0.as_ptr()) }
    }

    /// # Safety
    ///
    /// The symbol must be a function with the `start` signature.
    pub unsafe fn into_start(self) -> StartFn {
        unsafe { std::mem::transmute::<*mut c_void, StartFn>(self.0.as_ptr()) }
    }

    /// # Safety
    ///
    /// The symbol must be a function with the `stop` signature.
    pub unsafe fn into_stop(self) -> StopFn {
        unsafe { std::mem::transmute::<*mut c_void, StopFn>(self.0.as_ptr()) }
    }

    /// # Safety
    ///
    /// The symbol must be a function with the `_addin_api_version` signature.
    pub unsafe fn into_api_version(self) -> ApiVersionFn {
        unsafe { std::mem::transmute::<*mut c_void, ApiVersionFn>(self.0.as_ptr()) }
    }

    /// # Safety
    ///
    /// The symbol must be a function with the event handler signature.
    pub unsafe fn into_handler(self) -> HandlerFn {
        unsafe { std::mem::transmute::<*mut c_void, HandlerFn>(self.0.as_ptr()) }
    }
}

/// A library mapped into the process. Dropping it unloads the library.
pub trait LoadedLibrary: Send + Sync {
    /// Resolve an exported symbol by name
    fn symbol(&self, name: &str) -> Option<RawSymbol>;
}

/// Loads add-in libraries
pub trait DynamicLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Arc<dyn LoadedLibrary>, String>;
}

/// Loader backed by the platform dynamic linker
#[derive(Debug, Default, Clone, Copy)]
pub struct LibLoader;

struct NativeLibrary(Library);

impl LoadedLibrary for NativeLibrary {
    fn symbol(&self, name: &str) -> Option<RawSymbol> {
        // SAFETY: the symbol is only read as an address here; it is
        // converted to a typed function by the caller.
        let symbol = unsafe { self.0.get::<*mut c_void>(name.as_bytes()) }.ok()?;
        RawSymbol::from_ptr(*symbol)
    }
}

impl DynamicLoader for LibLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn LoadedLibrary>, String> {
        // SAFETY: add-ins are trusted; loading runs their initializers.
        let library = unsafe { Library::new(path) }.map_err(|e| e.to_string())?;
        Ok(Arc::new(NativeLibrary(library)))
    }
}

/// Symbol table standing in for a library
#[derive(Debug, Default, Clone)]
pub struct StaticLibrary {
    symbols: HashMap<String, RawSymbol>,
}

impl StaticLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a symbol. Null addresses are ignored.
    pub fn with_symbol(mut self, name: impl Into<String>, address: *const c_void) -> Self {
        if let Some(symbol) = RawSymbol::from_ptr(address) {
            self.symbols.insert(name.into(), symbol);
        }
        self
    }
}

impl LoadedLibrary for StaticLibrary {
    fn symbol(&self, name: &str) -> Option<RawSymbol> {
        self.symbols.get(name).copied()
    }
}

/// Loader serving libraries registered under a path
#[derive(Default)]
pub struct StaticLoader {
    libraries: RwLock<HashMap<PathBuf, StaticLibrary>>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `library` loadable from `path`
    pub fn register(&self, path: impl Into<PathBuf>, library: StaticLibrary) {
        self.libraries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), library);
    }
}

impl DynamicLoader for StaticLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn LoadedLibrary>, String> {
        let libraries = self.libraries.read().unwrap_or_else(PoisonError::into_inner);
        libraries
            .get(path)
            .cloned()
            .map(|library| Arc::new(library) as Arc<dyn LoadedLibrary>)
            .ok_or_else(|| format!("no static library registered for {}", path.display()))
    }
}
