//! AddinRegistry - imports add-ins, tracks their lifecycle and routes events
//!
//! Records live behind a lock shared with the host bridge, so add-ins can
//! call back into the host from any thread. Add-in code is never run while
//! that lock is held: the registry collects what it needs, releases the
//! lock and hands the call to its [`Invoker`].

use std::ffi::{CString, c_void};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use addin_api::ffi::{
    API_VERSION_SYMBOL, AddinInitArgs, HostApi, INIT_SYMBOL, ManifestView, START_SYMBOL,
    STOP_SYMBOL, StartFn, StopFn,
};
use addin_api::{API_VERSION, AddinId, AddinManifest, EventKind, HostFlavor, StartArgs};
use serde::Serialize;

use crate::bridge;
use crate::config::AddinHostConfig;
use crate::error::AddinError;
use crate::events::{AddinEvent, EventSubscriptionTable, HandlerRef};
use crate::invoker::{Invocation, Invoker};
use crate::loader::{DynamicLoader, LibLoader, LoadedLibrary, RawSymbol};
use crate::manifest::{ManifestReader, sidecar_path};

/// File extensions recognized as add-in libraries
pub const LIBRARY_EXTENSIONS: &[&str] = &["so", "dylib", "dll"];

/// Lifecycle state of an imported add-in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddinState {
    /// Imported, not running
    Loaded,
    /// Started and not stopped since
    Active,
}

impl std::fmt::Display for AddinState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loaded => write!(f, "loaded"),
            Self::Active => write!(f, "active"),
        }
    }
}

/// Snapshot of an imported add-in
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddinInfo {
    pub id: AddinId,
    pub path: PathBuf,
    pub state: AddinState,
    pub manifest: AddinManifest,
    /// Kinds with a handler, in event order
    pub subscriptions: Vec<EventKind>,
}

/// Manifest strings handed out to add-ins through the host API
struct ManifestStrings {
    display_name: CString,
    author: CString,
    version: CString,
}

impl ManifestStrings {
    fn new(manifest: &AddinManifest, path: &Path) -> Result<Self, AddinError> {
        let convert = |key: &str, value: &str| {
            CString::new(value).map_err(|_| AddinError::ManifestParseFailed {
                path: path.to_path_buf(),
                reason: format!("'{key}' contains a NUL character"),
            })
        };
        Ok(Self {
            display_name: convert("display_name", &manifest.display_name)?,
            author: convert("author", &manifest.author)?,
            version: convert("version", &manifest.version)?,
        })
    }
}

/// One imported add-in
struct AddinRecord {
    id: AddinId,
    path: PathBuf,
    state: AddinState,
    manifest: AddinManifest,
    manifest_strings: ManifestStrings,
    start: StartFn,
    stop: StopFn,
    subscriptions: EventSubscriptionTable,
    /// Declared last so it drops after everything resolved from it
    library: Arc<dyn LoadedLibrary>,
}

impl AddinRecord {
    fn info(&self) -> AddinInfo {
        AddinInfo {
            id: self.id,
            path: self.path.clone(),
            state: self.state,
            manifest: self.manifest.clone(),
            subscriptions: self.subscriptions.subscribed(),
        }
    }
}

/// State shared between the registry and the host bridge
pub(crate) struct RegistryInner {
    records: RwLock<Vec<AddinRecord>>,
    /// Unloaded add-ins whose `stop` has not finished yet. They stay
    /// reachable through the host API but are never dispatched to.
    retiring: RwLock<Vec<AddinRecord>>,
    api: HostApi,
    pub(crate) emulator: AtomicPtr<c_void>,
}

impl RegistryInner {
    fn read(&self) -> RwLockReadGuard<'_, Vec<AddinRecord>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<AddinRecord>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn retiring(&self) -> RwLockWriteGuard<'_, Vec<AddinRecord>> {
        self.retiring.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether `id` belongs to a live or retiring add-in
    fn id_in_use(&self, records: &[AddinRecord], id: AddinId) -> bool {
        records.iter().any(|record| record.id == id)
            || self.retiring().iter().any(|record| record.id == id)
    }

    /// Run `f` on the live or retiring record for `id`
    fn with_record<T>(&self, id: AddinId, f: impl FnOnce(&mut AddinRecord) -> T) -> Option<T> {
        if let Some(record) = self.write().iter_mut().find(|record| record.id == id) {
            return Some(f(record));
        }
        self.retiring().iter_mut().find(|record| record.id == id).map(f)
    }

    /// Take `record` out of service. The caller holds the records lock and
    /// has already removed it from there.
    ///
    /// An active add-in is parked in `retiring` so its `stop` still finds
    /// it; the returned retirement carries that `stop` to be submitted.
    fn retire(&self, mut record: AddinRecord) -> Retirement {
        record.subscriptions.clear_all();
        let mut retirement = Retirement {
            id: record.id,
            path: record.path.clone(),
            stop: None,
            record: None,
        };
        if record.state == AddinState::Active {
            record.state = AddinState::Loaded;
            retirement.stop = Some((record.stop, Arc::clone(&record.library)));
            self.retiring().push(record);
        } else {
            retirement.record = Some(record);
        }
        retirement
    }

    /// Resolve `symbol` and store it as the handler for `kind`. The slot is
    /// left untouched when the symbol cannot be resolved.
    pub(crate) fn subscribe(&self, id: AddinId, kind: EventKind, symbol: &str) -> Result<(), AddinError> {
        self.with_record(id, |record| {
            let raw = record
                .library
                .symbol(symbol)
                .ok_or_else(|| AddinError::SymbolResolutionFailed {
                    id,
                    kind,
                    symbol: symbol.to_string(),
                })?;

            // SAFETY: handlers are exported with the shared handler signature
            let func = unsafe { raw.into_handler() };
            record.subscriptions.set(
                kind,
                HandlerRef {
                    symbol: symbol.to_string(),
                    func,
                },
            );
            tracing::debug!(addin = %id, event = %kind, symbol, "Subscribed add-in to event");
            Ok(())
        })
        .unwrap_or(Err(AddinError::UnknownAddin { id }))
    }

    pub(crate) fn unsubscribe(&self, id: AddinId, kind: EventKind) -> Result<(), AddinError> {
        self.with_record(id, |record| {
            if record.subscriptions.clear(kind).is_some() {
                tracing::debug!(addin = %id, event = %kind, "Unsubscribed add-in from event");
            }
        })
        .ok_or(AddinError::UnknownAddin { id })
    }

    /// Borrowed manifest strings, valid while the record lives
    pub(crate) fn manifest_view(&self, id: AddinId) -> Option<ManifestView> {
        self.with_record(id, |record| ManifestView {
            display_name: record.manifest_strings.display_name.as_ptr(),
            author: record.manifest_strings.author.as_ptr(),
            version: record.manifest_strings.version.as_ptr(),
            auto_start: record.manifest.auto_start,
        })
    }
}

/// An add-in taken out of the registry
struct Retirement {
    id: AddinId,
    path: PathBuf,
    /// Entry point and keep-alive of an add-in that was active
    stop: Option<(StopFn, Arc<dyn LoadedLibrary>)>,
    /// Record of an add-in that was never started, released with the
    /// retirement
    record: Option<AddinRecord>,
}

/// Drops a retiring record once its `stop` invocation is done with it,
/// whether it ran or not
struct Retired {
    inner: Arc<RegistryInner>,
    id: AddinId,
}

impl Drop for Retired {
    fn drop(&mut self) {
        let record = {
            let mut retiring = self.inner.retiring();
            retiring
                .iter()
                .position(|record| record.id == self.id)
                .map(|index| retiring.remove(index))
        };
        drop(record);
    }
}

/// Everything import resolved, ready to become a record
struct Imported {
    library: Arc<dyn LoadedLibrary>,
    manifest: AddinManifest,
    manifest_strings: ManifestStrings,
    init: RawSymbol,
    start: StartFn,
    stop: StopFn,
}

/// The add-in registry manages importing, starting and stopping add-ins,
/// and dispatching host events to them
pub struct AddinRegistry {
    inner: Arc<RegistryInner>,
    loader: Arc<dyn DynamicLoader>,
    invoker: Arc<dyn Invoker>,
    reader: ManifestReader,
    manifest_extension: String,
    max_addins: usize,
    host_flavor: HostFlavor,
    enforce_flavor: bool,
}

impl AddinRegistry {
    /// Create a registry loading add-ins through the platform dynamic linker
    pub fn new(config: &AddinHostConfig) -> Self {
        Self::with_loader(config, Arc::new(LibLoader))
    }

    pub fn with_loader(config: &AddinHostConfig, loader: Arc<dyn DynamicLoader>) -> Self {
        let inner = Arc::new_cyclic(|weak| RegistryInner {
            records: RwLock::new(Vec::new()),
            retiring: RwLock::new(Vec::new()),
            api: bridge::host_api(weak.as_ptr()),
            emulator: AtomicPtr::new(std::ptr::null_mut()),
        });

        Self {
            inner,
            loader,
            invoker: config.dispatch.invoker(),
            reader: ManifestReader::new().with_max_value_chars(config.max_manifest_value_chars),
            manifest_extension: config.manifest_extension.clone(),
            max_addins: config.max_addins,
            host_flavor: config.host_flavor,
            enforce_flavor: config.enforce_flavor,
        }
    }

    /// Replace the invoker used to run add-in code
    pub fn with_invoker(mut self, invoker: Arc<dyn Invoker>) -> Self {
        self.invoker = invoker;
        self
    }

    /// Set the emulator handle add-ins receive from `get_emulator`
    pub fn set_emulator(&self, emulator: *mut c_void) {
        self.inner.emulator.store(emulator, Ordering::Release);
    }

    /// The function table handed to add-ins
    pub fn host_api(&self) -> &HostApi {
        &self.inner.api
    }

    /// Import the add-in library at `path`.
    ///
    /// On failure nothing is added and everything loaded so far is released.
    /// The add-in's `_addin_init` runs before it is registered, so host calls
    /// it makes from there see it as unknown.
    pub fn import(&self, path: impl AsRef<Path>) -> Result<AddinId, AddinError> {
        let path = path.as_ref();
        match self.try_import(path) {
            Ok(info) => {
                tracing::info!(
                    addin = %info.id,
                    path = %path.display(),
                    name = %info.manifest.display_name,
                    version = %info.manifest.version,
                    "Add-in imported"
                );
                Ok(info.id)
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to import add-in");
                Err(e)
            }
        }
    }

    fn try_import(&self, path: &Path) -> Result<AddinInfo, AddinError> {
        self.check_admissible(path)?;

        let imported = self.load(path)?;
        let id = self.generate_id();
        self.init(path, id, &imported)?;

        let record = AddinRecord {
            id,
            path: path.to_path_buf(),
            state: AddinState::Loaded,
            manifest: imported.manifest,
            manifest_strings: imported.manifest_strings,
            start: imported.start,
            stop: imported.stop,
            subscriptions: EventSubscriptionTable::new(),
            library: imported.library,
        };

        let mut records = self.inner.write();
        // Re-checked under the write lock in case another import raced us
        if records.len() >= self.max_addins {
            return Err(AddinError::CapacityExceeded {
                max: self.max_addins,
            });
        }
        if records.iter().any(|r| r.path == record.path) {
            return Err(AddinError::AlreadyImported { path: record.path });
        }
        if self.inner.id_in_use(&records, id) {
            return Err(AddinError::AllocationFailed(format!(
                "identity {id} was taken during import"
            )));
        }
        let info = record.info();
        records.push(record);
        Ok(info)
    }

    fn check_admissible(&self, path: &Path) -> Result<(), AddinError> {
        let records = self.inner.read();
        if records.len() >= self.max_addins {
            return Err(AddinError::CapacityExceeded {
                max: self.max_addins,
            });
        }
        if !path.is_file() {
            return Err(AddinError::BinaryNotFound {
                path: path.to_path_buf(),
            });
        }
        if records.iter().any(|record| record.path == path) {
            return Err(AddinError::AlreadyImported {
                path: path.to_path_buf(),
            });
        }
        Ok(())
    }

    /// Parse the manifest, load the library and resolve its entry points
    fn load(&self, path: &Path) -> Result<Imported, AddinError> {
        let manifest = self
            .reader
            .parse(&sidecar_path(path, &self.manifest_extension))?;
        let manifest_strings = ManifestStrings::new(&manifest, path)?;

        let library = self
            .loader
            .load(path)
            .map_err(|reason| AddinError::LoadFailed {
                path: path.to_path_buf(),
                reason,
            })?;

        let required = |name: &str| {
            library.symbol(name).ok_or_else(|| AddinError::LoadFailed {
                path: path.to_path_buf(),
                reason: format!("missing entry point '{name}'"),
            })
        };
        let start = required(START_SYMBOL)?;
        let stop = required(STOP_SYMBOL)?;
        let init = required(INIT_SYMBOL)?;

        if let Some(symbol) = library.symbol(API_VERSION_SYMBOL) {
            // SAFETY: exported with the `_addin_api_version` signature
            let version = unsafe { symbol.into_api_version()() };
            if version != API_VERSION {
                return Err(AddinError::AbiMismatch {
                    path: path.to_path_buf(),
                    reason: format!("add-in API version {version}, host expects {API_VERSION}"),
                });
            }
        }

        // SAFETY: the entry points are exported with the documented signatures
        let (start, stop) = unsafe { (start.into_start(), stop.into_stop()) };

        Ok(Imported {
            library,
            manifest,
            manifest_strings,
            init,
            start,
            stop,
        })
    }

    /// Hand the add-in its identity and the host table, then check the
    /// flavor it reports
    fn init(&self, path: &Path, id: AddinId, imported: &Imported) -> Result<(), AddinError> {
        let args = AddinInitArgs {
            id: id.get(),
            host: &self.inner.api,
        };
        // SAFETY: exported with the `_addin_init` signature; `args` outlives the call
        let flag = unsafe { imported.init.into_init()(&args) };
        let flavor = HostFlavor::from_init_flag(flag);

        if self.enforce_flavor && flavor != self.host_flavor {
            return Err(AddinError::AbiMismatch {
                path: path.to_path_buf(),
                reason: format!(
                    "add-in targets the {flavor} build, host is the {} build",
                    self.host_flavor
                ),
            });
        }
        Ok(())
    }

    /// Random non-zero identity not used by any live add-in
    fn generate_id(&self) -> AddinId {
        let records = self.inner.read();
        loop {
            if let Some(id) = AddinId::new(rand::random::<u32>())
                && !self.inner.id_in_use(&records, id)
            {
                return id;
            }
        }
    }

    /// Import every add-in library in `dir`, in file name order.
    ///
    /// Returns the outcome for each library found.
    pub fn import_dir(
        &self,
        dir: impl AsRef<Path>,
    ) -> Result<Vec<(PathBuf, Result<AddinId, AddinError>)>, AddinError> {
        let dir = dir.as_ref();
        if !dir.exists() {
            tracing::debug!(dir = %dir.display(), "Add-in directory does not exist");
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_library = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| LIBRARY_EXTENSIONS.contains(&ext));
            if path.is_file() && is_library {
                found.push(path);
            }
        }
        found.sort();

        Ok(found
            .into_iter()
            .map(|path| {
                let result = self.import(&path);
                (path, result)
            })
            .collect())
    }

    /// Start an add-in. Does nothing if it is unknown or already active.
    ///
    /// Returns whether the add-in's `start` was submitted.
    pub fn start(&self, id: AddinId, args: StartArgs) -> bool {
        let (start, library) = {
            let mut records = self.inner.write();
            let Some(record) = records.iter_mut().find(|record| record.id == id) else {
                return false;
            };
            if record.state == AddinState::Active {
                return false;
            }
            record.state = AddinState::Active;
            (record.start, Arc::clone(&record.library))
        };

        tracing::info!(addin = %id, args = ?args, "Starting add-in");
        let host = Arc::clone(&self.inner);
        self.invoker.invoke(Invocation::new(id, "start", move || {
            // SAFETY: `library` keeps the code mapped for the call
            let status = unsafe { start(args.bits()) };
            drop((library, host));
            status
        }));
        true
    }

    /// Stop an add-in. Does nothing if it is unknown or not active.
    ///
    /// All its subscriptions are dropped. Handlers already submitted keep
    /// running.
    pub fn stop(&self, id: AddinId) -> bool {
        let (stop, library) = {
            let mut records = self.inner.write();
            let Some(record) = records.iter_mut().find(|record| record.id == id) else {
                return false;
            };
            if record.state != AddinState::Active {
                return false;
            }
            record.state = AddinState::Loaded;
            record.subscriptions.clear_all();
            (record.stop, Arc::clone(&record.library))
        };

        tracing::info!(addin = %id, "Stopping add-in");
        self.submit_stop(id, stop, library);
        true
    }

    fn submit_stop(&self, id: AddinId, stop: StopFn, library: Arc<dyn LoadedLibrary>) {
        let host = Arc::clone(&self.inner);
        self.invoker.invoke(Invocation::new(id, "stop", move || {
            // SAFETY: `library` keeps the code mapped for the call
            let status = unsafe { stop() };
            drop((library, host));
            status
        }));
    }

    /// Stop an add-in, then start it again flagged as a reload
    pub fn reload(&self, id: AddinId) -> Result<(), AddinError> {
        if self.get_by_id(id).is_none() {
            return Err(AddinError::UnknownAddin { id });
        }
        self.stop(id);
        self.start(id, StartArgs::RELOAD);
        Ok(())
    }

    /// Start every loaded add-in whose manifest asks for it.
    ///
    /// Returns how many were started.
    pub fn start_auto_addins(&self) -> usize {
        let candidates: Vec<AddinId> = self
            .inner
            .read()
            .iter()
            .filter(|record| record.manifest.auto_start && record.state == AddinState::Loaded)
            .map(|record| record.id)
            .collect();

        candidates
            .into_iter()
            .filter(|id| self.start(*id, StartArgs::AUTO))
            .count()
    }

    /// Remove one add-in, stopping it first if it is active.
    ///
    /// While its `stop` runs the add-in is no longer listed or dispatched
    /// to, but its host API calls still resolve its identity.
    pub fn unload(&self, id: AddinId) -> Result<(), AddinError> {
        let retirement = {
            let mut records = self.inner.write();
            let index = records
                .iter()
                .position(|record| record.id == id)
                .ok_or(AddinError::UnknownAddin { id })?;
            self.inner.retire(records.remove(index))
        };
        self.finish(retirement);
        Ok(())
    }

    /// Stop every active add-in and release all of them. Safe to call
    /// repeatedly.
    pub fn unload_all(&self) {
        let retirements: Vec<Retirement> = {
            let mut records = self.inner.write();
            std::mem::take(&mut *records)
                .into_iter()
                .map(|record| self.inner.retire(record))
                .collect()
        };
        if retirements.is_empty() {
            return;
        }
        tracing::info!(count = retirements.len(), "Unloading all add-ins");
        for retirement in retirements {
            self.finish(retirement);
        }
    }

    fn finish(&self, retirement: Retirement) {
        let Retirement {
            id,
            path,
            stop,
            record,
        } = retirement;
        drop(record);

        if let Some((stop, library)) = stop {
            tracing::info!(addin = %id, "Stopping add-in");
            let retired = Retired {
                inner: Arc::clone(&self.inner),
                id,
            };
            self.invoker.invoke(Invocation::new(id, "stop", move || {
                // SAFETY: `library` keeps the code mapped for the call
                let status = unsafe { stop() };
                drop((library, retired));
                status
            }));
        }
        tracing::info!(addin = %id, path = %path.display(), "Add-in unloaded");
    }

    /// Add-in at `index` in import order
    pub fn get(&self, index: usize) -> Option<AddinInfo> {
        self.inner.read().get(index).map(AddinRecord::info)
    }

    pub fn get_by_id(&self, id: AddinId) -> Option<AddinInfo> {
        self.inner
            .read()
            .iter()
            .find(|record| record.id == id)
            .map(AddinRecord::info)
    }

    /// All add-ins in import order
    pub fn list(&self) -> Vec<AddinInfo> {
        self.inner.read().iter().map(AddinRecord::info).collect()
    }

    pub fn count(&self) -> usize {
        self.inner.read().len()
    }

    pub fn manifest(&self, id: AddinId) -> Option<AddinManifest> {
        self.inner
            .read()
            .iter()
            .find(|record| record.id == id)
            .map(|record| record.manifest.clone())
    }

    /// Route `kind` to the handler exported as `symbol`
    pub fn subscribe(&self, id: AddinId, kind: EventKind, symbol: &str) -> Result<(), AddinError> {
        self.inner.subscribe(id, kind, symbol)
    }

    pub fn unsubscribe(&self, id: AddinId, kind: EventKind) -> Result<(), AddinError> {
        self.inner.unsubscribe(id, kind)
    }

    /// Submit `event` to every active add-in subscribed to its kind, in
    /// import order.
    ///
    /// Returns how many handlers were submitted.
    pub fn dispatch(&self, event: &AddinEvent) -> usize {
        let kind = event.kind();
        let targets: Vec<(AddinId, HandlerRef, Arc<dyn LoadedLibrary>)> = self
            .inner
            .read()
            .iter()
            .filter(|record| record.state == AddinState::Active)
            .filter_map(|record| {
                record
                    .subscriptions
                    .get(kind)
                    .map(|handler| (record.id, handler.clone(), Arc::clone(&record.library)))
            })
            .collect();

        tracing::debug!(event = %kind, handlers = targets.len(), "Dispatching event");

        let submitted = targets.len();
        for (id, handler, library) in targets {
            let event = event.clone();
            let host = Arc::clone(&self.inner);
            self.invoker.invoke(Invocation::new(id, kind.as_str(), move || {
                // SAFETY: the handler was resolved for this kind and
                // `library` keeps it mapped for the call
                let status = unsafe { event.invoke(handler.func) };
                drop((library, host));
                status
            }));
        }
        submitted
    }
}

impl Drop for AddinRegistry {
    fn drop(&mut self) {
        self.unload_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::{DispatchMode, InlineInvoker};
    use crate::loader::{StaticLibrary, StaticLoader};
    use serial_test::serial;
    use std::sync::atomic::AtomicU32;
    use tempfile::TempDir;

    static LAST_START_ARGS: AtomicU32 = AtomicU32::new(0);

    unsafe extern "C" fn init(_args: *const AddinInitArgs) -> i32 {
        0
    }

    unsafe extern "C" fn start(args: u32) -> i32 {
        LAST_START_ARGS.store(args, Ordering::SeqCst);
        0
    }

    unsafe extern "C" fn stop() -> i32 {
        0
    }

    unsafe extern "C" fn on_step(_args: *const c_void) -> i32 {
        0
    }

    fn config() -> AddinHostConfig {
        AddinHostConfig {
            dispatch: DispatchMode::Inline,
            enforce_flavor: false,
            ..Default::default()
        }
    }

    fn library() -> StaticLibrary {
        StaticLibrary::new()
            .with_symbol(INIT_SYMBOL, init as addin_api::ffi::InitFn as *const c_void)
            .with_symbol(START_SYMBOL, start as StartFn as *const c_void)
            .with_symbol(STOP_SYMBOL, stop as StopFn as *const c_void)
            .with_symbol("_step_handler", on_step as addin_api::ffi::HandlerFn as *const c_void)
    }

    fn setup(dir: &TempDir, name: &str, manifest: &str) -> (AddinRegistry, PathBuf) {
        let path = dir.path().join(format!("{name}.so"));
        std::fs::write(&path, b"").unwrap();
        std::fs::write(dir.path().join(format!("{name}.ini")), manifest).unwrap();

        let loader = Arc::new(StaticLoader::new());
        loader.register(&path, library());
        let registry = AddinRegistry::with_loader(&config(), loader).with_invoker(Arc::new(InlineInvoker));
        (registry, path)
    }

    #[test]
    fn test_import_records_manifest() {
        let dir = TempDir::new().unwrap();
        let (registry, path) = setup(&dir, "tracer", "display_name=Tracer\nauto_start=1\n");

        let id = registry.import(&path).unwrap();
        let info = registry.get_by_id(id).unwrap();
        assert_eq!(info.path, path);
        assert_eq!(info.state, AddinState::Loaded);
        assert_eq!(info.manifest.display_name, "Tracer");
        assert!(info.manifest.auto_start);
        assert!(info.subscriptions.is_empty());
    }

    #[test]
    fn test_import_missing_binary() {
        let dir = TempDir::new().unwrap();
        let (registry, _) = setup(&dir, "tracer", "");

        let result = registry.import(dir.path().join("missing.so"));
        assert!(matches!(result, Err(AddinError::BinaryNotFound { .. })));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_import_rejects_nul_in_manifest() {
        let dir = TempDir::new().unwrap();
        let (registry, path) = setup(&dir, "tracer", "author=a\0b\n");

        let result = registry.import(&path);
        assert!(matches!(result, Err(AddinError::ManifestParseFailed { .. })));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    #[serial]
    fn test_start_auto_addins_passes_auto_flag() {
        let dir = TempDir::new().unwrap();
        let (registry, path) = setup(&dir, "tracer", "auto_start=true\n");
        let id = registry.import(&path).unwrap();

        assert_eq!(registry.start_auto_addins(), 1);
        assert_eq!(registry.get_by_id(id).unwrap().state, AddinState::Active);
        assert_eq!(LAST_START_ARGS.load(Ordering::SeqCst), StartArgs::AUTO.bits());
        assert_eq!(registry.start_auto_addins(), 0);
    }

    #[test]
    fn test_manifest_view_points_at_owned_strings() {
        let dir = TempDir::new().unwrap();
        let (registry, path) = setup(&dir, "tracer", "display_name=Tracer\nversion=2.1\n");
        let id = registry.import(&path).unwrap();

        let view = registry.inner.manifest_view(id).unwrap();
        let name = unsafe { std::ffi::CStr::from_ptr(view.display_name) };
        let version = unsafe { std::ffi::CStr::from_ptr(view.version) };
        assert_eq!(name.to_str().unwrap(), "Tracer");
        assert_eq!(version.to_str().unwrap(), "2.1");
        let other = AddinId::new(id.get().wrapping_add(1)).unwrap_or(AddinId::new(1).unwrap());
        assert!(registry.inner.manifest_view(other).is_none());
    }

    #[test]
    #[serial]
    fn test_dispatch_skips_loaded_addins() {
        let dir = TempDir::new().unwrap();
        let (registry, path) = setup(&dir, "tracer", "");
        let id = registry.import(&path).unwrap();

        registry.subscribe(id, EventKind::Step, "_step_handler").unwrap();
        assert_eq!(registry.dispatch(&AddinEvent::Step), 0);

        registry.start(id, StartArgs::MANUAL);
        registry.subscribe(id, EventKind::Step, "_step_handler").unwrap();
        assert_eq!(registry.dispatch(&AddinEvent::Step), 1);
    }

    #[test]
    fn test_unload_unknown_addin() {
        let dir = TempDir::new().unwrap();
        let (registry, _) = setup(&dir, "tracer", "");

        let result = registry.unload(AddinId::new(5).unwrap());
        assert!(matches!(result, Err(AddinError::UnknownAddin { .. })));
    }

    #[test]
    fn test_emulator_handle_passes_through() {
        let dir = TempDir::new().unwrap();
        let (registry, _) = setup(&dir, "tracer", "");
        let mut emulator = 0u8;

        let api = registry.host_api();
        assert!(unsafe { (api.get_emulator)(api.host_data) }.is_null());

        registry.set_emulator((&mut emulator as *mut u8).cast());
        let handle = unsafe { (api.get_emulator)(api.host_data) };
        assert_eq!(handle, (&mut emulator as *mut u8).cast::<c_void>());
    }
}
