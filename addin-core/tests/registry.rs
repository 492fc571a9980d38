//! Registry behaviour: import checks, lifecycle and subscriptions

mod common;

use std::ffi::{CStr, c_void};
use std::sync::atomic::{AtomicI32, AtomicPtr, AtomicU32, Ordering};

use addin_api::ffi::{
    API_VERSION_SYMBOL, AddinInitArgs, ApiVersionFn, HostApi, ManifestView, START_SYMBOL,
    STOP_SYMBOL, StopFn,
};
use addin_api::{AddinId, AddinStatus, EventKind, HostFlavor, StartArgs};
use addin_core::{AddinError, AddinEvent, AddinHostConfig, AddinState, MAX_ADDINS};
use common::*;
use serial_test::serial;

#[test]
fn import_adds_record_and_rejects_same_path() {
    let fixture = Fixture::new();
    let path = fixture.addin("tracer", "display_name=Tracer\n", library());
    let registry = fixture.registry();

    let id = registry.import(&path).unwrap();
    assert_eq!(registry.count(), 1);
    assert_eq!(registry.get(0).unwrap().id, id);

    let result = registry.import(&path);
    assert!(matches!(result, Err(AddinError::AlreadyImported { .. })));
    assert_eq!(registry.count(), 1);
}

#[test]
fn import_assigns_distinct_nonzero_ids() {
    let fixture = Fixture::new();
    let registry = fixture.registry();

    let ids: Vec<AddinId> = (0..MAX_ADDINS)
        .map(|i| {
            let path = fixture.addin(&format!("addin{i}"), "", library());
            registry.import(&path).unwrap()
        })
        .collect();

    for (i, id) in ids.iter().enumerate() {
        assert_ne!(id.get(), 0);
        assert!(!ids[i + 1..].contains(id));
    }
}

#[test]
fn eighth_import_exceeds_capacity() {
    let fixture = Fixture::new();
    let registry = fixture.registry();

    for i in 0..MAX_ADDINS {
        let path = fixture.addin(&format!("addin{i}"), "", library());
        registry.import(&path).unwrap();
    }

    let path = fixture.addin("one-too-many", "", library());
    let result = registry.import(&path);
    assert!(matches!(result, Err(AddinError::CapacityExceeded { max: 7 })));
    assert_eq!(registry.count(), MAX_ADDINS);
}

#[test]
fn capacity_is_configurable() {
    let fixture = Fixture::new();
    let registry = fixture.registry_with(&AddinHostConfig {
        max_addins: 1,
        ..config()
    });

    registry.import(fixture.addin("first", "", library())).unwrap();
    let result = registry.import(fixture.addin("second", "", library()));
    assert!(matches!(result, Err(AddinError::CapacityExceeded { max: 1 })));
}

#[test]
fn import_without_manifest_fails() {
    let fixture = Fixture::new();
    let path = fixture.addin("tracer", "", library());
    std::fs::remove_file(fixture.dir.path().join("tracer.ini")).unwrap();
    let registry = fixture.registry();

    let result = registry.import(&path);
    assert!(matches!(result, Err(AddinError::ManifestNotFound { .. })));
    assert_eq!(registry.count(), 0);
}

#[test]
fn import_with_custom_manifest_extension() {
    let fixture = Fixture::new();
    let path = fixture.addin("tracer", "", library());
    std::fs::write(fixture.dir.path().join("tracer.manifest"), "author=Someone\n").unwrap();
    let registry = fixture.registry_with(&AddinHostConfig {
        manifest_extension: "manifest".to_string(),
        ..config()
    });

    let id = registry.import(&path).unwrap();
    assert_eq!(registry.manifest(id).unwrap().author, "Someone");
}

#[test]
fn import_unloadable_library_fails() {
    let fixture = Fixture::new();
    let path = fixture.dir.path().join("broken.so");
    std::fs::write(&path, b"").unwrap();
    std::fs::write(fixture.dir.path().join("broken.ini"), "").unwrap();
    let registry = fixture.registry();

    let result = registry.import(&path);
    assert!(matches!(result, Err(AddinError::LoadFailed { .. })));
}

#[test]
fn import_without_start_entry_point_fails() {
    let fixture = Fixture::new();
    let path = fixture.addin("tracer", "", library_with(windowed_init, &[START_SYMBOL]));
    let registry = fixture.registry();

    let err = registry.import(&path).unwrap_err();
    assert!(matches!(err, AddinError::LoadFailed { .. }));
    assert!(err.to_string().contains("start"));
    assert_eq!(registry.count(), 0);
}

#[test]
fn import_without_api_version_is_accepted() {
    let fixture = Fixture::new();
    let path = fixture.addin("tracer", "", library_with(windowed_init, &[API_VERSION_SYMBOL]));
    let registry = fixture.registry();

    assert!(registry.import(&path).is_ok());
}

#[test]
fn import_with_other_api_version_is_rejected() {
    let fixture = Fixture::new();
    let library = library_with(windowed_init, &[API_VERSION_SYMBOL])
        .with_symbol(API_VERSION_SYMBOL, old_api_version as ApiVersionFn as *const c_void);
    let path = fixture.addin("tracer", "", library);
    let registry = fixture.registry();

    let result = registry.import(&path);
    assert!(matches!(result, Err(AddinError::AbiMismatch { .. })));
    assert_eq!(registry.count(), 0);
}

static INIT_ID: AtomicU32 = AtomicU32::new(0);
static INIT_HOST_VERSION: AtomicU32 = AtomicU32::new(0);

unsafe extern "C" fn recording_init(args: *const AddinInitArgs) -> i32 {
    let args = unsafe { &*args };
    let host: &HostApi = unsafe { &*args.host };
    INIT_ID.store(args.id, Ordering::SeqCst);
    INIT_HOST_VERSION.store(host.api_version, Ordering::SeqCst);
    0
}

#[test]
fn import_passes_identity_and_host_table_to_init() {
    let fixture = Fixture::new();
    let path = fixture.addin("tracer", "", library_with(recording_init, &[]));
    let registry = fixture.registry();

    let id = registry.import(&path).unwrap();
    assert_eq!(INIT_ID.load(Ordering::SeqCst), id.get());
    assert_eq!(INIT_HOST_VERSION.load(Ordering::SeqCst), addin_api::API_VERSION);
}

#[test]
fn flavor_mismatch_is_rejected_when_enforced() {
    let fixture = Fixture::new();
    let console = fixture.addin("debugger", "", library_with(console_init, &[]));
    let windowed = fixture.addin("tracer", "", library());

    let windowed_host = fixture.registry_with(&AddinHostConfig {
        enforce_flavor: true,
        host_flavor: HostFlavor::Windowed,
        ..config()
    });
    let err = windowed_host.import(&console).unwrap_err();
    assert!(matches!(err, AddinError::AbiMismatch { .. }));
    assert!(err.to_string().contains("console"));
    assert!(windowed_host.import(&windowed).is_ok());

    let console_host = fixture.registry_with(&AddinHostConfig {
        enforce_flavor: true,
        host_flavor: HostFlavor::Console,
        ..config()
    });
    assert!(matches!(
        console_host.import(&windowed),
        Err(AddinError::AbiMismatch { .. })
    ));
    assert!(console_host.import(&console).is_ok());
}

#[test]
fn flavor_is_ignored_when_not_enforced() {
    let fixture = Fixture::new();
    let console = fixture.addin("debugger", "", library_with(console_init, &[]));
    let registry = fixture.registry_with(&AddinHostConfig {
        enforce_flavor: false,
        host_flavor: HostFlavor::Windowed,
        ..config()
    });

    assert!(registry.import(&console).is_ok());
}

#[test]
#[serial]
fn start_twice_calls_entry_point_once() {
    reset();
    let fixture = Fixture::new();
    let registry = fixture.registry();
    let id = registry.import(fixture.addin("tracer", "", library())).unwrap();

    assert!(registry.start(id, StartArgs::MANUAL));
    assert!(!registry.start(id, StartArgs::MANUAL));

    assert_eq!(START_CALLS.load(Ordering::SeqCst), 1);
    assert_eq!(LAST_START_ARGS.load(Ordering::SeqCst), StartArgs::MANUAL.bits());
    assert_eq!(registry.get_by_id(id).unwrap().state, AddinState::Active);
}

#[test]
#[serial]
fn stop_inactive_addin_is_noop() {
    reset();
    let fixture = Fixture::new();
    let registry = fixture.registry();
    let id = registry.import(fixture.addin("tracer", "", library())).unwrap();

    assert!(!registry.stop(id));
    assert_eq!(STOP_CALLS.load(Ordering::SeqCst), 0);

    let unknown = AddinId::new(id.get().wrapping_add(1).max(1)).unwrap();
    assert!(!registry.start(unknown, StartArgs::MANUAL));
    assert!(!registry.stop(unknown));
}

#[test]
#[serial]
fn stop_clears_every_subscription() {
    reset();
    let fixture = Fixture::new();
    let registry = fixture.registry();
    let id = registry.import(fixture.addin("tracer", "", library())).unwrap();

    registry.start(id, StartArgs::MANUAL);
    registry.subscribe(id, EventKind::Pause, "_pause_handler").unwrap();
    registry.subscribe(id, EventKind::Step, "_step_handler").unwrap();
    assert_eq!(
        registry.get_by_id(id).unwrap().subscriptions,
        vec![EventKind::Step, EventKind::Pause]
    );

    assert!(registry.stop(id));
    assert_eq!(STOP_CALLS.load(Ordering::SeqCst), 1);

    let info = registry.get_by_id(id).unwrap();
    assert_eq!(info.state, AddinState::Loaded);
    assert!(info.subscriptions.is_empty());

    registry.start(id, StartArgs::MANUAL);
    assert_eq!(registry.dispatch(&AddinEvent::Step), 0);
    assert_eq!(STEP_CALLS.load(Ordering::SeqCst), 0);
}

#[test]
#[serial]
fn reload_restarts_with_reload_flag() {
    reset();
    let fixture = Fixture::new();
    let registry = fixture.registry();
    let id = registry.import(fixture.addin("tracer", "", library())).unwrap();
    registry.start(id, StartArgs::MANUAL);

    registry.reload(id).unwrap();

    assert_eq!(STOP_CALLS.load(Ordering::SeqCst), 1);
    assert_eq!(START_CALLS.load(Ordering::SeqCst), 2);
    assert_eq!(LAST_START_ARGS.load(Ordering::SeqCst), StartArgs::RELOAD.bits());
    assert_eq!(registry.get_by_id(id).unwrap().state, AddinState::Active);
}

#[test]
fn reload_unknown_addin_fails() {
    let fixture = Fixture::new();
    let registry = fixture.registry();

    let result = registry.reload(AddinId::new(1).unwrap());
    assert!(matches!(result, Err(AddinError::UnknownAddin { .. })));
}

#[test]
#[serial]
fn start_auto_addins_only_starts_flagged_ones() {
    reset();
    let fixture = Fixture::new();
    let registry = fixture.registry();
    let auto = registry
        .import(fixture.addin("auto", "auto_start=true\n", library()))
        .unwrap();
    let manual = registry
        .import(fixture.addin("manual", "auto_start=false\n", library()))
        .unwrap();

    assert_eq!(registry.start_auto_addins(), 1);
    assert_eq!(registry.get_by_id(auto).unwrap().state, AddinState::Active);
    assert_eq!(registry.get_by_id(manual).unwrap().state, AddinState::Loaded);
    assert_eq!(LAST_START_ARGS.load(Ordering::SeqCst), StartArgs::AUTO.bits());
}

#[test]
fn subscribe_unknown_addin_fails() {
    let fixture = Fixture::new();
    let registry = fixture.registry();
    let id = AddinId::new(77).unwrap();

    let result = registry.subscribe(id, EventKind::Pause, "_pause_handler");
    assert!(matches!(result, Err(AddinError::UnknownAddin { .. })));
    let result = registry.unsubscribe(id, EventKind::Pause);
    assert!(matches!(result, Err(AddinError::UnknownAddin { .. })));
}

#[test]
fn subscribe_missing_symbol_keeps_previous_handler() {
    let fixture = Fixture::new();
    let registry = fixture.registry();
    let id = registry.import(fixture.addin("tracer", "", library())).unwrap();

    registry.subscribe(id, EventKind::Pause, "_pause_handler").unwrap();
    let result = registry.subscribe(id, EventKind::Pause, "_missing_handler");
    match result {
        Err(AddinError::SymbolResolutionFailed { kind, symbol, .. }) => {
            assert_eq!(kind, EventKind::Pause);
            assert_eq!(symbol, "_missing_handler");
        }
        other => panic!("expected SymbolResolutionFailed, got {other:?}"),
    }

    assert_eq!(
        registry.get_by_id(id).unwrap().subscriptions,
        vec![EventKind::Pause]
    );
}

#[test]
#[serial]
fn subscribe_then_unsubscribe_round_trip() {
    reset();
    let fixture = Fixture::new();
    let registry = fixture.registry();
    let id = registry.import(fixture.addin("tracer", "", library())).unwrap();
    registry.start(id, StartArgs::MANUAL);

    registry.subscribe(id, EventKind::Pause, "_pause_handler").unwrap();
    assert_eq!(registry.dispatch(&AddinEvent::Pause { paused: true }), 1);
    assert_eq!(PAUSE_CALLS.load(Ordering::SeqCst), 1);
    assert!(LAST_PAUSED.load(Ordering::SeqCst));

    registry.unsubscribe(id, EventKind::Pause).unwrap();
    assert_eq!(registry.dispatch(&AddinEvent::Pause { paused: false }), 0);
    assert_eq!(PAUSE_CALLS.load(Ordering::SeqCst), 1);

    // Unsubscribing an empty slot is fine
    registry.unsubscribe(id, EventKind::Pause).unwrap();
}

#[test]
fn manifest_example_is_parsed_on_import() {
    let fixture = Fixture::new();
    let registry = fixture.registry();
    let id = registry
        .import(fixture.addin(
            "example",
            "display_name=Foo\nauthor=Bar\nversion=1.0\nauto_start=true\n",
            library(),
        ))
        .unwrap();

    let manifest = registry.manifest(id).unwrap();
    assert_eq!(manifest.display_name, "Foo");
    assert_eq!(manifest.author, "Bar");
    assert_eq!(manifest.version, "1.0");
    assert!(manifest.auto_start);
}

#[test]
#[serial]
fn unload_all_stops_active_addins_and_empties_registry() {
    reset();
    let fixture = Fixture::new();
    let registry = fixture.registry();
    let active = registry.import(fixture.addin("active", "", library())).unwrap();
    let loaded = registry.import(fixture.addin("loaded", "", library())).unwrap();
    registry.start(active, StartArgs::MANUAL);

    registry.unload_all();

    assert_eq!(registry.count(), 0);
    assert!(registry.get_by_id(active).is_none());
    assert!(registry.get_by_id(loaded).is_none());
    assert!(registry.get(0).is_none());
    assert_eq!(STOP_CALLS.load(Ordering::SeqCst), 1);

    registry.unload_all();
    assert_eq!(registry.count(), 0);
    assert_eq!(STOP_CALLS.load(Ordering::SeqCst), 1);
}

static STOPPING_HOST: AtomicPtr<HostApi> = AtomicPtr::new(std::ptr::null_mut());
static STOPPING_ID: AtomicU32 = AtomicU32::new(0);
static STOP_MANIFEST_STATUS: AtomicI32 = AtomicI32::new(-1);
static STOP_UNSUBSCRIBE_STATUS: AtomicI32 = AtomicI32::new(-1);

unsafe extern "C" fn host_keeping_init(args: *const AddinInitArgs) -> i32 {
    let args = unsafe { &*args };
    STOPPING_HOST.store(args.host.cast_mut(), Ordering::SeqCst);
    STOPPING_ID.store(args.id, Ordering::SeqCst);
    0
}

/// Calls back into the host with its own id while stopping
unsafe extern "C" fn host_calling_stop() -> i32 {
    let host = unsafe { &*STOPPING_HOST.load(Ordering::SeqCst) };
    let id = STOPPING_ID.load(Ordering::SeqCst);

    let mut view = ManifestView::default();
    let status = unsafe { (host.get_manifest)(host.host_data, id, &mut view) };
    STOP_MANIFEST_STATUS.store(status, Ordering::SeqCst);

    let status = unsafe { (host.event_subscribe)(host.host_data, id, EventKind::Pause as u32, false) };
    STOP_UNSUBSCRIBE_STATUS.store(status, Ordering::SeqCst);
    0
}

#[test]
fn unload_all_runs_stop_while_addin_is_still_known() {
    let fixture = Fixture::new();
    let registry = fixture.registry();
    let library = library_with(host_keeping_init, &[])
        .with_symbol(STOP_SYMBOL, host_calling_stop as StopFn as *const c_void);
    let id = registry
        .import(fixture.addin("tracer", "display_name=Tracer\n", library))
        .unwrap();
    registry.start(id, StartArgs::MANUAL);
    registry.subscribe(id, EventKind::Pause, "_pause_handler").unwrap();

    registry.unload_all();

    assert_eq!(
        AddinStatus::from_code(STOP_MANIFEST_STATUS.load(Ordering::SeqCst)),
        AddinStatus::Ok
    );
    assert_eq!(
        AddinStatus::from_code(STOP_UNSUBSCRIBE_STATUS.load(Ordering::SeqCst)),
        AddinStatus::Ok
    );
    assert_eq!(registry.count(), 0);

    // Once stop has returned the identity is gone
    let api = registry.host_api();
    let mut view = ManifestView::default();
    let status = unsafe { (api.get_manifest)(api.host_data, id.get(), &mut view) };
    assert_eq!(AddinStatus::from_code(status), AddinStatus::UnknownAddin);
}

#[test]
fn unloaded_path_can_be_imported_again() {
    let fixture = Fixture::new();
    let registry = fixture.registry();
    let path = fixture.addin("tracer", "", library());

    let id = registry.import(&path).unwrap();
    registry.unload(id).unwrap();
    assert_eq!(registry.count(), 0);

    assert!(registry.import(&path).is_ok());
}

#[test]
fn import_dir_loads_libraries_in_name_order() {
    let fixture = Fixture::new();
    let b = fixture.addin("b-addin", "", library());
    let a = fixture.addin("a-addin", "", library());
    std::fs::write(fixture.dir.path().join("notes.txt"), "not an add-in").unwrap();
    let registry = fixture.registry();

    let results = registry.import_dir(fixture.dir.path()).unwrap();
    let paths: Vec<_> = results.iter().map(|(path, _)| path.clone()).collect();
    assert_eq!(paths, vec![a, b]);
    assert!(results.iter().all(|(_, result)| result.is_ok()));
    assert_eq!(registry.count(), 2);
}

#[test]
fn import_dir_missing_directory_is_empty() {
    let fixture = Fixture::new();
    let registry = fixture.registry();

    let results = registry.import_dir(fixture.dir.path().join("absent")).unwrap();
    assert!(results.is_empty());
}

#[test]
fn host_api_subscribes_conventional_handler() {
    let fixture = Fixture::new();
    let registry = fixture.registry();
    let id = registry.import(fixture.addin("tracer", "", library())).unwrap();
    let api = registry.host_api();

    let status = unsafe { (api.event_subscribe)(api.host_data, id.get(), EventKind::Pause as u32, true) };
    assert_eq!(AddinStatus::from_code(status), AddinStatus::Ok);
    assert_eq!(
        registry.get_by_id(id).unwrap().subscriptions,
        vec![EventKind::Pause]
    );

    let status = unsafe { (api.event_subscribe)(api.host_data, id.get(), EventKind::Pause as u32, false) };
    assert_eq!(AddinStatus::from_code(status), AddinStatus::Ok);
    assert!(registry.get_by_id(id).unwrap().subscriptions.is_empty());

    // No `_vblank_handler` export
    let status = unsafe { (api.event_subscribe)(api.host_data, id.get(), EventKind::Vblank as u32, true) };
    assert_eq!(AddinStatus::from_code(status), AddinStatus::SymbolResolutionFailed);

    let status = unsafe { (api.event_subscribe)(api.host_data, id.get(), 999, true) };
    assert_eq!(AddinStatus::from_code(status), AddinStatus::InvalidArgument);
}

#[test]
fn host_api_reports_unknown_addin() {
    let fixture = Fixture::new();
    let registry = fixture.registry();
    let api = registry.host_api();

    let status = unsafe { (api.event_subscribe)(api.host_data, 12345, EventKind::Step as u32, true) };
    assert_eq!(AddinStatus::from_code(status), AddinStatus::UnknownAddin);

    let mut view = ManifestView::default();
    let status = unsafe { (api.get_manifest)(api.host_data, 0, &mut view) };
    assert_eq!(AddinStatus::from_code(status), AddinStatus::UnknownAddin);
}

#[test]
fn host_api_returns_own_manifest() {
    let fixture = Fixture::new();
    let registry = fixture.registry();
    let id = registry
        .import(fixture.addin("tracer", "display_name=Tracer\nauthor=gb\nauto_start=1\n", library()))
        .unwrap();
    let api = registry.host_api();

    let mut view = ManifestView::default();
    let status = unsafe { (api.get_manifest)(api.host_data, id.get(), &mut view) };
    assert_eq!(AddinStatus::from_code(status), AddinStatus::Ok);

    let name = unsafe { CStr::from_ptr(view.display_name) };
    let author = unsafe { CStr::from_ptr(view.author) };
    let version = unsafe { CStr::from_ptr(view.version) };
    assert_eq!(name.to_str().unwrap(), "Tracer");
    assert_eq!(author.to_str().unwrap(), "gb");
    assert_eq!(version.to_str().unwrap(), "");
    assert!(view.auto_start);
    assert_eq!(api.api_version, addin_api::API_VERSION);
}
