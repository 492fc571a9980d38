//! Hello Add-in - A simple example add-in for the emulator host
//!
//! This add-in demonstrates:
//! - Exporting the entry points with `export_addin!`
//! - Reading its own manifest and the emulator handle through the host
//! - Subscribing to events and handling them with `addin_handler!`
//!
//! ## Building
//!
//! ```bash
//! cargo build --release
//! ```
//!
//! ## Installing
//!
//! ```bash
//! mkdir -p ~/.config/addins/addins
//! cp target/release/libhello_addin.so ~/.config/addins/addins/hello_addin.so
//! cp hello_addin.ini ~/.config/addins/addins/hello_addin.ini
//! addins run --event pause=true --event step
//! ```

use std::sync::atomic::{AtomicU32, Ordering};

use addin_api::{EventKind, HostCallError, LogLevel, StartArgs, addin_handler, export_addin, host};

/// Steps seen since the last start
static STEPS: AtomicU32 = AtomicU32::new(0);

fn on_start(args: StartArgs) -> Result<(), HostCallError> {
    let host = host().ok_or(HostCallError::NotInitialized)?;
    let manifest = host.manifest()?;

    STEPS.store(0, Ordering::Relaxed);
    host.log(
        LogLevel::Info,
        &format!(
            "{} {} starting ({:?}) on host {}",
            manifest.display_name,
            manifest.version,
            args,
            host.version()
        ),
    );
    if host.emulator().is_null() {
        host.log(LogLevel::Warn, "No emulator attached");
    }

    host.subscribe(EventKind::Pause)?;
    host.subscribe(EventKind::Step)?;
    host.subscribe(EventKind::Fullscreen)?;
    Ok(())
}

fn on_stop() {
    if let Some(host) = host() {
        let steps = STEPS.load(Ordering::Relaxed);
        host.log(LogLevel::Info, &format!("Stopping after {steps} steps"));
    }
}

fn on_pause(paused: bool) {
    if let Some(host) = host() {
        host.log(LogLevel::Info, if paused { "Paused" } else { "Resumed" });
    }
}

fn on_step() {
    STEPS.fetch_add(1, Ordering::Relaxed);
}

fn on_fullscreen(is_fullscreen: bool) -> Result<(), HostCallError> {
    let host = host().ok_or(HostCallError::NotInitialized)?;
    host.log(LogLevel::Debug, &format!("Fullscreen: {is_fullscreen}"));
    // Nothing left to watch once the window is maximized
    if is_fullscreen {
        host.unsubscribe(EventKind::Fullscreen)?;
    }
    Ok(())
}

// These macros generate the C ABI entry points for dynamic loading
export_addin!(start = on_start, stop = on_stop);
addin_handler!(pause => on_pause);
addin_handler!(step => on_step);
addin_handler!(fullscreen => on_fullscreen);
