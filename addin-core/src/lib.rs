//! addin-core - host runtime for emulator add-ins
//!
//! This crate imports native add-in libraries, validates them against the
//! running host build, tracks their lifecycle and routes host events to the
//! handlers they subscribe.
//!
//! # Example
//!
//! ```no_run
//! use addin_api::{EventKind, StartArgs};
//! use addin_core::{AddinEvent, AddinHostConfig, AddinRegistry};
//!
//! let config = AddinHostConfig::load()?;
//! let registry = AddinRegistry::new(&config);
//!
//! let id = registry.import("/path/to/tracer.so")?;
//! registry.start(id, StartArgs::MANUAL);
//! registry.subscribe(id, EventKind::Pause, &EventKind::Pause.handler_symbol())?;
//! registry.dispatch(&AddinEvent::Pause { paused: true });
//!
//! registry.unload_all();
//! # Ok::<(), addin_core::AddinError>(())
//! ```

mod bridge;
pub mod config;
pub mod error;
pub mod events;
pub mod invoker;
pub mod loader;
pub mod manifest;
pub mod registry;

pub use bridge::HOST_VERSION;
pub use config::{AddinHostConfig, MAX_ADDINS, config_dir, config_dir_from};
pub use error::AddinError;
pub use events::{AddinEvent, EventSubscriptionTable, HandlerRef};
pub use invoker::{BlockingInvoker, DispatchMode, InlineInvoker, Invocation, Invoker, ThreadInvoker};
pub use loader::{DynamicLoader, LibLoader, LoadedLibrary, StaticLibrary, StaticLoader};
pub use manifest::ManifestReader;
pub use registry::{AddinInfo, AddinRegistry, AddinState};
