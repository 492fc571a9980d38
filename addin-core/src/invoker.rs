//! Execution strategies for add-in code
//!
//! Add-in entry points and event handlers are handed to an [`Invoker`] as
//! [`Invocation`]s. Detached invokers never block the caller and never report
//! back: once submitted, an invocation runs to completion and cannot be
//! cancelled.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use addin_api::AddinId;
use serde::{Deserialize, Serialize};

/// A unit of add-in code to run.
pub struct Invocation {
    /// Add-in the code belongs to
    pub addin: AddinId,
    /// What is being called (`start`, `stop`, an event kind)
    pub label: &'static str,
    job: Box<dyn FnOnce() -> i32 + Send>,
}

impl Invocation {
    pub fn new(addin: AddinId, label: &'static str, job: impl FnOnce() -> i32 + Send + 'static) -> Self {
        Self {
            addin,
            label,
            job: Box::new(job),
        }
    }

    /// Run the job, containing panics and logging failures.
    ///
    /// Returns the add-in's status code, or `None` if the job panicked.
    pub fn run(self) -> Option<i32> {
        let Self { addin, label, job } = self;
        match catch_unwind(AssertUnwindSafe(job)) {
            Ok(0) => {
                tracing::trace!(addin = %addin, call = label, "Add-in call returned");
                Some(0)
            }
            Ok(status) => {
                tracing::warn!(addin = %addin, call = label, status, "Add-in call returned non-zero status");
                Some(status)
            }
            Err(_) => {
                tracing::error!(addin = %addin, call = label, "Add-in call panicked");
                None
            }
        }
    }
}

/// Runs invocations
pub trait Invoker: Send + Sync {
    fn invoke(&self, invocation: Invocation);
}

/// How the registry runs add-in code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// On the calling thread
    Inline,
    /// One detached OS thread per invocation
    #[default]
    Thread,
    /// Tokio's blocking pool
    Blocking,
}

impl DispatchMode {
    /// Build the invoker for this mode
    pub fn invoker(self) -> Arc<dyn Invoker> {
        match self {
            Self::Inline => Arc::new(InlineInvoker),
            Self::Thread => Arc::new(ThreadInvoker::default()),
            Self::Blocking => match BlockingInvoker::try_current() {
                Some(invoker) => Arc::new(invoker),
                None => {
                    tracing::warn!("No tokio runtime available, dispatching on threads instead");
                    Arc::new(ThreadInvoker::default())
                }
            },
        }
    }
}

/// Runs invocations synchronously on the caller's thread
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineInvoker;

impl Invoker for InlineInvoker {
    fn invoke(&self, invocation: Invocation) {
        invocation.run();
    }
}

/// Spawns a named, detached thread per invocation
#[derive(Debug, Default)]
pub struct ThreadInvoker {
    spawned: AtomicUsize,
}

impl ThreadInvoker {
    /// Number of threads spawned so far
    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::Relaxed)
    }
}

impl Invoker for ThreadInvoker {
    fn invoke(&self, invocation: Invocation) {
        let name = format!("addin-{}-{}", invocation.addin, invocation.label);
        let (addin, label) = (invocation.addin, invocation.label);

        // The job is moved into the closure; if the spawn fails it is
        // dropped with it, so there is nothing left to fall back on.
        let result = std::thread::Builder::new().name(name).spawn(move || {
            invocation.run();
        });

        match result {
            Ok(_detached) => {
                self.spawned.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!(addin = %addin, call = label, error = %e, "Failed to spawn add-in thread");
            }
        }
    }
}

/// Runs invocations on tokio's blocking thread pool
#[derive(Debug, Clone)]
pub struct BlockingInvoker {
    handle: tokio::runtime::Handle,
}

impl BlockingInvoker {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime of the calling context, if there is one
    pub fn try_current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(Self::new)
    }
}

impl Invoker for BlockingInvoker {
    fn invoke(&self, invocation: Invocation) {
        drop(self.handle.spawn_blocking(move || {
            invocation.run();
        }));
    }
}
