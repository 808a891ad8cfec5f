//! Collaborator contracts at the runtime boundary.
//!
//! The core never implements interpreter semantics, network fetching or
//! worker transport itself. Embedding applications provide those behind the
//! traits in this module:
//!
//! - [`Engine`] — executes resolved source, synchronously or asynchronously
//! - [`IoSink`] — the unit-level error/output channel
//! - [`SourceFetcher`] — resolves external source references to text
//! - [`WorkerSpawner`] — constructs a background execution context
//!
//! The worker-side types ([`SyncBridge`], [`WorkerNamespace`],
//! [`WorkerOptions`], [`SpawnedWorker`]) describe what crosses the boundary
//! when a worker is spawned.

use core::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use hashbrown::HashMap;
use tokio::sync::{mpsc, oneshot};

use scriptorium_hooks::{HookRegistry, HookScope};

use crate::error::{EngineError, FetchError};

// ─────────────────────────────────────────────────────────────────────────────
// IoSink
// ─────────────────────────────────────────────────────────────────────────────

/// Per-unit I/O channel.
///
/// Every execution wrap exposes a stderr channel; errors captured anywhere in
/// the lifecycle (fetch failures, preempted units, worker runtime errors) are
/// reported here rather than thrown into the embedder's call path.
pub trait IoSink: Send + Sync {
    /// Writes a line of ordinary output.
    fn stdout(&self, _line: &str) {}

    /// Reports an error message.
    fn stderr(&self, message: &str);
}

/// Default [`IoSink`] routing output through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingIo;

impl IoSink for TracingIo {
    fn stdout(&self, line: &str) {
        tracing::info!(target: "scriptorium::io", "{line}");
    }

    fn stderr(&self, message: &str) {
        tracing::error!(target: "scriptorium::io", "{message}");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

/// An interpreter runtime capable of executing resolved source text.
///
/// The [`HookScope`] threaded into both run methods is the same scope the
/// hook chains mutated; engines expose it to interpreted code (a worker
/// namespace's computed "target", for instance) instead of relying on any
/// ambient "current element" state.
#[async_trait]
pub trait Engine: Send + Sync + 'static {
    /// Identifier of the interpreter implementation (e.g. `"cpython-wasm"`).
    fn interpreter(&self) -> &str;

    /// Executes source synchronously on the caller's thread.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Execution`] when the interpreter rejects or
    /// fails to execute the source.
    fn run(&self, scope: &mut HookScope, code: &str) -> Result<(), EngineError>;

    /// Executes source asynchronously.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Execution`] when execution settles with a
    /// failure, or [`EngineError::Unsupported`] when the engine has no
    /// asynchronous mode.
    async fn run_async(&self, scope: &mut HookScope, code: &str) -> Result<(), EngineError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// SourceFetcher
// ─────────────────────────────────────────────────────────────────────────────

/// Resolves an external source reference to text.
///
/// The network stack is the embedder's concern; the core only observes
/// success or a [`FetchError`] it can recover from.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetches the referenced source as text.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] on any transport or status failure.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// SyncBridge
// ─────────────────────────────────────────────────────────────────────────────

/// A callable primitive bridged from the spawning context into a worker's
/// interpreted code.
pub type SyncFn = Arc<dyn Fn(serde_json::Value) -> serde_json::Value + Send + Sync>;

/// The synchronization object injected into a spawned worker: a mapping of
/// named callable primitives reachable from the worker's interpreted code.
///
/// This is the only surface shared between the spawning context and the
/// worker; there is no other shared-memory mutation across the boundary.
#[derive(Default, Clone)]
pub struct SyncBridge {
    entries: HashMap<String, SyncFn>,
}

impl SyncBridge {
    /// Creates an empty bridge.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callable under the given name, replacing any previous one.
    pub fn insert<F>(&mut self, name: impl Into<String>, callable: F)
    where
        F: Fn(serde_json::Value) -> serde_json::Value + Send + Sync + 'static,
    {
        self.entries.insert(name.into(), Arc::new(callable));
    }

    /// Returns the callable registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<SyncFn> {
        self.entries.get(name).cloned()
    }

    /// Merges `other` into this bridge; entries in `other` win on collision.
    pub fn merge(&mut self, other: SyncBridge) {
        self.entries.extend(other.entries);
    }

    /// Names of all registered callables.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Number of registered callables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bridge is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for SyncBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncBridge")
            .field("entries", &self.names())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// WorkerNamespace
// ─────────────────────────────────────────────────────────────────────────────

/// One entry of the module namespace injected into a worker's interpreted
/// code.
#[derive(Clone)]
pub enum NamespaceEntry {
    /// A callable primitive.
    Callable(SyncFn),
    /// A plain value handed through as-is.
    Value(serde_json::Value),
    /// Resolved by the spawner against the current execution scope's display
    /// target at call time.
    CurrentTarget,
}

impl fmt::Debug for NamespaceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamespaceEntry::Callable(_) => f.write_str("Callable"),
            NamespaceEntry::Value(value) => write!(f, "Value({value})"),
            NamespaceEntry::CurrentTarget => f.write_str("CurrentTarget"),
        }
    }
}

/// The module namespace made reachable from a worker's interpreted code.
#[derive(Debug, Default, Clone)]
pub struct WorkerNamespace {
    entries: HashMap<String, NamespaceEntry>,
}

impl WorkerNamespace {
    /// Creates an empty namespace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry, builder style.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, entry: NamespaceEntry) -> Self {
        self.entries.insert(name.into(), entry);
        self
    }

    /// Returns the entry registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&NamespaceEntry> {
        self.entries.get(name)
    }

    /// Names of all entries.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// WorkerOptions / SpawnedWorker / WorkerSpawner
// ─────────────────────────────────────────────────────────────────────────────

/// Options handed to the worker-spawning primitive.
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct WorkerOptions {
    /// Interpreter implementation tag; filled from the flavor when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<String>,
    /// Config reference or inline config text for the worker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
    /// Spawner-specific extras, passed through untouched.
    #[serde(default, flatten)]
    pub extras: serde_json::Map<String, serde_json::Value>,
}

impl WorkerOptions {
    /// Merges these options over `defaults`: fields set here win, unset
    /// fields fall back to the defaults.
    #[must_use]
    pub fn merged_over(self, defaults: &WorkerOptions) -> WorkerOptions {
        let mut extras = defaults.extras.clone();
        extras.extend(self.extras);
        WorkerOptions {
            interpreter: self.interpreter.or_else(|| defaults.interpreter.clone()),
            config: self.config.or_else(|| defaults.config.clone()),
            extras,
        }
    }
}

/// Handle returned by a [`WorkerSpawner`].
///
/// `ready` resolves once the worker confirms initialization; `errors` carries
/// runtime errors raised inside the worker, which the facade forwards to the
/// spawning context's stderr channel.
#[derive(Debug)]
pub struct SpawnedWorker {
    /// The synchronization object as seen from the spawning side.
    pub sync: SyncBridge,
    /// Resolves when the worker confirms initialization.
    pub ready: oneshot::Receiver<Result<(), EngineError>>,
    /// Runtime errors raised inside the worker.
    pub errors: mpsc::UnboundedReceiver<EngineError>,
}

/// The low-level worker-spawning primitive.
#[async_trait]
pub trait WorkerSpawner: Send + Sync {
    /// Spawns a background execution context for `file`.
    ///
    /// The flavor's hook registry rides along so the spawned context can
    /// read its worker-side hook compositions and code snippets; spawned
    /// executions share the registry with the main thread rather than
    /// carrying their own.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] when the context cannot be constructed at
    /// all. Errors raised later, inside the running worker, travel through
    /// [`SpawnedWorker::errors`] instead.
    async fn spawn(
        &self,
        file: &str,
        options: WorkerOptions,
        bridge: SyncBridge,
        namespace: WorkerNamespace,
        hooks: Arc<HookRegistry>,
    ) -> Result<SpawnedWorker, EngineError>;
}
