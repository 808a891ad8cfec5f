//! Worker bootstrap facade.
//!
//! [`WorkerLauncher`] is the user-facing way to spawn a background execution
//! context: it waits for the module bootstrap gate, fills in flavor defaults,
//! delegates to the embedder's [`WorkerSpawner`], forwards worker-side errors
//! to the spawning context's stderr channel, and only hands back a
//! [`WorkerFacade`] once the worker has confirmed initialization.

use std::sync::Arc;

use tokio::sync::watch;

use scriptorium_engine::{
    EngineError, Flavor, IoSink, SyncBridge, WorkerNamespace, WorkerOptions, WorkerSpawner,
};
use scriptorium_hooks::HookRegistry;

// ─────────────────────────────────────────────────────────────────────────────
// BootstrapGate
// ─────────────────────────────────────────────────────────────────────────────

/// A latch that holds worker spawns until module bootstrap finishes.
///
/// Gates start open by default; a flavor that needs deferred spawning opens
/// its gate explicitly at the end of bootstrap. Waiting on an open gate
/// returns immediately, and completion is permanent.
#[derive(Debug, Clone)]
pub struct BootstrapGate {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl BootstrapGate {
    /// Creates a gate that is already open.
    #[must_use]
    pub fn completed() -> Self {
        Self::with_state(true)
    }

    /// Creates a closed gate that must be opened by [`Self::complete`].
    #[must_use]
    pub fn deferred() -> Self {
        Self::with_state(false)
    }

    fn with_state(open: bool) -> Self {
        let (tx, rx) = watch::channel(open);
        Self { tx: Arc::new(tx), rx }
    }

    /// Opens the gate, releasing every waiter. Idempotent.
    pub fn complete(&self) {
        self.tx.send_replace(true);
    }

    /// Whether the gate is open.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        *self.rx.borrow()
    }

    /// Waits until the gate opens. Returns immediately when already open.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        // The sender lives in self, so wait_for cannot observe a closed
        // channel here.
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// WorkerLauncher / WorkerFacade
// ─────────────────────────────────────────────────────────────────────────────

/// Spawns workers for one flavor.
///
/// Spawned contexts share the flavor's hook registry with the main thread;
/// the launcher hands it to the spawner so worker-side compositions and
/// code snippets are reachable from the background context.
pub struct WorkerLauncher {
    flavor: Flavor,
    spawner: Arc<dyn WorkerSpawner>,
    hooks: Arc<HookRegistry>,
    gate: BootstrapGate,
    io: Arc<dyn IoSink>,
    defaults: WorkerOptions,
}

impl WorkerLauncher {
    /// Wires a launcher over the embedder's spawning primitive.
    #[must_use]
    pub fn new(
        flavor: Flavor,
        spawner: Arc<dyn WorkerSpawner>,
        hooks: Arc<HookRegistry>,
        gate: BootstrapGate,
        io: Arc<dyn IoSink>,
        defaults: WorkerOptions,
    ) -> Self {
        Self {
            flavor,
            spawner,
            hooks,
            gate,
            io,
            defaults,
        }
    }

    /// The hook registry shared with spawned contexts.
    #[must_use]
    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    /// The bootstrap gate this launcher waits on.
    #[must_use]
    pub fn gate(&self) -> &BootstrapGate {
        &self.gate
    }

    /// Spawns a worker running `file`, with an empty bridge and namespace.
    ///
    /// # Errors
    ///
    /// See [`Self::spawn_with`].
    pub async fn spawn(
        &self,
        file: &str,
        options: WorkerOptions,
    ) -> Result<WorkerFacade, EngineError> {
        self.spawn_with(file, options, SyncBridge::new(), WorkerNamespace::new())
            .await
    }

    /// Spawns a worker running `file` with the given synchronization bridge
    /// and module namespace.
    ///
    /// Resolves only after the worker confirms initialization; worker-side
    /// runtime errors raised afterwards are forwarded to this context's
    /// stderr channel in the background.
    ///
    /// # Errors
    ///
    /// Returns the spawner's error when the context cannot be constructed,
    /// the worker's own error when initialization fails, or
    /// [`EngineError::WorkerUnavailable`] when the worker goes away without
    /// ever confirming.
    pub async fn spawn_with(
        &self,
        file: &str,
        options: WorkerOptions,
        bridge: SyncBridge,
        namespace: WorkerNamespace,
    ) -> Result<WorkerFacade, EngineError> {
        self.gate.wait().await;

        let mut options = options.merged_over(&self.defaults);
        if options.interpreter.is_none() {
            options.interpreter = Some(self.flavor.interpreter().to_owned());
        }
        tracing::debug!(
            flavor = self.flavor.name(),
            file,
            interpreter = options.interpreter.as_deref(),
            "spawning worker"
        );

        let spawned = self
            .spawner
            .spawn(file, options, bridge, namespace, Arc::clone(&self.hooks))
            .await?;

        let io = Arc::clone(&self.io);
        let mut errors = spawned.errors;
        tokio::spawn(async move {
            while let Some(err) = errors.recv().await {
                tracing::error!(%err, "worker raised an error");
                io.stderr(&err.to_string());
            }
        });

        match spawned.ready.await {
            Ok(Ok(())) => Ok(WorkerFacade {
                flavor: self.flavor.clone(),
                sync: spawned.sync,
            }),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(EngineError::WorkerUnavailable),
        }
    }
}

impl core::fmt::Debug for WorkerLauncher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WorkerLauncher")
            .field("flavor", &self.flavor)
            .field("gate_open", &self.gate.is_complete())
            .finish_non_exhaustive()
    }
}

/// A live worker, ready to exchange calls through its synchronization bridge.
#[derive(Debug)]
pub struct WorkerFacade {
    flavor: Flavor,
    sync: SyncBridge,
}

impl WorkerFacade {
    /// The flavor that spawned this worker.
    #[must_use]
    pub fn flavor(&self) -> &Flavor {
        &self.flavor
    }

    /// The synchronization object shared with the worker.
    #[must_use]
    pub fn sync(&self) -> &SyncBridge {
        &self.sync
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completed_gate_passes_immediately() {
        let gate = BootstrapGate::completed();
        assert!(gate.is_complete());
        gate.wait().await;
    }

    #[tokio::test]
    async fn deferred_gate_releases_waiters_on_complete() {
        let gate = BootstrapGate::deferred();
        assert!(!gate.is_complete());

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait().await })
        };
        gate.complete();
        waiter.await.unwrap();
        assert!(gate.is_complete());
    }

    #[tokio::test]
    async fn complete_is_idempotent() {
        let gate = BootstrapGate::deferred();
        gate.complete();
        gate.complete();
        gate.wait().await;
    }
}
