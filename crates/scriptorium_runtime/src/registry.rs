//! Process-wide module identity and published exports.
//!
//! A process gets exactly one live module: the first bootstrap wins and every
//! later one observes the same [`Exports`] instead of re-initializing. The
//! guard is an injectable value rather than a hidden global so embedders (and
//! tests) can scope "the process" themselves; [`global_registry`] provides
//! the conventional process-wide instance.

use std::sync::{Arc, OnceLock};

use hashbrown::HashMap;
use parking_lot::RwLock;
use tokio::sync::watch;

use scriptorium_engine::{ConfigResolution, FlavorConfig};
use scriptorium_hooks::HookRegistry;

use crate::worker::{BootstrapGate, WorkerLauncher};

// ─────────────────────────────────────────────────────────────────────────────
// FlavorExports / Exports
// ─────────────────────────────────────────────────────────────────────────────

/// The public surface one registered flavor exposes to the embedder.
#[derive(Debug)]
pub struct FlavorExports {
    hooks: Arc<HookRegistry>,
    launcher: Arc<WorkerLauncher>,
    config: ConfigResolution,
    gate: BootstrapGate,
}

impl FlavorExports {
    /// Bundles a flavor's published surface.
    #[must_use]
    pub fn new(
        hooks: Arc<HookRegistry>,
        launcher: Arc<WorkerLauncher>,
        config: ConfigResolution,
        gate: BootstrapGate,
    ) -> Self {
        Self {
            hooks,
            launcher,
            config,
            gate,
        }
    }

    /// The flavor's hook registry, for plugin registration.
    #[must_use]
    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    /// The flavor's worker launcher.
    #[must_use]
    pub fn launcher(&self) -> &Arc<WorkerLauncher> {
        &self.launcher
    }

    /// A deep copy of the flavor's resolved configuration. Callers cannot
    /// mutate the configuration actually in use.
    #[must_use]
    pub fn config_snapshot(&self) -> FlavorConfig {
        self.config.snapshot()
    }

    /// The flavor's worker bootstrap gate.
    #[must_use]
    pub fn gate(&self) -> &BootstrapGate {
        &self.gate
    }
}

/// Everything the live module publishes, keyed by flavor name.
#[derive(Debug)]
pub struct Exports {
    flavors: RwLock<HashMap<String, Arc<FlavorExports>>>,
    defined_tx: watch::Sender<u64>,
}

impl Default for Exports {
    fn default() -> Self {
        Self::new()
    }
}

impl Exports {
    /// Creates an empty export surface.
    #[must_use]
    pub fn new() -> Self {
        let (defined_tx, _) = watch::channel(0);
        Self {
            flavors: RwLock::new(HashMap::new()),
            defined_tx,
        }
    }

    /// Publishes a flavor's surface, waking [`Self::when_defined`] waiters.
    pub fn publish(&self, flavor: impl Into<String>, exports: FlavorExports) {
        let flavor = flavor.into();
        tracing::info!(%flavor, "flavor registered");
        self.flavors.write().insert(flavor, Arc::new(exports));
        self.defined_tx.send_modify(|version| *version += 1);
    }

    /// The published surface for a flavor, if it registered successfully.
    #[must_use]
    pub fn flavor(&self, name: &str) -> Option<Arc<FlavorExports>> {
        self.flavors.read().get(name).cloned()
    }

    /// Names of all registered flavors.
    #[must_use]
    pub fn flavor_names(&self) -> Vec<String> {
        self.flavors.read().keys().cloned().collect()
    }

    /// Resolves once the named flavor has registered.
    ///
    /// A flavor whose bootstrap failed never registers, so this never
    /// resolves for it.
    pub async fn when_defined(&self, name: &str) -> Arc<FlavorExports> {
        let mut rx = self.defined_tx.subscribe();
        loop {
            if let Some(exports) = self.flavor(name) {
                return exports;
            }
            rx.borrow_and_update();
            if rx.changed().await.is_err() {
                // The sender lives in self; pending() keeps the contract
                // that an unregistered flavor never resolves.
                futures::future::pending::<()>().await;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ProcessRegistry
// ─────────────────────────────────────────────────────────────────────────────

/// Init-once guard around the process's module exports.
#[derive(Debug)]
pub struct ProcessRegistry {
    slot: OnceLock<Arc<Exports>>,
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRegistry {
    /// Creates an empty registry with no live module.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slot: OnceLock::new(),
        }
    }

    /// Runs `init` at most once for this registry and returns the live
    /// exports. Concurrent and repeated calls all observe the identical
    /// value; only the first call's closure runs.
    pub fn init_once<F>(&self, init: F) -> Arc<Exports>
    where
        F: FnOnce() -> Exports,
    {
        let mut initialized = false;
        let exports = self.slot.get_or_init(|| {
            initialized = true;
            Arc::new(init())
        });
        if !initialized {
            tracing::debug!("module already live; reusing existing exports");
        }
        Arc::clone(exports)
    }

    /// Whether a module has already bootstrapped in this registry.
    #[must_use]
    pub fn already_live(&self) -> bool {
        self.slot.get().is_some()
    }

    /// The live exports, if any.
    #[must_use]
    pub fn exports(&self) -> Option<Arc<Exports>> {
        self.slot.get().map(Arc::clone)
    }
}

/// The conventional process-wide registry.
#[must_use]
pub fn global_registry() -> &'static ProcessRegistry {
    static GLOBAL: ProcessRegistry = ProcessRegistry::new();
    &GLOBAL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_once_runs_exactly_once() {
        let registry = ProcessRegistry::new();
        assert!(!registry.already_live());

        let first = registry.init_once(Exports::new);
        let second = registry.init_once(|| panic!("second init must not run"));

        assert!(Arc::ptr_eq(&first, &second));
        assert!(registry.already_live());
    }

    #[test]
    fn exports_is_none_before_init() {
        let registry = ProcessRegistry::new();
        assert!(registry.exports().is_none());
        registry.init_once(Exports::new);
        assert!(registry.exports().is_some());
    }

    #[tokio::test]
    async fn when_defined_resolves_after_publish() {
        use scriptorium_engine::{Flavor, TracingIo, WorkerOptions};

        struct NoSpawn;
        #[async_trait::async_trait]
        impl scriptorium_engine::WorkerSpawner for NoSpawn {
            async fn spawn(
                &self,
                _file: &str,
                _options: WorkerOptions,
                _bridge: scriptorium_engine::SyncBridge,
                _namespace: scriptorium_engine::WorkerNamespace,
                _hooks: Arc<HookRegistry>,
            ) -> Result<scriptorium_engine::SpawnedWorker, scriptorium_engine::EngineError>
            {
                Err(scriptorium_engine::EngineError::WorkerUnavailable)
            }
        }

        let exports = Arc::new(Exports::new());
        let waiter = {
            let exports = Arc::clone(&exports);
            tokio::spawn(async move { exports.when_defined("py").await })
        };

        let flavor = Flavor::new("py", "stub");
        let gate = BootstrapGate::completed();
        let hooks = Arc::new(HookRegistry::new());
        let launcher = Arc::new(WorkerLauncher::new(
            flavor,
            Arc::new(NoSpawn),
            Arc::clone(&hooks),
            gate.clone(),
            Arc::new(TracingIo),
            WorkerOptions::default(),
        ));
        exports.publish(
            "py",
            FlavorExports::new(hooks, launcher, ConfigResolution::empty(), gate),
        );

        let resolved = waiter.await.unwrap();
        assert!(Arc::ptr_eq(&resolved, &exports.flavor("py").unwrap()));
    }
}
