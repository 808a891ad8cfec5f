//! Module bootstrap.
//!
//! [`ScriptHostBuilder`] wires one or more flavors into a host document:
//! each flavor gets its configuration resolved (fail-closed), its element
//! tag defined, a hook registry, a lifecycle controller, and a worker
//! launcher. The assembled surface is published through a
//! [`ProcessRegistry`], so the whole bootstrap runs at most once per
//! process.

use std::sync::Arc;

use hashbrown::HashMap;

use scriptorium_engine::{
    ConfigResolution, Engine, ErrorLedger, Flavor, IoSink, SourceFetcher, TracingIo, WorkerOptions,
    WorkerSpawner, codes,
};
use scriptorium_hooks::{Checkpoint, HookRegistry};

use crate::host::Host;
use crate::lifecycle::{AttachOutcome, LifecycleController, LifecycleError};
use crate::registry::{Exports, FlavorExports, ProcessRegistry};
use crate::unit::ScriptUnit;
use crate::worker::{BootstrapGate, WorkerLauncher};

// ─────────────────────────────────────────────────────────────────────────────
// FlavorSetup
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum ConfigSource {
    None,
    Inline(String),
    Url(String),
}

/// Everything one flavor needs to register: its identity, an engine, a
/// worker spawner, and optionally a configuration source.
pub struct FlavorSetup {
    flavor: Flavor,
    engine: Arc<dyn Engine>,
    spawner: Arc<dyn WorkerSpawner>,
    config: ConfigSource,
    worker_defaults: WorkerOptions,
    defer_workers: bool,
}

impl FlavorSetup {
    /// Describes a flavor with no configuration source.
    #[must_use]
    pub fn new(flavor: Flavor, engine: Arc<dyn Engine>, spawner: Arc<dyn WorkerSpawner>) -> Self {
        Self {
            flavor,
            engine,
            spawner,
            config: ConfigSource::None,
            worker_defaults: WorkerOptions::default(),
            defer_workers: false,
        }
    }

    /// Uses inline configuration text for this flavor.
    #[must_use]
    pub fn with_config_text(mut self, text: impl Into<String>) -> Self {
        self.config = ConfigSource::Inline(text.into());
        self
    }

    /// Fetches this flavor's configuration from a URL during bootstrap.
    #[must_use]
    pub fn with_config_url(mut self, url: impl Into<String>) -> Self {
        self.config = ConfigSource::Url(url.into());
        self
    }

    /// Default options merged under every worker spawn for this flavor.
    #[must_use]
    pub fn with_worker_defaults(mut self, defaults: WorkerOptions) -> Self {
        self.worker_defaults = defaults;
        self
    }

    /// Holds worker spawns until the flavor's bootstrap gate is completed
    /// explicitly. By default the gate starts open.
    #[must_use]
    pub fn defer_workers(mut self) -> Self {
        self.defer_workers = true;
        self
    }
}

impl core::fmt::Debug for FlavorSetup {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FlavorSetup")
            .field("flavor", &self.flavor)
            .field("engine", &self.engine.interpreter())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ScriptHostBuilder / ScriptHost
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for a bootstrapped script host.
pub struct ScriptHostBuilder {
    host: Arc<dyn Host>,
    fetcher: Arc<dyn SourceFetcher>,
    io: Arc<dyn IoSink>,
    flavors: Vec<FlavorSetup>,
}

impl ScriptHostBuilder {
    /// Starts a builder over the embedder's document and fetcher.
    #[must_use]
    pub fn new(host: Arc<dyn Host>, fetcher: Arc<dyn SourceFetcher>) -> Self {
        Self {
            host,
            fetcher,
            io: Arc::new(TracingIo),
            flavors: Vec::new(),
        }
    }

    /// Replaces the default tracing-backed io sink.
    #[must_use]
    pub fn with_io(mut self, io: Arc<dyn IoSink>) -> Self {
        self.io = io;
        self
    }

    /// Adds a flavor to register during bootstrap.
    #[must_use]
    pub fn flavor(mut self, setup: FlavorSetup) -> Self {
        self.flavors.push(setup);
        self
    }

    /// Bootstraps the module and publishes its exports through `registry`.
    ///
    /// The first bootstrap against a registry wins; later calls observe the
    /// already-published exports and register nothing. A flavor whose
    /// configuration fails to resolve, or whose element tag is already
    /// taken, is skipped: its element is never defined and
    /// [`Exports::when_defined`] never resolves for it.
    pub async fn bootstrap(self, registry: &ProcessRegistry) -> ScriptHost {
        if let Some(exports) = registry.exports() {
            tracing::warn!("module already live; skipping bootstrap");
            return ScriptHost {
                exports,
                controllers: HashMap::new(),
            };
        }

        let exports = Exports::new();
        let mut controllers = HashMap::new();

        for setup in self.flavors {
            let flavor = setup.flavor.clone();
            let config = match &setup.config {
                ConfigSource::None => ConfigResolution::empty(),
                ConfigSource::Inline(text) => ConfigResolution::from_inline(text),
                ConfigSource::Url(url) => {
                    ConfigResolution::from_url(self.fetcher.as_ref(), url).await
                }
            };
            // Fail closed: a broken config means the flavor never registers.
            if let Some(err) = config.error() {
                tracing::warn!(flavor = flavor.name(), %err, "configuration invalid; flavor not registered");
                self.io.stderr(&codes::BAD_CONFIG.message(err));
                continue;
            }

            let tag = flavor.element_tag();
            if let Err(err) = self.host.define_element(&tag) {
                tracing::warn!(flavor = flavor.name(), %err, "element registration failed; flavor not registered");
                continue;
            }

            let hooks = Arc::new(HookRegistry::new());
            // Registration on a fresh registry cannot collide.
            let _ = hooks.register_eager(Checkpoint::Ready, "core:ready-trace", |_, event| {
                tracing::debug!(%event, "unit ready");
                Ok(())
            });

            let gate = if setup.defer_workers {
                BootstrapGate::deferred()
            } else {
                BootstrapGate::completed()
            };
            let launcher = Arc::new(WorkerLauncher::new(
                flavor.clone(),
                Arc::clone(&setup.spawner),
                Arc::clone(&hooks),
                gate.clone(),
                Arc::clone(&self.io),
                setup.worker_defaults.clone(),
            ));
            let controller = Arc::new(LifecycleController::new(
                flavor.clone(),
                Arc::clone(&setup.engine),
                Arc::clone(&hooks),
                Arc::new(ErrorLedger::new()),
                Arc::clone(&self.host),
                Arc::clone(&self.fetcher),
                Arc::clone(&self.io),
            ));

            controllers.insert(flavor.name().to_owned(), controller);
            exports.publish(
                flavor.name(),
                FlavorExports::new(hooks, launcher, config, gate),
            );
        }

        let mut first = false;
        let published = registry.init_once(|| {
            first = true;
            exports
        });
        if !first {
            tracing::warn!("module already live; bootstrap result discarded");
            controllers.clear();
        }
        ScriptHost {
            exports: published,
            controllers,
        }
    }
}

/// A bootstrapped module: the published exports plus the per-flavor
/// lifecycle controllers that drive units.
#[derive(Debug)]
pub struct ScriptHost {
    exports: Arc<Exports>,
    controllers: HashMap<String, Arc<LifecycleController>>,
}

impl ScriptHost {
    /// The module's published exports.
    #[must_use]
    pub fn exports(&self) -> &Arc<Exports> {
        &self.exports
    }

    /// The lifecycle controller for a registered flavor.
    #[must_use]
    pub fn controller(&self, flavor: &str) -> Option<&Arc<LifecycleController>> {
        self.controllers.get(flavor)
    }

    /// Drives a unit under the named flavor.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::UnknownFlavor`] when no such flavor
    /// registered; otherwise whatever [`LifecycleController::attach`]
    /// returns.
    pub async fn attach(
        &self,
        flavor: &str,
        unit: &ScriptUnit,
    ) -> Result<AttachOutcome, LifecycleError> {
        match self.controllers.get(flavor) {
            Some(controller) => controller.attach(unit).await,
            None => Err(LifecycleError::UnknownFlavor(flavor.to_owned())),
        }
    }
}
