//! Lifecycle-hook orchestration and dual-context execution for embedded
//! script runtimes.
//!
//! Scriptorium drives declarative script units through a hook-instrumented
//! lifecycle: a unit is attached, its source resolved, a display target
//! chosen, plugin hook chains invoked around execution, and ready/done
//! events dispatched through the embedding host. Interpreters, documents,
//! fetchers and worker primitives are all collaborator traits supplied by
//! the embedder.

pub use scriptorium_engine as engine;
pub use scriptorium_hooks as hooks;
pub use scriptorium_runtime as runtime;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use scriptorium_engine::{
        ConfigResolution, Engine, EngineError, ErrorLedger, ErrorRecord, FetchError, Flavor,
        FlavorConfig, IoSink, SourceFetcher, SourceSpec, SyncBridge, UnitId, WorkerNamespace,
        WorkerOptions, WorkerSpawner, codes,
    };
    pub use scriptorium_hooks::{
        Checkpoint, CodeSlot, HookContext, HookRegistry, HookScope, LifecycleEvent,
    };
    pub use scriptorium_runtime::{
        AttachOutcome, BootstrapGate, DocumentSlot, Exports, FlavorExports, FlavorSetup, Host,
        HostError, LifecycleController, LifecycleError, Placement, ProcessRegistry, ScriptHost,
        ScriptHostBuilder, ScriptUnit, TargetHandle, UnitKind, UnitState, WorkerFacade,
        WorkerLauncher, global_registry,
    };
}
