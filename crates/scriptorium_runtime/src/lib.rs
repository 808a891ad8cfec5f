//! Execution lifecycle orchestration.
//!
//! This crate drives script units through their lifecycle: a declarative
//! unit is attached, its source resolved, a display target chosen, the error
//! ledger consulted, hook chains invoked around execution, and ready/done
//! events dispatched through the host. Worker-spawn requests bypass the
//! attachment path but share the same hook registry through the
//! [`WorkerLauncher`].
//!
//! The top-level entry point is [`ScriptHostBuilder`], which wires flavors,
//! engines and collaborators together and publishes the process-wide export
//! surface through a [`ProcessRegistry`] exactly once per process.

pub mod host;
pub mod lifecycle;
pub mod registry;
pub mod setup;
pub mod unit;
pub mod worker;

pub use host::{Host, HostError, Placement, TargetHandle};
pub use lifecycle::{AttachOutcome, LifecycleController, LifecycleError};
pub use registry::{Exports, FlavorExports, ProcessRegistry, global_registry};
pub use setup::{FlavorSetup, ScriptHost, ScriptHostBuilder};
pub use unit::{DocumentSlot, ScriptUnit, UnitKind, UnitState};
pub use worker::{BootstrapGate, WorkerFacade, WorkerLauncher};

#[cfg(any(test, feature = "test-utils"))]
pub use host::RecordingHost;
