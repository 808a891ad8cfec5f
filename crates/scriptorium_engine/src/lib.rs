//! Interpreter collaborator contracts and supporting services.
//!
//! This crate defines the boundary between the Scriptorium runtime and its
//! external collaborators: the interpreter itself ([`Engine`]), the remote
//! source fetcher ([`SourceFetcher`]), the worker-spawning primitive
//! ([`WorkerSpawner`]) and the unit-level I/O channel ([`IoSink`]). It also
//! carries the services those contracts lean on: flavor identity, per-flavor
//! config resolution, source text resolution (dedent / unescape / fallback)
//! and the process-wide error ledger.
//!
//! None of the interpreted-language semantics live here; an engine is
//! whatever the embedding application provides behind the trait.

pub mod config;
pub mod engine;
pub mod error;
pub mod flavor;
pub mod ledger;
pub mod source;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use config::{ConfigResolution, FlavorConfig};
pub use engine::{
    Engine, IoSink, NamespaceEntry, SourceFetcher, SpawnedWorker, SyncBridge, SyncFn, TracingIo,
    WorkerNamespace, WorkerOptions, WorkerSpawner,
};
pub use error::{ConfigError, EngineError, ErrorCode, FetchError, codes};
pub use flavor::Flavor;
pub use ledger::{ErrorLedger, ErrorRecord, UnitId};
pub use source::{SourcePrecedence, SourceSpec, dedent, resolve_source, unescape_html};

#[cfg(any(test, feature = "test-utils"))]
pub use test_support::{CollectingIo, RecordedRun, StaticFetcher, StubEngine};
