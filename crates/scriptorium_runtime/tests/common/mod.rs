//! Shared fixtures for runtime integration tests.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::sync::Arc;

use scriptorium_engine::{CollectingIo, ErrorLedger, Flavor, StaticFetcher, StubEngine};
use scriptorium_hooks::HookRegistry;
use scriptorium_runtime::{LifecycleController, RecordingHost};

/// A fully wired controller over scripted collaborators.
pub struct Fixture {
    pub flavor: Flavor,
    pub engine: Arc<StubEngine>,
    pub host: Arc<RecordingHost>,
    pub io: Arc<CollectingIo>,
    pub hooks: Arc<HookRegistry>,
    pub ledger: Arc<ErrorLedger>,
    pub controller: LifecycleController,
}

pub fn fixture() -> Fixture {
    fixture_with_sources::<&str, &str>([])
}

pub fn fixture_with_sources<K, V>(sources: impl IntoIterator<Item = (K, V)>) -> Fixture
where
    K: Into<String>,
    V: Into<String>,
{
    let flavor = Flavor::new("py", "stub");
    let engine = Arc::new(StubEngine::new());
    let host = Arc::new(RecordingHost::new());
    let io = Arc::new(CollectingIo::default());
    let hooks = Arc::new(HookRegistry::new());
    let ledger = Arc::new(ErrorLedger::new());
    let fetcher = Arc::new(StaticFetcher::with_sources(sources));

    let controller = LifecycleController::new(
        flavor.clone(),
        Arc::clone(&engine) as _,
        Arc::clone(&hooks),
        Arc::clone(&ledger),
        Arc::clone(&host) as _,
        fetcher as _,
        Arc::clone(&io) as _,
    );

    Fixture {
        flavor,
        engine,
        host,
        io,
        hooks,
        ledger,
        controller,
    }
}
