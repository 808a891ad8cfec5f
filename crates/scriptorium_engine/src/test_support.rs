//! Scripted collaborator implementations for tests.
//!
//! These mirror the contract of real collaborators while recording every
//! interaction, so lifecycle tests can assert on what was executed, fetched
//! and reported without an actual interpreter or network stack.

use async_trait::async_trait;
use hashbrown::HashMap;
use parking_lot::Mutex;

use scriptorium_hooks::HookScope;

use crate::engine::{Engine, IoSink, SourceFetcher};
use crate::error::{EngineError, FetchError};

// ─────────────────────────────────────────────────────────────────────────────
// CollectingIo
// ─────────────────────────────────────────────────────────────────────────────

/// [`IoSink`] recording every line it receives.
#[derive(Debug, Default)]
pub struct CollectingIo {
    stdout: Mutex<Vec<String>>,
    stderr: Mutex<Vec<String>>,
}

impl CollectingIo {
    /// All stderr lines reported so far.
    #[must_use]
    pub fn stderr_lines(&self) -> Vec<String> {
        self.stderr.lock().clone()
    }

    /// All stdout lines reported so far.
    #[must_use]
    pub fn stdout_lines(&self) -> Vec<String> {
        self.stdout.lock().clone()
    }
}

impl IoSink for CollectingIo {
    fn stdout(&self, line: &str) {
        self.stdout.lock().push(line.to_string());
    }

    fn stderr(&self, message: &str) {
        self.stderr.lock().push(message.to_string());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// StaticFetcher
// ─────────────────────────────────────────────────────────────────────────────

/// [`SourceFetcher`] serving a fixed URL → text mapping.
///
/// Unknown URLs fail with a 404 status, which is what the fallback paths in
/// source and config resolution exist for.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    sources: HashMap<String, String>,
}

impl StaticFetcher {
    /// Creates a fetcher serving the given mapping.
    #[must_use]
    pub fn with_sources<K, V>(sources: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            sources: sources
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[async_trait]
impl SourceFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.sources
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// StubEngine
// ─────────────────────────────────────────────────────────────────────────────

/// One recorded execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRun {
    /// The unit id from the threaded scope.
    pub unit_id: String,
    /// The source text handed to the engine.
    pub code: String,
    /// Whether the asynchronous path was used.
    pub asynchronous: bool,
}

/// [`Engine`] that records executions and optionally fails them.
#[derive(Debug)]
pub struct StubEngine {
    interpreter: String,
    runs: Mutex<Vec<RecordedRun>>,
    failure: Mutex<Option<String>>,
}

impl Default for StubEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StubEngine {
    /// Creates a stub tagged as a generic test interpreter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            interpreter: "stub".into(),
            runs: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
        }
    }

    /// Overrides the interpreter tag.
    #[must_use]
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Makes every subsequent run fail with the given message.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
    }

    /// Takes all recorded runs, clearing the record.
    #[must_use]
    pub fn take_runs(&self) -> Vec<RecordedRun> {
        std::mem::take(&mut *self.runs.lock())
    }

    /// Number of recorded runs.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.lock().len()
    }

    fn record(&self, scope: &HookScope, code: &str, asynchronous: bool) -> Result<(), EngineError> {
        self.runs.lock().push(RecordedRun {
            unit_id: scope.unit_id().to_string(),
            code: code.to_string(),
            asynchronous,
        });
        match self.failure.lock().as_ref() {
            Some(message) => Err(EngineError::Execution(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Engine for StubEngine {
    fn interpreter(&self) -> &str {
        &self.interpreter
    }

    fn run(&self, scope: &mut HookScope, code: &str) -> Result<(), EngineError> {
        self.record(scope, code, false)
    }

    async fn run_async(&self, scope: &mut HookScope, code: &str) -> Result<(), EngineError> {
        self.record(scope, code, true)
    }
}
