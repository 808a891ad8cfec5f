//! Checkpoint and context identifiers for lifecycle hooks.
//!
//! A [`Checkpoint`] names one point in a script unit's lifecycle at which
//! hook callbacks are invoked. An execution context ([`HookContext`]) selects
//! which hook table a registration lands in: the synchronous main thread or a
//! background worker thread. The checkpoint set is closed, so plain enums
//! stand in for marker types and double as map keys.

use core::fmt;

// ─────────────────────────────────────────────────────────────────────────────
// Checkpoint
// ─────────────────────────────────────────────────────────────────────────────

/// A named lifecycle point at which hook callbacks are invoked.
///
/// `Ready`, `BeforeRun` and `AfterRun` are synchronous checkpoints;
/// `BeforeRunAsync` and `AfterRunAsync` wrap asynchronous execution and are
/// awaited sequentially.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Checkpoint {
    /// Fired after a unit's source and target are resolved, before execution.
    Ready,
    /// Fired immediately before synchronous execution.
    BeforeRun,
    /// Fired immediately before asynchronous execution.
    BeforeRunAsync,
    /// Fired immediately after synchronous execution settles.
    AfterRun,
    /// Fired immediately after asynchronous execution settles.
    AfterRunAsync,
}

impl Checkpoint {
    /// Returns the checkpoint's conventional hook name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Checkpoint::Ready => "onReady",
            Checkpoint::BeforeRun => "onBeforeRun",
            Checkpoint::BeforeRunAsync => "onBeforeRunAsync",
            Checkpoint::AfterRun => "onAfterRun",
            Checkpoint::AfterRunAsync => "onAfterRunAsync",
        }
    }

    /// Whether this checkpoint belongs to the asynchronous execution path.
    #[must_use]
    pub fn is_async(&self) -> bool {
        matches!(self, Checkpoint::BeforeRunAsync | Checkpoint::AfterRunAsync)
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HookContext
// ─────────────────────────────────────────────────────────────────────────────

/// Execution context a hook registration targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookContext {
    /// The synchronous main-thread execution path.
    Main,
    /// A background worker-thread execution path.
    Worker,
}

impl fmt::Display for HookContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookContext::Main => f.write_str("main"),
            HookContext::Worker => f.write_str("worker"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CodeSlot
// ─────────────────────────────────────────────────────────────────────────────

/// Position at which a registered source snippet is spliced into a unit's
/// resolved source before execution.
///
/// Code hooks are ordered text, not callbacks: `BeforeRun` snippets are
/// prepended and `AfterRun` snippets appended, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeSlot {
    /// Prepended before synchronous execution.
    BeforeRun,
    /// Prepended before asynchronous execution.
    BeforeRunAsync,
    /// Appended after synchronous execution.
    AfterRun,
    /// Appended after asynchronous execution.
    AfterRunAsync,
}
