//! Process-wide error ledger.
//!
//! The interpreter's error channel writes here before a unit becomes ready;
//! the lifecycle controller consumes each record exactly once at the ready
//! checkpoint. A record still present when a unit is discarded is surfaced to
//! the unit's stderr channel, never silently dropped.
//!
//! The ledger is mutated only from the main-thread event loop; worker error
//! events are funneled back through the facade's error channel before being
//! recorded.

use core::fmt;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;

use crate::engine::IoSink;

// ─────────────────────────────────────────────────────────────────────────────
// UnitId
// ─────────────────────────────────────────────────────────────────────────────

/// Unique identifier of one execution unit, lazily assigned on first use.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnitId(Arc<str>);

impl UnitId {
    /// Generates a fresh unique id.
    #[must_use]
    pub fn fresh() -> Self {
        Self(format!("unit_{}", nanoid::nanoid!(10)).into())
    }

    /// Wraps an embedder-supplied identifier.
    #[must_use]
    pub fn named(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// The identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shared handle to the identifier text.
    #[must_use]
    pub fn as_arc(&self) -> Arc<str> {
        Arc::clone(&self.0)
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ErrorRecord / ErrorLedger
// ─────────────────────────────────────────────────────────────────────────────

/// One captured error awaiting its unit's ready checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    /// The captured error message.
    pub message: String,
    /// Distinguishes "invalid content" errors from generic ones.
    pub invalid_content: bool,
}

impl ErrorRecord {
    /// Creates a generic record.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            invalid_content: false,
        }
    }

    /// Creates an invalid-content record.
    #[must_use]
    pub fn invalid_content(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            invalid_content: true,
        }
    }
}

/// Mapping from in-flight execution unit to the most recent captured error.
///
/// Writing twice for the same unit keeps only the most recent record.
#[derive(Debug, Default)]
pub struct ErrorLedger {
    records: Mutex<HashMap<UnitId, ErrorRecord>>,
}

impl ErrorLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error for a unit, replacing any earlier record.
    pub fn record(&self, unit: UnitId, record: ErrorRecord) {
        self.records.lock().insert(unit, record);
    }

    /// Consumes the record for a unit. Each record can be taken at most
    /// once; a second call returns `None`.
    #[must_use]
    pub fn take(&self, unit: &UnitId) -> Option<ErrorRecord> {
        self.records.lock().remove(unit)
    }

    /// Deletes the record for a discarded unit. A record still unread at
    /// this point is surfaced through the unit's stderr channel instead of
    /// being silently dropped.
    pub fn discard(&self, unit: &UnitId, io: &dyn IoSink) {
        if let Some(record) = self.records.lock().remove(unit) {
            tracing::error!(%unit, "unit discarded with unread error record");
            io.stderr(&record.message);
        }
    }

    /// Whether a record is pending for the unit.
    #[must_use]
    pub fn contains(&self, unit: &UnitId) -> bool {
        self.records.lock().contains_key(unit)
    }

    /// Number of pending records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether the ledger has no pending records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}
