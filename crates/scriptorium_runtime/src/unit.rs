//! Script units and their lifecycle state machine.

use core::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use scriptorium_engine::{SourceSpec, UnitId};

// ─────────────────────────────────────────────────────────────────────────────
// UnitState
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle states of a script-type unit.
///
/// Transitions run strictly forward; `DoneDispatched` is terminal and no
/// unit re-enters the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UnitState {
    /// The unit's element type is defined but the unit is not yet attached.
    Defined,
    /// The unit entered the document and the controller took it over.
    Attached,
    /// Source text has been resolved (fetched or inline).
    SourceResolved,
    /// The ready event was dispatched; execution is imminent.
    ReadyDispatched,
    /// The engine is executing the unit's body.
    Executing,
    /// The done event was dispatched. Terminal.
    DoneDispatched,
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnitState::Defined => "defined",
            UnitState::Attached => "attached",
            UnitState::SourceResolved => "source-resolved",
            UnitState::ReadyDispatched => "ready-dispatched",
            UnitState::Executing => "executing",
            UnitState::DoneDispatched => "done-dispatched",
        };
        f.write_str(name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// UnitKind / DocumentSlot
// ─────────────────────────────────────────────────────────────────────────────

/// Embedding form of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// Bare script form: the controller drives fetch and execution itself.
    /// Inline content never passes through an HTML parser.
    Script,
    /// Declarative block form: the element owns its resolution path; the
    /// controller defers at attachment and drives it separately.
    Block,
}

/// Where in the document the unit was declared.
///
/// Head-declared code has no natural sibling-following location once
/// rendered, so its synthesized display target is appended to the body;
/// body-declared output renders in place, right after the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentSlot {
    /// Declared in the document head.
    Head,
    /// Declared in the document body.
    Body,
}

// ─────────────────────────────────────────────────────────────────────────────
// ScriptUnit
// ─────────────────────────────────────────────────────────────────────────────

/// One instance of declared code to run.
///
/// The identifier is lazily assigned on first read; the `executed` flag makes
/// re-entrant attachment a no-op rather than a second execution.
#[derive(Debug)]
pub struct ScriptUnit {
    id: OnceLock<UnitId>,
    kind: UnitKind,
    slot: DocumentSlot,
    src: Option<String>,
    target: Option<String>,
    run_async: bool,
    inline: String,
    escaped: bool,
    executed: AtomicBool,
    element_claimed: AtomicBool,
    state: Mutex<UnitState>,
}

impl ScriptUnit {
    /// Creates a bare-script unit with the given inline content.
    #[must_use]
    pub fn script(inline: impl Into<String>) -> Self {
        Self {
            id: OnceLock::new(),
            kind: UnitKind::Script,
            slot: DocumentSlot::Body,
            src: None,
            target: None,
            run_async: false,
            inline: inline.into(),
            escaped: false,
            executed: AtomicBool::new(false),
            element_claimed: AtomicBool::new(false),
            state: Mutex::new(UnitState::Defined),
        }
    }

    /// Creates a block-form unit with the given inner markup.
    ///
    /// Block content passed through an HTML parser, so it resolves through
    /// the unescaping path.
    #[must_use]
    pub fn block(inner_markup: impl Into<String>) -> Self {
        Self {
            kind: UnitKind::Block,
            escaped: true,
            ..Self::script(inner_markup)
        }
    }

    /// Sets the external source reference (`src` attribute).
    #[must_use]
    pub fn with_src(mut self, src: impl Into<String>) -> Self {
        self.src = Some(src.into());
        self
    }

    /// Sets the explicit display target (`target` attribute).
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Marks the unit for asynchronous execution.
    #[must_use]
    pub fn with_async(mut self) -> Self {
        self.run_async = true;
        self
    }

    /// Declares the unit in the document head instead of the body.
    #[must_use]
    pub fn in_head(mut self) -> Self {
        self.slot = DocumentSlot::Head;
        self
    }

    /// The unit's identifier, assigned on first read and stable thereafter.
    pub fn id(&self) -> &UnitId {
        self.id.get_or_init(UnitId::fresh)
    }

    /// The unit's embedding form.
    #[must_use]
    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    /// Where the unit was declared.
    #[must_use]
    pub fn slot(&self) -> DocumentSlot {
        self.slot
    }

    /// The explicit display target, if declared.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Whether the unit requested asynchronous execution.
    #[must_use]
    pub fn is_async(&self) -> bool {
        self.run_async
    }

    /// The unit's declarative source attributes.
    #[must_use]
    pub fn source_spec(&self) -> SourceSpec {
        SourceSpec {
            src: self.src.clone(),
            inline: self.inline.clone(),
            escaped: self.escaped,
        }
    }

    /// Claims the unit for execution. Returns `false` when it was already
    /// claimed, making re-entrant attachment a no-op.
    pub(crate) fn claim(&self) -> bool {
        !self.executed.swap(true, Ordering::SeqCst)
    }

    /// Claims the element-driven path for a block-form unit. Separate from
    /// [`Self::claim`] because attachment consumes that flag before
    /// deferring; this one makes re-entrant element callbacks a no-op.
    pub(crate) fn claim_element(&self) -> bool {
        !self.element_claimed.swap(true, Ordering::SeqCst)
    }

    /// Whether the unit has been claimed for execution.
    #[must_use]
    pub fn executed(&self) -> bool {
        self.executed.load(Ordering::SeqCst)
    }

    /// The unit's current lifecycle state.
    #[must_use]
    pub fn state(&self) -> UnitState {
        *self.state.lock()
    }

    /// Advances the state machine, logging the transition.
    pub(crate) fn advance(&self, to: UnitState) {
        let mut state = self.state.lock();
        debug_assert!(*state <= to, "lifecycle state may only move forward");
        tracing::debug!(unit = %self.id(), from = %state, to = %to, "lifecycle transition");
        *state = to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_lazy_and_stable() {
        let unit = ScriptUnit::script("print(1)");
        let first = unit.id().clone();
        assert_eq!(unit.id(), &first);
    }

    #[test]
    fn claim_is_single_shot() {
        let unit = ScriptUnit::script("print(1)");
        assert!(!unit.executed());
        assert!(unit.claim());
        assert!(!unit.claim(), "second claim must fail");
        assert!(unit.executed());
    }

    #[test]
    fn element_claim_is_independent_and_single_shot() {
        let unit = ScriptUnit::block("print(1)");
        assert!(unit.claim(), "attachment claim");
        assert!(unit.claim_element(), "first element claim");
        assert!(!unit.claim_element(), "second element claim must fail");
    }

    #[test]
    fn builder_attributes_round_trip() {
        let unit = ScriptUnit::script("print(1)")
            .with_src("https://x/app.py")
            .with_target("out")
            .with_async()
            .in_head();

        assert_eq!(unit.kind(), UnitKind::Script);
        assert_eq!(unit.slot(), DocumentSlot::Head);
        assert_eq!(unit.target(), Some("out"));
        assert!(unit.is_async());

        let spec = unit.source_spec();
        assert_eq!(spec.src.as_deref(), Some("https://x/app.py"));
        assert!(!spec.escaped);
    }

    #[test]
    fn block_content_is_escaped() {
        let unit = ScriptUnit::block("print(1 &lt; 2)");
        assert_eq!(unit.kind(), UnitKind::Block);
        assert!(unit.source_spec().escaped);
    }

    #[test]
    fn state_advances_forward() {
        let unit = ScriptUnit::script("print(1)");
        assert_eq!(unit.state(), UnitState::Defined);
        unit.advance(UnitState::Attached);
        unit.advance(UnitState::SourceResolved);
        assert_eq!(unit.state(), UnitState::SourceResolved);
    }
}
