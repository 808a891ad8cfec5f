//! Execution lifecycle controller.
//!
//! Drives one script unit through its full pipeline: claim, source
//! resolution, target resolution, the ready/before/after checkpoints, engine
//! execution, and the done event. The pipeline runs in the main context;
//! worker-side execution goes through [`crate::worker::WorkerLauncher`]
//! instead.

use std::sync::Arc;

use scriptorium_engine::{
    Engine, ErrorLedger, Flavor, IoSink, SourceFetcher, SourcePrecedence, codes, resolve_source,
};
use scriptorium_hooks::{
    Checkpoint, CodeSlot, HookContext, HookError, HookRegistry, HookScope, LifecycleEvent,
};

use crate::host::{Host, Placement};
use crate::unit::{DocumentSlot, ScriptUnit, UnitKind, UnitState};

// ─────────────────────────────────────────────────────────────────────────────
// AttachOutcome / LifecycleError
// ─────────────────────────────────────────────────────────────────────────────

/// How an attachment of a unit concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// The unit ran to completion and its done event was dispatched.
    Completed,
    /// The unit had already been claimed; nothing happened.
    AlreadyExecuted,
    /// A block-form unit was handed off to its element-driven path.
    DeferredToElement,
    /// A recorded error preempted execution; no ready or done event fired.
    Preempted,
}

/// Errors that abort a unit's pipeline.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// The unit named an explicit target that does not exist.
    #[error("explicit target `{0}` does not exist in the document")]
    TargetNotFound(String),
    /// No flavor with this name registered.
    #[error("no flavor named `{0}` is registered")]
    UnknownFlavor(String),
    /// A hook rejected, aborting its chain.
    #[error(transparent)]
    Hook(#[from] HookError),
}

// ─────────────────────────────────────────────────────────────────────────────
// LifecycleController
// ─────────────────────────────────────────────────────────────────────────────

/// Orchestrates the execution pipeline for one flavor's units.
pub struct LifecycleController {
    flavor: Flavor,
    engine: Arc<dyn Engine>,
    hooks: Arc<HookRegistry>,
    ledger: Arc<ErrorLedger>,
    host: Arc<dyn Host>,
    fetcher: Arc<dyn SourceFetcher>,
    io: Arc<dyn IoSink>,
}

impl LifecycleController {
    /// Wires a controller over its collaborators.
    #[must_use]
    pub fn new(
        flavor: Flavor,
        engine: Arc<dyn Engine>,
        hooks: Arc<HookRegistry>,
        ledger: Arc<ErrorLedger>,
        host: Arc<dyn Host>,
        fetcher: Arc<dyn SourceFetcher>,
        io: Arc<dyn IoSink>,
    ) -> Self {
        Self {
            flavor,
            engine,
            hooks,
            ledger,
            host,
            fetcher,
            io,
        }
    }

    /// The flavor this controller drives.
    #[must_use]
    pub fn flavor(&self) -> &Flavor {
        &self.flavor
    }

    /// The hook registry this controller invokes.
    #[must_use]
    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    /// The error ledger consulted before each execution.
    #[must_use]
    pub fn ledger(&self) -> &Arc<ErrorLedger> {
        &self.ledger
    }

    /// Drives a unit that just entered the document.
    ///
    /// Bare-script units run the full pipeline here. Block-form units are
    /// deferred: their element owns resolution and calls
    /// [`Self::attach_element`]. Attaching the same unit twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::TargetNotFound`] when the unit names a
    /// target absent from the document, or [`LifecycleError::Hook`] when a
    /// hook chain aborts. A failing engine run is not an error here: it is
    /// surfaced on the unit's stderr channel and the done event still fires.
    pub async fn attach(&self, unit: &ScriptUnit) -> Result<AttachOutcome, LifecycleError> {
        if !unit.claim() {
            tracing::debug!(unit = %unit.id(), "unit already executed; ignoring re-attachment");
            return Ok(AttachOutcome::AlreadyExecuted);
        }
        if unit.kind() == UnitKind::Block {
            tracing::debug!(unit = %unit.id(), "block unit deferred to element-driven path");
            return Ok(AttachOutcome::DeferredToElement);
        }
        unit.advance(UnitState::Attached);
        self.run_pipeline(unit, SourcePrecedence::SrcFirst).await
    }

    /// Drives a block-form unit from its element.
    ///
    /// Inline content takes precedence over `src` here, and the element's
    /// rendered output is revealed once the done event has fired. Only the
    /// first call runs the pipeline; re-entrant element callbacks are
    /// no-ops.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Self::attach`].
    pub async fn attach_element(&self, unit: &ScriptUnit) -> Result<AttachOutcome, LifecycleError> {
        if !unit.claim_element() {
            tracing::debug!(unit = %unit.id(), "element already driven; ignoring re-attachment");
            return Ok(AttachOutcome::AlreadyExecuted);
        }
        unit.advance(UnitState::Attached);
        let outcome = self
            .run_pipeline(unit, SourcePrecedence::InlineFirst)
            .await?;
        if outcome == AttachOutcome::Completed {
            self.host.reveal(unit);
        }
        Ok(outcome)
    }

    async fn run_pipeline(
        &self,
        unit: &ScriptUnit,
        precedence: SourcePrecedence,
    ) -> Result<AttachOutcome, LifecycleError> {
        let spec = unit.source_spec();
        let source = resolve_source(&spec, precedence, self.fetcher.as_ref(), self.io.as_ref()).await;
        unit.advance(UnitState::SourceResolved);

        // A recorded error preempts execution entirely. The record is
        // consumed here whether or not anyone read it earlier.
        if let Some(record) = self.ledger.take(unit.id()) {
            let line = if record.invalid_content {
                codes::CONFLICTING_CODE.message(&record.message)
            } else {
                record.message
            };
            tracing::error!(unit = %unit.id(), error = %line, "execution preempted by recorded error");
            self.io.stderr(&line);
            return Ok(AttachOutcome::Preempted);
        }

        let target = self.resolve_target(unit)?;
        let mut scope =
            HookScope::new(self.flavor.name_arc(), unit.id().as_arc()).with_target(target);

        self.host.dispatch(unit, &self.flavor.ready_event());
        unit.advance(UnitState::ReadyDispatched);
        self.invoke(Checkpoint::Ready, unit, &mut scope).await?;

        let before = if unit.is_async() {
            Checkpoint::BeforeRunAsync
        } else {
            Checkpoint::BeforeRun
        };
        self.invoke(before, unit, &mut scope).await?;

        let code = self.splice(unit.is_async(), &source);
        unit.advance(UnitState::Executing);
        let run = if unit.is_async() {
            self.engine.run_async(&mut scope, &code).await
        } else {
            self.engine.run(&mut scope, &code)
        };
        if let Err(err) = run {
            tracing::error!(unit = %unit.id(), %err, "engine execution failed");
            self.io.stderr(&err.to_string());
        }

        let after = if unit.is_async() {
            Checkpoint::AfterRunAsync
        } else {
            Checkpoint::AfterRun
        };
        self.invoke(after, unit, &mut scope).await?;

        unit.advance(UnitState::DoneDispatched);
        self.host.dispatch(unit, &self.flavor.done_event());
        Ok(AttachOutcome::Completed)
    }

    fn resolve_target(&self, unit: &ScriptUnit) -> Result<String, LifecycleError> {
        if let Some(name) = unit.target() {
            return self
                .host
                .lookup_target(name)
                .map(|handle| handle.id().to_owned())
                .ok_or_else(|| LifecycleError::TargetNotFound(name.to_owned()));
        }
        let placement = match unit.slot() {
            DocumentSlot::Body => Placement::AfterUnit,
            DocumentSlot::Head => Placement::EndOfBody,
        };
        Ok(self.host.create_target(unit, placement).id().to_owned())
    }

    async fn invoke(
        &self,
        checkpoint: Checkpoint,
        unit: &ScriptUnit,
        scope: &mut HookScope,
    ) -> Result<(), HookError> {
        let event = LifecycleEvent::new(
            self.flavor.name_arc(),
            unit.id().as_arc(),
            HookContext::Main,
            checkpoint,
        );
        if checkpoint.is_async() {
            self.hooks
                .invoke_async(HookContext::Main, checkpoint, scope, &event)
                .await
        } else {
            self.hooks
                .invoke(HookContext::Main, checkpoint, scope, &event)
        }
    }

    /// Wraps the resolved source with the code snippets registered for the
    /// surrounding slots.
    fn splice(&self, asynchronous: bool, source: &str) -> String {
        let (before_slot, after_slot) = if asynchronous {
            (CodeSlot::BeforeRunAsync, CodeSlot::AfterRunAsync)
        } else {
            (CodeSlot::BeforeRun, CodeSlot::AfterRun)
        };
        let mut code = String::new();
        if let Some(snippet) = self.hooks.compose_code(HookContext::Main, before_slot) {
            code.push_str(&snippet);
            code.push('\n');
        }
        code.push_str(source);
        if let Some(snippet) = self.hooks.compose_code(HookContext::Main, after_slot) {
            code.push('\n');
            code.push_str(&snippet);
        }
        code
    }
}

impl core::fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LifecycleController")
            .field("flavor", &self.flavor)
            .field("engine", &self.engine.interpreter())
            .finish_non_exhaustive()
    }
}
