//! Event payload carried to lifecycle hooks.
//!
//! Every hook receives a `&LifecycleEvent` identifying which unit is being
//! driven, under which flavor, at which checkpoint.

use core::fmt;
use std::sync::Arc;

use crate::checkpoint::{Checkpoint, HookContext};

/// Payload handed to every hook invocation.
///
/// The event is cheap to clone; flavor and unit identifiers are shared
/// strings.
#[derive(Debug, Clone)]
pub struct LifecycleEvent {
    flavor: Arc<str>,
    unit_id: Arc<str>,
    context: HookContext,
    checkpoint: Checkpoint,
}

impl LifecycleEvent {
    /// Creates an event for the given unit at the given checkpoint.
    #[must_use]
    pub fn new(
        flavor: impl Into<Arc<str>>,
        unit_id: impl Into<Arc<str>>,
        context: HookContext,
        checkpoint: Checkpoint,
    ) -> Self {
        Self {
            flavor: flavor.into(),
            unit_id: unit_id.into(),
            context,
            checkpoint,
        }
    }

    /// The flavor driving this unit.
    #[must_use]
    pub fn flavor(&self) -> &str {
        &self.flavor
    }

    /// The identifier of the unit being executed.
    #[must_use]
    pub fn unit_id(&self) -> &str {
        &self.unit_id
    }

    /// The execution context the checkpoint fired in.
    #[must_use]
    pub fn context(&self) -> HookContext {
        self.context
    }

    /// The checkpoint that fired.
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        self.checkpoint
    }

    /// Returns the conventional hook name for this event's checkpoint.
    #[must_use]
    pub fn checkpoint_name(&self) -> &'static str {
        self.checkpoint.name()
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({} @ {}/{})",
            self.checkpoint_name(),
            self.unit_id,
            self.flavor,
            self.context
        )
    }
}
