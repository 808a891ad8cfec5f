//! Mutable execution context threaded through hook chains.
//!
//! `HookScope` replaces the single mutable "current element" variable the
//! original embedding relied on: instead of hooks reaching for ambient state,
//! the scope is passed explicitly through every chain and into the engine's
//! `run`/`run_async` calls, so concurrent units never observe each other's
//! context.

use std::sync::Arc;

/// Per-unit execution context handed mutably to every hook in a chain and to
/// the engine itself.
///
/// The scope carries the resolved display target so plugins (and worker-side
/// namespaces) can answer "where does this unit render?" without a dedicated
/// parameter on every hook.
#[derive(Debug, Clone)]
pub struct HookScope {
    flavor: Arc<str>,
    unit_id: Arc<str>,
    target: Option<String>,
}

impl HookScope {
    /// Creates a scope for one execution of the given unit.
    #[must_use]
    pub fn new(flavor: impl Into<Arc<str>>, unit_id: impl Into<Arc<str>>) -> Self {
        Self {
            flavor: flavor.into(),
            unit_id: unit_id.into(),
            target: None,
        }
    }

    /// Sets the resolved display target, builder style.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// The flavor driving this execution.
    #[must_use]
    pub fn flavor(&self) -> &str {
        &self.flavor
    }

    /// The identifier of the unit being executed.
    #[must_use]
    pub fn unit_id(&self) -> &str {
        &self.unit_id
    }

    /// The display target the unit renders into, if one has been resolved.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Re-points the display target. Hooks may redirect output before the
    /// unit executes.
    pub fn set_target(&mut self, target: impl Into<String>) {
        self.target = Some(target.into());
    }
}
