//! Flavor identity.
//!
//! A flavor is one supported interpreter kind, paired with its interpreter
//! implementation tag. Flavors are set at process start and immutable
//! thereafter; one hook registry, one error-ledger entry space and one
//! element type exist per flavor.

use core::fmt;
use std::sync::Arc;

/// One supported interpreter kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Flavor {
    name: Arc<str>,
    interpreter: Arc<str>,
}

impl Flavor {
    /// Creates a flavor from its name and interpreter implementation tag.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, interpreter: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            interpreter: interpreter.into(),
        }
    }

    /// The flavor name (e.g. `"py"`).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared handle to the flavor name.
    #[must_use]
    pub fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// The interpreter implementation tag (e.g. `"cpython-wasm"`).
    #[must_use]
    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    /// The element tag registered with the host for this flavor's script
    /// form.
    #[must_use]
    pub fn element_tag(&self) -> String {
        format!("{}-script", self.name)
    }

    /// Name of the custom event dispatched before execution.
    #[must_use]
    pub fn ready_event(&self) -> String {
        format!("{}:ready", self.name)
    }

    /// Name of the custom event dispatched after execution settles.
    #[must_use]
    pub fn done_event(&self) -> String {
        format!("{}:done", self.name)
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.interpreter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_carry_flavor_prefix() {
        let flavor = Flavor::new("py", "cpython-wasm");
        assert_eq!(flavor.ready_event(), "py:ready");
        assert_eq!(flavor.done_event(), "py:done");
        assert_eq!(flavor.element_tag(), "py-script");
    }

    #[test]
    fn flavor_equality_includes_interpreter() {
        let a = Flavor::new("py", "cpython-wasm");
        let b = Flavor::new("py", "micro-wasm");
        assert_ne!(a, b);
        assert_eq!(a, Flavor::new("py", "cpython-wasm"));
    }
}
