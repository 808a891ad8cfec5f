//! The document host boundary.
//!
//! Everything the runtime needs from its embedding document goes through
//! [`Host`]: looking up and creating display targets, dispatching lifecycle
//! events, and registering element types. A host implementation wraps
//! whatever document machinery the embedder actually has.

use core::fmt;

use crate::unit::ScriptUnit;

// ─────────────────────────────────────────────────────────────────────────────
// TargetHandle / Placement
// ─────────────────────────────────────────────────────────────────────────────

/// An opaque reference to a display target in the host document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetHandle {
    id: String,
}

impl TargetHandle {
    /// Wraps a host-side target identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// The host-side identifier of this target.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for TargetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Where a synthesized display target should be placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// An explicitly named, pre-existing target.
    Explicit(String),
    /// Immediately after the unit that owns the output.
    AfterUnit,
    /// Appended at the end of the document body.
    EndOfBody,
}

// ─────────────────────────────────────────────────────────────────────────────
// Host
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised by the host document.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// An element type with this tag is already registered.
    #[error("element type `{0}` is already defined")]
    AlreadyDefined(String),
}

/// The embedding document, as seen by the runtime.
pub trait Host: Send + Sync {
    /// Looks up a pre-existing display target by name.
    fn lookup_target(&self, name: &str) -> Option<TargetHandle>;

    /// Creates a display target for the given unit at the given placement.
    fn create_target(&self, unit: &ScriptUnit, placement: Placement) -> TargetHandle;

    /// Dispatches a named lifecycle event scoped to the given unit.
    fn dispatch(&self, unit: &ScriptUnit, event: &str);

    /// Registers a custom element type under the given tag.
    fn define_element(&self, tag: &str) -> Result<(), HostError>;

    /// Makes a block-form unit's rendered output visible.
    fn reveal(&self, unit: &ScriptUnit);
}

// ─────────────────────────────────────────────────────────────────────────────
// RecordingHost
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(any(test, feature = "test-utils"))]
pub use recording::RecordingHost;

#[cfg(any(test, feature = "test-utils"))]
mod recording {
    use hashbrown::HashSet;
    use parking_lot::Mutex;

    use super::{Host, HostError, Placement, TargetHandle};
    use crate::unit::ScriptUnit;

    /// A [`Host`] that records every interaction for assertions.
    #[derive(Debug, Default)]
    pub struct RecordingHost {
        known_targets: Mutex<HashSet<String>>,
        created: Mutex<Vec<(String, Placement)>>,
        events: Mutex<Vec<(String, String)>>,
        defined: Mutex<Vec<String>>,
        revealed: Mutex<Vec<String>>,
    }

    impl RecordingHost {
        /// Creates a host with no known targets.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Pre-registers a named target so `lookup_target` finds it.
        pub fn add_target(&self, name: impl Into<String>) {
            self.known_targets.lock().insert(name.into());
        }

        /// Events dispatched so far, as `(unit_id, event)` pairs.
        #[must_use]
        pub fn events(&self) -> Vec<(String, String)> {
            self.events.lock().clone()
        }

        /// Event names dispatched for the given unit, in order.
        #[must_use]
        pub fn events_for(&self, unit: &ScriptUnit) -> Vec<String> {
            let id = unit.id().as_str().to_owned();
            self.events
                .lock()
                .iter()
                .filter(|(u, _)| *u == id)
                .map(|(_, e)| e.clone())
                .collect()
        }

        /// Targets created so far, as `(unit_id, placement)` pairs.
        #[must_use]
        pub fn created_targets(&self) -> Vec<(String, Placement)> {
            self.created.lock().clone()
        }

        /// Tags registered so far.
        #[must_use]
        pub fn defined_tags(&self) -> Vec<String> {
            self.defined.lock().clone()
        }

        /// Unit ids revealed so far.
        #[must_use]
        pub fn revealed_units(&self) -> Vec<String> {
            self.revealed.lock().clone()
        }
    }

    impl Host for RecordingHost {
        fn lookup_target(&self, name: &str) -> Option<TargetHandle> {
            self.known_targets
                .lock()
                .contains(name)
                .then(|| TargetHandle::new(name))
        }

        fn create_target(&self, unit: &ScriptUnit, placement: Placement) -> TargetHandle {
            let id = format!("{}-target", unit.id());
            self.created
                .lock()
                .push((unit.id().as_str().to_owned(), placement));
            TargetHandle::new(id)
        }

        fn dispatch(&self, unit: &ScriptUnit, event: &str) {
            self.events
                .lock()
                .push((unit.id().as_str().to_owned(), event.to_owned()));
        }

        fn define_element(&self, tag: &str) -> Result<(), HostError> {
            let mut defined = self.defined.lock();
            if defined.iter().any(|t| t == tag) {
                return Err(HostError::AlreadyDefined(tag.to_owned()));
            }
            defined.push(tag.to_owned());
            Ok(())
        }

        fn reveal(&self, unit: &ScriptUnit) {
            self.revealed.lock().push(unit.id().as_str().to_owned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_host_tracks_targets_and_events() {
        let host = RecordingHost::new();
        host.add_target("out");

        assert!(host.lookup_target("out").is_some());
        assert!(host.lookup_target("missing").is_none());

        let unit = ScriptUnit::script("print(1)");
        host.dispatch(&unit, "py:ready");
        assert_eq!(host.events_for(&unit), vec!["py:ready".to_owned()]);
    }

    #[test]
    fn define_element_rejects_duplicates() {
        let host = RecordingHost::new();
        host.define_element("py-script").unwrap();
        assert!(matches!(
            host.define_element("py-script"),
            Err(HostError::AlreadyDefined(tag)) if tag == "py-script"
        ));
    }
}
