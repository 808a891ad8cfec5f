//! Hook registration and invocation.
//!
//! The [`HookRegistry`] maps (execution context, checkpoint) pairs to ordered
//! lists of named plugin callbacks.
//!
//! # Eager vs Plugin Hooks
//!
//! - **Eager** hooks are registered by the core itself and always run before
//!   plugin hooks for the same main-thread checkpoint. They are never subject
//!   to the worker-side lazy-skip optimization.
//! - **Plugin** hooks are registered externally and composed at call time.
//!
//! # Worker Compositions
//!
//! Worker-side hook chains are memoized per checkpoint on first read. When no
//! plugin registered for a checkpoint, the accessor yields `None` rather than
//! a no-op callable, so worker execution pays nothing for unused checkpoints.
//! Registrations made after a checkpoint's composition has been read are not
//! observed by that composition.
//!
//! # Failure Semantics
//!
//! Chains are fail-fast: the first hook returning an error aborts the
//! remaining hooks for that checkpoint and the error propagates to whatever
//! drove the checkpoint. Asynchronous chains are awaited sequentially with
//! the same abort-on-rejection behavior.

use core::fmt;
use core::future::Future;
use core::pin::Pin;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};

use crate::checkpoint::{Checkpoint, CodeSlot, HookContext};
use crate::events::LifecycleEvent;
use crate::scope::HookScope;

/// Boxed future used by asynchronous hook callbacks.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result type returned by every hook callback.
pub type HookResult = Result<(), Box<dyn core::error::Error + Send + Sync>>;

type SyncHookFn = Arc<dyn Fn(&mut HookScope, &LifecycleEvent) -> HookResult + Send + Sync>;

/// Shared asynchronous hook callback.
pub type AsyncHookFn = Arc<
    dyn for<'a> Fn(&'a mut HookScope, &'a LifecycleEvent) -> BoxFuture<'a, HookResult>
        + Send
        + Sync,
>;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur during hook registration.
#[derive(Debug, Clone)]
pub enum HookRegistrationError {
    /// A hook with this name already exists for the (context, checkpoint) pair.
    DuplicateName {
        /// The context where the duplicate was found.
        context: HookContext,
        /// The checkpoint where the duplicate was found.
        checkpoint: Checkpoint,
        /// The duplicate hook name.
        name: String,
    },
    /// A synchronous callback was registered on an asynchronous checkpoint,
    /// or the other way around.
    ChannelMismatch {
        /// The checkpoint the registration targeted.
        checkpoint: Checkpoint,
        /// Whether that checkpoint expects asynchronous callbacks.
        expects_async: bool,
    },
}

impl fmt::Display for HookRegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookRegistrationError::DuplicateName {
                context,
                checkpoint,
                name,
            } => {
                write!(
                    f,
                    "hook '{name}' already registered for {checkpoint} ({context})"
                )
            }
            HookRegistrationError::ChannelMismatch {
                checkpoint,
                expects_async,
            } => {
                let expected = if *expects_async {
                    "asynchronous"
                } else {
                    "synchronous"
                };
                write!(f, "checkpoint {checkpoint} takes {expected} callbacks")
            }
        }
    }
}

impl core::error::Error for HookRegistrationError {}

/// A hook callback failed, aborting the remaining chain for its checkpoint.
#[derive(Debug)]
pub struct HookError {
    context: HookContext,
    checkpoint: Checkpoint,
    hook: String,
    source: Box<dyn core::error::Error + Send + Sync>,
}

impl HookError {
    /// The context the failing chain ran in.
    #[must_use]
    pub fn context(&self) -> HookContext {
        self.context
    }

    /// The checkpoint the failing chain belonged to.
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        self.checkpoint
    }

    /// The name of the hook that failed.
    #[must_use]
    pub fn hook(&self) -> &str {
        &self.hook
    }
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hook '{}' failed at {} ({}): {}",
            self.hook, self.checkpoint, self.context, self.source
        )
    }
}

impl core::error::Error for HookError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Entries and chains
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct SyncEntry {
    name: String,
    hook: SyncHookFn,
}

#[derive(Clone)]
struct AsyncEntry {
    name: String,
    hook: AsyncHookFn,
}

/// Memoized worker-side composition of synchronous hooks for one checkpoint.
///
/// Obtained from [`HookRegistry::worker_chain`]; `None` from that accessor
/// means no plugin registered and invocation can be skipped entirely.
#[derive(Clone)]
pub struct WorkerChain {
    checkpoint: Checkpoint,
    entries: Arc<[SyncEntry]>,
}

impl WorkerChain {
    /// Invokes every composed hook in registration order, fail-fast.
    pub fn invoke(&self, scope: &mut HookScope, event: &LifecycleEvent) -> Result<(), HookError> {
        for entry in self.entries.iter() {
            (entry.hook)(scope, event).map_err(|source| HookError {
                context: HookContext::Worker,
                checkpoint: self.checkpoint,
                hook: entry.name.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Number of hooks in the composition.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the composition is empty. Empty compositions are never handed
    /// out; the accessor yields `None` instead.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Memoized worker-side composition of asynchronous hooks for one checkpoint.
#[derive(Clone)]
pub struct AsyncWorkerChain {
    checkpoint: Checkpoint,
    entries: Arc<[AsyncEntry]>,
}

impl AsyncWorkerChain {
    /// Awaits every composed hook sequentially in registration order,
    /// aborting on the first rejection.
    pub async fn invoke(
        &self,
        scope: &mut HookScope,
        event: &LifecycleEvent,
    ) -> Result<(), HookError> {
        for entry in self.entries.iter() {
            (entry.hook)(scope, event).await.map_err(|source| HookError {
                context: HookContext::Worker,
                checkpoint: self.checkpoint,
                hook: entry.name.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Number of hooks in the composition.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the composition is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HookRegistry
// ─────────────────────────────────────────────────────────────────────────────

/// Registry mapping (context, checkpoint) to ordered lists of hook callbacks.
///
/// One registry exists per flavor. Registration order is invocation order,
/// first registered first invoked, for every invocation of a checkpoint.
///
/// # Thread Safety
///
/// Interior mutability via [`RwLock`] allows registration from plugin setup
/// code concurrent with invocation from the execution paths. Entries are
/// cloned out before invocation so a hook that registers further hooks does
/// not deadlock the registry.
#[derive(Default)]
pub struct HookRegistry {
    sync_hooks: RwLock<HashMap<(HookContext, Checkpoint), Vec<SyncEntry>>>,
    async_hooks: RwLock<HashMap<(HookContext, Checkpoint), Vec<AsyncEntry>>>,
    /// Core-defined hooks, main thread only, run ahead of plugin hooks.
    eager: RwLock<HashMap<Checkpoint, Vec<SyncEntry>>>,
    /// Ordered source snippets spliced around a unit's resolved source.
    code: RwLock<HashMap<(HookContext, CodeSlot), Vec<String>>>,
    composed: Mutex<HashMap<Checkpoint, Option<WorkerChain>>>,
    composed_async: Mutex<HashMap<Checkpoint, Option<AsyncWorkerChain>>>,
}

impl HookRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a synchronous plugin hook for a synchronous checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`HookRegistrationError::ChannelMismatch`] for asynchronous
    /// checkpoints and [`HookRegistrationError::DuplicateName`] when the name
    /// is already taken for this (context, checkpoint) pair.
    pub fn register<F>(
        &self,
        context: HookContext,
        checkpoint: Checkpoint,
        name: impl Into<String>,
        hook: F,
    ) -> Result<&Self, HookRegistrationError>
    where
        F: Fn(&mut HookScope, &LifecycleEvent) -> HookResult + Send + Sync + 'static,
    {
        if checkpoint.is_async() {
            return Err(HookRegistrationError::ChannelMismatch {
                checkpoint,
                expects_async: true,
            });
        }
        let name = name.into();
        self.ensure_unused(context, checkpoint, &name)?;
        if context == HookContext::Worker && self.composed.lock().contains_key(&checkpoint) {
            tracing::debug!(%checkpoint, hook = %name, "registered after worker composition; not observed");
        }
        self.sync_hooks
            .write()
            .entry((context, checkpoint))
            .or_default()
            .push(SyncEntry {
                name,
                hook: Arc::new(hook),
            });
        Ok(self)
    }

    /// Registers an asynchronous plugin hook for an asynchronous checkpoint.
    ///
    /// # Errors
    ///
    /// Same error cases as [`register`](Self::register), with the channel
    /// check inverted.
    pub fn register_async(
        &self,
        context: HookContext,
        checkpoint: Checkpoint,
        name: impl Into<String>,
        hook: AsyncHookFn,
    ) -> Result<&Self, HookRegistrationError> {
        if !checkpoint.is_async() {
            return Err(HookRegistrationError::ChannelMismatch {
                checkpoint,
                expects_async: false,
            });
        }
        let name = name.into();
        self.ensure_unused(context, checkpoint, &name)?;
        if context == HookContext::Worker && self.composed_async.lock().contains_key(&checkpoint) {
            tracing::debug!(%checkpoint, hook = %name, "registered after worker composition; not observed");
        }
        self.async_hooks
            .write()
            .entry((context, checkpoint))
            .or_default()
            .push(AsyncEntry { name, hook });
        Ok(self)
    }

    /// Registers a core-defined eager hook for a main-thread checkpoint.
    ///
    /// Eager hooks always run before plugin hooks for the same checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`HookRegistrationError::ChannelMismatch`] for asynchronous
    /// checkpoints and [`HookRegistrationError::DuplicateName`] for a name
    /// already taken among eager hooks at this checkpoint.
    pub fn register_eager<F>(
        &self,
        checkpoint: Checkpoint,
        name: impl Into<String>,
        hook: F,
    ) -> Result<&Self, HookRegistrationError>
    where
        F: Fn(&mut HookScope, &LifecycleEvent) -> HookResult + Send + Sync + 'static,
    {
        if checkpoint.is_async() {
            return Err(HookRegistrationError::ChannelMismatch {
                checkpoint,
                expects_async: true,
            });
        }
        let name = name.into();
        let mut eager = self.eager.write();
        let entries = eager.entry(checkpoint).or_default();
        if entries.iter().any(|entry| entry.name == name) {
            return Err(HookRegistrationError::DuplicateName {
                context: HookContext::Main,
                checkpoint,
                name,
            });
        }
        entries.push(SyncEntry {
            name,
            hook: Arc::new(hook),
        });
        drop(eager);
        Ok(self)
    }

    /// Registers a source snippet spliced around resolved source text.
    pub fn register_code(&self, context: HookContext, slot: CodeSlot, snippet: impl Into<String>) {
        self.code
            .write()
            .entry((context, slot))
            .or_default()
            .push(snippet.into());
    }

    /// Returns the registered snippets for a slot joined by newlines, or
    /// `None` when no snippet was registered.
    #[must_use]
    pub fn compose_code(&self, context: HookContext, slot: CodeSlot) -> Option<String> {
        let code = self.code.read();
        let snippets = code.get(&(context, slot))?;
        if snippets.is_empty() {
            return None;
        }
        Some(snippets.join("\n"))
    }

    /// Invokes the synchronous chain for a checkpoint, fail-fast.
    ///
    /// On the main thread, eager hooks run first, then plugin hooks, each in
    /// registration order. In the worker context this consults the memoized
    /// composition and returns immediately when no plugin registered.
    ///
    /// # Errors
    ///
    /// Propagates the first failing hook as a [`HookError`]; remaining hooks
    /// in the chain are not invoked.
    pub fn invoke(
        &self,
        context: HookContext,
        checkpoint: Checkpoint,
        scope: &mut HookScope,
        event: &LifecycleEvent,
    ) -> Result<(), HookError> {
        if context == HookContext::Worker {
            return match self.worker_chain(checkpoint) {
                Some(chain) => chain.invoke(scope, event),
                None => Ok(()),
            };
        }

        let eager: Vec<SyncEntry> = self
            .eager
            .read()
            .get(&checkpoint)
            .cloned()
            .unwrap_or_default();
        let plugins: Vec<SyncEntry> = self
            .sync_hooks
            .read()
            .get(&(context, checkpoint))
            .cloned()
            .unwrap_or_default();

        for entry in eager.iter().chain(plugins.iter()) {
            (entry.hook)(scope, event).map_err(|source| HookError {
                context,
                checkpoint,
                hook: entry.name.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Awaits the asynchronous chain for a checkpoint sequentially,
    /// aborting on the first rejection.
    ///
    /// # Errors
    ///
    /// Propagates the first failing hook as a [`HookError`].
    pub async fn invoke_async(
        &self,
        context: HookContext,
        checkpoint: Checkpoint,
        scope: &mut HookScope,
        event: &LifecycleEvent,
    ) -> Result<(), HookError> {
        if context == HookContext::Worker {
            return match self.worker_chain_async(checkpoint) {
                Some(chain) => chain.invoke(scope, event).await,
                None => Ok(()),
            };
        }

        let entries: Vec<AsyncEntry> = self
            .async_hooks
            .read()
            .get(&(context, checkpoint))
            .cloned()
            .unwrap_or_default();

        for entry in &entries {
            (entry.hook)(scope, event).await.map_err(|source| HookError {
                context,
                checkpoint,
                hook: entry.name.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Returns the memoized worker-side synchronous composition for a
    /// checkpoint.
    ///
    /// Computed once per checkpoint on first read; `None` means no plugin
    /// registered and the caller can skip invocation entirely.
    #[must_use]
    pub fn worker_chain(&self, checkpoint: Checkpoint) -> Option<WorkerChain> {
        self.composed
            .lock()
            .entry(checkpoint)
            .or_insert_with(|| {
                let entries: Vec<SyncEntry> = self
                    .sync_hooks
                    .read()
                    .get(&(HookContext::Worker, checkpoint))
                    .cloned()
                    .unwrap_or_default();
                if entries.is_empty() {
                    None
                } else {
                    Some(WorkerChain {
                        checkpoint,
                        entries: entries.into(),
                    })
                }
            })
            .clone()
    }

    /// Returns the memoized worker-side asynchronous composition for a
    /// checkpoint. Same compute-once semantics as
    /// [`worker_chain`](Self::worker_chain).
    #[must_use]
    pub fn worker_chain_async(&self, checkpoint: Checkpoint) -> Option<AsyncWorkerChain> {
        self.composed_async
            .lock()
            .entry(checkpoint)
            .or_insert_with(|| {
                let entries: Vec<AsyncEntry> = self
                    .async_hooks
                    .read()
                    .get(&(HookContext::Worker, checkpoint))
                    .cloned()
                    .unwrap_or_default();
                if entries.is_empty() {
                    None
                } else {
                    Some(AsyncWorkerChain {
                        checkpoint,
                        entries: entries.into(),
                    })
                }
            })
            .clone()
    }

    /// Returns the number of plugin hooks registered for the given pair,
    /// counting both synchronous and asynchronous entries.
    #[must_use]
    pub fn hook_count(&self, context: HookContext, checkpoint: Checkpoint) -> usize {
        let sync = self
            .sync_hooks
            .read()
            .get(&(context, checkpoint))
            .map_or(0, Vec::len);
        let asynchronous = self
            .async_hooks
            .read()
            .get(&(context, checkpoint))
            .map_or(0, Vec::len);
        sync + asynchronous
    }

    /// Checks whether a plugin hook with the given name exists for the pair.
    #[must_use]
    pub fn contains_hook(&self, context: HookContext, checkpoint: Checkpoint, name: &str) -> bool {
        let key = (context, checkpoint);
        self.sync_hooks
            .read()
            .get(&key)
            .is_some_and(|entries| entries.iter().any(|entry| entry.name == name))
            || self
                .async_hooks
                .read()
                .get(&key)
                .is_some_and(|entries| entries.iter().any(|entry| entry.name == name))
    }

    fn ensure_unused(
        &self,
        context: HookContext,
        checkpoint: Checkpoint,
        name: &str,
    ) -> Result<(), HookRegistrationError> {
        if self.contains_hook(context, checkpoint, name) {
            return Err(HookRegistrationError::DuplicateName {
                context,
                checkpoint,
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("sync_hooks", &self.sync_hooks.read().len())
            .field("async_hooks", &self.async_hooks.read().len())
            .field("eager", &self.eager.read().len())
            .finish_non_exhaustive()
    }
}
