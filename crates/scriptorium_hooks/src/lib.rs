//! Lifecycle hooks for script execution.
//!
//! This crate provides the hook system that lets plugins observe or modify
//! each script execution driven by the Scriptorium runtime. Hooks are invoked
//! at named lifecycle checkpoints, in registration order, with fail-fast
//! error propagation.
//!
//! # Architecture
//!
//! The hook system consists of four parts:
//!
//! - **Checkpoints** ([`checkpoint`]): enums identifying hook points and the
//!   execution context (main thread vs. worker thread)
//! - **Events** ([`events`]): [`LifecycleEvent`] payload carried to hooks
//! - **Scope** ([`scope`]): [`HookScope`], the mutable execution context
//!   threaded through each chain and into the engine
//! - **API** ([`api`]): [`HookRegistry`], registration and invocation
//!
//! # Design Principles
//!
//! - Hooks execute in registration order
//! - Eager (core-registered) hooks run before plugin hooks on the main thread
//! - A failing hook aborts the remaining chain for that checkpoint
//! - Worker-side compositions are memoized and yield nothing when no plugin
//!   registered, so the caller can skip invocation entirely
//!
//! # Example
//!
//! ```
//! use scriptorium_hooks::{Checkpoint, HookContext, HookRegistry};
//!
//! let hooks = HookRegistry::new();
//! hooks
//!     .register(HookContext::Main, Checkpoint::BeforeRun, "logger", |_scope, event| {
//!         tracing::info!("about to run unit {}", event.unit_id());
//!         Ok(())
//!     })
//!     .unwrap();
//! ```

pub mod api;
pub mod checkpoint;
pub mod events;
pub mod scope;

pub use api::{
    AsyncHookFn, AsyncWorkerChain, BoxFuture, HookError, HookRegistrationError, HookRegistry,
    HookResult, WorkerChain,
};
pub use checkpoint::{Checkpoint, CodeSlot, HookContext};
pub use events::LifecycleEvent;
pub use scope::HookScope;
