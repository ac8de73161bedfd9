//! Local game-state guard for the mining Mini App.
//!
//! Progress lives in the browser's localStorage as flat per-field keys,
//! one user per key suffix. Any tab (or any component within a tab) may
//! write, and nothing guarantees the writer validated first. This crate
//! is the repair-and-sync layer: every load runs the record through
//! [`validate`], every cross-tab change notification triggers a re-read
//! and re-validate, and convergence between tabs relies on the validator
//! being idempotent rather than on any locking.
//!
//! [`StateGuard`] is the entry point; everything else is the machinery
//! under it.

pub mod clock;
pub mod codec;
pub mod guard;
pub mod progress;
pub mod snapshot;
pub mod store;
pub mod sync;
pub mod validate;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use guard::{RepairReport, StateGuard};
pub use progress::{ProgressField, ProgressRecord};
pub use store::{DiagnosticSink, MemoryBackend, ProgressStore, StorageBackend, StorageError};
pub use sync::{ExternalChange, GameEvent, Subscriber, SyncBus, SyncPhase};
pub use validate::{check_gems, validate, GemFlag, Issue};
