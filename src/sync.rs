//! Cross-context synchronization bus.
//!
//! Two channels. In-process events are published by this crate's own
//! writes and delivered synchronously, in registration order, before
//! `publish` returns. No queue, no reentrancy surprises within a tick.
//! External changes are fired by the storage medium when another tab
//! writes; those deliveries are already committed, and the writer may not
//! have validated, so receivers re-read and re-validate before trusting
//! the value.

use std::cell::RefCell;
use std::rc::Rc;

/// In-process notification payloads. [`GameEvent::kind`] is the stable
/// string tag used when bridging to DOM custom events.
#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    /// Gem counter changed by `amount`, now at `total`.
    GemsUpdated { amount: i64, total: i64 },
    /// Progress record was validated and persisted.
    ProgressUpdated { points: f64, level: i32 },
}

impl GameEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            GameEvent::GemsUpdated { .. } => "gems-updated",
            GameEvent::ProgressUpdated { .. } => "progress-updated",
        }
    }

    /// JSON payload for listeners outside the crate boundary.
    pub fn payload_json(&self) -> String {
        match self {
            GameEvent::GemsUpdated { amount, total } => {
                serde_json::json!({ "amount": amount, "total": total }).to_string()
            }
            GameEvent::ProgressUpdated { points, level } => {
                serde_json::json!({ "points": points, "level": level }).to_string()
            }
        }
    }
}

/// Cross-tab notification: raw old/new values for one changed key, exactly
/// as the storage medium reported them.
#[derive(Clone, Debug, PartialEq)]
pub struct ExternalChange {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

/// Where an observer is within one notification tick.
///
/// `Notified` is entered on either event kind, `Reconciled` once the
/// observer has re-read storage and updated its in-memory view. No phase
/// survives a synchronous tick: outside one the phase is always `Idle`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncPhase {
    #[default]
    Idle,
    Notified,
    Reconciled,
}

/// An observer interested in state changes.
pub trait Subscriber {
    /// In-process event from a writer in this context.
    fn on_event(&mut self, event: &GameEvent);

    /// Committed write observed from another context. Default: ignore.
    fn on_external(&mut self, change: &ExternalChange) {
        let _ = change;
    }
}

/// Registration-ordered fan-out to the subscribers of one execution
/// context. Delivery completes before `publish` returns.
#[derive(Default)]
pub struct SyncBus {
    subscribers: Vec<Rc<RefCell<dyn Subscriber>>>,
}

impl SyncBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: Rc<RefCell<dyn Subscriber>>) {
        self.subscribers.push(subscriber);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver an in-process event to every subscriber, synchronously.
    pub fn publish(&self, event: &GameEvent) {
        for subscriber in &self.subscribers {
            subscriber.borrow_mut().on_event(event);
        }
    }

    /// Deliver a cross-tab change to every subscriber, synchronously.
    pub fn publish_external(&self, change: &ExternalChange) {
        for subscriber in &self.subscribers {
            subscriber.borrow_mut().on_external(change);
        }
    }
}
