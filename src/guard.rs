//! The per-user state guard: an explicit context object wiring store,
//! validator, and sync bus together.
//!
//! Every entry point runs the same cycle: read from the store, repair
//! through the validator, write the repaired record back, notify
//! observers. There is no module-level singleton; hosts construct one
//! guard per user context and thread it through. Across tabs the shared
//! record is not locked; correctness comes from last-write-wins plus the
//! validator's idempotence, which guarantees convergence once every tab
//! has reconciled.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::clock::{GuardClock, AUTOSAVE_INTERVAL_MS};
use crate::codec::DecodeIssue;
use crate::progress::ProgressRecord;
use crate::snapshot::{self, SnapshotError};
use crate::store::{DiagnosticSink, ProgressStore, StorageBackend, StoreTarget};
use crate::sync::{ExternalChange, GameEvent, Subscriber, SyncBus, SyncPhase};
use crate::validate::{check_gems, validate, GemFlag, Issue};

/// Everything a load/import cycle had to repair.
#[derive(Debug, Default)]
pub struct RepairReport {
    /// True when no stored keys existed and the defaults were created.
    pub fresh: bool,
    pub decode_issues: Vec<DecodeIssue>,
    pub issues: Vec<Issue>,
    pub gem_flags: Vec<GemFlag>,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        self.decode_issues.is_empty() && self.issues.is_empty() && self.gem_flags.is_empty()
    }

    /// Diagnostic tags for everything in the report, in detection order.
    pub fn tags(&self) -> Vec<String> {
        self.decode_issues
            .iter()
            .map(|i| i.to_string())
            .chain(self.issues.iter().map(|i| i.to_string()))
            .chain(self.gem_flags.iter().map(|f| f.to_string()))
            .collect()
    }
}

/// Guards one user's locally cached progress and gem counter.
pub struct StateGuard<B: StorageBackend> {
    store: ProgressStore<B>,
    bus: SyncBus,
    record: ProgressRecord,
    gems: i64,
    clock: GuardClock,
    sink: Rc<dyn DiagnosticSink>,
    phase: Cell<SyncPhase>,
}

impl<B: StorageBackend> StateGuard<B> {
    /// Load (or create) the user's state, repairing it in place.
    ///
    /// A fresh session writes the defaults; a dirty one writes back the
    /// repaired record so storage converges to a validated state. The
    /// returned report lists everything that had to change.
    pub fn load(
        backend: B,
        user_id: Option<&str>,
        sink: Rc<dyn DiagnosticSink>,
    ) -> (Self, RepairReport) {
        let store = ProgressStore::new(backend, user_id, sink.clone());

        let (raw, decode_issues, fresh) = store.load_record();
        let (record, issues) = validate(&raw);
        if fresh || !decode_issues.is_empty() || !issues.is_empty() {
            store.save_record(&record);
        }

        let (raw_gems, gems_defaulted) = store.load_gems();
        let (gems, gem_flags) = check_gems(raw_gems);
        if gems_defaulted || gems != raw_gems {
            store.save_gems(gems);
        }

        let report = RepairReport {
            fresh,
            decode_issues,
            issues,
            gem_flags,
        };
        if !report.is_clean() {
            sink.warn(&format!(
                "repaired stored progress: {}",
                report.tags().join(", ")
            ));
        }

        let guard = Self {
            store,
            bus: SyncBus::new(),
            record,
            gems,
            clock: GuardClock::new(AUTOSAVE_INTERVAL_MS),
            sink,
            phase: Cell::new(SyncPhase::Idle),
        };
        (guard, report)
    }

    pub fn record(&self) -> &ProgressRecord {
        &self.record
    }

    pub fn gems(&self) -> i64 {
        self.gems
    }

    pub fn user_id(&self) -> Option<&str> {
        self.store.user_id()
    }

    pub fn is_degraded(&self) -> bool {
        self.store.is_degraded()
    }

    pub fn sync_phase(&self) -> SyncPhase {
        self.phase.get()
    }

    /// Register an observer for this context's notifications.
    pub fn subscribe(&mut self, subscriber: Rc<RefCell<dyn Subscriber>>) {
        self.bus.subscribe(subscriber);
    }

    fn progress_event(&self) -> GameEvent {
        GameEvent::ProgressUpdated {
            points: self.record.divine_points,
            level: self.record.mining_level,
        }
    }

    /// Mutate the record through `f`, then validate, persist, and publish.
    ///
    /// Gameplay code never writes storage directly; whatever `f` does to
    /// the draft, only the validated result lands in the store and in the
    /// in-memory view. Returns the violations `f` introduced.
    pub fn apply<F: FnOnce(&mut ProgressRecord)>(&mut self, f: F) -> Vec<Issue> {
        let mut draft = self.record.clone();
        f(&mut draft);
        let (fixed, issues) = validate(&draft);
        self.record = fixed;
        self.store.save_record(&self.record);
        self.bus.publish(&self.progress_event());
        issues
    }

    /// Add (or, negative, spend) gems. Floors at zero, flags anomalies,
    /// persists, and publishes `gems-updated`.
    pub fn add_gems(&mut self, amount: i64) -> Vec<GemFlag> {
        let (total, flags) = check_gems(self.gems.saturating_add(amount));
        let delta = total - self.gems;
        self.gems = total;
        self.store.save_gems(total);
        self.bus.publish(&GameEvent::GemsUpdated {
            amount: delta,
            total,
        });
        flags
    }

    /// Handle a committed write observed from another context.
    ///
    /// Keys outside this guard's scope are ignored. For owned keys the
    /// stored value is re-read and re-validated before the in-memory view
    /// is updated — the writer in the other tab may not have validated.
    /// Returns true when the change belonged to this guard.
    pub fn reconcile_external(&mut self, change: &ExternalChange) -> bool {
        let Some(target) = self.store.classify_key(&change.key) else {
            return false;
        };
        self.phase.set(SyncPhase::Notified);
        self.bus.publish_external(change);

        match target {
            StoreTarget::Field(_) => {
                // any field change re-reads the whole record; per-field
                // deltas are not worth a second code path
                self.refresh_record();
            }
            StoreTarget::Gems => {
                self.refresh_gems();
            }
        }

        self.phase.set(SyncPhase::Reconciled);
        // no persistent reconciling state survives the tick
        self.phase.set(SyncPhase::Idle);
        true
    }

    /// Periodic maintenance: re-read, repair, write back, notify. Hosts
    /// call [`StateGuard::tick`] and get this at the autosave cadence.
    pub fn reconcile(&mut self) {
        self.refresh_record();
        self.refresh_gems();
    }

    /// Feed a wall-clock timestamp. Runs one maintenance cycle when due,
    /// collapsing missed cycles into a single pass. Returns true when a
    /// cycle ran.
    pub fn tick(&mut self, now_ms: f64) -> bool {
        if self.clock.update(now_ms) == 0 {
            return false;
        }
        self.reconcile();
        true
    }

    /// Serialize the current state as a portable JSON snapshot.
    pub fn export_snapshot(&self) -> Result<String, SnapshotError> {
        snapshot::export(&self.record, self.gems)
    }

    /// Replace the current state from a snapshot, repairing, persisting,
    /// and notifying as for any other write.
    pub fn import_snapshot(&mut self, json: &str) -> Result<RepairReport, SnapshotError> {
        let imported = snapshot::import(json)?;
        self.record = imported.record;
        self.gems = imported.gems;
        self.store.save_record(&self.record);
        self.store.save_gems(self.gems);
        self.bus.publish(&self.progress_event());
        self.bus.publish(&GameEvent::GemsUpdated {
            amount: 0,
            total: self.gems,
        });
        Ok(RepairReport {
            fresh: false,
            decode_issues: Vec::new(),
            issues: imported.issues,
            gem_flags: imported.gem_flags,
        })
    }

    fn refresh_record(&mut self) {
        let (raw, decode_issues, _fresh) = self.store.load_record();
        let (fixed, issues) = validate(&raw);
        if !decode_issues.is_empty() || !issues.is_empty() {
            // converge storage toward the validated state
            self.store.save_record(&fixed);
        }
        if fixed != self.record {
            self.record = fixed;
            self.bus.publish(&self.progress_event());
        }
    }

    fn refresh_gems(&mut self) {
        let (raw, defaulted) = self.store.load_gems();
        let (fixed, flags) = check_gems(raw);
        if defaulted || fixed != raw {
            self.store.save_gems(fixed);
        }
        if !flags.is_empty() {
            self.sink.warn(&format!(
                "gem counter flagged: {}",
                flags
                    .iter()
                    .map(|f| f.tag())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
        if fixed != self.gems {
            let delta = fixed - self.gems;
            self.gems = fixed;
            self.bus.publish(&GameEvent::GemsUpdated {
                amount: delta,
                total: fixed,
            });
        }
    }
}
