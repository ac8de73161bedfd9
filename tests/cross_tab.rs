//! Two guards sharing one storage medium, simulating two open tabs.
//!
//! The platform's storage events are simulated by hand-building the
//! `ExternalChange` a browser would deliver: the changed key plus the raw
//! pre/post strings. The receiving tab must never trust the payload — it
//! re-reads storage and re-validates, which is what these tests pin down.

use std::cell::RefCell;
use std::rc::Rc;

use game_state_guard::store::{MemoryBackend, StderrSink};
use game_state_guard::sync::{ExternalChange, GameEvent, Subscriber};
use game_state_guard::{StateGuard, StorageBackend};

fn sink() -> Rc<StderrSink> {
    Rc::new(StderrSink)
}

/// Two guards for the same user over one shared backend.
fn two_tabs(
    user: &str,
) -> (
    StateGuard<Rc<MemoryBackend>>,
    StateGuard<Rc<MemoryBackend>>,
    Rc<MemoryBackend>,
) {
    let backend = Rc::new(MemoryBackend::new());
    let (tab_a, _) = StateGuard::load(backend.clone(), Some(user), sink());
    let (tab_b, _) = StateGuard::load(backend.clone(), Some(user), sink());
    (tab_a, tab_b, backend)
}

/// The change a browser would fire at other tabs for one committed write.
fn storage_event(key: &str, old: Option<&str>, new: Option<&str>) -> ExternalChange {
    ExternalChange {
        key: key.to_string(),
        old_value: old.map(str::to_string),
        new_value: new.map(str::to_string),
    }
}

#[test]
fn gem_increment_in_one_tab_reconciles_in_the_other() {
    let (mut tab_a, mut tab_b, backend) = two_tabs("4242");

    let old = backend.get("gems_4242").unwrap();
    tab_a.add_gems(25);
    let new = backend.get("gems_4242").unwrap();
    assert_eq!(new.as_deref(), Some("25"));

    let handled = tab_b.reconcile_external(&storage_event(
        "gems_4242",
        old.as_deref(),
        new.as_deref(),
    ));

    assert!(handled);
    // the reconciled view equals newValue parsed as a number
    let expected: i64 = new.unwrap().parse().unwrap();
    assert_eq!(tab_b.gems(), expected);
}

#[test]
fn external_subscriber_sees_raw_old_and_new_values() {
    #[derive(Default)]
    struct ChangeLog {
        changes: Vec<(String, Option<String>, Option<String>)>,
    }

    impl Subscriber for ChangeLog {
        fn on_event(&mut self, _event: &GameEvent) {}

        fn on_external(&mut self, change: &ExternalChange) {
            self.changes.push((
                change.key.clone(),
                change.old_value.clone(),
                change.new_value.clone(),
            ));
        }
    }

    let (mut tab_a, mut tab_b, backend) = two_tabs("4242");
    let log = Rc::new(RefCell::new(ChangeLog::default()));
    tab_b.subscribe(log.clone());

    tab_a.add_gems(100);
    tab_a.add_gems(25);
    let new = backend.get("gems_4242").unwrap();

    tab_b.reconcile_external(&storage_event("gems_4242", Some("100"), new.as_deref()));

    let changes = log.borrow().changes.clone();
    assert_eq!(
        changes,
        vec![(
            "gems_4242".to_string(),
            Some("100".to_string()),
            Some("125".to_string()),
        )]
    );
    assert_eq!(tab_b.gems(), 125);
}

#[test]
fn unvalidated_cross_tab_write_is_repaired_by_the_receiver() {
    let (_, mut tab_b, backend) = two_tabs("4242");

    // a buggy (or hostile) tab writes out-of-bound values directly
    backend.set("divinePoints_4242", "-500").unwrap();
    backend.set("maxEnergy_4242", "7").unwrap();

    tab_b.reconcile_external(&storage_event("divinePoints_4242", Some("0"), Some("-500")));

    assert_eq!(tab_b.record().divine_points, 0.0);
    assert_eq!(tab_b.record().max_energy, 1000.0);
    // the receiver converged storage back to validated values
    assert_eq!(
        backend.get("divinePoints_4242").unwrap().as_deref(),
        Some("0")
    );
    assert_eq!(backend.get("maxEnergy_4242").unwrap().as_deref(), Some("1000"));
}

#[test]
fn tabs_converge_after_racing_writes() {
    let (mut tab_a, mut tab_b, backend) = two_tabs("4242");

    tab_a.apply(|r| r.divine_points = 300.0);
    tab_b.apply(|r| r.divine_points = 450.0); // last write wins

    // each tab observes the other's commit, in either order
    tab_a.reconcile_external(&storage_event("divinePoints_4242", Some("300"), Some("450")));
    tab_b.reconcile_external(&storage_event("divinePoints_4242", Some("300"), Some("450")));

    assert_eq!(tab_a.record(), tab_b.record());
    assert_eq!(tab_a.record().divine_points, 450.0);
    assert_eq!(
        backend.get("divinePoints_4242").unwrap().as_deref(),
        Some("450")
    );
}

#[test]
fn other_users_changes_do_not_leak_between_scopes() {
    let backend = Rc::new(MemoryBackend::new());
    let (mut alice, _) = StateGuard::load(backend.clone(), Some("alice"), sink());
    let (mut bob, _) = StateGuard::load(backend.clone(), Some("bob"), sink());

    alice.add_gems(50);
    let handled = bob.reconcile_external(&storage_event("gems_alice", None, Some("50")));

    assert!(!handled);
    assert_eq!(bob.gems(), 0);
}

#[test]
fn anonymous_and_signed_in_scopes_stay_separate() {
    let backend = Rc::new(MemoryBackend::new());
    let (mut anon, _) = StateGuard::load(backend.clone(), None, sink());
    let (user, _) = StateGuard::load(backend.clone(), Some("4242"), sink());

    anon.add_gems(5);
    assert_eq!(backend.get("gems").unwrap().as_deref(), Some("5"));
    assert_eq!(backend.get("gems_4242").unwrap(), None);
    assert_eq!(user.gems(), 0);
}
