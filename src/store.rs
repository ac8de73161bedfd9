//! LocalStore adapter: per-user namespaced key-value persistence.
//!
//! The backend is whatever the platform provides (localStorage in the
//! browser, an in-memory map natively and in tests). The first backend
//! failure is reported once to the diagnostic sink, after which the store
//! silently serves the rest of the session from its in-memory mirror —
//! progress stops persisting but the game keeps running.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use thiserror::Error;

use crate::codec::{self, DecodeIssue};
use crate::progress::{ProgressField, ProgressRecord, GEMS_BASE_KEY};

/// Failure surfaced by the underlying storage medium.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage medium unavailable")]
    Unavailable,
    #[error("storage rejected {key}: {reason}")]
    Rejected { key: String, reason: String },
}

/// Key-value medium the store persists through.
///
/// Mirrors `web_sys::Storage`: shared references, string keys and values.
/// Implementations use interior mutability where they need it.
pub trait StorageBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory backend: the native default, the test medium, and the
/// degraded-mode mirror.
#[derive(Default)]
pub struct MemoryBackend {
    entries: RefCell<BTreeMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// Lets several contexts share one backend (two simulated tabs in tests,
/// the bus and the guard in a browser session).
impl<B: StorageBackend> StorageBackend for Rc<B> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

/// Receives one-shot diagnostic reports (degraded mode, repair summaries).
pub trait DiagnosticSink {
    fn warn(&self, message: &str);
}

/// stderr sink for native runs and tests.
#[derive(Default)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn warn(&self, message: &str) {
        eprintln!("game-state-guard: {message}");
    }
}

/// Per-user key: `"<baseKey>_<userId>"`, or the bare base key in the
/// anonymous fallback scope. Callers must treat the anonymous scope as
/// distinct and less trusted: it is shared by every signed-out session
/// on the origin.
pub fn scoped_key(base: &str, user_id: Option<&str>) -> String {
    match user_id {
        Some(id) => format!("{base}_{id}"),
        None => base.to_string(),
    }
}

/// What a storage key means to one user's store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreTarget {
    Field(ProgressField),
    Gems,
}

/// The LocalStore adapter proper: namespacing, codec, degraded mode.
pub struct ProgressStore<B: StorageBackend> {
    backend: B,
    /// Kept warm on every successful operation so a mid-session
    /// degradation starts from the last observed values.
    mirror: MemoryBackend,
    user_id: Option<String>,
    degraded: Cell<bool>,
    sink: Rc<dyn DiagnosticSink>,
}

impl<B: StorageBackend> ProgressStore<B> {
    pub fn new(backend: B, user_id: Option<&str>, sink: Rc<dyn DiagnosticSink>) -> Self {
        Self {
            backend,
            mirror: MemoryBackend::new(),
            user_id: user_id.map(str::to_string),
            degraded: Cell::new(false),
            sink,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// True once the session has fallen back to in-memory-only persistence.
    pub fn is_degraded(&self) -> bool {
        self.degraded.get()
    }

    /// Map a raw storage key to the field or counter it holds for this
    /// user, if any. Foreign users' keys map to `None`.
    pub fn classify_key(&self, key: &str) -> Option<StoreTarget> {
        let uid = self.user_id.as_deref();
        if key == scoped_key(GEMS_BASE_KEY, uid) {
            return Some(StoreTarget::Gems);
        }
        ProgressField::all()
            .iter()
            .find(|f| scoped_key(f.base_key(), uid) == key)
            .map(|f| StoreTarget::Field(*f))
    }

    fn enter_degraded(&self, err: &StorageError) {
        // report exactly once per session, then go quiet
        if !self.degraded.replace(true) {
            self.sink
                .warn(&format!("storage degraded to in-memory for this session: {err}"));
        }
    }

    fn read_raw(&self, base: &str) -> Option<String> {
        let key = scoped_key(base, self.user_id.as_deref());
        if self.degraded.get() {
            return self.mirror.get(&key).ok().flatten();
        }
        match self.backend.get(&key) {
            Ok(value) => {
                if let Some(v) = &value {
                    let _ = self.mirror.set(&key, v);
                }
                value
            }
            Err(err) => {
                self.enter_degraded(&err);
                self.mirror.get(&key).ok().flatten()
            }
        }
    }

    fn write_raw(&self, base: &str, value: &str) {
        let key = scoped_key(base, self.user_id.as_deref());
        let _ = self.mirror.set(&key, value);
        if self.degraded.get() {
            return;
        }
        if let Err(err) = self.backend.set(&key, value) {
            self.enter_degraded(&err);
        }
    }

    /// Read the whole record.
    ///
    /// All nine keys absent means a fresh first session: the defaults are
    /// returned with no issues. Otherwise each field decodes independently,
    /// defaulting (and reporting) the ones that are missing or corrupt.
    pub fn load_record(&self) -> (ProgressRecord, Vec<DecodeIssue>, bool) {
        let raws: Vec<Option<String>> = ProgressField::all()
            .iter()
            .map(|f| self.read_raw(f.base_key()))
            .collect();

        if raws.iter().all(Option::is_none) {
            return (ProgressRecord::default(), Vec::new(), true);
        }

        let mut record = ProgressRecord::default();
        let mut issues = Vec::new();
        for (field, raw) in ProgressField::all().iter().zip(&raws) {
            if let Some(issue) = codec::decode_field(&mut record, *field, raw.as_deref()) {
                issues.push(issue);
            }
        }
        (record, issues, false)
    }

    /// Persist the whole record, one key per field.
    pub fn save_record(&self, record: &ProgressRecord) {
        for field in ProgressField::all() {
            self.write_raw(field.base_key(), &codec::encode_field(record, *field));
        }
    }

    /// Read the gem counter. An absent key is a fresh counter (0, no
    /// defaulting reported); a present but corrupt value defaults to 0 and
    /// reports it.
    pub fn load_gems(&self) -> (i64, bool) {
        match self.read_raw(GEMS_BASE_KEY) {
            None => (0, false),
            some => codec::decode_gems(some.as_deref()),
        }
    }

    pub fn save_gems(&self, gems: i64) {
        self.write_raw(GEMS_BASE_KEY, &codec::encode_gems(gems));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;

    /// Sink that records messages for assertions.
    #[derive(Default)]
    struct RecordingSink {
        messages: StdRefCell<Vec<String>>,
    }

    impl DiagnosticSink for RecordingSink {
        fn warn(&self, message: &str) {
            self.messages.borrow_mut().push(message.to_string());
        }
    }

    /// Backend that starts failing on demand.
    struct FlakyBackend {
        inner: MemoryBackend,
        failing: Cell<bool>,
    }

    impl FlakyBackend {
        fn new() -> Self {
            Self {
                inner: MemoryBackend::new(),
                failing: Cell::new(false),
            }
        }
    }

    impl StorageBackend for FlakyBackend {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            if self.failing.get() {
                return Err(StorageError::Unavailable);
            }
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if self.failing.get() {
                return Err(StorageError::Rejected {
                    key: key.to_string(),
                    reason: "quota exceeded".to_string(),
                });
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key)
        }
    }

    fn sink() -> Rc<StderrSink> {
        Rc::new(StderrSink)
    }

    #[test]
    fn keys_are_namespaced_per_user() {
        assert_eq!(scoped_key("divinePoints", Some("4242")), "divinePoints_4242");
        assert_eq!(scoped_key("divinePoints", None), "divinePoints");
    }

    #[test]
    fn save_then_load_roundtrips() {
        let backend = Rc::new(MemoryBackend::new());
        let store = ProgressStore::new(backend.clone(), Some("4242"), sink());

        let mut record = ProgressRecord::default();
        record.divine_points = 777.5;
        record.mining_level = 12;
        store.save_record(&record);

        assert_eq!(
            backend.get("divinePoints_4242").unwrap().as_deref(),
            Some("777.5")
        );

        let (loaded, issues, fresh) = store.load_record();
        assert_eq!(loaded, record);
        assert!(issues.is_empty());
        assert!(!fresh);
    }

    #[test]
    fn all_keys_absent_is_a_fresh_session() {
        let store = ProgressStore::new(MemoryBackend::new(), Some("4242"), sink());
        let (record, issues, fresh) = store.load_record();
        assert_eq!(record, ProgressRecord::default());
        assert!(issues.is_empty());
        assert!(fresh);
    }

    #[test]
    fn partial_record_defaults_missing_fields() {
        let backend = Rc::new(MemoryBackend::new());
        backend.set("divinePoints_4242", "100").unwrap();
        let store = ProgressStore::new(backend, Some("4242"), sink());

        let (record, issues, fresh) = store.load_record();
        assert!(!fresh);
        assert_eq!(record.divine_points, 100.0);
        // the other eight fields were absent -> defaulted to 0
        assert_eq!(record.max_energy, 0.0);
        assert_eq!(issues.len(), 8);
    }

    #[test]
    fn anonymous_scope_uses_bare_keys() {
        let backend = Rc::new(MemoryBackend::new());
        let store = ProgressStore::new(backend.clone(), None, sink());
        store.save_gems(9);
        assert_eq!(backend.get("gems").unwrap().as_deref(), Some("9"));
    }

    #[test]
    fn classify_key_recognizes_own_scope_only() {
        let store = ProgressStore::new(MemoryBackend::new(), Some("4242"), sink());
        assert_eq!(
            store.classify_key("divinePoints_4242"),
            Some(StoreTarget::Field(ProgressField::DivinePoints))
        );
        assert_eq!(store.classify_key("gems_4242"), Some(StoreTarget::Gems));
        assert_eq!(store.classify_key("divinePoints_9999"), None);
        assert_eq!(store.classify_key("unrelated_key"), None);
    }

    #[test]
    fn gems_absent_is_fresh_not_defaulted() {
        let store = ProgressStore::new(MemoryBackend::new(), Some("4242"), sink());
        assert_eq!(store.load_gems(), (0, false));
    }

    #[test]
    fn gems_corrupt_value_defaults_with_report() {
        let backend = Rc::new(MemoryBackend::new());
        backend.set("gems_4242", "not-a-number").unwrap();
        let store = ProgressStore::new(backend, Some("4242"), sink());
        assert_eq!(store.load_gems(), (0, true));
    }

    #[test]
    fn first_failure_degrades_and_reports_once() {
        let recorder = Rc::new(RecordingSink::default());
        let backend = Rc::new(FlakyBackend::new());
        let store = ProgressStore::new(backend.clone(), Some("4242"), recorder.clone());

        store.save_gems(5);
        assert!(!store.is_degraded());

        backend.failing.set(true);
        store.save_gems(6);
        store.save_gems(7);
        store.save_gems(8);

        assert!(store.is_degraded());
        assert_eq!(recorder.messages.borrow().len(), 1);
        assert!(recorder.messages.borrow()[0].contains("quota exceeded"));
    }

    #[test]
    fn degraded_store_serves_the_mirror() {
        let recorder = Rc::new(RecordingSink::default());
        let backend = Rc::new(FlakyBackend::new());
        let store = ProgressStore::new(backend.clone(), Some("4242"), recorder.clone());

        // healthy write seeds the mirror
        store.save_gems(5);
        backend.failing.set(true);

        // degraded write lands in the mirror only
        store.save_gems(42);
        assert_eq!(store.load_gems(), (42, false));
        // the real backend still has the pre-failure value
        assert_eq!(backend.inner.get("gems_4242").unwrap().as_deref(), Some("5"));
    }

    #[test]
    fn degraded_read_keeps_last_observed_values() {
        let recorder = Rc::new(RecordingSink::default());
        let backend = Rc::new(FlakyBackend::new());
        let store = ProgressStore::new(backend.clone(), Some("4242"), recorder.clone());

        let mut record = ProgressRecord::default();
        record.divine_points = 321.0;
        store.save_record(&record);
        let _ = store.load_record(); // warms the mirror

        backend.failing.set(true);
        let (loaded, issues, fresh) = store.load_record();
        assert_eq!(loaded.divine_points, 321.0);
        assert!(issues.is_empty());
        assert!(!fresh);
    }
}
