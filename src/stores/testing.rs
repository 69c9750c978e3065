//! Helpers shared by the store tests.

use super::{SessionStore, StoreEvent, Subscription};
use crate::cookies::{CookieJar, CookieJarHandle, CookieOptions, DefaultCookieJar};
use crate::data::SessionData;
use serde_json::Value;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast::error::TryRecvError;

/// Routes `log` output to the test harness; set `RUST_LOG` to see it.
pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub(crate) fn data(value: Value) -> SessionData {
    SessionData::try_from(value).expect("test data must be a JSON object")
}

pub(crate) fn next_event(rx: &mut Subscription) -> StoreEvent {
    rx.try_recv().expect("expected a pending store event")
}

pub(crate) fn assert_no_events(rx: &mut Subscription) {
    match rx.try_recv() {
        Err(TryRecvError::Empty) => {}
        other => panic!("expected no store events, got {other:?}"),
    }
}

/// Cookie jar that records every write and clear, and offers no change
/// events so stores fall back to polling.
#[derive(Debug, Default)]
pub(crate) struct RecordingJar {
    inner: DefaultCookieJar,
    pub writes: Vec<(String, String, CookieOptions)>,
    pub clears: Vec<(String, CookieOptions)>,
}

impl RecordingJar {
    /// Values and options written to `name`, oldest first.
    pub fn written(&self, name: &str) -> Vec<(String, CookieOptions)> {
        self.writes
            .iter()
            .filter(|(n, _, _)| n == name)
            .map(|(_, v, o)| (v.clone(), o.clone()))
            .collect()
    }
}

impl CookieJar for RecordingJar {
    fn read(&self, name: &str) -> Option<String> {
        self.inner.read(name)
    }

    fn write(&mut self, name: &str, value: &str, options: &CookieOptions) -> anyhow::Result<()> {
        self.inner.write(name, value, options)?;
        self.writes.push((name.to_string(), value.to_string(), options.clone()));
        Ok(())
    }

    fn clear(&mut self, name: &str, options: &CookieOptions) {
        self.clears.push((name.to_string(), options.clone()));
        self.inner.clear(name, options);
    }

    fn subscribe(&self) -> Option<crate::cookies::CookieChanges> {
        None
    }
}

/// The recorder for assertions, and the same jar as a handle for environments.
pub(crate) fn recording_jar() -> (Arc<RwLock<RecordingJar>>, CookieJarHandle) {
    let recorder = Arc::new(RwLock::new(RecordingJar::default()));
    let handle: CookieJarHandle = recorder.clone();
    (recorder, handle)
}

/// Contract every store must satisfy on its own.
pub(crate) fn assert_behaves_like_a_store(store: &dyn SessionStore) {
    init_logging();
    store.clear().unwrap();
    let mut events = store.subscribe();
    assert!(store.restore().is_empty());

    let first = data(serde_json::json!({ "key": "value" }));
    store.persist(&first).unwrap();
    assert_eq!(store.restore(), first);

    let second = data(serde_json::json!({ "authenticated": { "token": "t", "roles": [1, 2, 3] } }));
    store.persist(&second).unwrap();
    assert_eq!(store.restore(), second);
    assert!(store.restore().get("key").is_none());

    // own writes never come back as updates
    store.sync();
    assert_no_events(&mut events);

    store.clear().unwrap();
    assert!(store.restore().is_empty());
    assert_eq!(next_event(&mut events), StoreEvent::SessionDataUpdated(SessionData::new()));

    store.sync();
    assert_no_events(&mut events);
}
