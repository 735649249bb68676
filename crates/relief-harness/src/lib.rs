#![forbid(unsafe_code)]

//! Test harness and reference fixtures for the relief data layer.
//!
//! - [`TestHub`]: a [`ReliefHub`] over a [`MemoryStore`] with a hand-driven
//!   clock, plus raw-store helpers for seeding corrupt or duplicated data
//! - [`EventRecorder`]: captures every bus notification in order
//! - [`fixtures`]: canned resources, responders, and responses
//! - [`strategies`]: proptest generators for valid inputs

pub mod fixtures;
pub mod recorder;
pub mod strategies;

use std::ops::Deref;
use std::rc::Rc;

use relief_core::{Millis, Response, StoreKey};
use relief_runtime::{ManualClock, ReliefHub};
use relief_store::{KeyValueStore, MemoryStore};
use tracing::debug;

pub use recorder::EventRecorder;

/// Instant the test clock starts at.
pub const START: Millis = 1_700_000_000_000;

/// A hub with deterministic time and an inspectable backend.
pub struct TestHub {
    hub: ReliefHub,
    backend: Rc<MemoryStore>,
    clock: Rc<ManualClock>,
}

impl TestHub {
    /// Fresh store, auto-assign on.
    #[must_use]
    pub fn new() -> Self {
        Self::with_auto_assign(true)
    }

    #[must_use]
    pub fn with_auto_assign(enabled: bool) -> Self {
        Self::over(MemoryStore::new(), START, enabled)
    }

    fn over(backend: MemoryStore, start: Millis, auto_assign: bool) -> Self {
        let backend = Rc::new(backend);
        let clock = Rc::new(ManualClock::new(start));
        let shared: Rc<dyn KeyValueStore> = Rc::clone(&backend) as Rc<dyn KeyValueStore>;
        let hub = ReliefHub::builder()
            .backend(shared)
            .clock(Box::new(Rc::clone(&clock)))
            .auto_assign(auto_assign)
            .build();
        Self {
            hub,
            backend,
            clock,
        }
    }

    /// A second tab over the same entries, with its own clock starting at
    /// this tab's current time.
    #[must_use]
    pub fn open_tab(&self) -> Self {
        use relief_runtime::Clock as _;
        Self::over(
            self.backend.open_tab(),
            self.clock.now_millis(),
            self.hub.auto_assign(),
        )
    }

    #[must_use]
    pub fn hub(&self) -> &ReliefHub {
        &self.hub
    }

    #[must_use]
    pub fn backend(&self) -> &MemoryStore {
        &self.backend
    }

    #[must_use]
    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    pub fn advance(&self, by: Millis) {
        self.clock.advance(by);
    }

    /// Append `responses` to a user's collection without touching the
    /// dedup index or the bus. Seeds the states cleanup exists to repair.
    pub fn force_insert_responses(&self, user_id: &str, responses: &[Response]) {
        let key = StoreKey::responses(user_id);
        let mut stored: Vec<Response> = self.hub.store().read(&key);
        stored.extend_from_slice(responses);
        self.hub
            .store()
            .write(&key, &stored)
            .expect("memory store write cannot fail");
        debug!(user_id, count = responses.len(), "force-inserted responses");
    }

    /// Write a raw string under `key`, bypassing serialization.
    pub fn force_write_raw(&self, key: &str, raw: &str) {
        self.backend
            .set(key, raw)
            .expect("memory store write cannot fail");
    }

    /// Raw stored value for `key`.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.backend
            .get(key)
            .expect("memory store read cannot fail")
    }

    /// Content hash over every stored key and value. Equal digests mean the
    /// store was left byte-identical.
    #[must_use]
    pub fn store_digest(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        for key in self.backend.keys().expect("memory store keys cannot fail") {
            let value = self.raw(&key).unwrap_or_default();
            hasher.update(key.as_bytes());
            hasher.update(&[0]);
            hasher.update(value.as_bytes());
            hasher.update(&[0]);
        }
        hasher.finalize()
    }

    /// Pretty JSON dump of one stored collection, for failure messages.
    #[must_use]
    pub fn dump(&self, key: &StoreKey) -> String {
        let Some(raw) = self.raw(&key.to_string()) else {
            return "<absent>".to_owned();
        };
        serde_json::from_str::<serde_json::Value>(&raw)
            .and_then(|v| serde_json::to_string_pretty(&v))
            .unwrap_or(raw)
    }
}

impl Default for TestHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for TestHub {
    type Target = ReliefHub;

    fn deref(&self) -> &ReliefHub {
        &self.hub
    }
}

impl std::fmt::Debug for TestHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestHub")
            .field("backend", &self.backend)
            .field("clock", &self.clock)
            .finish()
    }
}
