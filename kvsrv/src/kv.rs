use super::KvService;
use crate::{session::SessionTracker, ClientId, SeqNum};

use labrpc::anyhow::Result;
use log::{debug, trace};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

/// String map where an absent key reads as the empty string.
#[derive(Debug, Default)]
pub struct Store {
    data: HashMap<String, String>,
}

impl Store {
    /// Current value of `key`.
    pub fn get(&self, key: &str) -> String {
        self.data.get(key).cloned().unwrap_or_default()
    }

    /// Set `key` to `value`.
    pub fn put(&mut self, key: String, value: String) {
        self.data.insert(key, value);
    }

    /// Append `value` to `key` and return the value it had before.
    pub fn append(&mut self, key: String, value: &str) -> String {
        let cur = self.data.entry(key).or_default();
        let old = cur.clone();
        cur.push_str(value);
        old
    }

    /// Number of keys ever written.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether no key was written yet.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Default)]
struct State {
    store: Store,
    sessions: SessionTracker,
}

/// Single-node KV server with exactly-once mutations.
///
/// The store and the session tracker live behind one lock, so checking a request
/// for duplication and applying it happen in a single critical section.
#[derive(Debug, Clone, Default)]
pub struct Kvsrv {
    state: Arc<Mutex<State>>,
}

impl Kvsrv {
    /// Create a server with an empty store and no sessions.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Nothing panics while the lock is held, so the state is never half-applied.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply<F>(&self, op: &str, client: ClientId, seq: SeqNum, f: F) -> String
    where
        F: FnOnce(&mut Store) -> String,
    {
        let mut state = self.lock();
        if let Some(prev) = state.sessions.check_duplicate(client, seq) {
            debug!("{} from client {} seq {} is a duplicate", op, client, seq);
            return prev.to_owned();
        }
        let result = f(&mut state.store);
        trace!("{} from client {} seq {} applied", op, client, seq);
        state.sessions.record(client, seq, result.clone());
        result
    }

    /// Read `key`. A retried read returns the value seen the first time.
    pub fn get(&self, client: ClientId, seq: SeqNum, key: &str) -> String {
        self.apply("get", client, seq, |store| store.get(key))
    }

    /// Overwrite `key` with `value`.
    pub fn put(&self, client: ClientId, seq: SeqNum, key: String, value: String) {
        self.apply("put", client, seq, move |store| {
            store.put(key, value);
            String::new()
        });
    }

    /// Append `value` to `key`, returning the value before the first application.
    pub fn append(&self, client: ClientId, seq: SeqNum, key: String, value: String) -> String {
        self.apply("append", client, seq, move |store| store.append(key, &value))
    }

    /// Read `key` without going through sessions.
    pub fn peek(&self, key: &str) -> String {
        self.lock().store.get(key)
    }

    /// Number of clients with a session.
    pub fn sessions(&self) -> usize {
        self.lock().sessions.len()
    }
}

#[labrpc::async_trait]
impl KvService for Kvsrv {
    async fn get(&self, client_id: ClientId, seq: SeqNum, key: String) -> Result<String> {
        Ok(Kvsrv::get(self, client_id, seq, &key))
    }
    async fn put(&self, client_id: ClientId, seq: SeqNum, key: String, value: String) -> Result<()> {
        Kvsrv::put(self, client_id, seq, key, value);
        Ok(())
    }
    async fn append(
        &self,
        client_id: ClientId,
        seq: SeqNum,
        key: String,
        value: String,
    ) -> Result<String> {
        Ok(Kvsrv::append(self, client_id, seq, key, value))
    }
}
