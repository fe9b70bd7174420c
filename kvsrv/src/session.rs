use std::collections::HashMap;

use crate::{ClientId, SeqNum};

#[derive(Debug, Clone)]
struct Session {
    last_seq: SeqNum,
    last_result: String,
}

/// Highest applied sequence number and its reply, per client.
///
/// Only the latest result is kept. A request whose sequence number is at or
/// below the latest one is answered with that latest result, even if it is
/// older than the request which produced it.
#[derive(Debug, Default)]
pub struct SessionTracker {
    sessions: HashMap<ClientId, Session>,
}

impl SessionTracker {
    /// Create a tracker with no sessions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the recorded reply if `seq` has already been applied for `client`.
    pub fn check_duplicate(&self, client: ClientId, seq: SeqNum) -> Option<&str> {
        match self.sessions.get(&client) {
            Some(s) if seq <= s.last_seq => Some(&s.last_result),
            _ => None,
        }
    }

    /// Overwrite the session of `client`.
    ///
    /// Must follow a negative [`check_duplicate`](Self::check_duplicate) for the same
    /// request within the same critical section.
    pub fn record(&mut self, client: ClientId, seq: SeqNum, result: String) {
        self.sessions.insert(
            client,
            Session {
                last_seq: seq,
                last_result: result,
            },
        );
    }

    /// Last applied sequence number of `client`, if it was ever seen.
    pub fn last_seq(&self, client: ClientId) -> Option<SeqNum> {
        self.sessions.get(&client).map(|s| s.last_seq)
    }

    /// Number of clients seen.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no client was seen yet.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
