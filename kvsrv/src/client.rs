use super::{ClientId, KvClient, SeqNum};

use labrpc::tokio::time::sleep;
use log::trace;
use rand::Rng;
use std::time::Duration;

/// Pause between two attempts of the same operation.
pub const RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Client of a KV server.
///
/// Each operation gets a fresh sequence number and is retried with that same
/// number until a reply arrives, so the server can recognise the retries.
pub struct Clerk {
    server: KvClient,
    client_id: ClientId,
    seq: SeqNum,
}

impl Clerk {
    /// Create a clerk with a random identity.
    pub fn new(server: KvClient) -> Self {
        let client_id = rand::thread_rng().gen_range(0..1 << 62);
        Self::with_id(server, client_id)
    }

    /// Create a clerk with a given identity.
    pub fn with_id(server: KvClient, client_id: ClientId) -> Self {
        Self {
            server,
            client_id,
            seq: 0,
        }
    }

    /// Identity sent with every request.
    pub fn id(&self) -> ClientId {
        self.client_id
    }

    fn next_seq(&mut self) -> SeqNum {
        self.seq += 1;
        self.seq
    }

    /// Fetch the value of `key`, or the empty string if it was never written.
    pub async fn get(&mut self, key: &str) -> String {
        let seq = self.next_seq();
        loop {
            match self.server.get(self.client_id, seq, key.to_string()).await {
                Ok(v) => return v,
                Err(e) => trace!("client {} get seq {} retry: {}", self.client_id, seq, e),
            }
            sleep(RETRY_INTERVAL).await;
        }
    }

    /// Set `key` to `value`.
    pub async fn put(&mut self, key: &str, value: &str) {
        let seq = self.next_seq();
        loop {
            match self
                .server
                .put(self.client_id, seq, key.to_string(), value.to_string())
                .await
            {
                Ok(()) => return,
                Err(e) => trace!("client {} put seq {} retry: {}", self.client_id, seq, e),
            }
            sleep(RETRY_INTERVAL).await;
        }
    }

    /// Append `value` to `key` and return the previous value.
    pub async fn append(&mut self, key: &str, value: &str) -> String {
        let seq = self.next_seq();
        loop {
            match self
                .server
                .append(self.client_id, seq, key.to_string(), value.to_string())
                .await
            {
                Ok(v) => return v,
                Err(e) => trace!("client {} append seq {} retry: {}", self.client_id, seq, e),
            }
            sleep(RETRY_INTERVAL).await;
        }
    }
}
