#![deny(missing_docs)]
#![deny(clippy::all)]
//! Single-node KV store with exactly-once Put and Append over an at-least-once network.

/// Identity a client picks at startup, unique for the life of its session.
pub type ClientId = u64;

/// Per-client operation number. Retries of one operation reuse it.
pub type SeqNum = u64;

labrpc::service! {
    service kv_service {
        fn get(client_id: ClientId, seq: SeqNum, key: String) -> String;
        fn put(client_id: ClientId, seq: SeqNum, key: String, value: String) -> ();
        fn append(client_id: ClientId, seq: SeqNum, key: String, value: String) -> String;
    }
}

pub use kv_service::{Client as KvClient, Server as KvServer, Service as KvService};

/// Per-client duplicate detection.
pub mod session;

/// KV Store Server.
pub mod kv;

/// KV Store Client.
pub mod client;


pub use client::Clerk;
pub use kv::Kvsrv;
pub use session::SessionTracker;
