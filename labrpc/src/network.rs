use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use futures::Future;
use log::{info, trace, warn};
use rand::Rng;
use tokio::sync::mpsc::{self, Receiver, Sender};

use crate::{client::Client, server::Server};

#[derive(Debug, Clone)]
pub struct NetworkPackage {
    pub to: String,
    pub reply: Sender<String>,
    pub data: String,
}

/// Loss probabilities applied while the network is unreliable.
#[derive(Debug, Clone, Copy)]
pub struct NetworkConfig {
    /// Chance that a request never reaches its server.
    pub drop_request: f64,
    /// Chance that a reply is discarded after the server has executed the request.
    pub drop_reply: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            drop_request: 0.1,
            drop_reply: 0.1,
        }
    }
}

/// Fault switch and counters, shared between the router and its owner.
#[derive(Debug, Default)]
pub struct Faults {
    unreliable: AtomicBool,
    delivered: AtomicU64,
    dropped_requests: AtomicU64,
    dropped_replies: AtomicU64,
}

impl Faults {
    pub fn set_reliable(&self, reliable: bool) {
        self.unreliable.store(!reliable, Ordering::SeqCst);
    }

    pub fn is_reliable(&self) -> bool {
        !self.unreliable.load(Ordering::SeqCst)
    }

    /// Requests handed to a server.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::SeqCst)
    }

    pub fn dropped_requests(&self) -> u64 {
        self.dropped_requests.load(Ordering::SeqCst)
    }

    pub fn dropped_replies(&self) -> u64 {
        self.dropped_replies.load(Ordering::SeqCst)
    }

    /// Every request the router has seen, delivered or not.
    pub fn rpc_count(&self) -> u64 {
        self.delivered() + self.dropped_requests()
    }
}

pub struct Network {
    pub tx: Sender<NetworkPackage>,
    rx: Receiver<NetworkPackage>,
    pub nodes: Arc<Mutex<HashMap<String, Sender<NetworkPackage>>>>,
    config: NetworkConfig,
    faults: Arc<Faults>,
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl Network {
    /// A reliable network. Use [`Network::faults`] to switch it to lossy mode.
    pub fn new() -> Self {
        Self::with_config(NetworkConfig::default())
    }

    pub fn with_config(config: NetworkConfig) -> Self {
        let (tx, rx) = mpsc::channel(100);
        Self {
            tx,
            rx,
            nodes: Arc::new(Mutex::new(HashMap::default())),
            config,
            faults: Arc::new(Faults::default()),
        }
    }

    pub fn faults(&self) -> Arc<Faults> {
        self.faults.clone()
    }

    pub fn is_registered(&self, id: &str) -> bool {
        lock_nodes(&self.nodes).contains_key(id)
    }

    pub fn register_service<S, C, F, V>(&self, id: String, f: F) -> (C, impl Future<Output = ()>)
    where
        F: Fn() -> V,
        S: Server<Service = V> + Send + 'static,
        C: Client,
    {
        let client = C::from_server(id.clone(), self.tx.clone());
        let nodes = self.nodes.clone();
        (client, async move {
            loop {
                let mut server = S::from_service(f());
                lock_nodes(&nodes).insert(id.clone(), server.client_chan());
                if server.run().await.is_ok() {
                    break;
                } else {
                    info!("server {} restart", id);
                }
            }
        })
    }

    pub async fn run(&mut self) {
        while let Some(p) = self.rx.recv().await {
            let node = lock_nodes(&self.nodes).get(&p.to).cloned();
            match node {
                Some(node) => {
                    let faults = self.faults.clone();
                    let config = self.config;
                    tokio::spawn(forward(node, p, config, faults));
                }
                None => warn!("node {} not found", p.to),
            }
        }
    }
}

fn lock_nodes(
    nodes: &Mutex<HashMap<String, Sender<NetworkPackage>>>,
) -> MutexGuard<'_, HashMap<String, Sender<NetworkPackage>>> {
    nodes.lock().unwrap_or_else(PoisonError::into_inner)
}

fn roll(prob: f64) -> bool {
    prob > 0.0 && rand::thread_rng().gen_bool(prob.min(1.0))
}

/// Carry one request to `node` and its reply back, losing either under faults.
async fn forward(
    node: Sender<NetworkPackage>,
    p: NetworkPackage,
    config: NetworkConfig,
    faults: Arc<Faults>,
) {
    let NetworkPackage { to, reply, data } = p;
    let unreliable = !faults.is_reliable();

    if unreliable && roll(config.drop_request) {
        trace!("request to {} dropped", to);
        faults.dropped_requests.fetch_add(1, Ordering::SeqCst);
        return;
    }

    let (tx, mut rx) = mpsc::channel(1);
    faults.delivered.fetch_add(1, Ordering::SeqCst);
    if node
        .send(NetworkPackage {
            to: to.clone(),
            reply: tx,
            data,
        })
        .await
        .is_err()
    {
        warn!("send to node {} failed, dropped", to);
        return;
    }

    if let Some(resp) = rx.recv().await {
        if unreliable && roll(config.drop_reply) {
            trace!("reply from {} dropped", to);
            faults.dropped_replies.fetch_add(1, Ordering::SeqCst);
            return;
        }
        // The caller may have given up already.
        let _ = reply.send(resp).await;
    }
}
