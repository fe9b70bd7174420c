use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use labrpc::{anyhow::Result, tokio, Faults, Network, NetworkConfig};

labrpc::service! {
    service counter_svc {
        fn incr(by: u64) -> u64;
    }
}

use counter_svc::{Client as CounterClient, Server as CounterServer, Service as CounterService};

#[derive(Clone, Default)]
struct Counter {
    n: Arc<AtomicU64>,
}

#[labrpc::async_trait]
impl CounterService for Counter {
    async fn incr(&self, by: u64) -> Result<u64> {
        Ok(self.n.fetch_add(by, Ordering::SeqCst) + by)
    }
}

async fn counter_server(config: NetworkConfig, counter: Counter) -> (CounterClient, Arc<Faults>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut net = Network::with_config(config);
    let faults = net.faults();
    let (client, server_routine) = net
        .register_service::<CounterServer<Counter>, _, _, _>("counter".to_string(), move || {
            counter.clone()
        });
    tokio::spawn(server_routine);
    while !net.is_registered("counter") {
        tokio::task::yield_now().await;
    }
    tokio::spawn(async move { net.run().await });
    (client, faults)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reliable_call() {
    let counter = Counter::default();
    let (client, faults) = counter_server(NetworkConfig::default(), counter.clone()).await;

    assert_eq!(client.incr(2).await.unwrap(), 2);
    assert_eq!(client.incr(3).await.unwrap(), 5);
    assert_eq!(faults.delivered(), 2);
    assert_eq!(faults.rpc_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dropped_request_never_executes() {
    let counter = Counter::default();
    let config = NetworkConfig {
        drop_request: 1.0,
        drop_reply: 0.0,
    };
    let (client, faults) = counter_server(config, counter.clone()).await;
    faults.set_reliable(false);

    assert!(client.incr(1).await.is_err());
    assert_eq!(counter.n.load(Ordering::SeqCst), 0);
    assert_eq!(faults.dropped_requests(), 1);
    assert_eq!(faults.delivered(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dropped_reply_still_executes() {
    let counter = Counter::default();
    let config = NetworkConfig {
        drop_request: 0.0,
        drop_reply: 1.0,
    };
    let (client, faults) = counter_server(config, counter.clone()).await;
    faults.set_reliable(false);

    assert!(client.incr(1).await.is_err());
    assert_eq!(counter.n.load(Ordering::SeqCst), 1);
    assert_eq!(faults.dropped_replies(), 1);

    faults.set_reliable(true);
    assert_eq!(client.incr(1).await.unwrap(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_malformed_request_is_dropped() {
    let counter = Counter::default();
    let (client, _faults) = counter_server(NetworkConfig::default(), counter.clone()).await;

    assert!(client.call("not json".to_string()).await.is_err());
    assert_eq!(counter.n.load(Ordering::SeqCst), 0);
    assert_eq!(client.incr(1).await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_requests() {
    let counter = Counter::default();
    let (client, _faults) = counter_server(NetworkConfig::default(), counter.clone()).await;

    let mut handles = Vec::new();
    for _ in 0..50 {
        let client = client.clone();
        handles.push(tokio::spawn(async move { client.incr(1).await.unwrap() }));
    }
    for h in handles {
        h.await.unwrap();
    }
    assert_eq!(counter.n.load(Ordering::SeqCst), 50);
}
