use log::{error, info};
use structopt::StructOpt;

use kvsrv::{tests::kv_server, Clerk};
use labrpc::{tokio, NetworkConfig};

#[derive(StructOpt, Debug)]
#[structopt(name = env!("CARGO_PKG_NAME"), version = env!("CARGO_PKG_VERSION"), author = env!("CARGO_PKG_AUTHORS"))]
/// Run concurrent clients against one KV server and check every append lands exactly once.
struct Opt {
    /// Number of concurrent clients
    #[structopt(short, long, default_value = "5")]
    clients: usize,

    /// Appends issued by each client
    #[structopt(short, long, default_value = "100")]
    ops: usize,

    /// Lose requests and replies
    #[structopt(short, long)]
    unreliable: bool,

    /// Probability of losing a request when unreliable
    #[structopt(long, default_value = "0.1")]
    drop_request: f64,

    /// Probability of losing a reply when unreliable
    #[structopt(long, default_value = "0.1")]
    drop_reply: f64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let opt = Opt::from_args();
    let (client, faults, _, _) = kv_server(NetworkConfig {
        drop_request: opt.drop_request,
        drop_reply: opt.drop_reply,
    })
    .await;
    faults.set_reliable(!opt.unreliable);

    let mut handles = Vec::new();
    for i in 0..opt.clients {
        let client = client.clone();
        let ops = opt.ops;
        handles.push(tokio::spawn(async move {
            let mut ck = Clerk::new(client);
            let key = format!("key-{}", i);
            let mut expected = String::new();
            for j in 0..ops {
                let token = format!("({},{})", i, j);
                ck.append(&key, &token).await;
                expected.push_str(&token);
            }
            (key, expected)
        }));
    }

    let mut expected = Vec::new();
    for h in handles {
        expected.push(h.await?);
    }

    faults.set_reliable(true);
    let mut ck = Clerk::new(client);
    let mut violations = 0;
    for (key, want) in expected {
        let got = ck.get(&key).await;
        if got != want {
            error!("{}: expected {:?}, got {:?}", key, want, got);
            violations += 1;
        }
    }

    info!(
        "rpcs: {}, delivered: {}, dropped requests: {}, dropped replies: {}",
        faults.rpc_count(),
        faults.delivered(),
        faults.dropped_requests(),
        faults.dropped_replies()
    );
    println!(
        "{} clients x {} appends, {} rpcs, {} violations",
        opt.clients,
        opt.ops,
        faults.rpc_count(),
        violations
    );
    if violations > 0 {
        return Err(format!("{} keys diverged", violations).into());
    }
    Ok(())
}
