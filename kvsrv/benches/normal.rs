use criterion::Criterion;
use criterion::{criterion_group, criterion_main};

use labrpc::{
    tokio::{self, runtime::Builder, time::Instant},
    NetworkConfig,
};

use kvsrv::{tests::kv_server, Clerk, Kvsrv};

fn bench_append_local(c: &mut Criterion) {
    let kv = Kvsrv::new();
    let mut seq = 0;
    c.bench_function("local append", |b| {
        b.iter(|| {
            seq += 1;
            kv.append(1, seq, "key".to_string(), "v".to_string())
        })
    });
}

fn bench_append(c: &mut Criterion) {
    let _ = env_logger::try_init();
    const NCLIENT: usize = 10;
    const NQUERIES: usize = 1000;

    c.bench_function(
        &format!("{} appends from {} clients", NQUERIES, NCLIENT),
        |b| {
            b.iter_custom(|iters| {
                let rt = Builder::new_multi_thread()
                    .worker_threads(8)
                    .enable_all()
                    .build()
                    .unwrap();

                rt.block_on(async {
                    let (client, _, _, _) = kv_server(NetworkConfig::default()).await;
                    let start = Instant::now();

                    for _ in 0..iters {
                        let mut appenders = Vec::new();
                        for i in 0..NCLIENT {
                            let client = client.clone();
                            appenders.push(tokio::spawn(async move {
                                let mut ck = Clerk::new(client);
                                let key = format!("key-{}", i);
                                for _ in 0..NQUERIES / NCLIENT {
                                    ck.append(&key, "x").await;
                                }
                            }));
                        }
                        for a in appenders {
                            a.await.expect("appenders should not panic");
                        }
                    }

                    start.elapsed()
                })
            });
        },
    );
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_append_local, bench_append,
);
criterion_main!(benches);
