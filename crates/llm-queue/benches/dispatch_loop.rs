use criterion::{black_box, criterion_group, criterion_main, Criterion};
use llm_queue::{PriorityQueue, QueueConfigBuilder, TaskKind, TaskOutput};
use std::time::Duration;

fn bench_single_task_round_trip(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let queue = runtime.block_on(async {
        let q = PriorityQueue::new(
            QueueConfigBuilder::new()
                .max_concurrent(8)
                .default_exec_timeout(Duration::from_secs(5))
                .stats_log_interval(Duration::from_secs(60))
                .build(),
        );
        q.start();
        q
    });

    c.bench_function("dispatch_loop_single_task", |b| {
        b.to_async(&runtime).iter(|| async {
            let result = queue
                .enqueue(
                    TaskKind::Generate,
                    "bench-backend",
                    5,
                    None,
                    Box::pin(async { Ok(TaskOutput::Text("ok".into())) }),
                )
                .await
                .unwrap();
            black_box(result);
        });
    });

    runtime.block_on(queue.stop());
}

fn bench_contended_worker_pool(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let queue = runtime.block_on(async {
        let q = PriorityQueue::new(
            QueueConfigBuilder::new()
                .max_concurrent(2)
                .default_exec_timeout(Duration::from_secs(5))
                .stats_log_interval(Duration::from_secs(60))
                .build(),
        );
        q.start();
        q
    });

    c.bench_function("dispatch_loop_contended_pool", |b| {
        b.to_async(&runtime).iter(|| async {
            let results = futures::future::join_all((0..4).map(|i| {
                queue.enqueue(
                    TaskKind::Generate,
                    "bench-backend",
                    (i % 3) as u8,
                    None,
                    Box::pin(async { Ok(TaskOutput::Text("ok".into())) }),
                )
            }))
            .await;
            black_box(results);
        });
    });

    runtime.block_on(queue.stop());
}

criterion_group!(benches, bench_single_task_round_trip, bench_contended_worker_pool);
criterion_main!(benches);
