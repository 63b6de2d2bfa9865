use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use swarmbench_engine::model::agent::{Agent, AgentKind};
use swarmbench_engine::model::task::Task;
use swarmbench_engine::scheduler::{SchedulingAlgorithm, TaskScheduler};

fn agents(n: usize) -> Vec<Agent> {
    (0..n)
        .map(|i| Agent::new(AgentKind::all()[i % AgentKind::all().len()]))
        .collect()
}

fn tasks(n: usize) -> Vec<Task> {
    (0..n)
        .map(|i| {
            Task::new(format!("benchmark task {i}"))
                .with_priority((i % 10) as u8)
                .with_capability(if i % 2 == 0 { "coding" } else { "testing" })
        })
        .collect()
}

fn chained_tasks(n: usize) -> Vec<Task> {
    let mut out: Vec<Task> = Vec::with_capacity(n);
    for i in 0..n {
        let mut task = Task::new(format!("chained {i}"));
        if i > 0 {
            task = task.with_dependency(out[i - 1].id);
        }
        out.push(task);
    }
    out
}

fn bench_algorithms(c: &mut Criterion) {
    let scheduler = TaskScheduler::default();
    let pool = agents(32);
    let batch = tasks(1000);

    let mut group = c.benchmark_group("schedule_1000_tasks_32_agents");
    for algorithm in [
        SchedulingAlgorithm::RoundRobin,
        SchedulingAlgorithm::LeastLoaded,
        SchedulingAlgorithm::CapabilityBased,
        SchedulingAlgorithm::PriorityBased,
        SchedulingAlgorithm::Dynamic,
        SchedulingAlgorithm::WorkStealing,
    ] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{algorithm:?}")),
            &algorithm,
            |b, &algorithm| {
                b.iter(|| {
                    scheduler
                        .schedule(black_box(batch.clone()), &pool, algorithm)
                        .unwrap()
                });
            },
        );
    }
    group.finish();
}

fn bench_leveling(c: &mut Criterion) {
    let scheduler = TaskScheduler::default();
    let pool = agents(8);

    let mut group = c.benchmark_group("dependency_leveling");
    for depth in [10usize, 100, 500] {
        let batch = chained_tasks(depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| {
                scheduler
                    .schedule(black_box(batch.clone()), &pool, SchedulingAlgorithm::Dynamic)
                    .unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_algorithms, bench_leveling);
criterion_main!(benches);
