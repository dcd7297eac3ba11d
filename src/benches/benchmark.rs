// Benchmark graph construction over seeded histories.
// Diffs are answered in memory so only the ordering and bookkeeping is measured.
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use git_revgraph::builder::construct;
use git_revgraph::diff::{ChangeType, DiffFile};
use git_revgraph::tests::fixtures::{synthetic_log, MemoryVcs, ScriptedRunner};
use git_revgraph::{GradleStrategy, Repository};
use std::path::Path;
use std::time::Duration;

fn construct_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("Construct");
    for commits in [100, 1000, 10000] {
        let log = synthetic_log(commits, 0.1, 42);
        let end = format!("c{}", commits / 2);

        group.bench_with_input(BenchmarkId::new("half window", commits), &log, |b, log| {
            b.iter(|| {
                construct(
                    black_box(log.clone()),
                    black_box(&end),
                    Path::new("/repo"),
                    |_, new| Ok(vec![DiffFile::new(ChangeType::Modified, new)]),
                )
            })
        });
    }
    group.finish();
}

fn repository_benchmark(c: &mut Criterion) {
    let commits = 1000;
    let start = format!("c{}", commits - 1);

    c.bench_function("1000 Commits Repository", |b| {
        b.iter(|| {
            let repo = Repository::new(
                Path::new("/repo"),
                MemoryVcs::new(synthetic_log(commits, 0.25, 7)),
                GradleStrategy::default(),
                ScriptedRunner::default(),
            );
            repo.build_history_graph(black_box(&start), black_box("c0"))
        })
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(10));
    targets = construct_benchmark, repository_benchmark
}
criterion_main!(benches);
