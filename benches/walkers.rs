use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kolosal_grid::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ForestParams {
    ntrees: usize,
    max_depth: usize,
    mtries: i64,
    sample_rate: f64,
}

impl ModelParameters for ForestParams {
    fn algo_name(&self) -> &str {
        "drf"
    }

    fn fields() -> FieldTable<Self> {
        FieldTable::<Self>::new()
            .field("ntrees", |p| p.ntrees.into(), |p, v| {
                p.ntrees = v.as_usize("ntrees")?;
                Ok(())
            })
            .field("max_depth", |p| p.max_depth.into(), |p, v| {
                p.max_depth = v.as_usize("max_depth")?;
                Ok(())
            })
            .field("mtries", |p| p.mtries.into(), |p, v| {
                p.mtries = v.as_i64("mtries")?;
                Ok(())
            })
            .field("sample_rate", |p| p.sample_rate.into(), |p, v| {
                p.sample_rate = v.as_f64("sample_rate")?;
                Ok(())
            })
    }
}

fn create_space(per_param: usize) -> HyperSpace {
    HyperSpace::new()
        .with_param("ntrees", (1..=per_param as i64).map(|i| i * 10).collect::<Vec<_>>())
        .with_param("max_depth", (1..=per_param as i64).collect::<Vec<_>>())
        .with_param("mtries", (1..=per_param as i64).collect::<Vec<_>>())
        .with_param(
            "sample_rate",
            (1..=per_param).map(|i| i as f64 / per_param as f64).collect::<Vec<_>>(),
        )
}

fn walk(walker: &dyn HyperSpaceWalker<ForestParams>) -> usize {
    let mut it = walker.iterator();
    let mut n = 0;
    while let Some(point) = it.next_point() {
        black_box(&point);
        n += 1;
    }
    n
}

fn bench_walkers(c: &mut Criterion) {
    let mut group = c.benchmark_group("walkers");

    for per_param in [4, 8].iter() {
        let space = create_space(*per_param);
        let cartesian = create_walker(
            ForestParams::default(),
            space.clone(),
            SearchCriteria::cartesian(),
            FieldNaming::Consistent,
        )
        .unwrap();
        let random = create_walker(
            ForestParams::default(),
            space,
            SearchCriteria::random_discrete(42),
            FieldNaming::Consistent,
        )
        .unwrap();

        group.bench_with_input(BenchmarkId::new("cartesian", per_param), &cartesian, |b, w| {
            b.iter(|| walk(&**w))
        });
        group.bench_with_input(BenchmarkId::new("random", per_param), &random, |b, w| {
            b.iter(|| walk(&**w))
        });
    }

    group.finish();
}

fn bench_build_and_fingerprint(c: &mut Criterion) {
    let walker = create_walker(
        ForestParams::default(),
        create_space(6),
        SearchCriteria::cartesian(),
        FieldNaming::Consistent,
    )
    .unwrap();
    let mut it = walker.iterator();
    let mut points = Vec::new();
    while let Some(point) = it.next_point() {
        points.push(point);
    }
    let fingerprinter = FieldFingerprinter::<ForestParams>::new();

    c.bench_function("build_params", |b| {
        b.iter(|| {
            for point in &points {
                black_box(walker.build_params(point).unwrap());
            }
        })
    });

    let configs: Vec<ForestParams> = points
        .iter()
        .map(|p| walker.build_params(p).unwrap())
        .collect();
    c.bench_function("fingerprint", |b| {
        b.iter(|| {
            for params in &configs {
                black_box(fingerprinter.fingerprint(params));
            }
        })
    });
}

criterion_group!(benches, bench_walkers, bench_build_and_fingerprint);
criterion_main!(benches);
