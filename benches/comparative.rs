//! Benchmarks for multi-package ingestion and the cross-package queries
//! (impact, find_path) that only become expensive once a project has more
//! than one package to resolve imports across.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use omni_graph::config::{PackageConfig, ProjectConfig};
use omni_graph::ingest::{run_ingest, IngestOptions};
use omni_graph::query::{self, Endpoint, SearchIndex};
use omni_graph::store::Store;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Builds a monorepo with `num_packages` packages, each depending on the
/// previous one (`pkgN` imports from `pkgN-1`), so a query crossing all
/// packages has to walk the full chain.
fn create_monorepo(num_packages: usize, fns_per_package: usize) -> (TempDir, ProjectConfig) {
    let temp = TempDir::new().expect("failed to create temp dir");
    let mut packages = Vec::with_capacity(num_packages);

    for p in 0..num_packages {
        let pkg_dir = format!("pkg{p}");
        fs::create_dir_all(temp.path().join(&pkg_dir)).unwrap();

        let mut code = String::new();
        if p > 0 {
            code.push_str(&format!("import {{ fn{}_0 }} from '../pkg{}/index';\n", p - 1, p - 1));
        }
        for i in 0..fns_per_package {
            if p > 0 && i == 0 {
                code.push_str(&format!("export function fn{p}_{i}(): number {{\n  return fn{}_0();\n}}\n\n", p - 1));
            } else {
                code.push_str(&format!("export function fn{p}_{i}(): number {{\n  return {i};\n}}\n\n"));
            }
        }
        fs::write(temp.path().join(&pkg_dir).join("index.ts"), code).unwrap();

        packages.push(PackageConfig {
            name: format!("pkg{p}"),
            root: PathBuf::from(&pkg_dir),
            tsconfig_path: None,
        });
    }

    let config = ProjectConfig {
        packages,
        modules: Default::default(),
        config_root: temp.path().to_path_buf(),
    };
    (temp, config)
}

fn rt() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap()
}

fn bench_monorepo_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("comparative/monorepo_ingest");
    group.sample_size(10);

    for packages in [2, 5, 10, 20] {
        let (temp, config) = create_monorepo(packages, 10);
        group.throughput(Throughput::Elements((packages * 10) as u64));
        let label = format!("{packages}pkgs");

        group.bench_with_input(BenchmarkId::new("ingest", &label), &(temp, config), |b, (temp, config)| {
            b.iter(|| {
                let db_path = temp.path().join(format!(".omni/bench-{}.db", unique_suffix()));
                let store = Store::open(&db_path).unwrap();
                let runtime = rt();
                let report = runtime
                    .block_on(run_ingest(config, &store, &IngestOptions::default()))
                    .unwrap();
                black_box(report.parsed_files)
            });
        });
    }

    group.finish();
}

fn unique_suffix() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

fn bench_cross_package_impact(c: &mut Criterion) {
    let mut group = c.benchmark_group("comparative/cross_package_impact");
    group.sample_size(10);

    for packages in [5, 10, 20, 40] {
        let (temp, config) = create_monorepo(packages, 10);
        let store = Store::open(&temp.path().join(".omni/graph.db")).unwrap();
        let runtime = rt();
        runtime.block_on(run_ingest(&config, &store, &IngestOptions::default())).unwrap();
        let reader = store.reader().unwrap();
        let index = SearchIndex::build(&reader.all_nodes().unwrap());
        let label = format!("{packages}pkgs");

        group.bench_with_input(BenchmarkId::new("impact", &label), &(), |b, ()| {
            b.iter(|| {
                let endpoint = Endpoint::Symbol("fn0_0".to_string());
                let result = query::impact(&reader, &index, &endpoint, None, query::DEFAULT_MAX_DEPTH);
                black_box(result.is_ok())
            });
        });
    }

    group.finish();
}

criterion_group!(
    name = comparative_benches;
    config = Criterion::default()
        .significance_level(0.05)
        .warm_up_time(std::time::Duration::from_millis(500))
        .measurement_time(std::time::Duration::from_secs(3));
    targets = bench_monorepo_ingest, bench_cross_package_impact
);

criterion_main!(comparative_benches);
