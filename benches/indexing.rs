//! Benchmarks for the indexing and query engine.
//!
//! ## Parsing
//! - Single file parsing latency vs raw tree-sitter
//!
//! ## Full Indexing
//! - Repository ingestion throughput, scaling with repo size
//!
//! ## Incremental Updates
//! - Single file re-index latency after a no-op and a real change
//!
//! ## Query Performance
//! - Symbol lookup by name, forward/backward call traversal
//!
//! ## Infrastructure
//! - File discovery scaling

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use omni_graph::config::ProjectConfig;
use omni_graph::discovery::FileDiscovery;
use omni_graph::ingest::{run_ingest, IngestOptions};
use omni_graph::store::Store;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use tree_sitter::Parser;

// ============================================================================
// Test Fixture Generation
// ============================================================================

/// Generates a realistic TypeScript source file. Returns (code, estimated
/// symbol count = functions + classes + class methods).
fn generate_ts_file(num_functions: usize, num_classes: usize, lines_per_fn: usize) -> (String, usize) {
    let mut code = String::with_capacity(num_functions * lines_per_fn * 40);

    code.push_str("// Generated benchmark module\n\n");

    for i in 0..num_classes {
        code.push_str(&format!(
            "export class BenchClass{i} {{\n  field{i}: number;\n\n  constructor() {{\n    this.field{i} = 0;\n  }}\n\n  getField(): number {{\n    return this.field{i};\n  }}\n\n  setField(value: number): void {{\n    this.field{i} = value;\n  }}\n}}\n\n"
        ));
    }

    for i in 0..num_functions {
        code.push_str(&format!("export function benchFunction{i}(input: number): number {{\n"));
        for j in 0..lines_per_fn {
            if j == 0 {
                code.push_str("  let result = input;\n");
            } else if j == lines_per_fn - 1 {
                code.push_str("  return result;\n");
            } else {
                code.push_str(&format!("  result = result + {};\n", j % 100));
            }
        }
        code.push_str("}\n\n");
    }

    code.push_str("export function integrationTest(): number {\n  let sum = 0;\n");
    for i in 0..num_functions.min(10) {
        code.push_str(&format!("  sum += benchFunction{i}(sum);\n"));
    }
    code.push_str("  return sum;\n}\n");

    let class_methods = num_classes * 2; // getField + setField (constructor excluded)
    let total_symbols = num_functions + num_classes + class_methods + 1;
    (code, total_symbols)
}

fn create_test_repo(num_files: usize, symbols_per_file: usize) -> (TempDir, usize) {
    let temp = TempDir::new().expect("failed to create temp dir");
    let mut total_symbols = 0;

    for i in 0..num_files {
        let funcs = symbols_per_file / 2;
        let classes = symbols_per_file / 6;
        let (code, syms) = generate_ts_file(funcs, classes, 10);
        total_symbols += syms;
        fs::write(temp.path().join(format!("module_{i}.ts")), code).unwrap();
    }

    (temp, total_symbols)
}

fn rt() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

// ============================================================================
// Parsing Benchmarks
// ============================================================================

fn bench_single_file_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("parsing/single_file");

    let file_configs = [
        (10, 5, 10, "small"),
        (50, 20, 15, "medium"),
        (100, 40, 20, "large"),
    ];

    for (funcs, classes, lines, label) in file_configs {
        let (code, symbol_count) = generate_ts_file(funcs, classes, lines);
        group.throughput(Throughput::Bytes(code.len() as u64));

        group.bench_with_input(BenchmarkId::new("tree_sitter_parse", label), &code, |b, code| {
            let mut parser = Parser::new();
            parser
                .set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
                .unwrap();
            b.iter(|| {
                let tree = parser.parse(code, None).unwrap();
                black_box(tree.root_node().child_count())
            });
        });

        group.bench_with_input(BenchmarkId::new("omni_parse", label), &code, |b, code| {
            use omni_graph::parsing::typescript::TypeScriptParser;
            use omni_graph::parsing::LanguageParser;
            let parser = TypeScriptParser::new_typescript();
            b.iter(|| {
                let parsed = parser.parse(code, "module.ts", "root", "root").unwrap();
                black_box(parsed.nodes.len())
            });
        });

        println!("\n  {label} file: {} bytes, ~{symbol_count} symbols", code.len());
    }

    group.finish();
}

// ============================================================================
// Full Indexing Benchmarks
// ============================================================================

fn bench_full_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("indexing/full_repo");
    group.sample_size(10);

    let repo_configs = [(5, 30, "tiny"), (10, 50, "small"), (25, 80, "medium"), (50, 100, "large")];

    for (files, symbols_per_file, label) in repo_configs {
        let (temp, total_symbols) = create_test_repo(files, symbols_per_file);
        group.throughput(Throughput::Elements(total_symbols as u64));

        group.bench_with_input(BenchmarkId::new("ingest", label), &temp, |b, temp| {
            let config = ProjectConfig::single_package(temp.path().to_path_buf());
            b.iter(|| {
                let db_path = temp.path().join(format!(".omni/bench-{}.db", fastrand_like()));
                let store = Store::open(&db_path).unwrap();
                let runtime = rt();
                let report = runtime
                    .block_on(run_ingest(&config, &store, &IngestOptions::default()))
                    .unwrap();
                black_box(report.parsed_files)
            });
        });

        println!("\n  {label} repo: {files} files, ~{total_symbols} symbols");
    }

    group.finish();
}

/// Cheap unique suffix without reaching for a real RNG crate dependency
/// just for benchmark scratch-file naming.
fn fastrand_like() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

// ============================================================================
// Incremental Update Benchmarks
// ============================================================================

fn bench_incremental_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("indexing/incremental");
    group.sample_size(30);

    let (temp, _) = create_test_repo(20, 50);
    let config = ProjectConfig::single_package(temp.path().to_path_buf());
    let store = Store::open(&temp.path().join(".omni/graph.db")).unwrap();
    let runtime = rt();
    runtime
        .block_on(run_ingest(&config, &store, &IngestOptions::default()))
        .unwrap();

    // Unchanged repo: every file should be skipped via the manifest fingerprint.
    group.bench_function("reindex_no_changes", |b| {
        b.iter(|| {
            let report = runtime
                .block_on(run_ingest(&config, &store, &IngestOptions::default()))
                .unwrap();
            black_box(report.skipped_files)
        });
    });

    // One file touched: only that file should re-parse.
    let touched = temp.path().join("module_5.ts");
    group.bench_function("reindex_one_changed_file", |b| {
        b.iter(|| {
            let (code, _) = generate_ts_file(30, 8, 10);
            fs::write(&touched, code).unwrap();
            let report = runtime
                .block_on(run_ingest(&config, &store, &IngestOptions::default()))
                .unwrap();
            black_box(report.parsed_files)
        });
    });

    group.finish();
}

// ============================================================================
// Query Performance Benchmarks
// ============================================================================

fn bench_symbol_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("query/symbol_lookup");

    let (temp, _) = create_test_repo(30, 100);
    let config = ProjectConfig::single_package(temp.path().to_path_buf());
    let store = Store::open(&temp.path().join(".omni/graph.db")).unwrap();
    let runtime = rt();
    runtime
        .block_on(run_ingest(&config, &store, &IngestOptions::default()))
        .unwrap();
    let reader = store.reader().unwrap();

    group.bench_function("find_by_name_exact", |b| {
        b.iter(|| {
            let results = reader.find_by_name("benchFunction5").unwrap();
            black_box(results.len())
        });
    });

    group.bench_function("find_by_name_common", |b| {
        b.iter(|| {
            let results = reader.find_by_name("integrationTest").unwrap();
            black_box(results.len())
        });
    });

    group.bench_function("forward_callees", |b| {
        b.iter(|| {
            let results = reader
                .forward_callees("module_0.ts:Function:integrationTest", 100)
                .unwrap();
            black_box(results.len())
        });
    });

    group.bench_function("all_nodes", |b| {
        b.iter(|| {
            let nodes = reader.all_nodes().unwrap();
            black_box(nodes.len())
        });
    });

    group.finish();
}

fn bench_search_index_build(c: &mut Criterion) {
    use omni_graph::query::SearchIndex;

    let mut group = c.benchmark_group("query/search_index");
    group.sample_size(20);

    for files in [10, 30, 50] {
        let (temp, _) = create_test_repo(files, 50);
        let config = ProjectConfig::single_package(temp.path().to_path_buf());
        let store = Store::open(&temp.path().join(".omni/graph.db")).unwrap();
        let runtime = rt();
        runtime
            .block_on(run_ingest(&config, &store, &IngestOptions::default()))
            .unwrap();
        let reader = store.reader().unwrap();
        let nodes = reader.all_nodes().unwrap();
        let label = format!("{files}files");

        group.bench_with_input(BenchmarkId::new("build", &label), &nodes, |b, nodes| {
            b.iter(|| black_box(SearchIndex::build(nodes)));
        });
    }

    group.finish();
}

// ============================================================================
// Infrastructure Benchmarks
// ============================================================================

fn bench_file_discovery(c: &mut Criterion) {
    let mut group = c.benchmark_group("infrastructure/discovery");

    for files in [20, 50, 100] {
        let (temp, _) = create_test_repo(files, 30);
        let label = format!("{files}files");

        group.bench_with_input(BenchmarkId::new("discover", &label), &temp, |b, temp| {
            b.iter(|| {
                let discovery = FileDiscovery::new();
                let files = discovery.discover(temp.path()).unwrap();
                black_box(files.len())
            });
        });
    }

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(
    name = parsing_benches;
    config = Criterion::default()
        .significance_level(0.05)
        .noise_threshold(0.02)
        .warm_up_time(std::time::Duration::from_millis(500))
        .measurement_time(std::time::Duration::from_secs(3));
    targets = bench_single_file_parsing
);

criterion_group!(
    name = indexing_benches;
    config = Criterion::default()
        .significance_level(0.05)
        .sample_size(10)
        .warm_up_time(std::time::Duration::from_millis(500))
        .measurement_time(std::time::Duration::from_secs(5));
    targets = bench_full_index, bench_incremental_update
);

criterion_group!(
    name = query_benches;
    config = Criterion::default()
        .significance_level(0.05)
        .warm_up_time(std::time::Duration::from_millis(300))
        .measurement_time(std::time::Duration::from_secs(2));
    targets = bench_symbol_lookup, bench_search_index_build
);

criterion_group!(
    name = infra_benches;
    config = Criterion::default()
        .significance_level(0.05)
        .warm_up_time(std::time::Duration::from_millis(200))
        .measurement_time(std::time::Duration::from_secs(2));
    targets = bench_file_discovery
);

criterion_main!(parsing_benches, indexing_benches, query_benches, infra_benches);
