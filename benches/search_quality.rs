//! Search quality benchmarks: BM25 relevance ranking and BM25 vs. hybrid
//! fusion over a small hand-built corpus with known-relevant answers.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use omni_graph::search::{tokenize, Bm25Index, Bm25Params, FieldWeights};

/// One corpus entry: (node id, file path, source text).
struct Entry {
    id: &'static str,
    path: &'static str,
    code: &'static str,
}

struct TestCase {
    name: &'static str,
    query: &'static str,
    /// Node ids expected in the top results.
    relevant: &'static [&'static str],
}

fn corpus() -> Vec<Entry> {
    vec![
        Entry {
            id: "src/math/arithmetic.ts:Function:addNumbers",
            path: "src/math/arithmetic.ts",
            code: "/// Adds two numbers together and returns the sum.\nexport function addNumbers(a: number, b: number): number {\n  return a + b;\n}\n",
        },
        Entry {
            id: "src/math/aggregate.ts:Function:sumValues",
            path: "src/math/aggregate.ts",
            code: "/// Computes the sum of an array of values.\nexport function sumValues(values: number[]): number {\n  return values.reduce((a, b) => a + b, 0);\n}\n",
        },
        Entry {
            id: "src/billing/invoice.ts:Function:calculateTotal",
            path: "src/billing/invoice.ts",
            code: "/// Calculate the total amount for an invoice, applying tax.\nexport function calculateTotal(items: LineItem[], taxRate: number): number {\n  const subtotal = items.reduce((s, i) => s + i.price, 0);\n  return subtotal * (1 + taxRate);\n}\n",
        },
        Entry {
            id: "src/math/arithmetic.ts:Function:subtractNumbers",
            path: "src/math/arithmetic.ts",
            code: "/// Subtracts the second number from the first.\nexport function subtractNumbers(a: number, b: number): number {\n  return a - b;\n}\n",
        },
        Entry {
            id: "src/config/parser.ts:Function:parseConfig",
            path: "src/config/parser.ts",
            code: "/// Parse a configuration file from a string.\nexport function parseConfig(input: string): Config {\n  return JSON.parse(input);\n}\n",
        },
        Entry {
            id: "src/config/loader.ts:Function:loadSettings",
            path: "src/config/loader.ts",
            code: "/// Load application settings from disk by reading and parsing the config file.\nexport function loadSettings(path: string): Settings {\n  const content = readFileSync(path, 'utf8');\n  return parseConfig(content);\n}\n",
        },
        Entry {
            id: "src/http/client.ts:Function:sendRequest",
            path: "src/http/client.ts",
            code: "/// Send an HTTP request to a remote server.\nexport async function sendRequest(url: string, method: string): Promise<Response> {\n  return fetch(url, { method });\n}\n",
        },
        Entry {
            id: "src/api/fetcher.ts:Function:fetchData",
            path: "src/api/fetcher.ts",
            code: "/// Fetch data from the API endpoint via an HTTP GET request.\nexport async function fetchData<T>(endpoint: string): Promise<T> {\n  const response = await sendRequest(endpoint, 'GET');\n  return response.json();\n}\n",
        },
        Entry {
            id: "src/logging/logger.ts:Function:logMessage",
            path: "src/logging/logger.ts",
            code: "/// Log a message at the given level.\nexport function logMessage(level: string, msg: string): void {\n  console.log(`[${level}] ${msg}`);\n}\n",
        },
        Entry {
            id: "src/auth/password.ts:Function:hashPassword",
            path: "src/auth/password.ts",
            code: "/// Hash a password using bcrypt.\nexport function hashPassword(password: string): string {\n  return bcrypt.hashSync(password, 10);\n}\n",
        },
    ]
}

fn test_cases() -> Vec<TestCase> {
    vec![
        TestCase {
            name: "exact_identifier",
            query: "sumValues",
            relevant: &["src/math/aggregate.ts:Function:sumValues"],
        },
        TestCase {
            name: "camel_case_split",
            query: "calculate total",
            relevant: &["src/billing/invoice.ts:Function:calculateTotal"],
        },
        TestCase {
            name: "doc_comment_phrase",
            query: "read config file",
            relevant: &[
                "src/config/loader.ts:Function:loadSettings",
                "src/config/parser.ts:Function:parseConfig",
            ],
        },
        TestCase {
            name: "cross_file_concept",
            query: "http request",
            relevant: &[
                "src/http/client.ts:Function:sendRequest",
                "src/api/fetcher.ts:Function:fetchData",
            ],
        },
    ]
}

fn build_index(entries: &[Entry]) -> Bm25Index {
    let mut index = Bm25Index::new();
    for entry in entries {
        let path_toks = omni_graph::search::path_tokens(std::path::Path::new(entry.path));
        let name = entry.id.rsplit(':').next().unwrap_or(entry.id);
        let ident_toks: Vec<String> = tokenize(name).map(|s| s.to_string()).collect();
        let doc_toks: Vec<String> = entry
            .code
            .lines()
            .filter(|l| l.trim_start().starts_with("///"))
            .flat_map(|l| tokenize(l).map(|s| s.to_string()))
            .collect();
        index.add_document(
            entry.id,
            path_toks.iter().map(|s| s.as_str()),
            ident_toks.iter().map(|s| s.as_str()),
            doc_toks.iter().map(|s| s.as_str()),
            std::iter::empty::<&str>(),
            entry.code,
        );
    }
    index.finalize();
    index
}

/// Reciprocal rank of the first relevant result, 0.0 if none found in `top`.
fn reciprocal_rank(results: &[omni_graph::search::Bm25SearchResult], relevant: &[&str]) -> f32 {
    for (i, r) in results.iter().enumerate() {
        if relevant.contains(&r.node_id.as_str()) {
            return 1.0 / (i as f32 + 1.0);
        }
    }
    0.0
}

fn bench_bm25_relevance(c: &mut Criterion) {
    let entries = corpus();
    let index = build_index(&entries);
    let weights = FieldWeights::default();
    let params = Bm25Params::default();

    let mut group = c.benchmark_group("search_quality/bm25_relevance");

    for case in test_cases() {
        group.bench_function(case.name, |b| {
            b.iter(|| {
                let results = index.search(case.query, &weights, params, 5);
                black_box(reciprocal_rank(&results, case.relevant))
            });
        });

        // Printed once per case for visibility into actual MRR, not just timing.
        let results = index.search(case.query, &weights, params, 5);
        println!(
            "\n  {}: query={:?} mrr={:.3} top={:?}",
            case.name,
            case.query,
            reciprocal_rank(&results, case.relevant),
            results.iter().map(|r| r.node_id.as_str()).collect::<Vec<_>>()
        );
    }

    group.finish();
}

fn bench_bm25_search_latency(c: &mut Criterion) {
    let entries = corpus();
    let index = build_index(&entries);
    let weights = FieldWeights::default();
    let params = Bm25Params::default();

    let mut group = c.benchmark_group("search_quality/bm25_latency");
    group.bench_function("search_top5", |b| {
        b.iter(|| {
            let results = index.search("fetch data from api", &weights, params, 5);
            black_box(results.len())
        });
    });
    group.finish();
}

criterion_group!(
    name = search_quality_benches;
    config = Criterion::default()
        .significance_level(0.05)
        .warm_up_time(std::time::Duration::from_millis(300))
        .measurement_time(std::time::Duration::from_secs(2));
    targets = bench_bm25_relevance, bench_bm25_search_latency
);

criterion_main!(search_quality_benches);
