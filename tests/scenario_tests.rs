//! Literal scenario tests from the query engine's testable-properties
//! list: a straight-line call chain across ten files, exercised through
//! ingestion and the public `query` tools end to end.

use omni_graph::config::ProjectConfig;
use omni_graph::ingest::{run_ingest, IngestOptions};
use omni_graph::query::{self, Endpoint, SearchIndex};
use omni_graph::store::Store;
use std::fs;
use std::path::Path;

fn write_deep_chain(root: &Path) {
    fs::write(
        root.join("step01.ts"),
        "import { step02 } from './step02';\nexport function entry() { step02(); }\n",
    )
    .unwrap();
    for n in 2..=10 {
        let this_fn = format!("step{n:02}");
        let body = if n < 10 {
            let next_fn = format!("step{:02}", n + 1);
            format!(
                "import {{ {next_fn} }} from './step{:02}';\nexport function {this_fn}() {{ {next_fn}(); }}\n",
                n + 1
            )
        } else {
            format!("export function {this_fn}() {{}}\n")
        };
        fs::write(root.join(format!("step{n:02}.ts")), body).unwrap();
    }
}

async fn index_deep_chain(root: &Path) -> Store {
    write_deep_chain(root);
    let config = ProjectConfig::single_package(root.to_path_buf());
    let store = Store::open(&root.join(".omni/graph.db")).unwrap();
    run_ingest(&config, &store, &IngestOptions::default()).await.unwrap();
    store
}

fn entry_id() -> String {
    omni_graph::types::make_id("step01.ts", omni_graph::types::NodeKind::Function, "entry")
}

fn step_id(n: u32) -> String {
    omni_graph::types::make_id(
        &format!("step{n:02}.ts"),
        omni_graph::types::NodeKind::Function,
        &format!("step{n:02}"),
    )
}

#[tokio::test]
async fn deep_chain_callees_reach_every_downstream_step() {
    let temp = tempfile::tempdir().unwrap();
    let store = index_deep_chain(temp.path()).await;
    let reader = store.reader().unwrap();
    let index = SearchIndex::build(&reader.all_nodes().unwrap());

    let result = query::forward_callees(&reader, &index, &Endpoint::Symbol(entry_id()), 10).unwrap();
    let ids: std::collections::HashSet<_> = result.nodes.iter().map(|n| n.id.clone()).collect();
    for n in 2..=10 {
        assert!(ids.contains(&step_id(n)), "missing step{n:02} in callees of entry");
    }
}

#[tokio::test]
async fn deep_chain_callees_respect_depth_bound() {
    let temp = tempfile::tempdir().unwrap();
    let store = index_deep_chain(temp.path()).await;
    let reader = store.reader().unwrap();
    let index = SearchIndex::build(&reader.all_nodes().unwrap());

    let result = query::forward_callees(&reader, &index, &Endpoint::Symbol(entry_id()), 3).unwrap();
    let ids: std::collections::HashSet<_> = result.nodes.iter().map(|n| n.id.clone()).collect();
    assert!(ids.contains(&step_id(2)));
    assert!(ids.contains(&step_id(3)));
    assert!(ids.contains(&step_id(4)));
    assert!(!ids.contains(&step_id(5)), "depth=3 should not reach step05");
}

#[tokio::test]
async fn deep_chain_callers_of_the_tail_include_every_upstream_step() {
    let temp = tempfile::tempdir().unwrap();
    let store = index_deep_chain(temp.path()).await;
    let reader = store.reader().unwrap();
    let index = SearchIndex::build(&reader.all_nodes().unwrap());

    let result = query::backward_callers(&reader, &index, &Endpoint::Symbol(step_id(10)), 10).unwrap();
    let ids: std::collections::HashSet<_> = result.nodes.iter().map(|n| n.id.clone()).collect();
    assert!(ids.contains(&entry_id()));
    for n in 2..=9 {
        assert!(ids.contains(&step_id(n)), "missing step{n:02} in callers of step10");
    }
}

#[tokio::test]
async fn deep_chain_path_from_entry_to_tail_has_ten_nodes() {
    let temp = tempfile::tempdir().unwrap();
    let store = index_deep_chain(temp.path()).await;
    let reader = store.reader().unwrap();
    let index = SearchIndex::build(&reader.all_nodes().unwrap());

    let result = query::find_path(
        &reader,
        &index,
        &Endpoint::Symbol(entry_id()),
        &Endpoint::Symbol(step_id(10)),
        None,
        10,
    )
    .unwrap();
    assert!(result.message.is_none(), "expected a path, got message: {:?}", result.message);
    assert_eq!(result.nodes.len(), 10);
    assert_eq!(result.edges.len(), 9);
    assert!(result.edges.iter().all(|e| e.kind() == omni_graph::types::EdgeKind::Calls));
}
