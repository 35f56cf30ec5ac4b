use omni_graph::parsing::typescript::TypeScriptParser;
use omni_graph::parsing::LanguageParser;
use omni_graph::types::{make_id, NodeKind};

fn parse(source: &str) -> omni_graph::parsing::ParsedFile {
    TypeScriptParser::new_typescript()
        .parse(source, "src/alpha.ts", "root", "root")
        .expect("parse should succeed")
}

#[test]
fn typescript_parser_language_reusable() {
    let parser = TypeScriptParser::new_typescript();
    let _ = parser.language();
    let _ = parser.language();
}

#[test]
fn node_ids_are_workspace_relative_path_scoped() {
    let parsed = parse("export function greet() { return 'hi'; }\n");
    let expected = make_id("src/alpha.ts", NodeKind::Function, "greet");
    assert!(
        parsed.nodes.iter().any(|n| n.id == expected),
        "expected a node with id {expected:?}, got: {:?}",
        parsed.nodes.iter().map(|n| &n.id).collect::<Vec<_>>()
    );
}

#[test]
fn computed_string_property_call_uses_literal_name() {
    let parsed = parse("function run() {\n  obj[\"foo-bar\"]();\n}\n");
    assert!(
        parsed.calls.iter().any(|c| c.callee_text == "foo-bar"),
        "expected computed property call to resolve to its literal name, got: {:?}",
        parsed.calls.iter().map(|c| &c.callee_text).collect::<Vec<_>>()
    );
}

#[test]
fn tsx_files_parse_with_the_tsx_grammar() {
    let parsed = TypeScriptParser::new_tsx()
        .parse("export function Widget() { return <div />; }\n", "src/widget.tsx", "root", "root")
        .expect("tsx parse should succeed");
    assert!(parsed.nodes.iter().any(|n| n.name == "Widget"));
}
