//! Core data model: nodes, edges, and the canonical id scheme.
//!
//! This module defines the vocabulary every other layer speaks: the graph
//! extracted from source files (`NodeKind`/`EdgeKind`), the canonical id
//! scheme that ties a node's identity to its file path and symbol path, and
//! the small value types (`Location`, `Visibility`, `Param`) shared by the
//! node-specific field sets.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Kind discriminator for a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    File,
    Function,
    Class,
    Method,
    Interface,
    TypeAlias,
    Variable,
    Property,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "File",
            Self::Function => "Function",
            Self::Class => "Class",
            Self::Method => "Method",
            Self::Interface => "Interface",
            Self::TypeAlias => "TypeAlias",
            Self::Variable => "Variable",
            Self::Property => "Property",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "File" => Self::File,
            "Function" => Self::Function,
            "Class" => Self::Class,
            "Method" => Self::Method,
            "Interface" => Self::Interface,
            "TypeAlias" => Self::TypeAlias,
            "Variable" => Self::Variable,
            "Property" => Self::Property,
            _ => return None,
        })
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind discriminator for a graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    Contains,
    Imports,
    Calls,
    References,
    Extends,
    Implements,
    UsesType,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "CONTAINS",
            Self::Imports => "IMPORTS",
            Self::Calls => "CALLS",
            Self::References => "REFERENCES",
            Self::Extends => "EXTENDS",
            Self::Implements => "IMPLEMENTS",
            Self::UsesType => "USES_TYPE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "CONTAINS" => Self::Contains,
            "IMPORTS" => Self::Imports,
            "CALLS" => Self::Calls,
            "REFERENCES" => Self::References,
            "EXTENDS" => Self::Extends,
            "IMPLEMENTS" => Self::Implements,
            "USES_TYPE" => Self::UsesType,
            _ => return None,
        })
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical node id: `<filePath>:<Kind>:<symbolPath>`, with the file node
/// using an empty `symbolPath` (id = `filePath`).
pub fn make_id(file_path: &str, kind: NodeKind, symbol_path: &str) -> String {
    let file_path = normalize_path(file_path);
    if matches!(kind, NodeKind::File) {
        return file_path;
    }
    format!("{file_path}:{kind}:{symbol_path}")
}

/// Member id, e.g. `<file>:Method:<Class>.<name>`.
pub fn make_member_id(file_path: &str, kind: NodeKind, owner: &str, member: &str) -> String {
    make_id(file_path, kind, &format!("{owner}.{member}"))
}

/// Normalize a path to use forward slashes, as required for id stability
/// across platforms.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

pub fn path_to_rel_str(path: &Path) -> String {
    normalize_path(&path.to_string_lossy())
}

/// Split a canonical id back into `(file_path, kind, symbol_path)`. Used by
/// property tests to check id round-tripping (§8 invariant 5) and by the
/// query engine to resolve `file_path:Name` shorthand lookups.
pub fn parse_id(id: &str) -> Option<(String, NodeKind, String)> {
    let mut parts = id.splitn(3, ':');
    let file_path = parts.next()?.to_string();
    let kind_str = parts.next();
    let symbol_path = parts.next();
    match (kind_str, symbol_path) {
        (Some(k), Some(s)) => {
            let kind = NodeKind::parse(k)?;
            Some((file_path, kind, s.to_string()))
        }
        (None, None) => Some((file_path, NodeKind::File, String::new())),
        _ => None,
    }
}

/// A function/method parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub type_text: Option<String>,
}

/// Visibility of a class member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Private,
    Protected,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Protected => "protected",
        }
    }
}

/// Context discriminator for `REFERENCES` edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceContext {
    Callback,
    Property,
    Array,
    Return,
    Assignment,
    Access,
}

impl ReferenceContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Callback => "callback",
            Self::Property => "property",
            Self::Array => "array",
            Self::Return => "return",
            Self::Assignment => "assignment",
            Self::Access => "access",
        }
    }
}

/// Context discriminator for `USES_TYPE` edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeUseContext {
    Parameter,
    Return,
    Variable,
    Property,
}

impl TypeUseContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parameter => "parameter",
            Self::Return => "return",
            Self::Variable => "variable",
            Self::Property => "property",
        }
    }
}

/// Kind-specific fields, one variant per `NodeKind`. Stored as `extra_json`
/// in the persistent store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum NodeFields {
    File {
        extension: String,
    },
    Function {
        is_async: bool,
        params: Vec<Param>,
        return_type: Option<String>,
    },
    Class {
        extends: Option<String>,
        implements: Vec<String>,
    },
    Method {
        owner: String,
        visibility: Visibility,
        is_static: bool,
        is_async: bool,
        params: Vec<Param>,
        return_type: Option<String>,
    },
    Interface {
        extends: Vec<String>,
    },
    TypeAlias {
        aliased_type: String,
    },
    Variable {
        is_const: bool,
        type_text: Option<String>,
    },
    Property {
        owner: String,
        type_text: Option<String>,
        optional: bool,
        readonly: bool,
    },
}

impl NodeFields {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::File { .. } => NodeKind::File,
            Self::Function { .. } => NodeKind::Function,
            Self::Class { .. } => NodeKind::Class,
            Self::Method { .. } => NodeKind::Method,
            Self::Interface { .. } => NodeKind::Interface,
            Self::TypeAlias { .. } => NodeKind::TypeAlias,
            Self::Variable { .. } => NodeKind::Variable,
            Self::Property { .. } => NodeKind::Property,
        }
    }
}

/// One extracted graph node, ready for `DbWriter::add_nodes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub file_path: String,
    pub package: String,
    pub module: String,
    pub start_line: u32,
    pub end_line: u32,
    pub exported: bool,
    pub fields: NodeFields,
    pub content_hash: u64,
    pub snippet: String,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        self.fields.kind()
    }
}

/// A call-site line range, used to build `CALLS.callSites`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSiteRange {
    pub start_line: u32,
    pub end_line: u32,
}

/// Kind-specific edge attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum EdgeAttrs {
    Contains,
    Imports {
        type_only: bool,
        imported_symbols: Vec<String>,
    },
    Calls {
        call_count: u32,
        call_sites: Vec<CallSiteRange>,
    },
    References {
        context: ReferenceContext,
    },
    Extends,
    Implements,
    UsesType {
        context: TypeUseContext,
    },
}

impl EdgeAttrs {
    pub fn kind(&self) -> EdgeKind {
        match self {
            Self::Contains => EdgeKind::Contains,
            Self::Imports { .. } => EdgeKind::Imports,
            Self::Calls { .. } => EdgeKind::Calls,
            Self::References { .. } => EdgeKind::References,
            Self::Extends => EdgeKind::Extends,
            Self::Implements => EdgeKind::Implements,
            Self::UsesType { .. } => EdgeKind::UsesType,
        }
    }

    /// The discriminator used in the edges unique-constraint tuple
    /// `(source, target, kind, discriminator)`.
    pub fn discriminator(&self) -> String {
        match self {
            Self::References { context } => context.as_str().to_string(),
            Self::UsesType { context } => context.as_str().to_string(),
            _ => String::new(),
        }
    }
}

/// One extracted graph edge, ready for `DbWriter::add_edges`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub attrs: EdgeAttrs,
}

impl Edge {
    pub fn kind(&self) -> EdgeKind {
        self.attrs.kind()
    }
}

/// Source span location, used while extracting (not stored directly; it
/// contributes to a node's `start_line`/`end_line` and a snippet's content
/// hash).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_line: u32,
    pub end_line: u32,
}

impl Location {
    pub fn new(start_byte: usize, end_byte: usize, start_line: u32, end_line: u32) -> Self {
        Self {
            start_byte,
            end_byte,
            start_line,
            end_line,
        }
    }
}

/// A fully resolved target id plus the kind that was inferred for it by the
/// import map (§4.3 step 3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImport {
    pub target_id: String,
    pub local_name: String,
}

/// One parsed import declaration, prior to cross-file resolution.
#[derive(Debug, Clone)]
pub struct RawImport {
    pub specifier: String,
    pub type_only: bool,
    pub named: Vec<ImportedName>,
    pub default_name: Option<String>,
    pub namespace_name: Option<String>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct ImportedName {
    pub imported: String,
    pub local: String,
    pub type_only: bool,
}

pub fn path_extension(path: &PathBuf) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_default()
}
