//! The semantic model supplied by a frontend.
//!
//! The extractor does not parse or resolve anything itself. A frontend dumps the
//! symbols it resolved, the syntax trees they were declared in, and the
//! assemblies they belong to; the extractor only reads this model.
//!
//! Symbols refer to each other by [`SymbolId`], which is an index into
//! [`SemanticModel::symbols`].

use crate::error::{ExtractionError, Result};
use normalize_trap_core::{SymbolId, TreeId};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Symbol kind classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Namespace,
    Class,
    Struct,
    Interface,
    Enum,
    Delegate,
    Pointer,
    Method,
    Constructor,
    Accessor,
    /// A type the frontend could not resolve
    Error,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Namespace => "namespace",
            SymbolKind::Class => "class",
            SymbolKind::Struct => "struct",
            SymbolKind::Interface => "interface",
            SymbolKind::Enum => "enum",
            SymbolKind::Delegate => "delegate",
            SymbolKind::Pointer => "pointer",
            SymbolKind::Method => "method",
            SymbolKind::Constructor => "constructor",
            SymbolKind::Accessor => "accessor",
            SymbolKind::Error => "error",
        }
    }

    /// Numeric kind written to `types` facts.
    pub fn type_kind(&self) -> Option<i64> {
        match self {
            SymbolKind::Class => Some(1),
            SymbolKind::Struct => Some(2),
            SymbolKind::Interface => Some(3),
            SymbolKind::Enum => Some(4),
            SymbolKind::Delegate => Some(5),
            SymbolKind::Pointer => Some(6),
            SymbolKind::Error => Some(7),
            _ => None,
        }
    }

    pub fn is_type(&self) -> bool {
        self.type_kind().is_some()
    }

    pub fn is_method(&self) -> bool {
        matches!(
            self,
            SymbolKind::Method | SymbolKind::Constructor | SymbolKind::Accessor
        )
    }
}

/// A span within a syntax tree (1-indexed lines and columns).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

/// A declared location of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolLocation {
    pub tree: TreeId,
    #[serde(flatten)]
    pub span: SourceSpan,
}

/// A method parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: SymbolId,
}

/// A resolved symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    #[serde(default)]
    pub containing_namespace: Option<SymbolId>,
    #[serde(default)]
    pub containing_type: Option<SymbolId>,
    #[serde(default)]
    pub containing_assembly: Option<String>,
    #[serde(default)]
    pub locations: Vec<SymbolLocation>,
    /// The generic definition this symbol was constructed from (absent = itself)
    #[serde(default)]
    pub original_definition: Option<SymbolId>,
    #[serde(default)]
    pub type_arguments: Vec<SymbolId>,
    #[serde(default)]
    pub members: Vec<SymbolId>,
    /// Pointee of a pointer type
    #[serde(default)]
    pub pointed_at: Option<SymbolId>,
    #[serde(default)]
    pub return_type: Option<SymbolId>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// Property or event an accessor belongs to
    #[serde(default)]
    pub associated_symbol: Option<SymbolId>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind) -> Self {
        Self {
            name: name.into(),
            kind,
            containing_namespace: None,
            containing_type: None,
            containing_assembly: None,
            locations: Vec::new(),
            original_definition: None,
            type_arguments: Vec::new(),
            members: Vec::new(),
            pointed_at: None,
            return_type: None,
            parameters: Vec::new(),
            associated_symbol: None,
        }
    }

    /// The global namespace is the namespace without a parent.
    pub fn is_global_namespace(&self) -> bool {
        self.kind == SymbolKind::Namespace && self.containing_namespace.is_none()
    }
}

/// A source file known to the frontend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxTree {
    pub path: String,
    #[serde(default)]
    pub lines: u32,
    /// Symbols declared at the top level of this tree, in source order.
    #[serde(default)]
    pub members: Vec<SymbolId>,
}

/// A compiled unit symbols can belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyInfo {
    pub name: String,
    pub path: String,
}

/// How the frontend was invoked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilationInfo {
    pub cwd: String,
    pub args: Vec<String>,
    pub references: Vec<String>,
}

/// Everything the frontend resolved for one compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticModel {
    pub compilation: CompilationInfo,
    pub assemblies: Vec<AssemblyInfo>,
    pub trees: Vec<SyntaxTree>,
    pub symbols: Vec<Symbol>,
}

impl SemanticModel {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn symbol(&self, id: SymbolId) -> Result<&Symbol> {
        self.symbols
            .get(id.0 as usize)
            .ok_or(ExtractionError::UnknownSymbol(id))
    }

    pub fn tree(&self, id: TreeId) -> Result<&SyntaxTree> {
        self.trees
            .get(id.0 as usize)
            .ok_or(ExtractionError::UnknownTree(id))
    }

    pub fn tree_ids(&self) -> impl Iterator<Item = TreeId> + '_ {
        (0..self.trees.len() as u32).map(TreeId)
    }

    pub fn assembly(&self, name: &str) -> Option<&AssemblyInfo> {
        self.assemblies.iter().find(|a| a.name == name)
    }

    /// Symbols whose containing assembly is `name`, in model order.
    pub fn assembly_symbols<'a>(&'a self, name: &'a str) -> impl Iterator<Item = SymbolId> + 'a {
        self.symbols
            .iter()
            .enumerate()
            .filter(move |(_, s)| s.containing_assembly.as_deref() == Some(name))
            .map(|(i, _)| SymbolId(i as u32))
    }

    /// Add a symbol, returning its id. Used by frontends building a model in memory.
    pub fn add_symbol(&mut self, symbol: Symbol) -> SymbolId {
        self.symbols.push(symbol);
        SymbolId(self.symbols.len() as u32 - 1)
    }

    pub fn add_tree(&mut self, tree: SyntaxTree) -> TreeId {
        self.trees.push(tree);
        TreeId(self.trees.len() as u32 - 1)
    }

    /// Fully qualified display name, e.g. `System.Collections.List<System.Int32>`.
    ///
    /// A symbol that refers back to itself through its parents, pointee or
    /// type arguments is shown by id at the point where the cycle closes.
    pub fn display_name(&self, id: SymbolId) -> String {
        self.display_name_on(id, &mut Vec::new())
    }

    fn display_name_on(&self, id: SymbolId, path: &mut Vec<SymbolId>) -> String {
        if path.contains(&id) {
            return id.to_string();
        }
        let Ok(symbol) = self.symbol(id) else {
            return id.to_string();
        };
        path.push(id);
        let mut name = match (symbol.containing_type, symbol.containing_namespace) {
            (Some(parent), _) => format!("{}.{}", self.display_name_on(parent, path), symbol.name),
            (None, Some(ns)) if !self.symbol(ns).is_ok_and(|n| n.is_global_namespace()) => {
                format!("{}.{}", self.display_name_on(ns, path), symbol.name)
            }
            _ => symbol.name.clone(),
        };
        if symbol.kind == SymbolKind::Pointer
            && let Some(pointee) = symbol.pointed_at
        {
            name = format!("{}*", self.display_name_on(pointee, path));
        }
        if !symbol.type_arguments.is_empty() {
            let args: Vec<String> = symbol
                .type_arguments
                .iter()
                .map(|a| self.display_name_on(*a, path))
                .collect();
            name = format!("{}<{}>", name, args.join(", "));
        }
        path.pop();
        name
    }

    /// Declared locations as `path:line:col`, for diagnostics.
    pub fn describe_locations(&self, id: SymbolId) -> Vec<String> {
        let Ok(symbol) = self.symbol(id) else {
            return Vec::new();
        };
        symbol
            .locations
            .iter()
            .map(|loc| {
                let path = self
                    .tree(loc.tree)
                    .map(|t| t.path.as_str())
                    .unwrap_or("<unknown>");
                format!("{}:{}:{}", path, loc.span.start_line, loc.span.start_column)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SemanticModel {
        SemanticModel::from_json(
            r#"{
                "trees": [{ "path": "src/a.cs", "lines": 10, "members": [1] }],
                "symbols": [
                    { "name": "", "kind": "namespace" },
                    { "name": "Demo", "kind": "namespace", "containing_namespace": 0 },
                    { "name": "Box", "kind": "class", "containing_namespace": 1,
                      "locations": [{ "tree": 0, "start_line": 3, "start_column": 5, "end_line": 8, "end_column": 1 }] },
                    { "name": "Int32", "kind": "struct", "containing_namespace": 0 },
                    { "name": "Box", "kind": "class", "containing_namespace": 1,
                      "original_definition": 2, "type_arguments": [3] }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_lookup() {
        let model = sample();
        assert_eq!(model.symbol(SymbolId(2)).unwrap().name, "Box");
        assert!(matches!(
            model.symbol(SymbolId(99)),
            Err(ExtractionError::UnknownSymbol(SymbolId(99)))
        ));
        assert_eq!(model.tree(TreeId(0)).unwrap().lines, 10);
    }

    #[test]
    fn test_display_name() {
        let model = sample();
        assert_eq!(model.display_name(SymbolId(2)), "Demo.Box");
        assert_eq!(model.display_name(SymbolId(4)), "Demo.Box<Int32>");
    }

    #[test]
    fn test_display_name_stops_at_cycles() {
        let model = SemanticModel::from_json(
            r#"{
                "symbols": [
                    { "name": "Outer", "kind": "class", "containing_type": 1 },
                    { "name": "Inner", "kind": "class", "containing_type": 0 },
                    { "name": "Self", "kind": "class", "type_arguments": [2, 2] },
                    { "name": "", "kind": "pointer", "pointed_at": 3 }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(model.display_name(SymbolId(0)), "symbol 0.Inner.Outer");
        assert_eq!(model.display_name(SymbolId(2)), "Self<symbol 2, symbol 2>");
        assert_eq!(model.display_name(SymbolId(3)), "symbol 3*");
    }

    #[test]
    fn test_describe_locations() {
        let model = sample();
        assert_eq!(model.describe_locations(SymbolId(2)), vec!["src/a.cs:3:5"]);
        assert!(model.describe_locations(SymbolId(3)).is_empty());
    }

    #[test]
    fn test_global_namespace() {
        let model = sample();
        assert!(model.symbol(SymbolId(0)).unwrap().is_global_namespace());
        assert!(!model.symbol(SymbolId(1)).unwrap().is_global_namespace());
    }

    #[test]
    fn test_invalid_model() {
        let err = SemanticModel::from_json("{\"symbols\": 3}").unwrap_err();
        assert!(matches!(err, ExtractionError::Model(_)));
    }
}
