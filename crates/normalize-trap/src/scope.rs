//! Extraction scopes: which symbols and files an output unit owns.
//!
//! Generally a symbol has an affinity with exactly one trap file, so that trap
//! files do not repeat each other. Constructed generics are the exception and
//! are handled by `Context::defines`.

use crate::model::Symbol;
use normalize_trap_core::TreeId;

/// Symbols belonging to one compiled assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyScope {
    pub assembly: String,
    pub path: String,
}

/// Symbols declared in one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceScope {
    pub tree: TreeId,
    pub path: String,
}

/// The scope of the unit being extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionScope {
    Assembly(AssemblyScope),
    Source(SourceScope),
}

impl ExtractionScope {
    pub fn assembly(assembly: impl Into<String>, path: impl Into<String>) -> Self {
        ExtractionScope::Assembly(AssemblyScope {
            assembly: assembly.into(),
            path: path.into(),
        })
    }

    pub fn source(tree: TreeId, path: impl Into<String>) -> Self {
        ExtractionScope::Source(SourceScope {
            tree,
            path: path.into(),
        })
    }

    /// Whether the symbol belongs in this unit's trap file.
    pub fn in_scope(&self, symbol: &Symbol) -> bool {
        match self {
            ExtractionScope::Assembly(scope) => {
                symbol.containing_assembly.as_deref() == Some(scope.assembly.as_str())
            }
            ExtractionScope::Source(scope) => {
                symbol.locations.iter().any(|loc| loc.tree == scope.tree)
            }
        }
    }

    /// Whether the file belongs in this unit's trap file.
    pub fn in_file_scope(&self, path: &str) -> bool {
        match self {
            ExtractionScope::Assembly(scope) => scope.path == path,
            ExtractionScope::Source(scope) => scope.path == path,
        }
    }

    pub fn is_assembly(&self) -> bool {
        matches!(self, ExtractionScope::Assembly(_))
    }
}
