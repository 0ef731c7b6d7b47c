//! Handles into the frontend's program model.
//!
//! The extractor never owns frontend objects; it refers to them through these
//! indices and asks the frontend for their attributes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A symbol (namespace, type, method, ...) in the semantic model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolId(pub u32);

/// A syntax tree (one source file) in the semantic model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TreeId(pub u32);

/// A syntax node in the semantic model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "symbol {}", self.0)
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tree {}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {}", self.0)
    }
}

/// The identity of a frontend object, used by the reference cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceObject {
    Symbol(SymbolId),
    Tree(TreeId),
    Node(NodeId),
}

impl From<SymbolId> for SourceObject {
    fn from(id: SymbolId) -> Self {
        SourceObject::Symbol(id)
    }
}

impl From<TreeId> for SourceObject {
    fn from(id: TreeId) -> Self {
        SourceObject::Tree(id)
    }
}

impl From<NodeId> for SourceObject {
    fn from(id: NodeId) -> Self {
        SourceObject::Node(id)
    }
}
