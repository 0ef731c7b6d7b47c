//! Errors raised while extracting an output unit.

use normalize_trap_core::{NodeId, SymbolId, TreeId};

/// Error that can occur while creating or populating entities.
///
/// Most variants are recoverable: the scheduler reports them and moves on to
/// the next entity. [`ExtractionError::is_fatal`] errors abort the whole unit.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// The frontend produced a shape the extractor does not handle.
    #[error("{message}")]
    Internal {
        message: String,
        symbol: Option<SymbolId>,
        node: Option<NodeId>,
    },

    #[error("unknown {0}")]
    UnknownSymbol(SymbolId),

    #[error("unknown {0}")]
    UnknownTree(TreeId),

    #[error("maximum nesting depth of {max} exceeded")]
    RecursionLimit { max: usize },

    #[error("trap output failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid semantic model: {0}")]
    Model(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),
}

impl ExtractionError {
    pub fn internal(message: impl Into<String>) -> Self {
        ExtractionError::Internal {
            message: message.into(),
            symbol: None,
            node: None,
        }
    }

    pub fn internal_at(symbol: SymbolId, message: impl Into<String>) -> Self {
        ExtractionError::Internal {
            message: message.into(),
            symbol: Some(symbol),
            node: None,
        }
    }

    /// Fatal errors stop extraction of the current output unit.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ExtractionError::RecursionLimit { .. } | ExtractionError::Io(_)
        )
    }

    /// Symbol the error itself points at, if any.
    pub fn symbol(&self) -> Option<SymbolId> {
        match self {
            ExtractionError::Internal { symbol, .. } => *symbol,
            ExtractionError::UnknownSymbol(id) => Some(*id),
            _ => None,
        }
    }

    pub fn node(&self) -> Option<NodeId> {
        match self {
            ExtractionError::Internal { node, .. } => *node,
            _ => None,
        }
    }
}

pub type Result<T, E = ExtractionError> = std::result::Result<T, E>;
