//! Diagnostic messages handed to the diagnostics sink.

use serde::{Deserialize, Serialize};

/// Severity of a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Debug => write!(f, "debug"),
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A structured diagnostic.
///
/// Context is attached by whoever catches the failure: the symbol or syntax
/// node being extracted, its declared locations, and the underlying error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub severity: Severity,
    pub text: String,
    /// Display name of the symbol being extracted
    pub symbol: Option<String>,
    /// Declared locations of that symbol (`path:line:col`)
    pub locations: Vec<String>,
    /// Syntax node description
    pub node: Option<String>,
    /// The error that caused this message
    pub cause: Option<String>,
}

impl Message {
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self {
            severity,
            text: text.into(),
            symbol: None,
            locations: Vec::new(),
            node: None,
            cause: None,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(Severity::Error, text)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(Severity::Warning, text)
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(Severity::Info, text)
    }

    pub fn with_symbol(mut self, name: impl Into<String>, locations: Vec<String>) -> Self {
        self.symbol = Some(name.into());
        self.locations = locations;
        self
    }

    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}
