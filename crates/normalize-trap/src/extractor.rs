//! State shared by every output unit of one extraction run.
//!
//! Contexts are confined to one thread each; the `Extractor` is the only thing
//! they share. Its mutable parts (error count, assembly table, missing types)
//! sit behind a single mutex.

use crate::config::ExtractionConfig;
use normalize_trap_core::{Message, Severity};
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

/// Receives diagnostics. Implementations decide how messages are rendered.
pub trait DiagnosticSink: Send + Sync {
    fn log(&self, message: &Message);
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn log(&self, message: &Message) {
        let symbol = message.symbol.as_deref().unwrap_or_default();
        let locations = message.locations.join(", ");
        let locations = locations.as_str();
        let node = message.node.as_deref().unwrap_or_default();
        let cause = message.cause.as_deref().unwrap_or_default();
        match message.severity {
            Severity::Error => {
                tracing::error!(symbol, locations, node, cause, "{}", message.text)
            }
            Severity::Warning => {
                tracing::warn!(symbol, locations, node, cause, "{}", message.text)
            }
            Severity::Info => {
                tracing::info!(symbol, locations, node, cause, "{}", message.text)
            }
            Severity::Debug => {
                tracing::debug!(symbol, locations, node, cause, "{}", message.text)
            }
        }
    }
}

/// Keeps every logged message in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    messages: Mutex<Vec<Message>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

impl DiagnosticSink for CollectingSink {
    fn log(&self, message: &Message) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.clone());
        }
    }
}

impl<T: DiagnosticSink + ?Sized> DiagnosticSink for std::sync::Arc<T> {
    fn log(&self, message: &Message) {
        (**self).log(message)
    }
}

#[derive(Debug, Default)]
struct Shared {
    errors: usize,
    assembly_files: HashMap<String, String>,
    missing_types: BTreeSet<String>,
}

/// Extraction state shared across units.
pub struct Extractor {
    config: ExtractionConfig,
    sink: Box<dyn DiagnosticSink>,
    shared: Mutex<Shared>,
}

impl Extractor {
    pub fn new(config: ExtractionConfig, sink: impl DiagnosticSink + 'static) -> Self {
        Self {
            config,
            sink: Box::new(sink),
            shared: Mutex::new(Shared::default()),
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Standalone extraction expects an incomplete model and tolerates model errors.
    pub fn standalone(&self) -> bool {
        self.config.standalone
    }

    fn shared(&self) -> std::sync::MutexGuard<'_, Shared> {
        // A panic while holding the lock leaves the counters usable.
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Log a message, counting errors.
    ///
    /// After `max_errors` errors one final info line is logged and later
    /// messages are dropped; counting continues.
    pub fn message(&self, message: Message) {
        let mut shared = self.shared();
        if message.severity == Severity::Error {
            shared.errors += 1;
            if shared.errors == self.config.max_errors {
                self.sink.log(&Message::info(format!(
                    "Stopping logging after {} errors",
                    shared.errors
                )));
            }
        }
        if shared.errors >= self.config.max_errors {
            return;
        }
        self.sink.log(&message);
    }

    /// How many errors have been reported so far.
    pub fn errors(&self) -> usize {
        self.shared().errors
    }

    /// Record which file defines an assembly.
    pub fn set_assembly_file(&self, assembly: impl Into<String>, file: impl Into<String>) {
        self.shared()
            .assembly_files
            .insert(assembly.into(), file.into());
    }

    pub fn assembly_file(&self, assembly: &str) -> Option<String> {
        self.shared().assembly_files.get(assembly).cloned()
    }

    /// Record a type the frontend could not resolve.
    pub fn missing_type(&self, name: impl Into<String>) {
        self.shared().missing_types.insert(name.into());
    }

    pub fn missing_types(&self) -> Vec<String> {
        self.shared().missing_types.iter().cloned().collect()
    }
}
