//! Entity-graph extraction into trap fact files.
//!
//! A frontend resolves a program into a [`SemanticModel`]. This crate walks the
//! model one output unit at a time and writes a trap file of labelled facts for
//! each unit, deduplicating entities so that every entity gets one label and is
//! described once per file, and so that importers can recognise entities shared
//! between files by their identity keys.
//!
//! ```no_run
//! use normalize_trap::{Extractor, SemanticModel, TracingSink, TrapConfig, TrapLayout, UnitSpec, extract_all};
//! # fn main() -> normalize_trap::Result<()> {
//! let model = SemanticModel::load("model.json".as_ref())?;
//! let config = TrapConfig::load(".".as_ref());
//! let extractor = Extractor::new(config.extraction.clone(), TracingSink);
//! let layout = TrapLayout::new("traps", config.output.compression);
//! let reports = extract_all(&extractor, &model, &UnitSpec::all(&model), &layout, &config.output);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod entities;
pub mod error;
pub mod extractor;
pub mod model;
pub mod scope;
pub mod unit;
pub mod writer;

pub use config::{Compression, ExtractionConfig, OutputConfig, TrapConfig};
pub use context::{Cached, CachedEntity, Context, ContextStats};
pub use error::{ExtractionError, Result};
pub use extractor::{CollectingSink, DiagnosticSink, Extractor, TracingSink};
pub use model::SemanticModel;
pub use normalize_trap_core::{Key, Label, Message, Severity, SymbolId, TrapStackBehavior, TreeId};
pub use scope::ExtractionScope;
pub use unit::{TrapLayout, UnitReport, UnitSpec, UnitStatus, extract_all, extract_unit};
pub use writer::{TrapOutput, TrapWriter, Tuple};
