//! Core vocabulary for trap extraction.
//!
//! This crate defines the small value types shared by every layer of the
//! extractor:
//! - `Label` and `Key`, the identity of an entity in the output stream
//! - `TrapStackBehavior`, how an entity's population relates to `.push`/`.pop`
//! - frontend handles (`SymbolId`, `TreeId`, `NodeId`) and `SourceObject`
//! - `Message` and `Severity` for diagnostics

mod behavior;
mod handle;
mod key;
mod label;
mod message;

pub use behavior::TrapStackBehavior;
pub use handle::{NodeId, SourceObject, SymbolId, TreeId};
pub use key::{Key, KeyPart};
pub use label::Label;
pub use message::{Message, Severity};
