//! Concrete entities and the top-level symbol visitor.
//!
//! Each entity decides its own cache (by identity or by value), its key, and its
//! trap stack behavior:
//!
//! | entity       | cache    | behavior   |
//! |--------------|----------|------------|
//! | File         | value    | no scope   |
//! | Location     | value    | optional   |
//! | Assembly     | value    | no scope   |
//! | Namespace    | value    | no scope   |
//! | NamedType    | identity | pushes     |
//! | PointerType  | identity | optional   |
//! | Method       | identity | pushes     |
//! | Compilation  | fresh    | -          |

mod assembly;
mod compilation;
mod file;
mod location;
mod method;
mod namespace;
mod types;

pub use assembly::Assembly;
pub use compilation::Compilation;
pub use file::File;
pub use location::Location;
pub use method::Method;
pub use namespace::Namespace;
pub use types::{NamedType, PointerType, create_type, extract_type_arguments};

use crate::context::Context;
use crate::error::Result;
use crate::model::SymbolKind;
use normalize_trap_core::SymbolId;

/// Extract a symbol declared at the top level of a source file (or nested in a
/// namespace declared there).
pub fn extract_symbol(cx: &mut Context<'_>, symbol: SymbolId) -> Result<()> {
    let data = cx.model().symbol(symbol)?;
    match data.kind {
        SymbolKind::Namespace => {
            Namespace::create(cx, symbol)?;
            for &member in &data.members {
                if cx.defines(member)? {
                    cx.try_extract(None, Some(member), |cx| extract_symbol(cx, member))?;
                }
            }
        }
        kind if kind.is_type() => {
            create_type(cx, symbol)?;
        }
        kind if kind.is_method() => {
            Method::create(cx, symbol)?;
        }
        kind => {
            cx.model_error(
                Some(symbol),
                format!("Unhandled top-level {} symbol", kind.as_str()),
            )?;
        }
    }
    Ok(())
}
