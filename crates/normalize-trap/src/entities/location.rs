use super::File;
use crate::context::{Cached, CachedEntity, Context};
use crate::error::Result;
use crate::model::{SourceSpan, SymbolLocation};
use crate::writer::Tuple;
use normalize_trap_core::{Key, Label, TrapStackBehavior};

/// A source location, or the generated location when there is none.
pub struct Location {
    file: Label,
    span: Option<SourceSpan>,
}

impl Location {
    /// Create the location entity. `None` yields the shared generated location.
    pub fn create(cx: &mut Context<'_>, location: Option<SymbolLocation>) -> Result<Cached<Location>> {
        cx.get_or_create_by_value(location, |cx, location| {
            let file = match location {
                Some(loc) => {
                    let path = &cx.model().tree(loc.tree)?.path;
                    File::create(cx, path)?
                }
                None => File::generated(cx)?,
            };
            Ok(Location {
                file: file.label(),
                span: location.map(|loc| loc.span),
            })
        })
    }

    pub fn file(&self) -> Label {
        self.file
    }
}

/// `sl,sc,el,ec`, shared by source and generated location keys.
fn span_key(span: &SourceSpan) -> Key {
    Key::new().join(
        [span.start_line, span.start_column, span.end_line, span.end_column],
        ",",
        |key, n| key.int(n.into()),
    )
}

const GENERATED_SPAN: SourceSpan = SourceSpan {
    start_line: 0,
    start_column: 0,
    end_line: 0,
    end_column: 0,
};

impl CachedEntity for Location {
    fn id(&self) -> Key {
        match &self.span {
            Some(span) => Key::new()
                .label(self.file)
                .text(",")
                .key(span_key(span))
                .text(";sourcelocation"),
            None => Key::literal("loc,")
                .label(self.file)
                .text(",")
                .key(span_key(&GENERATED_SPAN)),
        }
    }

    fn populate(&self, cx: &mut Context<'_>, label: Label) -> Result<()> {
        let span = self.span.unwrap_or(GENERATED_SPAN);
        cx.emit(
            Tuple::new("locations_default")
                .label(label)
                .label(self.file)
                .int(span.start_line.into())
                .int(span.start_column.into())
                .int(span.end_line.into())
                .int(span.end_column.into()),
        )
    }

    fn trap_stack_behavior(&self) -> TrapStackBehavior {
        TrapStackBehavior::OptionalScope
    }
}
