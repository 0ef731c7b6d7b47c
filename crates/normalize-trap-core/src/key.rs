//! Identity keys: structural fingerprints used to deduplicate entities.
//!
//! A key is an immutable sequence of parts. Parts are literal text, integers,
//! labels of other entities, or nested keys. Referencing other entities by
//! label (instead of by their own keys) keeps key computation acyclic: an entity
//! only needs the labels of things it refers to, never its own.
//!
//! Two keys identify the same entity iff their rendered contents are equal.

use crate::Label;
use std::fmt::{self, Write};

/// One component of a [`Key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPart {
    Text(String),
    Int(i64),
    Label(Label),
    Key(Key),
}

/// A structural identity key.
///
/// Built with the chaining constructors and rendered with [`Key::render`]. The
/// `Display` impl produces the trap spelling `@"content"`, with quotes doubled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Key {
    parts: Vec<KeyPart>,
}

impl Key {
    /// An empty key, to be extended with the chaining methods.
    pub fn new() -> Self {
        Self::default()
    }

    /// A key consisting of a single literal, e.g. `;namespace` for the global namespace.
    pub fn literal(text: impl Into<String>) -> Self {
        Self::new().text(text)
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(KeyPart::Text(text.into()));
        self
    }

    pub fn int(mut self, value: i64) -> Self {
        self.parts.push(KeyPart::Int(value));
        self
    }

    pub fn label(mut self, label: Label) -> Self {
        self.parts.push(KeyPart::Label(label));
        self
    }

    pub fn key(mut self, key: Key) -> Self {
        self.parts.push(KeyPart::Key(key));
        self
    }

    /// Append `items` separated by `sep`, rendering each with `f`.
    pub fn join<T>(mut self, items: impl IntoIterator<Item = T>, sep: &str, f: impl Fn(Key, T) -> Key) -> Self {
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                self = self.text(sep);
            }
            self = f(self, item);
        }
        self
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// The canonical content of this key. Equal renderings mean equal identity.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }

    fn render_into(&self, out: &mut String) {
        for part in &self.parts {
            match part {
                KeyPart::Text(text) => out.push_str(text),
                // Writing to a String cannot fail.
                KeyPart::Int(value) => {
                    let _ = write!(out, "{}", value);
                }
                KeyPart::Label(label) => {
                    let _ = write!(out, "{{{}}}", label);
                }
                KeyPart::Key(key) => key.render_into(out),
            }
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@\"{}\"", self.render().replace('"', "\"\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_mixed_parts() {
        let key = Key::new().label(Label::new(3)).text(".").text("Foo").text(";type");
        assert_eq!(key.render(), "{#3}.Foo;type");
    }

    #[test]
    fn test_nested_keys_flatten() {
        let inner = Key::new().label(Label::new(1)).int(10);
        let outer = Key::new().key(inner).text(",").int(-2);
        assert_eq!(outer.render(), "{#1}10,-2");
    }

    #[test]
    fn test_structurally_different_keys_render_equal() {
        let a = Key::new().text("a").text("b");
        let b = Key::literal("ab");
        assert_ne!(a, b);
        assert_eq!(a.render(), b.render());
    }

    #[test]
    fn test_display_escapes_quotes() {
        let key = Key::literal("say \"hi\"");
        assert_eq!(key.to_string(), "@\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_join() {
        let labels = [Label::new(4), Label::new(5)];
        let key = Key::literal("<")
            .join(labels, ",", |k, l| k.label(l))
            .text(">");
        assert_eq!(key.render(), "<{#4},{#5}>");
    }

    #[test]
    fn test_join_empty() {
        let key = Key::literal("(").join(Vec::<Label>::new(), ",", |k, l| k.label(l)).text(")");
        assert_eq!(key.render(), "()");
    }
}
