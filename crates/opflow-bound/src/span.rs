// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Source location tracking.

/// A span in the source code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn cover(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// The syntax a bound node was produced from.
///
/// Only the span and the source text are kept; the text is what renderers
/// print in `(Syntax: '...')` annotations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Syntax {
    pub span: Span,
    pub text: String,
}

impl Syntax {
    pub fn new(span: Span, text: impl Into<String>) -> Self {
        Self { span, text: text.into() }
    }

    /// Syntax with text but no meaningful location. Used by hand-built trees.
    pub fn text(text: impl Into<String>) -> Self {
        Self { span: Span::default(), text: text.into() }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cover_merges_spans() {
        let a = Span::new(4, 9);
        let b = Span::new(1, 6);
        assert_eq!(a.cover(b), Span::new(1, 9));
        assert_eq!(b.cover(a), Span::new(1, 9));
    }

    #[test]
    fn text_syntax_has_default_span() {
        let syntax = Syntax::text("input");
        assert_eq!(syntax.span, Span::default());
        assert_eq!(syntax.text, "input");
        assert!(!syntax.is_empty());
        assert!(Syntax::none().is_empty());
    }
}
