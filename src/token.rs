//! The token definition for the authoring shell's command language.

/// A token is a single unit of the language, with a specific kind and location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
}

/// The kind of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind<'a> {
    // Keywords
    And, // "and"
    Or,  // "or"
    Not, // "not"

    // Literals
    Word(&'a str),   // Any run of non-whitespace characters
    String(&'a str), // The string content, without quotes

    // Special
    Illegal, // An unterminated string
}

impl TokenKind<'_> {
    /// Short human-readable name used in error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::And => "'and'".to_string(),
            TokenKind::Or => "'or'".to_string(),
            TokenKind::Not => "'not'".to_string(),
            TokenKind::Word(word) => format!("'{word}'"),
            TokenKind::String(s) => format!("\"{s}\""),
            TokenKind::Illegal => "unterminated string".to_string(),
        }
    }
}

/// Represents a span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// The starting byte offset.
    pub start: usize,
    /// The ending byte offset.
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}
