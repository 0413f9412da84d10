//! Pug Lexer
//!
//! Tokenizes Pug template source into a flat stream of located tokens.
//! Handles indentation structure, tags with ids, classes and attribute lists,
//! text with `#{}` and `#[]` interpolation, embedded code, control-flow
//! keywords, mixins, template inheritance and filters.
//!
//! # Example
//!
//! ```
//! use pug_lexer::{lex, LexerOptions, TokenType};
//!
//! let tokens = lex("p Hello", &LexerOptions::default()).unwrap();
//! let types: Vec<TokenType> = tokens.iter().map(|t| t.token_type()).collect();
//! assert_eq!(types, vec![TokenType::Tag, TokenType::Text, TokenType::Eos]);
//! ```

mod attrs;
pub mod brackets;
pub mod error;
pub mod location;
pub mod plugin;
mod rules;
pub mod scanner;
mod text;
pub mod token;

use log::debug;
use std::fmt;

pub use error::{ErrorCode, PugError};
pub use location::{Location, Position};
pub use plugin::LexerPlugin;
pub use scanner::{Rule, Scanner, ScannerMode};
pub use token::{AttributeValue, BlockMode, Token, TokenKind, TokenType};

/// Lexer configuration.
pub struct LexerOptions {
    /// Attached to every token location and error.
    pub source_id: Option<String>,
    pub starting_line: usize,
    pub starting_column: usize,
    pub plugins: Vec<Box<dyn LexerPlugin>>,
}

impl Default for LexerOptions {
    fn default() -> Self {
        Self {
            source_id: None,
            starting_line: 1,
            starting_column: 1,
            plugins: Vec::new(),
        }
    }
}

impl fmt::Debug for LexerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LexerOptions")
            .field("source_id", &self.source_id)
            .field("starting_line", &self.starting_line)
            .field("starting_column", &self.starting_column)
            .field("plugins", &self.plugins.len())
            .finish()
    }
}

impl LexerOptions {
    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn with_starting_line(mut self, line: usize) -> Self {
        self.starting_line = line;
        self
    }

    pub fn with_starting_column(mut self, column: usize) -> Self {
        self.starting_column = column;
        self
    }

    pub fn with_plugin(mut self, plugin: impl LexerPlugin + 'static) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }
}

/// Tokenize `source`.
///
/// The returned stream always ends with a single `eos` token, preceded by
/// one `outdent` for every indentation level still open.
pub fn lex(source: &str, options: &LexerOptions) -> Result<Vec<Token>, PugError> {
    debug!(
        "lexing {} ({} bytes)",
        options.source_id.as_deref().unwrap_or("<anonymous>"),
        source.len()
    );
    let tokens = Scanner::new(source, options).tokenize()?;
    debug!("produced {} tokens", tokens.len());
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_options_defaults() {
        let options = LexerOptions::default();
        assert_eq!(options.starting_line, 1);
        assert_eq!(options.starting_column, 1);
        assert!(options.plugins.is_empty());
    }

    #[test]
    fn test_source_id_on_tokens_and_errors() {
        let options = LexerOptions::default().with_source_id("page.pug");
        let tokens = lex("p", &options).unwrap();
        assert_eq!(tokens[0].loc.source_id.as_deref(), Some("page.pug"));

        let err = lex("p\n  a\n   b", &options).unwrap_err();
        assert_eq!(err.source_id.as_deref(), Some("page.pug"));
    }

    #[test]
    fn test_options_debug_hides_plugins() {
        let text = format!("{:?}", LexerOptions::default());
        assert!(text.contains("plugins: 0"));
    }
}
