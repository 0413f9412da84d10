//! Pug Parser
//!
//! Builds a located syntax tree from the token stream produced by
//! `pug-lexer`. Every node carries the span of source text it was parsed
//! from, and every error names the offending line and column.
//!
//! # Example
//!
//! ```
//! use pug_lexer::LexerOptions;
//! use pug_parser::{parse, Node, ParserOptions};
//!
//! let source = "ul\n  li one\n  li two";
//! let root = parse(source, &LexerOptions::default(), &ParserOptions::default()).unwrap();
//! let Node::Tag(list) = &root.nodes[0] else {
//!     panic!("expected a tag");
//! };
//! assert_eq!(list.name, "ul");
//! assert_eq!(list.block.nodes.len(), 2);
//! ```

pub mod ast;
pub mod parser;
pub mod plugin;
pub mod token_stream;

use log::debug;
use std::fmt;

pub use ast::{Block, Node};
pub use parser::{Element, Parser};
pub use plugin::{ExtensionPoint, ParserPlugin};
pub use pug_lexer::{ErrorCode, LexerOptions, Location, PugError, Token};
pub use token_stream::TokenStream;

/// Parser configuration.
#[derive(Default)]
pub struct ParserOptions {
    /// Reported in errors. Falls back to the source id of the token locations.
    pub source_id: Option<String>,
    /// Attached to errors so callers can render context around them.
    pub source_text: Option<String>,
    pub plugins: Vec<Box<dyn ParserPlugin>>,
}

impl fmt::Debug for ParserOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserOptions")
            .field("source_id", &self.source_id)
            .field("source_text", &self.source_text.as_ref().map(String::len))
            .field("plugins", &self.plugins.len())
            .finish()
    }
}

impl ParserOptions {
    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn with_source_text(mut self, source_text: impl Into<String>) -> Self {
        self.source_text = Some(source_text.into());
        self
    }

    pub fn with_plugin(mut self, plugin: impl ParserPlugin + 'static) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }
}

/// Parse an already tokenized document.
pub fn parse_tokens(tokens: Vec<Token>, options: &ParserOptions) -> Result<Block, PugError> {
    debug!("parsing {} tokens", tokens.len());
    let root = Parser::new(tokens, options)?.parse()?;
    debug!("parsed {} top-level nodes", root.nodes.len());
    Ok(root)
}

/// Tokenize and parse `source`.
///
/// Errors from either stage carry `source` as their `src`.
pub fn parse(
    source: &str,
    lexer: &LexerOptions,
    options: &ParserOptions,
) -> Result<Block, PugError> {
    let tokens = pug_lexer::lex(source, lexer)?;
    parse_tokens(tokens, options).map_err(|err| match err.src {
        Some(_) => err,
        None => err.with_src(Some(source.to_string())),
    })
}
