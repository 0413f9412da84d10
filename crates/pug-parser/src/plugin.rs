//! Grammar extensions.
//!
//! A [`ParserPlugin`] claims `(ExtensionPoint, TokenType)` pairs. When the
//! parser reaches a token it has no production for at one of those points,
//! it hands the token to the claiming plugin instead of failing.

use crate::ast::{Block, Node};
use crate::parser::{Element, Parser};
use log::debug;
use pug_lexer::{ErrorCode, PugError, Token, TokenType};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

/// Places in the grammar where plugins are consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionPoint {
    /// Choosing the production for a statement.
    Expression,
    /// Continuing a run of inline text.
    Text,
    /// The id/class/attribute prefix of an element.
    TagAttribute,
    /// What follows an element's attributes on the same line.
    Tag,
    /// Children of a `case`.
    Case,
    /// The body of a `-` code block.
    BlockCode,
    /// The body of a dot block, filter or block comment.
    TextBlock,
}

impl ExtensionPoint {
    pub fn name(&self) -> &'static str {
        match self {
            ExtensionPoint::Expression => "expressionTokens",
            ExtensionPoint::Text => "textTokens",
            ExtensionPoint::TagAttribute => "tagAttributeTokens",
            ExtensionPoint::Tag => "tagTokens",
            ExtensionPoint::Case => "caseTokens",
            ExtensionPoint::BlockCode => "blockCodeTokens",
            ExtensionPoint::TextBlock => "textBlockTokens",
        }
    }
}

impl fmt::Display for ExtensionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn not_handled(parser: &Parser<'_>, point: ExtensionPoint, token: &Token) -> PugError {
    parser.error(
        ErrorCode::InvalidToken,
        format!(
            "plugin claimed \"{}\" in {point} but does not handle it",
            token.token_type()
        ),
        &token.loc,
    )
}

/// An extension to the parser.
///
/// Only the methods for claimed extension points are ever called. For
/// `Expression`, `Text`, `TagAttribute`, `Tag` and `Case` the token is still
/// in the stream and the handler must consume it; for `BlockCode` and
/// `TextBlock` it has already been consumed.
pub trait ParserPlugin {
    fn claims(&self) -> Vec<(ExtensionPoint, TokenType)>;

    /// Parse a statement that starts with `token`.
    fn expression(&self, parser: &mut Parser<'_>, token: &Token) -> Result<Node, PugError> {
        Err(not_handled(parser, ExtensionPoint::Expression, token))
    }

    /// Add to the inline text run in `nodes`.
    fn text(
        &self,
        parser: &mut Parser<'_>,
        token: &Token,
        nodes: &mut Vec<Node>,
    ) -> Result<(), PugError> {
        let _ = nodes;
        Err(not_handled(parser, ExtensionPoint::Text, token))
    }

    fn tag_attribute(
        &self,
        parser: &mut Parser<'_>,
        token: &Token,
        element: &mut Element,
        attribute_names: &mut Vec<String>,
    ) -> Result<(), PugError> {
        let _ = (element, attribute_names);
        Err(not_handled(parser, ExtensionPoint::TagAttribute, token))
    }

    fn tag(
        &self,
        parser: &mut Parser<'_>,
        token: &Token,
        element: &mut Element,
    ) -> Result<(), PugError> {
        let _ = element;
        Err(not_handled(parser, ExtensionPoint::Tag, token))
    }

    fn case(
        &self,
        parser: &mut Parser<'_>,
        token: &Token,
        block: &mut Block,
    ) -> Result<(), PugError> {
        let _ = block;
        Err(not_handled(parser, ExtensionPoint::Case, token))
    }

    /// Source text contributed to the code block.
    fn block_code(&self, parser: &mut Parser<'_>, token: &Token) -> Result<String, PugError> {
        Err(not_handled(parser, ExtensionPoint::BlockCode, token))
    }

    fn text_block(
        &self,
        parser: &mut Parser<'_>,
        token: &Token,
        block: &mut Block,
    ) -> Result<(), PugError> {
        let _ = block;
        Err(not_handled(parser, ExtensionPoint::TextBlock, token))
    }
}

/// Handlers by extension point and token type. At most one plugin may
/// claim each pair.
#[derive(Default)]
pub struct PluginRegistry<'p> {
    handlers: HashMap<(ExtensionPoint, TokenType), &'p dyn ParserPlugin>,
}

impl<'p> PluginRegistry<'p> {
    pub fn new(plugins: &'p [Box<dyn ParserPlugin>]) -> Result<Self, PugError> {
        let mut handlers: HashMap<(ExtensionPoint, TokenType), &'p dyn ParserPlugin> =
            HashMap::new();
        for plugin in plugins {
            for (point, ty) in plugin.claims() {
                match handlers.entry((point, ty)) {
                    Entry::Occupied(entry) => {
                        let (point, ty) = entry.key();
                        return Err(PugError::new(
                            ErrorCode::PluginConflict,
                            format!(
                                "Multiple plugin handlers found for context {point}, token type {ty}"
                            ),
                            0,
                            0,
                        ));
                    }
                    Entry::Vacant(entry) => {
                        debug!("plugin claims {} in {}", entry.key().1, entry.key().0);
                        entry.insert(&**plugin);
                    }
                }
            }
        }
        Ok(Self { handlers })
    }

    pub fn get(&self, point: ExtensionPoint, ty: &TokenType) -> Option<&'p dyn ParserPlugin> {
        self.handlers.get(&(point, ty.clone())).copied()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for PluginRegistry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self
            .handlers
            .keys()
            .map(|(point, ty)| format!("{point}/{ty}"))
            .collect();
        keys.sort();
        f.debug_struct("PluginRegistry")
            .field("handlers", &keys)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Claims(Vec<(ExtensionPoint, TokenType)>);

    impl ParserPlugin for Claims {
        fn claims(&self) -> Vec<(ExtensionPoint, TokenType)> {
            self.0.clone()
        }
    }

    #[test]
    fn test_registry_lookup() {
        let plugins: Vec<Box<dyn ParserPlugin>> = vec![Box::new(Claims(vec![(
            ExtensionPoint::Expression,
            TokenType::Custom("macro".into()),
        )]))];
        let registry = PluginRegistry::new(&plugins).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry
            .get(ExtensionPoint::Expression, &TokenType::Custom("macro".into()))
            .is_some());
        assert!(registry
            .get(ExtensionPoint::Text, &TokenType::Custom("macro".into()))
            .is_none());
    }

    #[test]
    fn test_same_token_in_different_points_is_allowed() {
        let plugins: Vec<Box<dyn ParserPlugin>> = vec![
            Box::new(Claims(vec![(ExtensionPoint::Case, TokenType::Tag)])),
            Box::new(Claims(vec![(ExtensionPoint::TextBlock, TokenType::Tag)])),
        ];
        assert_eq!(PluginRegistry::new(&plugins).unwrap().len(), 2);
    }

    #[test]
    fn test_conflicting_claims() {
        let plugins: Vec<Box<dyn ParserPlugin>> = vec![
            Box::new(Claims(vec![(ExtensionPoint::Case, TokenType::Tag)])),
            Box::new(Claims(vec![(ExtensionPoint::Case, TokenType::Tag)])),
        ];
        let err = PluginRegistry::new(&plugins).unwrap_err();
        assert_eq!(err.code, ErrorCode::PluginConflict);
        assert_eq!(
            err.message,
            "Multiple plugin handlers found for context caseTokens, token type tag"
        );
    }

    #[test]
    fn test_empty_registry() {
        let registry = PluginRegistry::new(&[]).unwrap();
        assert!(registry.is_empty());
        assert_eq!(format!("{registry:?}"), "PluginRegistry { handlers: [] }");
    }
}
