use pug_lexer::Token;
use std::collections::VecDeque;

/// The parser's view of the token sequence.
///
/// Supports one token of push-back through [`TokenStream::defer`].
#[derive(Debug, Clone, Default)]
pub struct TokenStream {
    tokens: VecDeque<Token>,
    deferred: Option<Token>,
}

impl TokenStream {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens: tokens.into(),
            deferred: None,
        }
    }

    /// Remove and return the next token, or `None` once exhausted.
    pub fn advance(&mut self) -> Option<Token> {
        self.deferred.take().or_else(|| self.tokens.pop_front())
    }

    pub fn peek(&self) -> Option<&Token> {
        self.lookahead(1)
    }

    /// The `n`-th upcoming token, counting from 1.
    pub fn lookahead(&self, n: usize) -> Option<&Token> {
        let index = n.checked_sub(1)?;
        match &self.deferred {
            Some(token) if index == 0 => Some(token),
            Some(_) => self.tokens.get(index - 1),
            None => self.tokens.get(index),
        }
    }

    /// Put `token` in front of the stream.
    ///
    /// # Panics
    ///
    /// Only one token may be pending; deferring a second one before the
    /// first is consumed is a programming error.
    pub fn defer(&mut self, token: Token) {
        assert!(
            self.deferred.is_none(),
            "a deferred token is already pending"
        );
        self.deferred = Some(token);
    }

    pub fn is_empty(&self) -> bool {
        self.deferred.is_none() && self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len() + usize::from(self.deferred.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pug_lexer::{Location, Position, TokenKind};
    use pretty_assertions::assert_eq;

    fn tag(name: &str) -> Token {
        let at = Position::new(1, 1);
        Token::new(
            TokenKind::Tag { val: name.into() },
            Location::point(at, None),
        )
    }

    fn stream(names: &[&str]) -> TokenStream {
        TokenStream::new(names.iter().map(|n| tag(n)).collect())
    }

    #[test]
    fn test_advance_in_order() {
        let mut tokens = stream(&["a", "b"]);
        assert_eq!(tokens.advance(), Some(tag("a")));
        assert_eq!(tokens.advance(), Some(tag("b")));
        assert_eq!(tokens.advance(), None);
        assert!(tokens.is_empty());
    }

    #[test]
    fn test_peek_does_not_consume() {
        let tokens = stream(&["a"]);
        assert_eq!(tokens.peek(), Some(&tag("a")));
        assert_eq!(tokens.len(), 1);
    }

    #[test]
    fn test_lookahead_is_one_based() {
        let tokens = stream(&["a", "b", "c"]);
        assert_eq!(tokens.lookahead(1), Some(&tag("a")));
        assert_eq!(tokens.lookahead(3), Some(&tag("c")));
        assert_eq!(tokens.lookahead(4), None);
        assert_eq!(tokens.lookahead(0), None);
    }

    #[test]
    fn test_deferred_token_comes_first() {
        let mut tokens = stream(&["b", "c"]);
        tokens.defer(tag("a"));
        assert_eq!(tokens.peek(), Some(&tag("a")));
        assert_eq!(tokens.lookahead(2), Some(&tag("b")));
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens.advance(), Some(tag("a")));
        assert_eq!(tokens.advance(), Some(tag("b")));
    }

    #[test]
    #[should_panic(expected = "already pending")]
    fn test_double_defer_panics() {
        let mut tokens = stream(&[]);
        tokens.defer(tag("a"));
        tokens.defer(tag("b"));
    }
}
