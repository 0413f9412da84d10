use crate::error::PugError;
use crate::scanner::{Rule, Scanner};

/// An extension to the tokenizer.
///
/// Before running a built-in [`Rule`] the scanner offers it to every plugin
/// in registration order. The first plugin that returns `Ok(true)` is taken
/// to have consumed input and pushed its tokens, and the built-in rule is
/// skipped. Returning `Ok(false)` leaves the scanner untouched and passes the
/// rule on.
///
/// Plugins read input with [`Scanner::rest`], move with
/// [`Scanner::consume`] and [`Scanner::advance_column`], and emit tokens
/// with [`Scanner::push`]. New token kinds are expressed as
/// [`TokenKind::Custom`](crate::TokenKind::Custom).
pub trait LexerPlugin {
    fn tokenize(&self, rule: Rule, scanner: &mut Scanner<'_>) -> Result<bool, PugError>;
}
