//! Text runs and the interpolations embedded in them.
//!
//! A line of text is split into plain `text` tokens, `#{expr}` / `!{expr}`
//! string interpolations, and `#[tag ...]` tag interpolations. The latter are
//! tokenized by a nested scanner that stops at the matching `]`.

use crate::brackets::{self, BracketErrorKind};
use crate::error::{ErrorCode, PugError};
use crate::location::Position;
use crate::scanner::Scanner;
use crate::token::TokenKind;

const NONE: usize = usize::MAX;

/// A `#{`, `!{`, `\#{` or `\!{` found in text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StringInterpolation {
    index: usize,
    escaped: bool,
    sigil: char,
}

fn find_string_interpolation(value: &str) -> Option<StringInterpolation> {
    let bytes = value.as_bytes();
    let opens_at = |i: usize| {
        matches!(bytes.get(i), Some(b'#' | b'!')) && bytes.get(i + 1) == Some(&b'{')
    };
    (0..bytes.len()).find_map(|i| {
        if bytes[i] == b'\\' && opens_at(i + 1) {
            Some(StringInterpolation {
                index: i,
                escaped: true,
                sigil: char::from(bytes[i + 1]),
            })
        } else if opens_at(i) {
            Some(StringInterpolation {
                index: i,
                escaped: false,
                sigil: char::from(bytes[i]),
            })
        } else {
            None
        }
    })
}

impl<'p> Scanner<'p> {
    fn push_text(&mut self, html: bool, val: String, start: Position) {
        if val.is_empty() {
            return;
        }
        let kind = if html {
            TokenKind::TextHtml { val }
        } else {
            TokenKind::Text { val }
        };
        self.push(kind, start);
    }

    /// Emit `value` as text, splitting out interpolations.
    ///
    /// `prefix` is already-unescaped text that precedes `value`, and
    /// `escaped` counts the backslashes dropped from it so columns stay
    /// aligned with the source.
    pub(crate) fn add_text(
        &mut self,
        html: bool,
        value: &str,
        prefix: &str,
        escaped: usize,
    ) -> Result<(), PugError> {
        if value.is_empty() && prefix.is_empty() {
            return Ok(());
        }

        let allowed = self.interpolation_allowed;
        let end = self.interpolated.then(|| value.find(']')).flatten();
        let open = allowed.then(|| value.find("#[")).flatten();
        let escape = allowed.then(|| value.find("\\#[")).flatten();
        let string = allowed.then(|| find_string_interpolation(value)).flatten();
        let [end, open, escape] = [end, open, escape].map(|i| i.unwrap_or(NONE));
        let interp = string.map_or(NONE, |m| m.index);

        // \#[ is literal text
        if escape != NONE && escape < end && escape < open && escape < interp {
            let prefix = format!("{prefix}{}#[", &value[..escape]);
            return self.add_text(html, &value[escape + 3..], &prefix, escaped + 1);
        }

        if open != NONE && open < end && open < escape && open < interp {
            let before = format!("{prefix}{}", &value[..open]);
            let start = self.position();
            self.advance_column(before.chars().count() + escaped);
            self.push_text(html, before, start);

            let start = self.position();
            self.advance_column(2);
            self.push(TokenKind::StartPugInterpolation, start);

            let mut child = self.interpolation_child(value[open + 2..].to_string());
            child.run()?;
            self.column = child.column;
            let remaining = child.rest().to_string();
            let tokens = child.take_tokens();
            self.extend_tokens(tokens);

            let start = self.position();
            self.advance_column(1);
            self.push(TokenKind::EndPugInterpolation, start);
            return self.add_text(html, &remaining, "", 0);
        }

        // `]` closes the enclosing tag interpolation
        if end != NONE && end < open && end < escape && end < interp {
            if !prefix.is_empty() || end > 0 {
                self.add_text(html, &value[..end], prefix, escaped)?;
            }
            self.ended = true;
            self.unshift_input(&value[end + 1..]);
            return Ok(());
        }

        if let Some(found) = string {
            if found.escaped {
                let prefix = format!("{prefix}{}{}{{", &value[..found.index], found.sigil);
                return self.add_text(html, &value[found.index + 3..], &prefix, escaped + 1);
            }

            let before = format!("{prefix}{}", &value[..found.index]);
            if !before.is_empty() {
                let start = self.position();
                self.advance_column(before.chars().count() + escaped);
                self.push_text(html, before, start);
            }

            let rest = &value[found.index + 2..];
            let start = self.position();
            self.advance_column(2);
            let range = match brackets::parse_until(rest, '}', 0) {
                Ok(range) => range,
                Err(err) => {
                    self.advance_column(rest[..err.index.min(rest.len())].chars().count());
                    return Err(match err.kind {
                        BracketErrorKind::EndOfString => self.error(
                            ErrorCode::NoEndBracket,
                            "End of line was reached with no closing bracket for interpolation.",
                        ),
                        BracketErrorKind::Mismatched { .. } => {
                            self.error(ErrorCode::BracketMismatch, err.message('}'))
                        }
                    });
                }
            };
            let val = rest[..range.end].to_string();
            self.assert_expression(&val)?;
            let kind = TokenKind::InterpolatedCode {
                val,
                must_escape: found.sigil == '#',
                buffer: true,
            };

            let consumed = &rest[..(range.end + 1).min(rest.len())];
            self.advance_column(consumed.chars().count());
            self.push(kind, start);
            if range.end + 1 < rest.len() {
                return self.add_text(html, &rest[range.end + 1..], "", 0);
            }
            return Ok(());
        }

        let value = format!("{prefix}{value}");
        let start = self.position();
        self.advance_column(value.chars().count() + escaped);
        self.push_text(html, value, start);
        Ok(())
    }
}
