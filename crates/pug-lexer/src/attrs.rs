//! Attribute lists: `(name=value, ...)` and `&attributes(expr)`.

use crate::brackets::{self, NestingState};
use crate::error::{ErrorCode, PugError};
use crate::scanner::{word_at, Scanner, ScannerMode};
use crate::token::{AttributeValue, TokenKind};

fn is_attr_space(c: char) -> bool {
    matches!(c, ' ' | '\n' | '\t')
}

/// Result of scanning the `=value` part of one attribute.
struct ScannedValue {
    val: Option<String>,
    must_escape: bool,
    next: usize,
}

impl<'p> Scanner<'p> {
    pub(crate) fn attrs(&mut self) -> Result<bool, PugError> {
        if !self.rest().starts_with('(') {
            return Ok(false);
        }
        let outer = std::mem::replace(&mut self.mode, ScannerMode::Attributes);
        let start = self.position();
        let range = self.bracket_expression(0)?;
        let body = self.rest()[1..range.end].to_string();
        self.advance_column(1);
        self.push(TokenKind::StartAttributes, start);
        self.assert_nesting_correct(&body)?;
        self.consume(range.end + 1);

        let chars: Vec<char> = body.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            i = self.attribute(&chars, i)?;
        }

        let start = self.position();
        self.advance_column(1);
        self.push(TokenKind::EndAttributes, start);
        self.mode = outer;
        Ok(true)
    }

    fn assert_nesting_correct(&self, exp: &str) -> Result<(), PugError> {
        match brackets::parse(exp) {
            Ok(state) if state.is_nesting() => Err(self.error(
                ErrorCode::IncorrectNesting,
                format!("Nesting must match on expression `{exp}`"),
            )),
            Ok(_) => Ok(()),
            Err(err) => Err(self.error(ErrorCode::BracketMismatch, err.message(')'))),
        }
    }

    /// Scan one `key`, `key=value` or `key!=value` entry starting at `i` and
    /// return the index just past it and its trailing comma.
    fn attribute(&mut self, src: &[char], mut i: usize) -> Result<usize, PugError> {
        while i < src.len() && is_attr_space(src[i]) {
            self.step(src[i]);
            i += 1;
        }
        if i == src.len() {
            return Ok(i);
        }
        let start = self.position();

        let quote = matches!(src[i], '\'' | '"').then_some(src[i]);
        if quote.is_some() {
            self.advance_column(1);
            i += 1;
        }
        let mut name = String::new();
        while i < src.len() {
            let c = src[i];
            match quote {
                Some(q) if c == q => {
                    self.advance_column(1);
                    i += 1;
                    break;
                }
                None if is_attr_space(c) || matches!(c, '!' | '=' | ',') => break,
                _ => {}
            }
            name.push(c);
            self.step(c);
            i += 1;
        }

        let scanned = self.attribute_value(src, i)?;
        let (val, must_escape) = match scanned.val {
            Some(val) => (AttributeValue::Expr(val), scanned.must_escape),
            None => (AttributeValue::Bool(true), true),
        };
        self.push(
            TokenKind::Attribute {
                name,
                val,
                must_escape,
            },
            start,
        );

        let mut i = scanned.next;
        while i < src.len() && is_attr_space(src[i]) {
            self.step(src[i]);
            i += 1;
        }
        if src.get(i) == Some(&',') {
            self.advance_column(1);
            i += 1;
        }
        Ok(i)
    }

    fn attribute_value(&mut self, src: &[char], start: usize) -> Result<ScannedValue, PugError> {
        let no_value = ScannedValue {
            val: None,
            must_escape: true,
            next: start,
        };
        let (mut line, mut column) = (self.line, self.column);
        let mut i = start;
        while i < src.len() && is_attr_space(src[i]) {
            if src[i] == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
            i += 1;
        }
        if i == src.len() {
            return Ok(no_value);
        }

        let mut must_escape = true;
        if src[i] == '!' {
            must_escape = false;
            column += 1;
            i += 1;
            if src.get(i) != Some(&'=') {
                let found = src.get(i).map(char::to_string).unwrap_or_default();
                return Err(self.error(
                    ErrorCode::InvalidKeyCharacter,
                    format!("Unexpected character {found} expected `=`"),
                ));
            }
        }
        if src[i] != '=' {
            let first = src[start];
            if i == start && !is_attr_space(first) && first != ',' {
                return Err(self.error(
                    ErrorCode::InvalidKeyCharacter,
                    format!("Unexpected character {first} expected `=`"),
                ));
            }
            return Ok(no_value);
        }

        self.line = line;
        self.column = column + 1;
        i += 1;
        while i < src.len() && is_attr_space(src[i]) {
            self.step(src[i]);
            i += 1;
        }

        let (mut line, mut column) = (self.line, self.column);
        let mut state = NestingState::new();
        let mut val = String::new();
        while i < src.len() {
            let c = src[i];
            if !state.is_nesting() {
                if is_attr_space(c) {
                    let next = src[i..].iter().position(|&c| !is_attr_space(c));
                    let Some(offset) = next else {
                        break;
                    };
                    let x = i + offset;
                    let ahead = src[x];
                    let continues = brackets::is_punctuator(ahead)
                        && ahead != ':'
                        && !src[x..].starts_with(&['.', '.', '.']);
                    if !continues && brackets::is_complete_value(&val) {
                        break;
                    }
                }
                if c == ',' && brackets::is_complete_value(&val) {
                    break;
                }
            }
            if let Err(kind) = state.push(c) {
                let err = brackets::BracketError { kind, index: i };
                return Err(self.error(ErrorCode::BracketMismatch, err.message(')')));
            }
            val.push(c);
            if c == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
            i += 1;
        }

        self.assert_expression(&val)?;
        self.line = line;
        self.column = column;
        Ok(ScannedValue {
            val: Some(val),
            must_escape,
            next: i,
        })
    }

    pub(crate) fn attributes_block(&mut self) -> Result<bool, PugError> {
        const KEYWORD: &str = "&attributes";
        if !word_at(self.rest(), KEYWORD) {
            return Ok(false);
        }
        let start = self.position();
        self.consume(KEYWORD.len());
        self.advance_column(KEYWORD.len());
        if !self.rest().starts_with('(') {
            return Err(self.error(
                ErrorCode::UnexpectedText,
                "expected `(` after &attributes",
            ));
        }
        let range = self.bracket_expression(0)?;
        let val = self.rest()[range.start..range.end].to_string();
        self.consume(range.end + 1);
        self.advance_column(val.chars().count() + 2);
        self.push(TokenKind::AndAttributes { val }, start);
        Ok(true)
    }
}
