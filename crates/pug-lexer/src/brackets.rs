//! Bracket, string and comment tracking for embedded expressions.
//!
//! Expressions inside templates (attribute values, `#{...}`, mixin arguments)
//! are opaque to the lexer, but it still has to know where they end. This
//! module walks expression text one character at a time and keeps a stack of
//! open brackets, string quotes and comments, so that delimiters inside
//! strings or nested brackets are not mistaken for the end of the expression.

/// One entry on the nesting stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Bracket(char),
    Quote(char),
    LineComment,
    BlockComment,
}

/// Incremental nesting state.
#[derive(Debug, Clone, Default)]
pub struct NestingState {
    stack: Vec<Frame>,
    escaped: bool,
    after_slash: bool,
    after_star: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BracketErrorKind {
    /// The input ended before the delimiter was found.
    EndOfString,
    /// A closing bracket did not match the innermost open bracket.
    Mismatched { found: char, expected: Option<char> },
}

/// A failed scan; `index` is the byte offset of the offending character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BracketError {
    pub kind: BracketErrorKind,
    pub index: usize,
}

impl BracketError {
    pub fn message(&self, delimiter: char) -> String {
        match &self.kind {
            BracketErrorKind::EndOfString => format!(
                "The end of the string reached with no closing bracket {delimiter} found."
            ),
            BracketErrorKind::Mismatched {
                found,
                expected: Some(expected),
            } => format!("Mismatched Bracket: {found}, expected {expected}"),
            BracketErrorKind::Mismatched {
                found,
                expected: None,
            } => format!("Mismatched Bracket: {found}"),
        }
    }
}

/// The range found by [`parse_until`]: `src[start..end]` is the expression
/// and `end` is the byte offset of the delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: usize,
    pub end: usize,
}

pub fn closing(open: char) -> Option<char> {
    match open {
        '(' => Some(')'),
        '[' => Some(']'),
        '{' => Some('}'),
        _ => None,
    }
}

impl NestingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inside a bracket, string or comment.
    pub fn is_nesting(&self) -> bool {
        !self.stack.is_empty()
    }

    pub fn is_string(&self) -> bool {
        matches!(self.stack.last(), Some(Frame::Quote(_)))
    }

    pub fn is_comment(&self) -> bool {
        matches!(
            self.stack.last(),
            Some(Frame::LineComment | Frame::BlockComment)
        )
    }

    /// Feed one character.
    pub fn push(&mut self, c: char) -> Result<(), BracketErrorKind> {
        match self.stack.last().copied() {
            Some(Frame::Quote(quote)) => {
                if self.escaped {
                    self.escaped = false;
                } else if c == '\\' {
                    self.escaped = true;
                } else if c == quote {
                    self.stack.pop();
                }
            }
            Some(Frame::LineComment) => {
                if c == '\n' {
                    self.stack.pop();
                }
            }
            Some(Frame::BlockComment) => {
                if self.after_star && c == '/' {
                    self.stack.pop();
                    self.after_star = false;
                } else {
                    self.after_star = c == '*';
                }
            }
            Some(Frame::Bracket(_)) | None => {
                let after_slash = std::mem::take(&mut self.after_slash);
                match c {
                    '/' if after_slash => self.stack.push(Frame::LineComment),
                    '*' if after_slash => {
                        self.after_star = false;
                        self.stack.push(Frame::BlockComment);
                    }
                    '/' => self.after_slash = true,
                    '\'' | '"' | '`' => self.stack.push(Frame::Quote(c)),
                    '(' | '[' | '{' => {
                        if let Some(close) = closing(c) {
                            self.stack.push(Frame::Bracket(close));
                        }
                    }
                    ')' | ']' | '}' => match self.stack.last() {
                        Some(Frame::Bracket(expected)) if *expected == c => {
                            self.stack.pop();
                        }
                        Some(Frame::Bracket(expected)) => {
                            return Err(BracketErrorKind::Mismatched {
                                found: c,
                                expected: Some(*expected),
                            });
                        }
                        _ => {
                            return Err(BracketErrorKind::Mismatched {
                                found: c,
                                expected: None,
                            });
                        }
                    },
                    _ => {}
                }
            }
        }
        Ok(())
    }
}

/// Nesting state after feeding all of `src`, or the first bracket error.
pub fn parse(src: &str) -> Result<NestingState, BracketError> {
    let mut state = NestingState::new();
    for (index, c) in src.char_indices() {
        state
            .push(c)
            .map_err(|kind| BracketError { kind, index })?;
    }
    Ok(state)
}

/// Scan `src` from byte offset `start` until `delimiter` appears outside of
/// any bracket, string or comment.
pub fn parse_until(src: &str, delimiter: char, start: usize) -> Result<Range, BracketError> {
    let mut state = NestingState::new();
    for (offset, c) in src[start..].char_indices() {
        let index = start + offset;
        if !state.is_nesting() && c == delimiter {
            return Ok(Range { start, end: index });
        }
        state
            .push(c)
            .map_err(|kind| BracketError { kind, index })?;
    }
    Err(BracketError {
        kind: BracketErrorKind::EndOfString,
        index: src.len(),
    })
}

/// Whether `src` is plausibly a complete expression: non-empty, balanced,
/// and not left inside a string or block comment.
///
/// Full JavaScript validation belongs to the code generator; this only
/// catches the structural mistakes the lexer can see.
pub fn is_balanced_expression(src: &str) -> bool {
    if src.trim().is_empty() {
        return false;
    }
    match parse(src) {
        Ok(state) => {
            !state.is_nesting() || state.stack.as_slice() == [Frame::LineComment]
        }
        Err(_) => false,
    }
}

/// Characters that continue an expression when they follow whitespace.
pub fn is_punctuator(c: char) -> bool {
    matches!(
        c,
        '.' | '(' | ')' | ';' | ',' | '{' | '}' | '[' | ']' | ':' | '?' | '~' | '%' | '&' | '*'
            | '+' | '-' | '/' | '<' | '>' | '^' | '|' | '!' | '='
    )
}

/// Whether an attribute value scanned so far can end here.
///
/// Used to decide if whitespace or a comma terminates the value: the value
/// must be balanced, must not end in a binary operator, and must not have an
/// open `?` without its `:`.
pub fn is_complete_value(src: &str) -> bool {
    if !is_balanced_expression(src) {
        return false;
    }
    let trimmed = src.trim_end();
    if let Some(last) = trimmed.chars().last() {
        if is_punctuator(last) && !matches!(last, ')' | ']' | '}') {
            return false;
        }
    }
    let mut state = NestingState::new();
    let mut pending_ternaries = 0usize;
    for c in trimmed.chars() {
        let top_level = !state.is_nesting();
        if top_level && c == '?' {
            pending_ternaries += 1;
        } else if top_level && c == ':' && pending_ternaries > 0 {
            pending_ternaries -= 1;
        }
        if state.push(c).is_err() {
            return false;
        }
    }
    pending_ternaries == 0
}
