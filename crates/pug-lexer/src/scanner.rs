use crate::brackets::{self, BracketErrorKind, Range};
use crate::error::{ErrorCode, PugError};
use crate::location::{Location, Position};
use crate::plugin::LexerPlugin;
use crate::token::{Token, TokenKind};
use crate::LexerOptions;
use log::trace;

/// Lexical sub-state of the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerMode {
    /// Ordinary template lines.
    Default,
    /// Inside a `(...)` attribute list.
    Attributes,
    /// Inside `#[...]` tag interpolation. Input ends at the matching `]`.
    Interpolation,
    /// Consuming the verbatim body of a filter, comment, block code or
    /// dot-marked tag.
    PipelessText,
}

/// The tokenizer rules, one per lexical construct.
///
/// Plugins are offered each rule before the built-in implementation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    Blank,
    Eos,
    EndInterpolation,
    Yield,
    Doctype,
    Interpolation,
    Case,
    When,
    Default,
    Extends,
    Append,
    Prepend,
    Block,
    MixinBlock,
    Include,
    IncludeFilter,
    Mixin,
    Call,
    Conditional,
    EachOf,
    Each,
    While,
    Tag,
    Filter,
    BlockCode,
    Code,
    Id,
    Dot,
    ClassName,
    Attrs,
    AttributesBlock,
    Indent,
    Text,
    TextHtml,
    Comment,
    Slash,
    Colon,
    Path,
    PipelessText,
}

/// Rules tried, in order, at the start of every scanning step. The first
/// rule that matches wins; if none does the input is rejected.
pub const DEFAULT_RULES: &[Rule] = &[
    Rule::Blank,
    Rule::Eos,
    Rule::EndInterpolation,
    Rule::Yield,
    Rule::Doctype,
    Rule::Interpolation,
    Rule::Case,
    Rule::When,
    Rule::Default,
    Rule::Extends,
    Rule::Append,
    Rule::Prepend,
    Rule::Block,
    Rule::MixinBlock,
    Rule::Include,
    Rule::Mixin,
    Rule::Call,
    Rule::Conditional,
    Rule::EachOf,
    Rule::Each,
    Rule::While,
    Rule::Tag,
    Rule::Filter,
    Rule::BlockCode,
    Rule::Code,
    Rule::Id,
    Rule::Dot,
    Rule::ClassName,
    Rule::Attrs,
    Rule::AttributesBlock,
    Rule::Indent,
    Rule::Text,
    Rule::TextHtml,
    Rule::Comment,
    Rule::Slash,
    Rule::Colon,
];

/// One level of indentation, fixed by the first indented line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IndentUnit {
    ch: char,
    width: usize,
}

impl IndentUnit {
    fn describe(&self) -> &'static str {
        if self.ch == '\t' {
            "tabs"
        } else {
            "spaces"
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Indentation {
    unit: Option<IndentUnit>,
    depth: usize,
}

impl Indentation {
    /// Width in characters of the current nesting level.
    fn width(&self) -> usize {
        self.unit.map_or(0, |unit| unit.width * self.depth)
    }
}

/// Pug source scanner.
///
/// Holds all mutable lexing state for one document: the unconsumed input,
/// the current line and column, the indentation level and the tokens
/// produced so far. Tokenizer rules live in `impl` blocks spread over the
/// `rules`, `attrs` and `text` modules.
pub struct Scanner<'p> {
    input: String,
    pos: usize,
    original: String,
    source_id: Option<String>,
    pub(crate) line: usize,
    pub(crate) column: usize,
    pub(crate) mode: ScannerMode,
    pub(crate) interpolated: bool,
    pub(crate) interpolation_allowed: bool,
    pub(crate) ended: bool,
    indent: Indentation,
    tokens: Vec<Token>,
    plugins: &'p [Box<dyn LexerPlugin>],
}

impl<'p> Scanner<'p> {
    /// Create a scanner for a whole document.
    pub fn new(source: &str, options: &'p LexerOptions) -> Self {
        let normalized = normalize(source);
        Self {
            input: normalized.clone(),
            pos: 0,
            original: normalized,
            source_id: options.source_id.clone(),
            line: options.starting_line,
            column: options.starting_column,
            mode: ScannerMode::Default,
            interpolated: false,
            interpolation_allowed: true,
            ended: false,
            indent: Indentation::default(),
            tokens: Vec::new(),
            plugins: &options.plugins,
        }
    }

    /// A scanner for the body of a `#[...]` interpolation starting at the
    /// current position.
    pub(crate) fn interpolation_child(&self, input: String) -> Scanner<'p> {
        Scanner {
            input,
            pos: 0,
            original: self.original.clone(),
            source_id: self.source_id.clone(),
            line: self.line,
            column: self.column,
            mode: ScannerMode::Interpolation,
            interpolated: true,
            interpolation_allowed: true,
            ended: false,
            indent: Indentation::default(),
            tokens: Vec::new(),
            plugins: self.plugins,
        }
    }

    /// Tokenize the entire input.
    pub fn tokenize(mut self) -> Result<Vec<Token>, PugError> {
        self.run()?;
        Ok(self.tokens)
    }

    pub(crate) fn run(&mut self) -> Result<(), PugError> {
        while !self.ended {
            self.advance()?;
        }
        Ok(())
    }

    pub(crate) fn take_tokens(&mut self) -> Vec<Token> {
        std::mem::take(&mut self.tokens)
    }

    pub(crate) fn extend_tokens(&mut self, tokens: Vec<Token>) {
        self.tokens.extend(tokens);
    }

    fn advance(&mut self) -> Result<(), PugError> {
        for &rule in DEFAULT_RULES {
            if self.call_rule(rule)? {
                return Ok(());
            }
        }
        let snippet: String = self.rest().chars().take(5).collect();
        Err(self.error(
            ErrorCode::UnexpectedText,
            format!("unexpected text \"{snippet}\""),
        ))
    }

    /// Run one rule, offering it to the plugins first.
    pub fn call_rule(&mut self, rule: Rule) -> Result<bool, PugError> {
        let plugins = self.plugins;
        for plugin in plugins {
            if plugin.tokenize(rule, self)? {
                return Ok(true);
            }
        }

        match rule {
            Rule::Blank => Ok(self.blank()),
            Rule::Eos => self.eos(),
            Rule::EndInterpolation => Ok(self.end_interpolation()),
            Rule::Yield => Ok(self.yield_statement()),
            Rule::Doctype => Ok(self.doctype()),
            Rule::Interpolation => self.interpolation(),
            Rule::Case => self.case(),
            Rule::When => self.when(),
            Rule::Default => self.default_case(),
            Rule::Extends => self.extends(),
            Rule::Append => Ok(self.append()),
            Rule::Prepend => Ok(self.prepend()),
            Rule::Block => Ok(self.block()),
            Rule::MixinBlock => Ok(self.mixin_block()),
            Rule::Include => self.include(),
            Rule::IncludeFilter => self.filter(true),
            Rule::Mixin => Ok(self.mixin()),
            Rule::Call => self.call(),
            Rule::Conditional => self.conditional(),
            Rule::EachOf => self.each_of(),
            Rule::Each => self.each(),
            Rule::While => self.while_loop(),
            Rule::Tag => Ok(self.tag()),
            Rule::Filter => self.filter(false),
            Rule::BlockCode => self.block_code(),
            Rule::Code => self.code(),
            Rule::Id => self.id(),
            Rule::Dot => self.dot(),
            Rule::ClassName => self.class_name(),
            Rule::Attrs => self.attrs(),
            Rule::AttributesBlock => self.attributes_block(),
            Rule::Indent => self.indent(),
            Rule::Text => self.text(),
            Rule::TextHtml => self.text_html(),
            Rule::Comment => self.comment(),
            Rule::Slash => Ok(self.slash()),
            Rule::Colon => Ok(self.colon()),
            Rule::Path => Ok(self.path()),
            Rule::PipelessText => self.pipeless_text(None),
        }
    }

    // =========================================================================
    // Input and position
    // =========================================================================

    /// The unconsumed input.
    pub fn rest(&self) -> &str {
        &self.input[self.pos..]
    }

    /// Drop `len` bytes of input without moving the column.
    pub fn consume(&mut self, len: usize) {
        self.pos = (self.pos + len).min(self.input.len());
    }

    /// Put `text` back in front of the unconsumed input.
    pub(crate) fn unshift_input(&mut self, text: &str) {
        let mut input = String::with_capacity(text.len() + self.rest().len());
        input.push_str(text);
        input.push_str(self.rest());
        self.input = input;
        self.pos = 0;
    }

    pub fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    pub fn mode(&self) -> ScannerMode {
        self.mode
    }

    pub fn is_interpolated(&self) -> bool {
        self.interpolated
    }

    pub fn advance_column(&mut self, chars: usize) {
        self.column += chars;
    }

    pub fn new_line(&mut self) {
        self.line += 1;
        self.column = 1;
    }

    /// Move past `text`, counting lines and columns.
    pub(crate) fn advance_over(&mut self, text: &str) {
        for c in text.chars() {
            self.step(c);
        }
    }

    pub(crate) fn step(&mut self, c: char) {
        if c == '\n' {
            self.new_line();
        } else {
            self.column += 1;
        }
    }

    /// Push a token spanning from `start` to the current position.
    pub fn push(&mut self, kind: TokenKind, start: Position) {
        let end = self.position();
        self.push_span(kind, start, end);
    }

    pub(crate) fn push_span(&mut self, kind: TokenKind, start: Position, end: Position) {
        let loc = Location::new(start, end, self.source_id.clone());
        self.tokens.push(Token::new(kind, loc));
    }

    pub fn error(&self, code: ErrorCode, message: impl Into<String>) -> PugError {
        self.error_at(code, message, self.position())
    }

    pub fn error_at(&self, code: ErrorCode, message: impl Into<String>, at: Position) -> PugError {
        PugError::new(code, message, at.line, at.column)
            .with_source_id(self.source_id.clone())
            .with_src(Some(self.original.clone()))
    }

    /// Reject `src` unless it is a structurally complete expression.
    pub(crate) fn assert_expression(&self, src: &str) -> Result<(), PugError> {
        self.check_expression(src, self.position())
    }

    pub(crate) fn check_expression(&self, src: &str, at: Position) -> Result<(), PugError> {
        if brackets::is_balanced_expression(src) {
            Ok(())
        } else {
            Err(self.error_at(
                ErrorCode::SyntaxError,
                format!("Syntax Error: `{}` is not a valid expression", src.trim()),
                at,
            ))
        }
    }

    /// Find the bracket that closes the one at byte `skip` of the input.
    ///
    /// On failure the position is moved to the offending character before
    /// the error is raised.
    pub(crate) fn bracket_expression(&mut self, skip: usize) -> Result<Range, PugError> {
        let rest = self.rest();
        let Some(close) = rest[skip..].chars().next().and_then(brackets::closing) else {
            return Err(self.error(ErrorCode::SyntaxError, "expected a bracketed expression"));
        };
        match brackets::parse_until(rest, close, skip + 1) {
            Ok(range) => Ok(range),
            Err(err) => {
                let before = rest[..err.index.min(rest.len())].to_string();
                let message = err.message(close);
                self.advance_over(&before);
                let code = match err.kind {
                    BracketErrorKind::EndOfString => ErrorCode::NoEndBracket,
                    BracketErrorKind::Mismatched { .. } => ErrorCode::BracketMismatch,
                };
                Err(self.error(code, message))
            }
        }
    }

    /// Accept a construct of `len` bytes at the start of the input when only
    /// whitespace or a block-expansion `:` follows it on the line.
    ///
    /// Leading spaces of the construct are skipped before the token starts.
    /// Returns the token start; the column is left at the token end.
    pub(crate) fn end_of_line(&mut self, len: usize) -> Option<Position> {
        let rest = self.rest();
        let matched = &rest[..len];
        let lead = matched.len() - matched.trim_start_matches(' ').len();
        let after = &rest[len..];
        let trailing = if after.starts_with(':') {
            0
        } else {
            let ws = leading_blanks(after);
            if !at_line_end(&after[ws..]) {
                return None;
            }
            ws
        };
        let chars = matched[lead..].chars().count();

        self.advance_column(lead);
        let start = self.position();
        self.consume(len + trailing);
        self.advance_column(chars);
        Some(start)
    }

    // =========================================================================
    // Structure
    // =========================================================================

    fn blank(&mut self) -> bool {
        let Some(line) = self.rest().strip_prefix('\n') else {
            return false;
        };
        let ws = leading_blanks(line);
        if !line[ws..].starts_with('\n') {
            return false;
        }
        self.consume(1 + ws);
        self.new_line();
        true
    }

    fn eos(&mut self) -> Result<bool, PugError> {
        if !self.rest().is_empty() {
            return Ok(false);
        }
        if self.interpolated {
            return Err(self.error(
                ErrorCode::NoEndBracket,
                "End of line was reached with no closing bracket for interpolation.",
            ));
        }
        let here = self.position();
        for _ in 0..self.indent.depth {
            self.push_span(TokenKind::Outdent, here, here);
        }
        self.indent.depth = 0;
        self.push_span(TokenKind::Eos, here, here);
        self.ended = true;
        Ok(true)
    }

    fn end_interpolation(&mut self) -> bool {
        if self.interpolated && self.rest().starts_with(']') {
            self.consume(1);
            self.ended = true;
            return true;
        }
        false
    }

    /// The whitespace character that indents `line`: the established unit
    /// if there is one, else whatever the line starts with.
    fn indent_char(&self, line: &str) -> Option<char> {
        match self.indent.unit {
            Some(unit) => Some(unit.ch),
            None => line.chars().next().filter(|&c| c == ' ' || c == '\t'),
        }
    }

    fn measure_indent(&self, line: &str) -> usize {
        self.indent_char(line)
            .map_or(0, |ch| line.chars().take_while(|&c| c == ch).count())
    }

    fn indent(&mut self) -> Result<bool, PugError> {
        let Some(line) = self.rest().strip_prefix('\n') else {
            return Ok(false);
        };
        let ch = self.indent_char(line);
        let width = self.measure_indent(line);
        let prefix = leading_blanks(line);
        let blank = at_line_end(&line[prefix..]);

        self.new_line();
        self.interpolation_allowed = true;

        if blank {
            self.consume(1 + prefix);
            return Ok(true);
        }
        self.consume(1 + width);
        if prefix > width {
            return Err(self.error_at(
                ErrorCode::InvalidIndentation,
                "Invalid indentation, you can use tabs or spaces but not both",
                Position::new(self.line, prefix),
            ));
        }

        let unit = match (self.indent.unit, ch) {
            (Some(unit), _) => Some(unit),
            (None, Some(ch)) if width > 0 => {
                let unit = IndentUnit { ch, width };
                trace!("indent unit is {width} {}", unit.describe());
                self.indent.unit = Some(unit);
                Some(unit)
            }
            _ => None,
        };
        let level = match unit {
            Some(unit) if width % unit.width != 0 => {
                return Err(self.error_at(
                    ErrorCode::InconsistentIndentation,
                    format!(
                        "Inconsistent indentation. Expecting a multiple of {} {}, found {width}.",
                        unit.width,
                        unit.describe()
                    ),
                    Position::new(self.line, width),
                ));
            }
            Some(unit) => width / unit.width,
            None => 0,
        };
        let depth = self.indent.depth;
        if level > depth + 1 {
            return Err(self.error_at(
                ErrorCode::InvalidIndentation,
                format!(
                    "Invalid indentation, expected at most {} levels but found {level}",
                    depth + 1
                ),
                Position::new(self.line, width),
            ));
        }

        let start = self.position();
        self.column = 1 + width;
        if level > depth {
            trace!("indent to level {level} at line {}", self.line);
            self.push(TokenKind::Indent { val: width }, start);
        } else if level < depth {
            trace!("outdent to level {level} at line {}", self.line);
            for _ in level..depth {
                self.push(TokenKind::Outdent, start);
            }
        } else {
            self.push(TokenKind::Newline, start);
        }
        self.indent.depth = level;
        Ok(true)
    }

    /// Consume every following line indented deeper than the current level
    /// as verbatim text.
    ///
    /// `forced` fixes the number of indentation characters stripped from each
    /// line; it is used when a later line turns out to be indented less than
    /// the first one and scanning restarts.
    pub(crate) fn pipeless_text(&mut self, forced: Option<usize>) -> Result<bool, PugError> {
        while self.call_rule(Rule::Blank)? {}

        let Some(first) = self.rest().strip_prefix('\n') else {
            return Ok(false);
        };
        let ch = self.indent_char(first);
        let measure = |line: &str| ch.map_or(0, |ch| line.chars().take_while(|&c| c == ch).count());
        let indents = forced.unwrap_or_else(|| measure(first));
        let current = self.indent.width();
        if indents <= current {
            return Ok(false);
        }

        let rest = self.rest();
        let mut lines: Vec<(String, bool)> = Vec::new();
        let mut ptr = 0;
        while ptr < rest.len() {
            let body = &rest[ptr + 1..];
            let line = body.split('\n').next().unwrap_or_default();
            let line_indent = measure(line);
            let indented = line_indent >= indents;
            if indented || line.trim().is_empty() {
                ptr += line.len() + 1;
                lines.push((skip_chars(line, indents).to_string(), indented));
            } else if line_indent > current {
                trace!("retrying pipeless text with indent {line_indent}");
                return self.pipeless_text(Some(line_indent));
            } else {
                break;
            }
        }

        let outer = std::mem::replace(&mut self.mode, ScannerMode::PipelessText);
        let here = self.position();
        self.push_span(TokenKind::StartPipelessText, here, here);
        self.consume(ptr);
        if self.rest().is_empty() {
            while lines.last().is_some_and(|(line, _)| line.is_empty()) {
                lines.pop();
            }
        }
        for (i, (line, indented)) in lines.into_iter().enumerate() {
            self.new_line();
            let start = self.position();
            if indented {
                self.advance_column(indents);
            }
            if i != 0 {
                self.push(TokenKind::Newline, start);
            }
            self.add_text(false, &line, "", 0)?;
        }
        let here = self.position();
        self.push_span(TokenKind::EndPipelessText, here, here);
        self.mode = outer;
        Ok(true)
    }
}

/// Strip a leading byte order mark and normalize line endings to `\n`.
pub(crate) fn normalize(source: &str) -> String {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    source.replace("\r\n", "\n").replace('\r', "\n")
}

/// Byte length of the leading run of spaces and tabs.
pub(crate) fn leading_blanks(s: &str) -> usize {
    s.len() - s.trim_start_matches([' ', '\t']).len()
}

/// Byte length of the leading run of spaces.
pub(crate) fn leading_spaces(s: &str) -> usize {
    s.len() - s.trim_start_matches(' ').len()
}

pub(crate) fn at_line_end(s: &str) -> bool {
    s.is_empty() || s.starts_with('\n')
}

/// The text up to (not including) the next newline.
pub(crate) fn line_of(s: &str) -> &str {
    s.split('\n').next().unwrap_or_default()
}

pub(crate) fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Whether `s` starts with `word` followed by a word boundary.
pub(crate) fn word_at(s: &str, word: &str) -> bool {
    s.strip_prefix(word)
        .is_some_and(|after| !after.chars().next().is_some_and(is_word_char))
}

/// Byte length of the leading run of characters matching `pred`.
pub(crate) fn span_of(s: &str, pred: impl Fn(char) -> bool) -> usize {
    s.char_indices()
        .find(|&(_, c)| !pred(c))
        .map_or(s.len(), |(i, _)| i)
}

fn skip_chars(s: &str, n: usize) -> &str {
    s.char_indices().nth(n).map_or("", |(i, _)| &s[i..])
}
