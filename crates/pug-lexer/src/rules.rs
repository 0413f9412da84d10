//! Line-level tokenizer rules: keywords, elements, code and comments.

use crate::brackets;
use crate::error::{ErrorCode, PugError};
use crate::location::Position;
use crate::scanner::{
    at_line_end, is_word_char, leading_blanks, leading_spaces, line_of, span_of, word_at, Rule,
    Scanner,
};
use crate::token::{BlockMode, TokenKind};

/// Matches `keyword +VALUE` where VALUE runs to the end of the line.
/// Returns the byte length of the match and the byte offset of VALUE.
fn keyword_line(rest: &str, keyword: &str) -> Option<(usize, usize)> {
    let after = rest.strip_prefix(keyword)?;
    let spaces = leading_spaces(after);
    let value = line_of(&after[spaces..]);
    if spaces == 0 || value.is_empty() {
        return None;
    }
    let value_at = keyword.len() + spaces;
    Some((value_at + value.len(), value_at))
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn identifier_len(s: &str) -> usize {
    if !s.chars().next().is_some_and(is_identifier_start) {
        return 0;
    }
    span_of(s, |c| is_word_char(c) || c == '$')
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && identifier_len(s) == s.len()
}

/// `[key, value]` destructuring in `each ... of`.
fn is_identifier_pair(s: &str) -> bool {
    let Some(inner) = s.strip_prefix('[').and_then(|s| s.strip_suffix(']')) else {
        return false;
    };
    let mut parts = inner.split(',');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(key), Some(value), None) => {
            is_identifier(key.trim_matches(' ')) && is_identifier(value.trim_matches(' '))
        }
        _ => false,
    }
}

struct EachMatch<'a> {
    val: &'a str,
    key: Option<&'a str>,
    code_at: usize,
    len: usize,
}

fn loop_keyword_len(rest: &str) -> Option<usize> {
    if rest.starts_with("each") {
        Some(4)
    } else if rest.starts_with("for") {
        Some(3)
    } else {
        None
    }
}

/// `each VALUE[, KEY] in EXPR` (or `for ...`).
fn match_each(rest: &str) -> Option<EachMatch<'_>> {
    let line = line_of(rest);
    let mut i = loop_keyword_len(line)?;

    let spaces = leading_spaces(&line[i..]);
    if spaces == 0 {
        return None;
    }
    i += spaces;
    let n = identifier_len(&line[i..]);
    if n == 0 {
        return None;
    }
    let val = &line[i..i + n];
    i += n;

    let mut key = None;
    let comma = i + leading_spaces(&line[i..]);
    if line[comma..].starts_with(',') {
        let k = comma + 1 + leading_spaces(&line[comma + 1..]);
        let m = identifier_len(&line[k..]);
        if m > 0 {
            key = Some(&line[k..k + m]);
            i = k + m;
        }
    }

    let spaces = leading_spaces(&line[i..]);
    if spaces == 0 || !line[i + spaces..].starts_with("in") {
        return None;
    }
    i += spaces + 2;
    i += leading_spaces(&line[i..]);
    if line[i..].is_empty() {
        return None;
    }
    Some(EachMatch {
        val,
        key,
        code_at: i,
        len: line.len(),
    })
}

/// `each VALUE of EXPR` (or `for ...`). Returns the byte range of VALUE,
/// the offset of EXPR and the length of the match.
fn match_each_of(rest: &str) -> Option<(usize, usize, usize, usize)> {
    let line = line_of(rest);
    let keyword = loop_keyword_len(line)?;
    if !line[keyword..].starts_with(' ') {
        return None;
    }
    let val_at = keyword + 1;
    let mut search = val_at;
    while let Some(found) = line[search..].find(" of") {
        let of_at = search + found;
        let after = &line[of_at + 3..];
        let spaces = leading_spaces(after);
        if spaces > 0 && !after[spaces..].is_empty() {
            return Some((val_at, of_at, of_at + 3 + spaces, line.len()));
        }
        search = of_at + 1;
    }
    None
}

/// `- each x in xs`: a loop written as code.
fn is_dashed_loop(rest: &str, separator: &str) -> bool {
    let Some(after) = rest.strip_prefix('-') else {
        return false;
    };
    let after = &after[leading_spaces(after)..];
    (word_at(after, "each") || word_at(after, "for")) && line_of(after).contains(separator)
}

/// The offending selector text after `#` or `.`.
fn invalid_selector(s: &str) -> &str {
    match s.chars().next() {
        None | Some('\n') => "",
        Some(first) => {
            let first = first.len_utf8();
            let n = span_of(&s[first..], |c| {
                !matches!(c, ' ' | '\t' | '(' | '#' | '.' | ':' | '\n')
            });
            &s[..first + n]
        }
    }
}

/// `name = ...` at the start of a parenthesised list means attributes, not
/// mixin arguments.
fn looks_like_attributes(src: &str) -> bool {
    let src = src.trim_start();
    let name = span_of(src, |c| is_word_char(c) || c == '-');
    name > 0 && src[name..].trim_start_matches(' ').starts_with('=')
}

impl<'p> Scanner<'p> {
    /// A keyword that must stand alone on its line (or be followed by `:`).
    fn standalone(&mut self, keyword: &str, kind: TokenKind) -> bool {
        if !self.rest().starts_with(keyword) {
            return false;
        }
        match self.end_of_line(keyword.len()) {
            Some(start) => {
                self.push(kind, start);
                true
            }
            None => false,
        }
    }

    pub(crate) fn yield_statement(&mut self) -> bool {
        self.standalone("yield", TokenKind::Yield)
    }

    pub(crate) fn doctype(&mut self) -> bool {
        let rest = self.rest();
        if !word_at(rest, "doctype") {
            return false;
        }
        let line = line_of(rest);
        let val = line["doctype".len()..].trim().to_string();
        match self.end_of_line(line.len()) {
            Some(start) => {
                self.push(TokenKind::Doctype { val }, start);
                true
            }
            None => false,
        }
    }

    pub(crate) fn interpolation(&mut self) -> Result<bool, PugError> {
        if !self.rest().starts_with("#{") {
            return Ok(false);
        }
        let range = self.bracket_expression(1)?;
        let src = self.rest()[range.start..range.end].to_string();
        let start = self.position();
        self.consume(range.end + 1);
        self.advance_column(2);
        self.assert_expression(&src)?;
        self.advance_over(&src);
        self.advance_column(1);
        self.push(TokenKind::Interpolation { val: src }, start);
        Ok(true)
    }

    pub(crate) fn case(&mut self) -> Result<bool, PugError> {
        let Some((len, value_at)) = keyword_line(self.rest(), "case") else {
            if word_at(self.rest(), "case") {
                return Err(self.error(ErrorCode::NoCaseExpression, "missing expression for case"));
            }
            return Ok(false);
        };
        let val = self.rest()[value_at..len].to_string();
        let Some(start) = self.end_of_line(len) else {
            return Ok(false);
        };
        self.check_expression(&val, Position::new(start.line, start.column + value_at))?;
        self.push(TokenKind::Case { val }, start);
        Ok(true)
    }

    pub(crate) fn when(&mut self) -> Result<bool, PugError> {
        let rest = self.rest();
        let matched = rest.strip_prefix("when").and_then(|after| {
            let spaces = leading_spaces(after);
            let value_len = span_of(&after[spaces..], |c| c != ':' && c != '\n');
            (spaces > 0 && value_len > 0).then_some((4 + spaces, value_len))
        });
        let Some((value_at, value_len)) = matched else {
            if word_at(rest, "when") {
                return Err(self.error(ErrorCode::NoWhenExpression, "missing expression for when"));
            }
            return Ok(false);
        };
        let mut val = rest[value_at..value_at + value_len].to_string();
        let Some(start) = self.end_of_line(value_at + value_len) else {
            return Ok(false);
        };

        // A `:` inside brackets or a string belongs to the expression.
        while brackets::parse(&val).is_ok_and(|state| state.is_nesting()) {
            let rest = self.rest();
            let Some(after) = rest.strip_prefix(':') else {
                break;
            };
            let more = span_of(after, |c| c != ':' && c != '\n');
            if more == 0 {
                break;
            }
            let piece = &rest[..1 + more];
            let chars = piece.chars().count();
            val.push_str(piece);
            self.consume(1 + more);
            self.advance_column(chars);
        }

        self.check_expression(&val, Position::new(start.line, start.column + value_at))?;
        self.push(TokenKind::When { val }, start);
        Ok(true)
    }

    pub(crate) fn default_case(&mut self) -> Result<bool, PugError> {
        if self.standalone("default", TokenKind::Default) {
            return Ok(true);
        }
        if word_at(self.rest(), "default") {
            return Err(self.error(
                ErrorCode::DefaultWithExpression,
                "default should not have an expression",
            ));
        }
        Ok(false)
    }

    pub(crate) fn extends(&mut self) -> Result<bool, PugError> {
        let rest = self.rest();
        let keyword = if rest.starts_with("extends") {
            "extends"
        } else if rest.starts_with("extend") {
            "extend"
        } else {
            return Ok(false);
        };
        let after = &rest[keyword.len()..];
        if !(at_line_end(after) || after.starts_with(' ')) {
            if word_at(rest, keyword) {
                return Err(self.error(ErrorCode::MalformedExtends, "malformed extends"));
            }
            return Ok(false);
        }

        let start = self.position();
        self.consume(keyword.len());
        self.advance_column(keyword.len());
        self.push(TokenKind::Extends, start);
        if !self.call_rule(Rule::Path)? {
            return Err(self.error(ErrorCode::NoExtendsPath, "missing path for extends"));
        }
        Ok(true)
    }

    pub(crate) fn append(&mut self) -> bool {
        self.block_modifier("append", BlockMode::Append)
    }

    pub(crate) fn prepend(&mut self) -> bool {
        self.block_modifier("prepend", BlockMode::Prepend)
    }

    /// `append NAME`, `prepend NAME`, and their `block append NAME` forms.
    fn block_modifier(&mut self, keyword: &str, mode: BlockMode) -> bool {
        let rest = self.rest();
        let mut offset = 0;
        if let Some(after) = rest.strip_prefix("block") {
            let spaces = leading_spaces(after);
            if spaces > 0 {
                offset = 5 + spaces;
            }
        }
        if !rest[offset..].starts_with(keyword) {
            return false;
        }
        let name_at = offset + keyword.len();
        let spaces = leading_spaces(&rest[name_at..]);
        if spaces == 0 {
            return false;
        }
        self.named_block(name_at + spaces, mode)
    }

    pub(crate) fn block(&mut self) -> bool {
        let Some(after) = self.rest().strip_prefix("block") else {
            return false;
        };
        let spaces = leading_spaces(after);
        if spaces == 0 {
            return false;
        }
        self.named_block(5 + spaces, BlockMode::Replace)
    }

    /// The block name runs to the end of the line or to a `//` comment,
    /// which is left in the input.
    fn named_block(&mut self, name_at: usize, mode: BlockMode) -> bool {
        let rest = self.rest();
        let line = line_of(&rest[name_at..]);
        let head = line.find("//").map_or(line, |i| &line[..i]);
        let name = head.trim();
        if name.is_empty() {
            return false;
        }
        let name = name.to_string();
        let name_end = name_at + head.trim_end().len();
        let consumed = name_at + head.len();
        let name_chars = rest[..name_end].chars().count();
        let trailing = rest[name_end..consumed].chars().count();

        let start = self.position();
        self.consume(consumed);
        self.advance_column(name_chars);
        self.push(TokenKind::Block { val: name, mode }, start);
        self.advance_column(trailing);
        true
    }

    pub(crate) fn mixin_block(&mut self) -> bool {
        self.standalone("block", TokenKind::MixinBlock)
    }

    pub(crate) fn include(&mut self) -> Result<bool, PugError> {
        let rest = self.rest();
        let boundary = rest
            .strip_prefix("include")
            .is_some_and(|after| at_line_end(after) || after.starts_with([':', ' ']));
        if !boundary {
            if word_at(rest, "include") {
                return Err(self.error(ErrorCode::MalformedInclude, "malformed include"));
            }
            return Ok(false);
        }

        let start = self.position();
        self.consume(7);
        self.advance_column(7);
        self.push(TokenKind::Include, start);
        while self.call_rule(Rule::IncludeFilter)? {}
        if !self.call_rule(Rule::Path)? {
            let rest = self.rest();
            if !rest.is_empty() && !rest.starts_with([' ', '\n']) {
                let snippet: String = rest.chars().take(5).collect();
                return Err(self.error(
                    ErrorCode::UnexpectedText,
                    format!("unexpected text \"{snippet}\""),
                ));
            }
            return Err(self.error(ErrorCode::NoIncludePath, "missing path for include"));
        }
        Ok(true)
    }

    pub(crate) fn path(&mut self) -> bool {
        let Some(after) = self.rest().strip_prefix(' ') else {
            return false;
        };
        let line = line_of(after);
        let val = line.trim();
        if val.is_empty() {
            return false;
        }
        let val = val.to_string();
        match self.end_of_line(1 + line.len()) {
            Some(start) => {
                self.push(TokenKind::Path { val }, start);
                true
            }
            None => false,
        }
    }

    pub(crate) fn mixin(&mut self) -> bool {
        let rest = self.rest();
        let Some(after) = rest.strip_prefix("mixin") else {
            return false;
        };
        let spaces = leading_spaces(after);
        let name_len = span_of(&after[spaces..], |c| is_word_char(c) || c == '-');
        if spaces == 0 || name_len == 0 {
            return false;
        }
        let name_at = 5 + spaces;
        let name = rest[name_at..name_at + name_len].to_string();
        let mut len = name_at + name_len;

        let mut args = None;
        let gap = leading_spaces(&rest[len..]);
        let line = line_of(&rest[len + gap..]);
        if line.starts_with('(') {
            if let Some(close) = line.rfind(')') {
                args = Some(line[1..close].to_string()).filter(|a| !a.is_empty());
                len += gap + close + 1;
            }
        }
        len += leading_spaces(&rest[len..]);
        let chars = rest[..len].chars().count();

        let start = self.position();
        self.consume(len);
        self.advance_column(chars);
        self.push(TokenKind::Mixin { val: name, args }, start);
        true
    }

    pub(crate) fn call(&mut self) -> Result<bool, PugError> {
        let rest = self.rest();
        let Some(after) = rest.strip_prefix('+') else {
            return Ok(false);
        };
        let ws = span_of(after, char::is_whitespace);
        let body = &after[ws..];
        let name_len = span_of(body, |c| is_word_char(c) || c == '-');

        let start = self.position();
        let (name, increment) = if name_len > 0 {
            (body[..name_len].to_string(), 1 + ws + name_len)
        } else if body.starts_with("#{") {
            let range = self.bracket_expression(2 + ws)?;
            let src = self.rest()[range.start..range.end].to_string();
            self.assert_expression(&src)?;
            (format!("#{{{src}}}"), range.end + 1)
        } else {
            return Ok(false);
        };
        let chars = self.rest()[..increment].chars().count();
        self.consume(increment);
        self.advance_column(chars);

        let mut args = None;
        let gap = leading_spaces(self.rest());
        if self.rest()[gap..].starts_with('(') {
            let range = self.bracket_expression(gap)?;
            let src = self.rest()[range.start..range.end].to_string();
            if !looks_like_attributes(&src) {
                self.advance_column(gap + 1);
                self.consume(range.end + 1);
                self.assert_expression(&format!("[{src}]"))?;
                self.advance_over(&src);
                self.advance_column(1);
                args = Some(src);
            }
        }
        self.push(TokenKind::Call { val: name, args }, start);
        Ok(true)
    }

    pub(crate) fn conditional(&mut self) -> Result<bool, PugError> {
        let rest = self.rest();
        let keyword = ["if", "unless", "else if", "else"]
            .into_iter()
            .find(|keyword| word_at(rest, keyword));
        let Some(keyword) = keyword else {
            return Ok(false);
        };
        let line = line_of(rest);
        let js = line[keyword.len()..].trim().to_string();
        let line_chars = line.chars().count();
        let js_chars = js.chars().count();

        let start = self.position();
        self.consume(line.len());
        self.advance_column(line_chars - js_chars);
        let kind = match keyword {
            "if" => {
                self.assert_expression(&js)?;
                TokenKind::If { val: js }
            }
            "unless" => {
                self.assert_expression(&js)?;
                TokenKind::If {
                    val: format!("!({js})"),
                }
            }
            "else if" => {
                self.assert_expression(&js)?;
                TokenKind::ElseIf { val: js }
            }
            _ => {
                if !js.is_empty() {
                    return Err(self.error(
                        ErrorCode::ElseCondition,
                        "`else` cannot have a condition, perhaps you meant `else if`",
                    ));
                }
                TokenKind::Else
            }
        };
        self.advance_column(js_chars);
        self.push(kind, start);
        Ok(true)
    }

    pub(crate) fn each_of(&mut self) -> Result<bool, PugError> {
        let rest = self.rest();
        let Some((val_at, val_end, code_at, len)) = match_each_of(rest) else {
            if is_dashed_loop(rest, " of ") {
                return Err(self.error(
                    ErrorCode::MalformedEach,
                    "Pug each and for should not be prefixed with a dash (\"-\"). They are pug keywords and not part of JavaScript.",
                ));
            }
            return Ok(false);
        };
        let val = rest[val_at..val_end].trim().to_string();
        let code = rest[code_at..len].to_string();
        let prefix_chars = rest[..code_at].chars().count();

        let start = self.position();
        self.consume(len);
        self.advance_column(prefix_chars);
        self.assert_expression(&code)?;
        self.advance_column(code.chars().count());
        let valid = is_identifier(&val) || is_identifier_pair(&val);
        self.push(TokenKind::EachOf { val, code }, start);
        if !valid {
            return Err(self.error(
                ErrorCode::MalformedEach,
                "The value variable for each must either be a valid identifier (e.g. `item`) or a pair of identifiers in square brackets (e.g. `[key, value]`).",
            ));
        }
        Ok(true)
    }

    pub(crate) fn each(&mut self) -> Result<bool, PugError> {
        let rest = self.rest();
        if let Some(m) = match_each(rest) {
            let val = m.val.to_string();
            let key = m.key.map(str::to_string);
            let (code_at, len) = (m.code_at, m.len);
            let code = rest[code_at..len].to_string();

            let start = self.position();
            self.consume(len);
            self.advance_column(code_at);
            self.assert_expression(&code)?;
            self.advance_column(code.chars().count());
            self.push(TokenKind::Each { val, key, code }, start);
            return Ok(true);
        }
        for keyword in ["each", "for"] {
            if word_at(rest, keyword) {
                return Err(self.error(
                    ErrorCode::MalformedEach,
                    format!(
                        "This `{keyword}` has a syntax error. `{keyword}` statements should be of the form: `{keyword} VARIABLE_NAME of JS_EXPRESSION`"
                    ),
                ));
            }
        }
        if is_dashed_loop(rest, " in ") {
            return Err(self.error(
                ErrorCode::MalformedEach,
                "Pug each and for should no longer be prefixed with a dash (\"-\"). They are pug keywords and not part of JavaScript.",
            ));
        }
        Ok(false)
    }

    pub(crate) fn while_loop(&mut self) -> Result<bool, PugError> {
        let Some((len, value_at)) = keyword_line(self.rest(), "while") else {
            if word_at(self.rest(), "while") {
                return Err(self.error(ErrorCode::NoWhileExpression, "missing expression for while"));
            }
            return Ok(false);
        };
        let val = self.rest()[value_at..len].to_string();
        let start = self.position();
        self.consume(len);
        self.advance_column(value_at);
        self.assert_expression(&val)?;
        self.advance_column(val.chars().count());
        self.push(TokenKind::While { val }, start);
        Ok(true)
    }

    pub(crate) fn tag(&mut self) -> bool {
        let rest = self.rest();
        let mut len = 0;
        for (i, c) in rest.char_indices() {
            if is_word_char(c) {
                len = i + 1;
            } else if i == 0 || !matches!(c, '-' | ':') {
                break;
            }
        }
        if len == 0 {
            return false;
        }
        let val = rest[..len].to_string();
        let start = self.position();
        self.consume(len);
        self.advance_column(len);
        self.push(TokenKind::Tag { val }, start);
        true
    }

    /// `:name` followed by optional attributes. Outside an include the
    /// filter body is pipeless text with interpolation disabled.
    pub(crate) fn filter(&mut self, in_include: bool) -> Result<bool, PugError> {
        let Some(after) = self.rest().strip_prefix(':') else {
            return Ok(false);
        };
        let len = span_of(after, |c| is_word_char(c) || c == '-');
        if len == 0 {
            return Ok(false);
        }
        let val = after[..len].to_string();
        let start = self.position();
        self.consume(1 + len);
        self.advance_column(1 + len);
        self.push(TokenKind::Filter { val }, start);
        self.call_rule(Rule::Attrs)?;
        if !in_include {
            self.interpolation_allowed = false;
            self.call_rule(Rule::PipelessText)?;
        }
        Ok(true)
    }

    pub(crate) fn block_code(&mut self) -> Result<bool, PugError> {
        if !self.standalone("-", TokenKind::BlockCode) {
            return Ok(false);
        }
        self.interpolation_allowed = false;
        self.call_rule(Rule::PipelessText)?;
        Ok(true)
    }

    /// `- statement`, `= expression` and `!= expression`.
    pub(crate) fn code(&mut self) -> Result<bool, PugError> {
        let rest = self.rest();
        let flags = if rest.starts_with("!=") {
            "!="
        } else if rest.starts_with('=') {
            "="
        } else if rest.starts_with('-') {
            "-"
        } else {
            return Ok(false);
        };
        let gap = leading_blanks(&rest[flags.len()..]);
        let code_at = flags.len() + gap;
        let line = line_of(&rest[code_at..]);
        if line.is_empty() {
            return Ok(false);
        }
        let mut code = line.to_string();

        if self.interpolated {
            match brackets::parse_until(&code, ']', 0) {
                Ok(range) => code.truncate(range.end),
                Err(err) => {
                    let offset = code_at + code[..err.index.min(code.len())].chars().count();
                    self.advance_column(offset);
                    return Err(match err.kind {
                        brackets::BracketErrorKind::EndOfString => self.error(
                            ErrorCode::NoEndBracket,
                            "End of line was reached with no closing bracket for interpolation.",
                        ),
                        brackets::BracketErrorKind::Mismatched { .. } => {
                            self.error(ErrorCode::BracketMismatch, err.message(']'))
                        }
                    });
                }
            }
        }

        let must_escape = flags.starts_with('=');
        let buffer = flags.contains('=');
        let start = self.position();
        self.consume(code_at + code.len());
        self.advance_column(code_at);
        if buffer {
            self.assert_expression(&code)?;
        }
        self.advance_column(code.chars().count());
        self.push(
            TokenKind::Code {
                val: code,
                must_escape,
                buffer,
            },
            start,
        );
        Ok(true)
    }

    pub(crate) fn id(&mut self) -> Result<bool, PugError> {
        let Some(after) = self.rest().strip_prefix('#') else {
            return Ok(false);
        };
        let len = span_of(after, |c| is_word_char(c) || c == '-');
        if len == 0 {
            let message = format!("\"{}\" is not a valid ID.", invalid_selector(after));
            return Err(self.error(ErrorCode::InvalidId, message));
        }
        let val = after[..len].to_string();
        let start = self.position();
        self.consume(1 + len);
        self.advance_column(1 + len);
        self.push(TokenKind::Id { val }, start);
        Ok(true)
    }

    pub(crate) fn dot(&mut self) -> Result<bool, PugError> {
        if !self.standalone(".", TokenKind::Dot) {
            return Ok(false);
        }
        self.call_rule(Rule::PipelessText)?;
        Ok(true)
    }

    pub(crate) fn class_name(&mut self) -> Result<bool, PugError> {
        let Some(after) = self.rest().strip_prefix('.') else {
            return Ok(false);
        };
        let len = span_of(after, |c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        let name = &after[..len];
        if !name.chars().any(|c| c.is_ascii_alphabetic() || c == '_') {
            let message = if len > 0 {
                "Class names must contain at least one letter or underscore.".to_string()
            } else {
                format!(
                    "\"{}\" is not a valid class name.  Class names can only contain \"_\", \"-\", a-z and 0-9, and must contain at least one of \"_\", or a-z",
                    invalid_selector(after)
                )
            };
            return Err(self.error(ErrorCode::InvalidClassName, message));
        }
        let val = name.to_string();
        let start = self.position();
        self.consume(1 + len);
        self.advance_column(1 + len);
        self.push(TokenKind::Class { val }, start);
        Ok(true)
    }

    /// `| text`, `|text`, a bare `|`, or text after a single space.
    pub(crate) fn text(&mut self) -> Result<bool, PugError> {
        let rest = self.rest();
        let (prefix, len) = if let Some(after) = rest.strip_prefix('|') {
            let space = usize::from(after.starts_with(' '));
            let line = line_of(&after[space..]);
            match (space, line.len()) {
                (1, 0) => (1, 1),
                (_, n) => (1 + space, n),
            }
        } else if let Some(after) = rest.strip_prefix(' ') {
            match line_of(after).len() {
                0 => (0, 1),
                n => (1, n),
            }
        } else {
            return Ok(false);
        };
        let val = rest[prefix..prefix + len].to_string();
        self.consume(prefix + len);
        self.advance_column(prefix);
        self.add_text(false, &val, "", 0)?;
        Ok(true)
    }

    pub(crate) fn text_html(&mut self) -> Result<bool, PugError> {
        let rest = self.rest();
        if !rest.starts_with('<') {
            return Ok(false);
        }
        let val = line_of(rest).to_string();
        self.consume(val.len());
        self.add_text(true, &val, "", 0)?;
        Ok(true)
    }

    /// `// comment` is buffered into the output; `//- comment` is not.
    pub(crate) fn comment(&mut self) -> Result<bool, PugError> {
        let Some(after) = self.rest().strip_prefix("//") else {
            return Ok(false);
        };
        let unbuffered = after.starts_with('-');
        let val = line_of(&after[usize::from(unbuffered)..]).to_string();
        let len = 2 + usize::from(unbuffered) + val.len();
        let buffer = !unbuffered;

        let start = self.position();
        self.consume(len);
        self.advance_column(2 + usize::from(unbuffered) + val.chars().count());
        self.interpolation_allowed = buffer;
        self.push(TokenKind::Comment { val, buffer }, start);
        self.call_rule(Rule::PipelessText)?;
        Ok(true)
    }

    pub(crate) fn slash(&mut self) -> bool {
        if !self.rest().starts_with('/') {
            return false;
        }
        let start = self.position();
        self.consume(1);
        self.advance_column(1);
        self.push(TokenKind::Slash, start);
        true
    }

    pub(crate) fn colon(&mut self) -> bool {
        let Some(after) = self.rest().strip_prefix(':') else {
            return false;
        };
        let spaces = leading_spaces(after);
        if spaces == 0 {
            return false;
        }
        let start = self.position();
        self.consume(1 + spaces);
        self.advance_column(1 + spaces);
        self.push(TokenKind::Colon, start);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Token, TokenKind};
    use crate::{lex, LexerOptions};
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source, &LexerOptions::default())
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn tokens(source: &str) -> Vec<Token> {
        lex(source, &LexerOptions::default()).unwrap()
    }

    fn lex_err(source: &str) -> PugError {
        lex(source, &LexerOptions::default()).unwrap_err()
    }

    fn text(val: &str) -> TokenKind {
        TokenKind::Text { val: val.into() }
    }

    #[test]
    fn test_single_tag() {
        assert_eq!(kinds("div"), vec![TokenKind::Tag { val: "div".into() }, TokenKind::Eos]);
    }

    #[test]
    fn test_tag_names() {
        assert_eq!(kinds("my-el")[0], TokenKind::Tag { val: "my-el".into() });
        assert_eq!(kinds("svg:rect")[0], TokenKind::Tag { val: "svg:rect".into() });
        assert_eq!(
            kinds("a: b"),
            vec![
                TokenKind::Tag { val: "a".into() },
                TokenKind::Colon,
                TokenKind::Tag { val: "b".into() },
                TokenKind::Eos,
            ]
        );
    }

    #[test]
    fn test_tag_location() {
        let toks = tokens("p hello");
        assert_eq!(toks[0].loc.start, Position::new(1, 1));
        assert_eq!(toks[0].loc.end, Position::new(1, 2));
        assert_eq!(toks[1].loc.start, Position::new(1, 3));
        assert_eq!(toks[1].loc.end, Position::new(1, 8));
    }

    #[test]
    fn test_id_and_class() {
        assert_eq!(
            kinds("#main.a.b-c"),
            vec![
                TokenKind::Id { val: "main".into() },
                TokenKind::Class { val: "a".into() },
                TokenKind::Class { val: "b-c".into() },
                TokenKind::Eos,
            ]
        );
    }

    #[test]
    fn test_invalid_class_name() {
        let err = lex_err("div.123");
        assert_eq!(err.code, ErrorCode::InvalidClassName);
        assert_eq!(err.message, "Class names must contain at least one letter or underscore.");
        let err = lex_err("div.@foo");
        assert!(err.message.starts_with("\"@foo\" is not a valid class name."));
    }

    #[test]
    fn test_invalid_id() {
        let err = lex_err("div#@x");
        assert_eq!(err.code, ErrorCode::InvalidId);
        assert_eq!(err.message, "\"@x\" is not a valid ID.");
    }

    #[test]
    fn test_doctype() {
        assert_eq!(kinds("doctype html")[0], TokenKind::Doctype { val: "html".into() });
        assert_eq!(kinds("doctype")[0], TokenKind::Doctype { val: "".into() });
        assert_eq!(kinds("doctypes")[0], TokenKind::Tag { val: "doctypes".into() });
    }

    #[test]
    fn test_piped_text() {
        assert_eq!(kinds("| hello")[0], text("hello"));
        assert_eq!(kinds("|hello")[0], text("hello"));
        assert_eq!(kinds("| ")[0], text(" "));
        assert_eq!(kinds("|"), vec![TokenKind::Eos]);
    }

    #[test]
    fn test_text_html() {
        assert_eq!(
            kinds("<p>hi</p>")[0],
            TokenKind::TextHtml { val: "<p>hi</p>".into() }
        );
    }

    #[test]
    fn test_code() {
        assert_eq!(
            kinds("= user.name")[0],
            TokenKind::Code {
                val: "user.name".into(),
                must_escape: true,
                buffer: true
            }
        );
        assert_eq!(
            kinds("!= html")[0],
            TokenKind::Code {
                val: "html".into(),
                must_escape: false,
                buffer: true
            }
        );
        assert_eq!(
            kinds("- var x = 1")[0],
            TokenKind::Code {
                val: "var x = 1".into(),
                must_escape: false,
                buffer: false
            }
        );
    }

    #[test]
    fn test_buffered_code_must_be_an_expression() {
        let err = lex_err("= foo(");
        assert_eq!(err.code, ErrorCode::SyntaxError);
    }

    #[test]
    fn test_block_code() {
        assert_eq!(
            kinds("-\n  var a = 1\n  var b = 2"),
            vec![
                TokenKind::BlockCode,
                TokenKind::StartPipelessText,
                text("var a = 1"),
                TokenKind::Newline,
                text("var b = 2"),
                TokenKind::EndPipelessText,
                TokenKind::Eos,
            ]
        );
    }

    #[test]
    fn test_conditionals() {
        assert_eq!(kinds("if a")[0], TokenKind::If { val: "a".into() });
        assert_eq!(kinds("unless a")[0], TokenKind::If { val: "!(a)".into() });
        assert_eq!(kinds("else if b")[0], TokenKind::ElseIf { val: "b".into() });
        assert_eq!(kinds("else")[0], TokenKind::Else);
        assert_eq!(kinds("iframe")[0], TokenKind::Tag { val: "iframe".into() });
    }

    #[test]
    fn test_else_with_condition() {
        assert_eq!(lex_err("else foo").code, ErrorCode::ElseCondition);
    }

    #[test]
    fn test_each() {
        assert_eq!(
            kinds("each item, i in items")[0],
            TokenKind::Each {
                val: "item".into(),
                key: Some("i".into()),
                code: "items".into()
            }
        );
        assert_eq!(
            kinds("for x in [1, 2]")[0],
            TokenKind::Each {
                val: "x".into(),
                key: None,
                code: "[1, 2]".into()
            }
        );
    }

    #[test]
    fn test_each_of() {
        assert_eq!(
            kinds("each [k, v] of map")[0],
            TokenKind::EachOf {
                val: "[k, v]".into(),
                code: "map".into()
            }
        );
        assert_eq!(
            kinds("each x in offsets")[0],
            TokenKind::Each {
                val: "x".into(),
                key: None,
                code: "offsets".into()
            }
        );
    }

    #[test]
    fn test_malformed_each() {
        assert_eq!(lex_err("each 1 in x").code, ErrorCode::MalformedEach);
        assert_eq!(lex_err("each a.b of x").code, ErrorCode::MalformedEach);
        assert_eq!(lex_err("- each x in xs").code, ErrorCode::MalformedEach);
    }

    #[test]
    fn test_while() {
        assert_eq!(kinds("while n < 3")[0], TokenKind::While { val: "n < 3".into() });
        assert_eq!(lex_err("while").code, ErrorCode::NoWhileExpression);
    }

    #[test]
    fn test_case_when_default() {
        assert_eq!(
            kinds("case x\n  when 1: p one\n  default"),
            vec![
                TokenKind::Case { val: "x".into() },
                TokenKind::Indent { val: 2 },
                TokenKind::When { val: "1".into() },
                TokenKind::Colon,
                TokenKind::Tag { val: "p".into() },
                text("one"),
                TokenKind::Newline,
                TokenKind::Default,
                TokenKind::Outdent,
                TokenKind::Eos,
            ]
        );
    }

    #[test]
    fn test_when_with_colon_in_expression() {
        assert_eq!(kinds("when 'a:b'")[0], TokenKind::When { val: "'a:b'".into() });
    }

    #[test]
    fn test_case_errors() {
        assert_eq!(lex_err("case").code, ErrorCode::NoCaseExpression);
        assert_eq!(lex_err("when").code, ErrorCode::NoWhenExpression);
        assert_eq!(lex_err("default x").code, ErrorCode::DefaultWithExpression);
    }

    #[test]
    fn test_extends() {
        assert_eq!(
            kinds("extends layout.pug"),
            vec![
                TokenKind::Extends,
                TokenKind::Path { val: "layout.pug".into() },
                TokenKind::Eos,
            ]
        );
        assert_eq!(lex_err("extends").code, ErrorCode::NoExtendsPath);
        assert_eq!(lex_err("extends:x").code, ErrorCode::MalformedExtends);
    }

    #[test]
    fn test_include_with_filter() {
        assert_eq!(
            kinds("include:markdown(smart) README.md"),
            vec![
                TokenKind::Include,
                TokenKind::Filter { val: "markdown".into() },
                TokenKind::StartAttributes,
                TokenKind::Attribute {
                    name: "smart".into(),
                    val: crate::token::AttributeValue::Bool(true),
                    must_escape: true
                },
                TokenKind::EndAttributes,
                TokenKind::Path { val: "README.md".into() },
                TokenKind::Eos,
            ]
        );
        assert_eq!(lex_err("include").code, ErrorCode::NoIncludePath);
    }

    #[test]
    fn test_named_blocks() {
        let mode = |kinds: Vec<TokenKind>| match &kinds[0] {
            TokenKind::Block { val, mode } => (val.clone(), *mode),
            other => panic!("expected block, got {other:?}"),
        };
        assert_eq!(mode(kinds("block content")), ("content".into(), BlockMode::Replace));
        assert_eq!(mode(kinds("append scripts")), ("scripts".into(), BlockMode::Append));
        assert_eq!(mode(kinds("block prepend head")), ("head".into(), BlockMode::Prepend));
    }

    #[test]
    fn test_block_name_stops_at_comment() {
        let toks = kinds("block content // main area");
        assert_eq!(
            toks[0],
            TokenKind::Block {
                val: "content".into(),
                mode: BlockMode::Replace
            }
        );
        assert_eq!(
            toks[1],
            TokenKind::Comment {
                val: " main area".into(),
                buffer: true
            }
        );
    }

    #[test]
    fn test_mixin_declaration_and_block() {
        assert_eq!(
            kinds("mixin item(a, b)\n  block"),
            vec![
                TokenKind::Mixin {
                    val: "item".into(),
                    args: Some("a, b".into())
                },
                TokenKind::Indent { val: 2 },
                TokenKind::MixinBlock,
                TokenKind::Outdent,
                TokenKind::Eos,
            ]
        );
    }

    #[test]
    fn test_call() {
        assert_eq!(
            kinds("+item(1, 'two')")[0],
            TokenKind::Call {
                val: "item".into(),
                args: Some("1, 'two'".into())
            }
        );
        assert_eq!(
            kinds("+#{name}")[0],
            TokenKind::Call {
                val: "#{name}".into(),
                args: None
            }
        );
    }

    #[test]
    fn test_call_with_attributes_instead_of_args() {
        let toks = kinds("+link(href='/')");
        assert_eq!(
            toks[0],
            TokenKind::Call {
                val: "link".into(),
                args: None
            }
        );
        assert_eq!(toks[1], TokenKind::StartAttributes);
    }

    #[test]
    fn test_yield() {
        assert_eq!(kinds("yield"), vec![TokenKind::Yield, TokenKind::Eos]);
    }

    #[test]
    fn test_interpolated_tag_name() {
        assert_eq!(
            kinds("#{tagName} text")[0],
            TokenKind::Interpolation {
                val: "tagName".into()
            }
        );
    }

    #[test]
    fn test_comments() {
        assert_eq!(
            kinds("// visible"),
            vec![
                TokenKind::Comment {
                    val: " visible".into(),
                    buffer: true
                },
                TokenKind::Eos
            ]
        );
        assert_eq!(
            kinds("//- hidden")[0],
            TokenKind::Comment {
                val: " hidden".into(),
                buffer: false
            }
        );
    }

    #[test]
    fn test_block_comment_body() {
        assert_eq!(
            kinds("//-\n  #{not} interpolated"),
            vec![
                TokenKind::Comment {
                    val: "".into(),
                    buffer: false
                },
                TokenKind::StartPipelessText,
                text("#{not} interpolated"),
                TokenKind::EndPipelessText,
                TokenKind::Eos,
            ]
        );
    }

    #[test]
    fn test_filter_body_is_not_interpolated() {
        assert_eq!(
            kinds(":markdown\n  # #{title}"),
            vec![
                TokenKind::Filter {
                    val: "markdown".into()
                },
                TokenKind::StartPipelessText,
                text("# #{title}"),
                TokenKind::EndPipelessText,
                TokenKind::Eos,
            ]
        );
    }

    #[test]
    fn test_self_closing_slash() {
        assert_eq!(
            kinds("img/"),
            vec![
                TokenKind::Tag { val: "img".into() },
                TokenKind::Slash,
                TokenKind::Eos
            ]
        );
    }

    #[test]
    fn test_keyword_helpers() {
        assert_eq!(keyword_line("case  x", "case"), Some((7, 6)));
        assert_eq!(keyword_line("casex", "case"), None);
        assert!(is_identifier_pair("[ key , value ]"));
        assert!(!is_identifier_pair("[a, b, c]"));
        assert!(looks_like_attributes(" class = 'x'"));
        assert!(!looks_like_attributes("x, y"));
    }
}
