use crate::location::Location;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a named block combines with the block of the same name in a parent
/// template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockMode {
    Replace,
    Append,
    Prepend,
}

impl fmt::Display for BlockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BlockMode::Replace => "replace",
            BlockMode::Append => "append",
            BlockMode::Prepend => "prepend",
        })
    }
}

/// An attribute value: raw expression text, or `true` for a bare attribute
/// such as `input(disabled)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Expr(String),
}

/// Token classification.
///
/// Data-carrying variants embed their lexical value directly. Serialized
/// forms are tagged by `type` using the language's own token names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TokenKind {
    // Structure
    Newline,
    Indent { val: usize },
    Outdent,
    Eos,

    // Elements
    Doctype { val: String },
    Tag { val: String },
    Id { val: String },
    Class { val: String },
    Interpolation { val: String },
    StartAttributes,
    Attribute {
        name: String,
        val: AttributeValue,
        must_escape: bool,
    },
    EndAttributes,
    #[serde(rename = "&attributes")]
    AndAttributes { val: String },
    Slash,
    #[serde(rename = ":")]
    Colon,
    Dot,

    // Text
    Text { val: String },
    TextHtml { val: String },
    InterpolatedCode {
        val: String,
        must_escape: bool,
        buffer: bool,
    },
    StartPugInterpolation,
    EndPugInterpolation,
    StartPipelessText,
    EndPipelessText,
    Comment { val: String, buffer: bool },

    // Code and control flow
    Code {
        val: String,
        must_escape: bool,
        buffer: bool,
    },
    #[serde(rename = "blockcode")]
    BlockCode,
    If { val: String },
    ElseIf { val: String },
    Else,
    Each {
        val: String,
        key: Option<String>,
        code: String,
    },
    EachOf { val: String, code: String },
    While { val: String },
    Case { val: String },
    When { val: String },
    Default,

    // Mixins and template composition
    Mixin { val: String, args: Option<String> },
    MixinBlock,
    Call { val: String, args: Option<String> },
    Block { val: String, mode: BlockMode },
    Extends,
    Include,
    Path { val: String },
    Filter { val: String },
    Yield,

    /// A token produced by a lexer plugin.
    Custom { name: String, val: Option<String> },
}

/// The kind of a token without its payload.
///
/// Keys the parser's plugin table and names tokens in diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenType {
    Newline,
    Indent,
    Outdent,
    Eos,
    Doctype,
    Tag,
    Id,
    Class,
    Interpolation,
    StartAttributes,
    Attribute,
    EndAttributes,
    AndAttributes,
    Slash,
    Colon,
    Dot,
    Text,
    TextHtml,
    InterpolatedCode,
    StartPugInterpolation,
    EndPugInterpolation,
    StartPipelessText,
    EndPipelessText,
    Comment,
    Code,
    BlockCode,
    If,
    ElseIf,
    Else,
    Each,
    EachOf,
    While,
    Case,
    When,
    Default,
    Mixin,
    MixinBlock,
    Call,
    Block,
    Extends,
    Include,
    Path,
    Filter,
    Yield,
    Custom(String),
}

impl TokenType {
    pub fn name(&self) -> &str {
        match self {
            TokenType::Newline => "newline",
            TokenType::Indent => "indent",
            TokenType::Outdent => "outdent",
            TokenType::Eos => "eos",
            TokenType::Doctype => "doctype",
            TokenType::Tag => "tag",
            TokenType::Id => "id",
            TokenType::Class => "class",
            TokenType::Interpolation => "interpolation",
            TokenType::StartAttributes => "start-attributes",
            TokenType::Attribute => "attribute",
            TokenType::EndAttributes => "end-attributes",
            TokenType::AndAttributes => "&attributes",
            TokenType::Slash => "slash",
            TokenType::Colon => ":",
            TokenType::Dot => "dot",
            TokenType::Text => "text",
            TokenType::TextHtml => "text-html",
            TokenType::InterpolatedCode => "interpolated-code",
            TokenType::StartPugInterpolation => "start-pug-interpolation",
            TokenType::EndPugInterpolation => "end-pug-interpolation",
            TokenType::StartPipelessText => "start-pipeless-text",
            TokenType::EndPipelessText => "end-pipeless-text",
            TokenType::Comment => "comment",
            TokenType::Code => "code",
            TokenType::BlockCode => "blockcode",
            TokenType::If => "if",
            TokenType::ElseIf => "else-if",
            TokenType::Else => "else",
            TokenType::Each => "each",
            TokenType::EachOf => "each-of",
            TokenType::While => "while",
            TokenType::Case => "case",
            TokenType::When => "when",
            TokenType::Default => "default",
            TokenType::Mixin => "mixin",
            TokenType::MixinBlock => "mixin-block",
            TokenType::Call => "call",
            TokenType::Block => "block",
            TokenType::Extends => "extends",
            TokenType::Include => "include",
            TokenType::Path => "path",
            TokenType::Filter => "filter",
            TokenType::Yield => "yield",
            TokenType::Custom(name) => name,
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TokenKind {
    pub fn token_type(&self) -> TokenType {
        match self {
            TokenKind::Newline => TokenType::Newline,
            TokenKind::Indent { .. } => TokenType::Indent,
            TokenKind::Outdent => TokenType::Outdent,
            TokenKind::Eos => TokenType::Eos,
            TokenKind::Doctype { .. } => TokenType::Doctype,
            TokenKind::Tag { .. } => TokenType::Tag,
            TokenKind::Id { .. } => TokenType::Id,
            TokenKind::Class { .. } => TokenType::Class,
            TokenKind::Interpolation { .. } => TokenType::Interpolation,
            TokenKind::StartAttributes => TokenType::StartAttributes,
            TokenKind::Attribute { .. } => TokenType::Attribute,
            TokenKind::EndAttributes => TokenType::EndAttributes,
            TokenKind::AndAttributes { .. } => TokenType::AndAttributes,
            TokenKind::Slash => TokenType::Slash,
            TokenKind::Colon => TokenType::Colon,
            TokenKind::Dot => TokenType::Dot,
            TokenKind::Text { .. } => TokenType::Text,
            TokenKind::TextHtml { .. } => TokenType::TextHtml,
            TokenKind::InterpolatedCode { .. } => TokenType::InterpolatedCode,
            TokenKind::StartPugInterpolation => TokenType::StartPugInterpolation,
            TokenKind::EndPugInterpolation => TokenType::EndPugInterpolation,
            TokenKind::StartPipelessText => TokenType::StartPipelessText,
            TokenKind::EndPipelessText => TokenType::EndPipelessText,
            TokenKind::Comment { .. } => TokenType::Comment,
            TokenKind::Code { .. } => TokenType::Code,
            TokenKind::BlockCode => TokenType::BlockCode,
            TokenKind::If { .. } => TokenType::If,
            TokenKind::ElseIf { .. } => TokenType::ElseIf,
            TokenKind::Else => TokenType::Else,
            TokenKind::Each { .. } => TokenType::Each,
            TokenKind::EachOf { .. } => TokenType::EachOf,
            TokenKind::While { .. } => TokenType::While,
            TokenKind::Case { .. } => TokenType::Case,
            TokenKind::When { .. } => TokenType::When,
            TokenKind::Default => TokenType::Default,
            TokenKind::Mixin { .. } => TokenType::Mixin,
            TokenKind::MixinBlock => TokenType::MixinBlock,
            TokenKind::Call { .. } => TokenType::Call,
            TokenKind::Block { .. } => TokenType::Block,
            TokenKind::Extends => TokenType::Extends,
            TokenKind::Include => TokenType::Include,
            TokenKind::Path { .. } => TokenType::Path,
            TokenKind::Filter { .. } => TokenType::Filter,
            TokenKind::Yield => TokenType::Yield,
            TokenKind::Custom { name, .. } => TokenType::Custom(name.clone()),
        }
    }
}

/// A token produced by the lexer. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    #[serde(flatten)]
    pub kind: TokenKind,
    pub loc: Location,
}

impl Token {
    pub fn new(kind: TokenKind, loc: Location) -> Self {
        Self { kind, loc }
    }

    pub fn token_type(&self) -> TokenType {
        self.kind.token_type()
    }

    pub fn is(&self, ty: &TokenType) -> bool {
        &self.token_type() == ty
    }
}
