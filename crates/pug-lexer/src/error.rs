use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-checkable error identifiers shared by the lexer and the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Lexer
    NoEndBracket,
    BracketMismatch,
    InvalidIndentation,
    InconsistentIndentation,
    UnexpectedText,
    InvalidKeyCharacter,
    IncorrectNesting,
    SyntaxError,
    NoCaseExpression,
    NoWhenExpression,
    DefaultWithExpression,
    NoExtendsPath,
    MalformedExtends,
    NoIncludePath,
    MalformedInclude,
    NoWhileExpression,
    MalformedEach,
    ElseCondition,
    InvalidClassName,
    InvalidId,

    // Parser
    InvalidToken,
    UnexpectedEnd,
    DuplicateId,
    DuplicateAttribute,
    MixinWithoutBody,
    BlockOutsideMixin,
    RawIncludeBlock,
    BlockInBufferedCode,
    LocationMismatch,

    // Configuration
    PluginConflict,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NoEndBracket => "NO_END_BRACKET",
            ErrorCode::BracketMismatch => "BRACKET_MISMATCH",
            ErrorCode::InvalidIndentation => "INVALID_INDENTATION",
            ErrorCode::InconsistentIndentation => "INCONSISTENT_INDENTATION",
            ErrorCode::UnexpectedText => "UNEXPECTED_TEXT",
            ErrorCode::InvalidKeyCharacter => "INVALID_KEY_CHARACTER",
            ErrorCode::IncorrectNesting => "INCORRECT_NESTING",
            ErrorCode::SyntaxError => "SYNTAX_ERROR",
            ErrorCode::NoCaseExpression => "NO_CASE_EXPRESSION",
            ErrorCode::NoWhenExpression => "NO_WHEN_EXPRESSION",
            ErrorCode::DefaultWithExpression => "DEFAULT_WITH_EXPRESSION",
            ErrorCode::NoExtendsPath => "NO_EXTENDS_PATH",
            ErrorCode::MalformedExtends => "MALFORMED_EXTENDS",
            ErrorCode::NoIncludePath => "NO_INCLUDE_PATH",
            ErrorCode::MalformedInclude => "MALFORMED_INCLUDE",
            ErrorCode::NoWhileExpression => "NO_WHILE_EXPRESSION",
            ErrorCode::MalformedEach => "MALFORMED_EACH",
            ErrorCode::ElseCondition => "ELSE_CONDITION",
            ErrorCode::InvalidClassName => "INVALID_CLASS_NAME",
            ErrorCode::InvalidId => "INVALID_ID",
            ErrorCode::InvalidToken => "INVALID_TOKEN",
            ErrorCode::UnexpectedEnd => "UNEXPECTED_END",
            ErrorCode::DuplicateId => "DUPLICATE_ID",
            ErrorCode::DuplicateAttribute => "DUPLICATE_ATTRIBUTE",
            ErrorCode::MixinWithoutBody => "MIXIN_WITHOUT_BODY",
            ErrorCode::BlockOutsideMixin => "BLOCK_OUTSIDE_MIXIN",
            ErrorCode::RawIncludeBlock => "RAW_INCLUDE_BLOCK",
            ErrorCode::BlockInBufferedCode => "BLOCK_IN_BUFFERED_CODE",
            ErrorCode::LocationMismatch => "LOCATION_MISMATCH",
            ErrorCode::PluginConflict => "PLUGIN_CONFLICT",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PUG:{}", self.as_str())
    }
}

/// A fatal lexer, parser, or configuration error.
///
/// Lexer and parser errors share this shape so callers handle both the same
/// way. `src` holds the normalized source text when it is known; rendering
/// surrounding context from it is left to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{}:{line}:{column}: {message} ({code})", .source_id.as_deref().unwrap_or("Pug"))]
pub struct PugError {
    pub code: ErrorCode,
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub source_id: Option<String>,
    #[serde(skip)]
    pub src: Option<String>,
}

impl PugError {
    pub fn new(code: ErrorCode, message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            code,
            message: message.into(),
            line,
            column,
            source_id: None,
            src: None,
        }
    }

    pub fn with_source_id(mut self, source_id: Option<String>) -> Self {
        self.source_id = source_id;
        self
    }

    pub fn with_src(mut self, src: Option<String>) -> Self {
        self.src = src;
        self
    }
}
