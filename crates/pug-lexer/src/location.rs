//! Source locations.
//!
//! Every token and every AST node carries a [`Location`]: a start/end pair of
//! 1-based line/column positions plus the identifier of the source document.
//! Parents build their location by folding [`Location::merge`] over their
//! children, so a parent's span always contains every descendant's span.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A line/column pair. Both are 1-based.
///
/// Ordering is lexicographic by `(line, column)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A span of source text, `start` inclusive and `end` exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub start: Position,
    pub end: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

/// Returned by [`Location::merge`] when the two spans belong to different
/// documents.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot merge a location in {left} with a location in {right}")]
pub struct SourceMismatch {
    pub left: String,
    pub right: String,
}

impl Location {
    pub fn new(start: Position, end: Position, source_id: Option<String>) -> Self {
        Self {
            start,
            end,
            source_id,
        }
    }

    /// A zero-width location at `pos`.
    pub fn point(pos: Position, source_id: Option<String>) -> Self {
        Self::new(pos, pos, source_id)
    }

    /// The smallest span covering both `self` and `other`.
    ///
    /// The result does not depend on argument order.
    pub fn merge(&self, other: &Location) -> Result<Location, SourceMismatch> {
        if self.source_id != other.source_id {
            return Err(SourceMismatch {
                left: describe(&self.source_id),
                right: describe(&other.source_id),
            });
        }
        Ok(Location {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            source_id: self.source_id.clone(),
        })
    }

    /// A zero-width location at the end of `self`.
    ///
    /// Gives empty constructs a span derived from the token that owns them.
    pub fn anchor_end(&self) -> Location {
        Location::point(self.end, self.source_id.clone())
    }

    /// Whether `other` lies entirely within `self`.
    pub fn contains(&self, other: &Location) -> bool {
        self.source_id == other.source_id && self.start <= other.start && other.end <= self.end
    }
}

fn describe(source_id: &Option<String>) -> String {
    match source_id {
        Some(id) => format!("`{id}`"),
        None => "an anonymous source".to_string(),
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(id) = &self.source_id {
            write!(f, "{id}:")?;
        }
        write!(f, "{}-{}", self.start, self.end)
    }
}
