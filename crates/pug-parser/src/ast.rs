//! Abstract Syntax Tree for Pug templates.
//!
//! Nodes are plain data. Every node carries a [`Location`] covering its own
//! tokens and all of its descendants; the parser folds child spans in as it
//! attaches them.

use pug_lexer::location::SourceMismatch;
use pug_lexer::{AttributeValue, BlockMode, Location};
use serde::{Deserialize, Serialize};

/// Elements rendered inline by default.
pub const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "acronym", "b", "br", "code", "em", "font", "i", "img", "ins", "kbd", "map",
    "samp", "small", "span", "strong", "sub", "sup",
];

/// A sequence of nodes: the document root and the body of every nested
/// construct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub nodes: Vec<Node>,
    pub loc: Location,
}

impl Block {
    /// An empty block spanning `loc`.
    pub fn empty(loc: Location) -> Self {
        Self {
            nodes: Vec::new(),
            loc,
        }
    }

    /// Append `node`, widening the block's span to cover it.
    pub fn push(&mut self, node: Node) -> Result<(), SourceMismatch> {
        self.loc = self.loc.merge(node.loc())?;
        self.nodes.push(node);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Node {
    Block(Block),
    Tag(Tag),
    InterpolatedTag(InterpolatedTag),
    Text(Text),
    Code(Code),
    Comment(Comment),
    BlockComment(BlockComment),
    Doctype(Doctype),
    Each(Each),
    EachOf(EachOf),
    While(While),
    Conditional(Conditional),
    Mixin(Mixin),
    Case(Case),
    When(When),
    NamedBlock(NamedBlock),
    MixinBlock(Marker),
    YieldBlock(Marker),
    Extends(Extends),
    Include(Include),
    RawInclude(RawInclude),
    IncludeFilter(IncludeFilter),
    Filter(Filter),
}

/// `name=value` on an element. Shorthand ids and classes are stored as
/// attributes with a quoted string value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub val: AttributeValue,
    pub must_escape: bool,
    pub loc: Location,
}

/// `&attributes(expr)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeBlock {
    pub val: String,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub self_closing: bool,
    pub block: Block,
    pub attrs: Vec<Attribute>,
    pub attribute_blocks: Vec<AttributeBlock>,
    pub is_inline: bool,
    pub text_only: bool,
    pub loc: Location,
}

/// An element whose name is computed: `#{expr}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpolatedTag {
    pub expr: String,
    pub self_closing: bool,
    pub block: Block,
    pub attrs: Vec<Attribute>,
    pub attribute_blocks: Vec<AttributeBlock>,
    pub is_inline: bool,
    pub text_only: bool,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub val: String,
    /// Literal HTML from a `<...>` line.
    #[serde(default)]
    pub is_html: bool,
    pub loc: Location,
}

/// Embedded code: `- stmt`, `= expr`, `!= expr`, `#{expr}` or a `-` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Code {
    pub val: String,
    /// The value is written to the output.
    pub buffer: bool,
    pub must_escape: bool,
    pub is_inline: bool,
    pub block: Option<Block>,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub val: String,
    pub buffer: bool,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockComment {
    pub val: String,
    pub block: Block,
    pub buffer: bool,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctype {
    pub val: String,
    pub loc: Location,
}

/// `each val, key in obj`, with an optional `else` for empty collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Each {
    pub obj: String,
    pub val: String,
    pub key: Option<String>,
    pub block: Block,
    pub alternate: Option<Block>,
    pub loc: Location,
}

/// `each val of obj`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EachOf {
    pub obj: String,
    pub val: String,
    pub block: Block,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct While {
    pub test: String,
    pub block: Block,
    pub loc: Location,
}

/// `if`/`unless` with its `else if` chain.
///
/// `alternate` is another `Conditional` for `else if`, a `Block` for a
/// final `else`, or `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conditional {
    pub test: String,
    pub consequent: Block,
    pub alternate: Option<Box<Node>>,
    pub loc: Location,
}

/// A mixin declaration (`call == false`) or call site (`call == true`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mixin {
    pub name: String,
    pub args: Option<String>,
    pub block: Option<Block>,
    pub call: bool,
    pub attrs: Vec<Attribute>,
    pub attribute_blocks: Vec<AttributeBlock>,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub expr: String,
    pub block: Block,
    pub loc: Location,
}

/// A `when` label, or `default` with `expr == "default"`. A label with no
/// body falls through to the next one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct When {
    pub expr: String,
    pub block: Option<Block>,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedBlock {
    pub name: String,
    pub mode: BlockMode,
    pub nodes: Vec<Node>,
    pub loc: Location,
}

/// A node with no payload (`block` inside a mixin, `yield`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReference {
    pub path: String,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extends {
    pub file: FileReference,
    pub loc: Location,
}

/// A template include. `block` is substituted into the included template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Include {
    pub file: FileReference,
    pub block: Block,
    pub loc: Location,
}

/// A non-template include, inserted verbatim or through `filters`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInclude {
    pub file: FileReference,
    pub filters: Vec<IncludeFilter>,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncludeFilter {
    pub name: String,
    pub attrs: Vec<Attribute>,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub name: String,
    pub block: Block,
    pub attrs: Vec<Attribute>,
    pub loc: Location,
}

impl Node {
    pub fn loc(&self) -> &Location {
        match self {
            Node::Block(n) => &n.loc,
            Node::Tag(n) => &n.loc,
            Node::InterpolatedTag(n) => &n.loc,
            Node::Text(n) => &n.loc,
            Node::Code(n) => &n.loc,
            Node::Comment(n) => &n.loc,
            Node::BlockComment(n) => &n.loc,
            Node::Doctype(n) => &n.loc,
            Node::Each(n) => &n.loc,
            Node::EachOf(n) => &n.loc,
            Node::While(n) => &n.loc,
            Node::Conditional(n) => &n.loc,
            Node::Mixin(n) => &n.loc,
            Node::Case(n) => &n.loc,
            Node::When(n) => &n.loc,
            Node::NamedBlock(n) => &n.loc,
            Node::MixinBlock(n) | Node::YieldBlock(n) => &n.loc,
            Node::Extends(n) => &n.loc,
            Node::Include(n) => &n.loc,
            Node::RawInclude(n) => &n.loc,
            Node::IncludeFilter(n) => &n.loc,
            Node::Filter(n) => &n.loc,
        }
    }

    /// Name of the node type as it appears in serialized trees.
    pub fn type_name(&self) -> &'static str {
        match self {
            Node::Block(_) => "Block",
            Node::Tag(_) => "Tag",
            Node::InterpolatedTag(_) => "InterpolatedTag",
            Node::Text(_) => "Text",
            Node::Code(_) => "Code",
            Node::Comment(_) => "Comment",
            Node::BlockComment(_) => "BlockComment",
            Node::Doctype(_) => "Doctype",
            Node::Each(_) => "Each",
            Node::EachOf(_) => "EachOf",
            Node::While(_) => "While",
            Node::Conditional(_) => "Conditional",
            Node::Mixin(_) => "Mixin",
            Node::Case(_) => "Case",
            Node::When(_) => "When",
            Node::NamedBlock(_) => "NamedBlock",
            Node::MixinBlock(_) => "MixinBlock",
            Node::YieldBlock(_) => "YieldBlock",
            Node::Extends(_) => "Extends",
            Node::Include(_) => "Include",
            Node::RawInclude(_) => "RawInclude",
            Node::IncludeFilter(_) => "IncludeFilter",
            Node::Filter(_) => "Filter",
        }
    }

    /// Direct descendants, in source order.
    pub fn children(&self) -> Vec<&Node> {
        match self {
            Node::Block(n) => n.nodes.iter().collect(),
            Node::Tag(n) => n.block.nodes.iter().collect(),
            Node::InterpolatedTag(n) => n.block.nodes.iter().collect(),
            Node::Code(n) => n.block.iter().flat_map(|b| &b.nodes).collect(),
            Node::BlockComment(n) => n.block.nodes.iter().collect(),
            Node::Each(n) => n
                .block
                .nodes
                .iter()
                .chain(n.alternate.iter().flat_map(|b| &b.nodes))
                .collect(),
            Node::EachOf(n) => n.block.nodes.iter().collect(),
            Node::While(n) => n.block.nodes.iter().collect(),
            Node::Conditional(n) => n
                .consequent
                .nodes
                .iter()
                .chain(n.alternate.as_deref())
                .collect(),
            Node::Mixin(n) => n.block.iter().flat_map(|b| &b.nodes).collect(),
            Node::Case(n) => n.block.nodes.iter().collect(),
            Node::When(n) => n.block.iter().flat_map(|b| &b.nodes).collect(),
            Node::NamedBlock(n) => n.nodes.iter().collect(),
            Node::Include(n) => n.block.nodes.iter().collect(),
            Node::Filter(n) => n.block.nodes.iter().collect(),
            Node::Text(_)
            | Node::Comment(_)
            | Node::Doctype(_)
            | Node::MixinBlock(_)
            | Node::YieldBlock(_)
            | Node::Extends(_)
            | Node::RawInclude(_)
            | Node::IncludeFilter(_) => Vec::new(),
        }
    }
}
