//! Recursive-descent parser for Pug.
//!
//! Consumes the token stream produced by `pug-lexer` and builds a [`Block`]
//! of [`Node`]s. There is one production per node type. Every production
//! folds the locations of the tokens and children it consumes into the span
//! of the node it builds.

use crate::ast::{
    Attribute, AttributeBlock, Block, BlockComment, Case, Code, Comment, Conditional, Doctype,
    Each, EachOf, Extends, FileReference, Filter, Include, IncludeFilter, InterpolatedTag, Marker,
    Mixin, NamedBlock, Node, RawInclude, Tag, Text, When, While, INLINE_TAGS,
};
use crate::plugin::{ExtensionPoint, PluginRegistry};
use crate::token_stream::TokenStream;
use crate::ParserOptions;
use log::warn;
use pug_lexer::{AttributeValue, ErrorCode, Location, PugError, Token, TokenKind, TokenType};

/// The parts shared by tags, interpolated tags and mixin calls, filled in
/// by [`Parser::tag`].
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub attrs: Vec<Attribute>,
    pub attribute_blocks: Vec<AttributeBlock>,
    pub block: Block,
    pub self_closing: bool,
    pub text_only: bool,
    pub loc: Location,
}

impl Element {
    /// An element anchored at the token that names it.
    pub fn new(anchor: Location) -> Self {
        Self {
            attrs: Vec::new(),
            attribute_blocks: Vec::new(),
            block: Block::empty(anchor.anchor_end()),
            self_closing: false,
            text_only: false,
            loc: anchor,
        }
    }
}

/// One `if` or `else if` arm before the chain is linked.
struct Branch {
    test: String,
    anchor: Location,
    consequent: Block,
}

/// Pug document parser.
///
/// Holds the token stream, the mixin nesting depth and the plugin table for
/// a single parse.
pub struct Parser<'p> {
    tokens: TokenStream,
    source_id: Option<String>,
    source_text: Option<String>,
    in_mixin: usize,
    last: Option<Location>,
    plugins: PluginRegistry<'p>,
}

impl<'p> Parser<'p> {
    /// Create a parser. Fails if two plugins claim the same extension.
    pub fn new(tokens: Vec<Token>, options: &'p ParserOptions) -> Result<Self, PugError> {
        let plugins = PluginRegistry::new(&options.plugins).map_err(|err| {
            err.with_source_id(options.source_id.clone())
                .with_src(options.source_text.clone())
        })?;
        Ok(Self {
            tokens: TokenStream::new(tokens),
            source_id: options.source_id.clone(),
            source_text: options.source_text.clone(),
            in_mixin: 0,
            last: None,
            plugins,
        })
    }

    /// Parse the whole token stream into the document root.
    pub fn parse(&mut self) -> Result<Block, PugError> {
        let first = self.peek()?.loc.clone();
        let mut block = Block::empty(Location::point(first.start, first.source_id));
        loop {
            match self.peek_type()? {
                TokenType::Eos => break,
                TokenType::Newline => {
                    self.advance()?;
                }
                TokenType::TextHtml => {
                    for node in self.parse_text_html()? {
                        self.append(&mut block, node)?;
                    }
                }
                _ => {
                    let expr = self.parse_expr()?;
                    self.append(&mut block, expr)?;
                }
            }
        }
        Ok(block)
    }

    // =========================================================================
    // Token access
    // =========================================================================

    pub fn peek(&self) -> Result<&Token, PugError> {
        self.tokens.peek().ok_or_else(|| self.unexpected_end())
    }

    pub fn peek_type(&self) -> Result<TokenType, PugError> {
        Ok(self.peek()?.token_type())
    }

    /// The `n`-th upcoming token, counting from 1.
    pub fn lookahead(&self, n: usize) -> Option<&Token> {
        self.tokens.lookahead(n)
    }

    pub fn advance(&mut self) -> Result<Token, PugError> {
        let token = self.tokens.advance().ok_or_else(|| self.unexpected_end())?;
        self.last = Some(token.loc.clone());
        Ok(token)
    }

    pub fn defer(&mut self, token: Token) {
        self.tokens.defer(token);
    }

    pub fn expect(&mut self, ty: TokenType) -> Result<Token, PugError> {
        if self.peek()?.is(&ty) {
            return self.advance();
        }
        let next = self.peek()?;
        Err(self.error(
            ErrorCode::InvalidToken,
            format!("expected \"{ty}\", but got \"{}\"", next.token_type()),
            &next.loc,
        ))
    }

    pub fn accept(&mut self, ty: TokenType) -> Result<Option<Token>, PugError> {
        if self.peek()?.is(&ty) {
            return self.advance().map(Some);
        }
        Ok(None)
    }

    pub fn is_in_mixin(&self) -> bool {
        self.in_mixin > 0
    }

    // =========================================================================
    // Errors and locations
    // =========================================================================

    pub fn error(&self, code: ErrorCode, message: impl Into<String>, at: &Location) -> PugError {
        PugError::new(code, message, at.start.line, at.start.column)
            .with_source_id(self.source_id.clone().or_else(|| at.source_id.clone()))
            .with_src(self.source_text.clone())
    }

    fn unexpected_end(&self) -> PugError {
        let (line, column) = self
            .last
            .as_ref()
            .map_or((1, 1), |loc| (loc.end.line, loc.end.column));
        PugError::new(
            ErrorCode::UnexpectedEnd,
            "Unexpected end of input, expected \"eos\"",
            line,
            column,
        )
        .with_source_id(self.source_id.clone())
        .with_src(self.source_text.clone())
    }

    fn unexpected(&self, token: &Token) -> PugError {
        self.error(
            ErrorCode::InvalidToken,
            format!("unexpected token \"{}\"", token.token_type()),
            &token.loc,
        )
    }

    /// A consumed token did not carry the payload its type promised.
    fn malformed(&self, expected: TokenType) -> PugError {
        let at = self
            .last
            .clone()
            .unwrap_or_else(|| Location::point(pug_lexer::Position::new(1, 1), None));
        self.error(
            ErrorCode::InvalidToken,
            format!("malformed \"{expected}\" token"),
            &at,
        )
    }

    pub fn merge(&self, a: &Location, b: &Location) -> Result<Location, PugError> {
        a.merge(b)
            .map_err(|err| self.error(ErrorCode::LocationMismatch, err.to_string(), b))
    }

    /// Add `node` to `block`, splicing in the children of a bare block.
    pub fn append(&self, block: &mut Block, node: Node) -> Result<(), PugError> {
        let nodes = match node {
            Node::Block(inner) => inner.nodes,
            other => vec![other],
        };
        for node in nodes {
            let loc = node.loc().clone();
            block
                .push(node)
                .map_err(|err| self.error(ErrorCode::LocationMismatch, err.to_string(), &loc))?;
        }
        Ok(())
    }

    fn source_name(&self) -> &str {
        self.source_id.as_deref().unwrap_or("Pug")
    }

    // =========================================================================
    // Statements
    // =========================================================================

    pub fn parse_expr(&mut self) -> Result<Node, PugError> {
        match self.peek_type()? {
            TokenType::Tag => self.parse_tag(),
            TokenType::Mixin => self.parse_mixin(),
            TokenType::Block => self.parse_named_block(),
            TokenType::MixinBlock => self.parse_mixin_block(),
            TokenType::Case => self.parse_case(),
            TokenType::Extends => self.parse_extends(),
            TokenType::Include => self.parse_include(),
            TokenType::Doctype => self.parse_doctype(),
            TokenType::Filter => self.parse_filter().map(Node::Filter),
            TokenType::Comment => self.parse_comment(),
            TokenType::Text | TokenType::InterpolatedCode | TokenType::StartPugInterpolation => {
                self.parse_text(true)
            }
            TokenType::TextHtml => {
                let anchor = self.peek()?.loc.clone();
                let mut block = Block::empty(anchor);
                for node in self.parse_text_html()? {
                    self.append(&mut block, node)?;
                }
                Ok(Node::Block(block))
            }
            TokenType::Dot => self.parse_dot(),
            TokenType::Each => self.parse_each(),
            TokenType::EachOf => self.parse_each_of(),
            TokenType::Code => self.parse_code(false).map(Node::Code),
            TokenType::BlockCode => self.parse_block_code(),
            TokenType::If => self.parse_conditional(),
            TokenType::While => self.parse_while(),
            TokenType::Call => self.parse_call(),
            TokenType::Interpolation => self.parse_interpolation(),
            TokenType::Yield => self.parse_yield(),
            TokenType::Id | TokenType::Class => {
                let loc = self.peek()?.loc.clone();
                self.defer(Token::new(TokenKind::Tag { val: "div".into() }, loc));
                self.parse_expr()
            }
            ty => {
                let token = self.peek()?.clone();
                match self.plugins.get(ExtensionPoint::Expression, &ty) {
                    Some(plugin) => plugin.expression(self, &token),
                    None => Err(self.unexpected(&token)),
                }
            }
        }
    }

    /// `indent (expr | text-html | newline)* outdent`
    pub fn block(&mut self) -> Result<Block, PugError> {
        let indent = self.expect(TokenType::Indent)?;
        let mut block = Block::empty(indent.loc);
        loop {
            match self.peek_type()? {
                TokenType::Outdent => break,
                TokenType::Newline => {
                    self.advance()?;
                }
                TokenType::TextHtml => {
                    for node in self.parse_text_html()? {
                        self.append(&mut block, node)?;
                    }
                }
                _ => {
                    let expr = self.parse_expr()?;
                    self.append(&mut block, expr)?;
                }
            }
        }
        self.expect(TokenType::Outdent)?;
        Ok(block)
    }

    /// An indented block, or an empty one anchored after `anchor`.
    fn optional_block(&mut self, anchor: &Location) -> Result<Block, PugError> {
        if self.peek_type()? == TokenType::Indent {
            self.block()
        } else {
            Ok(Block::empty(anchor.anchor_end()))
        }
    }

    /// `: expr` on the same line, or an indented block.
    fn parse_block_expansion(&mut self) -> Result<Block, PugError> {
        match self.accept(TokenType::Colon)? {
            Some(colon) => {
                let expr = self.parse_expr()?;
                let mut block = Block::empty(colon.loc);
                self.append(&mut block, expr)?;
                Ok(block)
            }
            None => self.block(),
        }
    }

    fn parse_doctype(&mut self) -> Result<Node, PugError> {
        let token = self.expect(TokenType::Doctype)?;
        let TokenKind::Doctype { val } = token.kind else {
            return Err(self.malformed(TokenType::Doctype));
        };
        Ok(Node::Doctype(Doctype {
            val,
            loc: token.loc,
        }))
    }

    fn parse_yield(&mut self) -> Result<Node, PugError> {
        let token = self.expect(TokenType::Yield)?;
        Ok(Node::YieldBlock(Marker { loc: token.loc }))
    }

    fn parse_mixin_block(&mut self) -> Result<Node, PugError> {
        let token = self.expect(TokenType::MixinBlock)?;
        if !self.is_in_mixin() {
            return Err(self.error(
                ErrorCode::BlockOutsideMixin,
                "Anonymous blocks are not allowed unless they are part of a mixin.",
                &token.loc,
            ));
        }
        Ok(Node::MixinBlock(Marker { loc: token.loc }))
    }

    fn parse_comment(&mut self) -> Result<Node, PugError> {
        let token = self.expect(TokenType::Comment)?;
        let TokenKind::Comment { val, buffer } = token.kind else {
            return Err(self.malformed(TokenType::Comment));
        };
        match self.parse_text_block()? {
            Some(block) => Ok(Node::BlockComment(BlockComment {
                val,
                buffer,
                loc: self.merge(&token.loc, &block.loc)?,
                block,
            })),
            None => Ok(Node::Comment(Comment {
                val,
                buffer,
                loc: token.loc,
            })),
        }
    }

    fn parse_dot(&mut self) -> Result<Node, PugError> {
        let dot = self.expect(TokenType::Dot)?;
        let block = match self.parse_text_block()? {
            Some(block) => block,
            None => Block::empty(dot.loc.anchor_end()),
        };
        Ok(Node::Block(block))
    }

    // =========================================================================
    // Text
    // =========================================================================

    fn inline_node(&self, token: Token) -> Result<Node, PugError> {
        match token.kind {
            TokenKind::Text { val } => Ok(Node::Text(Text {
                val,
                is_html: false,
                loc: token.loc,
            })),
            TokenKind::InterpolatedCode {
                val,
                must_escape,
                buffer,
            } => Ok(Node::Code(Code {
                val,
                buffer,
                must_escape,
                is_inline: true,
                block: None,
                loc: token.loc,
            })),
            _ => Err(self.malformed(TokenType::Text)),
        }
    }

    /// A run of text, interpolated code and tag interpolations. With
    /// `multiline`, newlines between text lines become `"\n"` text nodes.
    fn parse_text(&mut self, multiline: bool) -> Result<Node, PugError> {
        let anchor = self.peek()?.loc.clone();
        let mut nodes = Vec::new();
        loop {
            match self.peek_type()? {
                TokenType::Text | TokenType::InterpolatedCode => {
                    let token = self.advance()?;
                    nodes.push(self.inline_node(token)?);
                }
                TokenType::Newline if multiline => {
                    let newline = self.advance()?;
                    if matches!(
                        self.peek_type()?,
                        TokenType::Text | TokenType::InterpolatedCode
                    ) {
                        nodes.push(Node::Text(Text {
                            val: "\n".into(),
                            is_html: false,
                            loc: newline.loc,
                        }));
                    }
                }
                TokenType::StartPugInterpolation => {
                    self.advance()?;
                    nodes.push(self.parse_expr()?);
                    self.expect(TokenType::EndPugInterpolation)?;
                }
                ty => {
                    let Some(plugin) = self.plugins.get(ExtensionPoint::Text, &ty) else {
                        break;
                    };
                    let token = self.peek()?.clone();
                    plugin.text(self, &token, &mut nodes)?;
                }
            }
        }

        if nodes.len() == 1 {
            if let Some(node) = nodes.pop() {
                return Ok(node);
            }
        }
        let mut block = Block::empty(anchor.anchor_end());
        for node in nodes {
            self.append(&mut block, node)?;
        }
        Ok(Node::Block(block))
    }

    /// Consecutive `<...>` lines, joined into one html text node. Indented
    /// children are spliced in place.
    fn parse_text_html(&mut self) -> Result<Vec<Node>, PugError> {
        let mut nodes: Vec<Node> = Vec::new();
        let mut current: Option<usize> = None;
        loop {
            match self.peek_type()? {
                TokenType::TextHtml => {
                    let token = self.advance()?;
                    let TokenKind::TextHtml { val } = token.kind else {
                        return Err(self.malformed(TokenType::TextHtml));
                    };
                    let text = Text {
                        val,
                        is_html: true,
                        loc: token.loc,
                    };
                    self.add_html(&mut nodes, &mut current, text)?;
                }
                TokenType::Indent => {
                    let block = self.block()?;
                    for node in block.nodes {
                        match node {
                            Node::Text(text) if text.is_html => {
                                self.add_html(&mut nodes, &mut current, text)?;
                            }
                            other => {
                                current = None;
                                nodes.push(other);
                            }
                        }
                    }
                }
                TokenType::Newline => {
                    self.advance()?;
                }
                _ => break,
            }
        }
        Ok(nodes)
    }

    fn add_html(
        &self,
        nodes: &mut Vec<Node>,
        current: &mut Option<usize>,
        text: Text,
    ) -> Result<(), PugError> {
        if let Some(Node::Text(open)) = current.and_then(|i| nodes.get_mut(i)) {
            open.val.push('\n');
            open.val.push_str(&text.val);
            open.loc = self.merge(&open.loc, &text.loc)?;
            return Ok(());
        }
        *current = Some(nodes.len());
        nodes.push(Node::Text(text));
        Ok(())
    }

    /// `start-pipeless-text (text | newline | interpolation)* end-pipeless-text`
    pub fn parse_text_block(&mut self) -> Result<Option<Block>, PugError> {
        let Some(start) = self.accept(TokenType::StartPipelessText)? else {
            return Ok(None);
        };
        let mut block = Block::empty(start.loc);
        while self.peek_type()? != TokenType::EndPipelessText {
            let token = self.advance()?;
            match token.token_type() {
                TokenType::Text | TokenType::InterpolatedCode => {
                    let node = self.inline_node(token)?;
                    self.append(&mut block, node)?;
                }
                TokenType::Newline => {
                    let text = Node::Text(Text {
                        val: "\n".into(),
                        is_html: false,
                        loc: token.loc,
                    });
                    self.append(&mut block, text)?;
                }
                TokenType::StartPugInterpolation => {
                    let expr = self.parse_expr()?;
                    self.append(&mut block, expr)?;
                    self.expect(TokenType::EndPugInterpolation)?;
                }
                ty => match self.plugins.get(ExtensionPoint::TextBlock, &ty) {
                    Some(plugin) => plugin.text_block(self, &token, &mut block)?,
                    None => {
                        return Err(self.error(
                            ErrorCode::InvalidToken,
                            format!("Unexpected token type: {ty}"),
                            &token.loc,
                        ))
                    }
                },
            }
        }
        let end = self.advance()?;
        block.loc = self.merge(&block.loc, &end.loc)?;
        Ok(Some(block))
    }

    // =========================================================================
    // Code and control flow
    // =========================================================================

    /// `- code`, `= expr` or `!= expr`. Inline code never takes a block.
    fn parse_code(&mut self, inline: bool) -> Result<Code, PugError> {
        let token = self.expect(TokenType::Code)?;
        let TokenKind::Code {
            val,
            must_escape,
            buffer,
        } = token.kind
        else {
            return Err(self.malformed(TokenType::Code));
        };
        let mut code = Code {
            val,
            buffer,
            must_escape,
            is_inline: inline,
            block: None,
            loc: token.loc,
        };
        if inline || self.peek_type()? != TokenType::Indent {
            return Ok(code);
        }
        if buffer {
            return Err(self.error(
                ErrorCode::BlockInBufferedCode,
                "You cannot have a block in buffered code.",
                &code.loc,
            ));
        }
        let block = self.block()?;
        code.loc = self.merge(&code.loc, &block.loc)?;
        code.block = Some(block);
        Ok(code)
    }

    /// A `-` line followed by a verbatim body.
    fn parse_block_code(&mut self) -> Result<Node, PugError> {
        let token = self.expect(TokenType::BlockCode)?;
        let mut loc = token.loc;
        let mut val = String::new();
        if let Some(start) = self.accept(TokenType::StartPipelessText)? {
            loc = self.merge(&loc, &start.loc)?;
            while self.peek_type()? != TokenType::EndPipelessText {
                let token = self.advance()?;
                loc = self.merge(&loc, &token.loc)?;
                match &token.kind {
                    TokenKind::Text { val: text } => val.push_str(text),
                    TokenKind::Newline => val.push('\n'),
                    kind => {
                        let ty = kind.token_type();
                        let Some(plugin) = self.plugins.get(ExtensionPoint::BlockCode, &ty) else {
                            return Err(self.error(
                                ErrorCode::InvalidToken,
                                format!("Unexpected token type: {ty}"),
                                &token.loc,
                            ));
                        };
                        val.push_str(&plugin.block_code(self, &token)?);
                    }
                }
            }
            let end = self.advance()?;
            loc = self.merge(&loc, &end.loc)?;
        }
        Ok(Node::Code(Code {
            val,
            buffer: false,
            must_escape: false,
            is_inline: false,
            block: None,
            loc,
        }))
    }

    fn parse_conditional(&mut self) -> Result<Node, PugError> {
        let token = self.expect(TokenType::If)?;
        let TokenKind::If { val } = token.kind else {
            return Err(self.malformed(TokenType::If));
        };
        let first = Branch {
            test: val,
            consequent: self.optional_block(&token.loc)?,
            anchor: token.loc,
        };

        let mut else_ifs = Vec::new();
        let mut otherwise = None;
        loop {
            match self.peek_type()? {
                TokenType::Newline => {
                    self.advance()?;
                }
                TokenType::ElseIf => {
                    let token = self.advance()?;
                    let TokenKind::ElseIf { val } = token.kind else {
                        return Err(self.malformed(TokenType::ElseIf));
                    };
                    else_ifs.push(Branch {
                        test: val,
                        consequent: self.optional_block(&token.loc)?,
                        anchor: token.loc,
                    });
                }
                TokenType::Else => {
                    self.advance()?;
                    if self.peek_type()? == TokenType::Indent {
                        otherwise = Some(self.block()?);
                    }
                    break;
                }
                _ => break,
            }
        }

        let mut alternate = otherwise.map(|block| Box::new(Node::Block(block)));
        for branch in else_ifs.into_iter().rev() {
            let node = self.link(branch, alternate)?;
            alternate = Some(Box::new(Node::Conditional(node)));
        }
        Ok(Node::Conditional(self.link(first, alternate)?))
    }

    fn link(
        &self,
        branch: Branch,
        alternate: Option<Box<Node>>,
    ) -> Result<Conditional, PugError> {
        let mut loc = self.merge(&branch.anchor, &branch.consequent.loc)?;
        if let Some(alternate) = &alternate {
            loc = self.merge(&loc, alternate.loc())?;
        }
        Ok(Conditional {
            test: branch.test,
            consequent: branch.consequent,
            alternate,
            loc,
        })
    }

    fn parse_while(&mut self) -> Result<Node, PugError> {
        let token = self.expect(TokenType::While)?;
        let TokenKind::While { val } = token.kind else {
            return Err(self.malformed(TokenType::While));
        };
        let block = self.optional_block(&token.loc)?;
        Ok(Node::While(While {
            test: val,
            loc: self.merge(&token.loc, &block.loc)?,
            block,
        }))
    }

    fn parse_each(&mut self) -> Result<Node, PugError> {
        let token = self.expect(TokenType::Each)?;
        let TokenKind::Each { val, key, code } = token.kind else {
            return Err(self.malformed(TokenType::Each));
        };
        let block = self.block()?;
        let mut loc = self.merge(&token.loc, &block.loc)?;
        let alternate = match self.accept(TokenType::Else)? {
            Some(_) => {
                let alternate = self.block()?;
                loc = self.merge(&loc, &alternate.loc)?;
                Some(alternate)
            }
            None => None,
        };
        Ok(Node::Each(Each {
            obj: code,
            val,
            key,
            block,
            alternate,
            loc,
        }))
    }

    fn parse_each_of(&mut self) -> Result<Node, PugError> {
        let token = self.expect(TokenType::EachOf)?;
        let TokenKind::EachOf { val, code } = token.kind else {
            return Err(self.malformed(TokenType::EachOf));
        };
        let block = self.block()?;
        Ok(Node::EachOf(EachOf {
            obj: code,
            val,
            loc: self.merge(&token.loc, &block.loc)?,
            block,
        }))
    }

    fn parse_case(&mut self) -> Result<Node, PugError> {
        let token = self.expect(TokenType::Case)?;
        let TokenKind::Case { val } = token.kind else {
            return Err(self.malformed(TokenType::Case));
        };
        let mut block = Block::empty(token.loc.anchor_end());
        self.expect(TokenType::Indent)?;
        loop {
            match self.peek_type()? {
                TokenType::Outdent => break,
                TokenType::Comment | TokenType::Newline => {
                    self.advance()?;
                }
                TokenType::When => {
                    let when = self.parse_when()?;
                    self.append(&mut block, when)?;
                }
                TokenType::Default => {
                    let default = self.parse_default()?;
                    self.append(&mut block, default)?;
                }
                ty => {
                    let token = self.peek()?.clone();
                    let Some(plugin) = self.plugins.get(ExtensionPoint::Case, &ty) else {
                        return Err(self.error(
                            ErrorCode::InvalidToken,
                            format!(
                                "Unexpected token \"{ty}\", expected \"when\", \"default\" or \"newline\""
                            ),
                            &token.loc,
                        ));
                    };
                    plugin.case(self, &token, &mut block)?;
                }
            }
        }
        self.expect(TokenType::Outdent)?;
        Ok(Node::Case(Case {
            expr: val,
            loc: self.merge(&token.loc, &block.loc)?,
            block,
        }))
    }

    fn parse_when(&mut self) -> Result<Node, PugError> {
        let token = self.expect(TokenType::When)?;
        let TokenKind::When { val } = token.kind else {
            return Err(self.malformed(TokenType::When));
        };
        let block = match self.peek_type()? {
            TokenType::Newline | TokenType::Outdent => None,
            _ => Some(self.parse_block_expansion()?),
        };
        let loc = match &block {
            Some(block) => self.merge(&token.loc, &block.loc)?,
            None => token.loc,
        };
        Ok(Node::When(When {
            expr: val,
            block,
            loc,
        }))
    }

    fn parse_default(&mut self) -> Result<Node, PugError> {
        let token = self.expect(TokenType::Default)?;
        let block = self.parse_block_expansion()?;
        Ok(Node::When(When {
            expr: "default".into(),
            loc: self.merge(&token.loc, &block.loc)?,
            block: Some(block),
        }))
    }

    // =========================================================================
    // Template composition
    // =========================================================================

    fn file_reference(&mut self) -> Result<FileReference, PugError> {
        let token = self.expect(TokenType::Path)?;
        let TokenKind::Path { val } = token.kind else {
            return Err(self.malformed(TokenType::Path));
        };
        Ok(FileReference {
            path: val.trim().to_string(),
            loc: token.loc,
        })
    }

    fn parse_extends(&mut self) -> Result<Node, PugError> {
        let token = self.expect(TokenType::Extends)?;
        let file = self.file_reference()?;
        Ok(Node::Extends(Extends {
            loc: self.merge(&token.loc, &file.loc)?,
            file,
        }))
    }

    fn parse_named_block(&mut self) -> Result<Node, PugError> {
        let token = self.expect(TokenType::Block)?;
        let TokenKind::Block { val, mode } = token.kind else {
            return Err(self.malformed(TokenType::Block));
        };
        let block = self.optional_block(&token.loc)?;
        Ok(Node::NamedBlock(NamedBlock {
            name: val.trim().to_string(),
            mode,
            loc: self.merge(&token.loc, &block.loc)?,
            nodes: block.nodes,
        }))
    }

    fn parse_include(&mut self) -> Result<Node, PugError> {
        let token = self.expect(TokenType::Include)?;
        let mut loc = token.loc;
        let mut filters = Vec::new();
        while self.peek_type()? == TokenType::Filter {
            let filter = self.parse_include_filter()?;
            loc = self.merge(&loc, &filter.loc)?;
            filters.push(filter);
        }
        let file = self.file_reference()?;
        loc = self.merge(&loc, &file.loc)?;

        let path = file.path.as_str();
        let is_template = path.ends_with(".pug") || path.ends_with(".jade");
        if is_template && filters.is_empty() {
            if path.ends_with(".jade") {
                warn!(
                    "{}, line {}: The .jade extension is deprecated, use .pug for \"{path}\".",
                    self.source_name(),
                    loc.start.line
                );
            }
            let block = self.optional_block(&loc)?;
            loc = self.merge(&loc, &block.loc)?;
            return Ok(Node::Include(Include { file, block, loc }));
        }

        if self.peek_type()? == TokenType::Indent {
            let indent = self.peek()?;
            return Err(self.error(
                ErrorCode::RawIncludeBlock,
                "Raw inclusion cannot contain a block",
                &indent.loc,
            ));
        }
        Ok(Node::RawInclude(RawInclude { file, filters, loc }))
    }

    fn parse_include_filter(&mut self) -> Result<IncludeFilter, PugError> {
        let token = self.expect(TokenType::Filter)?;
        let TokenKind::Filter { val } = token.kind else {
            return Err(self.malformed(TokenType::Filter));
        };
        let mut loc = token.loc;
        let mut attrs = Vec::new();
        if self.peek_type()? == TokenType::StartAttributes {
            let (list, span) = self.attrs(None)?;
            loc = self.merge(&loc, &span)?;
            attrs = list;
        }
        Ok(IncludeFilter {
            name: val,
            attrs,
            loc,
        })
    }

    fn parse_filter(&mut self) -> Result<Filter, PugError> {
        let token = self.expect(TokenType::Filter)?;
        let TokenKind::Filter { val } = token.kind else {
            return Err(self.malformed(TokenType::Filter));
        };
        let mut loc = token.loc;
        let mut attrs = Vec::new();
        if self.peek_type()? == TokenType::StartAttributes {
            let (list, span) = self.attrs(None)?;
            loc = self.merge(&loc, &span)?;
            attrs = list;
        }

        let block = match self.peek_type()? {
            TokenType::Text => {
                let token = self.advance()?;
                let mut block = Block::empty(token.loc.clone());
                let text = self.inline_node(token)?;
                self.append(&mut block, text)?;
                block
            }
            TokenType::Filter => {
                let inner = self.parse_filter()?;
                let mut block = Block::empty(inner.loc.clone());
                self.append(&mut block, Node::Filter(inner))?;
                block
            }
            _ => match self.parse_text_block()? {
                Some(block) => block,
                None => Block::empty(loc.anchor_end()),
            },
        };
        Ok(Filter {
            name: val,
            loc: self.merge(&loc, &block.loc)?,
            block,
            attrs,
        })
    }

    // =========================================================================
    // Mixins
    // =========================================================================

    fn parse_mixin(&mut self) -> Result<Node, PugError> {
        let token = self.expect(TokenType::Mixin)?;
        let TokenKind::Mixin { val, args } = token.kind else {
            return Err(self.malformed(TokenType::Mixin));
        };
        if self.peek_type()? != TokenType::Indent {
            return Err(self.error(
                ErrorCode::MixinWithoutBody,
                format!("Mixin {val} declared without body"),
                &token.loc,
            ));
        }
        self.in_mixin += 1;
        let block = self.block();
        self.in_mixin -= 1;
        let block = block?;
        Ok(Node::Mixin(Mixin {
            name: val,
            args,
            call: false,
            attrs: Vec::new(),
            attribute_blocks: Vec::new(),
            loc: self.merge(&token.loc, &block.loc)?,
            block: Some(block),
        }))
    }

    /// `+name(args)` with optional attributes and body. A call without
    /// content has no block.
    fn parse_call(&mut self) -> Result<Node, PugError> {
        let token = self.expect(TokenType::Call)?;
        let TokenKind::Call { val, args } = token.kind else {
            return Err(self.malformed(TokenType::Call));
        };
        let mut element = Element::new(token.loc);
        self.tag(&mut element, false)?;
        let block = (!element.block.is_empty()).then_some(element.block);
        Ok(Node::Mixin(Mixin {
            name: val,
            args,
            block,
            call: true,
            attrs: element.attrs,
            attribute_blocks: element.attribute_blocks,
            loc: element.loc,
        }))
    }

    // =========================================================================
    // Elements
    // =========================================================================

    fn parse_tag(&mut self) -> Result<Node, PugError> {
        let token = self.expect(TokenType::Tag)?;
        let TokenKind::Tag { val } = token.kind else {
            return Err(self.malformed(TokenType::Tag));
        };
        let mut element = Element::new(token.loc);
        self.tag(&mut element, true)?;
        Ok(Node::Tag(Tag {
            is_inline: INLINE_TAGS.contains(&val.as_str()),
            name: val,
            self_closing: element.self_closing,
            block: element.block,
            attrs: element.attrs,
            attribute_blocks: element.attribute_blocks,
            text_only: element.text_only,
            loc: element.loc,
        }))
    }

    fn parse_interpolation(&mut self) -> Result<Node, PugError> {
        let token = self.expect(TokenType::Interpolation)?;
        let TokenKind::Interpolation { val } = token.kind else {
            return Err(self.malformed(TokenType::Interpolation));
        };
        let mut element = Element::new(token.loc);
        self.tag(&mut element, true)?;
        Ok(Node::InterpolatedTag(InterpolatedTag {
            expr: val,
            self_closing: element.self_closing,
            block: element.block,
            attrs: element.attrs,
            attribute_blocks: element.attribute_blocks,
            is_inline: false,
            text_only: element.text_only,
            loc: element.loc,
        }))
    }

    /// Everything after an element's name: ids, classes, attribute lists,
    /// `&attributes`, an optional `.`, then inline content and the body.
    pub fn tag(&mut self, element: &mut Element, self_closing_allowed: bool) -> Result<(), PugError> {
        let mut seen_attrs = false;
        let mut attribute_names: Vec<String> = Vec::new();
        loop {
            match self.peek_type()? {
                TokenType::Id | TokenType::Class => {
                    let token = self.advance()?;
                    let (name, val) = match token.kind {
                        TokenKind::Id { val } => ("id", val),
                        TokenKind::Class { val } => ("class", val),
                        _ => return Err(self.malformed(TokenType::Id)),
                    };
                    if name == "id" {
                        if attribute_names.iter().any(|n| n == "id") {
                            return Err(self.error(
                                ErrorCode::DuplicateId,
                                "Duplicate attribute \"id\" is not allowed.",
                                &token.loc,
                            ));
                        }
                        attribute_names.push("id".into());
                    }
                    element.loc = self.merge(&element.loc, &token.loc)?;
                    element.attrs.push(Attribute {
                        name: name.into(),
                        val: AttributeValue::Expr(format!("'{val}'")),
                        must_escape: false,
                        loc: token.loc,
                    });
                }
                TokenType::StartAttributes => {
                    if seen_attrs {
                        let line = self.peek()?.loc.start.line;
                        warn!(
                            "{}, line {line}: You should not have pug tags with multiple attributes.",
                            self.source_name()
                        );
                    }
                    seen_attrs = true;
                    let (attrs, span) = self.attrs(Some(&mut attribute_names))?;
                    element.loc = self.merge(&element.loc, &span)?;
                    element.attrs.extend(attrs);
                }
                TokenType::AndAttributes => {
                    let token = self.advance()?;
                    let TokenKind::AndAttributes { val } = token.kind else {
                        return Err(self.malformed(TokenType::AndAttributes));
                    };
                    element.loc = self.merge(&element.loc, &token.loc)?;
                    element.attribute_blocks.push(AttributeBlock {
                        val,
                        loc: token.loc,
                    });
                }
                ty => {
                    let Some(plugin) = self.plugins.get(ExtensionPoint::TagAttribute, &ty) else {
                        break;
                    };
                    let token = self.peek()?.clone();
                    plugin.tag_attribute(self, &token, element, &mut attribute_names)?;
                }
            }
        }

        if let Some(dot) = self.accept(TokenType::Dot)? {
            element.text_only = true;
            element.loc = self.merge(&element.loc, &dot.loc)?;
        }

        match self.peek_type()? {
            TokenType::Text | TokenType::InterpolatedCode | TokenType::StartPugInterpolation => {
                let text = self.parse_text(false)?;
                self.append(&mut element.block, text)?;
            }
            TokenType::Code => {
                let code = self.parse_code(true)?;
                self.append(&mut element.block, Node::Code(code))?;
            }
            TokenType::Colon => {
                let colon = self.advance()?;
                let expr = self.parse_expr()?;
                let mut block = Block::empty(colon.loc);
                self.append(&mut block, expr)?;
                element.block = block;
            }
            TokenType::Newline
            | TokenType::Indent
            | TokenType::Outdent
            | TokenType::Eos
            | TokenType::StartPipelessText
            | TokenType::EndPugInterpolation => {}
            TokenType::Slash if self_closing_allowed => {
                let slash = self.advance()?;
                element.self_closing = true;
                element.loc = self.merge(&element.loc, &slash.loc)?;
            }
            ty => {
                let token = self.peek()?.clone();
                let Some(plugin) = self.plugins.get(ExtensionPoint::Tag, &ty) else {
                    let slash = if self_closing_allowed { ", `slash`" } else { "" };
                    return Err(self.error(
                        ErrorCode::InvalidToken,
                        format!(
                            "Unexpected token `{ty}` expected `text`, `interpolated-code`, `code`, `:`{slash}, `newline` or `eos`"
                        ),
                        &token.loc,
                    ));
                };
                plugin.tag(self, &token, element)?;
            }
        }

        while self.accept(TokenType::Newline)?.is_some() {}

        if element.text_only {
            element.block = match self.parse_text_block()? {
                Some(block) => block,
                None => Block::empty(element.loc.anchor_end()),
            };
        } else if self.peek_type()? == TokenType::Indent {
            let block = self.block()?;
            for node in block.nodes {
                self.append(&mut element.block, node)?;
            }
        }
        element.loc = self.merge(&element.loc, &element.block.loc)?;
        Ok(())
    }

    /// `start-attributes attribute* end-attributes`, returning the entries
    /// and the span of the whole list.
    ///
    /// With `names`, a repeated non-class name is an error.
    pub fn attrs(
        &mut self,
        mut names: Option<&mut Vec<String>>,
    ) -> Result<(Vec<Attribute>, Location), PugError> {
        let open = self.expect(TokenType::StartAttributes)?;
        let mut span = open.loc;
        let mut attrs = Vec::new();
        while self.peek_type()? == TokenType::Attribute {
            let token = self.advance()?;
            let TokenKind::Attribute {
                name,
                val,
                must_escape,
            } = token.kind
            else {
                return Err(self.malformed(TokenType::Attribute));
            };
            if let Some(names) = names.as_deref_mut() {
                if name != "class" {
                    if names.contains(&name) {
                        let code = if name == "id" {
                            ErrorCode::DuplicateId
                        } else {
                            ErrorCode::DuplicateAttribute
                        };
                        return Err(self.error(
                            code,
                            format!("Duplicate attribute \"{name}\" is not allowed."),
                            &token.loc,
                        ));
                    }
                    names.push(name.clone());
                }
            }
            span = self.merge(&span, &token.loc)?;
            attrs.push(Attribute {
                name,
                val,
                must_escape,
                loc: token.loc,
            });
        }
        let close = self.expect(TokenType::EndAttributes)?;
        span = self.merge(&span, &close.loc)?;
        Ok((attrs, span))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::ParserPlugin;
    use pretty_assertions::assert_eq;
    use pug_lexer::{lex, BlockMode, LexerOptions, Position};

    fn parse(source: &str) -> Result<Block, PugError> {
        let tokens = lex(source, &LexerOptions::default())?;
        let options = ParserOptions::default();
        Parser::new(tokens, &options)?.parse()
    }

    fn first(source: &str) -> Node {
        parse(source).unwrap().nodes.remove(0)
    }

    #[test]
    fn test_parse_tag_with_text() {
        let Node::Tag(tag) = first("p Hello") else {
            panic!("expected tag");
        };
        assert_eq!(tag.name, "p");
        assert!(!tag.is_inline);
        assert_eq!(tag.block.nodes.len(), 1);
        assert_eq!(tag.loc.start, Position::new(1, 1));
        assert_eq!(tag.loc.end, Position::new(1, 8));
    }

    #[test]
    fn test_inline_tag_flag() {
        let Node::Tag(tag) = first("span x") else {
            panic!("expected tag");
        };
        assert!(tag.is_inline);
    }

    #[test]
    fn test_shorthand_becomes_div() {
        let Node::Tag(tag) = first(".box#main") else {
            panic!("expected tag");
        };
        assert_eq!(tag.name, "div");
        let names: Vec<&str> = tag.attrs.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["class", "id"]);
        assert_eq!(tag.attrs[0].val, AttributeValue::Expr("'box'".into()));
        assert!(!tag.attrs[0].must_escape);
    }

    #[test]
    fn test_empty_block_is_anchored_at_tag_end() {
        let Node::Tag(tag) = first("div") else {
            panic!("expected tag");
        };
        assert!(tag.block.is_empty());
        assert_eq!(tag.block.loc, tag.loc.anchor_end());
    }

    #[test]
    fn test_nested_block_widens_parent() {
        let Node::Tag(tag) = first("ul\n  li a\n  li b") else {
            panic!("expected tag");
        };
        assert_eq!(tag.block.nodes.len(), 2);
        assert_eq!(tag.loc.end.line, 3);
        for child in &tag.block.nodes {
            assert!(tag.loc.contains(child.loc()));
        }
    }

    #[test]
    fn test_conditional_chain() {
        let Node::Conditional(cond) = first("if a\n  p 1\nelse if b\n  p 2\nelse\n  p 3") else {
            panic!("expected conditional");
        };
        assert_eq!(cond.test, "a");
        let Some(alternate) = cond.alternate.as_deref() else {
            panic!("missing else-if");
        };
        let Node::Conditional(inner) = alternate else {
            panic!("expected nested conditional");
        };
        assert_eq!(inner.test, "b");
        assert!(matches!(inner.alternate.as_deref(), Some(Node::Block(_))));
        assert!(cond.loc.contains(&inner.loc));
    }

    #[test]
    fn test_conditional_without_else() {
        let Node::Conditional(cond) = first("if a\n  p") else {
            panic!("expected conditional");
        };
        assert!(cond.alternate.is_none());
    }

    #[test]
    fn test_each_with_else() {
        let Node::Each(each) = first("each item, i in items\n  li= item\nelse\n  li none") else {
            panic!("expected each");
        };
        assert_eq!(each.val, "item");
        assert_eq!(each.key.as_deref(), Some("i"));
        assert_eq!(each.obj, "items");
        assert!(each.alternate.is_some());
    }

    #[test]
    fn test_case_with_fallthrough_when() {
        let Node::Case(case) = first("case n\n  when 0\n  when 1\n    p one\n  default\n    p many")
        else {
            panic!("expected case");
        };
        assert_eq!(case.expr, "n");
        let whens: Vec<(&str, bool)> = case
            .block
            .nodes
            .iter()
            .map(|n| match n {
                Node::When(w) => (w.expr.as_str(), w.block.is_some()),
                other => panic!("unexpected {}", other.type_name()),
            })
            .collect();
        assert_eq!(whens, vec![("0", false), ("1", true), ("default", true)]);
    }

    #[test]
    fn test_case_rejects_other_children() {
        let err = parse("case n\n  p x").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidToken);
        assert_eq!(
            err.message,
            "Unexpected token \"tag\", expected \"when\", \"default\" or \"newline\""
        );
    }

    #[test]
    fn test_buffered_code_cannot_have_block() {
        let err = parse("= foo\n  p").unwrap_err();
        assert_eq!(err.code, ErrorCode::BlockInBufferedCode);
    }

    #[test]
    fn test_unbuffered_code_with_block() {
        let Node::Code(code) = first("- if (x)\n  p y") else {
            panic!("expected code");
        };
        assert!(!code.buffer);
        assert!(code.block.is_some());
    }

    #[test]
    fn test_mixin_requires_body() {
        let err = parse("mixin foo").unwrap_err();
        assert_eq!(err.code, ErrorCode::MixinWithoutBody);
        assert_eq!(err.message, "Mixin foo declared without body");
    }

    #[test]
    fn test_mixin_block_inside_mixin() {
        let Node::Mixin(mixin) = first("mixin card(title)\n  h2= title\n  block") else {
            panic!("expected mixin");
        };
        assert!(!mixin.call);
        assert_eq!(mixin.args.as_deref(), Some("title"));
        let body = mixin.block.unwrap();
        assert!(matches!(body.nodes[1], Node::MixinBlock(_)));
    }

    #[test]
    fn test_mixin_block_outside_mixin() {
        let err = parse("block").unwrap_err();
        assert_eq!(err.code, ErrorCode::BlockOutsideMixin);
    }

    #[test]
    fn test_call_without_body_has_no_block() {
        let Node::Mixin(call) = first("+card('x')(class='big')") else {
            panic!("expected call");
        };
        assert!(call.call);
        assert!(call.block.is_none());
        assert_eq!(call.attrs.len(), 1);
    }

    #[test]
    fn test_duplicate_attributes() {
        let err = parse("a(href='x' href='y')").unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateAttribute);
        assert_eq!(err.message, "Duplicate attribute \"href\" is not allowed.");

        let err = parse("a#x(id='y')").unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateId);

        let Node::Tag(tag) = first("a.x(class='y' class='z')") else {
            panic!("expected tag");
        };
        assert_eq!(tag.attrs.len(), 3);
    }

    #[test]
    fn test_self_closing_tag() {
        let Node::Tag(tag) = first("img(src='a.png')/") else {
            panic!("expected tag");
        };
        assert!(tag.self_closing);
    }

    #[test]
    fn test_dot_block_is_text_only() {
        let Node::Tag(tag) = first("script.\n  if (a) b()\n  c()") else {
            panic!("expected tag");
        };
        assert!(tag.text_only);
        let texts: Vec<&str> = tag
            .block
            .nodes
            .iter()
            .map(|n| match n {
                Node::Text(t) => t.val.as_str(),
                other => panic!("unexpected {}", other.type_name()),
            })
            .collect();
        assert_eq!(texts, vec!["if (a) b()", "\n", "c()"]);
    }

    #[test]
    fn test_block_expansion() {
        let Node::Tag(outer) = first("li: a(href='/') Home") else {
            panic!("expected tag");
        };
        assert!(matches!(&outer.block.nodes[0], Node::Tag(inner) if inner.name == "a"));
    }

    #[test]
    fn test_named_block_modes() {
        let root = parse("block content\n  p\nappend scripts\n  script").unwrap();
        let blocks: Vec<(&str, BlockMode)> = root
            .nodes
            .iter()
            .map(|n| match n {
                Node::NamedBlock(b) => (b.name.as_str(), b.mode),
                other => panic!("unexpected {}", other.type_name()),
            })
            .collect();
        assert_eq!(
            blocks,
            vec![("content", BlockMode::Replace), ("scripts", BlockMode::Append)]
        );
    }

    #[test]
    fn test_include_kinds() {
        assert!(matches!(first("include header.pug"), Node::Include(_)));
        let Node::RawInclude(raw) = first("include:markdown-it article.md") else {
            panic!("expected raw include");
        };
        assert_eq!(raw.file.path, "article.md");
        assert_eq!(raw.filters[0].name, "markdown-it");

        let err = parse("include style.css\n  p").unwrap_err();
        assert_eq!(err.code, ErrorCode::RawIncludeBlock);
    }

    #[test]
    fn test_filter_with_text_block() {
        let Node::Filter(filter) = first(":markdown\n  # Title") else {
            panic!("expected filter");
        };
        assert_eq!(filter.name, "markdown");
        assert_eq!(filter.block.nodes.len(), 1);
    }

    #[test]
    fn test_html_lines_are_joined() {
        let Node::Text(text) = first("<div>\n<span>x</span>") else {
            panic!("expected text");
        };
        assert!(text.is_html);
        assert_eq!(text.val, "<div>\n<span>x</span>");
    }

    #[test]
    fn test_tag_interpolation_in_text() {
        let Node::Tag(p) = first("p Hi #[b there]!") else {
            panic!("expected tag");
        };
        let types: Vec<&str> = p.block.nodes.iter().map(Node::type_name).collect();
        assert_eq!(types, vec!["Text", "Tag", "Text"]);
    }

    #[test]
    fn test_tag_content_starting_with_interpolation() {
        let Node::Tag(p) = first("p #[strong hi]") else {
            panic!("expected tag");
        };
        let [Node::Tag(strong)] = p.block.nodes.as_slice() else {
            panic!("expected a single interpolated tag");
        };
        assert_eq!(strong.name, "strong");
        assert_eq!(strong.loc.start, Position::new(1, 5));
        assert!(p.loc.contains(&strong.loc));
    }

    #[test]
    fn test_nested_tag_interpolation() {
        let Node::Tag(p) = first("p a #[strong #[em x]] b") else {
            panic!("expected tag");
        };
        let types: Vec<&str> = p.block.nodes.iter().map(Node::type_name).collect();
        assert_eq!(types, vec!["Text", "Tag", "Text"]);
        let Node::Tag(strong) = &p.block.nodes[1] else {
            panic!("expected strong");
        };
        let [Node::Tag(em)] = strong.block.nodes.as_slice() else {
            panic!("expected em inside strong");
        };
        assert_eq!(em.name, "em");
        assert!(strong.loc.contains(&em.loc));
    }

    #[test]
    fn test_unexpected_tag_content() {
        let err = parse("+card/").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidToken);
        assert_eq!(
            err.message,
            "Unexpected token `slash` expected `text`, `interpolated-code`, `code`, `:`, `newline` or `eos`"
        );
    }

    #[test]
    fn test_errors_carry_options() {
        let tokens = lex("mixin x", &LexerOptions::default()).unwrap();
        let options = ParserOptions::default()
            .with_source_id("page.pug")
            .with_source_text("mixin x");
        let err = Parser::new(tokens, &options).unwrap().parse().unwrap_err();
        assert_eq!(err.source_id.as_deref(), Some("page.pug"));
        assert_eq!(err.src.as_deref(), Some("mixin x"));
    }

    #[test]
    fn test_plugin_conflict_names_the_source() {
        struct Claim;
        impl ParserPlugin for Claim {
            fn claims(&self) -> Vec<(ExtensionPoint, TokenType)> {
                vec![(ExtensionPoint::Case, TokenType::Tag)]
            }
        }
        let options = ParserOptions::default()
            .with_source_id("page.pug")
            .with_plugin(Claim)
            .with_plugin(Claim);
        let Err(err) = Parser::new(Vec::new(), &options) else {
            panic!("expected a conflict");
        };
        assert_eq!(err.code, ErrorCode::PluginConflict);
        assert_eq!(err.source_id.as_deref(), Some("page.pug"));
    }

    #[test]
    fn test_unimplemented_handler_names_the_source() {
        struct Claim;
        impl ParserPlugin for Claim {
            fn claims(&self) -> Vec<(ExtensionPoint, TokenType)> {
                vec![(ExtensionPoint::Tag, TokenType::Slash)]
            }
        }
        let tokens = lex("+card/", &LexerOptions::default()).unwrap();
        let options = ParserOptions::default()
            .with_source_id("page.pug")
            .with_plugin(Claim);
        let err = Parser::new(tokens, &options).unwrap().parse().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidToken);
        assert_eq!(err.source_id.as_deref(), Some("page.pug"));
        assert_eq!((err.line, err.column), (1, 6));
    }

    #[test]
    fn test_truncated_stream() {
        let tokens = lex("div", &LexerOptions::default()).unwrap();
        let without_eos: Vec<Token> = tokens.into_iter().take(1).collect();
        let options = ParserOptions::default();
        let err = Parser::new(without_eos, &options).unwrap().parse().unwrap_err();
        assert_eq!(err.code, ErrorCode::UnexpectedEnd);
    }
}
