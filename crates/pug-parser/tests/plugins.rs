//! Extending both stages with a custom `@@name` statement.

use pretty_assertions::assert_eq;
use pug_lexer::{LexerOptions, LexerPlugin, Rule, Scanner, TokenKind, TokenType};
use pug_parser::ast::{Block, Code, Text};
use pug_parser::{
    parse, ErrorCode, ExtensionPoint, Node, Parser, ParserOptions, ParserPlugin, PugError, Token,
};

struct MacroLexer;

impl LexerPlugin for MacroLexer {
    fn tokenize(&self, rule: Rule, scanner: &mut Scanner<'_>) -> Result<bool, PugError> {
        if rule != Rule::Tag {
            return Ok(false);
        }
        let Some(after) = scanner.rest().strip_prefix("@@") else {
            return Ok(false);
        };
        let name: String = after.chars().take_while(|c| c.is_alphanumeric()).collect();
        let start = scanner.position();
        let len = 2 + name.len();
        scanner.consume(len);
        scanner.advance_column(len);
        scanner.push(
            TokenKind::Custom {
                name: "macro".into(),
                val: Some(name),
            },
            start,
        );
        Ok(true)
    }
}

fn macro_type() -> TokenType {
    TokenType::Custom("macro".into())
}

/// Turns a macro statement into buffered code, with an optional body.
struct MacroParser;

impl ParserPlugin for MacroParser {
    fn claims(&self) -> Vec<(ExtensionPoint, TokenType)> {
        vec![
            (ExtensionPoint::Expression, macro_type()),
            (ExtensionPoint::Case, macro_type()),
        ]
    }

    fn expression(&self, parser: &mut Parser<'_>, _token: &Token) -> Result<Node, PugError> {
        let token = parser.advance()?;
        let TokenKind::Custom { val, .. } = token.kind else {
            unreachable!("claimed only macro tokens");
        };
        let mut code = Code {
            val: format!("{}()", val.unwrap_or_default()),
            buffer: true,
            must_escape: false,
            is_inline: false,
            block: None,
            loc: token.loc,
        };
        if parser.peek_type()? == TokenType::Indent {
            let block = parser.block()?;
            code.loc = parser.merge(&code.loc, &block.loc)?;
            code.block = Some(block);
        }
        Ok(Node::Code(code))
    }

    fn case(
        &self,
        parser: &mut Parser<'_>,
        token: &Token,
        block: &mut Block,
    ) -> Result<(), PugError> {
        let node = self.expression(parser, token)?;
        parser.append(block, node)
    }
}

struct Shadow;

impl ParserPlugin for Shadow {
    fn claims(&self) -> Vec<(ExtensionPoint, TokenType)> {
        vec![(ExtensionPoint::Case, macro_type())]
    }
}

/// Claims macro statements but keeps the default handlers.
struct Lazy;

impl ParserPlugin for Lazy {
    fn claims(&self) -> Vec<(ExtensionPoint, TokenType)> {
        vec![(ExtensionPoint::Expression, macro_type())]
    }
}

fn lexer() -> LexerOptions {
    LexerOptions::default().with_plugin(MacroLexer)
}

#[test]
fn statement_from_plugins() {
    let options = ParserOptions::default().with_plugin(MacroParser);
    let root = parse("div\n  @@header\n    p inside", &lexer(), &options).unwrap();
    let Node::Tag(div) = &root.nodes[0] else {
        panic!("expected tag");
    };
    let Node::Code(code) = &div.block.nodes[0] else {
        panic!("expected code");
    };
    assert_eq!(code.val, "header()");
    assert_eq!(code.block.as_ref().map(|b| b.nodes.len()), Some(1));
    assert!(div.loc.contains(&code.loc));
}

#[test]
fn plugin_inside_case() {
    let options = ParserOptions::default().with_plugin(MacroParser);
    let root = parse("case x\n  when 1\n    p one\n  @@fallback", &lexer(), &options).unwrap();
    let Node::Case(case) = &root.nodes[0] else {
        panic!("expected case");
    };
    let types: Vec<&str> = case.block.nodes.iter().map(Node::type_name).collect();
    assert_eq!(types, vec!["When", "Code"]);
}

#[test]
fn unclaimed_custom_token() {
    let err = parse("@@header", &lexer(), &ParserOptions::default()).unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidToken);
    assert_eq!(err.message, "unexpected token \"macro\"");
}

#[test]
fn conflicting_plugins() {
    let options = ParserOptions::default()
        .with_plugin(MacroParser)
        .with_plugin(Shadow);
    let err = parse("p", &lexer(), &options).unwrap_err();
    assert_eq!(err.code, ErrorCode::PluginConflict);
    assert_eq!(
        err.message,
        "Multiple plugin handlers found for context caseTokens, token type macro"
    );
}

#[test]
fn claimed_but_unimplemented() {
    let options = ParserOptions::default().with_plugin(Lazy);
    let err = parse("@@x", &lexer(), &options).unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidToken);
}

#[test]
fn text_nodes_are_untouched_by_plugins() {
    let options = ParserOptions::default().with_plugin(MacroParser);
    let root = parse("| plain", &lexer(), &options).unwrap();
    assert!(matches!(&root.nodes[0], Node::Text(Text { val, .. }) if val == "plain"));
}
