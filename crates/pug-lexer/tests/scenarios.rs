//! End-to-end tokenization of small documents.

use pretty_assertions::assert_eq;
use pug_lexer::{lex, ErrorCode, LexerOptions, Position, TokenKind};

fn types(source: &str) -> Vec<String> {
    lex(source, &LexerOptions::default())
        .unwrap()
        .iter()
        .map(|t| t.token_type().to_string())
        .collect()
}

#[test]
fn single_tag() {
    assert_eq!(types("div"), vec!["tag", "eos"]);
}

#[test]
fn dot_text_with_interpolation() {
    let tokens = lex("p.\n  Hello #{name}", &LexerOptions::default()).unwrap();
    let kinds: Vec<TokenKind> = tokens.into_iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Tag { val: "p".into() },
            TokenKind::Dot,
            TokenKind::StartPipelessText,
            TokenKind::Text {
                val: "Hello ".into()
            },
            TokenKind::InterpolatedCode {
                val: "name".into(),
                must_escape: true,
                buffer: true,
            },
            TokenKind::EndPipelessText,
            TokenKind::Eos,
        ]
    );
}

#[test]
fn conditional_chain() {
    assert_eq!(
        types("if a\n  p yes\nelse\n  p no"),
        vec![
            "if", "indent", "tag", "text", "outdent", "else", "indent", "tag", "text", "outdent",
            "eos"
        ]
    );
}

#[test]
fn misaligned_indentation_reports_prefix_length() {
    let err = lex("div\n  a\n   b", &LexerOptions::default()).unwrap_err();
    assert_eq!(err.code, ErrorCode::InconsistentIndentation);
    assert_eq!((err.line, err.column), (3, 3));
}

#[test]
fn mixed_whitespace_on_first_indented_line() {
    let err = lex("div\n\t a", &LexerOptions::default()).unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidIndentation);
}

#[test]
fn mixin_declaration_without_body_still_lexes() {
    assert_eq!(types("mixin foo(x)"), vec!["mixin", "eos"]);
}

#[test]
fn case_with_repeated_when() {
    assert_eq!(
        types("case x\n  when 1\n    p a\n  when 1\n    p b"),
        vec![
            "case", "indent", "when", "indent", "tag", "text", "outdent", "when", "indent",
            "tag", "text", "outdent", "outdent", "eos"
        ]
    );
}

#[test]
fn tag_with_everything() {
    assert_eq!(
        types("a#home.nav.big(href='/' title=t)&attributes(extra): span= label"),
        vec![
            "tag",
            "id",
            "class",
            "class",
            "start-attributes",
            "attribute",
            "attribute",
            "end-attributes",
            "&attributes",
            ":",
            "tag",
            "code",
            "eos"
        ]
    );
}

#[test]
fn template_inheritance() {
    assert_eq!(
        types("extends layout.pug\nblock content\n  p hi\nappend scripts\n  script"),
        vec![
            "extends", "path", "newline", "block", "indent", "tag", "text", "outdent", "block",
            "indent", "tag", "outdent", "eos"
        ]
    );
}

#[test]
fn unclosed_attribute_list_reports_position() {
    let err = lex("a(href='x'", &LexerOptions::default()).unwrap_err();
    assert_eq!(err.code, ErrorCode::NoEndBracket);
    assert_eq!(err.line, 1);
    assert_eq!(err.src.as_deref(), Some("a(href='x'"));
}

#[test]
fn embedded_document_offsets() {
    let options = LexerOptions::default()
        .with_source_id("inline.pug")
        .with_starting_line(4)
        .with_starting_column(9);
    let tokens = lex("em hi\nb", &options).unwrap();
    assert_eq!(tokens[0].loc.start, Position::new(4, 9));
    assert_eq!(tokens[3].loc.start, Position::new(5, 1));
    assert!(tokens
        .iter()
        .all(|t| t.loc.source_id.as_deref() == Some("inline.pug")));
}

#[test]
fn tokens_serialize_with_type_tag() {
    let tokens = lex("p(x=1)", &LexerOptions::default()).unwrap();
    let json = serde_json::to_value(&tokens).unwrap();
    assert_eq!(json[0]["type"], "tag");
    assert_eq!(json[0]["val"], "p");
    assert_eq!(json[2]["type"], "attribute");
    assert_eq!(json[2]["name"], "x");
    assert_eq!(json[2]["val"], "1");
}
