//! Property-based tests for indentation tracking.
//!
//! Generate random nested tag documents and check that the structural
//! tokens stay balanced and every location is well formed.

use pug_lexer::{lex, LexerOptions, TokenKind, TokenType};
use proptest::prelude::*;

/// Indentation unit: two spaces, four spaces or one tab.
fn unit() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("  "), Just("    "), Just("\t")]
}

/// Nesting levels where each line is at most one deeper than the last.
fn levels() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0usize..4, 1..20).prop_map(|raw| {
        let mut out = Vec::with_capacity(raw.len());
        let mut prev = 0usize;
        for (i, want) in raw.into_iter().enumerate() {
            let level = if i == 0 { 0 } else { want.min(prev + 1) };
            out.push(level);
            prev = level;
        }
        out
    })
}

/// Tag names starting with `x` never collide with a keyword.
fn tag_name() -> impl Strategy<Value = String> {
    "x[a-z0-9]{0,6}".prop_map(|s| s)
}

fn document(unit: &str, levels: &[usize], names: &[String]) -> String {
    levels
        .iter()
        .zip(names.iter().cycle())
        .map(|(&level, name)| format!("{}{}", unit.repeat(level), name))
        .collect::<Vec<_>>()
        .join("\n")
}

proptest! {
    #[test]
    fn indents_and_outdents_balance(
        unit in unit(),
        levels in levels(),
        names in prop::collection::vec(tag_name(), 1..5),
    ) {
        let source = document(unit, &levels, &names);
        let tokens = lex(&source, &LexerOptions::default()).unwrap();

        let indents = tokens.iter().filter(|t| t.is(&TokenType::Indent)).count();
        let outdents = tokens.iter().filter(|t| t.is(&TokenType::Outdent)).count();
        prop_assert_eq!(indents, outdents);

        let eos = tokens.iter().filter(|t| t.is(&TokenType::Eos)).count();
        prop_assert_eq!(eos, 1);
        prop_assert!(tokens.last().unwrap().is(&TokenType::Eos));

        let tags = tokens.iter().filter(|t| t.is(&TokenType::Tag)).count();
        prop_assert_eq!(tags, levels.len());
    }

    #[test]
    fn indent_values_are_multiples_of_the_unit(
        unit in unit(),
        levels in levels(),
        names in prop::collection::vec(tag_name(), 1..5),
    ) {
        let source = document(unit, &levels, &names);
        let tokens = lex(&source, &LexerOptions::default()).unwrap();
        for token in &tokens {
            if let TokenKind::Indent { val } = token.kind {
                prop_assert_eq!(val % unit.len(), 0);
            }
        }
    }

    #[test]
    fn locations_are_ordered(
        unit in unit(),
        levels in levels(),
        names in prop::collection::vec(tag_name(), 1..5),
    ) {
        let source = document(unit, &levels, &names);
        let tokens = lex(&source, &LexerOptions::default()).unwrap();
        for pair in tokens.windows(2) {
            prop_assert!(pair[0].loc.start <= pair[0].loc.end);
            prop_assert!(pair[0].loc.start <= pair[1].loc.start);
        }
    }
}
