use clap::{Parser, Subcommand};
use log::info;
use pug_lexer::{LexerOptions, PugError};
use pug_parser::ParserOptions;
use std::path::Path;

#[derive(Parser)]
#[command(name = "pug")]
#[command(about = "Tokenize and parse Pug templates")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the token stream of a .pug file as JSON
    Tokens {
        /// Input .pug file
        path: String,
    },

    /// Print the syntax tree of a .pug file as JSON
    Ast {
        /// Input .pug file
        path: String,

        /// Line number of the first source line
        #[arg(long, default_value_t = 1)]
        line: usize,
    },

    /// Check a .pug file for errors without printing anything
    Check {
        /// Input .pug file
        path: String,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Tokens { path } => cmd_tokens(&path),
        Command::Ast { path, line } => cmd_ast(&path, line),
        Command::Check { path } => cmd_check(&path),
    }
}

fn read_source(path: &str) -> String {
    let p = Path::new(path);
    if !p.exists() {
        eprintln!("Error: file not found: {path}");
        std::process::exit(1);
    }
    match std::fs::read_to_string(p) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading {path}: {e}");
            std::process::exit(1);
        }
    }
}

/// Print the error with the offending source line, then exit.
/// `first_line` is the line number the source was lexed from.
fn fail(kind: &str, err: &PugError, first_line: usize) -> ! {
    eprintln!("{kind} error: {err}");
    let line = err
        .src
        .as_deref()
        .and_then(|src| src.lines().nth(err.line.checked_sub(first_line)?));
    if let Some(line) = line {
        eprintln!("  {:>4} | {line}", err.line);
        eprintln!("       | {}^", " ".repeat(err.column.saturating_sub(1)));
    }
    std::process::exit(1);
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error serializing output: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_tokens(path: &str) {
    let source = read_source(path);
    let options = LexerOptions::default().with_source_id(path);
    match pug_lexer::lex(&source, &options) {
        Ok(tokens) => print_json(&tokens),
        Err(e) => fail("Lex", &e, 1),
    }
}

fn cmd_ast(path: &str, line: usize) {
    let source = read_source(path);
    let lexer = LexerOptions::default()
        .with_source_id(path)
        .with_starting_line(line);
    let options = ParserOptions::default().with_source_id(path);
    match pug_parser::parse(&source, &lexer, &options) {
        Ok(root) => print_json(&root),
        Err(e) => fail("Parse", &e, line),
    }
}

fn cmd_check(path: &str) {
    let source = read_source(path);
    let lexer = LexerOptions::default().with_source_id(path);
    let options = ParserOptions::default().with_source_id(path);
    if let Err(e) = pug_parser::parse(&source, &lexer, &options) {
        fail("Parse", &e, 1);
    }
    info!("{path} parsed without errors");
    eprintln!("OK: {path}");
}
