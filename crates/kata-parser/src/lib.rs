//! kata script parser: converts a token stream into an AST.

mod parse_expr;
mod parse_func;
mod parse_stmt;
mod parser;

pub use parser::{ParseResult, Parser, MAX_EXPR_DEPTH};

use kata_lexer::Lexer;
use kata_types::SourceFile;

/// Lex and parse a whole source file.
///
/// Lexer diagnostics short-circuit parsing; the parser would only repeat them
/// as confusing follow-on errors.
pub fn parse_source(source_file: &SourceFile) -> ParseResult {
    let lexed = Lexer::new(source_file).lex();
    if lexed.errors.has_errors() {
        return ParseResult {
            program: None,
            errors: lexed.errors,
        };
    }
    Parser::new(lexed.tokens, source_file).parse()
}
