//! Core parser infrastructure: token cursor, error reporting, helpers.

use kata_lexer::token::{Token, TokenKind};
use kata_types::ast::{Ident, Program};
use kata_types::{Diagnostics, ErrorCode, ScriptError, SourceFile, Span};

/// Maximum nesting of expressions before the parser refuses to recurse further.
pub const MAX_EXPR_DEPTH: u32 = 64;

/// The kata script parser.
///
/// Consumes a token stream produced by the lexer and builds an AST.
/// Collects errors and attempts recovery when possible.
pub struct Parser<'src> {
    tokens: Vec<Token>,
    /// Current index into `tokens`.
    pos: usize,
    source_file: &'src SourceFile,
    file_name: String,
    errors: Diagnostics,
    /// Enclosing function bodies; `return` is only legal when non-zero.
    pub(crate) function_depth: u32,
    /// Enclosing loops of the current function; gates `break`/`continue`.
    pub(crate) loop_depth: u32,
    pub(crate) expr_depth: u32,
}

/// Result of parsing.
pub struct ParseResult {
    /// `None` when any error was reported.
    pub program: Option<Program>,
    pub errors: Diagnostics,
}

impl<'src> Parser<'src> {
    /// Create a new parser from a token stream and source file.
    pub fn new(tokens: Vec<Token>, source_file: &'src SourceFile) -> Self {
        Self {
            tokens,
            pos: 0,
            file_name: source_file.name.clone(),
            source_file,
            errors: Diagnostics::empty(),
            function_depth: 0,
            loop_depth: 0,
            expr_depth: 0,
        }
    }

    // ── Token Cursor ──────────────────────────────────────────────────────────

    /// Returns the current token without advancing.
    pub(crate) fn peek(&self) -> &Token {
        static EOF: Token = Token {
            kind: TokenKind::Eof,
            span: Span {
                start_line: 1,
                start_col: 1,
                end_line: 1,
                end_col: 1,
            },
            newline_before: false,
        };
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .unwrap_or(&EOF)
    }

    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    /// Advance the cursor by one and return the consumed token.
    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    /// Returns the previously consumed token's span.
    pub(crate) fn previous_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            Span::point(1, 1)
        }
    }

    pub(crate) fn current_span(&self) -> Span {
        self.peek().span
    }

    pub(crate) fn at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    /// If the current token matches, advance and return `true`.
    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Look ahead by `n` tokens from current position.
    pub(crate) fn look_ahead(&self, n: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    /// Whether a line break precedes the current token.
    pub(crate) fn newline_before(&self) -> bool {
        self.peek().newline_before
    }

    /// The current token is the contextual keyword `word`.
    pub(crate) fn check_contextual(&self, word: &str) -> bool {
        matches!(self.peek_kind(), TokenKind::Identifier(name) if name == word)
    }

    // ── Statement Terminators ─────────────────────────────────────────────────

    /// Consume a `;`, or accept an implicit one before `}`, end of input, or a
    /// line break.
    pub(crate) fn consume_semicolon(&mut self) {
        if self.eat(&TokenKind::Semicolon) {
            return;
        }
        if self.at_end() || self.check(&TokenKind::RBrace) || self.newline_before() {
            return;
        }
        self.error_at_current(
            ErrorCode::UNEXPECTED_TOKEN,
            format!("expected ';', got '{}'", self.peek_kind()),
        );
    }

    // ── Expect Helpers ────────────────────────────────────────────────────────

    /// Expect a specific token kind. Returns the token if matched, or emits an error.
    pub(crate) fn expect(&mut self, expected: &TokenKind) -> Option<Token> {
        if self.check(expected) {
            Some(self.advance())
        } else {
            let code = match expected {
                TokenKind::RParen | TokenKind::RBrace | TokenKind::RBracket => {
                    ErrorCode::UNCLOSED_DELIMITER
                }
                _ => ErrorCode::UNEXPECTED_TOKEN,
            };
            self.error_at_current(
                code,
                format!("expected '{}', got '{}'", expected, self.peek_kind()),
            );
            None
        }
    }

    /// Expect a binding name (identifier, not a reserved word).
    pub(crate) fn expect_identifier(&mut self) -> Option<Ident> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                let span = self.advance().span;
                Some(Ident::new(name, span))
            }
            _ => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected identifier, got '{}'", self.peek_kind()),
                );
                None
            }
        }
    }

    /// Expect a property name after `.` or as an object key. Reserved words
    /// are valid here (`obj.default`, `{ if: 1 }`).
    pub(crate) fn expect_property_name(&mut self) -> Option<Ident> {
        let kind = self.peek_kind().clone();
        let name = match &kind {
            TokenKind::Identifier(name) => name.clone(),
            _ => match kind.keyword_text() {
                Some(text) => text.to_string(),
                None => {
                    self.error_at_current(
                        ErrorCode::UNEXPECTED_TOKEN,
                        format!("expected property name, got '{kind}'"),
                    );
                    return None;
                }
            },
        };
        let span = self.advance().span;
        Some(Ident::new(name, span))
    }

    // ── Error Reporting ───────────────────────────────────────────────────────

    pub(crate) fn error_at_current(&mut self, code: ErrorCode, message: impl Into<String>) {
        let span = self.current_span();
        self.error_at(code, message, span);
    }

    pub(crate) fn error_at(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
        let source_line = self.source_file.line(span.start_line).unwrap_or("");
        let error = ScriptError::new(&self.file_name, code, message, span, source_line);
        self.errors.push_error(error);
    }

    /// Returns `true` if we've hit the error limit and should stop.
    pub(crate) fn too_many_errors(&self) -> bool {
        self.errors.is_saturated()
    }

    // ── Synchronization ───────────────────────────────────────────────────────

    /// Skip tokens until a likely statement boundary so parsing can resume.
    ///
    /// Always consumes at least one token, so a statement that fails without
    /// consuming anything cannot stall the caller's loop.
    pub(crate) fn synchronize(&mut self) {
        if self.at_end() || self.check(&TokenKind::RBrace) {
            return;
        }
        self.advance();
        while !self.at_end() {
            if self.tokens[self.pos - 1].kind == TokenKind::Semicolon {
                return;
            }
            match self.peek_kind() {
                TokenKind::Function
                | TokenKind::Let
                | TokenKind::Const
                | TokenKind::Var
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Do
                | TokenKind::For
                | TokenKind::Return
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::Throw
                | TokenKind::Try
                | TokenKind::RBrace => return,
                _ if self.newline_before() => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ── Public API ────────────────────────────────────────────────────────────

    /// Parse the token stream into a `Program` AST.
    pub fn parse(mut self) -> ParseResult {
        let program = self.parse_program();
        let program = if self.errors.has_errors() {
            None
        } else {
            Some(program)
        };
        ParseResult {
            program,
            errors: self.errors,
        }
    }

    fn parse_program(&mut self) -> Program {
        let start = self.current_span();
        let mut body = Vec::new();
        while !self.at_end() {
            if self.too_many_errors() {
                break;
            }
            if self.check(&TokenKind::RBrace) {
                self.error_at_current(ErrorCode::UNEXPECTED_TOKEN, "unexpected '}'");
                self.advance();
                continue;
            }
            match self.parse_statement() {
                Some(stmt) => body.push(stmt),
                None => self.synchronize(),
            }
        }
        let span = start.merge(self.previous_span());
        Program { body, span }
    }
}
