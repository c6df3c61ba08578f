//! Core lexer: converts script source text to a token stream.
//!
//! Features:
//! - Line (`//`) and block (`/* */`) comments are skipped
//! - Newlines are trivia; each token records whether a line break preceded it
//! - Template literals with `${expr}` substitutions via a mode stack
//! - Error recovery: collects up to [`kata_types::MAX_ERRORS`] errors instead
//!   of stopping at the first

use kata_types::{Diagnostics, ErrorCode, ScriptError, SourceFile, Span};

use crate::token::{Token, TokenKind};

/// Lexer mode: scanning code, or inside a template literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    /// Inside template text, scanning until a backtick or `${`.
    Template,
    /// Inside a `${...}` substitution. Tracks nested braces so the closing
    /// `}` of the substitution can be told apart from object literals.
    Interpolation { brace_depth: u32 },
}

pub struct Lexer<'src> {
    source: &'src [u8],
    source_file: &'src SourceFile,
    file_name: &'src str,
    /// Current byte offset into `source`.
    pos: usize,
    /// 1-based.
    line: u32,
    /// 1-based.
    col: u32,
    errors: Diagnostics,
    mode_stack: Vec<Mode>,
    /// Tokens queued ahead of the next scan (the `${` after template text).
    pending: Vec<Token>,
    /// Whether trivia skipped since the last token contained a line break.
    saw_newline: bool,
}

/// Result of lexing: tokens + any errors collected.
pub struct LexResult {
    /// The token stream (always ends with [`TokenKind::Eof`]).
    pub tokens: Vec<Token>,
    pub errors: Diagnostics,
}

impl<'src> Lexer<'src> {
    pub fn new(source_file: &'src SourceFile) -> Self {
        Self {
            source: source_file.source.as_bytes(),
            source_file,
            file_name: &source_file.name,
            pos: 0,
            line: 1,
            col: 1,
            errors: Diagnostics::empty(),
            mode_stack: vec![Mode::Normal],
            pending: Vec::new(),
            saw_newline: false,
        }
    }

    /// Lex the entire source file into a token stream.
    pub fn lex(mut self) -> LexResult {
        let mut tokens = Vec::new();

        loop {
            if self.errors.is_saturated() {
                break;
            }

            if let Some(pending) = self.pending.pop() {
                tokens.push(pending);
                continue;
            }

            let mut token = match self.current_mode() {
                Mode::Normal | Mode::Interpolation { .. } => self.scan_normal(),
                Mode::Template => self.scan_template_continuation(),
            };
            token.newline_before = std::mem::take(&mut self.saw_newline);

            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        if tokens.last().map_or(true, |t| t.kind != TokenKind::Eof) {
            tokens.push(Token::new(TokenKind::Eof, self.current_span()));
        }

        LexResult {
            tokens,
            errors: self.errors,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Mode stack helpers
    // ─────────────────────────────────────────────────────────────

    fn current_mode(&self) -> Mode {
        *self.mode_stack.last().unwrap_or(&Mode::Normal)
    }

    fn push_mode(&mut self, mode: Mode) {
        self.mode_stack.push(mode);
    }

    fn pop_mode(&mut self) {
        if self.mode_stack.len() > 1 {
            self.mode_stack.pop();
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Character-level helpers
    // ─────────────────────────────────────────────────────────────

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.source.get(self.pos).copied()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.col = 1;
        } else if ch & 0xC0 != 0x80 {
            // Continuation bytes of a multi-byte character share one column.
            self.col += 1;
        }
        Some(ch)
    }

    /// Consume the next byte if it equals `expected`.
    fn advance_if(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn current_span(&self) -> Span {
        Span::point(self.line, self.col)
    }

    fn span_from(&self, start_line: u32, start_col: u32) -> Span {
        Span::new(
            start_line,
            start_col,
            self.line,
            self.col.saturating_sub(1).max(1),
        )
    }

    fn emit_error(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
        let source_line = self.source_file.line(span.start_line).unwrap_or("");
        let err = ScriptError::new(self.file_name, code, message, span, source_line);
        self.errors.push_error(err);
    }

    fn token(&self, kind: TokenKind, start_line: u32, start_col: u32) -> Token {
        Token::new(kind, self.span_from(start_line, start_col))
    }

    // ─────────────────────────────────────────────────────────────
    // Whitespace & comments
    // ─────────────────────────────────────────────────────────────

    /// Skip whitespace, newlines, and comments.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r') => {
                    self.advance();
                }
                Some(b'\n') => {
                    self.saw_newline = true;
                    self.advance();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while let Some(ch) = self.peek() {
                        if ch == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => self.skip_block_comment(),
                _ => return,
            }
        }
    }

    fn skip_block_comment(&mut self) {
        let start_line = self.line;
        let start_col = self.col;
        self.advance();
        self.advance();
        loop {
            match self.peek() {
                None => {
                    let span = self.span_from(start_line, start_col);
                    self.emit_error(
                        ErrorCode::UNCLOSED_DELIMITER,
                        "unterminated block comment",
                        span,
                    );
                    return;
                }
                Some(b'*') if self.peek_at(1) == Some(b'/') => {
                    self.advance();
                    self.advance();
                    return;
                }
                Some(b'\n') => {
                    self.saw_newline = true;
                    self.advance();
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Normal-mode scanning
    // ─────────────────────────────────────────────────────────────

    fn scan_normal(&mut self) -> Token {
        self.skip_trivia();

        if self.errors.is_saturated() {
            return Token::new(TokenKind::Eof, self.current_span());
        }

        if self.at_end() {
            if self
                .mode_stack
                .iter()
                .any(|m| matches!(m, Mode::Template | Mode::Interpolation { .. }))
            {
                self.emit_error(
                    ErrorCode::UNTERMINATED_STRING,
                    "unterminated template literal",
                    self.current_span(),
                );
                self.mode_stack.truncate(1);
            }
            return Token::new(TokenKind::Eof, self.current_span());
        }

        let start_line = self.line;
        let start_col = self.col;
        let start_pos = self.pos;
        let Some(ch) = self.advance() else {
            return Token::new(TokenKind::Eof, self.current_span());
        };

        let kind = match ch {
            b'"' | b'\'' => return self.scan_string(ch, start_line, start_col),
            b'`' => return self.scan_template(start_line, start_col),
            b'0'..=b'9' => return self.scan_number(start_pos, start_line, start_col),
            b'.' if matches!(self.peek(), Some(b'0'..=b'9')) => {
                return self.scan_number(start_pos, start_line, start_col)
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' | b'$' => {
                return self.scan_identifier(start_pos, start_line, start_col)
            }

            b'+' => {
                if self.advance_if(b'+') {
                    TokenKind::PlusPlus
                } else if self.advance_if(b'=') {
                    TokenKind::PlusEq
                } else {
                    TokenKind::Plus
                }
            }
            b'-' => {
                if self.advance_if(b'-') {
                    TokenKind::MinusMinus
                } else if self.advance_if(b'=') {
                    TokenKind::MinusEq
                } else {
                    TokenKind::Minus
                }
            }
            b'*' => {
                if self.advance_if(b'*') {
                    if self.advance_if(b'=') {
                        TokenKind::StarStarEq
                    } else {
                        TokenKind::StarStar
                    }
                } else if self.advance_if(b'=') {
                    TokenKind::StarEq
                } else {
                    TokenKind::Star
                }
            }
            b'/' => {
                if self.advance_if(b'=') {
                    TokenKind::SlashEq
                } else {
                    TokenKind::Slash
                }
            }
            b'%' => {
                if self.advance_if(b'=') {
                    TokenKind::PercentEq
                } else {
                    TokenKind::Percent
                }
            }
            b'=' => {
                if self.advance_if(b'=') {
                    if self.advance_if(b'=') {
                        TokenKind::EqEqEq
                    } else {
                        TokenKind::EqEq
                    }
                } else if self.advance_if(b'>') {
                    TokenKind::Arrow
                } else {
                    TokenKind::Eq
                }
            }
            b'!' => {
                if self.advance_if(b'=') {
                    if self.advance_if(b'=') {
                        TokenKind::BangEqEq
                    } else {
                        TokenKind::BangEq
                    }
                } else {
                    TokenKind::Bang
                }
            }
            b'<' => {
                if self.advance_if(b'=') {
                    TokenKind::LessEq
                } else {
                    TokenKind::Less
                }
            }
            b'>' => {
                if self.advance_if(b'=') {
                    TokenKind::GreaterEq
                } else {
                    TokenKind::Greater
                }
            }
            b'&' if self.advance_if(b'&') => TokenKind::AmpAmp,
            b'|' if self.advance_if(b'|') => TokenKind::PipePipe,
            b'?' => {
                if self.advance_if(b'?') {
                    TokenKind::QuestionQuestion
                } else {
                    TokenKind::Question
                }
            }
            b'.' => {
                if self.peek() == Some(b'.') && self.peek_at(1) == Some(b'.') {
                    self.advance();
                    self.advance();
                    TokenKind::DotDotDot
                } else {
                    TokenKind::Dot
                }
            }
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b',' => TokenKind::Comma,
            b':' => TokenKind::Colon,
            b';' => TokenKind::Semicolon,

            b'{' => {
                if let Some(Mode::Interpolation { brace_depth }) = self.mode_stack.last_mut() {
                    *brace_depth += 1;
                }
                TokenKind::LBrace
            }

            b'}' => {
                if let Some(Mode::Interpolation { brace_depth }) = self.mode_stack.last_mut() {
                    if *brace_depth == 0 {
                        // End of the substitution: resume template text.
                        self.pop_mode();
                        self.push_mode(Mode::Template);
                        return self.token(TokenKind::InterpolationEnd, start_line, start_col);
                    }
                    *brace_depth -= 1;
                }
                TokenKind::RBrace
            }

            _ => {
                // Skip the rest of a multi-byte character as one unit.
                while matches!(self.peek(), Some(b) if b & 0xC0 == 0x80) {
                    self.advance();
                }
                let text = String::from_utf8_lossy(&self.source[start_pos..self.pos]).into_owned();
                let span = self.span_from(start_line, start_col);
                self.emit_error(
                    ErrorCode::UNEXPECTED_CHARACTER,
                    format!("unexpected character '{text}'"),
                    span,
                );
                return self.scan_normal();
            }
        };

        self.token(kind, start_line, start_col)
    }

    // ─────────────────────────────────────────────────────────────
    // Number literals
    // ─────────────────────────────────────────────────────────────

    fn scan_number(&mut self, start_pos: usize, start_line: u32, start_col: u32) -> Token {
        let first = self.source[start_pos];
        let is_hex = first == b'0' && matches!(self.peek(), Some(b'x' | b'X'));

        if is_hex {
            self.advance();
            while matches!(self.peek(), Some(b) if b.is_ascii_hexdigit() || b == b'_') {
                self.advance();
            }
        } else {
            self.consume_digits();
            if first != b'.' && self.peek() == Some(b'.') && matches!(self.peek_at(1), Some(b'0'..=b'9')) {
                self.advance();
            }
            self.consume_digits();
            if matches!(self.peek(), Some(b'e' | b'E')) {
                self.advance();
                if matches!(self.peek(), Some(b'+' | b'-')) {
                    self.advance();
                }
                self.consume_digits();
            }
        }

        let text: String = String::from_utf8_lossy(&self.source[start_pos..self.pos])
            .chars()
            .filter(|c| *c != '_')
            .collect();
        let parsed = if is_hex {
            u64::from_str_radix(&text[2..], 16).ok().map(|v| v as f64)
        } else {
            text.parse::<f64>().ok()
        };

        let span = self.span_from(start_line, start_col);
        let value = match parsed {
            Some(v) => v,
            None => {
                self.emit_error(
                    ErrorCode::INVALID_NUMBER,
                    format!("invalid number literal '{text}'"),
                    span,
                );
                0.0
            }
        };
        Token::new(TokenKind::Number(value), span)
    }

    fn consume_digits(&mut self) {
        while matches!(self.peek(), Some(b'0'..=b'9' | b'_')) {
            self.advance();
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Identifiers & keywords
    // ─────────────────────────────────────────────────────────────

    fn scan_identifier(&mut self, start_pos: usize, start_line: u32, start_col: u32) -> Token {
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == b'_' || ch == b'$' {
                self.advance();
            } else {
                break;
            }
        }

        let text = std::str::from_utf8(&self.source[start_pos..self.pos]).unwrap_or("");
        let kind =
            TokenKind::from_keyword(text).unwrap_or_else(|| TokenKind::Identifier(text.to_string()));
        self.token(kind, start_line, start_col)
    }

    // ─────────────────────────────────────────────────────────────
    // String literals
    // ─────────────────────────────────────────────────────────────

    /// Scan a quoted string starting after the opening quote.
    fn scan_string(&mut self, quote: u8, start_line: u32, start_col: u32) -> Token {
        let mut buf = Vec::new();

        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    let span = self.span_from(start_line, start_col);
                    self.emit_error(
                        ErrorCode::UNTERMINATED_STRING,
                        "unterminated string literal",
                        span,
                    );
                    break;
                }
                Some(ch) if ch == quote => {
                    self.advance();
                    break;
                }
                Some(b'\\') => self.scan_escape_sequence(&mut buf),
                Some(ch) => {
                    self.advance();
                    buf.push(ch);
                }
            }
        }

        let text = String::from_utf8_lossy(&buf).into_owned();
        self.token(TokenKind::Str(text), start_line, start_col)
    }

    // ─────────────────────────────────────────────────────────────
    // Template literals
    // ─────────────────────────────────────────────────────────────

    /// Scan template text after the opening backtick.
    fn scan_template(&mut self, start_line: u32, start_col: u32) -> Token {
        match self.scan_template_text() {
            TemplateStop::Closed(text) => self.token(TokenKind::Template(text), start_line, start_col),
            TemplateStop::Substitution(text, span) => {
                self.push_mode(Mode::Interpolation { brace_depth: 0 });
                self.pending.push(Token::new(TokenKind::InterpolationStart, span));
                self.token(TokenKind::TemplateStart(text), start_line, start_col)
            }
            TemplateStop::Unterminated(text) => {
                let span = self.span_from(start_line, start_col);
                self.emit_error(
                    ErrorCode::UNTERMINATED_STRING,
                    "unterminated template literal",
                    span,
                );
                Token::new(TokenKind::Template(text), span)
            }
        }
    }

    /// Continue scanning template text after a substitution's `}`.
    fn scan_template_continuation(&mut self) -> Token {
        let start_line = self.line;
        let start_col = self.col;
        match self.scan_template_text() {
            TemplateStop::Closed(text) => {
                self.pop_mode();
                self.token(TokenKind::TemplateEnd(text), start_line, start_col)
            }
            TemplateStop::Substitution(text, span) => {
                self.pop_mode();
                self.push_mode(Mode::Interpolation { brace_depth: 0 });
                self.pending.push(Token::new(TokenKind::InterpolationStart, span));
                self.token(TokenKind::TemplateMiddle(text), start_line, start_col)
            }
            TemplateStop::Unterminated(text) => {
                let span = self.span_from(start_line, start_col);
                self.emit_error(
                    ErrorCode::UNTERMINATED_STRING,
                    "unterminated template literal",
                    span,
                );
                self.pop_mode();
                Token::new(TokenKind::TemplateEnd(text), span)
            }
        }
    }

    fn scan_template_text(&mut self) -> TemplateStop {
        let mut buf = Vec::new();
        loop {
            match self.peek() {
                None => return TemplateStop::Unterminated(String::from_utf8_lossy(&buf).into_owned()),
                Some(b'`') => {
                    self.advance();
                    return TemplateStop::Closed(String::from_utf8_lossy(&buf).into_owned());
                }
                Some(b'$') if self.peek_at(1) == Some(b'{') => {
                    let (line, col) = (self.line, self.col);
                    self.advance();
                    self.advance();
                    let span = Span::new(line, col, line, col + 1);
                    return TemplateStop::Substitution(String::from_utf8_lossy(&buf).into_owned(), span);
                }
                Some(b'\\') => self.scan_escape_sequence(&mut buf),
                Some(ch) => {
                    self.advance();
                    buf.push(ch);
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Escapes
    // ─────────────────────────────────────────────────────────────

    /// Scan an escape sequence starting at the `\` and append its UTF-8 bytes.
    fn scan_escape_sequence(&mut self, buf: &mut Vec<u8>) {
        let start_line = self.line;
        let start_col = self.col;
        self.advance(); // `\`

        let unescaped = match self.advance() {
            Some(b'n') => '\n',
            Some(b't') => '\t',
            Some(b'r') => '\r',
            Some(b'b') => '\u{8}',
            Some(b'f') => '\u{c}',
            Some(b'v') => '\u{b}',
            Some(b'0') => '\0',
            // Line continuation.
            Some(b'\n') => return,
            Some(b'x') => match self.scan_hex_digits(2) {
                Some(c) => c,
                None => return self.invalid_escape(start_line, start_col),
            },
            Some(b'u') => {
                let code = if self.advance_if(b'{') {
                    let c = self.scan_braced_code_point();
                    if !self.advance_if(b'}') {
                        return self.invalid_escape(start_line, start_col);
                    }
                    c
                } else {
                    self.scan_hex_digits(4)
                };
                match code {
                    Some(c) => c,
                    None => return self.invalid_escape(start_line, start_col),
                }
            }
            Some(ch) => {
                // Any other escaped byte stands for itself (`\'`, `\\`, `\$`...).
                buf.push(ch);
                return;
            }
            None => {
                let span = self.span_from(start_line, start_col);
                self.emit_error(
                    ErrorCode::UNTERMINATED_STRING,
                    "unexpected end of input in escape sequence",
                    span,
                );
                return;
            }
        };

        let mut tmp = [0u8; 4];
        buf.extend_from_slice(unescaped.encode_utf8(&mut tmp).as_bytes());
    }

    fn scan_hex_digits(&mut self, count: usize) -> Option<char> {
        let mut value = 0u32;
        for _ in 0..count {
            let digit = (self.peek()? as char).to_digit(16)?;
            self.advance();
            value = value * 16 + digit;
        }
        char::from_u32(value)
    }

    fn scan_braced_code_point(&mut self) -> Option<char> {
        let mut value = 0u32;
        let mut digits = 0;
        while let Some(digit) = self.peek().and_then(|b| (b as char).to_digit(16)) {
            self.advance();
            value = value.checked_mul(16)?.checked_add(digit)?;
            digits += 1;
        }
        if digits == 0 {
            return None;
        }
        char::from_u32(value)
    }

    fn invalid_escape(&mut self, start_line: u32, start_col: u32) {
        let span = self.span_from(start_line, start_col);
        self.emit_error(ErrorCode::INVALID_ESCAPE, "invalid escape sequence", span);
    }
}

/// Where a run of template text stopped.
enum TemplateStop {
    /// At the closing backtick.
    Closed(String),
    /// At a `${`; carries the span of the `${`.
    Substitution(String, Span),
    /// At end of input.
    Unterminated(String),
}
