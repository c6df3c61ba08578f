//! Token types for the kata script lexer.
//!
//! Defines [`TokenKind`] covering every lexeme of the language and
//! [`Token`], which pairs a kind with a source [`Span`].

use kata_types::Span;
use std::fmt;

/// Every reserved word. These lex to keyword tokens and cannot be used as
/// binding names, although they are accepted as property names after `.`.
pub const ALL_KEYWORDS: &[&str] = &[
    "function", "return", "let", "const", "var", "if", "else", "while", "do", "for", "in",
    "break", "continue", "throw", "try", "catch", "finally", "true", "false", "null",
    "undefined", "typeof", "this",
];

// ─────────────────────────────────────────────────────────────────────
// Token
// ─────────────────────────────────────────────────────────────────────

/// A single token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// A line break separated this token from the previous one.
    pub newline_before: bool,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self {
            kind,
            span,
            newline_before: false,
        }
    }

    pub fn is_keyword(&self) -> bool {
        self.kind.is_keyword()
    }
}

// ─────────────────────────────────────────────────────────────────────
// TokenKind
// ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // ── Literals ──────────────────────────────────────────────
    Number(f64),
    /// `'text'` or `"text"`
    Str(String),

    // ── Template literals ────────────────────────────────────
    /// A template with no substitutions: `` `text` ``
    Template(String),
    /// Text before the first `${` of a template.
    TemplateStart(String),
    /// Text between a `}` and the next `${`.
    TemplateMiddle(String),
    /// Text after the last `}` up to the closing backtick.
    TemplateEnd(String),
    /// `${`
    InterpolationStart,
    /// The `}` that closes a substitution.
    InterpolationEnd,

    Identifier(String),

    // ── Keywords ─────────────────────────────────────────────
    Function,
    Return,
    Let,
    Const,
    Var,
    If,
    Else,
    While,
    Do,
    For,
    In,
    Break,
    Continue,
    Throw,
    Try,
    Catch,
    Finally,
    True,
    False,
    Null,
    Undefined,
    Typeof,
    This,

    // ── Operators ────────────────────────────────────────────
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,
    Bang,
    /// `=`
    Eq,
    /// `==`
    EqEq,
    /// `===`
    EqEqEq,
    /// `!=`
    BangEq,
    /// `!==`
    BangEqEq,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    AmpAmp,
    PipePipe,
    QuestionQuestion,
    Question,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    StarStarEq,
    /// `=>`
    Arrow,
    /// `...`
    DotDotDot,

    // ── Punctuation ──────────────────────────────────────────
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Semicolon,
    Dot,

    Eof,
}

impl TokenKind {
    /// Look up a reserved word. Returns `None` for ordinary identifiers.
    pub fn from_keyword(s: &str) -> Option<TokenKind> {
        Some(match s {
            "function" => TokenKind::Function,
            "return" => TokenKind::Return,
            "let" => TokenKind::Let,
            "const" => TokenKind::Const,
            "var" => TokenKind::Var,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "do" => TokenKind::Do,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "throw" => TokenKind::Throw,
            "try" => TokenKind::Try,
            "catch" => TokenKind::Catch,
            "finally" => TokenKind::Finally,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "undefined" => TokenKind::Undefined,
            "typeof" => TokenKind::Typeof,
            "this" => TokenKind::This,
            _ => return None,
        })
    }

    /// Returns `true` for reserved words.
    pub fn is_keyword(&self) -> bool {
        self.keyword_text().is_some()
    }

    /// The source text of a keyword token.
    pub fn keyword_text(&self) -> Option<&'static str> {
        Some(match self {
            TokenKind::Function => "function",
            TokenKind::Return => "return",
            TokenKind::Let => "let",
            TokenKind::Const => "const",
            TokenKind::Var => "var",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::Do => "do",
            TokenKind::For => "for",
            TokenKind::In => "in",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Throw => "throw",
            TokenKind::Try => "try",
            TokenKind::Catch => "catch",
            TokenKind::Finally => "finally",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Null => "null",
            TokenKind::Undefined => "undefined",
            TokenKind::Typeof => "typeof",
            TokenKind::This => "this",
            _ => return None,
        })
    }

    /// Compound-assignment and plain-assignment tokens.
    pub fn is_assignment(&self) -> bool {
        matches!(
            self,
            TokenKind::Eq
                | TokenKind::PlusEq
                | TokenKind::MinusEq
                | TokenKind::StarEq
                | TokenKind::SlashEq
                | TokenKind::PercentEq
                | TokenKind::StarStarEq
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(text) = self.keyword_text() {
            return write!(f, "{text}");
        }
        match self {
            TokenKind::Number(n) => write!(f, "{n}"),
            TokenKind::Str(s) => write!(f, "'{s}'"),
            TokenKind::Template(s) => write!(f, "`{s}`"),
            TokenKind::TemplateStart(s) => write!(f, "`{s}${{"),
            TokenKind::TemplateMiddle(s) => write!(f, "}}{s}${{"),
            TokenKind::TemplateEnd(s) => write!(f, "}}{s}`"),
            TokenKind::InterpolationStart => write!(f, "${{"),
            TokenKind::InterpolationEnd => write!(f, "}}"),
            TokenKind::Identifier(name) => write!(f, "{name}"),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Star => write!(f, "*"),
            TokenKind::StarStar => write!(f, "**"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::Percent => write!(f, "%"),
            TokenKind::PlusPlus => write!(f, "++"),
            TokenKind::MinusMinus => write!(f, "--"),
            TokenKind::Bang => write!(f, "!"),
            TokenKind::Eq => write!(f, "="),
            TokenKind::EqEq => write!(f, "=="),
            TokenKind::EqEqEq => write!(f, "==="),
            TokenKind::BangEq => write!(f, "!="),
            TokenKind::BangEqEq => write!(f, "!=="),
            TokenKind::Less => write!(f, "<"),
            TokenKind::Greater => write!(f, ">"),
            TokenKind::LessEq => write!(f, "<="),
            TokenKind::GreaterEq => write!(f, ">="),
            TokenKind::AmpAmp => write!(f, "&&"),
            TokenKind::PipePipe => write!(f, "||"),
            TokenKind::QuestionQuestion => write!(f, "??"),
            TokenKind::Question => write!(f, "?"),
            TokenKind::PlusEq => write!(f, "+="),
            TokenKind::MinusEq => write!(f, "-="),
            TokenKind::StarEq => write!(f, "*="),
            TokenKind::SlashEq => write!(f, "/="),
            TokenKind::PercentEq => write!(f, "%="),
            TokenKind::StarStarEq => write!(f, "**="),
            TokenKind::Arrow => write!(f, "=>"),
            TokenKind::DotDotDot => write!(f, "..."),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::LBrace => write!(f, "{{"),
            TokenKind::RBrace => write!(f, "}}"),
            TokenKind::LBracket => write!(f, "["),
            TokenKind::RBracket => write!(f, "]"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Semicolon => write!(f, ";"),
            TokenKind::Dot => write!(f, "."),
            TokenKind::Eof => write!(f, "end of input"),
            _ => Ok(()),
        }
    }
}
