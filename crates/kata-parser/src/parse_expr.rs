//! Expression parsing with full operator precedence.
//!
//! Precedence (lowest → highest):
//! 12. assignment `= += -= *= /= %= **=`, arrow functions (right-assoc)
//! 11. `? :`
//! 10. `??`
//!  9. `||`
//!  8. `&&`
//!  7. `== != === !==`
//!  6. `< > <= >=`
//!  5. `+ -`
//!  4. `* / %`
//!  3. `**` (right-assoc)
//!  2. unary `- + ! typeof`, prefix `++ --`
//!  1. postfix `++ --`, `.` member, `[]` index, `()` call

use kata_lexer::token::TokenKind;
use kata_types::ast::*;
use kata_types::{ErrorCode, Span};

use crate::parser::{Parser, MAX_EXPR_DEPTH};

impl<'src> Parser<'src> {
    // ══════════════════════════════════════════════════════════════════════════
    // Entry Point
    // ══════════════════════════════════════════════════════════════════════════

    /// Parse an expression.
    pub(crate) fn parse_expression(&mut self) -> Option<Expr> {
        self.parse_assignment()
    }

    /// `Assignment = Arrow | Conditional [ AssignOp Assignment ]`
    pub(crate) fn parse_assignment(&mut self) -> Option<Expr> {
        self.expr_depth += 1;
        if self.expr_depth > MAX_EXPR_DEPTH {
            self.error_at_current(
                ErrorCode::STRUCTURAL_LIMIT_EXCEEDED,
                format!("maximum expression nesting depth is {MAX_EXPR_DEPTH}"),
            );
            self.expr_depth -= 1;
            return None;
        }
        let result = self.parse_assignment_inner();
        self.expr_depth -= 1;
        result
    }

    fn parse_assignment_inner(&mut self) -> Option<Expr> {
        if self.at_arrow_function() {
            return self.parse_arrow_function();
        }

        let target = self.parse_conditional()?;
        let op = match self.peek_kind() {
            TokenKind::Eq => AssignOp::Assign,
            TokenKind::PlusEq => AssignOp::Add,
            TokenKind::MinusEq => AssignOp::Sub,
            TokenKind::StarEq => AssignOp::Mul,
            TokenKind::SlashEq => AssignOp::Div,
            TokenKind::PercentEq => AssignOp::Mod,
            TokenKind::StarStarEq => AssignOp::Pow,
            _ => return Some(target),
        };
        if !target.kind.is_assignable() {
            self.error_at(
                ErrorCode::INVALID_ASSIGNMENT_TARGET,
                "invalid assignment target",
                target.span,
            );
            return None;
        }
        self.advance(); // eat operator
        let value = self.parse_assignment()?;
        let span = target.span.merge(value.span);
        Some(Expr::new(
            ExprKind::Assign {
                op,
                target: Box::new(target),
                value: Box::new(value),
            },
            span,
        ))
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Precedence Chain
    // ══════════════════════════════════════════════════════════════════════════

    /// `Conditional = Nullish [ "?" Assignment ":" Assignment ]`
    fn parse_conditional(&mut self) -> Option<Expr> {
        let test = self.parse_nullish()?;
        if !self.eat(&TokenKind::Question) {
            return Some(test);
        }
        let consequent = self.parse_assignment()?;
        self.expect(&TokenKind::Colon)?;
        let alternate = self.parse_assignment()?;
        let span = test.span.merge(alternate.span);
        Some(Expr::new(
            ExprKind::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
            span,
        ))
    }

    fn parse_nullish(&mut self) -> Option<Expr> {
        let mut left = self.parse_or()?;
        while self.eat(&TokenKind::QuestionQuestion) {
            let right = self.parse_or()?;
            left = logical(left, LogicalOp::Nullish, right);
        }
        Some(left)
    }

    fn parse_or(&mut self) -> Option<Expr> {
        let mut left = self.parse_and()?;
        while self.eat(&TokenKind::PipePipe) {
            let right = self.parse_and()?;
            left = logical(left, LogicalOp::Or, right);
        }
        Some(left)
    }

    fn parse_and(&mut self) -> Option<Expr> {
        let mut left = self.parse_equality()?;
        while self.eat(&TokenKind::AmpAmp) {
            let right = self.parse_equality()?;
            left = logical(left, LogicalOp::And, right);
        }
        Some(left)
    }

    fn parse_equality(&mut self) -> Option<Expr> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::EqEq => BinOp::LooseEq,
                TokenKind::BangEq => BinOp::LooseNotEq,
                TokenKind::EqEqEq => BinOp::StrictEq,
                TokenKind::BangEqEq => BinOp::StrictNotEq,
                _ => break,
            };
            self.advance();
            let right = self.parse_relational()?;
            left = binary(left, op, right);
        }
        Some(left)
    }

    fn parse_relational(&mut self) -> Option<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Less => BinOp::Less,
                TokenKind::Greater => BinOp::Greater,
                TokenKind::LessEq => BinOp::LessEq,
                TokenKind::GreaterEq => BinOp::GreaterEq,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = binary(left, op, right);
        }
        Some(left)
    }

    fn parse_additive(&mut self) -> Option<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(left, op, right);
        }
        Some(left)
    }

    fn parse_multiplicative(&mut self) -> Option<Expr> {
        let mut left = self.parse_exponent()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_exponent()?;
            left = binary(left, op, right);
        }
        Some(left)
    }

    /// `Exponent = Unary [ "**" Exponent ]` (right-associative)
    fn parse_exponent(&mut self) -> Option<Expr> {
        let base = self.parse_unary()?;
        if !self.eat(&TokenKind::StarStar) {
            return Some(base);
        }
        let exponent = self.parse_exponent()?;
        Some(binary(base, BinOp::Pow, exponent))
    }

    /// `Unary = ( "-" | "+" | "!" | "typeof" ) Unary | ( "++" | "--" ) Unary | Postfix`
    fn parse_unary(&mut self) -> Option<Expr> {
        let start = self.current_span();
        let op = match self.peek_kind() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Typeof => UnaryOp::Typeof,
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let op = if self.advance().kind == TokenKind::PlusPlus {
                    UpdateOp::Increment
                } else {
                    UpdateOp::Decrement
                };
                let target = self.parse_unary()?;
                return self.update(op, true, target, start);
            }
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        let span = start.merge(operand.span);
        Some(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    /// `Postfix = CallMember [ "++" | "--" ]` with no line break before the operator.
    fn parse_postfix(&mut self) -> Option<Expr> {
        let expr = self.parse_call_member()?;
        if self.newline_before() {
            return Some(expr);
        }
        let op = match self.peek_kind() {
            TokenKind::PlusPlus => UpdateOp::Increment,
            TokenKind::MinusMinus => UpdateOp::Decrement,
            _ => return Some(expr),
        };
        self.advance();
        let start = expr.span;
        self.update(op, false, expr, start)
    }

    fn update(&mut self, op: UpdateOp, prefix: bool, target: Expr, start: Span) -> Option<Expr> {
        if !target.kind.is_assignable() {
            self.error_at(
                ErrorCode::INVALID_ASSIGNMENT_TARGET,
                "invalid update target",
                target.span,
            );
            return None;
        }
        let span = start.merge(target.span).merge(self.previous_span());
        Some(Expr::new(
            ExprKind::Update {
                op,
                prefix,
                target: Box::new(target),
            },
            span,
        ))
    }

    /// `CallMember = Primary { "." Name | "[" Expr "]" | "(" Args ")" }`
    fn parse_call_member(&mut self) -> Option<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance(); // eat `.`
                    let property = self.expect_property_name()?;
                    let span = expr.span.merge(property.span);
                    expr = Expr::new(
                        ExprKind::Member {
                            object: Box::new(expr),
                            property,
                        },
                        span,
                    );
                }
                TokenKind::LBracket => {
                    self.advance(); // eat `[`
                    let index = self.parse_expression()?;
                    self.expect(&TokenKind::RBracket)?;
                    let span = expr.span.merge(self.previous_span());
                    expr = Expr::new(
                        ExprKind::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                TokenKind::LParen => {
                    self.advance(); // eat `(`
                    let args = self.parse_list_items(&TokenKind::RParen)?;
                    let span = expr.span.merge(self.previous_span());
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        span,
                    );
                }
                _ => break,
            }
        }
        Some(expr)
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Primary Expressions
    // ══════════════════════════════════════════════════════════════════════════

    fn parse_primary(&mut self) -> Option<Expr> {
        let start = self.current_span();
        match self.peek_kind().clone() {
            // ── Literals ────────────────────────────────────────────────
            TokenKind::Number(n) => {
                self.advance();
                Some(Expr::new(ExprKind::Number(n), start))
            }
            TokenKind::Str(s) | TokenKind::Template(s) => {
                self.advance();
                Some(Expr::new(ExprKind::Str(s), start))
            }
            TokenKind::TemplateStart(s) => {
                self.advance();
                self.parse_template(s, start)
            }
            TokenKind::True => {
                self.advance();
                Some(Expr::new(ExprKind::Bool(true), start))
            }
            TokenKind::False => {
                self.advance();
                Some(Expr::new(ExprKind::Bool(false), start))
            }
            TokenKind::Null => {
                self.advance();
                Some(Expr::new(ExprKind::Null, start))
            }
            TokenKind::Undefined => {
                self.advance();
                Some(Expr::new(ExprKind::Undefined, start))
            }
            TokenKind::This => {
                self.advance();
                Some(Expr::new(ExprKind::This, start))
            }

            // ── Collections ─────────────────────────────────────────────
            TokenKind::LBracket => {
                self.advance(); // eat `[`
                let items = self.parse_list_items(&TokenKind::RBracket)?;
                let span = start.merge(self.previous_span());
                Some(Expr::new(ExprKind::Array(items), span))
            }
            TokenKind::LBrace => self.parse_object_literal(),

            // ── Grouping ────────────────────────────────────────────────
            TokenKind::LParen => {
                self.advance(); // eat `(`
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                let span = start.merge(self.previous_span());
                Some(Expr::new(inner.kind, span))
            }

            // ── Functions ───────────────────────────────────────────────
            TokenKind::Function => self.parse_function_expression(),

            // `new Ctor(args)` calls the constructor like a plain function.
            TokenKind::Identifier(name)
                if name == "new" && matches!(self.look_ahead(1), TokenKind::Identifier(_)) =>
            {
                self.advance(); // eat `new`
                let callee = self.expect_identifier()?;
                let callee = Expr::new(ExprKind::Identifier(callee.name), callee.span);
                let args = if self.eat(&TokenKind::LParen) {
                    self.parse_list_items(&TokenKind::RParen)?
                } else {
                    Vec::new()
                };
                let span = start.merge(self.previous_span());
                Some(Expr::new(
                    ExprKind::Call {
                        callee: Box::new(callee),
                        args,
                    },
                    span,
                ))
            }

            TokenKind::Identifier(name) => {
                self.advance();
                Some(Expr::new(ExprKind::Identifier(name), start))
            }

            _ => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected expression, got '{}'", self.peek_kind()),
                );
                None
            }
        }
    }

    /// Comma-separated items up to `close`, with `...spread` and trailing commas.
    /// Consumes the closing token.
    fn parse_list_items(&mut self, close: &TokenKind) -> Option<Vec<ListItem>> {
        let mut items = Vec::new();
        while !self.check(close) {
            if self.eat(&TokenKind::DotDotDot) {
                items.push(ListItem::Spread(self.parse_assignment()?));
            } else {
                items.push(ListItem::Single(self.parse_assignment()?));
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(close)?;
        Some(items)
    }

    /// Parse `{ key: value, shorthand, [computed]: value, method() {}, ...spread }`
    fn parse_object_literal(&mut self) -> Option<Expr> {
        let start = self.current_span();
        self.advance(); // eat `{`
        let mut properties = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.eat(&TokenKind::DotDotDot) {
                properties.push(Property::Spread(self.parse_assignment()?));
            } else {
                properties.push(self.parse_property()?);
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace)?;
        let span = start.merge(self.previous_span());
        Some(Expr::new(ExprKind::Object(properties), span))
    }

    fn parse_property(&mut self) -> Option<Property> {
        let key_span = self.current_span();
        let (key, shorthand_name) = match self.peek_kind().clone() {
            TokenKind::Str(s) => {
                self.advance();
                (PropertyKey::Named(s), None)
            }
            TokenKind::Number(n) => {
                self.advance();
                (PropertyKey::Named(format!("{n}")), None)
            }
            TokenKind::LBracket => {
                self.advance();
                let expr = self.parse_assignment()?;
                self.expect(&TokenKind::RBracket)?;
                (PropertyKey::Computed(expr), None)
            }
            kind => {
                let ident = self.expect_property_name()?;
                let shorthand = matches!(kind, TokenKind::Identifier(_)).then(|| ident.clone());
                (PropertyKey::Named(ident.name), shorthand)
            }
        };

        if self.eat(&TokenKind::Colon) {
            let value = self.parse_assignment()?;
            return Some(Property::Field { key, value });
        }

        if self.check(&TokenKind::LParen) {
            let name = match &key {
                PropertyKey::Named(name) => Some(Ident::new(name.clone(), key_span)),
                PropertyKey::Computed(_) => None,
            };
            let def = self.parse_function_rest(name, key_span)?;
            let span = def.span;
            let value = Expr::new(ExprKind::Function(def), span);
            return Some(Property::Field { key, value });
        }

        match shorthand_name {
            Some(ident) => {
                let value = Expr::new(ExprKind::Identifier(ident.name), ident.span);
                Some(Property::Field { key, value })
            }
            None => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected ':', got '{}'", self.peek_kind()),
                );
                None
            }
        }
    }

    /// Parse a template literal with substitutions.
    ///
    /// Called after the `TemplateStart` token has been consumed.
    fn parse_template(&mut self, start_text: String, start_span: Span) -> Option<Expr> {
        let mut parts = Vec::new();
        if !start_text.is_empty() {
            parts.push(TemplatePart::Literal(start_text));
        }
        loop {
            self.expect(&TokenKind::InterpolationStart)?;
            let expr = self.parse_expression()?;
            parts.push(TemplatePart::Expr(expr));
            self.expect(&TokenKind::InterpolationEnd)?;
            match self.peek_kind().clone() {
                TokenKind::TemplateMiddle(s) => {
                    self.advance();
                    if !s.is_empty() {
                        parts.push(TemplatePart::Literal(s));
                    }
                }
                TokenKind::TemplateEnd(s) => {
                    self.advance();
                    if !s.is_empty() {
                        parts.push(TemplatePart::Literal(s));
                    }
                    break;
                }
                _ => {
                    self.error_at_current(
                        ErrorCode::UNCLOSED_DELIMITER,
                        "unterminated template literal",
                    );
                    return None;
                }
            }
        }
        let span = start_span.merge(self.previous_span());
        Some(Expr::new(ExprKind::Template(parts), span))
    }
}

fn binary(left: Expr, op: BinOp, right: Expr) -> Expr {
    let span = left.span.merge(right.span);
    Expr::new(
        ExprKind::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
        span,
    )
}

fn logical(left: Expr, op: LogicalOp, right: Expr) -> Expr {
    let span = left.span.merge(right.span);
    Expr::new(
        ExprKind::Logical {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
        span,
    )
}
