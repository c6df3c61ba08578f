//! Function declarations, function expressions, and arrow functions.

use std::rc::Rc;

use kata_lexer::token::TokenKind;
use kata_types::ast::*;
use kata_types::{ErrorCode, Span};

use crate::parser::Parser;

impl<'src> Parser<'src> {
    /// `function name(params) { body }` in statement position.
    pub(crate) fn parse_function_declaration(&mut self) -> Option<Stmt> {
        let start = self.advance().span; // eat `function`
        let name = self.expect_identifier()?;
        let def = self.parse_function_rest(Some(name), start)?;
        Some(Stmt::Function(def))
    }

    /// `function [name](params) { body }` in expression position.
    pub(crate) fn parse_function_expression(&mut self) -> Option<Expr> {
        let start = self.advance().span; // eat `function`
        let name = match self.peek_kind() {
            TokenKind::Identifier(_) => Some(self.expect_identifier()?),
            _ => None,
        };
        let def = self.parse_function_rest(name, start)?;
        let span = def.span;
        Some(Expr::new(ExprKind::Function(def), span))
    }

    /// Parameters and block body, starting at `(`.
    pub(crate) fn parse_function_rest(
        &mut self,
        name: Option<Ident>,
        start: Span,
    ) -> Option<Rc<FunctionDef>> {
        self.expect(&TokenKind::LParen)?;
        let params = self.parse_params()?;
        let body = self.in_function_body(|p| p.parse_block())?;
        let span = start.merge(self.previous_span());
        Some(Rc::new(FunctionDef {
            name,
            params,
            body: FunctionBody::Block(body),
            is_arrow: false,
            span,
        }))
    }

    /// Whether the upcoming tokens start an arrow function: `x =>` or
    /// `( ... ) =>`.
    pub(crate) fn at_arrow_function(&self) -> bool {
        match self.peek_kind() {
            TokenKind::Identifier(_) => matches!(self.look_ahead(1), TokenKind::Arrow),
            TokenKind::LParen => {
                let mut depth = 0usize;
                let mut n = 0;
                loop {
                    match self.look_ahead(n) {
                        TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                        TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                            depth -= 1;
                            if depth == 0 {
                                return matches!(self.look_ahead(n + 1), TokenKind::Arrow);
                            }
                        }
                        TokenKind::Eof => return false,
                        _ => {}
                    }
                    n += 1;
                }
            }
            _ => false,
        }
    }

    /// `x => body` or `(a, b = 1, ...rest) => body`
    pub(crate) fn parse_arrow_function(&mut self) -> Option<Expr> {
        let start = self.current_span();
        let params = if self.eat(&TokenKind::LParen) {
            self.parse_params()?
        } else {
            let name = self.expect_identifier()?;
            vec![Param {
                name,
                default: None,
                rest: false,
            }]
        };
        self.expect(&TokenKind::Arrow)?;
        let body = if self.check(&TokenKind::LBrace) {
            FunctionBody::Block(self.in_function_body(|p| p.parse_block())?)
        } else {
            let expr = self.in_function_body(|p| p.parse_assignment())?;
            FunctionBody::Expr(Box::new(expr))
        };
        let span = start.merge(self.previous_span());
        let def = Rc::new(FunctionDef {
            name: None,
            params,
            body,
            is_arrow: true,
            span,
        });
        Some(Expr::new(ExprKind::Function(def), span))
    }

    /// Parameter list after `(`; consumes the closing `)`.
    fn parse_params(&mut self) -> Option<Vec<Param>> {
        let mut params: Vec<Param> = Vec::new();
        while !self.check(&TokenKind::RParen) {
            if let Some(last) = params.last().filter(|p| p.rest) {
                let span = last.name.span;
                self.error_at(
                    ErrorCode::UNEXPECTED_TOKEN,
                    "rest parameter must be last",
                    span,
                );
                return None;
            }
            let rest = self.eat(&TokenKind::DotDotDot);
            let name = self.expect_identifier()?;
            let default = if !rest && self.eat(&TokenKind::Eq) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            params.push(Param {
                name,
                default,
                rest,
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Some(params)
    }

    /// Run `f` with function context: `return` allowed, no enclosing loop.
    fn in_function_body<T>(&mut self, f: impl FnOnce(&mut Self) -> Option<T>) -> Option<T> {
        let saved_loops = std::mem::take(&mut self.loop_depth);
        self.function_depth += 1;
        let result = f(self);
        self.function_depth -= 1;
        self.loop_depth = saved_loops;
        result
    }
}
