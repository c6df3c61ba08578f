//! Statement parsing.

use kata_lexer::token::TokenKind;
use kata_types::ast::*;
use kata_types::{ErrorCode, Span};

use crate::parser::Parser;

impl<'src> Parser<'src> {
    /// Parse a block of statements: `{ stmts... }`
    pub(crate) fn parse_block(&mut self) -> Option<Block> {
        let start = self.current_span();
        self.expect(&TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            if self.too_many_errors() {
                break;
            }
            match self.parse_statement() {
                Some(stmt) => stmts.push(stmt),
                None => self.synchronize(),
            }
        }
        self.expect(&TokenKind::RBrace)?;
        let span = start.merge(self.previous_span());
        Some(Block { stmts, span })
    }

    /// Parse a single statement.
    pub(crate) fn parse_statement(&mut self) -> Option<Stmt> {
        match self.peek_kind() {
            TokenKind::Function => self.parse_function_declaration(),
            TokenKind::Let | TokenKind::Const | TokenKind::Var => {
                let decl = self.parse_var_decl()?;
                self.consume_semicolon();
                Some(Stmt::Var(decl))
            }
            TokenKind::If => self.parse_if_stmt(),
            TokenKind::While => self.parse_while_stmt(),
            TokenKind::Do => self.parse_do_while_stmt(),
            TokenKind::For => self.parse_for_stmt(),
            TokenKind::Return => self.parse_return_stmt(),
            TokenKind::Break | TokenKind::Continue => self.parse_jump_stmt(),
            TokenKind::Throw => self.parse_throw_stmt(),
            TokenKind::Try => self.parse_try_stmt(),
            TokenKind::LBrace => self.parse_block().map(Stmt::Block),
            TokenKind::Semicolon => Some(Stmt::Empty(self.advance().span)),
            _ => {
                let expr = self.parse_expression()?;
                let span = expr.span;
                self.consume_semicolon();
                Some(Stmt::Expr(ExprStmt { expr, span }))
            }
        }
    }

    /// `let a = 1, b` / `const c = 2` / `var d`
    ///
    /// Does not consume the terminator, so `for` headers can reuse it.
    pub(crate) fn parse_var_decl(&mut self) -> Option<VarDecl> {
        let start = self.current_span();
        let kind = self.parse_var_kind()?;
        let mut declarators = Vec::new();
        loop {
            let name = self.expect_identifier()?;
            declarators.push(self.parse_declarator_rest(kind, name)?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let span = start.merge(self.previous_span());
        Some(VarDecl {
            kind,
            declarators,
            span,
        })
    }

    fn parse_var_kind(&mut self) -> Option<VarKind> {
        let kind = match self.peek_kind() {
            TokenKind::Let => VarKind::Let,
            TokenKind::Const => VarKind::Const,
            TokenKind::Var => VarKind::Var,
            other => {
                let message = format!("expected 'let', 'const' or 'var', got '{other}'");
                self.error_at_current(ErrorCode::UNEXPECTED_TOKEN, message);
                return None;
            }
        };
        self.advance();
        Some(kind)
    }

    /// The `[= init]` part of a declarator whose name was already consumed.
    fn parse_declarator_rest(&mut self, kind: VarKind, name: Ident) -> Option<Declarator> {
        let init = if self.eat(&TokenKind::Eq) {
            Some(self.parse_assignment()?)
        } else {
            if kind == VarKind::Const {
                self.error_at(
                    ErrorCode::CONST_WITHOUT_INITIALIZER,
                    format!("missing initializer in const declaration '{}'", name.name),
                    name.span,
                );
            }
            None
        };
        Some(Declarator { name, init })
    }

    /// `if (test) stmt [else stmt]`
    fn parse_if_stmt(&mut self) -> Option<Stmt> {
        let start = self.advance().span; // eat `if`
        let test = self.parse_paren_expression()?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.eat(&TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        let span = start.merge(self.previous_span());
        Some(Stmt::If(IfStmt {
            test,
            consequent,
            alternate,
            span,
        }))
    }

    /// `while (test) stmt`
    fn parse_while_stmt(&mut self) -> Option<Stmt> {
        let start = self.advance().span; // eat `while`
        let test = self.parse_paren_expression()?;
        let body = Box::new(self.parse_loop_body()?);
        let span = start.merge(self.previous_span());
        Some(Stmt::While(WhileStmt { test, body, span }))
    }

    /// `do stmt while (test)`
    fn parse_do_while_stmt(&mut self) -> Option<Stmt> {
        let start = self.advance().span; // eat `do`
        let body = Box::new(self.parse_loop_body()?);
        self.expect(&TokenKind::While)?;
        let test = self.parse_paren_expression()?;
        // A `;` after `do..while` is optional even on the same line.
        self.eat(&TokenKind::Semicolon);
        let span = start.merge(self.previous_span());
        Some(Stmt::DoWhile(WhileStmt { test, body, span }))
    }

    /// `for (init; test; update) stmt`, `for (x of xs) stmt`, `for (k in obj) stmt`
    fn parse_for_stmt(&mut self) -> Option<Stmt> {
        let start = self.advance().span; // eat `for`
        self.expect(&TokenKind::LParen)?;

        // Head forms that may turn out to be `for..of` / `for..in`.
        let init = match self.peek_kind() {
            TokenKind::Semicolon => None,
            TokenKind::Let | TokenKind::Const | TokenKind::Var => {
                let decl_start = self.current_span();
                let kind = self.parse_var_kind()?;
                let binding = self.expect_identifier()?;
                if let Some(each) = self.try_for_each_head() {
                    return self.finish_for_each(each, binding, Some(kind), start);
                }
                let mut declarators = vec![self.parse_declarator_rest(kind, binding)?];
                while self.eat(&TokenKind::Comma) {
                    let name = self.expect_identifier()?;
                    declarators.push(self.parse_declarator_rest(kind, name)?);
                }
                let span = decl_start.merge(self.previous_span());
                Some(Box::new(Stmt::Var(VarDecl {
                    kind,
                    declarators,
                    span,
                })))
            }
            TokenKind::Identifier(name)
                if matches!(self.look_ahead(1), TokenKind::In)
                    || matches!(self.look_ahead(1), TokenKind::Identifier(w) if w == "of") =>
            {
                let name = name.clone();
                let binding = Ident::new(name, self.advance().span);
                let each = self.try_for_each_head()?;
                return self.finish_for_each(each, binding, None, start);
            }
            _ => {
                let expr = self.parse_expression()?;
                let span = expr.span;
                Some(Box::new(Stmt::Expr(ExprStmt { expr, span })))
            }
        };
        self.expect(&TokenKind::Semicolon)?;

        let test = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::Semicolon)?;

        let update = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::RParen)?;

        let body = Box::new(self.parse_loop_body()?);
        let span = start.merge(self.previous_span());
        Some(Stmt::For(ForStmt {
            init,
            test,
            update,
            body,
            span,
        }))
    }

    /// Consume `of` / `in` after a loop binding, if present.
    fn try_for_each_head(&mut self) -> Option<ForEach> {
        if self.check_contextual("of") {
            self.advance();
            Some(ForEach::Of)
        } else if self.eat(&TokenKind::In) {
            Some(ForEach::In)
        } else {
            None
        }
    }

    fn finish_for_each(
        &mut self,
        each: ForEach,
        binding: Ident,
        kind: Option<VarKind>,
        start: Span,
    ) -> Option<Stmt> {
        let iterable = self.parse_expression()?;
        self.expect(&TokenKind::RParen)?;
        let body = Box::new(self.parse_loop_body()?);
        let span = start.merge(self.previous_span());
        let stmt = ForEachStmt {
            kind,
            binding,
            iterable,
            body,
            span,
        };
        Some(match each {
            ForEach::Of => Stmt::ForOf(stmt),
            ForEach::In => Stmt::ForIn(stmt),
        })
    }

    fn parse_loop_body(&mut self) -> Option<Stmt> {
        self.loop_depth += 1;
        let body = self.parse_statement();
        self.loop_depth -= 1;
        body
    }

    /// `return [expr]`; a line break right after `return` ends the statement.
    fn parse_return_stmt(&mut self) -> Option<Stmt> {
        let start = self.advance().span; // eat `return`
        if self.function_depth == 0 {
            self.error_at(
                ErrorCode::RETURN_OUTSIDE_FUNCTION,
                "'return' outside of a function",
                start,
            );
        }
        let value = if self.at_end()
            || self.newline_before()
            || self.check(&TokenKind::Semicolon)
            || self.check(&TokenKind::RBrace)
        {
            None
        } else {
            Some(self.parse_expression()?)
        };
        let span = start.merge(self.previous_span());
        self.consume_semicolon();
        Some(Stmt::Return(ReturnStmt { value, span }))
    }

    /// `break` / `continue`
    fn parse_jump_stmt(&mut self) -> Option<Stmt> {
        let token = self.advance();
        if self.loop_depth == 0 {
            self.error_at(
                ErrorCode::JUMP_OUTSIDE_LOOP,
                format!("'{}' outside of a loop", token.kind),
                token.span,
            );
        }
        self.consume_semicolon();
        Some(match token.kind {
            TokenKind::Break => Stmt::Break(token.span),
            _ => Stmt::Continue(token.span),
        })
    }

    /// `throw expr`
    fn parse_throw_stmt(&mut self) -> Option<Stmt> {
        let start = self.advance().span; // eat `throw`
        let value = self.parse_expression()?;
        let span = start.merge(self.previous_span());
        self.consume_semicolon();
        Some(Stmt::Throw(ThrowStmt { value, span }))
    }

    /// `try { } catch [(e)] { } [finally { }]`
    fn parse_try_stmt(&mut self) -> Option<Stmt> {
        let start = self.advance().span; // eat `try`
        let block = self.parse_block()?;
        let (param, handler) = if self.eat(&TokenKind::Catch) {
            let param = if self.eat(&TokenKind::LParen) {
                let ident = self.expect_identifier()?;
                self.expect(&TokenKind::RParen)?;
                Some(ident)
            } else {
                None
            };
            (param, Some(self.parse_block()?))
        } else {
            (None, None)
        };
        let finalizer = if self.eat(&TokenKind::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                "missing 'catch' or 'finally' after 'try'",
            );
            return None;
        }
        let span = start.merge(self.previous_span());
        Some(Stmt::Try(TryStmt {
            block,
            param,
            handler,
            finalizer,
            span,
        }))
    }

    /// `( expr )` as used by `if` and loop heads.
    fn parse_paren_expression(&mut self) -> Option<Expr> {
        self.expect(&TokenKind::LParen)?;
        let expr = self.parse_expression()?;
        self.expect(&TokenKind::RParen)?;
        Some(expr)
    }
}

enum ForEach {
    Of,
    In,
}
