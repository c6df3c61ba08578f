//! Parser tests: declarations, statements, functions, literals, and
//! error recovery over whole programs.

use kata_lexer::Lexer;
use kata_parser::{parse_source, ParseResult, Parser};
use kata_types::ast::*;
use kata_types::SourceFile;

// ─────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────

fn parse(source: &str) -> ParseResult {
    let sf = SourceFile::new("solution.js", source);
    let lex = Lexer::new(&sf).lex();
    Parser::new(lex.tokens, &sf).parse()
}

/// Parse source and return the program, panicking if there are errors.
fn parse_ok(source: &str) -> Program {
    let result = parse(source);
    if result.errors.has_errors() {
        for e in &result.errors.errors {
            eprintln!("  ERROR: {} ({})", e.message, e.code);
        }
        panic!("unexpected parse errors (see above)");
    }
    result.program.expect("no program returned")
}

fn error_count(source: &str) -> usize {
    parse(source).errors.total_errors
}

fn only_expr(program: &Program) -> &ExprKind {
    match program.body.as_slice() {
        [Stmt::Expr(stmt)] => &stmt.expr.kind,
        other => panic!("expected a single expression statement, got {other:?}"),
    }
}

// ─────────────────────────────────────────────────────────────────────
// Functions
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_function_declaration() {
    let prog = parse_ok("function add(a, b) { return a + b; }");
    let Stmt::Function(def) = &prog.body[0] else {
        panic!("expected function declaration");
    };
    assert_eq!(def.name.as_ref().map(|n| n.name.as_str()), Some("add"));
    assert_eq!(def.params.len(), 2);
    assert!(!def.is_arrow);
    let FunctionBody::Block(body) = &def.body else {
        panic!("expected block body");
    };
    assert!(matches!(body.stmts[0], Stmt::Return(ReturnStmt { value: Some(_), .. })));
}

#[test]
fn test_default_and_rest_params() {
    let prog = parse_ok("function f(a, b = 2, ...rest) {}");
    let Stmt::Function(def) = &prog.body[0] else {
        panic!("expected function declaration");
    };
    assert!(def.params[1].default.is_some());
    assert!(def.params[2].rest);
    assert_eq!(def.params[2].name.name, "rest");
}

#[test]
fn test_rest_param_must_be_last() {
    assert!(error_count("function f(...a, b) {}") > 0);
}

#[test]
fn test_arrow_functions() {
    let prog = parse_ok("const double = x => x * 2;");
    let Stmt::Var(decl) = &prog.body[0] else {
        panic!("expected declaration");
    };
    let Some(Expr {
        kind: ExprKind::Function(def),
        ..
    }) = &decl.declarators[0].init
    else {
        panic!("expected arrow function");
    };
    assert!(def.is_arrow);
    assert!(matches!(def.body, FunctionBody::Expr(_)));

    let prog = parse_ok("const add = (a, b) => { return a + b };");
    let Stmt::Var(decl) = &prog.body[0] else {
        panic!("expected declaration");
    };
    let Some(Expr {
        kind: ExprKind::Function(def),
        ..
    }) = &decl.declarators[0].init
    else {
        panic!("expected arrow function");
    };
    assert_eq!(def.params.len(), 2);
    assert!(matches!(def.body, FunctionBody::Block(_)));
}

#[test]
fn test_parenthesised_expression_is_not_arrow() {
    let prog = parse_ok("(a + b) * c");
    assert!(matches!(
        only_expr(&prog),
        ExprKind::Binary { op: BinOp::Mul, .. }
    ));
}

#[test]
fn test_arrow_as_call_argument() {
    let prog = parse_ok("xs.map((x, i) => x + i)");
    let ExprKind::Call { args, .. } = only_expr(&prog) else {
        panic!("expected call");
    };
    assert!(matches!(
        &args[0],
        ListItem::Single(Expr {
            kind: ExprKind::Function(_),
            ..
        })
    ));
}

#[test]
fn test_function_expression() {
    let prog = parse_ok("const f = function fact(n) { return n <= 1 ? 1 : n * fact(n - 1) }");
    let Stmt::Var(decl) = &prog.body[0] else {
        panic!("expected declaration");
    };
    assert!(matches!(
        decl.declarators[0].init,
        Some(Expr {
            kind: ExprKind::Function(_),
            ..
        })
    ));
}

// ─────────────────────────────────────────────────────────────────────
// Declarations & statements
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_multiple_declarators() {
    let prog = parse_ok("let a = 1, b, c = a + 1");
    let Stmt::Var(decl) = &prog.body[0] else {
        panic!("expected declaration");
    };
    assert_eq!(decl.kind, VarKind::Let);
    assert_eq!(decl.declarators.len(), 3);
    assert!(decl.declarators[1].init.is_none());
}

#[test]
fn test_if_else_chain() {
    let prog = parse_ok("if (a) x(); else if (b) y(); else { z() }");
    let Stmt::If(stmt) = &prog.body[0] else {
        panic!("expected if");
    };
    let Some(alt) = &stmt.alternate else {
        panic!("expected else");
    };
    assert!(matches!(**alt, Stmt::If(_)));
}

#[test]
fn test_loops() {
    let prog = parse_ok(
        "for (let i = 0; i < 3; i++) {}\n\
         for (;;) { break }\n\
         while (x) x--\n\
         do { x++ } while (x < 10)",
    );
    assert!(matches!(prog.body[0], Stmt::For(ForStmt { init: Some(_), .. })));
    assert!(matches!(
        prog.body[1],
        Stmt::For(ForStmt {
            init: None,
            test: None,
            update: None,
            ..
        })
    ));
    assert!(matches!(prog.body[2], Stmt::While(_)));
    assert!(matches!(prog.body[3], Stmt::DoWhile(_)));
}

#[test]
fn test_for_of_and_for_in() {
    let prog = parse_ok("for (const x of xs) {}\nfor (k in obj) {}");
    let Stmt::ForOf(each) = &prog.body[0] else {
        panic!("expected for..of");
    };
    assert_eq!(each.kind, Some(VarKind::Const));
    assert_eq!(each.binding.name, "x");
    let Stmt::ForIn(each) = &prog.body[1] else {
        panic!("expected for..in");
    };
    assert_eq!(each.kind, None);
}

#[test]
fn test_try_catch_finally() {
    let prog = parse_ok("try { f() } catch (e) { g(e) } finally { h() }");
    let Stmt::Try(stmt) = &prog.body[0] else {
        panic!("expected try");
    };
    assert_eq!(stmt.param.as_ref().map(|p| p.name.as_str()), Some("e"));
    assert!(stmt.handler.is_some());
    assert!(stmt.finalizer.is_some());

    let prog = parse_ok("try { f() } catch { }");
    let Stmt::Try(stmt) = &prog.body[0] else {
        panic!("expected try");
    };
    assert!(stmt.param.is_none());
}

#[test]
fn test_try_without_handler_is_error() {
    assert!(error_count("try { f() }") > 0);
}

#[test]
fn test_throw_new_error() {
    let prog = parse_ok("function f() { throw new Error('boom') }");
    let Stmt::Function(def) = &prog.body[0] else {
        panic!("expected function");
    };
    let FunctionBody::Block(body) = &def.body else {
        panic!("expected block");
    };
    let Stmt::Throw(stmt) = &body.stmts[0] else {
        panic!("expected throw");
    };
    assert!(matches!(stmt.value.kind, ExprKind::Call { .. }));
}

// ─────────────────────────────────────────────────────────────────────
// Literals
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_object_literal_forms() {
    let prog = parse_ok("({ a: 1, 'b': 2, 3: 'x', c, [k]: v, ...rest, m(x) { return x } })");
    let ExprKind::Object(props) = only_expr(&prog) else {
        panic!("expected object");
    };
    assert_eq!(props.len(), 7);
    assert!(matches!(
        &props[2],
        Property::Field { key: PropertyKey::Named(k), .. } if k == "3"
    ));
    assert!(matches!(
        &props[3],
        Property::Field { value: Expr { kind: ExprKind::Identifier(n), .. }, .. } if n == "c"
    ));
    assert!(matches!(
        &props[4],
        Property::Field {
            key: PropertyKey::Computed(_),
            ..
        }
    ));
    assert!(matches!(&props[5], Property::Spread(_)));
    assert!(matches!(
        &props[6],
        Property::Field {
            value: Expr {
                kind: ExprKind::Function(_),
                ..
            },
            ..
        }
    ));
}

#[test]
fn test_array_with_spread_and_trailing_comma() {
    let prog = parse_ok("[1, ...xs, 3,]");
    let ExprKind::Array(items) = only_expr(&prog) else {
        panic!("expected array");
    };
    assert_eq!(items.len(), 3);
    assert!(matches!(items[1], ListItem::Spread(_)));
}

#[test]
fn test_template_literal_parts() {
    let prog = parse_ok("`sum: ${a + b}!`");
    let ExprKind::Template(parts) = only_expr(&prog) else {
        panic!("expected template");
    };
    assert_eq!(parts.len(), 3);
    assert!(matches!(&parts[0], TemplatePart::Literal(s) if s == "sum: "));
    assert!(matches!(&parts[1], TemplatePart::Expr(_)));
}

#[test]
fn test_keyword_property_names() {
    parse_ok("obj.default; obj.if; ({ for: 1 })");
}

// ─────────────────────────────────────────────────────────────────────
// Semicolon insertion
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_statements_without_semicolons() {
    let prog = parse_ok("let a = 1\nlet b = 2\na + b");
    assert_eq!(prog.body.len(), 3);
}

#[test]
fn test_same_line_statements_need_semicolon() {
    assert!(error_count("let a = 1 let b = 2") > 0);
}

#[test]
fn test_return_followed_by_newline_returns_nothing() {
    let prog = parse_ok("function f() {\n  return\n  42\n}");
    let Stmt::Function(def) = &prog.body[0] else {
        panic!("expected function");
    };
    let FunctionBody::Block(body) = &def.body else {
        panic!("expected block");
    };
    assert!(matches!(body.stmts[0], Stmt::Return(ReturnStmt { value: None, .. })));
    assert_eq!(body.stmts.len(), 2);
}

#[test]
fn test_postfix_update_does_not_cross_lines() {
    let prog = parse_ok("a\n++b");
    assert_eq!(prog.body.len(), 2);
    assert!(matches!(
        &prog.body[1],
        Stmt::Expr(ExprStmt {
            expr: Expr {
                kind: ExprKind::Update { prefix: true, .. },
                ..
            },
            ..
        })
    ));
}

// ─────────────────────────────────────────────────────────────────────
// Recovery & whole-source parsing
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_recovers_and_reports_multiple_errors() {
    let result = parse("let = 1\nlet ok = 2\nconst = 3\n");
    assert_eq!(result.errors.total_errors, 2);
    assert!(result.program.is_none());
}

#[test]
fn test_parse_source_reports_lexer_errors_first() {
    let sf = SourceFile::new("solution.js", "let s = 'open");
    let result = parse_source(&sf);
    assert!(result.program.is_none());
    assert!(result.errors.errors[0].message.contains("unterminated string"));
}

#[test]
fn test_parse_source_success() {
    let sf = SourceFile::new("solution.js", "function add(a,b){return a+b}\nadd(2,3)");
    let result = parse_source(&sf);
    assert!(!result.errors.has_errors());
    assert_eq!(result.program.map(|p| p.body.len()), Some(2));
}

#[test]
fn test_parsing_is_deterministic() {
    let source = "function f(x) { return x.map(y => y * 2).filter(Boolean) }";
    let first = parse_ok(source);
    for _ in 0..10 {
        assert_eq!(parse_ok(source), first);
    }
}
