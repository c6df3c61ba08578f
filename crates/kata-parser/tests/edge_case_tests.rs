//! Grammar edge cases: operator precedence and associativity, structural
//! errors (return/break placement, const initialisers, assignment targets),
//! and the expression nesting limit.

use kata_lexer::Lexer;
use kata_parser::{ParseResult, Parser, MAX_EXPR_DEPTH};
use kata_types::ast::*;
use kata_types::{ErrorCode, SourceFile};

// ─────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────

fn parse(source: &str) -> ParseResult {
    let sf = SourceFile::new("solution.js", source);
    let lex = Lexer::new(&sf).lex();
    Parser::new(lex.tokens, &sf).parse()
}

fn error_codes(source: &str) -> Vec<ErrorCode> {
    parse(source).errors.errors.iter().map(|e| e.code).collect()
}

/// Parse a single expression statement and return its expression.
fn expr(source: &str) -> Expr {
    let result = parse(source);
    assert!(
        !result.errors.has_errors(),
        "unexpected errors: {}",
        result.errors
    );
    let program = result.program.expect("program");
    match program.body.into_iter().next() {
        Some(Stmt::Expr(stmt)) => stmt.expr,
        other => panic!("expected expression statement, got {other:?}"),
    }
}

/// Render an expression fully parenthesised, to make grouping visible.
fn show(e: &Expr) -> String {
    match &e.kind {
        ExprKind::Number(n) => format!("{n}"),
        ExprKind::Identifier(name) => name.clone(),
        ExprKind::Binary { left, op, right } => {
            format!("({} {} {})", show(left), op.as_str(), show(right))
        }
        ExprKind::Logical { left, op, right } => {
            let op = match op {
                LogicalOp::And => "&&",
                LogicalOp::Or => "||",
                LogicalOp::Nullish => "??",
            };
            format!("({} {op} {})", show(left), show(right))
        }
        ExprKind::Unary { op, operand } => {
            let op = match op {
                UnaryOp::Neg => "-",
                UnaryOp::Plus => "+",
                UnaryOp::Not => "!",
                UnaryOp::Typeof => "typeof ",
            };
            format!("({op}{})", show(operand))
        }
        ExprKind::Assign { target, value, .. } => {
            format!("({} = {})", show(target), show(value))
        }
        ExprKind::Conditional {
            test,
            consequent,
            alternate,
        } => format!("({} ? {} : {})", show(test), show(consequent), show(alternate)),
        ExprKind::Member { object, property } => format!("{}.{}", show(object), property.name),
        ExprKind::Index { object, index } => format!("{}[{}]", show(object), show(index)),
        ExprKind::Call { callee, args } => format!("{}({})", show(callee), args.len()),
        other => format!("{other:?}"),
    }
}

// ─────────────────────────────────────────────────────────────────────
// Precedence & associativity
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_multiplication_binds_tighter_than_addition() {
    assert_eq!(show(&expr("1 + 2 * 3")), "(1 + (2 * 3))");
    assert_eq!(show(&expr("1 - 2 - 3")), "((1 - 2) - 3)");
}

#[test]
fn test_exponent_is_right_associative() {
    assert_eq!(show(&expr("2 ** 3 ** 2")), "(2 ** (3 ** 2))");
    assert_eq!(show(&expr("2 * 3 ** 2")), "(2 * (3 ** 2))");
}

#[test]
fn test_comparison_and_equality_levels() {
    assert_eq!(show(&expr("a < b === c > d")), "((a < b) === (c > d))");
}

#[test]
fn test_logical_levels() {
    assert_eq!(show(&expr("a || b && c")), "(a || (b && c))");
    assert_eq!(show(&expr("a ?? b || c")), "(a ?? (b || c))");
}

#[test]
fn test_conditional_is_right_associative() {
    assert_eq!(show(&expr("a ? b : c ? d : e")), "(a ? b : (c ? d : e))");
}

#[test]
fn test_assignment_is_right_associative() {
    assert_eq!(show(&expr("a = b = 1")), "(a = (b = 1))");
}

#[test]
fn test_unary_binds_tighter_than_binary() {
    assert_eq!(show(&expr("-a * b")), "((-a) * b)");
    assert_eq!(show(&expr("!a && b")), "((!a) && b)");
    assert_eq!(show(&expr("typeof a === b")), "((typeof a) === b)");
}

#[test]
fn test_member_call_chain() {
    assert_eq!(show(&expr("a.b[c](1, 2).d")), "a.b[c](2).d");
}

#[test]
fn test_compound_assignment_ops() {
    for (src, op) in [
        ("x += 1", AssignOp::Add),
        ("x -= 1", AssignOp::Sub),
        ("x *= 1", AssignOp::Mul),
        ("x /= 1", AssignOp::Div),
        ("x %= 1", AssignOp::Mod),
        ("x **= 1", AssignOp::Pow),
    ] {
        let e = expr(src);
        assert!(
            matches!(e.kind, ExprKind::Assign { op: found, .. } if found == op),
            "{src}"
        );
    }
}

// ─────────────────────────────────────────────────────────────────────
// Structural errors
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_return_outside_function() {
    assert_eq!(
        error_codes("return 1"),
        vec![ErrorCode::RETURN_OUTSIDE_FUNCTION]
    );
}

#[test]
fn test_break_outside_loop() {
    assert_eq!(error_codes("break"), vec![ErrorCode::JUMP_OUTSIDE_LOOP]);
    // A function body resets the loop context.
    assert_eq!(
        error_codes("while (x) { const f = () => { continue } }"),
        vec![ErrorCode::JUMP_OUTSIDE_LOOP]
    );
}

#[test]
fn test_break_inside_nested_loop_ok() {
    assert!(error_codes("for (;;) { if (x) { while (y) break; break } }").is_empty());
}

#[test]
fn test_const_requires_initializer() {
    assert_eq!(
        error_codes("const x;"),
        vec![ErrorCode::CONST_WITHOUT_INITIALIZER]
    );
}

#[test]
fn test_invalid_assignment_targets() {
    assert_eq!(
        error_codes("1 = 2"),
        vec![ErrorCode::INVALID_ASSIGNMENT_TARGET]
    );
    assert_eq!(
        error_codes("f() += 1"),
        vec![ErrorCode::INVALID_ASSIGNMENT_TARGET]
    );
    assert_eq!(
        error_codes("(a + b)++"),
        vec![ErrorCode::INVALID_ASSIGNMENT_TARGET]
    );
}

#[test]
fn test_unclosed_delimiters() {
    assert!(error_codes("f(1, 2").contains(&ErrorCode::UNCLOSED_DELIMITER));
    assert!(error_codes("[1, 2").contains(&ErrorCode::UNCLOSED_DELIMITER));
    assert!(error_codes("function f() {").contains(&ErrorCode::UNCLOSED_DELIMITER));
}

#[test]
fn test_stray_closing_brace() {
    assert_eq!(error_codes("a }"), vec![ErrorCode::UNEXPECTED_TOKEN]);
}

// ─────────────────────────────────────────────────────────────────────
// Limits
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_expression_depth_limit() {
    let depth = MAX_EXPR_DEPTH as usize + 5;
    let source = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
    assert!(error_codes(&source).contains(&ErrorCode::STRUCTURAL_LIMIT_EXCEEDED));
}

#[test]
fn test_moderate_nesting_is_fine() {
    let source = format!("{}1{}", "[".repeat(40), "]".repeat(40));
    assert!(error_codes(&source).is_empty());
}
