//! Tree-walking interpreter for kata script.
//!
//! Walks the parsed [`Program`] directly. Every statement and every call
//! consumes one unit of gas; an optional limit turns runaway loops into
//! [`EvalError::GasExhausted`]. Call depth is bounded separately so deep
//! recursion raises a catchable `RangeError` instead of overflowing the host
//! stack.

use std::rc::Rc;

use indexmap::IndexMap;
use kata_types::ast::*;

use crate::builtins;
use crate::env::{AssignError, Environment, Scope};
use crate::error::{EvalError, EvalResult};
use crate::methods;
use crate::ops;
use crate::sandbox::SandboxConfig;
use crate::value::{ordered_entries, Function, Limits, Value, MAX_ARRAY_LENGTH};

/// Lines of `console.log` output kept per interpreter.
pub const MAX_LOG_LINES: usize = 1000;

/// How a statement finished.
#[derive(Debug)]
enum Completion {
    /// Fell through; carries the value of an expression statement.
    Normal(Option<Value>),
    Return(Value),
    Break,
    Continue,
}

/// An assignable location.
enum Place<'a> {
    Variable(&'a str),
    Property { object: Value, key: Value },
}

/// A fresh evaluation context: its own global scope, builtins, gas
/// counter, and captured console output.
pub struct Interpreter {
    env: Environment,
    gas: u64,
    gas_limit: Option<u64>,
    depth: usize,
    max_call_depth: usize,
    limits: Limits,
    this_value: Value,
    logs: Vec<String>,
    rng_state: u64,
}

impl Interpreter {
    pub fn new(config: &SandboxConfig) -> Self {
        let mut env = Environment::new();
        builtins::install(&mut env);
        Self {
            env,
            gas: 0,
            gas_limit: config.gas_limit,
            depth: 0,
            max_call_depth: config.max_call_depth,
            limits: Limits::new(config.max_string_length, config.max_array_length),
            this_value: Value::Undefined,
            logs: Vec::new(),
            rng_state: 0x2545_F491_4F6C_DD1D,
        }
    }

    /// Run a program in the global scope and return its completion value:
    /// the value of the last expression statement executed.
    pub fn run(&mut self, program: &Program) -> EvalResult<Value> {
        self.hoist_vars(&program.body);
        match self.exec_stmts(&program.body)? {
            Completion::Normal(value) => Ok(value.unwrap_or_default()),
            Completion::Return(value) => Ok(value),
            Completion::Break | Completion::Continue => Ok(Value::Undefined),
        }
    }

    /// Gas consumed since creation or the last [`Interpreter::reset_gas`].
    pub fn gas_used(&self) -> u64 {
        self.gas
    }

    pub fn reset_gas(&mut self) {
        self.gas = 0;
    }

    /// Captured `console.log` lines, oldest first.
    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    pub fn take_logs(&mut self) -> Vec<String> {
        std::mem::take(&mut self.logs)
    }

    /// Look up a global (or any visible) binding by name.
    pub fn global(&self, name: &str) -> Option<Value> {
        self.env.get(name)
    }

    pub(crate) fn limits(&self) -> Limits {
        self.limits
    }

    pub(crate) fn log(&mut self, line: String) {
        if self.logs.len() < MAX_LOG_LINES {
            self.logs.push(line);
        }
    }

    /// Deterministic xorshift64* in `[0, 1)`.
    pub(crate) fn next_random(&mut self) -> f64 {
        let mut x = self.rng_state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.rng_state = x;
        let bits = x.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 11;
        bits as f64 / (1u64 << 53) as f64
    }

    fn tick(&mut self) -> EvalResult<()> {
        self.gas += 1;
        match self.gas_limit {
            Some(limit) if self.gas > limit => Err(EvalError::GasExhausted(limit)),
            _ => Ok(()),
        }
    }

    // ══════════════════════════════════════════════════════════════════
    // Hoisting
    // ══════════════════════════════════════════════════════════════════

    /// Function declarations are visible throughout their block.
    fn hoist_functions(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            if let Stmt::Function(def) = stmt {
                if let Some(name) = &def.name {
                    let closure = self.make_closure(def);
                    self.env.define(&name.name, closure, true);
                }
            }
        }
    }

    /// `var` bindings belong to the enclosing function, not the block.
    fn hoist_vars(&mut self, stmts: &[Stmt]) {
        let mut names = Vec::new();
        collect_var_names(stmts, &mut names);
        for name in names {
            if !self.env.is_defined(&name) {
                self.env.define(&name, Value::Undefined, true);
            }
        }
    }

    // ══════════════════════════════════════════════════════════════════
    // Statements
    // ══════════════════════════════════════════════════════════════════

    fn exec_stmts(&mut self, stmts: &[Stmt]) -> EvalResult<Completion> {
        self.hoist_functions(stmts);
        let mut last = None;
        for stmt in stmts {
            match self.exec_stmt(stmt)? {
                Completion::Normal(Some(value)) => last = Some(value),
                Completion::Normal(None) => {}
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal(last))
    }

    fn exec_block(&mut self, block: &Block) -> EvalResult<Completion> {
        self.env.push_scope();
        let result = self.exec_stmts(&block.stmts);
        self.env.pop_scope();
        result
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> EvalResult<Completion> {
        self.tick()?;
        match stmt {
            // Bound when the enclosing block was entered.
            Stmt::Function(_) | Stmt::Empty(_) => Ok(Completion::Normal(None)),
            Stmt::Var(decl) => {
                self.exec_var_decl(decl)?;
                Ok(Completion::Normal(None))
            }
            Stmt::Expr(stmt) => Ok(Completion::Normal(Some(self.eval_expr(&stmt.expr)?))),
            Stmt::If(stmt) => {
                if self.eval_expr(&stmt.test)?.is_truthy() {
                    self.exec_stmt(&stmt.consequent)
                } else if let Some(alternate) = &stmt.alternate {
                    self.exec_stmt(alternate)
                } else {
                    Ok(Completion::Normal(None))
                }
            }
            Stmt::While(stmt) => self.exec_while(stmt),
            Stmt::DoWhile(stmt) => self.exec_do_while(stmt),
            Stmt::For(stmt) => {
                self.env.push_scope();
                let result = self.exec_for(stmt);
                self.env.pop_scope();
                result
            }
            Stmt::ForOf(stmt) => self.exec_for_of(stmt),
            Stmt::ForIn(stmt) => self.exec_for_in(stmt),
            Stmt::Return(stmt) => {
                let value = match &stmt.value {
                    Some(expr) => self.eval_expr(expr)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            Stmt::Break(_) => Ok(Completion::Break),
            Stmt::Continue(_) => Ok(Completion::Continue),
            Stmt::Throw(stmt) => Err(EvalError::Thrown(self.eval_expr(&stmt.value)?)),
            Stmt::Try(stmt) => self.exec_try(stmt),
            Stmt::Block(block) => self.exec_block(block),
        }
    }

    fn exec_var_decl(&mut self, decl: &VarDecl) -> EvalResult<()> {
        for declarator in &decl.declarators {
            let name = declarator.name.name.as_str();
            let value = match &declarator.init {
                Some(init) => self.eval_expr(init)?,
                None if decl.kind == VarKind::Var => continue,
                None => Value::Undefined,
            };
            if decl.kind == VarKind::Var {
                self.assign_variable(name, value)?;
            } else {
                self.env.define(name, value, decl.kind.is_mutable());
            }
        }
        Ok(())
    }

    /// Run one loop body. `Some` carries the completion that ends the loop.
    fn loop_body(&mut self, body: &Stmt) -> EvalResult<Option<Completion>> {
        match self.exec_stmt(body)? {
            Completion::Break => Ok(Some(Completion::Normal(None))),
            Completion::Return(value) => Ok(Some(Completion::Return(value))),
            Completion::Normal(_) | Completion::Continue => Ok(None),
        }
    }

    fn exec_while(&mut self, stmt: &WhileStmt) -> EvalResult<Completion> {
        while self.eval_expr(&stmt.test)?.is_truthy() {
            if let Some(done) = self.loop_body(&stmt.body)? {
                return Ok(done);
            }
        }
        Ok(Completion::Normal(None))
    }

    fn exec_do_while(&mut self, stmt: &WhileStmt) -> EvalResult<Completion> {
        loop {
            if let Some(done) = self.loop_body(&stmt.body)? {
                return Ok(done);
            }
            if !self.eval_expr(&stmt.test)?.is_truthy() {
                return Ok(Completion::Normal(None));
            }
        }
    }

    /// C-style `for`. Runs inside its own scope; `let` loop variables get
    /// a fresh binding per iteration when a closure captured the old one.
    fn exec_for(&mut self, stmt: &ForStmt) -> EvalResult<Completion> {
        let mut per_iteration: Vec<&str> = Vec::new();
        if let Some(init) = &stmt.init {
            if let Stmt::Var(decl) = init.as_ref() {
                if decl.kind == VarKind::Let {
                    per_iteration = decl
                        .declarators
                        .iter()
                        .map(|d| d.name.name.as_str())
                        .collect();
                }
            }
            self.exec_stmt(init)?;
        }
        loop {
            if let Some(test) = &stmt.test {
                if !self.eval_expr(test)?.is_truthy() {
                    break;
                }
            }
            if let Some(done) = self.loop_body(&stmt.body)? {
                return Ok(done);
            }
            if !per_iteration.is_empty() && self.env.current_is_captured() {
                let values: Vec<Value> = per_iteration
                    .iter()
                    .map(|name| self.env.get(name).unwrap_or_default())
                    .collect();
                self.env.replace_current();
                for (name, value) in per_iteration.iter().zip(values) {
                    self.env.define(name, value, true);
                }
            }
            if let Some(update) = &stmt.update {
                self.eval_expr(update)?;
            }
        }
        Ok(Completion::Normal(None))
    }

    fn exec_for_of(&mut self, stmt: &ForEachStmt) -> EvalResult<Completion> {
        let items = match self.eval_expr(&stmt.iterable)? {
            Value::Array(items) => items.borrow().clone(),
            Value::String(text) => text.chars().map(|c| Value::string(c)).collect(),
            other => {
                return Err(EvalError::type_error(format!(
                    "{} is not iterable",
                    other.inspect()
                )))
            }
        };
        self.exec_each(stmt, items)
    }

    fn exec_for_in(&mut self, stmt: &ForEachStmt) -> EvalResult<Completion> {
        let keys = match self.eval_expr(&stmt.iterable)? {
            Value::Object(entries) => ordered_entries(&entries.borrow())
                .into_iter()
                .map(|(key, _)| Value::string(key.as_str()))
                .collect(),
            Value::Array(items) => index_keys(items.borrow().len()),
            Value::String(text) => index_keys(text.char_len()),
            _ => Vec::new(),
        };
        self.exec_each(stmt, keys)
    }

    fn exec_each(&mut self, stmt: &ForEachStmt, items: Vec<Value>) -> EvalResult<Completion> {
        for item in items {
            self.env.push_scope();
            let result = self
                .bind_loop_variable(stmt, item)
                .and_then(|()| self.loop_body(&stmt.body));
            self.env.pop_scope();
            if let Some(done) = result? {
                return Ok(done);
            }
        }
        Ok(Completion::Normal(None))
    }

    fn bind_loop_variable(&mut self, stmt: &ForEachStmt, value: Value) -> EvalResult<()> {
        match stmt.kind {
            Some(VarKind::Let) => self.env.define(&stmt.binding.name, value, true),
            Some(VarKind::Const) => self.env.define(&stmt.binding.name, value, false),
            Some(VarKind::Var) | None => self.assign_variable(&stmt.binding.name, value)?,
        }
        Ok(())
    }

    fn exec_try(&mut self, stmt: &TryStmt) -> EvalResult<Completion> {
        let result = match (self.exec_block(&stmt.block), &stmt.handler) {
            (Err(err), Some(handler)) if err.is_catchable() => {
                self.env.push_scope();
                if let Some(param) = &stmt.param {
                    self.env.define(&param.name, err.into_value(), true);
                }
                let result = self.exec_stmts(&handler.stmts);
                self.env.pop_scope();
                result
            }
            (result, _) => result,
        };
        if let Some(finalizer) = &stmt.finalizer {
            match self.exec_block(finalizer)? {
                Completion::Normal(_) => {}
                abrupt => return Ok(abrupt),
            }
        }
        result
    }

    // ══════════════════════════════════════════════════════════════════
    // Expressions
    // ══════════════════════════════════════════════════════════════════

    pub(crate) fn eval_expr(&mut self, expr: &Expr) -> EvalResult<Value> {
        match &expr.kind {
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::Str(s) => Ok(Value::string(s.as_str())),
            ExprKind::Template(parts) => self.eval_template(parts),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Undefined => Ok(Value::Undefined),
            ExprKind::Array(items) => Ok(Value::array(self.eval_list(items)?)),
            ExprKind::Object(props) => self.eval_object(props),
            ExprKind::Identifier(name) => self.lookup(name),
            ExprKind::This => Ok(self.this_value.clone()),
            ExprKind::Function(def) => Ok(self.make_closure(def)),
            ExprKind::Member { object, property } => {
                let object = self.eval_expr(object)?;
                self.get_property(&object, &property.name)
            }
            ExprKind::Index { object, index } => {
                let object = self.eval_expr(object)?;
                let key = self.eval_expr(index)?;
                self.get_index(&object, &key)
            }
            ExprKind::Call { callee, args } => self.eval_call(callee, args),
            ExprKind::Unary { op, operand } => self.eval_unary(*op, operand),
            ExprKind::Binary { left, op, right } => {
                let left = self.eval_expr(left)?;
                let right = self.eval_expr(right)?;
                ops::binary(*op, &left, &right, self.limits)
            }
            ExprKind::Logical { left, op, right } => {
                let left = self.eval_expr(left)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.is_truthy(),
                    LogicalOp::Or => left.is_truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval_expr(right)
                }
            }
            ExprKind::Assign { op, target, value } => self.eval_assign(*op, target, value),
            ExprKind::Update { op, prefix, target } => self.eval_update(*op, *prefix, target),
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval_expr(test)?.is_truthy() {
                    self.eval_expr(consequent)
                } else {
                    self.eval_expr(alternate)
                }
            }
        }
    }

    fn lookup(&self, name: &str) -> EvalResult<Value> {
        self.env
            .get(name)
            .ok_or_else(|| EvalError::reference_error(format!("{name} is not defined")))
    }

    fn make_closure(&mut self, def: &Rc<FunctionDef>) -> Value {
        let scope = self.env.capture();
        let this = def.is_arrow.then(|| self.this_value.clone());
        Value::Function(Rc::new(Function::Closure {
            def: Rc::clone(def),
            scope,
            this,
        }))
    }

    fn eval_template(&mut self, parts: &[TemplatePart]) -> EvalResult<Value> {
        let mut out = String::new();
        for part in parts {
            let piece = match part {
                TemplatePart::Literal(text) => text.clone(),
                TemplatePart::Expr(expr) => self.eval_expr(expr)?.to_js_string(),
            };
            self.limits.check_string(out.len() + piece.len())?;
            out.push_str(&piece);
        }
        Ok(Value::string(out))
    }

    /// Evaluate array elements or call arguments, expanding spreads.
    fn eval_list(&mut self, items: &[ListItem]) -> EvalResult<Vec<Value>> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item {
                ListItem::Single(expr) => out.push(self.eval_expr(expr)?),
                ListItem::Spread(expr) => match self.eval_expr(expr)? {
                    Value::Array(items) => {
                        let items = items.borrow();
                        self.limits.check_array(out.len() + items.len())?;
                        out.extend(items.iter().cloned());
                    }
                    Value::String(text) => out.extend(text.chars().map(|c| Value::string(c))),
                    other => {
                        return Err(EvalError::type_error(format!(
                            "{} is not iterable",
                            other.inspect()
                        )))
                    }
                },
            }
        }
        Ok(out)
    }

    fn eval_object(&mut self, props: &[Property]) -> EvalResult<Value> {
        let mut entries = IndexMap::new();
        for prop in props {
            match prop {
                Property::Field { key, value } => {
                    let key = match key {
                        PropertyKey::Named(name) => name.clone(),
                        PropertyKey::Computed(expr) => self.eval_expr(expr)?.to_property_key(),
                    };
                    let value = self.eval_expr(value)?;
                    entries.insert(key, value);
                }
                Property::Spread(expr) => match self.eval_expr(expr)? {
                    Value::Object(source) => {
                        for (key, value) in source.borrow().iter() {
                            entries.insert(key.clone(), value.clone());
                        }
                    }
                    Value::Array(items) => {
                        for (i, value) in items.borrow().iter().enumerate() {
                            entries.insert(i.to_string(), value.clone());
                        }
                    }
                    Value::String(text) => {
                        for (i, c) in text.chars().enumerate() {
                            entries.insert(i.to_string(), Value::string(c));
                        }
                    }
                    _ => {}
                },
            }
        }
        Ok(Value::object(entries))
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr) -> EvalResult<Value> {
        match op {
            UnaryOp::Typeof => {
                if let ExprKind::Identifier(name) = &operand.kind {
                    if !self.env.is_defined(name) {
                        return Ok(Value::string("undefined"));
                    }
                }
                Ok(Value::string(self.eval_expr(operand)?.type_of()))
            }
            UnaryOp::Neg => Ok(Value::Number(-self.eval_expr(operand)?.to_number())),
            UnaryOp::Plus => Ok(Value::Number(self.eval_expr(operand)?.to_number())),
            UnaryOp::Not => Ok(Value::Bool(!self.eval_expr(operand)?.is_truthy())),
        }
    }

    // ── Assignment ──────────────────────────────────────────────────

    fn place<'a>(&mut self, target: &'a Expr) -> EvalResult<Place<'a>> {
        match &target.kind {
            ExprKind::Identifier(name) => Ok(Place::Variable(name)),
            ExprKind::Member { object, property } => Ok(Place::Property {
                object: self.eval_expr(object)?,
                key: Value::string(property.name.as_str()),
            }),
            ExprKind::Index { object, index } => {
                let object = self.eval_expr(object)?;
                let key = self.eval_expr(index)?;
                Ok(Place::Property { object, key })
            }
            _ => Err(EvalError::syntax_error("Invalid left-hand side in assignment")),
        }
    }

    fn read_place(&self, place: &Place<'_>) -> EvalResult<Value> {
        match place {
            Place::Variable(name) => self.lookup(name),
            Place::Property { object, key } => self.get_index(object, key),
        }
    }

    fn write_place(&mut self, place: &Place<'_>, value: Value) -> EvalResult<()> {
        match place {
            Place::Variable(name) => self.assign_variable(name, value),
            Place::Property { object, key } => self.set_index(object, key, value),
        }
    }

    fn eval_assign(&mut self, op: AssignOp, target: &Expr, value: &Expr) -> EvalResult<Value> {
        let place = self.place(target)?;
        let new = match op.binary() {
            None => self.eval_expr(value)?,
            Some(bin) => {
                let old = self.read_place(&place)?;
                let rhs = self.eval_expr(value)?;
                ops::binary(bin, &old, &rhs, self.limits)?
            }
        };
        self.write_place(&place, new.clone())?;
        Ok(new)
    }

    fn eval_update(&mut self, op: UpdateOp, prefix: bool, target: &Expr) -> EvalResult<Value> {
        let place = self.place(target)?;
        let old = self.read_place(&place)?.to_number();
        let new = match op {
            UpdateOp::Increment => old + 1.0,
            UpdateOp::Decrement => old - 1.0,
        };
        self.write_place(&place, Value::Number(new))?;
        Ok(Value::Number(if prefix { new } else { old }))
    }

    fn assign_variable(&mut self, name: &str, value: Value) -> EvalResult<()> {
        match self.env.assign(name, value.clone()) {
            Ok(()) => Ok(()),
            // Assigning an undeclared name creates a global.
            Err(AssignError::Undeclared) => {
                self.env.define_global(name, value);
                Ok(())
            }
            Err(AssignError::Constant) => {
                Err(EvalError::type_error("Assignment to constant variable."))
            }
        }
    }

    // ── Properties ──────────────────────────────────────────────────

    pub(crate) fn get_property(&self, object: &Value, key: &str) -> EvalResult<Value> {
        match object {
            Value::Undefined | Value::Null => Err(EvalError::type_error(format!(
                "Cannot read properties of {} (reading '{key}')",
                object.to_js_string()
            ))),
            Value::Array(items) => {
                let items = items.borrow();
                if key == "length" {
                    return Ok(Value::Number(items.len() as f64));
                }
                Ok(crate::value::array_index(key)
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or_default())
            }
            Value::String(text) => {
                if key == "length" {
                    return Ok(Value::Number(text.char_len() as f64));
                }
                Ok(crate::value::array_index(key)
                    .and_then(|i| text.char_at(i))
                    .map(Value::string)
                    .unwrap_or_default())
            }
            Value::Object(entries) => Ok(entries.borrow().get(key).cloned().unwrap_or_default()),
            Value::Function(function) => match key {
                "name" => Ok(Value::string(function.name())),
                _ => Ok(builtins::static_member(function, key).unwrap_or_default()),
            },
            Value::Bool(_) | Value::Number(_) => Ok(Value::Undefined),
        }
    }

    pub(crate) fn get_index(&self, object: &Value, key: &Value) -> EvalResult<Value> {
        match (object, key.as_array_index()) {
            (Value::Array(items), Some(i)) => Ok(items.borrow().get(i).cloned().unwrap_or_default()),
            (Value::String(text), Some(i)) => Ok(text.char_at(i).map(Value::string).unwrap_or_default()),
            _ => self.get_property(object, &key.to_property_key()),
        }
    }

    pub(crate) fn set_index(&mut self, object: &Value, key: &Value, value: Value) -> EvalResult<()> {
        match object {
            Value::Undefined | Value::Null => Err(EvalError::type_error(format!(
                "Cannot set properties of {} (setting '{}')",
                object.to_js_string(),
                key.to_property_key()
            ))),
            Value::Array(items) => {
                if let Some(i) = key.as_array_index() {
                    let mut items = items.borrow_mut();
                    if i >= items.len() {
                        self.limits.check_array(i + 1)?;
                        items.resize(i + 1, Value::Undefined);
                    }
                    items[i] = value;
                } else if key.to_property_key() == "length" {
                    let len = array_length(&value)?;
                    self.limits.check_array(len)?;
                    items.borrow_mut().resize(len, Value::Undefined);
                }
                Ok(())
            }
            Value::Object(entries) => {
                entries.borrow_mut().insert(key.to_property_key(), value);
                Ok(())
            }
            // Writes to primitives are silently dropped.
            _ => Ok(()),
        }
    }

    // ── Calls ───────────────────────────────────────────────────────

    fn eval_call(&mut self, callee: &Expr, args: &[ListItem]) -> EvalResult<Value> {
        match &callee.kind {
            ExprKind::Member { object, property } => {
                let receiver = self.eval_expr(object)?;
                let args = self.eval_list(args)?;
                self.call_method(receiver, &property.name, args)
            }
            ExprKind::Index { object, index } => {
                let receiver = self.eval_expr(object)?;
                let key = self.eval_expr(index)?.to_property_key();
                let args = self.eval_list(args)?;
                self.call_method(receiver, &key, args)
            }
            _ => {
                let function = self.eval_expr(callee)?;
                if !matches!(function, Value::Function(_)) {
                    return Err(EvalError::type_error(format!(
                        "{} is not a function",
                        describe_callee(callee)
                    )));
                }
                let args = self.eval_list(args)?;
                self.call_function(&function, Value::Undefined, args)
            }
        }
    }

    /// `receiver.name(args)`: built-in array/string/number methods first,
    /// then an own property holding a function, called with `this`.
    pub(crate) fn call_method(
        &mut self,
        receiver: Value,
        name: &str,
        args: Vec<Value>,
    ) -> EvalResult<Value> {
        match &receiver {
            Value::Array(items) => methods::call_array_method(self, items, name, args),
            Value::String(text) => methods::call_string_method(self, text, name, args),
            Value::Number(n) => methods::call_number_method(*n, name, args),
            Value::Object(entries)
                if name == "hasOwnProperty" && !entries.borrow().contains_key(name) =>
            {
                let key = args.first().map(Value::to_property_key).unwrap_or_default();
                Ok(Value::Bool(entries.borrow().contains_key(&key)))
            }
            _ => {
                let function = self.get_property(&receiver, name)?;
                if !matches!(function, Value::Function(_)) {
                    return Err(EvalError::type_error(format!("{name} is not a function")));
                }
                self.call_function(&function, receiver, args)
            }
        }
    }

    /// Invoke any callable value.
    pub fn call_function(
        &mut self,
        function: &Value,
        this: Value,
        args: Vec<Value>,
    ) -> EvalResult<Value> {
        let Value::Function(function) = function else {
            return Err(EvalError::type_error(format!(
                "{} is not a function",
                function.inspect()
            )));
        };
        self.tick()?;
        if self.depth >= self.max_call_depth {
            return Err(EvalError::range_error("Maximum call stack size exceeded"));
        }
        self.depth += 1;
        let result = match function.as_ref() {
            Function::Native { func, .. } => func(self, &this, args),
            Function::Closure {
                def,
                scope,
                this: captured,
            } => {
                let this = captured.clone().unwrap_or(this);
                self.call_closure(function, def, scope, this, args)
            }
        };
        self.depth -= 1;
        result
    }

    fn call_closure(
        &mut self,
        function: &Rc<Function>,
        def: &FunctionDef,
        scope: &Rc<Scope>,
        this: Value,
        args: Vec<Value>,
    ) -> EvalResult<Value> {
        let saved_scope = self.env.enter_child_of(scope);
        let saved_this = std::mem::replace(&mut self.this_value, this);
        let result = self.run_function_body(function, def, args);
        self.this_value = saved_this;
        self.env.restore(saved_scope);
        result
    }

    fn run_function_body(
        &mut self,
        function: &Rc<Function>,
        def: &FunctionDef,
        args: Vec<Value>,
    ) -> EvalResult<Value> {
        // A named function expression can refer to itself.
        if let Some(name) = &def.name {
            self.env
                .define(&name.name, Value::Function(Rc::clone(function)), true);
        }
        self.bind_params(&def.params, args)?;
        match &def.body {
            FunctionBody::Expr(expr) => self.eval_expr(expr),
            FunctionBody::Block(block) => {
                self.hoist_vars(&block.stmts);
                match self.exec_stmts(&block.stmts)? {
                    Completion::Return(value) => Ok(value),
                    _ => Ok(Value::Undefined),
                }
            }
        }
    }

    fn bind_params(&mut self, params: &[Param], args: Vec<Value>) -> EvalResult<()> {
        let mut args = args.into_iter();
        for param in params {
            let value = if param.rest {
                Value::array(args.by_ref().collect())
            } else {
                match (args.next(), &param.default) {
                    (Some(Value::Undefined) | None, Some(default)) => self.eval_expr(default)?,
                    (Some(value), _) => value,
                    (None, None) => Value::Undefined,
                }
            };
            self.env.define(&param.name.name, value, true);
        }
        Ok(())
    }
}

/// Validate a value used as an array length.
pub(crate) fn array_length(value: &Value) -> EvalResult<usize> {
    let n = value.to_number();
    if n >= 0.0 && n.fract() == 0.0 && n <= MAX_ARRAY_LENGTH as f64 {
        Ok(n as usize)
    } else {
        Err(EvalError::range_error("Invalid array length"))
    }
}

fn index_keys(len: usize) -> Vec<Value> {
    (0..len).map(|i| Value::string(i.to_string())).collect()
}

/// Source-like name of a callee for "is not a function" messages.
fn describe_callee(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Identifier(name) => name.clone(),
        ExprKind::Member { object, property } => {
            format!("{}.{}", describe_callee(object), property.name)
        }
        ExprKind::This => "this".to_string(),
        ExprKind::Call { callee, .. } => format!("{}(...)", describe_callee(callee)),
        _ => "expression".to_string(),
    }
}

/// Names declared with `var` anywhere in `stmts`, not descending into
/// nested functions.
fn collect_var_names(stmts: &[Stmt], names: &mut Vec<String>) {
    for stmt in stmts {
        collect_var_names_in(stmt, names);
    }
}

fn collect_var_names_in(stmt: &Stmt, names: &mut Vec<String>) {
    match stmt {
        Stmt::Var(decl) if decl.kind == VarKind::Var => {
            names.extend(decl.declarators.iter().map(|d| d.name.name.clone()));
        }
        Stmt::If(stmt) => {
            collect_var_names_in(&stmt.consequent, names);
            if let Some(alternate) = &stmt.alternate {
                collect_var_names_in(alternate, names);
            }
        }
        Stmt::While(stmt) | Stmt::DoWhile(stmt) => collect_var_names_in(&stmt.body, names),
        Stmt::For(stmt) => {
            if let Some(init) = &stmt.init {
                collect_var_names_in(init, names);
            }
            collect_var_names_in(&stmt.body, names);
        }
        Stmt::ForOf(stmt) | Stmt::ForIn(stmt) => {
            if stmt.kind == Some(VarKind::Var) {
                names.push(stmt.binding.name.clone());
            }
            collect_var_names_in(&stmt.body, names);
        }
        Stmt::Try(stmt) => {
            collect_var_names(&stmt.block.stmts, names);
            if let Some(handler) = &stmt.handler {
                collect_var_names(&handler.stmts, names);
            }
            if let Some(finalizer) = &stmt.finalizer {
                collect_var_names(&finalizer.stmts, names);
            }
        }
        Stmt::Block(block) => collect_var_names(&block.stmts, names),
        _ => {}
    }
}
