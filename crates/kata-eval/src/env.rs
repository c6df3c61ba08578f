//! Scoped variable environment for the interpreter.
//!
//! Scopes form a parent-linked chain of shared nodes so closures can keep
//! the scope they were created in alive and observe later mutations.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::value::Value;

#[derive(Debug, Clone)]
struct Binding {
    value: Value,
    mutable: bool,
}

/// A single scope level.
#[derive(Debug, Default)]
pub struct Scope {
    bindings: RefCell<HashMap<String, Binding>>,
    parent: Option<Rc<Scope>>,
}

impl Scope {
    fn child(parent: Rc<Scope>) -> Rc<Scope> {
        Rc::new(Scope {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent),
        })
    }

    fn lookup<T>(self: &Rc<Self>, name: &str, f: impl FnOnce(&mut Binding) -> T) -> Option<T> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(binding) = current.bindings.borrow_mut().get_mut(name) {
                return Some(f(binding));
            }
            scope = current.parent.as_ref();
        }
        None
    }
}

/// Why an assignment was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignError {
    Undeclared,
    Constant,
}

/// Scoped variable environment with push/pop semantics.
///
/// Variables are looked up from innermost scope outward.
/// `define` always creates in the current (innermost) scope.
/// `assign` updates the first scope where the variable exists.
#[derive(Debug)]
pub struct Environment {
    global: Rc<Scope>,
    current: Rc<Scope>,
    /// Scopes captured by closures. Cleared on drop so closure/scope
    /// reference cycles do not outlive the interpreter.
    captured: Vec<Weak<Scope>>,
    prune_at: usize,
}

const INITIAL_PRUNE_AT: usize = 1024;

impl Environment {
    /// Create a new environment with one global scope.
    pub fn new() -> Self {
        let global = Rc::new(Scope::default());
        Self {
            current: Rc::clone(&global),
            global,
            captured: Vec::new(),
            prune_at: INITIAL_PRUNE_AT,
        }
    }

    pub fn push_scope(&mut self) {
        self.current = Scope::child(Rc::clone(&self.current));
    }

    /// Pop the innermost scope. The global scope is never popped.
    pub fn pop_scope(&mut self) {
        if let Some(parent) = self.current.parent.clone() {
            self.current = parent;
        }
    }

    /// Make a child of `scope` current, returning the scope to restore later.
    pub fn enter_child_of(&mut self, scope: &Rc<Scope>) -> Rc<Scope> {
        std::mem::replace(&mut self.current, Scope::child(Rc::clone(scope)))
    }

    /// Restore a scope previously returned by [`Environment::enter_child_of`]
    /// or [`Environment::replace_current`].
    pub fn restore(&mut self, scope: Rc<Scope>) {
        self.current = scope;
    }

    /// Swap the innermost scope for a fresh sibling, returning the old one.
    pub fn replace_current(&mut self) -> Rc<Scope> {
        let parent = self
            .current
            .parent
            .clone()
            .unwrap_or_else(|| Rc::clone(&self.global));
        std::mem::replace(&mut self.current, Scope::child(parent))
    }

    /// Define a variable in the current (innermost) scope.
    pub fn define(&mut self, name: &str, value: Value, mutable: bool) {
        self.current
            .bindings
            .borrow_mut()
            .insert(name.to_string(), Binding { value, mutable });
    }

    /// Define a variable in the global scope.
    pub fn define_global(&mut self, name: &str, value: Value) {
        self.global.bindings.borrow_mut().insert(
            name.to_string(),
            Binding {
                value,
                mutable: true,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.current.lookup(name, |b| b.value.clone())
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.current.lookup(name, |_| ()).is_some()
    }

    /// Update a variable in the first scope where it exists.
    pub fn assign(&mut self, name: &str, value: Value) -> Result<(), AssignError> {
        self.current
            .lookup(name, |binding| {
                if binding.mutable {
                    binding.value = value;
                    Ok(())
                } else {
                    Err(AssignError::Constant)
                }
            })
            .unwrap_or(Err(AssignError::Undeclared))
    }

    /// Whether anything besides the environment holds the current scope.
    pub fn current_is_captured(&self) -> bool {
        Rc::strong_count(&self.current) > 1
    }

    /// The current scope, for a closure to capture.
    pub fn capture(&mut self) -> Rc<Scope> {
        let already = self
            .captured
            .last()
            .is_some_and(|last| std::ptr::eq(last.as_ptr(), Rc::as_ptr(&self.current)));
        if !already {
            if self.captured.len() >= self.prune_at {
                self.captured.retain(|w| w.strong_count() > 0);
                self.prune_at = (self.captured.len() * 2).max(INITIAL_PRUNE_AT);
            }
            self.captured.push(Rc::downgrade(&self.current));
        }
        Rc::clone(&self.current)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        let mut cleared = Vec::new();
        for weak in self.captured.drain(..) {
            let mut scope = weak.upgrade();
            while let Some(current) = scope {
                let bindings = std::mem::take(&mut *current.bindings.borrow_mut());
                cleared.push(bindings);
                scope = current.parent.clone();
            }
        }
        let globals = std::mem::take(&mut *self.global.bindings.borrow_mut());
        // Drop outside the borrows above; values may own further scopes.
        drop(globals);
        drop(cleared);
    }
}
