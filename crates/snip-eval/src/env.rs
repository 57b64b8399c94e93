//! Scope arena for the snippet evaluator.
//!
//! Scopes live in one `Vec` and are addressed by [`ScopeId`]. Closures keep
//! the id of their defining scope, so a scope stays alive for as long as the
//! run does once something has captured it. Uncaptured scopes at the top of
//! the arena are reclaimed when they exit, which keeps long loops flat.

use std::collections::BTreeMap;

use snip_types::ast::DeclKind;

use crate::error::{EvalError, EvalResult};
use crate::value::Value;

/// Index of a scope in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Function,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Var,
    Let,
    Const,
    Function,
    Param,
}

impl From<DeclKind> for BindingKind {
    fn from(kind: DeclKind) -> Self {
        match kind {
            DeclKind::Var => BindingKind::Var,
            DeclKind::Let => BindingKind::Let,
            DeclKind::Const => BindingKind::Const,
        }
    }
}

/// A named slot. `value` is `None` while the binding is in its temporal
/// dead zone.
#[derive(Debug, Clone)]
pub struct Binding {
    pub kind: BindingKind,
    pub value: Option<Value>,
}

#[derive(Debug, Clone)]
struct Scope {
    parent: Option<ScopeId>,
    kind: ScopeKind,
    bindings: BTreeMap<String, Binding>,
    /// Set on function and global scopes.
    this: Option<Value>,
    /// A closure refers to this scope; it must outlive its block.
    captured: bool,
}

impl Scope {
    fn new(parent: Option<ScopeId>, kind: ScopeKind) -> Self {
        Self {
            parent,
            kind,
            bindings: BTreeMap::new(),
            this: None,
            captured: false,
        }
    }
}

/// Outcome of resolving a name through the scope chain.
pub enum Resolved<'a> {
    Found(&'a Binding),
    Unresolvable,
}

/// Arena of lexical scopes.
#[derive(Debug, Clone)]
pub struct Environment {
    scopes: Vec<Scope>,
}

impl Environment {
    /// Create an arena holding just the global scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new(None, ScopeKind::Global)],
        }
    }

    pub fn global(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Number of live scopes.
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Open a child scope of `parent`.
    pub fn push(&mut self, parent: ScopeId, kind: ScopeKind) -> ScopeId {
        self.scopes.push(Scope::new(Some(parent), kind));
        ScopeId(self.scopes.len() - 1)
    }

    /// Close a scope. Its slot is reclaimed if nothing captured it and it
    /// is the newest scope in the arena.
    pub fn release(&mut self, id: ScopeId) {
        if id.0 != 0 && id.0 == self.scopes.len() - 1 && !self.scopes[id.0].captured {
            self.scopes.pop();
        }
    }

    /// Mark a scope as referenced by a closure.
    pub fn capture(&mut self, id: ScopeId) {
        self.scopes[id.0].captured = true;
    }

    /// The scope to use for the next loop iteration.
    ///
    /// If a closure captured the current iteration's scope, its bindings are
    /// copied into a fresh scope so that every iteration keeps its own slot.
    /// Otherwise the current scope is reused as is.
    pub fn next_iteration(&mut self, current: ScopeId) -> ScopeId {
        let scope = &self.scopes[current.0];
        if !scope.captured && current.0 == self.scopes.len() - 1 {
            return current;
        }
        let mut copy = Scope::new(scope.parent, scope.kind);
        copy.bindings = scope.bindings.clone();
        copy.this = scope.this.clone();
        self.scopes.push(copy);
        ScopeId(self.scopes.len() - 1)
    }

    // ── Declarations ──────────────────────────────────────────────────────────

    /// Declare `name` in `scope`.
    ///
    /// Redeclaring a `var` (or a parameter as `var`) keeps the existing
    /// value; every other kind replaces the binding.
    pub fn declare(&mut self, scope: ScopeId, name: &str, kind: BindingKind, value: Option<Value>) {
        let bindings = &mut self.scopes[scope.0].bindings;
        if kind == BindingKind::Var && bindings.contains_key(name) {
            return;
        }
        bindings.insert(name.to_string(), Binding { kind, value });
    }

    /// Give a binding declared in exactly `scope` its first value, ending
    /// its temporal dead zone.
    pub fn initialize(&mut self, scope: ScopeId, name: &str, value: Value) -> EvalResult<()> {
        match self.scopes[scope.0].bindings.get_mut(name) {
            Some(binding) => {
                binding.value = Some(value);
                Ok(())
            }
            None => Err(EvalError::Internal(format!(
                "binding '{name}' was not instantiated"
            ))),
        }
    }

    /// Nearest function or global scope: where `var` declarations live.
    pub fn var_scope(&self, mut scope: ScopeId) -> ScopeId {
        loop {
            let s = &self.scopes[scope.0];
            match (s.kind, s.parent) {
                (ScopeKind::Block, Some(parent)) => scope = parent,
                _ => return scope,
            }
        }
    }

    // ── Lookup & Assignment ───────────────────────────────────────────────────

    pub fn resolve(&self, scope: ScopeId, name: &str) -> Resolved<'_> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = &self.scopes[id.0];
            if let Some(binding) = s.bindings.get(name) {
                return Resolved::Found(binding);
            }
            current = s.parent;
        }
        Resolved::Unresolvable
    }

    /// Read a binding. `Ok(None)` means the name is not declared anywhere
    /// in the chain.
    pub fn get(&self, scope: ScopeId, name: &str) -> EvalResult<Option<Value>> {
        match self.resolve(scope, name) {
            Resolved::Found(Binding { value: Some(v), .. }) => Ok(Some(v.clone())),
            Resolved::Found(Binding { value: None, .. }) => Err(EvalError::reference(format!(
                "Cannot access '{name}' before initialization"
            ))),
            Resolved::Unresolvable => Ok(None),
        }
    }

    /// Write an existing binding. Returns `Ok(false)` if the name is not
    /// declared anywhere in the chain.
    pub fn assign(&mut self, scope: ScopeId, name: &str, value: Value) -> EvalResult<bool> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = &mut self.scopes[id.0];
            if let Some(binding) = s.bindings.get_mut(name) {
                if binding.value.is_none() {
                    return Err(EvalError::reference(format!(
                        "Cannot access '{name}' before initialization"
                    )));
                }
                if binding.kind == BindingKind::Const {
                    return Err(EvalError::type_error("Assignment to constant variable."));
                }
                binding.value = Some(value);
                return Ok(true);
            }
            current = s.parent;
        }
        Ok(false)
    }

    // ── this ──────────────────────────────────────────────────────────────────

    pub fn set_this(&mut self, scope: ScopeId, this: Value) {
        self.scopes[scope.0].this = Some(this);
    }

    /// The `this` of the nearest enclosing function or global scope.
    pub fn this_value(&self, scope: ScopeId) -> Value {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = &self.scopes[id.0];
            if let Some(this) = &s.this {
                return this.clone();
            }
            current = s.parent;
        }
        Value::Undefined
    }

    /// Drop every binding, breaking reference cycles through closures.
    pub fn clear(&mut self) {
        self.scopes.truncate(1);
        self.scopes[0] = Scope::new(None, ScopeKind::Global);
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
