//! Core statement and expression evaluator.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use log::{debug, trace};
use snip_parser::parse_function_parts;
use snip_types::ast::*;

use crate::capture::Console;
use crate::env::{BindingKind, Environment, Resolved, ScopeId, ScopeKind};
use crate::error::{EvalError, EvalResult};
use crate::inspect::format_log_line;
use crate::value::{
    array_index, to_property_key, Builtin, Callable, FunctionObject, Object, ObjectKind, ObjRef,
    Value,
};

/// Steps between wall-clock checks.
const CLOCK_INTERVAL: u64 = 256;

/// Array writes beyond this index become ordinary properties.
const MAX_DENSE_INDEX: usize = 1 << 20;

/// Globals that silently ignore writes in sloppy code.
const READ_ONLY_GLOBALS: &[&str] = &["undefined", "NaN", "Infinity"];

/// Limits for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalConfig {
    /// Wall-clock budget; `None` runs unbounded.
    pub timeout: Option<Duration>,
    /// Deepest allowed nesting of function calls.
    pub max_call_depth: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_millis(1000)),
            max_call_depth: 64,
        }
    }
}

/// Where evaluation currently is: the innermost scope and whether the
/// running code is strict.
#[derive(Debug, Clone, Copy)]
struct Ctx {
    scope: ScopeId,
    strict: bool,
}

impl Ctx {
    fn with_scope(self, scope: ScopeId) -> Ctx {
        Ctx { scope, ..self }
    }
}

/// Statement completion.
enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// Assignment target after its object and key have been evaluated.
enum Place {
    Binding(String),
    Property(Value, String),
}

/// The tree-walking evaluator. One instance runs one program.
pub struct Evaluator<'c> {
    pub env: Environment,
    console: &'c mut dyn Console,
    global: ObjRef,
    document: ObjRef,
    /// One shared function object per built-in method.
    builtins: IndexMap<Builtin, ObjRef>,
    /// Every object allocated by this run, so cycles can be broken on drop.
    heap: Vec<Weak<RefCell<Object>>>,
    heap_prune_at: usize,
    config: EvalConfig,
    deadline: Option<Instant>,
    steps: u64,
    call_depth: usize,
}

impl<'c> Evaluator<'c> {
    pub fn new(console: &'c mut dyn Console, config: EvalConfig) -> Self {
        let mut heap = Vec::new();
        let global = track(&mut heap, ObjectKind::Global);
        let document = track(
            &mut heap,
            ObjectKind::Document {
                listeners: Vec::new(),
            },
        );
        let mut evaluator = Self {
            env: Environment::new(),
            console,
            global,
            document,
            builtins: IndexMap::new(),
            heap,
            heap_prune_at: 1024,
            config,
            deadline: config.timeout.map(|t| Instant::now() + t),
            steps: 0,
            call_depth: 0,
        };
        evaluator.install_globals();
        evaluator
    }

    fn install_globals(&mut self) {
        let console = self.alloc(ObjectKind::Plain);
        let log = self.builtin(Builtin::ConsoleLog);
        console.borrow_mut().properties.insert("log".into(), log);

        let globals = [
            ("window", Value::Object(Rc::clone(&self.global))),
            ("globalThis", Value::Object(Rc::clone(&self.global))),
            ("document", Value::Object(Rc::clone(&self.document))),
            ("console", Value::Object(console)),
            ("Function", self.builtin(Builtin::FunctionCtor)),
            ("Event", self.builtin(Builtin::EventCtor)),
            ("undefined", Value::Undefined),
            ("NaN", Value::Number(f64::NAN)),
            ("Infinity", Value::Number(f64::INFINITY)),
        ];
        let mut global = self.global.borrow_mut();
        for (name, value) in globals {
            global.properties.insert(name.to_string(), value);
        }
        drop(global);

        let scope = self.env.global();
        self.env
            .set_this(scope, Value::Object(Rc::clone(&self.global)));
    }

    /// Read a top-level binding or global object property.
    pub fn get_global(&self, name: &str) -> EvalResult<Option<Value>> {
        match self.env.get(self.env.global(), name)? {
            Some(value) => Ok(Some(value)),
            None => Ok(self.global.borrow().properties.get(name).cloned()),
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Bookkeeping
    // ══════════════════════════════════════════════════════════════════════

    fn tick(&mut self) -> EvalResult<()> {
        self.steps += 1;
        if self.steps % CLOCK_INTERVAL == 0 {
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline {
                    debug!("deadline reached after {} steps", self.steps);
                    return Err(EvalError::Timeout(self.config.timeout.unwrap_or_default()));
                }
            }
        }
        Ok(())
    }

    fn alloc(&mut self, kind: ObjectKind) -> ObjRef {
        if self.heap.len() >= self.heap_prune_at {
            self.heap.retain(|obj| obj.strong_count() > 0);
            self.heap_prune_at = (self.heap.len() * 2).max(1024);
        }
        track(&mut self.heap, kind)
    }

    fn builtin(&mut self, builtin: Builtin) -> Value {
        if let Some(obj) = self.builtins.get(&builtin) {
            return Value::Object(Rc::clone(obj));
        }
        let obj = self.alloc(ObjectKind::Function(FunctionObject {
            callable: Callable::Builtin(builtin),
            prototype: None,
        }));
        self.builtins.insert(builtin, Rc::clone(&obj));
        Value::Object(obj)
    }

    // ══════════════════════════════════════════════════════════════════════
    // Programs & declarations
    // ══════════════════════════════════════════════════════════════════════

    /// Run a whole program in the global scope.
    pub fn run_program(&mut self, program: &Program) -> EvalResult<()> {
        debug!(
            "evaluating {} top-level statements (strict: {})",
            program.body.len(),
            program.strict
        );
        let ctx = Ctx {
            scope: self.env.global(),
            strict: program.strict,
        };
        self.hoist_vars(&program.body, ctx.scope);
        self.instantiate_block(&program.body, ctx)?;
        self.exec_stmts(&program.body, ctx)?;
        Ok(())
    }

    /// Create every `var` in `stmts` (outside nested functions) as
    /// `undefined` in `scope`.
    fn hoist_vars(&mut self, stmts: &[Stmt], scope: ScopeId) {
        for stmt in stmts {
            self.hoist_stmt(stmt, scope);
        }
    }

    fn hoist_stmt(&mut self, stmt: &Stmt, scope: ScopeId) {
        match stmt {
            Stmt::Var(decl) if decl.kind == DeclKind::Var => self.hoist_decl(decl, scope),
            Stmt::Block(block) => self.hoist_vars(&block.stmts, scope),
            Stmt::If(stmt) => {
                self.hoist_stmt(&stmt.then_branch, scope);
                if let Some(else_branch) = &stmt.else_branch {
                    self.hoist_stmt(else_branch, scope);
                }
            }
            Stmt::For(stmt) => {
                if let Some(ForInit::Decl(decl)) = &stmt.init {
                    if decl.kind == DeclKind::Var {
                        self.hoist_decl(decl, scope);
                    }
                }
                self.hoist_stmt(&stmt.body, scope);
            }
            Stmt::While(stmt) => self.hoist_stmt(&stmt.body, scope),
            _ => {}
        }
    }

    fn hoist_decl(&mut self, decl: &VarDecl, scope: ScopeId) {
        for declarator in &decl.declarators {
            self.env.declare(
                scope,
                &declarator.name.name,
                BindingKind::Var,
                Some(Value::Undefined),
            );
        }
    }

    /// Block entry: `let`/`const` enter their dead zone and function
    /// declarations are initialised.
    fn instantiate_block(&mut self, stmts: &[Stmt], ctx: Ctx) -> EvalResult<()> {
        for stmt in stmts {
            if let Stmt::Var(decl) = stmt {
                if decl.kind.is_lexical() {
                    self.declare_lexical(decl, ctx.scope);
                }
            }
        }
        for stmt in stmts {
            if let Stmt::Function(def) = stmt {
                let name = def
                    .name
                    .clone()
                    .ok_or_else(|| EvalError::Internal("function declaration without a name".into()))?;
                let closure = self.make_closure(def, ctx);
                self.env
                    .declare(ctx.scope, &name, BindingKind::Function, Some(closure));
            }
        }
        Ok(())
    }

    fn declare_lexical(&mut self, decl: &VarDecl, scope: ScopeId) {
        for declarator in &decl.declarators {
            self.env
                .declare(scope, &declarator.name.name, decl.kind.into(), None);
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Statements
    // ══════════════════════════════════════════════════════════════════════

    fn exec_stmts(&mut self, stmts: &[Stmt], ctx: Ctx) -> EvalResult<Flow> {
        for stmt in stmts {
            match self.exec_stmt(stmt, ctx)? {
                Flow::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, ctx: Ctx) -> EvalResult<Flow> {
        self.tick()?;
        match stmt {
            Stmt::Var(decl) => {
                self.exec_var_decl(decl, ctx)?;
                Ok(Flow::Normal)
            }
            Stmt::Function(_) | Stmt::Empty(_) => Ok(Flow::Normal),
            Stmt::Expr(stmt) => {
                self.eval_expr(&stmt.expr, ctx)?;
                Ok(Flow::Normal)
            }
            Stmt::Block(block) => self.exec_block(&block.stmts, ctx),
            Stmt::If(stmt) => {
                if self.eval_expr(&stmt.condition, ctx)?.truthy() {
                    self.exec_stmt(&stmt.then_branch, ctx)
                } else if let Some(else_branch) = &stmt.else_branch {
                    self.exec_stmt(else_branch, ctx)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::For(stmt) => self.exec_for(stmt, ctx),
            Stmt::While(stmt) => self.exec_while(stmt, ctx),
            Stmt::Return(stmt) => {
                let value = match &stmt.value {
                    Some(expr) => self.eval_expr(expr, ctx)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Break(_) => Ok(Flow::Break),
            Stmt::Continue(_) => Ok(Flow::Continue),
        }
    }

    fn exec_var_decl(&mut self, decl: &VarDecl, ctx: Ctx) -> EvalResult<()> {
        for declarator in &decl.declarators {
            let name = &declarator.name.name;
            if decl.kind == DeclKind::Var {
                if let Some(init) = &declarator.init {
                    let value = self.eval_expr(init, ctx)?;
                    if !self.env.assign(ctx.scope, name, value.clone())? {
                        let scope = self.env.var_scope(ctx.scope);
                        self.env.declare(scope, name, BindingKind::Var, Some(value));
                    }
                }
            } else {
                let value = match &declarator.init {
                    Some(init) => self.eval_expr(init, ctx)?,
                    None => Value::Undefined,
                };
                self.env.initialize(ctx.scope, name, value)?;
            }
        }
        Ok(())
    }

    /// `{ ... }`. A scope is only opened when the block declares something.
    fn exec_block(&mut self, stmts: &[Stmt], ctx: Ctx) -> EvalResult<Flow> {
        let declares = stmts.iter().any(|stmt| match stmt {
            Stmt::Var(decl) => decl.kind.is_lexical(),
            Stmt::Function(_) => true,
            _ => false,
        });
        if !declares {
            return self.exec_stmts(stmts, ctx);
        }
        let inner = ctx.with_scope(self.env.push(ctx.scope, ScopeKind::Block));
        self.instantiate_block(stmts, inner)?;
        let flow = self.exec_stmts(stmts, inner)?;
        self.env.release(inner.scope);
        Ok(flow)
    }

    /// `for (init; test; update) body`
    ///
    /// With a `let`/`const` head every iteration runs in its own copy of the
    /// loop scope, taken before the test, so closures created in the body
    /// keep that iteration's values.
    fn exec_for(&mut self, stmt: &ForStmt, ctx: Ctx) -> EvalResult<Flow> {
        let lexical = matches!(&stmt.init, Some(ForInit::Decl(decl)) if decl.kind.is_lexical());
        let loop_ctx = if lexical {
            ctx.with_scope(self.env.push(ctx.scope, ScopeKind::Block))
        } else {
            ctx
        };

        match &stmt.init {
            Some(ForInit::Decl(decl)) => {
                if lexical {
                    self.declare_lexical(decl, loop_ctx.scope);
                }
                self.exec_var_decl(decl, loop_ctx)?;
            }
            Some(ForInit::Expr(expr)) => {
                self.eval_expr(expr, loop_ctx)?;
            }
            None => {}
        }

        let mut iteration = loop_ctx;
        if lexical {
            iteration.scope = self.env.next_iteration(loop_ctx.scope);
        }
        let flow = loop {
            self.tick()?;
            if let Some(test) = &stmt.test {
                if !self.eval_expr(test, iteration)?.truthy() {
                    break Flow::Normal;
                }
            }
            match self.exec_stmt(&stmt.body, iteration)? {
                Flow::Break => break Flow::Normal,
                Flow::Return(value) => break Flow::Return(value),
                Flow::Normal | Flow::Continue => {}
            }
            if lexical {
                iteration.scope = self.env.next_iteration(iteration.scope);
            }
            if let Some(update) = &stmt.update {
                self.eval_expr(update, iteration)?;
            }
        };

        if lexical {
            self.env.release(iteration.scope);
            if iteration.scope != loop_ctx.scope {
                self.env.release(loop_ctx.scope);
            }
        }
        Ok(flow)
    }

    fn exec_while(&mut self, stmt: &WhileStmt, ctx: Ctx) -> EvalResult<Flow> {
        loop {
            self.tick()?;
            if !self.eval_expr(&stmt.condition, ctx)?.truthy() {
                return Ok(Flow::Normal);
            }
            match self.exec_stmt(&stmt.body, ctx)? {
                Flow::Break => return Ok(Flow::Normal),
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal | Flow::Continue => {}
            }
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Expressions
    // ══════════════════════════════════════════════════════════════════════

    fn eval_expr(&mut self, expr: &Expr, ctx: Ctx) -> EvalResult<Value> {
        match &expr.kind {
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::String(s) => Ok(Value::String(s.clone())),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Identifier(name) => self.lookup(name, ctx),
            ExprKind::This => Ok(self.env.this_value(ctx.scope)),
            ExprKind::Array(elements) => {
                let items = self.eval_list(elements, ctx)?;
                Ok(Value::Object(self.alloc(ObjectKind::Array(items))))
            }
            ExprKind::Object(properties) => self.eval_object_literal(properties, ctx),
            ExprKind::Function(def) => Ok(self.make_closure(def, ctx)),
            ExprKind::Unary { op, operand } => self.eval_unary(*op, operand, ctx),
            ExprKind::Update { op, prefix, target } => self.eval_update(*op, *prefix, target, ctx),
            ExprKind::Binary { left, op, right } => {
                let left = self.eval_expr(left, ctx)?;
                let right = self.eval_expr(right, ctx)?;
                Ok(binary_op(*op, &left, &right))
            }
            ExprKind::Logical { left, op, right } => {
                let left = self.eval_expr(left, ctx)?;
                match (op, left.truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(left),
                    _ => self.eval_expr(right, ctx),
                }
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval_expr(test, ctx)?.truthy() {
                    self.eval_expr(consequent, ctx)
                } else {
                    self.eval_expr(alternate, ctx)
                }
            }
            ExprKind::Assign { op, target, value } => self.eval_assign(*op, target, value, ctx),
            ExprKind::Member { object, property } => {
                let object = self.eval_expr(object, ctx)?;
                let key = self.property_key(property, ctx)?;
                self.get_property(&object, &key)
            }
            ExprKind::Call { callee, args } => self.eval_call(callee, args, ctx),
            ExprKind::New { callee, args } => {
                let constructor = self.eval_expr(callee, ctx)?;
                let args = self.eval_list(args, ctx)?;
                self.construct(&constructor, args, &describe(callee))
            }
            ExprKind::Paren(inner) => self.eval_expr(inner, ctx),
        }
    }

    fn eval_list(&mut self, exprs: &[Expr], ctx: Ctx) -> EvalResult<Vec<Value>> {
        let mut values = Vec::with_capacity(exprs.len());
        for expr in exprs {
            values.push(self.eval_expr(expr, ctx)?);
        }
        Ok(values)
    }

    fn eval_object_literal(&mut self, properties: &[Property], ctx: Ctx) -> EvalResult<Value> {
        let obj = self.alloc(ObjectKind::Plain);
        for property in properties {
            let value = self.eval_expr(&property.value, ctx)?;
            obj.borrow_mut()
                .properties
                .insert(property.key.clone(), value);
        }
        Ok(Value::Object(obj))
    }

    /// Resolve an identifier: scope chain first, then the global object.
    fn lookup(&self, name: &str, ctx: Ctx) -> EvalResult<Value> {
        if let Some(value) = self.env.get(ctx.scope, name)? {
            return Ok(value);
        }
        self.global
            .borrow()
            .properties
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::reference(format!("{name} is not defined")))
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr, ctx: Ctx) -> EvalResult<Value> {
        if op == UnaryOp::Typeof {
            if let ExprKind::Identifier(name) = &operand.kind {
                let unresolvable = matches!(self.env.resolve(ctx.scope, name), Resolved::Unresolvable)
                    && !self.global.borrow().properties.contains_key(name);
                if unresolvable {
                    return Ok(Value::str("undefined"));
                }
            }
        }
        let value = self.eval_expr(operand, ctx)?;
        Ok(match op {
            UnaryOp::Typeof => Value::str(value.type_of()),
            UnaryOp::Not => Value::Bool(!value.truthy()),
            UnaryOp::Neg => Value::Number(-value.to_number()),
            UnaryOp::Plus => Value::Number(value.to_number()),
        })
    }

    fn eval_update(&mut self, op: UpdateOp, prefix: bool, target: &Expr, ctx: Ctx) -> EvalResult<Value> {
        let place = self.resolve_place(target, ctx)?;
        let old = self.read_place(&place, ctx)?.to_number();
        let new = match op {
            UpdateOp::Increment => old + 1.0,
            UpdateOp::Decrement => old - 1.0,
        };
        self.write_place(place, Value::Number(new), ctx)?;
        Ok(Value::Number(if prefix { new } else { old }))
    }

    fn eval_assign(&mut self, op: AssignOp, target: &Expr, value: &Expr, ctx: Ctx) -> EvalResult<Value> {
        let place = self.resolve_place(target, ctx)?;
        let result = match op.binary_op() {
            None => self.eval_expr(value, ctx)?,
            Some(bin) => {
                let current = self.read_place(&place, ctx)?;
                let rhs = self.eval_expr(value, ctx)?;
                binary_op(bin, &current, &rhs)
            }
        };
        self.write_place(place, result.clone(), ctx)?;
        Ok(result)
    }

    fn resolve_place(&mut self, target: &Expr, ctx: Ctx) -> EvalResult<Place> {
        match &target.kind {
            ExprKind::Identifier(name) => Ok(Place::Binding(name.clone())),
            ExprKind::Member { object, property } => {
                let object = self.eval_expr(object, ctx)?;
                let key = self.property_key(property, ctx)?;
                Ok(Place::Property(object, key))
            }
            ExprKind::Paren(inner) => self.resolve_place(inner, ctx),
            _ => Err(EvalError::syntax("Invalid left-hand side in assignment")),
        }
    }

    fn read_place(&mut self, place: &Place, ctx: Ctx) -> EvalResult<Value> {
        match place {
            Place::Binding(name) => self.lookup(name, ctx),
            Place::Property(object, key) => self.get_property(object, key),
        }
    }

    fn write_place(&mut self, place: Place, value: Value, ctx: Ctx) -> EvalResult<()> {
        match place {
            Place::Binding(name) => self.assign_identifier(&name, value, ctx),
            Place::Property(object, key) => set_property(&object, key, value),
        }
    }

    /// Write a name. Undeclared names become global object properties in
    /// sloppy code and are a `ReferenceError` in strict code.
    fn assign_identifier(&mut self, name: &str, value: Value, ctx: Ctx) -> EvalResult<()> {
        if self.env.assign(ctx.scope, name, value.clone())? {
            return Ok(());
        }
        if READ_ONLY_GLOBALS.contains(&name) {
            return if ctx.strict {
                Err(EvalError::type_error(format!(
                    "Cannot assign to read only property '{name}' of object '#<Window>'"
                )))
            } else {
                Ok(())
            };
        }
        let mut global = self.global.borrow_mut();
        if ctx.strict && !global.properties.contains_key(name) {
            return Err(EvalError::reference(format!("{name} is not defined")));
        }
        global.properties.insert(name.to_string(), value);
        Ok(())
    }

    fn property_key(&mut self, property: &MemberProp, ctx: Ctx) -> EvalResult<String> {
        match property {
            MemberProp::Named(ident) => Ok(ident.name.clone()),
            MemberProp::Computed(expr) => {
                let key = self.eval_expr(expr, ctx)?;
                Ok(to_property_key(&key))
            }
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Properties
    // ══════════════════════════════════════════════════════════════════════

    fn get_property(&mut self, target: &Value, key: &str) -> EvalResult<Value> {
        match target {
            Value::Undefined | Value::Null => Err(EvalError::type_error(format!(
                "Cannot read properties of {} (reading '{key}')",
                target.to_js_string()
            ))),
            Value::String(s) => Ok(match key {
                "length" => Value::Number(s.encode_utf16().count() as f64),
                "hasOwnProperty" => self.builtin(Builtin::HasOwnProperty),
                _ => array_index(key)
                    .and_then(|i| s.chars().nth(i))
                    .map(|c| Value::String(c.to_string()))
                    .unwrap_or(Value::Undefined),
            }),
            Value::Bool(_) | Value::Number(_) => Ok(match key {
                "hasOwnProperty" => self.builtin(Builtin::HasOwnProperty),
                _ => Value::Undefined,
            }),
            Value::Object(obj) => self.get_object_property(obj, key),
        }
    }

    fn get_object_property(&mut self, obj: &ObjRef, key: &str) -> EvalResult<Value> {
        let method = {
            let object = obj.borrow();
            if let Some(value) = object.properties.get(key) {
                return Ok(value.clone());
            }
            match (&object.kind, key) {
                (ObjectKind::Array(items) | ObjectKind::Arguments(items), "length") => {
                    return Ok(Value::Number(items.len() as f64));
                }
                (ObjectKind::Array(items) | ObjectKind::Arguments(items), _)
                    if array_index(key).is_some() =>
                {
                    return Ok(array_index(key)
                        .and_then(|i| items.get(i).cloned())
                        .unwrap_or(Value::Undefined));
                }
                (ObjectKind::Array(_), "push") => Some(Builtin::ArrayPush),
                (ObjectKind::Function(f), "prototype") => {
                    return Ok(f
                        .prototype
                        .clone()
                        .map(Value::Object)
                        .unwrap_or(Value::Undefined));
                }
                (ObjectKind::Function(f), "name") => return Ok(Value::String(f.callable.name())),
                (ObjectKind::Function(f), "length") => {
                    return Ok(Value::Number(f.callable.arity() as f64));
                }
                (ObjectKind::Function(_), "bind") => Some(Builtin::FunctionBind),
                (ObjectKind::Function(_), "call") => Some(Builtin::FunctionCall),
                (ObjectKind::Function(_), "apply") => Some(Builtin::FunctionApply),
                (ObjectKind::Document { .. }, "addEventListener") => Some(Builtin::AddEventListener),
                (ObjectKind::Document { .. }, "dispatchEvent") => Some(Builtin::DispatchEvent),
                (_, "hasOwnProperty") => Some(Builtin::HasOwnProperty),
                _ => None,
            }
        };
        Ok(match method {
            Some(builtin) => self.builtin(builtin),
            None => Value::Undefined,
        })
    }

    // ══════════════════════════════════════════════════════════════════════
    // Functions
    // ══════════════════════════════════════════════════════════════════════

    /// Create a function object closing over `ctx.scope`.
    fn make_closure(&mut self, def: &Rc<FunctionDef>, ctx: Ctx) -> Value {
        self.env.capture(ctx.scope);
        let (callable, prototype) = if def.is_arrow {
            let callable = Callable::Arrow {
                def: Rc::clone(def),
                scope: ctx.scope,
                lexical_this: self.env.this_value(ctx.scope),
            };
            (callable, None)
        } else {
            let callable = Callable::Ordinary {
                def: Rc::clone(def),
                scope: ctx.scope,
            };
            (callable, Some(self.alloc(ObjectKind::Plain)))
        };
        Value::Object(self.alloc(ObjectKind::Function(FunctionObject {
            callable,
            prototype,
        })))
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr], ctx: Ctx) -> EvalResult<Value> {
        let (function, this) = match &callee.kind {
            ExprKind::Member { object, property } => {
                let object = self.eval_expr(object, ctx)?;
                let key = self.property_key(property, ctx)?;
                (self.get_property(&object, &key)?, object)
            }
            _ => (self.eval_expr(callee, ctx)?, Value::Undefined),
        };
        let args = self.eval_list(args, ctx)?;
        if !function.is_function() {
            return Err(EvalError::type_error(format!(
                "{} is not a function",
                describe(callee)
            )));
        }
        self.call(&function, this, args)
    }

    /// Call a function value with an explicit `this`.
    fn call(&mut self, function: &Value, this: Value, args: Vec<Value>) -> EvalResult<Value> {
        self.call_depth += 1;
        let result = if self.call_depth > self.config.max_call_depth {
            Err(EvalError::range("Maximum call stack size exceeded"))
        } else {
            self.call_inner(function, this, args)
        };
        self.call_depth -= 1;
        result
    }

    fn call_inner(&mut self, function: &Value, this: Value, args: Vec<Value>) -> EvalResult<Value> {
        self.tick()?;
        let callable = callable_of(function)
            .ok_or_else(|| EvalError::type_error(format!("{} is not a function", function.type_of())))?;
        match callable {
            Callable::Ordinary { def, scope } => {
                let this = if !def.strict && this.is_nullish() {
                    Value::Object(Rc::clone(&self.global))
                } else {
                    this
                };
                self.invoke(&def, scope, this, args)
            }
            Callable::Arrow {
                def,
                scope,
                lexical_this,
            } => self.invoke(&def, scope, lexical_this, args),
            Callable::Bound {
                target,
                this: bound_this,
                args: bound_args,
            } => {
                let mut all = bound_args;
                all.extend(args);
                self.call(&Value::Object(target), bound_this, all)
            }
            Callable::Builtin(builtin) => self.call_builtin(builtin, this, args),
        }
    }

    /// Run a closure body in a fresh function scope.
    ///
    /// Parameters start in their dead zone and are initialised left to
    /// right, so a default may refer to earlier parameters but not later
    /// ones. `arguments` holds exactly what the caller passed.
    fn invoke(&mut self, def: &FunctionDef, parent: ScopeId, this: Value, args: Vec<Value>) -> EvalResult<Value> {
        trace!("invoking {}", def.name.as_deref().unwrap_or("(anonymous)"));
        let scope = self.env.push(parent, ScopeKind::Function);
        self.env.set_this(scope, this);
        let ctx = Ctx {
            scope,
            strict: def.strict,
        };

        if !def.is_arrow {
            let arguments = self.alloc(ObjectKind::Arguments(args.clone()));
            self.env.declare(
                scope,
                "arguments",
                BindingKind::Var,
                Some(Value::Object(arguments)),
            );
        }
        for param in &def.params {
            self.env
                .declare(scope, &param.name.name, BindingKind::Param, None);
        }
        for (i, param) in def.params.iter().enumerate() {
            let arg = args.get(i).cloned().unwrap_or(Value::Undefined);
            let value = match (&param.default, arg) {
                (Some(default), Value::Undefined) => self.eval_expr(default, ctx)?,
                (_, arg) => arg,
            };
            self.env.initialize(scope, &param.name.name, value)?;
        }

        let result = match &def.body {
            FunctionBody::Expr(expr) => self.eval_expr(expr, ctx)?,
            FunctionBody::Block(block) => {
                self.hoist_vars(&block.stmts, scope);
                self.instantiate_block(&block.stmts, ctx)?;
                match self.exec_stmts(&block.stmts, ctx)? {
                    Flow::Return(value) => value,
                    _ => Value::Undefined,
                }
            }
        };
        self.env.release(scope);
        Ok(result)
    }

    /// `new F(args)`
    fn construct(&mut self, constructor: &Value, args: Vec<Value>, desc: &str) -> EvalResult<Value> {
        let not_constructor = || EvalError::type_error(format!("{desc} is not a constructor"));
        let callable = callable_of(constructor).ok_or_else(not_constructor)?;
        match callable {
            Callable::Ordinary { .. } => {
                let instance = self.alloc(ObjectKind::Plain);
                let result = self.call(constructor, Value::Object(Rc::clone(&instance)), args)?;
                Ok(match result {
                    Value::Object(_) => result,
                    _ => Value::Object(instance),
                })
            }
            Callable::Bound {
                target,
                args: bound_args,
                ..
            } => {
                let mut all = bound_args;
                all.extend(args);
                self.construct(&Value::Object(target), all, desc)
            }
            Callable::Builtin(Builtin::FunctionCtor) => {
                self.call_builtin(Builtin::FunctionCtor, Value::Undefined, args)
            }
            Callable::Builtin(Builtin::EventCtor) => self.construct_event(&args),
            Callable::Arrow { .. } | Callable::Builtin(_) => Err(not_constructor()),
        }
    }

    fn construct_event(&mut self, args: &[Value]) -> EvalResult<Value> {
        let event_type = args.first().ok_or_else(|| {
            EvalError::type_error(
                "Failed to construct 'Event': 1 argument required, but only 0 present.",
            )
        })?;
        let event = self.alloc(ObjectKind::Event);
        event
            .borrow_mut()
            .properties
            .insert("type".into(), Value::String(event_type.to_js_string()));
        Ok(Value::Object(event))
    }

    // ══════════════════════════════════════════════════════════════════════
    // Built-ins
    // ══════════════════════════════════════════════════════════════════════

    fn call_builtin(&mut self, builtin: Builtin, this: Value, args: Vec<Value>) -> EvalResult<Value> {
        match builtin {
            Builtin::ConsoleLog => {
                let line = format_log_line(&args);
                trace!("console.log: {line}");
                self.console.write_line(line);
                Ok(Value::Undefined)
            }
            Builtin::ArrayPush => {
                let Some(obj) = this.as_object() else {
                    return Err(EvalError::type_error("Array.prototype.push called on non-object"));
                };
                let mut object = obj.borrow_mut();
                match &mut object.kind {
                    ObjectKind::Array(items) => {
                        items.extend(args);
                        Ok(Value::Number(items.len() as f64))
                    }
                    _ => Err(EvalError::type_error("Array.prototype.push called on non-array")),
                }
            }
            Builtin::HasOwnProperty => {
                if this.is_nullish() {
                    return Err(EvalError::type_error(
                        "Cannot convert undefined or null to object",
                    ));
                }
                let key = args.first().map(to_property_key).unwrap_or_else(|| "undefined".into());
                Ok(Value::Bool(has_own_property(&this, &key)))
            }
            Builtin::FunctionBind => {
                let Some(target) = this.as_object().filter(|_| this.is_function()).cloned() else {
                    return Err(EvalError::type_error("Bind must be called on a function"));
                };
                let mut args = args.into_iter();
                let bound_this = args.next().unwrap_or(Value::Undefined);
                let bound = self.alloc(ObjectKind::Function(FunctionObject {
                    callable: Callable::Bound {
                        target,
                        this: bound_this,
                        args: args.collect(),
                    },
                    prototype: None,
                }));
                Ok(Value::Object(bound))
            }
            Builtin::FunctionCall => {
                let mut args = args.into_iter();
                let call_this = args.next().unwrap_or(Value::Undefined);
                self.call_method_target(&this, "call")?;
                self.call(&this, call_this, args.collect())
            }
            Builtin::FunctionApply => {
                let mut args = args.into_iter();
                let call_this = args.next().unwrap_or(Value::Undefined);
                let list = match args.next() {
                    None | Some(Value::Undefined) | Some(Value::Null) => Vec::new(),
                    Some(Value::Object(obj)) => array_like_items(&obj),
                    Some(_) => {
                        return Err(EvalError::type_error(
                            "CreateListFromArrayLike called on non-object",
                        ))
                    }
                };
                self.call_method_target(&this, "apply")?;
                self.call(&this, call_this, list)
            }
            Builtin::AddEventListener => {
                let event_type = args.first().map(Value::to_js_string).unwrap_or_default();
                let listener = args.get(1).cloned().unwrap_or(Value::Undefined);
                if let Some(obj) = this.as_object() {
                    let mut object = obj.borrow_mut();
                    if let ObjectKind::Document { listeners } = &mut object.kind {
                        if listener.is_function() {
                            listeners.push((event_type, listener));
                        }
                    }
                }
                Ok(Value::Undefined)
            }
            Builtin::DispatchEvent => self.dispatch_event(this, args),
            Builtin::FunctionCtor => self.function_from_strings(&args),
            Builtin::EventCtor => Err(EvalError::type_error(
                "Failed to construct 'Event': Please use the 'new' operator, this DOM object constructor cannot be called as a function.",
            )),
        }
    }

    fn call_method_target(&self, this: &Value, method: &str) -> EvalResult<()> {
        if this.is_function() {
            Ok(())
        } else {
            Err(EvalError::type_error(format!(
                "Function.prototype.{method} called on non-function"
            )))
        }
    }

    /// Invoke every listener registered for the event's type, in
    /// registration order, with `this` set to the target.
    fn dispatch_event(&mut self, this: Value, args: Vec<Value>) -> EvalResult<Value> {
        let event = args.into_iter().next().unwrap_or(Value::Undefined);
        let event_type = match &event {
            Value::Object(obj) if matches!(obj.borrow().kind, ObjectKind::Event) => obj
                .borrow()
                .properties
                .get("type")
                .map(Value::to_js_string)
                .unwrap_or_default(),
            _ => {
                return Err(EvalError::type_error(
                    "Failed to execute 'dispatchEvent' on 'EventTarget': parameter 1 is not of type 'Event'.",
                ))
            }
        };
        let listeners = match this.as_object() {
            Some(obj) => listeners_for(obj, &event_type),
            None => Vec::new(),
        };
        debug!("dispatching '{event_type}' to {} listener(s)", listeners.len());
        for listener in listeners {
            self.call(&listener, this.clone(), vec![event.clone()])?;
        }
        Ok(Value::Bool(true))
    }

    /// `new Function(p1, ..., body)`: sloppy code closing over the global
    /// scope only.
    fn function_from_strings(&mut self, args: &[Value]) -> EvalResult<Value> {
        let mut parts: Vec<String> = args.iter().map(Value::to_js_string).collect();
        let body = parts.pop().unwrap_or_default();
        let params = parts.join(",");
        let def = parse_function_parts(&params, &body).map_err(|errors| {
            EvalError::syntax(
                errors
                    .first()
                    .map(|e| e.message.clone())
                    .unwrap_or_else(|| "Invalid function".into()),
            )
        })?;
        let ctx = Ctx {
            scope: self.env.global(),
            strict: false,
        };
        Ok(self.make_closure(&def, ctx))
    }
}

impl Drop for Evaluator<'_> {
    // Closures, `window` and user objects can form Rc cycles; empty every
    // object this run allocated so they are freed.
    fn drop(&mut self) {
        self.env.clear();
        self.builtins.clear();
        for weak in self.heap.drain(..) {
            if let Some(obj) = weak.upgrade() {
                if let Ok(mut object) = obj.try_borrow_mut() {
                    object.properties.clear();
                    object.kind = ObjectKind::Plain;
                }
            }
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn track(heap: &mut Vec<Weak<RefCell<Object>>>, kind: ObjectKind) -> ObjRef {
    let obj = Rc::new(RefCell::new(Object::new(kind)));
    heap.push(Rc::downgrade(&obj));
    obj
}

fn callable_of(value: &Value) -> Option<Callable> {
    let obj = value.as_object()?;
    let object = obj.borrow();
    match &object.kind {
        ObjectKind::Function(f) => Some(f.callable.clone()),
        _ => None,
    }
}

fn array_like_items(obj: &ObjRef) -> Vec<Value> {
    let object = obj.borrow();
    match &object.kind {
        ObjectKind::Array(items) | ObjectKind::Arguments(items) => items.clone(),
        _ => Vec::new(),
    }
}

fn listeners_for(obj: &ObjRef, event_type: &str) -> Vec<Value> {
    let object = obj.borrow();
    match &object.kind {
        ObjectKind::Document { listeners } => listeners
            .iter()
            .filter(|(t, _)| t == event_type)
            .map(|(_, listener)| listener.clone())
            .collect(),
        _ => Vec::new(),
    }
}

fn has_own_property(target: &Value, key: &str) -> bool {
    match target {
        Value::String(s) => key == "length" || array_index(key).is_some_and(|i| i < s.chars().count()),
        Value::Object(obj) => {
            let object = obj.borrow();
            if object.properties.contains_key(key) {
                return true;
            }
            match &object.kind {
                ObjectKind::Array(items) | ObjectKind::Arguments(items) => {
                    key == "length" || array_index(key).is_some_and(|i| i < items.len())
                }
                ObjectKind::Function(f) => {
                    matches!(key, "name" | "length")
                        || (key == "prototype" && f.prototype.is_some())
                }
                _ => false,
            }
        }
        _ => false,
    }
}

fn set_property(target: &Value, key: String, value: Value) -> EvalResult<()> {
    let obj = match target {
        Value::Undefined | Value::Null => {
            return Err(EvalError::type_error(format!(
                "Cannot set properties of {} (setting '{key}')",
                target.to_js_string()
            )))
        }
        Value::Object(obj) => obj,
        _ => return Ok(()),
    };
    let mut object = obj.borrow_mut();
    match &mut object.kind {
        ObjectKind::Array(items) | ObjectKind::Arguments(items) => {
            if let Some(index) = array_index(&key).filter(|i| *i <= MAX_DENSE_INDEX) {
                if index >= items.len() {
                    items.resize(index + 1, Value::Undefined);
                }
                items[index] = value;
                return Ok(());
            }
            if key == "length" {
                let len = value.to_number();
                if len < 0.0 || len.fract() != 0.0 || len > MAX_DENSE_INDEX as f64 {
                    return Err(EvalError::range("Invalid array length"));
                }
                items.resize(len as usize, Value::Undefined);
                return Ok(());
            }
        }
        ObjectKind::Function(f) if key == "prototype" => {
            f.prototype = value.as_object().cloned();
            return Ok(());
        }
        _ => {}
    }
    object.properties.insert(key, value);
    Ok(())
}

/// Source-like text for a callee, used in `is not a function` messages.
fn describe(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Identifier(name) => name.clone(),
        ExprKind::This => "this".into(),
        ExprKind::Member {
            object,
            property: MemberProp::Named(name),
        } => format!("{}.{}", describe(object), name.name),
        ExprKind::Member { object, .. } => format!("{}[...]", describe(object)),
        ExprKind::Call { callee, .. } => format!("{}(...)", describe(callee)),
        ExprKind::Paren(inner) => describe(inner),
        _ => "expression".into(),
    }
}

fn to_primitive(value: &Value) -> Value {
    match value {
        Value::Object(_) => Value::String(value.to_js_string()),
        other => other.clone(),
    }
}

fn binary_op(op: BinOp, left: &Value, right: &Value) -> Value {
    match op {
        BinOp::Add => {
            let (left, right) = (to_primitive(left), to_primitive(right));
            if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
                Value::String(left.to_js_string() + &right.to_js_string())
            } else {
                Value::Number(left.to_number() + right.to_number())
            }
        }
        BinOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinOp::Mod => Value::Number(left.to_number() % right.to_number()),
        BinOp::Less => Value::Bool(compare(left, right).is_some_and(|o| o.is_lt())),
        BinOp::Greater => Value::Bool(compare(left, right).is_some_and(|o| o.is_gt())),
        BinOp::LessEq => Value::Bool(compare(left, right).is_some_and(|o| o.is_le())),
        BinOp::GreaterEq => Value::Bool(compare(left, right).is_some_and(|o| o.is_ge())),
        BinOp::LooseEq => Value::Bool(left.loose_equals(right)),
        BinOp::LooseNotEq => Value::Bool(!left.loose_equals(right)),
        BinOp::StrictEq => Value::Bool(left.strict_equals(right)),
        BinOp::StrictNotEq => Value::Bool(!left.strict_equals(right)),
    }
}

/// Relational comparison; `None` when either side is NaN.
fn compare(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    match (to_primitive(left), to_primitive(right)) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(&b)),
        (a, b) => a.to_number().partial_cmp(&b.to_number()),
    }
}
