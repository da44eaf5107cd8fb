use std::{collections::BTreeMap, sync::Arc};

use common::config::ScriptLimits;
use serde_json::Value as Json;

use super::{
    ast::{
        AssignOp, BinaryOp, DeclKind, Element, Expr, FunctionBody, FunctionDef, LogicalOp,
        Property, PropertyKey, Stmt, TemplateSegment, UnaryOp,
    },
    value::{format_number, parse_number, ArrayId, Binding, Closure, Heap, ScopeId, Value},
};
use crate::error::{runtime, ScriptError, ScriptResult};

// 每个数组元素 / 对象属性按一个 Value 计
pub(super) const CELL: usize = std::mem::size_of::<Value>();

enum Flow {
    Normal,
    Return(Value),
}

/// One evaluation run. Holds every value the run allocates; dropping the
/// interpreter frees them all.
pub struct Interpreter<'a> {
    pub(super) heap: Heap,
    pub(super) limits: &'a ScriptLimits,
    pub(super) globals: ScopeId,
    steps: u64,
    call_depth: usize,
    allocated: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(limits: &'a ScriptLimits) -> Self {
        let mut heap = Heap::default();
        let globals = heap.alloc_scope(None);
        let mut interpreter = Self {
            heap,
            limits,
            globals,
            steps: 0,
            call_depth: 0,
            allocated: 0,
        };
        interpreter.install_globals();
        interpreter
    }

    /// Calls `def` as a top-level function with JSON arguments and converts
    /// the result back to JSON. `undefined` comes back as `null`.
    pub fn run(&mut self, def: Arc<FunctionDef>, args: &[Json]) -> ScriptResult<Json> {
        let function = self.heap.alloc_function(def, self.globals);
        let args = args
            .iter()
            .map(|arg| self.from_json(arg))
            .collect::<ScriptResult<_>>()?;
        let result = self.call(&function, args, "configuration function")?;
        self.to_json(&result)
    }

    pub(super) fn tick(&mut self) -> ScriptResult<()> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            return Err(ScriptError::Limit(format!(
                "step budget of {} exhausted",
                self.limits.max_steps
            )));
        }
        Ok(())
    }

    pub(super) fn check_len(&self, len: usize) -> ScriptResult<()> {
        if len > self.limits.max_value_len {
            return Err(ScriptError::Limit(format!(
                "value longer than {}",
                self.limits.max_value_len
            )));
        }
        Ok(())
    }

    /// Counts `bytes` against the run's memory budget.
    pub(super) fn charge(&mut self, bytes: usize) -> ScriptResult<()> {
        self.allocated = self.allocated.saturating_add(bytes);
        if self.allocated > self.limits.max_memory {
            return Err(ScriptError::Limit(format!(
                "memory budget of {} bytes exhausted",
                self.limits.max_memory
            )));
        }
        Ok(())
    }

    pub(super) fn new_array(&mut self, items: Vec<Value>) -> ScriptResult<Value> {
        self.check_len(items.len())?;
        self.charge(CELL * (items.len() + 1))?;
        Ok(self.heap.alloc_array(items))
    }

    pub(super) fn new_object(&mut self, entries: BTreeMap<String, Value>) -> ScriptResult<Value> {
        self.check_len(entries.len())?;
        let bytes = entries.keys().map(|key| key.len() + CELL).sum::<usize>();
        self.charge(bytes + CELL)?;
        Ok(self.heap.alloc_object(entries))
    }

    pub(super) fn new_string(&mut self, s: String) -> ScriptResult<Value> {
        self.check_len(s.len())?;
        self.charge(s.len())?;
        Ok(Value::String(s.into()))
    }

    pub(super) fn define_global(&mut self, name: &str, value: Value) {
        self.heap.scope_mut(self.globals).vars.insert(
            name.to_owned(),
            Binding {
                value,
                mutable: false,
            },
        );
    }

    fn declare(
        &mut self,
        scope: ScopeId,
        name: &str,
        value: Value,
        kind: DeclKind,
    ) -> ScriptResult<()> {
        let frame = self.heap.scope_mut(scope);
        if kind != DeclKind::Var && frame.vars.contains_key(name) {
            return runtime(format!("Identifier '{}' has already been declared", name));
        }
        frame.vars.insert(
            name.to_owned(),
            Binding {
                value,
                mutable: kind != DeclKind::Const,
            },
        );
        Ok(())
    }

    fn lookup(&self, scope: ScopeId, name: &str) -> Option<Value> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let frame = self.heap.scope(id);
            if let Some(binding) = frame.vars.get(name) {
                return Some(binding.value.clone());
            }
            current = frame.parent;
        }
        None
    }

    fn assign_var(&mut self, scope: ScopeId, name: &str, value: Value) -> ScriptResult<()> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let frame = self.heap.scope_mut(id);
            if let Some(binding) = frame.vars.get_mut(name) {
                if !binding.mutable {
                    return runtime("Assignment to constant variable.");
                }
                binding.value = value;
                return Ok(());
            }
            current = frame.parent;
        }
        runtime(format!("{} is not defined", name))
    }

    pub(super) fn call(
        &mut self,
        target: &Value,
        args: Vec<Value>,
        name: &str,
    ) -> ScriptResult<Value> {
        match target {
            Value::Function(id) => {
                let closure = self.heap.function(*id);
                if self.call_depth >= self.limits.max_call_depth {
                    return Err(ScriptError::Limit(format!(
                        "call depth exceeds {}",
                        self.limits.max_call_depth
                    )));
                }
                self.call_depth += 1;
                let result = self.call_closure(&closure, args);
                self.call_depth -= 1;
                result
            }
            Value::Builtin(builtin) => self.call_builtin(*builtin, args),
            _ => runtime(format!("{} is not a function", name)),
        }
    }

    fn call_closure(&mut self, closure: &Closure, args: Vec<Value>) -> ScriptResult<Value> {
        let scope = self.heap.alloc_scope(Some(closure.scope));
        let mut args = args.into_iter();
        for param in &closure.def.params {
            let value = args.next().unwrap_or(Value::Undefined);
            self.declare(scope, param, value, DeclKind::Var)?;
        }
        match &closure.def.body {
            FunctionBody::Expr(expr) => self.eval(expr, scope),
            FunctionBody::Block(stmts) => match self.exec_block(stmts, scope)? {
                Flow::Return(value) => Ok(value),
                Flow::Normal => Ok(Value::Undefined),
            },
        }
    }

    fn exec_block(&mut self, stmts: &[Stmt], scope: ScopeId) -> ScriptResult<Flow> {
        for stmt in stmts {
            if let Flow::Return(value) = self.exec(stmt, scope)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt, scope: ScopeId) -> ScriptResult<Flow> {
        self.tick()?;
        match stmt {
            Stmt::Declare { kind, decls } => {
                for (name, init) in decls {
                    let value = match init {
                        Some(init) => self.eval(init, scope)?,
                        None => Value::Undefined,
                    };
                    self.declare(scope, name, value, *kind)?;
                }
                Ok(Flow::Normal)
            }
            Stmt::Expr(expr) => {
                self.eval(expr, scope)?;
                Ok(Flow::Normal)
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    self.exec(consequent, scope)
                } else if let Some(alternate) = alternate {
                    self.exec(alternate, scope)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::ForOf {
                kind,
                name,
                iterable,
                body,
            } => {
                let iterable = self.eval(iterable, scope)?;
                for item in self.iterate(&iterable)? {
                    self.tick()?;
                    let inner = self.heap.alloc_scope(Some(scope));
                    self.declare(inner, name, item, *kind)?;
                    if let Flow::Return(value) = self.exec(body, inner)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Block(stmts) => {
                let inner = self.heap.alloc_scope(Some(scope));
                self.exec_block(stmts, inner)
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(value) => self.eval(value, scope)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Throw(value) => {
                let value = self.eval(value, scope)?;
                runtime(self.error_message(&value))
            }
            Stmt::Empty => Ok(Flow::Normal),
        }
    }

    fn error_message(&self, value: &Value) -> String {
        if let Value::Object(id) = value {
            if let Some(message) = self.heap.object(*id).get("message") {
                return self.to_display(message);
            }
        }
        self.to_display(value)
    }

    /// Snapshot of the items a `for...of` or spread walks over.
    pub(super) fn iterate(&mut self, value: &Value) -> ScriptResult<Vec<Value>> {
        let items: Vec<Value> = match value {
            Value::Array(id) => self.heap.array(*id).clone(),
            Value::String(s) => s.chars().map(|c| Value::String(c.to_string().into())).collect(),
            other => return runtime(format!("{} is not iterable", self.to_display(other))),
        };
        self.charge(CELL * items.len())?;
        Ok(items)
    }

    pub(super) fn eval(&mut self, expr: &Expr, scope: ScopeId) -> ScriptResult<Value> {
        self.tick()?;
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::String(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Ident(name) => match self.lookup(scope, name) {
                Some(value) => Ok(value),
                None => runtime(format!("{} is not defined", name)),
            },
            Expr::Template(segments) => {
                let mut s = String::new();
                for segment in segments {
                    let part = match segment {
                        TemplateSegment::Text(text) => text.clone(),
                        TemplateSegment::Expr(expr) => {
                            let value = self.eval(expr, scope)?;
                            self.display(&value)?
                        }
                    };
                    self.check_len(s.len() + part.len())?;
                    s.push_str(&part);
                }
                self.new_string(s)
            }
            Expr::Array(elements) => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    match element {
                        Element::Item(expr) => items.push(self.eval(expr, scope)?),
                        Element::Spread(expr) => {
                            let value = self.eval(expr, scope)?;
                            items.extend(self.iterate(&value)?);
                        }
                    }
                    self.check_len(items.len())?;
                }
                self.new_array(items)
            }
            Expr::Object(properties) => self.eval_object(properties, scope),
            Expr::Member { .. } | Expr::Index { .. } | Expr::Call { .. } => {
                Ok(self.eval_chain(expr, scope)?.unwrap_or(Value::Undefined))
            }
            Expr::Unary { op, operand } => self.eval_unary(*op, operand, scope),
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                self.binary(*op, &left, &right)
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left, scope)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.truthy(),
                    LogicalOp::Or => left.truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(right, scope)
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            Expr::Assign { op, target, value } => self.eval_assign(*op, target, value, scope),
            Expr::Function(def) => Ok(self.heap.alloc_function(def.clone(), scope)),
        }
    }

    fn eval_object(&mut self, properties: &[Property], scope: ScopeId) -> ScriptResult<Value> {
        let mut entries = BTreeMap::new();
        for property in properties {
            match property {
                Property::Init { key, value } => {
                    let key = match key {
                        PropertyKey::Named(name) => name.clone(),
                        PropertyKey::Computed(expr) => {
                            let key = self.eval(expr, scope)?;
                            self.to_key(&key)
                        }
                    };
                    let value = self.eval(value, scope)?;
                    entries.insert(key, value);
                }
                Property::Spread(expr) => match self.eval(expr, scope)? {
                    Value::Object(id) => {
                        entries.extend(self.heap.object(id).clone());
                    }
                    Value::Array(id) => {
                        for (i, item) in self.heap.array(id).iter().enumerate() {
                            entries.insert(i.to_string(), item.clone());
                        }
                    }
                    Value::String(s) => {
                        for (i, c) in s.chars().enumerate() {
                            entries.insert(i.to_string(), Value::String(c.to_string().into()));
                        }
                    }
                    _ => {}
                },
            }
            self.check_len(entries.len())?;
        }
        self.new_object(entries)
    }

    // None 表示可选链已短路
    fn eval_chain(&mut self, expr: &Expr, scope: ScopeId) -> ScriptResult<Option<Value>> {
        match expr {
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let Some(object) = self.eval_chain(object, scope)? else {
                    return Ok(None);
                };
                if *optional && object.is_nullish() {
                    return Ok(None);
                }
                self.get_property(&object, property).map(Some)
            }
            Expr::Index {
                object,
                index,
                optional,
            } => {
                let Some(object) = self.eval_chain(object, scope)? else {
                    return Ok(None);
                };
                if *optional && object.is_nullish() {
                    return Ok(None);
                }
                let key = self.eval(index, scope)?;
                let key = self.to_key(&key);
                self.get_property(&object, &key).map(Some)
            }
            Expr::Call {
                callee,
                args,
                optional,
            } => self.eval_call(callee, args, *optional, scope),
            _ => self.eval(expr, scope).map(Some),
        }
    }

    fn eval_call(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        optional: bool,
        scope: ScopeId,
    ) -> ScriptResult<Option<Value>> {
        self.tick()?;
        let (receiver, target) = match callee {
            Expr::Member {
                object,
                property,
                optional: member_optional,
            } => {
                let Some(object) = self.eval_chain(object, scope)? else {
                    return Ok(None);
                };
                if *member_optional && object.is_nullish() {
                    return Ok(None);
                }
                let target = self.get_property(&object, property)?;
                (Some((object, property.clone())), target)
            }
            Expr::Index {
                object,
                index,
                optional: index_optional,
            } => {
                let Some(object) = self.eval_chain(object, scope)? else {
                    return Ok(None);
                };
                if *index_optional && object.is_nullish() {
                    return Ok(None);
                }
                let key = self.eval(index, scope)?;
                let key = self.to_key(&key);
                let target = self.get_property(&object, &key)?;
                (Some((object, key)), target)
            }
            _ => match self.eval_chain(callee, scope)? {
                Some(target) => (None, target),
                None => return Ok(None),
            },
        };

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, scope)?);
        }

        if let Some((object, method)) = &receiver {
            if let Some(result) = self.call_method(object, method, &values)? {
                return Ok(Some(result));
            }
        }
        if optional && target.is_nullish() {
            return Ok(None);
        }
        self.call(&target, values, &callee_name(callee)).map(Some)
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr, scope: ScopeId) -> ScriptResult<Value> {
        if let (UnaryOp::Typeof, Expr::Ident(name)) = (op, operand) {
            if self.lookup(scope, name).is_none() {
                return Ok(Value::String("undefined".into()));
            }
        }
        let value = self.eval(operand, scope)?;
        Ok(match op {
            UnaryOp::Not => Value::Bool(!value.truthy()),
            UnaryOp::Neg => Value::Number(-self.to_number(&value)),
            UnaryOp::Plus => Value::Number(self.to_number(&value)),
            UnaryOp::Typeof => Value::String(value.type_of().into()),
        })
    }

    fn eval_assign(
        &mut self,
        op: AssignOp,
        target: &Expr,
        value: &Expr,
        scope: ScopeId,
    ) -> ScriptResult<Value> {
        match target {
            Expr::Ident(name) => {
                let value = match op {
                    AssignOp::Assign => self.eval(value, scope)?,
                    _ => {
                        let Some(current) = self.lookup(scope, name) else {
                            return runtime(format!("{} is not defined", name));
                        };
                        let rhs = self.eval(value, scope)?;
                        self.compound(op, &current, &rhs)?
                    }
                };
                self.assign_var(scope, name, value.clone())?;
                Ok(value)
            }
            Expr::Member {
                object, property, ..
            } => {
                let object = self.eval(object, scope)?;
                self.assign_property(op, object, property.clone(), value, scope)
            }
            Expr::Index { object, index, .. } => {
                let object = self.eval(object, scope)?;
                let key = self.eval(index, scope)?;
                let key = self.to_key(&key);
                self.assign_property(op, object, key, value, scope)
            }
            _ => runtime("Invalid left-hand side in assignment"),
        }
    }

    fn assign_property(
        &mut self,
        op: AssignOp,
        object: Value,
        key: String,
        value: &Expr,
        scope: ScopeId,
    ) -> ScriptResult<Value> {
        let value = match op {
            AssignOp::Assign => self.eval(value, scope)?,
            _ => {
                let current = self.get_property(&object, &key)?;
                let rhs = self.eval(value, scope)?;
                self.compound(op, &current, &rhs)?
            }
        };
        self.set_property(&object, key, value.clone())?;
        Ok(value)
    }

    fn compound(&mut self, op: AssignOp, current: &Value, rhs: &Value) -> ScriptResult<Value> {
        match op {
            AssignOp::Assign => Ok(rhs.clone()),
            AssignOp::Add => self.binary(BinaryOp::Add, current, rhs),
            AssignOp::Sub => self.binary(BinaryOp::Sub, current, rhs),
        }
    }

    pub(super) fn get_property(&self, object: &Value, key: &str) -> ScriptResult<Value> {
        match object {
            Value::Undefined | Value::Null => runtime(format!(
                "Cannot read properties of {} (reading '{}')",
                self.to_display(object),
                key
            )),
            Value::String(s) => Ok(if key == "length" {
                Value::Number(s.chars().count() as f64)
            } else if let Ok(i) = key.parse::<usize>() {
                s.chars()
                    .nth(i)
                    .map(|c| Value::String(c.to_string().into()))
                    .unwrap_or(Value::Undefined)
            } else {
                Value::Undefined
            }),
            Value::Array(id) => {
                let items = self.heap.array(*id);
                Ok(if key == "length" {
                    Value::Number(items.len() as f64)
                } else if let Ok(i) = key.parse::<usize>() {
                    items.get(i).cloned().unwrap_or(Value::Undefined)
                } else {
                    Value::Undefined
                })
            }
            Value::Object(id) => Ok(self
                .heap
                .object(*id)
                .get(key)
                .cloned()
                .unwrap_or(Value::Undefined)),
            _ => Ok(Value::Undefined),
        }
    }

    fn set_property(&mut self, object: &Value, key: String, value: Value) -> ScriptResult<()> {
        match object {
            Value::Object(id) => {
                if !self.heap.object(*id).contains_key(&key) {
                    self.check_len(self.heap.object(*id).len() + 1)?;
                    self.charge(key.len() + CELL)?;
                }
                self.heap.object_mut(*id).insert(key, value);
                Ok(())
            }
            Value::Array(id) => {
                let Ok(i) = key.parse::<usize>() else {
                    return runtime(format!("Cannot assign to property '{}' of an array", key));
                };
                self.check_len(i + 1)?;
                let len = self.heap.array(*id).len();
                if i >= len {
                    self.charge(CELL * (i + 1 - len))?;
                }
                let items = self.heap.array_mut(*id);
                if i >= items.len() {
                    items.resize(i + 1, Value::Undefined);
                }
                items[i] = value;
                Ok(())
            }
            Value::Undefined | Value::Null => runtime(format!(
                "Cannot set properties of {} (setting '{}')",
                self.to_display(object),
                key
            )),
            _ => Ok(()),
        }
    }

    fn binary(&mut self, op: BinaryOp, left: &Value, right: &Value) -> ScriptResult<Value> {
        let value = match op {
            BinaryOp::Add => {
                let stringy = |v: &Value| {
                    matches!(v, Value::String(_) | Value::Array(_) | Value::Object(_))
                };
                if stringy(left) || stringy(right) {
                    let mut s = self.display(left)?;
                    let right = self.display(right)?;
                    self.check_len(s.len() + right.len())?;
                    s.push_str(&right);
                    return self.new_string(s);
                } else {
                    Value::Number(self.to_number(left) + self.to_number(right))
                }
            }
            BinaryOp::Sub => Value::Number(self.to_number(left) - self.to_number(right)),
            BinaryOp::Mul => Value::Number(self.to_number(left) * self.to_number(right)),
            BinaryOp::Div => Value::Number(self.to_number(left) / self.to_number(right)),
            BinaryOp::Rem => Value::Number(self.to_number(left) % self.to_number(right)),
            BinaryOp::Eq => Value::Bool(self.loose_eq(left, right)),
            BinaryOp::Ne => Value::Bool(!self.loose_eq(left, right)),
            BinaryOp::StrictEq => Value::Bool(left.strict_eq(right)),
            BinaryOp::StrictNe => Value::Bool(!left.strict_eq(right)),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                Value::Bool(self.compare(op, left, right))
            }
        };
        Ok(value)
    }

    fn compare(&self, op: BinaryOp, left: &Value, right: &Value) -> bool {
        let ordering = match (left, right) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => self.to_number(left).partial_cmp(&self.to_number(right)),
        };
        let Some(ordering) = ordering else {
            return false;
        };
        match op {
            BinaryOp::Lt => ordering.is_lt(),
            BinaryOp::Le => ordering.is_le(),
            BinaryOp::Gt => ordering.is_gt(),
            _ => ordering.is_ge(),
        }
    }

    fn loose_eq(&self, left: &Value, right: &Value) -> bool {
        if std::mem::discriminant(left) == std::mem::discriminant(right) {
            return left.strict_eq(right);
        }
        match (left, right) {
            (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
            (Value::Bool(b), other) | (other, Value::Bool(b)) => {
                self.loose_eq(&Value::Number(if *b { 1.0 } else { 0.0 }), other)
            }
            (Value::Number(_) | Value::String(_), Value::Number(_) | Value::String(_)) => {
                self.to_number(left) == self.to_number(right)
            }
            (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => {
                let (compound, primitive) = if matches!(left, Value::Array(_) | Value::Object(_)) {
                    (left, right)
                } else {
                    (right, left)
                };
                matches!(primitive, Value::Number(_) | Value::String(_))
                    && self.loose_eq(&Value::String(self.to_display(compound).into()), primitive)
            }
            _ => false,
        }
    }

    pub(super) fn to_number(&self, value: &Value) -> f64 {
        match value {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => parse_number(s),
            Value::Array(id) => match self.heap.array(*id).as_slice() {
                [] => 0.0,
                [single] => self.to_number(single),
                _ => f64::NAN,
            },
            Value::Object(_) | Value::Function(_) | Value::Builtin(_) => f64::NAN,
        }
    }

    pub(super) fn to_key(&self, value: &Value) -> String {
        match value {
            Value::String(s) => s.to_string(),
            other => self.to_display(other),
        }
    }

    /// Display form, cut short once it would outgrow `max_value_len`. For
    /// messages and keys; values use [`Interpreter::display`].
    pub(super) fn to_display(&self, value: &Value) -> String {
        let mut out = Render::new(self.limits.max_value_len);
        self.render(value, 0, &mut out);
        out.text
    }

    pub(super) fn display(&self, value: &Value) -> ScriptResult<String> {
        let mut out = Render::new(self.limits.max_value_len);
        self.render(value, 0, &mut out);
        out.finish(self.limits.max_value_len)
    }

    /// `Array.prototype.join`, written into the same bounded buffer.
    pub(super) fn join(&self, id: ArrayId, separator: &str) -> ScriptResult<String> {
        let mut out = Render::new(self.limits.max_value_len);
        self.render_items(id, separator, 0, &mut out);
        out.finish(self.limits.max_value_len)
    }

    fn render(&self, value: &Value, depth: usize, out: &mut Render) {
        match value {
            Value::Undefined => out.push("undefined"),
            Value::Null => out.push("null"),
            Value::Bool(b) => out.push(if *b { "true" } else { "false" }),
            Value::Number(n) => out.push(&format_number(*n)),
            Value::String(s) => out.push(s),
            Value::Array(id) => {
                // 循环引用时截断
                if depth <= self.limits.max_nesting {
                    self.render_items(*id, ",", depth, out);
                }
            }
            Value::Object(_) => out.push("[object Object]"),
            Value::Function(_) | Value::Builtin(_) => out.push("function"),
        }
    }

    fn render_items(&self, id: ArrayId, separator: &str, depth: usize, out: &mut Render) {
        for (i, item) in self.heap.array(id).iter().enumerate() {
            if !out.visit() {
                return;
            }
            if i > 0 {
                out.push(separator);
            }
            if !item.is_nullish() {
                self.render(item, depth + 1, out);
            }
        }
    }

    pub(super) fn to_json(&self, value: &Value) -> ScriptResult<Json> {
        let mut budget = self.limits.max_value_len;
        self.json_depth(value, 0, &mut budget)
    }

    // budget 按节点数、字符串和键的字节数、缩进深度递减
    fn json_depth(&self, value: &Value, depth: usize, budget: &mut usize) -> ScriptResult<Json> {
        if depth > self.limits.max_nesting {
            return runtime("Converting circular structure to JSON");
        }
        let cost = match value {
            Value::String(s) => s.len(),
            _ => 0,
        };
        self.spend(budget, cost + depth + 1)?;
        Ok(match value {
            Value::Undefined | Value::Null | Value::Function(_) | Value::Builtin(_) => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => Json::String(s.to_string()),
            Value::Array(id) => {
                let mut items = Vec::new();
                for item in self.heap.array(*id) {
                    items.push(self.json_depth(item, depth + 1, budget)?);
                }
                Json::Array(items)
            }
            Value::Object(id) => {
                let mut map = serde_json::Map::new();
                for (key, item) in self.heap.object(*id) {
                    if matches!(
                        item,
                        Value::Undefined | Value::Function(_) | Value::Builtin(_)
                    ) {
                        continue;
                    }
                    self.spend(budget, key.len())?;
                    map.insert(key.clone(), self.json_depth(item, depth + 1, budget)?);
                }
                Json::Object(map)
            }
        })
    }

    fn spend(&self, budget: &mut usize, cost: usize) -> ScriptResult<()> {
        match budget.checked_sub(cost) {
            Some(rest) => {
                *budget = rest;
                Ok(())
            }
            None => Err(ScriptError::Limit(format!(
                "value larger than {}",
                self.limits.max_value_len
            ))),
        }
    }

    pub(super) fn from_json(&mut self, json: &Json) -> ScriptResult<Value> {
        Ok(match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => self.new_string(s.clone())?,
            Json::Array(items) => {
                let items = items
                    .iter()
                    .map(|item| self.from_json(item))
                    .collect::<ScriptResult<_>>()?;
                self.new_array(items)?
            }
            Json::Object(map) => {
                let mut entries = BTreeMap::new();
                for (key, item) in map {
                    entries.insert(key.clone(), self.from_json(item)?);
                }
                self.new_object(entries)?
            }
        })
    }
}

/// Output buffer for display conversion. Stops accepting text past `cap`
/// bytes and stops walking arrays past `cap` items, so arrays that share or
/// contain themselves cannot expand without bound.
struct Render {
    text: String,
    bytes_left: usize,
    items_left: usize,
    overflow: bool,
}

impl Render {
    fn new(cap: usize) -> Self {
        Self {
            text: String::new(),
            bytes_left: cap,
            items_left: cap,
            overflow: false,
        }
    }

    fn push(&mut self, s: &str) {
        if self.overflow {
            return;
        }
        if s.len() > self.bytes_left {
            self.overflow = true;
            return;
        }
        self.bytes_left -= s.len();
        self.text.push_str(s);
    }

    fn visit(&mut self) -> bool {
        if self.overflow || self.items_left == 0 {
            self.overflow = true;
            return false;
        }
        self.items_left -= 1;
        true
    }

    fn finish(self, cap: usize) -> ScriptResult<String> {
        if self.overflow {
            return Err(ScriptError::Limit(format!("value longer than {}", cap)));
        }
        Ok(self.text)
    }
}

fn number_to_json(n: f64) -> Json {
    if !n.is_finite() {
        Json::Null
    } else if n.fract() == 0.0 && n.abs() <= 9_007_199_254_740_992.0 {
        Json::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Json::Number)
            .unwrap_or(Json::Null)
    }
}

fn callee_name(callee: &Expr) -> String {
    match callee {
        Expr::Ident(name) => name.clone(),
        Expr::Member {
            object, property, ..
        } => format!("{}.{}", callee_name(object), property),
        _ => "expression".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::script::parser::parse_function_body;

    fn run_with(source: &str, limits: &ScriptLimits) -> ScriptResult<Json> {
        let def = parse_function_body(source, &["repo", "filter"], limits.max_nesting)?;
        let mut interpreter = Interpreter::new(limits);
        interpreter.run(
            Arc::new(def),
            &[
                json!("orders"),
                json!({ "$and": [{ "status": { "$eq": "paid" } }] }),
            ],
        )
    }

    fn run(source: &str) -> ScriptResult<Json> {
        run_with(source, &ScriptLimits::default())
    }

    #[test]
    fn arithmetic_and_strings() {
        assert_eq!(run("return 1 + 2 * 3 - 4 / 2").unwrap(), json!(5));
        assert_eq!(run("return 7 % 4 + 0.5").unwrap(), json!(3.5));
        assert_eq!(run("return 'n=' + 1 + 2").unwrap(), json!("n=12"));
        assert_eq!(run("return `${repo}:${1 + 1}`").unwrap(), json!("orders:2"));
        assert_eq!(run("return -'3' + +true").unwrap(), json!(-2));
    }

    #[test]
    fn parameters_and_filter_access() {
        assert_eq!(run("return filter.$and.length").unwrap(), json!(1));
        assert_eq!(
            run("return filter.$and[0].status.$eq").unwrap(),
            json!("paid")
        );
        assert_eq!(run("return filter?.$or?.length ?? 0").unwrap(), json!(0));
        assert_eq!(run("return filter.$or?.x.y.z").unwrap(), json!(null));
        assert_eq!(run("return typeof missing").unwrap(), json!("undefined"));
    }

    #[test]
    fn building_a_configuration() {
        let source = r#"
            const fields = [];
            for (const name of ['amount', 'qty']) {
                fields.push({ field: name, label: name.toUpperCase(), color: 'blue' });
            }
            let label = 'All Records';
            if (filter && filter.$and) {
                if (filter.$and.length > 0) label = 'Filtered Records';
            }
            fields[0].label = label;
            return { type: 'sum', fields };
        "#;
        assert_eq!(
            run(source).unwrap(),
            json!({
                "type": "sum",
                "fields": [
                    { "field": "amount", "label": "Filtered Records", "color": "blue" },
                    { "field": "qty", "label": "QTY", "color": "blue" }
                ]
            })
        );
    }

    #[test]
    fn closures_and_array_methods() {
        assert_eq!(
            run("const add = (a) => (b) => a + b; return [1, 2, 3].map(add(10))").unwrap(),
            json!([11, 12, 13])
        );
        assert_eq!(
            run("return [1, 2, 3, 4].filter(x => x % 2 === 0).join('-')").unwrap(),
            json!("2-4")
        );
        assert_eq!(
            run("function twice(x) { return x * 2 } return twice(21)").unwrap(),
            json!(42)
        );
        assert_eq!(
            run("return { ...{ a: 1, b: 2 }, b: 3, ['c' + 1]: [...[4], 5] }").unwrap(),
            json!({ "a": 1, "b": 3, "c1": [4, 5] })
        );
    }

    #[test]
    fn equality() {
        assert_eq!(run("return 1 == '1'").unwrap(), json!(true));
        assert_eq!(run("return 1 === '1'").unwrap(), json!(false));
        assert_eq!(run("return null == undefined").unwrap(), json!(true));
        assert_eq!(run("return null === undefined").unwrap(), json!(false));
        assert_eq!(run("const o = {}; return o === o && o !== {}").unwrap(), json!(true));
        assert_eq!(run("return 'b' > 'a' && 2 >= 2").unwrap(), json!(true));
    }

    #[test]
    fn builtins() {
        assert_eq!(
            run("return JSON.stringify({ a: [1, 'x'], b: undefined })").unwrap(),
            json!(r#"{"a":[1,"x"]}"#)
        );
        assert_eq!(run("return JSON.parse('{\"n\": 2}').n").unwrap(), json!(2));
        assert_eq!(run("return Object.keys({ b: 1, a: 2 })").unwrap(), json!(["a", "b"]));
        assert_eq!(
            run("return [Math.round(2.5), Math.max(1, 3), Math.floor(-0.5)]").unwrap(),
            json!([3, 3, -1])
        );
        assert_eq!(
            run("return [parseInt('42px'), parseFloat('3.5e1x'), Number('x')]").unwrap(),
            json!([42, 35, null])
        );
        assert_eq!(run("return (1234.5).toFixed(2)").unwrap(), json!("1234.50"));
        assert_eq!(run("console.log('debug', repo, filter); return 1").unwrap(), json!(1));
        assert_eq!(run("return 'a,b'.split(',').concat(['c'])").unwrap(), json!(["a", "b", "c"]));
    }

    #[test]
    fn no_return_is_null() {
        assert_eq!(run("const a = 1;").unwrap(), json!(null));
        assert_eq!(run("return").unwrap(), json!(null));
    }

    #[test]
    fn runtime_errors() {
        assert_eq!(
            run("return filter.$or.length"),
            Err(ScriptError::Runtime(
                "Cannot read properties of undefined (reading 'length')".to_owned()
            ))
        );
        assert_eq!(
            run("return nope + 1"),
            Err(ScriptError::Runtime("nope is not defined".to_owned()))
        );
        assert_eq!(
            run("const a = 1; a = 2"),
            Err(ScriptError::Runtime("Assignment to constant variable.".to_owned()))
        );
        assert_eq!(
            run("throw { message: 'bad filter' }"),
            Err(ScriptError::Runtime("bad filter".to_owned()))
        );
        assert_eq!(
            run("return repo.nope()"),
            Err(ScriptError::Runtime("repo.nope is not a function".to_owned()))
        );
        assert_eq!(
            run("const a = {}; a.self = a; return a"),
            Err(ScriptError::Runtime(
                "Converting circular structure to JSON".to_owned()
            ))
        );
    }

    #[test]
    fn limits() {
        let limits = ScriptLimits {
            max_steps: 200,
            ..ScriptLimits::default()
        };
        let source = "let n = 0; for (const x of [1,2,3,4,5,6,7,8,9,10]) { for (const y of [1,2,3,4,5,6,7,8,9,10]) { n += 1 } } return n";
        assert!(matches!(run_with(source, &limits), Err(ScriptError::Limit(_))));
        assert_eq!(run(source).unwrap(), json!(100));

        assert!(matches!(
            run("const f = () => f(); return f()"),
            Err(ScriptError::Limit(_))
        ));

        let limits = ScriptLimits {
            max_value_len: 1000,
            ..ScriptLimits::default()
        };
        let source = "let s = 'ab'; for (const i of [1,2,3,4,5,6,7,8,9,10]) { s = s + s } return s.length";
        assert!(matches!(run_with(source, &limits), Err(ScriptError::Limit(_))));
    }

    // 40 层共享的 [a, a]，展开后有 2^40 个叶子
    const SHARED: &str = "
        let xs = [0];
        for (const i of [0, 0, 0, 0, 0, 0]) { xs = xs.concat(xs) }
        let a = ['x'];
        for (const i of xs.slice(0, 40)) { a = [a, a] }
    ";

    fn is_limit(result: ScriptResult<Json>, needle: &str) -> bool {
        matches!(result, Err(ScriptError::Limit(message)) if message.contains(needle))
    }

    #[test]
    fn shared_arrays_do_not_expand() {
        for tail in ["return '' + a", "return `${a}`", "return String(a)", "return a.join('-')"] {
            let source = format!("{} {}", SHARED, tail);
            assert!(is_limit(run(&source), "value longer than"), "{}", tail);
        }
        for tail in ["return JSON.stringify(a)", "return a"] {
            let source = format!("{} {}", SHARED, tail);
            assert!(is_limit(run(&source), "value larger than"), "{}", tail);
        }
        assert_eq!(
            run(&format!("{} return a.length + a[0].length", SHARED)).unwrap(),
            json!(4)
        );
    }

    #[test]
    fn join_checks_length_before_building() {
        let limits = ScriptLimits {
            max_value_len: 10_000,
            ..ScriptLimits::default()
        };
        let source = "
            let sep = '-';
            for (const i of [1,2,3,4,5,6,7,8,9,10,11,12,13]) { sep = sep + sep }
            return [1, 2, 3].join(sep)
        ";
        assert!(is_limit(run_with(source, &limits), "value longer than"));
        assert_eq!(
            run_with("return ['a', null, 'b'].join('--')", &limits).unwrap(),
            json!("a----b")
        );
    }

    #[test]
    fn memory_budget_covers_the_whole_run() {
        let limits = ScriptLimits {
            max_memory: 1024 * 1024,
            ..ScriptLimits::default()
        };
        let source = "
            let xs = [0];
            for (const i of [0, 0, 0, 0, 0, 0]) { xs = xs.concat(xs) }
            let s = 'x';
            for (const i of xs.slice(0, 16)) { s = s + s }
            const keep = [];
            for (const i of xs) { keep.push(s + i) }
            return keep.length
        ";
        assert!(is_limit(run_with(source, &limits), "memory budget"));
        assert!(is_limit(
            run_with("const a = []; a[900000] = 1; return a.length", &limits),
            "memory budget"
        ));
        assert_eq!(
            run_with("const a = []; a[9] = 1; return a.length", &limits).unwrap(),
            json!(10)
        );
    }
}
