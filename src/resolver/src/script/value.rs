use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use super::{ast::FunctionDef, builtins::Builtin};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeId(usize);

/// Runtime value. Compound values live in the [`Heap`] and are referenced by
/// id, so everything a run allocates is released with its interpreter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Array(ArrayId),
    Object(ObjectId),
    Function(FunctionId),
    Builtin(Builtin),
}

impl Value {
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Builtin(_) => true,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null | Value::Array(_) | Value::Object(_) => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) | Value::Builtin(_) => "function",
        }
    }

    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (a, b) => a == b,
        }
    }
}

pub struct Closure {
    pub def: Arc<FunctionDef>,
    pub scope: ScopeId,
}

pub struct Binding {
    pub value: Value,
    pub mutable: bool,
}

pub struct ScopeFrame {
    pub vars: HashMap<String, Binding>,
    pub parent: Option<ScopeId>,
}

#[derive(Default)]
pub struct Heap {
    arrays: Vec<Vec<Value>>,
    objects: Vec<BTreeMap<String, Value>>,
    functions: Vec<Arc<Closure>>,
    scopes: Vec<ScopeFrame>,
}

impl Heap {
    pub fn alloc_array(&mut self, items: Vec<Value>) -> Value {
        self.arrays.push(items);
        Value::Array(ArrayId(self.arrays.len() - 1))
    }

    pub fn alloc_object(&mut self, entries: BTreeMap<String, Value>) -> Value {
        self.objects.push(entries);
        Value::Object(ObjectId(self.objects.len() - 1))
    }

    pub fn alloc_function(&mut self, def: Arc<FunctionDef>, scope: ScopeId) -> Value {
        self.functions.push(Arc::new(Closure { def, scope }));
        Value::Function(FunctionId(self.functions.len() - 1))
    }

    pub fn alloc_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        self.scopes.push(ScopeFrame {
            vars: HashMap::new(),
            parent,
        });
        ScopeId(self.scopes.len() - 1)
    }

    pub fn array(&self, id: ArrayId) -> &Vec<Value> {
        &self.arrays[id.0]
    }

    pub fn array_mut(&mut self, id: ArrayId) -> &mut Vec<Value> {
        &mut self.arrays[id.0]
    }

    pub fn object(&self, id: ObjectId) -> &BTreeMap<String, Value> {
        &self.objects[id.0]
    }

    pub fn object_mut(&mut self, id: ObjectId) -> &mut BTreeMap<String, Value> {
        &mut self.objects[id.0]
    }

    pub fn function(&self, id: FunctionId) -> Arc<Closure> {
        self.functions[id.0].clone()
    }

    pub fn scope(&self, id: ScopeId) -> &ScopeFrame {
        &self.scopes[id.0]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut ScopeFrame {
        &mut self.scopes[id.0]
    }
}

/// Number to string the way scripts print numbers: `42`, `0.5`, `NaN`.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_owned()
        } else {
            "-Infinity".to_owned()
        }
    } else if n == 0.0 {
        "0".to_owned()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

/// String to number conversion: blank is zero, garbage is NaN.
pub fn parse_number(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map(|n| n as f64).unwrap_or(f64::NAN);
    }
    match s {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        // Rust 接受 "inf"/"nan"，脚本语义下不接受
        s if s.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
        s => s.parse().unwrap_or(f64::NAN),
    }
}
