//! Runtime values

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::frontend::ast::{FunctionDefinition, TypeName};
use crate::interpreter::environment::EnvironmentStack;
use crate::utils::Result;

/// Signature of a host-provided function
pub type HostFn = dyn Fn(&[Value]) -> Result<Value>;

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    String(Rc<str>),
    Function(Rc<Closure>),
    Native(Rc<NativeFunction>),
    Namespace(Rc<Namespace>),
}

/// A function value paired with the environments visible where it was defined
pub struct Closure {
    pub definition: Rc<FunctionDefinition>,
    pub captured: EnvironmentStack,
}

impl fmt::Debug for Closure {
    // The captured stack may contain this closure
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("parameters", &self.definition.parameters.len())
            .field("captured_depth", &self.captured.depth())
            .finish()
    }
}

/// A function implemented by the embedding application
pub struct NativeFunction {
    pub name: String,
    /// Required argument count; `None` accepts any number
    pub arity: Option<usize>,
    pub func: Box<HostFn>,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<String>,
        arity: Option<usize>,
        func: impl Fn(&[Value]) -> Result<Value> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            arity,
            func: Box::new(func),
        }
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

/// A named group of host values, brought into scope with `pull`
#[derive(Debug, Default)]
pub struct Namespace {
    pub name: String,
    pub members: HashMap<String, Value>,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: HashMap::new(),
        }
    }

    pub fn with_member(mut self, name: impl Into<String>, value: Value) -> Self {
        self.members.insert(name.into(), value);
        self
    }

    pub fn with_function(self, function: NativeFunction) -> Self {
        let name = function.name.clone();
        self.with_member(name, Value::Native(Rc::new(function)))
    }

    pub fn member(&self, name: &str) -> Option<&Value> {
        self.members.get(name)
    }
}

impl Value {
    pub fn string(text: impl AsRef<str>) -> Self {
        Value::String(Rc::from(text.as_ref()))
    }

    /// The runtime type, if the value has one that `is` can test for
    pub fn type_of(&self) -> Option<TypeName> {
        match self {
            Value::Null => Some(TypeName::Null),
            Value::Int(_) => Some(TypeName::Int),
            Value::Float(_) => Some(TypeName::Float),
            Value::Bool(_) => Some(TypeName::Bool),
            Value::String(_) => Some(TypeName::String),
            Value::Function(_) | Value::Native(_) => Some(TypeName::Function),
            Value::Namespace(_) => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::String(_) => "string",
            Value::Function(_) | Value::Native(_) => "function",
            Value::Namespace(_) => "namespace",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        if let Value::Bool(b) = self {
            Some(*b)
        } else {
            None
        }
    }

    /// Numeric view of ints and floats
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        if let Value::String(s) = self {
            Some(s)
        } else {
            None
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            (Value::Namespace(a), Value::Namespace(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{:.1}", x),
            Value::Float(x) => write!(f, "{}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::String(s) => write!(f, "{}", s),
            Value::Function(_) => write!(f, "<function>"),
            Value::Native(native) => write!(f, "<function {}>", native.name),
            Value::Namespace(namespace) => write!(f, "<namespace {}>", namespace.name),
        }
    }
}
