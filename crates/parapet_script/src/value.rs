//! Runtime values.

use crate::builtins::Builtin;
use crate::error::EvalError;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// A native function implemented by the host and exposed through a module.
#[derive(Clone)]
pub struct NativeFn {
    name: String,
    func: Arc<dyn Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync>,
}

impl NativeFn {
    /// Wrap a host closure under a name
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// The function's name, used in error messages
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the function
    ///
    /// # Errors
    ///
    /// Propagates whatever the host closure returns
    pub fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        (self.func)(args)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFn({})", self.name)
    }
}

impl PartialEq for NativeFn {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && Arc::ptr_eq(&self.func, &other.func)
    }
}

/// A mediated module: a named bag of attribute values.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    name: String,
    attrs: IndexMap<String, Value>,
}

impl Module {
    /// Build an empty module
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: IndexMap::new(),
        }
    }

    /// The module's dotted name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add an attribute (builder form)
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attrs.insert(name.into(), value);
        self
    }

    /// Add a native function attribute (builder form)
    #[must_use]
    pub fn with_fn<F>(self, name: &str, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        let native = NativeFn::new(name, func);
        self.with_attr(name, Value::Native(native))
    }

    /// Look up an attribute
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    /// Attribute names in insertion order
    pub fn attr_names(&self) -> impl Iterator<Item = &str> {
        self.attrs.keys().map(String::as_str)
    }

    /// Number of attributes
    #[must_use]
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    /// Whether the module has no attributes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// A filtered view keeping only attributes the predicate accepts.
    /// Attributes outside the view do not exist on the returned module.
    #[must_use]
    pub fn restricted<F>(&self, keep: F) -> Self
    where
        F: Fn(&str) -> bool,
    {
        Self {
            name: self.name.clone(),
            attrs: self
                .attrs
                .iter()
                .filter(|(k, _)| keep(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

/// An opaque artifact produced by a native module during execution,
/// collected by the host after the run completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawArtifact {
    /// Artifact kind, e.g. `"figure"` or `"table"`
    pub kind: String,
    /// Display name
    pub name: String,
    /// Raw payload
    pub bytes: Vec<u8>,
}

impl RawArtifact {
    /// Build an artifact
    #[must_use]
    pub fn new(kind: impl Into<String>, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            bytes,
        }
    }
}

/// A runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absence of a value
    None,
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit float
    Float(f64),
    /// UTF-8 string
    Str(String),
    /// Ordered list
    List(Vec<Value>),
    /// An imported module
    Module(Module),
    /// A host-provided function
    Native(NativeFn),
    /// A language builtin
    Builtin(Builtin),
}

impl Value {
    /// The value's type name, used in error messages
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Module(_) => "module",
            Value::Native(_) => "function",
            Value::Builtin(_) => "builtin",
        }
    }

    /// Truthiness: `none`, `false`, zero, the empty string, and the empty
    /// list are falsy; everything else is truthy.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Module(_) | Value::Native(_) | Value::Builtin(_) => true,
        }
    }

    /// Textual rendering, as `print` and variable extraction see it.
    #[must_use]
    pub fn repr(&self) -> String {
        match self {
            Value::None => "none".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.is_finite() {
                    format!("{f:.1}")
                } else {
                    f.to_string()
                }
            }
            Value::Str(s) => s.clone(),
            Value::List(items) => {
                let inner: Vec<String> = items
                    .iter()
                    .map(|v| match v {
                        Value::Str(s) => format!("\"{s}\""),
                        other => other.repr(),
                    })
                    .collect();
                format!("[{}]", inner.join(", "))
            }
            Value::Module(m) => format!("<module {}>", m.name()),
            Value::Native(f) => format!("<function {}>", f.name()),
            Value::Builtin(b) => format!("<builtin {}>", b.name()),
        }
    }

    /// Approximate heap footprint in bytes, used by the memory meter.
    /// Deliberately coarse; consistency matters more than precision.
    #[must_use]
    pub fn approx_size(&self) -> u64 {
        match self {
            Value::None | Value::Bool(_) | Value::Int(_) | Value::Float(_) => 16,
            Value::Str(s) => 24 + s.len() as u64,
            Value::List(items) => {
                32 + items.iter().map(Value::approx_size).sum::<u64>()
            }
            Value::Module(m) => {
                64 + m
                    .attrs
                    .iter()
                    .map(|(k, v)| k.len() as u64 + v.approx_size())
                    .sum::<u64>()
            }
            Value::Native(_) | Value::Builtin(_) => 16,
        }
    }

    /// Convert to JSON where representable. Modules, functions, and
    /// builtins have no JSON form and yield `None`.
    #[must_use]
    pub fn to_json(&self) -> Option<serde_json::Value> {
        match self {
            Value::None => Some(serde_json::Value::Null),
            Value::Bool(b) => Some(serde_json::Value::Bool(*b)),
            Value::Int(n) => Some(serde_json::Value::from(*n)),
            Value::Float(f) => serde_json::Number::from_f64(*f).map(serde_json::Value::Number),
            Value::Str(s) => Some(serde_json::Value::String(s.clone())),
            Value::List(items) => items
                .iter()
                .map(Value::to_json)
                .collect::<Option<Vec<_>>>()
                .map(serde_json::Value::Array),
            Value::Module(_) | Value::Native(_) | Value::Builtin(_) => None,
        }
    }

    /// Rebuild from JSON. Objects have no value counterpart and yield `None`.
    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Option<Value> {
        match json {
            serde_json::Value::Null => Some(Value::None),
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Value::Int(i))
                } else {
                    n.as_f64().map(Value::Float)
                }
            }
            serde_json::Value::String(s) => Some(Value::Str(s.clone())),
            serde_json::Value::Array(items) => items
                .iter()
                .map(Value::from_json)
                .collect::<Option<Vec<_>>>()
                .map(Value::List),
            serde_json::Value::Object(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repr())
    }
}
