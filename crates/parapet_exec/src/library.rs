//! Native standard library.
//!
//! A single chain resolver providing the modules sandboxed code may import:
//! `math`, `strings`, `clock`, and `canvas`. Modules are rebuilt per resolve;
//! the mediator's cache keeps resolution cheap. The `canvas` module writes
//! artifacts into a shared sink the engine drains after each run. What a
//! script may actually reach is still the policy's decision; the library
//! only defines what exists.

use crate::resolver::ModuleResolver;
use parapet_script::{EvalError, ImportError, Module, RawArtifact, Value};
use std::sync::{Arc, Mutex};

/// Resolver providing the built-in native modules.
#[derive(Clone, Default)]
pub struct StdLibrary {
    artifacts: Arc<Mutex<Vec<RawArtifact>>>,
}

impl StdLibrary {
    /// Chain entry name
    pub const NAME: &'static str = "stdlib";

    /// Build the library with an empty artifact sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain every artifact produced since the last call
    #[must_use]
    pub fn take_artifacts(&self) -> Vec<RawArtifact> {
        std::mem::take(&mut *self.artifacts.lock().unwrap())
    }

    fn math() -> Module {
        Module::new("math")
            .with_attr("pi", Value::Float(std::f64::consts::PI))
            .with_attr("e", Value::Float(std::f64::consts::E))
            .with_fn("sqrt", |args| {
                let x = one_number("sqrt", args)?;
                if x < 0.0 {
                    return Err(EvalError::ValueError(
                        "sqrt of a negative number".to_string(),
                    ));
                }
                Ok(Value::Float(x.sqrt()))
            })
            .with_fn("pow", |args| match args {
                [a, b] => {
                    let base = number("pow", a)?;
                    let exp = number("pow", b)?;
                    Ok(Value::Float(base.powf(exp)))
                }
                _ => Err(arity("pow", "2", args.len())),
            })
            .with_fn("floor", |args| {
                Ok(Value::Int(one_number("floor", args)?.floor() as i64))
            })
            .with_fn("ceil", |args| {
                Ok(Value::Int(one_number("ceil", args)?.ceil() as i64))
            })
    }

    fn strings() -> Module {
        Module::new("strings")
            .with_fn("upper", |args| {
                Ok(Value::Str(one_str("upper", args)?.to_uppercase()))
            })
            .with_fn("lower", |args| {
                Ok(Value::Str(one_str("lower", args)?.to_lowercase()))
            })
            .with_fn("trim", |args| {
                Ok(Value::Str(one_str("trim", args)?.trim().to_string()))
            })
            .with_fn("split", |args| match args {
                [Value::Str(s), Value::Str(sep)] => {
                    if sep.is_empty() {
                        return Err(EvalError::ValueError("empty separator".to_string()));
                    }
                    Ok(Value::List(
                        s.split(sep.as_str())
                            .map(|part| Value::Str(part.to_string()))
                            .collect(),
                    ))
                }
                [_, _] => Err(EvalError::ValueError(
                    "split expects two strings".to_string(),
                )),
                _ => Err(arity("split", "2", args.len())),
            })
    }

    fn clock() -> Module {
        Module::new("clock").with_fn("now", |args| {
            if !args.is_empty() {
                return Err(arity("now", "0", args.len()));
            }
            Ok(Value::Str(parapet_core::Timestamp::now().to_string()))
        })
    }

    fn canvas(&self) -> Module {
        let sink = Arc::clone(&self.artifacts);
        Module::new("canvas").with_fn("draw", move |args| match args {
            [Value::Str(name), Value::Str(content)] => {
                sink.lock().unwrap().push(RawArtifact::new(
                    "figure",
                    name.clone(),
                    content.as_bytes().to_vec(),
                ));
                Ok(Value::None)
            }
            [_, _] => Err(EvalError::ValueError(
                "draw expects a name and string content".to_string(),
            )),
            _ => Err(arity("draw", "2", args.len())),
        })
    }
}

impl ModuleResolver for StdLibrary {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn resolve(&self, module: &str) -> Result<Option<Module>, ImportError> {
        let resolved = match module {
            "math" => Self::math(),
            "strings" => Self::strings(),
            "clock" => Self::clock(),
            "canvas" => self.canvas(),
            _ => return Ok(None),
        };
        Ok(Some(resolved))
    }
}

fn number(name: &str, value: &Value) -> Result<f64, EvalError> {
    match value {
        Value::Int(n) => Ok(*n as f64),
        Value::Float(f) => Ok(*f),
        other => Err(EvalError::ValueError(format!(
            "{name} expects a number, got {}",
            other.type_name()
        ))),
    }
}

fn one_number(name: &str, args: &[Value]) -> Result<f64, EvalError> {
    match args {
        [one] => number(name, one),
        _ => Err(arity(name, "1", args.len())),
    }
}

fn one_str<'a>(name: &str, args: &'a [Value]) -> Result<&'a str, EvalError> {
    match args {
        [Value::Str(s)] => Ok(s),
        [other] => Err(EvalError::ValueError(format!(
            "{name} expects a string, got {}",
            other.type_name()
        ))),
        _ => Err(arity(name, "1", args.len())),
    }
}

fn arity(name: &str, expected: &str, found: usize) -> EvalError {
    EvalError::ArityMismatch {
        name: name.to_string(),
        expected: expected.to_string(),
        found,
    }
}
