//! Language builtins.
//!
//! Each builtin is a fixed enum variant rather than a native function so the
//! engine can filter the table against a policy allowlist by name before an
//! execution starts. `print` is special-cased in the evaluator because it
//! writes through the console sink; the rest are pure.

use crate::error::EvalError;
use crate::value::Value;

/// A builtin symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    /// Console output
    Print,
    /// Length of a string or list
    Len,
    /// Absolute value
    Abs,
    /// Minimum of the arguments
    Min,
    /// Maximum of the arguments
    Max,
    /// Convert to string
    Str,
    /// Convert to integer
    Int,
    /// Convert to float
    Float,
    /// Convert to boolean
    Bool,
}

impl Builtin {
    /// The builtin's source-level name
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Len => "len",
            Builtin::Abs => "abs",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Str => "str",
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Bool => "bool",
        }
    }

    /// Every builtin the language defines, in name order
    #[must_use]
    pub fn full_table() -> &'static [Builtin] {
        &[
            Builtin::Abs,
            Builtin::Bool,
            Builtin::Float,
            Builtin::Int,
            Builtin::Len,
            Builtin::Max,
            Builtin::Min,
            Builtin::Print,
            Builtin::Str,
        ]
    }

    /// Evaluate a pure builtin. `print` is not pure and must not reach
    /// this path; the evaluator routes it to the console sink instead.
    ///
    /// # Errors
    ///
    /// Returns error on wrong arity or unsupported operand types
    pub fn apply(self, args: &[Value]) -> Result<Value, EvalError> {
        match self {
            Builtin::Print => Err(EvalError::ValueError(
                "print cannot be applied as a pure function".to_string(),
            )),
            Builtin::Len => {
                let arg = expect_one(self, args)?;
                match arg {
                    Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
                    Value::List(items) => Ok(Value::Int(items.len() as i64)),
                    other => Err(EvalError::ValueError(format!(
                        "len() does not support {}",
                        other.type_name()
                    ))),
                }
            }
            Builtin::Abs => {
                let arg = expect_one(self, args)?;
                match arg {
                    Value::Int(n) => Ok(Value::Int(n.wrapping_abs())),
                    Value::Float(f) => Ok(Value::Float(f.abs())),
                    other => Err(EvalError::ValueError(format!(
                        "abs() does not support {}",
                        other.type_name()
                    ))),
                }
            }
            Builtin::Min => fold_extremum(self, args, |a, b| a < b),
            Builtin::Max => fold_extremum(self, args, |a, b| a > b),
            Builtin::Str => {
                let arg = expect_one(self, args)?;
                Ok(Value::Str(arg.repr()))
            }
            Builtin::Int => {
                let arg = expect_one(self, args)?;
                match arg {
                    Value::Int(n) => Ok(Value::Int(*n)),
                    Value::Float(f) => Ok(Value::Int(*f as i64)),
                    Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
                    Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
                        EvalError::ValueError(format!("cannot convert '{s}' to int"))
                    }),
                    other => Err(EvalError::ValueError(format!(
                        "int() does not support {}",
                        other.type_name()
                    ))),
                }
            }
            Builtin::Float => {
                let arg = expect_one(self, args)?;
                match arg {
                    Value::Int(n) => Ok(Value::Float(*n as f64)),
                    Value::Float(f) => Ok(Value::Float(*f)),
                    Value::Bool(b) => Ok(Value::Float(f64::from(u8::from(*b)))),
                    Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
                        EvalError::ValueError(format!("cannot convert '{s}' to float"))
                    }),
                    other => Err(EvalError::ValueError(format!(
                        "float() does not support {}",
                        other.type_name()
                    ))),
                }
            }
            Builtin::Bool => {
                let arg = expect_one(self, args)?;
                Ok(Value::Bool(arg.truthy()))
            }
        }
    }
}

fn expect_one(builtin: Builtin, args: &[Value]) -> Result<&Value, EvalError> {
    match args {
        [one] => Ok(one),
        _ => Err(EvalError::ArityMismatch {
            name: builtin.name().to_string(),
            expected: "1".to_string(),
            found: args.len(),
        }),
    }
}

fn as_number(builtin: Builtin, value: &Value) -> Result<f64, EvalError> {
    match value {
        Value::Int(n) => Ok(*n as f64),
        Value::Float(f) => Ok(*f),
        other => Err(EvalError::ValueError(format!(
            "{}() does not support {}",
            builtin.name(),
            other.type_name()
        ))),
    }
}

fn fold_extremum<F>(builtin: Builtin, args: &[Value], better: F) -> Result<Value, EvalError>
where
    F: Fn(f64, f64) -> bool,
{
    if args.len() < 2 {
        return Err(EvalError::ArityMismatch {
            name: builtin.name().to_string(),
            expected: "at least 2".to_string(),
            found: args.len(),
        });
    }
    let mut best = &args[0];
    let mut best_key = as_number(builtin, best)?;
    for arg in &args[1..] {
        let key = as_number(builtin, arg)?;
        if better(key, best_key) {
            best = arg;
            best_key = key;
        }
    }
    Ok(best.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_len() {
        assert_eq!(
            Builtin::Len.apply(&[Value::Str("abc".to_string())]).unwrap(),
            Value::Int(3)
        );
        assert_eq!(
            Builtin::Len
                .apply(&[Value::List(vec![Value::Int(1), Value::Int(2)])])
                .unwrap(),
            Value::Int(2)
        );
        assert!(Builtin::Len.apply(&[Value::Int(1)]).is_err());
    }

    #[test]
    fn test_abs() {
        assert_eq!(Builtin::Abs.apply(&[Value::Int(-5)]).unwrap(), Value::Int(5));
        assert_eq!(
            Builtin::Abs.apply(&[Value::Float(-2.5)]).unwrap(),
            Value::Float(2.5)
        );
    }

    #[test]
    fn test_min_max_preserve_operand_type() {
        assert_eq!(
            Builtin::Min
                .apply(&[Value::Int(3), Value::Float(1.5), Value::Int(2)])
                .unwrap(),
            Value::Float(1.5)
        );
        assert_eq!(
            Builtin::Max.apply(&[Value::Int(3), Value::Int(7)]).unwrap(),
            Value::Int(7)
        );
        assert!(Builtin::Min.apply(&[Value::Int(1)]).is_err());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(
            Builtin::Int.apply(&[Value::Str(" 42 ".to_string())]).unwrap(),
            Value::Int(42)
        );
        assert_eq!(
            Builtin::Float.apply(&[Value::Int(3)]).unwrap(),
            Value::Float(3.0)
        );
        assert_eq!(
            Builtin::Str.apply(&[Value::Int(7)]).unwrap(),
            Value::Str("7".to_string())
        );
        assert_eq!(
            Builtin::Bool.apply(&[Value::Str(String::new())]).unwrap(),
            Value::Bool(false)
        );
        assert!(Builtin::Int.apply(&[Value::Str("abc".to_string())]).is_err());
    }

    #[test]
    fn test_print_is_not_pure() {
        assert!(Builtin::Print.apply(&[Value::Int(1)]).is_err());
    }

    #[test]
    fn test_full_table_names_unique() {
        let names: std::collections::BTreeSet<&str> =
            Builtin::full_table().iter().map(|b| b.name()).collect();
        assert_eq!(names.len(), Builtin::full_table().len());
    }
}
