//! Tree-walking evaluator with cost, memory, and cancellation bounds.
//!
//! Every node evaluation charges the cost meter, so a runaway loop exhausts
//! its budget in bounded time. The meter also polls an external cancellation
//! flag, which is how wall-clock deadlines reach in-flight code. Memory is
//! accounted by value size after every binding, approximate but monotone.

use crate::ast::{BinOp, Expr, Program, Stmt, UnOp};
use crate::builtins::Builtin;
use crate::error::{ConsoleError, EvalError, ImportError, ScriptError};
use crate::value::{Module, Value};
use indexmap::IndexMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Resolves `import` statements. The engine's mediator implements this;
/// tests use stubs.
pub trait Importer {
    /// Resolve a dotted module name into a module value
    ///
    /// # Errors
    ///
    /// Returns error when the module is denied, unknown, over the import
    /// ceiling, or fails to load
    fn resolve(&mut self, name: &str) -> Result<Module, ImportError>;
}

/// Receives console output from `print` and from error reporting.
pub trait Console {
    /// Write to the captured stdout stream
    ///
    /// # Errors
    ///
    /// Returns error when the output ceiling is hit
    fn stdout(&mut self, text: &str) -> Result<(), ConsoleError>;

    /// Write to the captured stderr stream
    ///
    /// # Errors
    ///
    /// Returns error when the output ceiling is hit
    fn stderr(&mut self, text: &str) -> Result<(), ConsoleError>;
}

/// Operation cost meter. A `None` budget is unlimited.
#[derive(Debug, Clone)]
pub struct CostMeter {
    budget: Option<u64>,
    consumed: u64,
}

impl CostMeter {
    /// Meter with a fixed budget
    #[must_use]
    pub fn new(budget: u64) -> Self {
        Self {
            budget: Some(budget),
            consumed: 0,
        }
    }

    /// Meter that never exhausts
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            budget: None,
            consumed: 0,
        }
    }

    /// Charge `amount` operations
    ///
    /// # Errors
    ///
    /// Returns error once the budget is exhausted
    pub fn charge(&mut self, amount: u64) -> Result<(), EvalError> {
        self.consumed = self.consumed.saturating_add(amount);
        match self.budget {
            Some(budget) if self.consumed > budget => Err(EvalError::CostExhausted {
                consumed: self.consumed,
            }),
            _ => Ok(()),
        }
    }

    /// Operations consumed so far
    #[must_use]
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Remaining budget, `None` when unlimited
    #[must_use]
    pub fn remaining(&self) -> Option<u64> {
        self.budget.map(|b| b.saturating_sub(self.consumed))
    }
}

/// Memory accounting meter. Tracks the peak accounted total and fails
/// once a limit is crossed. A `None` limit records peaks only.
#[derive(Debug, Clone)]
pub struct MemoryMeter {
    limit: Option<u64>,
    peak: u64,
}

impl MemoryMeter {
    /// Meter with a byte ceiling
    #[must_use]
    pub fn new(limit: u64) -> Self {
        Self {
            limit: Some(limit),
            peak: 0,
        }
    }

    /// Meter that only records peaks
    #[must_use]
    pub fn unlimited() -> Self {
        Self { limit: None, peak: 0 }
    }

    /// Record the current accounted total
    ///
    /// # Errors
    ///
    /// Returns error when the total crosses the ceiling
    pub fn account(&mut self, total: u64) -> Result<(), EvalError> {
        self.peak = self.peak.max(total);
        match self.limit {
            Some(limit) if total > limit => Err(EvalError::MemoryExceeded { limit }),
            _ => Ok(()),
        }
    }

    /// Highest accounted total seen
    #[must_use]
    pub fn peak_bytes(&self) -> u64 {
        self.peak
    }
}

/// Evaluator bounds and hooks.
#[derive(Debug, Clone, Default)]
pub struct EvalConfig {
    /// Operation budget, `None` for unlimited
    pub cost_budget: Option<u64>,
    /// Accounted memory ceiling in bytes, `None` for unlimited
    pub memory_limit: Option<u64>,
    /// External cancellation flag, polled on every charge
    pub cancel: Option<Arc<AtomicBool>>,
}

impl EvalConfig {
    /// Set the operation budget
    #[must_use]
    pub fn with_cost_budget(mut self, budget: u64) -> Self {
        self.cost_budget = Some(budget);
        self
    }

    /// Set the memory ceiling
    #[must_use]
    pub fn with_memory_limit(mut self, bytes: u64) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    /// Attach a cancellation flag
    #[must_use]
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }
}

/// The tree-walking evaluator.
pub struct Evaluator {
    scope: IndexMap<String, Value>,
    cost: CostMeter,
    memory: MemoryMeter,
    cancel: Option<Arc<AtomicBool>>,
}

impl Evaluator {
    /// Build an evaluator over an initial scope
    #[must_use]
    pub fn new(config: EvalConfig, globals: IndexMap<String, Value>) -> Self {
        Self {
            scope: globals,
            cost: match config.cost_budget {
                Some(budget) => CostMeter::new(budget),
                None => CostMeter::unlimited(),
            },
            memory: match config.memory_limit {
                Some(limit) => MemoryMeter::new(limit),
                None => MemoryMeter::unlimited(),
            },
            cancel: config.cancel,
        }
    }

    /// Run a program to completion or first failure
    ///
    /// # Errors
    ///
    /// Returns the first evaluation error, pinned to its statement's line
    pub fn run(
        &mut self,
        program: &Program,
        importer: &mut dyn Importer,
        console: &mut dyn Console,
    ) -> Result<(), ScriptError> {
        for stmt in &program.stmts {
            self.exec_stmt(stmt, importer, console)?;
        }
        Ok(())
    }

    /// The current scope
    #[must_use]
    pub fn scope(&self) -> &IndexMap<String, Value> {
        &self.scope
    }

    /// Consume the evaluator, yielding its scope
    #[must_use]
    pub fn into_scope(self) -> IndexMap<String, Value> {
        self.scope
    }

    /// Operations consumed so far
    #[must_use]
    pub fn cost_consumed(&self) -> u64 {
        self.cost.consumed()
    }

    /// Peak accounted memory in bytes
    #[must_use]
    pub fn memory_peak(&self) -> u64 {
        self.memory.peak_bytes()
    }

    fn exec_stmt(
        &mut self,
        stmt: &Stmt,
        importer: &mut dyn Importer,
        console: &mut dyn Console,
    ) -> Result<(), ScriptError> {
        let line = stmt.line();
        match stmt {
            Stmt::Import { name, .. } => {
                self.charge(1).map_err(|e| ScriptError::new(line, e))?;
                let module = importer
                    .resolve(name)
                    .map_err(|e| ScriptError::new(line, e.into()))?;
                self.bind(name.clone(), Value::Module(module))
                    .map_err(|e| ScriptError::new(line, e))?;
                Ok(())
            }
            Stmt::Assign { name, expr, .. } => {
                self.charge(1).map_err(|e| ScriptError::new(line, e))?;
                let value = self
                    .eval_expr(expr, console)
                    .map_err(|e| ScriptError::new(line, e))?;
                self.bind(name.clone(), value)
                    .map_err(|e| ScriptError::new(line, e))?;
                Ok(())
            }
            Stmt::Expr { expr, .. } => {
                self.charge(1).map_err(|e| ScriptError::new(line, e))?;
                self.eval_expr(expr, console)
                    .map_err(|e| ScriptError::new(line, e))?;
                Ok(())
            }
            Stmt::While { cond, body, .. } => loop {
                self.charge(1).map_err(|e| ScriptError::new(line, e))?;
                let test = self
                    .eval_expr(cond, console)
                    .map_err(|e| ScriptError::new(line, e))?;
                if !test.truthy() {
                    return Ok(());
                }
                for inner in body {
                    self.exec_stmt(inner, importer, console)?;
                }
            },
        }
    }

    fn bind(&mut self, name: String, value: Value) -> Result<(), EvalError> {
        self.scope.insert(name, value);
        let total: u64 = self
            .scope
            .iter()
            .map(|(k, v)| k.len() as u64 + v.approx_size())
            .sum();
        self.memory.account(total)
    }

    fn charge(&mut self, amount: u64) -> Result<(), EvalError> {
        if let Some(flag) = &self.cancel {
            if flag.load(Ordering::Relaxed) {
                return Err(EvalError::Cancelled);
            }
        }
        self.cost.charge(amount)
    }

    fn eval_expr(&mut self, expr: &Expr, console: &mut dyn Console) -> Result<Value, EvalError> {
        self.charge(1)?;
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Name(name) => self
                .scope
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::NameNotFound(name.clone())),
            Expr::Attr { .. } => self.eval_attr_chain(expr),
            Expr::Call { callee, args } => {
                let callee_value = self.eval_expr(callee, console)?;
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(self.eval_expr(arg, console)?);
                }
                self.call_value(&callee_value, &arg_values, console)
            }
            Expr::Unary { op, operand } => {
                let value = self.eval_expr(operand, console)?;
                match op {
                    UnOp::Neg => match value {
                        Value::Int(n) => Ok(Value::Int(n.wrapping_neg())),
                        Value::Float(f) => Ok(Value::Float(-f)),
                        other => Err(EvalError::TypeMismatch {
                            op: "-".to_string(),
                            lhs: other.type_name().to_string(),
                            rhs: "nothing".to_string(),
                        }),
                    },
                    UnOp::Not => Ok(Value::Bool(!value.truthy())),
                }
            }
            Expr::Binary { op, lhs, rhs } => match op {
                BinOp::And => {
                    let left = self.eval_expr(lhs, console)?;
                    if left.truthy() {
                        self.eval_expr(rhs, console)
                    } else {
                        Ok(left)
                    }
                }
                BinOp::Or => {
                    let left = self.eval_expr(lhs, console)?;
                    if left.truthy() {
                        Ok(left)
                    } else {
                        self.eval_expr(rhs, console)
                    }
                }
                _ => {
                    let left = self.eval_expr(lhs, console)?;
                    let right = self.eval_expr(rhs, console)?;
                    apply_binop(*op, &left, &right)
                }
            },
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expr(item, console)?);
                }
                Ok(Value::List(values))
            }
        }
    }

    // Attribute chains double as dotted-name lookups: `import a.b` binds
    // the module under the literal dotted key, so `a.b.c` first finds the
    // longest scope binding along the chain, then walks the rest as module
    // attributes.
    fn eval_attr_chain(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        let mut segments = Vec::new();
        let mut cursor = expr;
        loop {
            match cursor {
                Expr::Attr { object, name } => {
                    segments.push(name.as_str());
                    cursor = object;
                }
                Expr::Name(name) => {
                    segments.push(name.as_str());
                    break;
                }
                // Chains rooted in non-name expressions (e.g. a call result)
                // have no dotted-name reading; attributes only exist on
                // modules, which always live under names.
                other => {
                    return Err(EvalError::AttributeNotFound {
                        object: describe_expr(other),
                        name: segments.last().map(|s| (*s).to_string()).unwrap_or_default(),
                    });
                }
            }
        }
        segments.reverse();

        for split in (1..=segments.len()).rev() {
            let dotted = segments[..split].join(".");
            if let Some(base) = self.scope.get(&dotted).cloned() {
                return walk_attrs(base, &segments[split..]);
            }
        }
        Err(EvalError::NameNotFound(segments[0].to_string()))
    }

    fn call_value(
        &mut self,
        callee: &Value,
        args: &[Value],
        console: &mut dyn Console,
    ) -> Result<Value, EvalError> {
        self.charge(1)?;
        match callee {
            Value::Builtin(Builtin::Print) => {
                let rendered: Vec<String> = args.iter().map(Value::repr).collect();
                let mut text = rendered.join(" ");
                text.push('\n');
                console.stdout(&text)?;
                Ok(Value::None)
            }
            Value::Builtin(builtin) => builtin.apply(args),
            Value::Native(native) => native.call(args),
            other => Err(EvalError::NotCallable(other.type_name().to_string())),
        }
    }
}

fn walk_attrs(mut value: Value, attrs: &[&str]) -> Result<Value, EvalError> {
    for attr in attrs {
        match value {
            Value::Module(ref module) => {
                let next = module.attr(attr).cloned().ok_or_else(|| {
                    EvalError::AttributeNotFound {
                        object: format!("module '{}'", module.name()),
                        name: (*attr).to_string(),
                    }
                })?;
                value = next;
            }
            other => {
                return Err(EvalError::AttributeNotFound {
                    object: other.type_name().to_string(),
                    name: (*attr).to_string(),
                })
            }
        }
    }
    Ok(value)
}

fn describe_expr(expr: &Expr) -> String {
    match expr {
        Expr::Literal(v) => v.type_name().to_string(),
        Expr::Call { .. } => "call result".to_string(),
        Expr::List(_) => "list".to_string(),
        _ => "expression".to_string(),
    }
}

fn apply_binop(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    use Value::{Float, Int, List, Str};

    let type_error = || EvalError::TypeMismatch {
        op: op.symbol().to_string(),
        lhs: lhs.type_name().to_string(),
        rhs: rhs.type_name().to_string(),
    };

    match op {
        BinOp::Add => match (lhs, rhs) {
            (Int(a), Int(b)) => Ok(Int(a.wrapping_add(*b))),
            (Str(a), Str(b)) => Ok(Str(format!("{a}{b}"))),
            (List(a), List(b)) => {
                let mut out = a.clone();
                out.extend(b.iter().cloned());
                Ok(List(out))
            }
            _ => numeric_op(lhs, rhs, type_error, |a, b| a + b),
        },
        BinOp::Sub => match (lhs, rhs) {
            (Int(a), Int(b)) => Ok(Int(a.wrapping_sub(*b))),
            _ => numeric_op(lhs, rhs, type_error, |a, b| a - b),
        },
        BinOp::Mul => match (lhs, rhs) {
            (Int(a), Int(b)) => Ok(Int(a.wrapping_mul(*b))),
            _ => numeric_op(lhs, rhs, type_error, |a, b| a * b),
        },
        // Division always yields a float; a zero divisor of either type
        // is a user error, never a panic.
        BinOp::Div => {
            let a = as_f64(lhs).ok_or_else(type_error)?;
            let b = as_f64(rhs).ok_or_else(type_error)?;
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Float(a / b))
        }
        BinOp::Mod => match (lhs, rhs) {
            (Int(_), Int(0)) => Err(EvalError::DivisionByZero),
            (Int(a), Int(b)) => Ok(Int(a.rem_euclid(*b))),
            _ => {
                let a = as_f64(lhs).ok_or_else(type_error)?;
                let b = as_f64(rhs).ok_or_else(type_error)?;
                if b == 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                Ok(Float(a.rem_euclid(b)))
            }
        },
        BinOp::Eq => Ok(Value::Bool(values_equal(lhs, rhs))),
        BinOp::Ne => Ok(Value::Bool(!values_equal(lhs, rhs))),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ordering = match (lhs, rhs) {
                (Str(a), Str(b)) => a.partial_cmp(b),
                _ => {
                    let a = as_f64(lhs).ok_or_else(type_error)?;
                    let b = as_f64(rhs).ok_or_else(type_error)?;
                    a.partial_cmp(&b)
                }
            }
            .ok_or_else(type_error)?;
            let result = match op {
                BinOp::Lt => ordering.is_lt(),
                BinOp::Le => ordering.is_le(),
                BinOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            };
            Ok(Value::Bool(result))
        }
        BinOp::And | BinOp::Or => unreachable!("short-circuit ops handled in eval_expr"),
    }
}

fn numeric_op<E>(
    lhs: &Value,
    rhs: &Value,
    type_error: E,
    op: fn(f64, f64) -> f64,
) -> Result<Value, EvalError>
where
    E: Fn() -> EvalError,
{
    let a = as_f64(lhs).ok_or_else(&type_error)?;
    let b = as_f64(rhs).ok_or_else(&type_error)?;
    Ok(Value::Float(op(a, b)))
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Int(n) => Some(*n as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
        _ => lhs == rhs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    struct StubImporter {
        modules: IndexMap<String, Module>,
    }

    impl StubImporter {
        fn empty() -> Self {
            Self {
                modules: IndexMap::new(),
            }
        }

        fn with(module: Module) -> Self {
            let mut modules = IndexMap::new();
            modules.insert(module.name().to_string(), module);
            Self { modules }
        }
    }

    impl Importer for StubImporter {
        fn resolve(&mut self, name: &str) -> Result<Module, ImportError> {
            self.modules
                .get(name)
                .cloned()
                .ok_or_else(|| ImportError::Denied {
                    name: name.to_string(),
                })
        }
    }

    #[derive(Default)]
    struct BufferConsole {
        stdout: String,
        stderr: String,
    }

    impl Console for BufferConsole {
        fn stdout(&mut self, text: &str) -> Result<(), ConsoleError> {
            self.stdout.push_str(text);
            Ok(())
        }

        fn stderr(&mut self, text: &str) -> Result<(), ConsoleError> {
            self.stderr.push_str(text);
            Ok(())
        }
    }

    struct TinyConsole {
        written: u64,
        limit: u64,
    }

    impl Console for TinyConsole {
        fn stdout(&mut self, text: &str) -> Result<(), ConsoleError> {
            self.written += text.len() as u64;
            if self.written > self.limit {
                return Err(ConsoleError { limit: self.limit });
            }
            Ok(())
        }

        fn stderr(&mut self, text: &str) -> Result<(), ConsoleError> {
            self.stdout(text)
        }
    }

    fn base_scope() -> IndexMap<String, Value> {
        let mut scope = IndexMap::new();
        for builtin in Builtin::full_table() {
            scope.insert(builtin.name().to_string(), Value::Builtin(*builtin));
        }
        scope
    }

    fn run_source(source: &str) -> (Result<(), ScriptError>, IndexMap<String, Value>, String) {
        let program = parse(source).unwrap();
        let mut evaluator = Evaluator::new(EvalConfig::default(), base_scope());
        let mut importer = StubImporter::empty();
        let mut console = BufferConsole::default();
        let result = evaluator.run(&program, &mut importer, &mut console);
        (result, evaluator.into_scope(), console.stdout)
    }

    #[test]
    fn test_assignment_binds() {
        let (result, scope, _) = run_source("y = 42");
        result.unwrap();
        assert_eq!(scope.get("y"), Some(&Value::Int(42)));
    }

    #[test]
    fn test_arithmetic_and_precedence() {
        let (result, scope, _) = run_source("x = 1 + 2 * 3");
        result.unwrap();
        assert_eq!(scope.get("x"), Some(&Value::Int(7)));
    }

    #[test]
    fn test_division_yields_float() {
        let (result, scope, _) = run_source("x = 7 / 2");
        result.unwrap();
        assert_eq!(scope.get("x"), Some(&Value::Float(3.5)));
    }

    #[test]
    fn test_division_by_zero() {
        let (result, _, _) = run_source("x = 1 / 0");
        let err = result.unwrap_err();
        assert_eq!(err.line, 1);
        assert!(matches!(err.error, EvalError::DivisionByZero));
    }

    #[test]
    fn test_name_not_found() {
        let (result, _, _) = run_source("x = missing + 1");
        assert!(matches!(
            result.unwrap_err().error,
            EvalError::NameNotFound(name) if name == "missing"
        ));
    }

    #[test]
    fn test_while_loop() {
        let (result, scope, _) = run_source("x = 0\nwhile x < 5 {\n  x = x + 1\n}");
        result.unwrap();
        assert_eq!(scope.get("x"), Some(&Value::Int(5)));
    }

    #[test]
    fn test_print_goes_to_console() {
        let (result, _, stdout) = run_source("print(\"hello\", 42)");
        result.unwrap();
        assert_eq!(stdout, "hello 42\n");
    }

    #[test]
    fn test_cost_budget_stops_infinite_loop() {
        let program = parse("while true {\n  x = 1\n}").unwrap();
        let mut evaluator =
            Evaluator::new(EvalConfig::default().with_cost_budget(1_000), base_scope());
        let mut importer = StubImporter::empty();
        let mut console = BufferConsole::default();
        let err = evaluator
            .run(&program, &mut importer, &mut console)
            .unwrap_err();
        assert!(matches!(err.error, EvalError::CostExhausted { .. }));
    }

    #[test]
    fn test_memory_limit() {
        let source = "s = \"a\"\nwhile true {\n  s = s + s\n}";
        let program = parse(source).unwrap();
        let mut evaluator = Evaluator::new(
            EvalConfig::default().with_memory_limit(16 * 1024),
            base_scope(),
        );
        let mut importer = StubImporter::empty();
        let mut console = BufferConsole::default();
        let err = evaluator
            .run(&program, &mut importer, &mut console)
            .unwrap_err();
        assert!(matches!(err.error, EvalError::MemoryExceeded { .. }));
        assert!(evaluator.memory_peak() > 16 * 1024);
    }

    #[test]
    fn test_cancellation_flag() {
        let flag = Arc::new(AtomicBool::new(true));
        let program = parse("x = 1").unwrap();
        let mut evaluator =
            Evaluator::new(EvalConfig::default().with_cancel(flag), base_scope());
        let mut importer = StubImporter::empty();
        let mut console = BufferConsole::default();
        let err = evaluator
            .run(&program, &mut importer, &mut console)
            .unwrap_err();
        assert!(matches!(err.error, EvalError::Cancelled));
    }

    #[test]
    fn test_import_binds_and_attr_resolves() {
        let module = Module::new("math")
            .with_attr("pi", Value::Float(std::f64::consts::PI))
            .with_fn("sqrt", |args| match args {
                [Value::Int(n)] => Ok(Value::Float((*n as f64).sqrt())),
                [Value::Float(f)] => Ok(Value::Float(f.sqrt())),
                _ => Err(EvalError::ValueError("sqrt expects a number".to_string())),
            });
        let program = parse("import math\nr = math.sqrt(16)").unwrap();
        let mut evaluator = Evaluator::new(EvalConfig::default(), base_scope());
        let mut importer = StubImporter::with(module);
        let mut console = BufferConsole::default();
        evaluator
            .run(&program, &mut importer, &mut console)
            .unwrap();
        assert_eq!(evaluator.scope().get("r"), Some(&Value::Float(4.0)));
    }

    #[test]
    fn test_dotted_import_binds_under_dotted_name() {
        let module = Module::new("plot.backend").with_attr("dpi", Value::Int(96));
        let program = parse("import plot.backend\nd = plot.backend.dpi").unwrap();
        let mut evaluator = Evaluator::new(EvalConfig::default(), base_scope());
        let mut importer = StubImporter::with(module);
        let mut console = BufferConsole::default();
        evaluator
            .run(&program, &mut importer, &mut console)
            .unwrap();
        assert!(evaluator.scope().contains_key("plot.backend"));
        assert_eq!(evaluator.scope().get("d"), Some(&Value::Int(96)));
    }

    #[test]
    fn test_denied_import_surfaces_import_error() {
        let (result, scope, _) = {
            let program = parse("import os").unwrap();
            let mut evaluator = Evaluator::new(EvalConfig::default(), base_scope());
            let mut importer = StubImporter::empty();
            let mut console = BufferConsole::default();
            let result = evaluator.run(&program, &mut importer, &mut console);
            (result, evaluator.into_scope(), ())
        };
        assert!(matches!(
            result.unwrap_err().error,
            EvalError::Import(ImportError::Denied { .. })
        ));
        assert!(!scope.contains_key("os"));
    }

    #[test]
    fn test_attribute_missing_on_module() {
        let module = Module::new("math").with_attr("pi", Value::Float(3.14));
        let program = parse("x = math.tau").unwrap();
        let mut evaluator = Evaluator::new(EvalConfig::default(), base_scope());
        evaluator
            .scope
            .insert("math".to_string(), Value::Module(module));
        let mut importer = StubImporter::empty();
        let mut console = BufferConsole::default();
        let err = evaluator
            .run(&program, &mut importer, &mut console)
            .unwrap_err();
        assert!(matches!(err.error, EvalError::AttributeNotFound { .. }));
    }

    #[test]
    fn test_output_ceiling_maps_to_output_exceeded() {
        let program = parse("while true {\n  print(\"xxxxxxxxxx\")\n}").unwrap();
        let mut evaluator = Evaluator::new(EvalConfig::default(), base_scope());
        let mut importer = StubImporter::empty();
        let mut console = TinyConsole {
            written: 0,
            limit: 64,
        };
        let err = evaluator
            .run(&program, &mut importer, &mut console)
            .unwrap_err();
        assert!(matches!(err.error, EvalError::OutputExceeded { limit: 64 }));
    }

    #[test]
    fn test_short_circuit_avoids_rhs() {
        let (result, scope, _) = run_source("x = false and missing\ny = true or missing");
        result.unwrap();
        assert_eq!(scope.get("x"), Some(&Value::Bool(false)));
        assert_eq!(scope.get("y"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_string_concat_and_comparison() {
        let (result, scope, _) = run_source("s = \"ab\" + \"cd\"\nt = \"a\" < \"b\"");
        result.unwrap();
        assert_eq!(scope.get("s"), Some(&Value::Str("abcd".to_string())));
        assert_eq!(scope.get("t"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_builtins_reachable_from_scope() {
        let (result, scope, _) = run_source("n = len(\"abc\")\nm = max(1, 2, 3)");
        result.unwrap();
        assert_eq!(scope.get("n"), Some(&Value::Int(3)));
        assert_eq!(scope.get("m"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_error_line_is_reported() {
        let (result, _, _) = run_source("a = 1\nb = 2\nc = 1 / 0");
        assert_eq!(result.unwrap_err().line, 3);
    }

    #[test]
    fn test_not_callable() {
        let (result, _, _) = run_source("x = 5\nx()");
        assert!(matches!(
            result.unwrap_err().error,
            EvalError::NotCallable(t) if t == "int"
        ));
    }

    #[test]
    fn test_mixed_numeric_promotion() {
        let (result, scope, _) = run_source("x = 1 + 2.5");
        result.unwrap();
        assert_eq!(scope.get("x"), Some(&Value::Float(3.5)));
    }
}
