//! Sandboxed script language for PARAPET.
//!
//! A deliberately small language - literals, assignment, arithmetic and
//! comparison expressions, attribute access, calls, `while` loops, and
//! `import` - executed by a tree-walking evaluator that charges a cost per
//! operation, polls a cancellation flag, routes console output through a
//! caller-supplied sink, and resolves imports through a caller-supplied
//! importer. The evaluator never panics on user input: every failure is a
//! structured [`EvalError`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod builtins;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod value;

pub use ast::{BinOp, Expr, Program, Stmt, UnOp};
pub use builtins::Builtin;
pub use error::{ConsoleError, EvalError, ImportError, LexError, ParseError, ScriptError};
pub use eval::{Console, CostMeter, EvalConfig, Evaluator, Importer, MemoryMeter};
pub use parser::parse;
pub use value::{Module, NativeFn, RawArtifact, Value};
