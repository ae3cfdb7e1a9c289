//! Error types for lexing, parsing, and evaluation.

use thiserror::Error;

/// Lexer error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    /// A character outside the language's alphabet
    #[error("line {line}: unexpected character '{ch}'")]
    UnexpectedChar {
        /// Offending character
        ch: char,
        /// Source line
        line: u32,
    },

    /// A string literal without a closing quote
    #[error("line {line}: unterminated string literal")]
    UnterminatedString {
        /// Source line
        line: u32,
    },

    /// A numeric literal that does not parse
    #[error("line {line}: invalid number '{text}'")]
    InvalidNumber {
        /// Literal text
        text: String,
        /// Source line
        line: u32,
    },
}

/// Parser error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Lexing failed
    #[error(transparent)]
    Lex(#[from] LexError),

    /// The parser met a token it cannot use here
    #[error("line {line}: unexpected {found}, expected {expected}")]
    Unexpected {
        /// What was found
        found: String,
        /// What was expected
        expected: String,
        /// Source line
        line: u32,
    },

    /// Input ended mid-construct
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof {
        /// What was expected
        expected: String,
    },

    /// Assignment target is not a plain name
    #[error("line {line}: cannot assign to this expression")]
    InvalidAssignTarget {
        /// Source line
        line: u32,
    },
}

/// Import resolution failure, surfaced by the importer the evaluator holds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    /// The capability policy denies this module
    #[error("import of '{name}' is not allowed")]
    Denied {
        /// Requested module name
        name: String,
    },

    /// The per-execution import ceiling was exceeded
    #[error("import limit exceeded: {limit}")]
    LimitExceeded {
        /// Configured ceiling
        limit: u32,
    },

    /// No resolver in the chain knows this module
    #[error("no module named '{name}'")]
    NotFound {
        /// Requested module name
        name: String,
    },

    /// A resolver failed while loading the module
    #[error("failed to import '{name}': {reason}")]
    Failed {
        /// Requested module name
        name: String,
        /// Underlying reason
        reason: String,
    },
}

/// Raised by a console sink when the output ceiling is hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("output limit exceeded: {limit} bytes")]
pub struct ConsoleError {
    /// Configured output ceiling in bytes
    pub limit: u64,
}

/// Evaluation error raised by executed code or the meters bounding it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Division or modulo by zero
    #[error("division by zero")]
    DivisionByZero,

    /// An unbound name was referenced
    #[error("name '{0}' is not defined")]
    NameNotFound(String),

    /// A symbol denied by the capability policy was invoked
    #[error("use of '{0}' is not allowed")]
    Forbidden(String),

    /// Attribute missing from a module or unsupported on a value
    #[error("'{object}' has no attribute '{name}'")]
    AttributeNotFound {
        /// The object's description (module name or type)
        object: String,
        /// The missing attribute
        name: String,
    },

    /// Operand types do not fit the operator
    #[error("unsupported operand types for {op}: {lhs} and {rhs}")]
    TypeMismatch {
        /// Operator rendering
        op: String,
        /// Left operand type
        lhs: String,
        /// Right operand type
        rhs: String,
    },

    /// Call target is not callable
    #[error("'{0}' object is not callable")]
    NotCallable(String),

    /// Wrong number of call arguments
    #[error("{name}() takes {expected} argument(s), got {found}")]
    ArityMismatch {
        /// Callable name
        name: String,
        /// Expected argument count description
        expected: String,
        /// Supplied argument count
        found: usize,
    },

    /// A value was rejected by a conversion or builtin
    #[error("{0}")]
    ValueError(String),

    /// The operation cost budget ran out (CPU ceiling)
    #[error("cpu budget exhausted after {consumed} operations")]
    CostExhausted {
        /// Operations consumed when the budget ran out
        consumed: u64,
    },

    /// The accounted memory ceiling was exceeded
    #[error("memory limit exceeded: {limit} bytes")]
    MemoryExceeded {
        /// Configured ceiling in bytes
        limit: u64,
    },

    /// The captured output ceiling was exceeded
    #[error("output limit exceeded: {limit} bytes")]
    OutputExceeded {
        /// Configured ceiling in bytes
        limit: u64,
    },

    /// Execution was cancelled from outside
    #[error("execution cancelled")]
    Cancelled,

    /// Import resolution failed
    #[error(transparent)]
    Import(#[from] ImportError),
}

impl From<ConsoleError> for EvalError {
    fn from(err: ConsoleError) -> Self {
        Self::OutputExceeded { limit: err.limit }
    }
}

/// An evaluation error pinned to the source line it arose on.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("line {line}: {error}")]
pub struct ScriptError {
    /// Source line of the failing statement
    pub line: u32,
    /// The underlying error
    pub error: EvalError,
}

impl ScriptError {
    /// Pin an error to a line
    #[must_use]
    pub fn new(line: u32, error: EvalError) -> Self {
        Self { line, error }
    }
}
