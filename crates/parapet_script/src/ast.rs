//! Abstract syntax tree.

use crate::value::Value;

/// A parsed program: a sequence of statements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    /// Top-level statements in source order
    pub stmts: Vec<Stmt>,
}

/// A statement, pinned to its source line.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `import dotted.name`
    Import {
        /// Dotted module name
        name: String,
        /// Source line
        line: u32,
    },
    /// `name = expr`
    Assign {
        /// Target name
        name: String,
        /// Right-hand side
        expr: Expr,
        /// Source line
        line: u32,
    },
    /// A bare expression evaluated for effect
    Expr {
        /// The expression
        expr: Expr,
        /// Source line
        line: u32,
    },
    /// `while cond { body }`
    While {
        /// Loop condition
        cond: Expr,
        /// Loop body
        body: Vec<Stmt>,
        /// Source line
        line: u32,
    },
}

impl Stmt {
    /// The source line this statement starts on
    #[must_use]
    pub fn line(&self) -> u32 {
        match self {
            Stmt::Import { line, .. }
            | Stmt::Assign { line, .. }
            | Stmt::Expr { line, .. }
            | Stmt::While { line, .. } => *line,
        }
    }
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/` (always yields a float)
    Div,
    /// `%`
    Mod,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `and` (short-circuit)
    And,
    /// `or` (short-circuit)
    Or,
}

impl BinOp {
    /// Source rendering, used in type errors
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    /// Arithmetic negation
    Neg,
    /// Logical negation
    Not,
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal value
    Literal(Value),
    /// A name lookup
    Name(String),
    /// `object.attr`
    Attr {
        /// The object expression
        object: Box<Expr>,
        /// The attribute name
        name: String,
    },
    /// `callee(args...)`
    Call {
        /// The callee expression
        callee: Box<Expr>,
        /// Argument expressions
        args: Vec<Expr>,
    },
    /// A unary operation
    Unary {
        /// The operator
        op: UnOp,
        /// The operand
        operand: Box<Expr>,
    },
    /// A binary operation
    Binary {
        /// The operator
        op: BinOp,
        /// Left operand
        lhs: Box<Expr>,
        /// Right operand
        rhs: Box<Expr>,
    },
    /// A list display `[a, b, c]`
    List(Vec<Expr>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stmt_line() {
        let s = Stmt::Assign {
            name: "x".to_string(),
            expr: Expr::Literal(Value::Int(1)),
            line: 7,
        };
        assert_eq!(s.line(), 7);
    }

    #[test]
    fn test_binop_symbols() {
        assert_eq!(BinOp::Div.symbol(), "/");
        assert_eq!(BinOp::And.symbol(), "and");
    }
}
