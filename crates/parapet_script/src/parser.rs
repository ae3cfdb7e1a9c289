//! Recursive-descent parser.

use crate::ast::{BinOp, Expr, Program, Stmt, UnOp};
use crate::error::ParseError;
use crate::lexer::{tokenize, Spanned, Token};
use crate::value::Value;

/// Parse a source string into a program.
///
/// # Errors
///
/// Returns error on lexical or syntactic failure
pub fn parse(source: &str) -> Result<Program, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.program()
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn program(&mut self) -> Result<Program, ParseError> {
        let mut stmts = Vec::new();
        loop {
            self.skip_newlines();
            if self.peek().is_none() {
                break;
            }
            stmts.push(self.stmt()?);
        }
        Ok(Program { stmts })
    }

    fn stmt(&mut self) -> Result<Stmt, ParseError> {
        let line = self.current_line();
        match self.peek() {
            Some(Token::Import) => {
                self.advance();
                let name = self.dotted_name()?;
                self.end_of_stmt()?;
                Ok(Stmt::Import { name, line })
            }
            Some(Token::While) => {
                self.advance();
                let cond = self.expr()?;
                self.expect(Token::LBrace, "'{'")?;
                let mut body = Vec::new();
                loop {
                    self.skip_newlines();
                    match self.peek() {
                        Some(Token::RBrace) => {
                            self.advance();
                            break;
                        }
                        Some(_) => body.push(self.stmt()?),
                        None => {
                            return Err(ParseError::UnexpectedEof {
                                expected: "'}'".to_string(),
                            })
                        }
                    }
                }
                self.end_of_stmt()?;
                Ok(Stmt::While { cond, body, line })
            }
            Some(_) => {
                let expr = self.expr()?;
                if self.peek() == Some(&Token::Assign) {
                    let name = match expr {
                        Expr::Name(name) => name,
                        _ => return Err(ParseError::InvalidAssignTarget { line }),
                    };
                    self.advance();
                    let rhs = self.expr()?;
                    self.end_of_stmt()?;
                    Ok(Stmt::Assign { name, expr: rhs, line })
                } else {
                    self.end_of_stmt()?;
                    Ok(Stmt::Expr { expr, line })
                }
            }
            None => Err(ParseError::UnexpectedEof {
                expected: "statement".to_string(),
            }),
        }
    }

    fn dotted_name(&mut self) -> Result<String, ParseError> {
        let mut name = self.ident("module name")?;
        while self.peek() == Some(&Token::Dot) {
            self.advance();
            name.push('.');
            name.push_str(&self.ident("module name segment")?);
        }
        Ok(name)
    }

    // Precedence climbing, loosest first: or, and, comparison, additive,
    // multiplicative, unary, postfix.
    fn expr(&mut self) -> Result<Expr, ParseError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            let rhs = self.and_expr()?;
            lhs = binary(BinOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.comparison()?;
        while self.peek() == Some(&Token::And) {
            self.advance();
            let rhs = self.comparison()?;
            lhs = binary(BinOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.additive()?;
        let op = match self.peek() {
            Some(Token::Eq) => BinOp::Eq,
            Some(Token::Ne) => BinOp::Ne,
            Some(Token::Lt) => BinOp::Lt,
            Some(Token::Le) => BinOp::Le,
            Some(Token::Gt) => BinOp::Gt,
            Some(Token::Ge) => BinOp::Ge,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.additive()?;
        Ok(binary(op, lhs, rhs))
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            Some(Token::Minus) => UnOp::Neg,
            Some(Token::Not) => UnOp::Not,
            _ => return self.postfix(),
        };
        self.advance();
        let operand = self.unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.advance();
                    let name = self.ident("attribute name")?;
                    expr = Expr::Attr {
                        object: Box::new(expr),
                        name,
                    };
                }
                Some(Token::LParen) => {
                    self.advance();
                    let mut args = Vec::new();
                    if self.peek() != Some(&Token::RParen) {
                        loop {
                            args.push(self.expr()?);
                            match self.peek() {
                                Some(Token::Comma) => {
                                    self.advance();
                                }
                                _ => break,
                            }
                        }
                    }
                    self.expect(Token::RParen, "')'")?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let line = self.current_line();
        match self.advance() {
            Some(Token::Int(n)) => Ok(Expr::Literal(Value::Int(n))),
            Some(Token::Float(f)) => Ok(Expr::Literal(Value::Float(f))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::Str(s))),
            Some(Token::True) => Ok(Expr::Literal(Value::Bool(true))),
            Some(Token::False) => Ok(Expr::Literal(Value::Bool(false))),
            Some(Token::None) => Ok(Expr::Literal(Value::None)),
            Some(Token::Ident(name)) => Ok(Expr::Name(name)),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::LBracket) => {
                let mut items = Vec::new();
                self.skip_newlines();
                if self.peek() != Some(&Token::RBracket) {
                    loop {
                        items.push(self.expr()?);
                        self.skip_newlines();
                        match self.peek() {
                            Some(Token::Comma) => {
                                self.advance();
                                self.skip_newlines();
                                if self.peek() == Some(&Token::RBracket) {
                                    break;
                                }
                            }
                            _ => break,
                        }
                    }
                }
                self.expect(Token::RBracket, "']'")?;
                Ok(Expr::List(items))
            }
            Some(other) => Err(ParseError::Unexpected {
                found: other.describe(),
                expected: "expression".to_string(),
                line,
            }),
            None => Err(ParseError::UnexpectedEof {
                expected: "expression".to_string(),
            }),
        }
    }

    fn ident(&mut self, expected: &str) -> Result<String, ParseError> {
        let line = self.current_line();
        match self.advance() {
            Some(Token::Ident(name)) => Ok(name),
            Some(other) => Err(ParseError::Unexpected {
                found: other.describe(),
                expected: expected.to_string(),
                line,
            }),
            None => Err(ParseError::UnexpectedEof {
                expected: expected.to_string(),
            }),
        }
    }

    fn end_of_stmt(&mut self) -> Result<(), ParseError> {
        match self.peek() {
            None | Some(Token::Newline) | Some(Token::RBrace) => {
                if self.peek() == Some(&Token::Newline) {
                    self.advance();
                }
                Ok(())
            }
            Some(other) => Err(ParseError::Unexpected {
                found: other.describe(),
                expected: "end of statement".to_string(),
                line: self.current_line(),
            }),
        }
    }

    fn expect(&mut self, token: Token, expected: &str) -> Result<(), ParseError> {
        self.skip_newlines_if(matches!(token, Token::RBrace | Token::LBrace));
        let line = self.current_line();
        match self.advance() {
            Some(found) if found == token => Ok(()),
            Some(found) => Err(ParseError::Unexpected {
                found: found.describe(),
                expected: expected.to_string(),
                line,
            }),
            None => Err(ParseError::UnexpectedEof {
                expected: expected.to_string(),
            }),
        }
    }

    fn skip_newlines(&mut self) {
        while self.peek() == Some(&Token::Newline) {
            self.advance();
        }
    }

    fn skip_newlines_if(&mut self, cond: bool) {
        if cond {
            self.skip_newlines();
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn current_line(&self) -> u32 {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |s| s.line)
    }
}

fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignment() {
        let program = parse("y = 42").unwrap();
        assert_eq!(
            program.stmts,
            vec![Stmt::Assign {
                name: "y".to_string(),
                expr: Expr::Literal(Value::Int(42)),
                line: 1,
            }]
        );
    }

    #[test]
    fn test_parse_import_dotted() {
        let program = parse("import plot.backend").unwrap();
        assert_eq!(
            program.stmts,
            vec![Stmt::Import {
                name: "plot.backend".to_string(),
                line: 1,
            }]
        );
    }

    #[test]
    fn test_precedence() {
        let program = parse("x = 1 + 2 * 3").unwrap();
        let Stmt::Assign { expr, .. } = &program.stmts[0] else {
            panic!("expected assignment");
        };
        let Expr::Binary { op: BinOp::Add, rhs, .. } = expr else {
            panic!("expected + at the root, got {expr:?}");
        };
        assert!(matches!(**rhs, Expr::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn test_parse_while_block() {
        let program = parse("while x < 10 {\n  x = x + 1\n}").unwrap();
        let Stmt::While { body, .. } = &program.stmts[0] else {
            panic!("expected while");
        };
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn test_parse_call_and_attr() {
        let program = parse("print(math.sqrt(16))").unwrap();
        let Stmt::Expr { expr, .. } = &program.stmts[0] else {
            panic!("expected expression statement");
        };
        let Expr::Call { callee, args } = expr else {
            panic!("expected call");
        };
        assert_eq!(**callee, Expr::Name("print".to_string()));
        assert!(matches!(args[0], Expr::Call { .. }));
    }

    #[test]
    fn test_invalid_assign_target() {
        assert!(matches!(
            parse("a.b = 1"),
            Err(ParseError::InvalidAssignTarget { line: 1 })
        ));
    }

    #[test]
    fn test_unexpected_eof() {
        assert!(matches!(
            parse("x = "),
            Err(ParseError::UnexpectedEof { .. })
        ));
        assert!(matches!(
            parse("while true {"),
            Err(ParseError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let program = parse("# header\n\nx = 1\n\n# trailing\n").unwrap();
        assert_eq!(program.stmts.len(), 1);
    }

    #[test]
    fn test_list_literal() {
        let program = parse("xs = [1, 2.5, \"a\"]").unwrap();
        let Stmt::Assign { expr: Expr::List(items), .. } = &program.stmts[0] else {
            panic!("expected list assignment");
        };
        assert_eq!(items.len(), 3);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // Untrusted source text must never panic the front end; it
            // either parses or yields a structured error.
            #[test]
            fn prop_parse_never_panics(source in "\\PC{0,256}") {
                let _ = parse(&source);
            }

            #[test]
            fn prop_int_assignment_roundtrips(n in proptest::num::i64::ANY) {
                if let Ok(program) = parse(&format!("x = {n}")) {
                    prop_assert_eq!(program.stmts.len(), 1);
                }
            }
        }
    }
}
