//! Hand-written lexer.
//!
//! Newlines are significant: they terminate statements, so the lexer emits
//! them as tokens and the parser treats them as separators. `#` starts a
//! comment running to the end of the line.

use crate::error::LexError;

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifier
    Ident(String),
    /// Integer literal
    Int(i64),
    /// Float literal
    Float(f64),
    /// String literal (unquoted content)
    Str(String),
    /// `import`
    Import,
    /// `while`
    While,
    /// `and`
    And,
    /// `or`
    Or,
    /// `not`
    Not,
    /// `true`
    True,
    /// `false`
    False,
    /// `none`
    None,
    /// `=`
    Assign,
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
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// End of line
    Newline,
}

impl Token {
    /// Short description for parse errors
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("identifier '{name}'"),
            Token::Int(n) => format!("integer {n}"),
            Token::Float(f) => format!("float {f}"),
            Token::Str(_) => "string literal".to_string(),
            Token::Import => "'import'".to_string(),
            Token::While => "'while'".to_string(),
            Token::And => "'and'".to_string(),
            Token::Or => "'or'".to_string(),
            Token::Not => "'not'".to_string(),
            Token::True => "'true'".to_string(),
            Token::False => "'false'".to_string(),
            Token::None => "'none'".to_string(),
            Token::Assign => "'='".to_string(),
            Token::Eq => "'=='".to_string(),
            Token::Ne => "'!='".to_string(),
            Token::Lt => "'<'".to_string(),
            Token::Le => "'<='".to_string(),
            Token::Gt => "'>'".to_string(),
            Token::Ge => "'>='".to_string(),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::Percent => "'%'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::LBracket => "'['".to_string(),
            Token::RBracket => "']'".to_string(),
            Token::LBrace => "'{'".to_string(),
            Token::RBrace => "'}'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Dot => "'.'".to_string(),
            Token::Newline => "end of line".to_string(),
        }
    }
}

/// A token with its source line.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    /// The token
    pub token: Token,
    /// One-based source line
    pub line: u32,
}

/// Tokenize a source string.
///
/// # Errors
///
/// Returns error on characters outside the alphabet, unterminated
/// strings, or malformed numeric literals.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, LexError> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut line: u32 = 1;

    while let Some(&ch) = chars.peek() {
        match ch {
            '\n' => {
                chars.next();
                tokens.push(Spanned { token: Token::Newline, line });
                line += 1;
            }
            ' ' | '\t' | '\r' => {
                chars.next();
            }
            '#' => {
                while let Some(&c) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '"' | '\'' => {
                let quote = ch;
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match c {
                        '\n' => return Err(LexError::UnterminatedString { line }),
                        '\\' => match chars.next() {
                            Some('n') => text.push('\n'),
                            Some('t') => text.push('\t'),
                            Some('\\') => text.push('\\'),
                            Some(q) if q == quote => text.push(q),
                            Some(other) => {
                                text.push('\\');
                                text.push(other);
                            }
                            None => return Err(LexError::UnterminatedString { line }),
                        },
                        c if c == quote => {
                            closed = true;
                            break;
                        }
                        c => text.push(c),
                    }
                }
                if !closed {
                    return Err(LexError::UnterminatedString { line });
                }
                tokens.push(Spanned { token: Token::Str(text), line });
            }
            c if c.is_ascii_digit() => {
                let mut text = String::new();
                let mut is_float = false;
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() {
                        text.push(c);
                        chars.next();
                    } else if c == '.' && !is_float {
                        // A dot is part of the number only when a digit follows;
                        // otherwise it is attribute access on an integer.
                        let mut lookahead = chars.clone();
                        lookahead.next();
                        if lookahead.peek().is_some_and(char::is_ascii_digit) {
                            is_float = true;
                            text.push(c);
                            chars.next();
                        } else {
                            break;
                        }
                    } else {
                        break;
                    }
                }
                let token = if is_float {
                    Token::Float(text.parse().map_err(|_| LexError::InvalidNumber {
                        text: text.clone(),
                        line,
                    })?)
                } else {
                    Token::Int(text.parse().map_err(|_| LexError::InvalidNumber {
                        text: text.clone(),
                        line,
                    })?)
                };
                tokens.push(Spanned { token, line });
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut text = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        text.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let token = match text.as_str() {
                    "import" => Token::Import,
                    "while" => Token::While,
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "true" => Token::True,
                    "false" => Token::False,
                    "none" => Token::None,
                    _ => Token::Ident(text),
                };
                tokens.push(Spanned { token, line });
            }
            '=' => {
                chars.next();
                let token = if chars.peek() == Some(&'=') {
                    chars.next();
                    Token::Eq
                } else {
                    Token::Assign
                };
                tokens.push(Spanned { token, line });
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Spanned { token: Token::Ne, line });
                } else {
                    return Err(LexError::UnexpectedChar { ch: '!', line });
                }
            }
            '<' => {
                chars.next();
                let token = if chars.peek() == Some(&'=') {
                    chars.next();
                    Token::Le
                } else {
                    Token::Lt
                };
                tokens.push(Spanned { token, line });
            }
            '>' => {
                chars.next();
                let token = if chars.peek() == Some(&'=') {
                    chars.next();
                    Token::Ge
                } else {
                    Token::Gt
                };
                tokens.push(Spanned { token, line });
            }
            '+' | '-' | '*' | '/' | '%' | '(' | ')' | '[' | ']' | '{' | '}' | ',' | '.' => {
                chars.next();
                let token = match ch {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '%' => Token::Percent,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    '{' => Token::LBrace,
                    '}' => Token::RBrace,
                    ',' => Token::Comma,
                    _ => Token::Dot,
                };
                tokens.push(Spanned { token, line });
            }
            other => return Err(LexError::UnexpectedChar { ch: other, line }),
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn test_assignment() {
        assert_eq!(
            kinds("x = 42"),
            vec![Token::Ident("x".to_string()), Token::Assign, Token::Int(42)]
        );
    }

    #[test]
    fn test_float_vs_attribute_dot() {
        assert_eq!(kinds("1.5"), vec![Token::Float(1.5)]);
        assert_eq!(
            kinds("math.pi"),
            vec![
                Token::Ident("math".to_string()),
                Token::Dot,
                Token::Ident("pi".to_string())
            ]
        );
    }

    #[test]
    fn test_keywords_and_comparison() {
        assert_eq!(
            kinds("while x <= 10"),
            vec![
                Token::While,
                Token::Ident("x".to_string()),
                Token::Le,
                Token::Int(10)
            ]
        );
    }

    #[test]
    fn test_comment_skipped_newline_kept() {
        let tokens = kinds("x = 1 # set x\ny = 2");
        assert!(tokens.contains(&Token::Newline));
        assert!(!tokens.iter().any(|t| matches!(t, Token::Str(_))));
        assert_eq!(tokens.len(), 7);
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a\nb""#),
            vec![Token::Str("a\nb".to_string())]
        );
    }

    #[test]
    fn test_unterminated_string() {
        assert!(matches!(
            tokenize("\"abc"),
            Err(LexError::UnterminatedString { line: 1 })
        ));
    }

    #[test]
    fn test_unexpected_char() {
        assert!(matches!(
            tokenize("x = @"),
            Err(LexError::UnexpectedChar { ch: '@', line: 1 })
        ));
    }

    #[test]
    fn test_line_numbers() {
        let tokens = tokenize("a = 1\nb = 2").unwrap();
        assert_eq!(tokens.first().unwrap().line, 1);
        assert_eq!(tokens.last().unwrap().line, 2);
    }
}
