//! Tokenizer and recursive-descent parser for template expressions.
//!
//! Precedence, lowest first: `||`, `&&`, `== !=`, `< <= > >=`, `+ -`,
//! `* / %`, unary `! -`, then postfix member access, indexing, and method
//! calls.

use serde_json::{Number, Value};

use super::EvaluationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Or,
    And,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    List(Vec<Expr>),
    Variable(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call {
        target: Box<Expr>,
        method: String,
        arguments: Vec<Expr>,
    },
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(Number),
    Text(String),
    Identifier(String),
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Dot,
    Comma,
    Bang,
    Minus,
    Plus,
    Star,
    Slash,
    Percent,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    EqualEqual,
    BangEqual,
    AmpAmp,
    PipePipe,
}

/// Longest accepted expression, in tokens. Bounds the depth of left-leaning
/// operator chains, which the evaluator walks recursively.
const MAX_TOKENS: usize = 1024;

/// Deepest accepted nesting of parentheses, brackets, and prefix operators.
const MAX_NESTING: usize = 64;

/// Parses expression source into an AST.
pub(crate) fn parse(source: &str) -> Result<Expr, EvaluationError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        source,
        tokens,
        position: 0,
        nesting: 0,
    };
    let expression = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(parser.error(format!("unexpected trailing token {token:?}")));
    }
    Ok(expression)
}

fn tokenize(source: &str) -> Result<Vec<Token>, EvaluationError> {
    let error = |reason: String| EvaluationError::Parse {
        expression: source.to_string(),
        reason,
    };
    let mut tokens = Vec::new();
    let mut characters = source.char_indices().peekable();

    while let Some((start, character)) = characters.next() {
        let token = match character {
            c if c.is_whitespace() => continue,
            '(' => Token::LeftParen,
            ')' => Token::RightParen,
            '[' => Token::LeftBracket,
            ']' => Token::RightBracket,
            '.' => Token::Dot,
            ',' => Token::Comma,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '!' => {
                if characters.next_if(|(_, next)| *next == '=').is_some() {
                    Token::BangEqual
                } else {
                    Token::Bang
                }
            }
            '<' => {
                if characters.next_if(|(_, next)| *next == '=').is_some() {
                    Token::LessEqual
                } else {
                    Token::Less
                }
            }
            '>' => {
                if characters.next_if(|(_, next)| *next == '=').is_some() {
                    Token::GreaterEqual
                } else {
                    Token::Greater
                }
            }
            '=' => {
                if characters.next_if(|(_, next)| *next == '=').is_some() {
                    Token::EqualEqual
                } else {
                    return Err(error("assignment is not supported; use '==' to compare".to_string()));
                }
            }
            '&' => {
                if characters.next_if(|(_, next)| *next == '&').is_some() {
                    Token::AmpAmp
                } else {
                    return Err(error("expected '&&'".to_string()));
                }
            }
            '|' => {
                if characters.next_if(|(_, next)| *next == '|').is_some() {
                    Token::PipePipe
                } else {
                    return Err(error("expected '||'".to_string()));
                }
            }
            quote @ ('"' | '\'') => {
                let mut text = String::new();
                let mut closed = false;
                while let Some((_, next)) = characters.next() {
                    match next {
                        '\\' => match characters.next() {
                            Some((_, 'n')) => text.push('\n'),
                            Some((_, 't')) => text.push('\t'),
                            Some((_, escaped)) => text.push(escaped),
                            None => break,
                        },
                        c if c == quote => {
                            closed = true;
                            break;
                        }
                        c => text.push(c),
                    }
                }
                if !closed {
                    return Err(error("unterminated string literal".to_string()));
                }
                Token::Text(text)
            }
            c if c.is_ascii_digit() => {
                let mut end = start + c.len_utf8();
                let mut is_float = false;
                while let Some(&(index, next)) = characters.peek() {
                    if next.is_ascii_digit() {
                        end = index + next.len_utf8();
                        characters.next();
                    } else if next == '.' && !is_float && source[index + 1..].starts_with(|d: char| d.is_ascii_digit()) {
                        is_float = true;
                        end = index + 1;
                        characters.next();
                    } else {
                        break;
                    }
                }
                let literal = &source[start..end];
                let number = if is_float {
                    literal
                        .parse::<f64>()
                        .ok()
                        .and_then(Number::from_f64)
                        .ok_or_else(|| error(format!("invalid number '{literal}'")))?
                } else {
                    literal
                        .parse::<i64>()
                        .map(Number::from)
                        .map_err(|_| error(format!("integer '{literal}' is out of range")))?
                };
                Token::Number(number)
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let mut end = start + c.len_utf8();
                while let Some(&(index, next)) = characters.peek() {
                    if next.is_alphanumeric() || next == '_' || next == '$' {
                        end = index + next.len_utf8();
                        characters.next();
                    } else {
                        break;
                    }
                }
                Token::Identifier(source[start..end].to_string())
            }
            other => return Err(error(format!("unexpected character '{other}'"))),
        };
        tokens.push(token);
        if tokens.len() > MAX_TOKENS {
            return Err(error(format!("expression is longer than {MAX_TOKENS} tokens")));
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    position: usize,
    nesting: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), EvaluationError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected {expected:?}, found {:?}", self.peek())))
        }
    }

    fn error(&self, reason: String) -> EvaluationError {
        EvaluationError::Parse {
            expression: self.source.to_string(),
            reason,
        }
    }

    fn parse_or(&mut self) -> Result<Expr, EvaluationError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::PipePipe) {
            let right = self.parse_and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, EvaluationError> {
        let mut left = self.parse_equality()?;
        while self.eat(&Token::AmpAmp) {
            let right = self.parse_equality()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, EvaluationError> {
        let mut left = self.parse_comparison()?;
        loop {
            let operator = match self.peek() {
                Some(Token::EqualEqual) => BinaryOp::Equal,
                Some(Token::BangEqual) => BinaryOp::NotEqual,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = Expr::Binary(operator, Box::new(left), Box::new(right));
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, EvaluationError> {
        let mut left = self.parse_additive()?;
        loop {
            let operator = match self.peek() {
                Some(Token::Less) => BinaryOp::Less,
                Some(Token::LessEqual) => BinaryOp::LessEqual,
                Some(Token::Greater) => BinaryOp::Greater,
                Some(Token::GreaterEqual) => BinaryOp::GreaterEqual,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::Binary(operator, Box::new(left), Box::new(right));
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, EvaluationError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let operator = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Subtract,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(operator, Box::new(left), Box::new(right));
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, EvaluationError> {
        let mut left = self.parse_unary()?;
        loop {
            let operator = match self.peek() {
                Some(Token::Star) => BinaryOp::Multiply,
                Some(Token::Slash) => BinaryOp::Divide,
                Some(Token::Percent) => BinaryOp::Remainder,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary(operator, Box::new(left), Box::new(right));
        }
    }

    /// Every recursive path re-enters through here, so the nesting limit is
    /// enforced in one place.
    fn parse_unary(&mut self) -> Result<Expr, EvaluationError> {
        if self.nesting >= MAX_NESTING {
            return Err(self.error(format!("expression is nested deeper than {MAX_NESTING} levels")));
        }
        self.nesting += 1;
        let expression = self.parse_prefixed();
        self.nesting -= 1;
        expression
    }

    fn parse_prefixed(&mut self) -> Result<Expr, EvaluationError> {
        if self.eat(&Token::Bang) {
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(self.parse_unary()?)));
        }
        if self.eat(&Token::Minus) {
            return Ok(Expr::Unary(UnaryOp::Negate, Box::new(self.parse_unary()?)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, EvaluationError> {
        let mut expression = self.parse_primary()?;
        loop {
            if self.eat(&Token::Dot) {
                let name = match self.advance() {
                    Some(Token::Identifier(name)) => name,
                    other => return Err(self.error(format!("expected field name after '.', found {other:?}"))),
                };
                if self.eat(&Token::LeftParen) {
                    let arguments = self.parse_arguments(&Token::RightParen)?;
                    expression = Expr::Call {
                        target: Box::new(expression),
                        method: name,
                        arguments,
                    };
                } else {
                    expression = Expr::Member(Box::new(expression), name);
                }
            } else if self.eat(&Token::LeftBracket) {
                let index = self.parse_or()?;
                self.expect(&Token::RightBracket)?;
                expression = Expr::Index(Box::new(expression), Box::new(index));
            } else {
                return Ok(expression);
            }
        }
    }

    fn parse_arguments(&mut self, closing: &Token) -> Result<Vec<Expr>, EvaluationError> {
        let mut arguments = Vec::new();
        if self.eat(closing) {
            return Ok(arguments);
        }
        loop {
            arguments.push(self.parse_or()?);
            if self.eat(closing) {
                return Ok(arguments);
            }
            self.expect(&Token::Comma)?;
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, EvaluationError> {
        match self.advance() {
            Some(Token::Number(number)) => Ok(Expr::Literal(Value::Number(number))),
            Some(Token::Text(text)) => Ok(Expr::Literal(Value::String(text))),
            Some(Token::Identifier(name)) => Ok(match name.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" => Expr::Literal(Value::Null),
                _ => Expr::Variable(name),
            }),
            Some(Token::LeftParen) => {
                let expression = self.parse_or()?;
                self.expect(&Token::RightParen)?;
                Ok(expression)
            }
            Some(Token::LeftBracket) => Ok(Expr::List(self.parse_arguments(&Token::RightBracket)?)),
            Some(other) => Err(self.error(format!("unexpected token {other:?}"))),
            None => Err(self.error("unexpected end of expression".to_string())),
        }
    }
}
