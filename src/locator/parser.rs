use thiserror::Error;

use crate::locator::locator_model::{Axis, LocationStep, LocatorPath, Operand, Predicate};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid locator at offset {offset}: {message}")]
pub struct LocatorError {
    pub offset: usize,
    pub message: String,
}

impl LocatorError {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Eq,
    NotEq,
    Comma,
    Star,
    Name(String),
    Literal(String),
    Number(usize),
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, LocatorError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;
        let token = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                i += 2;
                Token::DoubleSlash
            }
            '/' => {
                i += 1;
                Token::Slash
            }
            '[' => {
                i += 1;
                Token::LBracket
            }
            ']' => {
                i += 1;
                Token::RBracket
            }
            '(' => {
                i += 1;
                Token::LParen
            }
            ')' => {
                i += 1;
                Token::RParen
            }
            '@' => {
                i += 1;
                Token::At
            }
            ',' => {
                i += 1;
                Token::Comma
            }
            '*' => {
                i += 1;
                Token::Star
            }
            '=' => {
                i += 1;
                Token::Eq
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                i += 2;
                Token::NotEq
            }
            '\'' | '"' => {
                let quote = c;
                let close = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == quote)
                    .ok_or_else(|| LocatorError::new(start, "unterminated string literal"))?;
                let literal: String = chars[i + 1..i + 1 + close].iter().collect();
                i += close + 2;
                Token::Literal(literal)
            }
            c if c.is_ascii_digit() => {
                let mut end = i;
                while end < chars.len() && chars[end].is_ascii_digit() {
                    end += 1;
                }
                let digits: String = chars[i..end].iter().collect();
                i = end;
                let n = digits
                    .parse()
                    .map_err(|_| LocatorError::new(start, "position out of range"))?;
                Token::Number(n)
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut end = i;
                while end < chars.len()
                    && (chars[end].is_alphanumeric() || matches!(chars[end], '_' | '-' | '.' | '$'))
                {
                    end += 1;
                }
                let name: String = chars[i..end].iter().collect();
                i = end;
                Token::Name(name)
            }
            other => {
                return Err(LocatorError::new(
                    start,
                    format!("unexpected character '{}'", other),
                ));
            }
        };
        tokens.push((start, token));
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map(|(o, _)| *o).unwrap_or(self.end)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), LocatorError> {
        let offset = self.offset();
        match self.next() {
            Some(t) if t == expected => Ok(()),
            _ => Err(LocatorError::new(offset, format!("expected {}", what))),
        }
    }

    fn is_keyword(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Name(n)) if n == word)
    }

    fn path(&mut self) -> Result<LocatorPath, LocatorError> {
        let mut steps = Vec::new();
        while let Some(token) = self.peek() {
            let axis = match token {
                Token::Slash => Axis::Child,
                Token::DoubleSlash => Axis::Descendant,
                _ => {
                    return Err(LocatorError::new(self.offset(), "expected '/' or '//'"));
                }
            };
            self.pos += 1;
            steps.push(self.step(axis)?);
        }
        if steps.is_empty() {
            return Err(LocatorError::new(0, "empty locator"));
        }
        Ok(LocatorPath { steps })
    }

    fn step(&mut self, axis: Axis) -> Result<LocationStep, LocatorError> {
        let offset = self.offset();
        let name = match self.next() {
            Some(Token::Star) => None,
            Some(Token::Name(n)) => Some(n),
            _ => return Err(LocatorError::new(offset, "expected a tag name or '*'")),
        };

        let mut predicates = Vec::new();
        while self.peek() == Some(&Token::LBracket) {
            self.pos += 1;
            predicates.push(self.or_expr()?);
            self.expect(Token::RBracket, "']'")?;
        }

        Ok(LocationStep {
            axis,
            name,
            predicates,
        })
    }

    fn or_expr(&mut self) -> Result<Predicate, LocatorError> {
        let mut lhs = self.and_expr()?;
        while self.is_keyword("or") {
            self.pos += 1;
            let rhs = self.and_expr()?;
            lhs = Predicate::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Predicate, LocatorError> {
        let mut lhs = self.unary()?;
        while self.is_keyword("and") {
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Predicate::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Predicate, LocatorError> {
        if self.is_keyword("not") && self.peek_at(1) == Some(&Token::LParen) {
            self.pos += 2;
            let inner = self.or_expr()?;
            self.expect(Token::RParen, "')'")?;
            return Ok(Predicate::Not(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Predicate, LocatorError> {
        let offset = self.offset();
        match self.peek().cloned() {
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.or_expr()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::Number(n)) => {
                self.pos += 1;
                if n == 0 {
                    return Err(LocatorError::new(offset, "positions start at 1"));
                }
                Ok(Predicate::Position(n))
            }
            Some(Token::Name(name)) if name == "last" => {
                self.pos += 1;
                self.expect(Token::LParen, "'('")?;
                self.expect(Token::RParen, "')'")?;
                Ok(Predicate::Last)
            }
            Some(Token::Name(name)) if name == "contains" || name == "starts-with" => {
                self.pos += 1;
                self.expect(Token::LParen, "'('")?;
                let operand = self.operand()?;
                self.expect(Token::Comma, "','")?;
                let value = self.literal()?;
                self.expect(Token::RParen, "')'")?;
                Ok(if name == "contains" {
                    Predicate::Contains(operand, value)
                } else {
                    Predicate::StartsWith(operand, value)
                })
            }
            _ => {
                let operand = self.operand()?;
                match self.peek() {
                    Some(Token::Eq) => {
                        self.pos += 1;
                        Ok(Predicate::Equals(operand, self.literal()?))
                    }
                    Some(Token::NotEq) => {
                        self.pos += 1;
                        Ok(Predicate::NotEquals(operand, self.literal()?))
                    }
                    _ => Ok(Predicate::Exists(operand)),
                }
            }
        }
    }

    fn operand(&mut self) -> Result<Operand, LocatorError> {
        let offset = self.offset();
        match self.next() {
            Some(Token::At) => match self.next() {
                Some(Token::Name(name)) => Ok(Operand::Attribute(name)),
                _ => Err(LocatorError::new(offset, "expected an attribute name after '@'")),
            },
            Some(Token::Name(name)) if name == "text" => {
                self.expect(Token::LParen, "'('")?;
                self.expect(Token::RParen, "')'")?;
                Ok(Operand::Text)
            }
            _ => Err(LocatorError::new(offset, "expected '@attr' or 'text()'")),
        }
    }

    fn literal(&mut self) -> Result<String, LocatorError> {
        let offset = self.offset();
        match self.next() {
            Some(Token::Literal(value)) => Ok(value),
            Some(Token::Number(n)) => Ok(n.to_string()),
            _ => Err(LocatorError::new(offset, "expected a quoted string")),
        }
    }
}

/// Parses one locator candidate such as `//*[@resource_id='ok' and text()='OK']`.
pub fn parse(input: &str) -> Result<LocatorPath, LocatorError> {
    let trimmed = input.trim();
    let tokens = tokenize(trimmed)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: trimmed.len(),
    };
    parser.path()
}
