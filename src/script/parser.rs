use crate::script::ast::{BinOp, CmpOp, Expr, Program, Stmt, StmtKind};
use crate::script::error::CompileError;
use crate::script::lexer::{Token, TokenKind};

const RESERVED: &[&str] = &[
    "def", "class", "return", "import", "from", "lambda", "yield", "global", "nonlocal", "raise",
    "async", "await", "del", "try", "except", "finally", "with",
];

pub fn parse_program(tokens: Vec<Token>) -> Result<Program, CompileError> {
    let mut parser = Parser { tokens, pos: 0 };
    let mut program = Vec::new();
    while !parser.check(&TokenKind::Eof) {
        program.push(parser.statement()?);
    }
    Ok(program)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        self.tokens
            .get(self.pos)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn check_word(&self, word: &str) -> bool {
        matches!(self.peek(), TokenKind::Name(n) if n == word)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if self.check_word(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        CompileError::Syntax {
            line: self.line(),
            message: message.into(),
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), CompileError> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}", what)))
        }
    }

    fn name(&mut self) -> Result<String, CompileError> {
        match self.advance() {
            TokenKind::Name(n) => Ok(n),
            _ => Err(self.error("expected a name")),
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn statement(&mut self) -> Result<Stmt, CompileError> {
        let line = self.line();

        if let TokenKind::Name(word) = self.peek() {
            if RESERVED.contains(&word.as_str()) {
                return Err(self.error(format!("'{}' is not supported", word)));
            }
        }

        if self.eat_word("if") {
            return self.if_statement(line);
        }
        if self.eat_word("for") {
            let var = self.name()?;
            if !self.eat_word("in") {
                return Err(self.error("expected 'in'"));
            }
            let iter = self.expr()?;
            let body = self.block()?;
            return Ok(Stmt {
                line,
                kind: StmtKind::For { var, iter, body },
            });
        }
        if self.eat_word("while") {
            let cond = self.expr()?;
            let body = self.block()?;
            return Ok(Stmt {
                line,
                kind: StmtKind::While { cond, body },
            });
        }

        let kind = self.simple_statement()?;
        if !self.eat(&TokenKind::Newline) && !self.check(&TokenKind::Eof) {
            return Err(self.error("expected end of line"));
        }
        Ok(Stmt { line, kind })
    }

    fn if_statement(&mut self, line: usize) -> Result<Stmt, CompileError> {
        let mut branches = Vec::new();
        let cond = self.expr()?;
        branches.push((cond, self.block()?));

        let mut orelse = Vec::new();
        loop {
            if self.eat_word("elif") {
                let cond = self.expr()?;
                branches.push((cond, self.block()?));
            } else if self.eat_word("else") {
                orelse = self.block()?;
                break;
            } else {
                break;
            }
        }

        Ok(Stmt {
            line,
            kind: StmtKind::If { branches, orelse },
        })
    }

    /// `:` followed by an indented block or a single inline statement.
    fn block(&mut self) -> Result<Vec<Stmt>, CompileError> {
        self.expect(TokenKind::Colon, "':'")?;

        if !self.eat(&TokenKind::Newline) {
            let line = self.line();
            let kind = self.simple_statement()?;
            if !self.eat(&TokenKind::Newline) && !self.check(&TokenKind::Eof) {
                return Err(self.error("expected end of line"));
            }
            return Ok(vec![Stmt { line, kind }]);
        }

        self.expect(TokenKind::Indent, "an indented block")?;
        let mut body = Vec::new();
        while !self.eat(&TokenKind::Dedent) {
            if self.check(&TokenKind::Eof) {
                break;
            }
            body.push(self.statement()?);
        }
        Ok(body)
    }

    fn simple_statement(&mut self) -> Result<StmtKind, CompileError> {
        if self.eat_word("pass") {
            return Ok(StmtKind::Pass);
        }
        if self.eat_word("break") {
            return Ok(StmtKind::Break);
        }
        if self.eat_word("continue") {
            return Ok(StmtKind::Continue);
        }

        let expr = self.expr()?;
        let op = match self.peek() {
            TokenKind::Assign => None,
            TokenKind::PlusAssign => Some(BinOp::Add),
            TokenKind::MinusAssign => Some(BinOp::Sub),
            _ => return Ok(StmtKind::Expr(expr)),
        };
        self.advance();

        let Expr::Name(target) = expr else {
            return Err(self.error("only plain names can be assigned"));
        };
        let value = self.expr()?;
        Ok(match op {
            None => StmtKind::Assign { target, value },
            Some(op) => StmtKind::AugAssign { target, op, value },
        })
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expr(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.and_expr()?;
        while self.eat_word("or") {
            let rhs = self.and_expr()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.not_expr()?;
        while self.eat_word("and") {
            let rhs = self.not_expr()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Expr, CompileError> {
        if self.eat_word("not") {
            return Ok(Expr::Not(Box::new(self.not_expr()?)));
        }
        self.comparison()
    }

    fn compare_op(&mut self) -> Option<CmpOp> {
        let next_is_in = matches!(
            self.tokens.get(self.pos + 1).map(|t| &t.kind),
            Some(TokenKind::Name(w)) if w == "in"
        );
        let (op, width) = match self.peek() {
            TokenKind::EqEq => (CmpOp::Eq, 1),
            TokenKind::NotEq => (CmpOp::NotEq, 1),
            TokenKind::Lt => (CmpOp::Lt, 1),
            TokenKind::Le => (CmpOp::Le, 1),
            TokenKind::Gt => (CmpOp::Gt, 1),
            TokenKind::Ge => (CmpOp::Ge, 1),
            TokenKind::Name(n) if n == "in" => (CmpOp::In, 1),
            TokenKind::Name(n) if n == "not" && next_is_in => (CmpOp::NotIn, 2),
            _ => return None,
        };
        for _ in 0..width {
            self.advance();
        }
        Some(op)
    }

    /// Chained comparisons fold into `and`: `a < b < c` is `a < b and b < c`.
    fn comparison(&mut self) -> Result<Expr, CompileError> {
        let first = self.additive()?;
        let mut result: Option<Expr> = None;
        let mut lhs = first.clone();

        while let Some(op) = self.compare_op() {
            let rhs = self.additive()?;
            let link = Expr::Compare {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs.clone()),
            };
            result = Some(match result {
                None => link,
                Some(prev) => Expr::And(Box::new(prev), Box::new(link)),
            });
            lhs = rhs;
        }

        Ok(result.unwrap_or(first))
    }

    fn additive(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn term(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::DoubleSlash => BinOp::FloorDiv,
                TokenKind::Percent => BinOp::Mod,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn unary(&mut self) -> Result<Expr, CompileError> {
        if self.eat(&TokenKind::Minus) {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        if self.eat(&TokenKind::Plus) {
            return self.unary();
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.atom()?;
        loop {
            match self.peek() {
                TokenKind::LParen => {
                    let Expr::Name(name) = expr else {
                        return Err(self.error("only named functions can be called"));
                    };
                    self.advance();
                    let args = self.arguments()?;
                    expr = Expr::Call { name, args };
                }
                TokenKind::Dot => {
                    self.advance();
                    let name = self.name()?;
                    if !self.eat(&TokenKind::LParen) {
                        return Err(self.error(format!("attribute '{}' must be called", name)));
                    }
                    let args = self.arguments()?;
                    expr = Expr::Method {
                        receiver: Box::new(expr),
                        name,
                        args,
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.expr()?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    expr = Expr::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Arguments after an opening parenthesis, through the closing one.
    fn arguments(&mut self) -> Result<Vec<Expr>, CompileError> {
        let mut args = Vec::new();
        while !self.eat(&TokenKind::RParen) {
            args.push(self.expr()?);
            if self.check(&TokenKind::Assign) {
                return Err(self.error("keyword arguments are not supported"));
            }
            if !self.eat(&TokenKind::Comma) {
                self.expect(TokenKind::RParen, "')'")?;
                break;
            }
        }
        Ok(args)
    }

    fn atom(&mut self) -> Result<Expr, CompileError> {
        match self.advance() {
            TokenKind::Int(v) => Ok(Expr::Int(v)),
            TokenKind::Str(first) => {
                let mut text = first;
                while let TokenKind::Str(next) = self.peek().clone() {
                    self.advance();
                    text.push_str(&next);
                }
                Ok(Expr::Str(text))
            }
            TokenKind::Name(name) => match name.as_str() {
                "True" => Ok(Expr::Bool(true)),
                "False" => Ok(Expr::Bool(false)),
                "None" => Ok(Expr::NoneLit),
                "if" | "elif" | "else" | "for" | "while" | "in" | "and" | "or" | "not"
                | "pass" | "break" | "continue" => {
                    Err(self.error(format!("unexpected keyword '{}'", name)))
                }
                _ => Ok(Expr::Name(name)),
            },
            TokenKind::LParen => {
                let inner = self.expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                let mut items = Vec::new();
                while !self.eat(&TokenKind::RBracket) {
                    items.push(self.expr()?);
                    if !self.eat(&TokenKind::Comma) {
                        self.expect(TokenKind::RBracket, "']'")?;
                        break;
                    }
                }
                Ok(Expr::List(items))
            }
            TokenKind::LBrace => {
                let mut entries = Vec::new();
                while !self.eat(&TokenKind::RBrace) {
                    let key = self.expr()?;
                    self.expect(TokenKind::Colon, "':'")?;
                    let value = self.expr()?;
                    entries.push((key, value));
                    if !self.eat(&TokenKind::Comma) {
                        self.expect(TokenKind::RBrace, "'}'")?;
                        break;
                    }
                }
                Ok(Expr::Dict(entries))
            }
            other => Err(self.error(format!("unexpected token {:?}", other))),
        }
    }
}
