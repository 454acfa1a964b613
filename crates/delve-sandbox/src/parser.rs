//! Recursive-descent parser producing the statement tree.
//!
//! Precedence, lowest first: `or`, `and`, `not`, comparisons, `+ -`,
//! `* / // %`, unary `- +`, `**`, postfix (call, attribute, index).

use crate::error::{Fault, Result};
use crate::lexer::{Tok, Token, tokenize};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Assign {
        target: Expr,
        value: Expr,
    },
    AugAssign {
        target: Expr,
        op: BinOp,
        value: Expr,
    },
    If {
        branches: Vec<(Expr, Vec<Stmt>)>,
        orelse: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    For {
        var: String,
        iter: Expr,
        body: Vec<Stmt>,
    },
    Break,
    Continue,
    Pass,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(Value),
    Name(String),
    List(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Attribute {
        object: Box<Expr>,
        name: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        object: Box<Expr>,
        start: Option<Box<Expr>>,
        end: Option<Box<Expr>>,
    },
}

impl Expr {
    /// Whether the expression names a storage location that can be
    /// assigned to or mutated in place.
    pub fn is_place(&self) -> bool {
        match self {
            Self::Name(_) => true,
            Self::Index { object, .. } => object.is_place(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Pow => "**",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::In => "in",
            Self::NotIn => "not in",
        }
    }
}

/// Deepest block or parenthesis nesting accepted.
const MAX_NESTING: usize = 100;

/// Deepest expression tree accepted, counting operator nodes on top of the
/// enclosing block and parenthesis levels.
const MAX_EXPR_DEPTH: usize = 100;

/// Parse a complete snippet into a list of statements.
pub fn parse_program(src: &str) -> Result<Vec<Stmt>> {
    let tokens = tokenize(src)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        loops: 0,
        depth: 0,
        expr_depth: 0,
    };
    let mut program = Vec::new();
    loop {
        parser.skip_separators();
        if parser.at(&Tok::Eof) {
            break;
        }
        program.push(parser.statement()?);
        parser.end_of_statement()?;
    }
    Ok(program)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Number of enclosing loop bodies.
    loops: usize,
    depth: usize,
    /// Operator nodes between the current position and the root of the
    /// expression being parsed.
    expr_depth: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].tok
    }

    fn line(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].line
    }

    fn at(&self, tok: &Tok) -> bool {
        self.peek() == tok
    }

    fn advance(&mut self) -> Tok {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.at(tok) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Tok) -> Result<()> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn unexpected(&self) -> Fault {
        Fault::syntax(format!(
            "unexpected {} on line {}",
            self.peek().describe(),
            self.line()
        ))
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Tok::Newline | Tok::Semi) {
            self.advance();
        }
    }

    fn skip_newlines(&mut self) {
        while self.at(&Tok::Newline) {
            self.advance();
        }
    }

    /// A statement must be followed by a separator, a closing brace, or the
    /// end of input.
    fn end_of_statement(&mut self) -> Result<()> {
        match self.peek() {
            Tok::Newline | Tok::Semi => {
                self.advance();
                Ok(())
            }
            Tok::RBrace | Tok::Eof => Ok(()),
            _ => Err(self.unexpected()),
        }
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(Fault::syntax(format!(
                "too many nested blocks or parentheses on line {}",
                self.line()
            )));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Account for one more operator node above whatever is parsed next.
    /// Callers reset `expr_depth` once their subtree is complete.
    fn deepen(&mut self) -> Result<()> {
        self.expr_depth += 1;
        if self.depth + self.expr_depth > MAX_EXPR_DEPTH {
            return Err(Fault::syntax(format!(
                "expression too deeply nested on line {}",
                self.line()
            )));
        }
        Ok(())
    }

    /// Peek past newlines without consuming them.
    fn peek_past_newlines(&self) -> &Tok {
        let mut i = self.pos;
        while i < self.tokens.len() - 1 && self.tokens[i].tok == Tok::Newline {
            i += 1;
        }
        &self.tokens[i].tok
    }

    // -- statements ---------------------------------------------------------

    fn statement(&mut self) -> Result<Stmt> {
        match self.peek() {
            Tok::If => self.if_statement(),
            Tok::While => {
                self.advance();
                let cond = self.expression()?;
                let body = self.loop_body()?;
                Ok(Stmt::While { cond, body })
            }
            Tok::For => {
                self.advance();
                let var = self.ident()?;
                self.expect(&Tok::In)?;
                let iter = self.expression()?;
                let body = self.loop_body()?;
                Ok(Stmt::For { var, iter, body })
            }
            Tok::Break => {
                self.outside_loop("break")?;
                self.advance();
                Ok(Stmt::Break)
            }
            Tok::Continue => {
                self.outside_loop("continue")?;
                self.advance();
                Ok(Stmt::Continue)
            }
            Tok::Pass => {
                self.advance();
                Ok(Stmt::Pass)
            }
            _ => self.simple_statement(),
        }
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        self.expect(&Tok::If)?;
        let mut branches = vec![(self.expression()?, self.block()?)];
        let mut orelse = Vec::new();
        loop {
            match self.peek_past_newlines() {
                Tok::Elif => {
                    self.skip_newlines();
                    self.advance();
                    branches.push((self.expression()?, self.block()?));
                }
                Tok::Else => {
                    self.skip_newlines();
                    self.advance();
                    orelse = self.block()?;
                    break;
                }
                _ => break,
            }
        }
        Ok(Stmt::If { branches, orelse })
    }

    fn outside_loop(&self, keyword: &str) -> Result<()> {
        if self.loops == 0 {
            return Err(Fault::syntax(format!(
                "'{keyword}' outside loop on line {}",
                self.line()
            )));
        }
        Ok(())
    }

    fn loop_body(&mut self) -> Result<Vec<Stmt>> {
        self.loops += 1;
        let body = self.block();
        self.loops -= 1;
        body
    }

    fn block(&mut self) -> Result<Vec<Stmt>> {
        self.skip_newlines();
        self.expect(&Tok::LBrace)?;
        self.enter()?;
        let mut body = Vec::new();
        loop {
            self.skip_separators();
            if self.eat(&Tok::RBrace) {
                self.leave();
                return Ok(body);
            }
            if self.at(&Tok::Eof) {
                return Err(Fault::syntax(format!(
                    "expected '}}' before end of input on line {}",
                    self.line()
                )));
            }
            body.push(self.statement()?);
            self.end_of_statement()?;
        }
    }

    fn simple_statement(&mut self) -> Result<Stmt> {
        let line = self.line();
        let expr = self.expression()?;
        let aug = match self.peek() {
            Tok::Assign => None,
            Tok::PlusAssign => Some(BinOp::Add),
            Tok::MinusAssign => Some(BinOp::Sub),
            Tok::StarAssign => Some(BinOp::Mul),
            Tok::SlashAssign => Some(BinOp::Div),
            Tok::FloorDivAssign => Some(BinOp::FloorDiv),
            Tok::PercentAssign => Some(BinOp::Mod),
            _ => return Ok(Stmt::Expr(expr)),
        };
        self.advance();
        if !expr.is_place() {
            return Err(Fault::syntax(format!(
                "cannot assign to expression on line {line}"
            )));
        }
        let value = self.expression()?;
        Ok(match aug {
            None => Stmt::Assign {
                target: expr,
                value,
            },
            Some(op) => Stmt::AugAssign {
                target: expr,
                op,
                value,
            },
        })
    }

    // -- expressions --------------------------------------------------------

    fn expression(&mut self) -> Result<Expr> {
        self.enter()?;
        let expr = self.or_expr();
        self.leave();
        expr
    }

    fn or_expr(&mut self) -> Result<Expr> {
        let mark = self.expr_depth;
        let mut left = self.and_expr()?;
        while self.eat(&Tok::Or) {
            self.deepen()?;
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        self.expr_depth = mark;
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mark = self.expr_depth;
        let mut left = self.not_expr()?;
        while self.eat(&Tok::And) {
            self.deepen()?;
            let right = self.not_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        self.expr_depth = mark;
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr> {
        if self.eat(&Tok::Not) {
            let mark = self.expr_depth;
            self.deepen()?;
            let operand = self.not_expr()?;
            self.expr_depth = mark;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr> {
        let mark = self.expr_depth;
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                Tok::Eq => BinOp::Eq,
                Tok::Ne => BinOp::Ne,
                Tok::Lt => BinOp::Lt,
                Tok::Le => BinOp::Le,
                Tok::Gt => BinOp::Gt,
                Tok::Ge => BinOp::Ge,
                Tok::In => BinOp::In,
                Tok::Not => {
                    // `not in`
                    if self.tokens.get(self.pos + 1).map(|t| &t.tok) != Some(&Tok::In) {
                        break;
                    }
                    self.advance();
                    BinOp::NotIn
                }
                _ => break,
            };
            self.advance();
            self.deepen()?;
            let right = self.additive()?;
            left = binary(op, left, right);
        }
        self.expr_depth = mark;
        Ok(left)
    }

    fn additive(&mut self) -> Result<Expr> {
        let mark = self.expr_depth;
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Tok::Plus => BinOp::Add,
                Tok::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            self.deepen()?;
            let right = self.multiplicative()?;
            left = binary(op, left, right);
        }
        self.expr_depth = mark;
        Ok(left)
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        let mark = self.expr_depth;
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Tok::Star => BinOp::Mul,
                Tok::Slash => BinOp::Div,
                Tok::DoubleSlash => BinOp::FloorDiv,
                Tok::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            self.deepen()?;
            let right = self.unary()?;
            left = binary(op, left, right);
        }
        self.expr_depth = mark;
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr> {
        let op = match self.peek() {
            Tok::Minus => UnaryOp::Neg,
            Tok::Plus => UnaryOp::Pos,
            _ => return self.power(),
        };
        self.advance();
        let mark = self.expr_depth;
        self.deepen()?;
        let operand = self.unary()?;
        self.expr_depth = mark;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn power(&mut self) -> Result<Expr> {
        let base = self.postfix()?;
        if self.eat(&Tok::DoubleStar) {
            // right-associative, binds tighter than unary minus on the left
            let mark = self.expr_depth;
            self.deepen()?;
            let exponent = self.unary()?;
            self.expr_depth = mark;
            return Ok(binary(BinOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Expr> {
        let mark = self.expr_depth;
        let mut expr = self.primary()?;
        loop {
            if matches!(self.peek(), Tok::LParen | Tok::Dot | Tok::LBracket) {
                self.deepen()?;
            }
            match self.peek() {
                Tok::LParen => {
                    self.advance();
                    let args = self.sequence(&Tok::RParen)?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                Tok::Dot => {
                    self.advance();
                    let name = self.ident()?;
                    expr = Expr::Attribute {
                        object: Box::new(expr),
                        name,
                    };
                }
                Tok::LBracket => {
                    self.advance();
                    expr = self.subscript(expr)?;
                }
                _ => {
                    self.expr_depth = mark;
                    return Ok(expr);
                }
            }
        }
    }

    fn subscript(&mut self, object: Expr) -> Result<Expr> {
        let start = if self.at(&Tok::Colon) {
            None
        } else {
            Some(self.expression()?)
        };
        if self.eat(&Tok::Colon) {
            let end = if self.at(&Tok::RBracket) {
                None
            } else {
                Some(Box::new(self.expression()?))
            };
            self.expect(&Tok::RBracket)?;
            return Ok(Expr::Slice {
                object: Box::new(object),
                start: start.map(Box::new),
                end,
            });
        }
        self.expect(&Tok::RBracket)?;
        match start {
            Some(index) => Ok(Expr::Index {
                object: Box::new(object),
                index: Box::new(index),
            }),
            None => Err(self.unexpected()),
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        let expr = match self.peek().clone() {
            Tok::Int(i) => Expr::Const(Value::Int(i)),
            Tok::Float(x) => Expr::Const(Value::Float(x)),
            Tok::True => Expr::Const(Value::Bool(true)),
            Tok::False => Expr::Const(Value::Bool(false)),
            Tok::None => Expr::Const(Value::None),
            Tok::Ident(name) => Expr::Name(name),
            Tok::Str(_) => return Ok(self.string_literal()),
            Tok::LParen => {
                self.advance();
                let inner = self.expression()?;
                self.expect(&Tok::RParen)?;
                return Ok(inner);
            }
            Tok::LBracket => {
                self.advance();
                return Ok(Expr::List(self.sequence(&Tok::RBracket)?));
            }
            Tok::LBrace => {
                self.advance();
                return self.dict_literal();
            }
            _ => return Err(self.unexpected()),
        };
        self.advance();
        Ok(expr)
    }

    /// Adjacent string literals concatenate.
    fn string_literal(&mut self) -> Expr {
        let mut s = String::new();
        while let Tok::Str(next) = self.peek() {
            s.push_str(next);
            self.advance();
        }
        Expr::Const(Value::Str(s))
    }

    fn ident(&mut self) -> Result<String> {
        match self.peek().clone() {
            Tok::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Comma-separated expressions up to `close`, allowing a trailing comma.
    fn sequence(&mut self, close: &Tok) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        loop {
            if self.eat(close) {
                return Ok(items);
            }
            items.push(self.expression()?);
            if !self.eat(&Tok::Comma) {
                self.expect(close)?;
                return Ok(items);
            }
        }
    }

    fn dict_literal(&mut self) -> Result<Expr> {
        let mut entries = Vec::new();
        loop {
            self.skip_newlines();
            if self.eat(&Tok::RBrace) {
                return Ok(Expr::Dict(entries));
            }
            let key = self.expression()?;
            self.expect(&Tok::Colon)?;
            self.skip_newlines();
            let value = self.expression()?;
            entries.push((key, value));
            self.skip_newlines();
            if !self.eat(&Tok::Comma) {
                self.skip_newlines();
                self.expect(&Tok::RBrace)?;
                return Ok(Expr::Dict(entries));
            }
        }
    }
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
