//! A minimal recursive-descent front end for `accir`'s facade binary.
//!
//! This is intentionally NOT a C parser: spec.md §1 treats the tokenizer
//! and parser as external collaborators, and SPEC_FULL §1 says the facade
//! binary exists only to exercise the ambient stack end to end. The
//! surface accepted here is exactly what spec.md §8's scenarios (S1-S6)
//! need: one `int`/`unsigned`-returning function, integer parameters,
//! local declarations, `if`/`else`, `return`, and arithmetic/comparison
//! expressions.
//!
//! Because the IR's opcode catalog (spec.md §4.1) has no call/argument
//! instruction (function calls are an explicit open question, spec.md §9),
//! incoming parameters are modeled as locals pre-initialized to a
//! placeholder literal rather than as real incoming values — there is
//! nothing else in the IR for them to be.

use accir::builder::Builder;
use accir::error::BuilderError;
use accir::ir::instr::Value;
use accir::types::CType;
use std::collections::HashMap;
use std::fmt;

pub struct ParseError {
    pub message: String,
    pub line: u32,
    pub column: u32,
    pub line_text: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Int(i64),
    Ident(String),
    KwInt,
    KwUnsigned,
    KwVoid,
    KwIf,
    KwElse,
    KwReturn,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Semi,
    Comma,
    Assign,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Plus,
    Minus,
    Star,
    Slash,
    Eof,
}

#[derive(Clone, Copy)]
struct Pos {
    line: u32,
    column: u32,
}

struct Lexer<'a> {
    src: &'a [u8],
    lines: Vec<&'a str>,
    i: usize,
    line: u32,
    col: u32,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Lexer<'a> {
        Lexer { src: src.as_bytes(), lines: src.lines().collect(), i: 0, line: 1, col: 1 }
    }

    fn line_text(&self, line: u32) -> String {
        self.lines.get(line.saturating_sub(1) as usize).copied().unwrap_or("").to_string()
    }

    fn peek_byte(&self) -> Option<u8> {
        self.src.get(self.i).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek_byte()?;
        self.i += 1;
        if b == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(b)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek_byte() {
                Some(b) if b.is_ascii_whitespace() => {
                    self.advance();
                }
                Some(b'/') if self.src.get(self.i + 1) == Some(&b'/') => {
                    while !matches!(self.peek_byte(), None | Some(b'\n')) {
                        self.advance();
                    }
                }
                Some(b'/') if self.src.get(self.i + 1) == Some(&b'*') => {
                    self.advance();
                    self.advance();
                    while !(self.peek_byte() == Some(b'*') && self.src.get(self.i + 1) == Some(&b'/')) {
                        if self.advance().is_none() {
                            break;
                        }
                    }
                    self.advance();
                    self.advance();
                }
                _ => break,
            }
        }
    }

    fn next(&mut self) -> Result<(Tok, Pos), ParseError> {
        self.skip_trivia();
        let pos = Pos { line: self.line, column: self.col };
        let b = match self.peek_byte() {
            None => return Ok((Tok::Eof, pos)),
            Some(b) => b,
        };

        if b.is_ascii_digit() {
            let start = self.i;
            while self.peek_byte().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
            let text = std::str::from_utf8(&self.src[start..self.i]).unwrap();
            let v: i64 = text.parse().map_err(|_| self.err(pos, format!("malformed integer literal `{}`", text)))?;
            return Ok((Tok::Int(v), pos));
        }

        if b.is_ascii_alphabetic() || b == b'_' {
            let start = self.i;
            while self.peek_byte().map_or(false, |c| c.is_ascii_alphanumeric() || c == b'_') {
                self.advance();
            }
            let text = std::str::from_utf8(&self.src[start..self.i]).unwrap();
            let tok = match text {
                "int" => Tok::KwInt,
                "unsigned" => Tok::KwUnsigned,
                "void" => Tok::KwVoid,
                "if" => Tok::KwIf,
                "else" => Tok::KwElse,
                "return" => Tok::KwReturn,
                other => Tok::Ident(other.to_string()),
            };
            return Ok((tok, pos));
        }

        let two = |lexer: &mut Self, second: u8| -> bool {
            if lexer.src.get(lexer.i + 1) == Some(&second) {
                lexer.advance();
                lexer.advance();
                true
            } else {
                lexer.advance();
                false
            }
        };

        let tok = match b {
            b'(' => {
                self.advance();
                Tok::LParen
            }
            b')' => {
                self.advance();
                Tok::RParen
            }
            b'{' => {
                self.advance();
                Tok::LBrace
            }
            b'}' => {
                self.advance();
                Tok::RBrace
            }
            b';' => {
                self.advance();
                Tok::Semi
            }
            b',' => {
                self.advance();
                Tok::Comma
            }
            b'+' => {
                self.advance();
                Tok::Plus
            }
            b'-' => {
                self.advance();
                Tok::Minus
            }
            b'*' => {
                self.advance();
                Tok::Star
            }
            b'/' => {
                self.advance();
                Tok::Slash
            }
            b'=' => {
                if two(self, b'=') {
                    Tok::Eq
                } else {
                    Tok::Assign
                }
            }
            b'!' => {
                if two(self, b'=') {
                    Tok::Neq
                } else {
                    return Err(self.err(pos, "unexpected `!`".to_string()));
                }
            }
            b'<' => {
                if two(self, b'=') {
                    Tok::Lte
                } else {
                    Tok::Lt
                }
            }
            b'>' => {
                if two(self, b'=') {
                    Tok::Gte
                } else {
                    Tok::Gt
                }
            }
            other => return Err(self.err(pos, format!("unexpected character `{}`", other as char))),
        };
        Ok((tok, pos))
    }

    fn err(&self, pos: Pos, message: String) -> ParseError {
        ParseError { message, line: pos.line, column: pos.column, line_text: self.line_text(pos.line) }
    }
}

/// A fully-parsed single-function translation unit, ready to be emitted
/// into a fresh `Container` via an `accir::Builder`.
pub struct Unit {
    pub name: String,
    return_ty: CType,
    params: Vec<(String, CType)>,
    body: Vec<Stmt>,
}

enum Expr {
    Int(i64),
    Var(String),
    Unary(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

#[derive(Clone, Copy)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

enum Stmt {
    Decl(String, CType),
    Assign(String, Expr),
    Return(Expr),
    If(Expr, Box<Stmt>, Option<Box<Stmt>>),
    Block(Vec<Stmt>),
    ExprStmt(Expr),
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    cur: (Tok, Pos),
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Result<Parser<'a>, ParseError> {
        let mut lexer = Lexer::new(src);
        let cur = lexer.next()?;
        Ok(Parser { lexer, cur })
    }

    fn bump(&mut self) -> Result<Tok, ParseError> {
        let next = self.lexer.next()?;
        Ok(std::mem::replace(&mut self.cur, next).0)
    }

    fn expect(&mut self, tok: &Tok) -> Result<(), ParseError> {
        if &self.cur.0 == tok {
            self.bump()?;
            Ok(())
        } else {
            Err(self.err(format!("expected `{:?}`, found `{:?}`", tok, self.cur.0)))
        }
    }

    fn err(&self, message: String) -> ParseError {
        self.lexer.err(self.cur.1, message)
    }

    fn type_keyword(&mut self) -> Result<Option<CType>, ParseError> {
        match self.cur.0 {
            Tok::KwInt => {
                self.bump()?;
                Ok(Some(CType::INT))
            }
            Tok::KwUnsigned => {
                self.bump()?;
                Ok(Some(CType::UINT))
            }
            _ => Ok(None),
        }
    }

    fn ident(&mut self) -> Result<String, ParseError> {
        match self.bump()? {
            Tok::Ident(name) => Ok(name),
            other => Err(self.err(format!("expected identifier, found `{:?}`", other))),
        }
    }

    fn parse_unit(&mut self) -> Result<Unit, ParseError> {
        let return_ty = self
            .type_keyword()?
            .ok_or_else(|| self.err("expected a return type (`int` or `unsigned`)".to_string()))?;
        let name = self.ident()?;
        self.expect(&Tok::LParen)?;
        let mut params = Vec::new();
        if self.cur.0 == Tok::KwVoid {
            self.bump()?;
        } else {
            while self.cur.0 != Tok::RParen {
                let ty = self
                    .type_keyword()?
                    .ok_or_else(|| self.err("expected a parameter type".to_string()))?;
                let pname = self.ident()?;
                params.push((pname, ty));
                if self.cur.0 == Tok::Comma {
                    self.bump()?;
                } else {
                    break;
                }
            }
        }
        self.expect(&Tok::RParen)?;
        self.expect(&Tok::LBrace)?;
        let mut body = Vec::new();
        while self.cur.0 != Tok::RBrace {
            body.push(self.parse_stmt()?);
        }
        self.expect(&Tok::RBrace)?;
        Ok(Unit { name, return_ty, params, body })
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        match &self.cur.0 {
            Tok::LBrace => {
                self.bump()?;
                let mut stmts = Vec::new();
                while self.cur.0 != Tok::RBrace {
                    stmts.push(self.parse_stmt()?);
                }
                self.expect(&Tok::RBrace)?;
                Ok(Stmt::Block(stmts))
            }
            Tok::KwInt | Tok::KwUnsigned => {
                let ty = self.type_keyword()?.unwrap();
                let name = self.ident()?;
                self.expect(&Tok::Semi)?;
                Ok(Stmt::Decl(name, ty))
            }
            Tok::KwReturn => {
                self.bump()?;
                let expr = self.parse_expr()?;
                self.expect(&Tok::Semi)?;
                Ok(Stmt::Return(expr))
            }
            Tok::KwIf => {
                self.bump()?;
                self.expect(&Tok::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(&Tok::RParen)?;
                let then_branch = Box::new(self.parse_stmt()?);
                let else_branch = if self.cur.0 == Tok::KwElse {
                    self.bump()?;
                    Some(Box::new(self.parse_stmt()?))
                } else {
                    None
                };
                Ok(Stmt::If(cond, then_branch, else_branch))
            }
            Tok::Ident(_) => {
                // Lookahead: `IDENT '='` is an assignment, otherwise it's an
                // expression statement (spec.md §8 S3: `2+2;` as a bare
                // expression statement works the same way via the fallback
                // branch below, which never starts with an identifier, but
                // we keep this arm symmetric with the general expr-stmt one).
                let name = self.ident()?;
                if self.cur.0 == Tok::Assign {
                    self.bump()?;
                    let expr = self.parse_expr()?;
                    self.expect(&Tok::Semi)?;
                    Ok(Stmt::Assign(name, expr))
                } else {
                    let mut expr = Expr::Var(name);
                    expr = self.continue_expr_from(expr)?;
                    self.expect(&Tok::Semi)?;
                    Ok(Stmt::ExprStmt(expr))
                }
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect(&Tok::Semi)?;
                Ok(Stmt::ExprStmt(expr))
            }
        }
    }

    // -- expressions, precedence-climbing ------------------------------------

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_equality()
    }

    /// Resumes binary-operator parsing with `lhs` already parsed — used by
    /// the statement parser's assignment-vs-expression lookahead so an
    /// identifier it already consumed isn't re-lexed.
    fn continue_expr_from(&mut self, lhs: Expr) -> Result<Expr, ParseError> {
        let lhs = self.continue_additive_from(lhs)?;
        self.continue_equality_from(lhs)
    }

    fn continue_equality_from(&mut self, mut lhs: Expr) -> Result<Expr, ParseError> {
        loop {
            let op = match self.cur.0 {
                Tok::Eq => BinOp::Eq,
                Tok::Neq => BinOp::Neq,
                Tok::Lt => BinOp::Lt,
                Tok::Lte => BinOp::Lte,
                Tok::Gt => BinOp::Gt,
                Tok::Gte => BinOp::Gte,
                _ => return Ok(lhs),
            };
            self.bump()?;
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn continue_additive_from(&mut self, mut lhs: Expr) -> Result<Expr, ParseError> {
        loop {
            let op = match self.cur.0 {
                Tok::Plus => BinOp::Add,
                Tok::Minus => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.bump()?;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_additive()?;
        self.continue_equality_from(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_multiplicative()?;
        self.continue_additive_from(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.cur.0 {
                Tok::Star => BinOp::Mul,
                Tok::Slash => BinOp::Div,
                _ => return Ok(lhs),
            };
            self.bump()?;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.cur.0 == Tok::Minus {
            self.bump()?;
            Ok(Expr::Unary(Box::new(self.parse_unary()?)))
        } else {
            self.parse_primary()
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.bump()? {
            Tok::Int(v) => Ok(Expr::Int(v)),
            Tok::Ident(name) => Ok(Expr::Var(name)),
            Tok::LParen => {
                let inner = self.parse_expr()?;
                self.expect(&Tok::RParen)?;
                Ok(inner)
            }
            other => Err(self.err(format!("expected an expression, found `{:?}`", other))),
        }
    }
}

pub fn parse_unit(src: &str, _path: &str) -> Result<Unit, ParseError> {
    let mut parser = Parser::new(src)?;
    parser.parse_unit()
}

/// Emission context: tracks each local/parameter's `alloca` slot and type.
struct Scope {
    slots: HashMap<String, (Value, CType)>,
}

/// Errors raised while lowering a parsed `Unit` into IR: either a builder
/// invariant violation (`BuilderError`, genuinely a compiler bug for code
/// this front end itself produced) or a frontend-level semantic error
/// (an undeclared identifier) that has no counterpart in the builder's own
/// error taxonomy because the builder has no notion of source-level names.
pub enum EmitError {
    Builder(BuilderError),
    UndeclaredVariable(String),
}

impl From<BuilderError> for EmitError {
    fn from(e: BuilderError) -> EmitError {
        EmitError::Builder(e)
    }
}

impl fmt::Display for EmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmitError::Builder(e) => write!(f, "{}", e),
            EmitError::UndeclaredVariable(name) => write!(f, "undeclared identifier `{}`", name),
        }
    }
}

impl EmitError {
    /// Whether this error reflects a bug in this translation-unit-emitting
    /// front end itself (a builder invariant it should never have
    /// violated) versus a plain semantic error in the input program.
    pub fn is_internal(&self) -> bool {
        matches!(self, EmitError::Builder(_))
    }
}

impl Unit {
    /// Emits this unit's body into `b`, which is already positioned at the
    /// container's entry block. Parameters are modeled as locals
    /// initialized to a placeholder literal (module docs above) since the
    /// IR has no incoming-argument instruction.
    pub fn emit(&self, b: &mut Builder) -> Result<(), EmitError> {
        let mut scope = Scope { slots: HashMap::new() };
        for (name, ty) in &self.params {
            let slot = b.build_alloca(ty.clone())?;
            let placeholder = b.const_int(ty.clone(), 0);
            b.build_store(placeholder, slot)?;
            scope.slots.insert(name.clone(), (slot, ty.clone()));
        }

        for stmt in &self.body {
            emit_stmt(b, &mut scope, stmt, &self.return_ty)?;
        }

        // A function whose last statement was not a `return` (e.g. a
        // dropped-through `if` with no trailing `return`) still needs a
        // terminator for the current block; fall back to returning a
        // zeroed value of the declared return type rather than leaving a
        // block without one (spec.md §3 invariant: every block ends in a
        // terminator once control flow is fully built).
        if !block_terminated(b) {
            let zero = b.const_int(self.return_ty.clone(), 0);
            b.build_ret(zero)?;
        }
        Ok(())
    }
}

fn block_terminated(b: &Builder) -> bool {
    let block = b.current_block();
    let container = b.container();
    match container.block(block).instrs.last() {
        Some(&id) => container.instr(id).opcode.is_terminator(),
        None => false,
    }
}

/// If the current block already ended in a terminator (spec.md §8 S3:
/// code that follows a `return`), starts a fresh, unreachable block so
/// subsequent statements have somewhere to append to. The optimizer's
/// dead-block pruning pass (spec.md §4.3) removes it later.
fn ensure_open_block(b: &mut Builder) {
    if block_terminated(b) {
        let fresh = b.create_block();
        b.switch_to_block(fresh);
    }
}

fn emit_stmt(b: &mut Builder, scope: &mut Scope, stmt: &Stmt, return_ty: &CType) -> Result<(), EmitError> {
    ensure_open_block(b);
    match stmt {
        Stmt::Decl(name, ty) => {
            let slot = b.build_alloca(ty.clone())?;
            scope.slots.insert(name.clone(), (slot, ty.clone()));
            Ok(())
        }
        Stmt::Assign(name, expr) => {
            let (slot, ty) = scope
                .slots
                .get(name)
                .cloned()
                .ok_or_else(|| EmitError::UndeclaredVariable(name.clone()))?;
            let (value, _) = emit_expr(b, scope, expr, &ty)?;
            b.build_store(value, slot)?;
            Ok(())
        }
        Stmt::Return(expr) => {
            let (value, _) = emit_expr(b, scope, expr, return_ty)?;
            b.build_ret(value)?;
            Ok(())
        }
        Stmt::ExprStmt(expr) => {
            emit_expr(b, scope, expr, &CType::INT)?;
            Ok(())
        }
        Stmt::Block(stmts) => {
            for s in stmts {
                emit_stmt(b, scope, s, return_ty)?;
            }
            Ok(())
        }
        Stmt::If(cond, then_branch, else_branch) => {
            let (cond_val, cond_ty) = emit_expr(b, scope, cond, &CType::INT)?;
            let cond_bool = coerce_truthy(b, cond_val, &cond_ty)?;

            // Create the continuation block before the branch blocks so it
            // becomes the lexically-next block after the one holding the
            // `split` (spec.md §8 S5: the fall-through path is whichever
            // block is lex-next, not necessarily the `true` edge).
            let merge_block = b.create_block();
            let then_block = b.create_block();
            let else_block = if else_branch.is_some() { Some(b.create_block()) } else { None };

            b.build_split(cond_bool, then_block, else_block.unwrap_or(merge_block))?;

            b.switch_to_block(then_block);
            emit_stmt(b, scope, then_branch, return_ty)?;
            if !block_terminated(b) {
                b.build_jmp(merge_block)?;
            }

            if let (Some(else_block), Some(else_branch)) = (else_block, else_branch) {
                b.switch_to_block(else_block);
                emit_stmt(b, scope, else_branch, return_ty)?;
                if !block_terminated(b) {
                    b.build_jmp(merge_block)?;
                }
            }

            b.switch_to_block(merge_block);
            Ok(())
        }
    }
}

/// `split`'s condition is whatever value the expression produced; anything
/// that isn't already a `bool`-typed comparison result is compared against
/// zero (ordinary C truthiness), matching spec.md §4.1's cast-selection
/// principle of dispatching on kind rather than surface syntax.
fn coerce_truthy(b: &mut Builder, value: Value, ty: &CType) -> Result<Value, EmitError> {
    if *ty == CType::BOOL {
        Ok(value)
    } else {
        let zero = b.const_int(ty.clone(), 0);
        b.build_cmpneq(value, zero)
    }
}

fn emit_expr(b: &mut Builder, scope: &mut Scope, expr: &Expr, hint: &CType) -> Result<(Value, CType), EmitError> {
    match expr {
        Expr::Int(v) => Ok((b.const_int(hint.clone(), *v), hint.clone())),
        Expr::Var(name) => {
            let (slot, ty) = scope
                .slots
                .get(name)
                .cloned()
                .ok_or_else(|| EmitError::UndeclaredVariable(name.clone()))?;
            let value = b.build_load(slot, ty.clone())?;
            Ok((value, ty))
        }
        Expr::Unary(inner) => {
            let (value, ty) = emit_expr(b, scope, inner, hint)?;
            let zero = b.const_int(ty.clone(), 0);
            let negated = b.build_sub(zero, value, ty.clone())?;
            Ok((negated, ty))
        }
        Expr::Binary(op, lhs, rhs) => {
            let (lval, lty) = emit_expr(b, scope, lhs, hint)?;
            let (rval, rty) = emit_expr(b, scope, rhs, hint)?;
            // Minimal "usual arithmetic conversion": unsigned wins over
            // signed at equal rank, matching C's promotion rule closely
            // enough for this reduced surface (spec.md §4.1's casts are
            // selected by kind; full rank-based promotion is parser-level
            // and out of scope, spec.md §1).
            let result_ty = if lty.is_signed() && rty.is_signed() { CType::INT } else { CType::UINT };
            let value = match op {
                BinOp::Add => b.build_add(lval, rval, result_ty.clone())?,
                BinOp::Sub => b.build_sub(lval, rval, result_ty.clone())?,
                BinOp::Mul => b.build_mul(lval, rval, result_ty.clone())?,
                BinOp::Div => b.build_div(lval, rval, result_ty.clone())?,
                BinOp::Eq => return Ok((b.build_cmpeq(lval, rval)?, CType::BOOL)),
                BinOp::Neq => return Ok((b.build_cmpneq(lval, rval)?, CType::BOOL)),
                BinOp::Lt => return Ok((b.build_cmplt(lval, rval)?, CType::BOOL)),
                BinOp::Lte => return Ok((b.build_cmplte(lval, rval)?, CType::BOOL)),
                BinOp::Gt => return Ok((b.build_cmpgt(lval, rval)?, CType::BOOL)),
                BinOp::Gte => return Ok((b.build_cmpgte(lval, rval)?, CType::BOOL)),
            };
            Ok((value, result_ty))
        }
    }
}
