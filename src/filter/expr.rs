//! Boolean filter expressions over rating rows and their segment aggregates.
//!
//! The expression is parsed once into a typed AST and evaluated per row
//! against fixed bindings: `system, document, docSegId, globalSegId, source,
//! target, rater, category, severity, metadata, segment`. `segment` exposes
//! the six aggregate mappings via dot access (`segment.categories_by_rater`
//! and friends); `metadata.<key>` yields the stored string, or the empty
//! string when the key is absent.
//!
//! Two builtin predicates work on the segment mappings:
//! `includes(map, key, value)` is true iff `map[key]` exists and contains
//! `value`; `excludes(map, key, value)` is true iff `map[key]` exists and
//! does NOT contain `value`. Both return false when the key is absent; the
//! asymmetry is deliberate policy, not an accident.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::model::row::RatingRow;
use crate::model::segment::SegmentAggregate;

#[derive(Debug, Error)]
pub enum ExprError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("evaluation error: {0}")]
    Eval(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Str(String),
    Num(f64),
    Bool(bool),
    Ident(String),
    Field(Box<Expr>, String),
    Call(String, Vec<Expr>),
    Not(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub row: &'a RatingRow,
    pub segment: &'a SegmentAggregate,
}

#[derive(Debug, Clone, Copy)]
enum Value<'a> {
    Bool(bool),
    Num(f64),
    Str(&'a str),
    SeqMap(&'a BTreeMap<String, Vec<String>>),
    Segment(&'a SegmentAggregate),
    Meta(&'a BTreeMap<String, String>),
}

impl Value<'_> {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Num(_) => "number",
            Value::Str(_) => "string",
            Value::SeqMap(_) => "map",
            Value::Segment(_) => "segment",
            Value::Meta(_) => "metadata",
        }
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Num(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s:?}"),
            other => write!(f, "<{}>", other.type_name()),
        }
    }
}

pub fn parse(src: &str) -> Result<Expr, ExprError> {
    let tokens = lex(src)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(ExprError::Parse(format!(
            "unexpected trailing input at token {}",
            parser.pos + 1
        )));
    }
    Ok(expr)
}

/// Evaluates a parsed expression for one row. Any type mismatch or unknown
/// name is an error; the caller treats errors as a non-passing filter.
pub fn evaluate(expr: &Expr, ctx: &EvalContext<'_>) -> Result<bool, ExprError> {
    match eval(expr, ctx)? {
        Value::Bool(b) => Ok(b),
        other => Err(ExprError::Eval(format!(
            "expression yields {}, expected bool",
            other.type_name()
        ))),
    }
}

// ---- lexer ----

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Str(String),
    Num(f64),
    LParen,
    RParen,
    Comma,
    Dot,
    EqEq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Bang,
}

fn lex(src: &str) -> Result<Vec<Tok>, ExprError> {
    let mut toks = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0usize;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                toks.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                toks.push(Tok::RParen);
                i += 1;
            }
            ',' => {
                toks.push(Tok::Comma);
                i += 1;
            }
            '.' if !chars.get(i + 1).is_some_and(|c| c.is_ascii_digit()) => {
                toks.push(Tok::Dot);
                i += 1;
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::EqEq);
                    i += 2;
                } else {
                    return Err(ExprError::Parse("single '=' (use '==')".to_string()));
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::Ne);
                    i += 2;
                } else {
                    toks.push(Tok::Bang);
                    i += 1;
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::Le);
                    i += 2;
                } else {
                    toks.push(Tok::Lt);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::Ge);
                    i += 2;
                } else {
                    toks.push(Tok::Gt);
                    i += 1;
                }
            }
            '&' => {
                if chars.get(i + 1) == Some(&'&') {
                    toks.push(Tok::AndAnd);
                    i += 2;
                } else {
                    return Err(ExprError::Parse("single '&' (use '&&')".to_string()));
                }
            }
            '|' => {
                if chars.get(i + 1) == Some(&'|') {
                    toks.push(Tok::OrOr);
                    i += 2;
                } else {
                    return Err(ExprError::Parse("single '|' (use '||')".to_string()));
                }
            }
            '\'' | '"' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            s.push(ch);
                            i += 1;
                        }
                        None => {
                            return Err(ExprError::Parse("unterminated string literal".to_string()));
                        }
                    }
                }
                toks.push(Tok::Str(s));
            }
            _ if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let num: f64 = text
                    .parse()
                    .map_err(|_| ExprError::Parse(format!("bad number: {text:?}")))?;
                toks.push(Tok::Num(num));
            }
            _ if c.is_alphanumeric() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                toks.push(Tok::Ident(chars[start..i].iter().collect()));
            }
            other => {
                return Err(ExprError::Parse(format!("unexpected character {other:?}")));
            }
        }
    }
    Ok(toks)
}

// ---- parser ----

struct Parser {
    tokens: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, tok: &Tok, what: &str) -> Result<(), ExprError> {
        if self.peek() == Some(tok) {
            self.pos += 1;
            Ok(())
        } else {
            Err(ExprError::Parse(format!("expected {what}")))
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_and()?;
        loop {
            let is_or = match self.peek() {
                Some(Tok::OrOr) => true,
                Some(Tok::Ident(w)) if w == "or" => true,
                _ => false,
            };
            if !is_or {
                return Ok(lhs);
            }
            self.pos += 1;
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_not()?;
        loop {
            let is_and = match self.peek() {
                Some(Tok::AndAnd) => true,
                Some(Tok::Ident(w)) if w == "and" => true,
                _ => false,
            };
            if !is_and {
                return Ok(lhs);
            }
            self.pos += 1;
            let rhs = self.parse_not()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_not(&mut self) -> Result<Expr, ExprError> {
        let is_not = match self.peek() {
            Some(Tok::Bang) => true,
            Some(Tok::Ident(w)) if w == "not" => true,
            _ => false,
        };
        if is_not {
            self.pos += 1;
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_cmp()
    }

    fn parse_cmp(&mut self) -> Result<Expr, ExprError> {
        let lhs = self.parse_primary()?;
        let op = match self.peek() {
            Some(Tok::EqEq) => BinOp::Eq,
            Some(Tok::Ne) => BinOp::Ne,
            Some(Tok::Lt) => BinOp::Lt,
            Some(Tok::Le) => BinOp::Le,
            Some(Tok::Gt) => BinOp::Gt,
            Some(Tok::Ge) => BinOp::Ge,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.parse_primary()?;
        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        match self.bump() {
            Some(Tok::Str(s)) => Ok(self.parse_postfix(Expr::Str(s))?),
            Some(Tok::Num(n)) => Ok(Expr::Num(n)),
            Some(Tok::LParen) => {
                let inner = self.parse_or()?;
                self.expect(&Tok::RParen, "')'")?;
                self.parse_postfix(inner)
            }
            Some(Tok::Ident(name)) => match name.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                _ => {
                    if self.peek() == Some(&Tok::LParen) {
                        self.pos += 1;
                        let args = self.parse_args()?;
                        Ok(Expr::Call(name, args))
                    } else {
                        self.parse_postfix(Expr::Ident(name))
                    }
                }
            },
            Some(other) => Err(ExprError::Parse(format!("unexpected token {other:?}"))),
            None => Err(ExprError::Parse("unexpected end of expression".to_string())),
        }
    }

    fn parse_postfix(&mut self, mut expr: Expr) -> Result<Expr, ExprError> {
        while self.peek() == Some(&Tok::Dot) {
            self.pos += 1;
            match self.bump() {
                Some(Tok::Ident(field)) => {
                    expr = Expr::Field(Box::new(expr), field);
                }
                _ => return Err(ExprError::Parse("expected field name after '.'".to_string())),
            }
        }
        Ok(expr)
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, ExprError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Tok::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            match self.bump() {
                Some(Tok::Comma) => continue,
                Some(Tok::RParen) => return Ok(args),
                _ => return Err(ExprError::Parse("expected ',' or ')' in call".to_string())),
            }
        }
    }
}

// ---- evaluator ----

fn eval<'a>(expr: &'a Expr, ctx: &EvalContext<'a>) -> Result<Value<'a>, ExprError> {
    match expr {
        Expr::Str(s) => Ok(Value::Str(s)),
        Expr::Num(n) => Ok(Value::Num(*n)),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Ident(name) => lookup(name, ctx),
        Expr::Field(base, field) => {
            let base = eval(base, ctx)?;
            match base {
                Value::Segment(seg) => seg.map(field).map(Value::SeqMap).ok_or_else(|| {
                    ExprError::Eval(format!("segment has no mapping named {field:?}"))
                }),
                Value::Meta(meta) => Ok(Value::Str(
                    meta.get(field).map(String::as_str).unwrap_or(""),
                )),
                other => Err(ExprError::Eval(format!(
                    "cannot access field {field:?} on {}",
                    other.type_name()
                ))),
            }
        }
        Expr::Call(name, args) => eval_call(name, args, ctx),
        Expr::Not(inner) => match eval(inner, ctx)? {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            other => Err(ExprError::Eval(format!(
                "'!' needs bool, got {}",
                other.type_name()
            ))),
        },
        Expr::Binary(BinOp::And, lhs, rhs) => {
            if !expect_bool(eval(lhs, ctx)?, "&&")? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(expect_bool(eval(rhs, ctx)?, "&&")?))
        }
        Expr::Binary(BinOp::Or, lhs, rhs) => {
            if expect_bool(eval(lhs, ctx)?, "||")? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(expect_bool(eval(rhs, ctx)?, "||")?))
        }
        Expr::Binary(op, lhs, rhs) => {
            let lhs = eval(lhs, ctx)?;
            let rhs = eval(rhs, ctx)?;
            compare(*op, lhs, rhs).map(Value::Bool)
        }
    }
}

fn expect_bool(value: Value<'_>, op: &str) -> Result<bool, ExprError> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(ExprError::Eval(format!(
            "'{op}' needs bool operands, got {}",
            other.type_name()
        ))),
    }
}

fn lookup<'a>(name: &str, ctx: &EvalContext<'a>) -> Result<Value<'a>, ExprError> {
    let row = ctx.row;
    Ok(match name {
        "system" => Value::Str(&row.system),
        "document" => Value::Str(&row.document),
        "docSegId" => Value::Num(f64::from(row.doc_seg_id)),
        "globalSegId" => Value::Num(f64::from(row.global_seg_id)),
        "source" => Value::Str(&row.source),
        "target" => Value::Str(&row.target),
        "rater" => Value::Str(&row.rater),
        "category" => Value::Str(&row.category),
        "severity" => Value::Str(&row.severity),
        "metadata" => Value::Meta(&row.metadata),
        "segment" => Value::Segment(ctx.segment),
        _ => {
            return Err(ExprError::Eval(format!("unknown identifier {name:?}")));
        }
    })
}

fn eval_call<'a>(
    name: &str,
    args: &'a [Expr],
    ctx: &EvalContext<'a>,
) -> Result<Value<'a>, ExprError> {
    match name {
        "includes" | "excludes" => {
            if args.len() != 3 {
                return Err(ExprError::Eval(format!(
                    "{name}() takes 3 arguments (map, key, value), got {}",
                    args.len()
                )));
            }
            let map = match eval(&args[0], ctx)? {
                Value::SeqMap(m) => m,
                other => {
                    return Err(ExprError::Eval(format!(
                        "{name}() needs a segment mapping as first argument, got {}",
                        other.type_name()
                    )));
                }
            };
            let key = expect_str(eval(&args[1], ctx)?, name, "key")?;
            let value = expect_str(eval(&args[2], ctx)?, name, "value")?;
            // Absent key is false for BOTH predicates.
            let result = match map.get(key) {
                None => false,
                Some(seq) => {
                    let found = seq.iter().any(|v| v == value);
                    if name == "includes" { found } else { !found }
                }
            };
            Ok(Value::Bool(result))
        }
        _ => Err(ExprError::Eval(format!("unknown function {name:?}"))),
    }
}

fn expect_str<'a>(value: Value<'a>, func: &str, arg: &str) -> Result<&'a str, ExprError> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(ExprError::Eval(format!(
            "{func}() {arg} must be a string, got {}",
            other.type_name()
        ))),
    }
}

fn compare(op: BinOp, lhs: Value<'_>, rhs: Value<'_>) -> Result<bool, ExprError> {
    use std::cmp::Ordering;
    let ord = match (lhs, rhs) {
        (Value::Num(a), Value::Num(b)) => a.partial_cmp(&b),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) if matches!(op, BinOp::Eq | BinOp::Ne) => {
            return Ok(if op == BinOp::Eq { a == b } else { a != b });
        }
        (a, b) => {
            return Err(ExprError::Eval(format!(
                "cannot compare {} with {}",
                a.type_name(),
                b.type_name()
            )));
        }
    };
    let Some(ord) = ord else {
        // NaN comparisons are never true, except via '!='.
        return Ok(op == BinOp::Ne);
    };
    Ok(match op {
        BinOp::Eq => ord == Ordering::Equal,
        BinOp::Ne => ord != Ordering::Equal,
        BinOp::Lt => ord == Ordering::Less,
        BinOp::Le => ord != Ordering::Greater,
        BinOp::Gt => ord == Ordering::Greater,
        BinOp::Ge => ord != Ordering::Less,
        BinOp::And | BinOp::Or => unreachable!("logical ops handled above"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::row::tests::row;
    use crate::model::segment::build_segments;

    fn setup() -> (Vec<crate::model::row::RatingRow>, Vec<SegmentAggregate>) {
        let rows = vec![
            row("sysA", "docX", 1, 1, "rater1", "Accuracy/Omission", "Major"),
            row("sysA", "docX", 1, 1, "rater2", "Fluency/Grammar", "Minor"),
        ];
        let (segments, _) = build_segments(&rows);
        (rows, segments)
    }

    fn check(src: &str) -> Result<bool, ExprError> {
        let (rows, segments) = setup();
        let expr = parse(src)?;
        let ctx = EvalContext {
            row: &rows[0],
            segment: &segments[0],
        };
        evaluate(&expr, &ctx)
    }

    #[test]
    fn test_field_comparisons() {
        assert!(check("system == 'sysA'").unwrap());
        assert!(check("system != \"sysB\"").unwrap());
        assert!(check("docSegId == 1 && globalSegId >= 1").unwrap());
        assert!(!check("severity == 'Minor'").unwrap());
        assert!(check("category < 'B'").unwrap());
    }

    #[test]
    fn test_logic_and_word_operators() {
        assert!(check("severity == 'Major' and rater == 'rater1'").unwrap());
        assert!(check("severity == 'Minor' or severity == 'Major'").unwrap());
        assert!(check("not (severity == 'Minor')").unwrap());
        assert!(check("!(docSegId > 5)").unwrap());
        assert!(check("true || severity == 'Minor'").unwrap());
    }

    #[test]
    fn test_includes_excludes_asymmetry() {
        // Present key, present value.
        assert!(check("includes(segment.categories_by_rater, 'rater2', 'Fluency/Grammar')").unwrap());
        assert!(!check("excludes(segment.categories_by_rater, 'rater2', 'Fluency/Grammar')").unwrap());
        // Present key, absent value.
        assert!(!check("includes(segment.severities_by_rater, 'rater1', 'Minor')").unwrap());
        assert!(check("excludes(segment.severities_by_rater, 'rater1', 'Minor')").unwrap());
        // Absent key: both false.
        assert!(!check("includes(segment.categories_by_rater, 'nobody', 'x')").unwrap());
        assert!(!check("excludes(segment.categories_by_rater, 'nobody', 'x')").unwrap());
    }

    #[test]
    fn test_includes_excludes_never_both_true() {
        for key in ["rater1", "rater2", "nobody"] {
            for value in ["Major", "Minor", "zzz"] {
                let inc =
                    check(&format!("includes(segment.severities_by_rater, '{key}', '{value}')"))
                        .unwrap();
                let exc =
                    check(&format!("excludes(segment.severities_by_rater, '{key}', '{value}')"))
                        .unwrap();
                assert!(!(inc && exc));
            }
        }
    }

    #[test]
    fn test_metadata_access() {
        let (mut rows, segments) = setup();
        rows[0]
            .metadata
            .insert("note".to_string(), "double-checked".to_string());
        let expr = parse("metadata.note == 'double-checked'").unwrap();
        let ctx = EvalContext {
            row: &rows[0],
            segment: &segments[0],
        };
        assert!(evaluate(&expr, &ctx).unwrap());
        // Absent metadata key reads as empty string.
        let expr = parse("metadata.reviewer == ''").unwrap();
        assert!(evaluate(&expr, &ctx).unwrap());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse("system = 'x'"), Err(ExprError::Parse(_))));
        assert!(matches!(parse("includes(segment"), Err(ExprError::Parse(_))));
        assert!(matches!(parse("'unterminated"), Err(ExprError::Parse(_))));
        assert!(matches!(parse("a b"), Err(ExprError::Parse(_))));
        assert!(matches!(parse(""), Err(ExprError::Parse(_))));
    }

    #[test]
    fn test_eval_errors() {
        assert!(matches!(check("nosuchfield == 'x'"), Err(ExprError::Eval(_))));
        assert!(matches!(check("frobnicate(system)"), Err(ExprError::Eval(_))));
        assert!(matches!(check("system == 3"), Err(ExprError::Eval(_))));
        assert!(matches!(check("segment.bogus_map == 'x'"), Err(ExprError::Eval(_))));
        assert!(matches!(check("severity"), Err(ExprError::Eval(_))));
        assert!(matches!(
            check("includes(system, 'a', 'b')"),
            Err(ExprError::Eval(_))
        ));
    }
}
