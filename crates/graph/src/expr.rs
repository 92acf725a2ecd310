//! Expression evaluation (spec §4.11.8): arithmetic, comparisons,
//! logicals, conditionals, regex/LIKE, and the SPARQL built-ins FILTER and
//! BIND expressions need.
//!
//! Grounded on the `reifydb` example's boxed binary/unary `Expression` AST
//! shape (`reifydb-reifydb/crates/base/src/expression/mod.rs`), adapted to
//! the built-ins and three-valued FILTER semantics spec §4.11.8 names.

use crate::binding::Solution;
use recordgraph_core::error::{RecordGraphError, Result};
use recordgraph_core::value::FieldValue;
use regex::Regex;
use std::cmp::Ordering;

/// An expression over a solution's bindings.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A literal value.
    Literal(FieldValue),
    /// A variable reference (without `?`).
    Var(String),
    /// `a + b`, `a - b`, `a * b`, `a / b` with int64/double type promotion.
    Arithmetic(ArithOp, Box<Expr>, Box<Expr>),
    /// `a = b`, `a != b`, `a < b`, etc.
    Comparison(CmpOp, Box<Expr>, Box<Expr>),
    /// `a && b`.
    And(Box<Expr>, Box<Expr>),
    /// `a || b`.
    Or(Box<Expr>, Box<Expr>),
    /// `!a`.
    Not(Box<Expr>),
    /// `BOUND(var)`.
    Bound(String),
    /// `IF(cond, then, else)`.
    If(Box<Expr>, Box<Expr>, Box<Expr>),
    /// `COALESCE(args...)`: first argument that doesn't error/evaluate to
    /// an error, else an error.
    Coalesce(Vec<Expr>),
    /// `NULLIF(a, b)`: `a` unless `a = b`, in which case an unbound error.
    NullIf(Box<Expr>, Box<Expr>),
    /// `CASE WHEN cond THEN value ... ELSE default END`.
    Case(Vec<(Expr, Expr)>, Option<Box<Expr>>),
    /// `REGEX(text, pattern, flags)`.
    Regex(Box<Expr>, String, Option<String>),
    /// SPARQL `LIKE` (not a real built-in name but the common extension);
    /// compiled to an anchored regex with `%→.*`, `_→.`.
    Like(Box<Expr>, String),
    /// A call to a named built-in function.
    Call(String, Vec<Expr>),
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy)]
pub enum ArithOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy)]
pub enum CmpOp {
    /// `=`
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
}

/// Evaluate `expr` against `solution`. Returns `Err` on type errors,
/// division by zero, unbound variables in non-`BOUND` contexts, or unknown
/// built-ins — callers that want FILTER's "error → false EBV" behavior
/// should catch the error and treat it as `false` rather than propagate it
/// (spec §4.11.3's filter case).
pub fn evaluate(expr: &Expr, solution: &Solution) -> Result<FieldValue> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Var(name) => solution
            .get(name)
            .cloned()
            .ok_or_else(|| RecordGraphError::UnsupportedExpression(format!("unbound variable ?{name}"))),
        Expr::Arithmetic(op, a, b) => arithmetic(*op, &evaluate(a, solution)?, &evaluate(b, solution)?),
        Expr::Comparison(op, a, b) => Ok(FieldValue::Bool(compare(*op, &evaluate(a, solution)?, &evaluate(b, solution)?))),
        Expr::And(a, b) => Ok(FieldValue::Bool(ebv(&evaluate(a, solution)?) && ebv(&evaluate(b, solution)?))),
        Expr::Or(a, b) => Ok(FieldValue::Bool(ebv(&evaluate(a, solution)?) || ebv(&evaluate(b, solution)?))),
        Expr::Not(a) => Ok(FieldValue::Bool(!ebv(&evaluate(a, solution)?))),
        Expr::Bound(name) => Ok(FieldValue::Bool(solution.contains_key(name))),
        Expr::If(cond, then, els) => {
            if ebv(&evaluate(cond, solution)?) {
                evaluate(then, solution)
            } else {
                evaluate(els, solution)
            }
        }
        Expr::Coalesce(args) => {
            for a in args {
                if let Ok(v) = evaluate(a, solution) {
                    return Ok(v);
                }
            }
            Err(RecordGraphError::UnsupportedExpression("COALESCE: all arguments errored".into()))
        }
        Expr::NullIf(a, b) => {
            let va = evaluate(a, solution)?;
            let vb = evaluate(b, solution)?;
            if va == vb {
                Err(RecordGraphError::UnsupportedExpression("NULLIF: arguments equal".into()))
            } else {
                Ok(va)
            }
        }
        Expr::Case(arms, default) => {
            for (cond, value) in arms {
                if ebv(&evaluate(cond, solution)?) {
                    return evaluate(value, solution);
                }
            }
            match default {
                Some(d) => evaluate(d, solution),
                None => Err(RecordGraphError::UnsupportedExpression("CASE: no arm matched and no ELSE".into())),
            }
        }
        Expr::Regex(text, pattern, flags) => {
            let value = evaluate(text, solution)?;
            let FieldValue::String(s) = value else {
                return Err(RecordGraphError::UnsupportedExpression("REGEX: text argument must be a string".into()));
            };
            let case_insensitive = flags.as_deref().map(|f| f.contains('i')).unwrap_or(false);
            let re = compile_regex(pattern, case_insensitive)?;
            Ok(FieldValue::Bool(re.is_match(&s)))
        }
        Expr::Like(text, pattern) => {
            let value = evaluate(text, solution)?;
            let FieldValue::String(s) = value else {
                return Err(RecordGraphError::UnsupportedExpression("LIKE: text argument must be a string".into()));
            };
            let re = like_to_regex(pattern)?;
            Ok(FieldValue::Bool(re.is_match(&s)))
        }
        Expr::Call(name, args) => call_builtin(name, args, solution),
    }
}

/// Effective boolean value of an already-evaluated value (spec §17.2).
pub fn ebv(v: &FieldValue) -> bool {
    v.effective_boolean_value()
}

/// Evaluate `expr`'s EBV, collapsing any evaluation error to `false`
/// rather than propagating it (FILTER's short-circuit rule, spec §4.11.3).
pub fn ebv_or_false(expr: &Expr, solution: &Solution) -> bool {
    evaluate(expr, solution).map(|v| ebv(&v)).unwrap_or(false)
}

fn arithmetic(op: ArithOp, a: &FieldValue, b: &FieldValue) -> Result<FieldValue> {
    use ArithOp::*;
    match (a, b) {
        (FieldValue::Int64(x), FieldValue::Int64(y)) => match op {
            Add => Ok(FieldValue::Int64(x.wrapping_add(*y))),
            Sub => Ok(FieldValue::Int64(x.wrapping_sub(*y))),
            Mul => Ok(FieldValue::Int64(x.wrapping_mul(*y))),
            Div => {
                if *y == 0 {
                    Err(RecordGraphError::UnsupportedExpression("division by zero".into()))
                } else {
                    Ok(FieldValue::Int64(x / y))
                }
            }
        },
        (x, y) if x.is_numeric() && y.is_numeric() => {
            let (fx, fy) = (as_f64(x), as_f64(y));
            match op {
                Add => Ok(FieldValue::Double(fx + fy)),
                Sub => Ok(FieldValue::Double(fx - fy)),
                Mul => Ok(FieldValue::Double(fx * fy)),
                Div => {
                    if fy == 0.0 {
                        Err(RecordGraphError::UnsupportedExpression("division by zero".into()))
                    } else {
                        Ok(FieldValue::Double(fx / fy))
                    }
                }
            }
        }
        _ => Err(RecordGraphError::UnsupportedExpression("arithmetic requires numeric operands".into())),
    }
}

fn as_f64(v: &FieldValue) -> f64 {
    match v {
        FieldValue::Int64(n) => *n as f64,
        FieldValue::Double(d) => *d,
        _ => f64::NAN,
    }
}

fn compare(op: CmpOp, a: &FieldValue, b: &FieldValue) -> bool {
    match op {
        CmpOp::Eq => a == b,
        CmpOp::Ne => a != b,
        CmpOp::Lt => a.compare(b) == Some(Ordering::Less),
        CmpOp::Le => matches!(a.compare(b), Some(Ordering::Less) | Some(Ordering::Equal)),
        CmpOp::Gt => a.compare(b) == Some(Ordering::Greater),
        CmpOp::Ge => matches!(a.compare(b), Some(Ordering::Greater) | Some(Ordering::Equal)),
    }
}

fn compile_regex(pattern: &str, case_insensitive: bool) -> Result<Regex> {
    let pattern = if case_insensitive { format!("(?i){pattern}") } else { pattern.to_string() };
    Regex::new(&pattern).map_err(|e| RecordGraphError::UnsupportedExpression(format!("invalid regex: {e}")))
}

/// Compile a SQL-style `LIKE` pattern (`%` → any run, `_` → any one
/// character) to an anchored regex.
fn like_to_regex(pattern: &str) -> Result<Regex> {
    let mut out = String::from("^");
    for c in pattern.chars() {
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            _ => {
                if regex_syntax::is_meta_character(c) {
                    out.push('\\');
                }
                out.push(c);
            }
        }
    }
    out.push('$');
    Regex::new(&out).map_err(|e| RecordGraphError::UnsupportedExpression(format!("invalid LIKE pattern: {e}")))
}

fn call_builtin(name: &str, args: &[Expr], solution: &Solution) -> Result<FieldValue> {
    let vals: Result<Vec<FieldValue>> = args.iter().map(|a| evaluate(a, solution)).collect();
    let vals = vals?;
    match name.to_ascii_uppercase().as_str() {
        "STRLEN" => match &vals[..] {
            [FieldValue::String(s)] => Ok(FieldValue::Int64(s.chars().count() as i64)),
            _ => Err(RecordGraphError::UnsupportedExpression("STRLEN expects one string argument".into())),
        },
        "UCASE" => match &vals[..] {
            [FieldValue::String(s)] => Ok(FieldValue::String(s.to_uppercase())),
            _ => Err(RecordGraphError::UnsupportedExpression("UCASE expects one string argument".into())),
        },
        "LCASE" => match &vals[..] {
            [FieldValue::String(s)] => Ok(FieldValue::String(s.to_lowercase())),
            _ => Err(RecordGraphError::UnsupportedExpression("LCASE expects one string argument".into())),
        },
        "CONCAT" => {
            let mut out = String::new();
            for v in &vals {
                match v {
                    FieldValue::String(s) => out.push_str(s),
                    other => out.push_str(&display(other)),
                }
            }
            Ok(FieldValue::String(out))
        }
        "CONTAINS" => match &vals[..] {
            [FieldValue::String(s), FieldValue::String(needle)] => Ok(FieldValue::Bool(s.contains(needle.as_str()))),
            _ => Err(RecordGraphError::UnsupportedExpression("CONTAINS expects two string arguments".into())),
        },
        "STRSTARTS" => match &vals[..] {
            [FieldValue::String(s), FieldValue::String(prefix)] => Ok(FieldValue::Bool(s.starts_with(prefix.as_str()))),
            _ => Err(RecordGraphError::UnsupportedExpression("STRSTARTS expects two string arguments".into())),
        },
        "STRENDS" => match &vals[..] {
            [FieldValue::String(s), FieldValue::String(suffix)] => Ok(FieldValue::Bool(s.ends_with(suffix.as_str()))),
            _ => Err(RecordGraphError::UnsupportedExpression("STRENDS expects two string arguments".into())),
        },
        "ABS" => match &vals[..] {
            [FieldValue::Int64(n)] => Ok(FieldValue::Int64(n.abs())),
            [FieldValue::Double(d)] => Ok(FieldValue::Double(d.abs())),
            _ => Err(RecordGraphError::UnsupportedExpression("ABS expects one numeric argument".into())),
        },
        "DATATYPE" => Ok(FieldValue::String(datatype_of(&vals[0]).to_string())),
        "ISIRI" | "ISURI" => Ok(FieldValue::Bool(is_iri(&vals[0]))),
        "ISBLANK" => Ok(FieldValue::Bool(is_blank(&vals[0]))),
        "ISLITERAL" => Ok(FieldValue::Bool(matches!(vals[0], FieldValue::String(_) | FieldValue::Int64(_) | FieldValue::Double(_) | FieldValue::Bool(_)) && !is_iri(&vals[0]) && !is_blank(&vals[0]))),
        "ISNUMERIC" => Ok(FieldValue::Bool(vals[0].is_numeric())),
        "TRIPLE" => match &vals[..] {
            [s, p, o] => Ok(FieldValue::String(crate::quoted::encode_quoted(s, p, o))),
            _ => Err(RecordGraphError::UnsupportedExpression("TRIPLE expects three arguments".into())),
        },
        "ISTRIPLE" => Ok(FieldValue::Bool(crate::quoted::is_triple(&vals[0]))),
        "SUBJECT" => crate::quoted::subject(&vals[0])
            .ok_or_else(|| RecordGraphError::UnsupportedExpression("SUBJECT: not a quoted triple".into())),
        "PREDICATE" => crate::quoted::predicate(&vals[0])
            .ok_or_else(|| RecordGraphError::UnsupportedExpression("PREDICATE: not a quoted triple".into())),
        "OBJECT" => crate::quoted::object(&vals[0])
            .ok_or_else(|| RecordGraphError::UnsupportedExpression("OBJECT: not a quoted triple".into())),
        other => Err(RecordGraphError::UnsupportedExpression(format!("unknown built-in {other}"))),
    }
}

fn display(v: &FieldValue) -> String {
    match v {
        FieldValue::Null => String::new(),
        FieldValue::Bool(b) => b.to_string(),
        FieldValue::Int64(n) => n.to_string(),
        FieldValue::Double(d) => d.to_string(),
        FieldValue::String(s) => s.clone(),
        FieldValue::Data(d) => format!("{d:?}"),
        FieldValue::Array(a) => format!("{a:?}"),
    }
}

/// A conservative `xsd:`-style datatype tag, used by `DATATYPE()`.
fn datatype_of(v: &FieldValue) -> &'static str {
    match v {
        FieldValue::Null => "xsd:null",
        FieldValue::Bool(_) => "xsd:boolean",
        FieldValue::Int64(_) => "xsd:integer",
        FieldValue::Double(_) => "xsd:double",
        FieldValue::String(s) if is_iri(&FieldValue::String(s.clone())) => "xsd:anyURI",
        FieldValue::String(_) => "xsd:string",
        FieldValue::Data(_) => "xsd:hexBinary",
        FieldValue::Array(_) => "xsd:array",
    }
}

fn is_iri(v: &FieldValue) -> bool {
    matches!(v, FieldValue::String(s) if s.contains(':') && !s.starts_with("_:") && !s.starts_with("<<"))
}

fn is_blank(v: &FieldValue) -> bool {
    matches!(v, FieldValue::String(s) if s.starts_with("_:"))
}

/// Minimal port of `regex_syntax`'s "is this character special" check, so
/// `LIKE` escaping doesn't need the full `regex-syntax` crate as a
/// dependency of its own.
mod regex_syntax {
    pub fn is_meta_character(c: char) -> bool {
        matches!(c, '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$')
    }
}
