//! Assertion/assumption grammar and application (spec §4.5, §6 directives).
//!
//! Grounded on `srs_setup.rs`'s validate-then-adopt shape: parse the
//! directive body into a typed expression first (`parse_expr`, which can
//! reject malformed input before anything is mutated), then apply it against
//! a live context (`apply_assert`/`apply_assume`, which cannot fail — by the
//! time they run, the expression already parsed and the target already
//! resolved to a [`ValueId`]).

#![forbid(unsafe_code)]

use thiserror::Error;

use crate::context::ExecContext;
use crate::value::{OpTag, ScriptNum, Value, ValueId, ValueStore};

/// A comparison directive reduces to one of these against a right-hand side.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn tag(self) -> OpTag {
        match self {
            CompareOp::Eq => OpTag::Equal,
            CompareOp::Ne => OpTag::NotEqual,
            CompareOp::Lt => OpTag::LessThan,
            CompareOp::Le => OpTag::LessEq,
            CompareOp::Gt => OpTag::GreaterThan,
            CompareOp::Ge => OpTag::GreaterEq,
        }
    }
}

/// One term of the right-hand side expression, before resolution against a
/// live context (placeholders/data refs need a store lookup to become a
/// [`ValueId`]).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Term {
    Int(i128),
    Placeholder(String),
    DataRef(String),
    Witness(u32),
}

/// `<op>? <term> ((+|-) <term>)*` — the grammar `bsst-assert`/`bsst-assume`
/// bodies follow (spec §6). Omitting `<op>` means `==`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedExpr {
    pub op: CompareOp,
    pub terms: Vec<(Term, bool)>, // (term, is_subtracted)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssertError {
    #[error("empty assertion/assumption expression")]
    Empty,
    #[error("malformed term {0:?} in expression {1:?}")]
    BadTerm(String, String),
}

pub fn parse_expr(expr: &str) -> Result<ParsedExpr, AssertError> {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return Err(AssertError::Empty);
    }
    let (op, rest) = strip_op(trimmed);
    let mut terms = Vec::new();
    let mut negate = false;
    for chunk in split_additive(rest) {
        let chunk = chunk.trim();
        if chunk.is_empty() {
            continue;
        }
        if chunk == "+" {
            negate = false;
            continue;
        }
        if chunk == "-" {
            negate = true;
            continue;
        }
        terms.push((parse_term(chunk, expr)?, negate));
        negate = false;
    }
    if terms.is_empty() {
        return Err(AssertError::Empty);
    }
    Ok(ParsedExpr { op, terms })
}

fn strip_op(s: &str) -> (CompareOp, &str) {
    for (prefix, op) in [
        ("==", CompareOp::Eq),
        ("!=", CompareOp::Ne),
        ("<=", CompareOp::Le),
        (">=", CompareOp::Ge),
        ("<", CompareOp::Lt),
        (">", CompareOp::Gt),
    ] {
        if let Some(rest) = s.strip_prefix(prefix) {
            return (op, rest);
        }
    }
    (CompareOp::Eq, s)
}

/// Split on `+`/`-` while keeping the operator as its own chunk, so the
/// caller can track sign across terms without a full tokenizer.
fn split_additive(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for c in s.chars() {
        if c == '+' || c == '-' {
            if !current.trim().is_empty() {
                out.push(current.clone());
            }
            current.clear();
            out.push(c.to_string());
        } else {
            current.push(c);
        }
    }
    if !current.trim().is_empty() {
        out.push(current);
    }
    out
}

fn parse_term(word: &str, full: &str) -> Result<Term, AssertError> {
    let word = word.trim();
    if let Some(name) = word.strip_prefix('$') {
        return Ok(Term::Placeholder(name.to_string()));
    }
    if let Some(name) = word.strip_prefix('&') {
        return Ok(Term::DataRef(name.to_string()));
    }
    if let Some(n) = word.strip_prefix("wit") {
        if let Ok(idx) = n.parse::<u32>() {
            return Ok(Term::Witness(idx));
        }
    }
    word.parse::<i128>().map(Term::Int).map_err(|_| AssertError::BadTerm(word.to_string(), full.to_string()))
}

/// Resolve a [`Term`] to a [`ValueId`], creating placeholders on first
/// mention (spec §3: "free until an assumption constrains it").
fn resolve_term(store: &mut ValueStore, ctx: &mut ExecContext, term: &Term) -> Option<ValueId> {
    match term {
        Term::Int(n) => Some(store.intern(Value::Literal(ScriptNum(*n).encode()))),
        Term::Placeholder(name) => Some(store.intern(Value::Placeholder(name.clone()))),
        Term::DataRef(name) => ctx.data_refs.get(name).copied(),
        Term::Witness(idx) => Some(store.intern(Value::Witness { index: *idx, alias: None })),
    }
}

/// Fold a parsed expression's right-hand side into a single [`ValueId`].
fn resolve_rhs(store: &mut ValueStore, ctx: &mut ExecContext, expr: &ParsedExpr) -> Option<ValueId> {
    let mut acc: Option<ValueId> = None;
    for (term, negated) in &expr.terms {
        let id = resolve_term(store, ctx, term)?;
        acc = Some(match acc {
            None if *negated => {
                let zero = store.intern(Value::Literal(Vec::new()));
                store.intern_op(OpTag::Sub, vec![zero, id], false)
            }
            None => id,
            Some(prev) if *negated => store.intern_op(OpTag::Sub, vec![prev, id], false),
            Some(prev) => store.intern_op(OpTag::Add, vec![prev, id], false),
        });
    }
    acc
}

/// Resolve a directive's `(target)` clause (already carrying its sigil,
/// e.g. `"&x"`, `"$y"`, `"wit3"`) to a [`ValueId`].
pub fn resolve_target(store: &mut ValueStore, ctx: &mut ExecContext, raw: &str) -> Option<ValueId> {
    let term = parse_term(raw, raw).ok()?;
    resolve_term(store, ctx, &term)
}

/// Build the predicate `target <op> rhs` (spec §4.5). `size` wraps `target`
/// in `SIZE(...)` first (`bsst-assert-size`/`bsst-assume-size`).
pub fn build_predicate(store: &mut ValueStore, ctx: &mut ExecContext, target: ValueId, size: bool, expr: &ParsedExpr) -> Option<ValueId> {
    let lhs = if size { store.intern_op(OpTag::Size, vec![target], false) } else { target };
    let rhs = resolve_rhs(store, ctx, expr)?;
    Some(store.intern_op(expr.op.tag(), vec![lhs, rhs], false))
}

/// `bsst-assert`: publish as a checked enforcement (spec §4.5, §4.3).
pub fn apply_assert(store: &mut ValueStore, ctx: &mut ExecContext, target: ValueId, size: bool, expr: &ParsedExpr, position: usize) {
    if let Some(pred) = build_predicate(store, ctx, target, size, expr) {
        ctx.publish(pred, position);
    }
}

/// `bsst-assume`: adopt as a hypothesis on the path condition, never
/// reported as a checked constraint (spec §4.5: "taken as given, not
/// verified").
pub fn apply_assume(store: &mut ValueStore, ctx: &mut ExecContext, target: ValueId, size: bool, expr: &ParsedExpr) {
    if let Some(pred) = build_predicate(store, ctx, target, size, expr) {
        ctx.path_condition.push(pred);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn parses_comparison_with_explicit_operator() {
        let e = parse_expr("<= 32").unwrap();
        assert_eq!(e.op, CompareOp::Le);
        assert_eq!(e.terms, vec![(Term::Int(32), false)]);
    }

    #[test]
    fn missing_operator_defaults_to_equality() {
        let e = parse_expr("&x + 1").unwrap();
        assert_eq!(e.op, CompareOp::Eq);
        assert_eq!(e.terms, vec![(Term::DataRef("x".to_string()), false), (Term::Int(1), false)]);
    }

    #[test]
    fn subtraction_is_tracked_per_term() {
        let e = parse_expr("$a - 1").unwrap();
        assert_eq!(e.terms, vec![(Term::Placeholder("a".to_string()), false), (Term::Int(1), true)]);
    }

    #[test]
    fn empty_expression_is_rejected() {
        assert_eq!(parse_expr("   "), Err(AssertError::Empty));
    }

    #[test]
    fn assert_publishes_an_enforcement() {
        let mut store = ValueStore::new();
        let mut ctx = ExecContext::new();
        let target = store.intern(Value::Literal(vec![32]));
        let expr = parse_expr("== 32").unwrap();
        apply_assert(&mut store, &mut ctx, target, false, &expr, 5);
        assert_eq!(ctx.enforcements.len(), 1);
        assert_eq!(ctx.enforcements[0].position, 5);
    }

    #[test]
    fn assume_extends_path_condition_not_enforcements() {
        let mut store = ValueStore::new();
        let mut ctx = ExecContext::new();
        let target = store.intern(Value::Placeholder("y".to_string()));
        let expr = parse_expr(">= 0").unwrap();
        apply_assume(&mut store, &mut ctx, target, false, &expr);
        assert!(ctx.enforcements.is_empty());
        assert_eq!(ctx.path_condition.len(), 1);
    }

    #[test]
    fn unresolved_data_ref_skips_silently() {
        let mut store = ValueStore::new();
        let mut ctx = ExecContext::new();
        let target = store.intern(Value::Literal(vec![1]));
        let expr = parse_expr("== &never_bound").unwrap();
        apply_assert(&mut store, &mut ctx, target, false, &expr, 0);
        assert!(ctx.enforcements.is_empty());
    }
}
