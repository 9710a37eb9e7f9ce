//! Interpreter for predicate ASTs.
//!
//! Navigation never fails: a missing key, an index past the end or a step
//! into a scalar yields [`Operand::Absent`]. Absent, like an explicit null
//! in the document, compares false under every operator; only `is None` /
//! `is not None` observe it.

use crate::openapi::expr::{CmpOp, Expr, Key, Literal, Method};
use crate::tree::value::Value;
use std::borrow::Cow;

/// Names a predicate may read, bound for one candidate.
#[derive(Debug, Clone, Default)]
pub struct Context<'a> {
    pub path: Option<&'a str>,
    pub method: Option<&'a str>,
    pub resource: Option<&'a Value>,
}

impl<'a> Context<'a> {
    fn lookup(&self, name: &str) -> Operand<'a> {
        match name {
            "path" => self.path.map(|p| Operand::owned(Value::from(p))),
            "method" => self.method.map(|m| Operand::owned(Value::from(m))),
            "resource" => self.resource.map(|r| Operand::Present(Cow::Borrowed(r))),
            _ => None,
        }
        .unwrap_or(Operand::Absent)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand<'a> {
    Absent,
    Present(Cow<'a, Value>),
}

impl<'a> Operand<'a> {
    fn owned(value: Value) -> Self {
        Operand::Present(Cow::Owned(value))
    }

    fn boolean(b: bool) -> Self {
        Operand::owned(Value::Bool(b))
    }

    fn value(&self) -> Option<&Value> {
        match self {
            Operand::Absent => None,
            Operand::Present(v) => Some(v),
        }
    }

    /// Absent, null, false, zero and empty values are falsy.
    pub fn truthy(&self) -> bool {
        match self.value() {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Sequence(items)) => !items.is_empty(),
            Some(Value::Mapping(map)) => !map.is_empty(),
            Some(Value::Tagged(_)) => true,
        }
    }

    fn is_none(&self) -> bool {
        matches!(self.value(), None | Some(Value::Null))
    }

    /// One navigation step; the result borrows from the document when the
    /// receiver does.
    fn step(self, key: &Key) -> Operand<'a> {
        let Operand::Present(value) = self else {
            return Operand::Absent;
        };
        match value {
            Cow::Borrowed(v) => child(v, key).map_or(Operand::Absent, |c| Operand::Present(Cow::Borrowed(c))),
            Cow::Owned(v) => child(&v, key).map_or(Operand::Absent, |c| Operand::owned(c.clone())),
        }
    }
}

fn child<'v>(value: &'v Value, key: &Key) -> Option<&'v Value> {
    match (value, key) {
        (Value::Mapping(map), Key::Str(k)) => map.get(k),
        (Value::Mapping(map), Key::Int(n)) => map.get(&n.to_string()),
        (Value::Sequence(items), Key::Int(n)) => usize::try_from(*n).ok().and_then(|i| items.get(i)),
        (Value::Sequence(items), Key::Str(k)) => k.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

pub fn eval<'a>(expr: &Expr, ctx: &Context<'a>) -> Operand<'a> {
    match expr {
        Expr::Literal(lit) => Operand::owned(match lit {
            Literal::Str(s) => Value::from(s.as_str()),
            Literal::Int(n) => Value::from(*n),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::None => Value::Null,
        }),
        Expr::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match eval(item, ctx) {
                    Operand::Present(v) => out.push(v.into_owned()),
                    Operand::Absent => out.push(Value::Null),
                }
            }
            Operand::owned(Value::Sequence(out))
        }
        Expr::Ident(name) => ctx.lookup(name),
        Expr::Attr(inner, name) => eval(inner, ctx).step(&Key::Str(name.clone())),
        Expr::Index(inner, key) => eval(inner, ctx).step(key),
        Expr::Call {
            receiver,
            method,
            args,
        } => Operand::boolean(call(&eval(receiver, ctx), *method, args, ctx)),
        Expr::Not(inner) => Operand::boolean(!eval(inner, ctx).truthy()),
        Expr::And(a, b) => Operand::boolean(eval(a, ctx).truthy() && eval(b, ctx).truthy()),
        Expr::Or(a, b) => Operand::boolean(eval(a, ctx).truthy() || eval(b, ctx).truthy()),
        Expr::IsNone { operand, negated } => {
            Operand::boolean(eval(operand, ctx).is_none() != *negated)
        }
        Expr::Compare { op, lhs, rhs } => {
            let lhs = compared(lhs, ctx);
            let rhs = compared(rhs, ctx);
            let (Some(l), Some(r)) = (lhs.value(), rhs.value()) else {
                return Operand::boolean(false);
            };
            Operand::boolean(match op {
                CmpOp::Eq => loose_eq(l, r),
                CmpOp::Ne => !loose_eq(l, r),
                CmpOp::In => contains(r, l),
                CmpOp::NotIn => !contains(r, l),
            })
        }
    }
}

/// A null read from the document compares like a missing value. A `None`
/// literal keeps its value.
fn compared<'a>(expr: &Expr, ctx: &Context<'a>) -> Operand<'a> {
    let operand = eval(expr, ctx);
    if !matches!(expr, Expr::Literal(_)) && operand.is_none() {
        return Operand::Absent;
    }
    operand
}

/// Structural equality, plus: a string equals a sequence of mappings when
/// any of the mappings has it as a key (`resource.security == 'oauth2'`).
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Sequence(items), Value::String(key)) | (Value::String(key), Value::Sequence(items)) => {
            items
                .iter()
                .any(|item| item.as_mapping().is_some_and(|m| m.contains_key(key)))
        }
        (Value::Number(x), Value::Number(y)) => x == y || (x.as_f64().is_some() && x.as_f64() == y.as_f64()),
        _ => a == b,
    }
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    match (haystack, needle) {
        (Value::Sequence(items), _) => items.iter().any(|item| item == needle),
        (Value::Mapping(map), Value::String(key)) => map.contains_key(key),
        (Value::String(s), Value::String(sub)) => s.contains(sub.as_str()),
        _ => false,
    }
}

fn call(receiver: &Operand<'_>, method: Method, args: &[Expr], ctx: &Context<'_>) -> bool {
    let Some(Value::String(text)) = receiver.value() else {
        return false;
    };

    // Like Python's str methods, a list of candidates matches any of them.
    let mut candidates = Vec::new();
    for arg in args {
        match eval(arg, ctx).value() {
            Some(Value::String(s)) => candidates.push(s.clone()),
            Some(Value::Sequence(items)) => {
                candidates.extend(items.iter().filter_map(|i| i.as_str().map(str::to_string)))
            }
            _ => {}
        }
    }

    candidates.iter().any(|c| match method {
        Method::StartsWith => text.starts_with(c.as_str()),
        Method::EndsWith => text.ends_with(c.as_str()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openapi::expr::parse;
    use crate::tree::load::load_document;

    fn check(src: &str, ctx: &Context<'_>) -> bool {
        eval(&parse(src).unwrap(), ctx).truthy()
    }

    fn operation() -> Value {
        load_document(
            "\
tags: [internal, admin]
deprecated: false
summary: null
x-visibility: private
security:
  - oauth2: [read]
  - apiKey: []
responses:
  '200': {description: ok}
",
        )
        .unwrap()
    }

    #[test]
    fn context_names() {
        let op = operation();
        let ctx = Context {
            path: Some("/internal/users"),
            method: Some("post"),
            resource: Some(&op),
        };
        assert!(check("method == 'post'", &ctx));
        assert!(check("path.startswith('/internal')", &ctx));
        assert!(check("path.endswith(['/users', '/groups'])", &ctx));
        assert!(!check("method != 'post'", &ctx));
        assert!(check("resource['x-visibility'] == 'private'", &ctx));
    }

    #[test]
    fn missing_values_are_absent() {
        let op = operation();
        let ctx = Context {
            path: Some("/a"),
            method: Some("get"),
            resource: Some(&op),
        };
        assert!(check("resource.nope is None", &ctx));
        assert!(check("resource.nope.deeper[3] is None", &ctx));
        assert!(!check("resource.nope == 'x'", &ctx));
        assert!(!check("resource.nope != 'x'", &ctx));
        assert!(!check("resource.nope", &ctx));
        assert!(!check("'x' in resource.nope", &ctx));
        assert!(!check("'x' not in resource.nope", &ctx));
    }

    #[test]
    fn explicit_null_is_none() {
        let op = operation();
        let ctx = Context {
            resource: Some(&op),
            ..Context::default()
        };
        assert!(check("resource.summary is None", &ctx));
        assert!(!check("resource.summary is not None", &ctx));
        assert!(check("resource.deprecated is not None", &ctx));
        assert!(!check("resource.deprecated", &ctx));
    }

    #[test]
    fn explicit_null_compares_false() {
        let op = operation();
        let ctx = Context {
            resource: Some(&op),
            ..Context::default()
        };
        assert!(!check("resource.summary != 'x'", &ctx));
        assert!(!check("resource.summary == 'x'", &ctx));
        assert!(!check("resource.summary == None", &ctx));
        assert!(!check("'x' not in resource.summary", &ctx));
        assert!(!check("resource.summary in ['x', None]", &ctx));
        assert!(check("resource.deprecated != 'x'", &ctx));
    }

    #[test]
    fn membership_and_indexing() {
        let op = operation();
        let ctx = Context {
            method: Some("get"),
            resource: Some(&op),
            ..Context::default()
        };
        assert!(check("'admin' in resource.tags", &ctx));
        assert!(check("'public' not in resource.tags", &ctx));
        assert!(check("resource.tags[0] == 'internal'", &ctx));
        assert!(check("resource.tags.1 == 'admin'", &ctx));
        assert!(check("resource.tags[5] is None", &ctx));
        assert!(check("method in ['get', 'head']", &ctx));
        assert!(check("'200' in resource.responses", &ctx));
        assert!(check("resource.responses.200.description == 'ok'", &ctx));
        assert!(check("'ern' in resource.tags[0]", &ctx));
    }

    #[test]
    fn security_requirement_matching() {
        let op = operation();
        let ctx = Context {
            resource: Some(&op),
            ..Context::default()
        };
        assert!(check("resource.security == 'oauth2'", &ctx));
        assert!(check("'apiKey' == resource.security", &ctx));
        assert!(!check("resource.security == 'basic'", &ctx));
        assert!(check("resource.security != 'basic'", &ctx));
        assert!(check("resource.security[0].oauth2[0] == 'read'", &ctx));
    }

    #[test]
    fn boolean_structure() {
        let ctx = Context {
            path: Some("/a"),
            method: Some("delete"),
            resource: None,
        };
        assert!(check("not method == 'get'", &ctx));
        assert!(check("method == 'get' or (path == '/a' and method == 'delete')", &ctx));
        assert!(!check("True and False", &ctx));
        assert!(check("resource is None", &ctx));
    }

    #[test]
    fn numbers_compare_by_value() {
        let op = load_document("limit: 10\nratio: 1.0\n").unwrap();
        let ctx = Context {
            resource: Some(&op),
            ..Context::default()
        };
        assert!(check("resource.limit == 10", &ctx));
        assert!(check("resource.ratio == 1", &ctx));
        assert!(!check("resource.limit == '10'", &ctx));
    }
}
