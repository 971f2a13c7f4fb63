//! Predicate evaluation
//!
//! [`matches`] is total: any tree, any object. Unknown fields, undefined
//! values, literals of the wrong type and invalid regular expressions all
//! evaluate to `false` rather than raising an error. Use
//! [`validate`](crate::validate) beforehand to catch those mistakes.
//!
//! | Field type | Supported comparators |
//! |------------|------------------------|
//! | string     | all except `defined` (which applies to every type) |
//! | invid      | `=` against an invid; string comparators against the referenced label |
//! | boolean    | `=` |
//! | numeric, date | `=`, `<`, `<=`, `>`, `>=` |
//! | ip         | `=`, `starts`, `ends` |

use crate::node::{ArrayOp, Comparator, DataNode, FieldSelector, Query, QueryNode};
use dirstore_core::{BaseDef, BaseId, FieldId, FieldValue, Invid, StoredObject, Value};
use std::cmp::Ordering;

/// What the evaluator needs to know beyond the object itself
pub trait QueryContext {
    /// Map a field name to its id on `base`
    fn resolve_field(&self, base: BaseId, name: &str) -> Option<FieldId>;

    /// The label of `object`
    fn object_label(&self, object: &StoredObject) -> Option<String>;

    /// The label of the object `invid` refers to
    ///
    /// Used when a string literal is compared with an invid field.
    fn label_of(&self, _invid: Invid) -> Option<String> {
        None
    }
}

/// A single base's schema is enough context for queries that never
/// follow invid references.
impl QueryContext for BaseDef {
    fn resolve_field(&self, base: BaseId, name: &str) -> Option<FieldId> {
        if base != self.type_id {
            return None;
        }
        self.field_by_name(name).map(|f| f.id)
    }

    fn object_label(&self, object: &StoredObject) -> Option<String> {
        object.label(self)
    }
}

/// Test `object` against `query`
///
/// Objects of a different base never match.
pub fn matches<C: QueryContext + ?Sized>(ctx: &C, query: &Query, object: &StoredObject) -> bool {
    if object.invid().base() != query.base {
        return false;
    }
    match &query.root {
        Some(root) => matches_node(ctx, root, object),
        None => true,
    }
}

/// Test `object` against a subtree
pub fn matches_node<C: QueryContext + ?Sized>(
    ctx: &C,
    node: &QueryNode,
    object: &StoredObject,
) -> bool {
    match node {
        QueryNode::Not(child) => !matches_node(ctx, child, object),
        QueryNode::And(l, r) => matches_node(ctx, l, object) && matches_node(ctx, r, object),
        QueryNode::Or(l, r) => matches_node(ctx, l, object) || matches_node(ctx, r, object),
        QueryNode::Data(data) => matches_data(ctx, data, object),
    }
}

fn matches_data<C: QueryContext + ?Sized>(ctx: &C, node: &DataNode, object: &StoredObject) -> bool {
    let field = match &node.selector {
        FieldSelector::Invid => {
            return node.comparator == Comparator::Equals
                && node.value.as_invid() == Some(object.invid());
        }
        FieldSelector::Label => {
            return match ctx.object_label(object) {
                Some(label) => {
                    node.comparator == Comparator::Defined
                        || (node.array_op == ArrayOp::None
                            && compare_scalar(ctx, node, &Value::String(label)))
                }
                None => false,
            };
        }
        FieldSelector::Id(id) => *id,
        FieldSelector::Name(name) => match ctx.resolve_field(object.invid().base(), name) {
            Some(id) => id,
            None => return false,
        },
    };

    let value = match object.get(field) {
        Some(v) if v.is_defined() => v,
        _ => return false,
    };

    if node.comparator == Comparator::Defined {
        return true;
    }

    match (node.array_op, value) {
        (ArrayOp::None, FieldValue::Scalar(v)) => compare_scalar(ctx, node, v),
        (ArrayOp::None, FieldValue::Vector(_)) => false,
        (ArrayOp::Contains, FieldValue::Vector(values)) => {
            values.iter().any(|v| compare_scalar(ctx, node, v))
        }
        (op, FieldValue::Vector(values)) => {
            let Some(want) = node.value.as_int() else {
                return false;
            };
            let len = values.len() as i64;
            let want = i64::from(want);
            match op {
                ArrayOp::LengthEq => len == want,
                ArrayOp::LengthGreater => len > want,
                ArrayOp::LengthLessEq => len <= want,
                ArrayOp::None | ArrayOp::Contains => false,
            }
        }
        (_, FieldValue::Scalar(_)) => false,
    }
}

fn compare_scalar<C: QueryContext + ?Sized>(ctx: &C, node: &DataNode, value: &Value) -> bool {
    match (value, &node.value) {
        (Value::String(actual), Value::String(wanted)) => compare_str(node, actual, wanted),
        (Value::Invid(actual), Value::Invid(wanted)) => {
            node.comparator == Comparator::Equals && actual == wanted
        }
        (Value::Invid(actual), Value::String(wanted)) => match ctx.label_of(*actual) {
            Some(label) => compare_str(node, &label, wanted),
            None => false,
        },
        (Value::Bool(actual), Value::Bool(wanted)) => {
            node.comparator == Comparator::Equals && actual == wanted
        }
        (Value::Int(actual), Value::Int(wanted)) => ordered(node.comparator, actual.cmp(wanted)),
        (Value::Date(actual), Value::Date(wanted)) => ordered(node.comparator, actual.cmp(wanted)),
        (Value::Ip(actual), Value::Ip(wanted)) => compare_ip(node.comparator, actual, wanted),
        _ => false,
    }
}

fn ordered(comparator: Comparator, ord: Ordering) -> bool {
    match comparator {
        Comparator::Equals => ord == Ordering::Equal,
        Comparator::Less => ord == Ordering::Less,
        Comparator::LessEq => ord != Ordering::Greater,
        Comparator::Greater => ord == Ordering::Greater,
        Comparator::GreaterEq => ord != Ordering::Less,
        _ => false,
    }
}

fn compare_str(node: &DataNode, actual: &str, wanted: &str) -> bool {
    match node.comparator {
        Comparator::NoCaseEquals => actual.to_lowercase() == wanted.to_lowercase(),
        Comparator::StartsWith => actual.starts_with(wanted),
        Comparator::EndsWith => actual.ends_with(wanted),
        Comparator::Matches | Comparator::NoCaseMatches => {
            node.regex().map_or(false, |re| re.is_match(actual))
        }
        Comparator::Defined => true,
        ordering => ordered(ordering, actual.cmp(wanted)),
    }
}

/// IP comparison over octet strings of possibly different lengths
///
/// A prefix query ignores trailing zero octets (`10.0.0.0` asks for
/// `10.*`); a suffix query ignores leading zero octets.
fn compare_ip(comparator: Comparator, actual: &[u8], wanted: &[u8]) -> bool {
    match comparator {
        Comparator::Equals => actual == wanted,
        Comparator::StartsWith => {
            let end = wanted.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
            actual.starts_with(&wanted[..end])
        }
        Comparator::EndsWith => {
            let start = wanted.iter().position(|b| *b != 0).unwrap_or(wanted.len());
            actual.ends_with(&wanted[start..])
        }
        _ => false,
    }
}
