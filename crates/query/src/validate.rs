//! Static checks of a query against a base's schema

use crate::error::{QueryError, Result};
use crate::node::{ArrayOp, Comparator, DataNode, FieldSelector, Query};
use dirstore_core::{BaseDef, FieldId, FieldType, Value};
use regex::RegexBuilder;

/// Check every leaf of `query` against `base`
///
/// A query that passes can still match nothing, but every comparison in
/// it is one the evaluator can actually perform.
pub fn validate(query: &Query, base: &BaseDef) -> Result<()> {
    let Some(root) = &query.root else {
        return Ok(());
    };
    root.leaves()
        .into_iter()
        .try_for_each(|leaf| validate_leaf(leaf, base))
}

fn validate_leaf(node: &DataNode, base: &BaseDef) -> Result<()> {
    let field = match &node.selector {
        FieldSelector::Invid => {
            if node.comparator != Comparator::Equals {
                return Err(unsupported(node.comparator, FieldType::Invid));
            }
            if !matches!(node.value, Value::Invid(_)) {
                return Err(QueryError::LiteralMismatch {
                    field: FieldId(-2),
                    field_type: FieldType::Invid,
                    literal: node.value.type_name(),
                });
            }
            return Ok(());
        }
        FieldSelector::Label => {
            if node.array_op != ArrayOp::None {
                return Err(QueryError::ArrayOpOnScalar(FieldId(-1)));
            }
            return check_element(node, FieldId(-1), FieldType::String);
        }
        FieldSelector::Id(id) => base.field(*id).ok_or(QueryError::UnknownField(*id))?,
        FieldSelector::Name(name) => base
            .field_by_name(name)
            .ok_or_else(|| QueryError::UnknownFieldName(name.clone()))?,
    };

    if node.comparator == Comparator::Defined {
        return Ok(());
    }

    match (field.array, node.array_op) {
        (false, ArrayOp::None) => check_element(node, field.id, field.field_type),
        (false, _) => Err(QueryError::ArrayOpOnScalar(field.id)),
        (true, ArrayOp::None) => Err(QueryError::VectorNeedsArrayOp(field.id)),
        (true, ArrayOp::Contains) => check_element(node, field.id, field.field_type),
        (true, _) => match node.value {
            Value::Int(_) => Ok(()),
            _ => Err(QueryError::LengthNeedsInt),
        },
    }
}

fn check_element(node: &DataNode, field: FieldId, ty: FieldType) -> Result<()> {
    let c = node.comparator;
    let supported = match (ty, &node.value) {
        (FieldType::String, Value::String(_)) | (FieldType::Invid, Value::String(_)) => true,
        (FieldType::Invid, Value::Invid(_)) | (FieldType::Boolean, Value::Bool(_)) => {
            c == Comparator::Equals
        }
        (FieldType::Numeric, Value::Int(_)) | (FieldType::Date, Value::Date(_)) => c.is_ordering(),
        (FieldType::IpAddr, Value::Ip(_)) => matches!(
            c,
            Comparator::Equals | Comparator::StartsWith | Comparator::EndsWith
        ),
        (_, literal) => {
            return Err(QueryError::LiteralMismatch {
                field,
                field_type: ty,
                literal: literal.type_name(),
            })
        }
    };
    if !supported {
        return Err(unsupported(c, ty));
    }

    if c.is_regex() {
        if let Value::String(pattern) = &node.value {
            RegexBuilder::new(pattern)
                .case_insensitive(c == Comparator::NoCaseMatches)
                .build()
                .map_err(|e| QueryError::BadRegex {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })?;
        }
    }
    Ok(())
}

fn unsupported(comparator: Comparator, field_type: FieldType) -> QueryError {
    QueryError::UnsupportedComparator {
        comparator: comparator.symbol().to_string(),
        field_type,
    }
}
