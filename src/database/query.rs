use std::cmp::Ordering;

use serde_json::Value;

use crate::database::models::Collection;
use crate::database::store::{Document, StoreError};
use crate::filter::{Condition, FilterOp, SortDirection, SortKey};

/// Casts condition values to the declared field types of `collection`.
///
/// Query-string values arrive as strings; a number field compares as a
/// number, a reference field must hold a valid id. Unknown operators are
/// rejected here so no adapter ever sees them.
pub fn typed_conditions<'a>(
    collection: &Collection,
    conditions: impl IntoIterator<Item = &'a Condition>,
) -> Result<Vec<Condition>, StoreError> {
    conditions
        .into_iter()
        .map(|condition| {
            if let FilterOp::Other(op) = &condition.op {
                return Err(StoreError::UnsupportedOperator {
                    field: condition.field.clone(),
                    op: op.clone(),
                });
            }
            let value = match collection.schema.field_type(&condition.field) {
                Some(kind) => kind.cast_scalar(&condition.value).ok_or_else(|| StoreError::Cast {
                    field: condition.field.clone(),
                    value: plain(&condition.value),
                })?,
                None => condition.value.clone(),
            };
            Ok(Condition::new(condition.field.clone(), condition.op.clone(), value))
        })
        .collect()
}

/// Evaluates typed conditions against a document held in memory.
pub fn matches(doc: &Document, conditions: &[Condition]) -> bool {
    conditions.iter().all(|condition| matches_one(doc.get(&condition.field), condition))
}

fn matches_one(actual: Option<&Value>, condition: &Condition) -> bool {
    let expected = &condition.value;
    match condition.op {
        FilterOp::Eq => equals(actual, expected),
        FilterOp::Ne => !equals(actual, expected),
        FilterOp::Gt => compares(actual, expected, |o| o == Ordering::Greater),
        FilterOp::Gte => compares(actual, expected, |o| o != Ordering::Less),
        FilterOp::Lt => compares(actual, expected, |o| o == Ordering::Less),
        FilterOp::Lte => compares(actual, expected, |o| o != Ordering::Greater),
        FilterOp::Other(_) => false,
    }
}

/// Equality where an array field matches when any element does.
fn equals(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        None => expected.is_null(),
        Some(Value::Array(items)) if !expected.is_array() => items.iter().any(|item| same(item, expected)),
        Some(value) => same(value, expected),
    }
}

fn same(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Range comparisons only apply between values of the same kind.
fn compares(actual: Option<&Value>, expected: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    let Some(actual) = actual else { return false };
    if rank(actual) != rank(expected) {
        return false;
    }
    accept(compare_values(Some(actual), Some(expected)))
}

/// Type order used for sorting: missing and null, numbers, strings, objects, arrays, booleans.
fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let ord = compare_values(Some(l), Some(r));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => x.len().cmp(&y.len()),
        _ => rank(a).cmp(&rank(b)),
    }
}

pub fn sort_documents(docs: &mut [Document], keys: &[SortKey]) {
    docs.sort_by(|a, b| {
        for key in keys {
            let ord = compare_values(a.get(&key.field), b.get(&key.field));
            let ord = match key.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
