//! # Runtime Values
//!
//! [`Value`] is the tagged runtime representation flowing through the
//! executor and the marshal. Equality is per-variant; ordering between
//! distinct variants exists (so rows can sort and key hash maps) but is an
//! implementation detail callers must not rely on; queries are expected to
//! compare within a single variant per column.
//!
//! ## Null semantics
//!
//! `Null` equals `Null`: it is neither less-than nor greater-than another
//! `Null`, but both `<=` and `>=` hold. Comparisons against non-null values
//! fall back to the variant rank.

use std::cmp::Ordering;

/// Tagged runtime value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Null,
    Bool(bool),
    Uint64(u64),
    Int64(i64),
    /// Fixed-length ASCII, truncated to the column length on write; trailing
    /// NULs are stripped on read.
    Varchar(String),
    /// Variable-length UTF-8, stored out of line after a row's fixed region.
    String(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Varchar(s) | Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Uint64(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Varchar(s) | Value::String(s) => f.write_str(s),
        }
    }
}

/// An ordered sequence of values. Identity lives in [`RowId`](super::RowId),
/// not in the row itself.
pub type Row = Vec<Value>;

fn variant_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Uint64(_) => 2,
        Value::Int64(_) => 3,
        Value::Varchar(_) => 4,
        Value::String(_) => 5,
    }
}

/// The single comparison entry point for values. Same-variant comparisons
/// are the natural ones; `Varchar` and `String` compare textually with each
/// other; anything else orders by variant rank (defined but unspecified).
pub fn compare_values(lhs: &Value, rhs: &Value) -> Ordering {
    match (lhs, rhs) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Uint64(a), Value::Uint64(b)) => a.cmp(b),
        (Value::Int64(a), Value::Int64(b)) => a.cmp(b),
        (
            Value::Varchar(a) | Value::String(a),
            Value::Varchar(b) | Value::String(b),
        ) => a.cmp(b),
        _ => variant_rank(lhs).cmp(&variant_rank(rhs)),
    }
}

/// Lexicographic row comparison over the shorter of the two rows.
pub fn compare_rows(lhs: &Row, rhs: &Row) -> Ordering {
    for (l, r) in lhs.iter().zip(rhs.iter()) {
        let ord = compare_values(l, r);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_equals_null() {
        assert_eq!(compare_values(&Value::Null, &Value::Null), Ordering::Equal);
        assert_eq!(Value::Null, Value::Null);
    }

    #[test]
    fn same_variant_ordering() {
        assert_eq!(
            compare_values(&Value::Int64(-5), &Value::Int64(3)),
            Ordering::Less
        );
        assert_eq!(
            compare_values(&Value::Uint64(9), &Value::Uint64(2)),
            Ordering::Greater
        );
        assert_eq!(
            compare_values(
                &Value::String("abc".into()),
                &Value::String("abd".into())
            ),
            Ordering::Less
        );
    }

    #[test]
    fn varchar_and_string_compare_textually() {
        assert_eq!(
            compare_values(&Value::Varchar("x".into()), &Value::String("x".into())),
            Ordering::Equal
        );
    }

    #[test]
    fn row_comparison_is_lexicographic() {
        let a = vec![Value::Int64(1), Value::String("b".into())];
        let b = vec![Value::Int64(1), Value::String("c".into())];
        assert_eq!(compare_rows(&a, &b), Ordering::Less);
        assert_eq!(compare_rows(&a, &a), Ordering::Equal);
    }

    #[test]
    fn prefix_rows_compare_equal() {
        let full = vec![Value::Int64(7), Value::Int64(8)];
        let prefix = vec![Value::Int64(7)];
        assert_eq!(compare_rows(&full, &prefix), Ordering::Equal);
    }
}
