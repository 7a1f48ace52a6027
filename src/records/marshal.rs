//! # Row Codec
//!
//! Serializes a [`Row`] against a [`Schema`] into a deterministic byte
//! layout. The format, in order:
//!
//! ```text
//! +--------------------+---------------------------+------------------+
//! | null bitmap (8 LE) | fixed-width region        | string heap      |
//! +--------------------+---------------------------+------------------+
//! ```
//!
//! 1. **Null bitmap**: bit `i` set means column `i` is `Null` and is
//!    skipped entirely from the payload.
//! 2. **Fixed region**: non-null columns in schema order:
//!    - `boolean`: 1 byte
//!    - `uint64` / `int64`: 8 bytes little-endian
//!    - `varchar(L)`: exactly `L` bytes, NUL-padded; longer values are
//!      truncated to `L` on write, and read back with `strnlen` semantics
//!    - `string`: 8-byte length then an 8-byte offset from the row start,
//!      filled in once the heap is laid out
//! 3. **String heap**: string payloads appended in column order.
//!
//! The fixed-width prefix means any column can be located in O(1) given the
//! null bitmap; only `string` columns require chasing an offset.
//!
//! [`Marshal::row_space`] is the exact number of bytes
//! [`Marshal::serialize_row`] writes; callers size slotted-page payloads
//! with it.

use eyre::{ensure, Result};

use crate::config::NULL_BITMAP_BYTES;
use crate::error::Error;
use crate::types::{Row, SchemaRef, Type, Value};

/// Schema-bound row serializer.
#[derive(Debug, Clone)]
pub struct Marshal {
    schema: SchemaRef,
    fixed_row_space: usize,
}

impl Marshal {
    pub fn new(schema: SchemaRef) -> Self {
        let fixed_row_space = Self::fixed_space_for_nulls(&schema, 0);
        Self {
            schema,
            fixed_row_space,
        }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Fixed-region size for a fully non-null row (bitmap included). This is
    /// the serialized key width for index schemas without `string` columns.
    pub fn fixed_row_space(&self) -> usize {
        self.fixed_row_space
    }

    fn fixed_space_for_nulls(schema: &SchemaRef, nulls: u64) -> usize {
        let mut result = NULL_BITMAP_BYTES;
        for (index, column) in schema.iter().enumerate() {
            if nulls & (1 << index) != 0 {
                continue;
            }
            match column.ty {
                Type::Boolean => result += 1,
                Type::Uint64 | Type::Int64 => result += 8,
                Type::Varchar => result += column.length as usize,
                // length + offset words live in the fixed region too
                Type::String => result += 16,
            }
        }
        result
    }

    fn nulls_of(&self, row: &Row) -> u64 {
        let mut nulls = 0u64;
        for (index, value) in row.iter().enumerate() {
            if value.is_null() {
                nulls |= 1 << index;
            }
        }
        nulls
    }

    fn check_row(&self, row: &Row) -> Result<()> {
        ensure!(
            row.len() == self.schema.len(),
            Error::new(
                crate::error::ErrorKind::SchemaMismatch,
                format!(
                    "row has {} values, schema has {} columns",
                    row.len(),
                    self.schema.len()
                )
            )
        );
        for (index, (value, column)) in row.iter().zip(self.schema.iter()).enumerate() {
            let ok = matches!(
                (value, column.ty),
                (Value::Null, _)
                    | (Value::Bool(_), Type::Boolean)
                    | (Value::Uint64(_), Type::Uint64)
                    | (Value::Int64(_), Type::Int64)
                    | (Value::Varchar(_), Type::Varchar)
                    | (Value::String(_), Type::String)
            );
            ensure!(
                ok,
                Error::new(
                    crate::error::ErrorKind::SchemaMismatch,
                    format!(
                        "value {value:?} does not fit column {index} ({} {})",
                        column.name, column.ty
                    )
                )
            );
        }
        Ok(())
    }

    /// Exact serialized size of `row`.
    pub fn row_space(&self, row: &Row) -> Result<usize> {
        self.check_row(row)?;
        let nulls = self.nulls_of(row);
        let mut result = Self::fixed_space_for_nulls(&self.schema, nulls);
        for (value, column) in row.iter().zip(self.schema.iter()) {
            if let (Value::String(s), Type::String) = (value, column.ty) {
                result += s.len();
            }
        }
        Ok(result)
    }

    /// Serializes `row` into the front of `buf`, returning the bytes written.
    pub fn serialize_row(&self, buf: &mut [u8], row: &Row) -> Result<usize> {
        let space = self.row_space(row)?;
        ensure!(
            buf.len() >= space,
            "serialization buffer too small: {} < {}",
            buf.len(),
            space
        );

        let nulls = self.nulls_of(row);
        buf[..NULL_BITMAP_BYTES].copy_from_slice(&nulls.to_le_bytes());
        let mut cursor = NULL_BITMAP_BYTES;

        // (offset-word position, payload) for every string column, in
        // column order; offsets are written once the fixed region is done.
        let mut deferred: Vec<(usize, &str)> = Vec::new();

        for (value, column) in row.iter().zip(self.schema.iter()) {
            match value {
                Value::Null => {}
                Value::Bool(v) => {
                    buf[cursor] = *v as u8;
                    cursor += 1;
                }
                Value::Uint64(v) => {
                    buf[cursor..cursor + 8].copy_from_slice(&v.to_le_bytes());
                    cursor += 8;
                }
                Value::Int64(v) => {
                    buf[cursor..cursor + 8].copy_from_slice(&v.to_le_bytes());
                    cursor += 8;
                }
                Value::Varchar(s) => {
                    let length = column.length as usize;
                    let bytes = s.as_bytes();
                    let copied = bytes.len().min(length);
                    buf[cursor..cursor + copied].copy_from_slice(&bytes[..copied]);
                    buf[cursor + copied..cursor + length].fill(0);
                    cursor += length;
                }
                Value::String(s) => {
                    buf[cursor..cursor + 8].copy_from_slice(&(s.len() as u64).to_le_bytes());
                    deferred.push((cursor + 8, s));
                    cursor += 16;
                }
            }
        }

        for (offset_pos, payload) in deferred {
            buf[offset_pos..offset_pos + 8].copy_from_slice(&(cursor as u64).to_le_bytes());
            buf[cursor..cursor + payload.len()].copy_from_slice(payload.as_bytes());
            cursor += payload.len();
        }

        debug_assert_eq!(cursor, space);
        Ok(cursor)
    }

    /// Deserializes one row from the front of `buf`. The slice must extend
    /// at least to the end of the row's string heap.
    pub fn deserialize_row(&self, buf: &[u8]) -> Result<Row> {
        ensure!(
            buf.len() >= NULL_BITMAP_BYTES,
            "row buffer smaller than the null bitmap"
        );
        let nulls = u64::from_le_bytes(buf[..NULL_BITMAP_BYTES].try_into().unwrap());
        let mut cursor = NULL_BITMAP_BYTES;
        let mut row = Row::with_capacity(self.schema.len());

        for (index, column) in self.schema.iter().enumerate() {
            if nulls & (1 << index) != 0 {
                row.push(Value::Null);
                continue;
            }
            match column.ty {
                Type::Boolean => {
                    ensure!(cursor + 1 <= buf.len(), "row truncated in column {index}");
                    row.push(Value::Bool(buf[cursor] != 0));
                    cursor += 1;
                }
                Type::Uint64 => {
                    ensure!(cursor + 8 <= buf.len(), "row truncated in column {index}");
                    let v = u64::from_le_bytes(buf[cursor..cursor + 8].try_into().unwrap());
                    row.push(Value::Uint64(v));
                    cursor += 8;
                }
                Type::Int64 => {
                    ensure!(cursor + 8 <= buf.len(), "row truncated in column {index}");
                    let v = i64::from_le_bytes(buf[cursor..cursor + 8].try_into().unwrap());
                    row.push(Value::Int64(v));
                    cursor += 8;
                }
                Type::Varchar => {
                    let length = column.length as usize;
                    ensure!(
                        cursor + length <= buf.len(),
                        "row truncated in column {index}"
                    );
                    let raw = &buf[cursor..cursor + length];
                    let end = raw.iter().position(|&b| b == 0).unwrap_or(length);
                    let text = std::str::from_utf8(&raw[..end])
                        .map_err(|e| Error::type_error(format!("invalid varchar bytes: {e}")))?;
                    row.push(Value::Varchar(text.to_string()));
                    cursor += length;
                }
                Type::String => {
                    ensure!(cursor + 16 <= buf.len(), "row truncated in column {index}");
                    let len =
                        u64::from_le_bytes(buf[cursor..cursor + 8].try_into().unwrap()) as usize;
                    let offset =
                        u64::from_le_bytes(buf[cursor + 8..cursor + 16].try_into().unwrap())
                            as usize;
                    cursor += 16;
                    ensure!(
                        offset + len <= buf.len(),
                        "string column {index} points past the row buffer"
                    );
                    let text = std::str::from_utf8(&buf[offset..offset + len])
                        .map_err(|e| Error::type_error(format!("invalid string bytes: {e}")))?;
                    row.push(Value::String(text.to_string()));
                }
            }
        }

        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnSchema, Schema};
    use std::sync::Arc;

    fn marshal(columns: Vec<ColumnSchema>) -> Marshal {
        Marshal::new(Arc::new(Schema::new(columns).unwrap()))
    }

    #[test]
    fn roundtrip_all_types() {
        let m = marshal(vec![
            ColumnSchema::new("flag", Type::Boolean),
            ColumnSchema::new("count", Type::Uint64),
            ColumnSchema::new("delta", Type::Int64),
            ColumnSchema::varchar("tag", 6),
            ColumnSchema::new("body", Type::String),
        ]);
        let row = vec![
            Value::Bool(true),
            Value::Uint64(42),
            Value::Int64(-7),
            Value::Varchar("abc".into()),
            Value::String("hello world".into()),
        ];

        let mut buf = vec![0u8; 256];
        let written = m.serialize_row(&mut buf, &row).unwrap();

        assert_eq!(written, m.row_space(&row).unwrap());
        assert_eq!(m.deserialize_row(&buf).unwrap(), row);
    }

    #[test]
    fn nulls_are_skipped_entirely() {
        let m = marshal(vec![
            ColumnSchema::new("a", Type::Int64),
            ColumnSchema::new("b", Type::String),
            ColumnSchema::new("c", Type::Int64),
        ]);
        let row = vec![Value::Null, Value::Null, Value::Int64(9)];

        // bitmap + one i64; nothing for the null columns
        assert_eq!(m.row_space(&row).unwrap(), 8 + 8);

        let mut buf = vec![0u8; 64];
        m.serialize_row(&mut buf, &row).unwrap();
        assert_eq!(m.deserialize_row(&buf).unwrap(), row);
    }

    #[test]
    fn varchar_truncates_and_strips_padding() {
        let m = marshal(vec![ColumnSchema::varchar("tag", 4)]);

        let mut buf = vec![0u8; 64];
        m.serialize_row(&mut buf, &vec![Value::Varchar("abcdef".into())])
            .unwrap();
        let row = m.deserialize_row(&buf).unwrap();
        assert_eq!(row, vec![Value::Varchar("abcd".into())]);

        m.serialize_row(&mut buf, &vec![Value::Varchar("x".into())])
            .unwrap();
        let row = m.deserialize_row(&buf).unwrap();
        assert_eq!(row, vec![Value::Varchar("x".into())]);
    }

    #[test]
    fn string_offsets_point_past_fixed_region() {
        let m = marshal(vec![
            ColumnSchema::new("a", Type::String),
            ColumnSchema::new("b", Type::String),
        ]);
        let row = vec![Value::String("xy".into()), Value::String("zw".into())];

        let mut buf = vec![0u8; 64];
        let written = m.serialize_row(&mut buf, &row).unwrap();
        assert_eq!(written, 8 + 16 + 16 + 4);

        // first string's offset word: bitmap + len = 16
        let off_a = u64::from_le_bytes(buf[16..24].try_into().unwrap());
        let off_b = u64::from_le_bytes(buf[32..40].try_into().unwrap());
        assert_eq!(off_a, 40);
        assert_eq!(off_b, 42);
        assert_eq!(m.deserialize_row(&buf).unwrap(), row);
    }

    #[test]
    fn wrong_arity_is_a_schema_mismatch() {
        let m = marshal(vec![ColumnSchema::new("a", Type::Int64)]);
        let err = m.row_space(&vec![]).unwrap_err();
        assert_eq!(
            crate::error::kind_of(&err),
            Some(crate::error::ErrorKind::SchemaMismatch)
        );
    }

    #[test]
    fn wrong_variant_is_a_schema_mismatch() {
        let m = marshal(vec![ColumnSchema::new("a", Type::Int64)]);
        let err = m
            .row_space(&vec![Value::String("nope".into())])
            .unwrap_err();
        assert_eq!(
            crate::error::kind_of(&err),
            Some(crate::error::ErrorKind::SchemaMismatch)
        );
    }

    #[test]
    fn fixed_row_space_matches_full_row() {
        let m = marshal(vec![
            ColumnSchema::new("a", Type::Boolean),
            ColumnSchema::new("b", Type::Uint64),
            ColumnSchema::varchar("c", 10),
        ]);
        assert_eq!(m.fixed_row_space(), 8 + 1 + 8 + 10);
    }
}
