//! # Core Data Model
//!
//! The value, row and schema types shared by every layer of the engine.
//!
//! - [`Value`]: tagged runtime value (`Null`, `bool`, `u64`, `i64`,
//!   fixed-length varchar, variable-length string)
//! - [`Row`]: an ordered sequence of values; rows carry no identity of
//!   their own
//! - [`RowId`]: the physical identity of a row: `(page_index, row_index)`
//!   inside a table file
//! - [`Schema`] / [`ColumnSchema`]: ordered column definitions, at most
//!   [`MAX_COLUMNS`](crate::config::MAX_COLUMNS) wide

mod value;

pub use value::{compare_rows, compare_values, Row, Value};

use std::sync::Arc;

use eyre::Result;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::Error;

/// Index of a page within a table or index file.
pub type PageIndex = u32;

/// Index of a slot within a row page.
pub type RowIndex = u32;

/// Physical address of a row: which page, which slot. Stored on disk inside
/// B+tree leaves, so the layout is fixed little-endian words.
#[repr(C)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, FromBytes, IntoBytes, Immutable, KnownLayout,
)]
pub struct RowId {
    pub page_index: PageIndex,
    pub row_index: RowIndex,
}

impl RowId {
    pub fn new(page_index: PageIndex, row_index: RowIndex) -> Self {
        Self {
            page_index,
            row_index,
        }
    }
}

/// Column data types. The discriminants are the on-disk codes the catalog
/// stores in `_schema` tables; reordering them breaks existing files.
#[repr(u64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Boolean = 0,
    Uint64 = 1,
    Int64 = 2,
    Varchar = 3,
    String = 4,
}

impl Type {
    pub fn from_code(code: u64) -> Result<Self> {
        Ok(match code {
            0 => Type::Boolean,
            1 => Type::Uint64,
            2 => Type::Int64,
            3 => Type::Varchar,
            4 => Type::String,
            _ => return Err(Error::schema_mismatch(format!("unknown type code {code}"))),
        })
    }

    pub fn code(self) -> u64 {
        self as u64
    }

    /// Serialized width of the fixed region for this type, `None` for types
    /// stored out of line. Varchar width comes from the column, not the type.
    pub fn fixed_size(self, varchar_length: u32) -> Option<usize> {
        match self {
            Type::Boolean => Some(1),
            Type::Uint64 | Type::Int64 => Some(8),
            Type::Varchar => Some(varchar_length as usize),
            Type::String => None,
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Type::Boolean => "boolean",
            Type::Uint64 => "uint64",
            Type::Int64 => "int64",
            Type::Varchar => "varchar",
            Type::String => "string",
        };
        f.write_str(name)
    }
}

/// One column of a schema. `length` is meaningful only for `varchar`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub ty: Type,
    pub length: u32,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            length: 0,
        }
    }

    pub fn varchar(name: impl Into<String>, length: u32) -> Self {
        Self {
            name: name.into(),
            ty: Type::Varchar,
            length,
        }
    }
}

/// An ordered sequence of columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<ColumnSchema>,
}

/// Schemas are shared between tables, marshals and operators.
pub type SchemaRef = Arc<Schema>;

impl Schema {
    pub fn new(columns: Vec<ColumnSchema>) -> Result<Self> {
        eyre::ensure!(
            columns.len() <= crate::config::MAX_COLUMNS,
            "schema has {} columns, maximum is {}",
            columns.len(),
            crate::config::MAX_COLUMNS
        );
        Ok(Self { columns })
    }

    pub fn empty() -> SchemaRef {
        Arc::new(Self::default())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> &ColumnSchema {
        &self.columns[index]
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_index_or_err(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| Error::schema_mismatch(format!("unknown column '{name}'")))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ColumnSchema> {
        self.columns.iter()
    }
}
