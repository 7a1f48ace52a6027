//! # System Catalog
//!
//! Table schemas are not special: the catalog persists the schema of table
//! `t` as ordinary rows in a sibling table named `t_schema`, using the same
//! slotted-page format as everything else. The meta-table's own schema is
//! fixed:
//!
//! ```text
//! (id uint64, name string, type uint64, length uint64)
//! ```
//!
//! One row per column, `id` being the column's position. Reading a schema
//! back is just a table scan ordered by `id`; dropping a table deletes the
//! schema table along with it.

use std::sync::Arc;

use eyre::{ensure, Result};

use crate::table::{Store, Table};
use crate::types::{ColumnSchema, Row, Schema, SchemaRef, Type, Value};

/// Suffix appended to a table name to locate its schema table.
pub const SCHEMA_SUFFIX: &str = "_schema";

pub struct Catalog {
    meta_schema: SchemaRef,
}

impl Catalog {
    pub fn new() -> Self {
        let meta_schema = Schema::new(vec![
            ColumnSchema::new("id", Type::Uint64),
            ColumnSchema::new("name", Type::String),
            ColumnSchema::new("type", Type::Uint64),
            ColumnSchema::new("length", Type::Uint64),
        ])
        .expect("meta schema is statically valid");
        Self {
            meta_schema: Arc::new(meta_schema),
        }
    }

    fn schema_table_name(table_name: &str) -> String {
        format!("{table_name}{SCHEMA_SUFFIX}")
    }

    /// Writes (or rewrites) the schema rows for `table_name`.
    pub fn save_table_schema(
        &self,
        store: &mut Store,
        table_name: &str,
        schema: &SchemaRef,
    ) -> Result<()> {
        let schema_table = Self::schema_table_name(table_name);
        store.remove_if_exists(&schema_table)?;

        let file_id = store.create(&schema_table)?;
        let table = Table::new(
            Arc::clone(store.pool()),
            file_id,
            Arc::clone(&self.meta_schema),
            schema_table,
        );

        for (index, column) in schema.iter().enumerate() {
            let row: Row = vec![
                Value::Uint64(index as u64),
                Value::String(column.name.clone()),
                Value::Uint64(column.ty.code()),
                Value::Uint64(column.length as u64),
            ];
            table.insert_row(&row)?;
        }
        Ok(())
    }

    /// Reads the schema of `table_name` back, `None` when no schema table
    /// exists.
    pub fn find_table_schema(
        &self,
        store: &mut Store,
        table_name: &str,
    ) -> Result<Option<SchemaRef>> {
        let schema_table = Self::schema_table_name(table_name);
        if !store.exists(&schema_table) {
            return Ok(None);
        }

        let file_id = store.open(&schema_table)?;
        let table = Arc::new(Table::new(
            Arc::clone(store.pool()),
            file_id,
            Arc::clone(&self.meta_schema),
            schema_table,
        ));

        let mut columns: Vec<(u64, ColumnSchema)> = Vec::new();
        let mut scan = table.scan();
        while let Some((_, row)) = scan.next()? {
            ensure!(row.len() == 4, "malformed schema row: {row:?}");
            let (Value::Uint64(id), Value::String(name), Value::Uint64(code), Value::Uint64(length)) =
                (&row[0], &row[1], &row[2], &row[3])
            else {
                eyre::bail!("malformed schema row: {row:?}");
            };
            columns.push((
                *id,
                ColumnSchema {
                    name: name.clone(),
                    ty: Type::from_code(*code)?,
                    length: *length as u32,
                },
            ));
        }

        columns.sort_by_key(|(id, _)| *id);
        let schema = Schema::new(columns.into_iter().map(|(_, column)| column).collect())?;
        Ok(Some(Arc::new(schema)))
    }

    /// Deletes the schema table, if present.
    pub fn forget_table_schema(&self, store: &mut Store, table_name: &str) -> Result<()> {
        store.remove_if_exists(&Self::schema_table_name(table_name))?;
        Ok(())
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
