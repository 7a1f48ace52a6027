//! # Tables
//!
//! A [`Table`] is a sequence of slotted row pages in one file, addressed by
//! [`RowId`] = `(page_index, row_index)`. Page 0 is always the first row
//! page; there is no file header.
//!
//! Inserts fill the last page and allocate a new one when it refuses the
//! row; deletes leave tombstone slots that later inserts into the same page
//! may reuse. [`TableScan`] walks pages in order and slots within each
//! page, skipping tombstones, which yields rows in `(page, slot)` order.

mod page;
mod store;

pub use page::{RowPageMut, RowPageRef};
pub use store::Store;

use std::sync::Arc;

use eyre::{ensure, Result};

use crate::records::Marshal;
use crate::storage::{BufferPool, PageGuard, PageKey};
use crate::types::{PageIndex, Row, RowId, RowIndex, SchemaRef};

pub struct Table {
    pool: Arc<BufferPool>,
    file_id: u32,
    marshal: Marshal,
    name: String,
}

impl Table {
    pub fn new(pool: Arc<BufferPool>, file_id: u32, schema: SchemaRef, name: impl Into<String>) -> Self {
        Self {
            pool,
            file_id,
            marshal: Marshal::new(schema),
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &SchemaRef {
        self.marshal.schema()
    }

    pub fn marshal(&self) -> &Marshal {
        &self.marshal
    }

    pub fn page_count(&self) -> Result<PageIndex> {
        self.pool.page_count(self.file_id)
    }

    fn guard(&self, page_index: PageIndex) -> Result<PageGuard<'_>> {
        self.pool.fetch(PageKey::new(self.file_id, page_index))
    }

    /// Inserts a row into the last page, allocating a fresh page when it is
    /// full. Returns the row's physical address.
    pub fn insert_row(&self, row: &Row) -> Result<RowId> {
        let last_page = self.page_count()? - 1;

        {
            let mut guard = self.guard(last_page)?;
            let mut view = RowPageMut::new(guard.data_mut(), &self.marshal);
            if let Some(slot) = view.insert_row(row)? {
                return Ok(RowId::new(last_page, slot));
            }
        }

        let new_page = self.pool.allocate_page(self.file_id)?;
        let mut guard = self.guard(new_page)?;
        let mut view = RowPageMut::new(guard.data_mut(), &self.marshal);
        let slot = view.insert_row(row)?.ok_or_else(|| {
            eyre::eyre!(
                "row of {} bytes does not fit an empty page",
                self.marshal.row_space(row).unwrap_or(0)
            )
        })?;
        Ok(RowId::new(new_page, slot))
    }

    /// Reads a row by address; `None` for tombstones and vacant slots.
    pub fn get_row(&self, id: RowId) -> Result<Option<Row>> {
        ensure!(
            id.page_index < self.page_count()?,
            "page {} out of bounds in table '{}'",
            id.page_index,
            self.name
        );
        let guard = self.guard(id.page_index)?;
        let view = RowPageRef::new(guard.data(), &self.marshal);
        view.get_row(id.row_index)
    }

    /// Deletes a row by address; false if there was nothing to delete.
    pub fn delete_row(&self, id: RowId) -> Result<bool> {
        ensure!(
            id.page_index < self.page_count()?,
            "page {} out of bounds in table '{}'",
            id.page_index,
            self.name
        );
        let mut guard = self.guard(id.page_index)?;
        let mut view = RowPageMut::new(guard.data_mut(), &self.marshal);
        view.delete_row(id.row_index)
    }

    /// Number of slots (live or tombstoned) in one page.
    pub fn slot_count(&self, page_index: PageIndex) -> Result<RowIndex> {
        let guard = self.guard(page_index)?;
        let view = RowPageRef::new(guard.data(), &self.marshal);
        Ok(view.row_count())
    }

    pub fn scan(self: &Arc<Self>) -> TableScan {
        TableScan {
            table: Arc::clone(self),
            page_index: 0,
            row_index: 0,
        }
    }
}

/// Cursor over every live row of a table: page 0 slot 0 upward, advancing
/// the slot within a page, then the page.
pub struct TableScan {
    table: Arc<Table>,
    page_index: PageIndex,
    row_index: RowIndex,
}

impl TableScan {
    pub fn next(&mut self) -> Result<Option<(RowId, Row)>> {
        let page_count = self.table.page_count()?;

        while self.page_index < page_count {
            let slot_count = self.table.slot_count(self.page_index)?;
            while self.row_index < slot_count {
                let id = RowId::new(self.page_index, self.row_index);
                self.row_index += 1;
                if let Some(row) = self.table.get_row(id)? {
                    return Ok(Some((id, row)));
                }
            }
            self.page_index += 1;
            self.row_index = 0;
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnSchema, Schema, Type, Value};
    use tempfile::tempdir;

    fn test_table(columns: Vec<ColumnSchema>) -> (Arc<Table>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let pool = Arc::new(BufferPool::new(8));
        let mut store = Store::new(dir.path(), Arc::clone(&pool)).unwrap();
        let file_id = store.create("t").unwrap();
        let schema = Arc::new(Schema::new(columns).unwrap());
        (Arc::new(Table::new(pool, file_id, schema, "t")), dir)
    }

    fn int_string_table() -> (Arc<Table>, tempfile::TempDir) {
        test_table(vec![
            ColumnSchema::new("id", Type::Int64),
            ColumnSchema::new("name", Type::String),
        ])
    }

    #[test]
    fn insert_get_delete_by_row_id() {
        let (table, _dir) = int_string_table();

        let row = vec![Value::Int64(1), Value::String("a".into())];
        let id = table.insert_row(&row).unwrap();
        assert_eq!(id, RowId::new(0, 0));

        assert_eq!(table.get_row(id).unwrap().unwrap(), row);
        assert!(table.delete_row(id).unwrap());
        assert!(table.get_row(id).unwrap().is_none());
        assert!(!table.delete_row(id).unwrap());
    }

    #[test]
    fn inserts_spill_to_new_pages() {
        let (table, _dir) = int_string_table();

        let filler = "x".repeat(1000);
        let mut ids = Vec::new();
        for i in 0..30 {
            let row = vec![Value::Int64(i), Value::String(filler.clone())];
            ids.push(table.insert_row(&row).unwrap());
        }

        assert!(table.page_count().unwrap() > 1);
        for (i, id) in ids.iter().enumerate() {
            let row = table.get_row(*id).unwrap().unwrap();
            assert_eq!(row[0], Value::Int64(i as i64));
        }
    }

    #[test]
    fn scan_yields_live_rows_in_page_slot_order() {
        let (table, _dir) = int_string_table();

        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(
                table
                    .insert_row(&vec![Value::Int64(i), Value::String("r".into())])
                    .unwrap(),
            );
        }
        table.delete_row(ids[2]).unwrap();

        let mut scan = table.scan();
        let mut seen = Vec::new();
        while let Some((_, row)) = scan.next().unwrap() {
            seen.push(row[0].clone());
        }
        assert_eq!(
            seen,
            vec![
                Value::Int64(0),
                Value::Int64(1),
                Value::Int64(3),
                Value::Int64(4)
            ]
        );
    }

    #[test]
    fn rows_survive_reopen_through_flush() {
        let dir = tempdir().unwrap();
        let row = vec![Value::Int64(5), Value::String("keep".into())];
        let schema = Arc::new(
            Schema::new(vec![
                ColumnSchema::new("id", Type::Int64),
                ColumnSchema::new("name", Type::String),
            ])
            .unwrap(),
        );

        {
            let pool = Arc::new(BufferPool::new(8));
            let mut store = Store::new(dir.path(), Arc::clone(&pool)).unwrap();
            let file_id = store.create("t").unwrap();
            let table = Table::new(Arc::clone(&pool), file_id, Arc::clone(&schema), "t");
            table.insert_row(&row).unwrap();
            pool.flush().unwrap();
        }

        let pool = Arc::new(BufferPool::new(8));
        let mut store = Store::new(dir.path(), Arc::clone(&pool)).unwrap();
        let file_id = store.open("t").unwrap();
        let table = Table::new(pool, file_id, schema, "t");
        assert_eq!(table.get_row(RowId::new(0, 0)).unwrap().unwrap(), row);
    }
}
