//! # Database Facade
//!
//! [`Database`] ties the engine together: one directory of table files, one
//! shared buffer pool, the catalog, and the aggregate registry. Statements
//! enter through [`Database::execute`]; indexes are a library-level API
//! (see [`crate::btree`]) created and rebuilt explicitly.
//!
//! Dirty frames are written back lazily at eviction; dropping the database
//! flushes whatever is still resident, and [`Database::flush`] does so on
//! demand.

use std::path::Path;
use std::sync::Arc;

use eyre::Result;
use hashbrown::HashMap;

use crate::btree::BTree;
use crate::catalog::Catalog;
use crate::config::DEFAULT_POOL_SIZE;
use crate::error::Error;
use crate::sql::{interpreter, AggregateRegistry, RowSet};
use crate::storage::BufferPool;
use crate::table::{Store, Table};
use crate::types::SchemaRef;

pub struct Database {
    store: Store,
    catalog: Catalog,
    aggregates: AggregateRegistry,
    pool: Arc<BufferPool>,
    open_tables: HashMap<String, Arc<Table>>,
}

impl Database {
    /// Opens (creating if needed) a database directory with a pool of
    /// `pool_frames` page frames.
    pub fn open(dir: impl AsRef<Path>, pool_frames: usize) -> Result<Self> {
        let pool = Arc::new(BufferPool::new(pool_frames));
        let store = Store::new(dir, Arc::clone(&pool))?;
        Ok(Self {
            store,
            catalog: Catalog::new(),
            aggregates: AggregateRegistry::with_builtins(),
            pool,
            open_tables: HashMap::new(),
        })
    }

    /// Opens with the default pool size.
    pub fn open_default(dir: impl AsRef<Path>) -> Result<Self> {
        Self::open(dir, DEFAULT_POOL_SIZE)
    }

    /// Parses and executes one SQL statement, returning its result rows
    /// (empty for DDL and DML).
    pub fn execute(&mut self, sql: &str) -> Result<RowSet> {
        interpreter::execute(self, sql)
    }

    pub fn aggregates(&self) -> &AggregateRegistry {
        &self.aggregates
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    /// Creates the table file and persists its schema.
    pub fn create_table(&mut self, name: &str, schema: SchemaRef) -> Result<()> {
        if self.catalog.find_table_schema(&mut self.store, name)?.is_some()
            || self.store.exists(name)
        {
            return Err(Error::schema_mismatch(format!(
                "table '{name}' already exists"
            )));
        }
        self.store.create(name)?;
        self.catalog
            .save_table_schema(&mut self.store, name, &schema)?;
        Ok(())
    }

    /// Deletes a table and its schema table.
    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        let known = self
            .catalog
            .find_table_schema(&mut self.store, name)?
            .is_some()
            || self.store.exists(name);
        if !known {
            return Err(Error::schema_mismatch(format!(
                "table '{name}' does not exist"
            )));
        }
        self.open_tables.remove(name);
        self.store.remove_if_exists(name)?;
        self.catalog.forget_table_schema(&mut self.store, name)?;
        Ok(())
    }

    /// Schema of a table, from the catalog.
    pub fn table_schema(&mut self, name: &str) -> Result<SchemaRef> {
        self.catalog
            .find_table_schema(&mut self.store, name)?
            .ok_or_else(|| Error::schema_mismatch(format!("table '{name}' does not exist")))
    }

    /// Opens a table handle, cached per name.
    pub fn open_table(&mut self, name: &str) -> Result<Arc<Table>> {
        if let Some(table) = self.open_tables.get(name) {
            return Ok(Arc::clone(table));
        }
        let schema = self.table_schema(name)?;
        let file_id = self.store.open(name)?;
        let table = Arc::new(Table::new(
            Arc::clone(&self.pool),
            file_id,
            schema,
            name,
        ));
        self.open_tables.insert(name.to_string(), Arc::clone(&table));
        Ok(table)
    }

    /// Opens (creating if needed) a B+tree index file. Index maintenance is
    /// manual: see [`BTree::rebuild_from`].
    pub fn open_index(
        &mut self,
        name: &str,
        key_schema: SchemaRef,
        page_capacity: Option<u32>,
    ) -> Result<BTree> {
        BTree::open_or_create(&mut self.store, name, key_schema, page_capacity)
    }

    /// Deletes an index file.
    pub fn drop_index(&mut self, name: &str) -> Result<()> {
        BTree::remove_index(&mut self.store, name)
    }

    /// Writes every dirty frame back and syncs the files.
    pub fn flush(&self) -> Result<usize> {
        self.pool.flush()
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        // Last chance to persist lazily written pages; nothing sensible to
        // do with an error here.
        let _ = self.pool.flush();
    }
}
