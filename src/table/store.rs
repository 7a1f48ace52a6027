//! # File-Per-Table Store
//!
//! Maps table and index names to paged files inside one database directory
//! and keeps the [`BufferPool`] registration for each open file. A table
//! named `users` lives in the file `users`; its schema lives in the sibling
//! table `users_schema` (see [`catalog`](crate::catalog)).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use eyre::{ensure, Result, WrapErr};
use hashbrown::HashMap;

use crate::error::Error;
use crate::storage::{BufferPool, DiskFile};

pub struct Store {
    dir: PathBuf,
    pool: Arc<BufferPool>,
    file_ids: HashMap<String, u32>,
}

impl Store {
    pub fn new(dir: impl AsRef<Path>, pool: Arc<BufferPool>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .wrap_err_with(|| format!("failed to create database directory '{}'", dir.display()))?;
        Ok(Self {
            dir,
            pool,
            file_ids: HashMap::new(),
        })
    }

    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.file_ids.contains_key(name) || self.path_of(name).exists()
    }

    /// Creates a one-page file for `name`. Fails if it already exists.
    pub fn create(&mut self, name: &str) -> Result<u32> {
        ensure!(
            !self.exists(name),
            Error::new(
                crate::error::ErrorKind::SchemaMismatch,
                format!("table '{name}' already exists")
            )
        );
        let file = DiskFile::create(self.path_of(name), 1)?;
        let file_id = self.pool.register_file(file);
        self.file_ids.insert(name.to_string(), file_id);
        Ok(file_id)
    }

    /// Opens an existing file, reusing the pool registration if it is
    /// already open.
    pub fn open(&mut self, name: &str) -> Result<u32> {
        if let Some(&file_id) = self.file_ids.get(name) {
            return Ok(file_id);
        }
        ensure!(
            self.path_of(name).exists(),
            Error::new(
                crate::error::ErrorKind::SchemaMismatch,
                format!("table '{name}' does not exist")
            )
        );
        let file = DiskFile::open(self.path_of(name))?;
        let file_id = self.pool.register_file(file);
        self.file_ids.insert(name.to_string(), file_id);
        Ok(file_id)
    }

    /// Opens `name` if present, creating it otherwise. The flag reports
    /// whether a fresh file was created.
    pub fn create_or_open(&mut self, name: &str) -> Result<(u32, bool)> {
        if self.exists(name) {
            Ok((self.open(name)?, false))
        } else {
            Ok((self.create(name)?, true))
        }
    }

    /// Drops the file: discards its cached pages and deletes it from disk.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        ensure!(
            self.exists(name),
            Error::new(
                crate::error::ErrorKind::SchemaMismatch,
                format!("table '{name}' does not exist")
            )
        );
        if let Some(file_id) = self.file_ids.remove(name) {
            self.pool.unregister_file(file_id)?;
        }
        std::fs::remove_file(self.path_of(name))
            .wrap_err_with(|| format!("failed to delete '{name}'"))?;
        Ok(())
    }

    pub fn remove_if_exists(&mut self, name: &str) -> Result<bool> {
        if self.exists(name) {
            self.remove(name)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store() -> (Store, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let pool = Arc::new(BufferPool::new(8));
        (Store::new(dir.path(), pool).unwrap(), dir)
    }

    #[test]
    fn create_open_remove_lifecycle() {
        let (mut store, _dir) = store();

        assert!(!store.exists("t"));
        let id = store.create("t").unwrap();
        assert!(store.exists("t"));
        assert_eq!(store.open("t").unwrap(), id);

        store.remove("t").unwrap();
        assert!(!store.exists("t"));
        assert!(store.open("t").is_err());
    }

    #[test]
    fn duplicate_create_is_a_schema_mismatch() {
        let (mut store, _dir) = store();
        store.create("t").unwrap();
        let err = store.create("t").unwrap_err();
        assert_eq!(
            crate::error::kind_of(&err),
            Some(crate::error::ErrorKind::SchemaMismatch)
        );
    }

    #[test]
    fn create_or_open_reports_freshness() {
        let (mut store, _dir) = store();
        let (_, created) = store.create_or_open("t").unwrap();
        assert!(created);
        let (_, created) = store.create_or_open("t").unwrap();
        assert!(!created);
    }

    #[test]
    fn remove_if_exists_is_quiet_about_missing_files() {
        let (mut store, _dir) = store();
        assert!(!store.remove_if_exists("ghost").unwrap());
    }
}
