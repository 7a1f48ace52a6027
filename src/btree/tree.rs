//! # B+Tree Operations
//!
//! The disk-resident ordered map from fixed-width keys to [`RowId`]s. All
//! nodes live in one paged file: page 0 is the metadata page, every other
//! page is a leaf or an internal node tagged by its first word.
//!
//! ## Insert
//!
//! Descent recurses to the target leaf and reports back through
//! [`ResponseInsert`]:
//!
//! - a leaf with room inserts and answers `skip`; ancestors do nothing;
//! - a full leaf tries a **sibling borrow** before splitting. Left sibling
//!   first: move this leaf's minimum there, insert here, and hand the
//!   parent `(old_first_key, new_first_key)` so it can re-aim the separator
//!   that pointed at the moved key. Otherwise the right sibling: either the
//!   new key itself (when it exceeds this leaf's maximum) or this leaf's
//!   maximum migrates right, again patching the right sibling's separator;
//! - with both siblings full it **splits**: allocate a new leaf, move the upper
//!   half there, relink the leaf chain, place the new key in whichever half
//!   owns it, and pass the separator up as `new_page`;
//! - an internal node receiving `new_page` inserts the separator, splitting
//!   itself the same way when full; receiving a rotation it overwrites the
//!   separator equal to `old_first_key` with `new_first_key`;
//! - a `new_page` that reaches the root promotes a fresh internal root.
//!
//! The left-first tie-break makes the left sibling denser, which bounds
//! downstream rotations.
//!
//! ## Remove
//!
//! Pages collapse only at zero entries (no underflow rebalancing). An
//! emptied leaf unlinks from its chain and reports `remove_page`; the
//! parent deletes the matching separator, itself collapsing when it runs
//! out of entries. Otherwise the new leaf minimum propagates up as a
//! separator patch. When the whole tree empties, a fresh leaf becomes the
//! root.
//!
//! ## Range Scans
//!
//! [`BTree::scan`] walks leaf entries left to right across the chain,
//! filtering through an AND-combined predicate vector. When the predicate
//! set constrains the first key column with `=`, `>` or `>=`, the iterator
//! seeks directly to the first qualifying leaf instead of starting at the
//! leftmost one, and `<`-family bounds stop it early.

use std::cmp::Ordering;
use std::io::Write;
use std::sync::Arc;

use eyre::{bail, ensure, Result};
use smallvec::SmallVec;

use crate::config::INVALID_PAGE_INDEX;
use crate::error::Error;
use crate::records::Marshal;
use crate::storage::{BufferPool, PageGuard, PageKey};
use crate::table::{Store, Table};
use crate::types::{compare_rows, compare_values, PageIndex, Row, RowId, SchemaRef, Type, Value};

use super::leaf::{LeafPageMut, LeafPageRef};
use super::interior::{InternalPageMut, InternalPageRef};
use super::page::{
    default_max_page_size, page_type_of, BTreePageType, MetadataHeader, METADATA_PAGE_INDEX,
};
use super::{IndexComparator, KeyCondition};

/// Outcome of one insert descent step, reported child-to-parent.
#[derive(Debug)]
struct ResponseInsert {
    /// Nothing left for ancestors to do.
    skip: bool,
    /// A split produced this page; the parent must add a separator.
    new_page: Option<PageIndex>,
    /// Key a separator used to point at (rotation) or the split separator.
    old_first_key: Row,
    /// Replacement separator key.
    new_first_key: Row,
}

impl ResponseInsert {
    fn skip() -> Self {
        Self {
            skip: true,
            new_page: None,
            old_first_key: Row::new(),
            new_first_key: Row::new(),
        }
    }

    fn rotated(old_first_key: Row, new_first_key: Row) -> Self {
        Self {
            skip: false,
            new_page: None,
            old_first_key,
            new_first_key,
        }
    }
}

/// Outcome of one remove descent step.
#[derive(Debug)]
struct ResponseRemove {
    /// The child page emptied out and was unlinked; the parent must drop
    /// its separator.
    remove_page: bool,
    /// Minimum key of the subtree before the removal.
    old_first_key: Row,
    /// New minimum, when ancestors may still hold the old one as separator.
    new_first_key: Option<Row>,
}

/// A disk-resident B+tree mapping rows of a fixed-width key schema to
/// [`RowId`]s.
pub struct BTree {
    pool: Arc<BufferPool>,
    file_id: u32,
    name: String,
    marshal: Marshal,
    key_size: usize,
    max_page_size: u32,
}

impl std::fmt::Debug for BTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BTree")
            .field("file_id", &self.file_id)
            .field("name", &self.name)
            .field("key_size", &self.key_size)
            .field("max_page_size", &self.max_page_size)
            .finish()
    }
}

impl BTree {
    /// Opens the index `name`, creating it when the file does not exist.
    /// On reopen the key size and page capacity must match the metadata
    /// page.
    pub fn open_or_create(
        store: &mut Store,
        name: &str,
        key_schema: SchemaRef,
        page_capacity: Option<u32>,
    ) -> Result<Self> {
        for column in key_schema.iter() {
            ensure!(
                column.ty != Type::String,
                Error::new(
                    crate::error::ErrorKind::SchemaMismatch,
                    format!(
                        "column '{}' is a variable-length string and cannot be an index key",
                        column.name
                    )
                )
            );
        }

        let marshal = Marshal::new(key_schema);
        let key_size = marshal.fixed_row_space();
        let widest = default_max_page_size(key_size);
        let max_page_size = page_capacity.unwrap_or(widest);
        ensure!(
            (2..=widest).contains(&max_page_size),
            "page capacity {max_page_size} out of range 2..={widest} for {key_size}-byte keys"
        );

        let pool = Arc::clone(store.pool());
        let (file_id, created) = store.create_or_open(name)?;
        let tree = Self {
            pool,
            file_id,
            name: name.to_string(),
            marshal,
            key_size,
            max_page_size,
        };

        if created {
            {
                let mut guard = tree.guard(METADATA_PAGE_INDEX)?;
                MetadataHeader::write_to_page(
                    guard.data_mut(),
                    INVALID_PAGE_INDEX,
                    key_size as u32,
                    max_page_size,
                );
            }
            let root = tree.pool.allocate_page(tree.file_id)?;
            {
                let mut guard = tree.guard(root)?;
                LeafPageMut::init(guard.data_mut(), &tree.marshal, tree.key_size);
            }
            tree.set_root(root)?;
        } else {
            let guard = tree.guard(METADATA_PAGE_INDEX)?;
            let header = MetadataHeader::read_from_page(guard.data())?;
            ensure!(
                header.key_size_in_bytes() as usize == key_size,
                Error::new(
                    crate::error::ErrorKind::IndexInvariant,
                    format!(
                        "index '{name}' expects {} key bytes, schema marshals to {key_size}",
                        header.key_size_in_bytes()
                    )
                )
            );
            ensure!(
                header.max_page_size() == max_page_size,
                Error::new(
                    crate::error::ErrorKind::IndexInvariant,
                    format!(
                        "index '{name}' expects page capacity {}, caller asked for {max_page_size}",
                        header.max_page_size()
                    )
                )
            );
        }

        Ok(tree)
    }

    /// Deletes the index file.
    pub fn remove_index(store: &mut Store, name: &str) -> Result<()> {
        store.remove(name)
    }

    pub fn remove_index_if_exists(store: &mut Store, name: &str) -> Result<bool> {
        store.remove_if_exists(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_schema(&self) -> &SchemaRef {
        self.marshal.schema()
    }

    pub fn max_page_size(&self) -> u32 {
        self.max_page_size
    }

    fn guard(&self, page_index: PageIndex) -> Result<PageGuard<'_>> {
        self.pool.fetch(PageKey::new(self.file_id, page_index))
    }

    fn root_page_index(&self) -> Result<PageIndex> {
        let guard = self.guard(METADATA_PAGE_INDEX)?;
        Ok(MetadataHeader::read_from_page(guard.data())?.root_page_index())
    }

    fn set_root(&self, root: PageIndex) -> Result<()> {
        let mut guard = self.guard(METADATA_PAGE_INDEX)?;
        MetadataHeader::read_from_page(guard.data())?;
        MetadataHeader::set_root(guard.data_mut(), root);
        Ok(())
    }

    fn page_kind(&self, page_index: PageIndex) -> Result<BTreePageType> {
        let guard = self.guard(page_index)?;
        Ok(page_type_of(guard.data()))
    }

    /// Point lookup: descend separators, then binary-search the leaf.
    pub fn lookup(&self, key: &Row) -> Result<Option<RowId>> {
        let mut page_index = self.root_page_index()?;
        loop {
            let guard = self.guard(page_index)?;
            match page_type_of(guard.data()) {
                BTreePageType::Leaf => {
                    let leaf = LeafPageRef::new(guard.data(), &self.marshal, self.key_size)?;
                    return leaf.lookup(key);
                }
                BTreePageType::Internal => {
                    let node = InternalPageRef::new(guard.data(), &self.marshal, self.key_size)?;
                    page_index = node.lookup(key)?;
                }
                other => bail!("unexpected {other} page during lookup in '{}'", self.name),
            }
        }
    }

    /// Inserts a unique key. Fails with a duplicate-key error if present.
    pub fn insert(&self, key: &Row, row_id: RowId) -> Result<()> {
        let root = self.root_page_index()?;
        let response = self.descend_insert(root, key, row_id)?;
        if response.skip {
            return Ok(());
        }

        if let Some(new_page) = response.new_page {
            let new_root = self.pool.allocate_page(self.file_id)?;
            {
                let mut guard = self.guard(new_root)?;
                let mut node = InternalPageMut::init(guard.data_mut(), &self.marshal, self.key_size);
                node.insert_first_entry(root);
                node.insert_entry(1, &response.new_first_key, new_page)?;
            }
            self.set_root(new_root)?;
        }
        Ok(())
    }

    fn descend_insert(&self, page_index: PageIndex, key: &Row, row_id: RowId) -> Result<ResponseInsert> {
        match self.page_kind(page_index)? {
            BTreePageType::Leaf => self.leaf_insert(page_index, key, row_id),
            BTreePageType::Internal => self.internal_insert(page_index, key, row_id),
            other => bail!("unexpected {other} page during insert in '{}'", self.name),
        }
    }

    /// Inserts into the leaf if it has room.
    fn try_insert(&self, page_index: PageIndex, key: &Row, row_id: RowId) -> Result<bool> {
        let mut guard = self.guard(page_index)?;
        let mut leaf = LeafPageMut::open(guard.data_mut(), &self.marshal, self.key_size)?;
        if leaf.size() < self.max_page_size {
            leaf.insert(key, row_id, self.max_page_size)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn leaf_insert(&self, page_index: PageIndex, key: &Row, row_id: RowId) -> Result<ResponseInsert> {
        {
            let mut guard = self.guard(page_index)?;
            let mut leaf = LeafPageMut::open(guard.data_mut(), &self.marshal, self.key_size)?;
            if leaf.size() < self.max_page_size {
                leaf.insert(key, row_id, self.max_page_size)?;
                return Ok(ResponseInsert::skip());
            }
        }

        let (prev, next, min_key, min_row_id, max_key, max_row_id) = {
            let guard = self.guard(page_index)?;
            let leaf = LeafPageRef::new(guard.data(), &self.marshal, self.key_size)?;
            // Catch duplicates before any entry migrates to a sibling; a
            // failure later would leave the parent separator stale.
            ensure!(
                leaf.lookup(key)?.is_none(),
                Error::new(
                    crate::error::ErrorKind::DuplicateKey,
                    format!("key {key:?} already exists in the index")
                )
            );
            (
                leaf.prev_page_index(),
                leaf.next_page_index(),
                leaf.min_key()?,
                leaf.min_row_id()?,
                leaf.max_key()?,
                leaf.max_row_id()?,
            )
        };

        // Borrow left first: pushing our minimum down-left keeps the
        // separator churn local to this parent.
        if prev != INVALID_PAGE_INDEX && self.try_insert(prev, &min_key, min_row_id)? {
            let mut guard = self.guard(page_index)?;
            let mut leaf = LeafPageMut::open(guard.data_mut(), &self.marshal, self.key_size)?;
            leaf.remove(&min_key)?;
            leaf.insert(key, row_id, self.max_page_size)?;
            let new_first = leaf.as_ref().min_key()?;
            return Ok(ResponseInsert::rotated(min_key, new_first));
        }

        if next != INVALID_PAGE_INDEX {
            let next_min = {
                let guard = self.guard(next)?;
                LeafPageRef::new(guard.data(), &self.marshal, self.key_size)?.min_key()?
            };

            if compare_rows(&max_key, key) == Ordering::Less {
                // The new key sorts past this leaf entirely; it can go
                // straight into the right sibling.
                if self.try_insert(next, key, row_id)? {
                    return Ok(ResponseInsert::rotated(next_min, key.clone()));
                }
            } else if self.try_insert(next, &max_key, max_row_id)? {
                let mut guard = self.guard(page_index)?;
                let mut leaf = LeafPageMut::open(guard.data_mut(), &self.marshal, self.key_size)?;
                leaf.remove(&max_key)?;
                leaf.insert(key, row_id, self.max_page_size)?;
                return Ok(ResponseInsert::rotated(next_min, max_key));
            }
        }

        // Both siblings full (or absent): split.
        let new_page = self.pool.allocate_page(self.file_id)?;
        let split_key;
        {
            let mut left_guard = self.guard(page_index)?;
            let mut right_guard = self.guard(new_page)?;
            let mut left = LeafPageMut::open(left_guard.data_mut(), &self.marshal, self.key_size)?;
            let mut right = LeafPageMut::init(right_guard.data_mut(), &self.marshal, self.key_size);

            left.set_next_page_index(new_page);
            right.set_prev_page_index(page_index);
            right.set_next_page_index(next);

            split_key = left.split_into(&mut right)?;
            if compare_rows(key, &split_key) == Ordering::Less {
                left.insert(key, row_id, self.max_page_size)?;
            } else {
                right.insert(key, row_id, self.max_page_size)?;
            }
        }
        if next != INVALID_PAGE_INDEX {
            let mut guard = self.guard(next)?;
            let mut sibling = LeafPageMut::open(guard.data_mut(), &self.marshal, self.key_size)?;
            sibling.set_prev_page_index(new_page);
        }

        Ok(ResponseInsert {
            skip: false,
            new_page: Some(new_page),
            old_first_key: split_key.clone(),
            new_first_key: split_key,
        })
    }

    fn internal_insert(
        &self,
        page_index: PageIndex,
        key: &Row,
        row_id: RowId,
    ) -> Result<ResponseInsert> {
        let child = {
            let guard = self.guard(page_index)?;
            let node = InternalPageRef::new(guard.data(), &self.marshal, self.key_size)?;
            node.lookup(key)?
        };

        let mut response = self.descend_insert(child, key, row_id)?;
        if response.skip {
            return Ok(response);
        }

        if let Some(child_page) = response.new_page {
            let size = {
                let guard = self.guard(page_index)?;
                InternalPageRef::new(guard.data(), &self.marshal, self.key_size)?.size()
            };

            if size < self.max_page_size {
                let mut guard = self.guard(page_index)?;
                let mut node = InternalPageMut::open(guard.data_mut(), &self.marshal, self.key_size)?;
                let (_, position) = node.as_ref().lookup_with_index(&response.new_first_key)?;
                node.insert_entry(position + 1, &response.new_first_key, child_page)?;
                response.skip = true;
                return Ok(response);
            }

            let new_index = self.pool.allocate_page(self.file_id)?;
            let promoted;
            {
                let mut left_guard = self.guard(page_index)?;
                let mut right_guard = self.guard(new_index)?;
                let mut left =
                    InternalPageMut::open(left_guard.data_mut(), &self.marshal, self.key_size)?;
                let mut right =
                    InternalPageMut::init(right_guard.data_mut(), &self.marshal, self.key_size);

                promoted = left.split_into(&mut right)?;
                if compare_rows(&promoted, &response.new_first_key) == Ordering::Less {
                    let (_, position) = right.as_ref().lookup_with_index(&response.new_first_key)?;
                    right.insert_entry(position + 1, &response.new_first_key, child_page)?;
                } else {
                    let (_, position) = left.as_ref().lookup_with_index(&response.new_first_key)?;
                    left.insert_entry(position + 1, &response.new_first_key, child_page)?;
                }
            }

            response.new_page = Some(new_index);
            response.new_first_key = promoted;
            return Ok(response);
        }

        // The child rotated entries sideways; re-aim the separator that
        // still names the moved minimum.
        let mut guard = self.guard(page_index)?;
        let mut node = InternalPageMut::open(guard.data_mut(), &self.marshal, self.key_size)?;
        let (_, position) = node.as_ref().lookup_with_index(&response.old_first_key)?;
        if position >= 1
            && compare_rows(&node.as_ref().key_at(position)?, &response.old_first_key)
                == Ordering::Equal
        {
            node.set_key(position, &response.new_first_key)?;
            response.skip = true;
        }
        Ok(response)
    }

    /// Removes a key. Returns false when it was not present.
    pub fn remove(&self, key: &Row) -> Result<bool> {
        if self.lookup(key)?.is_none() {
            return Ok(false);
        }

        let root = self.root_page_index()?;
        let response = self.descend_remove(root, key)?;

        if response.remove_page {
            // The whole tree emptied out; restart from a fresh leaf root.
            let new_root = self.pool.allocate_page(self.file_id)?;
            {
                let mut guard = self.guard(new_root)?;
                LeafPageMut::init(guard.data_mut(), &self.marshal, self.key_size);
            }
            self.set_root(new_root)?;
        }
        Ok(true)
    }

    fn descend_remove(&self, page_index: PageIndex, key: &Row) -> Result<ResponseRemove> {
        match self.page_kind(page_index)? {
            BTreePageType::Leaf => self.leaf_remove(page_index, key),
            BTreePageType::Internal => self.internal_remove(page_index, key),
            other => bail!("unexpected {other} page during remove in '{}'", self.name),
        }
    }

    fn leaf_remove(&self, page_index: PageIndex, key: &Row) -> Result<ResponseRemove> {
        let (old_first, size, prev, next) = {
            let mut guard = self.guard(page_index)?;
            let mut leaf = LeafPageMut::open(guard.data_mut(), &self.marshal, self.key_size)?;
            let old_first = leaf.as_ref().min_key()?;
            let removed = leaf.remove(key)?;
            debug_assert!(removed, "remove() verified presence via lookup");
            (
                old_first,
                leaf.size(),
                leaf.as_ref().prev_page_index(),
                leaf.as_ref().next_page_index(),
            )
        };

        if size > 0 {
            let guard = self.guard(page_index)?;
            let leaf = LeafPageRef::new(guard.data(), &self.marshal, self.key_size)?;
            return Ok(ResponseRemove {
                remove_page: false,
                old_first_key: old_first,
                new_first_key: Some(leaf.min_key()?),
            });
        }

        // Empty leaf: splice it out of the chain.
        if prev != INVALID_PAGE_INDEX {
            let mut guard = self.guard(prev)?;
            LeafPageMut::open(guard.data_mut(), &self.marshal, self.key_size)?
                .set_next_page_index(next);
        }
        if next != INVALID_PAGE_INDEX {
            let mut guard = self.guard(next)?;
            LeafPageMut::open(guard.data_mut(), &self.marshal, self.key_size)?
                .set_prev_page_index(prev);
        }

        Ok(ResponseRemove {
            remove_page: true,
            old_first_key: old_first,
            new_first_key: None,
        })
    }

    fn internal_remove(&self, page_index: PageIndex, key: &Row) -> Result<ResponseRemove> {
        let (child, position) = {
            let guard = self.guard(page_index)?;
            let node = InternalPageRef::new(guard.data(), &self.marshal, self.key_size)?;
            node.lookup_with_index(key)?
        };

        let mut response = self.descend_remove(child, key)?;

        let mut guard = self.guard(page_index)?;
        let mut node = InternalPageMut::open(guard.data_mut(), &self.marshal, self.key_size)?;

        if response.remove_page {
            let promoted = node.remove_entry(position)?;
            response.remove_page = node.size() == 0;
            // Dropping child 0 changes this subtree's minimum; ancestors
            // may still hold the vanished key as a separator.
            response.new_first_key = promoted;
            return Ok(response);
        }

        if let Some(new_first) = response.new_first_key.clone() {
            let (_, patch_position) = node.as_ref().lookup_with_index(&response.old_first_key)?;
            if patch_position >= 1
                && compare_rows(&node.as_ref().key_at(patch_position)?, &response.old_first_key)
                    == Ordering::Equal
            {
                node.set_key(patch_position, &new_first)?;
            }
        }
        Ok(response)
    }

    fn leftmost_leaf(&self) -> Result<PageIndex> {
        let mut page_index = self.root_page_index()?;
        loop {
            let guard = self.guard(page_index)?;
            match page_type_of(guard.data()) {
                BTreePageType::Leaf => return Ok(page_index),
                BTreePageType::Internal => {
                    page_index = InternalPageRef::new(guard.data(), &self.marshal, self.key_size)?
                        .first_child();
                }
                other => bail!("unexpected {other} page while seeking leftmost leaf"),
            }
        }
    }

    /// Descends to the first leaf that can contain a key `>=` the given
    /// prefix (compared over the prefix's columns only).
    fn lookup_leaf_page(&self, prefix: &Row) -> Result<PageIndex> {
        let mut page_index = self.root_page_index()?;
        loop {
            let guard = self.guard(page_index)?;
            match page_type_of(guard.data()) {
                BTreePageType::Leaf => return Ok(page_index),
                BTreePageType::Internal => {
                    page_index = InternalPageRef::new(guard.data(), &self.marshal, self.key_size)?
                        .lookup_leftmost(prefix)?;
                }
                other => bail!("unexpected {other} page while seeking leaf for prefix"),
            }
        }
    }

    /// Full ordered iteration.
    pub fn iter(&self) -> Result<BTreeRangeIter<'_>> {
        self.scan(&[])
    }

    /// Ordered iteration filtered through an AND-combined predicate vector.
    pub fn scan(&self, conditions: &[KeyCondition]) -> Result<BTreeRangeIter<'_>> {
        let schema = self.marshal.schema();
        let mut resolved: SmallVec<[(usize, IndexComparator, Value); 4]> =
            SmallVec::with_capacity(conditions.len());
        for condition in conditions {
            let column = schema.column_index_or_err(&condition.column)?;
            resolved.push((column, condition.comparator, condition.value.clone()));
        }

        // Bounds on the first key column drive the seek and the early stop.
        let mut seek: Option<Value> = None;
        let mut stop: Option<(Value, bool)> = None;
        for (column, comparator, value) in &resolved {
            if *column != 0 {
                continue;
            }
            match comparator {
                IndexComparator::Equal
                | IndexComparator::Greater
                | IndexComparator::GreaterOrEqual => {
                    let tighter = match &seek {
                        Some(current) => compare_values(value, current) == Ordering::Greater,
                        None => true,
                    };
                    if tighter {
                        seek = Some(value.clone());
                    }
                }
                IndexComparator::Less | IndexComparator::LessOrEqual => {}
                IndexComparator::NotEqual => continue,
            }
            match comparator {
                IndexComparator::Equal | IndexComparator::LessOrEqual => {
                    let bound = (value.clone(), true);
                    let tighter = match &stop {
                        Some((current, _)) => compare_values(value, current) == Ordering::Less,
                        None => true,
                    };
                    if tighter {
                        stop = Some(bound);
                    }
                }
                IndexComparator::Less => {
                    let tighter = match &stop {
                        Some((current, _)) => compare_values(value, current) != Ordering::Greater,
                        None => true,
                    };
                    if tighter {
                        stop = Some((value.clone(), false));
                    }
                }
                _ => {}
            }
        }

        let (page_index, offset) = match seek {
            Some(value) => {
                let prefix = vec![value];
                let page_index = self.lookup_leaf_page(&prefix)?;
                let guard = self.guard(page_index)?;
                let leaf = LeafPageRef::new(guard.data(), &self.marshal, self.key_size)?;
                let offset = leaf.lower_bound(&prefix)?;
                (page_index, offset)
            }
            None => (self.leftmost_leaf()?, 0),
        };

        Ok(BTreeRangeIter {
            tree: self,
            page_index,
            offset,
            conditions: resolved,
            stop,
            done: false,
        })
    }

    /// Rebuilds this (fresh) index from a table scan, keying each row by
    /// the given column indices. Index maintenance is manual: table DML
    /// does not touch indexes, so callers re-run this after bulk changes.
    pub fn rebuild_from(&self, table: &Arc<Table>, key_columns: &[usize]) -> Result<usize> {
        ensure!(
            key_columns.len() == self.marshal.schema().len(),
            "index keys have {} columns, {} provided",
            self.marshal.schema().len(),
            key_columns.len()
        );

        let mut scan = table.scan();
        let mut inserted = 0usize;
        while let Some((row_id, row)) = scan.next()? {
            let mut key = Row::with_capacity(key_columns.len());
            for &column in key_columns {
                ensure!(
                    column < row.len(),
                    "key column {column} out of range for table '{}'",
                    table.name()
                );
                key.push(row[column].clone());
            }
            self.insert(&key, row_id)?;
            inserted += 1;
        }
        Ok(inserted)
    }

    /// Renders every page for debugging.
    pub fn dump(&self, out: &mut dyn Write) -> Result<()> {
        let page_count = self.pool.page_count(self.file_id)?;
        for page_index in 0..page_count {
            let guard = self.guard(page_index)?;
            let kind = page_type_of(guard.data());
            writeln!(out, "Page {page_index} page type {kind}")?;

            match kind {
                BTreePageType::Invalid => {}
                BTreePageType::Metadata => {
                    let header = MetadataHeader::read_from_page(guard.data())?;
                    writeln!(out, "Root page index {}", header.root_page_index())?;
                    writeln!(out, "Key size in bytes {}", header.key_size_in_bytes())?;
                    writeln!(out, "Max page size {}", header.max_page_size())?;
                }
                BTreePageType::Internal => {
                    let node = InternalPageRef::new(guard.data(), &self.marshal, self.key_size)?;
                    writeln!(out, "Size {}", node.size())?;
                    for index in 0..node.size() as usize {
                        if index == 0 {
                            writeln!(out, "I 0 key invalid value {}", node.child_at(0))?;
                        } else {
                            writeln!(
                                out,
                                "I {index} key {:?} value {}",
                                node.key_at(index)?,
                                node.child_at(index)
                            )?;
                        }
                    }
                }
                BTreePageType::Leaf => {
                    let leaf = LeafPageRef::new(guard.data(), &self.marshal, self.key_size)?;
                    writeln!(out, "Size {}", leaf.size())?;
                    writeln!(out, "Previous page index {}", leaf.prev_page_index())?;
                    writeln!(out, "Next page index {}", leaf.next_page_index())?;
                    for index in 0..leaf.size() as usize {
                        writeln!(
                            out,
                            "I {index} key {:?} value {:?}",
                            leaf.key_at(index)?,
                            leaf.row_id_at(index)?
                        )?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Iterator over leaf entries in ascending key order, crossing leaves via
/// the next-pointers and filtering each entry through the predicate vector.
pub struct BTreeRangeIter<'a> {
    tree: &'a BTree,
    page_index: PageIndex,
    offset: usize,
    conditions: SmallVec<[(usize, IndexComparator, Value); 4]>,
    /// First-key-column upper bound: `(value, inclusive)`.
    stop: Option<(Value, bool)>,
    done: bool,
}

impl BTreeRangeIter<'_> {
    fn matches(&self, key: &Row) -> bool {
        self.conditions.iter().all(|(column, comparator, value)| {
            let ord = compare_values(&key[*column], value);
            match comparator {
                IndexComparator::Equal => ord == Ordering::Equal,
                IndexComparator::NotEqual => ord != Ordering::Equal,
                IndexComparator::Less => ord == Ordering::Less,
                IndexComparator::LessOrEqual => ord != Ordering::Greater,
                IndexComparator::Greater => ord == Ordering::Greater,
                IndexComparator::GreaterOrEqual => ord != Ordering::Less,
            }
        })
    }

    pub fn next(&mut self) -> Result<Option<(Row, RowId)>> {
        loop {
            if self.done {
                return Ok(None);
            }

            let (entry, next_page) = {
                let guard = self.tree.guard(self.page_index)?;
                let leaf = LeafPageRef::new(guard.data(), &self.tree.marshal, self.tree.key_size)?;
                if self.offset < leaf.size() as usize {
                    (
                        Some((leaf.key_at(self.offset)?, leaf.row_id_at(self.offset)?)),
                        INVALID_PAGE_INDEX,
                    )
                } else {
                    (None, leaf.next_page_index())
                }
            };

            let Some((key, row_id)) = entry else {
                if next_page == INVALID_PAGE_INDEX {
                    self.done = true;
                    return Ok(None);
                }
                self.page_index = next_page;
                self.offset = 0;
                continue;
            };
            self.offset += 1;

            if let Some((bound, inclusive)) = &self.stop {
                let ord = compare_values(&key[0], bound);
                if ord == Ordering::Greater || (!inclusive && ord == Ordering::Equal) {
                    self.done = true;
                    return Ok(None);
                }
            }

            if self.matches(&key) {
                return Ok(Some((key, row_id)));
            }
        }
    }
}
