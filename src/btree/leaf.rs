//! # B+Tree Leaf Pages
//!
//! Leaves hold the indexed `(key, row-id)` pairs in strictly increasing key
//! order and are chained into a doubly-linked list that visits all keys in
//! ascending order.
//!
//! ```text
//! Header (16 bytes):
//! | page_type (4) | size (4) | prev_page_index (4) | next_page_index (4) |
//!
//! Entries, back to back, each key_size + 8 bytes:
//! | key_0 row_id_0 | key_1 row_id_1 | ... | key_{n-1} row_id_{n-1} |
//! ```
//!
//! Keys are rows of the index key schema marshalled into a fixed-width
//! slot, so entry `i` starts at `16 + i * entry_size` and every search is a
//! plain binary search over slots. Only unique keys are supported: an
//! insert of an existing key fails with a duplicate-key error.
//!
//! Views borrow the bytes of a pinned frame; [`LeafPageRef`] reads,
//! [`LeafPageMut`] mutates.

use eyre::{ensure, Result};
use zerocopy::{FromBytes, IntoBytes};

use crate::config::INVALID_PAGE_INDEX;
use crate::error::Error;
use crate::records::Marshal;
use crate::types::{compare_rows, PageIndex, Row, RowId};

/// Bytes of the leaf header (tag, size, prev, next).
pub const LEAF_HEADER_SIZE: usize = 16;

const SIZE_OFFSET: usize = 4;
const PREV_OFFSET: usize = 8;
const NEXT_OFFSET: usize = 12;

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Position of a key in a leaf, or where it would be inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafSearch {
    Found(usize),
    NotFound(usize),
}

pub struct LeafPageRef<'a> {
    data: &'a [u8],
    marshal: &'a Marshal,
    key_size: usize,
}

impl<'a> LeafPageRef<'a> {
    pub fn new(data: &'a [u8], marshal: &'a Marshal, key_size: usize) -> Result<Self> {
        ensure!(
            super::page::page_type_of(data) == super::page::BTreePageType::Leaf,
            "expected a leaf page, found {}",
            super::page::page_type_of(data)
        );
        Ok(Self {
            data,
            marshal,
            key_size,
        })
    }

    pub fn size(&self) -> u32 {
        read_u32(self.data, SIZE_OFFSET)
    }

    pub fn prev_page_index(&self) -> PageIndex {
        read_u32(self.data, PREV_OFFSET)
    }

    pub fn next_page_index(&self) -> PageIndex {
        read_u32(self.data, NEXT_OFFSET)
    }

    fn entry_size(&self) -> usize {
        self.key_size + size_of::<RowId>()
    }

    fn entry_offset(&self, index: usize) -> usize {
        LEAF_HEADER_SIZE + index * self.entry_size()
    }

    pub fn key_at(&self, index: usize) -> Result<Row> {
        debug_assert!(index < self.size() as usize);
        let offset = self.entry_offset(index);
        self.marshal
            .deserialize_row(&self.data[offset..offset + self.key_size])
    }

    pub fn row_id_at(&self, index: usize) -> Result<RowId> {
        let offset = self.entry_offset(index) + self.key_size;
        RowId::read_from_bytes(&self.data[offset..offset + size_of::<RowId>()])
            .map_err(|e| eyre::eyre!("failed to read row id at entry {index}: {e:?}"))
    }

    pub fn min_key(&self) -> Result<Row> {
        self.key_at(0)
    }

    pub fn min_row_id(&self) -> Result<RowId> {
        self.row_id_at(0)
    }

    pub fn max_key(&self) -> Result<Row> {
        self.key_at(self.size() as usize - 1)
    }

    pub fn max_row_id(&self) -> Result<RowId> {
        self.row_id_at(self.size() as usize - 1)
    }

    /// Index of the first entry whose key is `>= key` (prefix comparison
    /// when `key` is shorter than the stored keys).
    pub fn lower_bound(&self, key: &Row) -> Result<usize> {
        let mut low = 0usize;
        let mut high = self.size() as usize;
        while low < high {
            let mid = (low + high) / 2;
            if compare_rows(&self.key_at(mid)?, key) == std::cmp::Ordering::Less {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        Ok(high)
    }

    pub fn find_key(&self, key: &Row) -> Result<LeafSearch> {
        let position = self.lower_bound(key)?;
        if position < self.size() as usize
            && compare_rows(&self.key_at(position)?, key) == std::cmp::Ordering::Equal
        {
            Ok(LeafSearch::Found(position))
        } else {
            Ok(LeafSearch::NotFound(position))
        }
    }

    pub fn lookup(&self, key: &Row) -> Result<Option<RowId>> {
        match self.find_key(key)? {
            LeafSearch::Found(position) => Ok(Some(self.row_id_at(position)?)),
            LeafSearch::NotFound(_) => Ok(None),
        }
    }
}

pub struct LeafPageMut<'a> {
    data: &'a mut [u8],
    marshal: &'a Marshal,
    key_size: usize,
}

impl<'a> LeafPageMut<'a> {
    /// Formats a zeroed (or recycled) page as an empty leaf.
    pub fn init(data: &'a mut [u8], marshal: &'a Marshal, key_size: usize) -> Self {
        write_u32(data, 0, super::page::BTreePageType::Leaf as u32);
        write_u32(data, SIZE_OFFSET, 0);
        write_u32(data, PREV_OFFSET, INVALID_PAGE_INDEX);
        write_u32(data, NEXT_OFFSET, INVALID_PAGE_INDEX);
        Self {
            data,
            marshal,
            key_size,
        }
    }

    pub fn open(data: &'a mut [u8], marshal: &'a Marshal, key_size: usize) -> Result<Self> {
        ensure!(
            super::page::page_type_of(data) == super::page::BTreePageType::Leaf,
            "expected a leaf page, found {}",
            super::page::page_type_of(data)
        );
        Ok(Self {
            data,
            marshal,
            key_size,
        })
    }

    pub fn as_ref(&self) -> LeafPageRef<'_> {
        LeafPageRef {
            data: self.data,
            marshal: self.marshal,
            key_size: self.key_size,
        }
    }

    pub fn size(&self) -> u32 {
        read_u32(self.data, SIZE_OFFSET)
    }

    fn set_size(&mut self, size: u32) {
        write_u32(self.data, SIZE_OFFSET, size);
    }

    pub fn set_prev_page_index(&mut self, page: PageIndex) {
        write_u32(self.data, PREV_OFFSET, page);
    }

    pub fn set_next_page_index(&mut self, page: PageIndex) {
        write_u32(self.data, NEXT_OFFSET, page);
    }

    fn entry_size(&self) -> usize {
        self.key_size + size_of::<RowId>()
    }

    fn entry_offset(&self, index: usize) -> usize {
        LEAF_HEADER_SIZE + index * self.entry_size()
    }

    fn write_entry(&mut self, index: usize, key: &Row, row_id: RowId) -> Result<()> {
        let offset = self.entry_offset(index);
        let key_size = self.key_size;
        self.marshal
            .serialize_row(&mut self.data[offset..offset + key_size], key)?;
        self.data[offset + key_size..offset + key_size + size_of::<RowId>()]
            .copy_from_slice(row_id.as_bytes());
        Ok(())
    }

    /// Inserts `(key, row_id)` at its sorted position. Fails on a duplicate
    /// key or a full page.
    pub fn insert(&mut self, key: &Row, row_id: RowId, max_page_size: u32) -> Result<()> {
        let size = self.size() as usize;
        ensure!(
            size < max_page_size as usize,
            "leaf page is full ({size} entries)"
        );

        let position = match self.as_ref().find_key(key)? {
            LeafSearch::Found(_) => {
                return Err(Error::duplicate_key(format!(
                    "key {key:?} already exists in the index"
                )))
            }
            LeafSearch::NotFound(position) => position,
        };

        let entry_size = self.entry_size();
        let start = self.entry_offset(position);
        let end = self.entry_offset(size);
        self.data.copy_within(start..end, start + entry_size);

        self.write_entry(position, key, row_id)?;
        self.set_size(size as u32 + 1);
        Ok(())
    }

    /// Removes `key`; false if it is not present.
    pub fn remove(&mut self, key: &Row) -> Result<bool> {
        let size = self.size() as usize;
        if size == 0 {
            return Ok(false);
        }
        let position = match self.as_ref().find_key(key)? {
            LeafSearch::Found(position) => position,
            LeafSearch::NotFound(_) => return Ok(false),
        };

        let entry_size = self.entry_size();
        let start = self.entry_offset(position + 1);
        let end = self.entry_offset(size);
        self.data.copy_within(start..end, start - entry_size);

        self.set_size(size as u32 - 1);
        Ok(true)
    }

    /// Moves the upper half of this leaf's entries into `rhs` (an empty,
    /// freshly initialized leaf) and returns `rhs`'s new minimum key.
    pub fn split_into(&mut self, rhs: &mut LeafPageMut<'_>) -> Result<Row> {
        let size = self.size() as usize;
        let first_moved = size / 2;
        let moved = size - first_moved;

        let entry_size = self.entry_size();
        let src = self.entry_offset(first_moved)..self.entry_offset(size);
        let dst = LEAF_HEADER_SIZE..LEAF_HEADER_SIZE + moved * entry_size;
        rhs.data[dst].copy_from_slice(&self.data[src]);

        rhs.set_size(moved as u32);
        self.set_size(first_moved as u32);
        rhs.as_ref().min_key()
    }

    /// Appends every entry of this leaf into `rhs` (which must have room)
    /// and empties this page. Returns `rhs`'s new minimum key.
    pub fn merge_into(&mut self, rhs: &mut LeafPageMut<'_>, max_page_size: u32) -> Result<Row> {
        let size = self.size() as usize;
        for index in 0..size {
            let key = self.as_ref().key_at(index)?;
            let row_id = self.as_ref().row_id_at(index)?;
            rhs.insert(&key, row_id, max_page_size)?;
        }
        self.set_size(0);
        rhs.as_ref().min_key()
    }
}
