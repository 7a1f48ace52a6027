//! # Slotted Row Page
//!
//! A fixed-size page holding variable-length rows. The header and slot
//! directory grow from the low end in 8-byte words; payloads grow from the
//! high end toward them.
//!
//! ```text
//! word 0          row_count (N)
//! word 1          used_space = payload bytes of live slots + N * 16
//! word 2 + 2i     slot i: payload length   (0 => tombstone)
//! word 3 + 2i     slot i: byte offset from page start (0 => tombstone)
//! ...
//!                 <free space>
//! ...             payloads, highest offset first
//! page end
//! ```
//!
//! A payload is a one-byte `present` flag followed by the marshalled row.
//! `used_space` deliberately excludes the two header words; the insert
//! capacity check accounts for them separately.
//!
//! ## Compaction Invariant
//!
//! After any mutation all live payloads lie contiguously at the top of the
//! page: deleting a row memmoves every payload below it upward to close the
//! hole and patches the affected slot offsets. This keeps insertion trivial
//! (new payload goes just below the lowest live offset) at the cost of
//! making delete O(page).
//!
//! Views follow the storage borrow discipline: [`RowPageRef`] /
//! [`RowPageMut`] wrap the bytes of a pinned frame and are valid only while
//! the caller holds the guard.

use eyre::{ensure, Result};

use crate::config::{PAGE_SIZE, ROW_PAGE_HEADER_WORDS, ROW_PAGE_WORD};
use crate::records::Marshal;
use crate::types::{Row, RowIndex};

/// Bytes one slot directory entry occupies (length word + offset word).
const SLOT_BYTES: usize = 2 * ROW_PAGE_WORD;
/// Bytes of the fixed header (row_count word + used_space word).
const HEADER_BYTES: usize = ROW_PAGE_HEADER_WORDS * ROW_PAGE_WORD;

fn word(data: &[u8], index: usize) -> u64 {
    let start = index * ROW_PAGE_WORD;
    u64::from_le_bytes(data[start..start + ROW_PAGE_WORD].try_into().unwrap())
}

fn set_word(data: &mut [u8], index: usize, value: u64) {
    let start = index * ROW_PAGE_WORD;
    data[start..start + ROW_PAGE_WORD].copy_from_slice(&value.to_le_bytes());
}

/// Read-only view of a slotted row page.
pub struct RowPageRef<'a> {
    data: &'a [u8],
    marshal: &'a Marshal,
}

impl<'a> RowPageRef<'a> {
    pub fn new(data: &'a [u8], marshal: &'a Marshal) -> Self {
        debug_assert_eq!(data.len(), PAGE_SIZE);
        Self { data, marshal }
    }

    pub fn row_count(&self) -> RowIndex {
        word(self.data, 0) as RowIndex
    }

    pub fn used_space(&self) -> u64 {
        word(self.data, 1)
    }

    fn slot(&self, index: RowIndex) -> (usize, usize) {
        let length = word(self.data, 2 + 2 * index as usize) as usize;
        let offset = word(self.data, 3 + 2 * index as usize) as usize;
        (length, offset)
    }

    /// Returns the row in `slot`, or `None` for tombstones and
    /// out-of-range slots.
    pub fn get_row(&self, slot: RowIndex) -> Result<Option<Row>> {
        if slot >= self.row_count() {
            return Ok(None);
        }
        let (length, offset) = self.slot(slot);
        if length == 0 || offset == 0 {
            return Ok(None);
        }
        ensure!(
            offset + length <= PAGE_SIZE,
            "slot {slot} extends past the page: offset={offset} length={length}"
        );
        if self.data[offset] == 0 {
            return Ok(None);
        }
        let row = self
            .marshal
            .deserialize_row(&self.data[offset + 1..offset + length])?;
        Ok(Some(row))
    }
}

/// Mutable view of a slotted row page.
pub struct RowPageMut<'a> {
    data: &'a mut [u8],
    marshal: &'a Marshal,
}

impl<'a> RowPageMut<'a> {
    pub fn new(data: &'a mut [u8], marshal: &'a Marshal) -> Self {
        debug_assert_eq!(data.len(), PAGE_SIZE);
        Self { data, marshal }
    }

    pub fn as_ref(&self) -> RowPageRef<'_> {
        RowPageRef::new(self.data, self.marshal)
    }

    pub fn row_count(&self) -> RowIndex {
        word(self.data, 0) as RowIndex
    }

    pub fn used_space(&self) -> u64 {
        word(self.data, 1)
    }

    fn slot(&self, index: RowIndex) -> (usize, usize) {
        let length = word(self.data, 2 + 2 * index as usize) as usize;
        let offset = word(self.data, 3 + 2 * index as usize) as usize;
        (length, offset)
    }

    fn set_slot(&mut self, index: RowIndex, length: usize, offset: usize) {
        set_word(self.data, 2 + 2 * index as usize, length as u64);
        set_word(self.data, 3 + 2 * index as usize, offset as u64);
    }

    /// Lowest live payload offset, or `PAGE_SIZE` on an empty page.
    fn min_payload_offset(&self) -> usize {
        let mut min = PAGE_SIZE;
        for index in 0..self.row_count() {
            let (length, offset) = self.slot(index);
            if length != 0 && offset != 0 {
                min = min.min(offset);
            }
        }
        min
    }

    /// Inserts a row, reusing the lowest tombstone slot if one exists.
    /// Returns `None` when the page has no room.
    pub fn insert_row(&mut self, row: &Row) -> Result<Option<RowIndex>> {
        let length = 1 + self.marshal.row_space(row)?;
        let used = self.used_space() as usize;

        if used + length + SLOT_BYTES + HEADER_BYTES > PAGE_SIZE {
            return Ok(None);
        }

        let offset = self.min_payload_offset() - length;

        let count = self.row_count();
        let mut slot = count;
        for index in 0..count {
            let (slot_length, _) = self.slot(index);
            if slot_length == 0 {
                slot = index;
                break;
            }
        }

        let mut used_delta = length as u64;
        if slot == count {
            set_word(self.data, 0, count as u64 + 1);
            used_delta += SLOT_BYTES as u64;
        }
        self.set_slot(slot, length, offset);
        set_word(self.data, 1, self.used_space() + used_delta);

        self.data[offset] = 1;
        self.marshal
            .serialize_row(&mut self.data[offset + 1..offset + length], row)?;

        Ok(Some(slot))
    }

    /// Deletes the row in `slot`, compacting payloads so live rows stay
    /// contiguous at the top of the page. Returns false for tombstones and
    /// out-of-range slots.
    pub fn delete_row(&mut self, slot: RowIndex) -> Result<bool> {
        let count = self.row_count();
        if slot >= count {
            return Ok(false);
        }
        let (length, offset) = self.slot(slot);
        if length == 0 || offset == 0 {
            return Ok(false);
        }

        // Close the hole: every payload below the deleted one moves up.
        self.set_slot(slot, 0, 0);
        let min_offset = self.min_payload_offset();
        if min_offset < offset {
            self.data.copy_within(min_offset..offset, min_offset + length);
        }
        for index in 0..count {
            let (slot_length, slot_offset) = self.slot(index);
            if slot_length != 0 && slot_offset != 0 && slot_offset < offset {
                self.set_slot(index, slot_length, slot_offset + length);
            }
        }

        let mut used_delta = length as u64;
        if slot == count - 1 {
            set_word(self.data, 0, count as u64 - 1);
            used_delta += SLOT_BYTES as u64;
        }
        set_word(self.data, 1, self.used_space() - used_delta);

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnSchema, Schema, Type, Value};
    use std::sync::Arc;

    fn string_marshal() -> Marshal {
        Marshal::new(Arc::new(
            Schema::new(vec![ColumnSchema::new("s", Type::String)]).unwrap(),
        ))
    }

    fn row_of_len(marshal: &Marshal, payload_len: usize) -> Row {
        // fixed region is 8 (bitmap) + 16 (len+offset); the rest is payload
        let text_len = payload_len - 8 - 16;
        vec![Value::String("x".repeat(text_len))]
    }

    fn page() -> Vec<u8> {
        vec![0u8; PAGE_SIZE]
    }

    #[test]
    fn insert_then_read_back() {
        let marshal = string_marshal();
        let mut data = page();
        let mut view = RowPageMut::new(&mut data, &marshal);

        let row = vec![Value::String("hello".into())];
        let slot = view.insert_row(&row).unwrap().unwrap();
        assert_eq!(slot, 0);

        let read = view.as_ref().get_row(0).unwrap().unwrap();
        assert_eq!(read, row);
        assert_eq!(view.row_count(), 1);
    }

    #[test]
    fn deleted_middle_slot_is_reused_and_hole_closed() {
        let marshal = string_marshal();
        let mut data = page();
        let mut view = RowPageMut::new(&mut data, &marshal);

        let rows: Vec<Row> = [100, 200, 300]
            .iter()
            .map(|&len| row_of_len(&marshal, len - 1))
            .collect();
        for row in &rows {
            view.insert_row(row).unwrap().unwrap();
        }

        assert!(view.delete_row(1).unwrap());
        assert!(view.as_ref().get_row(1).unwrap().is_none());

        // A 150-byte payload fits the freed hole and lands in slot 1.
        let replacement = row_of_len(&marshal, 149);
        let slot = view.insert_row(&replacement).unwrap().unwrap();
        assert_eq!(slot, 1);

        assert_eq!(view.as_ref().get_row(0).unwrap().unwrap(), rows[0]);
        assert_eq!(view.as_ref().get_row(1).unwrap().unwrap(), replacement);
        assert_eq!(view.as_ref().get_row(2).unwrap().unwrap(), rows[2]);

        // used_space = live payloads + slot directory
        let expected = (100 + 150 + 300) as u64 + 3 * SLOT_BYTES as u64;
        assert_eq!(view.used_space(), expected);
    }

    #[test]
    fn deleting_the_last_slot_shrinks_the_directory() {
        let marshal = string_marshal();
        let mut data = page();
        let mut view = RowPageMut::new(&mut data, &marshal);

        view.insert_row(&row_of_len(&marshal, 99)).unwrap().unwrap();
        view.insert_row(&row_of_len(&marshal, 49)).unwrap().unwrap();
        assert_eq!(view.row_count(), 2);

        assert!(view.delete_row(1).unwrap());
        assert_eq!(view.row_count(), 1);
        assert_eq!(view.used_space(), 100 + SLOT_BYTES as u64);
    }

    #[test]
    fn page_rejects_rows_when_full() {
        let marshal = string_marshal();
        let mut data = page();
        let mut view = RowPageMut::new(&mut data, &marshal);

        let big = row_of_len(&marshal, PAGE_SIZE / 2);
        assert!(view.insert_row(&big).unwrap().is_some());
        assert!(view.insert_row(&big).unwrap().is_none());
        assert_eq!(view.row_count(), 1);
    }

    #[test]
    fn delete_of_tombstone_is_a_noop() {
        let marshal = string_marshal();
        let mut data = page();
        let mut view = RowPageMut::new(&mut data, &marshal);

        view.insert_row(&row_of_len(&marshal, 50)).unwrap().unwrap();
        view.insert_row(&row_of_len(&marshal, 50)).unwrap().unwrap();
        assert!(view.delete_row(0).unwrap());
        assert!(!view.delete_row(0).unwrap());
        assert!(!view.delete_row(9).unwrap());
    }

    #[test]
    fn used_space_tracks_live_rows_exactly() {
        let marshal = string_marshal();
        let mut data = page();
        let mut view = RowPageMut::new(&mut data, &marshal);

        let mut live: Vec<(RowIndex, Row)> = Vec::new();
        for len in [60, 90, 120, 70] {
            let row = row_of_len(&marshal, len - 1);
            let slot = view.insert_row(&row).unwrap().unwrap();
            live.push((slot, row));
        }
        view.delete_row(2).unwrap();
        live.retain(|(slot, _)| *slot != 2);

        let payloads: u64 = live
            .iter()
            .map(|(_, row)| 1 + marshal.row_space(row).unwrap() as u64)
            .sum();
        let directory = view.row_count() as u64 * SLOT_BYTES as u64;
        assert_eq!(view.used_space(), payloads + directory);

        for (slot, row) in &live {
            assert_eq!(view.as_ref().get_row(*slot).unwrap().unwrap(), *row);
        }
    }
}
