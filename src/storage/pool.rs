//! # Clock Buffer Pool
//!
//! A fixed set of page frames shared by every open file of a database.
//! Frames are allocated once at construction and reused forever.
//!
//! ## Frame State
//!
//! ```text
//! Frame {
//!     key:   Option<PageKey>,   // resident page, None while free
//!     refs:  u8,                // clock counter, saturates at 5
//!     pins:  u32,               // > 0 makes the frame immune to eviction
//!     dirty: bool,              // needs write-back before reuse
//!     data:  Box<[u8; 8192]>,   // the page bytes
//! }
//! ```
//!
//! ## Replacement
//!
//! Eviction follows the classic clock: the hand walks the frame ring,
//! decrementing positive reference counters as it passes, skipping pinned
//! frames, and claiming the first frame with a zero counter and no pins.
//! A fetch hit bumps the counter (capped at
//! [`MAX_FRAME_REFS`](crate::config::MAX_FRAME_REFS)), so hot pages survive
//! several revolutions while scan pages decay quickly.
//!
//! If the hand sees nothing but pinned frames for a whole revolution the
//! pool is genuinely exhausted and the fetch fails, a deliberate choice
//! over the alternative of spinning until some guard drops, which in a
//! single-threaded engine would never happen.
//!
//! ## Invariant
//!
//! At any moment the number of distinct resident `(file, page)` keys equals
//! the number of non-free frames, and every resident page occupies exactly
//! one frame. `debug_assert_invariants` checks this after every mutation in
//! debug builds.

use eyre::{ensure, Result};
use hashbrown::HashMap;
use parking_lot::Mutex;

use crate::config::{MAX_FRAME_REFS, PAGE_SIZE};
use crate::error::Error;
use crate::storage::DiskFile;
use crate::types::PageIndex;

/// Identity of a cached page: which registered file, which page within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub file_id: u32,
    pub page_no: PageIndex,
}

impl PageKey {
    pub fn new(file_id: u32, page_no: PageIndex) -> Self {
        Self { file_id, page_no }
    }
}

struct Frame {
    key: Option<PageKey>,
    refs: u8,
    pins: u32,
    dirty: bool,
    data: Box<[u8; PAGE_SIZE]>,
}

impl Frame {
    fn free() -> Self {
        Self {
            key: None,
            refs: 0,
            pins: 0,
            dirty: false,
            data: Box::new([0u8; PAGE_SIZE]),
        }
    }
}

struct PoolInner {
    frames: Vec<Frame>,
    resident: HashMap<PageKey, usize>,
    hand: u64,
    files: HashMap<u32, DiskFile>,
    next_file_id: u32,
}

impl PoolInner {
    /// Advances the clock hand to a victim frame. Decrements counters on the
    /// way; fails if a full revolution meets only pinned frames.
    fn find_victim(&mut self) -> Result<usize> {
        let frame_count = self.frames.len();
        let mut pinned_streak = 0usize;

        loop {
            let index = (self.hand % frame_count as u64) as usize;
            let frame = &mut self.frames[index];

            if frame.pins > 0 {
                pinned_streak += 1;
                ensure!(
                    pinned_streak < frame_count,
                    Error::new(
                        crate::error::ErrorKind::BufferPoolExhausted,
                        format!("all {frame_count} buffer frames are pinned")
                    )
                );
                self.hand += 1;
                continue;
            }
            pinned_streak = 0;

            if frame.refs > 0 {
                frame.refs -= 1;
                self.hand += 1;
                continue;
            }

            // The hand stays on the victim; the next eviction starts here
            // and sees its fresh counter first.
            return Ok(index);
        }
    }

    fn evict_frame(&mut self, index: usize) -> Result<()> {
        if let Some(old_key) = self.frames[index].key.take() {
            if self.frames[index].dirty {
                let file = self
                    .files
                    .get_mut(&old_key.file_id)
                    .ok_or_else(|| eyre::eyre!("evicting page of unregistered file {}", old_key.file_id))?;
                file.write_page(old_key.page_no, self.frames[index].data.as_slice())?;
            }
            self.resident.remove(&old_key);
            self.frames[index].dirty = false;
        }
        Ok(())
    }

    #[cfg(debug_assertions)]
    fn debug_assert_invariants(&self) {
        let occupied = self.frames.iter().filter(|f| f.key.is_some()).count();
        debug_assert_eq!(self.resident.len(), occupied, "resident map out of sync");
        for (key, &index) in &self.resident {
            debug_assert_eq!(self.frames[index].key, Some(*key), "frame key mismatch");
        }
    }

    #[cfg(not(debug_assertions))]
    fn debug_assert_invariants(&self) {}
}

/// Shared clock cache of page frames. See the module docs for the protocol.
pub struct BufferPool {
    inner: Mutex<PoolInner>,
}

impl BufferPool {
    pub fn new(frame_count: usize) -> Self {
        let frames = (0..frame_count.max(1)).map(|_| Frame::free()).collect();
        Self {
            inner: Mutex::new(PoolInner {
                frames,
                resident: HashMap::new(),
                hand: 0,
                files: HashMap::new(),
                next_file_id: 0,
            }),
        }
    }

    /// Registers a file with the pool, returning the id used in [`PageKey`]s.
    pub fn register_file(&self, file: DiskFile) -> u32 {
        let mut inner = self.inner.lock();
        let file_id = inner.next_file_id;
        inner.next_file_id += 1;
        inner.files.insert(file_id, file);
        file_id
    }

    /// Discards the file's resident frames (without write-back) and removes
    /// the file from the pool. Fails while any of its pages is pinned.
    pub fn unregister_file(&self, file_id: u32) -> Result<()> {
        let mut inner = self.inner.lock();

        let pinned = inner
            .frames
            .iter()
            .any(|f| f.pins > 0 && f.key.is_some_and(|k| k.file_id == file_id));
        ensure!(!pinned, "cannot drop file {file_id}: pages still pinned");

        for index in 0..inner.frames.len() {
            if inner.frames[index].key.is_some_and(|k| k.file_id == file_id) {
                let key = inner.frames[index].key.take().unwrap();
                inner.resident.remove(&key);
                inner.frames[index].refs = 0;
                inner.frames[index].dirty = false;
            }
        }

        inner.files.remove(&file_id);
        inner.debug_assert_invariants();
        Ok(())
    }

    /// Returns a pinned guard for the page, loading it through the clock
    /// cache on a miss.
    pub fn fetch(&self, key: PageKey) -> Result<PageGuard<'_>> {
        let mut inner = self.inner.lock();

        if let Some(&index) = inner.resident.get(&key) {
            let frame = &mut inner.frames[index];
            frame.refs = frame.refs.saturating_add(1).min(MAX_FRAME_REFS);
            frame.pins += 1;
            return Ok(PageGuard {
                pool: self,
                key,
                frame: index,
            });
        }

        let victim = inner.find_victim()?;
        inner.evict_frame(victim)?;

        // Reborrow the guard once so frames and files split as disjoint
        // field borrows.
        let inner = &mut *inner;
        let frame = &mut inner.frames[victim];
        let file = inner
            .files
            .get_mut(&key.file_id)
            .ok_or_else(|| eyre::eyre!("fetch from unregistered file {}", key.file_id))?;
        file.read_page(key.page_no, frame.data.as_mut_slice())?;

        frame.key = Some(key);
        frame.refs = 1;
        frame.pins = 1;
        frame.dirty = false;
        inner.resident.insert(key, victim);
        inner.debug_assert_invariants();

        Ok(PageGuard {
            pool: self,
            key,
            frame: victim,
        })
    }

    /// Grows the file by one zeroed page and returns the new page index.
    pub fn allocate_page(&self, file_id: u32) -> Result<PageIndex> {
        let mut inner = self.inner.lock();
        let file = inner
            .files
            .get_mut(&file_id)
            .ok_or_else(|| eyre::eyre!("allocate on unregistered file {file_id}"))?;
        file.allocate_page()
    }

    pub fn page_count(&self, file_id: u32) -> Result<u32> {
        let inner = self.inner.lock();
        let file = inner
            .files
            .get(&file_id)
            .ok_or_else(|| eyre::eyre!("page_count of unregistered file {file_id}"))?;
        Ok(file.page_count())
    }

    /// Writes every dirty frame back and syncs all files. Returns the number
    /// of frames flushed.
    pub fn flush(&self) -> Result<usize> {
        let mut inner = self.inner.lock();
        let inner = &mut *inner;
        let mut flushed = 0;

        for index in 0..inner.frames.len() {
            if !inner.frames[index].dirty {
                continue;
            }
            let Some(key) = inner.frames[index].key else {
                continue;
            };
            let frame = &inner.frames[index];
            let file = inner
                .files
                .get_mut(&key.file_id)
                .ok_or_else(|| eyre::eyre!("flushing page of unregistered file {}", key.file_id))?;
            file.write_page(key.page_no, frame.data.as_slice())?;
            inner.frames[index].dirty = false;
            flushed += 1;
        }

        for file in inner.files.values() {
            file.sync()?;
        }

        Ok(flushed)
    }

    /// Number of resident pages (test hook).
    pub fn resident_count(&self) -> usize {
        self.inner.lock().resident.len()
    }

    fn unpin(&self, frame: usize) {
        let mut inner = self.inner.lock();
        let frame = &mut inner.frames[frame];
        debug_assert!(frame.pins > 0, "unpin of unpinned frame");
        frame.pins -= 1;
    }

    fn mark_dirty(&self, frame: usize) {
        self.inner.lock().frames[frame].dirty = true;
    }

    fn frame_data_ptr(&self, frame: usize) -> *mut u8 {
        let mut inner = self.inner.lock();
        inner.frames[frame].data.as_mut_ptr()
    }
}

/// RAII pin on one resident page. The page cannot be evicted while a guard
/// exists; typed page views borrow the guard so their lifetime is bounded
/// by the pin.
pub struct PageGuard<'a> {
    pool: &'a BufferPool,
    key: PageKey,
    frame: usize,
}

impl std::fmt::Debug for PageGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageGuard")
            .field("key", &self.key)
            .field("frame", &self.frame)
            .finish()
    }
}

impl PageGuard<'_> {
    pub fn key(&self) -> PageKey {
        self.key
    }

    pub fn page_no(&self) -> PageIndex {
        self.key.page_no
    }

    pub fn data(&self) -> &[u8] {
        let ptr = self.pool.frame_data_ptr(self.frame);
        // SAFETY: the frame is pinned for as long as this guard lives, so it
        // cannot be evicted or reused; the boxed buffer's address is stable.
        // The engine is single-threaded, so no writer races this read.
        unsafe { std::slice::from_raw_parts(ptr, PAGE_SIZE) }
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        self.pool.mark_dirty(self.frame);
        let ptr = self.pool.frame_data_ptr(self.frame);
        // SAFETY: as in `data`, plus `&mut self` guarantees this is the only
        // borrow through this guard.
        unsafe { std::slice::from_raw_parts_mut(ptr, PAGE_SIZE) }
    }
}

impl Drop for PageGuard<'_> {
    fn drop(&mut self) {
        self.pool.unpin(self.frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn pool_with_file(frames: usize, pages: u32) -> (BufferPool, u32, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let file = DiskFile::create(dir.path().join("t"), pages).unwrap();
        let pool = BufferPool::new(frames);
        let file_id = pool.register_file(file);
        (pool, file_id, dir)
    }

    #[test]
    fn fetch_hit_returns_same_bytes() {
        let (pool, file_id, _dir) = pool_with_file(4, 1);

        {
            let mut guard = pool.fetch(PageKey::new(file_id, 0)).unwrap();
            guard.data_mut()[0] = 42;
        }

        let guard = pool.fetch(PageKey::new(file_id, 0)).unwrap();
        assert_eq!(guard.data()[0], 42);
        assert_eq!(pool.resident_count(), 1);
    }

    #[test]
    fn eviction_writes_dirty_pages_back() {
        let (pool, file_id, _dir) = pool_with_file(2, 4);

        {
            let mut guard = pool.fetch(PageKey::new(file_id, 0)).unwrap();
            guard.data_mut()[0] = 7;
        }

        // Fill the pool past capacity so page 0 gets evicted.
        for page_no in 1..4 {
            let _ = pool.fetch(PageKey::new(file_id, page_no)).unwrap();
        }
        assert_eq!(pool.resident_count(), 2);

        let guard = pool.fetch(PageKey::new(file_id, 0)).unwrap();
        assert_eq!(guard.data()[0], 7);
    }

    #[test]
    fn resident_pages_occupy_one_frame_each() {
        let (pool, file_id, _dir) = pool_with_file(3, 3);

        let a = pool.fetch(PageKey::new(file_id, 0)).unwrap();
        let b = pool.fetch(PageKey::new(file_id, 0)).unwrap();
        assert_eq!(pool.resident_count(), 1);
        drop(a);
        drop(b);

        for page_no in 0..3 {
            let _ = pool.fetch(PageKey::new(file_id, page_no)).unwrap();
        }
        assert_eq!(pool.resident_count(), 3);
    }

    #[test]
    fn fetch_fails_when_every_frame_is_pinned() {
        let (pool, file_id, _dir) = pool_with_file(2, 3);

        let _g0 = pool.fetch(PageKey::new(file_id, 0)).unwrap();
        let _g1 = pool.fetch(PageKey::new(file_id, 1)).unwrap();

        let err = pool.fetch(PageKey::new(file_id, 2)).unwrap_err();
        assert_eq!(
            crate::error::kind_of(&err),
            Some(crate::error::ErrorKind::BufferPoolExhausted)
        );
    }

    #[test]
    fn hot_pages_survive_a_scan() {
        let (pool, file_id, _dir) = pool_with_file(2, 8);

        // Touch page 0 repeatedly to saturate its counter.
        for _ in 0..5 {
            let _ = pool.fetch(PageKey::new(file_id, 0)).unwrap();
        }

        // One pass of cold pages through the other frame decays but does
        // not evict the hot page.
        for page_no in 1..5 {
            let _ = pool.fetch(PageKey::new(file_id, page_no)).unwrap();
        }

        let inner_has_page0 = pool.resident_count() == 2;
        assert!(inner_has_page0);
        let guard = pool.fetch(PageKey::new(file_id, 0)).unwrap();
        assert_eq!(guard.page_no(), 0);
    }

    #[test]
    fn flush_persists_without_eviction() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t");
        let file = DiskFile::create(&path, 1).unwrap();
        let pool = BufferPool::new(4);
        let file_id = pool.register_file(file);

        {
            let mut guard = pool.fetch(PageKey::new(file_id, 0)).unwrap();
            guard.data_mut()[10] = 99;
        }
        assert_eq!(pool.flush().unwrap(), 1);
        assert_eq!(pool.flush().unwrap(), 0);

        let reopened = DiskFile::open(&path).unwrap();
        let mut buf = vec![0u8; PAGE_SIZE];
        reopened.read_page(0, &mut buf).unwrap();
        assert_eq!(buf[10], 99);
    }

    #[test]
    fn unregister_discards_resident_pages() {
        let (pool, file_id, _dir) = pool_with_file(4, 2);
        let _ = pool.fetch(PageKey::new(file_id, 0)).unwrap();
        let _ = pool.fetch(PageKey::new(file_id, 1)).unwrap();
        assert_eq!(pool.resident_count(), 2);

        pool.unregister_file(file_id).unwrap();
        assert_eq!(pool.resident_count(), 0);
        assert!(pool.fetch(PageKey::new(file_id, 0)).is_err());
    }
}
