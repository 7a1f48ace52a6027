//! # Paged File I/O
//!
//! [`DiskFile`] wraps one on-disk file as an array of
//! [`PAGE_SIZE`](crate::config::PAGE_SIZE) pages behind a writable memory
//! map. The file length is always a whole number of pages; there is no file
//! header; page 0 is ordinary page content.
//!
//! Reads and writes copy between the map and caller buffers (the buffer
//! pool owns the long-lived frames). Growing the file remaps it, so
//! [`DiskFile::allocate_page`] takes `&mut self` and the borrow checker
//! guarantees no stale slice can survive the remap.

use std::fs::{File, OpenOptions};
use std::path::Path;

use eyre::{ensure, Result, WrapErr};
use memmap2::MmapMut;

use crate::config::PAGE_SIZE;
use crate::types::PageIndex;

#[derive(Debug)]
pub struct DiskFile {
    file: File,
    mmap: MmapMut,
    page_count: u32,
}

impl DiskFile {
    /// Creates a new file of `initial_page_count` zeroed pages, truncating
    /// anything that was there before.
    pub fn create<P: AsRef<Path>>(path: P, initial_page_count: u32) -> Result<Self> {
        let path = path.as_ref();
        ensure!(initial_page_count > 0, "initial page count must be at least 1");

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .wrap_err_with(|| format!("failed to create file '{}'", path.display()))?;

        let file_size = initial_page_count as u64 * PAGE_SIZE as u64;
        file.set_len(file_size)
            .wrap_err_with(|| format!("failed to size '{}' to {} bytes", path.display(), file_size))?;

        // SAFETY: map_mut is unsafe because the file could be modified
        // externally. The file was just created with exclusive read+write
        // access, its size is a valid page multiple, and the map's lifetime
        // is tied to this DiskFile; all access is bounds-checked by page_no.
        let mmap = unsafe {
            MmapMut::map_mut(&file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
        };

        Ok(Self {
            file,
            mmap,
            page_count: initial_page_count,
        })
    }

    /// Opens an existing file. The length must be a positive multiple of the
    /// page size.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .wrap_err_with(|| format!("failed to open file '{}'", path.display()))?;

        let file_size = file
            .metadata()
            .wrap_err_with(|| format!("failed to stat '{}'", path.display()))?
            .len();

        ensure!(file_size > 0, "cannot open empty file '{}'", path.display());
        ensure!(
            file_size % PAGE_SIZE as u64 == 0,
            "file '{}' size {} is not a multiple of page size {}",
            path.display(),
            file_size,
            PAGE_SIZE
        );

        let page_count = (file_size / PAGE_SIZE as u64) as u32;

        // SAFETY: same contract as in `create`: exclusive access by
        // convention, page-multiple size verified above, lifetime tied to
        // this DiskFile.
        let mmap = unsafe {
            MmapMut::map_mut(&file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
        };

        Ok(Self {
            file,
            mmap,
            page_count,
        })
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    fn page_range(&self, page_no: PageIndex) -> Result<std::ops::Range<usize>> {
        ensure!(
            page_no < self.page_count,
            "page {} out of bounds (page_count={})",
            page_no,
            self.page_count
        );
        let start = page_no as usize * PAGE_SIZE;
        Ok(start..start + PAGE_SIZE)
    }

    /// Copies page `page_no` into `buf`.
    pub fn read_page(&self, page_no: PageIndex, buf: &mut [u8]) -> Result<()> {
        ensure!(buf.len() == PAGE_SIZE, "frame buffer has wrong size");
        let range = self.page_range(page_no)?;
        buf.copy_from_slice(&self.mmap[range]);
        Ok(())
    }

    /// Copies `buf` over page `page_no`.
    pub fn write_page(&mut self, page_no: PageIndex, buf: &[u8]) -> Result<()> {
        ensure!(buf.len() == PAGE_SIZE, "frame buffer has wrong size");
        let range = self.page_range(page_no)?;
        self.mmap[range].copy_from_slice(buf);
        Ok(())
    }

    /// Extends the file by one zeroed page and returns its index.
    pub fn allocate_page(&mut self) -> Result<PageIndex> {
        let new_index = self.page_count;
        let new_size = (self.page_count as u64 + 1) * PAGE_SIZE as u64;

        self.mmap
            .flush()
            .wrap_err("failed to flush map before growing")?;
        self.file
            .set_len(new_size)
            .wrap_err_with(|| format!("failed to grow file to {} bytes", new_size))?;

        // SAFETY: same contract as in `create`; the old map is dropped by
        // the assignment after the new one is in place.
        self.mmap = unsafe { MmapMut::map_mut(&self.file).wrap_err("failed to remap grown file")? };
        self.page_count += 1;

        Ok(new_index)
    }

    /// Flushes the map to durable storage.
    pub fn sync(&self) -> Result<()> {
        self.mmap.flush().wrap_err("failed to sync file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_write_read_roundtrip() {
        let dir = tempdir().unwrap();
        let mut file = DiskFile::create(dir.path().join("t"), 1).unwrap();

        let mut page = vec![0u8; PAGE_SIZE];
        page[0] = 0xAB;
        page[PAGE_SIZE - 1] = 0xCD;
        file.write_page(0, &page).unwrap();

        let mut out = vec![0u8; PAGE_SIZE];
        file.read_page(0, &mut out).unwrap();
        assert_eq!(out, page);
    }

    #[test]
    fn allocate_extends_by_whole_pages() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t");
        let mut file = DiskFile::create(&path, 1).unwrap();

        assert_eq!(file.allocate_page().unwrap(), 1);
        assert_eq!(file.allocate_page().unwrap(), 2);
        assert_eq!(file.page_count(), 3);

        let len = std::fs::metadata(&path).unwrap().len();
        assert_eq!(len, 3 * PAGE_SIZE as u64);
    }

    #[test]
    fn reopen_preserves_pages() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t");

        {
            let mut file = DiskFile::create(&path, 2).unwrap();
            let mut page = vec![0u8; PAGE_SIZE];
            page[7] = 7;
            file.write_page(1, &page).unwrap();
            file.sync().unwrap();
        }

        let file = DiskFile::open(&path).unwrap();
        assert_eq!(file.page_count(), 2);
        let mut out = vec![0u8; PAGE_SIZE];
        file.read_page(1, &mut out).unwrap();
        assert_eq!(out[7], 7);
    }

    #[test]
    fn out_of_bounds_page_is_an_error() {
        let dir = tempdir().unwrap();
        let file = DiskFile::create(dir.path().join("t"), 1).unwrap();
        let mut buf = vec![0u8; PAGE_SIZE];
        assert!(file.read_page(1, &mut buf).is_err());
    }

    #[test]
    fn open_rejects_ragged_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t");
        std::fs::write(&path, vec![0u8; PAGE_SIZE + 100]).unwrap();
        assert!(DiskFile::open(&path).is_err());
    }
}
