//! # Storage Layer
//!
//! The bottom of the engine: fixed-size pages in per-table files, cached in
//! a small pool of preallocated frames.
//!
//! ## Components
//!
//! - [`DiskFile`]: a memory-mapped file addressed in whole
//!   [`PAGE_SIZE`](crate::config::PAGE_SIZE) pages. Grows one page at a
//!   time; growing remaps, which is why mutation requires `&mut self`.
//! - [`BufferPool`]: a clock (second-chance) cache over a fixed set of
//!   frames. Pages are fetched by `(file_id, page_no)` key and returned as
//!   pinned [`PageGuard`]s; eviction writes dirty frames back to their file.
//!
//! ## Pinning Contract
//!
//! A frame must stay pinned while any code holds a view into its bytes.
//! [`PageGuard`] enforces this with RAII: fetching pins, dropping unpins,
//! and the typed page views in [`table`](crate::table) and
//! [`btree`](crate::btree) borrow the guard, so the borrow checker ties the
//! view's lifetime to the pin.
//!
//! ## Eviction
//!
//! The clock hand decrements each frame's reference counter (saturated at
//! [`MAX_FRAME_REFS`](crate::config::MAX_FRAME_REFS)) as it sweeps, so any
//! unpinned frame becomes a victim within a bounded number of revolutions.
//! Only pinning can starve eviction; a full sweep that sees nothing but
//! pinned frames fails the fetch instead of spinning forever. Callers are
//! expected to keep at least one frame unpinned; in practice the deepest
//! pin chain is a root-to-leaf B+tree descent plus a sibling or two.

mod disk;
mod pool;

pub use disk::DiskFile;
pub use pool::{BufferPool, PageGuard, PageKey};
