//! # Configuration Constants
//!
//! This module centralizes the engine's layout constants and documents how
//! they depend on each other. Constants that must agree are co-located and
//! guarded by compile-time assertions so a careless edit fails the build
//! rather than corrupting files.
//!
//! ```text
//! PAGE_SIZE (8192 bytes)
//!       │
//!       ├─> ROW_PAGE_WORD (8): slotted-page header granularity
//!       │     row_count, used_space and every (length, offset) slot pair
//!       │     are one word each
//!       │
//!       └─> B+tree page capacities (derived in btree::page from key size)
//!
//! MAX_COLUMNS (63)
//!       │
//!       └─> NULL_BITMAP_BYTES (8): one bit per column, the last bit is
//!           reserved so the bitmap itself always fits one word
//!
//! MAX_FRAME_REFS (5)
//!       └─> clock counter saturation; bounds eviction to a handful of
//!           hand revolutions
//! ```

/// Size of every disk page in bytes. The unit of I/O, caching and pinning.
/// File lengths are always a multiple of this.
pub const PAGE_SIZE: usize = 8192;

/// Sentinel page index meaning "no page" (end of leaf chains, empty roots).
pub const INVALID_PAGE_INDEX: u32 = u32::MAX;

/// Number of frames a buffer pool preallocates when none is specified.
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Saturation value for the per-frame clock reference counter. A frame
/// survives at most this many hand passes without being re-referenced.
pub const MAX_FRAME_REFS: u8 = 5;

/// Maximum columns per schema: one null bit per column in a 64-bit bitmap,
/// with one bit held back for the bitmap word itself.
pub const MAX_COLUMNS: usize = 63;

/// Width of the row-page null bitmap prefix in bytes.
pub const NULL_BITMAP_BYTES: usize = 8;

/// Granularity of the slotted row-page header: row count, used-space counter
/// and slot directory entries are all stored as 8-byte words.
pub const ROW_PAGE_WORD: usize = 8;

/// Header words before the slot directory of a row page (row_count and
/// used_space).
pub const ROW_PAGE_HEADER_WORDS: usize = 2;

const _: () = assert!(
    PAGE_SIZE % ROW_PAGE_WORD == 0,
    "PAGE_SIZE must be word-aligned for the slotted page header"
);

const _: () = assert!(
    MAX_COLUMNS < NULL_BITMAP_BYTES * 8,
    "null bitmap must have a spare bit beyond MAX_COLUMNS"
);

const _: () = assert!(
    MAX_FRAME_REFS > 0,
    "a zero ref cap would evict pages the moment they are fetched"
);
