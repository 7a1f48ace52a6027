//! Engine-wide configuration constants.
//!
//! Import constants from this module rather than defining them locally; the
//! derivations between them are checked at compile time in [`constants`].

mod constants;

pub use constants::{
    DEFAULT_POOL_SIZE, INVALID_PAGE_INDEX, MAX_COLUMNS, MAX_FRAME_REFS, NULL_BITMAP_BYTES,
    PAGE_SIZE, ROW_PAGE_HEADER_WORDS, ROW_PAGE_WORD,
};
