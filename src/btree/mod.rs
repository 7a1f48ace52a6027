//! # B+Tree Index
//!
//! A disk-resident ordered map from fixed-width keys to row ids, layered on
//! the buffer pool. An index is one paged file:
//!
//! ```text
//! page 0:  metadata (root page index, key size, page capacity)
//! page 1:  the initial leaf
//! page 2+: leaves and internal nodes, allocated on demand
//! ```
//!
//! Keys are rows of a declared key schema containing only fixed-width
//! column types; their marshalled form is `key_size_in_bytes` wide, which
//! is what makes every in-page search a plain binary search over equal
//! slots.
//!
//! ## Invariants
//!
//! - keys in any leaf are strictly increasing, and only unique keys are
//!   supported;
//! - in an internal page, child `i` holds only keys below separator
//!   `i + 1`; separator 0 is a sentinel that is never compared;
//! - every root-to-leaf path has the same length;
//! - leaves form a doubly-linked list in ascending key order;
//! - non-root pages hold at least one entry; splits fire exactly at
//!   `max_page_size`;
//! - the metadata page lives at page 0 and is validated on every reopen.
//!
//! See [`tree`] for the insert/remove protocols (sibling borrow, split
//! propagation, separator patching) and the predicate-driven range scans.

mod interior;
mod leaf;
mod page;
mod tree;

pub use interior::{InternalPageMut, InternalPageRef, INTERNAL_HEADER_SIZE};
pub use leaf::{LeafPageMut, LeafPageRef, LeafSearch, LEAF_HEADER_SIZE};
pub use page::{
    default_max_page_size, internal_capacity, leaf_capacity, page_type_of, BTreePageType,
    MetadataHeader, METADATA_PAGE_INDEX,
};
pub use tree::{BTree, BTreeRangeIter};

use crate::types::Value;

/// Comparison operators usable in index range scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexComparator {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

/// One predicate of a range scan: `column <op> value`, resolved against the
/// index's key schema. A scan's predicates combine with logical AND.
#[derive(Debug, Clone)]
pub struct KeyCondition {
    pub column: String,
    pub comparator: IndexComparator,
    pub value: Value,
}

impl KeyCondition {
    pub fn new(column: impl Into<String>, comparator: IndexComparator, value: Value) -> Self {
        Self {
            column: column.into(),
            comparator,
            value,
        }
    }
}
