//! # Shale - Educational On-Disk Relational Engine
//!
//! Shale is a small relational storage-and-query engine built for studying
//! how databases work from the page up. It accepts a compact SQL-like query
//! language, persists rows to fixed-size pages on disk, evaluates queries
//! through a composable pull-based operator pipeline, and accelerates point
//! and range lookups with a B+tree secondary index.
//!
//! ## Quick Start
//!
//! ```ignore
//! use shale::Database;
//!
//! let mut db = Database::open("./mydb", 64)?;
//!
//! db.execute("CREATE TABLE users (id int64, name string)")?;
//! db.execute("INSERT INTO users VALUES (1, \"alice\")")?;
//!
//! let rows = db.execute("SELECT name FROM users WHERE id = 1")?;
//! ```
//!
//! ## Architecture
//!
//! Shale uses a layered architecture, leaves first:
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │        Public API (Database)        │
//! ├─────────────────────────────────────┤
//! │   SQL Layer (Parser / Interpreter)  │
//! ├─────────────────────────────────────┤
//! │  Catalog  │  Volcano Executor Tree  │
//! ├───────────┼─────────────────────────┤
//! │  B+Tree Index  │  Slotted Row Pages │
//! ├─────────────────────────────────────┤
//! │      Record Serialization Layer     │
//! ├─────────────────────────────────────┤
//! │  Clock Buffer Pool (pinned frames)  │
//! ├─────────────────────────────────────┤
//! │    Memory-Mapped Paged File I/O     │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## File Layout
//!
//! One file per table, named exactly after the table, plus a sibling schema
//! table holding the column definitions as ordinary rows:
//!
//! ```text
//! database_dir/
//! ├── users            # slotted row pages
//! ├── users_schema     # (id, name, type, length) rows
//! └── users_by_id      # B+tree index file (page 0 = metadata)
//! ```
//!
//! Every file is a whole number of [`config::PAGE_SIZE`] pages with no file
//! header; page 0 of a table file is an ordinary row page, page 0 of an
//! index file is the B+tree metadata page.
//!
//! ## Module Overview
//!
//! - [`storage`]: memory-mapped paged files and the clock buffer pool
//! - [`records`]: row serialization with a null bitmap and out-of-line strings
//! - [`table`]: slotted row pages, tables addressed by `(page, slot)`, scans
//! - [`btree`]: disk-resident B+tree index with sibling-borrow splits
//! - [`sql`]: lexer, parser, expressions, aggregates, executor, interpreter
//! - [`catalog`]: per-table schemas persisted as rows of a meta-table
//! - [`database`]: the facade tying storage, catalog and SQL together
//! - [`cli`]: interactive REPL
//!
//! ## Scope
//!
//! Shale is deliberately small: single-threaded, no transactions, no WAL, no
//! crash recovery, no query optimizer. The interesting parts are the binary
//! page layouts, the eviction-safe frame pinning, the invariant-heavy B+tree
//! mutations, and the streaming operator composition.

pub mod btree;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod records;
pub mod sql;
pub mod storage;
pub mod table;
pub mod types;

pub use database::Database;
pub use error::{Error, ErrorKind};
pub use sql::RowSet;
pub use types::{ColumnSchema, Row, RowId, Schema, Type, Value};
