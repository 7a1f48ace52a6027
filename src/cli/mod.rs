//! Interactive command-line interface: a line-per-statement REPL and a
//! column-aligned result formatter.

pub mod repl;
pub mod table;

pub use repl::Repl;
pub use table::format_row_set;
