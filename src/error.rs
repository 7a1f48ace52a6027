//! # Error Kinds
//!
//! Every failure in the engine belongs to one of a small number of kinds.
//! Propagation uses [`eyre::Result`] throughout (so call sites compose with
//! `?`, `ensure!` and `bail!`), while the typed [`Error`] here lets callers
//! that care (chiefly tests and the REPL) classify what went wrong by
//! downcasting the report.
//!
//! Every kind is fatal to the current statement only: the REPL prints the
//! message and keeps reading. There is no partial rollback.

use thiserror::Error;

/// Classification of engine failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The lexer or parser rejected the statement.
    Parse,
    /// A row, column or table does not match the catalog: wrong column
    /// count or types on insert, dropping a missing table, unknown column.
    SchemaMismatch,
    /// A B+tree file was reopened with a key size or page capacity that
    /// disagrees with its metadata page.
    IndexInvariant,
    /// An expression applied an operator to an incompatible value variant,
    /// overflowed, or divided by zero.
    Type,
    /// A B+tree leaf rejected a key that already exists.
    DuplicateKey,
    /// The operation is recognized but not implemented.
    Unsupported,
    /// Every buffer frame is pinned; nothing can be evicted.
    BufferPoolExhausted,
}

/// A typed engine error. Wrapped in an [`eyre::Report`] at API boundaries.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> eyre::Report {
        Self::new(ErrorKind::Parse, message).into()
    }

    pub fn schema_mismatch(message: impl Into<String>) -> eyre::Report {
        Self::new(ErrorKind::SchemaMismatch, message).into()
    }

    pub fn index_invariant(message: impl Into<String>) -> eyre::Report {
        Self::new(ErrorKind::IndexInvariant, message).into()
    }

    pub fn type_error(message: impl Into<String>) -> eyre::Report {
        Self::new(ErrorKind::Type, message).into()
    }

    pub fn duplicate_key(message: impl Into<String>) -> eyre::Report {
        Self::new(ErrorKind::DuplicateKey, message).into()
    }

    pub fn unsupported(message: impl Into<String>) -> eyre::Report {
        Self::new(ErrorKind::Unsupported, message).into()
    }

    pub fn pool_exhausted(message: impl Into<String>) -> eyre::Report {
        Self::new(ErrorKind::BufferPoolExhausted, message).into()
    }
}

/// Returns the [`ErrorKind`] of a report if it carries a typed [`Error`].
pub fn kind_of(report: &eyre::Report) -> Option<ErrorKind> {
    report.downcast_ref::<Error>().map(|e| e.kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_errors_survive_eyre_roundtrip() {
        let report = Error::duplicate_key("key (1) already exists");
        assert_eq!(kind_of(&report), Some(ErrorKind::DuplicateKey));
        assert!(report.to_string().contains("already exists"));
    }

    #[test]
    fn untyped_reports_have_no_kind() {
        let report = eyre::eyre!("plain error");
        assert_eq!(kind_of(&report), None);
    }
}
