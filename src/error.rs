//! Error types

use crate::record::RecordKind;
use thiserror::Error;

/// Faults raised while building or consulting the structural index
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// A builder invariant was broken; indicates a defect, never bad data
    #[error("invariant violation: {0}")]
    InvariantViolation(&'static str),

    /// The index build was re-entered while already in progress
    #[error("index build re-entered while a build is in progress")]
    Reentrancy,

    /// A previous build failed; the strategy instance must be discarded
    #[error("indexing strategy is unusable after a failed build")]
    Poisoned,

    /// An index-backed accessor found no owning extent for a record that must have one
    #[error("no {kind} extent owns the record at offset {offset}")]
    MissingExtent { kind: RecordKind, offset: u64 },
}

/// Query evaluation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("unbound lambda parameter: {0}")]
    UnboundParameter(String),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("{op} expects {expected} argument(s), got {found}")]
    Arity {
        op: &'static str,
        expected: usize,
        found: usize,
    },

    /// An index-backed node was evaluated without an index-providing strategy
    #[error("index-backed {0} evaluated without a structural index")]
    MissingIndex(&'static str),
}

pub type IndexResult<T> = std::result::Result<T, IndexError>;
pub type QueryResult<T> = std::result::Result<T, QueryError>;
