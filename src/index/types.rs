use crate::record::{Record, RecordKind};
use serde::{Deserialize, Serialize};

/// Position of a record in the enumerated stream
pub type RecordIndex = usize;

/// Structural scopes tracked with extents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeKind {
    Wafer,
    Part,
}

impl ScopeKind {
    pub fn open_kind(self) -> RecordKind {
        match self {
            ScopeKind::Wafer => RecordKind::Wir,
            ScopeKind::Part => RecordKind::Pir,
        }
    }

    pub fn close_kind(self) -> RecordKind {
        match self {
            ScopeKind::Wafer => RecordKind::Wrr,
            ScopeKind::Part => RecordKind::Prr,
        }
    }
}

/// One instance of a structural scope, bounds inclusive.
///
/// The start is the scope's first open marker; the end is the last record of
/// its close run (or the last record of the stream for a truncated scope).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent {
    pub start_index: RecordIndex,
    pub end_index: RecordIndex,
    pub start_offset: u64,
    pub end_offset: u64,
    /// Sealed by end of stream rather than by a close marker
    #[serde(default)]
    pub truncated: bool,
}

impl Extent {
    pub fn contains_index(&self, index: RecordIndex) -> bool {
        self.start_index <= index && index <= self.end_index
    }

    pub fn contains_offset(&self, offset: u64) -> bool {
        self.start_offset <= offset && offset <= self.end_offset
    }

    /// Whether `self` lies entirely inside `outer` in index space
    pub fn is_within(&self, outer: &Extent) -> bool {
        outer.start_index <= self.start_index && self.end_index <= outer.end_index
    }

    pub fn len(&self) -> usize {
        self.end_index - self.start_index + 1
    }

    /// Always false: an extent holds at least its opening record
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// An extent under construction
#[derive(Debug, Clone, Copy)]
pub(crate) struct OpenExtent {
    pub start_index: RecordIndex,
    pub start_offset: u64,
}

impl OpenExtent {
    pub fn at(record: &Record) -> Self {
        Self {
            start_index: record.index,
            start_offset: record.offset,
        }
    }

    pub fn seal(self, end_index: RecordIndex, end_offset: u64, truncated: bool) -> Extent {
        Extent {
            start_index: self.start_index,
            end_index,
            start_offset: self.start_offset,
            end_offset,
            truncated,
        }
    }
}
