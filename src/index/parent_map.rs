use crate::index::types::{Extent, RecordIndex, ScopeKind};
use crate::record::Record;

/// Extents of one scope kind, in discovery order.
///
/// Extents are appended during a single sequential pass, so they never
/// overlap and both start index and start offset are non-decreasing. All
/// lookups rely on that ordering for binary search.
#[derive(Debug, Clone)]
pub struct ParentMap {
    scope: ScopeKind,
    extents: Vec<Extent>,
}

impl ParentMap {
    pub fn new(scope: ScopeKind) -> Self {
        Self {
            scope,
            extents: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, extent: Extent) {
        debug_assert!(
            self.extents
                .last()
                .is_none_or(|last| last.end_index < extent.start_index),
            "extents must be appended in order without overlap"
        );
        self.extents.push(extent);
    }

    pub fn scope(&self) -> ScopeKind {
        self.scope
    }

    pub fn len(&self) -> usize {
        self.extents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extents.is_empty()
    }

    pub fn all_extents(&self) -> &[Extent] {
        &self.extents
    }

    /// The extent whose offset range contains the record, if any
    pub fn extent_containing(&self, record: &Record) -> Option<&Extent> {
        self.extent_at_offset(record.offset)
    }

    pub fn extent_at_offset(&self, offset: u64) -> Option<&Extent> {
        // Last extent starting at or before the offset
        let pos = self.extents.partition_point(|e| e.start_offset <= offset);
        let candidate = self.extents.get(pos.checked_sub(1)?)?;
        (candidate.end_offset >= offset).then_some(candidate)
    }

    /// The extent covering a stream position. Unlike the offset lookup this
    /// stays exact when several records share one offset.
    pub fn extent_at_index(&self, index: RecordIndex) -> Option<&Extent> {
        let pos = self.extents.partition_point(|e| e.start_index <= index);
        let candidate = self.extents.get(pos.checked_sub(1)?)?;
        candidate.contains_index(index).then_some(candidate)
    }

    /// Extents nested inside `outer` in index space, in discovery order
    pub fn extents_within<'a>(&'a self, outer: &Extent) -> impl Iterator<Item = &'a Extent> + 'a {
        let outer = *outer;
        let first = self
            .extents
            .partition_point(|e| e.start_index < outer.start_index);
        self.extents[first..]
            .iter()
            .take_while(move |e| e.start_index <= outer.end_index)
            .filter(move |e| e.is_within(&outer))
    }
}
