use crate::config::IndexConfig;
use crate::error::{IndexError, IndexResult};
use crate::index::navigate::StructureIndex;
use crate::index::parent_map::ParentMap;
use crate::index::stats::IndexStats;
use crate::index::types::{OpenExtent, RecordIndex, ScopeKind};
use crate::record::{Record, RecordKind, RecordRef};
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// Scopes tracked with extents. Adding a structural scope means adding a
/// [`ScopeKind`] here; the tracking rule itself is shared.
const TRACKED_SCOPES: [ScopeKind; 2] = [ScopeKind::Wafer, ScopeKind::Part];

/// Extent tracking state for one scope kind
struct ScopeTracker {
    scope: ScopeKind,
    open: Option<OpenExtent>,
    /// At least one close marker has been seen for the open extent
    closing: bool,
    map: ParentMap,
}

impl ScopeTracker {
    fn new(scope: ScopeKind) -> Self {
        Self {
            scope,
            open: None,
            closing: false,
            map: ParentMap::new(scope),
        }
    }

    /// Seal a pending close run once a record of another kind arrives.
    /// The run ends at the previous record.
    fn before(&mut self, record: &Record, prev: Option<&RecordRef>) -> IndexResult<()> {
        if !self.closing || record.kind == self.scope.close_kind() {
            return Ok(());
        }
        let prev = prev.ok_or(IndexError::InvariantViolation(
            "close run pending with no preceding record",
        ))?;
        self.seal(prev.index, prev.offset, false)
    }

    fn observe(&mut self, record: &Record, stats: &mut IndexStats) {
        let kind = record.kind;
        if kind == self.scope.open_kind() {
            if self.open.is_none() {
                self.open = Some(OpenExtent::at(record));
            }
        } else if kind == self.scope.close_kind() {
            if self.open.is_some() {
                self.closing = true;
            } else {
                stats.orphan_closes += 1;
                warn!(
                    kind = %kind,
                    offset = record.offset,
                    index = record.index,
                    "close marker with no open scope"
                );
            }
        }
    }

    fn seal(&mut self, end_index: RecordIndex, end_offset: u64, truncated: bool) -> IndexResult<()> {
        let open = self.open.take().ok_or(IndexError::InvariantViolation(
            "sealed a scope with no open extent",
        ))?;
        self.map.push(open.seal(end_index, end_offset, truncated));
        self.closing = false;
        Ok(())
    }

    fn finish(
        &mut self,
        last: Option<&RecordRef>,
        config: &IndexConfig,
        stats: &mut IndexStats,
    ) -> IndexResult<()> {
        let Some(last) = last else {
            return Ok(());
        };
        if self.closing {
            return self.seal(last.index, last.offset, false);
        }
        if self.open.is_some() {
            stats.unterminated_scopes += 1;
            warn!(
                scope = ?self.scope,
                sealed = config.seal_unterminated_scopes,
                "scope still open at end of stream"
            );
            if config.seal_unterminated_scopes {
                return self.seal(last.index, last.offset, true);
            }
            self.open = None;
        }
        Ok(())
    }
}

/// Single forward pass over a record stream discovering wafer and part
/// extents and caching the lot markers and part-count records.
///
/// At most one extent per scope is open at a time. A close marker does not
/// seal its extent immediately: multi-site testers emit one close per
/// head/site back to back, so the extent is sealed at the first record that
/// is not a close of the same kind, ending at the record before it.
pub struct ExtentIndexBuilder {
    config: IndexConfig,
    records: Vec<RecordRef>,
    scopes: Vec<ScopeTracker>,
    lot_open: Option<RecordRef>,
    lot_close: Option<RecordRef>,
    part_counts: Vec<RecordRef>,
    stats: IndexStats,
}

impl ExtentIndexBuilder {
    pub fn new(config: IndexConfig) -> Self {
        Self {
            config,
            records: Vec::new(),
            scopes: TRACKED_SCOPES.into_iter().map(ScopeTracker::new).collect(),
            lot_open: None,
            lot_close: None,
            part_counts: Vec::new(),
            stats: IndexStats::default(),
        }
    }

    /// Index a whole stream in one pass
    pub fn build<I>(records: I, config: IndexConfig) -> IndexResult<StructureIndex>
    where
        I: IntoIterator<Item = Record>,
    {
        let mut builder = Self::new(config);
        debug!("building structural index");
        for record in records {
            builder.push(record)?;
        }
        builder.finish()
    }

    /// Feed the next record; its sequence index is assigned here
    pub fn push(&mut self, mut record: Record) -> IndexResult<RecordRef> {
        let prev = self.records.last();
        if let Some(prev) = prev
            && record.offset < prev.offset
        {
            return Err(IndexError::InvariantViolation(
                "record offsets must be non-decreasing",
            ));
        }
        record.index = self.records.len();

        for scope in &mut self.scopes {
            scope.before(&record, prev)?;
        }
        for scope in &mut self.scopes {
            scope.observe(&record, &mut self.stats);
        }

        let record = Rc::new(record);
        match record.kind {
            RecordKind::Mir if self.lot_open.is_none() => self.lot_open = Some(record.clone()),
            RecordKind::Mrr => self.lot_close = Some(record.clone()),
            RecordKind::Pcr => self.part_counts.push(record.clone()),
            _ => {}
        }

        self.stats.observe(record.kind);
        if self.config.progress_every > 0
            && self.stats.records as u64 % self.config.progress_every == 0
        {
            trace!(records = self.stats.records, "indexing progress");
        }

        self.records.push(record.clone());
        Ok(record)
    }

    pub fn finish(mut self) -> IndexResult<StructureIndex> {
        let last = self.records.last().cloned();
        for scope in &mut self.scopes {
            scope.finish(last.as_ref(), &self.config, &mut self.stats)?;
        }

        let mut wafers = ParentMap::new(ScopeKind::Wafer);
        let mut parts = ParentMap::new(ScopeKind::Part);
        for scope in self.scopes {
            match scope.scope {
                ScopeKind::Wafer => wafers = scope.map,
                ScopeKind::Part => parts = scope.map,
            }
        }

        self.stats.wafers = wafers.len();
        self.stats.parts = parts.len();
        self.stats.part_counts = self.part_counts.len();
        debug!(
            records = self.stats.records,
            wafers = self.stats.wafers,
            parts = self.stats.parts,
            part_counts = self.stats.part_counts,
            "structural index built"
        );

        Ok(StructureIndex {
            records: self.records,
            wafers,
            parts,
            lot_open: self.lot_open,
            lot_close: self.lot_close,
            part_counts: self.part_counts,
            stats: self.stats,
            config: self.config,
        })
    }
}
