//! The built structural index and its index-backed navigation accessors.
//!
//! Every accessor here has a generic counterpart in
//! [`crate::query::scan`] that walks the whole record stream. On streams where
//! the open and close markers of a multi-site part group form contiguous runs,
//! both produce the same records in the same order.

use crate::config::IndexConfig;
use crate::error::{IndexError, IndexResult};
use crate::index::parent_map::ParentMap;
use crate::index::stats::IndexStats;
use crate::index::types::{Extent, RecordIndex};
use crate::record::{Record, RecordKind, RecordRef};

/// Result of one [`ExtentIndexBuilder`](crate::index::ExtentIndexBuilder) pass
#[derive(Debug)]
pub struct StructureIndex {
    pub(crate) records: Vec<RecordRef>,
    pub(crate) wafers: ParentMap,
    pub(crate) parts: ParentMap,
    pub(crate) lot_open: Option<RecordRef>,
    pub(crate) lot_close: Option<RecordRef>,
    pub(crate) part_counts: Vec<RecordRef>,
    pub(crate) stats: IndexStats,
    pub(crate) config: IndexConfig,
}

impl StructureIndex {
    /// Every record of the stream, in stream order
    pub fn records(&self) -> &[RecordRef] {
        &self.records
    }

    pub fn record(&self, index: RecordIndex) -> Option<&RecordRef> {
        self.records.get(index)
    }

    pub fn wafers(&self) -> &ParentMap {
        &self.wafers
    }

    pub fn parts(&self) -> &ParentMap {
        &self.parts
    }

    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn lot_open(&self) -> Option<&RecordRef> {
        self.lot_open.as_ref()
    }

    pub fn lot_close(&self) -> Option<&RecordRef> {
        self.lot_close.as_ref()
    }

    /// All PCR records, in stream order
    pub fn part_counts(&self) -> &[RecordRef] {
        &self.part_counts
    }

    pub fn part_counts_for(&self, head: u8, site: u8) -> Vec<RecordRef> {
        self.part_counts
            .iter()
            .filter(|r| r.matches_site((head, site)))
            .cloned()
            .collect()
    }

    /// PCRs carrying the all-sites summary head
    pub fn summary_part_counts(&self) -> Vec<RecordRef> {
        let summary = self.config.summary_head;
        self.part_counts
            .iter()
            .filter(|r| r.head() == Some(summary))
            .cloned()
            .collect()
    }

    /// Part extents nested in a wafer extent
    pub fn parts_in_wafer<'a>(&'a self, wafer: &Extent) -> impl Iterator<Item = &'a Extent> + 'a {
        self.parts.extents_within(wafer)
    }

    /// Records of a PIR's part: everything after it on the same head/site,
    /// up to the start of the close run
    pub fn part_open_children(&self, pir: &Record) -> IndexResult<Vec<RecordRef>> {
        let extent = self.owning_part(pir)?;
        let pos = self.position_in(pir, extent);
        Ok(self.records[pos + 1..=extent.end_index]
            .iter()
            .take_while(|r| r.kind != RecordKind::Prr)
            .filter(|r| r.kind != RecordKind::Pir && same_site(r, pir))
            .cloned()
            .collect())
    }

    /// Records of a PRR's part: everything between the open run and the
    /// close run on the same head/site
    pub fn part_close_children(&self, prr: &Record) -> IndexResult<Vec<RecordRef>> {
        let extent = self.owning_part(prr)?;
        Ok(self
            .window(extent)
            .iter()
            .skip_while(|r| r.kind == RecordKind::Pir)
            .take_while(|r| r.kind != RecordKind::Prr)
            .filter(|r| r.kind != RecordKind::Pir && same_site(r, prr))
            .cloned()
            .collect())
    }

    pub fn matching_part_close(&self, pir: &Record) -> Option<RecordRef> {
        let extent = self.locate(&self.parts, pir)?;
        self.close_run(extent, RecordKind::Prr)
            .iter()
            .find(|r| same_site(r, pir))
            .cloned()
    }

    pub fn matching_part_open(&self, prr: &Record) -> Option<RecordRef> {
        let extent = self.locate(&self.parts, prr)?;
        self.open_run(extent, RecordKind::Pir)
            .iter()
            .find(|r| same_site(r, prr))
            .cloned()
    }

    /// The WIR opening the wafer that contains `record`
    pub fn wafer_open(&self, record: &Record) -> Option<RecordRef> {
        let extent = self.locate(&self.wafers, record)?;
        self.records
            .get(extent.start_index)
            .filter(|r| r.kind == RecordKind::Wir)
            .cloned()
    }

    /// The WRR closing the wafer that contains `record`
    pub fn wafer_close(&self, record: &Record) -> Option<RecordRef> {
        let extent = self.locate(&self.wafers, record)?;
        self.records
            .get(extent.end_index)
            .filter(|r| r.kind == RecordKind::Wrr)
            .cloned()
    }

    /// Every PIR in the stream, taken from the open run of each part extent
    pub fn all_part_opens(&self) -> Vec<RecordRef> {
        self.parts
            .all_extents()
            .iter()
            .flat_map(|e| self.open_run(e, RecordKind::Pir))
            .cloned()
            .collect()
    }

    /// Every PRR in the stream, taken from the close run of each part extent
    pub fn all_part_closes(&self) -> Vec<RecordRef> {
        self.parts
            .all_extents()
            .iter()
            .flat_map(|e| self.close_run(e, RecordKind::Prr))
            .cloned()
            .collect()
    }

    fn owning_part(&self, record: &Record) -> IndexResult<&Extent> {
        self.locate(&self.parts, record)
            .ok_or(IndexError::MissingExtent {
                kind: record.kind,
                offset: record.offset,
            })
    }

    fn window(&self, extent: &Extent) -> &[RecordRef] {
        &self.records[extent.start_index..=extent.end_index]
    }

    /// Leading records of the extent with the given kind
    fn open_run(&self, extent: &Extent, kind: RecordKind) -> &[RecordRef] {
        let window = self.window(extent);
        let len = window.iter().take_while(|r| r.kind == kind).count();
        &window[..len]
    }

    /// Trailing records of the extent with the given kind, in stream order
    fn close_run(&self, extent: &Extent, kind: RecordKind) -> &[RecordRef] {
        let window = self.window(extent);
        let len = window.iter().rev().take_while(|r| r.kind == kind).count();
        &window[window.len() - len..]
    }

    /// Whether `record` is this stream's record at its own sequence index
    fn is_indexed(&self, record: &Record) -> bool {
        self.records
            .get(record.index)
            .is_some_and(|r| r.offset == record.offset && r.kind == record.kind)
    }

    /// The extent of `map` holding `record`. Records of this stream are found
    /// by sequence index since offsets may tie; others fall back to offset.
    fn locate<'a>(&self, map: &'a ParentMap, record: &Record) -> Option<&'a Extent> {
        if self.is_indexed(record) {
            map.extent_at_index(record.index)
        } else {
            map.extent_containing(record)
        }
    }

    /// Stream position of a record inside an extent. Trusts the record's own
    /// index when it is this stream's record, otherwise searches by offset.
    fn position_in(&self, record: &Record, extent: &Extent) -> RecordIndex {
        if extent.contains_index(record.index) && self.is_indexed(record) {
            return record.index;
        }
        let window = self.window(extent);
        extent.start_index + window.partition_point(|r| r.offset < record.offset)
    }
}

fn same_site(a: &Record, b: &Record) -> bool {
    a.head_site() == b.head_site()
}
