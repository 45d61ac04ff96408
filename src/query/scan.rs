//! Generic navigation over the full record stream.
//!
//! These are the unoptimized semantics of every navigation [`Operation`]:
//! each call walks the stream from scratch and needs no structural index.
//!
//! [`Operation`]: crate::query::plan::Operation

use crate::record::{Record, RecordKind, RecordRef};

fn same_site(a: &Record, b: &Record) -> bool {
    a.head_site() == b.head_site()
}

fn of_kind(records: &[RecordRef], kind: RecordKind) -> impl Iterator<Item = &RecordRef> {
    records.iter().filter(move |r| r.kind == kind)
}

/// Stream position of `record`; trusts its sequence index when it agrees
/// with the stream, otherwise searches by offset
fn position(records: &[RecordRef], record: &Record) -> Option<usize> {
    if let Some(r) = records.get(record.index)
        && r.offset == record.offset
        && r.kind == record.kind
    {
        return Some(record.index);
    }
    let start = records.partition_point(|r| r.offset < record.offset);
    records[start..]
        .iter()
        .take_while(|r| r.offset == record.offset)
        .position(|r| r.kind == record.kind)
        .map(|i| start + i)
}

pub fn lot_open(records: &[RecordRef]) -> Option<RecordRef> {
    of_kind(records, RecordKind::Mir).next().cloned()
}

pub fn lot_close(records: &[RecordRef]) -> Option<RecordRef> {
    of_kind(records, RecordKind::Mrr).last().cloned()
}

pub fn records_of_kind(records: &[RecordRef], kind: RecordKind) -> Vec<RecordRef> {
    of_kind(records, kind).cloned().collect()
}

pub fn part_counts_for(records: &[RecordRef], head: u8, site: u8) -> Vec<RecordRef> {
    of_kind(records, RecordKind::Pcr)
        .filter(|r| r.matches_site((head, site)))
        .cloned()
        .collect()
}

pub fn summary_part_counts(records: &[RecordRef], summary_head: u8) -> Vec<RecordRef> {
    of_kind(records, RecordKind::Pcr)
        .filter(|r| r.head() == Some(summary_head))
        .cloned()
        .collect()
}

/// Records scoped under a structural marker.
///
/// For a PIR or PRR: the records of the same head/site between the part's
/// PIR and its PRR, markers excluded. For a WIR or WRR: every record strictly
/// between the wafer's WIR and its WRR. Other kinds have no children.
pub fn children(records: &[RecordRef], marker: &Record) -> Vec<RecordRef> {
    match marker.kind {
        RecordKind::Pir | RecordKind::Prr => part_children(records, marker),
        RecordKind::Wir | RecordKind::Wrr => wafer_children(records, marker),
        _ => Vec::new(),
    }
}

fn part_children(records: &[RecordRef], marker: &Record) -> Vec<RecordRef> {
    let Some(pos) = position(records, marker) else {
        return Vec::new();
    };
    let open = if marker.kind == RecordKind::Pir {
        Some(pos)
    } else {
        records[..pos]
            .iter()
            .rposition(|r| r.kind == RecordKind::Pir && same_site(r, marker))
    };
    let Some(open) = open else {
        return Vec::new();
    };

    records[open + 1..]
        .iter()
        .take_while(|r| !(r.kind == RecordKind::Prr && same_site(r, marker)))
        .filter(|r| !matches!(r.kind, RecordKind::Pir | RecordKind::Prr))
        .filter(|r| same_site(r, marker))
        .cloned()
        .collect()
}

fn wafer_children(records: &[RecordRef], marker: &Record) -> Vec<RecordRef> {
    let Some(pos) = position(records, marker) else {
        return Vec::new();
    };
    let open = if marker.kind == RecordKind::Wir {
        Some(pos)
    } else {
        records[..pos].iter().rposition(|r| r.kind == RecordKind::Wir)
    };
    let Some(open) = open else {
        return Vec::new();
    };

    records[open + 1..]
        .iter()
        .skip_while(|r| r.kind == RecordKind::Wir)
        .take_while(|r| r.kind != RecordKind::Wrr)
        .cloned()
        .collect()
}

/// The PRR closing a PIR's part; none if another PIR on the same site
/// comes first
pub fn matching_part_close(records: &[RecordRef], pir: &Record) -> Option<RecordRef> {
    let pos = position(records, pir)?;
    records[pos + 1..]
        .iter()
        .filter(|r| same_site(r, pir))
        .find(|r| matches!(r.kind, RecordKind::Pir | RecordKind::Prr))
        .filter(|r| r.kind == RecordKind::Prr)
        .cloned()
}

/// The PIR opening a PRR's part; none if another PRR on the same site
/// comes first walking backward
pub fn matching_part_open(records: &[RecordRef], prr: &Record) -> Option<RecordRef> {
    let pos = position(records, prr)?;
    records[..pos]
        .iter()
        .rev()
        .filter(|r| same_site(r, prr))
        .find(|r| matches!(r.kind, RecordKind::Pir | RecordKind::Prr))
        .filter(|r| r.kind == RecordKind::Pir)
        .cloned()
}

/// Position of the WIR opening the wafer around `pos`.
///
/// Walks backward; a WRR that is not part of a close run reaching `pos`
/// means the wafer was already closed.
fn wafer_open_position(records: &[RecordRef], pos: usize) -> Option<usize> {
    let mut in_close_run = true;
    for i in (0..=pos).rev() {
        match records[i].kind {
            RecordKind::Wir => {
                // First WIR of a multi-head open run
                let run = records[..i]
                    .iter()
                    .rev()
                    .take_while(|r| r.kind == RecordKind::Wir)
                    .count();
                return Some(i - run);
            }
            RecordKind::Wrr if !in_close_run => return None,
            RecordKind::Wrr => {}
            _ => in_close_run = false,
        }
    }
    None
}

pub fn wafer_open(records: &[RecordRef], record: &Record) -> Option<RecordRef> {
    let pos = position(records, record)?;
    wafer_open_position(records, pos).map(|i| records[i].clone())
}

/// The last WRR of the close run ending the wafer around `record`
pub fn wafer_close(records: &[RecordRef], record: &Record) -> Option<RecordRef> {
    let pos = position(records, record)?;
    wafer_open_position(records, pos)?;
    let first = pos + records[pos..]
        .iter()
        .position(|r| r.kind == RecordKind::Wrr)?;
    let run = records[first..]
        .iter()
        .take_while(|r| r.kind == RecordKind::Wrr)
        .count();
    records.get(first + run - 1).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn stream(records: Vec<Record>) -> Vec<RecordRef> {
        records
            .into_iter()
            .enumerate()
            .map(|(i, r)| {
                let mut r = r.with_index(i);
                r.offset = i as u64 * 4;
                Rc::new(r)
            })
            .collect()
    }

    fn part(kind: RecordKind, head: u8, site: u8) -> Record {
        Record::new(kind, 0).with_head_site(head, site)
    }

    fn indices(records: &[RecordRef]) -> Vec<usize> {
        records.iter().map(|r| r.index).collect()
    }

    fn wafer_stream() -> Vec<RecordRef> {
        stream(vec![
            Record::new(RecordKind::Mir, 0),
            Record::new(RecordKind::Wir, 0),
            part(RecordKind::Pir, 1, 1),
            part(RecordKind::Prr, 1, 1),
            part(RecordKind::Pir, 1, 2),
            part(RecordKind::Prr, 1, 2),
            Record::new(RecordKind::Wrr, 0),
            part(RecordKind::Pcr, 255, 255),
        ])
    }

    #[test]
    fn test_wafer_children() {
        let records = wafer_stream();
        assert_eq!(indices(&children(&records, &records[6])), vec![2, 3, 4, 5]);
        assert_eq!(indices(&children(&records, &records[1])), vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_part_children_excludes_markers_and_other_sites() {
        let records = stream(vec![
            part(RecordKind::Pir, 1, 1),
            part(RecordKind::Pir, 1, 2),
            part(RecordKind::Ptr, 1, 2),
            part(RecordKind::Ptr, 1, 1),
            Record::new(RecordKind::Dtr, 0),
            part(RecordKind::Prr, 1, 2),
            part(RecordKind::Prr, 1, 1),
        ]);
        assert_eq!(indices(&children(&records, &records[0])), vec![3]);
        assert_eq!(indices(&children(&records, &records[5])), vec![2]);
        assert!(children(&records, &records[4]).is_empty());
    }

    #[test]
    fn test_wafer_markers() {
        let records = wafer_stream();
        assert_eq!(wafer_open(&records, &records[3]).map(|r| r.index), Some(1));
        assert_eq!(wafer_close(&records, &records[3]).map(|r| r.index), Some(6));
        assert_eq!(wafer_open(&records, &records[6]).map(|r| r.index), Some(1));
        assert!(wafer_open(&records, &records[7]).is_none());
        assert!(wafer_close(&records, &records[0]).is_none());
    }

    #[test]
    fn test_wafer_close_run() {
        let records = stream(vec![
            Record::new(RecordKind::Wir, 0),
            Record::new(RecordKind::Wir, 0),
            part(RecordKind::Ptr, 1, 1),
            Record::new(RecordKind::Wrr, 0),
            Record::new(RecordKind::Wrr, 0),
            Record::new(RecordKind::Dtr, 0),
        ]);
        assert_eq!(wafer_open(&records, &records[2]).map(|r| r.index), Some(0));
        assert_eq!(wafer_close(&records, &records[2]).map(|r| r.index), Some(4));
        assert_eq!(wafer_open(&records, &records[4]).map(|r| r.index), Some(0));
        assert!(wafer_open(&records, &records[5]).is_none());
    }

    #[test]
    fn test_matching_markers() {
        let records = wafer_stream();
        assert_eq!(
            matching_part_close(&records, &records[4]).map(|r| r.index),
            Some(5)
        );
        assert_eq!(
            matching_part_open(&records, &records[3]).map(|r| r.index),
            Some(2)
        );
    }

    #[test]
    fn test_matching_close_stops_at_next_open() {
        let records = stream(vec![
            part(RecordKind::Pir, 1, 1),
            part(RecordKind::Pir, 1, 1),
            part(RecordKind::Prr, 1, 1),
        ]);
        assert!(matching_part_close(&records, &records[0]).is_none());
        assert_eq!(
            matching_part_close(&records, &records[1]).map(|r| r.index),
            Some(2)
        );
    }

    #[test]
    fn test_lot_markers_and_counts() {
        let records = wafer_stream();
        assert_eq!(lot_open(&records).map(|r| r.index), Some(0));
        assert!(lot_close(&records).is_none());
        assert_eq!(indices(&summary_part_counts(&records, 255)), vec![7]);
        assert!(part_counts_for(&records, 1, 1).is_empty());
        assert_eq!(indices(&records_of_kind(&records, RecordKind::Pir)), vec![2, 4]);
    }

    #[test]
    fn test_position_by_offset_when_index_is_stale() {
        let records = wafer_stream();
        let stale = (*records[4]).clone().with_index(0);
        assert_eq!(position(&records, &stale), Some(4));
    }
}
