//! Synthetic STDF record streams shared by the integration tests.

#![allow(dead_code)]

use std::cell::Cell;
use stdfi::query::{Operation, PlanNode};
use stdfi::record::{Record, RecordKind, RecordSource, fields};

/// Assign increasing byte offsets in stream order
pub fn with_offsets(records: Vec<Record>) -> Vec<Record> {
    let mut offset = 0u64;
    records
        .into_iter()
        .map(|mut record| {
            record.offset = offset;
            offset += 4 + 2 * record.fields.len() as u64;
            record
        })
        .collect()
}

pub fn rec(kind: RecordKind) -> Record {
    Record::new(kind, 0)
}

pub fn at_site(kind: RecordKind, head: u8, site: u8) -> Record {
    Record::new(kind, 0).with_head_site(head, site)
}

/// MIR, WIR, two single-site parts, WRR
pub fn seven_records() -> Vec<Record> {
    with_offsets(vec![
        rec(RecordKind::Mir).with_field(fields::LOT_ID, "LOT7"),
        rec(RecordKind::Wir).with_field(fields::WAFER_ID, "W01"),
        at_site(RecordKind::Pir, 1, 1),
        at_site(RecordKind::Prr, 1, 1).with_field(fields::HARD_BIN, 1u32),
        at_site(RecordKind::Pir, 1, 1),
        at_site(RecordKind::Prr, 1, 1).with_field(fields::HARD_BIN, 2u32),
        rec(RecordKind::Wrr),
    ])
}

/// Shape of a multi-site lot
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub heads: u8,
    pub sites: u8,
    pub groups: usize,
    pub tests_per_part: usize,
}

impl Layout {
    pub fn sites(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        (1..=self.heads).flat_map(move |h| (1..=self.sites).map(move |s| (h, s)))
    }
}

/// A lot tested on several heads and sites at once.
///
/// Each part group opens one PIR per head/site, interleaves the parametric
/// tests of every site, then closes with one PRR per head/site. A datalog
/// record sits between groups, outside any part.
pub fn multi_site(layout: Layout) -> Vec<Record> {
    let mut records = vec![
        rec(RecordKind::Far),
        rec(RecordKind::Mir).with_field(fields::LOT_ID, "LOTM"),
    ];
    for head in 1..=layout.heads {
        records.push(
            rec(RecordKind::Wir)
                .with_field(fields::HEAD_NUM, head)
                .with_field(fields::WAFER_ID, "W01"),
        );
    }

    for group in 0..layout.groups {
        for (head, site) in layout.sites() {
            records.push(at_site(RecordKind::Pir, head, site));
        }
        for test in 0..layout.tests_per_part {
            for (head, site) in layout.sites() {
                records.push(
                    at_site(RecordKind::Ptr, head, site)
                        .with_field(fields::TEST_NUM, 1000 + test as u32)
                        .with_field(fields::RESULT, group as f64 + f64::from(site) / 10.0),
                );
            }
        }
        for (head, site) in layout.sites() {
            records.push(
                at_site(RecordKind::Prr, head, site)
                    .with_field(fields::HARD_BIN, u32::from(site))
                    .with_field(fields::SOFT_BIN, u32::from(head)),
            );
        }
        records.push(rec(RecordKind::Dtr).with_field("text_dat", "group done"));
    }

    for head in 1..=layout.heads {
        records.push(rec(RecordKind::Wrr).with_field(fields::HEAD_NUM, head));
    }
    for (head, site) in layout.sites() {
        records.push(
            at_site(RecordKind::Pcr, head, site).with_field(fields::PART_CNT, layout.groups as u32),
        );
    }
    records.push(
        at_site(RecordKind::Pcr, 255, 255)
            .with_field(fields::PART_CNT, layout.groups as u32 * layout.sites().count() as u32),
    );
    records.push(rec(RecordKind::Mrr));
    with_offsets(records)
}

pub const TWO_BY_THREE: Layout = Layout {
    heads: 2,
    sites: 3,
    groups: 4,
    tests_per_part: 2,
};

/// Record source that counts how often it is enumerated
pub struct CountingSource {
    records: Vec<Record>,
    calls: Cell<usize>,
}

impl CountingSource {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl RecordSource for CountingSource {
    fn records(&self) -> Box<dyn Iterator<Item = Record> + '_> {
        self.calls.set(self.calls.get() + 1);
        self.records.records()
    }
}

/// Plans covering every recognized navigation pattern
pub fn navigation_plans() -> Vec<PlanNode> {
    let p = || PlanNode::param("p");
    let part_opens = || PlanNode::call(Operation::AllPartOpens, vec![]);
    let part_closes = || PlanNode::call(Operation::AllPartCloses, vec![]);
    vec![
        PlanNode::List(vec![
            PlanNode::call(Operation::LotOpen, vec![]),
            PlanNode::call(Operation::LotClose, vec![]),
        ]),
        PlanNode::call(Operation::PartCounts, vec![]),
        PlanNode::call(
            Operation::PartCountsFor,
            vec![PlanNode::constant(2i64), PlanNode::constant(3i64)],
        ),
        PlanNode::call(Operation::SummaryPartCounts, vec![]),
        part_opens().method(
            Operation::Map,
            vec![PlanNode::lambda(
                "p",
                PlanNode::call(Operation::Children(RecordKind::Pir), vec![p()]),
            )],
        ),
        part_closes().method(
            Operation::Map,
            vec![PlanNode::lambda(
                "p",
                PlanNode::call(Operation::Children(RecordKind::Prr), vec![p()]),
            )],
        ),
        part_opens().method(
            Operation::Map,
            vec![PlanNode::lambda(
                "p",
                PlanNode::call(Operation::MatchingPartClose, vec![p()])
                    .field(RecordKind::Prr, fields::HARD_BIN),
            )],
        ),
        part_closes().method(
            Operation::Map,
            vec![PlanNode::lambda(
                "p",
                PlanNode::call(Operation::MatchingPartOpen, vec![p()]),
            )],
        ),
        PlanNode::call(Operation::OfKind(RecordKind::Ptr), vec![]).method(
            Operation::Map,
            vec![PlanNode::lambda(
                "p",
                PlanNode::List(vec![
                    PlanNode::call(Operation::WaferOpen, vec![p()]),
                    PlanNode::call(Operation::WaferClose, vec![p()]),
                ]),
            )],
        ),
        PlanNode::Source
            .method(
                Operation::Filter,
                vec![PlanNode::lambda("p", p().is(RecordKind::Ptr))],
            )
            .method(Operation::Count, vec![]),
    ]
}
