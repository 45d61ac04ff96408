#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use stdfi::config::IndexConfig;
use stdfi::index::ExtentIndexBuilder;
use stdfi::record::{Record, RecordKind};

#[derive(Debug, Arbitrary)]
struct Input {
    seal_unterminated_scopes: bool,
    records: Vec<(u8, u8, u8, u8)>,
}

fuzz_target!(|input: Input| {
    // Arbitrary kind sequences, including orphan closes and unterminated
    // scopes, must index without error and never produce overlapping extents
    let config = IndexConfig {
        seal_unterminated_scopes: input.seal_unterminated_scopes,
        ..IndexConfig::default()
    };
    let records = input
        .records
        .iter()
        .enumerate()
        .map(|(i, &(kind, gap, head, site))| {
            let kind = RecordKind::ALL[kind as usize % RecordKind::ALL.len()];
            Record::new(kind, i as u64 * 256 + u64::from(gap)).with_head_site(head, site)
        });

    let index = ExtentIndexBuilder::build(records, config).expect("builder rejected a valid stream");
    for map in [index.wafers(), index.parts()] {
        for pair in map.all_extents().windows(2) {
            assert!(pair[0].end_index < pair[1].start_index);
        }
    }
    for pir in index.all_part_opens() {
        let _ = index.part_open_children(&pir);
        let _ = index.matching_part_close(&pir);
    }
});
