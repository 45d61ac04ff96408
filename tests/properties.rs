//! Property tests for extent discovery, rewriting and usage analysis.

mod fixtures;

use fixtures::{Layout, at_site, multi_site, navigation_plans, with_offsets};
use proptest::prelude::*;
use stdfi::config::IndexConfig;
use stdfi::index::ExtentIndexBuilder;
use stdfi::query::{
    BinaryOp, Operation, PlanNode, QueryExecutor, QueryRewriter, UsageAnalyzer, UsageSet,
};
use stdfi::record::RecordKind;
use stdfi::strategy::{CachingStrategy, PassThroughStrategy};

const FIELDS: [&str; 4] = ["head_num", "site_num", "result", "hard_bin"];

fn arb_kind() -> impl Strategy<Value = RecordKind> {
    prop::sample::select(RecordKind::ALL.to_vec())
}

fn arb_structural_kind() -> impl Strategy<Value = RecordKind> {
    prop::sample::select(vec![
        RecordKind::Wir,
        RecordKind::Wrr,
        RecordKind::Pir,
        RecordKind::Prr,
        RecordKind::Ptr,
        RecordKind::Dtr,
        RecordKind::Pcr,
    ])
}

fn arb_field() -> impl Strategy<Value = &'static str> {
    prop::sample::select(FIELDS.to_vec())
}

fn arb_navigation() -> impl Strategy<Value = PlanNode> {
    let r = || PlanNode::param("r");
    prop_oneof![
        Just(PlanNode::call(Operation::LotOpen, vec![])),
        Just(PlanNode::call(Operation::PartCounts, vec![])),
        Just(PlanNode::call(
            Operation::PartCountsFor,
            vec![PlanNode::constant(1i64), PlanNode::constant(2i64)],
        )),
        Just(PlanNode::call(Operation::AllPartOpens, vec![])),
        Just(PlanNode::call(Operation::AllPartCloses, vec![])),
        Just(PlanNode::call(Operation::Children(RecordKind::Pir), vec![r()])),
        Just(PlanNode::call(Operation::Children(RecordKind::Wrr), vec![r()])),
        Just(PlanNode::call(Operation::MatchingPartClose, vec![r()])),
        Just(PlanNode::call(Operation::WaferOpen, vec![r()])),
        // Wrong arity, left generic
        Just(PlanNode::call(Operation::WaferClose, vec![])),
    ]
}

fn arb_leaf() -> impl Strategy<Value = PlanNode> {
    prop_oneof![
        (arb_kind(), arb_field()).prop_map(|(kind, field)| PlanNode::param("r").field(kind, field)),
        arb_kind().prop_map(|kind| PlanNode::param("r").is(kind)),
        arb_kind().prop_map(|kind| PlanNode::call(Operation::OfKind(kind), vec![])),
        arb_navigation(),
        Just(PlanNode::constant(1i64)),
        Just(PlanNode::Source),
    ]
}

fn arb_plan() -> impl Strategy<Value = PlanNode> {
    arb_leaf().prop_recursive(4, 32, 3, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone())
                .prop_map(|(a, b)| PlanNode::binary(BinaryOp::And, a, b)),
            (inner.clone(), inner.clone(), inner.clone())
                .prop_map(|(c, t, f)| PlanNode::conditional(c, t, f)),
            prop::collection::vec(inner.clone(), 0..3).prop_map(PlanNode::List),
            (inner.clone(), arb_kind()).prop_map(|(node, kind)| node.cast(kind)),
            inner.clone().prop_map(|body| {
                PlanNode::call(Operation::AllPartOpens, vec![])
                    .method(Operation::Map, vec![PlanNode::lambda("r", body)])
            }),
        ]
    })
}

fn arb_layout() -> impl Strategy<Value = Layout> {
    (1u8..=2, 1u8..=4, 0usize..4, 0usize..3).prop_map(|(heads, sites, groups, tests_per_part)| {
        Layout {
            heads,
            sites,
            groups,
            tests_per_part,
        }
    })
}

fn usage(plan: &PlanNode) -> UsageSet {
    UsageAnalyzer::analyze(plan)
}

proptest! {
    #[test]
    fn extents_are_ordered_and_bounded(kinds in prop::collection::vec(arb_structural_kind(), 0..64)) {
        let records = with_offsets(kinds.into_iter().map(|k| at_site(k, 1, 1)).collect());
        let index = ExtentIndexBuilder::build(records, IndexConfig::default()).unwrap();

        for map in [index.wafers(), index.parts()] {
            let mut previous_end = None;
            for extent in map.all_extents() {
                prop_assert!(extent.start_index <= extent.end_index);
                if let Some(end) = previous_end {
                    prop_assert!(extent.start_index > end);
                }
                previous_end = Some(extent.end_index);

                let start = &index.records()[extent.start_index];
                let end = &index.records()[extent.end_index];
                prop_assert_eq!(start.kind, map.scope().open_kind());
                if !extent.truncated {
                    prop_assert_eq!(end.kind, map.scope().close_kind());
                }
                prop_assert_eq!(map.extent_containing(start), Some(extent));
                prop_assert_eq!(map.extent_containing(end), Some(extent));
            }
        }
    }

    #[test]
    fn usage_of_composite_is_union_of_parts(a in arb_plan(), b in arb_plan(), c in arb_plan()) {
        let (ua, ub, uc) = (usage(&a), usage(&b), usage(&c));
        let ab = ua.clone().union(&ub);

        prop_assert_eq!(usage(&PlanNode::binary(BinaryOp::Or, a.clone(), b.clone())), ab.clone());
        prop_assert_eq!(
            usage(&PlanNode::conditional(a.clone(), b.clone(), c)),
            ab.clone().union(&uc)
        );
        prop_assert_eq!(
            usage(&PlanNode::construct(vec![("x", a.clone()), ("y", b.clone())]).member("x")),
            ab.clone()
        );
        prop_assert_eq!(
            usage(&a.method(Operation::Filter, vec![PlanNode::lambda("r", b)])),
            ab
        );
    }

    #[test]
    fn union_is_commutative_and_idempotent(a in arb_plan(), b in arb_plan()) {
        let (ua, ub) = (usage(&a), usage(&b));
        prop_assert_eq!(ua.clone().union(&ub), ub.clone().union(&ua));
        prop_assert_eq!(ua.clone().union(&ua), ua.clone());
        prop_assert_eq!(ua.clone().union(&UsageSet::new()), ua);
    }

    #[test]
    fn rewrite_preserves_usage_and_is_idempotent(plan in arb_plan()) {
        let once = QueryRewriter::optimize(&plan);
        prop_assert_eq!(usage(&once), usage(&plan));
        prop_assert_eq!(QueryRewriter::optimize(&once), once);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn optimized_navigation_matches_generic(layout in arb_layout()) {
        let source = multi_site(layout);
        let generic = QueryExecutor::new(&source, &PassThroughStrategy);
        let strategy = CachingStrategy::default();
        let optimized = QueryExecutor::new(&source, &strategy);

        for plan in navigation_plans() {
            let expected = generic.execute(&plan).unwrap();
            let actual = optimized.execute_optimized(&plan).unwrap();
            prop_assert_eq!(actual, expected);
        }
    }
}
