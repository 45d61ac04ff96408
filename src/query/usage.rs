//! Field usage analysis.
//!
//! Walks a plan and collects, per record kind, the field names the plan reads.
//! The external decoder uses the result to skip decoding every other field.
//! A kind present with no fields is referenced as a whole (type checks,
//! casts, structural lookups) without any field being read.

use crate::query::plan::{IndexedAccessor, Operation, PlanNode};
use crate::record::{RecordKind, fields};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};

/// Per-kind set of field names read by a plan.
///
/// Union is commutative, associative and idempotent, with the empty set as
/// identity, so the order in which sub-plans are merged does not matter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageSet {
    kinds: FxHashMap<RecordKind, FxHashSet<String>>,
}

impl UsageSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Reference a kind as a whole
    pub fn add_kind(&mut self, kind: RecordKind) {
        self.kinds.entry(kind).or_default();
    }

    pub fn add_field(&mut self, kind: RecordKind, field: &str) {
        let fields = self.kinds.entry(kind).or_default();
        if !fields.contains(field) {
            fields.insert(field.to_string());
        }
    }

    pub fn with_field(mut self, kind: RecordKind, field: &str) -> Self {
        self.add_field(kind, field);
        self
    }

    pub fn with_kind(mut self, kind: RecordKind) -> Self {
        self.add_kind(kind);
        self
    }

    /// Merge another set into this one
    pub fn merge(&mut self, other: &UsageSet) {
        for (kind, fields) in &other.kinds {
            let entry = self.kinds.entry(*kind).or_default();
            entry.extend(fields.iter().cloned());
        }
    }

    pub fn union(mut self, other: &UsageSet) -> Self {
        self.merge(other);
        self
    }

    pub fn references(&self, kind: RecordKind) -> bool {
        self.kinds.contains_key(&kind)
    }

    pub fn reads(&self, kind: RecordKind, field: &str) -> bool {
        self.kinds
            .get(&kind)
            .is_some_and(|fields| fields.contains(field))
    }

    pub fn fields(&self, kind: RecordKind) -> Option<&FxHashSet<String>> {
        self.kinds.get(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = RecordKind> + '_ {
        self.kinds.keys().copied()
    }

    /// Deterministic view for the decoder: kinds and field names sorted
    pub fn to_schema(&self) -> BTreeMap<RecordKind, BTreeSet<String>> {
        self.kinds
            .iter()
            .map(|(kind, fields)| (*kind, fields.iter().cloned().collect()))
            .collect()
    }
}

impl Serialize for UsageSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_schema().serialize(serializer)
    }
}

impl FromIterator<UsageSet> for UsageSet {
    fn from_iter<I: IntoIterator<Item = UsageSet>>(iter: I) -> Self {
        let mut out = UsageSet::new();
        for set in iter {
            out.merge(&set);
        }
        out
    }
}

/// Computes the [`UsageSet`] of a plan
pub struct UsageAnalyzer;

impl UsageAnalyzer {
    pub fn analyze(plan: &PlanNode) -> UsageSet {
        usage_of(plan)
    }
}

fn union_all<'a>(nodes: impl IntoIterator<Item = &'a PlanNode>) -> UsageSet {
    nodes.into_iter().map(usage_of).collect()
}

fn usage_of(node: &PlanNode) -> UsageSet {
    match node {
        PlanNode::TypeCheck { operand, kind } | PlanNode::Cast { operand, kind } => {
            usage_of(operand).with_kind(*kind)
        }

        PlanNode::Conditional {
            condition,
            if_true,
            if_false,
        } => union_all([&**condition, &**if_true, &**if_false]),

        PlanNode::Field {
            receiver,
            kind,
            name,
        } => {
            let usage = usage_of(receiver);
            match kind {
                Some(kind) => usage.with_field(*kind, name),
                None => usage,
            }
        }

        PlanNode::Call { receiver, op, args } => {
            let mut usage = union_all(receiver.as_deref().into_iter().chain(args));
            usage.merge(&operation_usage(*op));
            usage
        }

        // Parameters contribute nothing unless the body reads them
        PlanNode::Lambda { body, .. } => usage_of(body),

        PlanNode::Construct { members } => union_all(members.iter().map(|(_, node)| node)),

        PlanNode::List(items) => union_all(items),

        PlanNode::Binary { lhs, rhs, .. } => union_all([&**lhs, &**rhs]),

        PlanNode::Unary { operand, .. } => usage_of(operand),

        PlanNode::Indexed { accessor, args } => {
            let mut usage = union_all(args);
            usage.merge(&accessor_usage(*accessor));
            usage
        }

        PlanNode::Constant(_) | PlanNode::Parameter(_) | PlanNode::Source => UsageSet::new(),
    }
}

/// Head and site of every site-bearing kind, read when filtering a part's
/// records by head/site
fn site_filter_usage() -> UsageSet {
    RecordKind::ALL
        .into_iter()
        .filter(|k| k.has_site())
        .fold(UsageSet::new(), |usage, kind| {
            usage
                .with_field(kind, fields::HEAD_NUM)
                .with_field(kind, fields::SITE_NUM)
        })
}

fn head_site_of(kinds: &[RecordKind]) -> UsageSet {
    kinds.iter().fold(UsageSet::new(), |usage, &kind| {
        usage
            .with_field(kind, fields::HEAD_NUM)
            .with_field(kind, fields::SITE_NUM)
    })
}

/// Fields a navigation operation reads on its own, whatever the plan does
/// with its result
pub fn operation_usage(op: Operation) -> UsageSet {
    match op {
        Operation::LotOpen => UsageSet::new().with_kind(RecordKind::Mir),
        Operation::LotClose => UsageSet::new().with_kind(RecordKind::Mrr),
        Operation::PartCounts => UsageSet::new().with_kind(RecordKind::Pcr),
        Operation::PartCountsFor => head_site_of(&[RecordKind::Pcr]),
        Operation::SummaryPartCounts => {
            UsageSet::new().with_field(RecordKind::Pcr, fields::HEAD_NUM)
        }
        Operation::Children(RecordKind::Pir | RecordKind::Prr) => site_filter_usage(),
        Operation::Children(kind) => UsageSet::new()
            .with_kind(kind)
            .with_kind(RecordKind::Wir)
            .with_kind(RecordKind::Wrr),
        Operation::MatchingPartClose | Operation::MatchingPartOpen => {
            head_site_of(&[RecordKind::Pir, RecordKind::Prr])
        }
        Operation::WaferOpen | Operation::WaferClose => UsageSet::new()
            .with_kind(RecordKind::Wir)
            .with_kind(RecordKind::Wrr),
        Operation::AllPartOpens => UsageSet::new().with_kind(RecordKind::Pir),
        Operation::AllPartCloses => UsageSet::new().with_kind(RecordKind::Prr),
        Operation::OfKind(kind) => UsageSet::new().with_kind(kind),
        Operation::Filter
        | Operation::Map
        | Operation::Count
        | Operation::First
        | Operation::Any => UsageSet::new(),
    }
}

pub fn accessor_usage(accessor: IndexedAccessor) -> UsageSet {
    operation_usage(accessor.operation())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::plan::{BinaryOp, Value};
    use crate::query::rewriter::QueryRewriter;

    fn prr_field(name: &str) -> PlanNode {
        PlanNode::param("p").field(RecordKind::Prr, name)
    }

    #[test]
    fn test_leaves_are_empty() {
        assert!(UsageAnalyzer::analyze(&PlanNode::Source).is_empty());
        assert!(UsageAnalyzer::analyze(&PlanNode::constant(Value::Int(1))).is_empty());
        assert!(UsageAnalyzer::analyze(&PlanNode::param("x")).is_empty());
    }

    #[test]
    fn test_field_access_registers_field() {
        let usage = UsageAnalyzer::analyze(&prr_field("hard_bin"));
        assert!(usage.reads(RecordKind::Prr, "hard_bin"));
        assert!(!usage.reads(RecordKind::Prr, "soft_bin"));
        assert_eq!(usage.kinds().count(), 1);
    }

    #[test]
    fn test_untyped_member_access_registers_nothing() {
        let plan = PlanNode::construct(vec![("a", prr_field("soft_bin"))]).member("a");
        let usage = UsageAnalyzer::analyze(&plan);
        assert_eq!(usage, UsageSet::new().with_field(RecordKind::Prr, "soft_bin"));
    }

    #[test]
    fn test_type_check_references_whole_kind() {
        let usage = UsageAnalyzer::analyze(&PlanNode::param("r").is(RecordKind::Ftr));
        assert!(usage.references(RecordKind::Ftr));
        assert!(usage.fields(RecordKind::Ftr).unwrap().is_empty());
    }

    #[test]
    fn test_lambda_parameters_contribute_nothing() {
        let plan = PlanNode::Lambda {
            params: vec!["unused".into(), "p".into()],
            body: Box::new(prr_field("part_flg")),
        };
        assert_eq!(
            UsageAnalyzer::analyze(&plan),
            UsageSet::new().with_field(RecordKind::Prr, "part_flg")
        );
    }

    #[test]
    fn test_filter_over_kind() {
        // of_kind(PTR).filter(r => r.test_num == 100 && r.result > 1.5)
        let ptr = || PlanNode::param("r");
        let plan = PlanNode::call(Operation::OfKind(RecordKind::Ptr), vec![]).method(
            Operation::Filter,
            vec![PlanNode::lambda(
                "r",
                PlanNode::binary(
                    BinaryOp::And,
                    PlanNode::binary(
                        BinaryOp::Eq,
                        ptr().field(RecordKind::Ptr, "test_num"),
                        PlanNode::constant(Value::Int(100)),
                    ),
                    PlanNode::binary(
                        BinaryOp::Gt,
                        ptr().field(RecordKind::Ptr, "result"),
                        PlanNode::constant(Value::Float(1.5)),
                    ),
                ),
            )],
        );
        let schema = UsageAnalyzer::analyze(&plan).to_schema();
        assert_eq!(schema.len(), 1);
        let fields: Vec<_> = schema[&RecordKind::Ptr].iter().map(String::as_str).collect();
        assert_eq!(fields, vec!["result", "test_num"]);
    }

    #[test]
    fn test_part_children_need_head_and_site() {
        let plan = PlanNode::call(
            Operation::Children(RecordKind::Pir),
            vec![PlanNode::call(Operation::AllPartOpens, vec![]).method(Operation::First, vec![])],
        );
        let usage = UsageAnalyzer::analyze(&plan);
        assert!(usage.reads(RecordKind::Pir, fields::HEAD_NUM));
        assert!(usage.reads(RecordKind::Ptr, fields::SITE_NUM));
        assert!(!usage.reads(RecordKind::Dtr, fields::SITE_NUM));
    }

    #[test]
    fn test_rewritten_plan_has_same_usage() {
        let plan = PlanNode::call(Operation::AllPartCloses, vec![]).method(
            Operation::Map,
            vec![PlanNode::lambda(
                "p",
                PlanNode::construct(vec![
                    ("bin", prr_field("hard_bin")),
                    (
                        "open",
                        PlanNode::call(Operation::MatchingPartOpen, vec![PlanNode::param("p")]),
                    ),
                    (
                        "wafer",
                        PlanNode::call(Operation::WaferOpen, vec![PlanNode::param("p")])
                            .field(RecordKind::Wir, "wafer_id"),
                    ),
                ]),
            )],
        );
        let rewritten = QueryRewriter::optimize(&plan);
        assert!(rewritten.indexed_count() > 0);
        assert_eq!(UsageAnalyzer::analyze(&plan), UsageAnalyzer::analyze(&rewritten));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let a = UsageSet::new()
            .with_field(RecordKind::Ptr, "result")
            .with_kind(RecordKind::Mir);
        assert_eq!(a.clone().union(&a), a);
        assert_eq!(a.clone().union(&UsageSet::new()), a);
    }

    #[test]
    fn test_serializes_sorted() {
        let usage = UsageSet::new()
            .with_field(RecordKind::Ptr, "test_num")
            .with_field(RecordKind::Ptr, "result")
            .with_kind(RecordKind::Mir);
        let json = serde_json::to_string(&usage).unwrap();
        assert_eq!(json, r#"{"MIR":[],"PTR":["result","test_num"]}"#);
    }
}
