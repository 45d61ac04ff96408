use crate::query::plan::{IndexedAccessor, Operation, PlanNode};
use crate::record::RecordKind;
use tracing::{debug, trace};

/// Counters from one rewrite pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteStats {
    /// Calls replaced with index-backed accessors
    pub substituted: usize,
    /// Recognized operations left generic because their shape did not match
    pub skipped: usize,
}

/// The fixed table of navigation operations with an index-backed form
pub fn recognize(op: Operation) -> Option<IndexedAccessor> {
    let accessor = match op {
        Operation::LotOpen => IndexedAccessor::LotOpen,
        Operation::LotClose => IndexedAccessor::LotClose,
        Operation::PartCounts => IndexedAccessor::PartCounts,
        Operation::PartCountsFor => IndexedAccessor::PartCountsFor,
        Operation::SummaryPartCounts => IndexedAccessor::SummaryPartCounts,
        Operation::Children(RecordKind::Pir) => IndexedAccessor::PartOpenChildren,
        Operation::Children(RecordKind::Prr) => IndexedAccessor::PartCloseChildren,
        Operation::MatchingPartClose => IndexedAccessor::MatchingPartClose,
        Operation::MatchingPartOpen => IndexedAccessor::MatchingPartOpen,
        Operation::WaferOpen => IndexedAccessor::WaferOpen,
        Operation::WaferClose => IndexedAccessor::WaferClose,
        Operation::AllPartOpens => IndexedAccessor::AllPartOpens,
        Operation::AllPartCloses => IndexedAccessor::AllPartCloses,
        _ => return None,
    };
    Some(accessor)
}

/// Rewrites a plan so recognized navigation calls use the structural index.
///
/// The rewrite is total: every node is rebuilt with rewritten children, so
/// substitutions happen at any depth. Nodes outside the table are copied
/// unchanged, and a recognized call whose shape is unexpected is left generic.
#[derive(Debug, Default)]
pub struct QueryRewriter {
    stats: RewriteStats,
}

impl QueryRewriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite a plan in one call
    pub fn optimize(plan: &PlanNode) -> PlanNode {
        Self::new().rewrite(plan)
    }

    pub fn stats(&self) -> RewriteStats {
        self.stats
    }

    pub fn rewrite(&mut self, node: &PlanNode) -> PlanNode {
        match node {
            PlanNode::Constant(_) | PlanNode::Parameter(_) | PlanNode::Source => node.clone(),

            PlanNode::Call { receiver, op, args } => {
                let receiver = receiver.as_ref().map(|r| Box::new(self.rewrite(r)));
                let args: Vec<_> = args.iter().map(|a| self.rewrite(a)).collect();

                match recognize(*op) {
                    Some(accessor) if receiver.is_none() && args.len() == accessor.arity() => {
                        trace!(op = op.name(), accessor = accessor.name(), "substituted");
                        self.stats.substituted += 1;
                        PlanNode::Indexed { accessor, args }
                    }
                    Some(accessor) => {
                        debug!(
                            op = op.name(),
                            args = args.len(),
                            expected = accessor.arity(),
                            has_receiver = receiver.is_some(),
                            "call shape does not match index-backed form, left generic"
                        );
                        self.stats.skipped += 1;
                        PlanNode::Call {
                            receiver,
                            op: *op,
                            args,
                        }
                    }
                    None => PlanNode::Call {
                        receiver,
                        op: *op,
                        args,
                    },
                }
            }

            PlanNode::TypeCheck { operand, kind } => PlanNode::TypeCheck {
                operand: Box::new(self.rewrite(operand)),
                kind: *kind,
            },

            PlanNode::Cast { operand, kind } => PlanNode::Cast {
                operand: Box::new(self.rewrite(operand)),
                kind: *kind,
            },

            PlanNode::Conditional {
                condition,
                if_true,
                if_false,
            } => PlanNode::Conditional {
                condition: Box::new(self.rewrite(condition)),
                if_true: Box::new(self.rewrite(if_true)),
                if_false: Box::new(self.rewrite(if_false)),
            },

            PlanNode::Field {
                receiver,
                kind,
                name,
            } => PlanNode::Field {
                receiver: Box::new(self.rewrite(receiver)),
                kind: *kind,
                name: name.clone(),
            },

            PlanNode::Lambda { params, body } => PlanNode::Lambda {
                params: params.clone(),
                body: Box::new(self.rewrite(body)),
            },

            PlanNode::Construct { members } => PlanNode::Construct {
                members: members
                    .iter()
                    .map(|(name, value)| (name.clone(), self.rewrite(value)))
                    .collect(),
            },

            PlanNode::List(items) => PlanNode::List(items.iter().map(|i| self.rewrite(i)).collect()),

            PlanNode::Binary { op, lhs, rhs } => PlanNode::Binary {
                op: *op,
                lhs: Box::new(self.rewrite(lhs)),
                rhs: Box::new(self.rewrite(rhs)),
            },

            PlanNode::Unary { op, operand } => PlanNode::Unary {
                op: *op,
                operand: Box::new(self.rewrite(operand)),
            },

            PlanNode::Indexed { accessor, args } => PlanNode::Indexed {
                accessor: *accessor,
                args: args.iter().map(|a| self.rewrite(a)).collect(),
            },
        }
    }
}
