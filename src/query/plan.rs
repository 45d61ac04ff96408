use crate::record::{FieldValue, RecordKind, RecordRef};

/// A value produced while evaluating a plan
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Record(RecordRef),
    List(Vec<Value>),
    /// Result of a member-initializer node
    Object(Vec<(String, Value)>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Record(_) => "record",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Record(_) | Value::Object(_) => true,
            Value::List(items) => !items.is_empty(),
        }
    }

    pub fn as_record(&self) -> Option<&RecordRef> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Records held by a list value, skipping non-record items
    pub fn records(&self) -> Vec<RecordRef> {
        self.as_list()
            .unwrap_or_default()
            .iter()
            .filter_map(|v| v.as_record().cloned())
            .collect()
    }

    pub fn from_records(records: impl IntoIterator<Item = RecordRef>) -> Self {
        Value::List(records.into_iter().map(Value::Record).collect())
    }

    pub fn from_optional(record: Option<RecordRef>) -> Self {
        record.map_or(Value::Null, Value::Record)
    }
}

impl From<&FieldValue> for Value {
    fn from(v: &FieldValue) -> Self {
        match v {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::UInt(u) => i64::try_from(*u).map_or(Value::Float(*u as f64), Value::Int),
            FieldValue::Int(i) => Value::Int(*i),
            FieldValue::Float(f) => Value::Float(*f),
            FieldValue::Str(s) => Value::Str(s.clone()),
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
    IsNull,
}

/// Operations a plan can call, identified structurally.
///
/// Navigation accessors take no receiver; sequence combinators take the
/// sequence as receiver and, for `Filter`, `Map` and `Any`, a lambda argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// The lot's MIR
    LotOpen,
    /// The lot's MRR
    LotClose,
    /// Every PCR
    PartCounts,
    /// PCRs for a head and site: `(head, site)`
    PartCountsFor,
    /// PCRs for the all-sites summary head
    SummaryPartCounts,
    /// Records scoped under a PIR, PRR, WIR or WRR: `(record)`
    Children(RecordKind),
    /// The PRR closing a PIR's part: `(pir)`
    MatchingPartClose,
    /// The PIR opening a PRR's part: `(prr)`
    MatchingPartOpen,
    /// The WIR of the wafer containing a record: `(record)`
    WaferOpen,
    /// The WRR of the wafer containing a record: `(record)`
    WaferClose,
    AllPartOpens,
    AllPartCloses,
    /// Every record of one kind
    OfKind(RecordKind),
    Filter,
    Map,
    Count,
    First,
    Any,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::LotOpen => "lot_open",
            Operation::LotClose => "lot_close",
            Operation::PartCounts => "part_counts",
            Operation::PartCountsFor => "part_counts_for",
            Operation::SummaryPartCounts => "summary_part_counts",
            Operation::Children(_) => "children",
            Operation::MatchingPartClose => "matching_part_close",
            Operation::MatchingPartOpen => "matching_part_open",
            Operation::WaferOpen => "wafer_open",
            Operation::WaferClose => "wafer_close",
            Operation::AllPartOpens => "all_part_opens",
            Operation::AllPartCloses => "all_part_closes",
            Operation::OfKind(_) => "of_kind",
            Operation::Filter => "filter",
            Operation::Map => "map",
            Operation::Count => "count",
            Operation::First => "first",
            Operation::Any => "any",
        }
    }
}

/// Index-backed replacements substituted by the rewriter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexedAccessor {
    LotOpen,
    LotClose,
    PartCounts,
    PartCountsFor,
    SummaryPartCounts,
    PartOpenChildren,
    PartCloseChildren,
    MatchingPartClose,
    MatchingPartOpen,
    WaferOpen,
    WaferClose,
    AllPartOpens,
    AllPartCloses,
}

impl IndexedAccessor {
    pub fn arity(self) -> usize {
        match self {
            IndexedAccessor::PartCountsFor => 2,
            IndexedAccessor::PartOpenChildren
            | IndexedAccessor::PartCloseChildren
            | IndexedAccessor::MatchingPartClose
            | IndexedAccessor::MatchingPartOpen
            | IndexedAccessor::WaferOpen
            | IndexedAccessor::WaferClose => 1,
            IndexedAccessor::LotOpen
            | IndexedAccessor::LotClose
            | IndexedAccessor::PartCounts
            | IndexedAccessor::SummaryPartCounts
            | IndexedAccessor::AllPartOpens
            | IndexedAccessor::AllPartCloses => 0,
        }
    }

    /// The generic operation this accessor stands in for
    pub fn operation(self) -> Operation {
        match self {
            IndexedAccessor::LotOpen => Operation::LotOpen,
            IndexedAccessor::LotClose => Operation::LotClose,
            IndexedAccessor::PartCounts => Operation::PartCounts,
            IndexedAccessor::PartCountsFor => Operation::PartCountsFor,
            IndexedAccessor::SummaryPartCounts => Operation::SummaryPartCounts,
            IndexedAccessor::PartOpenChildren => Operation::Children(RecordKind::Pir),
            IndexedAccessor::PartCloseChildren => Operation::Children(RecordKind::Prr),
            IndexedAccessor::MatchingPartClose => Operation::MatchingPartClose,
            IndexedAccessor::MatchingPartOpen => Operation::MatchingPartOpen,
            IndexedAccessor::WaferOpen => Operation::WaferOpen,
            IndexedAccessor::WaferClose => Operation::WaferClose,
            IndexedAccessor::AllPartOpens => Operation::AllPartOpens,
            IndexedAccessor::AllPartCloses => Operation::AllPartCloses,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            IndexedAccessor::LotOpen => "indexed_lot_open",
            IndexedAccessor::LotClose => "indexed_lot_close",
            IndexedAccessor::PartCounts => "indexed_part_counts",
            IndexedAccessor::PartCountsFor => "indexed_part_counts_for",
            IndexedAccessor::SummaryPartCounts => "indexed_summary_part_counts",
            IndexedAccessor::PartOpenChildren => "indexed_part_open_children",
            IndexedAccessor::PartCloseChildren => "indexed_part_close_children",
            IndexedAccessor::MatchingPartClose => "indexed_matching_part_close",
            IndexedAccessor::MatchingPartOpen => "indexed_matching_part_open",
            IndexedAccessor::WaferOpen => "indexed_wafer_open",
            IndexedAccessor::WaferClose => "indexed_wafer_close",
            IndexedAccessor::AllPartOpens => "indexed_all_part_opens",
            IndexedAccessor::AllPartCloses => "indexed_all_part_closes",
        }
    }
}

/// Query plan tree
#[derive(Debug, Clone, PartialEq)]
pub enum PlanNode {
    Constant(Value),
    /// Reference to a lambda parameter
    Parameter(String),
    /// The full record stream
    Source,
    /// `operand is kind`
    TypeCheck {
        operand: Box<PlanNode>,
        kind: RecordKind,
    },
    /// `operand as kind`, null when the kind differs
    Cast {
        operand: Box<PlanNode>,
        kind: RecordKind,
    },
    Conditional {
        condition: Box<PlanNode>,
        if_true: Box<PlanNode>,
        if_false: Box<PlanNode>,
    },
    /// Field read; `kind` is the receiver's record kind when statically known
    Field {
        receiver: Box<PlanNode>,
        kind: Option<RecordKind>,
        name: String,
    },
    Call {
        receiver: Option<Box<PlanNode>>,
        op: Operation,
        args: Vec<PlanNode>,
    },
    Lambda {
        params: Vec<String>,
        body: Box<PlanNode>,
    },
    /// Member initializer
    Construct {
        members: Vec<(String, PlanNode)>,
    },
    List(Vec<PlanNode>),
    Binary {
        op: BinaryOp,
        lhs: Box<PlanNode>,
        rhs: Box<PlanNode>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<PlanNode>,
    },
    /// Index-backed call; only produced by the rewriter
    Indexed {
        accessor: IndexedAccessor,
        args: Vec<PlanNode>,
    },
}

impl PlanNode {
    pub fn constant(value: impl Into<Value>) -> Self {
        PlanNode::Constant(value.into())
    }

    pub fn param(name: &str) -> Self {
        PlanNode::Parameter(name.to_string())
    }

    /// Navigation call with no receiver
    pub fn call(op: Operation, args: Vec<PlanNode>) -> Self {
        PlanNode::Call {
            receiver: None,
            op,
            args,
        }
    }

    /// Call on a receiver, e.g. a combinator over a sequence
    pub fn method(self, op: Operation, args: Vec<PlanNode>) -> Self {
        PlanNode::Call {
            receiver: Some(Box::new(self)),
            op,
            args,
        }
    }

    pub fn field(self, kind: RecordKind, name: &str) -> Self {
        PlanNode::Field {
            receiver: Box::new(self),
            kind: Some(kind),
            name: name.to_string(),
        }
    }

    /// Member read on a non-record receiver
    pub fn member(self, name: &str) -> Self {
        PlanNode::Field {
            receiver: Box::new(self),
            kind: None,
            name: name.to_string(),
        }
    }

    pub fn lambda(param: &str, body: PlanNode) -> Self {
        PlanNode::Lambda {
            params: vec![param.to_string()],
            body: Box::new(body),
        }
    }

    pub fn is(self, kind: RecordKind) -> Self {
        PlanNode::TypeCheck {
            operand: Box::new(self),
            kind,
        }
    }

    pub fn cast(self, kind: RecordKind) -> Self {
        PlanNode::Cast {
            operand: Box::new(self),
            kind,
        }
    }

    pub fn binary(op: BinaryOp, lhs: PlanNode, rhs: PlanNode) -> Self {
        PlanNode::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn unary(op: UnaryOp, operand: PlanNode) -> Self {
        PlanNode::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn conditional(condition: PlanNode, if_true: PlanNode, if_false: PlanNode) -> Self {
        PlanNode::Conditional {
            condition: Box::new(condition),
            if_true: Box::new(if_true),
            if_false: Box::new(if_false),
        }
    }

    pub fn construct(members: Vec<(&str, PlanNode)>) -> Self {
        PlanNode::Construct {
            members: members
                .into_iter()
                .map(|(name, node)| (name.to_string(), node))
                .collect(),
        }
    }

    /// Number of index-backed nodes anywhere in the tree
    pub fn indexed_count(&self) -> usize {
        let own = usize::from(matches!(self, PlanNode::Indexed { .. }));
        own + self.children().into_iter().map(PlanNode::indexed_count).sum::<usize>()
    }

    /// Direct sub-nodes, in evaluation order
    pub fn children(&self) -> Vec<&PlanNode> {
        match self {
            PlanNode::Constant(_) | PlanNode::Parameter(_) | PlanNode::Source => Vec::new(),
            PlanNode::TypeCheck { operand, .. }
            | PlanNode::Cast { operand, .. }
            | PlanNode::Unary { operand, .. } => vec![&**operand],
            PlanNode::Conditional {
                condition,
                if_true,
                if_false,
            } => vec![&**condition, &**if_true, &**if_false],
            PlanNode::Field { receiver, .. } => vec![&**receiver],
            PlanNode::Call { receiver, args, .. } => {
                receiver.as_deref().into_iter().chain(args.iter()).collect()
            }
            PlanNode::Lambda { body, .. } => vec![&**body],
            PlanNode::Construct { members } => members.iter().map(|(_, node)| node).collect(),
            PlanNode::List(items) => items.iter().collect(),
            PlanNode::Binary { lhs, rhs, .. } => vec![&**lhs, &**rhs],
            PlanNode::Indexed { args, .. } => args.iter().collect(),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}
