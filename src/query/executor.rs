use crate::error::{QueryError, QueryResult};
use crate::index::StructureIndex;
use crate::query::plan::{BinaryOp, IndexedAccessor, Operation, PlanNode, UnaryOp, Value};
use crate::query::scan;
use crate::record::{RecordKind, RecordRef, RecordSource};
use crate::strategy::IndexingStrategy;
use ahash::AHashMap;
use std::cell::RefCell;
use std::rc::Rc;

/// Lambda parameter bindings
type Env = AHashMap<String, Value>;

/// Evaluates plans, rewritten or not, against a record source.
///
/// Generic navigation walks the prepared record stream; index-backed nodes
/// go through the strategy's structural index.
pub struct QueryExecutor<'a> {
    source: &'a dyn RecordSource,
    strategy: &'a dyn IndexingStrategy,
    records: RefCell<Option<Rc<[RecordRef]>>>,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(source: &'a dyn RecordSource, strategy: &'a dyn IndexingStrategy) -> Self {
        Self {
            source,
            strategy,
            records: RefCell::new(None),
        }
    }

    /// Execute a plan as written
    pub fn execute(&self, plan: &PlanNode) -> QueryResult<Value> {
        let mut env = Env::new();
        self.eval(plan, &mut env)
    }

    /// Rewrite the plan with the strategy, then execute it
    pub fn execute_optimized(&self, plan: &PlanNode) -> QueryResult<Value> {
        let plan = self.strategy.rewrite(plan);
        self.execute(&plan)
    }

    /// The prepared stream, enumerated once per executor
    fn stream(&self) -> QueryResult<Rc<[RecordRef]>> {
        if let Some(records) = self.records.borrow().as_ref() {
            return Ok(records.clone());
        }
        let records: Rc<[RecordRef]> = self.strategy.prepare(self.source)?.collect();
        *self.records.borrow_mut() = Some(records.clone());
        Ok(records)
    }

    fn index(&self, accessor: IndexedAccessor) -> QueryResult<Rc<StructureIndex>> {
        self.strategy
            .index(self.source)?
            .ok_or(QueryError::MissingIndex(accessor.name()))
    }

    fn eval(&self, node: &PlanNode, env: &mut Env) -> QueryResult<Value> {
        match node {
            PlanNode::Constant(value) => Ok(value.clone()),

            PlanNode::Parameter(name) => env
                .get(name)
                .cloned()
                .ok_or_else(|| QueryError::UnboundParameter(name.clone())),

            PlanNode::Source => Ok(Value::from_records(self.stream()?.iter().cloned())),

            PlanNode::TypeCheck { operand, kind } => {
                let value = self.eval(operand, env)?;
                Ok(Value::Bool(
                    value.as_record().is_some_and(|r| r.kind == *kind),
                ))
            }

            PlanNode::Cast { operand, kind } => match self.eval(operand, env)? {
                Value::Record(r) if r.kind == *kind => Ok(Value::Record(r)),
                _ => Ok(Value::Null),
            },

            PlanNode::Conditional {
                condition,
                if_true,
                if_false,
            } => {
                if self.eval(condition, env)?.is_truthy() {
                    self.eval(if_true, env)
                } else {
                    self.eval(if_false, env)
                }
            }

            PlanNode::Field {
                receiver,
                kind,
                name,
            } => {
                let receiver = self.eval(receiver, env)?;
                read_field(&receiver, *kind, name)
            }

            PlanNode::Call { receiver, op, args } => {
                let receiver = receiver
                    .as_ref()
                    .map(|r| self.eval(r, env))
                    .transpose()?;
                if is_combinator(*op) {
                    self.combinator(*op, receiver, args, env)
                } else {
                    let values = self.eval_all(args, env)?;
                    self.navigate(*op, receiver, &values)
                }
            }

            PlanNode::Lambda { .. } => Err(QueryError::TypeMismatch {
                expected: "value",
                found: "lambda",
            }),

            PlanNode::Construct { members } => {
                let mut object = Vec::with_capacity(members.len());
                for (name, member) in members {
                    object.push((name.clone(), self.eval(member, env)?));
                }
                Ok(Value::Object(object))
            }

            PlanNode::List(items) => Ok(Value::List(self.eval_all(items, env)?)),

            PlanNode::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs, env),

            PlanNode::Unary { op, operand } => {
                let value = self.eval(operand, env)?;
                unary(*op, value)
            }

            PlanNode::Indexed { accessor, args } => {
                let values = self.eval_all(args, env)?;
                let index = self.index(*accessor)?;
                indexed(&index, *accessor, &values)
            }
        }
    }

    fn eval_all(&self, nodes: &[PlanNode], env: &mut Env) -> QueryResult<Vec<Value>> {
        nodes.iter().map(|n| self.eval(n, env)).collect()
    }

    /// Bind a single-parameter lambda to `item` and evaluate its body
    fn apply(&self, lambda: &PlanNode, item: Value, env: &mut Env) -> QueryResult<Value> {
        let PlanNode::Lambda { params, body } = lambda else {
            return Err(QueryError::TypeMismatch {
                expected: "lambda",
                found: "expression",
            });
        };
        let [param] = params.as_slice() else {
            return Err(QueryError::Arity {
                op: "lambda",
                expected: 1,
                found: params.len(),
            });
        };

        let shadowed = env.insert(param.clone(), item);
        let result = self.eval(body, env);
        match shadowed {
            Some(previous) => env.insert(param.clone(), previous),
            None => env.remove(param),
        };
        result
    }

    fn combinator(
        &self,
        op: Operation,
        receiver: Option<Value>,
        args: &[PlanNode],
        env: &mut Env,
    ) -> QueryResult<Value> {
        let receiver = receiver.ok_or(QueryError::TypeMismatch {
            expected: "list",
            found: "no receiver",
        })?;
        let items = match receiver {
            Value::Null => return Ok(Value::Null),
            Value::List(items) => items,
            other => {
                return Err(QueryError::TypeMismatch {
                    expected: "list",
                    found: other.type_name(),
                });
            }
        };

        match op {
            Operation::Filter => {
                let lambda = single_arg(op, args)?;
                let mut kept = Vec::new();
                for item in items {
                    if self.apply(lambda, item.clone(), env)?.is_truthy() {
                        kept.push(item);
                    }
                }
                Ok(Value::List(kept))
            }
            Operation::Map => {
                let lambda = single_arg(op, args)?;
                let mapped = items
                    .into_iter()
                    .map(|item| self.apply(lambda, item, env))
                    .collect::<QueryResult<Vec<_>>>()?;
                Ok(Value::List(mapped))
            }
            Operation::Count => {
                expect_arity(op, args.len(), 0)?;
                Ok(Value::Int(items.len() as i64))
            }
            Operation::First => {
                expect_arity(op, args.len(), 0)?;
                Ok(items.into_iter().next().unwrap_or(Value::Null))
            }
            Operation::Any => match args {
                [] => Ok(Value::Bool(!items.is_empty())),
                [lambda] => {
                    for item in items {
                        if self.apply(lambda, item, env)?.is_truthy() {
                            return Ok(Value::Bool(true));
                        }
                    }
                    Ok(Value::Bool(false))
                }
                _ => Err(QueryError::Arity {
                    op: op.name(),
                    expected: 1,
                    found: args.len(),
                }),
            },
            _ => unreachable!("not a combinator: {}", op.name()),
        }
    }

    /// Generic navigation over the prepared stream, or over the receiver's
    /// records when the call has one
    fn navigate(
        &self,
        op: Operation,
        receiver: Option<Value>,
        args: &[Value],
    ) -> QueryResult<Value> {
        expect_arity(op, args.len(), navigation_arity(op))?;
        let records: Rc<[RecordRef]> = match receiver {
            None => self.stream()?,
            Some(Value::Null) => return Ok(Value::Null),
            Some(value @ Value::List(_)) => value.records().into(),
            Some(other) => {
                return Err(QueryError::TypeMismatch {
                    expected: "list",
                    found: other.type_name(),
                });
            }
        };
        let records = &*records;

        let value = match op {
            Operation::LotOpen => Value::from_optional(scan::lot_open(records)),
            Operation::LotClose => Value::from_optional(scan::lot_close(records)),
            Operation::PartCounts => {
                Value::from_records(scan::records_of_kind(records, RecordKind::Pcr))
            }
            Operation::PartCountsFor => match head_site_args(args)? {
                Some((head, site)) => Value::from_records(scan::part_counts_for(records, head, site)),
                None => Value::List(Vec::new()),
            },
            Operation::SummaryPartCounts => {
                let summary = self.summary_head()?;
                Value::from_records(scan::summary_part_counts(records, summary))
            }
            Operation::Children(kind) => match record_arg(&args[0], Some(kind))? {
                Some(marker) => Value::from_records(scan::children(records, &marker)),
                None => Value::Null,
            },
            Operation::MatchingPartClose => match record_arg(&args[0], Some(RecordKind::Pir))? {
                Some(pir) => Value::from_optional(scan::matching_part_close(records, &pir)),
                None => Value::Null,
            },
            Operation::MatchingPartOpen => match record_arg(&args[0], Some(RecordKind::Prr))? {
                Some(prr) => Value::from_optional(scan::matching_part_open(records, &prr)),
                None => Value::Null,
            },
            Operation::WaferOpen => match record_arg(&args[0], None)? {
                Some(record) => Value::from_optional(scan::wafer_open(records, &record)),
                None => Value::Null,
            },
            Operation::WaferClose => match record_arg(&args[0], None)? {
                Some(record) => Value::from_optional(scan::wafer_close(records, &record)),
                None => Value::Null,
            },
            Operation::AllPartOpens => {
                Value::from_records(scan::records_of_kind(records, RecordKind::Pir))
            }
            Operation::AllPartCloses => {
                Value::from_records(scan::records_of_kind(records, RecordKind::Prr))
            }
            Operation::OfKind(kind) => Value::from_records(scan::records_of_kind(records, kind)),
            Operation::Filter
            | Operation::Map
            | Operation::Count
            | Operation::First
            | Operation::Any => unreachable!("combinator dispatched as navigation"),
        };
        Ok(value)
    }

    /// Summary head of the strategy's index when it keeps one
    fn summary_head(&self) -> QueryResult<u8> {
        Ok(match self.strategy.index(self.source)? {
            Some(index) => index.config().summary_head,
            None => crate::config::SUMMARY_HEAD,
        })
    }

    fn binary(
        &self,
        op: BinaryOp,
        lhs: &PlanNode,
        rhs: &PlanNode,
        env: &mut Env,
    ) -> QueryResult<Value> {
        match op {
            BinaryOp::And => {
                if !self.eval(lhs, env)?.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(self.eval(rhs, env)?.is_truthy()))
            }
            BinaryOp::Or => {
                if self.eval(lhs, env)?.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(self.eval(rhs, env)?.is_truthy()))
            }
            _ => {
                let lhs = self.eval(lhs, env)?;
                let rhs = self.eval(rhs, env)?;
                binary(op, &lhs, &rhs)
            }
        }
    }
}

fn is_combinator(op: Operation) -> bool {
    matches!(
        op,
        Operation::Filter | Operation::Map | Operation::Count | Operation::First | Operation::Any
    )
}

fn navigation_arity(op: Operation) -> usize {
    match op {
        Operation::PartCountsFor => 2,
        Operation::Children(_)
        | Operation::MatchingPartClose
        | Operation::MatchingPartOpen
        | Operation::WaferOpen
        | Operation::WaferClose => 1,
        _ => 0,
    }
}

fn expect_arity(op: Operation, found: usize, expected: usize) -> QueryResult<()> {
    if found == expected {
        Ok(())
    } else {
        Err(QueryError::Arity {
            op: op.name(),
            expected,
            found,
        })
    }
}

fn single_arg(op: Operation, args: &[PlanNode]) -> QueryResult<&PlanNode> {
    match args {
        [arg] => Ok(arg),
        _ => Err(QueryError::Arity {
            op: op.name(),
            expected: 1,
            found: args.len(),
        }),
    }
}

/// A record argument; null passes through as `None`
fn record_arg(value: &Value, expected: Option<RecordKind>) -> QueryResult<Option<RecordRef>> {
    match value {
        Value::Null => Ok(None),
        Value::Record(r) => match expected {
            Some(kind) if r.kind != kind => Err(QueryError::TypeMismatch {
                expected: kind.name(),
                found: r.kind.name(),
            }),
            _ => Ok(Some(r.clone())),
        },
        other => Err(QueryError::TypeMismatch {
            expected: expected.map_or("record", RecordKind::name),
            found: other.type_name(),
        }),
    }
}

/// `(head, site)` arguments; `None` when out of range, so nothing matches
fn head_site_args(args: &[Value]) -> QueryResult<Option<(u8, u8)>> {
    let number = |v: &Value| match v {
        Value::Int(i) => Ok(u8::try_from(*i).ok()),
        other => Err(QueryError::TypeMismatch {
            expected: "int",
            found: other.type_name(),
        }),
    };
    let head = number(&args[0])?;
    let site = number(&args[1])?;
    Ok(head.zip(site))
}

fn read_field(receiver: &Value, kind: Option<RecordKind>, name: &str) -> QueryResult<Value> {
    match receiver {
        Value::Null => Ok(Value::Null),
        Value::Record(record) => {
            if let Some(kind) = kind
                && record.kind != kind
            {
                return Err(QueryError::TypeMismatch {
                    expected: kind.name(),
                    found: record.kind.name(),
                });
            }
            Ok(record.field(name).map_or(Value::Null, Value::from))
        }
        Value::Object(members) => Ok(members
            .iter()
            .find(|(member, _)| member == name)
            .map_or(Value::Null, |(_, value)| value.clone())),
        other => Err(QueryError::TypeMismatch {
            expected: "record",
            found: other.type_name(),
        }),
    }
}

fn indexed(
    index: &StructureIndex,
    accessor: IndexedAccessor,
    args: &[Value],
) -> QueryResult<Value> {
    expect_arity(accessor.operation(), args.len(), accessor.arity())?;

    let value = match accessor {
        IndexedAccessor::LotOpen => Value::from_optional(index.lot_open().cloned()),
        IndexedAccessor::LotClose => Value::from_optional(index.lot_close().cloned()),
        IndexedAccessor::PartCounts => Value::from_records(index.part_counts().iter().cloned()),
        IndexedAccessor::PartCountsFor => match head_site_args(args)? {
            Some((head, site)) => Value::from_records(index.part_counts_for(head, site)),
            None => Value::List(Vec::new()),
        },
        IndexedAccessor::SummaryPartCounts => Value::from_records(index.summary_part_counts()),
        IndexedAccessor::PartOpenChildren => match record_arg(&args[0], Some(RecordKind::Pir))? {
            Some(pir) => Value::from_records(index.part_open_children(&pir)?),
            None => Value::Null,
        },
        IndexedAccessor::PartCloseChildren => match record_arg(&args[0], Some(RecordKind::Prr))? {
            Some(prr) => Value::from_records(index.part_close_children(&prr)?),
            None => Value::Null,
        },
        IndexedAccessor::MatchingPartClose => match record_arg(&args[0], Some(RecordKind::Pir))? {
            Some(pir) => Value::from_optional(index.matching_part_close(&pir)),
            None => Value::Null,
        },
        IndexedAccessor::MatchingPartOpen => match record_arg(&args[0], Some(RecordKind::Prr))? {
            Some(prr) => Value::from_optional(index.matching_part_open(&prr)),
            None => Value::Null,
        },
        IndexedAccessor::WaferOpen => match record_arg(&args[0], None)? {
            Some(record) => Value::from_optional(index.wafer_open(&record)),
            None => Value::Null,
        },
        IndexedAccessor::WaferClose => match record_arg(&args[0], None)? {
            Some(record) => Value::from_optional(index.wafer_close(&record)),
            None => Value::Null,
        },
        IndexedAccessor::AllPartOpens => Value::from_records(index.all_part_opens()),
        IndexedAccessor::AllPartCloses => Value::from_records(index.all_part_closes()),
    };
    Ok(value)
}

fn unary(op: UnaryOp, value: Value) -> QueryResult<Value> {
    match (op, value) {
        (UnaryOp::IsNull, value) => Ok(Value::Bool(value == Value::Null)),
        (UnaryOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
        (UnaryOp::Neg, Value::Null) => Ok(Value::Null),
        (UnaryOp::Neg, Value::Int(i)) => Ok(Value::Int(-i)),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Neg, other) => Err(QueryError::TypeMismatch {
            expected: "number",
            found: other.type_name(),
        }),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

/// Equality with int/float promotion
fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Int(a), Value::Float(_)) | (Value::Float(_), Value::Int(a)) => {
            let other = if matches!(lhs, Value::Int(_)) { rhs } else { lhs };
            as_number(other) == Some(*a as f64)
        }
        _ => lhs == rhs,
    }
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> QueryResult<Value> {
    match op {
        BinaryOp::Eq => return Ok(Value::Bool(values_equal(lhs, rhs))),
        BinaryOp::Ne => return Ok(Value::Bool(!values_equal(lhs, rhs))),
        _ => {}
    }
    if matches!(lhs, Value::Null) || matches!(rhs, Value::Null) {
        return Ok(Value::Null);
    }

    let mismatch = || QueryError::TypeMismatch {
        expected: "number",
        found: if as_number(lhs).is_none() {
            lhs.type_name()
        } else {
            rhs.type_name()
        },
    };

    match op {
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (lhs, rhs) {
                (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
                _ => {
                    let (a, b) = as_number(lhs).zip(as_number(rhs)).ok_or_else(mismatch)?;
                    a.partial_cmp(&b)
                }
            };
            let Some(ordering) = ordering else {
                return Ok(Value::Bool(false));
            };
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
            if let (Value::Int(a), Value::Int(b)) = (lhs, rhs) {
                let result = match op {
                    BinaryOp::Add => a.checked_add(*b),
                    BinaryOp::Sub => a.checked_sub(*b),
                    BinaryOp::Mul => a.checked_mul(*b),
                    _ => a.checked_div(*b),
                };
                return Ok(result.map_or(Value::Null, Value::Int));
            }
            let (a, b) = as_number(lhs).zip(as_number(rhs)).ok_or_else(mismatch)?;
            Ok(Value::Float(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                _ => a / b,
            }))
        }
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::And | BinaryOp::Or => {
            unreachable!("handled before operand evaluation")
        }
    }
}
