//! Indexing strategies.
//!
//! A strategy decides how the record stream is prepared for query execution
//! and whether plans are rewritten to use the structural index.

use crate::config::IndexConfig;
use crate::error::{IndexError, IndexResult};
use crate::index::{ExtentIndexBuilder, StructureIndex};
use crate::query::plan::PlanNode;
use crate::query::rewriter::QueryRewriter;
use crate::record::{RecordRef, RecordSource};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, warn};

/// Prepared record sequence handed to query execution
pub type Records<'a> = Box<dyn Iterator<Item = RecordRef> + 'a>;

pub trait IndexingStrategy {
    /// Prepare the record sequence queries run over
    fn prepare<'a>(&'a self, source: &'a dyn RecordSource) -> IndexResult<Records<'a>>;

    /// Rewrite a plan for this strategy
    fn rewrite(&self, plan: &PlanNode) -> PlanNode;

    /// The structural index for `source`, if this strategy keeps one
    fn index(&self, source: &dyn RecordSource) -> IndexResult<Option<Rc<StructureIndex>>>;
}

/// Re-enumerates the source on every call and never indexes
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughStrategy;

impl IndexingStrategy for PassThroughStrategy {
    fn prepare<'a>(&'a self, source: &'a dyn RecordSource) -> IndexResult<Records<'a>> {
        Ok(Box::new(
            source
                .records()
                .enumerate()
                .map(|(i, record)| Rc::new(record.with_index(i))),
        ))
    }

    fn rewrite(&self, plan: &PlanNode) -> PlanNode {
        plan.clone()
    }

    fn index(&self, _source: &dyn RecordSource) -> IndexResult<Option<Rc<StructureIndex>>> {
        Ok(None)
    }
}

#[derive(Debug)]
enum BuildState {
    Empty,
    Building,
    Ready(Rc<StructureIndex>),
    Poisoned,
}

/// Builds the structural index on first enumeration and serves every later
/// call from it.
///
/// The source is enumerated exactly once per instance. Re-entering the build
/// (a source that triggers indexing while being enumerated) fails with
/// [`IndexError::Reentrancy`]; a build that fails or unwinds leaves the
/// instance poisoned.
#[derive(Debug)]
pub struct CachingStrategy {
    config: IndexConfig,
    state: RefCell<BuildState>,
    reentered: Cell<bool>,
}

impl Default for CachingStrategy {
    fn default() -> Self {
        Self::new(IndexConfig::default())
    }
}

impl CachingStrategy {
    pub fn new(config: IndexConfig) -> Self {
        Self {
            config,
            state: RefCell::new(BuildState::Empty),
            reentered: Cell::new(false),
        }
    }

    pub fn is_built(&self) -> bool {
        matches!(*self.state.borrow(), BuildState::Ready(_))
    }

    pub fn is_poisoned(&self) -> bool {
        matches!(*self.state.borrow(), BuildState::Poisoned)
    }

    fn ensure_built(&self, source: &dyn RecordSource) -> IndexResult<Rc<StructureIndex>> {
        match &*self.state.borrow() {
            BuildState::Ready(index) => return Ok(index.clone()),
            BuildState::Poisoned => return Err(IndexError::Poisoned),
            BuildState::Building => {
                self.reentered.set(true);
                return Err(IndexError::Reentrancy);
            }
            BuildState::Empty => {}
        }

        self.state.replace(BuildState::Building);
        let guard = BuildGuard::new(&self.state);

        let mut builder = ExtentIndexBuilder::new(self.config.clone());
        for record in source.records() {
            builder.push(record)?;
            if self.reentered.get() {
                return Err(IndexError::Reentrancy);
            }
        }
        let index = Rc::new(builder.finish()?);
        if self.reentered.get() {
            return Err(IndexError::Reentrancy);
        }

        guard.complete(index.clone());
        Ok(index)
    }
}

impl IndexingStrategy for CachingStrategy {
    fn prepare<'a>(&'a self, source: &'a dyn RecordSource) -> IndexResult<Records<'a>> {
        let index = self.ensure_built(source)?;
        let len = index.records().len();
        Ok(Box::new((0..len).map(move |i| index.records()[i].clone())))
    }

    fn rewrite(&self, plan: &PlanNode) -> PlanNode {
        let mut rewriter = QueryRewriter::new();
        let rewritten = rewriter.rewrite(plan);
        let stats = rewriter.stats();
        debug!(
            substituted = stats.substituted,
            skipped = stats.skipped,
            "plan rewritten"
        );
        rewritten
    }

    fn index(&self, source: &dyn RecordSource) -> IndexResult<Option<Rc<StructureIndex>>> {
        self.ensure_built(source).map(Some)
    }
}

/// Poisons the strategy unless the build completes
struct BuildGuard<'a> {
    state: &'a RefCell<BuildState>,
    completed: bool,
}

impl<'a> BuildGuard<'a> {
    fn new(state: &'a RefCell<BuildState>) -> Self {
        Self {
            state,
            completed: false,
        }
    }

    fn complete(mut self, index: Rc<StructureIndex>) {
        self.state.replace(BuildState::Ready(index));
        self.completed = true;
    }
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            warn!("structural index build did not complete, strategy poisoned");
            self.state.replace(BuildState::Poisoned);
        }
    }
}
