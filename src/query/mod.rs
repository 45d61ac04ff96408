pub mod executor;
pub mod plan;
pub mod rewriter;
pub mod scan;
pub mod usage;

pub use executor::QueryExecutor;
pub use plan::{BinaryOp, IndexedAccessor, Operation, PlanNode, UnaryOp, Value};
pub use rewriter::{QueryRewriter, RewriteStats};
pub use usage::{UsageAnalyzer, UsageSet};
