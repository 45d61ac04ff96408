//! # stdfi - Structural Indexing for STDF Test Logs
//!
//! stdfi discovers the lot, wafer and part structure of an STDF V4 record
//! stream in a single forward pass and uses it to answer structural
//! navigation queries without rescanning the stream.
//!
//! ## Architecture
//!
//! The crate is organized into these main modules:
//!
//! - [`record`] - Decoded records, kinds and the restartable record source
//! - [`index`] - Extent discovery and index-backed navigation
//! - [`query`] - Query plans, rewriting, field usage analysis and execution
//! - [`strategy`] - Pass-through and caching indexing strategies
//! - [`config`] - Engine configuration
//! - [`error`] - Index and query faults
//!
//! ## Quick Start
//!
//! ```ignore
//! use stdfi::query::{Operation, PlanNode, QueryExecutor, UsageAnalyzer};
//! use stdfi::strategy::CachingStrategy;
//!
//! // records: Vec<Record> from the external decoder
//! let plan = PlanNode::call(Operation::AllPartCloses, vec![]).method(Operation::Count, vec![]);
//!
//! // Fields the decoder must populate for this plan
//! let schema = UsageAnalyzer::analyze(&plan).to_schema();
//!
//! let strategy = CachingStrategy::default();
//! let executor = QueryExecutor::new(&records, &strategy);
//! let parts = executor.execute_optimized(&plan).unwrap();
//! ```
//!
//! ## Performance
//!
//! The [`strategy::CachingStrategy`] enumerates the source once, building:
//!
//! 1. **Wafer and part extents** - index/offset ranges found by binary search
//! 2. **Marker caches** - the lot's MIR and MRR plus every PCR
//!
//! Rewritten plans then answer child, matching-marker and wafer lookups
//! from a single extent instead of a full stream scan.

pub mod config;
pub mod error;
pub mod index;
pub mod query;
pub mod record;
pub mod strategy;
