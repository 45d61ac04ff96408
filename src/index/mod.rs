pub mod build;
pub mod navigate;
pub mod parent_map;
pub mod stats;
pub mod types;

pub use build::ExtentIndexBuilder;
pub use navigate::StructureIndex;
pub use parent_map::ParentMap;
pub use stats::IndexStats;
pub use types::*;
