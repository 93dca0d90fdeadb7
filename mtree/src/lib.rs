//! # M-tree - Metric Similarity Search
//!
//! This crate provides an M-tree: a balanced, page-based index over objects
//! of any metric space. It answers range queries ("all objects within `r`")
//! and k-nearest-neighbor queries, using only a distance function that
//! satisfies the triangle inequality.
//!
//! ## Features
//!
//! - **Metric Pruning**: Stored parent distances and covering radii skip
//!   subtrees without computing their distance to the query
//! - **Best-First kNN**: Candidate subtrees are visited in order of their
//!   distance lower bound; the search stops as soon as none can improve the result
//! - **Pluggable Storage**: In-memory nodes or a page file with an LRU cache
//! - **Persistent**: Page files survive process restarts and are checksummed
//! - **Thread Safe**: Concurrent queries, serialized inserts
//! - **Instrumented**: Distance calculations and queries are counted
//!
//! ## Quick Start
//!
//! ```rust
//! use mtree::{EuclideanDistance, MTree, MTreeConfig, Relation, VectorDistanceQuery};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let relation: Relation<Vec<f64>> = vec![
//!     vec![0.0, 0.0],
//!     vec![1.0, 0.0],
//!     vec![0.0, 1.0],
//!     vec![5.0, 5.0],
//! ]
//! .into_iter()
//! .collect();
//!
//! let tree = MTree::in_memory(
//!     VectorDistanceQuery::new(relation.clone(), EuclideanDistance),
//!     MTreeConfig::default(),
//! )?;
//! tree.insert_all(relation.ids())?;
//!
//! let nearest = tree.knn_for_object(&[0.2, 0.1], 2)?;
//! assert_eq!(nearest[0].id, 1);
//!
//! let mut within: Vec<mtree::DbId> = Vec::new();
//! tree.range_for_object(&[0.0, 0.0], 1.0, &mut within)?;
//! assert_eq!(within.len(), 3);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod distance;
pub mod errors;
pub mod relation;
pub mod results;
pub mod statistics;
pub mod storage;
pub mod tree;

pub use config::MTreeConfig;
pub use distance::{
    DistanceFunction, DistanceQuery, EuclideanDistance, LpNormDistance, ManhattanDistance,
    MaximumDistance,
};
pub use errors::{MTreeError, MTreeResult};
pub use relation::{Relation, RelationDistanceQuery, VectorDistanceQuery};
pub use results::{DistanceResult, RangeCollector};
pub use statistics::{NoopStatistics, StatisticsSink, StatisticsSnapshot, TreeStatistics};
pub use storage::{MemoryStorage, NodeStorage, PageFileStorage, StorageStats};
pub use tree::{DbId, IntegrityReport, MTree, MTreeStats, PageId, TreeSummary};
