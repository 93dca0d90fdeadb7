//! Page-based M-tree for metric similarity search.
//!
//! This module provides:
//! - Node and entry types stored one node per page
//! - Range queries and best-first k-nearest-neighbor queries that prune
//!   subtrees through the triangle inequality
//! - Insertion with covering-radius maintenance and node splits
//! - Integrity checking and structural summaries

pub mod mtree_types;
pub mod mtree_constants;
pub mod knn_heap;
pub mod search_candidate;
pub mod integrity;
mod insert;
mod knn_search;
mod mtree_impl;
mod query_context;
mod range_search;

#[cfg(test)]
mod test_fixtures;

pub use mtree_types::{
    DbId, DirectoryEntry, FileHeader, LeafEntry, MTreeEntry, MTreeStats, Node, PageId,
    PageWithChecksum,
};
pub use mtree_constants::DEFAULT_CACHE_PAGES;
pub use integrity::{IntegrityReport, TreeSummary};
pub use knn_heap::KnnHeap;
pub use search_candidate::{CandidateQueue, SearchCandidate};
pub use mtree_impl::MTree;
