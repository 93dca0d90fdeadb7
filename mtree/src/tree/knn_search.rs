//! k-nearest-neighbor queries.
//!
//! Best-first traversal: subtrees wait in a [`CandidateQueue`] ordered by a
//! lower bound of the distance from the query to anything they contain, and
//! results collect in a [`KnnHeap`]. The search stops as soon as the closest
//! pending subtree cannot beat the current k-th distance.

use crate::errors::{MTreeError, MTreeResult};
use crate::results::DistanceResult;
use crate::tree::knn_heap::KnnHeap;
use crate::tree::mtree_types::Node;
use crate::tree::query_context::QueryContext;
use crate::tree::search_candidate::{CandidateQueue, SearchCandidate};

/// Returns the `k` objects closest to the query, ascending by distance with
/// ties broken by object id. Fewer than `k` objects are returned only when
/// the tree holds fewer.
pub(crate) fn knn_search(ctx: &QueryContext<'_>, k: usize) -> MTreeResult<Vec<DistanceResult>> {
    if k == 0 {
        return Err(MTreeError::InvalidArgument(
            "k must be at least 1".into(),
        ));
    }
    let Some(root) = ctx.storage.root_page() else {
        return Ok(Vec::new());
    };

    let mut heap = KnnHeap::new(k);
    let mut queue = CandidateQueue::new();
    queue.push(SearchCandidate::root(root));

    while let Some(candidate) = queue.pop() {
        if candidate.min_dist > heap.kth_distance() {
            break;
        }

        let node = ctx.storage.read_node(candidate.node_id)?;
        let d1 = candidate.routing_distance;
        let has_routing = candidate.routing_object_id.is_some();

        match &*node {
            Node::Directory { entries } => {
                for entry in entries {
                    let d_k = heap.kth_distance();
                    let d2 = if has_routing { entry.parent_distance } else { 0.0 };
                    if (d1 - d2).abs() > d_k + entry.covering_radius {
                        continue;
                    }
                    let d3 = ctx.distance(entry.routing_object_id)?;
                    let d_min = (d3 - entry.covering_radius).max(0.0);
                    if d_min <= d_k {
                        queue.push(SearchCandidate::new(
                            d_min,
                            entry.child_page,
                            Some(entry.routing_object_id),
                            d3,
                        ));
                    }
                }
            }
            Node::Leaf { entries } => {
                for entry in entries {
                    let d_k = heap.kth_distance();
                    let d2 = if has_routing { entry.parent_distance } else { 0.0 };
                    if (d1 - d2).abs() > d_k {
                        continue;
                    }
                    let d3 = ctx.distance(entry.object_id)?;
                    if d3 <= d_k {
                        heap.insert(d3, entry.object_id);
                    }
                }
            }
        }
    }

    Ok(heap.into_sorted_vec())
}
