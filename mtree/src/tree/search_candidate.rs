//! Priority queue elements of the kNN search.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::hash::{Hash, Hasher};

use super::mtree_types::{DbId, PageId};

/// A subtree waiting to be expanded by the kNN search.
///
/// Equality and hashing use `node_id` only: two candidates are the same
/// candidate if they lead to the same node. The expansion order is a
/// different relation and lives in [`CandidateQueue`].
#[derive(Debug, Clone, Copy)]
pub struct SearchCandidate {
    /// Lower bound of the distance from the query to anything below `node_id`
    pub min_dist: f64,
    pub node_id: PageId,
    /// Routing object that led here, `None` for the root
    pub routing_object_id: Option<DbId>,
    /// Distance from the query to `routing_object_id`, 0 for the root
    pub routing_distance: f64,
}

impl SearchCandidate {
    pub fn new(
        min_dist: f64,
        node_id: PageId,
        routing_object_id: Option<DbId>,
        routing_distance: f64,
    ) -> Self {
        Self {
            min_dist,
            node_id,
            routing_object_id,
            routing_distance,
        }
    }

    /// The synthetic candidate for the root node.
    pub fn root(node_id: PageId) -> Self {
        Self::new(0.0, node_id, None, 0.0)
    }
}

impl PartialEq for SearchCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.node_id == other.node_id
    }
}

impl Eq for SearchCandidate {}

impl Hash for SearchCandidate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node_id.hash(state);
    }
}

/// Min-priority queue of candidates ordered by `min_dist`.
///
/// Candidates with equal `min_dist` are popped in insertion order.
#[derive(Debug, Default)]
pub struct CandidateQueue {
    heap: BinaryHeap<QueuedCandidate>,
    sequence: u64,
}

#[derive(Debug)]
struct QueuedCandidate {
    sequence: u64,
    candidate: SearchCandidate,
}

impl QueuedCandidate {
    fn priority(&self, other: &Self) -> Ordering {
        // reversed: BinaryHeap pops the greatest element
        other
            .candidate
            .min_dist
            .total_cmp(&self.candidate.min_dist)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialEq for QueuedCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.priority(other) == Ordering::Equal
    }
}

impl Eq for QueuedCandidate {}

impl PartialOrd for QueuedCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority(other)
    }
}

impl CandidateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, candidate: SearchCandidate) {
        self.sequence += 1;
        self.heap.push(QueuedCandidate {
            sequence: self.sequence,
            candidate,
        });
    }

    /// Removes the candidate with the smallest `min_dist`.
    pub fn pop(&mut self) -> Option<SearchCandidate> {
        self.heap.pop().map(|queued| queued.candidate)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
