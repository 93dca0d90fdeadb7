//! Bounded result heap of the kNN search.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::mtree_types::DbId;
use crate::results::DistanceResult;

/// Keeps the k best `(distance, id)` pairs seen so far.
///
/// Pairs are ordered by distance and then by id, so among equally distant
/// objects the smaller id is kept.
#[derive(Debug)]
pub struct KnnHeap {
    k: usize,
    heap: BinaryHeap<HeapEntry>,
}

#[derive(Debug, Clone, Copy)]
struct HeapEntry(DistanceResult);

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp_by_distance(&other.0)
    }
}

impl KnnHeap {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k.saturating_add(1).min(1024)),
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.k
    }

    /// Offers a result; returns true if it was kept.
    pub fn insert(&mut self, distance: f64, id: DbId) -> bool {
        let entry = HeapEntry(DistanceResult::new(distance, id));
        if !self.is_full() {
            self.heap.push(entry);
            return true;
        }
        match self.heap.peek() {
            Some(worst) if entry < *worst => {
                self.heap.pop();
                self.heap.push(entry);
                true
            }
            _ => false,
        }
    }

    /// Current pruning bound: the k-th smallest distance, or infinity while
    /// fewer than k results are known.
    pub fn kth_distance(&self) -> f64 {
        if self.is_full() {
            self.heap
                .peek()
                .map(|worst| worst.0.distance)
                .unwrap_or(f64::INFINITY)
        } else {
            f64::INFINITY
        }
    }

    /// Consumes the heap, returning results ascending by distance.
    pub fn into_sorted_vec(self) -> Vec<DistanceResult> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|entry| entry.0)
            .collect()
    }
}
