//! Query result types.

use std::cmp::Ordering;

use crate::tree::mtree_types::DbId;

/// An object id paired with its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceResult {
    pub distance: f64,
    pub id: DbId,
}

impl DistanceResult {
    pub fn new(distance: f64, id: DbId) -> Self {
        Self { distance, id }
    }

    /// Total order by distance, then id.
    pub fn cmp_by_distance(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Receives matches of a range query.
pub trait RangeCollector {
    fn add(&mut self, distance: f64, id: DbId);
}

impl RangeCollector for Vec<DistanceResult> {
    fn add(&mut self, distance: f64, id: DbId) {
        self.push(DistanceResult::new(distance, id));
    }
}

impl RangeCollector for Vec<DbId> {
    fn add(&mut self, _distance: f64, id: DbId) {
        self.push(id);
    }
}

/// Sorts results ascending by distance, ties by id.
pub fn sort_by_distance(results: &mut [DistanceResult]) {
    results.sort_by(DistanceResult::cmp_by_distance);
}
