//! Query instrumentation.
//!
//! The search algorithms report into a [`StatisticsSink`] that is passed to
//! them explicitly. [`TreeStatistics`] is the atomic implementation owned by
//! each tree; [`NoopStatistics`] discards everything.

use std::sync::atomic::{AtomicU64, Ordering};

/// Receiver of query counters. All methods are fire-and-forget.
pub trait StatisticsSink: Send + Sync {
    fn count_distance_calculation(&self) {}

    fn count_knn_query(&self) {}

    fn count_range_query(&self) {}
}

/// A sink that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStatistics;

impl StatisticsSink for NoopStatistics {}

/// Atomic counters shared by all queries running against one tree.
#[derive(Debug, Default)]
pub struct TreeStatistics {
    distance_calculations: AtomicU64,
    knn_queries: AtomicU64,
    range_queries: AtomicU64,
}

/// Point-in-time copy of [`TreeStatistics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatisticsSnapshot {
    pub distance_calculations: u64,
    pub knn_queries: u64,
    pub range_queries: u64,
}

impl TreeStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            distance_calculations: self.distance_calculations.load(Ordering::Relaxed),
            knn_queries: self.knn_queries.load(Ordering::Relaxed),
            range_queries: self.range_queries.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.distance_calculations.store(0, Ordering::Relaxed);
        self.knn_queries.store(0, Ordering::Relaxed);
        self.range_queries.store(0, Ordering::Relaxed);
    }
}

impl StatisticsSink for TreeStatistics {
    fn count_distance_calculation(&self) {
        self.distance_calculations.fetch_add(1, Ordering::Relaxed);
    }

    fn count_knn_query(&self) {
        self.knn_queries.fetch_add(1, Ordering::Relaxed);
    }

    fn count_range_query(&self) {
        self.range_queries.fetch_add(1, Ordering::Relaxed);
    }
}

impl StatisticsSnapshot {
    /// Counter difference between `self` and an earlier snapshot.
    pub fn since(&self, earlier: &StatisticsSnapshot) -> StatisticsSnapshot {
        StatisticsSnapshot {
            distance_calculations: self
                .distance_calculations
                .saturating_sub(earlier.distance_calculations),
            knn_queries: self.knn_queries.saturating_sub(earlier.knn_queries),
            range_queries: self.range_queries.saturating_sub(earlier.range_queries),
        }
    }
}
