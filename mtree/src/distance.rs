//! Distance functions and the distance query seam used by the tree.
//!
//! The tree never looks at objects itself. It asks a [`DistanceQuery`] for
//! distances between stored object ids, or between a query object and a
//! stored id. The search relies on the metric properties (non-negativity,
//! symmetry, triangle inequality) for its pruning but does not verify them.

use crate::errors::MTreeResult;
use crate::tree::mtree_types::DbId;

/// A distance function over objects of type `O`.
pub trait DistanceFunction<O: ?Sized>: Send + Sync {
    fn distance(&self, a: &O, b: &O) -> f64;

    /// Short name used in logs and summaries.
    fn name(&self) -> &'static str;
}

/// Distance evaluation against stored objects.
pub trait DistanceQuery: Send + Sync {
    /// Type of a free-standing query object.
    type Object: ?Sized;

    /// Distance between two stored objects.
    fn distance(&self, a: DbId, b: DbId) -> MTreeResult<f64>;

    /// Distance between a query object and a stored object.
    fn distance_to_object(&self, query: &Self::Object, id: DbId) -> MTreeResult<f64>;

    /// Returns true if `id` refers to a stored object.
    fn contains(&self, id: DbId) -> bool;
}

/// Euclidean (L2) distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanDistance;

impl DistanceFunction<[f64]> for EuclideanDistance {
    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f64>()
            .sqrt()
    }

    fn name(&self) -> &'static str {
        "euclidean"
    }
}

/// Manhattan (L1) distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManhattanDistance;

impl DistanceFunction<[f64]> for ManhattanDistance {
    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
    }

    fn name(&self) -> &'static str {
        "manhattan"
    }
}

/// Maximum (L-infinity / Chebyshev) distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaximumDistance;

impl DistanceFunction<[f64]> for MaximumDistance {
    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f64::max)
    }

    fn name(&self) -> &'static str {
        "maximum"
    }
}

/// General Lp norm distance. Only a metric for `p >= 1`.
#[derive(Debug, Clone, Copy)]
pub struct LpNormDistance {
    p: f64,
}

impl LpNormDistance {
    /// Creates an Lp distance; `p` is clamped to at least 1.
    pub fn new(p: f64) -> Self {
        if p < 1.0 {
            log::warn!("Lp norm with p = {} is not a metric, using p = 1", p);
        }
        Self { p: p.max(1.0) }
    }

    pub fn p(&self) -> f64 {
        self.p
    }
}

impl DistanceFunction<[f64]> for LpNormDistance {
    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y).abs().powf(self.p))
            .sum::<f64>()
            .powf(1.0 / self.p)
    }

    fn name(&self) -> &'static str {
        "lp-norm"
    }
}

impl<O: ?Sized, F: DistanceFunction<O> + ?Sized> DistanceFunction<O> for Box<F> {
    fn distance(&self, a: &O, b: &O) -> f64 {
        (**self).distance(a, b)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
