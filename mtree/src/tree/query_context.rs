//! State shared by one query traversal.

use crate::errors::MTreeResult;
use crate::statistics::StatisticsSink;
use crate::storage::NodeStorage;
use crate::tree::mtree_types::DbId;

/// Borrowed collaborators of a single query: the node storage, the
/// statistics sink, and the distance from the query to a stored object.
pub(crate) struct QueryContext<'a> {
    pub storage: &'a dyn NodeStorage,
    pub stats: &'a dyn StatisticsSink,
    query_distance: &'a (dyn Fn(DbId) -> MTreeResult<f64> + 'a),
}

impl<'a> QueryContext<'a> {
    pub fn new(
        storage: &'a dyn NodeStorage,
        stats: &'a dyn StatisticsSink,
        query_distance: &'a (dyn Fn(DbId) -> MTreeResult<f64> + 'a),
    ) -> Self {
        Self {
            storage,
            stats,
            query_distance,
        }
    }

    /// Distance from the query to `id`; every call is counted.
    pub fn distance(&self, id: DbId) -> MTreeResult<f64> {
        self.stats.count_distance_calculation();
        (self.query_distance)(id)
    }
}
