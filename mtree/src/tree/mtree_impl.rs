//! MTree implementation.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use super::insert::Inserter;
use super::integrity::{self, IntegrityReport, TreeSummary};
use super::knn_search::knn_search;
use super::mtree_types::{DbId, MTreeStats};
use super::query_context::QueryContext;
use super::range_search::range_search;
use crate::config::MTreeConfig;
use crate::distance::DistanceQuery;
use crate::errors::{MTreeError, MTreeResult};
use crate::results::{DistanceResult, RangeCollector};
use crate::statistics::{StatisticsSink, TreeStatistics};
use crate::storage::{MemoryStorage, NodeStorage, PageFileStorage};

/// A metric tree over the objects of a [`DistanceQuery`].
///
/// The tree stores object ids only; all distances come from the distance
/// query. Queries run concurrently under a shared structure lock, inserts
/// take it exclusively. Cloning an `MTree` yields another handle to the
/// same tree.
pub struct MTree<Q: DistanceQuery> {
    inner: Arc<MTreeInner<Q>>,
}

struct MTreeInner<Q: DistanceQuery> {
    storage: Box<dyn NodeStorage>,
    distance_query: Q,
    config: MTreeConfig,
    statistics: TreeStatistics,
    /// Shared by queries, exclusive for inserts
    structure: RwLock<()>,
    /// Is the tree closed?
    closed: RwLock<bool>,
}

impl<Q: DistanceQuery> Clone for MTree<Q> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<Q: DistanceQuery> MTree<Q> {
    /// Build a tree on top of `storage`.
    ///
    /// An empty storage takes its capacities from `config`; a storage that
    /// already holds a tree keeps the capacities it was built with and
    /// `config` is updated to match.
    pub fn new<S>(storage: S, distance_query: Q, config: MTreeConfig) -> MTreeResult<Self>
    where
        S: NodeStorage + 'static,
    {
        config.validate()?;

        let mut header = storage.header();
        header.validate()?;
        if header.root().is_none() {
            header.leaf_capacity = config.leaf_capacity() as u32;
            header.directory_capacity = config.directory_capacity() as u32;
            storage.set_header(header)?;
        } else {
            config.set_leaf_capacity(header.leaf_capacity as usize);
            config.set_directory_capacity(header.directory_capacity as usize);
            config.validate()?;
        }

        Ok(Self {
            inner: Arc::new(MTreeInner {
                storage: Box::new(storage),
                distance_query,
                config,
                statistics: TreeStatistics::new(),
                structure: RwLock::new(()),
                closed: RwLock::new(false),
            }),
        })
    }

    /// Create an empty tree held entirely in memory.
    pub fn in_memory(distance_query: Q, config: MTreeConfig) -> MTreeResult<Self> {
        Self::new(MemoryStorage::new(), distance_query, config)
    }

    /// Create an empty tree backed by a new page file at `path`.
    pub fn create_file(
        path: impl AsRef<Path>,
        distance_query: Q,
        config: MTreeConfig,
    ) -> MTreeResult<Self> {
        let storage = PageFileStorage::create(path.as_ref(), &config)?;
        Self::new(storage, distance_query, config)
    }

    /// Open a tree previously written to `path`.
    ///
    /// Only the header is read; nodes are loaded on first access. The
    /// distance query must serve the same objects the tree was built from.
    pub fn open_file(
        path: impl AsRef<Path>,
        distance_query: Q,
        config: MTreeConfig,
    ) -> MTreeResult<Self> {
        let storage = PageFileStorage::open(path.as_ref(), &config)?;
        config.set_page_size(storage.page_size());
        Self::new(storage, distance_query, config)
    }

    fn check_closed(&self) -> MTreeResult<()> {
        if *self.inner.closed.read() {
            Err(MTreeError::Closed)
        } else {
            Ok(())
        }
    }

    pub fn config(&self) -> &MTreeConfig {
        &self.inner.config
    }

    pub fn distance_query(&self) -> &Q {
        &self.inner.distance_query
    }

    /// Number of indexed objects.
    pub fn size(&self) -> u64 {
        self.inner.storage.header().entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Number of levels, 0 for an empty tree.
    pub fn height(&self) -> u32 {
        self.inner.storage.header().height
    }

    // ------------------------------------------------------------------
    // Insertion
    // ------------------------------------------------------------------

    /// Index the stored object `id`.
    ///
    /// Fails with [`MTreeError::NotFound`] if the distance query does not
    /// know `id`; the tree is left unchanged in that case.
    pub fn insert(&self, id: DbId) -> MTreeResult<()> {
        self.check_closed()?;
        let _guard = self.inner.structure.write();
        self.inserter().insert(id)
    }

    /// Index several objects under one exclusive lock. Returns the number
    /// of objects inserted; stops at the first failure.
    pub fn insert_all<I>(&self, ids: I) -> MTreeResult<usize>
    where
        I: IntoIterator<Item = DbId>,
    {
        self.check_closed()?;
        let _guard = self.inner.structure.write();
        let inserter = self.inserter();
        let mut inserted = 0;
        for id in ids {
            inserter.insert(id)?;
            inserted += 1;
        }
        log::debug!(
            "Inserted {} objects, tree now holds {} (height {})",
            inserted,
            self.size(),
            self.height()
        );
        Ok(inserted)
    }

    fn inserter(&self) -> Inserter<'_, Q> {
        Inserter::new(
            self.inner.storage.as_ref(),
            &self.inner.distance_query,
            self.inner.config.leaf_capacity(),
            self.inner.config.directory_capacity(),
        )
    }

    // ------------------------------------------------------------------
    // kNN queries
    // ------------------------------------------------------------------

    /// The `k` objects nearest to `query`, ascending by distance (ties by id).
    pub fn knn_for_object(&self, query: &Q::Object, k: usize) -> MTreeResult<Vec<DistanceResult>> {
        self.knn_for_object_with_sink(query, k, &self.inner.statistics)
    }

    /// Like [`knn_for_object`](Self::knn_for_object) but reports into `sink`
    /// instead of the tree's own statistics.
    pub fn knn_for_object_with_sink(
        &self,
        query: &Q::Object,
        k: usize,
        sink: &dyn StatisticsSink,
    ) -> MTreeResult<Vec<DistanceResult>> {
        self.check_closed()?;
        check_k(k)?;
        sink.count_knn_query();

        let query_distance = |id: DbId| self.inner.distance_query.distance_to_object(query, id);
        let _guard = self.inner.structure.read();
        let ctx = QueryContext::new(self.inner.storage.as_ref(), sink, &query_distance);
        knn_search(&ctx, k)
    }

    /// The `k` objects nearest to the stored object `id`, which is itself
    /// part of the result when indexed.
    pub fn knn_for_id(&self, id: DbId, k: usize) -> MTreeResult<Vec<DistanceResult>> {
        self.check_closed()?;
        check_k(k)?;
        self.check_known(id)?;
        let _guard = self.inner.structure.read();
        self.knn_for_id_locked(id, k)
    }

    /// kNN for several stored objects under one shared lock.
    pub fn knn_batch(&self, ids: &[DbId], k: usize) -> MTreeResult<Vec<Vec<DistanceResult>>> {
        self.check_closed()?;
        check_k(k)?;
        for &id in ids {
            self.check_known(id)?;
        }

        let _guard = self.inner.structure.read();
        ids.iter()
            .map(|&id| self.knn_for_id_locked(id, k))
            .collect()
    }

    fn knn_for_id_locked(&self, id: DbId, k: usize) -> MTreeResult<Vec<DistanceResult>> {
        let sink: &dyn StatisticsSink = &self.inner.statistics;
        sink.count_knn_query();
        let query_distance = |other: DbId| self.inner.distance_query.distance(id, other);
        let ctx = QueryContext::new(self.inner.storage.as_ref(), sink, &query_distance);
        knn_search(&ctx, k)
    }

    // ------------------------------------------------------------------
    // Range queries
    // ------------------------------------------------------------------

    /// Add every object within `radius` of `query` to `collector`.
    ///
    /// A NaN radius is rejected; a negative radius matches nothing.
    pub fn range_for_object<C>(
        &self,
        query: &Q::Object,
        radius: f64,
        collector: &mut C,
    ) -> MTreeResult<()>
    where
        C: RangeCollector + ?Sized,
    {
        self.range_for_object_with_sink(query, radius, collector, &self.inner.statistics)
    }

    /// Like [`range_for_object`](Self::range_for_object) but reports into
    /// `sink` instead of the tree's own statistics.
    pub fn range_for_object_with_sink<C>(
        &self,
        query: &Q::Object,
        radius: f64,
        collector: &mut C,
        sink: &dyn StatisticsSink,
    ) -> MTreeResult<()>
    where
        C: RangeCollector + ?Sized,
    {
        self.check_closed()?;
        if !check_radius(radius)? {
            return Ok(());
        }
        sink.count_range_query();

        let query_distance = |id: DbId| self.inner.distance_query.distance_to_object(query, id);
        let _guard = self.inner.structure.read();
        let ctx = QueryContext::new(self.inner.storage.as_ref(), sink, &query_distance);
        range_search(&ctx, radius, collector)
    }

    /// Add every object within `radius` of the stored object `id` to `collector`.
    pub fn range_for_id<C>(&self, id: DbId, radius: f64, collector: &mut C) -> MTreeResult<()>
    where
        C: RangeCollector + ?Sized,
    {
        self.check_closed()?;
        if !check_radius(radius)? {
            return Ok(());
        }
        self.check_known(id)?;

        let sink: &dyn StatisticsSink = &self.inner.statistics;
        sink.count_range_query();
        let query_distance = |other: DbId| self.inner.distance_query.distance(id, other);
        let _guard = self.inner.structure.read();
        let ctx = QueryContext::new(self.inner.storage.as_ref(), sink, &query_distance);
        range_search(&ctx, radius, collector)
    }

    fn check_known(&self, id: DbId) -> MTreeResult<()> {
        if self.inner.distance_query.contains(id) {
            Ok(())
        } else {
            Err(MTreeError::NotFound(format!(
                "object {} is unknown to the distance query",
                id
            )))
        }
    }

    // ------------------------------------------------------------------
    // Statistics and maintenance
    // ------------------------------------------------------------------

    /// Get comprehensive statistics
    pub fn stats(&self) -> MTreeStats {
        let header = self.inner.storage.header();
        let queries = self.inner.statistics.snapshot();

        MTreeStats {
            total_entries: header.entry_count,
            tree_height: header.height,
            knn_queries: queries.knn_queries,
            range_queries: queries.range_queries,
            distance_calculations: queries.distance_calculations,
            storage: self.inner.storage.stats(),
        }
    }

    pub fn reset_statistics(&self) {
        self.inner.statistics.reset();
    }

    /// Write the query counters to the log.
    pub fn log_statistics(&self) {
        let stats = self.stats();
        log::info!(
            "M-tree: {} entries, height {}, {} kNN queries, {} range queries, {} distance calculations",
            stats.total_entries,
            stats.tree_height,
            stats.knn_queries,
            stats.range_queries,
            stats.distance_calculations
        );
        log::debug!(
            "M-tree storage: {} pages, {} cached, {} hits, {} misses, {} reads, {} writes",
            stats.storage.pages,
            stats.storage.cached_pages,
            stats.storage.cache_hits,
            stats.storage.cache_misses,
            stats.storage.disk_reads,
            stats.storage.disk_writes
        );
    }

    /// Count nodes and entries by walking the tree.
    pub fn summary(&self) -> MTreeResult<TreeSummary> {
        self.check_closed()?;
        let _guard = self.inner.structure.read();
        integrity::summarize(
            self.inner.storage.as_ref(),
            self.inner.config.leaf_capacity(),
            self.inner.config.directory_capacity(),
        )
    }

    /// Verify the structural invariants of the whole tree.
    pub fn check_integrity(&self) -> MTreeResult<IntegrityReport> {
        self.check_closed()?;
        let _guard = self.inner.structure.read();
        integrity::check_integrity(
            self.inner.storage.as_ref(),
            &self.inner.distance_query,
            self.inner.config.leaf_capacity(),
            self.inner.config.directory_capacity(),
        )
    }

    /// Persist all pending writes.
    pub fn flush(&self) -> MTreeResult<()> {
        self.check_closed()?;
        let _guard = self.inner.structure.read();
        self.inner.storage.flush()
    }

    /// Flush and close the tree. Every later call fails with
    /// [`MTreeError::Closed`], on this handle and on its clones.
    pub fn close(&self) -> MTreeResult<()> {
        self.check_closed()?;
        let _guard = self.inner.structure.write();
        self.inner.storage.flush()?;
        *self.inner.closed.write() = true;
        log::debug!("Closed M-tree with {} entries", self.size());
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        *self.inner.closed.read()
    }
}

impl<Q: DistanceQuery> Drop for MTreeInner<Q> {
    fn drop(&mut self) {
        // Best effort flush on drop
        if !*self.closed.read() {
            if let Err(e) = self.storage.flush() {
                log::error!("Failed to flush M-tree on drop: {}", e);
            }
        }
    }
}

fn check_k(k: usize) -> MTreeResult<()> {
    if k == 0 {
        Err(MTreeError::InvalidArgument("k must be at least 1".into()))
    } else {
        Ok(())
    }
}

/// Returns false when the radius cannot match anything.
fn check_radius(radius: f64) -> MTreeResult<bool> {
    if radius.is_nan() {
        return Err(MTreeError::InvalidArgument(
            "radius must not be NaN".into(),
        ));
    }
    Ok(radius >= 0.0)
}
