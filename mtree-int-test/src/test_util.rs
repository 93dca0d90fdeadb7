use mtree::{
    DbId, DistanceFunction, DistanceResult, EuclideanDistance, MTree, MTreeConfig, MTreeError,
    MTreeResult, Relation, VectorDistanceQuery,
};
use mtree::results::sort_by_distance;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::backtrace::Backtrace;
use std::path::{Path, PathBuf};
use std::time::Instant;
use std::{env, fs};

pub type VectorTree = MTree<VectorDistanceQuery<EuclideanDistance>>;

/// Runs a test between a setup and a teardown step.
/// The teardown runs even when the test fails so that page files are removed.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> MTreeResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> MTreeResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> MTreeResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    let start_time = Instant::now();
    let result = std::panic::catch_unwind(|| {
        let backtrace = Backtrace::capture();
        match before() {
            Ok(ctx) => match test(ctx.clone()) {
                Ok(_) => after(ctx)
                    .map_err(|e| (format!("After run failed: {:?}", e), backtrace.to_string())),
                Err(e) => {
                    let _ = after(ctx);
                    Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                }
            },
            Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
        }
    });
    let elapsed = start_time.elapsed();

    let (error, backtrace) = match result {
        Ok(Ok(_)) => return,
        Ok(Err((e, bt))) => (e, bt),
        Err(panic_err) => {
            let err_msg = if let Some(s) = panic_err.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_err.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            (format!("Panic: {}", err_msg), String::new())
        }
    };

    eprintln!("\n==================== TEST FAILED ====================");
    eprintln!("Failed after {:?}", elapsed);
    eprintln!("Error: {}", error);
    if !backtrace.is_empty() && !backtrace.contains("disabled") {
        eprintln!("\nBacktrace:\n{}", backtrace);
    }
    eprintln!("=====================================================\n");

    panic!("Test failed: {}", error);
}

#[derive(Clone)]
pub struct TestContext {
    path: Option<PathBuf>,
    relation: Relation<Vec<f64>>,
    tree: VectorTree,
}

impl TestContext {
    pub fn new(path: Option<PathBuf>, relation: Relation<Vec<f64>>, tree: VectorTree) -> Self {
        Self {
            path,
            relation,
            tree,
        }
    }

    /// Page file of the tree, `None` for in-memory trees.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn relation(&self) -> &Relation<Vec<f64>> {
        &self.relation
    }

    pub fn tree(&self) -> VectorTree {
        self.tree.clone()
    }

    pub fn point(&self, id: DbId) -> Vec<f64> {
        self.relation.get(id).unwrap_or_default()
    }
}

pub fn random_path() -> PathBuf {
    let id = uuid::Uuid::new_v4();
    env::temp_dir().join(format!("{}.mtree", id))
}

/// Capacities small enough to build trees of several levels from a few
/// hundred points.
pub fn small_config() -> MTreeConfig {
    MTreeConfig::new()
        .with_leaf_capacity(8)
        .with_directory_capacity(6)
        .with_page_size(4096)
}

/// Uniform points in `[0, 100)^dim`.
pub fn uniform_points(count: usize, dim: usize, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| (0..dim).map(|_| rng.random_range(0.0..100.0)).collect())
        .collect()
}

/// Points around `clusters` random centers, each coordinate within `spread`.
pub fn clustered_points(
    count: usize,
    clusters: usize,
    dim: usize,
    spread: f64,
    seed: u64,
) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let centers: Vec<Vec<f64>> = (0..clusters)
        .map(|_| (0..dim).map(|_| rng.random_range(0.0..1000.0)).collect())
        .collect();
    (0..count)
        .map(|i| {
            centers[i % clusters]
                .iter()
                .map(|c| c + rng.random_range(-spread..spread))
                .collect()
        })
        .collect()
}

/// Points with small integer coordinates, so that many distances tie.
pub fn lattice_points(count: usize, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            vec![
                rng.random_range(0..6) as f64,
                rng.random_range(0..6) as f64,
            ]
        })
        .collect()
}

pub fn create_memory_context(
    points: Vec<Vec<f64>>,
    config: MTreeConfig,
) -> MTreeResult<TestContext> {
    let relation: Relation<Vec<f64>> = points.into_iter().collect();
    let tree = MTree::in_memory(
        VectorDistanceQuery::new(relation.clone(), EuclideanDistance),
        config,
    )?;
    tree.insert_all(relation.ids())?;
    Ok(TestContext::new(None, relation, tree))
}

pub fn create_file_context(points: Vec<Vec<f64>>, config: MTreeConfig) -> MTreeResult<TestContext> {
    let path = random_path();
    let relation: Relation<Vec<f64>> = points.into_iter().collect();
    let tree = MTree::create_file(
        &path,
        VectorDistanceQuery::new(relation.clone(), EuclideanDistance),
        config,
    )?;
    tree.insert_all(relation.ids())?;
    Ok(TestContext::new(Some(path), relation, tree))
}

/// Closes the tree of `ctx` and opens its page file again.
pub fn reopen(ctx: TestContext, config: MTreeConfig) -> MTreeResult<TestContext> {
    let path = ctx
        .path()
        .map(Path::to_path_buf)
        .ok_or_else(|| MTreeError::InvalidOperation("in-memory tree cannot be reopened".into()))?;
    ctx.tree.close()?;

    let relation = ctx.relation.clone();
    let tree = MTree::open_file(
        &path,
        VectorDistanceQuery::new(relation.clone(), EuclideanDistance),
        config,
    )?;
    Ok(TestContext::new(Some(path), relation, tree))
}

pub fn cleanup(ctx: TestContext) -> MTreeResult<()> {
    if !ctx.tree.is_closed() {
        ctx.tree.close()?;
    }
    if let Some(path) = ctx.path() {
        if path.exists() {
            fs::remove_file(path)?;
        }
    }
    Ok(())
}

/// The `k` nearest objects by linear scan, ordered like tree results.
pub fn brute_force_knn(
    relation: &Relation<Vec<f64>>,
    query: &[f64],
    k: usize,
) -> Vec<DistanceResult> {
    let mut all: Vec<DistanceResult> = relation
        .ids()
        .into_iter()
        .filter_map(|id| {
            relation
                .with_object(id, |o| EuclideanDistance.distance(query, o))
                .map(|d| DistanceResult::new(d, id))
        })
        .collect();
    sort_by_distance(&mut all);
    all.truncate(k);
    all
}

/// Ids of all objects within `radius`, ascending.
pub fn brute_force_range(relation: &Relation<Vec<f64>>, query: &[f64], radius: f64) -> Vec<DbId> {
    relation
        .ids()
        .into_iter()
        .filter(|&id| {
            relation
                .with_object(id, |o| EuclideanDistance.distance(query, o) <= radius)
                .unwrap_or(false)
        })
        .collect()
}

pub fn sorted_ids(results: &[DistanceResult]) -> Vec<DbId> {
    let mut ids: Vec<DbId> = results.iter().map(|r| r.id).collect();
    ids.sort_unstable();
    ids
}
