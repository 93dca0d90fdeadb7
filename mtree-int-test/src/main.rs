use mtree::{DbId, MTreeConfig, MTreeResult};
use mtree_int_test::test_util::{cleanup, create_file_context, uniform_points};

fn main() -> MTreeResult<()> {
    colog::init();
    println!("Starting stress test...");

    let count = 200_000;
    let config = MTreeConfig::new().with_cache_pages(4096);

    let start = std::time::Instant::now();
    let ctx = create_file_context(uniform_points(count, 8, 1), config)?;
    let tree = ctx.tree();
    println!(
        "Inserted {} objects in {:?} (height {})",
        count,
        start.elapsed(),
        tree.height()
    );

    let queries = uniform_points(1000, 8, 2);
    tree.reset_statistics();
    let start = std::time::Instant::now();
    for query in &queries {
        tree.knn_for_object(query, 10)?;
    }
    let stats = tree.stats();
    println!(
        "Ran {} kNN queries in {:?}, {} distance calculations per query",
        queries.len(),
        start.elapsed(),
        stats.distance_calculations / queries.len() as u64
    );

    tree.reset_statistics();
    let start = std::time::Instant::now();
    let mut matches = 0;
    for query in &queries {
        let mut ids: Vec<DbId> = Vec::new();
        tree.range_for_object(query, 10.0, &mut ids)?;
        matches += ids.len();
    }
    println!(
        "Ran {} range queries in {:?}, {} matches, {} distance calculations",
        queries.len(),
        start.elapsed(),
        matches,
        tree.stats().distance_calculations
    );

    println!("{}", tree.summary()?);
    tree.log_statistics();
    cleanup(ctx)
}
