use mtree::{DbId, DistanceResult, MTreeConfig};
use mtree_int_test::test_util::{
    cleanup, create_file_context, create_memory_context, run_test, TestContext,
};

const A: DbId = 1;
const B: DbId = 2;
const C: DbId = 3;

fn five_points() -> Vec<Vec<f64>> {
    vec![
        vec![0.0, 0.0],
        vec![1.0, 0.0],
        vec![0.0, 1.0],
        vec![5.0, 5.0],
        vec![6.0, 5.0],
    ]
}

fn tiny_config() -> MTreeConfig {
    MTreeConfig::new()
        .with_leaf_capacity(2)
        .with_directory_capacity(2)
        .with_page_size(1024)
}

fn check_scenario(ctx: TestContext) -> mtree::MTreeResult<()> {
    let tree = ctx.tree();

    let nearest = tree.knn_for_object(&[0.0, 0.0], 2)?;
    assert_eq!(
        nearest,
        vec![DistanceResult::new(0.0, A), DistanceResult::new(1.0, B)]
    );

    let mut within: Vec<DbId> = Vec::new();
    tree.range_for_object(&[0.0, 0.0], 1.5, &mut within)?;
    within.sort_unstable();
    assert_eq!(within, vec![A, B, C]);

    let report = tree.check_integrity()?;
    assert!(report.is_valid(), "{:?}", report.errors);
    Ok(())
}

#[test]
fn test_scenario_in_memory_default_capacity() {
    run_test(
        || create_memory_context(five_points(), MTreeConfig::default()),
        |ctx| {
            assert_eq!(ctx.tree().height(), 1);
            check_scenario(ctx)
        },
        cleanup,
    )
}

#[test]
fn test_scenario_in_memory_split_tree() {
    run_test(
        || create_memory_context(five_points(), tiny_config()),
        |ctx| {
            assert!(ctx.tree().height() >= 3);
            check_scenario(ctx)
        },
        cleanup,
    )
}

#[test]
fn test_scenario_page_file() {
    run_test(
        || create_file_context(five_points(), tiny_config()),
        check_scenario,
        cleanup,
    )
}
