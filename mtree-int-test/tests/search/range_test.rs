use mtree::{DbId, DistanceResult, MTreeConfig, NoopStatistics};
use mtree_int_test::test_util::{
    brute_force_range, cleanup, clustered_points, create_memory_context, run_test,
    small_config, sorted_ids, uniform_points,
};

#[test]
fn test_range_matches_brute_force() {
    run_test(
        || create_memory_context(uniform_points(600, 2, 13), small_config()),
        |ctx| {
            let tree = ctx.tree();
            for query in uniform_points(15, 2, 14) {
                for radius in [0.5, 4.0, 12.5, 40.0] {
                    let mut results: Vec<DistanceResult> = Vec::new();
                    tree.range_for_object(&query, radius, &mut results)?;
                    assert_eq!(
                        sorted_ids(&results),
                        brute_force_range(ctx.relation(), &query, radius),
                        "query {:?}, radius {}",
                        query,
                        radius
                    );
                    assert!(results.iter().all(|r| r.distance <= radius));
                }
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_range_by_id_includes_itself() {
    run_test(
        || create_memory_context(uniform_points(200, 3, 15), small_config()),
        |ctx| {
            let tree = ctx.tree();
            for id in [1, 99, 200] {
                let mut ids: Vec<DbId> = Vec::new();
                tree.range_for_id(id, 15.0, &mut ids)?;
                ids.sort_unstable();
                assert!(ids.contains(&id));
                assert_eq!(ids, brute_force_range(ctx.relation(), &ctx.point(id), 15.0));
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_range_zero_radius_finds_duplicates_only() {
    let mut points = uniform_points(50, 2, 16);
    points.push(points[10].clone());
    points.push(points[10].clone());
    run_test(
        move || create_memory_context(points.clone(), small_config()),
        |ctx| {
            let tree = ctx.tree();
            let mut ids: Vec<DbId> = Vec::new();
            tree.range_for_object(&ctx.point(11), 0.0, &mut ids)?;
            ids.sort_unstable();
            assert_eq!(ids, vec![11, 51, 52]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_range_large_radius_returns_everything() {
    run_test(
        || create_memory_context(uniform_points(120, 2, 17), small_config()),
        |ctx| {
            let tree = ctx.tree();
            let mut results: Vec<DistanceResult> = Vec::new();
            tree.range_for_object(&[50.0, 50.0], 1000.0, &mut results)?;
            assert_eq!(sorted_ids(&results), ctx.relation().ids());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_range_invalid_radius() {
    run_test(
        || create_memory_context(uniform_points(60, 2, 18), small_config()),
        |ctx| {
            let tree = ctx.tree();
            tree.reset_statistics();

            let mut ids: Vec<DbId> = Vec::new();
            let err = tree.range_for_object(&[1.0, 1.0], f64::NAN, &mut ids).unwrap_err();
            assert!(err.is_invalid_argument());
            assert!(tree.range_for_id(1, f64::NAN, &mut ids).is_err());

            tree.range_for_object(&[1.0, 1.0], -3.0, &mut ids)?;
            assert!(ids.is_empty());
            assert_eq!(tree.stats().distance_calculations, 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_range_prunes_clustered_data() {
    let config = || {
        MTreeConfig::new()
            .with_leaf_capacity(16)
            .with_directory_capacity(16)
    };
    run_test(
        || create_memory_context(clustered_points(2000, 10, 2, 5.0, 43), config()),
        |ctx| {
            let tree = ctx.tree();
            let query = ctx.point(500);

            tree.reset_statistics();
            let mut ids: Vec<DbId> = Vec::new();
            tree.range_for_object(&query, 2.0, &mut ids)?;
            let stats = tree.stats();
            assert_eq!(stats.range_queries, 1);
            assert!(stats.distance_calculations < 2000);

            ids.sort_unstable();
            assert_eq!(ids, brute_force_range(ctx.relation(), &query, 2.0));

            // a silent sink sees the same matches
            let mut silent: Vec<DbId> = Vec::new();
            tree.range_for_object_with_sink(&query, 2.0, &mut silent, &NoopStatistics)?;
            silent.sort_unstable();
            assert_eq!(silent, ids);
            Ok(())
        },
        cleanup,
    )
}
