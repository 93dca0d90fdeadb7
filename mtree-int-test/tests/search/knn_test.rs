use mtree::{
    DbId, DistanceResult, ManhattanDistance, MTree, MTreeConfig, MTreeError, NoopStatistics,
    Relation, RelationDistanceQuery,
};
use mtree_int_test::test_util::{
    brute_force_knn, cleanup, clustered_points, create_memory_context, lattice_points,
    run_test, small_config, uniform_points,
};

#[test]
fn test_knn_matches_brute_force() {
    run_test(
        || create_memory_context(uniform_points(500, 2, 7), small_config()),
        |ctx| {
            let tree = ctx.tree();
            assert!(tree.height() >= 3);

            for query in uniform_points(20, 2, 99) {
                for k in [1, 5, 17] {
                    let expected = brute_force_knn(ctx.relation(), &query, k);
                    let actual = tree.knn_for_object(&query, k)?;
                    assert_eq!(actual, expected, "query {:?}, k = {}", query, k);
                }
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_knn_matches_brute_force_in_higher_dimensions() {
    run_test(
        || create_memory_context(uniform_points(400, 8, 11), small_config()),
        |ctx| {
            let tree = ctx.tree();
            for query in uniform_points(10, 8, 12) {
                let expected = brute_force_knn(ctx.relation(), &query, 10);
                assert_eq!(tree.knn_for_object(&query, 10)?, expected);
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_knn_prefix_property() {
    run_test(
        || create_memory_context(uniform_points(300, 3, 21), small_config()),
        |ctx| {
            let tree = ctx.tree();
            let query = vec![50.0, 50.0, 50.0];
            let full = tree.knn_for_object(&query, 25)?;
            for k in [1, 2, 7, 24] {
                let prefix = tree.knn_for_object(&query, k)?;
                let distances: Vec<f64> = prefix.iter().map(|r| r.distance).collect();
                let expected: Vec<f64> = full[..k].iter().map(|r| r.distance).collect();
                assert_eq!(distances, expected);
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_knn_more_than_size_returns_everything() {
    run_test(
        || create_memory_context(uniform_points(40, 2, 3), small_config()),
        |ctx| {
            let tree = ctx.tree();
            let query = vec![10.0, 90.0];
            let results = tree.knn_for_object(&query, 100)?;
            assert_eq!(results.len(), 40);
            assert_eq!(results, brute_force_knn(ctx.relation(), &query, 40));
            assert!(results
                .windows(2)
                .all(|pair| pair[0].cmp_by_distance(&pair[1]).is_lt()));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_knn_zero_k_does_no_work() {
    run_test(
        || create_memory_context(uniform_points(100, 2, 5), small_config()),
        |ctx| {
            let tree = ctx.tree();
            tree.reset_statistics();

            let err = tree.knn_for_object(&[1.0, 2.0], 0).unwrap_err();
            assert!(matches!(err, MTreeError::InvalidArgument(_)));
            assert!(tree.knn_for_id(1, 0).unwrap_err().is_invalid_argument());
            assert!(tree.knn_batch(&[1, 2], 0).unwrap_err().is_invalid_argument());

            let stats = tree.stats();
            assert_eq!(stats.distance_calculations, 0);
            assert_eq!(stats.knn_queries, 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_knn_member_query_finds_itself_first() {
    run_test(
        || create_memory_context(uniform_points(250, 2, 8), small_config()),
        |ctx| {
            let tree = ctx.tree();
            for id in [1, 50, 125, 250] {
                let by_object = tree.knn_for_object(&ctx.point(id), 3)?;
                assert_eq!(by_object[0], DistanceResult::new(0.0, id));

                let by_id = tree.knn_for_id(id, 3)?;
                assert_eq!(by_id[0], DistanceResult::new(0.0, id));
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_knn_prunes_clustered_data() {
    let config = || {
        MTreeConfig::new()
            .with_leaf_capacity(16)
            .with_directory_capacity(16)
    };
    run_test(
        || create_memory_context(clustered_points(2000, 10, 2, 5.0, 42), config()),
        |ctx| {
            let tree = ctx.tree();
            for id in [1, 333, 1999] {
                tree.reset_statistics();
                let results = tree.knn_for_id(id, 10)?;
                assert_eq!(results.len(), 10);

                let calculations = tree.stats().distance_calculations;
                assert!(calculations > 0);
                assert!(
                    calculations < 2000,
                    "kNN computed {} distances for 2000 objects",
                    calculations
                );
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_knn_ties_prefer_smaller_ids() {
    // Manhattan distances between lattice points are exact, so every tie is real
    let relation: Relation<Vec<f64>> = lattice_points(200, 17).into_iter().collect();
    let query: RelationDistanceQuery<Vec<f64>, [f64], ManhattanDistance> =
        RelationDistanceQuery::new(relation.clone(), ManhattanDistance);
    let tree = MTree::in_memory(query, small_config()).unwrap();
    tree.insert_all(relation.ids()).unwrap();

    for point in [vec![2.0, 2.0], vec![0.5, 3.0], vec![5.0, 0.0]] {
        let mut expected: Vec<DistanceResult> = relation
            .ids()
            .into_iter()
            .map(|id| {
                let o = relation.get(id).unwrap();
                let d = (o[0] - point[0]).abs() + (o[1] - point[1]).abs();
                DistanceResult::new(d, id)
            })
            .collect();
        expected.sort_by(DistanceResult::cmp_by_distance);

        for k in [1, 4, 30] {
            let actual = tree.knn_for_object(&point, k).unwrap();
            assert_eq!(actual, expected[..k].to_vec(), "query {:?}, k = {}", point, k);
        }
    }
}

#[test]
fn test_knn_batch_and_silent_sink() {
    run_test(
        || create_memory_context(uniform_points(150, 2, 31), small_config()),
        |ctx| {
            let tree = ctx.tree();
            let ids: Vec<DbId> = vec![4, 40, 140];
            let batch = tree.knn_batch(&ids, 6)?;
            assert_eq!(batch.len(), ids.len());
            for (id, results) in ids.iter().zip(&batch) {
                assert_eq!(results, &brute_force_knn(ctx.relation(), &ctx.point(*id), 6));
            }

            let before = tree.stats();
            let silent = tree.knn_for_object_with_sink(&ctx.point(40), 6, &NoopStatistics)?;
            assert_eq!(silent, batch[1]);
            assert_eq!(tree.stats(), before);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_knn_on_empty_tree() {
    run_test(
        || create_memory_context(Vec::new(), small_config()),
        |ctx| {
            let tree = ctx.tree();
            assert!(tree.is_empty());
            assert!(tree.knn_for_object(&[0.0, 0.0], 5)?.is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_knn_with_manhattan_distance() {
    let relation: Relation<Vec<f64>> = (0..120)
        .map(|i| vec![(i % 12) as f64, (i / 12) as f64])
        .collect();
    let query: RelationDistanceQuery<Vec<f64>, [f64], ManhattanDistance> =
        RelationDistanceQuery::new(relation.clone(), ManhattanDistance);
    let tree = MTree::in_memory(query, small_config()).unwrap();
    tree.insert_all(relation.ids()).unwrap();

    // lattice point (3, 3) has id 40; four neighbors at distance 1
    let results = tree.knn_for_object(&[3.0, 3.0], 5).unwrap();
    assert_eq!(results[0], DistanceResult::new(0.0, 40));
    assert!(results[1..].iter().all(|r| r.distance == 1.0));
    let mut neighbors: Vec<DbId> = results[1..].iter().map(|r| r.id).collect();
    neighbors.sort_unstable();
    assert_eq!(neighbors, vec![28, 39, 41, 52]);
}
