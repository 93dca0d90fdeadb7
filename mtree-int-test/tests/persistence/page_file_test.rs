use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};

use mtree::{
    DbId, DistanceResult, EuclideanDistance, MTree, MTreeConfig, MTreeError, Relation,
    VectorDistanceQuery,
};
use mtree_int_test::test_util::{
    brute_force_knn, cleanup, create_file_context, random_path, reopen, run_test,
    small_config, uniform_points, TestContext,
};

#[test]
fn test_reopen_preserves_query_results() {
    run_test(
        || create_file_context(uniform_points(400, 2, 51), small_config()),
        |ctx| {
            let queries = uniform_points(10, 2, 52);
            let before: Vec<Vec<DistanceResult>> = queries
                .iter()
                .map(|q| ctx.tree().knn_for_object(q, 7))
                .collect::<Result<_, _>>()?;
            let height = ctx.tree().height();

            let ctx = reopen(ctx, MTreeConfig::new())?;
            let tree = ctx.tree();
            assert_eq!(tree.size(), 400);
            assert_eq!(tree.height(), height);
            assert_eq!(tree.config().leaf_capacity(), 8);

            for (query, expected) in queries.iter().zip(&before) {
                assert_eq!(&tree.knn_for_object(query, 7)?, expected);
            }
            assert!(tree.check_integrity()?.is_valid());
            cleanup(ctx)
        },
        |_| Ok(()),
    )
}

#[test]
fn test_insert_after_reopen() {
    run_test(
        || create_file_context(uniform_points(100, 2, 53), small_config()),
        |ctx| {
            let ctx = reopen(ctx, small_config())?;
            let tree = ctx.tree();

            let mut added = Vec::new();
            for point in uniform_points(50, 2, 54) {
                let id = ctx.relation().insert(point);
                tree.insert(id)?;
                added.push(id);
            }
            assert_eq!(tree.size(), 150);

            let ctx = reopen(ctx, small_config())?;
            let tree = ctx.tree();
            assert_eq!(tree.size(), 150);
            for &id in &added {
                assert_eq!(tree.knn_for_id(id, 1)?[0], DistanceResult::new(0.0, id));
            }
            let report = tree.check_integrity()?;
            assert!(report.is_valid(), "{:?}", report.errors);
            assert_eq!(report.objects_found, 150);
            cleanup(ctx)
        },
        |_| Ok(()),
    )
}

#[test]
fn test_small_cache_reads_from_disk() {
    let config = || small_config().with_cache_pages(4);
    run_test(
        || create_file_context(uniform_points(500, 2, 55), config()),
        |ctx| {
            let ctx = reopen(ctx, config())?;
            let tree = ctx.tree();

            for query in uniform_points(5, 2, 56) {
                let expected = brute_force_knn(ctx.relation(), &query, 9);
                assert_eq!(tree.knn_for_object(&query, 9)?, expected);
            }

            let storage = tree.stats().storage;
            assert!(storage.disk_reads > 0);
            assert!(storage.cached_pages <= 4);
            assert!(storage.pages > 4);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_corrupted_page_is_detected() {
    run_test(
        || create_file_context(uniform_points(30, 2, 57), small_config()),
        |ctx| {
            let path = ctx.path().map(|p| p.to_path_buf()).unwrap_or_default();
            let pages = ctx.tree().stats().storage.pages;
            ctx.tree().close()?;

            // damage the middle of every node page
            {
                let mut file = OpenOptions::new().write(true).open(&path)?;
                for page in 1..=pages {
                    file.seek(SeekFrom::Start(page * 4096 + 30))?;
                    file.write_all(&[0xAB; 8])?;
                }
            }

            let relation = ctx.relation().clone();
            let tree = MTree::open_file(
                &path,
                VectorDistanceQuery::new(relation.clone(), EuclideanDistance),
                small_config(),
            )?;
            let ctx = TestContext::new(Some(path), relation, tree);
            let err = ctx.tree().knn_for_object(&[1.0, 1.0], 3).unwrap_err();
            assert!(matches!(err, MTreeError::Corrupted(_)), "{:?}", err);
            cleanup(ctx)
        },
        |_| Ok(()),
    )
}

#[test]
fn test_closed_tree_rejects_calls() {
    run_test(
        || create_file_context(uniform_points(20, 2, 58), small_config()),
        |ctx| {
            let tree = ctx.tree();
            tree.close()?;

            assert!(matches!(tree.insert(1), Err(MTreeError::Closed)));
            assert!(matches!(tree.knn_for_id(1, 2), Err(MTreeError::Closed)));
            let mut ids: Vec<DbId> = Vec::new();
            assert!(matches!(
                tree.range_for_object(&[0.0, 0.0], 5.0, &mut ids),
                Err(MTreeError::Closed)
            ));
            assert!(matches!(tree.summary(), Err(MTreeError::Closed)));
            assert!(matches!(tree.flush(), Err(MTreeError::Closed)));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_open_missing_file_fails() {
    let path = random_path();
    let relation: Relation<Vec<f64>> = Relation::new();
    let result = MTree::open_file(
        &path,
        VectorDistanceQuery::new(relation, EuclideanDistance),
        small_config(),
    );
    assert!(matches!(result, Err(MTreeError::Io(_))));
}
