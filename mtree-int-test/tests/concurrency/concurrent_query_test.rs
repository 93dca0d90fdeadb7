use std::sync::{Arc, Barrier};
use std::thread;

use mtree::{DbId, DistanceResult};
use mtree_int_test::test_util::{
    brute_force_knn, brute_force_range, cleanup, create_file_context, create_memory_context,
    run_test, small_config, uniform_points,
};

#[test]
fn test_concurrent_knn_queries() {
    run_test(
        || create_memory_context(uniform_points(800, 2, 71), small_config()),
        |ctx| {
            let num_threads = 8;
            let queries_per_thread = 25;
            let barrier = Arc::new(Barrier::new(num_threads));
            let tree = ctx.tree();
            tree.reset_statistics();

            let mut handles = vec![];
            for thread_id in 0..num_threads {
                let tree = tree.clone();
                let relation = ctx.relation().clone();
                let barrier = Arc::clone(&barrier);

                handles.push(thread::spawn(move || {
                    barrier.wait();
                    for query in uniform_points(queries_per_thread, 2, 1000 + thread_id as u64) {
                        let actual = tree.knn_for_object(&query, 6).unwrap();
                        assert_eq!(actual, brute_force_knn(&relation, &query, 6));
                    }
                }));
            }
            for handle in handles {
                handle.join().unwrap();
            }

            let stats = ctx.tree().stats();
            assert_eq!(stats.knn_queries, (num_threads * queries_per_thread) as u64);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_concurrent_queries_on_page_file() {
    run_test(
        || create_file_context(uniform_points(600, 2, 72), small_config().with_cache_pages(8)),
        |ctx| {
            let num_threads = 6;
            let barrier = Arc::new(Barrier::new(num_threads));

            let mut handles = vec![];
            for thread_id in 0..num_threads {
                let tree = ctx.tree();
                let relation = ctx.relation().clone();
                let barrier = Arc::clone(&barrier);

                handles.push(thread::spawn(move || {
                    barrier.wait();
                    for query in uniform_points(15, 2, 2000 + thread_id as u64) {
                        let mut results: Vec<DistanceResult> = Vec::new();
                        tree.range_for_object(&query, 6.0, &mut results).unwrap();
                        let mut ids: Vec<DbId> = results.iter().map(|r| r.id).collect();
                        ids.sort_unstable();
                        assert_eq!(ids, brute_force_range(&relation, &query, 6.0));
                    }
                }));
            }
            for handle in handles {
                handle.join().unwrap();
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_queries_while_inserting() {
    run_test(
        || create_memory_context(uniform_points(200, 2, 73), small_config()),
        |ctx| {
            let tree = ctx.tree();
            let relation = ctx.relation().clone();
            let new_ids: Vec<DbId> = uniform_points(300, 2, 74)
                .into_iter()
                .map(|point| relation.insert(point))
                .collect();

            let writer = {
                let tree = tree.clone();
                let new_ids = new_ids.clone();
                thread::spawn(move || {
                    for id in new_ids {
                        tree.insert(id).unwrap();
                    }
                })
            };

            let readers: Vec<_> = (0..4)
                .map(|reader| {
                    let tree = tree.clone();
                    thread::spawn(move || {
                        for query in uniform_points(40, 2, 3000 + reader) {
                            let results = tree.knn_for_object(&query, 5).unwrap();
                            assert_eq!(results.len(), 5);
                            assert!(results
                                .windows(2)
                                .all(|pair| pair[0].cmp_by_distance(&pair[1]).is_lt()));
                        }
                    })
                })
                .collect();

            writer.join().unwrap();
            for reader in readers {
                reader.join().unwrap();
            }

            assert_eq!(tree.size(), 500);
            let report = tree.check_integrity()?;
            assert!(report.is_valid(), "{:?}", report.errors);
            for query in uniform_points(5, 2, 75) {
                assert_eq!(
                    tree.knn_for_object(&query, 8)?,
                    brute_force_knn(&relation, &query, 8)
                );
            }
            Ok(())
        },
        cleanup,
    )
}
