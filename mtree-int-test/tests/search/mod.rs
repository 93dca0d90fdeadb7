//! Query integration tests.
//!
//! These tests compare tree results with a linear scan over the same
//! relation and check the pruning behavior of both query kinds.

mod knn_test;
mod range_test;
mod scenario_test;
