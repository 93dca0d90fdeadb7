//! Concurrent access integration tests.

mod concurrent_query_test;
