//! Page file integration tests.

mod page_file_test;
