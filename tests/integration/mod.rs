//! Integration tests

mod quota_store_tests;
