//! Storage layer integration tests

mod manager_tests;
