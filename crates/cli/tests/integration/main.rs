//! Integration tests running full builds against a fake conda executable.

mod build_tests;
mod common;
