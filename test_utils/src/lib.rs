//! Utility helpers for tests.
pub mod assertions;
pub mod fixtures;

pub use assertions::{assert_all_absent, assert_all_present, assert_links, assert_single_dispatch};
pub use fixtures::{build_chain, pos, spawn_at, workspace};
