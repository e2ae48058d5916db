//! Graph algorithms consuming the store and its segments

pub mod traversal;

pub use traversal::{bfs_parents, pull_bfs_parents, UNREACHED};
