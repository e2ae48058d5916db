//! csr-segments: in-memory CSR graph store with segmented pull partitions
//!
//! # Overview
//!
//! A [`CsrStore`] holds an immutable directed or undirected graph in CSR form,
//! optionally with its inverse (in-edge) adjacency. For pull-style analytics the
//! inverse adjacency can be cut into cache-sized [`Segment`]s by source id range,
//! built in parallel, persisted to disk, and reloaded.
//!
//! # Quick Start
//!
//! ```
//! use csr_segments::{pull_bfs_parents, Builder, CsrStore, SegmentConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> csr_segments::Result<()> {
//! // Build graph from edge list
//! let mut store: CsrStore = Builder::new().build_directed(&[(0, 1), (1, 2), (2, 0)])?;
//!
//! // Query neighbors (O(1) via CSR indexing)
//! assert_eq!(store.out_degree(0), 1);
//! assert_eq!(store.in_neighbors(0).iter().collect::<Vec<_>>(), vec![2]);
//!
//! // Partition in-edges into two source ranges and traverse them
//! store.build_segments("pull", &SegmentConfig::new(2)).await?;
//! let parent = pull_bfs_parents(&store, "pull", 0)?;
//! assert_eq!(parent, vec![0, 0, 1]);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Storage**: CSR arrays behind shared single allocations; inverse-only
//!   operations gated by the [`WithInverse`] / [`OutOnly`] marker
//! - **Segmentation**: count/allocate/fill passes on the rayon pool
//! - **Persistence**: one binary file per segment, written and read by tokio tasks;
//!   Parquet edge lists with the `storage` feature
//! - **Algorithms**: push and pull breadth-first search

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod algorithms;
pub mod error;
pub mod segment;
pub mod storage;

// Re-export core types
pub use algorithms::{bfs_parents, pull_bfs_parents, UNREACHED};
pub use segment::{
    Partitioning, Segment, SegmentBounds, SegmentCollection, SegmentConfig, SegmentSource,
};
pub use storage::{
    Adjacency, Builder, CsrStore, EdgeEndpoint, EdgeTarget, Inversion, Neighborhood, OutOnly,
    StoreStats, VertexId, Weight, WithInverse,
};

#[cfg(feature = "storage")]
pub use storage::EdgeListFile;

// Error type
pub use error::{CsrError, Result};
