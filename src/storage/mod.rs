//! Graph storage layer
//!
//! CSR store, edge endpoints, the edge-list builder and (with the `storage`
//! feature) Parquet edge-list persistence.

pub mod builder;
pub mod csr;
pub mod endpoint;
#[cfg(feature = "storage")]
pub mod parquet;

pub use builder::Builder;
pub use csr::{
    Adjacency, CsrStore, Inversion, Neighborhood, OutOnly, StoreStats, WithInverse,
};
pub use endpoint::{EdgeEndpoint, EdgeTarget, VertexId, Weight};
#[cfg(feature = "storage")]
pub use parquet::EdgeListFile;
