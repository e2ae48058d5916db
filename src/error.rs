//! Error types for the CSR store and the segmentation subsystem

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T, E = CsrError> = std::result::Result<T, E>;

/// Errors surfaced by construction, segmentation and persistence
#[derive(Debug, Error)]
pub enum CsrError {
    /// Index/neighbor arrays handed to a constructor violate the CSR invariants
    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    /// A fallible reservation failed; the working set does not fit
    #[error("allocation of {requested} elements for {what} failed")]
    Allocation {
        /// Buffer being allocated
        what: &'static str,
        /// Element count that could not be reserved
        requested: usize,
    },

    /// A persisted segment file is missing, truncated, or was produced for a
    /// different partitioning
    #[error("cannot load segment {segment} of '{label}' from {}: {detail}", path.display())]
    SegmentLoad {
        /// Label the collection was being loaded under
        label: String,
        /// Segment id
        segment: usize,
        /// File that failed
        path: PathBuf,
        /// Expected vs. observed sizes or the violated constraint
        detail: String,
    },

    /// Segment configuration cannot produce a partition
    #[error("invalid segment configuration: {0}")]
    InvalidSegmentConfig(String),

    /// No segment collection is registered under this label
    #[error("no segments registered under label '{0}'")]
    UnknownLabel(String),

    /// Segment id past the end of a collection
    #[error("segment {segment} out of range for '{label}' ({count} segments)")]
    SegmentOutOfRange {
        /// Collection label
        label: String,
        /// Requested segment id
        segment: usize,
        /// Number of segments in the collection
        count: usize,
    },

    /// Vertex id outside `0..num_vertices`
    #[error("vertex {vertex} out of range (graph has {num_vertices} vertices)")]
    VertexOutOfRange {
        /// Offending id
        vertex: i64,
        /// Vertex count of the graph
        num_vertices: i64,
    },

    /// Filesystem failure while writing
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A per-segment I/O task panicked or was cancelled
    #[error("segment I/O task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Parquet encoding/decoding failure
    #[cfg(feature = "storage")]
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Arrow conversion failure
    #[cfg(feature = "storage")]
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl CsrError {
    pub(crate) fn topology(msg: impl Into<String>) -> Self {
        Self::InvalidTopology(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_load_message_carries_context() {
        let err = CsrError::SegmentLoad {
            label: "pull".to_string(),
            segment: 3,
            path: PathBuf::from("/tmp/segs/3"),
            detail: "expected 120 bytes, read 64".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("segment 3"));
        assert!(msg.contains("'pull'"));
        assert!(msg.contains("/tmp/segs/3"));
        assert!(msg.contains("expected 120 bytes, read 64"));
    }

    #[test]
    fn test_topology_helper() {
        let err = CsrError::topology("index is not monotonic");
        assert!(matches!(err, CsrError::InvalidTopology(ref m) if m == "index is not monotonic"));
    }
}
