//! Segmentation of the inverse adjacency into cache-sized sub-graphs
//!
//! A store's in-edges are split by the id range of their *source* vertex. Each
//! range becomes an independent CSR [`Segment`] whose local vertices are the
//! destinations it feeds, so a pull-style kernel can process one segment at a
//! time while only touching a bounded slice of per-source state.
//!
//! # Example
//!
//! ```
//! use csr_segments::{CsrStore, SegmentConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> csr_segments::Result<()> {
//! // 0 → 1, 1 → 2, 2 → 0
//! let mut store: CsrStore = CsrStore::from_directed(
//!     3,
//!     vec![0, 1, 2, 3],
//!     vec![1, 2, 0],
//!     vec![0, 1, 2, 3],
//!     vec![2, 0, 1],
//! )?;
//!
//! store.build_segments("pull", &SegmentConfig::new(3)).await?;
//! assert_eq!(store.segment_count("pull")?, 3);
//! assert_eq!(store.segment("pull", 0)?.num_edges(), 1);
//! # Ok(())
//! # }
//! ```

pub mod bounds;
pub mod graph;
mod partition;
mod persist;

pub use bounds::{Partitioning, SegmentBounds};
pub use graph::{Segment, SegmentCollection};

use crate::error::{CsrError, Result};
use crate::storage::{Adjacency, CsrStore, EdgeTarget, WithInverse};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Where a segment collection comes from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SegmentSource {
    /// Partition in memory
    #[default]
    Build,
    /// Partition in memory, then persist under the directory
    BuildAndStore(PathBuf),
    /// Read a collection persisted under the directory
    Load(PathBuf),
    /// Load when the directory holds segment files, otherwise build and store
    LoadOrBuild(PathBuf),
}

/// Options for [`CsrStore::build_segments`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentConfig {
    /// Number of segments to cut
    pub num_segments: usize,
    /// Allocate each segment's buffers on the worker that fills it
    pub numa_aware: bool,
    /// How source ids are split
    pub partitioning: Partitioning,
    /// Build, load, or both
    pub source: SegmentSource,
}

impl SegmentConfig {
    /// In-memory, equal-width partition into `num_segments` segments
    #[must_use]
    pub fn new(num_segments: usize) -> Self {
        Self {
            num_segments,
            numa_aware: false,
            partitioning: Partitioning::default(),
            source: SegmentSource::default(),
        }
    }

    /// Set per-segment buffer placement
    #[must_use]
    pub const fn with_numa_aware(mut self, numa_aware: bool) -> Self {
        self.numa_aware = numa_aware;
        self
    }

    /// Set the partition policy
    #[must_use]
    pub fn with_partitioning(mut self, partitioning: Partitioning) -> Self {
        self.partitioning = partitioning;
        self
    }

    /// Set where the collection comes from
    #[must_use]
    pub fn with_source(mut self, source: SegmentSource) -> Self {
        self.source = source;
        self
    }

    fn bounds<D: EdgeTarget>(&self, inverse: &Adjacency<D>, n: i64) -> Result<SegmentBounds> {
        match &self.partitioning {
            Partitioning::EqualWidth => SegmentBounds::equal_width(n, self.num_segments),
            Partitioning::DegreeBalanced => {
                SegmentBounds::degree_balanced(inverse, n, self.num_segments)
            }
            Partitioning::Explicit(boundaries) => {
                if Some(boundaries.len()) != self.num_segments.checked_add(1) {
                    return Err(CsrError::InvalidSegmentConfig(format!(
                        "{} explicit boundaries describe {} segments, {} requested",
                        boundaries.len(),
                        boundaries.len().saturating_sub(1),
                        self.num_segments
                    )));
                }
                SegmentBounds::from_boundaries(n, boundaries.clone())
            }
        }
    }
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Run a CPU-bound pass on tokio's blocking pool so async callers keep their worker
pub(crate) async fn off_runtime<T, F>(pass: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(pass).await?
}

async fn partition_off_runtime<D: EdgeTarget>(
    inverse: Adjacency<D>,
    bounds: SegmentBounds,
    numa_aware: bool,
) -> Result<Arc<SegmentCollection<D>>> {
    off_runtime(move || partition::partition(&inverse, bounds, numa_aware).map(Arc::new)).await
}

impl<D: EdgeTarget> CsrStore<D, WithInverse> {
    /// Partition the inverse adjacency and register the result under `label`
    ///
    /// A collection already registered under `label` is released once the new one
    /// replaces it; if building or loading fails, it stays registered. With
    /// [`SegmentSource::Load`] the files must match this store and partition;
    /// [`SegmentSource::LoadOrBuild`] falls back to building only when no files
    /// exist, never when existing files are corrupt.
    ///
    /// Partitioning, encoding and decoding run on the blocking pool, not on the
    /// calling task's worker.
    ///
    /// # Errors
    ///
    /// - [`CsrError::InvalidSegmentConfig`] for zero segments or bad boundaries
    /// - [`CsrError::Allocation`] when segment buffers cannot be reserved
    /// - [`CsrError::SegmentLoad`] for missing, truncated or incompatible files
    /// - [`CsrError::Io`] when segment files cannot be written
    pub async fn build_segments(&mut self, label: &str, config: &SegmentConfig) -> Result<()> {
        let inverse = self.in_adjacency().clone();
        let num_vertices = self.num_vertices();
        let numa_aware = config.numa_aware;
        let bounds = {
            let (inverse, config) = (inverse.clone(), config.clone());
            off_runtime(move || config.bounds(&inverse, num_vertices)).await?
        };

        let collection = match &config.source {
            SegmentSource::Build => partition_off_runtime(inverse, bounds, numa_aware).await?,
            SegmentSource::BuildAndStore(dir) => {
                let built = partition_off_runtime(inverse, bounds, numa_aware).await?;
                persist::store(label, dir, &built).await?;
                built
            }
            SegmentSource::Load(dir) => {
                Arc::new(persist::load(label, dir, inverse, bounds, numa_aware).await?)
            }
            SegmentSource::LoadOrBuild(dir) => {
                if persist::is_present(dir).await? {
                    Arc::new(persist::load(label, dir, inverse, bounds, numa_aware).await?)
                } else {
                    debug!(label = %label, dir = %dir.display(), "no segment files, building");
                    let built = partition_off_runtime(inverse, bounds, numa_aware).await?;
                    persist::store(label, dir, &built).await?;
                    built
                }
            }
        };

        info!(
            label = %label,
            segments = collection.num_segments(),
            edges = collection.total_edges(),
            bytes = collection.size_bytes(),
            numa_aware,
            "segments ready"
        );
        if self.register_segments(label, collection) {
            debug!(label = %label, "released previous segment collection");
        }
        Ok(())
    }

    /// Persist the collection registered under `label` into `dir`
    ///
    /// # Errors
    ///
    /// Returns [`CsrError::UnknownLabel`] if nothing is registered under `label`,
    /// [`CsrError::Io`] if a file cannot be written
    pub async fn store_segments(&self, label: &str, dir: impl AsRef<Path>) -> Result<()> {
        let collection = self
            .shared_segments(label)
            .ok_or_else(|| CsrError::UnknownLabel(label.to_string()))?;
        persist::store(label, dir.as_ref(), &collection).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::VertexId;
    use tempfile::tempdir;

    fn triangle() -> CsrStore {
        CsrStore::from_directed(3, vec![0, 1, 2, 3], vec![1, 2, 0], vec![0, 1, 2, 3], vec![2, 0, 1])
            .unwrap()
    }

    #[tokio::test]
    async fn test_rebuild_replaces_label() {
        let mut store = triangle();
        store.build_segments("pull", &SegmentConfig::new(3)).await.unwrap();
        let first = store.shared_segments("pull").unwrap();

        store.build_segments("pull", &SegmentConfig::new(1)).await.unwrap();
        assert_eq!(store.segment_count("pull").unwrap(), 1);
        // the replaced collection is only alive through our handle
        assert_eq!(std::sync::Arc::strong_count(&first), 1);
    }

    #[tokio::test]
    async fn test_labels_are_independent() {
        let mut store = triangle();
        store.build_segments("a", &SegmentConfig::new(2)).await.unwrap();
        store.build_segments("b", &SegmentConfig::new(3)).await.unwrap();
        let mut labels: Vec<&str> = store.segment_labels().collect();
        labels.sort_unstable();
        assert_eq!(labels, vec!["a", "b"]);
        assert!(store.remove_segments("a"));
        assert!(!store.remove_segments("a"));
        assert_eq!(store.segment_count("b").unwrap(), 3);
    }

    #[tokio::test]
    async fn test_segment_out_of_range() {
        let mut store = triangle();
        store.build_segments("pull", &SegmentConfig::new(2)).await.unwrap();
        assert!(matches!(
            store.segment("pull", 2),
            Err(CsrError::SegmentOutOfRange { count: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_zero_segments_rejected() {
        let mut store = triangle();
        let err = store.build_segments("pull", &SegmentConfig::new(0)).await.unwrap_err();
        assert!(matches!(err, CsrError::InvalidSegmentConfig(_)));
        assert!(store.segments("pull").is_none());

        store.build_segments("pull", &SegmentConfig::new(3)).await.unwrap();
        let err = store.build_segments("pull", &SegmentConfig::new(0)).await.unwrap_err();
        assert!(matches!(err, CsrError::InvalidSegmentConfig(_)));
        assert_eq!(store.segment_count("pull").unwrap(), 3);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_cpu_passes_leave_the_async_worker() {
        let caller = std::thread::current().id();
        let worker = off_runtime(|| Ok(std::thread::current().id())).await.unwrap();
        assert_ne!(caller, worker);

        // the only async worker stays free to drive other tasks during a build
        let mut store = triangle();
        let ticker = tokio::spawn(async { tokio::task::yield_now().await });
        store.build_segments("pull", &SegmentConfig::new(3)).await.unwrap();
        ticker.await.unwrap();
        assert_eq!(store.segment_count("pull").unwrap(), 3);
    }

    #[tokio::test]
    async fn test_failed_load_keeps_previous_collection() {
        let dir = tempdir().unwrap();
        let mut store = triangle();
        store.build_segments("pull", &SegmentConfig::new(3)).await.unwrap();
        let before = store.shared_segments("pull").unwrap();

        let missing = SegmentConfig::new(2)
            .with_source(SegmentSource::Load(dir.path().join("absent")));
        let err = store.build_segments("pull", &missing).await.unwrap_err();
        assert!(matches!(err, CsrError::SegmentLoad { segment: 0, .. }));

        let after = store.shared_segments("pull").unwrap();
        assert!(std::sync::Arc::ptr_eq(&before, &after));
    }

    #[tokio::test]
    async fn test_unaddressable_segment_count_reported() {
        let mut store = triangle();
        store.build_segments("pull", &SegmentConfig::new(2)).await.unwrap();

        let err = store
            .build_segments("pull", &SegmentConfig::new(usize::MAX >> 1))
            .await
            .unwrap_err();
        assert!(matches!(err, CsrError::Allocation { .. }), "{err}");

        let explicit = SegmentConfig::new(usize::MAX)
            .with_partitioning(Partitioning::Explicit(vec![0, 3]));
        assert!(matches!(
            store.build_segments("pull", &explicit).await,
            Err(CsrError::InvalidSegmentConfig(_))
        ));
        assert_eq!(store.segment_count("pull").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_explicit_boundary_count_checked() {
        let mut store = triangle();
        let config = SegmentConfig::new(3).with_partitioning(Partitioning::Explicit(vec![0, 3]));
        assert!(matches!(
            store.build_segments("pull", &config).await,
            Err(CsrError::InvalidSegmentConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_load_or_build_writes_then_reads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("segs");
        let config =
            SegmentConfig::new(2).with_source(SegmentSource::LoadOrBuild(path.clone()));

        let mut store = triangle();
        store.build_segments("pull", &config).await.unwrap();
        assert!(path.join("0").exists());
        assert!(path.join("1").exists());

        let mut fresh = triangle();
        fresh.build_segments("pull", &config).await.unwrap();
        for id in 0..2 {
            let built = store.segment("pull", id).unwrap();
            let loaded = fresh.segment("pull", id).unwrap();
            assert_eq!(built.graph_id(), loaded.graph_id());
            assert_eq!(built.edges(), loaded.edges());
            assert_eq!(built.vertex_array(), loaded.vertex_array());
        }
    }

    #[tokio::test]
    async fn test_store_segments_requires_label() {
        let dir = tempdir().unwrap();
        let store = triangle();
        assert!(matches!(
            store.store_segments("missing", dir.path()).await,
            Err(CsrError::UnknownLabel(_))
        ));
    }

    #[tokio::test]
    async fn test_store_then_load() {
        let dir = tempdir().unwrap();
        let mut store = triangle();
        store.build_segments("pull", &SegmentConfig::new(3)).await.unwrap();
        store.store_segments("pull", dir.path()).await.unwrap();

        let load = SegmentConfig::new(3).with_source(SegmentSource::Load(dir.path().to_path_buf()));
        let mut other = triangle();
        other.build_segments("pull", &load).await.unwrap();
        let edges: Vec<VertexId> = (0..3)
            .flat_map(|id| other.segment("pull", id).unwrap().edges().to_vec())
            .collect();
        assert_eq!(edges, vec![0, 1, 2]);
    }

    #[test]
    fn test_config_builders() {
        let config = SegmentConfig::new(4)
            .with_numa_aware(true)
            .with_partitioning(Partitioning::DegreeBalanced)
            .with_source(SegmentSource::Load(PathBuf::from("segs")));
        assert_eq!(config.num_segments, 4);
        assert!(config.numa_aware);
        assert_eq!(config.partitioning, Partitioning::DegreeBalanced);
        assert_eq!(SegmentConfig::default().source, SegmentSource::Build);
    }
}
