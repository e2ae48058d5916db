//! CSR (Compressed Sparse Row) graph store
//!
//! Based on the GAP Benchmark Suite container (Beamer et al., 2015): a forward
//! adjacency, an optional inverse adjacency, and per-vertex scratch arrays for the
//! analytics kernels that iterate it.
//!
//! # CSR Format
//!
//! ```text
//! Graph: 0 → 1, 0 → 2, 1 → 2
//!
//! forward:
//!   index:     [0, 2, 3, 3]   // Vertex 0: edges [0..2), vertex 1: [2..3), vertex 2: [3..3)
//!   neighbors: [1, 2, 2]
//! inverse:
//!   index:     [0, 0, 1, 3]
//!   neighbors: [0, 0, 1]
//! ```
//!
//! # Ownership
//!
//! Index and neighbor arrays sit behind `Arc<[_]>`. Undirected stores hand the
//! same allocation to both directions, clones and transposes share the arrays of
//! the store they came from, and an array is released when its last handle goes.
//! There is no ownership flag to get wrong.
//!
//! # Capabilities
//!
//! The second type parameter says whether the inverse direction exists.
//! Inverse-only operations are defined for [`WithInverse`] stores only:
//!
//! ```compile_fail
//! use csr_segments::{CsrStore, OutOnly, VertexId};
//!
//! let store: CsrStore<VertexId, OutOnly> =
//!     CsrStore::from_directed_out_only(2, vec![0, 1, 1], vec![1]).unwrap();
//! let _ = store.in_degree(1); // no such method without inversion
//! ```

use super::endpoint::{EdgeTarget, VertexId};
use crate::error::{CsrError, Result};
use crate::segment::{Segment, SegmentCollection};
use std::collections::HashMap;
use std::fmt;
use std::iter::Copied;
use std::ops::Range;
use std::slice::Iter;
use std::sync::Arc;

/// One direction of adjacency: position index plus flat neighbor array
///
/// `index` has `num_vertices + 1` entries; vertex `v`'s neighbors are
/// `neighbors[index[v]..index[v + 1]]`.
#[derive(Debug, Clone)]
pub struct Adjacency<D> {
    index: Arc<[i64]>,
    neighbors: Arc<[D]>,
}

impl<D: EdgeTarget> Adjacency<D> {
    /// Validate and wrap builder-produced arrays
    pub(crate) fn new(
        num_vertices: i64,
        index: Vec<i64>,
        neighbors: Vec<D>,
        direction: &str,
    ) -> Result<Self> {
        let n = checked_vertex_count(num_vertices)?;

        if index.len() != n + 1 {
            return Err(CsrError::topology(format!(
                "{direction} index has {} entries, expected {}",
                index.len(),
                n + 1
            )));
        }
        if index[0] < 0 {
            return Err(CsrError::topology(format!(
                "{direction} index starts at negative position {}",
                index[0]
            )));
        }
        if let Some(v) = index.windows(2).position(|w| w[0] > w[1]) {
            return Err(CsrError::topology(format!(
                "{direction} index decreases at vertex {v} ({} > {})",
                index[v],
                index[v + 1]
            )));
        }

        #[allow(clippy::cast_sign_loss)] // non-negative: checked above
        let (start, end) = (index[0] as usize, index[n] as usize);
        if end > neighbors.len() {
            return Err(CsrError::topology(format!(
                "{direction} index ends at {end} but only {} neighbors were supplied",
                neighbors.len()
            )));
        }
        if let Some(bad) = neighbors[start..end]
            .iter()
            .find(|e| e.vertex() < 0 || i64::from(e.vertex()) >= num_vertices)
        {
            return Err(CsrError::topology(format!(
                "{direction} neighbor {} outside 0..{num_vertices}",
                bad.vertex()
            )));
        }

        Ok(Self {
            index: index.into(),
            neighbors: neighbors.into(),
        })
    }

    /// Adjacency of a graph with no vertices
    pub(crate) fn empty() -> Self {
        Self {
            index: Arc::from([0_i64]),
            neighbors: Arc::from(Vec::new()),
        }
    }

    /// Position index (`num_vertices + 1` entries)
    #[must_use]
    pub fn index(&self) -> &[i64] {
        &self.index
    }

    /// Flat neighbor array
    #[must_use]
    pub fn neighbors(&self) -> &[D] {
        &self.neighbors
    }

    #[inline]
    #[allow(clippy::cast_sign_loss)]
    fn span(&self, v: VertexId) -> Range<usize> {
        let v = v as usize;
        self.index[v] as usize..self.index[v + 1] as usize
    }

    #[inline]
    fn degree(&self, v: VertexId) -> i64 {
        #[allow(clippy::cast_sign_loss)]
        let v = v as usize;
        self.index[v + 1] - self.index[v]
    }

    #[inline]
    fn neighborhood(&self, v: VertexId) -> Neighborhood<'_, D> {
        Neighborhood {
            slice: &self.neighbors[self.span(v)],
        }
    }

    /// Number of stored endpoints between the first and last vertex
    pub(crate) fn edge_span(&self) -> i64 {
        self.index[self.index.len() - 1] - self.index[0]
    }

    /// Positions relative to the first vertex
    pub(crate) fn relative_offsets(&self) -> Vec<i64> {
        let base = self.index[0];
        self.index.iter().map(|&p| p - base).collect()
    }

    /// Whether both arrays are the very same allocations as `other`'s
    pub(crate) fn same_allocation(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.index, &other.index) && Arc::ptr_eq(&self.neighbors, &other.neighbors)
    }
}

fn checked_vertex_count(num_vertices: i64) -> Result<usize> {
    if num_vertices > i64::from(VertexId::MAX) {
        return Err(CsrError::topology(format!(
            "{num_vertices} vertices do not fit the 32-bit vertex id space"
        )));
    }
    usize::try_from(num_vertices)
        .map_err(|_| CsrError::topology(format!("negative vertex count {num_vertices}")))
}

/// Read-only, forward-only view of one vertex's neighbors
///
/// Borrows the store; it cannot outlive it.
#[derive(Debug, Clone, Copy)]
pub struct Neighborhood<'a, D> {
    slice: &'a [D],
}

impl<'a, D: Copy> Neighborhood<'a, D> {
    pub(crate) fn from_slice(slice: &'a [D]) -> Self {
        Self { slice }
    }

    /// Number of neighbors
    #[must_use]
    pub fn len(&self) -> usize {
        self.slice.len()
    }

    /// Whether the vertex has no neighbors in this direction
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slice.is_empty()
    }

    /// Iterate endpoints by value
    pub fn iter(&self) -> Copied<Iter<'a, D>> {
        self.slice.iter().copied()
    }

    /// Underlying contiguous slice
    #[must_use]
    pub fn as_slice(&self) -> &'a [D] {
        self.slice
    }
}

impl<'a, D: Copy> IntoIterator for Neighborhood<'a, D> {
    type Item = D;
    type IntoIter = Copied<Iter<'a, D>>;

    fn into_iter(self) -> Self::IntoIter {
        self.slice.iter().copied()
    }
}

impl<'a, D: Copy> IntoIterator for &Neighborhood<'a, D> {
    type Item = D;
    type IntoIter = Copied<Iter<'a, D>>;

    fn into_iter(self) -> Self::IntoIter {
        self.slice.iter().copied()
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::WithInverse {}
    impl Sealed for super::OutOnly {}
}

/// Marker: the store keeps an inverse (in-edge) adjacency
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct WithInverse;

/// Marker: the store keeps out-edges only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct OutOnly;

/// Capability of a [`CsrStore`] instantiation with respect to in-edges
///
/// Sealed; implemented by [`WithInverse`] and [`OutOnly`].
pub trait Inversion: sealed::Sealed + Send + Sync + 'static {
    /// Storage for the inverse direction
    type Inverse<D: EdgeTarget>: Clone + fmt::Debug + Send + Sync;

    /// Inverse storage for an undirected graph (same arrays as forward)
    #[doc(hidden)]
    fn alias<D: EdgeTarget>(forward: &Adjacency<D>) -> Self::Inverse<D>;

    /// Direction the per-vertex `offsets` are computed over
    #[doc(hidden)]
    fn offsets_basis<'a, D: EdgeTarget>(
        forward: &'a Adjacency<D>,
        inverse: &'a Self::Inverse<D>,
    ) -> &'a Adjacency<D>;
}

impl Inversion for WithInverse {
    type Inverse<D: EdgeTarget> = Adjacency<D>;

    fn alias<D: EdgeTarget>(forward: &Adjacency<D>) -> Adjacency<D> {
        forward.clone()
    }

    fn offsets_basis<'a, D: EdgeTarget>(
        _forward: &'a Adjacency<D>,
        inverse: &'a Adjacency<D>,
    ) -> &'a Adjacency<D> {
        inverse
    }
}

impl Inversion for OutOnly {
    type Inverse<D: EdgeTarget> = ();

    fn alias<D: EdgeTarget>(_forward: &Adjacency<D>) {}

    fn offsets_basis<'a, D: EdgeTarget>(
        forward: &'a Adjacency<D>,
        _inverse: &'a (),
    ) -> &'a Adjacency<D> {
        forward
    }
}

/// Immutable-topology graph store in CSR form
///
/// Constructed once from ready index/neighbor arrays (see
/// [`Builder`](crate::Builder)); afterwards only the segment map and the caller's
/// dedup flags change.
///
/// # Example
///
/// ```
/// use csr_segments::{CsrStore, VertexId};
///
/// // 0 → 1, 1 → 2, 2 → 0
/// let store: CsrStore<VertexId> = CsrStore::from_directed(
///     3,
///     vec![0, 1, 2, 3],
///     vec![1, 2, 0],
///     vec![0, 1, 2, 3],
///     vec![2, 0, 1],
/// )
/// .unwrap();
///
/// assert_eq!(store.num_edges(), 3);
/// assert_eq!(store.out_neighbors(0).iter().collect::<Vec<_>>(), vec![1]);
/// assert_eq!(store.in_neighbors(0).iter().collect::<Vec<_>>(), vec![2]);
/// ```
pub struct CsrStore<D: EdgeTarget = VertexId, I: Inversion = WithInverse> {
    directed: bool,
    transpose: bool,
    num_vertices: i64,
    num_edges: i64,
    forward: Adjacency<D>,
    inverse: I::Inverse<D>,
    dedup_flags: Vec<i32>,
    offsets: Arc<[i64]>,
    segments: HashMap<String, Arc<SegmentCollection<D>>>,
}

impl<D: EdgeTarget, I: Inversion> CsrStore<D, I> {
    fn assemble(
        directed: bool,
        transpose: bool,
        num_vertices: i64,
        forward: Adjacency<D>,
        inverse: I::Inverse<D>,
    ) -> Self {
        let span = forward.edge_span();
        let num_edges = if directed { span } else { span / 2 };
        let offsets = I::offsets_basis(&forward, &inverse).relative_offsets();

        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)] // validated count
        let dedup_flags = vec![0; num_vertices as usize];

        Self {
            directed,
            transpose,
            num_vertices,
            num_edges,
            forward,
            inverse,
            dedup_flags,
            offsets: offsets.into(),
            segments: HashMap::new(),
        }
    }

    /// Undirected store from a single symmetric index/neighbor pair
    ///
    /// Every undirected edge must appear in both endpoints' lists; the inverse
    /// direction shares the forward arrays.
    ///
    /// # Errors
    ///
    /// Returns [`CsrError::InvalidTopology`] if the arrays are malformed
    pub fn from_undirected(num_vertices: i64, index: Vec<i64>, neighbors: Vec<D>) -> Result<Self> {
        let forward = Adjacency::new(num_vertices, index, neighbors, "undirected")?;
        if forward.edge_span() % 2 != 0 {
            return Err(CsrError::topology(format!(
                "undirected index spans {} endpoints, expected an even count",
                forward.edge_span()
            )));
        }
        let inverse = I::alias(&forward);
        Ok(Self::assemble(false, false, num_vertices, forward, inverse))
    }

    /// Whether edges are directed
    #[must_use]
    pub const fn directed(&self) -> bool {
        self.directed
    }

    /// Whether this store is a transpose of the store it was derived from
    #[must_use]
    pub const fn is_transpose(&self) -> bool {
        self.transpose
    }

    /// Number of vertices
    #[must_use]
    pub const fn num_vertices(&self) -> i64 {
        self.num_vertices
    }

    /// Number of edges (undirected edges counted once)
    #[must_use]
    pub const fn num_edges(&self) -> i64 {
        self.num_edges
    }

    /// Number of directed edges stored in the forward array
    #[must_use]
    pub const fn num_edges_directed(&self) -> i64 {
        if self.directed {
            self.num_edges
        } else {
            2 * self.num_edges
        }
    }

    /// Out-degree of `v` in O(1)
    ///
    /// # Panics
    ///
    /// Panics if `v` is not a vertex of the graph
    #[must_use]
    pub fn out_degree(&self, v: VertexId) -> i64 {
        self.forward.degree(v)
    }

    /// Out-neighbors of `v`
    ///
    /// # Panics
    ///
    /// Panics if `v` is not a vertex of the graph
    #[must_use]
    pub fn out_neighbors(&self, v: VertexId) -> Neighborhood<'_, D> {
        self.forward.neighborhood(v)
    }

    /// Lazy range over every vertex id
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // fits VertexId: checked at construction
    pub fn vertices(&self) -> Range<VertexId> {
        0..self.num_vertices as VertexId
    }

    /// Forward arrays
    #[must_use]
    pub const fn out_adjacency(&self) -> &Adjacency<D> {
        &self.forward
    }

    /// Per-vertex scratch flags (one per vertex, zeroed at construction)
    #[must_use]
    pub fn dedup_flags(&self) -> &[i32] {
        &self.dedup_flags
    }

    /// Mutable scratch flags; the borrow makes the caller their only writer
    pub fn dedup_flags_mut(&mut self) -> &mut [i32] {
        &mut self.dedup_flags
    }

    /// Adjacency positions relative to the first vertex, computed at construction
    ///
    /// Built over the inverse direction when the store has one, over the forward
    /// direction otherwise. `offsets()[v + 1] - offsets()[v]` is the degree in that
    /// direction, which is what load-balancing schedulers split on.
    #[must_use]
    pub fn offsets(&self) -> &[i64] {
        &self.offsets
    }

    /// Fresh forward offsets relative to the first vertex
    #[must_use]
    pub fn vertex_offsets(&self) -> Vec<i64> {
        self.forward.relative_offsets()
    }

    /// Whether both stores read the same forward arrays
    #[must_use]
    pub fn shares_topology_with<J: Inversion>(&self, other: &CsrStore<D, J>) -> bool {
        self.forward.same_allocation(&other.forward)
    }

    /// Summary counts
    #[must_use]
    pub const fn stats(&self) -> StoreStats {
        StoreStats {
            num_vertices: self.num_vertices,
            num_edges: self.num_edges,
            directed: self.directed,
        }
    }

    /// Segment collection registered under `label`
    #[must_use]
    pub fn segments(&self, label: &str) -> Option<&SegmentCollection<D>> {
        self.segments.get(label).map(Arc::as_ref)
    }

    /// Shared handle to a segment collection, for handing to worker threads
    #[must_use]
    pub fn shared_segments(&self, label: &str) -> Option<Arc<SegmentCollection<D>>> {
        self.segments.get(label).cloned()
    }

    /// Segment `id` of the collection under `label`
    ///
    /// # Errors
    ///
    /// Returns [`CsrError::UnknownLabel`] or [`CsrError::SegmentOutOfRange`]
    pub fn segment(&self, label: &str, id: usize) -> Result<&Segment<D>> {
        let collection = self
            .segments(label)
            .ok_or_else(|| CsrError::UnknownLabel(label.to_string()))?;
        collection
            .segment(id)
            .ok_or_else(|| CsrError::SegmentOutOfRange {
                label: label.to_string(),
                segment: id,
                count: collection.num_segments(),
            })
    }

    /// Number of segments under `label`
    ///
    /// # Errors
    ///
    /// Returns [`CsrError::UnknownLabel`] if nothing was built under `label`
    pub fn segment_count(&self, label: &str) -> Result<usize> {
        self.segments(label)
            .map(SegmentCollection::num_segments)
            .ok_or_else(|| CsrError::UnknownLabel(label.to_string()))
    }

    /// Labels with a registered segment collection
    pub fn segment_labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.segments.keys().map(String::as_str)
    }

    /// Drop the collection under `label`; returns whether one existed
    pub fn remove_segments(&mut self, label: &str) -> bool {
        self.segments.remove(label).is_some()
    }

    /// Register `collection` under `label`; returns whether it replaced one
    pub(crate) fn register_segments(
        &mut self,
        label: &str,
        collection: Arc<SegmentCollection<D>>,
    ) -> bool {
        self.segments.insert(label.to_string(), collection).is_some()
    }
}

impl<D: EdgeTarget> CsrStore<D, WithInverse> {
    /// Directed store from independent forward and inverse arrays
    ///
    /// # Errors
    ///
    /// Returns [`CsrError::InvalidTopology`] if either direction is malformed or
    /// the two directions disagree on the edge count
    pub fn from_directed(
        num_vertices: i64,
        out_index: Vec<i64>,
        out_neighbors: Vec<D>,
        in_index: Vec<i64>,
        in_neighbors: Vec<D>,
    ) -> Result<Self> {
        Self::from_directed_with_transpose(
            num_vertices,
            out_index,
            out_neighbors,
            in_index,
            in_neighbors,
            false,
        )
    }

    /// Directed store whose arrays describe the transpose of another graph
    ///
    /// `is_transpose` is recorded and reported by [`CsrStore::is_transpose`].
    ///
    /// # Errors
    ///
    /// Same as [`CsrStore::from_directed`]
    pub fn from_directed_with_transpose(
        num_vertices: i64,
        out_index: Vec<i64>,
        out_neighbors: Vec<D>,
        in_index: Vec<i64>,
        in_neighbors: Vec<D>,
        is_transpose: bool,
    ) -> Result<Self> {
        let forward = Adjacency::new(num_vertices, out_index, out_neighbors, "out")?;
        let inverse = Adjacency::new(num_vertices, in_index, in_neighbors, "in")?;
        if forward.edge_span() != inverse.edge_span() {
            return Err(CsrError::topology(format!(
                "out direction holds {} edges but in direction holds {}",
                forward.edge_span(),
                inverse.edge_span()
            )));
        }
        Ok(Self::assemble(
            true,
            is_transpose,
            num_vertices,
            forward,
            inverse,
        ))
    }

    /// In-degree of `v` in O(1)
    ///
    /// # Panics
    ///
    /// Panics if `v` is not a vertex of the graph
    #[must_use]
    pub fn in_degree(&self, v: VertexId) -> i64 {
        self.inverse.degree(v)
    }

    /// In-neighbors of `v`
    ///
    /// # Panics
    ///
    /// Panics if `v` is not a vertex of the graph
    #[must_use]
    pub fn in_neighbors(&self, v: VertexId) -> Neighborhood<'_, D> {
        self.inverse.neighborhood(v)
    }

    /// Inverse arrays (the forward arrays themselves for undirected graphs)
    #[must_use]
    pub const fn in_adjacency(&self) -> &Adjacency<D> {
        &self.inverse
    }

    /// Fresh inverse offsets relative to the first vertex
    #[must_use]
    pub fn in_vertex_offsets(&self) -> Vec<i64> {
        self.inverse.relative_offsets()
    }

    /// Whether the inverse direction is the forward allocation (undirected)
    #[must_use]
    pub fn inverse_aliases_forward(&self) -> bool {
        self.inverse.same_allocation(&self.forward)
    }

    /// View with forward and inverse roles swapped
    ///
    /// Shares every array with `self`; segment collections are not carried over
    /// because they partition the other direction.
    #[must_use]
    pub fn transpose(&self) -> Self {
        Self::assemble(
            self.directed,
            !self.transpose,
            self.num_vertices,
            self.inverse.clone(),
            self.forward.clone(),
        )
    }
}

impl<D: EdgeTarget> CsrStore<D, OutOnly> {
    /// Directed store holding out-edges only
    ///
    /// # Errors
    ///
    /// Returns [`CsrError::InvalidTopology`] if the arrays are malformed
    pub fn from_directed_out_only(
        num_vertices: i64,
        out_index: Vec<i64>,
        out_neighbors: Vec<D>,
    ) -> Result<Self> {
        let forward = Adjacency::new(num_vertices, out_index, out_neighbors, "out")?;
        Ok(Self::assemble(true, false, num_vertices, forward, ()))
    }
}

impl<D: EdgeTarget, I: Inversion> Clone for CsrStore<D, I> {
    /// Alias of the same topology with its own zeroed scratch flags
    fn clone(&self) -> Self {
        Self {
            directed: self.directed,
            transpose: self.transpose,
            num_vertices: self.num_vertices,
            num_edges: self.num_edges,
            forward: self.forward.clone(),
            inverse: self.inverse.clone(),
            dedup_flags: vec![0; self.dedup_flags.len()],
            offsets: Arc::clone(&self.offsets),
            segments: self.segments.clone(),
        }
    }
}

impl<D: EdgeTarget, I: Inversion> Default for CsrStore<D, I> {
    /// Empty undirected store; what a moved-from binding holds after `mem::take`
    fn default() -> Self {
        let forward = Adjacency::empty();
        let inverse = I::alias(&forward);
        Self::assemble(false, false, 0, forward, inverse)
    }
}

impl<D: EdgeTarget, I: Inversion> fmt::Debug for CsrStore<D, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrStore")
            .field("directed", &self.directed)
            .field("transpose", &self.transpose)
            .field("num_vertices", &self.num_vertices)
            .field("num_edges", &self.num_edges)
            .field("segments", &self.segments.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<D: EdgeTarget, I: Inversion> fmt::Display for CsrStore<D, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.stats().fmt(f)
    }
}

/// Vertex/edge counts of a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of vertices
    pub num_vertices: i64,
    /// Number of edges (undirected counted once)
    pub num_edges: i64,
    /// Directedness
    pub directed: bool,
}

impl StoreStats {
    /// Average degree, zero for an empty graph
    #[must_use]
    pub const fn average_degree(&self) -> i64 {
        if self.num_vertices == 0 {
            0
        } else {
            self.num_edges / self.num_vertices
        }
    }
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Graph has {} nodes and {} {}directed edges for degree: {}",
            self.num_vertices,
            self.num_edges,
            if self.directed { "" } else { "un" },
            self.average_degree()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::endpoint::EdgeEndpoint;

    fn triangle() -> CsrStore {
        // 0 → 1, 1 → 2, 2 → 0
        CsrStore::from_directed(3, vec![0, 1, 2, 3], vec![1, 2, 0], vec![0, 1, 2, 3], vec![2, 0, 1])
            .unwrap()
    }

    fn path_undirected() -> CsrStore {
        // 0 - 1 - 2
        CsrStore::from_undirected(3, vec![0, 1, 3, 4], vec![1, 0, 2, 1]).unwrap()
    }

    fn collect<D: EdgeTarget>(n: Neighborhood<'_, D>) -> Vec<D> {
        n.iter().collect()
    }

    #[test]
    fn test_empty_graph() {
        let store: CsrStore = CsrStore::from_undirected(0, vec![0], vec![]).unwrap();
        assert_eq!(store.num_vertices(), 0);
        assert_eq!(store.num_edges(), 0);
        assert_eq!(store.vertices().count(), 0);
        assert_eq!(store.offsets(), &[0]);
        assert!(store.dedup_flags().is_empty());
        assert_eq!(store.to_string(), "Graph has 0 nodes and 0 undirected edges for degree: 0");
    }

    #[test]
    fn test_directed_counts_and_degrees() {
        let store = triangle();
        assert!(store.directed());
        assert_eq!(store.num_vertices(), 3);
        assert_eq!(store.num_edges(), 3);
        assert_eq!(store.num_edges_directed(), 3);
        for v in store.vertices() {
            assert_eq!(store.out_degree(v), 1);
            assert_eq!(store.in_degree(v), 1);
        }
        assert_eq!(collect(store.out_neighbors(1)), vec![2]);
        assert_eq!(collect(store.in_neighbors(1)), vec![0]);
    }

    #[test]
    fn test_undirected_aliases_forward() {
        let store = path_undirected();
        assert!(!store.directed());
        assert_eq!(store.num_edges(), 2);
        assert_eq!(store.num_edges_directed(), 4);
        assert!(store.inverse_aliases_forward());
        assert_eq!(collect(store.in_neighbors(1)), collect(store.out_neighbors(1)));
        assert_eq!(Arc::strong_count(&store.forward.neighbors), 2);
    }

    #[test]
    fn test_offsets_follow_inverse_direction() {
        // 0 → 1, 0 → 2, 1 → 2
        let store: CsrStore = CsrStore::from_directed(
            3,
            vec![0, 2, 3, 3],
            vec![1, 2, 2],
            vec![0, 0, 1, 3],
            vec![0, 0, 1],
        )
        .unwrap();
        assert_eq!(store.offsets(), &[0, 0, 1, 3]);
        for v in store.vertices() {
            let v_idx = v as usize;
            assert_eq!(store.offsets()[v_idx + 1] - store.offsets()[v_idx], store.in_degree(v));
        }
        assert_eq!(store.vertex_offsets(), vec![0, 2, 3, 3]);
        assert_eq!(store.in_vertex_offsets(), vec![0, 0, 1, 3]);
    }

    #[test]
    fn test_offsets_relative_to_first_vertex() {
        // Index starting past position zero (builder reused a larger buffer)
        let store: CsrStore<VertexId, OutOnly> =
            CsrStore::from_directed_out_only(2, vec![2, 3, 4], vec![9, 9, 1, 0]).unwrap();
        assert_eq!(store.offsets(), &[0, 1, 2]);
        assert_eq!(store.num_edges(), 2);
        assert_eq!(collect(store.out_neighbors(0)), vec![1]);
    }

    #[test]
    fn test_invalid_topology_rejected() {
        let short = CsrStore::<VertexId>::from_undirected(3, vec![0, 1], vec![1]);
        assert!(matches!(short, Err(CsrError::InvalidTopology(_))));

        let decreasing = CsrStore::<VertexId>::from_undirected(2, vec![0, 2, 1], vec![1, 0]);
        assert!(matches!(decreasing, Err(CsrError::InvalidTopology(_))));

        let past_end = CsrStore::<VertexId>::from_undirected(2, vec![0, 1, 3], vec![1, 0]);
        assert!(matches!(past_end, Err(CsrError::InvalidTopology(_))));

        let out_of_range = CsrStore::<VertexId>::from_undirected(2, vec![0, 1, 2], vec![5, 0]);
        assert!(matches!(out_of_range, Err(CsrError::InvalidTopology(_))));

        let odd_span = CsrStore::<VertexId>::from_undirected(2, vec![0, 1, 1], vec![1]);
        assert!(matches!(odd_span, Err(CsrError::InvalidTopology(_))));

        let negative = CsrStore::<VertexId>::from_undirected(-1, vec![0], vec![]);
        assert!(matches!(negative, Err(CsrError::InvalidTopology(_))));

        let mismatched = CsrStore::<VertexId>::from_directed(
            2,
            vec![0, 1, 1],
            vec![1],
            vec![0, 0, 0],
            vec![],
        );
        assert!(matches!(mismatched, Err(CsrError::InvalidTopology(_))));
    }

    #[test]
    fn test_clone_aliases_arrays_with_fresh_flags() {
        let mut store = triangle();
        store.dedup_flags_mut()[1] = 7;

        let alias = store.clone();
        assert!(alias.shares_topology_with(&store));
        assert_eq!(alias.dedup_flags(), &[0, 0, 0]);
        assert_eq!(store.dedup_flags(), &[0, 7, 0]);
    }

    #[test]
    fn test_transpose_swaps_roles() {
        let store = triangle();
        let transposed = store.transpose();

        assert!(transposed.is_transpose());
        assert!(!store.is_transpose());
        assert!(transposed.transpose().shares_topology_with(&store));
        assert!(transposed.in_adjacency().same_allocation(store.out_adjacency()));
        for v in store.vertices() {
            assert_eq!(collect(transposed.out_neighbors(v)), collect(store.in_neighbors(v)));
            assert_eq!(collect(transposed.in_neighbors(v)), collect(store.out_neighbors(v)));
        }
        // Offsets recomputed over the transposed inverse (the original forward)
        assert_eq!(transposed.offsets(), store.vertex_offsets().as_slice());
    }

    #[test]
    fn test_explicit_transpose_flag() {
        let store: CsrStore = CsrStore::from_directed_with_transpose(
            2,
            vec![0, 0, 1],
            vec![0],
            vec![0, 1, 1],
            vec![1],
            true,
        )
        .unwrap();
        assert!(store.is_transpose());
        assert_eq!(store.in_degree(0), 1);
    }

    #[test]
    fn test_each_array_released_once_either_drop_order() {
        for original_first in [true, false] {
            let store = triangle();
            let forward = Arc::downgrade(&store.forward.neighbors);
            let inverse = Arc::downgrade(&store.inverse.index);
            let flags_len = store.dedup_flags().len();

            let alias = store.transpose();
            assert_eq!(forward.strong_count(), 2);
            assert_eq!(alias.dedup_flags().len(), flags_len);

            if original_first {
                drop(store);
                assert!(forward.upgrade().is_some());
                drop(alias);
            } else {
                drop(alias);
                assert!(forward.upgrade().is_some());
                drop(store);
            }
            assert!(forward.upgrade().is_none());
            assert!(inverse.upgrade().is_none());
        }
    }

    #[test]
    fn test_undirected_single_allocation() {
        let store = path_undirected();
        let neighbors = Arc::downgrade(&store.forward.neighbors);
        let copy = store.clone();
        drop(store);
        assert_eq!(neighbors.strong_count(), 2); // forward + inverse of the copy
        drop(copy);
        assert!(neighbors.upgrade().is_none());
    }

    #[test]
    fn test_take_leaves_empty_store() {
        let mut store = triangle();
        let moved = std::mem::take(&mut store);

        assert_eq!(moved.num_edges(), 3);
        assert_eq!(store.num_vertices(), 0);
        assert_eq!(store.num_edges(), 0);
        assert_eq!(store.vertices().count(), 0);
    }

    #[test]
    fn test_weighted_endpoints() {
        let store: CsrStore<EdgeEndpoint> = CsrStore::from_directed(
            2,
            vec![0, 1, 1],
            vec![EdgeEndpoint::new(1, 5)],
            vec![0, 0, 1],
            vec![EdgeEndpoint::new(0, 5)],
        )
        .unwrap();
        let out: Vec<EdgeEndpoint> = collect(store.out_neighbors(0));
        assert_eq!(out[0].weight, 5);
        assert!(out[0] == 1);
    }

    #[test]
    fn test_neighborhood_iteration() {
        let store = path_undirected();
        let hood = store.out_neighbors(1);
        assert_eq!(hood.len(), 2);
        assert!(!hood.is_empty());
        assert_eq!(hood.as_slice(), &[0, 2]);
        let mut seen = Vec::new();
        for v in hood {
            seen.push(v);
        }
        assert_eq!(seen, vec![0, 2]);
    }

    #[test]
    fn test_stats_display() {
        let store = triangle();
        assert_eq!(store.stats().average_degree(), 1);
        assert_eq!(store.to_string(), "Graph has 3 nodes and 3 directed edges for degree: 1");
    }

    #[test]
    fn test_unknown_segment_label() {
        let store = triangle();
        assert!(matches!(store.segment_count("pull"), Err(CsrError::UnknownLabel(_))));
        assert!(matches!(store.segment("pull", 0), Err(CsrError::UnknownLabel(_))));
        assert_eq!(store.segment_labels().count(), 0);
    }
}
