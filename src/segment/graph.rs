//! Segment sub-graphs and the collections that own them

use super::bounds::SegmentBounds;
use crate::error::{CsrError, Result};
use crate::storage::{EdgeTarget, Neighborhood, VertexId};
use bytemuck::Zeroable;

/// CSR sub-graph holding the in-edges whose source falls in one id range
///
/// Local vertex `i` is global destination `graph_id()[i]`; its sources are
/// `edges()[vertex_array()[i]..vertex_array()[i + 1]]`. Only destinations with at
/// least one in-edge from the range get a local id.
#[derive(Debug, Clone)]
pub struct Segment<D> {
    id: usize,
    graph_id: Vec<VertexId>,
    edges: Vec<D>,
    vertex_array: Vec<i64>,
}

#[allow(clippy::cast_possible_wrap)] // buffer lengths fit i64
impl<D: EdgeTarget> Segment<D> {
    /// Zeroed buffers sized by the count pass
    pub(crate) fn allocate(id: usize, num_vertices: usize, num_edges: usize) -> Result<Self> {
        let graph_id = zeroed_buffer(num_vertices, "segment graph ids")?;
        let edges = zeroed_buffer(num_edges, "segment edges")?;
        let mut vertex_array = zeroed_buffer(num_vertices + 1, "segment vertex offsets")?;
        vertex_array[num_vertices] = num_edges as i64;
        Ok(Self {
            id,
            graph_id,
            edges,
            vertex_array,
        })
    }

    pub(crate) fn from_parts(
        id: usize,
        graph_id: Vec<VertexId>,
        edges: Vec<D>,
        vertex_array: Vec<i64>,
    ) -> Self {
        Self {
            id,
            graph_id,
            edges,
            vertex_array,
        }
    }

    /// Writable views for the fill pass: graph ids, per-vertex starts (without the
    /// closing entry), and edges
    pub(crate) fn fill_buffers(&mut self) -> (&mut [VertexId], &mut [i64], &mut [D]) {
        let local = self.graph_id.len();
        (
            &mut self.graph_id,
            &mut self.vertex_array[..local],
            &mut self.edges,
        )
    }

    /// Segment id within its collection
    #[must_use]
    pub const fn id(&self) -> usize {
        self.id
    }

    /// Number of local (destination) vertices
    #[must_use]
    pub fn num_vertices(&self) -> i64 {
        self.graph_id.len() as i64
    }

    /// Number of edges
    #[must_use]
    pub fn num_edges(&self) -> i64 {
        self.edges.len() as i64
    }

    /// Local-to-global destination ids
    #[must_use]
    pub fn graph_id(&self) -> &[VertexId] {
        &self.graph_id
    }

    /// Flat source endpoints, grouped by local destination
    #[must_use]
    pub fn edges(&self) -> &[D] {
        &self.edges
    }

    /// CSR offsets into [`Segment::edges`], `num_vertices + 1` entries
    #[must_use]
    pub fn vertex_array(&self) -> &[i64] {
        &self.vertex_array
    }

    /// Sources feeding local vertex `local`
    ///
    /// # Panics
    ///
    /// Panics if `local >= num_vertices()`
    #[must_use]
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub fn in_neighbors(&self, local: usize) -> Neighborhood<'_, D> {
        let start = self.vertex_array[local] as usize;
        let end = self.vertex_array[local + 1] as usize;
        Neighborhood::from_slice(&self.edges[start..end])
    }

    /// `(global destination, sources)` for every local vertex, in id order
    pub fn iter(&self) -> impl Iterator<Item = (VertexId, Neighborhood<'_, D>)> + '_ {
        self.graph_id
            .iter()
            .enumerate()
            .map(move |(local, &global)| (global, self.in_neighbors(local)))
    }

    /// Memory footprint of the three arrays in bytes
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.graph_id.len() * std::mem::size_of::<VertexId>()
            + self.edges.len() * std::mem::size_of::<D>()
            + self.vertex_array.len() * std::mem::size_of::<i64>()
    }
}

/// Empty buffer with room for `len` items; a failed reservation is reported, not retried
pub(crate) fn reserved<T>(len: usize, what: &'static str) -> Result<Vec<T>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| CsrError::Allocation {
            what,
            requested: len,
        })?;
    Ok(buffer)
}

/// Fallible buffer of `len` copies of `value`
pub(crate) fn filled_buffer<T: Clone>(len: usize, value: T, what: &'static str) -> Result<Vec<T>> {
    let mut buffer = reserved(len, what)?;
    buffer.resize(len, value);
    Ok(buffer)
}

/// Fallible zero-initialized buffer
pub(crate) fn zeroed_buffer<T: Zeroable + Clone>(len: usize, what: &'static str) -> Result<Vec<T>> {
    filled_buffer(len, T::zeroed(), what)
}

/// All segments of one partition of a store's inverse adjacency
///
/// Immutable once built; stores hand it out behind an `Arc` for concurrent reads.
#[derive(Debug, Clone)]
pub struct SegmentCollection<D> {
    segments: Vec<Segment<D>>,
    bounds: SegmentBounds,
    numa_aware: bool,
}

impl<D: EdgeTarget> SegmentCollection<D> {
    pub(crate) fn new(segments: Vec<Segment<D>>, bounds: SegmentBounds, numa_aware: bool) -> Self {
        Self {
            segments,
            bounds,
            numa_aware,
        }
    }

    /// Number of segments
    #[must_use]
    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    /// Segment by id
    #[must_use]
    pub fn segment(&self, id: usize) -> Option<&Segment<D>> {
        self.segments.get(id)
    }

    pub(crate) fn as_slice(&self) -> &[Segment<D>] {
        &self.segments
    }

    /// Segments in id order
    pub fn iter(&self) -> std::slice::Iter<'_, Segment<D>> {
        self.segments.iter()
    }

    /// Whether segment buffers were placed by per-segment workers
    #[must_use]
    pub const fn numa_aware(&self) -> bool {
        self.numa_aware
    }

    /// Partition the segments were cut from
    #[must_use]
    pub const fn bounds(&self) -> &SegmentBounds {
        &self.bounds
    }

    /// Edges over all segments
    #[must_use]
    pub fn total_edges(&self) -> i64 {
        self.segments.iter().map(Segment::num_edges).sum()
    }

    /// Bytes held by all segments
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.segments.iter().map(Segment::size_bytes).sum()
    }
}

impl<'a, D: EdgeTarget> IntoIterator for &'a SegmentCollection<D> {
    type Item = &'a Segment<D>;
    type IntoIter = std::slice::Iter<'a, Segment<D>>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}
