//! Edge list → CSR conversion
//!
//! The store itself only accepts finished index/neighbor arrays; the builder
//! produces them from `(source, endpoint)` pairs.

use super::csr::{CsrStore, Inversion, OutOnly, WithInverse};
use super::endpoint::{EdgeTarget, VertexId};
use crate::error::{CsrError, Result};
use tracing::debug;

/// Builds [`CsrStore`]s from edge lists
///
/// ```
/// use csr_segments::{Builder, CsrStore};
///
/// let store: CsrStore = Builder::new()
///     .squish(true)
///     .build_directed(&[(0, 1), (0, 1), (1, 2), (2, 2)])
///     .unwrap();
///
/// assert_eq!(store.num_vertices(), 3);
/// assert_eq!(store.num_edges(), 2); // duplicate and self edge removed
/// assert_eq!(store.in_degree(2), 1);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Builder {
    num_vertices: Option<i64>,
    squish: bool,
}

#[allow(clippy::cast_possible_wrap)] // vertex and edge counts originate from i64
impl Builder {
    /// Builder inferring the vertex count, keeping every edge
    #[must_use]
    pub const fn new() -> Self {
        Self {
            num_vertices: None,
            squish: false,
        }
    }

    /// Fix the vertex count instead of inferring it from the largest id
    #[must_use]
    pub const fn num_vertices(mut self, num_vertices: i64) -> Self {
        self.num_vertices = Some(num_vertices);
        self
    }

    /// Sort neighborhoods, drop duplicate and self edges
    #[must_use]
    pub const fn squish(mut self, squish: bool) -> Self {
        self.squish = squish;
        self
    }

    /// Undirected store; every pair is inserted in both directions
    ///
    /// # Errors
    ///
    /// Returns [`CsrError::InvalidTopology`] for negative ids or ids outside an
    /// explicit vertex count
    pub fn build_undirected<D: EdgeTarget, I: Inversion>(
        &self,
        edges: &[(VertexId, D)],
    ) -> Result<CsrStore<D, I>> {
        let n = self.resolve_vertex_count(edges)?;
        let mut adjacency = vec![Vec::new(); n];
        for &(u, e) in edges {
            adjacency[slot(u)].push(e);
            adjacency[slot(e.vertex())].push(e.retarget(u));
        }
        let (index, neighbors) = self.flatten(adjacency);
        debug!(vertices = n, edges = edges.len(), squish = self.squish, "built undirected CSR");
        CsrStore::from_undirected(n as i64, index, neighbors)
    }

    /// Directed store with forward and inverse arrays
    ///
    /// # Errors
    ///
    /// Same as [`Builder::build_undirected`]
    pub fn build_directed<D: EdgeTarget>(
        &self,
        edges: &[(VertexId, D)],
    ) -> Result<CsrStore<D, WithInverse>> {
        let n = self.resolve_vertex_count(edges)?;
        let mut forward = vec![Vec::new(); n];
        let mut inverse = vec![Vec::new(); n];
        for &(u, e) in edges {
            forward[slot(u)].push(e);
            inverse[slot(e.vertex())].push(e.retarget(u)); // inverse: v ← u
        }
        let (out_index, out_neighbors) = self.flatten(forward);
        let (in_index, in_neighbors) = self.flatten(inverse);
        debug!(vertices = n, edges = edges.len(), squish = self.squish, "built directed CSR");
        CsrStore::from_directed(n as i64, out_index, out_neighbors, in_index, in_neighbors)
    }

    /// Directed store without in-edges
    ///
    /// # Errors
    ///
    /// Same as [`Builder::build_undirected`]
    pub fn build_directed_out_only<D: EdgeTarget>(
        &self,
        edges: &[(VertexId, D)],
    ) -> Result<CsrStore<D, OutOnly>> {
        let n = self.resolve_vertex_count(edges)?;
        let mut forward = vec![Vec::new(); n];
        for &(u, e) in edges {
            forward[slot(u)].push(e);
        }
        let (index, neighbors) = self.flatten(forward);
        CsrStore::from_directed_out_only(n as i64, index, neighbors)
    }

    fn resolve_vertex_count<D: EdgeTarget>(&self, edges: &[(VertexId, D)]) -> Result<usize> {
        if let Some(&(u, e)) = edges.iter().find(|(u, e)| *u < 0 || e.vertex() < 0) {
            return Err(CsrError::topology(format!(
                "negative vertex id in edge ({u}, {})",
                e.vertex()
            )));
        }
        let largest = edges
            .iter()
            .map(|&(u, e)| u.max(e.vertex()))
            .max()
            .map_or(0, |v| i64::from(v) + 1);

        let n = match self.num_vertices {
            Some(n) if n < largest => {
                return Err(CsrError::topology(format!(
                    "edge endpoint {} outside 0..{n}",
                    largest - 1
                )))
            }
            Some(n) => n,
            None => largest,
        };
        usize::try_from(n).map_err(|_| CsrError::topology(format!("negative vertex count {n}")))
    }

    /// Concatenate per-vertex lists into index/neighbor arrays
    fn flatten<D: EdgeTarget>(&self, mut adjacency: Vec<Vec<D>>) -> (Vec<i64>, Vec<D>) {
        let mut index = Vec::with_capacity(adjacency.len() + 1);
        let mut neighbors = Vec::with_capacity(adjacency.iter().map(Vec::len).sum());
        index.push(0_i64);

        for (v, hood) in (0..).zip(adjacency.iter_mut()) {
            if self.squish {
                // stable sort: the first-inserted weight survives dedup
                hood.sort();
                hood.dedup();
                hood.retain(|e| *e != v);
            }
            neighbors.extend_from_slice(hood);
            index.push(neighbors.len() as i64);
        }
        (index, neighbors)
    }
}

#[inline]
#[allow(clippy::cast_sign_loss)] // non-negative: validated by resolve_vertex_count
fn slot(v: VertexId) -> usize {
    v as usize
}
