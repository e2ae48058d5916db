//! Edge endpoints: bare vertex ids and weighted destinations
//!
//! Every adjacency array stores one endpoint per edge. Unweighted graphs store
//! bare [`VertexId`]s, weighted graphs store [`EdgeEndpoint`]s. Both implement
//! [`EdgeTarget`], so the store, the partitioner and the on-disk segment layout
//! are written once for either representation.

use bytemuck::{Pod, Zeroable};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Vertex identifier (zero-indexed)
pub type VertexId = i32;

/// Integer edge weight
pub type Weight = i32;

/// Destination vertex paired with an edge weight
///
/// Equality, ordering and hashing look at `destination` only, so duplicate-edge
/// and self-edge detection behave the same for weighted and unweighted graphs.
///
/// ```
/// use csr_segments::EdgeEndpoint;
///
/// let a = EdgeEndpoint::new(4, 10);
/// let b = EdgeEndpoint::new(4, 99);
/// assert_eq!(a, b);
/// assert!(a == 4);
/// assert_eq!(EdgeEndpoint::from(7).weight, 1);
/// ```
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
#[repr(C)]
pub struct EdgeEndpoint {
    /// Vertex the edge points at
    pub destination: VertexId,
    /// Edge weight
    pub weight: Weight,
}

impl EdgeEndpoint {
    /// Create a weighted endpoint
    #[must_use]
    pub const fn new(destination: VertexId, weight: Weight) -> Self {
        Self {
            destination,
            weight,
        }
    }
}

impl From<VertexId> for EdgeEndpoint {
    fn from(destination: VertexId) -> Self {
        Self::new(destination, 1)
    }
}

impl From<EdgeEndpoint> for VertexId {
    fn from(endpoint: EdgeEndpoint) -> Self {
        endpoint.destination
    }
}

impl PartialEq for EdgeEndpoint {
    fn eq(&self, other: &Self) -> bool {
        self.destination == other.destination
    }
}

impl Eq for EdgeEndpoint {}

impl PartialEq<VertexId> for EdgeEndpoint {
    fn eq(&self, other: &VertexId) -> bool {
        self.destination == *other
    }
}

impl PartialOrd for EdgeEndpoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EdgeEndpoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.destination.cmp(&other.destination)
    }
}

impl Hash for EdgeEndpoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.destination.hash(state);
    }
}

impl fmt::Display for EdgeEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.destination, self.weight)
    }
}

/// One endpoint of a stored edge, weighted or not
///
/// Implementors are plain-old-data: segment files are written by casting
/// endpoint slices straight to bytes.
pub trait EdgeTarget: Pod + Ord + PartialEq<VertexId> + Send + Sync + fmt::Debug {
    /// Whether this representation carries a weight
    const WEIGHTED: bool;

    /// Bare vertex id of the endpoint
    fn vertex(self) -> VertexId;

    /// Weight of the edge (unit for unweighted endpoints)
    fn weight(self) -> Weight;

    /// Build an endpoint from its parts; unweighted endpoints drop the weight
    fn from_parts(vertex: VertexId, weight: Weight) -> Self;

    /// Same edge payload pointing at a different vertex
    #[must_use]
    fn retarget(self, vertex: VertexId) -> Self {
        Self::from_parts(vertex, self.weight())
    }
}

impl EdgeTarget for VertexId {
    const WEIGHTED: bool = false;

    #[inline]
    fn vertex(self) -> VertexId {
        self
    }

    #[inline]
    fn weight(self) -> Weight {
        1
    }

    #[inline]
    fn from_parts(vertex: VertexId, _weight: Weight) -> Self {
        vertex
    }
}

impl EdgeTarget for EdgeEndpoint {
    const WEIGHTED: bool = true;

    #[inline]
    fn vertex(self) -> VertexId {
        self.destination
    }

    #[inline]
    fn weight(self) -> Weight {
        self.weight
    }

    #[inline]
    fn from_parts(vertex: VertexId, weight: Weight) -> Self {
        Self::new(vertex, weight)
    }
}
