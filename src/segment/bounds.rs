//! Source-range partition policies
//!
//! A partition is a list of `num_segments + 1` non-decreasing boundaries over the
//! vertex id space; segment `k` receives every in-edge whose source lies in
//! `boundaries[k]..boundaries[k + 1]`.

use super::graph::{reserved, zeroed_buffer};
use crate::error::{CsrError, Result};
use crate::storage::{Adjacency, EdgeTarget, VertexId};
use std::ops::Range;

/// How source ids are split into segments
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Partitioning {
    /// Ranges of width `ceil(num_vertices / num_segments)`; the last may be narrower
    #[default]
    EqualWidth,
    /// Contiguous ranges carrying roughly `num_edges / num_segments` in-edges each
    DegreeBalanced,
    /// Caller-chosen boundaries: `0 = b[0] <= b[1] <= ... <= b[k] = num_vertices`
    Explicit(Vec<i64>),
}

/// Resolved boundaries of one partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentBounds {
    starts: Vec<i64>,
    width: Option<i64>,
}

impl SegmentBounds {
    /// Equal-width ranges (ceiling division, width at least 1)
    ///
    /// # Errors
    ///
    /// Returns [`CsrError::InvalidSegmentConfig`] for zero segments or more than the
    /// id space can count, [`CsrError::Allocation`] if the boundaries cannot be held
    pub fn equal_width(num_vertices: i64, num_segments: usize) -> Result<Self> {
        let segments = segment_count(num_segments)?;
        let width = (num_vertices / segments + i64::from(num_vertices % segments != 0)).max(1);
        let mut starts: Vec<i64> = zeroed_buffer(num_segments + 1, "segment boundaries")?;
        for (k, start) in (0_i64..).zip(starts.iter_mut()) {
            *start = k.saturating_mul(width).min(num_vertices);
        }
        Ok(Self {
            starts,
            width: Some(width),
        })
    }

    /// Caller-supplied boundaries
    ///
    /// # Errors
    ///
    /// Returns [`CsrError::InvalidSegmentConfig`] unless the boundaries start at 0,
    /// end at `num_vertices`, never decrease, and describe at least one segment
    pub fn from_boundaries(num_vertices: i64, boundaries: Vec<i64>) -> Result<Self> {
        if boundaries.len() < 2 {
            return Err(CsrError::InvalidSegmentConfig(
                "explicit partition needs at least two boundaries".to_string(),
            ));
        }
        if boundaries[0] != 0 || boundaries[boundaries.len() - 1] != num_vertices {
            return Err(CsrError::InvalidSegmentConfig(format!(
                "explicit partition must span 0..{num_vertices}, got {}..{}",
                boundaries[0],
                boundaries[boundaries.len() - 1]
            )));
        }
        if boundaries.windows(2).any(|w| w[0] > w[1]) {
            return Err(CsrError::InvalidSegmentConfig(
                "explicit partition boundaries decrease".to_string(),
            ));
        }
        Ok(Self {
            starts: boundaries,
            width: None,
        })
    }

    /// Contiguous ranges balanced by the number of in-edges each source feeds
    ///
    /// Falls back to equal width when the graph has no edges.
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)] // validated at construction
    pub(crate) fn degree_balanced<D: EdgeTarget>(
        inverse: &Adjacency<D>,
        num_vertices: i64,
        num_segments: usize,
    ) -> Result<Self> {
        let segments = segment_count(num_segments)?;
        let index = inverse.index();

        let (n, first, last) = (
            num_vertices as usize,
            index[0] as usize,
            index[index.len() - 1] as usize,
        );

        let mut load = vec![0_i64; n];
        for source in &inverse.neighbors()[first..last] {
            load[source.vertex() as usize] += 1;
        }
        let total: i64 = load.iter().sum();
        if total == 0 {
            return Self::equal_width(num_vertices, num_segments);
        }

        let mut starts = reserved(num_segments + 1, "segment boundaries")?;
        starts.push(0);
        let mut cut = 1;
        let mut carried = 0_i64;
        for (v, weight) in (0_i64..).zip(&load) {
            carried += weight;
            while cut < segments
                && i128::from(carried) * i128::from(segments) >= i128::from(total) * i128::from(cut)
            {
                starts.push(v + 1);
                cut += 1;
            }
        }
        while starts.len() < num_segments {
            starts.push(num_vertices);
        }
        starts.push(num_vertices);

        Ok(Self {
            starts,
            width: None,
        })
    }

    /// Number of segments
    #[must_use]
    pub fn num_segments(&self) -> usize {
        self.starts.len() - 1
    }

    /// Range width for equal-width partitions
    #[must_use]
    pub const fn segment_range(&self) -> Option<i64> {
        self.width
    }

    /// Boundaries, `num_segments + 1` entries
    #[must_use]
    pub fn boundaries(&self) -> &[i64] {
        &self.starts
    }

    /// Source ids routed to `segment`
    ///
    /// # Panics
    ///
    /// Panics if `segment >= num_segments()`
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // boundaries never exceed num_vertices
    pub fn range(&self, segment: usize) -> Range<VertexId> {
        self.starts[segment] as VertexId..self.starts[segment + 1] as VertexId
    }

    /// Segment receiving edges whose source is `source`
    #[inline]
    #[must_use]
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub fn segment_of(&self, source: VertexId) -> usize {
        let source = i64::from(source);
        match self.width {
            Some(width) => (source / width) as usize,
            None => self.starts.partition_point(|&start| start <= source) - 1,
        }
    }
}

fn segment_count(num_segments: usize) -> Result<i64> {
    match i64::try_from(num_segments) {
        Ok(0) => Err(CsrError::InvalidSegmentConfig(
            "number of segments must be at least 1".to_string(),
        )),
        Ok(segments) => Ok(segments),
        Err(_) => Err(CsrError::InvalidSegmentConfig(format!(
            "{num_segments} segments exceed the id space"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::CsrStore;

    #[test]
    fn test_equal_width_ceiling() {
        let bounds = SegmentBounds::equal_width(10, 3).unwrap();
        assert_eq!(bounds.segment_range(), Some(4));
        assert_eq!(bounds.boundaries(), &[0, 4, 8, 10]);
        assert_eq!(bounds.range(2), 8..10);
        assert_eq!(bounds.segment_of(0), 0);
        assert_eq!(bounds.segment_of(4), 1);
        assert_eq!(bounds.segment_of(9), 2);
    }

    #[test]
    fn test_more_segments_than_vertices() {
        let bounds = SegmentBounds::equal_width(2, 5).unwrap();
        assert_eq!(bounds.segment_range(), Some(1));
        assert_eq!(bounds.num_segments(), 5);
        assert_eq!(bounds.boundaries(), &[0, 1, 2, 2, 2, 2]);
        assert!(bounds.range(4).is_empty());
    }

    #[test]
    fn test_zero_segments_rejected() {
        assert!(matches!(
            SegmentBounds::equal_width(4, 0),
            Err(CsrError::InvalidSegmentConfig(_))
        ));
    }

    #[test]
    fn test_huge_segment_counts_reported() {
        assert!(matches!(
            SegmentBounds::equal_width(10, usize::MAX >> 1),
            Err(CsrError::Allocation {
                what: "segment boundaries",
                ..
            })
        ));
        assert!(matches!(
            SegmentBounds::equal_width(10, usize::MAX),
            Err(CsrError::InvalidSegmentConfig(_))
        ));

        let widest = SegmentBounds::equal_width(i64::MAX, 2).unwrap();
        assert_eq!(widest.segment_range(), Some(i64::MAX / 2 + 1));
        assert_eq!(widest.boundaries(), &[0, i64::MAX / 2 + 1, i64::MAX]);
    }

    #[test]
    fn test_explicit_lookup_skips_empty_ranges() {
        let bounds = SegmentBounds::from_boundaries(6, vec![0, 2, 2, 6]).unwrap();
        assert_eq!(bounds.segment_of(1), 0);
        assert_eq!(bounds.segment_of(2), 2);
        assert_eq!(bounds.segment_of(5), 2);
        assert!(bounds.range(1).is_empty());
    }

    #[test]
    fn test_explicit_validation() {
        assert!(SegmentBounds::from_boundaries(4, vec![0]).is_err());
        assert!(SegmentBounds::from_boundaries(4, vec![1, 4]).is_err());
        assert!(SegmentBounds::from_boundaries(4, vec![0, 3]).is_err());
        assert!(SegmentBounds::from_boundaries(4, vec![0, 3, 2, 4]).is_err());
    }

    #[test]
    fn test_degree_balanced_splits_hub() {
        // Vertex 0 is the source of six in-edges, vertices 1..4 of one each
        let store: CsrStore = CsrStore::from_directed(
            5,
            vec![0, 6, 7, 8, 9, 10],
            vec![1, 2, 3, 4, 1, 2, 2, 3, 4, 0],
            vec![0, 1, 3, 6, 8, 10],
            vec![4, 0, 0, 0, 0, 1, 0, 2, 0, 3],
        )
        .unwrap();

        let bounds = SegmentBounds::degree_balanced(store.in_adjacency(), 5, 2).unwrap();
        assert_eq!(bounds.num_segments(), 2);
        // Hub alone already carries more than half of the edges
        assert_eq!(bounds.boundaries(), &[0, 1, 5]);
        assert_eq!(bounds.segment_of(0), 0);
        assert_eq!(bounds.segment_of(3), 1);
    }

    #[test]
    fn test_degree_balanced_without_edges() {
        let store: CsrStore = CsrStore::from_undirected(4, vec![0, 0, 0, 0, 0], vec![]).unwrap();
        let bounds = SegmentBounds::degree_balanced(store.in_adjacency(), 4, 2).unwrap();
        assert_eq!(bounds, SegmentBounds::equal_width(4, 2).unwrap());
    }
}
