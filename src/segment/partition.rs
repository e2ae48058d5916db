//! Count, allocate and fill passes that cut an inverse adjacency into segments
//!
//! Destinations are split into chunks of roughly equal edge volume. Every pass
//! walks the chunks in parallel and visits `(destination, source)` pairs in the
//! same order, so the count pass fixes exactly where the fill pass writes:
//!
//! ```text
//! chunk tallies     [c0: s0=2 s1=1] [c1: s0=0 s1=3]
//! segment s1 edges  | c0 | c1 c1 c1 |
//! ```
//!
//! Each `(chunk, segment)` pair owns a disjoint window of the segment's arrays.

use super::bounds::SegmentBounds;
use super::graph::{filled_buffer, reserved, Segment, SegmentCollection};
use crate::error::Result;
use crate::storage::{Adjacency, EdgeTarget, VertexId};
use rayon::prelude::*;
use std::ops::Range;
use tracing::debug;

/// Upper bound on `chunks * segments` windows held at once
const MAX_WINDOWS: usize = 1 << 16;

/// Chunks per worker thread, for load balance on skewed graphs
const CHUNKS_PER_THREAD: usize = 4;

/// Distinct destinations and edges one chunk (or a whole segment) contributes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Tally {
    pub(crate) vertices: usize,
    pub(crate) edges: usize,
}

impl Tally {
    fn add(self, other: Self) -> Self {
        Self {
            vertices: self.vertices + other.vertices,
            edges: self.edges + other.edges,
        }
    }
}

/// Materialize every segment of `inverse` under `bounds`
pub(crate) fn partition<D: EdgeTarget>(
    inverse: &Adjacency<D>,
    bounds: SegmentBounds,
    numa_aware: bool,
) -> Result<SegmentCollection<D>> {
    let chunks = chunk_ranges(inverse.index(), bounds.num_segments());
    let tallies = count_chunks(inverse, &bounds, &chunks)?;
    let totals = merge(&tallies, bounds.num_segments())?;
    debug!(
        chunks = chunks.len(),
        segments = totals.len(),
        edges = totals.iter().map(|t| t.edges).sum::<usize>(),
        "count pass done"
    );

    let mut segments = allocate(&totals, numa_aware)?;
    let windows = carve_windows(&mut segments, &tallies);
    chunks
        .into_par_iter()
        .zip(windows)
        .for_each(|(range, mut windows)| fill_chunk(inverse, &bounds, range, &mut windows));
    debug!(segments = segments.len(), numa_aware, "fill pass done");

    Ok(SegmentCollection::new(segments, bounds, numa_aware))
}

/// Per-segment totals a partition of `inverse` under `bounds` would produce
pub(crate) fn count_totals<D: EdgeTarget>(
    inverse: &Adjacency<D>,
    bounds: &SegmentBounds,
) -> Result<Vec<Tally>> {
    let chunks = chunk_ranges(inverse.index(), bounds.num_segments());
    merge(&count_chunks(inverse, bounds, &chunks)?, bounds.num_segments())
}

/// Destination ranges holding roughly equal numbers of in-edges
#[allow(clippy::cast_possible_wrap)] // chunk counts are small
fn chunk_ranges(index: &[i64], num_segments: usize) -> Vec<Range<usize>> {
    let n = index.len() - 1;
    let budget = (MAX_WINDOWS / num_segments.max(1)).max(1);
    let chunks = (rayon::current_num_threads() * CHUNKS_PER_THREAD)
        .min(budget)
        .min(n)
        .max(1);

    let first = index[0];
    let span = index[n] - first;
    let mut cuts = Vec::with_capacity(chunks + 1);
    cuts.push(0);
    for k in 1..chunks {
        let target = span * k as i64 / chunks as i64;
        cuts.push(index[..n].partition_point(|&p| p - first < target));
    }
    cuts.push(n);
    cuts.windows(2).map(|w| w[0]..w[1]).collect()
}

#[inline]
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn in_edges<D: EdgeTarget>(inverse: &Adjacency<D>, d: usize) -> &[D] {
    let index = inverse.index();
    &inverse.neighbors()[index[d] as usize..index[d + 1] as usize]
}

fn count_chunks<D: EdgeTarget>(
    inverse: &Adjacency<D>,
    bounds: &SegmentBounds,
    chunks: &[Range<usize>],
) -> Result<Vec<Vec<Tally>>> {
    let segments = bounds.num_segments();
    chunks
        .par_iter()
        .map(|range| {
            let mut tallies = filled_buffer(segments, Tally::default(), "segment tallies")?;
            let mut last_seen = filled_buffer(segments, usize::MAX, "segment tallies")?;
            for d in range.clone() {
                for source in in_edges(inverse, d) {
                    let seg = bounds.segment_of(source.vertex());
                    if last_seen[seg] != d {
                        last_seen[seg] = d;
                        tallies[seg].vertices += 1;
                    }
                    tallies[seg].edges += 1;
                }
            }
            Ok(tallies)
        })
        .collect()
}

fn merge(tallies: &[Vec<Tally>], segments: usize) -> Result<Vec<Tally>> {
    let mut totals = filled_buffer(segments, Tally::default(), "segment totals")?;
    for chunk in tallies {
        for (total, part) in totals.iter_mut().zip(chunk) {
            *total = total.add(*part);
        }
    }
    Ok(totals)
}

fn allocate<D: EdgeTarget>(totals: &[Tally], numa_aware: bool) -> Result<Vec<Segment<D>>> {
    let build = |(id, t): (usize, &Tally)| Segment::<D>::allocate(id, t.vertices, t.edges);
    let mut built: Vec<Result<Segment<D>>> = reserved(totals.len(), "segment table")?;
    if numa_aware {
        // zero-filling on the worker that later reads the segment places its pages
        totals.par_iter().enumerate().map(build).collect_into_vec(&mut built);
    } else {
        built.extend(totals.iter().enumerate().map(build));
    }
    built.into_iter().collect()
}

/// Write cursor over one segment's slots reserved for one chunk
struct Window<'a, D> {
    graph_id: &'a mut [VertexId],
    starts: &'a mut [i64],
    edges: &'a mut [D],
    edge_base: i64,
    next_vertex: usize,
    next_edge: usize,
    last: Option<usize>,
}

/// Split every segment's buffers into per-chunk windows, indexed `[chunk][segment]`
#[allow(clippy::cast_possible_wrap)]
fn carve_windows<'a, D: EdgeTarget>(
    segments: &'a mut [Segment<D>],
    tallies: &[Vec<Tally>],
) -> Vec<Vec<Window<'a, D>>> {
    let mut windows: Vec<Vec<Window<'a, D>>> = tallies
        .iter()
        .map(|_| Vec::with_capacity(segments.len()))
        .collect();

    for (seg, segment) in segments.iter_mut().enumerate() {
        let (mut graph_id, mut starts, mut edges) = segment.fill_buffers();
        let mut edge_base = 0_i64;
        for (chunk, chunk_tallies) in tallies.iter().enumerate() {
            let tally = chunk_tallies[seg];
            let (ids_window, ids_rest) = std::mem::take(&mut graph_id).split_at_mut(tally.vertices);
            let (starts_window, starts_rest) = std::mem::take(&mut starts).split_at_mut(tally.vertices);
            let (edges_window, edges_rest) = std::mem::take(&mut edges).split_at_mut(tally.edges);
            graph_id = ids_rest;
            starts = starts_rest;
            edges = edges_rest;

            windows[chunk].push(Window {
                graph_id: ids_window,
                starts: starts_window,
                edges: edges_window,
                edge_base,
                next_vertex: 0,
                next_edge: 0,
                last: None,
            });
            edge_base += tally.edges as i64;
        }
    }
    windows
}

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)] // d < num_vertices <= i32::MAX
fn fill_chunk<D: EdgeTarget>(
    inverse: &Adjacency<D>,
    bounds: &SegmentBounds,
    range: Range<usize>,
    windows: &mut [Window<'_, D>],
) {
    for d in range {
        for &source in in_edges(inverse, d) {
            let w = &mut windows[bounds.segment_of(source.vertex())];
            if w.last != Some(d) {
                w.last = Some(d);
                w.graph_id[w.next_vertex] = d as VertexId;
                w.starts[w.next_vertex] = w.edge_base + w.next_edge as i64;
                w.next_vertex += 1;
            }
            w.edges[w.next_edge] = source;
            w.next_edge += 1;
        }
    }
}
